//! Control-plane command layer that lets an agent drive a music studio.
//!
//! Commands are registered in [`registry`], resolve their targets through
//! [`resolver`], call the studio through [`bindings`] and answer with the
//! [`envelope`]. The [`supervisor`] keeps one HTTP listener ([`api`]) alive
//! across host/port changes published by [`config`].

pub mod api;
pub mod audit;
pub mod batch;
pub mod bindings;
pub mod config;
pub mod demo;
pub mod device_catalog;
pub mod envelope;
pub mod error;
pub mod logging;
pub mod paths;
pub mod project;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod state;
pub mod studio;
pub mod supervisor;
