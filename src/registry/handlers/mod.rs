pub mod device;
pub mod library;
pub mod operations;
pub mod query;
pub mod scene;
pub mod status;
pub mod track;
pub mod transport;
