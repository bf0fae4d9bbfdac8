//! Person records: CSV upload and listing

pub mod commands;
pub mod queries;
pub mod routes;
pub mod spool;

pub use routes::records_routes;
