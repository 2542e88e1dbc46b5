pub mod common;
pub mod connection;
pub mod import;
pub mod log;
pub mod reference;
pub mod sync;
