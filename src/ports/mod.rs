//! Port traits decoupling the domain from file formats.

pub mod config_port;
pub mod table_port;
