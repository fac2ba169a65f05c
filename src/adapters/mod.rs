//! Concrete adapter implementations for ports.

pub mod csv_tables;
pub mod file_config_adapter;
