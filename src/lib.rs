pub mod app_env;
pub mod config;
pub mod domain;
pub mod external_connections;
pub mod logging;
pub mod persistence;
pub mod workspace;
