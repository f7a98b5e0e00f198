pub mod assertions;
pub mod cmd;
pub mod config;
pub mod errors;
pub mod fixtures;
pub mod http;
pub mod log;
pub mod runner;
pub mod schema;
pub mod suite;
