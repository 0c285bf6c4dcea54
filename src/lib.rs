// Library surface shared by the binary and integration tests

pub mod config;
pub mod engine;
