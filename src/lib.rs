pub mod agent;
pub mod config;
pub mod database;
pub mod envelope;
pub mod llm;
pub mod runtime;
pub mod server;
pub mod tools;
