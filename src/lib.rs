pub mod app;
pub mod compat;
pub mod config;
pub mod domain;
pub mod error;
pub mod executor;
pub mod export;
pub mod graph;
pub mod manifest;
pub mod output;
pub mod prefixes;
pub mod query;
pub mod store;
pub mod term;
