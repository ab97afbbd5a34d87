//! bq-fixtures library: setup and teardown helpers for warehouse integration tests.

pub mod adapters;
pub mod app;
pub mod cli;
pub mod config;
pub mod domain;
pub mod server;
