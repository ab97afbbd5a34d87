//! Shared test utilities for integration tests.
//! Not a test binary on its own; included by the test files via `mod common;`.
#![allow(dead_code)]

pub mod mock;

use bq_fixtures::domain::ports::Warehouse;
use bq_fixtures::domain::table::{Field, FieldType, Schema};
use bq_fixtures::server::http;
use std::sync::Arc;
use tokio::runtime::Runtime;

pub const PROJECT: &str = "proj";

pub fn one_string_field() -> Schema {
    Schema::of(vec![Field::of("name", FieldType::String)])
}

/// Emulator listening on an ephemeral local port. Stops when dropped.
pub struct Emulator {
    pub endpoint: String,
    _runtime: Runtime,
}

pub fn spawn_emulator(warehouse: Arc<dyn Warehouse>) -> Emulator {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .expect("build runtime");
    let listener = runtime
        .block_on(tokio::net::TcpListener::bind("127.0.0.1:0"))
        .expect("bind emulator");
    let addr = listener.local_addr().expect("local addr");
    runtime.spawn(http::serve_on(listener, warehouse));
    Emulator {
        endpoint: format!("http://{addr}"),
        _runtime: runtime,
    }
}
