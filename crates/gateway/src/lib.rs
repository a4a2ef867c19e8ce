//! `sark-gateway` — the HTTP surface binding every SARK component into one
//! enforcement path. The binary entry point is `main.rs`; this library
//! target exists so `tests/` integration suites can build a router against
//! a real `AppState` without going through the CLI.

pub mod adapter_registry;
pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod error;
pub mod principal_store;
pub mod request_meta;
pub mod state;
