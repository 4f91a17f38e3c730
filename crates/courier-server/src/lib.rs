//! Courier relay server library.
//! The binary entry point is in main.rs; the modules are exposed here so
//! integration tests can assemble a server around an in-memory store.

pub mod api;
pub mod config;
pub mod connection;
pub mod error;
pub mod hub;
pub mod lifecycle;
pub mod rate_limit;
pub mod registry;
pub mod relay;
pub mod signaling;
pub mod store;
pub mod ws;
