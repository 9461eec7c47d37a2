//! Persistence layer: durable key-value storage and the state gateway.
//!
//! # Responsibility
//! - Define the byte-level storage contract the gateway writes through.
//! - Serialize, migrate and broadcast whole `AppState` snapshots.
//!
//! # Invariants
//! - Storage faults never escape the gateway; they are logged and absorbed.
//! - The gateway never retains its own copy of the state.

pub mod kv_repo;
pub mod state_gateway;
