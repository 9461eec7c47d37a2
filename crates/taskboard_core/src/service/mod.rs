//! Core use-case services.
//!
//! # Responsibility
//! - Own the canonical in-memory state and expose typed queries/commands.
//! - Route every successful mutation through the persistence gateway.

pub mod board_service;
