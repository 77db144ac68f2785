//! TaskCore API gateway library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod auth;
pub mod config;
pub mod envelope;
pub mod error;
pub mod gateway;
pub mod realtime;
pub mod state;
