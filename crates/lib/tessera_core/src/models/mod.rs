//! Domain models shared across the engine.

pub mod auth;
