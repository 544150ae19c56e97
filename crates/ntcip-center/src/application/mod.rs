//! Application layer: which requests the center sends.
//!
//! - **`commands`** – the operator commands and the payloads (or raw bytes)
//!   each one puts on the wire.

pub mod commands;
