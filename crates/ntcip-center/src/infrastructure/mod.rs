//! Infrastructure layer for the center: the TCP client.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `ntcip_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
