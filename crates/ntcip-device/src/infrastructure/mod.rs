//! Infrastructure layer for the device: TCP networking and configuration
//! storage.
//!
//! **Dependency rule**: this layer may depend on `application` and
//! `ntcip_core`, but MUST NOT be imported by the `application` layer.

pub mod network;
pub mod storage;
