//! TCP networking for the device.
//!
//! - **`listener`** – binds the port, filters peers against the allow-list,
//!   and spawns one task per accepted control center.
//! - **`connection`** – drives one `ProtocolSession` over one stream.

pub mod connection;
pub mod listener;

pub use connection::run_session;
pub use listener::{AllowList, Listener, NetworkError, SessionSettings};
