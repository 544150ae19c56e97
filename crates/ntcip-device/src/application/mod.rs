//! Application layer: what the device does with a request.
//!
//! Nothing here touches a socket or a file.  The dispatcher receives decoded
//! frames from the session (through the core `Responder` trait) and the clock
//! is injected, so every handler is unit-testable.
//!
//! - **`dispatch`** – the `(type, code)` routing table and [`ValidationError`].
//! - **`handlers`** – reset and time-sync.
//! - **`clock`** – the local wall-clock seam.
//!
//! [`ValidationError`]: dispatch::ValidationError

pub mod clock;
pub mod dispatch;
pub mod handlers;
