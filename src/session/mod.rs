//! Session issuing and controller authorization.
//!
//! Provides:
//! - Token → room session store with TTL expiry
//! - Authorization gate for controller writes

pub mod gate;
pub mod store;

pub use gate::*;
pub use store::*;
