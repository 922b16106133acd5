//! Route handlers module.

pub mod control;
pub mod health;
pub mod rooms;
pub mod session;
