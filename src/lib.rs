//! SimRelay - live needs relay for sim rooms.
//!
//! One controller per room pushes needs updates; any number of anonymous
//! viewers watch them over server-sent events.

pub mod bus;
pub mod config;
pub mod ingress;
pub mod needs;
pub mod relay;
pub mod server;
pub mod session;
