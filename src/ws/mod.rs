//! WebSocket layer: upgrade acceptor and per-connection pumps.
//!
//! The endpoint at `/ws` turns each request into a long-lived connection
//! registered with the hub. Every connected client receives every
//! broadcast: handler replies and relayed bus events alike.

pub mod connection;
pub mod handler;
