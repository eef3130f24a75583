//! # resqlink-hub
//!
//! Real-time notification hub for the ResQLink citizen-reporting service.
//!
//! The hub keeps track of every connected WebSocket client, routes inbound
//! client messages to the business handler for their event namespace, and
//! fans out replies and bus-originated events to all clients. Delivery is
//! best-effort and in-memory only.
//!
//! ## Architecture
//!
//! ```text
//! Clients (WebSocket)                 Domain publishers
//!     │                                      │
//!     ├── Acceptor + pumps (ws/)             ├── MessageBus (domain/)
//!     │                                      │
//!     ├── EventRouter (service/)             ├── RedisBus (pubsub/)
//!     │     └── namespace handlers           │
//!     │                                      ├── PubSubBridge (service/)
//!     │                                      │
//!     └──────────── Hub actor (domain/) ─────┘
//!                      │
//!                      └── every connection's outbound queue
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod error;
pub mod pubsub;
pub mod service;
pub mod ws;
