//! Networked [`crate::domain::MessageBus`] backends.

pub mod redis_bus;

pub use redis_bus::RedisBus;
