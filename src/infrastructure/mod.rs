//! Adapters behind the domain ports.
pub mod http_providers;
pub mod memory;
pub mod nats;
pub mod postgres;
pub mod sandbox;
