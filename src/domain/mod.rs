//! Domain layer: aggregates, value objects, events and the ports the
//! application layer talks to.
pub mod aggregates;
pub mod events;
pub mod ports;
pub mod value_objects;
