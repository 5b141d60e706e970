//! Application layer: port traits, structured events, and the node
//! controller that composes the domain modules.

pub mod events;
pub mod ports;
pub mod service;
