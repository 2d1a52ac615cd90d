//! Clients for external services.

pub mod spaceapi;

pub use spaceapi::{
    Shield, ShieldStatus, Shielded, SpaceApi, SpaceApiBuilder, SpaceApiEndpoints,
    StatusTransport, UreqTransport,
};
