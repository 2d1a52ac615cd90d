//! Bus protocol: payload shapes and the MQTT transport carrying them.

pub mod messages;
pub mod mqtt;
