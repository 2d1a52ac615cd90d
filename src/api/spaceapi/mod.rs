pub mod shield;
pub mod transport;

use serde::Deserialize;
use std::time::Duration;

pub use shield::{Shield, ShieldStatus, Shielded, SUCCESS_CODE};
pub use transport::{
    CertVerification, HttpReply, HttpRequest, StatusTransport, TransportError, UreqTransport,
};

pub const DEFAULT_STATUS_URL: &str = "https://spaceapi.net/new/space/haum/status/json";
pub const DEFAULT_SENSOR_URL: &str = "https://spaceapi.net/new/space/haum/sensor/set";

/// Where and how to reach the SpaceAPI instance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpaceApiEndpoints {
    pub status_url: String,
    pub sensor_url: String,
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct StatusDocument {
    state: StateSection,
}

#[derive(Debug, Deserialize)]
struct StateSection {
    #[serde(default)]
    open: Option<bool>,
}

/// Open/close/toggle on top of the fault shield.
///
/// None of these operations fail; each reports the shield flags of the calls
/// it made.
pub struct SpaceApi<T = UreqTransport> {
    shield: Shield<T>,
    endpoints: SpaceApiEndpoints,
}

impl<T: StatusTransport> SpaceApi<T> {
    pub fn with_transport(endpoints: SpaceApiEndpoints, transport: T) -> Self {
        Self {
            shield: Shield::new(transport),
            endpoints,
        }
    }

    pub fn endpoints(&self) -> &SpaceApiEndpoints {
        &self.endpoints
    }

    pub fn shield(&self) -> &Shield<T> {
        &self.shield
    }

    /// Whether the public status says the space is open. Any fault reads as closed.
    pub fn is_open(&self) -> Shielded<bool> {
        let request = HttpRequest::Get {
            url: self.endpoints.status_url.clone(),
        };
        let Shielded { value, mut status } = self.shield.call(&request);

        let open = match value {
            None => false,
            Some(reply) => match serde_json::from_str::<StatusDocument>(&reply.body) {
                Ok(document) => document.state.open.unwrap_or(false),
                Err(err) => {
                    log::error!(
                        "Unreadable status document from {}: {err}",
                        self.endpoints.status_url
                    );
                    status.crash_error = true;
                    false
                }
            },
        };

        Shielded::new(open, status)
    }

    /// Publish a new state. The reply body is ignored.
    pub fn set_state(&self, open: bool) -> ShieldStatus {
        let sensors = serde_json::json!({ "state": { "open": open } }).to_string();
        let request = HttpRequest::PostForm {
            url: self.endpoints.sensor_url.clone(),
            fields: vec![
                ("key".to_string(), self.endpoints.key.clone()),
                ("sensors".to_string(), sensors),
            ],
        };

        log::info!("Pushing state open={open} to SpaceAPI");
        self.shield.call(&request).status
    }

    pub fn open(&self) -> ShieldStatus {
        self.set_state(true)
    }

    pub fn close(&self) -> ShieldStatus {
        self.set_state(false)
    }

    /// Flip the public status. Returns the state that was requested.
    ///
    /// Read then write: another writer acting in between is not detected.
    pub fn toggle(&self) -> Shielded<bool> {
        let current = self.is_open();
        let wanted = !current.value;
        let status = current.status.merge(self.set_state(wanted));
        Shielded::new(wanted, status)
    }
}

/// Builder for a [`SpaceApi`] backed by [`UreqTransport`].
pub struct SpaceApiBuilder {
    status_url: String,
    sensor_url: String,
    key: String,
    timeout: Duration,
}

impl SpaceApiBuilder {
    pub fn new() -> Self {
        Self {
            status_url: DEFAULT_STATUS_URL.to_string(),
            sensor_url: DEFAULT_SENSOR_URL.to_string(),
            key: String::new(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_status_url(mut self, url: &str) -> Self {
        self.status_url = url.to_string();
        self
    }

    pub fn with_sensor_url(mut self, url: &str) -> Self {
        self.sensor_url = url.to_string();
        self
    }

    pub fn with_key(mut self, key: &str) -> Self {
        self.key = key.to_string();
        self
    }

    /// Overall timeout of one HTTP request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn endpoints(&self) -> SpaceApiEndpoints {
        SpaceApiEndpoints {
            status_url: self.status_url.clone(),
            sensor_url: self.sensor_url.clone(),
            key: self.key.clone(),
        }
    }

    pub fn build(self) -> SpaceApi<UreqTransport> {
        if self.key.is_empty() {
            log::warn!("No SpaceAPI key configured, state updates will be rejected");
        }
        SpaceApi::with_transport(self.endpoints(), UreqTransport::new(self.timeout))
    }
}

impl Default for SpaceApiBuilder {
    fn default() -> Self {
        Self::new()
    }
}
