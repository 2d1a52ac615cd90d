/// HTTP transport used by the SpaceAPI shield
///
/// The shield only needs "send this request, with or without certificate
/// verification" and a classification of what went wrong, so the transport is
/// a small trait. `UreqTransport` is the production implementation.
use derive_more::{Display, Error};
use std::{sync::Arc, time::Duration};
use ureq::{
    tls::{TlsConfig, TlsProvider},
    Agent,
};

use super::shield::SUCCESS_CODE;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CertVerification {
    Verify,
    /// Accept any certificate. Only used for the logged downgrade retry.
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpRequest {
    Get {
        url: String,
    },
    PostForm {
        url: String,
        fields: Vec<(String, String)>,
    },
}

impl HttpRequest {
    pub fn url(&self) -> &str {
        match self {
            HttpRequest::Get { url } | HttpRequest::PostForm { url, .. } => url,
        }
    }

    pub fn method(&self) -> &'static str {
        match self {
            HttpRequest::Get { .. } => "GET",
            HttpRequest::PostForm { .. } => "POST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Display, Error)]
pub enum TransportError {
    /// Certificate or handshake failure.
    #[display("TLS error: {message}")]
    Tls { message: String },
    #[display("timed out: {message}")]
    Timeout { message: String },
    #[display("I/O error: {message}")]
    Io { message: String },
    #[display("{message}")]
    Other { message: String },
}

impl TransportError {
    /// Short class name used in log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            TransportError::Tls { .. } => "TlsError",
            TransportError::Timeout { .. } => "Timeout",
            TransportError::Io { .. } => "IoError",
            TransportError::Other { .. } => "TransportError",
        }
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, TransportError::Tls { .. })
    }
}

pub trait StatusTransport: Send + Sync {
    fn execute(
        &self,
        request: &HttpRequest,
        verification: CertVerification,
    ) -> Result<HttpReply, TransportError>;
}

impl<T: StatusTransport + ?Sized> StatusTransport for Arc<T> {
    fn execute(
        &self,
        request: &HttpRequest,
        verification: CertVerification,
    ) -> Result<HttpReply, TransportError> {
        (**self).execute(request, verification)
    }
}

/// Blocking HTTP(S) transport backed by two `ureq` agents, one verifying
/// certificates and one not.
pub struct UreqTransport {
    verified: Agent,
    unverified: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        Self {
            verified: build_agent(timeout, false),
            unverified: build_agent(timeout, true),
        }
    }
}

fn build_agent(timeout: Duration, skip_verification: bool) -> Agent {
    let tls = TlsConfig::builder()
        .provider(TlsProvider::NativeTls)
        .disable_verification(skip_verification)
        .build();
    let config = Agent::config_builder()
        .http_status_as_error(false)
        .timeout_global(Some(timeout))
        .tls_config(tls)
        .build();
    Agent::new_with_config(config)
}

impl StatusTransport for UreqTransport {
    fn execute(
        &self,
        request: &HttpRequest,
        verification: CertVerification,
    ) -> Result<HttpReply, TransportError> {
        let agent = match verification {
            CertVerification::Verify => &self.verified,
            CertVerification::Skip => &self.unverified,
        };

        let result = match request {
            HttpRequest::Get { url } => agent.get(url.as_str()).call(),
            HttpRequest::PostForm { url, fields } => agent
                .post(url.as_str())
                .send_form(fields.iter().map(|(k, v)| (k.as_str(), v.as_str()))),
        };

        let mut response = result.map_err(classify)?;
        let status = response.status().as_u16();
        let body = reply_body(status, response.body_mut().read_to_string())?;

        Ok(HttpReply { status, body })
    }
}

/// Only a success body is ever decoded, so an unreadable error body must not
/// hide the status code.
fn reply_body(status: u16, body: Result<String, ureq::Error>) -> Result<String, TransportError> {
    match body {
        Ok(body) => Ok(body),
        Err(err) if status != SUCCESS_CODE => {
            log::debug!("Ignoring unreadable body of HTTP {status} reply: {err}");
            Ok(String::new())
        }
        Err(err) => Err(classify(err)),
    }
}

fn classify(err: ureq::Error) -> TransportError {
    match err {
        ureq::Error::Tls(message) => TransportError::Tls {
            message: message.to_string(),
        },
        ureq::Error::NativeTls(err) => TransportError::Tls {
            message: err.to_string(),
        },
        ureq::Error::Timeout(kind) => TransportError::Timeout {
            message: format!("{kind:?}"),
        },
        ureq::Error::Io(err) => {
            let message = err.to_string();
            if mentions_certificate(&message) {
                TransportError::Tls { message }
            } else {
                TransportError::Io { message }
            }
        }
        other => TransportError::Other {
            message: other.to_string(),
        },
    }
}

/// Handshake failures sometimes surface as plain I/O errors.
fn mentions_certificate(message: &str) -> bool {
    let message = message.to_ascii_lowercase();
    message.contains("certificate") || message.contains("handshake")
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Transport that replays canned outcomes and records what it was asked.
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Mutex<VecDeque<Result<HttpReply, TransportError>>>,
        calls: Mutex<Vec<(HttpRequest, CertVerification)>>,
    }

    impl ScriptedTransport {
        pub fn new(script: Vec<Result<HttpReply, TransportError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                calls: Mutex::new(Vec::new()),
            }
        }

        pub fn calls(&self) -> Vec<(HttpRequest, CertVerification)> {
            self.calls.lock().clone()
        }
    }

    impl StatusTransport for ScriptedTransport {
        fn execute(
            &self,
            request: &HttpRequest,
            verification: CertVerification,
        ) -> Result<HttpReply, TransportError> {
            self.calls.lock().push((request.clone(), verification));
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(connection_refused()))
        }
    }

    pub fn ok(body: &str) -> Result<HttpReply, TransportError> {
        Ok(HttpReply {
            status: 200,
            body: body.to_string(),
        })
    }

    pub fn status(code: u16, body: &str) -> Result<HttpReply, TransportError> {
        Ok(HttpReply {
            status: code,
            body: body.to_string(),
        })
    }

    pub fn tls_failure() -> TransportError {
        TransportError::Tls {
            message: "certificate verify failed".to_string(),
        }
    }

    pub fn connection_refused() -> TransportError {
        TransportError::Io {
            message: "Connection refused (os error 111)".to_string(),
        }
    }
}
