/// Fault shield around outbound status requests
///
/// A shielded call never returns an error. Whatever goes wrong is recorded in
/// a fresh [`ShieldStatus`] returned next to an optional reply, and the caller
/// decides how to degrade. The shield knows nothing about SpaceAPI itself.
use serde::Serialize;

use super::transport::{CertVerification, HttpReply, HttpRequest, StatusTransport};

/// The only status code accepted as success.
pub const SUCCESS_CODE: u16 = 200;

/// Outcome flags of one shielded call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ShieldStatus {
    /// Certificate verification failed and the call was retried without it.
    pub ssl_error: bool,
    /// The call failed at transport level; no reply is available.
    pub crash_error: bool,
    /// A reply arrived with a non-success status code.
    pub bad_http_code: bool,
}

impl ShieldStatus {
    pub fn is_clean(&self) -> bool {
        !(self.ssl_error || self.crash_error || self.bad_http_code)
    }

    /// Union of two outcomes, for operations made of several calls.
    pub fn merge(self, other: ShieldStatus) -> ShieldStatus {
        ShieldStatus {
            ssl_error: self.ssl_error || other.ssl_error,
            crash_error: self.crash_error || other.crash_error,
            bad_http_code: self.bad_http_code || other.bad_http_code,
        }
    }
}

/// A value together with the fault flags of the call(s) that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct Shielded<T> {
    pub value: T,
    pub status: ShieldStatus,
}

impl<T> Shielded<T> {
    pub fn new(value: T, status: ShieldStatus) -> Self {
        Self { value, status }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Shielded<U> {
        Shielded {
            value: f(self.value),
            status: self.status,
        }
    }
}

pub struct Shield<T> {
    transport: T,
}

impl<T: StatusTransport> Shield<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Perform `request`, never failing.
    ///
    /// Only a 200 reply is handed back; anything else yields `None` with the
    /// matching flag set.
    pub fn call(&self, request: &HttpRequest) -> Shielded<Option<HttpReply>> {
        let mut status = ShieldStatus::default();
        let url = request.url();

        let attempt = match self.transport.execute(request, CertVerification::Verify) {
            Err(err) if err.is_tls() => {
                status.ssl_error = true;
                log::warn!(
                    "Bad certificate for {url} ({err}), retrying without verification"
                );
                self.transport.execute(request, CertVerification::Skip)
            }
            other => other,
        };

        let reply = match attempt {
            Err(err) => {
                status.crash_error = true;
                log::error!(
                    "{} {url} failed with {}: {err}",
                    request.method(),
                    err.kind()
                );
                None
            }
            Ok(reply) if reply.status != SUCCESS_CODE => {
                status.bad_http_code = true;
                log::warn!(
                    "HTTP status code {} for {} {url}",
                    reply.status,
                    request.method()
                );
                None
            }
            Ok(reply) => Some(reply),
        };

        Shielded::new(reply, status)
    }
}
