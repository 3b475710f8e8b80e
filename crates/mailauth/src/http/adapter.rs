//! nginx `auth_http` header protocol.
//!
//! Inbound headers become an [`AuthRequest`]; a decision becomes `Auth-*`
//! response headers. Requests the engine cannot decide are
//! answered here without invoking it.

use std::borrow::Cow;

use hyper::HeaderMap;
use hyper::header::{HeaderName, HeaderValue};
use mailauth_core::{AuthRequest, Protocol, Rejection, RetryAfter, Upstream};
use secrecy::{ExposeSecret, SecretString};
use tracing::warn;

pub const AUTH_LOGIN_ATTEMPT: HeaderName = HeaderName::from_static("auth-login-attempt");
pub const AUTH_PROTOCOL: HeaderName = HeaderName::from_static("auth-protocol");
pub const CLIENT_IP: HeaderName = HeaderName::from_static("client-ip");
pub const AUTH_METHOD: HeaderName = HeaderName::from_static("auth-method");
pub const AUTH_SSL: HeaderName = HeaderName::from_static("auth-ssl");
pub const AUTH_USER: HeaderName = HeaderName::from_static("auth-user");
pub const AUTH_PASS: HeaderName = HeaderName::from_static("auth-pass");

pub const AUTH_STATUS: HeaderName = HeaderName::from_static("auth-status");
pub const AUTH_SERVER: HeaderName = HeaderName::from_static("auth-server");
pub const AUTH_PORT: HeaderName = HeaderName::from_static("auth-port");
pub const AUTH_ERROR_CODE: HeaderName = HeaderName::from_static("auth-error-code");
pub const AUTH_WAIT: HeaderName = HeaderName::from_static("auth-wait");

const NO_ATTEMPT: &str = "internal error (no auth attempts submitted)";
const UNSUPPORTED_PROTOCOL: &str = "internal error (unsupported protocol)";
const NO_CLIENT_IP: &str = "internal error (client ip missing)";
const PLAIN_ONLY: &str = "only plain authentication is supported";
const NO_CLIENT_CERTS: &str = "client certificates are not supported";
const UNSUPPORTED_CODE: &str = "504 5.5.4";

/// A request that passed every header gate.
#[derive(Debug)]
pub struct Admitted {
    /// Request for the engine.
    pub request: AuthRequest,
    /// Address of the mail client, for logging.
    pub client_ip: String,
}

/// Parses and gates the inbound headers, in the order nginx clients expect
/// them to be checked.
///
/// # Errors
///
/// Returns the [`Rejection`] to send back if a gate fails. The engine must
/// not be consulted in that case.
pub fn admit(headers: &HeaderMap) -> Result<Admitted, Rejection> {
    let attempt = header(headers, &AUTH_LOGIN_ATTEMPT)
        .parse::<u32>()
        .map_err(|_| internal(NO_ATTEMPT))?;

    let protocol = header(headers, &AUTH_PROTOCOL)
        .parse::<Protocol>()
        .map_err(|_| internal(UNSUPPORTED_PROTOCOL))?;

    let client_ip = header(headers, &CLIENT_IP).into_owned();
    if client_ip.is_empty() {
        return Err(internal(NO_CLIENT_IP));
    }

    if header(headers, &AUTH_METHOD) != "plain" {
        return Err(unsupported(PLAIN_ONLY, protocol, attempt));
    }

    let ssl = header(headers, &AUTH_SSL);
    if !ssl.is_empty() && ssl != "off" {
        return Err(unsupported(NO_CLIENT_CERTS, protocol, attempt));
    }

    let username = header(headers, &AUTH_USER).into_owned();
    let password = SecretString::from(header(headers, &AUTH_PASS).into_owned());

    Ok(Admitted {
        request: AuthRequest::new(protocol, username, password, attempt),
        client_ip,
    })
}

/// Renders a rejection as response headers.
pub fn reject_headers(rejection: &Rejection) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTH_STATUS, HeaderValue::from_static(rejection.reason));
    if let Some(code) = rejection.error_code {
        headers.insert(AUTH_ERROR_CODE, HeaderValue::from_static(code));
    }
    if let Some(wait) = rejection.retry_after.map(RetryAfter::as_header_value)
        && wait > 0
    {
        headers.insert(AUTH_WAIT, HeaderValue::from(wait));
    }
    headers
}

/// Renders an acceptance as response headers. `server` is the upstream
/// address as it should appear in `Auth-Server`.
pub fn accept_headers(upstream: &Upstream, server: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(AUTH_STATUS, HeaderValue::from_static("OK"));
    insert_text(&mut headers, AUTH_SERVER, server);
    headers.insert(AUTH_PORT, HeaderValue::from(upstream.port));

    if let Some(relay) = &upstream.relay {
        if !relay.user.is_empty() {
            insert_text(&mut headers, AUTH_USER, &relay.user);
        }
        let password = relay.password.expose_secret();
        if !password.is_empty() {
            insert_text(&mut headers, AUTH_PASS, password);
        }
    }
    headers
}

/// Header value as text. Missing headers read as empty.
fn header<'a>(headers: &'a HeaderMap, name: &HeaderName) -> Cow<'a, str> {
    headers
        .get(name)
        .map_or(Cow::Borrowed(""), |value| String::from_utf8_lossy(value.as_bytes()))
}

fn insert_text(headers: &mut HeaderMap, name: HeaderName, value: &str) {
    match HeaderValue::from_str(value) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(_) => warn!(header = %name, "value is not a valid header value, omitted"),
    }
}

const fn internal(reason: &'static str) -> Rejection {
    Rejection {
        reason,
        error_code: None,
        retry_after: None,
    }
}

const fn unsupported(reason: &'static str, protocol: Protocol, attempt: u32) -> Rejection {
    Rejection {
        reason,
        error_code: match protocol {
            Protocol::Smtp => Some(UNSUPPORTED_CODE),
            Protocol::Imap => None,
        },
        retry_after: Some(RetryAfter::Seconds(attempt.saturating_add(1))),
    }
}
