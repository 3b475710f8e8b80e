//! Response parser.
//!
//! A sans-I/O parser for the handful of response shapes a login exchange
//! produces: status responses (tagged or untagged, with an optional
//! bracketed response code), `CAPABILITY` data and continuation requests.
//! Anything else is preserved as [`UntaggedResponse::Other`].

use crate::types::{Capability, Status};
use crate::{Error, Result};

/// Parsed untagged response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UntaggedResponse {
    /// `* OK|NO|BAD|PREAUTH|BYE [code] text`.
    Status {
        /// Response status.
        status: Status,
        /// Bracketed response code, without the brackets.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },
    /// `* CAPABILITY ...`.
    Capability(Vec<Capability>),
    /// Any other untagged data.
    Other(String),
}

/// Parsed server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Completion response for a tagged command.
    Tagged {
        /// Command tag.
        tag: String,
        /// Completion status.
        status: Status,
        /// Bracketed response code, without the brackets.
        code: Option<String>,
        /// Human-readable text.
        text: String,
    },
    /// Untagged response.
    Untagged(UntaggedResponse),
    /// Continuation request (`+ ...`).
    Continuation(String),
}

impl Response {
    /// Returns the capabilities carried by this response, if any.
    ///
    /// Servers announce capabilities either as `* CAPABILITY ...` data or
    /// inside a `[CAPABILITY ...]` response code on a status line.
    #[must_use]
    pub fn capabilities(&self) -> Option<Vec<Capability>> {
        match self {
            Self::Untagged(UntaggedResponse::Capability(caps)) => Some(caps.clone()),
            Self::Untagged(UntaggedResponse::Status { code: Some(code), .. })
            | Self::Tagged { code: Some(code), .. } => capability_code(code),
            _ => None,
        }
    }
}

/// Response parser.
pub struct ResponseParser;

impl ResponseParser {
    /// Parses one complete response line (CRLF optional).
    ///
    /// # Errors
    ///
    /// Returns [`Error::Parse`] if the line is empty or a tagged line does
    /// not carry a status keyword.
    pub fn parse(input: &[u8]) -> Result<Response> {
        let line = String::from_utf8_lossy(input);
        let line = line.trim_end_matches(['\r', '\n']);

        if line.is_empty() {
            return Err(Error::Parse {
                position: 0,
                message: "empty response".to_string(),
            });
        }

        if let Some(rest) = line.strip_prefix('+') {
            return Ok(Response::Continuation(rest.trim_start().to_string()));
        }

        if let Some(rest) = line.strip_prefix("* ") {
            return Ok(Response::Untagged(parse_untagged(rest)));
        }

        let (tag, rest) = split_word(line);
        let (keyword, rest) = split_word(rest);
        let status = Status::parse(keyword).ok_or_else(|| Error::Parse {
            position: tag.len() + 1,
            message: format!("expected status after tag, found {keyword:?}"),
        })?;
        let (code, text) = split_code(rest);

        Ok(Response::Tagged {
            tag: tag.to_string(),
            status,
            code,
            text,
        })
    }
}

fn parse_untagged(rest: &str) -> UntaggedResponse {
    let (keyword, tail) = split_word(rest);

    if let Some(status) = Status::parse(keyword) {
        let (code, text) = split_code(tail);
        return UntaggedResponse::Status { status, code, text };
    }

    if keyword.eq_ignore_ascii_case("CAPABILITY") {
        return UntaggedResponse::Capability(parse_capability_list(tail));
    }

    UntaggedResponse::Other(rest.to_string())
}

/// Splits off the first space-delimited word.
fn split_word(s: &str) -> (&str, &str) {
    match s.split_once(' ') {
        Some((word, rest)) => (word, rest),
        None => (s, ""),
    }
}

/// Splits an optional leading `[code]` from the response text.
fn split_code(s: &str) -> (Option<String>, String) {
    if let Some(inner) = s.strip_prefix('[')
        && let Some(end) = inner.find(']')
    {
        let code = inner[..end].to_string();
        let text = inner[end + 1..].trim_start().to_string();
        return (Some(code), text);
    }
    (None, s.to_string())
}

fn capability_code(code: &str) -> Option<Vec<Capability>> {
    let (keyword, tail) = split_word(code);
    keyword
        .eq_ignore_ascii_case("CAPABILITY")
        .then(|| parse_capability_list(tail))
}

fn parse_capability_list(s: &str) -> Vec<Capability> {
    s.split_ascii_whitespace().map(Capability::parse).collect()
}
