//! Command serialization helpers.

/// Writes an astring (atom or quoted string).
///
/// Callers must check [`is_quotable`] first: CR, LF and NUL have no
/// representation inside a quoted string. Strings for which
/// [`needs_literal`] holds must be sent with [`write_literal_header`]
/// instead, since quoted strings are 7-bit only.
pub fn write_astring(buf: &mut Vec<u8>, s: &str) {
    if s.is_empty() || s.bytes().any(needs_quoting) {
        buf.push(b'"');
        for b in s.bytes() {
            if b == b'"' || b == b'\\' {
                buf.push(b'\\');
            }
            buf.push(b);
        }
        buf.push(b'"');
    } else {
        buf.extend_from_slice(s.as_bytes());
    }
}

/// Writes the `{n}\r\n` announcement of a synchronizing literal.
///
/// The `n` bytes themselves may only follow once the server has answered
/// with a continuation request.
pub fn write_literal_header(buf: &mut Vec<u8>, len: usize) {
    buf.push(b'{');
    buf.extend_from_slice(len.to_string().as_bytes());
    buf.extend_from_slice(b"}\r\n");
}

/// Returns true if the string can be sent as an atom or quoted string.
#[must_use]
pub fn is_quotable(s: &str) -> bool {
    !s.bytes().any(|b| matches!(b, b'\r' | b'\n' | 0))
}

/// Returns true if the string carries 8-bit bytes and must be sent as a
/// literal.
#[must_use]
pub const fn needs_literal(s: &str) -> bool {
    !s.is_ascii()
}

/// Returns true if the byte needs quoting.
const fn needs_quoting(b: u8) -> bool {
    matches!(
        b,
        b' ' | b'"' | b'\\' | b'(' | b')' | b'{' | b'%' | b'*' | b']'
    ) || b < 0x20
        || b == 0x7F
}
