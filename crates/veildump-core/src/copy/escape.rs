//! Field-level escaping for the COPY text format.

use crate::error::{CoreError, CoreResult};

/// Decodes the escaped bytes of one field into plain bytes.
///
/// The input is the raw cell content as it appeared between separators,
/// excluding the NULL sentinel (callers detect `\N` before unescaping).
///
/// # Errors
///
/// Returns [`CoreError::Encoding`] for a trailing backslash or a backslash
/// followed by anything other than `b f n r t v \` or an octal digit.
pub fn unescape(field: &[u8]) -> CoreResult<Vec<u8>> {
    let mut out = Vec::with_capacity(field.len());
    let mut i = 0;
    while i < field.len() {
        let b = field[i];
        if b != b'\\' {
            out.push(b);
            i += 1;
            continue;
        }
        i += 1;
        let Some(&esc) = field.get(i) else {
            return Err(CoreError::encoding("truncated escape at end of field"));
        };
        match esc {
            b'b' => out.push(0x08),
            b'f' => out.push(0x0C),
            b'n' => out.push(b'\n'),
            b'r' => out.push(b'\r'),
            b't' => out.push(b'\t'),
            b'v' => out.push(0x0B),
            b'\\' => out.push(b'\\'),
            b'0'..=b'7' => {
                // One to three octal digits.
                let mut val = u32::from(esc - b'0');
                let mut digits = 1;
                while digits < 3 {
                    match field.get(i + 1) {
                        Some(&d @ b'0'..=b'7') => {
                            val = val * 8 + u32::from(d - b'0');
                            i += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                out.push(val as u8);
            }
            other => {
                return Err(CoreError::Encoding(format!(
                    "invalid escape sequence \\{}",
                    other.escape_ascii()
                )));
            }
        }
        i += 1;
    }
    Ok(out)
}

/// Escapes plain bytes into the minimum-length reversible COPY form,
/// appending to `out`.
///
/// Only the separator-significant bytes and the backslash itself are
/// escaped; everything else passes through untouched.
pub fn escape_into(value: &[u8], out: &mut Vec<u8>) {
    for &b in value {
        match b {
            0x08 => out.extend_from_slice(b"\\b"),
            0x0C => out.extend_from_slice(b"\\f"),
            b'\n' => out.extend_from_slice(b"\\n"),
            b'\r' => out.extend_from_slice(b"\\r"),
            b'\t' => out.extend_from_slice(b"\\t"),
            0x0B => out.extend_from_slice(b"\\v"),
            b'\\' => out.extend_from_slice(b"\\\\"),
            _ => out.push(b),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unescape_plain() {
        assert_eq!(unescape(b"hello").unwrap(), b"hello");
        assert_eq!(unescape(b"").unwrap(), b"");
    }

    #[test]
    fn unescape_named_escapes() {
        assert_eq!(unescape(b"a\\tb").unwrap(), b"a\tb");
        assert_eq!(unescape(b"a\\nb").unwrap(), b"a\nb");
        assert_eq!(unescape(b"a\\\\b").unwrap(), b"a\\b");
        assert_eq!(unescape(b"\\b\\f\\r\\v").unwrap(), &[0x08, 0x0C, 0x0D, 0x0B]);
    }

    #[test]
    fn unescape_octal() {
        assert_eq!(unescape(b"\\101").unwrap(), b"A");
        assert_eq!(unescape(b"\\0").unwrap(), &[0x00]);
        assert_eq!(unescape(b"\\377").unwrap(), &[0xFF]);
        // A fourth digit is data, not part of the escape.
        assert_eq!(unescape(b"\\1013").unwrap(), b"A3");
    }

    #[test]
    fn unescape_rejects_bad_escape() {
        assert!(unescape(b"a\\").is_err());
        assert!(unescape(b"a\\x41").is_err());
        assert!(unescape(b"\\N").is_err());
    }

    #[test]
    fn escape_minimal() {
        let mut out = Vec::new();
        escape_into(b"a\tb\\c\n", &mut out);
        assert_eq!(out, b"a\\tb\\\\c\\n");

        out.clear();
        escape_into(b"plain", &mut out);
        assert_eq!(out, b"plain");
    }

    #[test]
    fn escape_then_unescape_identity() {
        let raw: Vec<u8> = (0u8..=255).collect();
        let mut escaped = Vec::new();
        escape_into(&raw, &mut escaped);
        assert_eq!(unescape(&escaped).unwrap(), raw);
    }
}
