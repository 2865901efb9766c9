//! Identifier-derived DRM keys.
//!
//! Two legacy schemes derive their key material from the publication's unique
//! identifier alone:
//! - IDPF font/resource obfuscation hashes the identifier with SHA-1.
//! - Adobe's scheme uses the raw 16 bytes of a UUID-form identifier.
//!
//! Both derivations are pure functions of the identifier string. Callers are
//! expected to pass the already-normalized primary identifier; picking which
//! declared identifier is authoritative happens at the resolver boundary.

use sha1::{Digest as _, Sha1};

pub(crate) const SHA1_LEN: usize = 20;
pub(crate) const UUID_LEN: usize = 16;

const URN_UUID_PREFIX: &str = "urn:uuid:";

/// Length of each hyphen-separated group in a canonical UUID.
const UUID_GROUPS: [usize; 5] = [8, 4, 4, 4, 12];

/// SHA-1 digest of the identifier's UTF-8 bytes (the IDPF key).
///
/// Total: any string, including the empty string, produces exactly 20 bytes.
pub fn hash_identifier(identifier: &str) -> [u8; SHA1_LEN] {
    Sha1::digest(identifier.as_bytes()).into()
}

/// Decode a UUID-form identifier into its raw 16 bytes (the Adobe key).
///
/// Accepts an optional case-insensitive `urn:uuid:` prefix; the remainder must
/// be exactly five case-insensitive hex groups of lengths 8-4-4-4-12. Any
/// surrounding characters fail the match. Non-UUID identifiers are a normal,
/// expected input and simply yield `None`.
pub fn decode_uuid_identifier(identifier: &str) -> Option<[u8; UUID_LEN]> {
    let rest = strip_prefix_ignore_case(identifier, URN_UUID_PREFIX).unwrap_or(identifier);

    let mut hex = [0u8; UUID_LEN * 2];
    let mut written = 0;
    let mut groups = rest.split('-');
    for expected_len in UUID_GROUPS {
        let group = groups.next()?;
        if group.len() != expected_len || !group.bytes().all(|b| b.is_ascii_hexdigit()) {
            return None;
        }
        hex[written..written + expected_len].copy_from_slice(group.as_bytes());
        written += expected_len;
    }
    if groups.next().is_some() || written != UUID_LEN * 2 {
        return None;
    }

    let mut out = [0u8; UUID_LEN];
    for (i, byte) in out.iter_mut().enumerate() {
        *byte = (hex_val(hex[2 * i]) << 4) | hex_val(hex[2 * i + 1]);
    }
    Some(out)
}

fn strip_prefix_ignore_case<'a>(s: &'a str, prefix: &str) -> Option<&'a str> {
    let head = s.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &s[prefix.len()..])
}

/// Value of a single hex digit. Callers must have validated the digit.
fn hex_val(b: u8) -> u8 {
    match b {
        b'0'..=b'9' => b - b'0',
        b'a'..=b'f' => b - b'a' + 10,
        b'A'..=b'F' => b - b'A' + 10,
        _ => unreachable!("caller validated ascii hex digit"),
    }
}
