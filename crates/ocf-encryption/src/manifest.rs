//! Resolution of parsed encryption descriptors into a per-resource manifest.
//!
//! The resolver derives the identifier keys once, classifies each descriptor's
//! key scheme, and builds an immutable lookup table keyed by resource path.
//! It performs no I/O and no decryption; the resource-loading layer looks up
//! entries here and carries out the actual crypto elsewhere.

use std::collections::HashMap;

use crate::error::EncryptionError;
use crate::keys::{decode_uuid_identifier, hash_identifier, SHA1_LEN, UUID_LEN};

/// `EncryptionMethod` algorithm URI that, together with the LCP retrieval
/// URI, marks a resource as LCP-protected.
pub const AES_256_CBC: &str = "http://www.w3.org/2001/04/xmlenc#aes256-cbc";

/// `RetrievalMethod` URI pointing at the content key inside the LCP license
/// document shipped alongside the publication.
pub const LCP_CONTENT_KEY_URI: &str = "license.lcpl#/encryption/content_key";

/// Compression sub-descriptor of one `<EncryptedData>` entry.
///
/// `Method` uses the ZIP method codes (0 = stored, 8 = deflate).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Compression {
    pub method: u32,
    pub original_length: u64,
}

/// One parsed `<EncryptedData>` entry from `META-INF/encryption.xml`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptionDescriptor {
    /// `CipherReference URI`: the path of the resource this entry covers.
    pub cipher_reference: String,
    /// `EncryptionMethod Algorithm`, kept verbatim.
    pub algorithm: String,
    /// `KeyInfo/RetrievalMethod URI`, when present.
    pub key_retrieval_uri: Option<String>,
    /// `EncryptionProperty/Compression`, when present.
    pub compression: Option<Compression>,
}

impl EncryptionDescriptor {
    /// An entry is LCP-protected only when *both* hold: its key retrieval URI
    /// points into the license document and its bulk algorithm is AES-256-CBC.
    /// A missing retrieval URI simply means "not LCP", never an error.
    pub fn is_lcp(&self) -> bool {
        self.key_retrieval_uri.as_deref() == Some(LCP_CONTENT_KEY_URI)
            && self.algorithm == AES_256_CBC
    }
}

/// Key material supplied by an LCP license document.
///
/// Acquisition and validation of the license are out of scope; both values
/// are opaque here.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcpLicense {
    pub user_key: Vec<u8>,
    pub content_key: Vec<u8>,
}

/// Publication metadata view consumed by the resolver.
///
/// OPF parsing lives elsewhere; the resolver only needs the declared
/// identifiers, in document order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackageMetadata {
    pub identifiers: Vec<String>,
}

impl PackageMetadata {
    /// Metadata declaring a single identifier, the common case.
    pub fn with_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifiers: vec![identifier.into()],
        }
    }

    /// The authoritative identifier: the first declared one.
    fn primary_identifier(&self) -> Result<&str, EncryptionError> {
        self.identifiers
            .first()
            .map(String::as_str)
            .ok_or(EncryptionError::MissingIdentifier)
    }
}

/// LCP parameters for one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LcpInfo {
    /// Bulk algorithm URI for the content, same token as the descriptor's.
    pub content_algorithm: String,
    /// Opaque user key from the license; `None` when no license was supplied
    /// at resolution time (decryption then fails downstream, by contract).
    pub user_key: Option<Vec<u8>>,
    /// Opaque content key from the license; `None` as above.
    pub content_key: Option<Vec<u8>>,
    /// ZIP compression method applied before encryption. Absent compression
    /// metadata defaults to 0, which collides with 0 as the legitimate
    /// "stored" code; consumers rely on that default, so it is preserved
    /// as-is rather than modeled as a separate "unset" state.
    pub compression_method: u32,
    /// Uncompressed length, 0 when unknown.
    pub original_length: u64,
}

/// Everything the resource loader needs to decrypt one resource.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceEncryptionInfo {
    /// `EncryptionMethod Algorithm` URI, verbatim from the descriptor.
    pub algorithm: String,
    /// SHA-1 of the publication identifier; shared by every entry.
    pub idpf_key: [u8; SHA1_LEN],
    /// Raw UUID bytes of the identifier; `None` when the identifier is not
    /// UUID-formed. Shared by every entry.
    pub adobe_key: Option<[u8; UUID_LEN]>,
    /// Present exactly when the descriptor matched the LCP scheme.
    pub lcp: Option<LcpInfo>,
}

/// Resolved encryption manifest for one publication.
///
/// Built in a single pass when the publication is opened, never mutated
/// afterward, and dropped when the publication is closed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EncryptionManifest {
    /// Identifier-derived IDPF key; `None` only for the explicit
    /// no-encryption manifest, which has no identifier input.
    pub idpf_key: Option<[u8; SHA1_LEN]>,
    /// Identifier-derived Adobe key, when the identifier is a UUID.
    pub adobe_key: Option<[u8; UUID_LEN]>,
    entries: HashMap<String, ResourceEncryptionInfo>,
}

impl EncryptionManifest {
    /// The explicit "publication carries no encryption.xml" state.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Look up the encryption info for a resource path.
    pub fn get(&self, path: &str) -> Option<&ResourceEncryptionInfo> {
        self.entries.get(path)
    }

    /// True when `path` names an encrypted resource.
    pub fn is_encrypted(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over `(resource path, info)` pairs, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ResourceEncryptionInfo)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

/// Resolve parsed encryption descriptors into a per-resource manifest.
///
/// The identifier keys are derived exactly once and shared by every entry.
/// Descriptors are processed in order; if two descriptors name the same
/// resource path, the later one silently overwrites the earlier (observed
/// reader behavior, kept as-is rather than made an error).
pub fn resolve(
    descriptors: &[EncryptionDescriptor],
    metadata: &PackageMetadata,
    license: Option<&LcpLicense>,
) -> Result<EncryptionManifest, EncryptionError> {
    let identifier = metadata.primary_identifier()?;
    let idpf_key = hash_identifier(identifier);
    let adobe_key = decode_uuid_identifier(identifier);

    let mut entries = HashMap::with_capacity(descriptors.len());
    for descriptor in descriptors {
        let lcp = descriptor.is_lcp().then(|| {
            let compression = descriptor.compression.unwrap_or(Compression {
                method: 0,
                original_length: 0,
            });
            LcpInfo {
                content_algorithm: descriptor.algorithm.clone(),
                user_key: license.map(|l| l.user_key.clone()),
                content_key: license.map(|l| l.content_key.clone()),
                compression_method: compression.method,
                original_length: compression.original_length,
            }
        });

        entries.insert(
            descriptor.cipher_reference.clone(),
            ResourceEncryptionInfo {
                algorithm: descriptor.algorithm.clone(),
                idpf_key,
                adobe_key,
                lcp,
            },
        );
    }

    Ok(EncryptionManifest {
        idpf_key: Some(idpf_key),
        adobe_key,
        entries,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID_ID: &str = "urn:uuid:12345678-1234-1234-1234-123456789abc";

    fn descriptor(path: &str, algorithm: &str) -> EncryptionDescriptor {
        EncryptionDescriptor {
            cipher_reference: path.to_string(),
            algorithm: algorithm.to_string(),
            key_retrieval_uri: None,
            compression: None,
        }
    }

    fn lcp_descriptor(path: &str) -> EncryptionDescriptor {
        EncryptionDescriptor {
            key_retrieval_uri: Some(LCP_CONTENT_KEY_URI.to_string()),
            ..descriptor(path, AES_256_CBC)
        }
    }

    fn license() -> LcpLicense {
        LcpLicense {
            user_key: b"U".to_vec(),
            content_key: b"C".to_vec(),
        }
    }

    #[test]
    fn empty_descriptor_list_still_derives_keys() {
        let manifest = resolve(&[], &PackageMetadata::with_identifier(UUID_ID), None)
            .expect("resolve");
        assert!(manifest.is_empty());
        assert_eq!(manifest.idpf_key, Some(hash_identifier(UUID_ID)));
        assert_eq!(manifest.adobe_key, decode_uuid_identifier(UUID_ID));
        assert!(manifest.adobe_key.is_some());
    }

    #[test]
    fn missing_identifier_fails() {
        let err = resolve(&[], &PackageMetadata::default(), None).unwrap_err();
        assert_eq!(err, EncryptionError::MissingIdentifier);
    }

    #[test]
    fn first_declared_identifier_is_authoritative() {
        let metadata = PackageMetadata {
            identifiers: vec![UUID_ID.to_string(), "urn:isbn:9780000000001".to_string()],
        };
        let manifest = resolve(&[], &metadata, None).expect("resolve");
        assert_eq!(manifest.idpf_key, Some(hash_identifier(UUID_ID)));
    }

    #[test]
    fn non_uuid_identifier_yields_no_adobe_key() {
        let manifest = resolve(
            &[descriptor("chapter1.html", AES_256_CBC)],
            &PackageMetadata::with_identifier("urn:isbn:9780000000001"),
            None,
        )
        .expect("resolve");
        assert_eq!(manifest.adobe_key, None);
        let info = manifest.get("chapter1.html").expect("entry");
        assert_eq!(info.adobe_key, None);
        assert_eq!(info.idpf_key.len(), 20);
    }

    #[test]
    fn shared_keys_are_identical_across_entries() {
        let manifest = resolve(
            &[
                descriptor("a.html", AES_256_CBC),
                descriptor("b.html", "http://www.w3.org/2001/04/xmlenc#aes128-cbc"),
            ],
            &PackageMetadata::with_identifier(UUID_ID),
            None,
        )
        .expect("resolve");
        let a = manifest.get("a.html").expect("a");
        let b = manifest.get("b.html").expect("b");
        assert_eq!(a.idpf_key, b.idpf_key);
        assert_eq!(a.adobe_key, b.adobe_key);
    }

    #[test]
    fn lcp_requires_both_retrieval_uri_and_algorithm() {
        // Retrieval URI alone is not enough.
        let wrong_algorithm = EncryptionDescriptor {
            algorithm: "http://www.w3.org/2001/04/xmlenc#aes128-cbc".to_string(),
            ..lcp_descriptor("a.html")
        };
        // AES-256-CBC alone is not enough either.
        let no_retrieval = descriptor("b.html", AES_256_CBC);

        let manifest = resolve(
            &[wrong_algorithm, no_retrieval, lcp_descriptor("c.html")],
            &PackageMetadata::with_identifier(UUID_ID),
            Some(&license()),
        )
        .expect("resolve");

        assert!(manifest.get("a.html").expect("a").lcp.is_none());
        assert!(manifest.get("b.html").expect("b").lcp.is_none());
        assert!(manifest.get("c.html").expect("c").lcp.is_some());
    }

    #[test]
    fn lcp_entry_carries_license_keys() {
        let manifest = resolve(
            &[lcp_descriptor("chapter1.html")],
            &PackageMetadata::with_identifier(UUID_ID),
            Some(&license()),
        )
        .expect("resolve");
        let lcp = manifest
            .get("chapter1.html")
            .expect("entry")
            .lcp
            .as_ref()
            .expect("lcp");
        assert_eq!(lcp.content_algorithm, AES_256_CBC);
        assert_eq!(lcp.user_key.as_deref(), Some(b"U".as_slice()));
        assert_eq!(lcp.content_key.as_deref(), Some(b"C".as_slice()));
    }

    #[test]
    fn lcp_without_license_leaves_keys_absent() {
        let manifest = resolve(
            &[lcp_descriptor("chapter1.html")],
            &PackageMetadata::with_identifier(UUID_ID),
            None,
        )
        .expect("resolve");
        let lcp = manifest
            .get("chapter1.html")
            .expect("entry")
            .lcp
            .as_ref()
            .expect("lcp");
        assert_eq!(lcp.user_key, None);
        assert_eq!(lcp.content_key, None);
    }

    #[test]
    fn compression_defaults_to_stored_and_unknown_length() {
        let manifest = resolve(
            &[lcp_descriptor("a.html")],
            &PackageMetadata::with_identifier(UUID_ID),
            Some(&license()),
        )
        .expect("resolve");
        let lcp = manifest.get("a.html").expect("a").lcp.as_ref().expect("lcp");
        assert_eq!(lcp.compression_method, 0);
        assert_eq!(lcp.original_length, 0);
    }

    #[test]
    fn compression_descriptor_is_carried_through() {
        let with_compression = EncryptionDescriptor {
            compression: Some(Compression {
                method: 8,
                original_length: 4096,
            }),
            ..lcp_descriptor("a.html")
        };
        let manifest = resolve(
            &[with_compression],
            &PackageMetadata::with_identifier(UUID_ID),
            Some(&license()),
        )
        .expect("resolve");
        let lcp = manifest.get("a.html").expect("a").lcp.as_ref().expect("lcp");
        assert_eq!(lcp.compression_method, 8);
        assert_eq!(lcp.original_length, 4096);
    }

    #[test]
    fn duplicate_paths_keep_the_later_descriptor() {
        let manifest = resolve(
            &[descriptor("a.html", AES_256_CBC), lcp_descriptor("a.html")],
            &PackageMetadata::with_identifier(UUID_ID),
            Some(&license()),
        )
        .expect("resolve");
        assert_eq!(manifest.len(), 1);
        assert!(manifest.get("a.html").expect("a").lcp.is_some());
    }

    #[test]
    fn resolution_is_idempotent() {
        let descriptors = [lcp_descriptor("a.html"), descriptor("b.html", AES_256_CBC)];
        let metadata = PackageMetadata::with_identifier(UUID_ID);
        let lic = license();
        let first = resolve(&descriptors, &metadata, Some(&lic)).expect("resolve");
        let second = resolve(&descriptors, &metadata, Some(&lic)).expect("resolve");
        assert_eq!(first, second);
    }

    #[test]
    fn empty_manifest_has_no_keys_and_no_entries() {
        let manifest = EncryptionManifest::empty();
        assert!(manifest.is_empty());
        assert_eq!(manifest.idpf_key, None);
        assert_eq!(manifest.adobe_key, None);
        assert!(!manifest.is_encrypted("anything.html"));
    }
}
