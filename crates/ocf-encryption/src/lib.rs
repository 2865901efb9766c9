//! OCF (EPUB) `META-INF/encryption.xml` resolution and DRM key derivation.
//!
//! This crate supports:
//! - Parsing the XML-ENC shaped encryption document into per-resource descriptors
//! - Deriving the identifier-based keys (IDPF SHA-1 key, Adobe raw-UUID key)
//! - Classifying LCP-protected resources and attaching license key material
//!
//! The output is a lookup table from resource path to the metadata a resource
//! loader needs for decryption. The decryption itself, license validation, and
//! all container I/O live elsewhere.

mod error;
mod keys;
mod manifest;
mod xml;

pub use crate::error::EncryptionError;
pub use crate::keys::{decode_uuid_identifier, hash_identifier};
pub use crate::manifest::{
    resolve, Compression, EncryptionDescriptor, EncryptionManifest, LcpInfo, LcpLicense,
    PackageMetadata, ResourceEncryptionInfo, AES_256_CBC, LCP_CONTENT_KEY_URI,
};
pub use crate::xml::parse_encryption_document;

/// Parse an encryption document and resolve it in one step.
///
/// This is the path a publication reader takes when opening a container that
/// carries a `META-INF/encryption.xml`. Containers without one should use
/// [`EncryptionManifest::empty`] instead.
pub fn resolve_encryption_document(
    xml: &[u8],
    metadata: &PackageMetadata,
    license: Option<&LcpLicense>,
) -> Result<EncryptionManifest, EncryptionError> {
    let descriptors = parse_encryption_document(xml)?;
    resolve(&descriptors, metadata, license)
}
