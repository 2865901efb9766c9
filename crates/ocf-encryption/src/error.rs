use thiserror::Error;

/// Errors returned by this crate.
///
/// The key-derivation functions are total and never fail; errors arise only
/// from structurally invalid input documents or metadata. No partial manifest
/// is ever returned alongside an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncryptionError {
    /// The package metadata declares no identifier at all.
    #[error("package metadata declares no identifier")]
    MissingIdentifier,
    /// The encryption document is not well-formed XML (or not valid UTF-8).
    #[error("malformed encryption document: {context}")]
    MalformedDocument { context: &'static str },
    /// An `<EncryptedData>` entry has no `<CipherReference URI="...">`.
    #[error("EncryptedData entry {index}: missing CipherReference URI")]
    MissingCipherReference { index: usize },
    /// An `<EncryptedData>` entry has no `<EncryptionMethod Algorithm="...">`.
    #[error("EncryptedData entry {index}: missing EncryptionMethod algorithm")]
    MissingAlgorithm { index: usize },
    /// An attribute was present but could not be parsed (e.g. a non-numeric
    /// `Compression Method`).
    #[error("EncryptedData entry {index}: invalid {attribute} attribute")]
    InvalidAttribute {
        index: usize,
        attribute: &'static str,
    },
}
