//! Parsing of `META-INF/encryption.xml` into encryption descriptors.
//!
//! The document is XML-ENC shaped: an `<encryption>` root holding one
//! `<EncryptedData>` element per protected resource. Producers disagree on
//! namespace prefixes (`enc:`, `ds:`, none), so elements and attributes are
//! matched by local name only.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::EncryptionError;
use crate::manifest::{Compression, EncryptionDescriptor};

/// One `<EncryptedData>` entry being accumulated, before the required fields
/// have been checked.
#[derive(Default)]
struct PendingDescriptor {
    index: usize,
    cipher_reference: Option<String>,
    algorithm: Option<String>,
    key_retrieval_uri: Option<String>,
    compression_method: Option<u32>,
    original_length: Option<u64>,
}

impl PendingDescriptor {
    fn finish(self) -> Result<EncryptionDescriptor, EncryptionError> {
        let index = self.index;
        let compression = self.compression_method.map(|method| Compression {
            method,
            original_length: self.original_length.unwrap_or(0),
        });
        Ok(EncryptionDescriptor {
            cipher_reference: self
                .cipher_reference
                .ok_or(EncryptionError::MissingCipherReference { index })?,
            algorithm: self
                .algorithm
                .ok_or(EncryptionError::MissingAlgorithm { index })?,
            key_retrieval_uri: self.key_retrieval_uri,
            compression,
        })
    }
}

/// Parse an encryption document into its descriptor list, in document order.
///
/// A document with no `<EncryptedData>` entries is valid and yields an empty
/// list (a publication whose encryption.xml protects nothing). Entries missing
/// their cipher reference or algorithm fail fast, identified by entry index.
pub fn parse_encryption_document(
    xml: &[u8],
) -> Result<Vec<EncryptionDescriptor>, EncryptionError> {
    let xml = std::str::from_utf8(xml).map_err(|_| EncryptionError::MalformedDocument {
        context: "encryption.xml is not valid UTF-8",
    })?;

    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();
    let mut descriptors = Vec::new();
    let mut pending: Option<PendingDescriptor> = None;
    let mut next_index = 0usize;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|_| EncryptionError::MalformedDocument {
                context: "encryption.xml is not well-formed XML",
            })?;

        match event {
            Event::Start(e) => {
                if e.local_name().as_ref() == b"EncryptedData" {
                    pending = Some(PendingDescriptor {
                        index: next_index,
                        ..PendingDescriptor::default()
                    });
                    next_index += 1;
                } else if let Some(p) = pending.as_mut() {
                    read_entry_element(p, &e)?;
                }
            }
            Event::Empty(e) => {
                if e.local_name().as_ref() == b"EncryptedData" {
                    // Self-closing entry: nothing inside it, so the required
                    // fields are necessarily missing.
                    let empty = PendingDescriptor {
                        index: next_index,
                        ..PendingDescriptor::default()
                    };
                    next_index += 1;
                    descriptors.push(empty.finish()?);
                } else if let Some(p) = pending.as_mut() {
                    read_entry_element(p, &e)?;
                }
            }
            Event::End(e) => {
                if e.local_name().as_ref() == b"EncryptedData" {
                    if let Some(p) = pending.take() {
                        descriptors.push(p.finish()?);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }

        buf.clear();
    }

    Ok(descriptors)
}

fn read_entry_element(
    pending: &mut PendingDescriptor,
    e: &BytesStart<'_>,
) -> Result<(), EncryptionError> {
    match e.local_name().as_ref() {
        b"EncryptionMethod" => {
            if let Some(value) = attr_string(pending.index, e, b"Algorithm")? {
                pending.algorithm = Some(value);
            }
        }
        b"RetrievalMethod" => {
            if let Some(value) = attr_string(pending.index, e, b"URI")? {
                pending.key_retrieval_uri = Some(value);
            }
        }
        b"CipherReference" => {
            if let Some(value) = attr_string(pending.index, e, b"URI")? {
                pending.cipher_reference = Some(value);
            }
        }
        b"Compression" => {
            let method = attr_string(pending.index, e, b"Method")?;
            let length = attr_string(pending.index, e, b"OriginalLength")?;
            pending.compression_method = Some(parse_decimal(
                pending.index,
                method,
                "Compression Method",
            )?);
            pending.original_length = Some(parse_decimal(
                pending.index,
                length,
                "Compression OriginalLength",
            )?);
        }
        _ => {}
    }
    Ok(())
}

/// Read one attribute by local name, as a string. `Ok(None)` when absent.
fn attr_string(
    index: usize,
    e: &BytesStart<'_>,
    name: &[u8],
) -> Result<Option<String>, EncryptionError> {
    for attr in e.attributes().with_checks(false) {
        let attr = attr.map_err(|_| EncryptionError::MalformedDocument {
            context: "invalid XML attribute",
        })?;
        if local_name(attr.key.as_ref()) != name {
            continue;
        }
        let value =
            std::str::from_utf8(attr.value.as_ref()).map_err(|_| EncryptionError::InvalidAttribute {
                index,
                attribute: "non-UTF-8",
            })?;
        return Ok(Some(value.to_string()));
    }
    Ok(None)
}

fn parse_decimal<T: std::str::FromStr>(
    index: usize,
    value: Option<String>,
    attribute: &'static str,
) -> Result<T, EncryptionError> {
    let missing = EncryptionError::InvalidAttribute { index, attribute };
    value
        .ok_or(missing.clone())?
        .trim()
        .parse::<T>()
        .map_err(|_| missing)
}

fn local_name(name: &[u8]) -> &[u8] {
    name.iter()
        .rposition(|b| *b == b':')
        .map(|idx| &name[idx + 1..])
        .unwrap_or(name)
}
