// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Bundle payload encoding and chunking

use crate::error::Result;
use crate::registry::TypeSet;
use crate::types::ManifestObject;
use sha2::{Digest, Sha256};

const DOCUMENT_SEPARATOR: &str = "---\n";
const DIGEST_CHARS: usize = 10;

/// Ordered, encoded objects of one bundle
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BundlePayload {
    documents: Vec<String>,
}

impl BundlePayload {
    pub fn documents(&self) -> &[String] {
        &self.documents
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// All documents, each introduced by a `---` separator line
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::new();
        for document in &self.documents {
            bytes.extend_from_slice(DOCUMENT_SEPARATOR.as_bytes());
            bytes.extend_from_slice(document.as_bytes());
        }
        bytes
    }

    /// Short hex SHA-256 of the encoded payload
    pub fn digest(&self) -> String {
        let hash = format!("{:x}", Sha256::digest(self.to_bytes()));
        hash[..DIGEST_CHARS].to_string()
    }
}

/// Encode `objects` in order with the codec of `types`.
///
/// Fails with an encoding error naming the first object whose kind is not in
/// the set.
pub fn serialize(types: &TypeSet, objects: &[ManifestObject]) -> Result<BundlePayload> {
    let codec = types.codec();
    let documents = objects
        .iter()
        .map(|object| codec.encode(object))
        .collect::<Result<Vec<_>>>()?;
    Ok(BundlePayload { documents })
}

/// Split `bytes` into chunks of at most `max_chunk_bytes`; there is always at
/// least one chunk, possibly empty
pub fn split_chunks(bytes: &[u8], max_chunk_bytes: usize) -> Vec<Vec<u8>> {
    if bytes.is_empty() {
        return vec![Vec::new()];
    }
    bytes
        .chunks(max_chunk_bytes.max(1))
        .map(<[u8]>::to_vec)
        .collect()
}
