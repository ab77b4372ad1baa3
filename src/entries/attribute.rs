//! Store-level key/value attributes (schema flags, upgrade markers)

use serde::{Deserialize, Serialize};

use super::codec::{Decoder, Encoder};
use super::errors::CodecResult;
use super::{EntityKind, Entry};

/// Attribute recording that clusters carry the file/block flags
pub const DB_CLUSTER_HAS_FILE_BLOCK_FLAG: &str = "DB_CLUSTER_HAS_FILE_BLOCK_FLAG";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DbAttributeEntry {
    /// Attribute name, doubles as the identifier
    pub key: String,
    pub value: String,
}

impl DbAttributeEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Entry for DbAttributeEntry {
    const KIND: EntityKind = EntityKind::DbAttribute;

    fn id(&self) -> &str {
        &self.key
    }

    fn encode_body(&self, enc: &mut Encoder) {
        enc.put_str(&self.key);
        enc.put_str(&self.value);
    }

    fn decode_body(dec: &mut Decoder<'_>) -> CodecResult<Self> {
        Ok(Self {
            key: dec.get_string("key")?,
            value: dec.get_string("value")?,
        })
    }
}
