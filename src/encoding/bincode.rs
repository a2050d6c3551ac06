//! Bincode is used for the binary plan encoding. It is a compact,
//! non-self-describing format, so both ends must agree on the schema.
//!
//! We use the variable-length integer encoding, which keeps small integers
//! (e.g. column indexes and function anchors) short. The default bincode
//! configuration is not used, since the top-level helpers use fixed-width
//! integers instead.

use bincode::Options as _;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Returns the Bincode options used for all encodings.
fn bincode() -> impl bincode::Options {
    bincode::DefaultOptions::new().with_varint_encoding()
}

/// Serializes a value using Bincode.
pub fn serialize<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode().serialize(value)?)
}

/// Deserializes a value using Bincode. Trailing bytes are an error.
pub fn deserialize<'de, T: Deserialize<'de>>(bytes: &'de [u8]) -> Result<T> {
    Ok(bincode().deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Record {
        id: u64,
        name: String,
        values: Vec<Option<i64>>,
    }

    #[test]
    fn roundtrip() -> Result<()> {
        let record = Record { id: 7, name: "lineitem".into(), values: vec![Some(-1), None] };
        let bytes = serialize(&record)?;
        assert_eq!(deserialize::<Record>(&bytes)?, record);
        Ok(())
    }

    #[test]
    fn varint_is_compact() -> Result<()> {
        assert_eq!(serialize(&1u64)?, vec![1]);
        Ok(())
    }

    #[test]
    fn trailing_bytes_error() -> Result<()> {
        let mut bytes = serialize(&1u64)?;
        bytes.push(0);
        assert!(deserialize::<u64>(&bytes).is_err());
        Ok(())
    }
}
