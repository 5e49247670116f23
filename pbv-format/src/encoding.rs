//! Text encodings used by container entries.
//!
//! The host application stores most JSON entries as UTF-16-LE without a BOM;
//! loose `*.json` entries are plain UTF-8. Extracted files are always UTF-8,
//! so compression has to re-encode into whatever the entry used originally.

use crate::error::{PbvError, Result};

/// Byte encoding of a JSON entry inside the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    /// Plain UTF-8.
    Utf8,
    /// Little-endian UTF-16 without a byte-order mark.
    Utf16Le,
}

impl Encoding {
    /// Decode entry bytes into text. `path` is only used for error context.
    pub fn decode(&self, path: &str, bytes: &[u8]) -> Result<String> {
        match self {
            Encoding::Utf8 => String::from_utf8(bytes.to_vec()).map_err(|e| PbvError::Encoding {
                path: path.to_string(),
                reason: e.to_string(),
            }),
            Encoding::Utf16Le => {
                if bytes.len() % 2 != 0 {
                    return Err(PbvError::Encoding {
                        path: path.to_string(),
                        reason: format!("odd byte length {} for UTF-16", bytes.len()),
                    });
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|e| PbvError::Encoding {
                    path: path.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Encode text into entry bytes.
    pub fn encode(&self, text: &str) -> Vec<u8> {
        match self {
            Encoding::Utf8 => text.as_bytes().to_vec(),
            Encoding::Utf16Le => text
                .encode_utf16()
                .flat_map(|unit| unit.to_le_bytes())
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_roundtrip() {
        let text = "{\"name\": \"café ©\"}";
        let bytes = Encoding::Utf8.encode(text);
        assert_eq!(Encoding::Utf8.decode("x", &bytes).unwrap(), text);
    }

    #[test]
    fn utf16le_roundtrip() {
        let text = "{\"name\": \"café © 𝄞\"}";
        let bytes = Encoding::Utf16Le.encode(text);
        assert_eq!(bytes.len() % 2, 0);
        assert_eq!(Encoding::Utf16Le.decode("x", &bytes).unwrap(), text);
    }

    #[test]
    fn utf16le_rejects_odd_length() {
        let err = Encoding::Utf16Le.decode("DataModelSchema", &[0x7b, 0x00, 0x7d]);
        assert!(matches!(err, Err(PbvError::Encoding { .. })));
    }

    #[test]
    fn utf16le_rejects_lone_surrogate() {
        // 0xD800 is a high surrogate with no pair
        let err = Encoding::Utf16Le.decode("x", &[0x00, 0xd8]);
        assert!(matches!(err, Err(PbvError::Encoding { .. })));
    }
}
