//! Persisted object identifiers.
//!
//! An [`ObjectId`] is the server-assigned 128-bit identifier of a persisted
//! object. Client code treats it as opaque: equality, ordering for
//! deterministic output, and uuid-style text formatting are the whole
//! surface.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ParseIdError;

/// A 128-bit persisted object identifier.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ObjectId([u8; 16]);

impl ObjectId {
    pub const fn from_bytes(bytes: [u8; 16]) -> Self {
        ObjectId(bytes)
    }

    pub const fn from_u128(value: u128) -> Self {
        ObjectId(value.to_be_bytes())
    }

    pub const fn to_bytes(self) -> [u8; 16] {
        self.0
    }

    pub const fn as_u128(self) -> u128 {
        u128::from_be_bytes(self.0)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7], b[8], b[9], b[10], b[11], b[12],
            b[13], b[14], b[15]
        )
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({})", self)
    }
}

impl FromStr for ObjectId {
    type Err = ParseIdError;

    /// Parses the hyphenated 8-4-4-4-12 form or 32 plain hex digits.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let compact: String = s.chars().filter(|&c| c != '-').collect();
        if !compact.is_ascii() || compact.len() != 32 {
            return Err(ParseIdError {
                input: s.to_string(),
            });
        }
        if s.contains('-') {
            let parts: Vec<&str> = s.split('-').collect();
            let lens: Vec<usize> = parts.iter().map(|p| p.len()).collect();
            if lens != [8, 4, 4, 4, 12] {
                return Err(ParseIdError {
                    input: s.to_string(),
                });
            }
        }
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            let pair = &compact[i * 2..i * 2 + 2];
            *byte = u8::from_str_radix(pair, 16).map_err(|_| ParseIdError {
                input: s.to_string(),
            })?;
        }
        Ok(ObjectId(bytes))
    }
}
