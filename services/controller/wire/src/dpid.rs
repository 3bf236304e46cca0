//! Datapath identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 64-bit datapath id that uniquely identifies a switch.
///
/// The canonical text form is eight lowercase colon-separated octets
/// (`00:00:aa:bb:cc:dd:ee:01`). Parsing also accepts six-octet hardware
/// addresses, upper case, and `-` separators, so differently spelled ids for
/// the same switch normalize to one registry key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatapathId(pub u64);

impl DatapathId {
    /// Raw 64-bit value
    pub fn as_u64(self) -> u64 {
        self.0
    }

    /// Big-endian octets
    pub fn octets(self) -> [u8; 8] {
        self.0.to_be_bytes()
    }
}

impl From<u64> for DatapathId {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl fmt::Display for DatapathId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let o = self.octets();
        write!(
            f,
            "{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}:{:02x}",
            o[0], o[1], o[2], o[3], o[4], o[5], o[6], o[7]
        )
    }
}

impl FromStr for DatapathId {
    type Err = crate::WireError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.trim().split(|c| c == ':' || c == '-').collect();
        if parts.len() != 6 && parts.len() != 8 {
            return Err(crate::WireError::DatapathId(s.to_string()));
        }

        let mut value = 0u64;
        for part in parts {
            if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_hexdigit()) {
                return Err(crate::WireError::DatapathId(s.to_string()));
            }
            let octet = u8::from_str_radix(part, 16)
                .map_err(|_| crate::WireError::DatapathId(s.to_string()))?;
            value = (value << 8) | octet as u64;
        }

        Ok(Self(value))
    }
}
