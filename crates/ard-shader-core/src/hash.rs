use std::{fmt, str::FromStr};

use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use thiserror::Error;
use xxhash_rust::xxh3::xxh3_64;

/// Stable hash of a blob of shader text. The value does not depend on the process, the platform,
/// or the Rust version, so it is safe to persist.
///
/// Serialized as a 16 digit hexadecimal string.
#[derive(Default, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentHash(u64);

#[derive(Debug, Error)]
#[error("`{0}` is not a valid content hash")]
pub struct ParseContentHashError(String);

impl ContentHash {
    #[inline]
    pub fn of(bytes: impl AsRef<[u8]>) -> Self {
        ContentHash(xxh3_64(bytes.as_ref()))
    }

    #[inline(always)]
    pub const fn from_raw(value: u64) -> Self {
        ContentHash(value)
    }

    #[inline(always)]
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

impl fmt::Debug for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentHash({:016x})", self.0)
    }
}

impl FromStr for ContentHash {
    type Err = ParseContentHashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        u64::from_str_radix(s, 16)
            .map(ContentHash)
            .map_err(|_| ParseContentHashError(s.to_owned()))
    }
}

impl Serialize for ContentHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for ContentHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(de::Error::custom)
    }
}
