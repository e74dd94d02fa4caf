use derive_more::{Display, Error};
use std::str::FromStr;

/// Which cache tiers a service instance uses.
///
/// Chosen at construction and fixed for the lifetime of the instance; a
/// caller that needs a different policy builds a separate service.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(rename_all = "lowercase"))]
pub enum CachePolicy {
    /// Every load goes to the transport.
    #[display("none")]
    None,
    /// Decoded images are kept in memory only.
    #[display("memory")]
    Memory,
    /// Images are persisted to disk, with memory as a read-through layer.
    #[default]
    #[display("disk")]
    Disk,
}

impl CachePolicy {
    pub fn uses_memory(&self) -> bool {
        matches!(self, Self::Memory | Self::Disk)
    }

    pub fn uses_disk(&self) -> bool {
        matches!(self, Self::Disk)
    }
}

#[derive(Debug, Display, Error, Clone, PartialEq, Eq)]
#[display("unknown cache policy {_0:?} (expected none, memory or disk)")]
pub struct UnknownPolicy(#[error(not(source))] pub String);

impl FromStr for CachePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(Self::None),
            "memory" => Ok(Self::Memory),
            "disk" => Ok(Self::Disk),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}
