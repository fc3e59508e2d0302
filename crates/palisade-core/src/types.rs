//! Core type definitions for Palisade.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unix timestamp in seconds. The engine never reads a clock; every
/// operation takes its timestamp from the caller.
pub type Timestamp = u64;

/// Lending pool identifier (one pool per underlying asset).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PoolId(pub String);

impl PoolId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PoolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Priced asset identifier (underlying or collateral).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AssetId(pub String);

impl AssetId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Account that owns positions and collateral.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OwnerId(pub String);

impl OwnerId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Collateral class. Risk parameters (LTV, threshold, haircut, penalty) are
/// bundled per tier in configuration, never branched on by string.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CollateralTier {
    /// Liquid on-exchange assets.
    Crypto,
    /// Tokenized real-world assets.
    Rwa,
    /// Receivable-like paper with the deepest haircut.
    Receivable,
}

impl CollateralTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Crypto => "crypto",
            Self::Rwa => "rwa",
            Self::Receivable => "receivable",
        }
    }
}

impl fmt::Display for CollateralTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Borrower credit tier derived from the composite score (0-1000).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditTier {
    Diamond,
    Gold,
    Silver,
    Bronze,
    Unrated,
}

impl CreditTier {
    /// Tier boundaries on the composite score.
    pub fn from_score(score: u16) -> Self {
        match score {
            900..=1000 => Self::Diamond,
            750..=899 => Self::Gold,
            600..=749 => Self::Silver,
            400..=599 => Self::Bronze,
            _ => Self::Unrated,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Diamond => "diamond",
            Self::Gold => "gold",
            Self::Silver => "silver",
            Self::Bronze => "bronze",
            Self::Unrated => "unrated",
        }
    }
}

impl fmt::Display for CreditTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_tier_from_score() {
        assert_eq!(CreditTier::from_score(1000), CreditTier::Diamond);
        assert_eq!(CreditTier::from_score(900), CreditTier::Diamond);
        assert_eq!(CreditTier::from_score(899), CreditTier::Gold);
        assert_eq!(CreditTier::from_score(600), CreditTier::Silver);
        assert_eq!(CreditTier::from_score(599), CreditTier::Bronze);
        assert_eq!(CreditTier::from_score(0), CreditTier::Unrated);
    }

    #[test]
    fn test_id_display() {
        assert_eq!(PoolId::new("usdc").to_string(), "usdc");
        assert_eq!(AssetId::new("wbtc").as_str(), "wbtc");
        assert_eq!(OwnerId::new("alice").to_string(), "alice");
    }

    #[test]
    fn test_tier_serde_names() {
        let json = serde_json::to_string(&CollateralTier::Receivable).unwrap();
        assert_eq!(json, "\"receivable\"");
        let tier: CreditTier = serde_json::from_str("\"diamond\"").unwrap();
        assert_eq!(tier, CreditTier::Diamond);
    }
}
