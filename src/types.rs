//! Common types used throughout stream-harvest
//!
//! This module contains shared type definitions and small utility types
//! used across multiple modules.

use serde::{Deserialize, Serialize};

// ============================================================================
// Backoff Type
// ============================================================================

/// Type of backoff between reconnects after a transient failure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackoffType {
    /// Constant delay between retries
    Constant,
    /// Linear increase in delay
    Linear,
    /// Exponential increase in delay
    #[default]
    Exponential,
}

// ============================================================================
// Record Error Policy
// ============================================================================

/// What to do with a streamed line that cannot be turned into a row
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum RecordErrorPolicy {
    /// Abort the run on the first malformed record
    #[default]
    Fail,
    /// Log the malformed record and keep reading
    Skip,
}

// ============================================================================
// Attempt Limit
// ============================================================================

/// Ceiling on the number of connection attempts in one run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AttemptLimit {
    /// Stop after this many attempts
    Bounded(u64),
    /// Keep reconnecting until cancelled or a fatal error occurs
    #[default]
    Unbounded,
}

impl AttemptLimit {
    /// Build a limit from an optional maximum (`None` = unbounded)
    pub fn from_max(max: Option<u64>) -> Self {
        max.map_or(Self::Unbounded, Self::Bounded)
    }

    /// Whether another attempt may start after `made` attempts
    pub fn allows(&self, made: u64) -> bool {
        match self {
            Self::Bounded(max) => made < *max,
            Self::Unbounded => true,
        }
    }

    /// The maximum number of attempts, if bounded
    pub fn max(&self) -> Option<u64> {
        match self {
            Self::Bounded(max) => Some(*max),
            Self::Unbounded => None,
        }
    }
}

impl std::fmt::Display for AttemptLimit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded(max) => write!(f, "{max}"),
            Self::Unbounded => f.write_str("unbounded"),
        }
    }
}
