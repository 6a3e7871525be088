use tokio::time::Instant;

use serde::{Deserialize, Serialize};

pub type CredentialId = i64;

#[derive(Debug, Clone)]
pub enum CredentialState {
    Active,
    Unavailable {
        until: Instant,
        reason: UnavailableReason,
    },
}

impl CredentialState {
    pub fn is_active(&self) -> bool {
        matches!(self, CredentialState::Active)
    }

    pub fn unavailable_until(&self) -> Option<Instant> {
        match self {
            CredentialState::Unavailable { until, .. } => Some(*until),
            CredentialState::Active => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum UnavailableReason {
    RateLimit,
    Timeout,
    Upstream5xx,
    AuthInvalid,
    /// 402 Payment Required / quota exhausted: long cooldown, same bucket as RateLimit
    /// for fallback purposes but tracked separately for operator visibility.
    Quota,
    ModelDisallow,
    Manual,
    Unknown,
}

impl UnavailableReason {
    /// Whether this reason participates in the exponential backoff ladder
    /// (base * 2^backoff_level, capped at 1h) rather than a fixed cooldown.
    pub fn is_backoff_eligible(self) -> bool {
        matches!(self, UnavailableReason::RateLimit)
    }
}
