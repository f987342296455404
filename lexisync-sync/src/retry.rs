//! Per-error-category retry policy.
//!
//! Turns transient failures into scheduled retries: each category carries
//! its own attempt ceiling, backoff curve and cap. Authentication errors
//! get one attempt and are otherwise handled by the reauth path, never by
//! blind retry.

use crate::error::SyncError;
use rand::Rng;
use std::time::Duration;

/// Minimum delay regardless of jitter.
const DELAY_FLOOR: Duration = Duration::from_millis(100);

/// Retry categories, in the taxonomy of the error handling design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Connectivity and transient server trouble.
    Network,
    /// Malformed or integrity-failing data.
    Data,
    /// Local system trouble: storage, timeouts, exhausted resources.
    System,
    /// Authentication and other user-actionable failures.
    User,
}

/// Backoff policy for one category.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base: Duration,
    pub multiplier: f64,
    pub cap: Duration,
    pub jitter: bool,
    /// Backoff stops growing after this many doublings (`None` = grows
    /// until the cap takes over).
    pub growth_limit: Option<u32>,
}

impl RetryPolicy {
    const NETWORK: Self = Self {
        max_attempts: 5,
        base: Duration::from_secs(1),
        multiplier: 2.0,
        cap: Duration::from_secs(30),
        jitter: true,
        growth_limit: None,
    };

    const DATA: Self = Self {
        max_attempts: 3,
        base: Duration::from_secs(2),
        multiplier: 1.5,
        cap: Duration::from_secs(15),
        jitter: false,
        growth_limit: None,
    };

    const SYSTEM: Self = Self {
        max_attempts: 2,
        base: Duration::from_secs(5),
        multiplier: 2.0,
        cap: Duration::from_secs(20),
        jitter: false,
        growth_limit: Some(1),
    };

    const USER: Self = Self {
        max_attempts: 1,
        base: Duration::from_secs(1),
        multiplier: 1.0,
        cap: Duration::from_secs(1),
        jitter: false,
        growth_limit: Some(0),
    };
}

/// Classifies errors and computes retry delays.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetryClassifier;

impl RetryClassifier {
    /// Creates a classifier with the standard category table.
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// The category an error falls into.
    #[must_use]
    pub fn classify(&self, error: &SyncError) -> ErrorCategory {
        match error {
            SyncError::Connectivity(_) | SyncError::Protocol(_) => ErrorCategory::Network,
            SyncError::DataIntegrity(_)
            | SyncError::Serialization(_)
            | SyncError::Conflict(_) => ErrorCategory::Data,
            SyncError::Timeout
            | SyncError::Storage(_)
            | SyncError::ResourceExhausted(_) => ErrorCategory::System,
            SyncError::Auth(_) => ErrorCategory::User,
        }
    }

    /// The policy for a category.
    #[must_use]
    pub fn policy(&self, category: ErrorCategory) -> RetryPolicy {
        match category {
            ErrorCategory::Network => RetryPolicy::NETWORK,
            ErrorCategory::Data => RetryPolicy::DATA,
            ErrorCategory::System => RetryPolicy::SYSTEM,
            ErrorCategory::User => RetryPolicy::USER,
        }
    }

    /// Whether `error` should be retried as attempt number `attempt`
    /// (1-based). Network-category errors additionally require a connected
    /// device and a message not flagged critical/fatal.
    #[must_use]
    pub fn is_retryable(&self, error: &SyncError, attempt: u32, connected: bool) -> bool {
        let category = self.classify(error);
        let policy = self.policy(category);
        if attempt > policy.max_attempts {
            return false;
        }
        if category == ErrorCategory::Network && (!connected || error.is_critical()) {
            return false;
        }
        if category == ErrorCategory::User {
            // Auth problems go through the reauth path, not retry.
            return !error.is_auth() && attempt <= policy.max_attempts;
        }
        true
    }

    /// Delay before `attempt` (1-based):
    /// `min(base × multiplier^(attempt-1), cap)`, jittered ±20% where the
    /// category allows, floored at 100 ms.
    #[must_use]
    pub fn delay(&self, category: ErrorCategory, attempt: u32) -> Duration {
        let policy = self.policy(category);
        let mut exponent = attempt.saturating_sub(1);
        if let Some(limit) = policy.growth_limit {
            exponent = exponent.min(limit);
        }
        let raw = policy.base.as_millis() as f64 * policy.multiplier.powi(exponent as i32);
        let capped = raw.min(policy.cap.as_millis() as f64);

        let jittered = if policy.jitter {
            let factor = rand::thread_rng().gen_range(0.8..=1.2);
            capped * factor
        } else {
            capped
        };

        Duration::from_millis(jittered as u64).max(DELAY_FLOOR)
    }
}
