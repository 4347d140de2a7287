//! Retry classification and backoff for node execution.

use std::time::Duration;

use rand::Rng;

use crate::node::NodeError;

/// Delay progression between retry attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum Backoff {
    /// Same delay every attempt: `base`.
    Fixed,
    /// `base * (attempt + 1)`.
    Linear,
    /// `base * 2^attempt`.
    #[default]
    Exponential,
}

/// Retry policy applied to every node of a graph.
///
/// An error is retried when its rendered message contains any of the
/// configured patterns, the attempt budget is not exhausted, and the error
/// is neither an interrupt nor a cancellation. A node gets
/// `max_retries + 1` total attempts; the last error surfaces unchanged.
#[derive(Clone, Debug)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Backoff,
    /// Substring patterns matched against the error display.
    pub retryable_patterns: Vec<String>,
    /// Base delay; production default is one second.
    pub base: Duration,
    /// Adds up to 25% random slack on each delay.
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            backoff: Backoff::Exponential,
            retryable_patterns: Vec::new(),
            base: Duration::from_secs(1),
            jitter: false,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new(max_retries: u32) -> Self {
        Self {
            max_retries,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_patterns<I, T>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.retryable_patterns = patterns.into_iter().map(Into::into).collect();
        self
    }

    #[must_use]
    pub fn with_base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    #[must_use]
    pub fn with_jitter(mut self) -> Self {
        self.jitter = true;
        self
    }

    /// Classifies an error as retryable by substring match.
    ///
    /// Interrupts and cancellations are never retryable regardless of
    /// patterns.
    #[must_use]
    pub fn is_retryable(&self, error: &NodeError) -> bool {
        if error.is_interrupt() || error.is_cancellation() {
            return false;
        }
        let rendered = error.to_string();
        self.retryable_patterns
            .iter()
            .any(|pattern| rendered.contains(pattern.as_str()))
    }

    /// Delay before re-invoking after the given zero-based attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        let scaled = match self.backoff {
            Backoff::Fixed => self.base,
            Backoff::Linear => self.base.saturating_mul(attempt.saturating_add(1)),
            Backoff::Exponential => self
                .base
                .saturating_mul(1u32.checked_shl(attempt).unwrap_or(u32::MAX)),
        };
        if self.jitter {
            let slack = scaled.mul_f64(rand::rng().random_range(0.0..0.25));
            scaled + slack
        } else {
            scaled
        }
    }
}
