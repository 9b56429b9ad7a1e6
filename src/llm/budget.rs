//! Token Budget
//!
//! A budget is derived from the requested depth, never stored: the output
//! token ceiling for one provider call plus the time that call is allowed
//! to take. The invariant is that a larger budget is never given less time
//! to arrive; the configuration layer validates it, this type preserves it.

use std::time::Duration;

use crate::config::{Depth, DepthBudgets};
use crate::constants::budget as budget_constants;

/// Output-token budget and timing for one analysis depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenBudget {
    pub max_output_tokens: u32,
    pub request_timeout: Duration,
}

impl TokenBudget {
    /// Resolve the budget for a depth from the configured table.
    pub fn for_depth(depth: Depth, budgets: &DepthBudgets) -> Self {
        let tier = budgets.budget_for(depth);
        Self {
            max_output_tokens: tier.max_output_tokens,
            request_timeout: Duration::from_secs(tier.request_timeout_secs),
        }
    }

    /// Wall-clock ceiling for an entire pipeline run, chunked sequences
    /// included. Partial progress through chunking does not grant extra
    /// time beyond this.
    pub fn job_deadline(&self) -> Duration {
        self.request_timeout
            .saturating_mul(budget_constants::JOB_DEADLINE_FACTOR)
    }

    /// A completion that consumed this many tokens was cut off.
    pub fn is_truncated(&self, completion_tokens: u32) -> bool {
        let threshold =
            (f64::from(self.max_output_tokens) * budget_constants::TRUNCATION_RATIO).ceil() as u32;
        completion_tokens >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn budget(tokens: u32) -> TokenBudget {
        TokenBudget {
            max_output_tokens: tokens,
            request_timeout: Duration::from_secs(60),
        }
    }

    #[test]
    fn test_for_depth_uses_table() {
        let budgets = DepthBudgets::default();
        let quick = TokenBudget::for_depth(Depth::Quick, &budgets);
        let deep = TokenBudget::for_depth(Depth::Deep, &budgets);
        assert!(quick.max_output_tokens < deep.max_output_tokens);
        assert!(quick.request_timeout <= deep.request_timeout);
    }

    #[test]
    fn test_timeout_non_decreasing_across_depths() {
        let budgets = DepthBudgets::default();
        let mut tiers: Vec<TokenBudget> = Depth::ALL
            .iter()
            .map(|d| TokenBudget::for_depth(*d, &budgets))
            .collect();
        tiers.sort_by_key(|b| b.max_output_tokens);
        for pair in tiers.windows(2) {
            assert!(pair[0].request_timeout <= pair[1].request_timeout);
        }
    }

    #[test]
    fn test_job_deadline_scales_with_request_timeout() {
        let budgets = DepthBudgets::default();
        for depth in Depth::ALL {
            let b = TokenBudget::for_depth(depth, &budgets);
            assert_eq!(
                b.job_deadline(),
                b.request_timeout * budget_constants::JOB_DEADLINE_FACTOR
            );
        }
    }

    #[test]
    fn test_truncation_at_95_percent() {
        let b = budget(8_000);
        assert!(b.is_truncated(7_600)); // exactly 95%
        assert!(b.is_truncated(8_000));
        assert!(!b.is_truncated(7_599));
        assert!(!b.is_truncated(0));
    }

    proptest! {
        #[test]
        fn prop_truncation_threshold(max in 1u32..1_000_000, completion in 0u32..1_000_000) {
            let b = budget(max);
            let ratio = f64::from(completion) / f64::from(max);
            if ratio >= budget_constants::TRUNCATION_RATIO {
                prop_assert!(b.is_truncated(completion));
            }
            if b.is_truncated(completion) {
                // Never flags clearly-in-budget completions
                prop_assert!(ratio > budget_constants::TRUNCATION_RATIO - 0.01);
            }
        }
    }
}
