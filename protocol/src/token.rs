use std::ops::AddAssign;

use serde::Deserialize;
use serde::Serialize;

/// Tokens consumed/produced by a single `usage` stream event.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u64,
    pub output_tokens: u64,
}

impl TokenUsage {
    pub const fn new(input_tokens: u64, output_tokens: u64) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    pub fn is_zero(&self) -> bool {
        self.input_tokens == 0 && self.output_tokens == 0
    }
}

impl AddAssign for TokenUsage {
    fn add_assign(&mut self, rhs: Self) {
        self.input_tokens += rhs.input_tokens;
        self.output_tokens += rhs.output_tokens;
    }
}

/// Session-wide accumulation. Invariant I1: always equal to the sum of the
/// `TokenUsage` carried by every turn that has one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenStatistics {
    pub total_input: u64,
    pub total_output: u64,
}

impl TokenStatistics {
    pub fn accumulate(&mut self, usage: TokenUsage) {
        self.total_input += usage.input_tokens;
        self.total_output += usage.output_tokens;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulate_matches_sum_of_usages() {
        let usages = [
            TokenUsage::new(3, 5),
            TokenUsage::new(0, 0),
            TokenUsage::new(10, 2),
        ];
        let mut stats = TokenStatistics::default();
        for usage in usages {
            stats.accumulate(usage);
        }
        assert_eq!(stats.total_input, 13);
        assert_eq!(stats.total_output, 7);
    }

    #[test]
    fn add_assign_sums_fields() {
        let mut total = TokenUsage::new(1, 2);
        total += TokenUsage::new(3, 4);
        assert_eq!(total, TokenUsage::new(4, 6));
    }
}
