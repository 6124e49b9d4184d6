//! Exponential backoff.

use std::time::Duration;

/// Delay before the retry that follows attempt `attempt_index` (0-based).
///
/// `min(base_ms * multiplier^attempt_index, max_ms)`, no jitter.
pub fn calculate_backoff(attempt_index: u32, base_ms: u64, max_ms: u64, multiplier: u32) -> Duration {
    let factor = u64::from(multiplier).saturating_pow(attempt_index);
    let delay_ms = base_ms.saturating_mul(factor);
    Duration::from_millis(delay_ms.min(max_ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_calculation() {
        assert_eq!(calculate_backoff(0, 100, 5000, 2), Duration::from_millis(100));
        assert_eq!(calculate_backoff(1, 100, 5000, 2), Duration::from_millis(200));
        assert_eq!(calculate_backoff(2, 100, 5000, 2), Duration::from_millis(400));
    }

    #[test]
    fn test_backoff_is_capped() {
        assert_eq!(calculate_backoff(10, 100, 1000, 2), Duration::from_millis(1000));
        assert_eq!(calculate_backoff(200, 100, 5000, 3), Duration::from_millis(5000));
    }

    #[test]
    fn test_multiplier_one_is_constant() {
        assert_eq!(calculate_backoff(4, 250, 5000, 1), Duration::from_millis(250));
    }
}
