//! Pure scoring helpers: signal extraction, risk score, allocation bands.

use crate::models::{Allocation, RiskProfile};
use lazy_static::lazy_static;
use std::collections::{HashMap, HashSet};

/// Returned in place of token signals when no events are stored.
pub const LOW_DATA_SIGNAL: &str = "low-data";
const MAX_SIGNALS: usize = 6;
const MIN_TOKEN_LEN: usize = 3;

lazy_static! {
    static ref STOPWORDS: HashSet<&'static str> = [
        "the", "and", "to", "of", "in", "on", "for", "with", "from", "value", "block", "tx",
        "hash", "bnb",
    ]
    .into_iter()
    .collect();
}

/// The six most frequent payload tokens as `"word:count"`.
///
/// Ties keep first-seen order, so identical input always yields identical signals.
pub fn extract_signals<'a, I>(payloads: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut order: Vec<String> = Vec::new();

    for payload in payloads {
        let lowered = payload.to_lowercase();
        for word in lowered.split(|c: char| !c.is_ascii_alphanumeric()) {
            if word.len() < MIN_TOKEN_LEN || STOPWORDS.contains(word) {
                continue;
            }
            let count = counts.entry(word.to_string()).or_insert(0);
            if *count == 0 {
                order.push(word.to_string());
            }
            *count += 1;
        }
    }

    let mut ranked: Vec<(String, usize)> = order
        .into_iter()
        .map(|word| {
            let n = counts.get(&word).copied().unwrap_or(0);
            (word, n)
        })
        .collect();
    // Stable: equal counts stay in first-seen order.
    ranked.sort_by(|a, b| b.1.cmp(&a.1));

    ranked
        .into_iter()
        .take(MAX_SIGNALS)
        .map(|(word, n)| format!("{}:{}", word, n))
        .collect()
}

/// `min(1, n/50)`, or `0.2` with no events at all.
pub fn data_confidence(event_count: usize) -> f64 {
    if event_count == 0 {
        0.2
    } else {
        (event_count as f64 / 50.0).min(1.0)
    }
}

pub fn risk_score(profile: &RiskProfile, data_confidence: f64) -> f64 {
    let horizon = profile.horizon_days.max(1) as f64;
    let base = 0.5 * profile.risk_tolerance
        + 0.3 * (1.0 - profile.max_drawdown)
        + 0.2 * (365.0 / horizon).min(1.0);
    round2(clamp01(base * (0.8 + 0.2 * data_confidence)))
}

pub fn allocation(risk_score: f64) -> Allocation {
    if risk_score < 0.35 {
        Allocation { blue_chip: 60, yield_: 25, growth: 10, speculative: 5 }
    } else if risk_score < 0.7 {
        Allocation { blue_chip: 45, yield_: 20, growth: 25, speculative: 10 }
    } else {
        Allocation { blue_chip: 25, yield_: 15, growth: 35, speculative: 25 }
    }
}

/// Picked by the raw tolerance input, not the computed score.
pub fn recommendation_for(risk_tolerance: f64) -> &'static str {
    if risk_tolerance < 0.35 {
        "Focus on high-liquidity blue-chip assets and short-term yield strategies."
    } else if risk_tolerance < 0.7 {
        "Balance spot positions with selective momentum trades on trending assets."
    } else {
        "Pursue higher beta opportunities with tight risk limits and rapid rebalancing."
    }
}

pub fn clamp01(x: f64) -> f64 {
    x.clamp(0.0, 1.0)
}

/// Rounds the exact binary value: 0.34499999999999997 is 0.34, not 0.35.
pub fn round2(x: f64) -> f64 {
    format!("{:.2}", x).parse().unwrap_or(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signals_drop_stopwords_and_short_tokens() {
        let payloads = [
            "from 0xabc to 0xdef value 1.5 block 100",
            "swap PancakeSwap liquidity on BNB",
            "pancakeswap liquidity added",
        ];
        let signals = extract_signals(payloads.iter().copied());
        assert_eq!(signals[0], "pancakeswap:2");
        assert_eq!(signals[1], "liquidity:2");
        assert!(signals.iter().all(|s| !s.starts_with("bnb:") && !s.starts_with("value:")));
        assert!(signals.iter().all(|s| !s.starts_with("to:") && !s.starts_with("on:")));
        assert!(signals.len() <= 6);
    }

    #[test]
    fn test_signal_ties_keep_first_seen_order() {
        let signals = extract_signals(["gamma alpha beta", "beta alpha gamma"].iter().copied());
        assert_eq!(signals, vec!["gamma:2", "alpha:2", "beta:2"]);
    }

    #[test]
    fn test_risk_score_reference_values() {
        let profile = RiskProfile { risk_tolerance: 0.5, horizon_days: 365, max_drawdown: 0.2 };
        // 0.25 + 0.24 + 0.2 = 0.69; * 0.84 = 0.5796
        assert_eq!(risk_score(&profile, data_confidence(0)), 0.58);

        let saturated = RiskProfile { risk_tolerance: 1.0, horizon_days: 1, max_drawdown: 0.0 };
        assert_eq!(risk_score(&saturated, 1.0), 1.0);
    }

    #[test]
    fn test_round2_uses_exact_value() {
        let profile = RiskProfile { risk_tolerance: 0.01, horizon_days: 730, max_drawdown: 0.2 };
        // 0.005 + 0.24 + 0.1 is 0.34499999999999997 in binary.
        let score = risk_score(&profile, data_confidence(50));
        assert_eq!(score, 0.34);
        assert_eq!(allocation(score).blue_chip, 60);

        assert_eq!(round2(2.675), 2.67);
        assert_eq!(round2(0.5796), 0.58);
    }

    #[test]
    fn test_data_confidence_caps_at_one() {
        assert_eq!(data_confidence(0), 0.2);
        assert_eq!(data_confidence(25), 0.5);
        assert_eq!(data_confidence(80), 1.0);
    }

    #[test]
    fn test_allocation_bands_sum_to_100() {
        for score in [0.0, 0.34, 0.35, 0.69, 0.7, 1.0] {
            assert_eq!(allocation(score).total(), 100);
        }
        assert_eq!(allocation(0.34).blue_chip, 60);
        assert_eq!(allocation(0.35).blue_chip, 45);
        assert_eq!(allocation(0.7).speculative, 25);
    }
}
