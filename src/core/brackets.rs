use serde::{Deserialize, Serialize};

/// One step of a progressive schedule. `rate` is a fraction applied to the
/// excess over `threshold`; `base_amount` is the amount owed at `threshold`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bracket {
    pub threshold: f64,
    pub rate: f64,
    pub base_amount: f64,
}

impl Bracket {
    pub const fn new(threshold: f64, rate: f64, base_amount: f64) -> Self {
        Self {
            threshold,
            rate,
            base_amount,
        }
    }
}

/// Evaluates a schedule sorted ascending by threshold. Values below the first
/// threshold owe nothing.
pub fn evaluate(value: f64, brackets: &[Bracket]) -> f64 {
    brackets
        .iter()
        .rev()
        .find(|b| b.threshold <= value)
        .map(|b| b.base_amount + (value - b.threshold) * b.rate)
        .unwrap_or(0.0)
}

/// Cent-level tolerance used when checking that base amounts chain correctly.
pub const CONSISTENCY_TOLERANCE: f64 = 0.01;

/// Checks ordering, rate range and that each base amount equals the previous
/// bracket evaluated at this bracket's threshold.
pub fn check_consistency(brackets: &[Bracket]) -> Result<(), String> {
    let Some(first) = brackets.first() else {
        return Err("schedule has no brackets".to_string());
    };
    if first.threshold != 0.0 {
        return Err(format!(
            "first threshold must be 0, found {}",
            first.threshold
        ));
    }
    if first.base_amount != 0.0 {
        return Err(format!(
            "first base amount must be 0, found {}",
            first.base_amount
        ));
    }

    for b in brackets {
        if !b.threshold.is_finite() || !b.rate.is_finite() || !b.base_amount.is_finite() {
            return Err(format!("bracket at {} has non-finite values", b.threshold));
        }
        if !(0.0..=1.0).contains(&b.rate) {
            return Err(format!(
                "bracket at {} has rate {} outside 0..=1",
                b.threshold, b.rate
            ));
        }
    }

    for pair in brackets.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.threshold <= prev.threshold {
            return Err(format!(
                "thresholds must be strictly increasing ({} then {})",
                prev.threshold, next.threshold
            ));
        }
        let expected = prev.base_amount + (next.threshold - prev.threshold) * prev.rate;
        if (next.base_amount - expected).abs() > CONSISTENCY_TOLERANCE {
            return Err(format!(
                "base amount at {} is {}, expected {expected}",
                next.threshold, next.base_amount
            ));
        }
    }
    Ok(())
}
