use super::brackets::{self, Bracket};

/// Resident personal income tax schedule, simplified to five brackets.
pub const INCOME_TAX_BRACKETS: [Bracket; 5] = [
    Bracket::new(0.0, 0.0, 0.0),
    Bracket::new(18_200.0, 0.19, 0.0),
    Bracket::new(45_000.0, 0.325, 5_092.0),
    Bracket::new(120_000.0, 0.37, 29_467.0),
    Bracket::new(180_000.0, 0.45, 51_667.0),
];

pub fn calculate_tax(annual_income: f64) -> f64 {
    brackets::evaluate(annual_income.max(0.0), &INCOME_TAX_BRACKETS)
}

pub fn net_income(annual_income: f64) -> f64 {
    annual_income - calculate_tax(annual_income)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::{prop_assert, proptest};

    fn assert_close(actual: f64, expected: f64, tol: f64) {
        assert!(
            (actual - expected).abs() <= tol,
            "expected {expected}, got {actual}, tolerance {tol}"
        );
    }

    #[test]
    fn schedule_is_internally_consistent() {
        brackets::check_consistency(&INCOME_TAX_BRACKETS).expect("tax schedule chains");
    }

    #[test]
    fn tax_free_threshold_owes_nothing() {
        assert_eq!(calculate_tax(0.0), 0.0);
        assert_eq!(calculate_tax(18_200.0), 0.0);
        assert_eq!(calculate_tax(-5_000.0), 0.0);
    }

    #[test]
    fn hand_calculated_examples() {
        assert_close(calculate_tax(30_000.0), 2_242.0, 1e-6);
        assert_close(calculate_tax(90_000.0), 19_717.0, 1e-6);
        assert_close(calculate_tax(150_000.0), 40_567.0, 1e-6);
        assert_close(calculate_tax(200_000.0), 60_667.0, 1e-6);
    }

    #[test]
    fn continuous_at_every_bracket_boundary() {
        for pair in INCOME_TAX_BRACKETS.windows(2) {
            let boundary = pair[1].threshold;
            let from_below =
                pair[0].base_amount + (boundary - pair[0].threshold) * pair[0].rate;
            assert_close(calculate_tax(boundary), from_below, 1e-6);
            assert_close(calculate_tax(boundary - 1e-6), from_below, 1e-3);
        }
    }

    proptest! {
        #[test]
        fn prop_tax_is_non_decreasing(a in 0u32..400_000, delta in 0u32..50_000) {
            let low = a as f64;
            let high = low + delta as f64;
            prop_assert!(calculate_tax(high) + 1e-9 >= calculate_tax(low));
        }

        #[test]
        fn prop_tax_never_exceeds_income(income in 0u32..1_000_000) {
            let income = income as f64;
            let tax = calculate_tax(income);
            prop_assert!(tax >= 0.0);
            prop_assert!(tax <= income);
        }
    }
}
