use super::shading::ShadingRules;
use super::types::{BorrowerInfo, DebtBreakdown, FinancialInput, IncomeType};

pub fn normalize_to_annual(input: FinancialInput) -> f64 {
    input.amount * input.frequency.periods_per_year()
}

pub fn normalize_to_monthly(input: FinancialInput) -> f64 {
    normalize_to_annual(input) / 12.0
}

pub fn apply_income_shading(amount: f64, income_type: IncomeType, rules: &ShadingRules) -> f64 {
    amount * rules.income_factor(income_type)
}

/// Shaded, annualised income across the household.
pub fn calculate_total_income(borrowers: &[BorrowerInfo], rules: &ShadingRules) -> f64 {
    borrowers
        .iter()
        .flat_map(BorrowerInfo::income_streams)
        .map(|(kind, stream)| apply_income_shading(normalize_to_annual(stream), kind, rules))
        .sum()
}

/// Declared living expenses, floored at the benchmark, plus dependents.
pub fn calculate_monthly_expenses(
    expenses: FinancialInput,
    dependents: u32,
    rules: &ShadingRules,
) -> f64 {
    let declared = normalize_to_monthly(expenses);
    declared.max(rules.base_living_expense_monthly)
        + dependents as f64 * rules.per_dependent_monthly
}

pub fn calculate_monthly_debt(
    existing_debt: Option<FinancialInput>,
    credit_card_limit: Option<f64>,
    rules: &ShadingRules,
) -> DebtBreakdown {
    let existing_debt_monthly = existing_debt
        .map(|debt| normalize_to_monthly(debt) * rules.existing_debt_factor())
        .unwrap_or(0.0);
    let credit_card_monthly = credit_card_limit.unwrap_or(0.0) * rules.credit_card_factor();
    DebtBreakdown {
        existing_debt_monthly,
        credit_card_monthly,
        total_monthly: existing_debt_monthly + credit_card_monthly,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::Frequency;

    const EPS: f64 = 1e-9;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    #[test]
    fn annualises_each_frequency() {
        assert_approx(normalize_to_annual(FinancialInput::new(100.0, Frequency::Weekly)), 5_200.0);
        assert_approx(
            normalize_to_annual(FinancialInput::new(100.0, Frequency::Fortnightly)),
            2_600.0,
        );
        assert_approx(normalize_to_annual(FinancialInput::monthly(100.0)), 1_200.0);
        assert_approx(normalize_to_annual(FinancialInput::annual(100.0)), 100.0);
    }

    #[test]
    fn monthly_is_annual_over_twelve() {
        assert_approx(
            normalize_to_monthly(FinancialInput::new(1_200.0, Frequency::Weekly)),
            5_200.0,
        );
        assert_approx(normalize_to_monthly(FinancialInput::monthly(2_000.0)), 2_000.0);
        assert_approx(normalize_to_monthly(FinancialInput::annual(24_000.0)), 2_000.0);
    }

    #[test]
    fn total_income_shades_secondary_streams_and_sums_borrowers() {
        let rules = ShadingRules::default();
        let borrowers = vec![
            BorrowerInfo {
                primary: FinancialInput::annual(90_000.0),
                supplementary: Some(FinancialInput::annual(10_000.0)),
                other: None,
                rental: Some(FinancialInput::new(500.0, Frequency::Weekly)),
            },
            BorrowerInfo::salaried(FinancialInput::monthly(5_000.0)),
        ];
        // 90k + 9k + 26k * 0.9 + 60k
        assert_approx(calculate_total_income(&borrowers, &rules), 182_400.0);
    }

    #[test]
    fn empty_household_has_no_income() {
        assert_eq!(calculate_total_income(&[], &ShadingRules::default()), 0.0);
    }

    #[test]
    fn expenses_are_floored_at_benchmark_and_add_dependents() {
        let rules = ShadingRules::default();
        assert_approx(
            calculate_monthly_expenses(FinancialInput::monthly(2_000.0), 0, &rules),
            2_000.0,
        );
        assert_approx(
            calculate_monthly_expenses(FinancialInput::monthly(800.0), 2, &rules),
            1_500.0 + 900.0,
        );
    }

    #[test]
    fn debt_includes_credit_card_commitment() {
        let rules = ShadingRules::default();
        let debt = calculate_monthly_debt(
            Some(FinancialInput::new(100.0, Frequency::Weekly)),
            Some(10_000.0),
            &rules,
        );
        assert_approx(debt.existing_debt_monthly, 5_200.0 / 12.0);
        assert_approx(debt.credit_card_monthly, 380.0);
        assert_approx(debt.total_monthly, 5_200.0 / 12.0 + 380.0);

        let none = calculate_monthly_debt(None, None, &rules);
        assert_eq!(none, DebtBreakdown::default());
    }
}
