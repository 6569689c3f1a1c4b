use serde::{Deserialize, Serialize};

use super::types::IncomeType;

/// Lender weighting factors. Percentages are in percent (90.0 means 90 %),
/// flat amounts are monthly dollars.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ShadingRules {
    pub primary_income_pct: f64,
    pub supplementary_income_pct: f64,
    pub other_income_pct: f64,
    pub rental_income_pct: f64,
    pub existing_debt_pct: f64,
    /// Monthly commitment assumed per dollar of credit card limit.
    pub credit_card_factor_pct: f64,
    /// Living expense benchmark; declared expenses below it are lifted to it.
    pub base_living_expense_monthly: f64,
    pub per_dependent_monthly: f64,
}

impl Default for ShadingRules {
    fn default() -> Self {
        Self {
            primary_income_pct: 100.0,
            supplementary_income_pct: 90.0,
            other_income_pct: 90.0,
            rental_income_pct: 90.0,
            existing_debt_pct: 100.0,
            credit_card_factor_pct: 3.8,
            base_living_expense_monthly: 1_500.0,
            per_dependent_monthly: 450.0,
        }
    }
}

impl ShadingRules {
    /// Fraction of the stream counted toward serviceability.
    pub fn income_factor(&self, income_type: IncomeType) -> f64 {
        let pct = match income_type {
            IncomeType::Primary => self.primary_income_pct,
            IncomeType::Supplementary => self.supplementary_income_pct,
            IncomeType::Other => self.other_income_pct,
            IncomeType::Rental => self.rental_income_pct,
        };
        pct / 100.0
    }

    pub fn existing_debt_factor(&self) -> f64 {
        self.existing_debt_pct / 100.0
    }

    pub fn credit_card_factor(&self) -> f64 {
        self.credit_card_factor_pct / 100.0
    }
}
