use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::{CalculationError, UnknownVariant};

/// Pay or spend frequency of a [`FinancialInput`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Frequency {
    Weekly,
    Fortnightly,
    Monthly,
    Annual,
}

impl Frequency {
    pub const ALL: [Frequency; 4] = [
        Frequency::Weekly,
        Frequency::Fortnightly,
        Frequency::Monthly,
        Frequency::Annual,
    ];

    pub fn periods_per_year(self) -> f64 {
        match self {
            Frequency::Weekly => 52.0,
            Frequency::Fortnightly => 26.0,
            Frequency::Monthly => 12.0,
            Frequency::Annual => 1.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Frequency::Weekly => "weekly",
            Frequency::Fortnightly => "fortnightly",
            Frequency::Monthly => "monthly",
            Frequency::Annual => "annual",
        }
    }
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Frequency {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        Frequency::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownVariant::new("frequency", s))
    }
}

/// Income stream category, used to pick a shading percentage.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum IncomeType {
    Primary,
    Supplementary,
    Other,
    Rental,
}

/// Australian state or territory for stamp duty purposes.
#[allow(clippy::upper_case_acronyms)]
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum State {
    #[serde(alias = "nsw")]
    NSW,
    #[serde(alias = "vic")]
    VIC,
    #[serde(alias = "qld")]
    QLD,
    #[serde(alias = "wa")]
    WA,
    #[serde(alias = "sa")]
    SA,
    #[serde(alias = "tas")]
    TAS,
    #[serde(alias = "act")]
    ACT,
    #[serde(alias = "nt")]
    NT,
}

impl State {
    pub const ALL: [State; 8] = [
        State::NSW,
        State::VIC,
        State::QLD,
        State::WA,
        State::SA,
        State::TAS,
        State::ACT,
        State::NT,
    ];

    pub fn code(self) -> &'static str {
        match self {
            State::NSW => "NSW",
            State::VIC => "VIC",
            State::QLD => "QLD",
            State::WA => "WA",
            State::SA => "SA",
            State::TAS => "TAS",
            State::ACT => "ACT",
            State::NT => "NT",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for State {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        State::ALL
            .into_iter()
            .find(|state| state.code().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownVariant::new("state", s))
    }
}

/// Variable or fixed-term product. Parsing is exact: `fixed_10` is not `fixed_1`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum ProductType {
    #[serde(rename = "variable")]
    Variable,
    #[serde(rename = "fixed_1")]
    Fixed1,
    #[serde(rename = "fixed_2")]
    Fixed2,
    #[serde(rename = "fixed_3")]
    Fixed3,
    #[serde(rename = "fixed_4")]
    Fixed4,
    #[serde(rename = "fixed_5")]
    Fixed5,
}

impl ProductType {
    pub const ALL: [ProductType; 6] = [
        ProductType::Variable,
        ProductType::Fixed1,
        ProductType::Fixed2,
        ProductType::Fixed3,
        ProductType::Fixed4,
        ProductType::Fixed5,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ProductType::Variable => "variable",
            ProductType::Fixed1 => "fixed_1",
            ProductType::Fixed2 => "fixed_2",
            ProductType::Fixed3 => "fixed_3",
            ProductType::Fixed4 => "fixed_4",
            ProductType::Fixed5 => "fixed_5",
        }
    }

    /// Fixed period in years, `None` for variable.
    pub fn fixed_years(self) -> Option<u32> {
        match self {
            ProductType::Variable => None,
            ProductType::Fixed1 => Some(1),
            ProductType::Fixed2 => Some(2),
            ProductType::Fixed3 => Some(3),
            ProductType::Fixed4 => Some(4),
            ProductType::Fixed5 => Some(5),
        }
    }
}

impl fmt::Display for ProductType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ProductType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim();
        ProductType::ALL
            .into_iter()
            .find(|p| p.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| UnknownVariant::new("product type", s))
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub enum RepaymentType {
    #[serde(rename = "P&I", alias = "principal_and_interest")]
    PrincipalAndInterest,
    #[serde(rename = "IO", alias = "interest_only")]
    InterestOnly,
}

impl RepaymentType {
    pub fn as_str(self) -> &'static str {
        match self {
            RepaymentType::PrincipalAndInterest => "P&I",
            RepaymentType::InterestOnly => "IO",
        }
    }
}

impl fmt::Display for RepaymentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RepaymentType {
    type Err = UnknownVariant;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "p&i" | "principal_and_interest" => Ok(RepaymentType::PrincipalAndInterest),
            "io" | "interest_only" => Ok(RepaymentType::InterestOnly),
            _ => Err(UnknownVariant::new("repayment type", s)),
        }
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BorrowerType {
    OwnerOccupier,
    Investor,
}

impl BorrowerType {
    pub fn from_investor_flag(is_investor: bool) -> Self {
        if is_investor {
            BorrowerType::Investor
        } else {
            BorrowerType::OwnerOccupier
        }
    }
}

/// An amount paid or received at a fixed frequency.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FinancialInput {
    pub amount: f64,
    pub frequency: Frequency,
}

impl FinancialInput {
    pub fn new(amount: f64, frequency: Frequency) -> Self {
        Self { amount, frequency }
    }

    pub fn annual(amount: f64) -> Self {
        Self::new(amount, Frequency::Annual)
    }

    pub fn monthly(amount: f64) -> Self {
        Self::new(amount, Frequency::Monthly)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BorrowerInfo {
    pub primary: FinancialInput,
    #[serde(default)]
    pub supplementary: Option<FinancialInput>,
    #[serde(default)]
    pub other: Option<FinancialInput>,
    #[serde(default)]
    pub rental: Option<FinancialInput>,
}

impl BorrowerInfo {
    pub fn salaried(primary: FinancialInput) -> Self {
        Self {
            primary,
            supplementary: None,
            other: None,
            rental: None,
        }
    }

    /// Every income stream with its shading category; absent streams are skipped.
    pub fn income_streams(&self) -> impl Iterator<Item = (IncomeType, FinancialInput)> + '_ {
        [
            (IncomeType::Primary, Some(self.primary)),
            (IncomeType::Supplementary, self.supplementary),
            (IncomeType::Other, self.other),
            (IncomeType::Rental, self.rental),
        ]
        .into_iter()
        .filter_map(|(kind, input)| input.map(|i| (kind, i)))
    }
}

/// Loan features that drive rate selection.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct LoanPreferences {
    pub product_type: ProductType,
    pub repayment_type: RepaymentType,
    pub has_offset: bool,
    pub has_redraw: bool,
}

impl Default for LoanPreferences {
    fn default() -> Self {
        Self {
            product_type: ProductType::Variable,
            repayment_type: RepaymentType::PrincipalAndInterest,
            has_offset: false,
            has_redraw: false,
        }
    }
}

/// Longest loan term accepted, in years.
pub const MAX_LOAN_TERM_YEARS: u32 = 100;

#[derive(Debug, Clone)]
pub struct CalculationInput {
    pub borrowers: Vec<BorrowerInfo>,
    pub dependents: u32,
    pub expenses: FinancialInput,
    pub existing_debt: Option<FinancialInput>,
    pub credit_card_limit: Option<f64>,
    /// Fixed headline rate in percent; only the single-pass solve honours it.
    pub interest_rate: Option<f64>,
    pub loan_term: u32,
    pub property_value: f64,
    pub deposit: f64,
    pub state: State,
    pub is_first_home_buyer: bool,
    pub is_investor: bool,
    /// Base rate in percent for the tiered rate model.
    pub base_rate: f64,
    pub preferences: LoanPreferences,
}

impl CalculationInput {
    pub fn borrower_type(&self) -> BorrowerType {
        BorrowerType::from_investor_flag(self.is_investor)
    }

    pub fn term_months(&self) -> u32 {
        self.loan_term.saturating_mul(12)
    }

    pub fn validate(&self) -> Result<(), CalculationError> {
        if !self.property_value.is_finite() {
            return Err(CalculationError::NonFinite {
                field: "propertyValue".to_string(),
            });
        }
        if self.property_value <= 0.0 {
            return Err(CalculationError::NonPositivePropertyValue);
        }
        if self.loan_term == 0 {
            return Err(CalculationError::NonPositiveLoanTerm);
        }
        if self.loan_term > MAX_LOAN_TERM_YEARS {
            return Err(CalculationError::LoanTermTooLong {
                max: MAX_LOAN_TERM_YEARS,
            });
        }
        check_amount("deposit", self.deposit)?;
        check_amount("baseRate", self.base_rate)?;
        if let Some(rate) = self.interest_rate {
            check_amount("interestRate", rate)?;
        }
        if let Some(limit) = self.credit_card_limit {
            check_amount("creditCardLimit", limit)?;
        }
        check_amount("expenses.amount", self.expenses.amount)?;
        if let Some(debt) = self.existing_debt {
            check_amount("existingDebt.amount", debt.amount)?;
        }
        for (idx, borrower) in self.borrowers.iter().enumerate() {
            for (kind, stream) in borrower.income_streams() {
                let label = match kind {
                    IncomeType::Primary => "primary",
                    IncomeType::Supplementary => "supplementary",
                    IncomeType::Other => "other",
                    IncomeType::Rental => "rental",
                };
                check_amount(&format!("borrowers[{idx}].{label}.amount"), stream.amount)?;
            }
        }
        Ok(())
    }
}

pub(crate) fn check_amount(field: &str, value: f64) -> Result<(), CalculationError> {
    if !value.is_finite() {
        return Err(CalculationError::NonFinite {
            field: field.to_string(),
        });
    }
    if value < 0.0 {
        return Err(CalculationError::Negative {
            field: field.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IterationResult {
    pub iteration: u32,
    pub lvr: f64,
    pub rate: f64,
    pub max_loan: f64,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Convergence {
    Converged,
    MaxIterationsReached,
    SinglePass,
}

/// Monthly debt commitments counted against serviceability.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DebtBreakdown {
    pub existing_debt_monthly: f64,
    pub credit_card_monthly: f64,
    pub total_monthly: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalculationResult {
    pub max_loan: f64,
    pub max_property: f64,
    pub stamp_duty: f64,
    /// Deposit left after stamp duty and other charges.
    pub deposit: f64,
    pub original_savings: f64,
    pub other_charges: f64,
    pub loan_to_value_ratio: f64,
    /// Repayment on `max_loan` at `final_rate`, without the assessment buffer.
    pub monthly_repayment: f64,
    pub is_serviceable: bool,
    /// Monthly disposable income less the buffered repayment on `max_loan`.
    pub surplus: f64,
    /// Shaded gross annual income.
    pub total_income: f64,
    pub annual_net_income: f64,
    /// Monthly living expenses including dependents.
    pub total_expenses: f64,
    /// Monthly debt commitments.
    pub total_debt: f64,
    pub iterations: u32,
    pub iteration_results: Vec<IterationResult>,
    pub final_rate: f64,
    pub comparison_rate: f64,
    pub convergence: Convergence,
    pub debt_breakdown: DebtBreakdown,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceabilityResult {
    pub is_serviceable: bool,
    pub surplus: f64,
    /// Repayment at the buffered assessment rate.
    pub monthly_repayment: f64,
    pub assessment_rate: f64,
    pub loan_to_value_ratio: f64,
}
