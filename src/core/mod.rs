mod brackets;
mod engine;
mod error;
mod normalize;
mod rates;
mod shading;
mod stamp_duty;
mod tax;
mod types;

pub use brackets::Bracket;
pub use engine::{
    Calculator, INTEREST_BUFFER, IterationObserver, MAX_ITERATIONS, amortizing_payment,
    loan_to_value_ratio, present_value,
};
pub use error::{CalculationError, RateTableError, StampDutyError, UnknownVariant};
pub use normalize::{
    apply_income_shading, calculate_monthly_debt, calculate_monthly_expenses,
    calculate_total_income, normalize_to_annual, normalize_to_monthly,
};
pub use rates::{
    DEFAULT_RATE_QUOTE, LvrBucket, RateConfiguration, RateQuery, RateQuote, RateResolver,
    RateTable, TieredRateModel,
};
pub use shading::ShadingRules;
pub use stamp_duty::{
    StampDutySchedule, StampDutyTable, calculate_progressive_duty, calculate_stamp_duty,
};
pub use tax::{INCOME_TAX_BRACKETS, calculate_tax, net_income};
pub use types::{
    BorrowerInfo, BorrowerType, CalculationInput, CalculationResult, Convergence, DebtBreakdown,
    FinancialInput, Frequency, IncomeType, IterationResult, LoanPreferences, ProductType,
    RepaymentType, ServiceabilityResult, State,
};
