use std::sync::Arc;

use tracing::{debug, info};

use super::error::CalculationError;
use super::normalize::{
    calculate_monthly_debt, calculate_monthly_expenses, calculate_total_income,
};
use super::rates::{DEFAULT_RATE_QUOTE, RateQuery, RateQuote, RateResolver, RateTable};
use super::shading::ShadingRules;
use super::stamp_duty::StampDutyTable;
use super::tax::net_income;
use super::types::{
    CalculationInput, CalculationResult, Convergence, DebtBreakdown, IterationResult,
    ServiceabilityResult, State, check_amount,
};

/// Percentage points added to the offered rate when assessing serviceability.
pub const INTEREST_BUFFER: f64 = 2.0;
pub const MAX_ITERATIONS: u32 = 10;
/// Fixed number of property-value/cost refinement rounds per outer iteration.
/// This is a heuristic; the rounds are not checked for convergence.
pub const PROPERTY_REFINEMENT_ROUNDS: u32 = 5;
pub const LOAN_TOLERANCE: f64 = 1_000.0;
pub const RATE_TOLERANCE: f64 = 0.01;
/// LVR assumed for the first rate lookup when no deposit is given.
pub const NO_DEPOSIT_LVR: f64 = 80.0;

const OTHER_CHARGES_FLAT: f64 = 2_000.0;
const OTHER_CHARGES_RATE: f64 = 0.001;
// Surpluses smaller than this are floating-point residue from the
// present-value/payment round trip.
const SURPLUS_NOISE: f64 = 1e-6;

/// Receives each outer iteration of the LVR/rate solve as it is recorded.
pub trait IterationObserver {
    fn on_iteration(&mut self, iteration: &IterationResult);
}

impl<F> IterationObserver for F
where
    F: FnMut(&IterationResult),
{
    fn on_iteration(&mut self, iteration: &IterationResult) {
        self(iteration)
    }
}

/// Borrowing-power calculator over read-only rate, duty and shading
/// configuration. Cheap to clone; the rate table is shared.
#[derive(Debug, Clone, Default)]
pub struct Calculator {
    rates: RateResolver,
    stamp_duty: StampDutyTable,
    shading: ShadingRules,
}

#[derive(Debug, Clone, Copy)]
struct Household {
    total_income: f64,
    annual_net_income: f64,
    monthly_expenses: f64,
    debt: DebtBreakdown,
    monthly_disposable: f64,
}

impl Household {
    /// Fails when annualising or summing finite amounts overflows.
    fn assess(input: &CalculationInput, rules: &ShadingRules) -> Result<Self, CalculationError> {
        let total_income = calculate_total_income(&input.borrowers, rules);
        let annual_net_income = net_income(total_income);
        let monthly_expenses = calculate_monthly_expenses(input.expenses, input.dependents, rules);
        let debt = calculate_monthly_debt(input.existing_debt, input.credit_card_limit, rules);
        let monthly_disposable = annual_net_income / 12.0 - monthly_expenses - debt.total_monthly;

        for (field, value) in [
            ("totalIncome", total_income),
            ("annualNetIncome", annual_net_income),
            ("totalExpenses", monthly_expenses),
            ("totalDebt", debt.total_monthly),
            ("monthlyDisposable", monthly_disposable),
        ] {
            if !value.is_finite() {
                return Err(CalculationError::NonFinite {
                    field: field.to_string(),
                });
            }
        }

        Ok(Self {
            total_income,
            annual_net_income,
            monthly_expenses,
            debt,
            monthly_disposable,
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct PropertyEstimate {
    max_property: f64,
    stamp_duty: f64,
    other_charges: f64,
    available_deposit: f64,
}

#[derive(Debug, Clone, Copy)]
struct Round {
    max_loan: f64,
    estimate: PropertyEstimate,
    record: IterationResult,
}

impl Calculator {
    pub fn new(rates: RateResolver, stamp_duty: StampDutyTable, shading: ShadingRules) -> Self {
        Self {
            rates,
            stamp_duty,
            shading,
        }
    }

    pub fn with_rate_table(table: Arc<RateTable>) -> Self {
        Self {
            rates: RateResolver::Table(table),
            ..Self::default()
        }
    }

    pub fn rates(&self) -> &RateResolver {
        &self.rates
    }

    pub fn stamp_duty_table(&self) -> &StampDutyTable {
        &self.stamp_duty
    }

    pub fn shading(&self) -> &ShadingRules {
        &self.shading
    }

    pub fn calculate_stamp_duty(
        &self,
        value: f64,
        state: State,
        is_first_home_buyer: bool,
        is_investor: bool,
    ) -> f64 {
        self.stamp_duty
            .calculate_stamp_duty(value, state, is_first_home_buyer, is_investor)
    }

    /// One round at a fixed rate: the caller's `interest_rate` when given,
    /// otherwise the rate resolved at the seed LVR.
    pub fn calculate_borrowing_power(
        &self,
        input: &CalculationInput,
    ) -> Result<CalculationResult, CalculationError> {
        input.validate()?;
        let household = Household::assess(input, &self.shading)?;
        let quote = match input.interest_rate {
            Some(rate) => RateQuote {
                rate,
                comparison_rate: rate,
            },
            None => self.resolve_quote(input, seed_lvr(input), seed_loan_amount(input)),
        };

        let round = self.solve_round(input, &household, quote.rate, 1);
        debug!(
            iteration = 1,
            lvr = round.record.lvr,
            rate = quote.rate,
            max_loan = round.max_loan,
            "single-pass borrowing power"
        );
        Ok(self.build_result(
            input,
            &household,
            round,
            quote,
            vec![round.record],
            Convergence::SinglePass,
        ))
    }

    /// Full LVR/rate fixed-point solve. Always resolves rates from the
    /// configured resolver; `interest_rate` on the input is ignored.
    pub fn calculate_borrowing_power_iterative(
        &self,
        input: &CalculationInput,
    ) -> Result<CalculationResult, CalculationError> {
        self.calculate_borrowing_power_iterative_with_observer(
            input,
            &mut |_: &IterationResult| {},
        )
    }

    pub fn calculate_borrowing_power_iterative_with_observer<O>(
        &self,
        input: &CalculationInput,
        observer: &mut O,
    ) -> Result<CalculationResult, CalculationError>
    where
        O: IterationObserver + ?Sized,
    {
        input.validate()?;
        let household = Household::assess(input, &self.shading)?;

        let mut current = self.resolve_quote(input, seed_lvr(input), seed_loan_amount(input));
        let mut previous_max_loan = 0.0;
        let mut trace = Vec::with_capacity(MAX_ITERATIONS as usize);
        let mut iteration = 1;

        loop {
            let round = self.solve_round(input, &household, current.rate, iteration);
            debug!(
                iteration,
                lvr = round.record.lvr,
                rate = current.rate,
                max_loan = round.max_loan,
                "borrowing power iteration"
            );
            observer.on_iteration(&round.record);
            trace.push(round.record);

            let next = self.resolve_quote(input, round.record.lvr, round.max_loan);
            let converged = (round.max_loan - previous_max_loan).abs() < LOAN_TOLERANCE
                && (next.rate - current.rate).abs() < RATE_TOLERANCE;

            if converged || iteration >= MAX_ITERATIONS {
                let convergence = if converged {
                    Convergence::Converged
                } else {
                    Convergence::MaxIterationsReached
                };
                info!(
                    iterations = iteration,
                    ?convergence,
                    max_loan = round.max_loan,
                    final_rate = next.rate,
                    "borrowing power solved"
                );
                return Ok(self.build_result(
                    input,
                    &household,
                    round,
                    next,
                    trace,
                    convergence,
                ));
            }

            previous_max_loan = round.max_loan;
            current = next;
            iteration += 1;
        }
    }

    /// Whether `loan_amount` is serviceable against `input.property_value`.
    pub fn calculate_loan_serviceability(
        &self,
        input: &CalculationInput,
        loan_amount: f64,
    ) -> Result<ServiceabilityResult, CalculationError> {
        input.validate()?;
        check_amount("loanAmount", loan_amount)?;
        let household = Household::assess(input, &self.shading)?;

        let lvr = loan_to_value_ratio(loan_amount, input.property_value);
        let quote = self.resolve_quote(input, lvr, loan_amount);
        let assessment_rate = quote.rate + INTEREST_BUFFER;
        let payment = amortizing_payment(loan_amount, assessment_rate, input.term_months());
        let (is_serviceable, surplus) =
            serviceability_verdict(household.monthly_disposable, payment);

        Ok(ServiceabilityResult {
            is_serviceable,
            surplus,
            monthly_repayment: payment,
            assessment_rate,
            loan_to_value_ratio: lvr,
        })
    }

    fn resolve_quote(&self, input: &CalculationInput, lvr: f64, loan_amount: f64) -> RateQuote {
        let query = RateQuery {
            lvr,
            product_type: input.preferences.product_type,
            repayment_type: input.preferences.repayment_type,
            borrower_type: input.borrower_type(),
            loan_amount,
            is_first_home_buyer: input.is_first_home_buyer,
            has_offset: input.preferences.has_offset,
            has_redraw: input.preferences.has_redraw,
        };
        self.rates
            .resolve(&query, input.base_rate)
            .unwrap_or_else(|| {
                debug!(lvr, loan_amount, "no eligible rate, using default");
                DEFAULT_RATE_QUOTE
            })
    }

    fn solve_round(
        &self,
        input: &CalculationInput,
        household: &Household,
        rate: f64,
        iteration: u32,
    ) -> Round {
        let effective_rate = rate + INTEREST_BUFFER;
        let max_loan =
            present_value(household.monthly_disposable, effective_rate, input.term_months())
                .max(0.0);
        let estimate = self.refine_property_value(input, max_loan);
        Round {
            max_loan,
            estimate,
            record: IterationResult {
                iteration,
                lvr: loan_to_value_ratio(max_loan, estimate.max_property),
                rate,
                max_loan,
            },
        }
    }

    // Costs depend on property value, which depends on the deposit left after costs.
    fn refine_property_value(&self, input: &CalculationInput, max_loan: f64) -> PropertyEstimate {
        let mut estimate = PropertyEstimate {
            max_property: max_loan + input.deposit,
            stamp_duty: 0.0,
            other_charges: 0.0,
            available_deposit: input.deposit,
        };
        for _ in 0..PROPERTY_REFINEMENT_ROUNDS {
            let stamp_duty = self.calculate_stamp_duty(
                estimate.max_property,
                input.state,
                input.is_first_home_buyer,
                input.is_investor,
            );
            let other_charges = other_charges(estimate.max_property);
            let available_deposit = input.deposit - stamp_duty - other_charges;
            estimate = PropertyEstimate {
                max_property: (max_loan + available_deposit).max(0.0),
                stamp_duty,
                other_charges,
                available_deposit,
            };
        }
        estimate
    }

    fn build_result(
        &self,
        input: &CalculationInput,
        household: &Household,
        round: Round,
        quote: RateQuote,
        iteration_results: Vec<IterationResult>,
        convergence: Convergence,
    ) -> CalculationResult {
        let periods = input.term_months();
        let monthly_repayment = amortizing_payment(round.max_loan, quote.rate, periods);
        let assessed_repayment =
            amortizing_payment(round.max_loan, quote.rate + INTEREST_BUFFER, periods);
        let (is_serviceable, surplus) =
            serviceability_verdict(household.monthly_disposable, assessed_repayment);

        CalculationResult {
            max_loan: round.max_loan,
            max_property: round.estimate.max_property,
            stamp_duty: round.estimate.stamp_duty,
            deposit: round.estimate.available_deposit,
            original_savings: input.deposit,
            other_charges: round.estimate.other_charges,
            loan_to_value_ratio: round.record.lvr,
            monthly_repayment,
            is_serviceable,
            surplus,
            total_income: household.total_income,
            annual_net_income: household.annual_net_income,
            total_expenses: household.monthly_expenses,
            total_debt: household.debt.total_monthly,
            iterations: iteration_results.len() as u32,
            iteration_results,
            final_rate: quote.rate,
            comparison_rate: quote.comparison_rate,
            convergence,
            debt_breakdown: household.debt,
        }
    }
}

fn seed_lvr(input: &CalculationInput) -> f64 {
    if input.deposit > 0.0 {
        (1.0 - input.deposit / input.property_value) * 100.0
    } else {
        NO_DEPOSIT_LVR
    }
}

fn seed_loan_amount(input: &CalculationInput) -> f64 {
    (input.property_value - input.deposit).max(0.0)
}

fn other_charges(property_value: f64) -> f64 {
    OTHER_CHARGES_FLAT + property_value * OTHER_CHARGES_RATE
}

/// Loan as a percentage of value. A non-positive value with a positive loan
/// is treated as fully leveraged.
pub fn loan_to_value_ratio(loan_amount: f64, property_value: f64) -> f64 {
    if property_value > 0.0 {
        loan_amount * 100.0 / property_value
    } else if loan_amount > 0.0 {
        100.0
    } else {
        0.0
    }
}

/// Principal repayable by `periods` monthly payments at `annual_rate_pct`.
/// A zero rate falls back to `payment * periods`.
pub fn present_value(payment: f64, annual_rate_pct: f64, periods: u32) -> f64 {
    let r = annual_rate_pct / 100.0 / 12.0;
    let n = periods as f64;
    if r == 0.0 {
        return payment * n;
    }
    payment * (1.0 - (1.0 + r).powf(-n)) / r
}

/// Monthly payment amortising `principal` over `periods` at `annual_rate_pct`.
/// A zero rate falls back to `principal / periods`.
pub fn amortizing_payment(principal: f64, annual_rate_pct: f64, periods: u32) -> f64 {
    if periods == 0 {
        return principal;
    }
    let r = annual_rate_pct / 100.0 / 12.0;
    let n = periods as f64;
    if r == 0.0 {
        return principal / n;
    }
    principal * r / (1.0 - (1.0 + r).powf(-n))
}

/// Serviceable when the surplus is zero or better.
pub fn serviceability_verdict(monthly_disposable: f64, payment: f64) -> (bool, f64) {
    let mut surplus = monthly_disposable - payment;
    if surplus.abs() < SURPLUS_NOISE {
        surplus = 0.0;
    }
    (surplus >= 0.0, surplus)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::{LvrBucket, RateConfiguration};
    use crate::core::types::{
        BorrowerInfo, BorrowerType, FinancialInput, LoanPreferences, ProductType, RepaymentType,
    };
    use chrono::NaiveDate;
    use proptest::prelude::{prop_assert, prop_assert_eq, proptest};

    const EPS: f64 = 1e-6;

    fn assert_approx(actual: f64, expected: f64) {
        assert!(
            (actual - expected).abs() <= EPS,
            "expected {expected}, got {actual}"
        );
    }

    fn sample_input() -> CalculationInput {
        CalculationInput {
            borrowers: vec![BorrowerInfo::salaried(FinancialInput::annual(90_000.0))],
            dependents: 0,
            expenses: FinancialInput::monthly(2_000.0),
            existing_debt: None,
            credit_card_limit: None,
            interest_rate: None,
            loan_term: 30,
            property_value: 800_000.0,
            deposit: 200_000.0,
            state: State::NSW,
            is_first_home_buyer: false,
            is_investor: false,
            base_rate: 5.5,
            preferences: LoanPreferences::default(),
        }
    }

    fn rate_row(bucket: LvrBucket, rate: f64) -> RateConfiguration {
        RateConfiguration {
            id: format!("{bucket:?}"),
            product_name: "Standard Variable".to_string(),
            lender: "Test Bank".to_string(),
            product_type: ProductType::Variable,
            repayment_type: RepaymentType::PrincipalAndInterest,
            borrower_type: BorrowerType::OwnerOccupier,
            lvr_range: bucket,
            has_offset: false,
            has_redraw: false,
            rate,
            comparison_rate: rate + 0.05,
            max_lvr: 95.0,
            min_loan_amount: 0.0,
            max_loan_amount: None,
            is_first_home_buyer_eligible: true,
            effective_date: NaiveDate::from_ymd_opt(2024, 7, 1).expect("valid date"),
        }
    }

    fn table_calculator(rates: [f64; 6]) -> Calculator {
        let rows = LvrBucket::ALL
            .into_iter()
            .zip(rates)
            .map(|(bucket, rate)| rate_row(bucket, rate))
            .collect();
        Calculator::with_rate_table(Arc::new(RateTable::new(rows).expect("valid table")))
    }

    fn resolve_at(calc: &Calculator, input: &CalculationInput, lvr: f64, loan: f64) -> f64 {
        calc.resolve_quote(input, lvr, loan).rate
    }

    #[test]
    fn zero_rate_annuity_falls_back_to_linear() {
        assert_approx(present_value(1_000.0, 0.0, 12), 12_000.0);
        assert_approx(amortizing_payment(12_000.0, 0.0, 12), 1_000.0);
    }

    #[test]
    fn payment_matches_hand_calculation() {
        // 500k over 30 years at 6 %: standard table value
        assert!((amortizing_payment(500_000.0, 6.0, 360) - 2_997.75).abs() < 0.01);
    }

    #[test]
    fn serviceability_boundary_is_inclusive() {
        let (serviceable, surplus) = serviceability_verdict(3_000.0, 3_000.0);
        assert!(serviceable);
        assert_eq!(surplus, 0.0);

        let (serviceable, surplus) = serviceability_verdict(3_000.0, 3_000.01);
        assert!(!serviceable);
        assert!(surplus < 0.0);
    }

    #[test]
    fn loan_whose_assessed_payment_equals_disposable_is_serviceable_with_zero_surplus() {
        let calc = Calculator::default();
        let mut input = sample_input();
        input.property_value = 1_500_000.0;
        let household = Household::assess(&input, calc.shading()).expect("finite household");
        let lvr_probe = 50.0;
        let rate = resolve_at(&calc, &input, lvr_probe, 400_000.0);
        let loan = present_value(household.monthly_disposable, rate + INTEREST_BUFFER, 360);
        assert!(loan_to_value_ratio(loan, input.property_value) <= 60.0);

        let result = calc
            .calculate_loan_serviceability(&input, loan)
            .expect("valid input");
        assert!(result.is_serviceable);
        assert_eq!(result.surplus, 0.0);
        assert_approx(result.monthly_repayment, household.monthly_disposable);
    }

    #[test]
    fn eighty_percent_lvr_resolves_seventy_to_eighty_band() {
        let calc = table_calculator([5.89, 5.99, 6.09, 6.39, 6.59, 6.89]);
        let input = sample_input();
        let result = calc
            .calculate_loan_serviceability(&input, 640_000.0)
            .expect("valid input");
        assert_eq!(result.loan_to_value_ratio, 80.0);
        assert_approx(result.assessment_rate, 6.09 + INTEREST_BUFFER);
    }

    #[test]
    fn single_borrower_nsw_scenario() {
        let calc = Calculator::default();
        let result = calc
            .calculate_borrowing_power_iterative(&sample_input())
            .expect("valid input");

        assert!(result.max_loan > 0.0);
        assert!(result.stamp_duty > 0.0);
        assert_eq!(result.is_serviceable, result.surplus >= 0.0);
        assert!(result.iterations >= 1 && result.iterations <= MAX_ITERATIONS);
        assert_eq!(result.iteration_results.len(), result.iterations as usize);
        assert_eq!(result.convergence, Convergence::Converged);
        assert_approx(result.total_income, 90_000.0);
        assert_approx(result.annual_net_income, 90_000.0 - 19_717.0);
        assert_eq!(result.original_savings, 200_000.0);
        assert!(result.deposit < 200_000.0);
        assert_approx(
            result.max_property,
            (result.max_loan + result.deposit).max(0.0),
        );
    }

    #[test]
    fn nsw_first_home_buyer_at_exemption_pays_no_duty() {
        let calc = Calculator::default();
        assert_eq!(calc.calculate_stamp_duty(650_000.0, State::NSW, true, false), 0.0);
    }

    #[test]
    fn final_rate_matches_rate_at_reported_lvr() {
        let calc = table_calculator([5.89, 5.99, 6.09, 6.39, 6.59, 6.89]);
        let input = sample_input();
        let result = calc
            .calculate_borrowing_power_iterative(&input)
            .expect("valid input");
        let expected = resolve_at(&calc, &input, result.loan_to_value_ratio, result.max_loan);
        assert_eq!(result.final_rate, expected);
    }

    #[test]
    fn oscillating_rate_card_stops_at_iteration_cap() {
        // Cheap money pushes LVR over 80, expensive money pulls it back under.
        let calc = table_calculator([3.0, 3.0, 3.0, 12.0, 12.0, 12.0]);
        let mut input = sample_input();
        input.deposit = 150_000.0;

        let result = calc
            .calculate_borrowing_power_iterative(&input)
            .expect("valid input");
        assert_eq!(result.iterations, MAX_ITERATIONS);
        assert_eq!(result.convergence, Convergence::MaxIterationsReached);
        let rates: Vec<f64> = result.iteration_results.iter().map(|r| r.rate).collect();
        assert_eq!(rates[0], 12.0);
        assert_eq!(rates[1], 3.0);
        assert_eq!(rates[2], 12.0);
    }

    #[test]
    fn observer_sees_every_iteration_in_order() {
        let calc = table_calculator([3.0, 3.0, 3.0, 12.0, 12.0, 12.0]);
        let mut input = sample_input();
        input.deposit = 150_000.0;

        let mut seen = Vec::new();
        let result = calc
            .calculate_borrowing_power_iterative_with_observer(
                &input,
                &mut |it: &IterationResult| seen.push(*it),
            )
            .expect("valid input");
        assert_eq!(seen, result.iteration_results);
        assert!(
            seen.iter()
                .enumerate()
                .all(|(idx, it)| it.iteration == idx as u32 + 1)
        );
    }

    #[test]
    fn single_pass_honours_explicit_interest_rate() {
        let calc = Calculator::default();
        let mut input = sample_input();
        input.interest_rate = Some(6.0);
        let result = calc.calculate_borrowing_power(&input).expect("valid input");

        assert_eq!(result.iterations, 1);
        assert_eq!(result.convergence, Convergence::SinglePass);
        assert_eq!(result.final_rate, 6.0);
        assert_eq!(result.iteration_results[0].rate, 6.0);
        let household = Household::assess(&input, calc.shading()).expect("finite household");
        assert_approx(
            result.max_loan,
            present_value(household.monthly_disposable, 8.0, 360),
        );
        assert_eq!(result.surplus, 0.0);
        assert!(result.is_serviceable);
    }

    #[test]
    fn no_deposit_seeds_rate_at_eighty_percent() {
        let calc = table_calculator([5.89, 5.99, 6.09, 6.39, 6.59, 6.89]);
        let mut input = sample_input();
        input.deposit = 0.0;
        let result = calc.calculate_borrowing_power(&input).expect("valid input");
        assert_eq!(result.final_rate, 6.09);
    }

    #[test]
    fn unmatched_rate_card_falls_back_to_default_rate() {
        let calc = table_calculator([5.89, 5.99, 6.09, 6.39, 6.59, 6.89]);
        let mut input = sample_input();
        input.is_investor = true;
        let result = calc.calculate_borrowing_power(&input).expect("valid input");
        assert_eq!(result.final_rate, DEFAULT_RATE_QUOTE.rate);
        assert_eq!(result.comparison_rate, DEFAULT_RATE_QUOTE.comparison_rate);
    }

    #[test]
    fn negative_disposable_income_yields_zero_loan() {
        let calc = Calculator::default();
        let mut input = sample_input();
        input.expenses = FinancialInput::monthly(9_000.0);
        let result = calc
            .calculate_borrowing_power_iterative(&input)
            .expect("valid input");

        assert_eq!(result.max_loan, 0.0);
        assert!(!result.is_serviceable);
        assert!(result.surplus < 0.0);
        assert!(result.max_property.is_finite() && result.max_property >= 0.0);
        assert!(result.loan_to_value_ratio.is_finite());
    }

    #[test]
    fn credit_card_limit_reduces_borrowing_power() {
        let calc = Calculator::default();
        let base = calc
            .calculate_borrowing_power_iterative(&sample_input())
            .expect("valid input");
        let mut input = sample_input();
        input.credit_card_limit = Some(20_000.0);
        let with_card = calc
            .calculate_borrowing_power_iterative(&input)
            .expect("valid input");

        assert_approx(with_card.debt_breakdown.credit_card_monthly, 760.0);
        assert_approx(with_card.total_debt, 760.0);
        assert!(with_card.max_loan < base.max_loan);
    }

    #[test]
    fn rejects_invalid_inputs_before_computing() {
        let calc = Calculator::default();

        let mut input = sample_input();
        input.property_value = 0.0;
        assert_eq!(
            calc.calculate_borrowing_power_iterative(&input).unwrap_err(),
            CalculationError::NonPositivePropertyValue
        );

        let mut input = sample_input();
        input.loan_term = 0;
        assert_eq!(
            calc.calculate_borrowing_power(&input).unwrap_err(),
            CalculationError::NonPositiveLoanTerm
        );

        let mut input = sample_input();
        input.deposit = -1.0;
        assert!(matches!(
            calc.calculate_loan_serviceability(&input, 100_000.0),
            Err(CalculationError::Negative { field }) if field == "deposit"
        ));

        let mut input = sample_input();
        input.borrowers[0].primary.amount = f64::NAN;
        assert!(matches!(
            calc.calculate_borrowing_power_iterative(&input),
            Err(CalculationError::NonFinite { .. })
        ));

        assert!(matches!(
            calc.calculate_loan_serviceability(&sample_input(), -5.0),
            Err(CalculationError::Negative { field }) if field == "loanAmount"
        ));
    }

    #[test]
    fn loan_term_beyond_limit_is_rejected_not_wrapped() {
        let calc = Calculator::default();
        for years in [101, 200_000_000, 400_000_000] {
            let mut input = sample_input();
            input.loan_term = years;
            let expected = CalculationError::LoanTermTooLong {
                max: crate::core::types::MAX_LOAN_TERM_YEARS,
            };
            assert_eq!(
                calc.calculate_borrowing_power_iterative(&input).unwrap_err(),
                expected
            );
            assert_eq!(calc.calculate_borrowing_power(&input).unwrap_err(), expected);
            assert_eq!(
                calc.calculate_loan_serviceability(&input, 500_000.0).unwrap_err(),
                expected
            );
        }
    }

    #[test]
    fn longest_accepted_term_still_charges_repayments() {
        let calc = Calculator::default();
        let mut input = sample_input();
        input.loan_term = crate::core::types::MAX_LOAN_TERM_YEARS;
        let result = calc
            .calculate_loan_serviceability(&input, 500_000.0)
            .expect("valid input");
        assert!(result.monthly_repayment > 0.0);
        assert!(result.surplus.is_finite());

        let payment = amortizing_payment(500_000.0, 6.0, u32::MAX);
        assert!(payment.is_finite() && payment > 0.0);
        assert!(present_value(1_000.0, 6.0, u32::MAX).is_finite());
    }

    #[test]
    fn income_overflowing_on_annualisation_is_rejected() {
        let calc = Calculator::default();
        let mut input = sample_input();
        input.borrowers[0].primary =
            FinancialInput::new(1e307, crate::core::types::Frequency::Weekly);

        assert_eq!(
            calc.calculate_borrowing_power_iterative(&input).unwrap_err(),
            CalculationError::NonFinite {
                field: "totalIncome".to_string()
            }
        );
        assert!(matches!(
            calc.calculate_loan_serviceability(&input, 100_000.0),
            Err(CalculationError::NonFinite { .. })
        ));
    }

    proptest! {
        #[test]
        fn prop_annuity_round_trip(
            principal in 1_000u32..5_000_000,
            rate_bp in 0u32..1_500,
            years in 1u32..41,
        ) {
            let principal = principal as f64;
            let rate = rate_bp as f64 / 100.0;
            let periods = years * 12;
            let payment = amortizing_payment(principal, rate, periods);
            let recovered = present_value(payment, rate, periods);
            prop_assert!(((recovered - principal) / principal).abs() <= 1e-6);
        }

        #[test]
        fn prop_solver_terminates_with_consistent_rate(
            income in 30_000u32..400_000,
            deposit in 0u32..600_000,
            property in 200_000u32..2_500_000,
            expenses in 500u32..6_000,
            first_home_buyer in proptest::prelude::any::<bool>(),
            use_table in proptest::prelude::any::<bool>(),
        ) {
            let calc = if use_table {
                table_calculator([5.89, 5.99, 6.09, 6.39, 6.59, 6.89])
            } else {
                Calculator::default()
            };
            let mut input = sample_input();
            input.borrowers = vec![BorrowerInfo::salaried(FinancialInput::annual(income as f64))];
            input.deposit = deposit as f64;
            input.property_value = property as f64;
            input.expenses = FinancialInput::monthly(expenses as f64);
            input.is_first_home_buyer = first_home_buyer;

            let result = calc.calculate_borrowing_power_iterative(&input).expect("valid input");
            prop_assert!(result.iterations >= 1 && result.iterations <= MAX_ITERATIONS);
            prop_assert_eq!(result.iteration_results.len(), result.iterations as usize);
            prop_assert!(result.max_loan.is_finite() && result.max_loan >= 0.0);
            prop_assert!(result.max_property.is_finite() && result.max_property >= 0.0);
            prop_assert!(result.loan_to_value_ratio.is_finite());
            prop_assert!(result.surplus.is_finite());
            prop_assert_eq!(result.is_serviceable, result.surplus >= 0.0);

            let at_lvr = resolve_at(&calc, &input, result.loan_to_value_ratio, result.max_loan);
            prop_assert_eq!(result.final_rate, at_lvr);
            if result.convergence == Convergence::Converged {
                let last = result.iteration_results.last().expect("non-empty trace");
                prop_assert!((result.final_rate - last.rate).abs() < RATE_TOLERANCE);
            }
        }
    }
}
