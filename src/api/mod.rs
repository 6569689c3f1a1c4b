use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        Json, Query, State as AxumState,
        rejection::{JsonRejection, QueryRejection},
    },
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use clap::Args;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tracing::{debug, info};

use crate::core::{
    BorrowerInfo, CalculationInput, CalculationResult, Calculator, FinancialInput, Frequency,
    LoanPreferences, ProductType, RepaymentType, ServiceabilityResult, State,
};
use crate::error::AppError;

pub mod cli;

pub const DEFAULT_LOAN_TERM_YEARS: u32 = 30;
pub const DEFAULT_BASE_RATE: f64 = 5.5;

/// Household and loan flags shared by the `calc` and `serviceability` commands.
#[derive(Args, Debug, Clone)]
pub struct CalcArgs {
    /// Primary income per borrower; repeat for joint applications
    #[arg(long = "income", required = true)]
    incomes: Vec<f64>,
    #[arg(long, default_value = "annual")]
    income_frequency: Frequency,
    /// Supplementary (bonus, overtime) income of the first borrower, annual
    #[arg(long, default_value_t = 0.0)]
    supplementary_income: f64,
    /// Other income of the first borrower, annual
    #[arg(long, default_value_t = 0.0)]
    other_income: f64,
    /// Rental income of the first borrower, annual
    #[arg(long, default_value_t = 0.0)]
    rental_income: f64,
    #[arg(long, default_value_t = 0)]
    dependents: u32,
    #[arg(long)]
    expenses: f64,
    #[arg(long, default_value = "monthly")]
    expenses_frequency: Frequency,
    /// Existing debt repayments, monthly
    #[arg(long, default_value_t = 0.0)]
    existing_debt: f64,
    #[arg(long, default_value_t = 0.0)]
    credit_card_limit: f64,
    /// Fixed rate in percent; only the single-pass solve honours it
    #[arg(long)]
    interest_rate: Option<f64>,
    /// Loan term in years
    #[arg(long, default_value_t = DEFAULT_LOAN_TERM_YEARS)]
    loan_term: u32,
    #[arg(long)]
    property_value: f64,
    #[arg(long, default_value_t = 0.0)]
    deposit: f64,
    #[arg(long, default_value = "NSW")]
    state: State,
    #[arg(long)]
    first_home_buyer: bool,
    #[arg(long)]
    investor: bool,
    /// Base rate in percent for the tiered rate model
    #[arg(long, default_value_t = DEFAULT_BASE_RATE)]
    base_rate: f64,
    #[arg(long, default_value = "variable")]
    product_type: ProductType,
    #[arg(long, default_value = "P&I")]
    repayment_type: RepaymentType,
    #[arg(long)]
    offset: bool,
    #[arg(long)]
    redraw: bool,
}

#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum SolveMode {
    #[default]
    Iterative,
    #[serde(alias = "single-pass", alias = "single_pass")]
    Single,
}

/// Request body for the calculation routes. Every field is optional and
/// falls back to the sample household.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct CalculationPayload {
    borrowers: Option<Vec<BorrowerInfo>>,
    dependents: Option<u32>,
    expenses: Option<FinancialInput>,
    existing_debt: Option<FinancialInput>,
    credit_card_limit: Option<f64>,
    interest_rate: Option<f64>,
    loan_term: Option<u32>,
    property_value: Option<f64>,
    deposit: Option<f64>,
    state: Option<State>,
    is_first_home_buyer: Option<bool>,
    is_investor: Option<bool>,
    base_rate: Option<f64>,
    product_type: Option<ProductType>,
    repayment_type: Option<RepaymentType>,
    has_offset: Option<bool>,
    has_redraw: Option<bool>,

    mode: Option<SolveMode>,
    loan_amount: Option<f64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StampDutyPayload {
    value: f64,
    #[serde(default)]
    state: Option<State>,
    #[serde(default)]
    is_first_home_buyer: bool,
    #[serde(default)]
    is_investor: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StampDutyResponse {
    pub state: State,
    pub value: f64,
    pub is_first_home_buyer: bool,
    pub stamp_duty: f64,
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
}

pub fn build_input(args: CalcArgs) -> Result<CalculationInput, String> {
    if args.incomes.is_empty() {
        return Err("--income must be given at least once".to_string());
    }

    let mut borrowers: Vec<BorrowerInfo> = args
        .incomes
        .iter()
        .map(|&amount| BorrowerInfo::salaried(FinancialInput::new(amount, args.income_frequency)))
        .collect();
    let first = &mut borrowers[0];
    first.supplementary = annual_if_nonzero(args.supplementary_income);
    first.other = annual_if_nonzero(args.other_income);
    first.rental = annual_if_nonzero(args.rental_income);

    Ok(CalculationInput {
        borrowers,
        dependents: args.dependents,
        expenses: FinancialInput::new(args.expenses, args.expenses_frequency),
        existing_debt: (args.existing_debt != 0.0)
            .then(|| FinancialInput::monthly(args.existing_debt)),
        credit_card_limit: (args.credit_card_limit != 0.0).then_some(args.credit_card_limit),
        interest_rate: args.interest_rate,
        loan_term: args.loan_term,
        property_value: args.property_value,
        deposit: args.deposit,
        state: args.state,
        is_first_home_buyer: args.first_home_buyer,
        is_investor: args.investor,
        base_rate: args.base_rate,
        preferences: LoanPreferences {
            product_type: args.product_type,
            repayment_type: args.repayment_type,
            has_offset: args.offset,
            has_redraw: args.redraw,
        },
    })
}

// Zero means "no such stream"; negatives pass through so validation rejects them.
fn annual_if_nonzero(amount: f64) -> Option<FinancialInput> {
    (amount != 0.0).then(|| FinancialInput::annual(amount))
}

fn default_args_for_api() -> CalcArgs {
    CalcArgs {
        incomes: vec![90_000.0],
        income_frequency: Frequency::Annual,
        supplementary_income: 0.0,
        other_income: 0.0,
        rental_income: 0.0,
        dependents: 0,
        expenses: 2_000.0,
        expenses_frequency: Frequency::Monthly,
        existing_debt: 0.0,
        credit_card_limit: 0.0,
        interest_rate: None,
        loan_term: DEFAULT_LOAN_TERM_YEARS,
        property_value: 800_000.0,
        deposit: 200_000.0,
        state: State::NSW,
        first_home_buyer: false,
        investor: false,
        base_rate: DEFAULT_BASE_RATE,
        product_type: ProductType::Variable,
        repayment_type: RepaymentType::PrincipalAndInterest,
        offset: false,
        redraw: false,
    }
}

fn input_from_payload(payload: &CalculationPayload) -> Result<CalculationInput, String> {
    let mut input = build_input(default_args_for_api())?;

    if let Some(borrowers) = &payload.borrowers {
        input.borrowers = borrowers.clone();
    }
    if let Some(v) = payload.dependents {
        input.dependents = v;
    }
    if let Some(v) = payload.expenses {
        input.expenses = v;
    }
    if payload.existing_debt.is_some() {
        input.existing_debt = payload.existing_debt;
    }
    if payload.credit_card_limit.is_some() {
        input.credit_card_limit = payload.credit_card_limit;
    }
    if payload.interest_rate.is_some() {
        input.interest_rate = payload.interest_rate;
    }
    if let Some(v) = payload.loan_term {
        input.loan_term = v;
    }
    if let Some(v) = payload.property_value {
        input.property_value = v;
    }
    if let Some(v) = payload.deposit {
        input.deposit = v;
    }
    if let Some(v) = payload.state {
        input.state = v;
    }
    if let Some(v) = payload.is_first_home_buyer {
        input.is_first_home_buyer = v;
    }
    if let Some(v) = payload.is_investor {
        input.is_investor = v;
    }
    if let Some(v) = payload.base_rate {
        input.base_rate = v;
    }
    if let Some(v) = payload.product_type {
        input.preferences.product_type = v;
    }
    if let Some(v) = payload.repayment_type {
        input.preferences.repayment_type = v;
    }
    if let Some(v) = payload.has_offset {
        input.preferences.has_offset = v;
    }
    if let Some(v) = payload.has_redraw {
        input.preferences.has_redraw = v;
    }

    Ok(input)
}

pub fn router(calculator: Arc<Calculator>) -> Router {
    Router::new()
        .route("/healthz", get(health_handler))
        .route("/api/borrowing-power", post(borrowing_power_handler))
        .route("/api/serviceability", post(serviceability_handler))
        .route(
            "/api/stamp-duty",
            get(stamp_duty_get_handler).post(stamp_duty_post_handler),
        )
        .fallback(not_found_handler)
        .with_state(calculator)
}

pub async fn run_http_server(calculator: Arc<Calculator>, addr: SocketAddr) -> std::io::Result<()> {
    let app = router(calculator);
    let listener = TcpListener::bind(addr).await?;
    info!(%addr, "borrowing power API ready");
    axum::serve(listener, app).await
}

async fn health_handler() -> Response {
    json_response(StatusCode::OK, HealthResponse { status: "ok" })
}

async fn not_found_handler() -> Response {
    error_response(StatusCode::NOT_FOUND, "Not found")
}

async fn borrowing_power_handler(
    AxumState(calculator): AxumState<Arc<Calculator>>,
    payload: Result<Json<CalculationPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(&rejection.body_text()),
    };
    match solve(&calculator, &payload) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => err.into_response(),
    }
}

fn solve(
    calculator: &Calculator,
    payload: &CalculationPayload,
) -> Result<CalculationResult, AppError> {
    let input = input_from_payload(payload).map_err(AppError::BadRequest)?;
    let mode = payload.mode.unwrap_or_default();
    debug!(?mode, state = %input.state, "borrowing power request");
    let result = match mode {
        SolveMode::Iterative => calculator.calculate_borrowing_power_iterative(&input)?,
        SolveMode::Single => calculator.calculate_borrowing_power(&input)?,
    };
    Ok(result)
}

async fn serviceability_handler(
    AxumState(calculator): AxumState<Arc<Calculator>>,
    payload: Result<Json<CalculationPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return rejection_response(&rejection.body_text()),
    };
    match serviceability(&calculator, &payload) {
        Ok(result) => json_response(StatusCode::OK, result),
        Err(err) => err.into_response(),
    }
}

fn serviceability(
    calculator: &Calculator,
    payload: &CalculationPayload,
) -> Result<ServiceabilityResult, AppError> {
    let loan_amount = payload
        .loan_amount
        .ok_or_else(|| AppError::BadRequest("loanAmount is required".to_string()))?;
    let input = input_from_payload(payload).map_err(AppError::BadRequest)?;
    Ok(calculator.calculate_loan_serviceability(&input, loan_amount)?)
}

async fn stamp_duty_get_handler(
    AxumState(calculator): AxumState<Arc<Calculator>>,
    query: Result<Query<StampDutyPayload>, QueryRejection>,
) -> Response {
    match query {
        Ok(Query(payload)) => stamp_duty_response(&calculator, payload),
        Err(rejection) => rejection_response(&rejection.body_text()),
    }
}

async fn stamp_duty_post_handler(
    AxumState(calculator): AxumState<Arc<Calculator>>,
    payload: Result<Json<StampDutyPayload>, JsonRejection>,
) -> Response {
    match payload {
        Ok(Json(payload)) => stamp_duty_response(&calculator, payload),
        Err(rejection) => rejection_response(&rejection.body_text()),
    }
}

fn stamp_duty_response(calculator: &Calculator, payload: StampDutyPayload) -> Response {
    if !payload.value.is_finite() || payload.value < 0.0 {
        return error_response(StatusCode::BAD_REQUEST, "value must be a finite number >= 0");
    }
    let state = payload
        .state
        .unwrap_or_else(|| calculator.stamp_duty_table().baseline());
    let stamp_duty = calculator.calculate_stamp_duty(
        payload.value,
        state,
        payload.is_first_home_buyer,
        payload.is_investor,
    );
    json_response(
        StatusCode::OK,
        StampDutyResponse {
            state,
            value: payload.value,
            is_first_home_buyer: payload.is_first_home_buyer,
            stamp_duty,
        },
    )
}

fn rejection_response(detail: &str) -> Response {
    error_response(
        StatusCode::BAD_REQUEST,
        &format!("Invalid request payload: {detail}"),
    )
}

fn json_response<T: Serialize>(status: StatusCode, body: T) -> Response {
    let mut response = (status, Json(body)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        "no-store".parse().expect("valid header"),
    );
    response
}

fn error_response(status: StatusCode, msg: &str) -> Response {
    json_response(
        status,
        ErrorResponse {
            error: msg.to_string(),
        },
    )
}
