use std::path::{Path, PathBuf};
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tracing::info;

use super::{CalcArgs, StampDutyResponse, build_input, run_http_server};
use crate::config::AppConfig;
use crate::core::{Calculator, RateTable, RateTableError, State};
use crate::error::AppError;
use crate::telemetry;

#[derive(Parser, Debug)]
#[command(
    name = "borrowing-power",
    about = "Australian mortgage borrowing power and serviceability calculator",
    version
)]
pub struct Cli {
    /// Rate table JSON; overrides BORROWING_POWER_RATES
    #[arg(long, global = true)]
    rates: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Solve maximum loan and property value
    Calc(CalcCommand),
    /// Check whether a given loan amount is serviceable
    Serviceability(ServiceabilityArgs),
    /// Transfer duty for a purchase price
    StampDuty(StampDutyArgs),
    /// Start the HTTP API
    Serve(ServeArgs),
}

#[derive(Args, Debug)]
struct CalcCommand {
    #[command(flatten)]
    input: CalcArgs,
    /// Solve once at the seed rate instead of iterating LVR and rate
    #[arg(long)]
    single_pass: bool,
}

#[derive(Args, Debug)]
struct ServiceabilityArgs {
    #[command(flatten)]
    input: CalcArgs,
    #[arg(long)]
    loan_amount: f64,
}

#[derive(Args, Debug)]
struct StampDutyArgs {
    #[arg(long)]
    value: f64,
    #[arg(long, default_value = "NSW")]
    state: State,
    #[arg(long)]
    first_home_buyer: bool,
    #[arg(long)]
    investor: bool,
}

#[derive(Args, Debug, Default)]
struct ServeArgs {
    /// Override the configured host for the HTTP server
    #[arg(long)]
    host: Option<String>,
    /// Override the configured port for the HTTP server
    #[arg(long)]
    port: Option<u16>,
}

pub async fn run() -> Result<(), AppError> {
    run_with(Cli::parse()).await
}

pub async fn run_with(cli: Cli) -> Result<(), AppError> {
    let mut config = AppConfig::load()?;
    if let Some(path) = cli.rates {
        config.rates_path = Some(path);
    }
    telemetry::init(&config.telemetry)?;

    let calculator = load_calculator(config.rates_path.as_deref())?;

    match cli.command {
        Command::Calc(cmd) => {
            let input = build_input(cmd.input).map_err(AppError::BadRequest)?;
            let result = if cmd.single_pass {
                calculator.calculate_borrowing_power(&input)?
            } else {
                calculator.calculate_borrowing_power_iterative(&input)?
            };
            print_json(&result)
        }
        Command::Serviceability(args) => {
            let input = build_input(args.input).map_err(AppError::BadRequest)?;
            let result = calculator.calculate_loan_serviceability(&input, args.loan_amount)?;
            print_json(&result)
        }
        Command::StampDuty(args) => {
            if !args.value.is_finite() || args.value < 0.0 {
                return Err(AppError::BadRequest(
                    "--value must be a finite number >= 0".to_string(),
                ));
            }
            let stamp_duty = calculator.calculate_stamp_duty(
                args.value,
                args.state,
                args.first_home_buyer,
                args.investor,
            );
            print_json(&StampDutyResponse {
                state: args.state,
                value: args.value,
                is_first_home_buyer: args.first_home_buyer,
                stamp_duty,
            })
        }
        Command::Serve(mut args) => {
            if let Some(host) = args.host.take() {
                config.server.host = host;
            }
            if let Some(port) = args.port.take() {
                config.server.port = port;
            }
            let addr = config.server.socket_addr()?;
            run_http_server(Arc::new(calculator), addr).await?;
            Ok(())
        }
    }
}

/// Table-driven calculator when a rate file is given, tiered model otherwise.
pub fn load_calculator(rates_path: Option<&Path>) -> Result<Calculator, RateTableError> {
    match rates_path {
        Some(path) => {
            let table = RateTable::from_path(path)?;
            info!(
                path = %path.display(),
                configurations = table.len(),
                "loaded rate table"
            );
            Ok(Calculator::with_rate_table(Arc::new(table)))
        }
        None => {
            info!("no rate table configured, using tiered rate model");
            Ok(Calculator::default())
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), AppError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
