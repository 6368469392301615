use crate::infra::{build_engine, parse_hour, ServiceClock};
use clap::Args;
use dynamic_pricing::config::AppConfig;
use dynamic_pricing::error::AppError;
use dynamic_pricing::pricing::{
    BatchOutcome, ClampSide, CsvBatch, HourOfDay, PricingEngine, PricingResult, RawFactors,
};
use dynamic_pricing::telemetry;
use serde_json::Value;
use std::fs::File;
use std::io::{self, BufWriter, ErrorKind};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub(crate) struct QuoteArgs {
    /// JSON file holding a single pricing record
    #[arg(long, conflicts_with = "factors", required_unless_present = "factors")]
    pub(crate) input: Option<PathBuf>,
    /// Inline JSON pricing record
    #[arg(long)]
    pub(crate) factors: Option<String>,
    /// Hour of day (0-23). Defaults to the configured clock.
    #[arg(long, value_parser = parse_hour)]
    pub(crate) hour: Option<HourOfDay>,
    /// Print the per-factor multiplier breakdown
    #[arg(long)]
    pub(crate) explain: bool,
}

#[derive(Args, Debug)]
pub(crate) struct BatchArgs {
    /// CSV file with a header row of factor names
    #[arg(long)]
    pub(crate) input: PathBuf,
    /// Destination CSV (defaults to stdout)
    #[arg(long)]
    pub(crate) output: Option<PathBuf>,
    /// Hour of day (0-23) applied to every row. Defaults to the configured clock.
    #[arg(long, value_parser = parse_hour)]
    pub(crate) hour: Option<HourOfDay>,
}

pub(crate) fn run_quote(args: QuoteArgs) -> Result<(), AppError> {
    let QuoteArgs {
        input,
        factors,
        hour,
        explain,
    } = args;

    let (engine, hour) = prepare(hour)?;

    let raw = match (input, factors) {
        (Some(path), _) => std::fs::read_to_string(path)?,
        (None, Some(inline)) => inline,
        (None, None) => {
            return Err(io::Error::new(
                ErrorKind::InvalidInput,
                "provide a record with --input or --factors",
            )
            .into())
        }
    };
    let record = parse_record(&raw)?;

    let result = engine.quote(&record, hour)?;
    render_quote(&result, hour, engine.registry().version(), explain);
    Ok(())
}

pub(crate) fn run_batch(args: BatchArgs) -> Result<(), AppError> {
    let BatchArgs {
        input,
        output,
        hour,
    } = args;

    let (engine, hour) = prepare(hour)?;

    let batch = CsvBatch::from_path(&input)?;
    let outcome = engine.batch().evaluate(&batch.records(), hour);

    match &output {
        Some(path) => batch.write_priced(&outcome, BufWriter::new(File::create(path)?))?,
        None => batch.write_priced(&outcome, io::stdout().lock())?,
    }

    eprintln!("{}", batch_summary(&outcome, hour, engine.registry().version()));
    Ok(())
}

/// Loads configuration, installs logging and builds the engine for one CLI run.
fn prepare(hour: Option<HourOfDay>) -> Result<(PricingEngine, HourOfDay), AppError> {
    let config = AppConfig::load()?;
    telemetry::init(&config.telemetry)?;

    let engine = build_engine(&config.pricing)?;
    let hour = ServiceClock::from_config(&config.pricing).resolve(hour);
    Ok((engine, hour))
}

fn parse_record(raw: &str) -> Result<RawFactors, AppError> {
    match serde_json::from_str::<Value>(raw).map_err(io::Error::from)? {
        Value::Object(record) => Ok(record),
        other => Err(io::Error::new(
            ErrorKind::InvalidData,
            format!("pricing record must be a JSON object, got {other}"),
        )
        .into()),
    }
}

fn render_quote(result: &PricingResult, hour: HourOfDay, version: &str, explain: bool) {
    println!("Predicted price: {:.2}", result.price);
    if !explain {
        return;
    }

    println!(
        "Base {:.2} at {:02}:00 | tables {} | change {:+.2}%",
        result.base_price,
        hour.get(),
        version,
        result.change_pct()
    );
    println!("Multipliers:");
    for markup in &result.adjustments {
        println!(
            "  - {:<24} {:<28} x{:.4}",
            markup.factor.label(),
            markup.input,
            markup.multiplier
        );
    }
    println!(
        "Composed {:.4} within [{:.2}, {:.2}]{}",
        result.composed_price,
        result.min_price,
        result.max_price,
        clamp_note(result.clamped)
    );
}

fn clamp_note(clamped: Option<ClampSide>) -> &'static str {
    match clamped {
        Some(ClampSide::Floor) => " -> clamped to floor",
        Some(ClampSide::Ceiling) => " -> clamped to ceiling",
        None => "",
    }
}

fn batch_summary(outcome: &BatchOutcome, hour: HourOfDay, version: &str) -> String {
    format!(
        "Priced {} of {} rows at {:02}:00 (tables {}); {} rejected",
        outcome.priced(),
        outcome.len(),
        hour.get(),
        version,
        outcome.failed()
    )
}
