use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::to_string_pretty;

use dosage_engine::{build_signature, calculate_days_supply, DaysSupplyContext, MedicationRequestContext};

#[derive(Parser, Debug)]
#[command(name = "dosage-engine")]
#[command(about = "Render a medication signature and/or days-supply from a JSON request")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the FHIR Dosage signature for a MedicationRequestContext
    Signature {
        /// Input file (MedicationRequestContext JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (if omitted, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Calculate days-supply for a DaysSupplyContext
    DaysSupply {
        /// Input file (DaysSupplyContext JSON)
        #[arg(short, long)]
        input: PathBuf,

        /// Output file (if omitted, prints to stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn write_output(json: String, output: Option<PathBuf>) -> Result<()> {
    if let Some(output_path) = output {
        fs::write(&output_path, json).with_context(|| format!("Failed to write {:?}", output_path))?;
    } else {
        println!("{json}");
    }
    Ok(())
}

fn run_signature(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let input_str = fs::read_to_string(&input).with_context(|| format!("Failed to read {:?}", input))?;
    let ctx: MedicationRequestContext =
        serde_json::from_str(&input_str).context("Invalid MedicationRequestContext JSON payload")?;

    let dosages = build_signature(&ctx).context("Failed to build medication signature")?;
    let json = to_string_pretty(&dosages)?;
    write_output(json, output)
}

fn run_days_supply(input: PathBuf, output: Option<PathBuf>) -> Result<()> {
    let input_str = fs::read_to_string(&input).with_context(|| format!("Failed to read {:?}", input))?;
    let ctx: DaysSupplyContextWire =
        serde_json::from_str(&input_str).context("Invalid DaysSupplyContext JSON payload")?;

    let result = calculate_days_supply(&ctx.into()).context("Failed to calculate days-supply")?;
    let json = to_string_pretty(&DaysSupplyResultWire::from(result))?;
    write_output(json, output)
}

/// The CLI's own JSON shape for `DaysSupplyContext`/`DaysSupplyResult` —
/// `camelCase` wire fields over the library's snake_case Rust fields, the
/// same translation `fhir_types` applies via `#[serde(rename_all =
/// "camelCase")]` on its own structs.
#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct DaysSupplyContextWire {
    package_quantity: f64,
    package_unit: String,
    dose_amount: f64,
    dose_unit: String,
    timing: dosage_engine::medication::FrequencyInput,
    medication: dosage_engine::MedicationProfile,
    #[serde(default)]
    titration_phase_doses: Option<Vec<f64>>,
}

impl From<DaysSupplyContextWire> for DaysSupplyContext {
    fn from(wire: DaysSupplyContextWire) -> Self {
        DaysSupplyContext {
            package_quantity: wire.package_quantity,
            package_unit: wire.package_unit,
            dose_amount: wire.dose_amount,
            dose_unit: wire.dose_unit,
            timing: wire.timing,
            medication: wire.medication,
            titration_phase_doses: wire.titration_phase_doses,
        }
    }
}

#[derive(serde::Serialize)]
#[serde(rename_all = "camelCase")]
struct DaysSupplyResultWire {
    days_supply: u32,
    calculation_method: &'static str,
    breakdown: Vec<dosage_engine::PhaseBreakdown>,
    confidence: f64,
    warnings: Vec<String>,
}

impl From<dosage_engine::DaysSupplyResult> for DaysSupplyResultWire {
    fn from(result: dosage_engine::DaysSupplyResult) -> Self {
        Self {
            days_supply: result.days_supply,
            calculation_method: result.calculation_method,
            breakdown: result.breakdown,
            confidence: result.confidence,
            warnings: result.warnings,
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Signature { input, output } => run_signature(input, output),
        Command::DaysSupply { input, output } => run_days_supply(input, output),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();
    run(cli)
}
