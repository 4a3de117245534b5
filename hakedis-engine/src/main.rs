//! hakedis: operator CLI for settlement snapshots
//!
//! Reads a JSON settlement document (group, records, period, volumes and
//! optional overrides), computes it and writes the tabular export.

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use hakedis_engine::core::config::parse_delimiter;
use hakedis_engine::utils::init_logger_with_file;
use hakedis_engine::{
    Confirmation, EngineConfig, FinalizeOutcome, SettlementDocument, SettlementService,
};
use std::fs::File;
use std::io::{self, BufReader, Read, Write};
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "hakedis", version, about = "Income-sharing settlement calculator")]
struct Cli {
    /// Tracing filter, e.g. `info` or `hakedis_engine=debug`
    #[arg(long, global = true, env = "LOG_LEVEL")]
    log_level: Option<String>,

    /// Write logs to a daily rolling file in this directory
    #[arg(long, global = true, env = "LOG_DIR")]
    log_dir: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Compute a settlement document and export it
    Calculate(CalculateArgs),
    /// Compute a settlement document and try to finalize it
    Finalize(FinalizeArgs),
}

#[derive(Args, Debug)]
struct IoArgs {
    /// JSON settlement document (`-` for stdin)
    #[arg(short = 'i', long = "input")]
    input: String,

    /// Output file (stdout by default)
    #[arg(short = 'o', long = "output")]
    output: Option<String>,

    /// Single-character CSV delimiter
    #[arg(long, env = "REPORT_DELIMITER")]
    delimiter: Option<String>,

    /// Emit the full report (header and rows) as JSON instead of CSV
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct CalculateArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Count negative shares toward the share totals
    #[arg(long)]
    include_negative: bool,
}

#[derive(Args, Debug)]
struct FinalizeArgs {
    #[command(flatten)]
    io: IoArgs,

    /// Acknowledge every manual override currently set
    #[arg(long, conflicts_with = "decline")]
    confirm: bool,

    /// Decline finalization when overrides are set
    #[arg(long)]
    decline: bool,
}

fn main() -> Result<ExitCode> {
    dotenv::dotenv().ok();
    let cli = Cli::parse();

    let mut config = EngineConfig::from_env();
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Some(dir) = &cli.log_dir {
        config.log_dir = Some(dir.clone());
    }
    init_logger_with_file(
        Some(config.log_level.as_str()),
        config.log_json,
        config.log_dir.as_deref(),
    );

    tracing::debug!(environment = %config.environment, "hakedis starting");

    match cli.command {
        Command::Calculate(args) => calculate(args, config),
        Command::Finalize(args) => finalize(args, config),
    }
}

fn calculate(args: CalculateArgs, mut config: EngineConfig) -> Result<ExitCode> {
    apply_io_config(&args.io, &mut config)?;
    let mut document = read_document(&args.io.input)?;
    if args.include_negative {
        document.include_negative_values = Some(true);
    }

    let (service, record) = SettlementService::from_document(document, config)?;
    write_export(&service, record.id, &args.io)?;
    Ok(ExitCode::SUCCESS)
}

fn finalize(args: FinalizeArgs, mut config: EngineConfig) -> Result<ExitCode> {
    apply_io_config(&args.io, &mut config)?;
    let document = read_document(&args.io.input)?;
    let (service, record) = SettlementService::from_document(document, config)?;

    let confirmation = if args.confirm {
        Confirmation::Confirmed(record.manual_overrides.active_fields())
    } else if args.decline {
        Confirmation::Declined
    } else {
        Confirmation::Unconfirmed
    };

    match service.finalize(record.id, confirmation)? {
        FinalizeOutcome::Finalized => {
            write_export(&service, record.id, &args.io)?;
            Ok(ExitCode::SUCCESS)
        }
        FinalizeOutcome::ConfirmationRequired(fields) => {
            eprintln!("Manual overrides are set; re-run with --confirm to finalize:");
            for field in fields {
                eprintln!("  - {} ({})", field.label(), field.as_str());
            }
            Ok(ExitCode::from(2))
        }
        FinalizeOutcome::Aborted => {
            eprintln!("Finalize declined; nothing was saved");
            Ok(ExitCode::from(1))
        }
    }
}

fn apply_io_config(io: &IoArgs, config: &mut EngineConfig) -> Result<()> {
    if let Some(delimiter) = &io.delimiter {
        match parse_delimiter(delimiter) {
            Some(byte) => config.report_delimiter = byte,
            None => bail!("delimiter must be a single ASCII character, got {delimiter:?}"),
        }
    }
    Ok(())
}

fn read_document(input: &str) -> Result<SettlementDocument> {
    let reader: Box<dyn Read> = if input == "-" {
        Box::new(io::stdin())
    } else {
        Box::new(File::open(input).with_context(|| format!("failed to open {input}"))?)
    };
    serde_json::from_reader(BufReader::new(reader))
        .with_context(|| format!("failed to parse settlement document {input}"))
}

fn write_export(service: &SettlementService, id: i64, io_args: &IoArgs) -> Result<()> {
    let report = service.export(id)?;

    let mut writer: Box<dyn Write> = match &io_args.output {
        Some(path) => {
            Box::new(File::create(path).with_context(|| format!("failed to create {path}"))?)
        }
        None => Box::new(io::stdout()),
    };

    if io_args.json {
        serde_json::to_writer_pretty(&mut writer, &report)?;
        writeln!(writer)?;
    } else {
        report.write_csv(&mut writer, service.config().report_delimiter)?;
    }
    writer.flush()?;

    let header = &report.header;
    tracing::info!(
        group = %header.group_name,
        period = %header.period,
        status = %header.status,
        rows = report.rows.len(),
        excluded = header.excluded_count,
        anomalies = header.anomaly_count,
        "Settlement exported"
    );
    Ok(())
}
