use std::path::PathBuf;
use std::process;

use anyhow::Context;
use chrono::NaiveDate;
use clap::Parser;
use errstat::{DateSource, InputLocator, ProcessorBuilder, RunSummary, WEEKLY_REPORT_SHEET};
use tracing::debug;

/// Aggregate the daily OHT error log into the report workbook
///
/// Reads the error log, writes the `{date}_errorStatistics` sheet, inserts the
/// failure rate into `Weekly_Report` and moves that sheet to the end.
#[derive(Debug, Parser)]
#[command(name = "errstat", version, about)]
struct Args {
    /// Directory searched for the error log
    #[arg(long, env = "ERRSTAT_INPUT_DIR", default_value = "data", value_name = "DIR")]
    input_dir: PathBuf,

    /// Preferred error log file name inside the input directory
    #[arg(
        long,
        env = "ERRSTAT_INPUT_FILE",
        default_value = "ErrorTimeStatistics.xlsx",
        value_name = "NAME"
    )]
    input_file: String,

    /// File name prefix used when the preferred file does not exist
    #[arg(
        long,
        env = "ERRSTAT_INPUT_PREFIX",
        default_value = "ErrorTimeStatistics",
        value_name = "PREFIX"
    )]
    input_prefix: String,

    /// Report workbook updated in place
    #[arg(
        long,
        env = "ERRSTAT_WORKBOOK",
        default_value = "output/OHT_Daily_Report.xlsx",
        value_name = "PATH"
    )]
    workbook: PathBuf,

    /// Sheet date (YYYYMMDD) instead of the date derived from the file name
    #[arg(long, env = "ERRSTAT_DATE", value_parser = parse_sheet_date, value_name = "YYYYMMDD")]
    date: Option<NaiveDate>,

    /// Use yesterday as the sheet date, ignoring the file name
    #[arg(long, conflicts_with = "date")]
    yesterday: bool,

    /// Append a "Total" row to the statistics sheet
    #[arg(long, env = "ERRSTAT_TOTAL_ROW")]
    total_row: bool,

    /// Print the run summary as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn date_source(&self) -> DateSource {
        match (self.date, self.yesterday) {
            (Some(date), _) => DateSource::Explicit(date),
            (None, true) => DateSource::Yesterday,
            (None, false) => DateSource::FromFileName,
        }
    }

    fn log_level(&self) -> &'static str {
        match self.verbose {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }
}

fn parse_sheet_date(s: &str) -> Result<NaiveDate, String> {
    let s = s.trim();
    if s.len() != 8 || !s.bytes().all(|b| b.is_ascii_digit()) {
        return Err(format!("expected YYYYMMDD, got '{}'", s));
    }
    let field = |range: std::ops::Range<usize>| s[range].parse::<u32>().unwrap_or(0);
    NaiveDate::from_ymd_opt(field(0..4) as i32, field(4..6), field(6..8))
        .ok_or_else(|| format!("'{}' is not a valid date", s))
}

fn setup_logging(args: &Args) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("errstat={}", args.log_level())));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_target(false)
                .with_level(true)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    debug!("Logging initialized at level: {}", args.log_level());
}

fn run(args: &Args) -> anyhow::Result<RunSummary> {
    let input = InputLocator::new(&args.input_dir)
        .with_file_name(&args.input_file)
        .with_prefix(&args.input_prefix)
        .locate()
        .context("Failed to locate the error log")?;

    let processor = ProcessorBuilder::new()
        .with_date_source(args.date_source())
        .with_total_row(args.total_row)
        .build()
        .context("Invalid configuration")?;

    processor.run(&input, &args.workbook).with_context(|| {
        format!(
            "Failed to update {} from {}",
            args.workbook.display(),
            input.display()
        )
    })
}

fn print_summary(args: &Args, summary: &RunSummary) -> anyhow::Result<()> {
    if args.json {
        println!("{}", serde_json::to_string_pretty(summary)?);
        return Ok(());
    }

    println!(
        "Exported error statistics to sheet '{}' ({} groups, {} alarms)",
        summary.statistics_sheet, summary.group_count, summary.total_count
    );
    println!(
        "Failure rate: {:.2}% ({} used OHTs)",
        summary.failure_rate * 100.0,
        summary.used_ohts
    );
    match summary.weekly_row_updated {
        Some(row) => println!(
            "Inserted failure rate into {} row {}",
            WEEKLY_REPORT_SHEET,
            row + 2
        ),
        None => println!(
            "No {} row dated {}; failure rate not inserted",
            WEEKLY_REPORT_SHEET, summary.sheet_date
        ),
    }
    println!(
        "{} is now sheet {} of {} in {}",
        WEEKLY_REPORT_SHEET,
        summary.sheet_order.len(),
        summary.sheet_order.len(),
        args.workbook.display()
    );
    Ok(())
}

fn main() {
    let args = Args::parse();
    setup_logging(&args);

    let result = run(&args).and_then(|summary| print_summary(&args, &summary));
    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}
