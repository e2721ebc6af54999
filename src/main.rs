//! flightconv command-line driver

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;

use flightconv::config::{ConvertOptions, PolarSensorSource, SensorFormat, Target};
use flightconv::container::ContainerStream;
use flightconv::converters::{convert_file, SourceFormat};
use flightconv::fusion::extract_files;
use flightconv::geo::{
    parse_base_date, parse_latitude, parse_longitude, render_epoch_ms, GeoidModel,
};
use flightconv::logging::init_logging;
use flightconv::stats::FlightStats;
use flightconv::validate::validate_container;

#[derive(Parser)]
#[command(name = "flightconv")]
#[command(about = "Convert and validate flight and track logs", long_about = None)]
struct Cli {
    /// Debug logging (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Machine-readable output where supported
    #[arg(long, global = true)]
    json: bool,

    /// Geoid model file (PGM)
    #[arg(long, global = true, env = "FLIGHTCONV_EGM")]
    egm: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Convert an external log into a container
    Convert(ConvertArgs),
    /// Validate a container
    Validate { input: PathBuf },
    /// Time and position ranges of a flightlog/radarlog container
    Stats { input: PathBuf },
    /// Geoid undulation at a location
    Undulation {
        /// Latitude (decimal, DMS or NMEA ddmm.mmmm)
        #[arg(long, allow_hyphen_values = true)]
        lat: String,
        /// Longitude (decimal, DMS or NMEA dddmm.mmmm)
        #[arg(long, allow_hyphen_values = true)]
        lon: String,
    },
    /// Render epoch milliseconds as UTC
    Epoch {
        #[arg(allow_hyphen_values = true)]
        millis: i64,
    },
    /// Extract plot and track flight logs from a fusion replay
    FusionFlightlog {
        input: PathBuf,
        #[arg(long)]
        output_plots: PathBuf,
        #[arg(long)]
        output_tracks: PathBuf,
    },
}

#[derive(Args)]
struct ConvertArgs {
    /// External format name
    #[arg(short, long, value_parser = parse_format)]
    format: SourceFormat,

    input: PathBuf,

    #[arg(short, long)]
    output: PathBuf,

    /// TOML file with conversion options
    #[arg(long)]
    options: Option<PathBuf>,

    /// Date for formats that only carry a time of day (2024-05-17 or "17 May 2024")
    #[arg(long, value_parser = parse_date)]
    base_date: Option<NaiveDate>,

    /// flightlog or radarlog, for formats that can produce either
    #[arg(long, value_parser = parse_target)]
    target: Option<Target>,

    /// Log holding the polar sensor position
    #[arg(long)]
    polar_sensor_source: Option<PathBuf>,

    #[arg(long, value_parser = parse_sensor_format, requires = "polar_sensor_source")]
    polar_sensor_format: Option<SensorFormat>,

    /// Format-specific option, KEY=VALUE
    #[arg(long = "set", value_parser = parse_key_value)]
    extra: Vec<(String, String)>,
}

fn parse_format(text: &str) -> std::result::Result<SourceFormat, String> {
    text.parse()
        .map_err(|_| format!("expected one of: {}", SourceFormat::names().join(", ")))
}

fn parse_date(text: &str) -> std::result::Result<NaiveDate, String> {
    parse_base_date(text).map_err(|e| e.to_string())
}

fn parse_target(text: &str) -> std::result::Result<Target, String> {
    text.parse()
        .map_err(|_| "expected flightlog or radarlog".to_string())
}

fn parse_sensor_format(text: &str) -> std::result::Result<SensorFormat, String> {
    text.parse().map_err(|_| "expected nmea".to_string())
}

fn parse_key_value(text: &str) -> std::result::Result<(String, String), String> {
    text.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", text))
}

/// Options file first, then command-line overrides
fn convert_options(cli_egm: Option<PathBuf>, args: &ConvertArgs) -> Result<ConvertOptions> {
    let mut options = match &args.options {
        Some(path) => ConvertOptions::load(path)
            .with_context(|| format!("Failed to load options from {}", path.display()))?,
        None => ConvertOptions::default(),
    };

    if cli_egm.is_some() {
        options.egm = cli_egm;
    }
    if args.base_date.is_some() {
        options.base_date = args.base_date;
    }
    if let Some(target) = args.target {
        options.target = target;
    }
    if let Some(path) = &args.polar_sensor_source {
        options.polar_sensor = Some(PolarSensorSource {
            path: path.clone(),
            format: args.polar_sensor_format.unwrap_or_default(),
        });
    }
    options.extra.extend(args.extra.iter().cloned());

    Ok(options)
}

/// Debug-level progress every 10% of the file
fn progress_observer(total: u64) -> impl FnMut(usize) + 'static {
    let mut consumed = 0u64;
    let mut reported = 0u64;

    move |bytes| {
        consumed += bytes as u64;
        if total == 0 {
            return;
        }
        let percent = consumed * 100 / total;
        if percent >= reported + 10 {
            reported = percent - percent % 10;
            tracing::debug!("Read {}% ({} of {} bytes)", reported, consumed, total);
        }
    }
}

fn validate(input: &Path, json: bool) -> Result<bool> {
    let total = std::fs::metadata(input)
        .with_context(|| format!("Cannot read {}", input.display()))?
        .len();
    let mut stream = ContainerStream::open_read(input)?.with_observer(progress_observer(total));
    let report = validate_container(&mut stream)?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "file": input.display().to_string(),
                "state": report.state.to_string(),
                "valid": report.is_valid(),
                "errors": report.error_count,
                "lines": report.lines_read,
            })
        );
    } else if report.is_valid() {
        println!("{} is valid", input.display());
    } else {
        println!("{} is NOT valid ({})", input.display(), report.state);
    }

    Ok(report.is_valid())
}

fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Command::Convert(args) => {
            let options = convert_options(cli.egm, &args)?;
            convert_file(args.format, &options, &args.input, &args.output)?;
        }

        Command::Validate { input } => {
            if !validate(&input, cli.json)? {
                bail!(flightconv::Error::schema(format!(
                    "{} failed validation",
                    input.display()
                )));
            }
        }

        Command::Stats { input } => {
            let mut stream = ContainerStream::open_read(&input)?;
            let stats = FlightStats::from_container(&mut stream)
                .with_context(|| format!("Cannot compute statistics for {}", input.display()))?;
            if cli.json {
                println!("{}", stats.to_json()?);
            } else {
                print!("{}", stats);
            }
        }

        Command::Undulation { lat, lon } => {
            let lat = parse_latitude(&lat)?;
            let lon = parse_longitude(&lon)?;
            let model = GeoidModel::load(cli.egm.as_deref())?;
            let undulation = model.undulation(lat, lon);

            if cli.json {
                println!(
                    "{}",
                    serde_json::json!({"lat": lat, "lon": lon, "undulation": undulation, "geoid": model.name()})
                );
            } else {
                println!("{:.3}", undulation);
            }
        }

        Command::Epoch { millis } => match render_epoch_ms(millis) {
            Some(text) => println!("{}", text),
            None => bail!(flightconv::Error::format(format!(
                "{} is out of range",
                millis
            ))),
        },

        Command::FusionFlightlog {
            input,
            output_plots,
            output_tracks,
        } => {
            let options = ConvertOptions {
                egm: cli.egm,
                ..ConvertOptions::default()
            };
            extract_files(&options, &input, &output_plots, &output_tracks)?;
        }
    }
    Ok(())
}

/// 1 for bad input or options, 2 for I/O failures
fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<flightconv::Error>() {
        Some(e) if !e.is_user_error() => 2,
        Some(_) => 1,
        None if err.downcast_ref::<std::io::Error>().is_some() => 2,
        None => 1,
    }
}

fn main() {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        process::exit(exit_code(&e));
    }
}
