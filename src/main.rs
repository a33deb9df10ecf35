use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use clap::Parser;
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode};

use yamlcal_core::{files_to_calendar, lookup_timezone};

/// Reserved stem for documents carrying build metadata, not events.
const CONFIG_STEM: &str = "_config";

#[derive(Parser, Debug)]
#[command(name = "yamlcal")]
#[command(about = "Convert declarative YAML event files into ICS calendars")]
struct Cli {
    /// Input YAML source files (or raw .ics calendars)
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Write one <stem>.ics per input into this directory instead of
    /// printing a single combined calendar to stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Additionally write each calendar converted to this zone, as
    /// <stem>.<zone-slug>.ics (repeatable; only meaningful with
    /// --output)
    #[arg(long = "timezone", requires = "output")]
    timezones: Vec<String>,

    /// Override the calendar name (NAME / X-WR-CALNAME)
    #[arg(short, long)]
    name: Option<String>,

    /// Verbose log output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Auto,
    )?;

    match &cli.output {
        Some(output) => write_per_input(&cli, output),
        None => print_combined(&cli),
    }
}

/// All inputs feed one calendar, printed to stdout.
fn print_combined(cli: &Cli) -> Result<()> {
    let refs: Vec<String> = cli
        .inputs
        .iter()
        .map(|p| p.display().to_string())
        .collect();

    let mut calendar = files_to_calendar(&refs)?;
    if cli.name.is_some() {
        calendar.name = cli.name.clone();
    }
    print!("{}", calendar.serialize()?);
    Ok(())
}

/// One .ics per input (plus one per requested timezone). A failing
/// input is reported and the remaining inputs are still attempted.
fn write_per_input(cli: &Cli, output: &Path) -> Result<()> {
    fs::create_dir_all(output)
        .with_context(|| format!("Failed to create output directory {}", output.display()))?;

    let mut failures = 0usize;
    for input in &cli.inputs {
        let Some(stem) = input.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
            log::error!("{}: not a file path", input.display());
            failures += 1;
            continue;
        };
        if stem == CONFIG_STEM {
            log::info!("Skipping config metadata {}", input.display());
            continue;
        }

        if let Err(e) = convert_one(input, &stem, output, cli) {
            log::error!("{}: {:#}", input.display(), e);
            failures += 1;
        }
    }

    if failures > 0 {
        bail!("{} input file(s) failed", failures);
    }
    Ok(())
}

fn convert_one(input: &Path, stem: &str, output: &Path, cli: &Cli) -> Result<()> {
    let mut calendar = files_to_calendar(&[input.display().to_string()])?;
    if cli.name.is_some() {
        calendar.name = cli.name.clone();
    }

    let ics_path = output.join(format!("{stem}.ics"));
    log::info!("Writing {} -> {}", input.display(), ics_path.display());
    fs::write(&ics_path, calendar.serialize()?)
        .with_context(|| format!("Failed to write {}", ics_path.display()))?;

    for tz_name in &cli.timezones {
        let tz = lookup_timezone(tz_name)?;
        let slug = tz_name.replace('/', "-");
        let tz_path = output.join(format!("{stem}.{slug}.ics"));
        log::info!(
            "Writing {} [{}] -> {}",
            input.display(),
            tz_name,
            tz_path.display()
        );
        fs::write(&tz_path, calendar.normalize(&tz).serialize()?)
            .with_context(|| format!("Failed to write {}", tz_path.display()))?;
    }

    Ok(())
}
