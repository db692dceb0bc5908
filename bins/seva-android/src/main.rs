//! Seva Android CLI
//!
//! Prebuild patching for the generated Android project.

use anyhow::Result;
use clap::{Parser, Subcommand};
use seva_android::{FsHost, ModReport, PatchOutcome, Pipeline, PipelineReport};
use seva_cli::output::{format_count, format_delta, format_duration, Status};
use seva_core::config::Config;
use seva_core::error::{exit_codes, Error};
use seva_telemetry::{TelemetryConfig, Timer};
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "seva-android")]
#[command(about = "Prebuild patching for the Seva Android project")]
#[command(version)]
struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase output verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    no_color: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Patch the generated build scripts and manifest
    Prebuild {
        /// Generated android directory (defaults to general.android_dir)
        #[arg(long)]
        android_dir: Option<PathBuf>,
        /// Report what would change without writing
        #[arg(long)]
        dry_run: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Fail if any generated file still needs patching
    Check {
        /// Generated android directory (defaults to general.android_dir)
        #[arg(long)]
        android_dir: Option<PathBuf>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration
    Config {
        /// Output as JSON instead of TOML
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.no_color {
        owo_colors::set_override(false);
    }

    seva_telemetry::init_with_config(TelemetryConfig::for_verbosity(cli.verbose, cli.quiet))?;

    let config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => std::process::exit(report_error(&e, false)),
    };

    let exit_code = match cli.command {
        Commands::Prebuild { android_dir, dry_run, json } => {
            run_prebuild(&config, android_dir.as_deref(), dry_run, json, cli.quiet)
        }
        Commands::Check { android_dir, json } => {
            run_check(&config, android_dir.as_deref(), json, cli.quiet)
        }
        Commands::Config { json } => run_config(&config, json),
    };

    std::process::exit(exit_code);
}

fn resolve_android_dir(config: &Config, android_dir: Option<&Path>) -> PathBuf {
    android_dir
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from(&config.schema.general.android_dir))
}

fn run_prebuild(
    config: &Config,
    android_dir: Option<&Path>,
    dry_run: bool,
    json: bool,
    quiet: bool,
) -> i32 {
    let dir = resolve_android_dir(config, android_dir);

    let result = Pipeline::from_config(&config.schema).and_then(|pipeline| {
        let mut host = FsHost::new(&dir)?.dry_run(dry_run);
        let timer = Timer::start("prebuild");
        let report = pipeline.run(&mut host)?;
        Ok((report, timer.stop()))
    });

    let (report, elapsed) = match result {
        Ok(done) => done,
        Err(e) => return report_error(&e, json),
    };

    if json {
        return print_json(&report);
    }
    if !quiet {
        let title = if dry_run { "Android prebuild (dry run)" } else { "Android prebuild" };
        print_report(title, &report);
        Status::info(&format!(
            "{} {} in {}",
            format_count(report.changed_count(), "file", "files"),
            if dry_run { "would change" } else { "patched" },
            format_duration(elapsed)
        ));
    }

    exit_codes::SUCCESS
}

fn run_check(config: &Config, android_dir: Option<&Path>, json: bool, quiet: bool) -> i32 {
    let dir = resolve_android_dir(config, android_dir);

    let result = Pipeline::for_check(&config.schema).and_then(|pipeline| {
        let mut memory = FsHost::new(&dir)?.snapshot()?;
        pipeline.run(&mut memory)
    });

    let report = match result {
        Ok(report) => report,
        Err(e) => return report_error(&e, json),
    };

    let code = if report.is_clean() {
        exit_codes::SUCCESS
    } else {
        exit_codes::VALIDATION_ERROR
    };

    if json {
        print_json(&report);
        return code;
    }

    if report.is_clean() {
        if !quiet {
            Status::success("Generated files are already patched");
        }
    } else {
        for m in report.mods.iter().filter(|m| m.changed()) {
            Status::error(&format!("{} needs {} ({})", describe_path(m), m.name, m.outcome.label()));
        }
        Status::info("Run `seva-android prebuild` to apply the patches");
    }

    code
}

fn run_config(config: &Config, json: bool) -> i32 {
    let rendered = if json {
        serde_json::to_string_pretty(&config.schema).map_err(Error::from)
    } else {
        toml::to_string_pretty(&config.schema).map_err(Error::from)
    };

    match rendered {
        Ok(text) => {
            if let Some(path) = &config.path {
                eprintln!("# loaded from {}", path.display());
            }
            println!("{}", text.trim_end());
            exit_codes::SUCCESS
        }
        Err(e) => report_error(&e, json),
    }
}

fn print_report(title: &str, report: &PipelineReport) {
    Status::header(title);

    let total = report.mods.len();
    for (idx, m) in report.mods.iter().enumerate() {
        Status::step(idx + 1, total, &format!("{} → {}", m.name, describe_path(m)));

        let detail = format!(
            "{} ({})",
            m.outcome.label(),
            format_delta(m.bytes_before as u64, m.bytes_after as u64)
        );
        match &m.outcome {
            PatchOutcome::Appended => {
                Status::warning(&format!("{}: anchor not found, block appended at end", detail))
            }
            PatchOutcome::Skipped { code, reason } => {
                Status::skipped(&format!("{} [{}]: {}", m.outcome.label(), code, reason))
            }
            outcome if outcome.is_change() => Status::success(&detail),
            _ => Status::skipped(&detail),
        }
    }
}

fn describe_path(m: &ModReport) -> String {
    m.path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| m.kind.to_string())
}

fn print_json(report: &PipelineReport) -> i32 {
    match report.to_json() {
        Ok(json) => {
            println!("{}", json);
            exit_codes::SUCCESS
        }
        Err(e) => report_error(&e, false),
    }
}

fn report_error(err: &Error, json: bool) -> i32 {
    tracing::debug!(code = %err.code, "Command failed");
    if json {
        match serde_json::to_string_pretty(&err.to_report()) {
            Ok(text) => println!("{}", text),
            Err(_) => Status::error(&err.to_string()),
        }
    } else {
        Status::error(&err.to_string());
    }
    err.code.exit_code()
}
