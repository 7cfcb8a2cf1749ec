use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mediaconv_core::{
    load_config, validate_config, Config, ConfigError, ConversionEngine, ConversionOptions,
    ConversionProgress, ConversionRequest, EngineConfig, RetentionSweeper,
};

const DEFAULT_CONFIG_PATH: &str = "mediaconv.toml";

#[derive(Parser)]
#[command(name = "mediaconv", version, about = "Convert media files between formats")]
struct Cli {
    /// Config file. Falls back to MEDIACONV_CONFIG, then ./mediaconv.toml.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Print machine-readable JSON instead of text.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert one file.
    Convert {
        input: PathBuf,

        /// Target format, e.g. png or .mp3
        format: String,

        /// Conversion option as key=value (repeatable), e.g. -o quality=80
        #[arg(short = 'o', long = "option", value_parser = parse_key_val)]
        options: Vec<(String, String)>,

        /// Override the configured output directory.
        #[arg(long)]
        output_dir: Option<PathBuf>,

        /// Hide the progress bar.
        #[arg(long)]
        quiet: bool,
    },

    /// List supported conversions, optionally for one input format.
    Formats { input: Option<String> },

    /// Check that ffmpeg and pdftoppm run and the output directory is writable.
    Check,

    /// Delete expired files from the retention directories once.
    Sweep,

    /// Sweep on the configured interval until interrupted.
    SweepDaemon,
}

fn parse_key_val(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got `{raw}`"))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("missing option name in `{raw}`"));
    }
    Ok((key.to_string(), value.to_string()))
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,mediaconv_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    if let Err(e) = run(Cli::parse()).await {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref())?;
    validate_config(&config).context("Invalid configuration")?;

    match cli.command {
        Commands::Convert {
            input,
            format,
            options,
            output_dir,
            quiet,
        } => {
            let mut engine_config = config.engine.clone();
            if let Some(dir) = output_dir {
                engine_config = engine_config.with_output_dir(dir);
            }
            convert(engine_config, input, format, options, quiet || cli.json, cli.json).await
        }
        Commands::Formats { input } => {
            formats(&ConversionEngine::new(&config.engine), input.as_deref());
            Ok(())
        }
        Commands::Check => {
            let engine = ConversionEngine::new(&config.engine);
            engine.validate().await.context("Engine check failed")?;
            println!(
                "ok: {} and {} run, output directory {}",
                config.engine.ffmpeg_path.display(),
                config.engine.pdftoppm_path.display(),
                engine.output_dir().display()
            );
            Ok(())
        }
        Commands::Sweep => {
            let report = RetentionSweeper::from_config(&config.retention)
                .run_once()
                .await;
            if cli.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                for dir in &report.directories {
                    match &dir.error {
                        Some(e) => println!("{}: {}", dir.directory.display(), e),
                        None => println!(
                            "{}: removed {}, failed {}",
                            dir.directory.display(),
                            dir.removed,
                            dir.failed
                        ),
                    }
                }
            }
            Ok(())
        }
        Commands::SweepDaemon => {
            let handle =
                RetentionSweeper::from_config(&config.retention).spawn(config.retention.interval());
            info!(
                interval_secs = config.retention.interval_secs,
                "Retention sweeper running, press Ctrl+C to stop"
            );
            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for shutdown signal")?;
            info!("Shutdown signal received");
            handle.shutdown().await;
            Ok(())
        }
    }
}

/// Explicit paths must exist; the default path may be absent.
fn resolve_config(explicit: Option<&Path>) -> Result<Config> {
    let (path, required) = match explicit {
        Some(path) => (path.to_path_buf(), true),
        None => match std::env::var_os("MEDIACONV_CONFIG") {
            Some(path) => (PathBuf::from(path), true),
            None => (PathBuf::from(DEFAULT_CONFIG_PATH), false),
        },
    };

    match load_config(&path) {
        Ok(config) => {
            info!(path = %path.display(), "Loaded configuration");
            Ok(config)
        }
        Err(ConfigError::FileNotFound(_)) if !required => {
            info!("No config file found, using defaults");
            Ok(Config::default())
        }
        Err(e) => {
            Err(e).with_context(|| format!("Failed to load config from {}", path.display()))
        }
    }
}

async fn convert(
    engine_config: EngineConfig,
    input: PathBuf,
    format: String,
    options: Vec<(String, String)>,
    quiet: bool,
    json: bool,
) -> Result<()> {
    let engine = ConversionEngine::new(&engine_config);
    let options = ConversionOptions::from_pairs(options).context("Invalid conversion options")?;
    let request = ConversionRequest::new(input, format).with_options(options);

    let (tx, mut rx) = mpsc::unbounded_channel::<ConversionProgress>();
    let bar = if quiet {
        ProgressBar::hidden()
    } else {
        ProgressBar::new(100)
    };
    bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}")
            .context("Invalid progress template")?
            .progress_chars("#>-"),
    );

    let bar_task = {
        let bar = bar.clone();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                bar.set_position(u64::from(event.percent));
                bar.set_message(event.message);
            }
        })
    };

    let outcome = engine.convert_with_progress(request, Arc::new(tx)).await;
    // The engine dropped its sender, so the bar task drains and exits.
    let _ = bar_task.await;

    let result = match outcome {
        Ok(result) => {
            bar.finish_with_message("done");
            result
        }
        Err(e) => {
            bar.abandon_with_message("failed");
            return Err(e).context("Conversion failed");
        }
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "{} ({} bytes, {} ms)",
            result.output_path.display(),
            result.output_size_bytes,
            result.duration_ms
        );
    }
    Ok(())
}

fn formats(engine: &ConversionEngine, input: Option<&str>) {
    if let Some(input) = input {
        let outputs = engine.supported_outputs(input);
        if outputs.is_empty() {
            println!("{input}: no supported conversions");
        } else {
            println!("{input} -> {}", outputs.join(" "));
        }
        return;
    }

    let mut grouped: Vec<(&str, Vec<&str>)> = Vec::new();
    for (input, output, _) in engine.pairs() {
        match grouped.iter_mut().find(|(i, _)| *i == input) {
            Some((_, outputs)) => outputs.push(output),
            None => grouped.push((input, vec![output])),
        }
    }
    for (input, outputs) in grouped {
        println!("{input:>5} -> {}", outputs.join(" "));
    }
}
