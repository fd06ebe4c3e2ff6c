/*
 * main.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Command-line renderer for gktemplate documents
 */

use anyhow::{Context, Result};
use clap::Parser;
use gktemplate::config::{DEFAULT_NAMESPACE, DEFAULT_TAG_END, DEFAULT_TAG_START};
use gktemplate::{DataContext, Engine, EngineConfig, Registry, Syntax};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(name = "gktemplate")]
#[command(version)]
#[command(about = "Render tag templates against a JSON data file")]
struct Args {
    /// Template files to render, in order
    #[arg(value_name = "TEMPLATE", required = true)]
    templates: Vec<PathBuf>,

    /// JSON object holding the data available to tags
    #[arg(short = 'd', long, value_name = "FILE")]
    data: Option<PathBuf>,

    /// Write output to FILE instead of stdout
    #[arg(short = 'o', long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Tag namespace
    #[arg(long, default_value = DEFAULT_NAMESPACE)]
    namespace: String,

    /// Tag opening delimiter
    #[arg(long, default_value = DEFAULT_TAG_START)]
    tag_start: String,

    /// Tag closing delimiter
    #[arg(long, default_value = DEFAULT_TAG_END)]
    tag_end: String,

    /// Bypass the parse caches (also enabled by GKENV=dev)
    #[arg(long)]
    live_reload: bool,

    /// Verbose output (-v for debug, -vv for trace)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let default_filter = match args.verbose {
        0 => "gktemplate=info",
        1 => "gktemplate=debug",
        _ => "gktemplate=trace",
    };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let syntax = Syntax::new(&args.namespace, &args.tag_start, &args.tag_end);
    syntax.validate().context("Invalid tag syntax")?;

    let mut config = EngineConfig::from_env().with_syntax(syntax);
    if args.live_reload {
        config = config.with_live_reload(true);
    }
    let engine = Engine::new(config, Registry::with_builtins());

    let data = match &args.data {
        Some(path) => load_data(path)?,
        None => DataContext::new(),
    };

    let mut rendered = String::new();
    for template in &args.templates {
        tracing::debug!(path = %template.display(), "rendering template");
        let output = engine.render_file(template, &data).map_err(|e| {
            if e.is_malformed() {
                anyhow::anyhow!("Malformed template {:?}: {}", template, e)
            } else {
                anyhow::Error::new(e).context(format!("Failed to render {:?}", template))
            }
        })?;
        rendered.push_str(&output);
    }

    match &args.output {
        Some(path) => fs::write(path, rendered)
            .context(format!("Failed to write output file: {:?}", path))?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(rendered.as_bytes())
                .context("Failed to write to stdout")?;
            stdout.flush()?;
        }
    }

    Ok(())
}

fn load_data(path: &Path) -> Result<DataContext> {
    let text = fs::read_to_string(path).context(format!("Failed to read data file: {:?}", path))?;
    let json: serde_json::Value =
        serde_json::from_str(&text).context(format!("Failed to parse JSON in {:?}", path))?;
    DataContext::from_json(json)
        .with_context(|| format!("Data file {:?} must contain a JSON object", path))
}
