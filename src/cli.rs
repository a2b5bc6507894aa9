use crate::client::HttpBackend;
use crate::config::load_config;
use crate::generator::generate_aml;
use crate::ir::Model;
use crate::layout::{DagreEngine, apply_auto_layout};
use crate::layout_record::{LayoutRecord, read_layout_record, write_layout_record};
use crate::parser::parse_aml;
use crate::puml::render_plantuml;
use crate::source::{ClassRecord, model_from_records};
use crate::sync::load_session;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "amls", version, about = "AML architecture text <-> class graph sync tool")]
pub struct Args {
    /// Input AML file or '-' for stdin
    #[arg(short = 'i', long = "input")]
    pub input: Option<PathBuf>,

    /// Output file. Defaults to stdout.
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,

    /// Output format
    #[arg(short = 'f', long = "format", value_enum, default_value = "aml")]
    pub format: OutputFormat,

    /// Structural records JSON (extractor output) instead of AML input
    #[arg(long = "records", conflicts_with = "input")]
    pub records: Option<PathBuf>,

    /// Layout record JSON to apply to the model
    #[arg(long = "layout")]
    pub layout: Option<PathBuf>,

    /// Run the automatic layout before writing output
    #[arg(long = "auto-layout")]
    pub auto_layout: bool,

    /// Write the resulting layout record to this file
    #[arg(long = "save-layout")]
    pub save_layout: Option<PathBuf>,

    /// Load structure and layout from a persistence service at this base URL
    #[arg(long = "api", conflicts_with_all = ["input", "records"])]
    pub api: Option<String>,

    /// PlantUML diagram title
    #[arg(long = "title")]
    pub title: Option<String>,

    /// Config JSON5 file
    #[arg(short = 'c', long = "configFile")]
    pub config: Option<PathBuf>,
}

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Aml,
    Json,
    Puml,
}

pub fn run() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.as_deref())?;
    let engine = DagreEngine::new(config.layout.clone());

    let mut model = if let Some(api) = args.api.as_deref() {
        config.sync.api_url = api.to_string();
        let backend = HttpBackend::new(&config.sync)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let loaded = runtime.block_on(load_session(&backend, &engine, &config))?;
        loaded.controller.model().clone()
    } else if let Some(path) = args.records.as_deref() {
        let contents = std::fs::read_to_string(path)?;
        let records: Vec<ClassRecord> = serde_json::from_str(&contents)?;
        model_from_records(&records)
    } else {
        let input = read_input(args.input.as_deref())?;
        let parsed = parse_aml(&input)?;
        if !parsed.duplicates.is_empty() {
            warn!(names = ?parsed.duplicates, "duplicate declarations; last one kept");
        }
        parsed.into_model()
    };

    if let Some(path) = args.layout.as_deref() {
        let record = read_layout_record(path)?;
        let applied = record.apply_to(&mut model);
        info!(applied, path = %path.display(), "layout record applied");
    }

    if args.auto_layout {
        apply_auto_layout(&mut model, &engine, &config.layout)?;
    }

    if let Some(path) = args.save_layout.as_deref() {
        write_layout_record(path, &LayoutRecord::from_model(&model))?;
    }

    let rendered = render_output(&model, args.format, args.title.as_deref())?;
    write_output(&rendered, args.output.as_deref())
}

fn render_output(model: &Model, format: OutputFormat, title: Option<&str>) -> Result<String> {
    Ok(match format {
        OutputFormat::Aml => generate_aml(model),
        OutputFormat::Json => {
            let mut json = serde_json::to_string_pretty(model)?;
            json.push('\n');
            json
        }
        OutputFormat::Puml => {
            let mut puml = render_plantuml(model, title);
            puml.push('\n');
            puml
        }
    })
}

fn read_input(path: Option<&Path>) -> Result<String> {
    if let Some(path) = path {
        if path != Path::new("-") {
            return Ok(std::fs::read_to_string(path)?);
        }
    }
    let mut buf = String::new();
    io::stdin().read_to_string(&mut buf)?;
    Ok(buf)
}

fn write_output(contents: &str, path: Option<&Path>) -> Result<()> {
    match path {
        Some(path) => std::fs::write(path, contents)?,
        None => io::stdout().write_all(contents.as_bytes())?,
    }
    Ok(())
}
