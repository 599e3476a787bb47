//! medguardian CLI: check model artifacts and produce flagged patient reports.

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use medguardian_lib::assessment::assess;
use medguardian_lib::config::{self, AppConfig};
use medguardian_lib::inference::{sniff, ArtifactCandidate, ArtifactLoader, ModelRegistry, SniffVerdict};
use medguardian_lib::models::enums::{Condition, FlagStatus};
use medguardian_lib::models::measurement::RawRecord;
use medguardian_lib::report::{export_to_file, JsonRenderer, PdfRenderer, ReportRenderer, Vocabulary};

type CliResult = Result<(), Box<dyn std::error::Error>>;

#[derive(Parser)]
#[command(name = "medguardian")]
#[command(about = "Clinical risk-model artifact checks and patient report generation")]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $MEDGUARDIAN_CONFIG or ~/MedGuardian/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether a file looks like a model artifact, without decoding it
    Sniff {
        file: PathBuf,

        /// Minimum plausible size in bytes (overrides config)
        #[arg(long)]
        min_bytes: Option<u64>,
    },

    /// Load an artifact and print what it contains
    Inspect { file: PathBuf },

    /// Assess one intake record and write its report
    Assess {
        /// heart, diabetes or kidney
        #[arg(short, long)]
        condition: Condition,

        /// Intake record (JSON object)
        #[arg(short, long)]
        input: PathBuf,

        /// PDF output path (defaults to the reports directory)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Print the report as JSON on stdout as well
        #[arg(long)]
        json: bool,
    },

    /// Load every configured model and print its state
    Status,
}

fn main() {
    medguardian_lib::init_tracing();
    let cli = Cli::parse();

    let result = load_config(cli.config.as_deref()).and_then(|config| match cli.command {
        Commands::Sniff { file, min_bytes } => {
            cmd_sniff(&file, min_bytes.unwrap_or(config.min_artifact_bytes))
        }
        Commands::Inspect { file } => cmd_inspect(&config, &file),
        Commands::Assess {
            condition,
            input,
            out,
            json,
        } => cmd_assess(&config, condition, &input, out.as_deref(), json),
        Commands::Status => cmd_status(&config),
    });

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn std::error::Error>> {
    Ok(match path {
        Some(p) => AppConfig::load_from(p)?,
        None => AppConfig::load()?,
    })
}

fn cmd_sniff(file: &Path, min_bytes: u64) -> CliResult {
    let candidate = ArtifactCandidate::inspect(file)?;
    match sniff(&candidate, min_bytes)? {
        SniffVerdict::Plausible => {
            println!("{}: plausible ({} bytes)", file.display(), candidate.size_bytes);
            Ok(())
        }
        SniffVerdict::Implausible(reason) => {
            Err(format!("{}: implausible, {reason}", file.display()).into())
        }
    }
}

fn cmd_inspect(config: &AppConfig, file: &Path) -> CliResult {
    let model = ArtifactLoader::new(config.min_artifact_bytes).load(file)?;
    let info = model.info();

    println!("Artifact:      {}", info.path.display());
    println!("Name:          {}", info.name);
    println!("Estimator:     {}", info.estimator);
    println!("Format:        {}", info.format);
    println!("Schema:        v{}", info.schema_version);
    println!("Size:          {} bytes", info.size_bytes);
    println!("Checksum:      {}", info.checksum);
    let capabilities: Vec<&str> = model.capabilities().iter().map(|c| c.as_str()).collect();
    println!("Capabilities:  {}", capabilities.join(", "));
    if !info.feature_names.is_empty() {
        println!("Features:      {}", info.feature_names.join(", "));
    }
    Ok(())
}

fn cmd_assess(
    config: &AppConfig,
    condition: Condition,
    input: &Path,
    out: Option<&Path>,
    json: bool,
) -> CliResult {
    let vocabulary = Vocabulary::load(config.vocabulary_path.as_deref())?;
    let registry = ModelRegistry::from_config(config);
    let intake = RawRecord::from_json_str(&std::fs::read_to_string(input)?)?;

    let assessment = assess(&registry, &vocabulary, config, condition, &intake)?;
    let report = &assessment.report;

    let pdf = PdfRenderer::from_config(config);
    let bytes = pdf.render(report)?;
    let written = match out {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            let name = path
                .file_name()
                .and_then(|n| n.to_str())
                .ok_or_else(|| format!("Invalid output path: {}", path.display()))?;
            export_to_file(&bytes, dir, name)?
        }
        None => {
            let name = format!("{condition}_{}.{}", report.report_id(), pdf.extension());
            export_to_file(&bytes, &config::reports_dir(), &name)?
        }
    };

    if json {
        println!("{}", String::from_utf8(JsonRenderer.render(report)?)?);
    } else {
        println!("Condition:  {}", condition.report_label());
        println!("Verdict:    {}", assessment.verdict);
        println!("Risk:       {}", report.risk_display());
        let flagged = report
            .rows()
            .iter()
            .filter(|r| r.flag.status != FlagStatus::Normal)
            .count();
        println!("Flagged:    {flagged}");
        println!("Report:     {}", written.display());
    }
    Ok(())
}

fn cmd_status(config: &AppConfig) -> CliResult {
    let registry = ModelRegistry::from_config(config);
    let usable = registry.preload();
    let status: Vec<_> = Condition::ALL
        .into_iter()
        .map(|c| (c, registry.status(c)))
        .collect();
    let map: serde_json::Map<String, serde_json::Value> = status
        .into_iter()
        .map(|(c, s)| Ok((c.to_string(), serde_json::to_value(s)?)))
        .collect::<Result<_, serde_json::Error>>()?;
    println!("{}", serde_json::to_string_pretty(&map)?);
    eprintln!("{usable} of {} models usable", Condition::ALL.len());
    Ok(())
}
