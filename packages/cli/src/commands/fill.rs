use crate::config::{parse_assignment, read_json, resolve_config_path};
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use metaform_engine::{Configuration, DocumentStore, FormSession, MemoryStore};
use metaform_template::FieldPath;
use serde_json::Value as Json;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

#[derive(Debug, Args)]
pub struct FillArgs {
    /// Configuration file or directory (defaults to ./metaform.config.json)
    pub config: Option<PathBuf>,

    /// Template to fill
    #[arg(short, long)]
    pub template: String,

    /// JSON object of dotted field paths to raw answers, applied in order
    #[arg(short, long)]
    pub answers: Option<PathBuf>,

    /// JSON array of documents backing query fields
    #[arg(short, long)]
    pub documents: Option<PathBuf>,

    /// Variant to select before answering, as <selector>=<variant>
    #[arg(long = "variant", value_name = "PATH=NAME")]
    pub variants: Vec<String>,

    /// Field action to run after answering
    #[arg(long = "action", value_name = "PATH")]
    pub actions: Vec<String>,

    /// Date treated as today (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<NaiveDate>,

    /// Write the metadata to a file instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub async fn fill(args: FillArgs, cwd: &Path) -> Result<()> {
    let path = resolve_config_path(args.config.as_deref(), cwd)?;
    let config = Configuration::load(&path)?;

    let store: Arc<dyn DocumentStore> = match &args.documents {
        Some(documents) => Arc::new(MemoryStore::load(documents).await?),
        None => Arc::new(MemoryStore::new()),
    };

    let mut session = FormSession::from_config(&config, &args.template, store)?;
    if let Some(today) = args.today {
        session = session.with_today(today);
    }
    session.start().await?;

    for raw in &args.variants {
        let (selector, variant) = parse_assignment(raw)?;
        session
            .on_variant_change(&FieldPath::parse(&selector), &variant)
            .await?;
    }

    if let Some(answers) = &args.answers {
        let Json::Object(answers) = read_json(answers)? else {
            return Err(anyhow!("Answers file must hold a JSON object"));
        };
        for (field, value) in answers {
            session.on_answer(&FieldPath::parse(&field), value).await?;
        }
    }

    for action in &args.actions {
        session.on_action(&FieldPath::parse(action)).await?;
    }

    for diagnostic in session.diagnostics() {
        eprintln!(
            "{} {} {}",
            "warning:".yellow(),
            diagnostic.path.to_string().bright_white(),
            diagnostic.message
        );
    }

    let metadata = serde_json::to_string_pretty(&session.submit())?;
    match &args.output {
        Some(output) => {
            std::fs::write(output, metadata + "\n")?;
            info!(path = %output.display(), "Metadata written");
            eprintln!("{} Wrote {}", "✓".green(), output.display());
        }
        None => println!("{}", metadata),
    }
    Ok(())
}
