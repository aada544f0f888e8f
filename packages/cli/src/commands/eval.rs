use crate::config::read_json;
use anyhow::{anyhow, Result};
use chrono::NaiveDate;
use clap::Args;
use colored::Colorize;
use metaform_evaluator::{evaluate_source, ContextBundle, EvalError};
use metaform_parser::format_error;
use metaform_template::ContextName;
use std::path::PathBuf;

#[derive(Debug, Args)]
pub struct EvalArgs {
    /// Expression to evaluate
    pub expression: String,

    /// JSON file bound as `userInput`
    #[arg(short, long)]
    pub input: Option<PathBuf>,

    /// JSON file bound as `settings`
    #[arg(short, long)]
    pub settings: Option<PathBuf>,

    /// JSON file bound as `frontmatter`
    #[arg(short, long)]
    pub frontmatter: Option<PathBuf>,

    /// JSON value bound as `selection`
    #[arg(long)]
    pub selection: Option<String>,

    /// Date treated as today (YYYY-MM-DD)
    #[arg(long)]
    pub today: Option<NaiveDate>,
}

pub fn eval(args: EvalArgs) -> Result<()> {
    let mut bundle = ContextBundle::new();
    if let Some(path) = &args.input {
        bundle = bundle.with_user_input(read_json(path)?);
    }
    if let Some(path) = &args.settings {
        bundle = bundle.with_settings(read_json(path)?);
    }
    if let Some(path) = &args.frontmatter {
        bundle = bundle.with_frontmatter(read_json(path)?);
    }
    if let Some(raw) = &args.selection {
        let selection: serde_json::Value = serde_json::from_str(raw).unwrap_or_else(|_| raw.clone().into());
        bundle = bundle.with_selection(selection);
    }
    if let Some(today) = args.today {
        bundle = bundle.with_today(today);
    }

    match evaluate_source(&args.expression, &ContextName::ALL, &bundle) {
        Ok(value) => {
            println!("{}", serde_json::to_string_pretty(&value.to_json())?);
            Ok(())
        }
        Err(EvalError::Parse(err)) => {
            eprint!("{}", format_error(&args.expression, "<expression>", &err));
            Err(anyhow!("Expression could not be parsed"))
        }
        Err(err) => Err(anyhow!("{}", err.to_string().red())),
    }
}
