use crate::config::resolve_config_path;
use anyhow::Result;
use clap::Args;
use colored::Colorize;
use metaform_engine::{discover_selectors, validate_template, Configuration};
use std::path::{Path, PathBuf};

#[derive(Debug, Args)]
pub struct CheckArgs {
    /// Configuration file or directory (defaults to ./metaform.config.json)
    pub config: Option<PathBuf>,

    /// Exit with an error when any template has warnings
    #[arg(long)]
    pub strict: bool,
}

pub fn check(args: CheckArgs, cwd: &Path) -> Result<()> {
    let path = resolve_config_path(args.config.as_deref(), cwd)?;
    println!("{} {}", "Checking".bright_blue().bold(), path.display());

    let config = Configuration::load(&path)?;
    let mut warning_count = 0;

    for name in config.template_names() {
        let template = config.template(name)?;
        let warnings = validate_template(name, template)?;
        let selectors = discover_selectors(template);

        println!(
            "  {} {} ({} fields)",
            "✓".green(),
            name.bright_white(),
            template.fields().len()
        );
        for selector in &selectors {
            let variants: Vec<&str> = selector.variant_names().map(String::as_str).collect();
            println!(
                "      variant {} [{}]",
                selector.path().to_string().cyan(),
                variants.join(", ")
            );
        }
        for warning in &warnings {
            println!("      {} {}", "warning:".yellow(), warning);
        }
        warning_count += warnings.len();
    }

    println!();
    if warning_count == 0 {
        println!("{} Configuration is valid", "✅".green());
        Ok(())
    } else if args.strict {
        Err(anyhow::anyhow!("{} warning(s) in strict mode", warning_count))
    } else {
        println!("{} Configuration is valid with {} warning(s)", "⚠️".yellow(), warning_count);
        Ok(())
    }
}
