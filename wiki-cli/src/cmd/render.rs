use anyhow::{Context, Result, bail};
use clap::{Arg, ArgAction, ArgMatches, Command};
use std::path::Path;
use tracing::info;
use wiki_core::build_site;

use crate::config::{DEFAULT_CONFIG_FILE, WikiConfig};

pub fn add_render_args(command: Command) -> Command {
    command
        .arg(
            Arg::new("source")
                .short('s')
                .long("src")
                .value_name("DIR")
                .help("Directory with Markdown input")
                .default_value("pages"),
        )
        .arg(
            Arg::new("dest")
                .short('d')
                .long("dest")
                .value_name("DIR")
                .help("Directory for HTML output")
                .default_value("public"),
        )
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("Configuration file")
                .default_value(DEFAULT_CONFIG_FILE),
        )
        .arg(
            Arg::new("clean")
                .long("clean")
                .help("Remove the output directory before rendering")
                .action(ArgAction::SetTrue),
        )
}

pub fn make_subcommand() -> Command {
    add_render_args(Command::new("render")).about("Convert wiki markdown into HTML")
}

pub fn execute(args: &ArgMatches) -> Result<()> {
    let config = WikiConfig::load(args)?;
    let render_config = config.render_config();

    let source_dir = Path::new(&render_config.source);
    let output_dir = Path::new(&render_config.dest);

    if render_config.clean && output_dir.exists() {
        clean_output(source_dir, output_dir)?;
    }

    let report = build_site(&config.core, source_dir, output_dir)
        .with_context(|| format!("Failed to render {}", source_dir.display()))?;

    println!(
        "Rendered {} pages and {} assets into {}",
        report.pages,
        report.assets,
        output_dir.display()
    );

    Ok(())
}

/// Removes a previous render, refusing when the sources live inside it.
fn clean_output(source_dir: &Path, output_dir: &Path) -> Result<()> {
    let output = output_dir
        .canonicalize()
        .with_context(|| format!("Failed to resolve {}", output_dir.display()))?;

    // A source that doesn't exist yet can't be deleted by the cleanup
    if let Ok(source) = source_dir.canonicalize() {
        if source.starts_with(&output) {
            bail!(
                "Refusing to clean {}: it contains the source directory {}",
                output_dir.display(),
                source_dir.display()
            );
        }
    }

    info!(path = %output_dir.display(), "Removing previous output");
    std::fs::remove_dir_all(output_dir)
        .with_context(|| format!("Failed to remove {}", output_dir.display()))
}
