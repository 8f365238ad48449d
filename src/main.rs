//! dualmark - Command line entry point
//!
//! Inspects markdown files through the same pipeline the editors use.

use clap::{Parser, Subcommand};
use log::{error, info};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use dualmark::config::{load_config, load_config_from, Settings};
use dualmark::editor::{HeadingNode, Outline, OutlineExtractor};
use dualmark::error::{Error, Result, ResultExt};
use dualmark::markdown::MarkdownCodec;
use dualmark::richtext::{to_ast, to_structured};

/// Application name constant.
const APP_NAME: &str = "dualmark";

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Settings file to use instead of the platform default
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the markdown AST as JSON
    Ast { file: PathBuf },
    /// Print the structured document as JSON
    Structured { file: PathBuf },
    /// Print the heading outline
    Outline {
        file: PathBuf,
        #[arg(long)]
        json: bool,
    },
    /// Rewrite markdown through the rich-text model
    Normalize { file: PathBuf },
}

fn main() -> ExitCode {
    // Initialize logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let settings = match &cli.config {
        Some(path) => load_config_from(path)
            .unwrap_or_warn_default(Settings::default(), "Failed to load configuration"),
        None => load_config(),
    };

    match run(&cli.command, &settings) {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(command: &Commands, settings: &Settings) -> Result<String> {
    let codec = MarkdownCodec::new(settings.markdown.clone());

    match command {
        Commands::Ast { file } => {
            let root = codec.parse(&read_markdown(file)?);
            Ok(serde_json::to_string_pretty(&root)? + "\n")
        }
        Commands::Structured { file } => {
            let doc = to_structured(&codec.parse(&read_markdown(file)?));
            Ok(doc.to_json_pretty()? + "\n")
        }
        Commands::Outline { file, json } => {
            let outline = OutlineExtractor::new().extract(&codec.parse(&read_markdown(file)?));
            if *json {
                Ok(serde_json::to_string_pretty(&outline)? + "\n")
            } else {
                Ok(render_outline(&outline))
            }
        }
        Commands::Normalize { file } => {
            let structured = to_structured(&codec.parse(&read_markdown(file)?));
            Ok(codec.serialize(&to_ast(&structured)))
        }
    }
}

fn read_markdown(path: &Path) -> Result<String> {
    info!("{}: reading {}", APP_NAME, path.display());
    fs::read_to_string(path).map_err(|e| {
        Error::Application(format!("Failed to read '{}': {}", path.display(), e))
    })
}

fn render_outline(outline: &Outline) -> String {
    if outline.is_empty() {
        return format!("{}\n", outline.summary());
    }

    let mut out = String::new();
    for (depth, heading) in outline.flatten() {
        out.push_str(&format_heading(depth, heading));
        out.push('\n');
    }
    out
}

fn format_heading(depth: usize, heading: &HeadingNode) -> String {
    format!(
        "{}{} {} ({})",
        "  ".repeat(depth),
        "#".repeat(heading.level as usize),
        heading.text,
        heading.id
    )
}
