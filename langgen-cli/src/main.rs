use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use langgen_core::builtins::BUILTINS;
use langgen_core::{
    CompilationArtifact, LanguageDescription, TextRenderer, compile_language, load_descriptions,
};

/// Compile language descriptions into lexer specifications and property
/// bodies.
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Description file, or directory searched for `*.toml` descriptions
    /// (reads one description from stdin when absent).
    #[arg(short, long)]
    input: Option<String>,

    /// Directory receiving the generated files.
    #[arg(short, long)]
    output: Option<String>,

    #[arg(
        long,
        value_name = "FORMAT",
        default_value = "all",
        help = "Output format: all, lexer, properties, ir"
    )]
    emit: String,

    #[arg(short, long, help = "Print progress to stderr")]
    verbose: bool,

    #[arg(long, help = "List the operations of the property DSL and exit")]
    list_builtins: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    execute(cli)
}

fn execute(cli: Cli) -> Result<()> {
    if cli.list_builtins {
        for builtin in BUILTINS {
            println!("{:<16} {}", builtin.name, builtin.summary);
        }
        return Ok(());
    }

    if !matches!(cli.emit.as_str(), "all" | "lexer" | "properties" | "ir") {
        return Err(anyhow::anyhow!("unsupported emit format: {}", cli.emit));
    }
    let output = cli
        .output
        .as_deref()
        .map(PathBuf::from)
        .context("--output is required")?;

    let descriptions = match &cli.input {
        Some(path) if Path::new(path).is_dir() => load_descriptions(path)
            .with_context(|| format!("failed to load descriptions from {path}"))?,
        Some(path) => vec![
            LanguageDescription::load(path)
                .with_context(|| format!("failed to read input file {path}"))?,
        ],
        None => {
            let mut buffer = String::new();
            io::stdin().read_to_string(&mut buffer)?;
            vec![LanguageDescription::from_toml(&buffer, "<stdin>")?]
        }
    };
    if descriptions.is_empty() {
        eprintln!("no language description found");
    }

    for description in &descriptions {
        if cli.verbose {
            eprintln!("compiling {} ({})", description.name, description.source.display());
        }
        let artifact = compile_language(description, &TextRenderer)
            .with_context(|| format!("failed to compile language {}", description.name))?;
        for warning in &artifact.warnings {
            eprintln!("{warning}");
        }
        if cli.verbose {
            report_progress(&artifact);
        }
        write_artifact(&output, &cli.emit, &artifact)?;
    }

    Ok(())
}

fn report_progress(artifact: &CompilationArtifact) {
    eprintln!(
        "  lexer: {} tokens, {} patterns, {} rules",
        artifact.lexer.tokens.len(),
        artifact.lexer.patterns.len(),
        artifact.lexer.rules.len()
    );
    for prop in &artifact.properties {
        eprintln!(
            "  property {}.{}: {} ({} locals)",
            prop.ir.owner,
            prop.ir.name,
            prop.ir.body.ty,
            prop.ir.vars.len()
        );
    }
}

fn write_artifact(dir: &Path, emit: &str, artifact: &CompilationArtifact) -> Result<()> {
    let stem = artifact.language.to_ascii_lowercase();
    if matches!(emit, "all" | "lexer") {
        write_output(&dir.join(format!("{stem}.qx")), artifact.lexer_text.as_bytes())?;
    }
    if matches!(emit, "all" | "properties") {
        let bodies: Vec<&str> = artifact.properties.iter().map(|p| p.text.as_str()).collect();
        write_output(
            &dir.join(format!("{stem}_properties.adb")),
            bodies.join("\n").as_bytes(),
        )?;
    }
    if matches!(emit, "all" | "ir") {
        let json = serde_json::to_string_pretty(artifact).context("failed to serialize IR")?;
        write_output(&dir.join(format!("{stem}.json")), json.as_bytes())?;
    }
    Ok(())
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory {parent:?}"))?;
        }
    }
    fs::write(path, bytes)
        .with_context(|| format!("failed to write output file {}", path.display()))?;
    Ok(())
}
