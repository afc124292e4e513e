/*
SPDX-License-Identifier: MPL-2.0
*/

//! Command-line front end for persisted productions: orphan
//! reclamation, citation data extraction and BibTeX import.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use ovide_core::csl::parse_bibtex;
use ovide_core::production::Production;
use ovide_engine::citations::build_citations;
use ovide_engine::lifecycle::delete_uncited_context;
use ovide_engine::store::ProductionStore;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Reclaim uncited notes, contextualizations and contextualizers in
    /// one section, rewriting the production file in place
    Gc {
        /// Production file, JSON or YAML by extension
        file: PathBuf,
        /// Section to collect
        #[arg(long)]
        section: String,
    },
    /// Print the citation items and clusters of one section as JSON
    Citations {
        /// Production file, JSON or YAML by extension
        file: PathBuf,
        /// Section to resolve
        #[arg(long)]
        section: String,
    },
    /// Convert a BibTeX file to CSL-JSON, reporting per-entry failures
    /// on stderr
    ImportBib {
        /// BibTeX source file
        file: PathBuf,
    },
}

fn main() -> ExitCode {
    if let Err(error) = run() {
        eprintln!("error: {error:#}");
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}

fn run() -> Result<()> {
    flexi_logger::Logger::try_with_env_or_str("warn")
        .context("invalid log specification")?
        .start()
        .context("failed to start logger")?;

    let cli = Cli::parse();
    match cli.command {
        Command::Gc { file, section } => gc(&file, &section),
        Command::Citations { file, section } => citations(&file, &section),
        Command::ImportBib { file } => import_bib(&file),
    }
}

fn gc(path: &Path, section_id: &str) -> Result<()> {
    let production = load_production(path)?;
    let mut store = ProductionStore::new();
    store.insert_production(production.clone());

    let reclaimed = delete_uncited_context(&production, section_id, &mut store)?;
    let updated = store
        .production(&production.id)
        .context("production vanished from the store")?;
    write_production(path, updated)?;

    println!(
        "section {section_id}: reclaimed {} contextualization(s), {} contextualizer(s)",
        reclaimed.contextualization_ids.len(),
        reclaimed.contextualizer_ids.len()
    );
    for id in &reclaimed.contextualization_ids {
        println!("  {id}");
    }
    Ok(())
}

fn citations(path: &Path, section_id: &str) -> Result<()> {
    let production = load_production(path)?;
    let section = production
        .sections
        .get(section_id)
        .with_context(|| format!("no section {section_id} in {}", path.display()))?;
    let citations = build_citations(&production, section);
    println!("{}", serde_json::to_string_pretty(&citations)?);
    Ok(())
}

fn import_bib(path: &Path) -> Result<()> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let outcome = parse_bibtex(&source);

    for failure in &outcome.failures {
        eprintln!("skipped `{}`: {}", failure.entry, failure.message);
    }
    if outcome.items.is_empty() && !outcome.failures.is_empty() {
        bail!("no entry of {} could be parsed", path.display());
    }
    println!("{}", serde_json::to_string_pretty(&outcome.items)?);
    Ok(())
}

fn load_production(path: &Path) -> Result<Production> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    if is_yaml(path) {
        serde_yaml::from_str(&raw)
            .with_context(|| format!("invalid production YAML in {}", path.display()))
    } else {
        serde_json::from_str(&raw)
            .with_context(|| format!("invalid production JSON in {}", path.display()))
    }
}

fn write_production(path: &Path, production: &Production) -> Result<()> {
    let serialized = if is_yaml(path) {
        serde_yaml::to_string(production)?
    } else {
        let mut json = serde_json::to_string_pretty(production)?;
        json.push('\n');
        json
    };
    fs::write(path, serialized).with_context(|| format!("failed to write {}", path.display()))?;
    log::info!("wrote {}", path.display());
    Ok(())
}

fn is_yaml(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml" | "yml")
    )
}
