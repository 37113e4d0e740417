//! Inspect module roots without loading anything
//!
//! Lists every candidate directory under each root with its lookup identifier
//! and either the type its source unit declares or the reason a scan would
//! reject it before loading.
//!
//! Usage:
//!   modscan [--config modhost.toml] [--json] [DIR...]

use anyhow::Result;
use clap::Parser;
use serde::Serialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use modhost::config::{HostConfig, ScanConfig};
use modhost::module::registry::{inspect_source, list_candidates, IgnoreReason};
use modhost::module::traits::normalize_identifier;
use modhost::utils::{init_logging_from_config, with_default};

const DEFAULT_CONFIG: &str = "modhost.toml";

#[derive(Parser, Debug)]
#[command(name = "modscan", about = "List module candidates and their declarations")]
struct Args {
    /// Host configuration file (TOML or JSON)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print JSON instead of text
    #[arg(long)]
    json: bool,

    /// Module roots; defaults to the configured core and api roots
    dirs: Vec<PathBuf>,
}

#[derive(Debug, Serialize)]
struct RootReport {
    directory: PathBuf,
    candidates: Vec<CandidateReport>,
}

#[derive(Debug, Serialize)]
struct CandidateReport {
    name: String,
    identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    qualified_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    rejected: Option<IgnoreReason>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => HostConfig::from_file(path)?,
        None => with_default(
            || {
                let path = Path::new(DEFAULT_CONFIG);
                if path.exists() {
                    HostConfig::from_file(path)
                } else {
                    Ok(HostConfig::default())
                }
            },
            HostConfig::default(),
            "Failed to load modhost.toml",
        ),
    };
    init_logging_from_config(config.logging.as_ref());

    let roots = if args.dirs.is_empty() {
        let base = std::env::current_dir()?;
        vec![config.modules.core_path(&base), config.modules.api_path(&base)]
    } else {
        args.dirs.clone()
    };

    let reports: Vec<RootReport> = roots
        .iter()
        .map(|root| inspect_root(root, &config.scan))
        .collect();

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
    } else {
        for report in &reports {
            print_report(report);
        }
    }
    Ok(())
}

fn inspect_root(root: &Path, scan: &ScanConfig) -> RootReport {
    info!("Inspecting module root {:?}", root);

    let mut seen = HashSet::new();
    let candidates = list_candidates(root, scan)
        .into_iter()
        .map(|candidate| {
            let identifier = normalize_identifier(&candidate.name);
            // Only candidates that pass inspection claim their identifier
            let outcome = if seen.contains(&identifier) {
                Err(IgnoreReason::Collision)
            } else {
                inspect_source(&candidate.source_file, scan).map(|decl| decl.qualified_name())
            };
            if outcome.is_ok() {
                seen.insert(identifier.clone());
            }
            debug!("{} -> {:?}", candidate.name, outcome);

            let (qualified_type, rejected) = match outcome {
                Ok(name) => (Some(name), None),
                Err(reason) => (None, Some(reason)),
            };
            CandidateReport {
                name: candidate.name,
                identifier,
                qualified_type,
                rejected,
            }
        })
        .collect();

    RootReport {
        directory: root.to_path_buf(),
        candidates,
    }
}

fn print_report(report: &RootReport) {
    println!("{}", report.directory.display());
    if report.candidates.is_empty() {
        println!("  (no candidates)");
        return;
    }
    for candidate in &report.candidates {
        match (&candidate.qualified_type, &candidate.rejected) {
            (Some(ty), _) => println!("  {:<24} {:<24} {}", candidate.name, candidate.identifier, ty),
            (None, Some(reason)) => println!(
                "  {:<24} {:<24} rejected: {}",
                candidate.name, candidate.identifier, reason
            ),
            (None, None) => println!("  {:<24} {}", candidate.name, candidate.identifier),
        }
    }
}
