// Copyright (c) 2026 Christoph Gaffga
// SPDX-License-Identifier: GPL-3.0-only

//! codemark - embed and detect source code ownership watermarks.
//!
//! Works on syntax trees in JSON form, as produced by the parser front end.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use codemark_core::watermark::payload;
use codemark_core::{
    detect_tree, embed_tree, resolve_key, DetectionStatus, FileKeyVault, KeyRole, KeySource, Recovery,
    StageRegistry, SyntaxTree, WatermarkConfig, WatermarkError, Whitelist,
};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// codemark - source code watermarking
#[derive(Parser, Debug)]
#[command(name = "codemark")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the watermark configuration file
    #[arg(short, long, default_value = "codemark.toml")]
    config: PathBuf,

    /// Path to the whitelist file
    #[arg(short, long, default_value = "whitelist.json")]
    whitelist: PathBuf,

    /// Path to the encrypted key vault
    #[arg(long, default_value = "key_vault.bin")]
    vault: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the watermark payload bits for the configured project
    Payload,

    /// Embed the watermark into a syntax tree
    Embed {
        /// Syntax tree (JSON)
        tree: PathBuf,

        /// Output path (default: <tree>_transformed.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Write without asking for confirmation
        #[arg(short, long)]
        yes: bool,
    },

    /// Detect the watermark in a syntax tree
    Detect {
        /// Syntax tree (JSON)
        tree: PathBuf,

        /// Print the result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Key vault management
    #[command(subcommand)]
    Vault(VaultCommands),
}

#[derive(Subcommand, Debug)]
enum VaultCommands {
    /// Store the secret for a role (embedder or detector)
    Set { role: KeyRole, secret: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();

    match &cli.command {
        Commands::Payload => cmd_payload(&cli),
        Commands::Embed { tree, output, yes } => cmd_embed(&cli, tree, output.as_deref(), *yes),
        Commands::Detect { tree, json } => cmd_detect(&cli, tree, *json),
        Commands::Vault(VaultCommands::Set { role, secret }) => cmd_vault_set(&cli, *role, secret),
    }
}

fn load_config(cli: &Cli) -> Result<WatermarkConfig> {
    WatermarkConfig::from_file(&cli.config)
        .with_context(|| format!("failed to load configuration {}", cli.config.display()))
}

fn load_whitelist(cli: &Cli) -> Result<Whitelist> {
    Whitelist::from_file(&cli.whitelist)
        .with_context(|| format!("failed to load whitelist {}", cli.whitelist.display()))
}

fn load_tree(path: &Path) -> Result<SyntaxTree> {
    let text = std::fs::read_to_string(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse syntax tree {}", path.display()))
}

/// Open the vault if possible. A missing master secret means no vault; a
/// vault that exists but cannot be read is fatal.
fn open_vault(cli: &Cli) -> Result<Option<FileKeyVault>> {
    match FileKeyVault::open(&cli.vault) {
        Ok(vault) => Ok(Some(vault)),
        Err(WatermarkError::VaultUnavailable(reason)) => {
            tracing::warn!(%reason, "key vault unavailable, continuing without it");
            Ok(None)
        }
        Err(e) => Err(e).with_context(|| format!("failed to open key vault {}", cli.vault.display())),
    }
}

fn resolve(cli: &Cli, role: KeyRole, config: &WatermarkConfig) -> Result<Option<codemark_core::CipherKey>> {
    let vault = open_vault(cli)?;
    Ok(resolve_key(role, config, vault.as_ref().map(|v| v as &dyn KeySource)))
}

fn cmd_payload(cli: &Cli) -> Result<()> {
    let config = load_config(cli)?;
    let key = resolve(cli, KeyRole::Embedder, &config)?;
    let generated = payload::generate(&config, key.as_ref())?;
    println!("{}", generated.payload);
    eprintln!(
        "{} bits ({}, {})",
        generated.payload.len(),
        config.codec()?,
        if key.is_some() { "encrypted" } else { "unencrypted" }
    );
    Ok(())
}

fn default_output(input: &Path) -> PathBuf {
    let stem = input.file_stem().and_then(|s| s.to_str()).unwrap_or("tree");
    input.with_file_name(format!("{stem}_transformed.json"))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{prompt} (y/n): ");
    std::io::stdout().flush()?;
    let mut answer = String::new();
    std::io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn cmd_embed(cli: &Cli, tree_path: &Path, output: Option<&Path>, yes: bool) -> Result<()> {
    let config = load_config(cli)?;
    let whitelist = load_whitelist(cli)?;
    let tree = load_tree(tree_path)?;
    let key = resolve(cli, KeyRole::Embedder, &config)?;

    let outcome = embed_tree(&tree, &config, &whitelist, key.as_ref(), &StageRegistry::with_builtins())
        .context("embedding failed")?;

    if outcome.changes.is_empty() {
        println!("No whitelisted sites changed.");
    } else {
        println!("Changes:");
        for change in &outcome.changes {
            println!(" - {change}");
        }
    }
    if outcome.wraps > 0 {
        println!("Payload reused {} time(s) across {} sites.", outcome.wraps, outcome.bits_consumed);
    }

    if !yes && !confirm("Apply these changes?")? {
        println!("No changes written.");
        return Ok(());
    }

    let out_path = output.map(Path::to_path_buf).unwrap_or_else(|| default_output(tree_path));
    let json = serde_json::to_string_pretty(&outcome.tree)?;
    std::fs::write(&out_path, json).with_context(|| format!("failed to write {}", out_path.display()))?;
    println!("Watermarked tree written to {}", out_path.display());
    Ok(())
}

fn cmd_detect(cli: &Cli, tree_path: &Path, json: bool) -> Result<()> {
    let config = load_config(cli)?;
    let whitelist = load_whitelist(cli)?;
    let tree = load_tree(tree_path)?;
    let key = resolve(cli, KeyRole::Detector, &config)?;

    let result = detect_tree(&tree, &config, &whitelist, key.as_ref()).context("detection failed")?;

    if json {
        println!("{}", serde_json::to_string_pretty(&result)?);
        return Ok(());
    }

    println!("Extracted bits: {}", codemark_core::codec::bits::to_bit_string(&result.extracted_bits));
    println!("Expected bits:  {}", codemark_core::codec::bits::to_bit_string(&result.expected_bits_prefix));
    match result.status {
        DetectionStatus::Detected => println!("Watermark detected."),
        DetectionStatus::PartiallyDetected => {
            println!("Watermark partially detected: {:.2}% of bits match.", result.match_ratio * 100.0)
        }
        DetectionStatus::NotDetected => println!("Watermark not detected: no watermark sites found."),
    }
    match &result.recovery {
        Recovery::Recovered { intact: true, identity, .. } => {
            println!("Recovered identity: {}", identity.as_deref().unwrap_or("<binary>"))
        }
        Recovery::Recovered { intact: false, .. } => println!("Recovered bits do not match this project."),
        Recovery::Incomplete { have, need } => println!("Recovery needs {need} bits, found {have}."),
        Recovery::Failed { error } => println!("Recovery failed: {error}"),
    }
    Ok(())
}

fn cmd_vault_set(cli: &Cli, role: KeyRole, secret: &str) -> Result<()> {
    if secret.is_empty() {
        bail!("secret must not be empty");
    }
    let mut vault = FileKeyVault::open(&cli.vault)
        .with_context(|| format!("failed to open key vault {}", cli.vault.display()))?;
    vault.set_key(role, secret)?;
    println!("Stored {role} key in {}", vault.path().display());
    Ok(())
}
