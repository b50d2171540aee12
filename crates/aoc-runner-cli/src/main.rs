//! aoc-runner CLI: `aocr` command.
//!
//! Manages the Advent of Code users known to the runner: list them, add
//! session tokens, pick the default user, and replace expired tokens.
//!
//! Paths come from the `AOC_RUNNER_*` environment variables. A token in
//! `AOC_RUNNER_SESSION` or in the one-shot `{auth_dir}/token` file is
//! imported as the default user on every run.

use anyhow::{anyhow, Context, Result};
use clap::{ArgGroup, Parser, Subcommand};
use log::debug;

use aoc_runner::error::mask_credential;
use aoc_runner::{Config, HttpClient, IdentityRecord, IdentityResolver, Registry};

// ── CLI structure ─────────────────────────────────────────────────────────────

/// aoc-runner CLI: manage Advent of Code session tokens.
#[derive(Parser, Debug)]
#[command(
    name = "aocr",
    about = "aoc-runner CLI",
    version,
    long_about = "aocr: aoc-runner CLI\n\nManage the Advent of Code users and session tokens known to the runner."
)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// List known users
    List,

    /// Show one user (default: the default user)
    Show {
        /// User key, e.g. github.2129276
        key: Option<String>,

        /// Print the full session token
        #[arg(long)]
        reveal: bool,
    },

    /// Add a session token, resolving its owner on the site
    Add {
        /// Session token (the `session` cookie value)
        token: String,

        /// Replace the stored token if the user already has a different one
        #[arg(long)]
        force: bool,
    },

    /// Remove a user
    Remove {
        /// User key
        key: String,
    },

    /// Set the default user
    #[command(group(ArgGroup::new("target").required(true).args(["key", "token"])))]
    Default {
        /// User key
        #[arg(long)]
        key: Option<String>,

        /// Session token of the user
        #[arg(long)]
        token: Option<String>,
    },

    /// Replace the stored token of a user
    Update {
        /// User key
        key: String,

        /// New session token
        token: String,
    },

    /// Print the runner's file locations
    Paths,
}

fn main() {
    env_logger::init();

    let cli = Cli::parse();
    let verbose = cli.verbose;

    let result = match cli.command {
        Commands::List => cmd_list(verbose),
        Commands::Show { key, reveal } => cmd_show(key.as_deref(), reveal, verbose),
        Commands::Add { token, force } => cmd_add(&token, force, verbose),
        Commands::Remove { key } => cmd_remove(&key, verbose),
        Commands::Default { key, token } => cmd_default(key.as_deref(), token.as_deref(), verbose),
        Commands::Update { key, token } => cmd_update(&key, &token, verbose),
        Commands::Paths => cmd_paths(),
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn open_registry() -> Result<(Config, Registry<HttpClient>)> {
    let config = Config::from_env().context("failed to prepare runner directories")?;
    let client = HttpClient::new().context("failed to create HTTP client")?;
    let resolver = IdentityResolver::new(client, &config);
    let registry = Registry::open(&config, resolver).context("failed to open user registry")?;
    debug!("Opened registry at {}", registry.tokens_file().display());
    Ok((config, registry))
}

fn format_time(record: &IdentityRecord) -> String {
    record.last_updated.format("%Y-%m-%d %H:%M:%S").to_string()
}

// ── Command implementations ───────────────────────────────────────────────────

/// `aocr list`
fn cmd_list(verbose: bool) -> Result<()> {
    let (_, registry) = open_registry()?;
    let records = registry.list_records();

    if records.is_empty() {
        println!(
            "No users found in {}",
            registry.tokens_file().display()
        );
        return Ok(());
    }

    println!(
        "  {:<24} {:<24} {:<10} UPDATED",
        "KEY", "NAME", "TOKEN"
    );
    println!("{}", "-".repeat(80));

    for record in &records {
        let marker = if registry.default_key() == Some(record.key().as_str()) {
            "*"
        } else {
            " "
        };
        println!(
            "{marker} {:<24} {:<24} ...{:<7} {}",
            record.key(),
            record.display_name,
            record.masked_credential(),
            format_time(record)
        );
    }

    if verbose {
        println!();
        println!("File: {}", registry.tokens_file().display());
    }

    Ok(())
}

/// `aocr show [KEY] [--reveal]`
fn cmd_show(key: Option<&str>, reveal: bool, verbose: bool) -> Result<()> {
    let (config, registry) = open_registry()?;

    let record = match key {
        Some(key) => registry
            .get(key)
            .ok_or_else(|| anyhow!("user '{key}' not found"))?,
        None => registry
            .default_record()
            .ok_or_else(|| anyhow!("no default user is set"))?,
    };

    let is_default = registry.default_key() == Some(record.key().as_str());
    println!("User: {}", record.key());
    println!("  Name:     {}", record.display_name);
    println!("  AoC ID:   {}", record.identity_id);
    println!("  Source:   {}", record.source);
    println!("  Updated:  {}", format_time(record));
    println!("  Default:  {}", if is_default { "yes" } else { "no" });
    if reveal {
        println!("  Token:    {}", record.credential);
    } else {
        println!("  Token:    ...{}", record.masked_credential());
    }

    if verbose {
        println!("  Cache:    {}", record.cache_dir(&config.users_dir).display());
    }

    Ok(())
}

/// `aocr add TOKEN [--force]`
fn cmd_add(token: &str, force: bool, verbose: bool) -> Result<()> {
    let (_, mut registry) = open_registry()?;

    registry
        .add_credential(token, force)
        .with_context(|| format!("failed to add token ...{}", mask_credential(token)))?;

    let key = registry
        .owner_of(token)
        .ok_or_else(|| anyhow!("token was not stored"))?;
    println!("Added user {key}");
    if verbose {
        println!("  Default: {}", registry.default_key().unwrap_or("none"));
    }
    Ok(())
}

/// `aocr remove KEY`
fn cmd_remove(key: &str, verbose: bool) -> Result<()> {
    let (_, mut registry) = open_registry()?;

    if registry.get(key).is_none() {
        println!("User {key} not found, nothing removed");
        return Ok(());
    }

    registry
        .remove(key)
        .with_context(|| format!("failed to remove user {key}"))?;
    println!("Removed user {key}");
    if verbose {
        println!("  Default: {}", registry.default_key().unwrap_or("none"));
    }
    Ok(())
}

/// `aocr default (--key KEY | --token TOKEN)`
fn cmd_default(key: Option<&str>, token: Option<&str>, _verbose: bool) -> Result<()> {
    let (_, mut registry) = open_registry()?;

    match (key, token) {
        (Some(key), _) => registry
            .set_default_by_key(key)
            .with_context(|| format!("failed to set default user to {key}"))?,
        (None, Some(token)) => registry
            .set_default_by_credential(token)
            .context("failed to set default user by token")?,
        (None, None) => return Err(anyhow!("either --key or --token is required")),
    }

    println!(
        "Default user: {}",
        registry.default_key().unwrap_or("none")
    );
    Ok(())
}

/// `aocr update KEY TOKEN`
fn cmd_update(key: &str, token: &str, _verbose: bool) -> Result<()> {
    let (_, mut registry) = open_registry()?;

    registry
        .update_credential(key, token)
        .with_context(|| format!("failed to update token for {key}"))?;
    println!("Updated token for {key} to ...{}", mask_credential(token));
    Ok(())
}

/// `aocr paths`
fn cmd_paths() -> Result<()> {
    let config = Config::from_env().context("failed to prepare runner directories")?;
    println!("Runner dir:   {}", config.runner_dir.display());
    println!("Project home: {}", config.project_home.display());
    println!("Auth dir:     {}", config.auth_dir.display());
    println!("Tokens file:  {}", config.tokens_file().display());
    println!("Users dir:    {}", config.users_dir.display());
    println!("Cache dir:    {}", config.cache_dir.display());
    println!("Domain:       {}", config.domain);
    Ok(())
}
