//! KappaView command line viewer
//!
//! Loads a profile, waits for its target process and prints the tracked
//! resources on every poll.

mod runner;

use anyhow::{Context, Result};
use clap::Parser;
use kappa_common::{init_logging, OutputFormat, ViewerConfig};
use kappa_core::Engine;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "kappa-view")]
#[command(about = "KappaView - watch named values in a running process")]
#[command(version)]
struct Args {
    /// Profile describing the target and its resources
    profile: PathBuf,

    /// Viewer configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Poll interval in milliseconds
    #[arg(short, long)]
    interval: Option<u64>,

    /// Give up waiting for the target after this many milliseconds
    #[arg(long)]
    attach_timeout: Option<u64>,

    /// Print each snapshot as a JSON array
    #[arg(long)]
    json: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long)]
    log_level: Option<String>,

    /// Also write logs to this file
    #[arg(long)]
    log_file: Option<String>,

    /// Poll once and exit
    #[arg(long)]
    once: bool,

    /// Load the profile, print its metadata and exit
    #[arg(long)]
    validate: bool,

    /// Print the resource table and exit
    #[arg(long)]
    list: bool,
}

impl Args {
    /// Command line flags take precedence over the config file
    fn apply(&self, config: &mut ViewerConfig) {
        if let Some(interval) = self.interval {
            config.poll_interval_ms = interval;
        }
        if let Some(timeout) = self.attach_timeout {
            config.attach_timeout_ms = timeout;
        }
        if self.json {
            config.output = OutputFormat::Json;
        }
        if let Some(level) = &self.log_level {
            config.logging = std::mem::take(&mut config.logging).with_level(level);
        }
        if let Some(path) = &self.log_file {
            config.logging = std::mem::take(&mut config.logging).with_file(path);
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_file(path)?,
        None => ViewerConfig::default(),
    };
    args.apply(&mut config);
    init_logging(&config.logging);

    let mut engine = Engine::load(&args.profile)
        .with_context(|| format!("Failed to load profile {}", args.profile.display()))?;

    if args.validate {
        print_metadata(&engine);
        return Ok(());
    }
    if args.list {
        print_metadata(&engine);
        print_resources(&engine);
        return Ok(());
    }

    let stdout = std::io::stdout();
    runner::run(&mut engine, &config, args.once, &mut stdout.lock())
}

fn print_metadata(engine: &Engine) {
    println!("Version:  {}", engine.profile_version());
    println!("Target:   {}", engine.target_name());
    println!("Platform: {}-bit", engine.pointer_width().bits());
    println!("Resources: {}", engine.resources().len());
}

fn print_resources(engine: &Engine) {
    println!();
    println!(
        "{:<16} {:<20} {:<8} {:<10} {:<7} DESCRIPTION",
        "KEY", "NAME", "TYPE", "DATATYPE", "SHOWN"
    );
    for resource in engine.resources() {
        println!(
            "{:<16} {:<20} {:<8} {:<10} {:<7} {}",
            resource.key,
            resource.name,
            resource.kind.to_string(),
            resource.data_type.to_string(),
            if resource.display.is_some() { "yes" } else { "no" },
            resource.description.as_deref().unwrap_or("")
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_override_config() {
        let args = Args::parse_from([
            "kappa-view",
            "game.json",
            "--interval",
            "200",
            "--json",
            "--log-level",
            "debug",
            "--attach-timeout",
            "1000",
            "--log-file",
            "session.log",
        ]);
        let mut config = ViewerConfig::default();
        args.apply(&mut config);
        assert_eq!(config.poll_interval_ms, 200);
        assert_eq!(config.attach_timeout_ms, 1000);
        assert_eq!(config.output, OutputFormat::Json);
        assert_eq!(config.logging.level, "debug");
        assert!(config.logging.file_enabled);
        assert_eq!(config.logging.file_path, "session.log");
        assert_eq!(args.profile, PathBuf::from("game.json"));
    }

    #[test]
    fn test_defaults_leave_config_alone() {
        let args = Args::parse_from(["kappa-view", "game.json"]);
        let mut config = ViewerConfig::default();
        args.apply(&mut config);
        assert_eq!(config, ViewerConfig::default());
        assert!(!args.once);
        assert!(!args.validate);
    }
}
