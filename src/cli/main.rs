// selftest-fixture: inspect and repair a build directory prepared by the
// selftest fixture, e.g. after an aborted selftest run.
// Usage: selftest-fixture [--builddir DIR] [--config FILE] <command>

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use selftest_fixture::bbvars::BitbakeVars;
use selftest_fixture::{available_machines, logging, FixtureConfig, SelftestClass, ShellRunner};

#[derive(Debug, Parser)]
#[command(name = "selftest-fixture", version, about = "Manage selftest fixture state in a BitBake build directory")]
struct Cli {
    /// Build directory (defaults to $BUILDDIR).
    #[arg(long, global = true)]
    builddir: Option<PathBuf>,

    /// TOML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// meta-selftest layer (defaults to the one on BBLAYERS).
    #[arg(long, global = true)]
    test_layer: Option<PathBuf>,

    /// Increase log verbosity (-v debug, -vv trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Debug, Subcommand)]
enum Cmd {
    /// List machines available on BBPATH.
    Machines,
    /// Add the selftest include directives to local.conf and bblayers.conf.
    AddInclude,
    /// Remove the selftest include directives.
    RemoveInclude,
    /// Restore local.conf and bblayers.conf from backups left by an aborted run.
    Restore,
    /// Delete generated include files and recipe includes.
    Clean,
}

fn load_config(cli: &Cli) -> Result<FixtureConfig> {
    let mut config = match &cli.config {
        Some(path) => FixtureConfig::from_toml_file(path)
            .with_context(|| format!("loading {}", path.display()))?
            .with_env_overrides(),
        None if cli.builddir.is_some() => FixtureConfig::default().with_env_overrides(),
        None => FixtureConfig::from_env()?,
    };
    if let Some(dir) = &cli.builddir {
        config.builddir = dir.clone();
    }
    if let Some(layer) = &cli.test_layer {
        config.test_layer = Some(layer.clone());
    }
    config.validate()?;
    Ok(config)
}

fn run(cli: Cli) -> Result<()> {
    let config = load_config(&cli)?;
    let vars = BitbakeVars::new(ShellRunner);

    match cli.command {
        Cmd::Machines => {
            for machine in available_machines(&vars).context("discovering machines")? {
                println!("{}", machine);
            }
        }
        Cmd::AddInclude => SelftestClass::without_test_layer(config)?.add_include()?,
        Cmd::RemoveInclude => SelftestClass::without_test_layer(config)?.remove_include()?,
        Cmd::Restore => {
            let n = SelftestClass::without_test_layer(config)?.restore_backups()?;
            println!("Restored {} file(s)", n);
        }
        Cmd::Clean => {
            let class = SelftestClass::resolve(config, &vars).context("locating meta-selftest")?;
            class.remove_inc_files()?;
        }
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
