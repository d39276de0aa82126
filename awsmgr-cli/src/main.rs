//! awsmgr CLI - command-line manager for CloudWatch Logs, S3 and SNS.
//!
//! ## Features
//!
//! - Browse log groups and streams, filter log events
//! - Create, inspect and bulk-delete buckets and object versions
//! - Manage SNS topics, SMS subscriptions and publishing
//! - Text or JSON output, shell completions, TOML config files

use anyhow::Result;
use awsmgr::logs::CloudWatchLogs;
use awsmgr::notify::SnsNotifications;
use awsmgr::sdk::{AwsContext, ClientOptions};
use awsmgr::storage::S3Store;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use console::style;
use env_logger::Env;
use log::debug;
use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;

use commands::logs::LogsCommand;
use commands::s3::{S3Command, S3Settings};
use commands::sns::SnsCommand;
use config::Config;

/// Whether stderr is a terminal (set once at startup).
static STDERR_IS_TTY: AtomicBool = AtomicBool::new(true);

/// Set by the Ctrl-C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Check if progress bars and symbols should be used (TTY and colors enabled).
fn use_fancy_output() -> bool {
    STDERR_IS_TTY.load(Ordering::Relaxed) && console::colors_enabled_stderr()
}

pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

/// Errors raised by the CLI layer itself.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation, or a required confirmation could not be obtained.
    #[error("{0}")]
    Usage(String),
    /// Configuration could not be used.
    #[error("{0}")]
    Config(String),
    /// The user aborted.
    #[error("{0}")]
    Cancelled(String),
}

impl CliError {
    fn exit_code(&self) -> i32 {
        match self {
            Self::Usage(_) => 2,
            Self::Config(_) => 3,
            Self::Cancelled(_) => 130,
        }
    }
}

fn library_exit_code(err: &awsmgr::Error) -> i32 {
    match err {
        awsmgr::Error::InvalidArgument(_) => 2,
        awsmgr::Error::Config(_) => 3,
        awsmgr::Error::Remote { .. } | awsmgr::Error::NotFound(_) => 4,
        awsmgr::Error::Interrupted => 130,
        awsmgr::Error::Io(_) | awsmgr::Error::Runtime(_) => 1,
    }
}

/// Map an error to the process exit code using the first typed cause in its chain.
fn exit_code_for(err: &anyhow::Error) -> i32 {
    for cause in err.chain() {
        if let Some(cli_err) = cause.downcast_ref::<CliError>() {
            return cli_err.exit_code();
        }
        if let Some(lib_err) = cause.downcast_ref::<awsmgr::Error>() {
            return library_exit_code(lib_err);
        }
    }
    1
}

/// awsmgr - manage CloudWatch Logs, S3 and SNS from the command line.
///
/// Environment variables:
///   AWSMGR_REGION            - Region (overrides config files)
///   AWSMGR_PROFILE           - Credentials profile
///   AWSMGR_ENDPOINT_URL      - Endpoint override (local emulators)
///   AWSMGR_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "awsmgr")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
#[command(after_help = "For more information, visit: https://github.com/sanchuanhehe/awsmgr")]
struct Cli {
    /// AWS region (resolved from the environment if not specified).
    #[arg(long, global = true, env = "AWSMGR_REGION", alias = "region_name")]
    region: Option<String>,

    /// Named credentials profile.
    #[arg(long, global = true, env = "AWSMGR_PROFILE")]
    profile: Option<String>,

    /// Endpoint override, e.g. http://localhost:4566.
    #[arg(long, global = true, env = "AWSMGR_ENDPOINT_URL", value_name = "URL")]
    endpoint_url: Option<String>,

    /// Verbose output level (-v, -vv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (suppress non-essential output).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Print results as JSON to stdout.
    #[arg(long, global = true)]
    json: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "AWSMGR_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// CloudWatch Logs operations.
    Logs {
        #[command(subcommand)]
        operation: Option<LogsCommand>,
    },

    /// S3 bucket and object operations.
    S3 {
        #[command(subcommand)]
        operation: Option<S3Command>,
    },

    /// SNS topic and subscription operations.
    Sns {
        #[command(subcommand)]
        operation: Option<SnsCommand>,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions (auto-detected if not specified with --install).
        #[arg(value_enum)]
        shell: Option<Shell>,

        /// Automatically install completions to your shell configuration.
        #[arg(long)]
        install: bool,
    },
}

fn init_logging(cli: &Cli) {
    let log_level = if cli.quiet {
        "warn"
    } else {
        match cli.verbose {
            0 => "info",
            1 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(cli.verbose >= 2)
        .format_timestamp(if cli.verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn install_interrupt_handler() {
    let result = ctrlc::set_handler(|| {
        if INTERRUPTED.swap(true, Ordering::SeqCst) {
            std::process::exit(130);
        }
        eprintln!("\nInterrupted, stopping after the current request (Ctrl-C again to force)");
    });
    if let Err(e) = result {
        debug!("Could not install Ctrl-C handler: {e}");
    }
    awsmgr::set_interrupt_checker(was_interrupted);
}

fn ensure_not_interrupted() -> Result<()> {
    if was_interrupted() {
        Err(CliError::Cancelled("Interrupted".to_string()).into())
    } else {
        Ok(())
    }
}

/// SDK options from flags (and their env vars) falling back to config files.
fn client_options(cli: &Cli, config: &Config) -> ClientOptions {
    ClientOptions::default()
        .with_region(cli.region.clone().or_else(|| config.aws.region.clone()))
        .with_profile(cli.profile.clone().or_else(|| config.aws.profile.clone()))
        .with_endpoint_url(
            cli.endpoint_url
                .clone()
                .or_else(|| config.aws.endpoint_url.clone()),
        )
        .with_force_path_style(config.s3.force_path_style)
}

fn load_context(cli: &Cli, config: &Config) -> Result<Arc<AwsContext>> {
    ensure_not_interrupted()?;
    let options = client_options(cli, config);
    debug!("Client options: {options:?}");
    AwsContext::load(&options).map_err(|err| match err {
        awsmgr::Error::Config(message) => CliError::Config(format!(
            "{message}, or set region under [aws] in {}",
            config::LOCAL_CONFIG_FILE
        ))
        .into(),
        other => anyhow::Error::from(other).context("Failed to load AWS configuration"),
    })
}

/// S3 settings from config; new buckets fall back to the client's region.
fn s3_settings(cli: &Cli, config: &Config, client_region: Option<&str>) -> S3Settings {
    S3Settings {
        bucket_region: config.s3.bucket_region.clone(),
        client_region: client_region
            .map(str::to_owned)
            .or_else(|| client_options(cli, config).region),
        wait: config.s3.wait_policy(),
        progress: false,
    }
}

/// Print the help of a command group, e.g. `awsmgr s3`.
fn print_group_help(name: &str) -> Result<()> {
    let mut cmd = Cli::command();
    cmd.build();
    if let Some(group) = cmd.find_subcommand_mut(name) {
        group.print_help()?;
    }
    Ok(())
}

/// Dispatch the parsed command line. Returns `false` when only help was shown.
fn dispatch(cli: &Cli, config: &Config) -> Result<bool> {
    let Some(command) = &cli.command else {
        Cli::command().print_help()?;
        return Ok(false);
    };

    let stdout = io::stdout();
    match command {
        Commands::Logs { operation: None } => {
            print_group_help("logs")?;
            return Ok(false);
        },
        Commands::Logs {
            operation: Some(operation),
        } => {
            let api = CloudWatchLogs::new(load_context(cli, config)?);
            commands::logs::run(&api, operation, &mut stdout.lock(), cli.json)?;
        },

        Commands::S3 { operation: None } => {
            print_group_help("s3")?;
            return Ok(false);
        },
        Commands::S3 {
            operation: Some(operation),
        } => {
            commands::s3::confirm_destructive(operation, cli.non_interactive)?;
            let ctx = load_context(cli, config)?;
            let mut settings = s3_settings(cli, config, ctx.region());
            settings.progress = use_fancy_output() && !cli.quiet && !cli.json;
            let store = S3Store::new(ctx);
            commands::s3::run(&store, operation, &settings, &mut stdout.lock(), cli.json)?;
        },

        Commands::Sns { operation: None } => {
            print_group_help("sns")?;
            return Ok(false);
        },
        Commands::Sns {
            operation: Some(operation),
        } => {
            let api = SnsNotifications::new(load_context(cli, config)?);
            commands::sns::run(&api, operation, &mut stdout.lock(), cli.json)?;
        },

        Commands::Completions { shell, install } => {
            if *install {
                commands::completions::install_completions(*shell)?;
            } else {
                let shell = shell.ok_or_else(|| {
                    CliError::Usage(
                        "specify a shell type, e.g.: awsmgr completions bash \
                         (or use awsmgr completions --install)"
                            .to_string(),
                    )
                })?;
                commands::completions::write_completions(shell, &mut stdout.lock());
            }
            return Ok(false);
        },
    }

    Ok(true)
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };

    if dispatch(cli, &config)? && !cli.quiet {
        eprintln!("Done");
    }
    Ok(())
}

fn main() {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    STDERR_IS_TTY.store(stderr_is_tty, Ordering::Relaxed);

    if env::var("NO_COLOR").is_ok() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(&cli);
    install_interrupt_handler();

    debug!(
        "awsmgr v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code_for(&err));
    }
}
