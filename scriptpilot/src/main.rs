//! Conversational agent that runs model-proposed scripts.
//!
//! `scriptpilot chat` starts a line-based session; `scriptpilot ask` runs a
//! single turn and reports its outcome through the exit code.

use std::io::{self, Read};
use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::debug;

use scriptpilot::cancel::CancelToken;
use scriptpilot::controller::{AgentController, ControllerSettings};
use scriptpilot::core::extract::extract_script;
use scriptpilot::exit_codes;
use scriptpilot::io::config::{AgentConfig, DEFAULT_CONFIG_FILE, load_config, write_config};
use scriptpilot::io::console::Console;
use scriptpilot::io::provider::{ModelProvider, provider_from_config};
use scriptpilot::io::sandbox::{LIMITATIONS, ProcessSandbox};
use scriptpilot::io::search::{CommandSearch, SearchProvider};
use scriptpilot::logging;
use scriptpilot::session::{run_chat, run_single};

#[derive(Parser)]
#[command(
    name = "scriptpilot",
    version,
    about = "Chat with a model that can run scripts on your behalf"
)]
struct Cli {
    /// Config file (defaults apply when it does not exist).
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Ask before running each script.
    #[arg(long, global = true, conflicts_with = "no_confirm")]
    confirm: bool,

    /// Run scripts without asking.
    #[arg(long, global = true)]
    no_confirm: bool,

    /// Override the configured retry budget.
    #[arg(long, global = true)]
    max_retries: Option<u32>,

    /// Override the configured interpreter command.
    #[arg(long, global = true)]
    interpreter: Option<String>,

    /// Only log errors to stderr (ignores `RUST_LOG`).
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start an interactive session (Ctrl-C cancels the running turn; twice exits).
    Chat,
    /// Run a single request and exit with a code describing the outcome.
    Ask {
        /// Request text.
        prompt: String,
    },
    /// Read model output on stdin and print the first fenced script body.
    Extract,
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Describe what the script sandbox does not protect against.
    Limits,
}

fn main() {
    let cli = Cli::parse();
    logging::init(cli.quiet);
    match run(cli) {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run(cli: Cli) -> Result<i32> {
    match cli.command {
        Command::Chat => cmd_chat(&load_effective_config(&cli)?),
        Command::Ask { ref prompt } => cmd_ask(&load_effective_config(&cli)?, prompt),
        Command::Extract => cmd_extract(),
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Limits => {
            println!("{LIMITATIONS}");
            Ok(exit_codes::OK)
        }
    }
}

/// Load the config file and apply command-line overrides.
fn load_effective_config(cli: &Cli) -> Result<AgentConfig> {
    let mut cfg = load_config(&cli.config)?;
    if cli.confirm {
        cfg.confirm_script = true;
    }
    if cli.no_confirm {
        cfg.confirm_script = false;
    }
    if let Some(max_retries) = cli.max_retries {
        cfg.max_retries = max_retries;
    }
    if let Some(interpreter) = &cli.interpreter {
        cfg.interpreter.command = interpreter.clone();
    }
    cfg.validate()?;
    debug!(?cfg, "effective config");
    Ok(cfg)
}

type Controller = AgentController<Box<dyn ModelProvider>, ProcessSandbox>;

fn build(cfg: &AgentConfig) -> Result<(Controller, Option<CommandSearch>)> {
    let cancel = CancelToken::new();
    cancel.install_signal_handlers()?;
    let provider = provider_from_config(&cfg.provider)?;
    let sandbox = ProcessSandbox::new(cfg.interpreter.clone(), cfg.sandbox.clone());
    let search = if cfg.search.enabled {
        Some(CommandSearch::from_config(&cfg.search)?)
    } else {
        None
    };
    let controller =
        AgentController::new(provider, sandbox, &ControllerSettings::from(cfg), cancel)?;
    Ok((controller, search))
}

fn cmd_chat(cfg: &AgentConfig) -> Result<i32> {
    let (mut controller, search) = build(cfg)?;
    let mut console = Console::new(io::stdin().lock(), io::stdout());
    let mut display = io::stdout();
    run_chat(
        &mut controller,
        search.as_ref().map(|s| s as &dyn SearchProvider),
        &mut console,
        &mut display,
    )?;
    Ok(exit_codes::OK)
}

fn cmd_ask(cfg: &AgentConfig, prompt: &str) -> Result<i32> {
    let (mut controller, search) = build(cfg)?;
    let mut console = Console::new(io::stdin().lock(), io::stderr());
    let mut display = io::stdout();
    let outcome = run_single(
        &mut controller,
        prompt,
        search.as_ref().map(|s| s as &dyn SearchProvider),
        &mut console,
        &mut display,
    )?;
    Ok(exit_codes::for_outcome(&outcome))
}

fn cmd_extract() -> Result<i32> {
    let mut text = String::new();
    io::stdin()
        .read_to_string(&mut text)
        .context("read model output from stdin")?;
    match extract_script(&text) {
        Some(script) => {
            println!("{}", script.body);
            Ok(exit_codes::OK)
        }
        None => Ok(exit_codes::NO_SCRIPT),
    }
}

fn cmd_init(path: &PathBuf, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &AgentConfig::default())
        .with_context(|| format!("write {}", path.display()))?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}
