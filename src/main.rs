//! `q`: chat with OpenAI, Anthropic and Google models from the terminal.
//!
//! Usage:
//!   q "prompt"                 one-shot prompt against the default model
//!   q -m openai/gpt-4o -       read the prompt from stdin
//!   q chat                     interactive session with history
//!   q models list              every provider/model pair
//!   q keys set -p openai -k KEY
//!   q default set -m anthropic/claude-sonnet-4-20250514

use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use q::config::{ConfigStore, CredentialStore};
use q::http::reqwest::default_dyn_transport;
use q::{DynProvider, LLMError, Registry, default_registry};

#[derive(Parser)]
#[command(
    name = "q",
    about = "A fast CLI for chatting with your favorite language models.",
    args_conflicts_with_subcommands = true
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Prompt text, or `-` to read it from stdin
    prompt: Option<String>,

    #[command(flatten)]
    common: CommonArgs,
}

#[derive(Args, Clone, Debug, Default)]
struct CommonArgs {
    /// Model as provider/model (defaults to the configured default)
    #[arg(short, long)]
    model: Option<String>,

    /// Disable streaming output
    #[arg(long)]
    no_stream: bool,

    /// Return raw model output
    #[arg(short, long)]
    raw: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive REPL with a model
    Chat {
        #[command(flatten)]
        common: CommonArgs,
    },

    /// Manage models
    Models {
        #[command(subcommand)]
        action: ModelsCommands,
    },

    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeysCommands,
    },

    /// Manage default model
    Default {
        #[command(subcommand)]
        action: DefaultCommands,
    },

    /// Show version information
    Version,
}

#[derive(Subcommand)]
enum ModelsCommands {
    /// List available provider/model combinations
    List,
}

#[derive(Subcommand)]
enum KeysCommands {
    /// List which providers have keys set
    List,
    /// Set API key for a provider
    Set {
        /// Provider name
        #[arg(short, long)]
        provider: String,
        /// API key
        #[arg(short, long)]
        key: String,
    },
    /// Show path to API key config file
    Path,
}

#[derive(Subcommand)]
enum DefaultCommands {
    /// Show default model
    List,
    /// Set default model
    Set {
        /// Model as provider/model
        #[arg(short, long)]
        model: String,
    },
}

/// Shared state for every command.
struct App {
    store: Arc<ConfigStore>,
    registry: Registry,
}

impl App {
    fn new() -> Result<Self> {
        let store = Arc::new(ConfigStore::from_env()?);
        let transport = default_dyn_transport()?;
        let registry = default_registry(transport, store.clone());
        Ok(Self { store, registry })
    }

    /// Picks the model from the flag or the stored default and checks its key is set.
    fn select(&self, flag: Option<&str>) -> Result<Selection> {
        let qualified = match flag.filter(|model| !model.is_empty()) {
            Some(model) => model.to_string(),
            None => self
                .store
                .default_model()
                .context("failed to load default model")?
                .ok_or_else(|| {
                    anyhow!(
                        "no default model\n\nSet default: q default set --model provider/model\nOr specify: q --model provider/model"
                    )
                })?,
        };
        let (provider, model) = self.registry.resolve(&qualified)?;

        let name = provider.name();
        let key = self
            .store
            .api_key(name)
            .with_context(|| format!("failed to read API key for {name}"))?;
        if key.is_none_or(|key| key.is_empty()) {
            return Err(LLMError::MissingCredential { provider: name }.into());
        }
        Ok(Selection { provider, model })
    }
}

struct Selection {
    provider: DynProvider,
    model: String,
}

impl Selection {
    fn label(&self) -> String {
        format!("model ({}/{}): ", self.provider.name(), self.model)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            if err
                .downcast_ref::<LLMError>()
                .is_some_and(LLMError::is_cancelled)
            {
                // A pending stdin read would otherwise block runtime shutdown.
                std::process::exit(130);
            }
            eprintln!("Error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        None => match cli.prompt {
            Some(prompt) => cmd_prompt(&prompt, &cli.common).await,
            None => {
                <Cli as clap::CommandFactory>::command().print_help()?;
                Ok(())
            }
        },
        Some(Commands::Chat { common }) => cmd_chat(&common).await,
        Some(Commands::Models {
            action: ModelsCommands::List,
        }) => cmd_models_list(),
        Some(Commands::Keys { action }) => cmd_keys(action),
        Some(Commands::Default { action }) => cmd_default(action),
        Some(Commands::Version) => {
            cmd_version();
            Ok(())
        }
    }
}

// ── Prompting ───────────────────────────────────────────────────────

async fn cmd_prompt(prompt: &str, common: &CommonArgs) -> Result<()> {
    let prompt = if prompt == "-" {
        read_prompt_from_stdin().await?
    } else {
        prompt.to_string()
    };

    let app = App::new()?;
    let selection = app.select(common.model.as_deref())?;
    let cancel = cancel_on_signal();
    let provider = &selection.provider;

    if common.no_stream {
        let reply = provider.prompt(&cancel, &selection.model, &prompt).await?;
        print_reply(&selection, &reply, common.raw);
        return Ok(());
    }

    if !common.raw {
        print_flush(&selection.label());
    }
    let result = provider.stream(&cancel, &selection.model, &prompt).await;
    if !common.raw {
        println!();
    }
    result?;
    Ok(())
}

async fn cmd_chat(common: &CommonArgs) -> Result<()> {
    let app = App::new()?;
    let selection = app.select(common.model.as_deref())?;
    let cancel = cancel_on_signal();
    let provider = &selection.provider;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut first = true;
    loop {
        if !first && !common.raw {
            println!();
        }
        first = false;
        if !common.raw {
            print_flush("you: ");
        }

        let line = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                return Err(LLMError::Cancelled { partial: String::new() }.into());
            }
            line = lines.next_line() => line.context("error reading input")?,
        };
        let Some(line) = line else {
            return Ok(());
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }

        if common.no_stream {
            let reply = provider.chat_prompt(&cancel, &selection.model, text).await?;
            print_reply(&selection, &reply, common.raw);
        } else {
            if !common.raw {
                print_flush(&selection.label());
            }
            provider
                .chat_stream(&cancel, &selection.model, text)
                .await?;
            if !common.raw {
                println!();
            }
        }
    }
}

async fn read_prompt_from_stdin() -> Result<String> {
    let mut input = String::new();
    tokio::io::stdin()
        .read_to_string(&mut input)
        .await
        .context("error reading from stdin")?;
    let prompt = input.trim();
    if prompt.is_empty() {
        bail!("no input provided via stdin");
    }
    Ok(prompt.to_string())
}

fn print_reply(selection: &Selection, reply: &str, raw: bool) {
    if raw {
        print_flush(reply);
    } else {
        println!("{}{reply}", selection.label());
    }
}

fn print_flush(text: &str) {
    let mut out = std::io::stdout().lock();
    // A closed stdout surfaces on the next sink write.
    let _ = out.write_all(text.as_bytes()).and_then(|()| out.flush());
}

/// Token cancelled on Ctrl+C or SIGTERM.
fn cancel_on_signal() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        eprintln!("\nReceived interrupt signal, cancelling...");
        token.cancel();
    });
    cancel
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        let mut terminate = match signal(SignalKind::terminate()) {
            Ok(sig) => sig,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler; falling back to ctrl_c only");
                if let Err(ctrlc_err) = tokio::signal::ctrl_c().await {
                    tracing::error!(error = %ctrlc_err, "failed to await ctrl-c signal");
                }
                return;
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = terminate.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to await ctrl-c signal");
        }
    }
}

// ── Management commands ─────────────────────────────────────────────

fn cmd_models_list() -> Result<()> {
    let app = App::new()?;
    for model in app.registry.qualified_models() {
        println!("{model}");
    }
    Ok(())
}

fn cmd_keys(action: KeysCommands) -> Result<()> {
    let app = App::new()?;
    match action {
        KeysCommands::List => {
            let config = app.store.load().context("error loading config")?;
            for name in app.registry.names() {
                let status = if config.api_key(name).is_some() {
                    "✅"
                } else {
                    "❌"
                };
                println!("{name}: {status}");
            }
        }
        KeysCommands::Set { provider, key } => {
            if key.is_empty() {
                bail!("API key required");
            }
            if app.registry.lookup(&provider).is_none() {
                bail!("unknown provider: {provider}\n\nSee available: q models list");
            }
            app.store
                .set_api_key(&provider, &key)
                .context("error saving key")?;
            println!("Saved key for {provider}");
        }
        KeysCommands::Path => println!("{}", app.store.path().display()),
    }
    Ok(())
}

fn cmd_default(action: DefaultCommands) -> Result<()> {
    let app = App::new()?;
    match action {
        DefaultCommands::List => {
            let model = app
                .store
                .default_model()
                .context("error loading default")?
                .ok_or_else(|| anyhow!("no default model set"))?;
            println!("{model}");
        }
        DefaultCommands::Set { model } => {
            app.registry.resolve(&model)?;
            app.store
                .set_default_model(&model)
                .context("error saving default")?;
            println!("Saved default model: {model}");
        }
    }
    Ok(())
}

fn cmd_version() {
    println!("q version {}", env!("CARGO_PKG_VERSION"));
    println!("commit: {}", option_env!("Q_COMMIT").unwrap_or("unknown"));
    println!("date: {}", option_env!("Q_BUILD_DATE").unwrap_or("unknown"));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        <Cli as clap::CommandFactory>::command().debug_assert();
    }

    #[test]
    fn bare_prompt_uses_common_flags() {
        let cli = Cli::try_parse_from(["q", "-m", "openai/gpt-4o", "--no-stream", "hello"])
            .expect("parse");
        assert!(cli.command.is_none());
        assert_eq!(cli.prompt.as_deref(), Some("hello"));
        assert_eq!(cli.common.model.as_deref(), Some("openai/gpt-4o"));
        assert!(cli.common.no_stream);
        assert!(!cli.common.raw);
    }

    #[test]
    fn keys_set_requires_provider_and_key() {
        assert!(Cli::try_parse_from(["q", "keys", "set", "-p", "openai"]).is_err());
        let cli = Cli::try_parse_from(["q", "keys", "set", "-p", "openai", "-k", "sk"])
            .expect("parse");
        assert!(matches!(
            cli.command,
            Some(Commands::Keys {
                action: KeysCommands::Set { .. }
            })
        ));
    }

    #[test]
    fn chat_accepts_raw_flag() {
        let cli = Cli::try_parse_from(["q", "chat", "-r"]).expect("parse");
        match cli.command {
            Some(Commands::Chat { common }) => assert!(common.raw),
            _ => panic!("expected chat command"),
        }
    }
}
