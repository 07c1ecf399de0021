mod backend;
mod config;
mod controller;
mod display;
mod error;
mod indexer;
mod payment;
mod prompt;
mod session_store;
#[cfg(test)]
mod testing;
mod wallet;

use std::future::Future;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use folioflow_core::RenderOptions;

use crate::backend::BackendClient;
use crate::config::{key_preview, AppConfig};
use crate::controller::{AnalysisOutcome, FlowController, PremiumOutcome};
use crate::error::{AppError, AppResult};
use crate::indexer::blockfrost::BlockfrostClient;
use crate::indexer::cache::HistoryCache;
use crate::indexer::HistoryFetcher;
use crate::payment::service::PaymentServiceClient;
use crate::payment::{PaymentGate, UnsupportedPaymentExecutor};
use crate::prompt::Console;
use crate::session_store::SessionStore;
use crate::wallet::{AddressPolicy, ProviderRegistry, SessionManager};

const DEFAULT_EXPORT_PATH: &str = "folioflow-analysis.json";

const HELP: &str = "\
Commands:
  wallets              list available wallet providers
  connect <key>        connect a wallet (e.g. connect lace)
  disconnect           forget the connected wallet
  analyze              fetch history and run the free analysis
  retry                run the free analysis again
  premium              paid analysis by the premium agent
  expand               toggle full text for long fields
  show                 print the current analysis again
  export [path]        write the current analysis as JSON
  agent                show premium agent capabilities
  help                 show this help
  quit                 exit (Ctrl-C at the prompt also exits)";

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Wallets,
    Connect(String),
    Disconnect,
    Analyze,
    Premium,
    Expand,
    Show,
    Export(PathBuf),
    Agent,
    Help,
    Quit,
}

/// Parse one input line; blank lines yield `None`.
fn parse_command(line: &str) -> AppResult<Option<Command>> {
    let mut parts = line.split_whitespace();
    let Some(name) = parts.next() else {
        return Ok(None);
    };
    let arg = parts.next();

    let command = match name.to_ascii_lowercase().as_str() {
        "wallets" | "list" => Command::Wallets,
        "connect" => match arg {
            Some(key) => Command::Connect(key.to_ascii_lowercase()),
            None => {
                return Err(AppError::InvalidArgument(
                    "connect needs a wallet key, see 'wallets'".to_string(),
                ))
            }
        },
        "disconnect" => Command::Disconnect,
        "analyze" | "retry" => Command::Analyze,
        "premium" => Command::Premium,
        "expand" | "collapse" => Command::Expand,
        "show" => Command::Show,
        "export" => Command::Export(PathBuf::from(arg.unwrap_or(DEFAULT_EXPORT_PATH))),
        "agent" => Command::Agent,
        "help" | "?" => Command::Help,
        "quit" | "exit" => Command::Quit,
        other => return Err(AppError::UnknownCommand(other.to_string())),
    };
    Ok(Some(command))
}

/// Run a step with a token that Ctrl-C cancels.
async fn cancellable<F, Fut, T>(step: F) -> T
where
    F: FnOnce(CancellationToken) -> Fut,
    Fut: Future<Output = T>,
{
    let cancel = CancellationToken::new();
    let token = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Interrupt received, cancelling current step");
            token.cancel();
        }
    });

    let result = step(cancel).await;
    watcher.abort();
    result
}

/// Next input line, or `None` when the interrupt fires first.
async fn read_or_interrupt<L, I>(line: L, interrupt: I) -> Option<String>
where
    L: Future<Output = Option<String>>,
    I: Future<Output = ()>,
{
    tokio::select! {
        biased;
        _ = interrupt => {
            tracing::info!("Interrupt received at prompt, exiting");
            None
        }
        line = line => line,
    }
}

/// Resolves on Ctrl-C; never resolves if the handler cannot be installed.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Could not listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

struct Repl {
    controller: FlowController,
    console: Console,
    expanded: bool,
}

impl Repl {
    /// Returns `false` when the user asked to quit.
    async fn run(&mut self, command: Command) -> AppResult<bool> {
        match command {
            Command::Wallets => {
                let list = self.controller.list_providers();
                println!("{}", display::providers(&list));
            }
            Command::Connect(key) => {
                let session = self.controller.connect(&key).await?;
                self.expanded = false;
                println!("{}", display::session(&session));
            }
            Command::Disconnect => match self.controller.disconnect().await {
                Some(previous) => println!("Disconnected from {}", previous.display_name),
                None => println!("No wallet connected"),
            },
            Command::Analyze => {
                println!("Fetching transaction history...");
                let controller = &mut self.controller;
                let outcome = cancellable(|cancel| async move {
                    controller.analyze_basic(&cancel).await
                })
                .await?;
                self.show_outcome(outcome);
            }
            Command::Premium => {
                let controller = &mut self.controller;
                let console = &mut self.console;
                let outcome = cancellable(|cancel| async move {
                    controller.analyze_premium(console, &cancel).await
                })
                .await?;
                match outcome {
                    PremiumOutcome::Premium(view) => println!("{}", display::premium(&view)),
                    PremiumOutcome::Basic(outcome) => self.show_outcome(outcome),
                }
            }
            Command::Expand => {
                self.expanded = !self.expanded;
                self.show_current();
            }
            Command::Show => self.show_current(),
            Command::Export(path) => {
                let written = self.controller.export(&path).await?;
                println!("Analysis written to {}", written.display());
            }
            Command::Agent => {
                let capabilities = self.controller.agent_capabilities().await?;
                println!(
                    "{}",
                    serde_json::to_string_pretty(&capabilities).unwrap_or_default()
                );
            }
            Command::Help => println!("{}", HELP),
            Command::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn show_outcome(&mut self, outcome: AnalysisOutcome) {
        match outcome {
            AnalysisOutcome::NoTransactions => {
                println!("No transactions found for this wallet address.")
            }
            AnalysisOutcome::Report(view) => {
                self.expanded = false;
                println!("{}", display::report(&view, self.expanded));
            }
        }
    }

    fn show_current(&self) {
        match self.controller.current_view() {
            Some(view) => println!("{}", display::view(view, self.expanded)),
            None => println!("No analysis yet. Connect a wallet and run 'analyze'."),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging to stderr (stdout carries the UI)
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folioflow=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting FolioFlow v{}", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load().map_err(|e| anyhow::anyhow!("Failed to load config: {}", e))?;

    if config.indexer.project_id.is_empty() {
        tracing::warn!("Indexer project id is empty, set FOLIOFLOW__INDEXER__PROJECT_ID");
    }
    tracing::info!(
        indexer = %config.indexer.base_url,
        project_id = %key_preview(&config.indexer.project_id),
        backend = %config.backend.base_url,
        wallets = %config.wallets.len(),
        "Configuration loaded"
    );

    let indexer = BlockfrostClient::new(&config.indexer)?;
    let fetcher = HistoryFetcher::new(Arc::new(indexer), &config.indexer)
        .with_cache(HistoryCache::from_config(&config.cache));
    let backend = BackendClient::new(&config.backend)?;
    let payments = PaymentServiceClient::new(&config.payment)?;
    let gate = PaymentGate::new(
        Arc::new(payments),
        Arc::new(UnsupportedPaymentExecutor),
        &config.payment,
    );
    let registry = ProviderRegistry::from_config(&config);
    if registry.is_empty() {
        tracing::warn!("No wallet adapters configured, declare them under [[wallets]]");
    }
    let wallets = SessionManager::new(registry, AddressPolicy::from_config(&config));

    let controller = FlowController::new(wallets, fetcher, Arc::new(backend), gate)
        .with_store(SessionStore::new(&config.session.state_path))
        .with_render_options(RenderOptions {
            truncate_chars: config.render.truncate_chars,
        });
    controller.log_previous_session().await;

    println!("================================================");
    println!("        FOLIOFLOW - Wallet History Analysis      ");
    println!("================================================");
    println!("{}", HELP);

    let mut repl = Repl {
        controller,
        console: Console::new(),
        expanded: false,
    };

    loop {
        match repl.controller.session() {
            Some(session) => print!("\nfolioflow[{}]> ", session.provider_key),
            None => print!("\nfolioflow> "),
        }
        let _ = std::io::stdout().flush();

        let Some(line) = read_or_interrupt(repl.console.read_line(), interrupted()).await else {
            break;
        };

        let command = match parse_command(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(e) => {
                println!("{}", e.report());
                continue;
            }
        };

        match repl.run(command).await {
            Ok(true) => {}
            Ok(false) => break,
            Err(e) => println!("Error: {}", e.report()),
        }
    }

    tracing::info!("FolioFlow shutting down");
    Ok(())
}
