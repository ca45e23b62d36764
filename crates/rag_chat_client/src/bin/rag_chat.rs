//! rag-chat: terminal front end for the RAG answering service.
//! Polls the service's health, asks one-shot questions, or runs an
//! interactive home/chat session on stdin/stdout.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use rag_chat_client::render::{render_badge, render_turn};
use rag_chat_client::{config, App, ChatState, Config, Endpoint, HealthStatus};

#[derive(Debug, Parser)]
#[command(
    name = "rag-chat",
    version,
    about = "Ask questions of a RAG answering service and watch its health"
)]
struct Cli {
    /// Config file (default: ~/.rag-chat/config.yaml)
    #[arg(long, global = true, env = "RAG_CHAT_CONFIG")]
    config: Option<PathBuf>,

    /// Base URL of the answering service (overrides RAG_BASE_URL and the config file)
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Probe /healthz once, or keep polling with --watch
    Health {
        #[arg(long)]
        watch: bool,
    },
    /// Ask one question (from arguments, or the first line of stdin)
    Ask { question: Vec<String> },
    /// Interactive session (the default)
    Chat,
}

fn setup_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn load_config(path: Option<PathBuf>) -> Result<Config> {
    let path = match path {
        Some(p) => p,
        None => match config::default_config_path() {
            Some(p) => p,
            None => return Ok(Config::default()),
        },
    };
    config::load_or_default(&path)
        .with_context(|| format!("failed to load config from {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose);

    let cfg = load_config(cli.config)?;
    let endpoint = Endpoint::from_env(cli.base_url.as_deref(), &cfg);
    let mut app = App::new(endpoint, &cfg).context("failed to build HTTP client")?;

    match cli.command {
        Some(Command::Health { watch }) => cmd_health(&mut app, watch).await,
        Some(Command::Ask { question }) => cmd_ask(&mut app, question).await,
        Some(Command::Chat) | None => cmd_chat(&mut app).await,
    }
}

async fn cmd_health(app: &mut App, watch: bool) -> Result<()> {
    app.mount();
    let mut rx = app.monitor().subscribe();

    if !watch {
        let report = *rx
            .wait_for(|r| r.status != HealthStatus::Unknown)
            .await
            .context("health monitor stopped")?;
        println!("{} {}", app.endpoint(), render_badge(&report));
        app.unmount();
        if report.status != HealthStatus::Healthy {
            std::process::exit(1);
        }
        return Ok(());
    }

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let report = *rx.borrow_and_update();
                println!("{} {}", app.endpoint(), render_badge(&report));
            }
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    app.unmount();
    Ok(())
}

async fn cmd_ask(app: &mut App, question: Vec<String>) -> Result<()> {
    let question = if question.is_empty() {
        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .context("failed to read question from stdin")?;
        line
    } else {
        question.join(" ")
    };

    let chat = app.enter_chat();
    let Some(pending) = chat.submit(&question) else {
        bail!("no question provided");
    };
    pending.await.context("exchange task failed")?;

    let transcript = chat.transcript();
    let Some(reply) = transcript.last() else {
        bail!("no reply recorded");
    };
    println!("{}", render_turn(reply));
    if reply.is_error() {
        std::process::exit(1);
    }
    Ok(())
}

const HELP: &str = "commands: /chat  /health  /back  /quit";

async fn next_change(rx: &mut Option<watch::Receiver<ChatState>>) -> Option<ChatState> {
    match rx {
        Some(rx) => {
            rx.changed().await.ok()?;
            Some(rx.borrow_and_update().clone())
        }
        None => std::future::pending().await,
    }
}

async fn cmd_chat(app: &mut App) -> Result<()> {
    app.mount();
    println!("Backend: {}", app.endpoint());
    println!("{}", HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut chat_rx: Option<watch::Receiver<ChatState>> = None;
    let mut shown = 0usize;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("failed to read stdin")? else {
                    break;
                };
                match line.trim() {
                    "/quit" => break,
                    "/health" => println!("{}", render_badge(&app.health())),
                    "/back" => {
                        app.leave_chat();
                        chat_rx = None;
                        shown = 0;
                        println!("(home) {}", render_badge(&app.health()));
                    }
                    "/chat" => {
                        if chat_rx.is_none() {
                            let chat = app.enter_chat();
                            chat_rx = Some(chat.subscribe());
                            shown = 0;
                            println!("(chat) ask a question");
                        }
                    }
                    _ => match app.chat() {
                        None => println!("{}", HELP),
                        Some(chat) => {
                            if chat.submit(&line).is_some() {
                                println!("… thinking");
                            } else if chat.is_awaiting() {
                                println!("(still waiting for the previous answer)");
                            }
                        }
                    },
                }
            }
            Some(state) = next_change(&mut chat_rx) => {
                for turn in state.transcript.iter().skip(shown) {
                    if !turn.is_user() {
                        println!("{}", render_turn(turn));
                    }
                }
                shown = state.transcript.len();
            }
        }
    }

    // Let an answer already on the way finish printing.
    if let Some(chat) = app.chat() {
        let mut rx = chat.subscribe();
        let _ = rx.wait_for(|s| !s.awaiting).await;
        for turn in chat.transcript().iter().skip(shown) {
            if !turn.is_user() {
                println!("{}", render_turn(turn));
            }
        }
    }
    app.unmount();
    Ok(())
}
