//! themis - terminal client for a streaming multi-agent research backend

mod commands;
mod config;
mod ui;
mod utils;

use clap::Parser;
use std::sync::Arc;
use themis_engine::{HttpTransport, RejectReason, Session, SessionConfig, SubmitOutcome};
use tracing_subscriber::EnvFilter;

/// themis - ask a research backend and watch its sub-agents work
#[derive(Parser, Debug)]
#[command(name = "themis")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend base URL for this run (overrides the saved setting)
    #[arg(short, long, value_name = "URL")]
    backend_url: Option<String>,

    /// Save a backend URL override and exit. An empty value clears it.
    #[arg(long, value_name = "URL")]
    set_backend_url: Option<String>,

    /// Run in non-interactive mode with a single query
    #[arg(short = 'c', long)]
    command: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Plain chat: ignore sub-agent activity
    #[arg(long)]
    no_subagents: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    init_tracing(args.verbose);

    // Initialize config and exit
    if args.init_config {
        match config::Config::init() {
            Ok(path) => {
                println!("Config file created at: {}", path.display());
                println!("\nExample config:\n{}", config::example_config());
            }
            Err(e) => {
                eprintln!("Error creating config: {}", e);
                std::process::exit(1);
            }
        }
        return Ok(());
    }

    let mut cfg = config::Config::load();

    // Persist backend override and exit
    if let Some(url) = args.set_backend_url {
        if config::normalize_backend_url(&url).is_some() {
            themis_wire::validate_base_url(&url)?;
        }
        cfg.set_backend_url(&url);
        let path = cfg.save()?;
        match &cfg.backend_url {
            Some(url) => println!("Backend URL set to {} ({})", url, path.display()),
            None => println!("Backend URL override cleared ({})", path.display()),
        }
        return Ok(());
    }

    if let Some(url) = args.backend_url.as_deref().filter(|u| !u.trim().is_empty()) {
        themis_wire::validate_base_url(url)?;
    }
    let backend_url = cfg.resolve_backend_url(args.backend_url.as_deref());
    let mut reducer = cfg.reducer_config();
    if args.no_subagents {
        reducer.subagents = false;
    }
    tracing::debug!("Using backend {} (sub-agents: {})", backend_url, reducer.subagents);

    let transport = Arc::new(HttpTransport::new(&backend_url));
    let session = Session::new(
        SessionConfig {
            reducer,
            ..Default::default()
        },
        transport.clone(),
    );
    session.add_consumer(Arc::new(ui::TranscriptPrinter::new(ui::Renderer::new(
        cfg.tool_timeout_secs,
    ))));

    spawn_interrupt_handler(session.clone());

    // Non-interactive mode
    if let Some(command) = args.command {
        return run_command(&session, &command).await;
    }

    run_interactive(&session, &transport, cfg, backend_url).await
}

/// Logs go to stderr so they never interleave with the transcript
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        Some(EnvFilter::new("themis=debug,themis_engine=debug,themis_wire=debug"))
    } else {
        EnvFilter::try_from_default_env().ok()
    };
    if let Some(filter) = filter {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    }
}

/// Ctrl-C aborts a running request, or exits when idle
fn spawn_interrupt_handler(session: Session) {
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if session.is_in_flight() {
                session.handle().abort();
            } else {
                eprintln!();
                std::process::exit(130);
            }
        }
    });
}

async fn run_command(session: &Session, command: &str) -> anyhow::Result<()> {
    println!("themis> {}", command);
    println!();

    match session.submit(command).await {
        SubmitOutcome::Completed => Ok(()),
        SubmitOutcome::Failed(e) => Err(e.into()),
        SubmitOutcome::Rejected(RejectReason::Empty) => anyhow::bail!("Nothing to send"),
        SubmitOutcome::Rejected(RejectReason::InFlight) => {
            anyhow::bail!("A request is already running")
        }
    }
}

async fn run_interactive(
    session: &Session,
    transport: &HttpTransport,
    mut cfg: config::Config,
    mut backend_url: String,
) -> anyhow::Result<()> {
    use std::io::{self, Write};

    // Show minimal startup info (only if TTY)
    if io::IsTerminal::is_terminal(&io::stderr()) {
        eprintln!("themis ({})", backend_url);
        eprintln!("Type /help for commands.");
        eprintln!();
    }

    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut input = String::new();
        if io::stdin().read_line(&mut input)? == 0 {
            // EOF
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        // Handle slash commands
        if let Some(result) = commands::execute_command(input, &backend_url, &session.snapshot()) {
            match result {
                commands::CommandResult::Exit => break,
                commands::CommandResult::Message(msg) => println!("{}", msg),
                commands::CommandResult::Unknown(cmd) => {
                    println!("Unknown command: /{}", cmd);
                    println!("Type /help for available commands.");
                }
                commands::CommandResult::SetBackend(url) => {
                    cfg.backend_url = url;
                    backend_url = cfg.resolve_backend_url(None);
                    transport.set_base_url(&backend_url);
                    match cfg.save() {
                        Ok(_) => println!("Backend set to {}", backend_url),
                        Err(e) => {
                            println!("Backend set to {} for this session", backend_url);
                            eprintln!("Warning: Failed to save config: {}", e);
                        }
                    }
                }
            }
            continue;
        }

        println!();
        match session.submit(input).await {
            SubmitOutcome::Completed => {}
            SubmitOutcome::Failed(e) => {
                // The error turn is already on screen
                tracing::debug!("Request failed: {}", e);
            }
            SubmitOutcome::Rejected(RejectReason::InFlight) => {
                println!("A request is already running.");
            }
            SubmitOutcome::Rejected(RejectReason::Empty) => {}
        }
        println!();
    }

    Ok(())
}
