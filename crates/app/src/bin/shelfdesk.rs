// Shelfdesk - terminal console

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::Notify;
use tracing::{error, info, warn};

use shelfdesk_app::Console;
use shelfdesk_auth::SessionPhase;
use shelfdesk_common::{ConsoleConfig, ConsoleUi, Notice, NoticeLevel, Prompt, Route};
use shelfdesk_users::LoadOutcome;

/// Prints notices and reads yes/no answers from stdin
#[derive(Default)]
struct TerminalUi {
    dismissed: Notify,
}

#[async_trait::async_trait]
impl ConsoleUi for TerminalUi {
    fn notify(&self, notice: Notice) {
        let tag = match notice.level {
            NoticeLevel::Success => "ok",
            NoticeLevel::Info => "info",
            NoticeLevel::Warning => "warn",
            NoticeLevel::Error => "error",
        };
        if notice.text.is_empty() {
            println!("[{tag}] {}", notice.title);
        } else {
            println!("[{tag}] {}: {}", notice.title, notice.text);
        }
    }

    async fn confirm(&self, prompt: Prompt) -> bool {
        println!(
            "{}: {} [{} = y / {} = n]",
            prompt.title, prompt.text, prompt.confirm_label, prompt.cancel_label
        );
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        tokio::select! {
            line = lines.next_line() => matches!(
                line.ok().flatten().as_deref().map(str::trim),
                Some("y" | "Y" | "yes")
            ),
            () = self.dismissed.notified() => false,
        }
    }

    fn dismiss_prompts(&self) {
        self.dismissed.notify_waiters();
    }

    fn navigate(&self, route: Route) {
        info!(route = %route, "Navigation requested");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConsoleConfig::from_env().map_err(|e| {
        eprintln!("Failed to load configuration: {e}");
        e
    })?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.rust_log)),
        )
        .init();

    info!("Starting Shelfdesk console");

    let ui: Arc<dyn ConsoleUi> = Arc::new(TerminalUi::default());
    let console = Console::from_config(&config, ui).map_err(|e| {
        error!("Failed to assemble console: {}", e);
        e
    })?;

    tokio::select! {
        result = run(&console) => {
            if let Err(e) = result {
                error!("Console stopped: {:#}", e);
            }
        },
        () = shutdown_signal() => {},
    }

    console.teardown();
    info!("Console shutdown complete");
    Ok(())
}

async fn run(console: &Console) -> anyhow::Result<()> {
    if console.session.initialize().await != SessionPhase::Authenticated {
        let (Ok(email), Ok(password)) = (
            std::env::var("SHELFDESK_EMAIL"),
            std::env::var("SHELFDESK_PASSWORD"),
        ) else {
            anyhow::bail!("No stored session; set SHELFDESK_EMAIL and SHELFDESK_PASSWORD to log in");
        };
        console.session.login(&email, &password).await?;
    }

    let state = console.session.snapshot();
    if let Some(identity) = &state.identity {
        info!(
            email = %identity.email,
            admin = state.roles.is_admin,
            "Session active"
        );
    }

    print_outcome(console, console.users.start().await);
    loop {
        let outcome = console.users.load_more().await;
        match outcome {
            LoadOutcome::Loaded(_) => print_outcome(console, outcome),
            LoadOutcome::Exhausted => break,
            LoadOutcome::Skipped if !console.users.feed().has_more() => break,
            LoadOutcome::Skipped => tokio::task::yield_now().await,
            LoadOutcome::Stale => anyhow::bail!("Session ended while listing users"),
            LoadOutcome::Failed(e) => return Err(e.into()),
        }
    }

    let feed = console.users.feed();
    info!(
        loaded = feed.len(),
        total = ?feed.total_count(),
        "All users listed"
    );

    // Keep the session countdown running until interrupted
    let mut phase = console.session.subscribe();
    if phase
        .wait_for(|p| *p != SessionPhase::Authenticated)
        .await
        .is_ok()
    {
        warn!("Session ended");
    }
    Ok(())
}

fn print_outcome(console: &Console, outcome: LoadOutcome) {
    let LoadOutcome::Loaded(count) = outcome else {
        return;
    };
    let records = console.users.feed().records();
    for page_record in &records[records.len().saturating_sub(count)..] {
        let user = &page_record.record;
        match user.age {
            Some(age) => println!("{:>6}  {:<24} {age}", user.id, user.name),
            None => println!("{:>6}  {}", user.id, user.name),
        }
    }
    if let Some(label) = console.users.feed().badge().snapshot().label() {
        println!("  ({label})");
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install signal handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
