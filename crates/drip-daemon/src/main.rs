use std::sync::Arc;

use tracing::{error, info, warn};

mod terminal;

use drip_core::clock::SystemClock;
use drip_core::config::DripConfig;
use drip_scheduler::Scheduler;
use drip_session::{SessionError, SessionOrchestrator, TriggerReason};
use drip_store::{ItemStore, NewItem};
use terminal::Terminal;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "drip=info,drip_store=info,drip_session=info".into()),
        )
        .init();

    // load config: DRIP_CONFIG env > ~/.drip/drip.toml > defaults
    let config_path = std::env::var("DRIP_CONFIG").ok();
    let config = DripConfig::load(config_path.as_deref()).unwrap_or_else(|e| {
        warn!("config load failed ({e}), using defaults");
        DripConfig::default()
    });

    let db_path = &config.database.path;
    ensure_parent_dir(db_path);
    info!(path = %db_path, "opening item database");

    let conn = rusqlite::Connection::open(db_path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;

    let store = Arc::new(ItemStore::new(conn, Arc::new(SystemClock))?);

    let args: Vec<String> = std::env::args().skip(1).collect();
    match args.first().map(String::as_str) {
        Some("add") => add_item(&store, &args[1..]),
        Some("review") => run_once(store, config).await,
        None | Some("run") => run_daemon(store, config).await,
        Some(other) => {
            eprintln!("unknown command: {other}");
            eprintln!("usage: drip [run | review | add <prompt> <answer> [example] [tag]]");
            std::process::exit(2);
        }
    }
}

/// `drip add <prompt> <answer> [example] [tag]`
fn add_item(store: &ItemStore, args: &[String]) -> anyhow::Result<()> {
    let (prompt, answer) = match args {
        [p, a, ..] => (p.clone(), a.clone()),
        _ => {
            eprintln!("usage: drip add <prompt> <answer> [example] [tag]");
            std::process::exit(2);
        }
    };
    let id = store.create_item(&NewItem {
        prompt,
        answer,
        example: args.get(2).cloned(),
        tag: args.get(3).cloned(),
    })?;
    println!("added item {id}");
    Ok(())
}

fn build_orchestrator(
    store: Arc<ItemStore>,
    config: &DripConfig,
    abort: tokio::sync::watch::Receiver<bool>,
) -> SessionOrchestrator {
    let scheduler = Arc::new(Scheduler::new(store.clone(), config.wake.clone()));
    let terminal = Arc::new(Terminal::new());
    SessionOrchestrator::new(
        store,
        scheduler,
        terminal.clone(),
        terminal,
        config.review.clone(),
        abort,
    )
}

/// `drip review`: one manually triggered session, then exit.
async fn run_once(store: Arc<ItemStore>, config: DripConfig) -> anyhow::Result<()> {
    let (_abort_tx, abort_rx) = tokio::sync::watch::channel(false);
    let orchestrator = build_orchestrator(store, &config, abort_rx);
    let outcome = orchestrator.run_session(TriggerReason::Manual).await?;
    if outcome.stats.total == 0 {
        println!("nothing due");
    } else {
        println!(
            "session done: {}/{} correct",
            outcome.stats.correct, outcome.stats.total
        );
    }
    Ok(())
}

/// The trigger loop: an immediate startup sweep, then sleep for whatever
/// delay the last session reported. Ctrl-C aborts the in-flight session
/// (it finishes sweeping its batch) and then stops the loop.
async fn run_daemon(store: Arc<ItemStore>, config: DripConfig) -> anyhow::Result<()> {
    let (abort_tx, abort_rx) = tokio::sync::watch::channel(false);
    let orchestrator = build_orchestrator(store, &config, abort_rx.clone());

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("shutdown requested");
            let _ = abort_tx.send(true);
        }
    });

    info!("drip daemon started");
    let mut abort = abort_rx;
    loop {
        let delay = match orchestrator.run_session(TriggerReason::Periodic).await {
            Ok(outcome) => {
                if outcome.applied_count > 0 {
                    info!(
                        applied = outcome.applied_count,
                        correct = outcome.stats.correct,
                        "session applied"
                    );
                }
                outcome.next_wake_delay
            }
            Err(SessionError::SessionFailed {
                applied,
                source,
                fallback_delay,
            }) => {
                error!(applied, error = %source, "session failed, retrying later");
                fallback_delay
            }
            // the loop is the only periodic trigger, so this cannot race itself
            Err(SessionError::SessionActive) => {
                warn!("session already active, backing off");
                orchestrator_retry(&config)
            }
        };

        if *abort.borrow() {
            break;
        }
        info!(delay_secs = delay.as_secs(), "sleeping until next due check");
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = abort.changed() => {
                if *abort.borrow() {
                    break;
                }
            }
        }
    }

    info!("drip daemon stopped");
    Ok(())
}

fn orchestrator_retry(config: &DripConfig) -> std::time::Duration {
    std::time::Duration::from_secs(config.wake.retry_secs.max(config.wake.floor_secs))
}

/// Ensure the parent directory for a file path exists.
fn ensure_parent_dir(path: &str) {
    if let Some(parent) = std::path::Path::new(path).parent() {
        let _ = std::fs::create_dir_all(parent);
    }
}
