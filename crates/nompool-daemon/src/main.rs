//! nompool-daemon: runs one nominator pool over a JSON-lines message feed.
//!
//! Messages are read from the file named by the first argument, or from
//! stdin when it is absent or `-`. One JSON outcome line per processed
//! message goes to stdout; logs go to stderr. Committed bookings and pool
//! snapshots are journaled to SQLite.

mod config;
mod elector;
mod events;
mod feed;
mod processor;

use nompool_lifecycle::{Pool, PoolData};
use tokio::io::BufReader;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use crate::config::DaemonConfig;
use crate::elector::LoopbackElector;
use crate::events::EventBus;
use crate::processor::Processor;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Load config
    let config = DaemonConfig::load()?;

    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.advanced.log_level)),
        )
        .init();

    info!("nompool daemon starting");

    // 2. Open journal
    let data_dir = config.data_dir();
    std::fs::create_dir_all(&data_dir)?;
    let journal_path = config.journal_path();
    let journal = nompool_db::open(&journal_path)?;
    info!(path = %journal_path.display(), "journal opened");

    // 3. Genesis pool
    let settings = config.pool_settings()?;
    let genesis = config.genesis_config()?;
    let elector = LoopbackElector::new(
        settings.elector_address,
        config.elector.round_reward_bp,
        config.elector.auto_reply,
    );
    let data = PoolData::new(genesis, settings)?;
    let pool = Pool::new(data, elector);

    // 4. Event bus and monitor
    let event_bus = EventBus::new(1000);
    tokio::spawn(events::monitor(event_bus.subscribe()));
    event_bus.emit(events::Event {
        event_type: "DaemonStarted".to_string(),
        seqno: 0,
        timestamp: std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_secs(),
        payload: serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
        }),
    });

    // 5. Feed reader
    let (tx, rx) = mpsc::channel(1024);
    let source = std::env::args().nth(1).filter(|arg| arg != "-");
    let reader = tokio::spawn(async move {
        match source {
            Some(path) => {
                let file = tokio::fs::File::open(&path).await?;
                feed::read_feed(BufReader::new(file), tx).await
            }
            None => feed::read_feed(BufReader::new(tokio::io::stdin()), tx).await,
        }
    });

    // 6. Process until the feed is exhausted or interrupted
    let mut processor = Processor::new(pool, journal, event_bus);
    let mut interrupted = false;
    tokio::select! {
        result = processor.run(rx, tokio::io::stdout()) => {
            match result {
                Ok(summary) => info!(
                    committed = summary.committed,
                    failed = summary.failed,
                    bookings = summary.bookings,
                    "feed processed"
                ),
                Err(e) => error!("processor error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Ctrl-C received, shutting down");
            interrupted = true;
        }
    }

    if interrupted {
        reader.abort();
    }

    match reader.await {
        Ok(Err(e)) => error!("feed error: {}", e),
        Err(e) if !e.is_cancelled() => error!("feed reader panicked: {}", e),
        _ => {}
    }

    match nompool_db::queries::bookings::pool_totals(processor.journal()) {
        Ok(totals) => {
            for t in totals {
                info!(
                    kind = t.kind.as_str(),
                    credit = t.credit,
                    debit = t.debit,
                    count = t.count,
                    "journal totals"
                );
            }
        }
        Err(e) => error!("journal totals unavailable: {}", e),
    }

    let data = processor.pool().data();
    info!(
        seqno = data.seqno,
        state = %data.state,
        halted = data.halted,
        "daemon stopped"
    );
    Ok(())
}
