//! Single-owner message loop.
//!
//! The processor owns the [`Pool`] and the journal connection. Messages are
//! taken one at a time: queued elector replies first, then the next feed
//! message. Every outcome is written as one JSON line.

use nompool_db::queries::{bookings, snapshots};
use nompool_lifecycle::{InboundMessage, Outcome, Pool};
use nompool_types::booking::Booking;
use nompool_types::ErrorKind;
use rusqlite::Connection;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio::sync::mpsc;

use crate::elector::LoopbackElector;
use crate::events::{Event, EventBus};

/// Counters for one run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub committed: u64,
    pub failed: u64,
    pub bookings: u64,
}

pub struct Processor {
    pool: Pool<LoopbackElector>,
    journal: Connection,
    bus: EventBus,
}

impl Processor {
    pub fn new(pool: Pool<LoopbackElector>, journal: Connection, bus: EventBus) -> Self {
        Self { pool, journal, bus }
    }

    /// Process one message, journal its bookings and emit its events.
    ///
    /// A journal write failure after commit is fatal: the error names the
    /// seqno the journal stopped at and no further message is taken.
    pub fn handle(&mut self, msg: &InboundMessage) -> anyhow::Result<Outcome> {
        let outcome = self.pool.process(msg);

        match &outcome {
            Outcome::Committed { seqno, effects, .. } => {
                if let Err(e) = self.record(&outcome, *seqno) {
                    tracing::error!(
                        seqno,
                        error = %e,
                        "journal write failed, pool state is ahead of the journal"
                    );
                    self.bus.emit(Event {
                        event_type: "JournalDiverged".to_string(),
                        seqno: *seqno,
                        timestamp: msg.now,
                        payload: serde_json::json!({ "error": e.to_string() }),
                    });
                    anyhow::bail!("journal diverged at seqno {seqno}: {e}");
                }

                for effect in effects {
                    if let Some(event) = Event::from_effect(effect, *seqno, msg.now) {
                        self.bus.emit(event);
                    }
                }
            }
            Outcome::Failed {
                kind: ErrorKind::ConservationViolated,
                reason,
                ..
            } => {
                self.bus.emit(Event {
                    event_type: "PoolHalted".to_string(),
                    seqno: self.pool.data().seqno,
                    timestamp: msg.now,
                    payload: serde_json::json!({ "reason": reason }),
                });
            }
            Outcome::Failed { .. } => {}
        }

        Ok(outcome)
    }

    /// Journal the bookings and the post-commit snapshot of one outcome.
    fn record(&mut self, outcome: &Outcome, seqno: u64) -> anyhow::Result<()> {
        let batch: Vec<Booking> = outcome.bookings().cloned().collect();
        let inserted = bookings::insert_bookings(&mut self.journal, &batch)?;
        if inserted < batch.len() {
            tracing::debug!(
                seqno,
                duplicates = batch.len() - inserted,
                "bookings already journaled"
            );
        }
        snapshots::record_snapshot(&self.journal, &self.pool.data().snapshot())?;
        Ok(())
    }

    /// Run until the feed closes and no elector reply is pending.
    pub async fn run<W>(
        &mut self,
        mut feed: mpsc::Receiver<InboundMessage>,
        mut out: W,
    ) -> anyhow::Result<RunSummary>
    where
        W: AsyncWrite + Unpin,
    {
        let mut summary = RunSummary::default();

        loop {
            let msg = match self.pool.counterparty_mut().next_reply() {
                Some(reply) => reply,
                None => match feed.recv().await {
                    Some(msg) => msg,
                    None => break,
                },
            };

            let outcome = self.handle(&msg)?;
            if outcome.is_committed() {
                summary.committed += 1;
                summary.bookings += outcome.bookings().count() as u64;
            } else {
                summary.failed += 1;
            }

            let mut line = serde_json::to_vec(&outcome)?;
            line.push(b'\n');
            out.write_all(&line).await?;
        }

        out.flush().await?;
        Ok(summary)
    }

    pub fn pool(&self) -> &Pool<LoopbackElector> {
        &self.pool
    }

    pub fn journal(&self) -> &Connection {
        &self.journal
    }
}
