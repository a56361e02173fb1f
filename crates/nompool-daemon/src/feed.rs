//! JSON-lines message feed.
//!
//! One message per line. A line carries either a raw hex `body` or a typed
//! `action`:
//!
//! ```text
//! {"sender":"<hex>","value":1000,"now":1700000000,"body":"00000064"}
//! {"sender":"<hex>","now":1700000100,"action":{"op":"stake"}}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use nompool_lifecycle::{InboundMessage, Operation};
use nompool_types::{Address, Coins, Timestamp};
use serde::Deserialize;
use serde_with::serde_as;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::mpsc;

#[serde_as]
#[derive(Debug, Deserialize)]
struct FeedLine {
    #[serde_as(as = "serde_with::hex::Hex")]
    sender: Address,
    #[serde(default)]
    value: Coins,
    now: Timestamp,
    #[serde_as(as = "Option<serde_with::hex::Hex>")]
    #[serde(default)]
    body: Option<Vec<u8>>,
    #[serde(default)]
    action: Option<Operation>,
}

/// Parse one feed line. `Ok(None)` for blank and comment lines.
pub fn parse_line(line: &str) -> anyhow::Result<Option<InboundMessage>> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    let parsed: FeedLine = serde_json::from_str(line)?;
    let body = match (parsed.body, parsed.action) {
        (Some(body), None) => body,
        (None, Some(action)) => action.encode(),
        (Some(_), Some(_)) => anyhow::bail!("line has both body and action"),
        (None, None) => anyhow::bail!("line has neither body nor action"),
    };
    Ok(Some(InboundMessage {
        sender: parsed.sender,
        value: parsed.value,
        now: parsed.now,
        body,
    }))
}

/// Read the feed to the end, forwarding messages in order. Malformed lines are
/// logged and skipped. Returns the number of messages forwarded.
pub async fn read_feed<R>(reader: R, tx: mpsc::Sender<InboundMessage>) -> anyhow::Result<u64>
where
    R: AsyncBufRead + Unpin,
{
    let mut lines = reader.lines();
    let mut line_no = 0u64;
    let mut forwarded = 0u64;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        match parse_line(&line) {
            Ok(Some(msg)) => {
                if tx.send(msg).await.is_err() {
                    tracing::debug!("processor gone, feed reader stopping");
                    break;
                }
                forwarded += 1;
            }
            Ok(None) => {}
            Err(e) => tracing::warn!(line = line_no, error = %e, "skipping malformed feed line"),
        }
    }

    tracing::info!(lines = line_no, forwarded, "feed exhausted");
    Ok(forwarded)
}
