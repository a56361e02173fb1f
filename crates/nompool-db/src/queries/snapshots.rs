//! Pool snapshot queries.

use nompool_types::state::{PoolSnapshot, PoolState};
use rusqlite::{Connection, OptionalExtension};

use crate::{from_sql, to_sql, DbError, Result};

/// Record the pool figures after a committed message.
pub fn record_snapshot(conn: &Connection, snapshot: &PoolSnapshot) -> Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO pool_snapshots
         (seqno, state, liquid_balance, stake_amount_sent, validator_amount, nominators_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            to_sql(snapshot.seqno)?,
            snapshot.state.as_str(),
            to_sql(snapshot.liquid_balance)?,
            to_sql(snapshot.stake_amount_sent)?,
            to_sql(snapshot.validator_amount)?,
            snapshot.nominators_count,
        ],
    )?;
    Ok(())
}

/// Most recent snapshot, if any.
pub fn latest_snapshot(conn: &Connection) -> Result<Option<PoolSnapshot>> {
    let row = conn
        .query_row(
            "SELECT seqno, state, liquid_balance, stake_amount_sent, validator_amount, nominators_count
             FROM pool_snapshots ORDER BY seqno DESC LIMIT 1",
            [],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, i64>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, i64>(4)?,
                    row.get::<_, u16>(5)?,
                ))
            },
        )
        .optional()?;

    let Some((seqno, state, liquid, sent, validator, count)) = row else {
        return Ok(None);
    };
    let state = PoolState::parse(&state)
        .ok_or_else(|| DbError::Corrupt(format!("unknown pool state '{state}'")))?;

    Ok(Some(PoolSnapshot {
        seqno: from_sql(seqno)?,
        state,
        liquid_balance: from_sql(liquid)?,
        stake_amount_sent: from_sql(sent)?,
        validator_amount: from_sql(validator)?,
        nominators_count: count,
    }))
}
