//! Booking journal queries.

use nompool_types::booking::{Booking, BookingKind};
use nompool_types::{Address, Coins, Timestamp};
use rusqlite::Connection;

use crate::{from_sql, to_sql, DbError, Result};

/// Insert a booking. Returns `false` if an identical booking was already
/// journaled.
pub fn insert_booking(conn: &Connection, booking: &Booking) -> Result<bool> {
    let hash = booking.booking_hash();
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO bookings (hash, kind, address, credit, debit, utime, seqno)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            hash.as_slice(),
            booking.kind.as_str(),
            booking.address.as_slice(),
            to_sql(booking.credit)?,
            to_sql(booking.debit)?,
            to_sql(booking.utime)?,
            to_sql(booking.seqno)?,
        ],
    )?;
    Ok(inserted == 1)
}

/// Insert a batch atomically. Returns how many were new.
pub fn insert_bookings(conn: &mut Connection, bookings: &[Booking]) -> Result<usize> {
    let tx = conn.transaction()?;
    let mut inserted = 0;
    for booking in bookings {
        if insert_booking(&tx, booking)? {
            inserted += 1;
        }
    }
    tx.commit()?;
    Ok(inserted)
}

/// Bookings for one address with `from <= utime < to`, oldest first.
pub fn bookings_for_address(
    conn: &Connection,
    address: &Address,
    from: Timestamp,
    to: Timestamp,
    limit: u32,
) -> Result<Vec<Booking>> {
    let mut stmt = conn.prepare(
        "SELECT kind, address, credit, debit, utime, seqno
         FROM bookings
         WHERE address = ?1 AND utime >= ?2 AND utime < ?3
         ORDER BY utime ASC, seqno ASC, id ASC
         LIMIT ?4",
    )?;

    let rows = stmt
        .query_map(
            rusqlite::params![address.as_slice(), to_sql(from)?, to_sql(to)?, limit],
            |row| {
                Ok(RawBooking {
                    kind: row.get(0)?,
                    address: row.get(1)?,
                    credit: row.get(2)?,
                    debit: row.get(3)?,
                    utime: row.get(4)?,
                    seqno: row.get(5)?,
                })
            },
        )?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter().map(RawBooking::into_booking).collect()
}

/// Journal-derived balance of a nominator: deposits and income minus losses
/// and withdrawals.
pub fn nominator_net(conn: &Connection, address: &Address) -> Result<i128> {
    let (credit, debit): (i64, i64) = conn.query_row(
        "SELECT COALESCE(SUM(credit), 0), COALESCE(SUM(debit), 0)
         FROM bookings
         WHERE address = ?1 AND kind IN (?2, ?3, ?4, ?5)",
        rusqlite::params![
            address.as_slice(),
            BookingKind::NominatorDeposit.as_str(),
            BookingKind::NominatorIncome.as_str(),
            BookingKind::NominatorLoss.as_str(),
            BookingKind::NominatorWithdrawal.as_str(),
        ],
        |row| Ok((row.get(0)?, row.get(1)?)),
    )?;
    Ok(i128::from(credit) - i128::from(debit))
}

/// Credit and debit sums for one booking kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KindTotals {
    pub kind: BookingKind,
    pub credit: Coins,
    pub debit: Coins,
    pub count: u64,
}

/// Per-kind totals over the whole journal, in kind-name order.
pub fn pool_totals(conn: &Connection) -> Result<Vec<KindTotals>> {
    let mut stmt = conn.prepare(
        "SELECT kind, COALESCE(SUM(credit), 0), COALESCE(SUM(debit), 0), COUNT(*)
         FROM bookings GROUP BY kind ORDER BY kind",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, i64>(3)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    rows.into_iter()
        .map(|(kind, credit, debit, count)| {
            Ok(KindTotals {
                kind: parse_kind(&kind)?,
                credit: from_sql(credit)?,
                debit: from_sql(debit)?,
                count: from_sql(count)?,
            })
        })
        .collect()
}

/// Number of journaled bookings.
pub fn count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM bookings", [], |row| row.get(0))?;
    from_sql(n)
}

fn parse_kind(name: &str) -> Result<BookingKind> {
    BookingKind::parse(name).ok_or_else(|| DbError::Corrupt(format!("unknown booking kind '{name}'")))
}

struct RawBooking {
    kind: String,
    address: Vec<u8>,
    credit: i64,
    debit: i64,
    utime: i64,
    seqno: i64,
}

impl RawBooking {
    fn into_booking(self) -> Result<Booking> {
        let address: Address = self
            .address
            .as_slice()
            .try_into()
            .map_err(|_| DbError::Corrupt(format!("address of {} bytes", self.address.len())))?;
        Ok(Booking {
            kind: parse_kind(&self.kind)?,
            address,
            credit: from_sql(self.credit)?,
            debit: from_sql(self.debit)?,
            utime: from_sql(self.utime)?,
            seqno: from_sql(self.seqno)?,
        })
    }
}
