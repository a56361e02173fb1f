//! Journal schema.

/// Version 1.
pub const SCHEMA_V1: &str = "
CREATE TABLE IF NOT EXISTS bookings (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    hash BLOB NOT NULL UNIQUE,
    kind TEXT NOT NULL,
    address BLOB NOT NULL,
    credit INTEGER NOT NULL DEFAULT 0,
    debit INTEGER NOT NULL DEFAULT 0,
    utime INTEGER NOT NULL,
    seqno INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_bookings_address_utime ON bookings(address, utime);
CREATE INDEX IF NOT EXISTS idx_bookings_seqno ON bookings(seqno);

CREATE TABLE IF NOT EXISTS pool_snapshots (
    seqno INTEGER PRIMARY KEY,
    state TEXT NOT NULL,
    liquid_balance INTEGER NOT NULL,
    stake_amount_sent INTEGER NOT NULL,
    validator_amount INTEGER NOT NULL,
    nominators_count INTEGER NOT NULL
);
";
