//! Query functions organized by table.

pub mod bookings;
pub mod snapshots;
