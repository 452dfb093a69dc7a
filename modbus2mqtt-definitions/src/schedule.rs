//! Per-register poll scheduling state.
//!
//! Kept apart from [`RegisterDefinition`] so reloading the catalog and
//! advancing the poll loop never touch the same value. The poller owns a
//! [`PollSchedule`] and rebuilds it from every newly loaded catalog.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::trace;

use crate::catalog::Catalog;
use crate::definition::RegisterDefinition;

/// Earliest representable timestamp; a cursor at this value is always due.
pub const EARLIEST: DateTime<Utc> = DateTime::<Utc>::MIN_UTC;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Cursor {
    next_read: DateTime<Utc>,
    interval: Duration,
}

/// Next-read cursors keyed by register address.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollSchedule {
    cursors: BTreeMap<u64, Cursor>,
}

impl PollSchedule {
    /// Build a schedule where every register in the catalog is due now.
    pub fn for_catalog(catalog: &Catalog) -> Self {
        let cursors = catalog
            .iter()
            .map(|def| (def.address, Cursor::fresh(def)))
            .collect();
        Self { cursors }
    }

    /// Drop all cursors and start over from a (re)loaded catalog.
    pub fn reset(&mut self, catalog: &Catalog) {
        *self = Self::for_catalog(catalog);
    }

    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    pub fn next_read(&self, address: u64) -> Option<DateTime<Utc>> {
        self.cursors.get(&address).map(|c| c.next_read)
    }

    pub fn is_due(&self, address: u64, now: DateTime<Utc>) -> bool {
        self.cursors
            .get(&address)
            .is_some_and(|c| c.next_read <= now)
    }

    /// Addresses due at `now`, ascending.
    pub fn due(&self, now: DateTime<Utc>) -> Vec<u64> {
        self.cursors
            .iter()
            .filter(|(_, c)| c.next_read <= now)
            .map(|(address, _)| *address)
            .collect()
    }

    /// Record a poll at `at` and return the next time the register is due.
    ///
    /// Returns `None` for addresses that are not scheduled.
    pub fn mark_read(&mut self, address: u64, at: DateTime<Utc>) -> Option<DateTime<Utc>> {
        let cursor = self.cursors.get_mut(&address)?;
        cursor.next_read = chrono::Duration::from_std(cursor.interval)
            .ok()
            .and_then(|interval| at.checked_add_signed(interval))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        trace!(address, next_read = %cursor.next_read, "Advanced poll cursor");
        Some(cursor.next_read)
    }
}

impl Cursor {
    fn fresh(def: &RegisterDefinition) -> Self {
        Self {
            next_read: EARLIEST,
            interval: def.poll_interval(),
        }
    }
}
