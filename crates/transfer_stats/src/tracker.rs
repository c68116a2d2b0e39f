use std::{path::PathBuf, sync::Arc};

use tracing::{debug, warn};

use crate::{
    clock::{Clock, SystemClock},
    error::Result,
    persistence::{FileStatsStore, PersistedStats, StatsStore},
    record::StatsRecord,
};

/// Upload/download statistics of this process and of all previous ones.
///
/// Live counters are kept apart from the historical ones loaded at startup
/// and are only summed on read. Writes go through [`Self::flush_if_dirty`],
/// which is a cheap no-op unless something changed since the last
/// successful write.
///
/// There is no internal locking. Mutators take `&mut self`; owners that
/// share the tracker wrap it in their own lock.
pub struct StatsTracker {
    live: StatsRecord,
    historical: StatsRecord,
    start_time: u64,

    mutation_generation: u64,
    saved_generation: u64,

    store: Box<dyn StatsStore>,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for StatsTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatsTracker")
            .field("live", &self.live)
            .field("historical", &self.historical)
            .field("start_time", &self.start_time)
            .field("dirty", &self.is_dirty())
            .finish_non_exhaustive()
    }
}

impl StatsTracker {
    /// Loads history from `stats.json` (or legacy `stats.benc`) in
    /// `config_dir` and starts a new session at the current wall time.
    pub fn init(config_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Box::new(FileStatsStore::new(config_dir)),
            Arc::new(SystemClock),
        )
    }

    pub fn new(store: Box<dyn StatsStore>, clock: Arc<dyn Clock>) -> Self {
        let historical = match store.load() {
            Some(stats) => StatsRecord::from(stats),
            None => {
                debug!("no previous stats found, starting from zero");
                StatsRecord::zero()
            }
        };
        let live = StatsRecord {
            session_count: 1,
            ..Default::default()
        };
        let start_time = clock.now();
        Self {
            live,
            historical,
            start_time,
            mutation_generation: 0,
            saved_generation: 0,
            store,
            clock,
        }
    }

    fn mark_dirty(&mut self) {
        self.mutation_generation = self.mutation_generation.wrapping_add(1);
    }

    /// True if there were changes since construction or the last successful
    /// write.
    pub fn is_dirty(&self) -> bool {
        self.mutation_generation != self.saved_generation
    }

    /// Stats of this process only. `seconds_active` is the time elapsed since
    /// start (or since the last [`Self::clear_all`]).
    pub fn live_stats(&self) -> StatsRecord {
        let mut s = self.live;
        s.seconds_active = self.clock.now().saturating_sub(self.start_time);
        s.update_ratio();
        s
    }

    /// Stats as of the last load or save, not including this process.
    pub fn historical_stats(&self) -> StatsRecord {
        self.historical
    }

    /// Historical stats plus the live stats of this process.
    pub fn cumulative_stats(&self) -> StatsRecord {
        self.historical.merge(&self.live_stats())
    }

    pub fn add_uploaded(&mut self, bytes: u64) {
        self.live.uploaded_bytes = self.live.uploaded_bytes.saturating_add(bytes);
        self.mark_dirty();
    }

    pub fn add_downloaded(&mut self, bytes: u64) {
        self.live.downloaded_bytes = self.live.downloaded_bytes.saturating_add(bytes);
        self.mark_dirty();
    }

    /// Counts a created file. This alone doesn't make the tracker dirty, the
    /// count gets written along with the next byte counter change.
    pub fn file_created(&mut self) {
        self.files_created(1);
    }

    /// Same as calling [`Self::file_created`] `count` times.
    pub fn files_created(&mut self, count: u64) {
        self.live.files_added = self.live.files_added.saturating_add(count);
    }

    /// Forgets all history, including this session, and restarts the active
    /// time.
    pub fn clear_all(&mut self) {
        self.live = StatsRecord::zero();
        self.historical = StatsRecord::zero();
        self.start_time = self.clock.now();
        self.mark_dirty();
    }

    /// Writes the cumulative stats if anything changed since the last
    /// successful write. Returns whether a write happened.
    ///
    /// A failed write leaves the tracker dirty, so the next call retries.
    pub fn flush_if_dirty(&mut self) -> Result<bool> {
        if !self.is_dirty() {
            return Ok(false);
        }
        let generation = self.mutation_generation;
        let cumulative = PersistedStats::from(&self.cumulative_stats());
        match self.store.store(&cumulative) {
            Ok(()) => {
                self.saved_generation = generation;
                Ok(true)
            }
            Err(e) => {
                warn!(error=?e, "error saving stats");
                Err(e)
            }
        }
    }

    /// Final flush at shutdown.
    pub fn close(mut self) -> Result<()> {
        self.flush_if_dirty()?;
        Ok(())
    }
}
