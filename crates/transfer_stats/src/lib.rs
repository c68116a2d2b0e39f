//! Upload/download statistics that survive restarts.
//!
//! [`StatsTracker`] keeps the counters of the running process separate from
//! the history loaded at startup, sums them on read and writes the sum back
//! when asked to and only if something changed.
//!
//! ```no_run
//! let mut stats = transfer_stats::StatsTracker::init("/home/user/.config/rqbit");
//! stats.add_downloaded(16384);
//! println!("{}", stats.cumulative_stats());
//! stats.close()?;
//! # Ok::<(), transfer_stats::Error>(())
//! ```

mod clock;
mod error;
mod persistence;
mod ratio;
mod record;
mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{Error, Result};
pub use persistence::{FileStatsStore, PersistedStats, StatsFormat, StatsStore};
pub use ratio::Ratio;
pub use record::StatsRecord;
pub use tracker::StatsTracker;
