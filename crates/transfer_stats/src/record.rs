use std::ops::Add;

use serde::Serialize;
use size_format::SizeFormatterBinary as SF;

use crate::ratio::Ratio;

/// A snapshot of transfer statistics.
///
/// The same type describes the live stats of this process, the historical
/// stats of all previous ones and the sum of the two. `ratio` is derived and
/// always recomputed from the byte counters before a record leaves the
/// tracker.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct StatsRecord {
    pub uploaded_bytes: u64,
    pub downloaded_bytes: u64,
    pub ratio: Ratio,
    pub files_added: u64,
    pub session_count: u64,
    pub seconds_active: u64,
}

impl StatsRecord {
    pub fn zero() -> Self {
        Self::default()
    }

    pub(crate) fn update_ratio(&mut self) {
        self.ratio = Ratio::new(self.uploaded_bytes, self.downloaded_bytes);
    }

    /// Field-wise sum of two records. The ratio is recomputed from the
    /// summed byte counts, never added.
    pub fn merge(&self, other: &StatsRecord) -> StatsRecord {
        let mut merged = StatsRecord {
            uploaded_bytes: self.uploaded_bytes.saturating_add(other.uploaded_bytes),
            downloaded_bytes: self.downloaded_bytes.saturating_add(other.downloaded_bytes),
            ratio: Ratio::None,
            files_added: self.files_added.saturating_add(other.files_added),
            session_count: self.session_count.saturating_add(other.session_count),
            seconds_active: self.seconds_active.saturating_add(other.seconds_active),
        };
        merged.update_ratio();
        merged
    }

    pub fn uploaded_human_readable(&self) -> impl std::fmt::Display {
        SizeHumanReadable(self.uploaded_bytes)
    }

    pub fn downloaded_human_readable(&self) -> impl std::fmt::Display {
        SizeHumanReadable(self.downloaded_bytes)
    }

    pub fn as_prometheus(&self, mut out: &mut String) {
        use core::fmt::Write;

        out.push('\n');

        macro_rules! m {
            ($type:ident, $name:ident, $value:expr) => {{
                writeln!(
                    &mut out,
                    concat!("# TYPE ", stringify!($name), " ", stringify!($type))
                )
                .unwrap();
                writeln!(&mut out, concat!(stringify!($name), " {}"), $value).unwrap();
            }};
        }

        m!(counter, rqbit_stats_uploaded_bytes, self.uploaded_bytes);
        m!(counter, rqbit_stats_downloaded_bytes, self.downloaded_bytes);
        m!(counter, rqbit_stats_files_added, self.files_added);
        m!(counter, rqbit_stats_session_count, self.session_count);
        m!(counter, rqbit_stats_seconds_active, self.seconds_active);
        m!(gauge, rqbit_stats_ratio, self.ratio.as_f64());
    }
}

impl Add for StatsRecord {
    type Output = StatsRecord;

    fn add(self, rhs: StatsRecord) -> StatsRecord {
        self.merge(&rhs)
    }
}

struct SizeHumanReadable(u64);

impl std::fmt::Display for SizeHumanReadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}B", SF::new(self.0))
    }
}

fn format_seconds_to_time(seconds: u64, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
    let days = seconds / 86400;
    let hours = (seconds % 86400) / 3600;
    let minutes = (seconds % 3600) / 60;
    let seconds = seconds % 60;

    if days > 0 {
        write!(f, "{}d {}h", days, hours)
    } else if hours > 0 {
        write!(f, "{}h {}m", hours, minutes)
    } else if minutes > 0 {
        write!(f, "{}m {}s", minutes, seconds)
    } else {
        write!(f, "{}s", seconds)
    }
}

struct SecondsHumanReadable(u64);

impl std::fmt::Display for SecondsHumanReadable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        format_seconds_to_time(self.0, f)
    }
}

impl std::fmt::Display for StatsRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "  Uploaded:   {}", self.uploaded_human_readable())?;
        writeln!(f, "  Downloaded: {}", self.downloaded_human_readable())?;
        writeln!(f, "  Ratio:      {}", self.ratio)?;
        writeln!(f, "  Files:      {}", self.files_added)?;
        writeln!(f, "  Sessions:   {}", self.session_count)?;
        write!(
            f,
            "  Duration:   {}",
            SecondsHumanReadable(self.seconds_active)
        )
    }
}
