use std::{
    fs::OpenOptions,
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace, warn};

use crate::{
    error::{Error, Result},
    record::StatsRecord,
};

/// The counters that survive a restart. The ratio is derived and never
/// stored.
///
/// Each key is read on its own: a missing key, or one holding anything but a
/// non-negative integer, reads as zero without discarding the other counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PersistedStats {
    #[serde(deserialize_with = "deserialize_counter")]
    pub downloaded_bytes: u64,
    #[serde(deserialize_with = "deserialize_counter")]
    pub files_added: u64,
    #[serde(deserialize_with = "deserialize_counter")]
    pub seconds_active: u64,
    #[serde(deserialize_with = "deserialize_counter")]
    pub session_count: u64,
    #[serde(deserialize_with = "deserialize_counter")]
    pub uploaded_bytes: u64,
}

fn deserialize_counter<'de, D>(deserializer: D) -> core::result::Result<u64, D::Error>
where
    D: serde::Deserializer<'de>,
{
    struct CounterVisitor;

    impl<'de> serde::de::Visitor<'de> for CounterVisitor {
        type Value = Option<u64>;

        fn expecting(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("a non-negative integer")
        }

        fn visit_u64<E: serde::de::Error>(self, v: u64) -> core::result::Result<Self::Value, E> {
            Ok(Some(v))
        }

        fn visit_i64<E: serde::de::Error>(self, v: i64) -> core::result::Result<Self::Value, E> {
            Ok(u64::try_from(v).ok())
        }

        fn visit_f64<E: serde::de::Error>(self, _: f64) -> core::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_bool<E: serde::de::Error>(self, _: bool) -> core::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_str<E: serde::de::Error>(self, _: &str) -> core::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_bytes<E: serde::de::Error>(self, _: &[u8]) -> core::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_unit<E: serde::de::Error>(self) -> core::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_none<E: serde::de::Error>(self) -> core::result::Result<Self::Value, E> {
            Ok(None)
        }

        fn visit_seq<A>(self, mut seq: A) -> core::result::Result<Self::Value, A::Error>
        where
            A: serde::de::SeqAccess<'de>,
        {
            while seq.next_element::<serde::de::IgnoredAny>()?.is_some() {}
            Ok(None)
        }

        fn visit_map<A>(self, mut map: A) -> core::result::Result<Self::Value, A::Error>
        where
            A: serde::de::MapAccess<'de>,
        {
            while map
                .next_entry::<serde::de::IgnoredAny, serde::de::IgnoredAny>()?
                .is_some()
            {}
            Ok(None)
        }
    }

    let value = deserializer.deserialize_any(CounterVisitor)?;
    if value.is_none() {
        debug!("ignoring stats counter that isn't a non-negative integer");
    }
    Ok(value.unwrap_or_default())
}

impl From<&StatsRecord> for PersistedStats {
    fn from(r: &StatsRecord) -> Self {
        Self {
            downloaded_bytes: r.downloaded_bytes,
            files_added: r.files_added,
            seconds_active: r.seconds_active,
            session_count: r.session_count,
            uploaded_bytes: r.uploaded_bytes,
        }
    }
}

impl From<PersistedStats> for StatsRecord {
    fn from(p: PersistedStats) -> Self {
        let mut r = StatsRecord {
            uploaded_bytes: p.uploaded_bytes,
            downloaded_bytes: p.downloaded_bytes,
            files_added: p.files_added,
            session_count: p.session_count,
            seconds_active: p.seconds_active,
            ..Default::default()
        };
        r.update_ratio();
        r
    }
}

/// On-disk encodings of [`PersistedStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatsFormat {
    /// Current format, read and written.
    Json,
    /// Format used by older versions. Only ever read, and replaced by
    /// [`StatsFormat::Json`] on the next save.
    Bencode,
}

impl std::fmt::Display for StatsFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StatsFormat::Json => f.write_str("json"),
            StatsFormat::Bencode => f.write_str("bencode"),
        }
    }
}

impl StatsFormat {
    pub fn filename(&self) -> &'static str {
        match self {
            StatsFormat::Json => "stats.json",
            StatsFormat::Bencode => "stats.benc",
        }
    }

    pub fn decode(&self, buf: &[u8]) -> anyhow::Result<PersistedStats> {
        match self {
            StatsFormat::Json => serde_json::from_slice(buf).context("error deserializing json"),
            StatsFormat::Bencode => {
                bencode::from_bytes::<PersistedStats>(buf).context("error deserializing bencode")
            }
        }
    }

    pub fn encode(&self, stats: &PersistedStats) -> Result<Vec<u8>> {
        match self {
            StatsFormat::Json => {
                serde_json::to_vec_pretty(stats).map_err(|source| Error::Serialize {
                    format: *self,
                    source,
                })
            }
            StatsFormat::Bencode => Err(Error::ReadOnlyFormat(*self)),
        }
    }
}

/// Durable storage for the historical stats.
pub trait StatsStore: Send + Sync {
    /// Returns `None` when there is no usable record. Failures are not
    /// errors here, a fresh start is a valid state.
    fn load(&self) -> Option<PersistedStats>;

    /// Replaces the stored record. On error the previous record must be left
    /// intact.
    fn store(&self, stats: &PersistedStats) -> Result<()>;
}

/// Stores stats as `stats.json` in a directory, falling back to reading a
/// legacy `stats.benc` from the same directory.
#[derive(Debug, Clone)]
pub struct FileStatsStore {
    dir: PathBuf,
}

impl FileStatsStore {
    const LOAD_ORDER: [StatsFormat; 2] = [StatsFormat::Json, StatsFormat::Bencode];
    const WRITE_FORMAT: StatsFormat = StatsFormat::Json;

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, format: StatsFormat) -> PathBuf {
        self.dir.join(format.filename())
    }

    fn tempfile_path(&self) -> PathBuf {
        self.dir.join(format!(
            "{}.tmp.{}",
            Self::WRITE_FORMAT.filename(),
            std::process::id()
        ))
    }

    fn load_format(&self, format: StatsFormat) -> anyhow::Result<Option<PersistedStats>> {
        let filename = self.path(format);
        let buf = match std::fs::read(&filename) {
            Ok(buf) => buf,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("error reading {filename:?}")),
        };
        format
            .decode(&buf)
            .with_context(|| format!("error parsing {filename:?}"))
            .map(Some)
    }
}

impl StatsStore for FileStatsStore {
    fn load(&self) -> Option<PersistedStats> {
        for format in Self::LOAD_ORDER {
            match self.load_format(format) {
                Ok(Some(stats)) => {
                    let filename = self.path(format);
                    if format == Self::WRITE_FORMAT {
                        debug!(?filename, "loaded stats");
                    } else {
                        info!(?filename, %format, "loaded legacy stats, will migrate on next save");
                    }
                    return Some(stats);
                }
                Ok(None) => {
                    debug!(filename=?self.path(format), "stats file not found");
                }
                Err(e) => {
                    warn!(filename=?self.path(format), "error loading stats: {e:#}");
                }
            }
        }
        None
    }

    fn store(&self, stats: &PersistedStats) -> Result<()> {
        let buf = Self::WRITE_FORMAT.encode(stats)?;

        std::fs::create_dir_all(&self.dir).map_err(|source| Error::CreateDir {
            path: self.dir.clone(),
            source,
        })?;

        let filename = self.path(Self::WRITE_FORMAT);
        let tempfile_name = self.tempfile_path();
        debug!(?filename, "saving stats");

        let write_result = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(&tempfile_name)
            .and_then(|mut f| {
                f.write_all(&buf)?;
                f.sync_all()
            });
        if let Err(source) = write_result {
            let _ = std::fs::remove_file(&tempfile_name);
            return Err(Error::Write {
                path: tempfile_name,
                source,
            });
        }

        if let Err(source) = std::fs::rename(&tempfile_name, &filename) {
            let _ = std::fs::remove_file(&tempfile_name);
            return Err(Error::Rename {
                from: tempfile_name,
                to: filename,
                source,
            });
        }
        trace!(?filename, "wrote stats");
        Ok(())
    }
}
