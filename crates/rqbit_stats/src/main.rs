use std::{
    io::Write,
    path::{Path, PathBuf},
};

use anyhow::Context;
use clap::{Parser, ValueEnum};
use tracing::{debug, info};
use transfer_stats::{StatsRecord, StatsTracker};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
    Prometheus,
}

#[derive(Parser)]
#[command(version, author, about)]
struct Opts {
    /// The loglevel
    #[arg(value_enum, short = 'v')]
    log_level: Option<LogLevel>,

    /// The directory holding stats.json (and possibly a legacy stats.benc).
    /// Defaults to rqbit's session configuration directory.
    #[arg(long = "config-dir", env = "RQBIT_STATS_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    subcommand: SubCommand,
}

#[derive(Parser)]
struct ShowOpts {
    #[arg(value_enum, short = 'f', long = "format", default_value_t)]
    format: OutputFormat,
}

#[derive(Parser)]
struct RecordOpts {
    /// Bytes uploaded.
    #[arg(long, default_value_t = 0)]
    uploaded: u64,

    /// Bytes downloaded.
    #[arg(long, default_value_t = 0)]
    downloaded: u64,

    /// Number of files created.
    #[arg(long, default_value_t = 0)]
    files: u64,

    #[arg(value_enum, short = 'f', long = "format", default_value_t)]
    format: OutputFormat,
}

#[derive(Parser)]
enum SubCommand {
    /// Print the saved statistics.
    Show(ShowOpts),
    /// Reset all statistics to zero.
    Clear,
    /// Add transfer amounts to the statistics, counting as one session.
    Record(RecordOpts),
}

fn init_logging(opts: &Opts) -> anyhow::Result<()> {
    let default_rust_log = match opts.log_level.as_ref() {
        Some(level) => match level {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        },
        None => "warn",
    };
    let stderr_filter = match std::env::var("RUST_LOG").ok() {
        Some(rust_log) => EnvFilter::builder()
            .parse(&rust_log)
            .context("can't parse RUST_LOG")?,
        None => EnvFilter::builder()
            .parse(default_rust_log)
            .context("can't parse default_rust_log")?,
    };

    use tracing_subscriber::{EnvFilter, fmt, prelude::*};

    // stdout is for the stats output
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(stderr_filter)
        .try_init()
        .context("can't init logging")?;
    Ok(())
}

fn get_configuration_directory_linux(
    application: &str,
) -> anyhow::Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "rqbit", &format!("com.rqbit.{application}"))
        .with_context(|| {
            format!("cannot determine project directory for com.rqbit.{application}")
        })
}

fn get_configuration_directory(application: &str) -> anyhow::Result<directories::ProjectDirs> {
    #[cfg(not(any(target_os = "macos", target_os = "windows")))]
    {
        get_configuration_directory_linux(application)
    }
    #[cfg(any(target_os = "macos", target_os = "windows"))]
    {
        directories::ProjectDirs::from("com", "rqbit", application).with_context(|| {
            format!("cannot determine project directory for com.rqbit.{application}")
        })
    }
}

fn default_config_dir() -> anyhow::Result<PathBuf> {
    Ok(get_configuration_directory("session")?
        .config_dir()
        .to_owned())
}

fn print_stats(
    stats: &StatsRecord,
    format: OutputFormat,
    out: &mut impl Write,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Text => writeln!(out, "{stats}")?,
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, stats).context("error serializing stats")?;
            writeln!(out)?;
        }
        OutputFormat::Prometheus => {
            let mut buf = String::new();
            stats.as_prometheus(&mut buf);
            out.write_all(buf.as_bytes())?;
        }
    }
    Ok(())
}

fn run(subcommand: &SubCommand, config_dir: &Path, out: &mut impl Write) -> anyhow::Result<()> {
    debug!(?config_dir, "using stats directory");
    let mut tracker = StatsTracker::init(config_dir);
    match subcommand {
        SubCommand::Show(show) => {
            // Nothing was transferred by this process, only history is of interest.
            print_stats(&tracker.historical_stats(), show.format, out)?;
        }
        SubCommand::Clear => {
            tracker.clear_all();
            tracker
                .close()
                .with_context(|| format!("error saving stats to {config_dir:?}"))?;
            info!(?config_dir, "cleared stats");
        }
        SubCommand::Record(record) => {
            tracker.add_uploaded(record.uploaded);
            tracker.add_downloaded(record.downloaded);
            tracker.files_created(record.files);
            print_stats(&tracker.cumulative_stats(), record.format, out)?;
            tracker
                .close()
                .with_context(|| format!("error saving stats to {config_dir:?}"))?;
        }
    }
    Ok(())
}

fn main() -> anyhow::Result<()> {
    let opts = Opts::parse();
    init_logging(&opts)?;

    let config_dir = match opts.config_dir.as_ref() {
        Some(dir) => dir.clone(),
        None => default_config_dir()?,
    };

    let stdout = std::io::stdout();
    run(&opts.subcommand, &config_dir, &mut stdout.lock())
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::{Opts, SubCommand, run};

    fn run_args(dir: &std::path::Path, args: &[&str]) -> String {
        let mut argv = vec!["rqbit-stats"];
        argv.extend_from_slice(args);
        let opts = Opts::try_parse_from(argv).unwrap();
        let mut out = Vec::new();
        run(&opts.subcommand, dir, &mut out).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn test_parse_record() {
        let opts = Opts::try_parse_from([
            "rqbit-stats",
            "--config-dir",
            "/tmp/x",
            "record",
            "--uploaded",
            "10",
            "--files",
            "2",
        ])
        .unwrap();
        assert_eq!(
            opts.config_dir.as_deref(),
            Some(std::path::Path::new("/tmp/x"))
        );
        match opts.subcommand {
            SubCommand::Record(r) => {
                assert_eq!(r.uploaded, 10);
                assert_eq!(r.downloaded, 0);
                assert_eq!(r.files, 2);
            }
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn test_record_many_files() {
        let dir = tempfile::TempDir::new().unwrap();
        let max = u64::MAX.to_string();
        run_args(dir.path(), &["record", "--uploaded", "1", "--files", &max]);

        let json: serde_json::Value =
            serde_json::from_str(&run_args(dir.path(), &["show", "--format", "json"])).unwrap();
        assert_eq!(json["files_added"], u64::MAX);
    }

    #[test]
    fn test_record_show_clear() {
        let dir = tempfile::TempDir::new().unwrap();

        run_args(dir.path(), &["record", "--uploaded", "30", "--downloaded", "60"]);
        run_args(dir.path(), &["record", "--files", "1"]);

        let json: serde_json::Value =
            serde_json::from_str(&run_args(dir.path(), &["show", "--format", "json"])).unwrap();
        assert_eq!(json["uploaded_bytes"], 30);
        assert_eq!(json["downloaded_bytes"], 60);
        assert_eq!(json["files_added"], 1);
        assert_eq!(json["session_count"], 2);
        assert_eq!(json["ratio"], 0.5);

        run_args(dir.path(), &["clear"]);
        let prom = run_args(dir.path(), &["show", "-f", "prometheus"]);
        assert!(prom.contains("rqbit_stats_uploaded_bytes 0\n"), "{prom}");
        assert!(prom.contains("rqbit_stats_ratio -1\n"), "{prom}");
    }
}
