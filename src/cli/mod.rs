//! CLI mode - command-line front end for report synchronization.

mod progress;

use std::path::PathBuf;

use tokio_util::sync::CancellationToken;

use crate::credentials::{
    ENV_GATEWAY_PASSWORD, ENV_GATEWAY_USERNAME, ENV_HMAC_KEY, ENV_HMAC_USER,
};
use crate::filter::DEFAULT_WINDOW_DAYS;
use crate::{AppConfig, BlobAuth, Credentials, DateRange, Error, SyncSession};

use progress::{CliProgress, print_report_list, print_summary};

/// Options accepted on the command line.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOptions {
    /// Start of the date window.
    pub from: Option<String>,
    /// End of the date window.
    pub to: Option<String>,
    /// Ignore dates and consider the whole catalog.
    pub all: bool,
    /// Only list the matching reports.
    pub list_only: bool,
    /// Override for the reports root.
    pub root: Option<PathBuf>,
    /// Override for concurrent downloads.
    pub parallel: Option<usize>,
    /// Override for the transfer chunk size.
    pub chunk_size: Option<usize>,
    /// Override for the blob auth policy.
    pub blob_auth: Option<BlobAuth>,
    /// Config file to read instead of the default location.
    pub config_path: Option<PathBuf>,
}

/// What the command line asked for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Print usage.
    Help,
    /// Synchronize with the given options.
    Sync(CliOptions),
}

impl CliOptions {
    /// Resolves the date window, or `None` with `--all`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] for malformed dates.
    pub fn range(&self) -> crate::Result<Option<DateRange>> {
        if self.all {
            return Ok(None);
        }
        let default = DateRange::last_days(DEFAULT_WINDOW_DAYS);
        let start = self.from.as_deref().unwrap_or(default.start());
        let end = self.to.as_deref().unwrap_or(default.end());
        DateRange::parse(start, end).map(Some)
    }

    /// Applies command-line overrides on top of the loaded configuration.
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(root) = &self.root {
            config.paths.reports_root.clone_from(root);
        }
        if let Some(parallel) = self.parallel {
            config.download.concurrent_files = parallel.max(1);
        }
        if let Some(size) = self.chunk_size {
            config.download.chunk_size = size.max(1);
        }
        if let Some(auth) = self.blob_auth {
            config.download.blob_auth = auth;
        }
    }
}

fn value<'a>(args: &'a [String], i: &mut usize, flag: &str) -> crate::Result<&'a str> {
    *i += 1;
    args.get(*i)
        .map(String::as_str)
        .ok_or_else(|| Error::Config(format!("{flag} requires a value")))
}

fn number(raw: &str, flag: &str) -> crate::Result<usize> {
    raw.parse()
        .map_err(|_| Error::Config(format!("{flag} expects a number, got {raw:?}")))
}

/// Parses command-line arguments (without the program name).
///
/// # Errors
///
/// Returns [`Error::Config`] for unknown options or bad values.
pub fn parse_args(args: &[String]) -> crate::Result<Command> {
    let mut options = CliOptions::default();
    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "-h" | "--help" => return Ok(Command::Help),
            "--from" => options.from = Some(value(args, &mut i, flag)?.to_string()),
            "--to" => options.to = Some(value(args, &mut i, flag)?.to_string()),
            "--all" => options.all = true,
            "--list" => options.list_only = true,
            "--root" => options.root = Some(PathBuf::from(value(args, &mut i, flag)?)),
            "-p" | "--parallel" => {
                options.parallel = Some(number(value(args, &mut i, flag)?, flag)?);
            }
            "--chunk-size" => {
                options.chunk_size = Some(number(value(args, &mut i, flag)?, flag)?);
            }
            "--blob-auth" => options.blob_auth = Some(value(args, &mut i, flag)?.parse()?),
            "-c" | "--config" => {
                options.config_path = Some(PathBuf::from(value(args, &mut i, flag)?));
            }
            other => return Err(Error::Config(format!("unknown option: {other}"))),
        }
        i += 1;
    }
    Ok(Command::Sync(options))
}

/// Prints usage to stderr.
pub fn print_usage() {
    eprintln!("Usage: lc-reports [OPTIONS]");
    eprintln!();
    eprintln!("Downloads new reports from the LC gateway into <root>/<today>.");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --from <DATE>          First report date, YYYY-MM-DD (default: {DEFAULT_WINDOW_DAYS} days ago)");
    eprintln!("  --to <DATE>            Last report date, YYYY-MM-DD (default: today)");
    eprintln!("  --all                  Ignore report dates");
    eprintln!("  --list                 List matching reports without downloading");
    eprintln!("  --root <DIR>           Reports root (default: ~/Downloads/LC Reports)");
    eprintln!("  -p, --parallel <N>     Concurrent downloads (default: 1)");
    eprintln!("  --chunk-size <BYTES>   Transfer chunk size (default: 16384)");
    eprintln!("  --blob-auth <POLICY>   anonymous | signed (default: anonymous)");
    eprintln!("  -c, --config <FILE>    Config file (default: <config dir>/lc-reports/config.toml)");
    eprintln!("  -h, --help             Show this help");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  {ENV_GATEWAY_USERNAME}       Gateway username");
    eprintln!("  {ENV_GATEWAY_PASSWORD}       Gateway password");
    eprintln!("  {ENV_HMAC_USER}              HMAC user");
    eprintln!("  {ENV_HMAC_KEY}               HMAC key (base64)");
}

/// Runs the CLI with the process arguments.
///
/// # Errors
///
/// Returns configuration, authentication and catalog errors. Individual
/// download failures are listed in the summary instead.
pub async fn run() -> crate::Result<()> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    let options = match parse_args(&args)? {
        Command::Help => {
            print_usage();
            return Ok(());
        }
        Command::Sync(options) => options,
    };
    run_sync(&options).await
}

/// Runs a synchronization with parsed options.
///
/// # Errors
///
/// See [`run`].
pub async fn run_sync(options: &CliOptions) -> crate::Result<()> {
    let mut config = match &options.config_path {
        Some(path) => AppConfig::load_from(path)?,
        None => AppConfig::load()?,
    };
    options.apply(&mut config);
    let range = options.range()?;
    let credentials = Credentials::from_env()?;

    let session = SyncSession::start(config, credentials).await?;

    println!("Requesting report list...");
    let reports = session.load_reports(range.as_ref()).await?;
    let window = range.as_ref().map_or_else(
        || "in catalog".to_string(),
        |r| format!("from {} to {}", r.start(), r.end()),
    );
    let collected = session.plan(&reports);
    print_report_list(&collected, &window);

    if options.list_only {
        return Ok(());
    }
    if collected.is_empty() {
        if !collected.skipped.is_empty() {
            println!("All reports already downloaded.");
        }
        return Ok(());
    }

    let cancel = CancellationToken::new();
    let ctrl_c = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupted, cancelling downloads");
                cancel.cancel();
            }
        })
    };

    let progress = CliProgress::new(collected.to_download.len());
    let result = session.download_selected(&reports, &progress, &cancel).await;
    progress.finish();
    ctrl_c.abort();

    print_summary(&result?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn parses_full_option_set() {
        let cmd = parse_args(&args(&[
            "--from",
            "2024-01-01",
            "--to",
            "2024-01-31",
            "--list",
            "--root",
            "/tmp/r",
            "-p",
            "3",
            "--chunk-size",
            "1024",
            "--blob-auth",
            "signed",
        ]))
        .unwrap();

        let Command::Sync(options) = cmd else {
            panic!("expected sync command");
        };
        assert_eq!(options.from.as_deref(), Some("2024-01-01"));
        assert!(options.list_only);
        assert_eq!(options.parallel, Some(3));
        assert_eq!(options.blob_auth, Some(BlobAuth::Signed));

        let mut config = AppConfig::default();
        options.apply(&mut config);
        assert_eq!(config.paths.reports_root, PathBuf::from("/tmp/r"));
        assert_eq!(config.download.concurrent_files, 3);
        assert_eq!(config.download.chunk_size, 1024);

        let range = options.range().unwrap().unwrap();
        assert_eq!((range.start(), range.end()), ("2024-01-01", "2024-01-31"));
    }

    #[test]
    fn help_wins() {
        assert_eq!(parse_args(&args(&["--all", "-h"])).unwrap(), Command::Help);
    }

    #[test]
    fn all_disables_range() {
        let Command::Sync(options) = parse_args(&args(&["--all"])).unwrap() else {
            panic!("expected sync command");
        };
        assert!(options.range().unwrap().is_none());
    }

    #[test]
    fn default_range_is_recent_window() {
        let range = CliOptions::default().range().unwrap().unwrap();
        assert_eq!(range, DateRange::last_days(DEFAULT_WINDOW_DAYS));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(parse_args(&args(&["--bogus"])).is_err());
        assert!(parse_args(&args(&["--from"])).is_err());
        assert!(parse_args(&args(&["-p", "many"])).is_err());
        assert!(parse_args(&args(&["--blob-auth", "kerberos"])).is_err());
    }
}
