//! CLI binary for pero-ocr.
//!
//! A thin shim over the library crate that maps CLI flags to `JobConfig`
//! and reports the outcome. Any error exits with status 1 and a message on
//! stderr; an already-finished job exits 0 without contacting the service.

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pero_ocr::{
    process_image, JobConfig, JobOutcome, JobPaths, JobProgressCallback, ProcessingPhase,
    ProgressCallback, ResultFormat, DEFAULT_SERVER_URL,
};
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that follows the job through submit, upload and polling.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  ⏱ {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Submitting");
        bar.set_message("creating processing request…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_submitted(&self, request_id: &str) {
        self.bar.set_prefix("Uploading");
        self.bar.set_message(format!("request {}", dim(request_id)));
    }

    fn on_uploaded(&self, file_name: &str) {
        self.bar
            .println(format!("  {} Uploaded {}", green("✓"), bold(file_name)));
        self.bar.set_prefix("Waiting");
        self.bar.set_message("queued on the OCR service…");
    }

    fn on_poll(&self, attempt: u32, phase: ProcessingPhase, processed: bool) {
        if !processed {
            let what = match phase {
                ProcessingPhase::Text => "text",
                ProcessingPhase::Layout => "layout",
            };
            self.bar
                .set_message(format!("{what} not processed yet (poll {attempt})"));
        }
    }

    fn on_result_written(&self, format: ResultFormat, path: &Path, bytes: usize) {
        self.bar.println(format!(
            "  {} {:<4} → {}  {}",
            green("✓"),
            format,
            bold(&path.display().to_string()),
            dim(&format!("{bytes} bytes")),
        ));
        if format == ResultFormat::Txt {
            self.bar.set_prefix("Downloading");
            self.bar.set_message("ALTO layout…");
        }
    }

    fn on_complete(&self) {
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # OCR a JPEG
  pero-ocr -i page.jpg -oO page.txt -oA page.xml -key $PERO_API_KEY

  # TIFF input: a page.jpg next to it is uploaded instead, otherwise
  # a temporary JPEG is produced
  pero-ocr -i page.tif -oO out/page.txt -oA out/page.xml -key $PERO_API_KEY

  # Re-running is cheap: if both outputs exist the command exits at once
  pero-ocr -i page.tif -oO out/page.txt -oA out/page.xml -key $PERO_API_KEY

SUPPORTED INPUTS:
  tif, tiff, jpg, jpeg, jp2

ENVIRONMENT VARIABLES:
  PERO_API_KEY          Organisation API key (instead of -key)
  PERO_SERVER_URL       API root (default https://pero-ocr.fit.vutbr.cz/api/)
  PERO_ENGINE           OCR engine id
  PERO_POLL_INTERVAL    Seconds between result polls
  PERO_REQUEST_TIMEOUT  Per-request HTTP timeout in seconds
  PERO_WORK_DIR         Parent directory for temporary conversions
  RUST_LOG              tracing filter, overrides --verbose/--quiet
"#;

/// Submit an image to PERO OCR and download its text and ALTO results.
#[derive(Parser, Debug)]
#[command(
    name = "pero-ocr",
    version,
    about = "Submit an image to PERO OCR and download its text and ALTO results",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Input image path.
    #[arg(short = 'i', long = "image_path", alias = "image-path")]
    image_path: PathBuf,

    /// Output path for txt (also -oO).
    #[arg(long = "output_txt", alias = "output-txt")]
    output_txt: PathBuf,

    /// Output path for alto (also -oA).
    #[arg(long = "output_alto", alias = "output-alto")]
    output_alto: PathBuf,

    /// Api Key for your Organization (also -key).
    #[arg(long = "api_key", alias = "api-key", env = "PERO_API_KEY", hide_env_values = true)]
    api_key: String,

    /// API root URL.
    #[arg(long, alias = "server_url", env = "PERO_SERVER_URL", default_value = DEFAULT_SERVER_URL)]
    server_url: String,

    /// OCR engine id placed in the job description.
    #[arg(long, env = "PERO_ENGINE", default_value_t = 1)]
    engine: u32,

    /// Seconds between result polls.
    #[arg(long, alias = "poll_interval", env = "PERO_POLL_INTERVAL", default_value_t = 5)]
    poll_interval: u64,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, alias = "request_timeout", env = "PERO_REQUEST_TIMEOUT", default_value_t = 300)]
    request_timeout: u64,

    /// Parent directory for the temporary TIFF conversion.
    #[arg(long, alias = "work_dir", env = "PERO_WORK_DIR")]
    work_dir: Option<PathBuf>,

    /// Print job statistics as JSON on stdout.
    #[arg(long)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, alias = "no_progress", env = "PERO_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "PERO_VERBOSE", conflicts_with = "quiet")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "PERO_QUIET")]
    quiet: bool,
}

/// Rewrite the single-dash multi-letter flags (`-oO`, `-oA`, `-key`) that
/// existing callers pass into their long forms, which clap can parse.
///
/// Arguments that are not valid UTF-8 (paths, mostly) pass through as-is.
fn normalize_args<I>(args: I) -> Vec<OsString>
where
    I: IntoIterator<Item = OsString>,
{
    args.into_iter()
        .map(|arg| {
            let Some(text) = arg.to_str() else {
                return arg;
            };
            let (flag, value) = match text.split_once('=') {
                Some((f, v)) => (f, Some(v)),
                None => (text, None),
            };
            let long = match flag {
                "-oO" => "--output_txt",
                "-oA" => "--output_alto",
                "-key" => "--api_key",
                _ => return arg,
            };
            match value {
                Some(v) => OsString::from(format!("{long}={v}")),
                None => OsString::from(long),
            }
        })
        .collect()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse_from(normalize_args(std::env::args_os()));

    // ── Logging setup ────────────────────────────────────────────────────
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let paths = JobPaths::new(&cli.image_path, &cli.output_txt, &cli.output_alto);

    let progress_cb: Option<ProgressCallback> = if show_progress && !paths.outputs_exist() {
        Some(CliProgressCallback::new() as ProgressCallback)
    } else {
        None
    };

    let config = build_config(&cli, progress_cb)?;

    let outcome = process_image(&paths, &config)
        .await
        .with_context(|| format!("OCR of '{}' failed", cli.image_path.display()))?;

    match outcome {
        JobOutcome::AlreadyDone => {
            if cli.json {
                println!(r#"{{"status":"already_done"}}"#);
            }
        }
        JobOutcome::Completed(stats) => {
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&stats).context("Failed to serialise stats")?
                );
            } else if !cli.quiet {
                eprintln!(
                    "{}  {}  request {}  {} polls  {}ms",
                    green("✔"),
                    bold(&stats.file_name),
                    dim(&stats.request_id),
                    stats.polls,
                    stats.duration_ms,
                );
            }
        }
    }

    Ok(())
}

/// Map CLI args to `JobConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<JobConfig> {
    let mut builder = JobConfig::builder()
        .api_key(&cli.api_key)
        .server_url(&cli.server_url)
        .engine(cli.engine)
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .request_timeout_secs(cli.request_timeout);

    if let Some(ref dir) = cli.work_dir {
        builder = builder.work_dir(dir);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<OsString> {
        list.iter().map(OsString::from).collect()
    }

    #[test]
    fn legacy_flags_are_rewritten() {
        let out = normalize_args(args(&[
            "pero-ocr", "-i", "a.tif", "-oO", "a.txt", "-oA", "a.xml", "-key", "k",
        ]));
        assert_eq!(
            out,
            args(&[
                "pero-ocr",
                "-i",
                "a.tif",
                "--output_txt",
                "a.txt",
                "--output_alto",
                "a.xml",
                "--api_key",
                "k",
            ])
        );
    }

    #[test]
    fn legacy_flags_with_equals() {
        let out = normalize_args(args(&["pero-ocr", "-key=abc", "-oO=x=y.txt"]));
        assert_eq!(out, args(&["pero-ocr", "--api_key=abc", "--output_txt=x=y.txt"]));
    }

    #[test]
    fn cli_parses_legacy_invocation() {
        let cli = Cli::try_parse_from(normalize_args(args(&[
            "pero-ocr",
            "-i",
            "scan.tif",
            "-oO",
            "scan.txt",
            "-oA",
            "scan.xml",
            "-key",
            "secret",
        ])))
        .unwrap();
        assert_eq!(cli.image_path, PathBuf::from("scan.tif"));
        assert_eq!(cli.output_alto, PathBuf::from("scan.xml"));
        assert_eq!(cli.api_key, "secret");
        assert_eq!(cli.poll_interval, 5);

        let config = build_config(&cli, None).unwrap();
        assert_eq!(config.engine, 1);
        assert_eq!(config.server_url.as_str(), DEFAULT_SERVER_URL);
    }

    #[cfg(unix)]
    #[test]
    fn non_utf8_arguments_pass_through() {
        use std::os::unix::ffi::OsStringExt;

        let image = OsString::from_vec(b"scan\xe9.jpg".to_vec());
        let mut input = args(&["pero-ocr", "-i"]);
        input.push(image.clone());
        input.extend(args(&["-oO", "a.txt", "-oA", "a.xml", "-key", "k"]));

        let out = normalize_args(input);
        assert_eq!(out[2], image);
        assert_eq!(out[3], OsString::from("--output_txt"));

        let cli = Cli::try_parse_from(out).unwrap();
        assert_eq!(cli.image_path, PathBuf::from(image));
    }

    #[test]
    fn underscore_and_kebab_spellings_both_parse() {
        let cli = Cli::try_parse_from(args(&[
            "pero-ocr",
            "--image-path",
            "a.jpg",
            "--output-txt",
            "a.txt",
            "--output_alto",
            "a.xml",
            "--api-key",
            "k",
            "--server_url",
            "http://127.0.0.1:8080/api/",
            "--poll_interval",
            "2",
            "--request-timeout",
            "30",
            "--work_dir",
            "/tmp/pero",
            "--no_progress",
        ]))
        .unwrap();
        assert_eq!(cli.server_url, "http://127.0.0.1:8080/api/");
        assert_eq!(cli.poll_interval, 2);
        assert_eq!(cli.request_timeout, 30);
        assert_eq!(cli.work_dir, Some(PathBuf::from("/tmp/pero")));
        assert!(cli.no_progress);
    }

    #[test]
    fn verbose_and_quiet_conflict() {
        let err = Cli::try_parse_from(args(&[
            "pero-ocr", "-i", "a.jpg", "--output_txt", "a.txt", "--output_alto", "a.xml",
            "--api_key", "k", "--verbose", "--quiet",
        ]))
        .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ArgumentConflict);
    }

    #[test]
    fn clap_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
