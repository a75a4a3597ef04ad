//! crpt: password-based file encryption
//!
//! Commands:
//!   encrypt <paths..>   - encrypt files or directories, writing `<name>.crpt` beside each
//!   decrypt <paths..>   - decrypt `.crpt` files back to their stored names
//!   config show         - display current configuration
//!
//! The password is read from CRPT_PASSWORD, or prompted for on the terminal.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use zeroize::Zeroizing;

use crpt_batch::{run_batch, BatchOptions, FileWalker, ProgressFn};
use crpt_core::config::CrptConfig;
use crpt_core::types::{BatchReport, Direction, FileOutcome, FileStatus};
use crpt_crypto::CipherContext;

/// Environment variable holding the password for non-interactive use
const PASSWORD_ENV: &str = "CRPT_PASSWORD";

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "crpt",
    version,
    about = "Password-based file encryption",
    long_about = "crpt: encrypt and decrypt files and directory trees with a password"
)]
struct Cli {
    /// Path to crpt.toml configuration file
    #[arg(long, short = 'c', env = "CRPT_CONFIG", default_value = "crpt.toml")]
    config: PathBuf,

    /// Log level (trace, debug, info, warn, error); overrides the config file
    #[arg(long, env = "CRPT_LOG", global = true)]
    log: Option<String>,

    /// Log format; overrides the config file
    #[arg(long, env = "CRPT_LOG_FORMAT", global = true)]
    log_format: Option<LogFormat>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Debug, ValueEnum)]
enum LogFormat {
    Json,
    Text,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Encrypt files, or every file in the given directories
    Encrypt {
        #[command(flatten)]
        batch: BatchArgs,

        /// Name outputs after a one-way digest of the source path
        #[arg(long)]
        hide_names: bool,
    },

    /// Decrypt files produced by `crpt encrypt`
    Decrypt {
        #[command(flatten)]
        batch: BatchArgs,

        /// Keep decrypted output even when its checksum does not match
        #[arg(long)]
        keep_corrupt: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Args, Debug)]
struct BatchArgs {
    /// Files or directories to process
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Descend into subdirectories
    #[arg(long, short = 'r')]
    recursive: bool,

    /// Delete each source file once it has been processed
    #[arg(long)]
    delete_source: bool,

    /// Overwrite existing outputs instead of skipping them
    #[arg(long)]
    overwrite: bool,

    /// Files processed concurrently (0 = one per CPU)
    #[arg(long, short = 'w')]
    workers: Option<usize>,

    /// Skip directory entries whose name matches this glob (repeatable)
    #[arg(long = "exclude", value_name = "GLOB")]
    exclude: Vec<String>,
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    let mut config = load_config(&cli.config)?;

    let level = cli.log.clone().unwrap_or_else(|| config.log.level.clone());
    let format = cli.log_format.clone().unwrap_or(match config.log.format.as_str() {
        "json" => LogFormat::Json,
        _ => LogFormat::Text,
    });
    init_logging(&level, &format);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        config = %cli.config.display(),
        "crpt starting"
    );

    match cli.command {
        Commands::Config { action: ConfigAction::Show } => {
            cmd_config_show(&config, &cli.config)?;
            Ok(ExitCode::SUCCESS)
        }
        Commands::Encrypt { batch, hide_names } => {
            config.batch.hide_names |= hide_names;
            apply_batch_args(&mut config, &batch);
            cmd_batch(&config, Direction::Encrypt, &batch.paths).await
        }
        Commands::Decrypt { batch, keep_corrupt } => {
            config.batch.keep_corrupt |= keep_corrupt;
            apply_batch_args(&mut config, &batch);
            cmd_batch(&config, Direction::Decrypt, &batch.paths).await
        }
    }
}

// ── Config loading ────────────────────────────────────────────────────────────

fn load_config(path: &Path) -> Result<CrptConfig> {
    CrptConfig::load(path).with_context(|| format!("loading config: {}", path.display()))
}

/// Command-line flags win over the config file.
fn apply_batch_args(config: &mut CrptConfig, args: &BatchArgs) {
    config.batch.recursive |= args.recursive;
    config.batch.delete_source |= args.delete_source;
    config.batch.overwrite |= args.overwrite;
    if let Some(workers) = args.workers {
        config.batch.workers = workers;
    }
    config
        .batch
        .exclude_patterns
        .extend(args.exclude.iter().cloned());
}

fn init_logging(level: &str, format: &LogFormat) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        LogFormat::Text => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Password ──────────────────────────────────────────────────────────────────

/// Password from the environment, else from a hidden prompt.
///
/// Encryption asks twice so a typo cannot lock the files away.
fn read_password(direction: Direction) -> Result<SecretString> {
    if let Ok(password) = std::env::var(PASSWORD_ENV) {
        if !password.is_empty() {
            return Ok(SecretString::from(password));
        }
    }

    let prompt = match direction {
        Direction::Encrypt => "Choose a password: ",
        Direction::Decrypt => "Password: ",
    };
    let password = SecretString::from(
        rpassword::prompt_password(prompt).context("reading password from terminal")?,
    );

    if direction == Direction::Encrypt {
        if password.expose_secret().is_empty() {
            anyhow::bail!("refusing to encrypt with an empty password");
        }
        let confirm = Zeroizing::new(
            rpassword::prompt_password("Confirm password: ")
                .context("reading password from terminal")?,
        );
        if confirm.as_str() != password.expose_secret() {
            anyhow::bail!("passwords do not match");
        }
    }

    Ok(password)
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        pb.set_style(style.progress_chars("=>-"));
    }
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ── `crpt encrypt` / `crpt decrypt` ───────────────────────────────────────────

async fn cmd_batch(config: &CrptConfig, direction: Direction, paths: &[PathBuf]) -> Result<ExitCode> {
    let walker = FileWalker::new(paths)
        .recursive(config.batch.recursive)
        .exclude(&config.batch.exclude_patterns)
        .context("building file list")?;

    let counter = walker.clone();
    let (files, bytes) = tokio::task::spawn_blocking(move || counter.tally())
        .await
        .context("counting files")?;
    println!("{files} file(s) found, {}.", fmt_bytes(bytes));
    if files == 0 {
        println!("Nothing to do.");
    }

    let password = read_password(direction)?;
    let ctx = Arc::new(CipherContext::from_password(&password));
    drop(password);

    let options = BatchOptions::from_config(direction, config);
    let verb = match direction {
        Direction::Encrypt => "encrypt",
        Direction::Decrypt => "decrypt",
    };

    let pb = make_progress_bar(files as u64, verb);
    let pb_clone = pb.clone();
    let progress: ProgressFn = Box::new(move |outcome: &FileOutcome| {
        pb_clone.inc(1);
        if let Some(name) = outcome.source.file_name() {
            pb_clone.set_message(name.to_string_lossy().into_owned());
        }
    });

    let report = run_batch(ctx, &walker, &options, Some(&progress))
        .await
        .with_context(|| format!("running {verb} batch"))?;
    pb.finish_and_clear();

    print_summary(&report);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn print_summary(report: &BatchReport) {
    for outcome in &report.outcomes {
        match outcome.status {
            FileStatus::Failed => eprintln!(
                "  failed: {}: {}",
                outcome.source.display(),
                outcome.error.as_deref().unwrap_or("unknown error")
            ),
            FileStatus::CorruptKept => eprintln!(
                "  corrupt (kept): {}",
                outcome
                    .output
                    .as_deref()
                    .unwrap_or(&outcome.source)
                    .display()
            ),
            FileStatus::Skipped => println!(
                "  skipped (output exists): {}",
                outcome.source.display()
            ),
            FileStatus::Done => {}
        }
    }

    let secs = report.elapsed.as_secs_f64();
    println!();
    println!("All done.");
    println!(
        "  processed: {} file(s) ({})",
        report.processed(),
        fmt_bytes(report.total_bytes)
    );
    println!("  failed:    {}", report.failed());
    println!("  skipped:   {}", report.skipped());
    println!("  elapsed:   {secs:.1} s");
    if secs > 0.0 {
        println!(
            "  rate:      {:.2} files/s, {}/s",
            report.outcomes.len() as f64 / secs,
            fmt_bytes((report.total_bytes as f64 / secs) as u64)
        );
    }
}

// ── `crpt config show` ────────────────────────────────────────────────────────

fn cmd_config_show(config: &CrptConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
