//! CLI entry point for `eml2html`.

use std::path::PathBuf;
use std::time::Instant;

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use eml2html::convert::{ConvertOptions, Converter, UnresolvedRemote};

#[derive(Parser)]
#[command(
    name = "eml2html",
    version,
    about = "Convert .eml email files into self-contained HTML documents"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// .eml files to convert (defaults to *.eml in the current directory)
    #[arg(value_name = "FILE")]
    eml: Vec<PathBuf>,

    /// Download remote media referenced by http(s) URLs
    #[arg(short, long)]
    download_remote: bool,

    /// Storage dir of downloaded media
    #[arg(long, value_name = "DIR")]
    media_dir: Option<PathBuf>,

    /// Storage dir of extracted attachments
    #[arg(long, value_name = "DIR")]
    attachment_dir: Option<PathBuf>,

    /// What to do with remote references that stay unresolved: keep, remove
    #[arg(long, value_name = "POLICY")]
    unresolved_remote: Option<UnresolvedRemote>,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Print program information
    #[arg(long)]
    about: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration
    let config = eml2html::config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Some(Commands::Completions { shell }) => return cmd_completions(shell),
        Some(Commands::Manpage) => return cmd_manpage(),
        None => {}
    }

    if cli.about {
        return cmd_about();
    }

    let options = ConvertOptions {
        download_remote: cli.download_remote || config.fetch.download_remote,
        verbose: cli.verbose > 0,
        media_dir: cli
            .media_dir
            .unwrap_or_else(|| config.output.media_dir.clone()),
        attachment_dir: cli
            .attachment_dir
            .unwrap_or_else(|| config.output.attachment_dir.clone()),
        unresolved_remote: match cli.unresolved_remote {
            Some(policy) => policy,
            None => config.fetch.unresolved_remote.parse().unwrap_or_else(|e: String| {
                tracing::warn!(error = %e, "Invalid unresolved_remote in config, using 'keep'");
                UnresolvedRemote::default()
            }),
        },
        user_agent: config.fetch.user_agent.clone(),
    };

    let inputs = resolve_inputs(cli.eml)?;
    cmd_convert(inputs, options).await
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &eml2html::config::Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = eml2html::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender = tracing_appender::rolling::never(&log_dir, "eml2html.log");
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Positional arguments, or every `.eml` in the current directory.
fn resolve_inputs(given: Vec<PathBuf>) -> anyhow::Result<Vec<PathBuf>> {
    if !given.is_empty() {
        return Ok(given);
    }

    let mut found: Vec<PathBuf> = std::fs::read_dir(".")?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .is_some_and(|ext| ext.eq_ignore_ascii_case("eml"))
        })
        .collect();
    found.sort();

    if found.is_empty() {
        anyhow::bail!("no .eml file given");
    }
    Ok(found)
}

/// Convert every input, continuing past per-message errors.
async fn cmd_convert(inputs: Vec<PathBuf>, options: ConvertOptions) -> anyhow::Result<()> {
    let verbose = options.verbose;
    let converter = Converter::new(options)?;

    let pb = (inputs.len() > 1 && !verbose).then(|| {
        let pb = ProgressBar::new(inputs.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} Converting [{bar:40.cyan/blue}] {pos}/{len}")
                .expect("valid template")
                .progress_chars("#>-"),
        );
        pb
    });

    let start = Instant::now();
    let mut converted = 0usize;
    let mut warnings = 0usize;
    let mut failed = 0usize;

    for eml in &inputs {
        tracing::info!(file = %eml.display(), "Converting");
        match converter.convert_file(eml).await {
            Ok(conversion) => {
                converted += 1;
                warnings += conversion.warnings.len();
            }
            Err(e) if e.is_fatal() => {
                if let Some(pb) = &pb {
                    pb.finish_and_clear();
                }
                return Err(e.into());
            }
            Err(e) => {
                tracing::error!(file = %eml.display(), error = %e, "Conversion failed");
                failed += 1;
            }
        }
        if let Some(pb) = &pb {
            pb.inc(1);
        }
    }

    if let Some(pb) = &pb {
        pb.finish_and_clear();
    }

    let elapsed = start.elapsed();
    println!();
    println!("  {:<20} {}", "Converted", converted);
    println!("  {:<20} {}", "Warnings", warnings);
    if failed > 0 {
        println!("  {:<20} {}", "Failed", failed);
    }
    println!("  {:<20} {:.2?}", "Time", elapsed);
    println!();

    if failed > 0 {
        anyhow::bail!("{} of {} file(s) failed", failed, inputs.len());
    }
    Ok(())
}

/// Print program information.
fn cmd_about() -> anyhow::Result<()> {
    println!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION"));
    println!("{}", env!("CARGO_PKG_DESCRIPTION"));
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "eml2html", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::Write::write_all(&mut std::io::stdout(), &buf)?;
    Ok(())
}
