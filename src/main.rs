//! CLI entry point for `mailgist`.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::{Duration, Instant};

use clap::{CommandFactory, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use mailgist::backend;
use mailgist::config::{self, BackendKind, Config};
use mailgist::generation::Generator;
use mailgist::parser::eml::{parse_eml, read_input};
use mailgist::router::Interpreter;

#[derive(Parser)]
#[command(
    name = "mailgist",
    version,
    about = "Classify an email and extract its key facts with a generative backend"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Generation backend, overriding the configuration file
    #[arg(long, value_enum, env = "MAILGIST_BACKEND", global = true)]
    backend: Option<BackendKind>,
}

#[derive(Subcommand)]
enum Commands {
    /// Classify an email and extract the fields of its category, as JSON
    Interpret {
        /// RFC 822 email file, or `-` for stdin
        #[arg(value_name = "FILE")]
        path: PathBuf,
        /// Print the JSON on a single line
        #[arg(long)]
        compact: bool,
    },
    /// Print the canonical text the backend would see
    Canonicalize {
        /// RFC 822 email file, or `-` for stdin
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Parse a raw chat transcript and print its turns as JSON
    Transcript {
        /// Transcript log, or `-` for stdin
        #[arg(value_name = "FILE")]
        path: PathBuf,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> ExitCode {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    // Load configuration
    let config = config::load_config();

    // Configure logging: stderr + optional log file
    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    let result = match cli.command {
        Commands::Interpret { path, compact } => cmd_interpret(&path, compact, cli.backend, &config),
        Commands::Canonicalize { path } => cmd_canonicalize(&path),
        Commands::Transcript { path } => cmd_transcript(&path, &config),
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            let client_error = e
                .downcast_ref::<mailgist::Error>()
                .is_some_and(mailgist::Error::is_client_error);
            if client_error {
                ExitCode::from(2)
            } else {
                ExitCode::FAILURE
            }
        }
    }
}

fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    // Try to set up file logging
    let log_dir = config::cache_dir(config);
    let log_path = config::log_file_path(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender =
            tracing_appender::rolling::never(&log_dir, log_path.file_name().unwrap_or_default());
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

/// Run the whole pipeline on one email and print the result.
fn cmd_interpret(
    path: &Path,
    compact: bool,
    kind: Option<BackendKind>,
    config: &Config,
) -> anyhow::Result<()> {
    let document = parse_eml(path)?;
    let backend = backend::from_config(config, kind)?;
    let generator = Generator::new(backend).with_max_attempts(config.generation.max_attempts);
    let interpreter = Interpreter::with_generator(generator);

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg} ({elapsed})")
            .expect("valid template"),
    );
    spinner.set_message(format!("Interpreting \"{}\"", document.subject()));
    spinner.enable_steady_tick(Duration::from_millis(100));

    let start = Instant::now();
    let result = interpreter.interpret_document(&document);
    spinner.finish_and_clear();
    let result = result?;
    tracing::info!(elapsed_ms = start.elapsed().as_millis() as u64, "Interpretation done");

    let json = if compact {
        serde_json::to_string(&result)?
    } else {
        serde_json::to_string_pretty(&result)?
    };
    println!("{json}");
    Ok(())
}

/// Print the canonical rendering of an email.
fn cmd_canonicalize(path: &Path) -> anyhow::Result<()> {
    let document = parse_eml(path)?;
    let mut stdout = std::io::stdout().lock();
    stdout.write_all(document.canonical_text().as_bytes())?;
    writeln!(stdout)?;
    Ok(())
}

/// Parse a transcript with the configured markers.
fn cmd_transcript(path: &Path, config: &Config) -> anyhow::Result<()> {
    let raw = read_input(path)?;
    let text = String::from_utf8_lossy(&raw);
    let transcript = config.local_command.markers.parse(&text)?;
    println!("{}", serde_json::to_string_pretty(&transcript)?);
    Ok(())
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailgist", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}
