//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use chapterscrape_browser::ChromiumEngine;
use chapterscrape_core::{Orchestrator, ProgressReporter};
use chapterscrape_shared::{
    AppConfig, Chapter, ChapterOutcome, RunConfig, RunSummary, apply_process_env, init_config,
    load_config, load_config_from,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::info;

use crate::chapters;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// chapterscrape — member directories from chapter pages.
#[derive(Parser)]
#[command(
    name = "chapterscrape",
    version,
    about = "Scrape chapter member directories into one JSON file per chapter.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file to use instead of ~/.chapterscrape/chapterscrape.toml.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Scrape every chapter in a chapter list.
    Run(RunArgs),

    /// Chapter-list utilities.
    Chapters {
        #[command(subcommand)]
        action: ChaptersAction,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Flags for `run`. Each one overrides the config file and environment.
#[derive(Args, Debug, Default)]
pub(crate) struct RunArgs {
    /// Chapter list: a JSON array of {name, url} or pasted text.
    pub chapters: PathBuf,

    /// Chapters scraped at the same time.
    #[arg(long)]
    pub chapter_concurrency: Option<usize>,

    /// Profiles fetched at the same time within one chapter.
    #[arg(long)]
    pub profile_concurrency: Option<usize>,

    /// Only scrape chapters whose name matches this regex (case-insensitive).
    #[arg(short, long)]
    pub filter: Option<String>,

    /// Output directory.
    #[arg(short, long)]
    pub out: Option<String>,

    /// Split output into detail and listing subdirectories.
    #[arg(long)]
    pub split: bool,

    /// Show the browser window.
    #[arg(long)]
    pub headful: bool,
}

/// Chapter-list subcommands.
#[derive(Subcommand)]
pub(crate) enum ChaptersAction {
    /// Turn pasted text into a JSON chapter list.
    Parse {
        /// Text file with chapter names and URLs.
        input: PathBuf,

        /// Where to write the JSON list (stdout when omitted).
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Initialize config file with defaults.
    Init,
    /// Show resolved configuration.
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "chapterscrape=info",
        1 => "chapterscrape=debug",
        _ => "chapterscrape=trace",
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config_path = cli.config.as_deref();
    match cli.command {
        Command::Run(args) => cmd_run(config_path, &args).await,
        Command::Chapters { action } => match action {
            ChaptersAction::Parse { input, out } => cmd_chapters_parse(&input, out.as_deref()),
        },
        Command::Config { action } => match action {
            ConfigAction::Init => cmd_config_init(),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    }
}

/// Defaults < file < environment.
fn resolve_config(config_path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match config_path {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    apply_process_env(&mut config)?;
    Ok(config)
}

/// CLI flags override everything else.
fn apply_flags(config: &mut AppConfig, args: &RunArgs) {
    if let Some(n) = args.chapter_concurrency {
        config.scrape.chapter_concurrency = n;
    }
    if let Some(n) = args.profile_concurrency {
        config.scrape.profile_concurrency = n;
    }
    if let Some(filter) = &args.filter {
        config.scrape.chapter_filter = Some(filter.clone());
    }
    if let Some(out) = &args.out {
        config.scrape.output_dir = out.clone();
    }
    if args.split {
        config.scrape.split_output = true;
    }
    if args.headful {
        config.browser.headless = false;
    }
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_run(config_path: Option<&Path>, args: &RunArgs) -> Result<()> {
    let mut config = resolve_config(config_path)?;
    apply_flags(&mut config, args);
    let run_config = RunConfig::from_app(&config)?;

    let list = chapters::load(&args.chapters)?;
    for skipped in &list.skipped {
        info!(name = %skipped.name, url = %skipped.url, reason = skipped.reason, "chapter dropped");
    }
    if list.chapters.is_empty() {
        return Err(eyre!(
            "no usable chapters in '{}'",
            args.chapters.display()
        ));
    }

    let orchestrator = Orchestrator::new(run_config)?;
    let engine = ChromiumEngine::launch(&config.browser).await?;

    info!(
        chapters = list.chapters.len(),
        output = %config.scrape.output_dir,
        "starting scrape"
    );

    let reporter = CliProgress::new();
    let summary = orchestrator.run(&engine, &list.chapters, &reporter).await;
    engine.shutdown().await?;

    print_summary(&summary);
    Ok(())
}

fn print_summary(summary: &RunSummary) {
    println!();
    for outcome in &summary.outcomes {
        match outcome {
            ChapterOutcome::Written {
                chapter,
                path,
                members,
                degraded,
            } => println!(
                "  ok    {chapter}: {members} members ({degraded} degraded) -> {}",
                path.display()
            ),
            ChapterOutcome::Skipped { chapter, reason } => {
                println!("  skip  {chapter}: {reason}")
            }
        }
    }
    println!();
    println!("  Written:  {}", summary.written_count());
    println!("  Skipped:  {}", summary.skipped_count());
    if summary.filtered_out > 0 {
        println!("  Filtered: {}", summary.filtered_out);
    }
    println!(
        "  Started:  {}",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
    println!("  Time:     {:.1}s", summary.elapsed.as_secs_f64());
    println!();
}

fn cmd_chapters_parse(input: &Path, out: Option<&Path>) -> Result<()> {
    let list = chapters::load(input)?;
    let json = serde_json::to_string_pretty(&list.chapters)?;

    match out {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))?;
            eprintln!("Found URLs: {}", list.found);
            eprintln!("Wrote chapters: {} -> {}", list.chapters.len(), path.display());
        }
        None => println!("{json}"),
    }

    if !list.skipped.is_empty() {
        eprintln!("\nSkipped:");
        for s in &list.skipped {
            eprintln!("- {}: {} ({})", s.name, s.url, s.reason);
        }
    }
    Ok(())
}

fn cmd_config_init() -> Result<()> {
    let path = init_config()?;
    println!("Config initialized at: {}", path.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let config = resolve_config(config_path)?;
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg}")
                .unwrap()
                .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]),
        );
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }
}

impl ProgressReporter for CliProgress {
    fn chapter_started(&self, chapter: &Chapter) {
        self.spinner
            .set_message(format!("[{}] resolving member listing", chapter.name));
    }

    fn members_found(&self, chapter: &str, count: usize) {
        self.spinner
            .set_message(format!("[{chapter}] {count} members found"));
    }

    fn profile_done(&self, chapter: &str, done: usize, total: usize) {
        self.spinner
            .set_message(format!("[{chapter}] profiles {done}/{total}"));
    }

    fn chapter_finished(&self, outcome: &ChapterOutcome) {
        let line = match outcome {
            ChapterOutcome::Written { chapter, members, .. } => {
                format!("done  {chapter} ({members} members)")
            }
            ChapterOutcome::Skipped { chapter, .. } => format!("skip  {chapter}"),
        };
        self.spinner.println(line);
    }

    fn done(&self, _summary: &RunSummary) {
        self.spinner.finish_and_clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config() {
        let mut config = AppConfig::default();
        config.scrape.chapter_filter = Some("elite".into());

        let args = RunArgs {
            chapters: PathBuf::from("chapters.json"),
            chapter_concurrency: Some(4),
            filter: Some("azpire".into()),
            split: true,
            headful: true,
            ..RunArgs::default()
        };
        apply_flags(&mut config, &args);

        assert_eq!(config.scrape.chapter_concurrency, 4);
        assert_eq!(config.scrape.profile_concurrency, 6);
        assert_eq!(config.scrape.chapter_filter.as_deref(), Some("azpire"));
        assert!(config.scrape.split_output);
        assert!(!config.browser.headless);
        assert_eq!(config.scrape.output_dir, "output");
    }

    #[test]
    fn cli_parses_run_flags() {
        let cli = Cli::try_parse_from([
            "chapterscrape",
            "-vv",
            "run",
            "chapters.txt",
            "--profile-concurrency",
            "3",
            "--out",
            "dump",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        match cli.command {
            Command::Run(args) => {
                assert_eq!(args.chapters, PathBuf::from("chapters.txt"));
                assert_eq!(args.profile_concurrency, Some(3));
                assert_eq!(args.out.as_deref(), Some("dump"));
                assert!(!args.split);
            }
            _ => panic!("expected run"),
        }
    }
}
