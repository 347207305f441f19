//! Application configuration for chapterscrape.
//!
//! User config lives at `~/.chapterscrape/chapterscrape.toml`.
//! Environment variables override config file values, CLI flags override
//! both, and anything left unset falls back to the defaults below.

use std::path::{Path, PathBuf};
use std::time::Duration;

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use crate::error::{Result, ScrapeError};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "chapterscrape.toml";

/// Default config directory name under the user's home.
const CONFIG_DIR_NAME: &str = ".chapterscrape";

/// Environment variable names read by [`apply_env_overrides`].
pub const ENV_CHAPTER_CONCURRENCY: &str = "CHAPTERSCRAPE_CHAPTER_CONCURRENCY";
pub const ENV_PROFILE_CONCURRENCY: &str = "CHAPTERSCRAPE_PROFILE_CONCURRENCY";
pub const ENV_CHAPTER_FILTER: &str = "CHAPTERSCRAPE_CHAPTER_FILTER";
pub const ENV_OUTPUT_DIR: &str = "CHAPTERSCRAPE_OUTPUT_DIR";
pub const ENV_SPLIT_OUTPUT: &str = "CHAPTERSCRAPE_SPLIT_OUTPUT";

// ---------------------------------------------------------------------------
// Config structs (matching chapterscrape.toml schema)
// ---------------------------------------------------------------------------

/// Top-level application config, deserialized from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Concurrency, filtering and output layout.
    #[serde(default)]
    pub scrape: ScrapeSection,

    /// Per-operation timeouts and settle intervals.
    #[serde(default)]
    pub timeouts: TimeoutsConfig,

    /// Browser launch and request filtering.
    #[serde(default)]
    pub browser: BrowserSection,

    /// URL patterns recognising the site's page variants.
    #[serde(default)]
    pub patterns: PatternsConfig,
}

/// `[scrape]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeSection {
    /// Chapters scraped at the same time.
    #[serde(default = "default_chapter_concurrency")]
    pub chapter_concurrency: usize,

    /// Profile pages fetched at the same time within one chapter.
    #[serde(default = "default_profile_concurrency")]
    pub profile_concurrency: usize,

    /// Case-insensitive regex; only chapters whose name matches are scraped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chapter_filter: Option<String>,

    /// Directory receiving one JSON file per chapter.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,

    /// Write detail-page chapters and all others into separate subdirectories.
    #[serde(default)]
    pub split_output: bool,

    /// Subdirectory for chapters whose URL matches the detail pattern.
    #[serde(default = "default_detail_subdir")]
    pub detail_subdir: String,

    /// Subdirectory for every other chapter.
    #[serde(default = "default_listing_subdir")]
    pub listing_subdir: String,
}

impl Default for ScrapeSection {
    fn default() -> Self {
        Self {
            chapter_concurrency: default_chapter_concurrency(),
            profile_concurrency: default_profile_concurrency(),
            chapter_filter: None,
            output_dir: default_output_dir(),
            split_output: false,
            detail_subdir: default_detail_subdir(),
            listing_subdir: default_listing_subdir(),
        }
    }
}

fn default_chapter_concurrency() -> usize {
    2
}
fn default_profile_concurrency() -> usize {
    6
}
fn default_output_dir() -> String {
    "output".into()
}
fn default_detail_subdir() -> String {
    "detail".into()
}
fn default_listing_subdir() -> String {
    "listing".into()
}

/// `[timeouts]` section. All values are milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutsConfig {
    /// Page navigation.
    #[serde(default = "default_navigation_ms")]
    pub navigation_ms: u64,

    /// Waiting for listing-table rows while harvesting.
    #[serde(default = "default_listing_wait_ms")]
    pub listing_wait_ms: u64,

    /// Confirming the listing table after a resolution strategy acted.
    #[serde(default = "default_confirm_wait_ms")]
    pub confirm_wait_ms: u64,

    /// Waiting for a clicked control to navigate or reveal the listing.
    #[serde(default = "default_control_wait_ms")]
    pub control_wait_ms: u64,

    /// Waiting for profile section headings to render.
    #[serde(default = "default_section_wait_ms")]
    pub section_wait_ms: u64,

    /// Fixed pause after clicking the listing's "next" control.
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,

    /// Base delay of the profile navigation retry backoff.
    #[serde(default = "default_retry_base_ms")]
    pub retry_base_ms: u64,
}

impl Default for TimeoutsConfig {
    fn default() -> Self {
        Self {
            navigation_ms: default_navigation_ms(),
            listing_wait_ms: default_listing_wait_ms(),
            confirm_wait_ms: default_confirm_wait_ms(),
            control_wait_ms: default_control_wait_ms(),
            section_wait_ms: default_section_wait_ms(),
            settle_ms: default_settle_ms(),
            retry_base_ms: default_retry_base_ms(),
        }
    }
}

impl TimeoutsConfig {
    pub fn navigation(&self) -> Duration {
        Duration::from_millis(self.navigation_ms)
    }
    pub fn listing_wait(&self) -> Duration {
        Duration::from_millis(self.listing_wait_ms)
    }
    pub fn confirm_wait(&self) -> Duration {
        Duration::from_millis(self.confirm_wait_ms)
    }
    pub fn control_wait(&self) -> Duration {
        Duration::from_millis(self.control_wait_ms)
    }
    pub fn section_wait(&self) -> Duration {
        Duration::from_millis(self.section_wait_ms)
    }
    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }
    pub fn retry_base(&self) -> Duration {
        Duration::from_millis(self.retry_base_ms)
    }
}

fn default_navigation_ms() -> u64 {
    60_000
}
fn default_listing_wait_ms() -> u64 {
    60_000
}
fn default_confirm_wait_ms() -> u64 {
    8_000
}
fn default_control_wait_ms() -> u64 {
    5_000
}
fn default_section_wait_ms() -> u64 {
    5_000
}
fn default_settle_ms() -> u64 {
    400
}
fn default_retry_base_ms() -> u64 {
    1_500
}

/// `[browser]` section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BrowserSection {
    /// Run Chrome without a window.
    #[serde(default = "default_true")]
    pub headless: bool,

    /// Explicit Chrome/Chromium binary; auto-detected when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,

    /// Resource classes aborted by the request filter.
    #[serde(default = "default_blocked_resources")]
    pub blocked_resources: Vec<String>,
}

impl Default for BrowserSection {
    fn default() -> Self {
        Self {
            headless: true,
            executable: None,
            blocked_resources: default_blocked_resources(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_blocked_resources() -> Vec<String> {
    vec!["image".into(), "media".into(), "font".into()]
}

/// `[patterns]` section. Values are regexes matched against full URLs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PatternsConfig {
    /// URLs that already show the member listing.
    #[serde(default = "default_listing_pattern")]
    pub listing: String,

    /// Chapter index pages with a guessable listing sibling.
    #[serde(default = "default_index_pattern")]
    pub index: String,

    /// Replacement applied to the `index` match to guess the listing URL.
    #[serde(default = "default_index_replacement")]
    pub index_replacement: String,

    /// Chapter detail pages (also drives the output split).
    #[serde(default = "default_detail_pattern")]
    pub detail: String,

    /// Labels of tabs, buttons and links that open the member listing.
    #[serde(default = "default_control_labels")]
    pub control_labels: Vec<String>,

    /// Element texts that must match exactly during the broad DOM scan.
    #[serde(default = "default_exact_labels")]
    pub exact_labels: Vec<String>,

    /// Case-insensitive fragments accepted by the loose DOM scan.
    #[serde(default = "default_loose_labels")]
    pub loose_labels: Vec<String>,
}

impl Default for PatternsConfig {
    fn default() -> Self {
        Self {
            listing: default_listing_pattern(),
            index: default_index_pattern(),
            index_replacement: default_index_replacement(),
            detail: default_detail_pattern(),
            control_labels: default_control_labels(),
            exact_labels: default_exact_labels(),
            loose_labels: default_loose_labels(),
        }
    }
}

fn default_listing_pattern() -> String {
    r"/memberlist".into()
}
fn default_index_pattern() -> String {
    r"/index(?:\.[a-z]+)?".into()
}
fn default_index_replacement() -> String {
    "/memberlist".into()
}
fn default_detail_pattern() -> String {
    r"/chapterdetail".into()
}

fn labels(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
fn default_control_labels() -> Vec<String> {
    labels(&[
        "Member List",
        "MEMBER LIST",
        "Member list",
        "Members",
        "MEMBERS",
        "Our Members",
        "View Members",
    ])
}
fn default_exact_labels() -> Vec<String> {
    labels(&["Members", "Member List"])
}
fn default_loose_labels() -> Vec<String> {
    labels(&[
        "member list",
        "memberlist",
        "members",
        "our members",
        "view members",
        "chapter members",
        "member directory",
    ])
}

// ---------------------------------------------------------------------------
// Run config (runtime, merged from config + env + CLI flags)
// ---------------------------------------------------------------------------

/// Output directory layout.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    /// Root output directory.
    pub root: PathBuf,
    /// `Some((detail, other))` when the detail/other split is enabled.
    pub split: Option<(String, String)>,
}

/// Runtime configuration with validated limits and compiled patterns.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub chapter_concurrency: usize,
    pub profile_concurrency: usize,
    pub chapter_filter: Option<Regex>,
    pub output: OutputLayout,
    pub timeouts: TimeoutsConfig,
    pub patterns: PatternsConfig,
    pub blocked_resources: Vec<String>,
}

impl RunConfig {
    /// Validate `config` and compile its filter.
    pub fn from_app(config: &AppConfig) -> Result<Self> {
        if config.scrape.chapter_concurrency == 0 {
            return Err(ScrapeError::config("chapter_concurrency must be at least 1"));
        }
        if config.scrape.profile_concurrency == 0 {
            return Err(ScrapeError::config("profile_concurrency must be at least 1"));
        }

        let chapter_filter = config
            .scrape
            .chapter_filter
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .map(compile_filter)
            .transpose()?;

        if config.patterns.control_labels.is_empty() && config.patterns.loose_labels.is_empty() {
            tracing::warn!("no listing control labels configured; only URL strategies will run");
        }

        for (name, pattern) in [
            ("listing", &config.patterns.listing),
            ("index", &config.patterns.index),
            ("detail", &config.patterns.detail),
        ] {
            Regex::new(pattern).map_err(|e| {
                ScrapeError::config(format!("invalid {name} pattern '{pattern}': {e}"))
            })?;
        }

        let split = config.scrape.split_output.then(|| {
            (
                config.scrape.detail_subdir.clone(),
                config.scrape.listing_subdir.clone(),
            )
        });

        Ok(Self {
            chapter_concurrency: config.scrape.chapter_concurrency,
            profile_concurrency: config.scrape.profile_concurrency,
            chapter_filter,
            output: OutputLayout {
                root: PathBuf::from(&config.scrape.output_dir),
                split,
            },
            timeouts: config.timeouts.clone(),
            patterns: config.patterns.clone(),
            blocked_resources: config.browser.blocked_resources.clone(),
        })
    }
}

/// Compile a chapter-name filter as a case-insensitive regex.
pub fn compile_filter(pattern: &str) -> Result<Regex> {
    RegexBuilder::new(pattern)
        .case_insensitive(true)
        .build()
        .map_err(|e| ScrapeError::config(format!("invalid chapter filter '{pattern}': {e}")))
}

// ---------------------------------------------------------------------------
// Environment overrides
// ---------------------------------------------------------------------------

/// Apply `CHAPTERSCRAPE_*` overrides using `lookup` to read variables.
///
/// Empty values are ignored. Malformed numbers and booleans are config errors.
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F) -> Result<()>
where
    F: Fn(&str) -> Option<String>,
{
    let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(v) = read(ENV_CHAPTER_CONCURRENCY) {
        config.scrape.chapter_concurrency = parse_usize(ENV_CHAPTER_CONCURRENCY, &v)?;
    }
    if let Some(v) = read(ENV_PROFILE_CONCURRENCY) {
        config.scrape.profile_concurrency = parse_usize(ENV_PROFILE_CONCURRENCY, &v)?;
    }
    if let Some(v) = read(ENV_CHAPTER_FILTER) {
        config.scrape.chapter_filter = Some(v);
    }
    if let Some(v) = read(ENV_OUTPUT_DIR) {
        config.scrape.output_dir = v;
    }
    if let Some(v) = read(ENV_SPLIT_OUTPUT) {
        config.scrape.split_output = parse_bool(ENV_SPLIT_OUTPUT, &v)?;
    }
    Ok(())
}

/// Apply overrides from the process environment.
pub fn apply_process_env(config: &mut AppConfig) -> Result<()> {
    apply_env_overrides(config, |name| std::env::var(name).ok())
}

fn parse_usize(name: &str, value: &str) -> Result<usize> {
    value
        .trim()
        .parse()
        .map_err(|_| ScrapeError::config(format!("{name} must be a positive integer, got '{value}'")))
}

fn parse_bool(name: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ScrapeError::config(format!(
            "{name} must be a boolean, got '{value}'"
        ))),
    }
}

// ---------------------------------------------------------------------------
// Config loading
// ---------------------------------------------------------------------------

/// Get the path to the config directory (`~/.chapterscrape/`).
pub fn config_dir() -> Result<PathBuf> {
    let home = dirs::home_dir()
        .ok_or_else(|| ScrapeError::config("could not determine home directory"))?;
    Ok(home.join(CONFIG_DIR_NAME))
}

/// Get the path to the config file (`~/.chapterscrape/chapterscrape.toml`).
pub fn config_file_path() -> Result<PathBuf> {
    Ok(config_dir()?.join(CONFIG_FILE_NAME))
}

/// Load the application config from disk. Returns defaults if the file does not exist.
pub fn load_config() -> Result<AppConfig> {
    let path = config_file_path()?;

    if !path.exists() {
        tracing::debug!(?path, "config file not found, using defaults");
        return Ok(AppConfig::default());
    }

    load_config_from(&path)
}

/// Load the application config from a specific file path.
pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    let content = std::fs::read_to_string(path).map_err(|e| ScrapeError::io(path, e))?;

    toml::from_str(&content)
        .map_err(|e| ScrapeError::config(format!("failed to parse {}: {e}", path.display())))
}

/// Create the config directory and write a default config file.
/// Returns the path to the created file.
pub fn init_config() -> Result<PathBuf> {
    let dir = config_dir()?;
    std::fs::create_dir_all(&dir).map_err(|e| ScrapeError::io(&dir, e))?;

    let path = dir.join(CONFIG_FILE_NAME);
    let config = AppConfig::default();
    let content =
        toml::to_string_pretty(&config).map_err(|e| ScrapeError::config(e.to_string()))?;

    std::fs::write(&path, content).map_err(|e| ScrapeError::io(&path, e))?;
    tracing::info!(?path, "created default config file");

    Ok(path)
}
