//! Shared types, error model, and configuration for chapterscrape.
//!
//! This crate is the foundation depended on by all other chapterscrape crates.
//! It provides:
//! - [`ScrapeError`] — the unified error type
//! - Domain types ([`Chapter`], [`MemberStub`], [`MemberProfile`], [`RunSummary`])
//! - Configuration ([`AppConfig`], [`RunConfig`], config loading, env overrides)

pub mod config;
pub mod error;
pub mod types;

// Re-export public API at crate root for ergonomic imports.
pub use config::{
    AppConfig, BrowserSection, OutputLayout, PatternsConfig, RunConfig, ScrapeSection,
    TimeoutsConfig, apply_env_overrides, apply_process_env, compile_filter, config_dir,
    config_file_path, init_config, load_config, load_config_from,
};
pub use error::{Result, ScrapeError};
pub use types::{
    Chapter, ChapterOutcome, ChapterResult, MemberProfile, MemberStub, RunSummary, SectionField,
    strip_fragment,
};
