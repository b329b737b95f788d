//! # tomes - resource-aware document translation
//!
//! `tomes` translates long, hierarchical documents (books) with local or
//! remote LLMs. It picks a model that fits the host's memory, admits every
//! call through a per-session rate limiter, answers repeated texts from a
//! persistent cache and records each run as a resumable session.
//!
//! ## Pipeline
//!
//! ```text
//! hardware ──► models ──► translator (ratelimit ─► storage cache ─► LLM backend)
//!                                    ▲
//!                  orchestrator ─────┘──► storage sessions, events
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! # What can this machine run?
//! tomes hardware
//! tomes models --recommend --lang sr
//!
//! # Translate a document tree to Serbian
//! tomes translate book.json --to sr -o book.sr.json
//!
//! # Inspect past runs
//! tomes sessions
//! tomes stats
//! ```
//!
//! ## Configuration
//!
//! Settings are stored in `~/.config/tomes/config.toml`:
//!
//! ```toml
//! [tomes]
//! provider = "ollama"
//! to = "sr"
//!
//! [providers.ollama]
//! endpoint = "http://localhost:11434"
//!
//! [storage]
//! backend = "sqlite"
//! ```

/// Command-line interface definitions and handlers.
pub mod cli;

/// Configuration file management and provider settings.
pub mod config;

/// The document tree the orchestrator walks.
pub mod document;

pub mod error;

/// Progress events and the broadcast bus.
pub mod events;

/// File system utilities.
pub mod fs;

/// Host capability detection.
pub mod hardware;

/// Language table and detection.
pub mod language;

pub mod logging;

/// Model catalog and selection.
pub mod models;

/// Document-level translation driver.
pub mod orchestrator;

/// Global output configuration (quiet mode, colors, stderr/stdout routing).
pub mod output;

/// XDG-style path utilities for configuration and data.
pub mod paths;

/// Per-key rate limiting.
pub mod ratelimit;

/// Sessions and the translation cache.
pub mod storage;

/// Translators and LLM backends.
pub mod translator;

/// Terminal UI components (spinner, progress bar, colors).
pub mod ui;

pub use error::{Error, Result};
