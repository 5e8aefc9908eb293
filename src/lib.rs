//! # doc-compare
//!
//! Document comparison: text extraction from office files and PDFs,
//! duplicate-passage detection, metadata checks, a bounded history of
//! recent comparisons and an optional AI review of the result.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌─────────────┐   ┌─────────────┐
//! │  Extractor  │──▶│  Compare    │──▶│ AI analysis │
//! │ TXT/DOCX/.. │   │ text+props  │   │ 3 vendors   │
//! └─────────────┘   └──────┬──────┘   └─────────────┘
//!                          │
//!            ┌─────────────┴─────────────┐
//!            ▼                           ▼
//!     ┌─────────────┐             ┌─────────────┐
//!     │  Settings   │             │   History   │
//!     └──────┬──────┘             └──────┬──────┘
//!            └────────── KV store ───────┘
//!                     (SQLite / memory)
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! dcmp init                          # create the settings database
//! dcmp parse report.docx             # show extracted text and properties
//! dcmp compare a.pdf b.docx          # similarity and shared passages
//! dcmp properties a.docx b.docx      # metadata check
//! dcmp settings set apiKey sk-...    # enable AI analysis
//! dcmp compare a.pdf b.docx --analyze
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Shared data types |
//! | [`extract`] | Multi-format text and metadata extraction |
//! | [`compare`] | Text similarity and property comparison |
//! | [`analysis`] | AI vendor client |
//! | [`settings`] | Persisted user settings |
//! | [`recent`] | Recent-records history |
//! | [`storage`] | Key-value store backends and the SQLite connection |
//! | [`migrate`] | Schema creation |
//! | [`commands`] | CLI command handlers |

pub mod analysis;
pub mod commands;
pub mod compare;
pub mod config;
pub mod extract;
pub mod migrate;
pub mod models;
pub mod recent;
pub mod settings;
pub mod storage;
