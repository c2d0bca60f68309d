//! MemoLog - Personal memo log embedded in plain-text files
//!
//! Memos live as blocks inside ordinary Markdown files: a one-line HTML
//! comment header carrying the metadata, followed by a date-templated body
//! and an optional attachment line. The files stay readable and editable by
//! hand; MemoLog only ever rewrites the blocks it owns.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                         MemoLog                           │
//! │  ┌───────────────┐  ┌────────────────┐  ┌─────────────┐  │
//! │  │   MemoCache   │  │ ThreadIndex-   │  │  MemoStore  │  │
//! │  │ (LRU + mtime) │  │     Cache      │  │ (pure CRUD) │  │
//! │  └───────────────┘  └────────────────┘  └──────┬──────┘  │
//! │                                                │         │
//! │                                  ┌─────────────▼──────┐  │
//! │                                  │  codec / header /  │  │
//! │                                  │     template       │  │
//! │                                  └────────────────────┘  │
//! └────────────────────────────┬─────────────────────────────┘
//!                              │ read → compute → write (per-unit lock)
//! ┌────────────────────────────▼─────────────────────────────┐
//! │             StorageBackend (FsBackend / Memory)           │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Block format
//!
//! ```text
//! <!-- id:0190..., ts:2025-01-01T10:00:00Z, category:"work" -->
//! ## 2025-01-01 10:00
//! hello
//! [[photo.png]]
//! ```
//!
//! ## Modules
//!
//! - [`memo`]: records, codec, pure store, thread index and visibility rules
//! - [`cache`]: bounded LRU cache and the modification-time cache policy
//! - [`storage`]: storage backends and per-unit locking
//! - [`engine`]: the `MemoLog` engine tying them together
//! - [`config`]: configuration management

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod memo;
pub mod storage;

pub use config::MemoLogConfig;
pub use engine::{MemoLog, MemoLogBuilder};
pub use error::{Error, Result};
pub use memo::{InsertOrder, MemoBuilder, MemoRecord};
