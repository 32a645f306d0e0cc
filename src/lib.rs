//! # Post Harness
//!
//! A local-first pipeline that turns social-media archive exports into a
//! browsable, deduplicated timeline of posts.
//!
//! Exports arrive as one or more zip archives holding JSON post records
//! next to the photos and videos they reference. Post Harness decompresses
//! the archives, repairs mis-decoded text, cross-references media across
//! every archive of a batch, and groups the surviving posts by year and
//! month. Every exclusion is explained in an [`IngestReport`](report::IngestReport).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌─────────────┐   ┌─────────┐
//! │ Archives │──▶│ Decompressor │──▶│ MediaIndex  │──▶│ Dataset │
//! │  (zip)   │   │  + Extractor │   │ + PostBuild │   │ (Y / M) │
//! └──────────┘   └──────────────┘   └─────────────┘   └────┬────┘
//!                                                         │
//!                                     ┌───────────────────┤
//!                                     ▼                   ▼
//!                                ┌──────────┐       ┌──────────┐
//!                                │   CLI    │       │   HTTP   │
//!                                │  (ph)    │       │   API    │
//!                                └──────────┘       └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! ph ingest export-part1.zip export-part2.zip
//! ph months ~/exports
//! ph list ~/exports --year 2021 --month 3 --search holiday
//! ph serve ~/exports
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`error`] | Error taxonomy |
//! | [`archive`] | Zip decompression |
//! | [`text_repair`] | Mojibake repair |
//! | [`media`] | Media index and blob handle resolvers |
//! | [`digest`] | SHA-1 providers for post ids |
//! | [`extract`] | JSON member scanning and post construction |
//! | [`dataset`] | Deduplication, ordering and month grouping |
//! | [`report`] | Ingestion diagnostics |
//! | [`ingest`] | Run orchestration, sessions |
//! | [`browse`] | Month index, search, pagination, formatting |
//! | [`sources`] | Archive discovery on disk |
//! | [`server`] | HTTP API |

pub mod archive;
pub mod browse;
pub mod config;
pub mod dataset;
pub mod digest;
pub mod error;
pub mod extract;
pub mod ingest;
pub mod media;
pub mod models;
pub mod report;
pub mod server;
pub mod sources;
pub mod text_repair;
