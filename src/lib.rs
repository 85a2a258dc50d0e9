//! # tutorrag — Retrieval-Augmented Tutoring Server
//!
//! Indexes uploaded study documents into a local vector store and answers
//! student questions from the retrieved material, tutor-style, over HTTP.
//!
//! ## Architecture
//!
//! - **[`config`]** — Configuration loading, validation, and defaults
//! - **[`chunker`]** — Boundary-aware text chunking with overlap
//! - **[`db`]** — SQLite + sqlite-vec vector index (documents, chunks, search)
//! - **[`embedder`]** — Text embedding (remote HTTP provider or deterministic mock)
//! - **[`composer`]** — Answer generation (chat-completions provider or mock)
//! - **[`context`]** — Context window assembly and tutor prompt
//! - **[`pipeline`]** — Ingestion/query orchestration, state machine, rollback
//! - **[`api`]** — Axum HTTP boundary (ingest, ask, status, delete)
//! - **[`error`]** — Crate-wide error type with transient/retryable classification

pub mod api;
pub mod chunker;
pub mod composer;
pub mod config;
pub mod context;
pub mod db;
pub mod embedder;
pub mod error;
pub mod pipeline;
