//! # repo-rag
//!
//! Index a set of source files into a local vector store and answer
//! questions grounded in the most similar chunks.
//!
//! The engine (chunker, vector store trait, ranking, retrieval, prompts)
//! lives in `repo-rag-core`. This crate adds everything with I/O: the
//! SQLite-backed collection, embedding and generation providers that call
//! Ollama or OpenAI-compatible servers, the indexing pipeline, the
//! question-answering orchestrator, configuration, logging, and the CLI.
//!
//! ## Data Flow
//!
//! ```text
//! paths ──▶ ingest ──▶ chunk ──▶ embed ──▶ SQLite collection
//!                                              │
//! question ──▶ embed ──▶ rank top_k ◀──────────┘
//!                  │
//!                  ▼
//!          grounding prompt ──▶ generator ──▶ answer + sources
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! repo-rag init
//! repo-rag index src/main.py README.md
//! repo-rag query "how is the config loaded?"
//! repo-rag ask "what does main do?" --file src/main.py --json
//! repo-rag briefs src/main.py src/util.py
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`logging`] | tracing subscriber setup |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`sqlite_store`] | Persistent vector collection |
//! | [`embedding`] | Embedding providers |
//! | [`generation`] | Generation providers |
//! | [`ingest`] | Indexing pipeline |
//! | [`rag`] | Question answering and file briefs |
//! | [`stats`] | Index statistics |
//! | [`commands`] | CLI command handlers |

pub mod commands;
pub mod config;
pub mod db;
pub mod embedding;
pub mod generation;
pub mod http;
pub mod ingest;
pub mod logging;
pub mod migrate;
pub mod rag;
pub mod sqlite_store;
pub mod stats;
