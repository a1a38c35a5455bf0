//! # Support RAG
//!
//! A retrieval pipeline that answers customer support questions from two
//! local collections — product documentation and historical support
//! tickets — with extractive answers, citations, and a confidence score.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌───────────────┐   ┌───────────────┐
//! │   Dataset    │──▶│   Segmenter    │──▶│  CorpusIndex   │
//! │ docs+tickets │   │ bounded chunks│   │ BM25 + vectors│
//! └──────────────┘   └───────────────┘   └──────┬────────┘
//!                                               │
//!                        ┌──────────────────────┤
//!                        ▼                      ▼
//!                  ┌──────────┐           ┌──────────┐
//!                  │   CLI    │           │   HTTP   │
//!                  │  (srag)  │           │  (/api)  │
//!                  └──────────┘           └──────────┘
//! ```
//!
//! Every query is classified into a support intent, ranked by a hybrid of
//! semantic similarity, BM25, and heuristic boosts (source, recency,
//! version affinity), and answered by extracting the most relevant lines
//! from the top chunks.
//!
//! ## Quick Start
//!
//! ```bash
//! srag query "How do I fix sync issues?"
//! srag query                    # interactive shell
//! srag eval                     # run the test-query harness
//! srag trace "sync conflicts"   # inspect ranking signals
//! srag db stats                 # corpus counts
//! srag serve                    # start the HTTP API
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`dataset`] | Product docs / support tickets loading |
//! | [`segment`] | Structure-aware document chunking |
//! | [`lexical`] | Tokenization, synonyms, BM25 |
//! | [`semantic`] | Embedding backends (TF-IDF, OpenAI) |
//! | [`classify`] | Query intent classification |
//! | [`index`] | Immutable corpus snapshot |
//! | [`rank`] | Hybrid ranking with heuristic boosts |
//! | [`synth`] | Extractive answer synthesis |
//! | [`pipeline`] | Query response and trace assembly |
//! | [`eval`] | Test-query evaluation harness |
//! | [`inspect`] | Snapshot inspection (`db` commands) |
//! | [`server`] | JSON HTTP API |

pub mod classify;
pub mod config;
pub mod dataset;
pub mod eval;
pub mod index;
pub mod inspect;
pub mod lexical;
pub mod models;
pub mod pipeline;
pub mod rank;
pub mod segment;
pub mod semantic;
pub mod server;
pub mod synth;
