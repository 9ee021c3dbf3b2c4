//! # Study Context
//!
//! Context retrieval engine for a study-platform backend. Given a scope
//! (bucket → course → file restriction) and one or more query signals, it
//! returns a deduplicated, correctly ordered list of content passages for
//! retrieval-augmented generation.
//!
//! ```text
//! RetrievalQuery ──▶ scope resolver ──▶ ┌──────────────────────────┐
//!                                       │ similarity   (embedding) │
//!                                       │ lexical      (FTS)       │──▶ merge
//!                                       │ page lookup  (exact)     │    dedup
//!                                       │ chapter      (exact)     │──▶ [DocumentSource]
//!                                       └──────────────────────────┘
//! ```
//!
//! The four strategy executors run concurrently against a [`ContentStore`]
//! backend; their outputs are concatenated in a fixed precedence order
//! (embedding → lexical → page numbers → chapter) and deduplicated by unit
//! id, first occurrence winning. Practice mode bypasses ranking entirely and
//! samples uniformly at random, optionally restricted to per-file page
//! ranges.
//!
//! The engine is stateless, request-scoped, and read-only: authentication,
//! HTTP routing, chat orchestration, and document ingestion live in the
//! surrounding platform.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Content units and result types |
//! | [`filter`] | Scope filters and page-range parsing |
//! | [`scope`] | Scope resolution |
//! | [`retrieve`] | Strategy executors and the merge/dedup aggregator |
//! | [`practice`] | Practice-mode random sampling |
//! | [`store`] | Content store trait and in-memory backend |
//! | [`sqlite_store`] | SQLite backend (FTS5 + embedding BLOBs) |
//! | [`embedding`] | Vector helpers |
//! | [`db`] | Connection and schema for the SQLite backend |

pub mod db;
pub mod embedding;
pub mod filter;
pub mod models;
pub mod practice;
pub mod retrieve;
pub mod scope;
pub mod sqlite_store;
pub mod store;

pub use filter::{Filter, PracticeFileScope, PracticeFilter, ScopeFilter};
pub use models::{BoundingBox, ContentUnit, DocumentSource, RetrievalResponse};
pub use practice::{retrieve_random, retrieve_random_with};
pub use retrieve::{retrieve, retrieve_with, RetrievalDefaults, RetrievalQuery};
pub use scope::{resolve, ScopePredicate};
pub use store::{ContentStore, UnitRow};
