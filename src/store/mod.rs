//! Content Store abstraction.
//!
//! The [`ContentStore`] trait is the engine's entire view of persistence: a
//! handful of scoped, read-only queries over content units. Backends
//! (SQLite, in-memory) translate each query into their own search machinery;
//! the engine never writes through this trait.
//!
//! Implementations must be `Send + Sync` to work with async runtimes, and
//! must return an empty vector — not an error — for a
//! [`ScopePredicate::Nothing`] scope.

pub mod memory;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{BoundingBox, DocumentSource};
use crate::scope::ScopePredicate;

/// Convert a caller-supplied result cap into a truncation length.
///
/// Negative caps behave as zero instead of wrapping into "no limit".
pub(crate) fn result_cap(limit: i64) -> usize {
    usize::try_from(limit).unwrap_or(0)
}

/// A raw row returned by a store query, before normalization.
///
/// Carries the denormalized ownership chain plus whatever the query shape
/// adds: `similarity` is set only by similarity search, `content` only when
/// the query ran with `with_content`.
#[derive(Debug, Clone)]
pub struct UnitRow {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub course_id: String,
    pub course_name: String,
    pub page_index: i64,
    pub page_number: Option<i64>,
    pub chapter: Option<i64>,
    pub bounding_box: Option<BoundingBox>,
    pub content: Option<String>,
    pub similarity: Option<f64>,
}

impl UnitRow {
    /// Normalize a raw row into the canonical result shape.
    ///
    /// `page_content` stays `None` unless the caller asked for content, even
    /// when the backing query happened to fetch it.
    pub fn into_source(self, retrieve_content: bool) -> DocumentSource {
        DocumentSource {
            id: self.id,
            file_id: self.file_id,
            file_name: self.file_name,
            course_id: self.course_id,
            course_name: self.course_name,
            page_index: self.page_index,
            page_number: self.page_number,
            bounding_box: self.bounding_box,
            page_content: if retrieve_content { self.content } else { None },
        }
    }
}

/// Read-only query surface of the content store.
///
/// | Method | Strategy |
/// |--------|----------|
/// | [`similarity_search`](ContentStore::similarity_search) | embedding distance ranking |
/// | [`lexical_search`](ContentStore::lexical_search) | full-text match |
/// | [`units_by_page_numbers`](ContentStore::units_by_page_numbers) | exact structural lookup |
/// | [`units_by_chapter`](ContentStore::units_by_chapter) | exact structural lookup |
/// | [`sample_file`](ContentStore::sample_file) | practice-mode random sampling |
/// | [`sample_courses`](ContentStore::sample_courses) | practice-mode course fallback |
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Rank scoped units by cosine similarity to `embedding`, descending.
    ///
    /// Excludes rows with `similarity <= match_threshold` and returns at most
    /// `match_count` rows, each with `similarity` populated. Ties break by id
    /// ascending for determinism.
    async fn similarity_search(
        &self,
        scope: &ScopePredicate,
        embedding: &[f32],
        match_threshold: f64,
        match_count: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>>;

    /// Full-text search with a preformatted OR-expression (see
    /// [`crate::retrieve::build_fts_expression`]), capped at `limit`, in the
    /// backend's own relevance order.
    async fn lexical_search(
        &self,
        scope: &ScopePredicate,
        fts_expression: &str,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>>;

    /// Scoped units whose `page_number` label is in `page_numbers`.
    ///
    /// Units without a page-number label never match. Store order, capped at
    /// `limit`.
    async fn units_by_page_numbers(
        &self,
        scope: &ScopePredicate,
        page_numbers: &[i64],
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>>;

    /// Scoped units with exactly this `chapter`, ordered ascending by
    /// `page_index` (contractual — callers rely on chapter results being
    /// sequential), capped at `limit`.
    async fn units_by_chapter(
        &self,
        scope: &ScopePredicate,
        chapter: i64,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>>;

    /// Up to `limit` units sampled uniformly at random from one file,
    /// restricted to the given page-number set when present.
    async fn sample_file(
        &self,
        file_id: &str,
        page_numbers: Option<&[i64]>,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>>;

    /// Up to `limit` units sampled uniformly at random across whole courses.
    async fn sample_courses(
        &self,
        course_ids: &[String],
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>>;
}
