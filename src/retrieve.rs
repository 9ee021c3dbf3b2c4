//! Strategy executors and the merge/dedup aggregator.
//!
//! The core retrieval algorithm operates entirely through the
//! [`ContentStore`] trait, with no database or configuration dependencies.
//! The calling application is responsible for embedding the question,
//! constructing a [`RetrievalQuery`], and passing the appropriate store
//! implementation.
//!
//! # Algorithm
//!
//! 1. If the query carries no signal at all, return an empty response
//!    without touching the store ("no query provided" is not "no matches").
//! 2. Resolve the filter into a [`ScopePredicate`] once.
//! 3. Run one executor per present signal, all concurrently. A store error
//!    in any executor fails the whole call — partial RAG context is worse
//!    than an explicit failure.
//! 4. Concatenate in fixed precedence order: embedding → lexical →
//!    page numbers → chapter. Completion order never affects result order.
//! 5. Drop duplicate ids, first occurrence wins, and cap the merged list.

use std::collections::HashSet;

use anyhow::Result;
use tracing::debug;

use crate::filter::{Filter, ScopeFilter};
use crate::models::{DocumentSource, RetrievalResponse};
use crate::scope::{self, ScopePredicate};
use crate::store::ContentStore;

/// Per-strategy thresholds and caps, hoisted out of the call sites.
#[derive(Debug, Clone)]
pub struct RetrievalDefaults {
    /// Minimum cosine similarity (exclusive) for similarity search.
    pub match_threshold: f64,
    /// Similarity result cap when the caller omits `match_count`.
    pub match_count: i64,
    /// Lexical result cap when the caller omits `limit`.
    pub lexical_limit: i64,
    /// Page-number lookup cap.
    pub page_lookup_limit: i64,
    /// Chapter lookup cap.
    pub chapter_limit: i64,
    /// Units sampled per file (or per course fallback) in practice mode.
    pub sample_per_file: i64,
    /// Upper bound on the merged result list.
    pub max_sources: i64,
}

impl Default for RetrievalDefaults {
    fn default() -> Self {
        Self {
            match_threshold: 0.4,
            match_count: 4,
            lexical_limit: 4,
            page_lookup_limit: 4,
            chapter_limit: 8,
            sample_per_file: 4,
            max_sources: 20,
        }
    }
}

/// One retrieval invocation: a scope plus zero or more signals.
///
/// Every signal is optional; each present signal drives exactly one strategy
/// executor. A query with no signals returns an empty response by contract.
#[derive(Debug, Clone, Default)]
pub struct RetrievalQuery {
    pub filter: Filter,
    /// Query embedding for similarity search.
    pub embedding: Option<Vec<f32>>,
    /// Minimum similarity override (default 0.4).
    pub match_threshold: Option<f64>,
    /// Similarity result cap override (default 4).
    pub match_count: Option<i64>,
    /// Raw lexical query; tokenized and OR-joined before execution.
    pub fts_query: Option<String>,
    /// Explicit page-number labels to look up.
    pub page_numbers: Option<Vec<i64>>,
    /// Chapter id to look up.
    pub chapter: Option<i64>,
    /// Whether to attach `page_content` to results.
    pub retrieve_content: bool,
}

impl RetrievalQuery {
    fn has_signal(&self) -> bool {
        self.embedding.as_deref().is_some_and(|e| !e.is_empty())
            || self.fts_query.is_some()
            || self.page_numbers.is_some()
            || self.chapter.is_some()
    }
}

/// Tokenize a raw lexical query and join the tokens into a permissive
/// OR-expression: any token match counts, not all-tokens-required.
///
/// Tokens are double-quoted so user input cannot inject full-text operators.
/// Returns `None` when nothing survives tokenization.
pub fn build_fts_expression(raw_query: &str) -> Option<String> {
    let tokens: Vec<String> = raw_query
        .split_whitespace()
        .map(|t| t.replace('"', ""))
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    if tokens.is_empty() {
        None
    } else {
        Some(tokens.join(" OR "))
    }
}

/// Run every requested strategy and return the merged, deduplicated results.
///
/// Uses [`RetrievalDefaults::default`]; see [`retrieve_with`] to override.
pub async fn retrieve<S: ContentStore + ?Sized>(
    store: &S,
    query: &RetrievalQuery,
) -> Result<RetrievalResponse> {
    retrieve_with(store, query, &RetrievalDefaults::default()).await
}

/// [`retrieve`] with explicit defaults.
pub async fn retrieve_with<S: ContentStore + ?Sized>(
    store: &S,
    query: &RetrievalQuery,
    defaults: &RetrievalDefaults,
) -> Result<RetrievalResponse> {
    if !query.has_signal() {
        debug!("no retrieval signals present, skipping store queries");
        return Ok(RetrievalResponse::empty());
    }

    let scope = scope::resolve(&ScopeFilter::Standard(query.filter.clone()));

    // Independent reads; join semantics, fail-fast on the first store error.
    let (semantic, lexical, by_page, by_chapter) = tokio::try_join!(
        run_similarity(store, &scope, query, defaults),
        run_lexical(store, &scope, query, defaults),
        run_page_numbers(store, &scope, query, defaults),
        run_chapter(store, &scope, query, defaults),
    )?;

    let document_sources = merge_dedup(
        [semantic, lexical, by_page, by_chapter],
        crate::store::result_cap(defaults.max_sources),
    );
    debug!(results = document_sources.len(), "retrieval merged");
    Ok(RetrievalResponse { document_sources })
}

async fn run_similarity<S: ContentStore + ?Sized>(
    store: &S,
    scope: &ScopePredicate,
    query: &RetrievalQuery,
    defaults: &RetrievalDefaults,
) -> Result<Vec<DocumentSource>> {
    let embedding = match query.embedding.as_deref() {
        Some(e) if !e.is_empty() => e,
        _ => return Ok(Vec::new()),
    };
    let threshold = query.match_threshold.unwrap_or(defaults.match_threshold);
    let count = query.match_count.unwrap_or(defaults.match_count);
    let rows = store
        .similarity_search(scope, embedding, threshold, count, query.retrieve_content)
        .await?;
    debug!(strategy = "similarity", rows = rows.len(), "executor done");
    Ok(normalize(rows, query.retrieve_content))
}

async fn run_lexical<S: ContentStore + ?Sized>(
    store: &S,
    scope: &ScopePredicate,
    query: &RetrievalQuery,
    defaults: &RetrievalDefaults,
) -> Result<Vec<DocumentSource>> {
    let raw = match &query.fts_query {
        Some(raw) => raw,
        None => return Ok(Vec::new()),
    };
    let expression = match build_fts_expression(raw) {
        Some(e) => e,
        // Whitespace-only query: nothing to execute.
        None => return Ok(Vec::new()),
    };
    let rows = store
        .lexical_search(scope, &expression, defaults.lexical_limit, query.retrieve_content)
        .await?;
    debug!(strategy = "lexical", rows = rows.len(), "executor done");
    Ok(normalize(rows, query.retrieve_content))
}

async fn run_page_numbers<S: ContentStore + ?Sized>(
    store: &S,
    scope: &ScopePredicate,
    query: &RetrievalQuery,
    defaults: &RetrievalDefaults,
) -> Result<Vec<DocumentSource>> {
    let pages = match query.page_numbers.as_deref() {
        // An explicitly empty list means "no results for this signal",
        // not a hard failure.
        Some(pages) if !pages.is_empty() => pages,
        _ => return Ok(Vec::new()),
    };
    let rows = store
        .units_by_page_numbers(scope, pages, defaults.page_lookup_limit, query.retrieve_content)
        .await?;
    debug!(strategy = "page_numbers", rows = rows.len(), "executor done");
    Ok(normalize(rows, query.retrieve_content))
}

async fn run_chapter<S: ContentStore + ?Sized>(
    store: &S,
    scope: &ScopePredicate,
    query: &RetrievalQuery,
    defaults: &RetrievalDefaults,
) -> Result<Vec<DocumentSource>> {
    let chapter = match query.chapter {
        Some(chapter) => chapter,
        None => return Ok(Vec::new()),
    };
    let rows = store
        .units_by_chapter(scope, chapter, defaults.chapter_limit, query.retrieve_content)
        .await?;
    debug!(strategy = "chapter", rows = rows.len(), "executor done");
    Ok(normalize(rows, query.retrieve_content))
}

fn normalize(rows: Vec<crate::store::UnitRow>, retrieve_content: bool) -> Vec<DocumentSource> {
    rows.into_iter()
        .map(|row| row.into_source(retrieve_content))
        .collect()
}

/// Concatenate strategy outputs in precedence order and drop duplicate ids,
/// keeping the first occurrence.
fn merge_dedup<const N: usize>(
    batches: [Vec<DocumentSource>; N],
    cap: usize,
) -> Vec<DocumentSource> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut merged: Vec<DocumentSource> = Vec::new();
    for source in batches.into_iter().flatten() {
        if seen.insert(source.id.clone()) {
            merged.push(source);
        }
    }
    merged.truncate(cap);
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentUnit;
    use crate::store::memory::InMemoryStore;

    fn unit(id: &str, file_id: &str, course_id: &str, page_index: i64) -> ContentUnit {
        ContentUnit {
            id: id.to_string(),
            file_id: file_id.to_string(),
            file_name: format!("{file_id}.pdf"),
            course_id: course_id.to_string(),
            course_name: format!("course {course_id}"),
            page_index,
            page_number: Some(page_index + 1),
            chapter: None,
            sub_chapter: None,
            embedding: vec![1.0, 0.0, 0.0],
            content: format!("content of {id}"),
            bounding_box: None,
        }
    }

    fn file_query(file_id: &str) -> RetrievalQuery {
        RetrievalQuery {
            filter: Filter {
                bucket_id: "b1".into(),
                files: vec![file_id.to_string()],
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_fts_expression_or_joins_tokens() {
        assert_eq!(
            build_fts_expression("mitosis cell division").as_deref(),
            Some("\"mitosis\" OR \"cell\" OR \"division\"")
        );
    }

    #[test]
    fn test_fts_expression_strips_quotes_and_blanks() {
        assert_eq!(
            build_fts_expression("  \"mitosis\"   phase ").as_deref(),
            Some("\"mitosis\" OR \"phase\"")
        );
        assert!(build_fts_expression("   ").is_none());
        assert!(build_fts_expression("\"\"").is_none());
    }

    #[tokio::test]
    async fn test_no_signal_returns_empty_not_error() {
        let store = InMemoryStore::new();
        store.insert(unit("u1", "f1", "c1", 0));
        let response = retrieve(&store, &file_query("f1")).await.unwrap();
        assert!(response.document_sources.is_empty());
    }

    #[tokio::test]
    async fn test_empty_embedding_is_no_signal() {
        let store = InMemoryStore::new();
        store.insert(unit("u1", "f1", "c1", 0));
        let query = RetrievalQuery {
            embedding: Some(Vec::new()),
            ..file_query("f1")
        };
        let response = retrieve(&store, &query).await.unwrap();
        assert!(response.document_sources.is_empty());
    }

    #[tokio::test]
    async fn test_threshold_excludes_at_or_below() {
        let store = InMemoryStore::new();
        let mut aligned = unit("u-aligned", "f1", "c1", 0);
        aligned.embedding = vec![1.0, 0.0, 0.0];
        let mut orthogonal = unit("u-orthogonal", "f1", "c1", 1);
        orthogonal.embedding = vec![0.0, 1.0, 0.0];
        store.insert(aligned);
        store.insert(orthogonal);

        let query = RetrievalQuery {
            embedding: Some(vec![1.0, 0.0, 0.0]),
            match_threshold: Some(0.5),
            ..file_query("f1")
        };
        let response = retrieve(&store, &query).await.unwrap();
        let ids: Vec<&str> = response
            .document_sources
            .iter()
            .map(|s| s.id.as_str())
            .collect();
        assert_eq!(ids, vec!["u-aligned"]);
    }

    #[tokio::test]
    async fn test_negative_match_count_caps_at_zero() {
        let store = InMemoryStore::new();
        store.insert(unit("u1", "f1", "c1", 0));
        let query = RetrievalQuery {
            embedding: Some(vec![1.0, 0.0, 0.0]),
            match_count: Some(-1),
            ..file_query("f1")
        };
        let response = retrieve(&store, &query).await.unwrap();
        assert!(response.document_sources.is_empty());
    }

    #[tokio::test]
    async fn test_overlapping_strategies_dedup_by_id() {
        let store = InMemoryStore::new();
        let mut u = unit("u1", "f1", "c1", 0);
        u.content = "photosynthesis in plants".into();
        u.embedding = vec![1.0, 0.0, 0.0];
        store.insert(u);

        let query = RetrievalQuery {
            embedding: Some(vec![1.0, 0.0, 0.0]),
            fts_query: Some("photosynthesis".into()),
            ..file_query("f1")
        };
        let response = retrieve(&store, &query).await.unwrap();
        assert_eq!(response.document_sources.len(), 1);
        assert_eq!(response.document_sources[0].id, "u1");
    }

    #[tokio::test]
    async fn test_empty_page_number_list_yields_no_results() {
        let store = InMemoryStore::new();
        store.insert(unit("u1", "f1", "c1", 0));
        let query = RetrievalQuery {
            page_numbers: Some(Vec::new()),
            ..file_query("f1")
        };
        let response = retrieve(&store, &query).await.unwrap();
        assert!(response.document_sources.is_empty());
    }

    #[tokio::test]
    async fn test_content_toggle() {
        let store = InMemoryStore::new();
        store.insert(unit("u1", "f1", "c1", 0));

        let mut query = RetrievalQuery {
            page_numbers: Some(vec![1]),
            ..file_query("f1")
        };
        let without = retrieve(&store, &query).await.unwrap();
        assert!(without.document_sources[0].page_content.is_none());

        query.retrieve_content = true;
        let with = retrieve(&store, &query).await.unwrap();
        assert_eq!(
            with.document_sources[0].page_content.as_deref(),
            Some("content of u1")
        );
    }

    #[tokio::test]
    async fn test_unscoped_query_matches_nothing() {
        let store = InMemoryStore::new();
        store.insert(unit("u1", "f1", "c1", 0));
        let query = RetrievalQuery {
            filter: Filter {
                bucket_id: "b1".into(),
                ..Default::default()
            },
            fts_query: Some("content".into()),
            ..Default::default()
        };
        let response = retrieve(&store, &query).await.unwrap();
        assert!(response.document_sources.is_empty());
    }

    fn source_of(unit: &ContentUnit, content: Option<&str>) -> DocumentSource {
        DocumentSource {
            id: unit.id.clone(),
            file_id: unit.file_id.clone(),
            file_name: unit.file_name.clone(),
            course_id: unit.course_id.clone(),
            course_name: unit.course_name.clone(),
            page_index: unit.page_index,
            page_number: unit.page_number,
            bounding_box: None,
            page_content: content.map(|c| c.to_string()),
        }
    }

    #[test]
    fn test_merge_dedup_keeps_first_occurrence() {
        let a = unit("u1", "f1", "c1", 0);
        let first = source_of(&a, Some("from-semantic"));
        let second = source_of(&a, Some("from-lexical"));
        let other = source_of(&unit("u2", "f1", "c1", 1), None);
        let merged = merge_dedup([vec![first], vec![second, other]], 20);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].page_content.as_deref(), Some("from-semantic"));
    }
}
