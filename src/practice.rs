//! Practice-mode random sampling.
//!
//! Practice questions do not rank by relevance; they draw uniformly at
//! random from the scoped material. Each scoped file is sampled
//! independently and concurrently (optionally restricted to a parsed
//! page-range), and the per-file samples are concatenated without a
//! cross-file cap — the orchestrator caps downstream if it needs to. A
//! course-level sample runs only when no files are scoped at all.

use anyhow::Result;
use futures::future::try_join_all;
use tracing::debug;

use crate::filter::{parse_page_range, PracticeFileScope, PracticeFilter};
use crate::models::{DocumentSource, RetrievalResponse};
use crate::retrieve::RetrievalDefaults;
use crate::store::ContentStore;

/// Sample random content units from the practice scope.
///
/// Uses [`RetrievalDefaults::default`]; see [`retrieve_random_with`] to
/// override.
pub async fn retrieve_random<S: ContentStore + ?Sized>(
    store: &S,
    filter: &PracticeFilter,
    retrieve_content: bool,
) -> Result<RetrievalResponse> {
    retrieve_random_with(store, filter, retrieve_content, &RetrievalDefaults::default()).await
}

/// [`retrieve_random`] with explicit defaults.
pub async fn retrieve_random_with<S: ContentStore + ?Sized>(
    store: &S,
    filter: &PracticeFilter,
    retrieve_content: bool,
    defaults: &RetrievalDefaults,
) -> Result<RetrievalResponse> {
    if !filter.files.is_empty() {
        let samples = try_join_all(
            filter
                .files
                .iter()
                .map(|scope| sample_one_file(store, scope, retrieve_content, defaults)),
        )
        .await?;
        let document_sources: Vec<DocumentSource> = samples.into_iter().flatten().collect();
        debug!(
            files = filter.files.len(),
            results = document_sources.len(),
            "practice sample over files"
        );
        return Ok(RetrievalResponse { document_sources });
    }

    if !filter.courses.is_empty() {
        let rows = store
            .sample_courses(&filter.courses, defaults.sample_per_file, retrieve_content)
            .await?;
        let document_sources: Vec<DocumentSource> = rows
            .into_iter()
            .map(|row| row.into_source(retrieve_content))
            .collect();
        debug!(
            courses = filter.courses.len(),
            results = document_sources.len(),
            "practice sample over courses"
        );
        return Ok(RetrievalResponse { document_sources });
    }

    Ok(RetrievalResponse::empty())
}

async fn sample_one_file<S: ContentStore + ?Sized>(
    store: &S,
    scope: &PracticeFileScope,
    retrieve_content: bool,
    defaults: &RetrievalDefaults,
) -> Result<Vec<DocumentSource>> {
    let pages = scope.page_range.as_deref().map(parse_page_range);
    // A range that parses to nothing is an unusable restriction; sample the
    // whole file instead of returning nothing for that file.
    let pages = pages.filter(|p| !p.is_empty());
    let rows = store
        .sample_file(
            &scope.file_id,
            pages.as_deref(),
            defaults.sample_per_file,
            retrieve_content,
        )
        .await?;
    Ok(rows
        .into_iter()
        .map(|row| row.into_source(retrieve_content))
        .collect())
}
