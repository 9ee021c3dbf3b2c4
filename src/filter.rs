//! Caller-supplied scope filters.
//!
//! Standard retrieval and practice mode carry different filter shapes (the
//! practice variant attaches an optional page-range string per file). The
//! [`ScopeFilter`] union resolves that difference once, at the scope boundary,
//! instead of re-checking the shape inside every strategy executor.

use serde::Deserialize;

/// Scope of a standard retrieval call.
///
/// At most one of `courses`/`files` is meaningfully populated; when both are,
/// file scope wins (see [`crate::scope::resolve`]). `documents` is injected
/// document context consumed by the orchestrator, never by content-unit
/// search — it is carried here only for interface fidelity.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Filter {
    pub bucket_id: String,
    pub courses: Vec<String>,
    pub files: Vec<String>,
    pub documents: Vec<String>,
}

/// One file within a practice-mode scope, with an optional page-range
/// restriction such as `"3-10,15"`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PracticeFileScope {
    pub file_id: String,
    #[serde(default)]
    pub page_range: Option<String>,
}

/// Scope of a practice-mode (random sampling) call.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PracticeFilter {
    pub bucket_id: String,
    pub courses: Vec<String>,
    pub files: Vec<PracticeFileScope>,
}

/// Tagged union over the two filter shapes, exposing uniform accessors.
#[derive(Debug, Clone)]
pub enum ScopeFilter {
    Standard(Filter),
    Practice(PracticeFilter),
}

impl ScopeFilter {
    pub fn file_ids(&self) -> Vec<String> {
        match self {
            ScopeFilter::Standard(f) => f.files.clone(),
            ScopeFilter::Practice(f) => f.files.iter().map(|s| s.file_id.clone()).collect(),
        }
    }

    pub fn course_ids(&self) -> &[String] {
        match self {
            ScopeFilter::Standard(f) => &f.courses,
            ScopeFilter::Practice(f) => &f.courses,
        }
    }
}

impl From<Filter> for ScopeFilter {
    fn from(filter: Filter) -> Self {
        ScopeFilter::Standard(filter)
    }
}

impl From<PracticeFilter> for ScopeFilter {
    fn from(filter: PracticeFilter) -> Self {
        ScopeFilter::Practice(filter)
    }
}

/// Parse a page-range string like `"3-10,15"` into a sorted, deduplicated
/// list of page numbers.
///
/// Segments are comma-separated; each is either a single number or an
/// inclusive `a-b` span. Malformed segments and reversed spans are skipped
/// rather than treated as errors — an unusable restriction degrades to a
/// smaller (possibly empty) page set, and the sampler falls back to
/// whole-file sampling when nothing parses.
pub fn parse_page_range(range: &str) -> Vec<i64> {
    let mut pages: Vec<i64> = Vec::new();
    for segment in range.split(',') {
        let segment = segment.trim();
        if segment.is_empty() {
            continue;
        }
        match segment.split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse::<i64>();
                let end = end.trim().parse::<i64>();
                if let (Ok(start), Ok(end)) = (start, end) {
                    if start <= end {
                        pages.extend(start..=end);
                    }
                }
            }
            None => {
                if let Ok(page) = segment.parse::<i64>() {
                    pages.push(page);
                }
            }
        }
    }
    pages.sort_unstable();
    pages.dedup();
    pages
}
