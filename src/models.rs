//! Core data models of the retrieval engine.
//!
//! These types represent the stored content units the engine reads and the
//! `DocumentSource` results it hands back to the chat/practice orchestrator.

use serde::{Deserialize, Serialize};

/// Rectangle locating a content unit inside a rendered page.
///
/// Absent for non-visual content; callers use it to highlight the passage a
/// citation came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

/// One retrievable passage (a page or sub-page chunk) of one file.
///
/// Content units are written by the ingestion pipeline and deleted by the
/// cascading file/course/bucket deletes; the retrieval engine only reads them.
/// The ownership chain (`file_id` → `course_id` → bucket) is a strict tree,
/// denormalized here so results can be displayed without extra joins.
#[derive(Debug, Clone)]
pub struct ContentUnit {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub course_id: String,
    pub course_name: String,
    /// Zero-based position within the file: dense, strictly increasing.
    pub page_index: i64,
    /// Human-facing page label; may differ from `page_index` (front matter
    /// offsets) and is not guaranteed present.
    pub page_number: Option<i64>,
    pub chapter: Option<i64>,
    pub sub_chapter: Option<String>,
    /// Precomputed at ingestion time (768 dims in production), immutable.
    pub embedding: Vec<f32>,
    pub content: String,
    pub bounding_box: Option<BoundingBox>,
}

/// A single retrieved passage, as returned to the orchestrator.
///
/// `page_content` is `None` exactly when the caller did not request content;
/// it serializes as an explicit `null` so consumers can distinguish "not
/// requested" from "empty document".
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSource {
    pub id: String,
    pub file_id: String,
    pub file_name: String,
    pub course_id: String,
    pub course_name: String,
    pub page_index: i64,
    pub page_number: Option<i64>,
    pub bounding_box: Option<BoundingBox>,
    pub page_content: Option<String>,
}

/// Response envelope of a `retrieve` call.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RetrievalResponse {
    pub document_sources: Vec<DocumentSource>,
}

impl RetrievalResponse {
    pub fn empty() -> Self {
        Self {
            document_sources: Vec::new(),
        }
    }
}
