//! In-memory [`ContentStore`] implementation for tests.
//!
//! Holds content units in a `Vec` behind `std::sync::RwLock`. Similarity
//! search is brute-force cosine over every scoped unit; lexical search is
//! token-overlap matching against the OR-expression; sampling uses `rand`.

use std::sync::RwLock;

use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;

use crate::embedding::cosine_similarity;
use crate::models::ContentUnit;
use crate::scope::ScopePredicate;

use super::{result_cap, ContentStore, UnitRow};

/// In-memory store, seeded through [`insert`](InMemoryStore::insert).
pub struct InMemoryStore {
    units: RwLock<Vec<ContentUnit>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self {
            units: RwLock::new(Vec::new()),
        }
    }

    pub fn insert(&self, unit: ContentUnit) {
        self.units.write().unwrap().push(unit);
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn to_row(unit: &ContentUnit, with_content: bool, similarity: Option<f64>) -> UnitRow {
    UnitRow {
        id: unit.id.clone(),
        file_id: unit.file_id.clone(),
        file_name: unit.file_name.clone(),
        course_id: unit.course_id.clone(),
        course_name: unit.course_name.clone(),
        page_index: unit.page_index,
        page_number: unit.page_number,
        chapter: unit.chapter,
        bounding_box: unit.bounding_box.clone(),
        content: with_content.then(|| unit.content.clone()),
        similarity,
    }
}

/// Recover the individual tokens from an OR-expression like `"foo" OR "bar"`.
fn expression_tokens(fts_expression: &str) -> Vec<String> {
    fts_expression
        .split(" OR ")
        .map(|t| t.trim().trim_matches('"').to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}

#[async_trait]
impl ContentStore for InMemoryStore {
    async fn similarity_search(
        &self,
        scope: &ScopePredicate,
        embedding: &[f32],
        match_threshold: f64,
        match_count: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let units = self.units.read().unwrap();
        let mut rows: Vec<UnitRow> = units
            .iter()
            .filter(|u| scope.matches(&u.file_id, &u.course_id))
            .filter_map(|u| {
                let similarity = cosine_similarity(embedding, &u.embedding) as f64;
                if similarity > match_threshold {
                    Some(to_row(u, with_content, Some(similarity)))
                } else {
                    None
                }
            })
            .collect();
        rows.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        rows.truncate(result_cap(match_count));
        Ok(rows)
    }

    async fn lexical_search(
        &self,
        scope: &ScopePredicate,
        fts_expression: &str,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let tokens = expression_tokens(fts_expression);
        if tokens.is_empty() {
            return Ok(Vec::new());
        }
        let units = self.units.read().unwrap();
        let mut scored: Vec<(usize, UnitRow)> = units
            .iter()
            .filter(|u| scope.matches(&u.file_id, &u.course_id))
            .filter_map(|u| {
                let text = u.content.to_lowercase();
                let hits = tokens.iter().filter(|t| text.contains(t.as_str())).count();
                (hits > 0).then(|| (hits, to_row(u, with_content, None)))
            })
            .collect();
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        scored.truncate(result_cap(limit));
        Ok(scored.into_iter().map(|(_, row)| row).collect())
    }

    async fn units_by_page_numbers(
        &self,
        scope: &ScopePredicate,
        page_numbers: &[i64],
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let units = self.units.read().unwrap();
        let mut rows: Vec<UnitRow> = units
            .iter()
            .filter(|u| scope.matches(&u.file_id, &u.course_id))
            .filter(|u| u.page_number.is_some_and(|p| page_numbers.contains(&p)))
            .map(|u| to_row(u, with_content, None))
            .collect();
        rows.truncate(result_cap(limit));
        Ok(rows)
    }

    async fn units_by_chapter(
        &self,
        scope: &ScopePredicate,
        chapter: i64,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let units = self.units.read().unwrap();
        let mut rows: Vec<UnitRow> = units
            .iter()
            .filter(|u| scope.matches(&u.file_id, &u.course_id))
            .filter(|u| u.chapter == Some(chapter))
            .map(|u| to_row(u, with_content, None))
            .collect();
        rows.sort_by_key(|r| r.page_index);
        rows.truncate(result_cap(limit));
        Ok(rows)
    }

    async fn sample_file(
        &self,
        file_id: &str,
        page_numbers: Option<&[i64]>,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let units = self.units.read().unwrap();
        let candidates: Vec<UnitRow> = units
            .iter()
            .filter(|u| u.file_id == file_id)
            .filter(|u| match page_numbers {
                Some(pages) => u.page_number.is_some_and(|p| pages.contains(&p)),
                None => true,
            })
            .map(|u| to_row(u, with_content, None))
            .collect();
        let mut rng = rand::thread_rng();
        Ok(candidates
            .choose_multiple(&mut rng, result_cap(limit))
            .cloned()
            .collect())
    }

    async fn sample_courses(
        &self,
        course_ids: &[String],
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let units = self.units.read().unwrap();
        let candidates: Vec<UnitRow> = units
            .iter()
            .filter(|u| course_ids.iter().any(|c| *c == u.course_id))
            .map(|u| to_row(u, with_content, None))
            .collect();
        let mut rng = rand::thread_rng();
        Ok(candidates
            .choose_multiple(&mut rng, result_cap(limit))
            .cloned()
            .collect())
    }
}
