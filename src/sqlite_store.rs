//! SQLite-backed [`ContentStore`] implementation.
//!
//! Lexical search runs against an FTS5 shadow table; similarity search loads
//! the scoped embedding BLOBs and ranks by in-process cosine similarity;
//! random sampling is `ORDER BY RANDOM() LIMIT n`. Every query carries the
//! resolved scope predicate as SQL, so content never leaks outside the
//! caller's bucket/course/file restriction.

use anyhow::Result;
use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::trace;

use crate::embedding::{blob_to_vec, cosine_similarity, vec_to_blob};
use crate::models::{BoundingBox, ContentUnit};
use crate::scope::ScopePredicate;
use crate::store::{result_cap, ContentStore, UnitRow};

/// SQLite implementation of the [`ContentStore`] trait.
pub struct SqliteStore {
    pool: SqlitePool,
}

const UNIT_COLUMNS: &str =
    "id, file_id, file_name, course_id, course_name, page_index, page_number, chapter, bounding_box";

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Seed path used by tests and tooling; the production ingestion
    /// pipeline writes through its own code path with the same shape.
    pub async fn insert_unit(&self, unit: &ContentUnit) -> Result<()> {
        let bounding_box = unit
            .bounding_box
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let blob = vec_to_blob(&unit.embedding);

        let mut tx = self.pool.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO content_units (id, file_id, file_name, course_id, course_name,
                                       page_index, page_number, chapter, sub_chapter,
                                       embedding, content, bounding_box)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&unit.id)
        .bind(&unit.file_id)
        .bind(&unit.file_name)
        .bind(&unit.course_id)
        .bind(&unit.course_name)
        .bind(unit.page_index)
        .bind(unit.page_number)
        .bind(unit.chapter)
        .bind(&unit.sub_chapter)
        .bind(&blob)
        .bind(&unit.content)
        .bind(&bounding_box)
        .execute(&mut *tx)
        .await?;

        sqlx::query("INSERT INTO content_units_fts (unit_id, content) VALUES (?, ?)")
            .bind(&unit.id)
            .bind(&unit.content)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(())
    }
}

/// Render the scope predicate as a SQL condition over `content_units`
/// columns, returning the condition and the ids to bind. `None` means the
/// scope matches nothing and the query should not run at all.
fn scope_sql<'a>(scope: &'a ScopePredicate, table_alias: &str) -> Option<(String, &'a [String])> {
    let (column, ids) = match scope {
        ScopePredicate::Files(ids) => ("file_id", ids),
        ScopePredicate::Courses(ids) => ("course_id", ids),
        ScopePredicate::Nothing => return None,
    };
    if ids.is_empty() {
        return None;
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    Some((
        format!("{table_alias}{column} IN ({placeholders})"),
        ids.as_slice(),
    ))
}

fn content_column(with_content: bool, table_alias: &str) -> String {
    if with_content {
        format!("{table_alias}content AS content")
    } else {
        "NULL AS content".to_string()
    }
}

fn row_to_unit(row: &SqliteRow) -> Result<UnitRow> {
    let bounding_box: Option<String> = row.get("bounding_box");
    let bounding_box: Option<BoundingBox> = bounding_box
        .map(|json| serde_json::from_str(&json))
        .transpose()?;
    Ok(UnitRow {
        id: row.get("id"),
        file_id: row.get("file_id"),
        file_name: row.get("file_name"),
        course_id: row.get("course_id"),
        course_name: row.get("course_name"),
        page_index: row.get("page_index"),
        page_number: row.get("page_number"),
        chapter: row.get("chapter"),
        bounding_box,
        content: row.get("content"),
        similarity: None,
    })
}

#[async_trait]
impl ContentStore for SqliteStore {
    async fn similarity_search(
        &self,
        scope: &ScopePredicate,
        embedding: &[f32],
        match_threshold: f64,
        match_count: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let (scope_clause, scope_ids) = match scope_sql(scope, "") {
            Some(parts) => parts,
            None => return Ok(Vec::new()),
        };
        let sql = format!(
            "SELECT {UNIT_COLUMNS}, embedding, {} FROM content_units WHERE {scope_clause}",
            content_column(with_content, ""),
        );
        let mut query = sqlx::query(&sql);
        for id in scope_ids {
            query = query.bind(id);
        }
        let rows = query.fetch_all(&self.pool).await?;
        trace!(candidates = rows.len(), "similarity scan");

        let mut candidates: Vec<UnitRow> = rows
            .iter()
            .filter_map(|row| {
                let blob: Vec<u8> = row.get("embedding");
                let similarity = cosine_similarity(embedding, &blob_to_vec(&blob)) as f64;
                if similarity <= match_threshold {
                    return None;
                }
                match row_to_unit(row) {
                    Ok(mut unit) => {
                        unit.similarity = Some(similarity);
                        Some(Ok(unit))
                    }
                    Err(e) => Some(Err(e)),
                }
            })
            .collect::<Result<Vec<UnitRow>>>()?;

        candidates.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        candidates.truncate(result_cap(match_count));
        Ok(candidates)
    }

    async fn lexical_search(
        &self,
        scope: &ScopePredicate,
        fts_expression: &str,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let (scope_clause, scope_ids) = match scope_sql(scope, "cu.") {
            Some(parts) => parts,
            None => return Ok(Vec::new()),
        };
        let columns = UNIT_COLUMNS
            .split(", ")
            .map(|c| format!("cu.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            r#"
            SELECT {columns}, {}
            FROM content_units_fts
            JOIN content_units cu ON cu.id = content_units_fts.unit_id
            WHERE content_units_fts MATCH ? AND {scope_clause}
            ORDER BY rank
            LIMIT ?
            "#,
            content_column(with_content, "cu."),
        );
        let mut query = sqlx::query(&sql).bind(fts_expression);
        for id in scope_ids {
            query = query.bind(id);
        }
        let rows = query.bind(result_cap(limit) as i64).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_unit).collect()
    }

    async fn units_by_page_numbers(
        &self,
        scope: &ScopePredicate,
        page_numbers: &[i64],
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        if page_numbers.is_empty() {
            return Ok(Vec::new());
        }
        let (scope_clause, scope_ids) = match scope_sql(scope, "") {
            Some(parts) => parts,
            None => return Ok(Vec::new()),
        };
        let placeholders = vec!["?"; page_numbers.len()].join(", ");
        let sql = format!(
            "SELECT {UNIT_COLUMNS}, {} FROM content_units \
             WHERE page_number IN ({placeholders}) AND {scope_clause} LIMIT ?",
            content_column(with_content, ""),
        );
        let mut query = sqlx::query(&sql);
        for page in page_numbers {
            query = query.bind(page);
        }
        for id in scope_ids {
            query = query.bind(id);
        }
        let rows = query.bind(result_cap(limit) as i64).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_unit).collect()
    }

    async fn units_by_chapter(
        &self,
        scope: &ScopePredicate,
        chapter: i64,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let (scope_clause, scope_ids) = match scope_sql(scope, "") {
            Some(parts) => parts,
            None => return Ok(Vec::new()),
        };
        let sql = format!(
            "SELECT {UNIT_COLUMNS}, {} FROM content_units \
             WHERE chapter = ? AND {scope_clause} ORDER BY page_index ASC LIMIT ?",
            content_column(with_content, ""),
        );
        let mut query = sqlx::query(&sql).bind(chapter);
        for id in scope_ids {
            query = query.bind(id);
        }
        let rows = query.bind(result_cap(limit) as i64).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_unit).collect()
    }

    async fn sample_file(
        &self,
        file_id: &str,
        page_numbers: Option<&[i64]>,
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        let page_clause = match page_numbers {
            Some(pages) if !pages.is_empty() => {
                let placeholders = vec!["?"; pages.len()].join(", ");
                format!(" AND page_number IN ({placeholders})")
            }
            _ => String::new(),
        };
        let sql = format!(
            "SELECT {UNIT_COLUMNS}, {} FROM content_units \
             WHERE file_id = ?{page_clause} ORDER BY RANDOM() LIMIT ?",
            content_column(with_content, ""),
        );
        let mut query = sqlx::query(&sql).bind(file_id);
        if let Some(pages) = page_numbers {
            for page in pages {
                query = query.bind(page);
            }
        }
        let rows = query.bind(result_cap(limit) as i64).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_unit).collect()
    }

    async fn sample_courses(
        &self,
        course_ids: &[String],
        limit: i64,
        with_content: bool,
    ) -> Result<Vec<UnitRow>> {
        if course_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; course_ids.len()].join(", ");
        let sql = format!(
            "SELECT {UNIT_COLUMNS}, {} FROM content_units \
             WHERE course_id IN ({placeholders}) ORDER BY RANDOM() LIMIT ?",
            content_column(with_content, ""),
        );
        let mut query = sqlx::query(&sql);
        for id in course_ids {
            query = query.bind(id);
        }
        let rows = query.bind(result_cap(limit) as i64).fetch_all(&self.pool).await?;
        rows.iter().map(row_to_unit).collect()
    }
}
