// src/engine/questions.rs

//! Admin side of the question bank. Questions are never deleted: the usage
//! ledger and recorded answers point at them.

use serde_json::json;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder, types::Json};

use crate::{
    engine::normalize::normalize_question_text,
    error::AppError,
    models::question::{
        CreateQuestionRequest, Difficulty, ImportQuestionRow, ImportSummary, MAX_OPTIONS,
        MIN_OPTIONS, Question, QuestionListParams, QuestionStatus, QuestionVersion,
        UpdateQuestionRequest, ensure_correct_index,
    },
    utils::html::clean_text,
};

const QUESTION_COLUMNS: &str = "id, question_text, normalized_text, options, correct_index, \
     difficulty, status, source, tags, is_active, created_by, created_at, updated_at";

const DEFAULT_PAGE: i64 = 50;
const MAX_PAGE: i64 = 200;

/// Fields of a question ready to be written.
#[derive(Debug, Clone, PartialEq)]
struct QuestionContent {
    question_text: String,
    options: Vec<String>,
    correct_index: i32,
    difficulty: Difficulty,
    source: Option<String>,
    tags: Vec<String>,
}

impl QuestionContent {
    /// Sanitizes text fields and checks the result is still a usable question.
    fn sanitized(mut self) -> Result<Self, AppError> {
        self.question_text = clean_text(&self.question_text);
        self.options = self.options.iter().map(|o| clean_text(o)).collect();
        self.tags = self
            .tags
            .iter()
            .map(|t| t.trim().to_lowercase())
            .filter(|t| !t.is_empty())
            .collect();
        self.source = self
            .source
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        if self.question_text.is_empty() {
            return Err(AppError::BadRequest("Question text is empty".to_string()));
        }
        if self.options.len() < MIN_OPTIONS || self.options.len() > MAX_OPTIONS {
            return Err(AppError::BadRequest(format!(
                "A question needs between {} and {} options",
                MIN_OPTIONS, MAX_OPTIONS
            )));
        }
        if self.options.iter().any(|o| o.is_empty()) {
            return Err(AppError::BadRequest("Options cannot be empty".to_string()));
        }
        ensure_correct_index(&self.options, self.correct_index as i64)?;
        Ok(self)
    }

    /// Builds content from a loosely typed import row, `None` if unusable.
    fn from_import(row: &ImportQuestionRow) -> Option<Self> {
        let correct_index = i32::try_from(row.correct_index?).ok()?;
        let difficulty = row.difficulty.as_deref()?.parse::<Difficulty>().ok()?;
        QuestionContent {
            question_text: row.question_text.clone()?,
            options: row.options.clone(),
            correct_index,
            difficulty,
            source: Some(row.source.clone().unwrap_or_else(|| "import".to_string())),
            tags: row.tags.clone(),
        }
        .sanitized()
        .ok()
    }

    fn from_question(q: &Question) -> Result<Self, AppError> {
        Ok(QuestionContent {
            question_text: q.question_text.clone(),
            options: q.options.0.clone(),
            correct_index: q.correct_index,
            difficulty: q.difficulty.parse()?,
            source: q.source.clone(),
            tags: q.tags.0.clone(),
        })
    }

    fn apply(mut self, patch: UpdateQuestionRequest) -> Self {
        if let Some(text) = patch.question_text {
            self.question_text = text;
        }
        if let Some(options) = patch.options {
            self.options = options;
        }
        if let Some(idx) = patch.correct_index {
            self.correct_index = idx;
        }
        if let Some(difficulty) = patch.difficulty {
            self.difficulty = difficulty;
        }
        if let Some(source) = patch.source {
            self.source = Some(source);
        }
        if let Some(tags) = patch.tags {
            self.tags = tags;
        }
        self
    }
}

async fn insert_question(
    conn: &mut PgConnection,
    content: &QuestionContent,
    status: QuestionStatus,
    created_by: &str,
) -> Result<Question, AppError> {
    let question = sqlx::query_as::<_, Question>(&format!(
        r#"
        INSERT INTO questions
            (question_text, normalized_text, options, correct_index, difficulty, status, source, tags, created_by)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(&content.question_text)
    .bind(normalize_question_text(&content.question_text))
    .bind(Json(&content.options))
    .bind(content.correct_index)
    .bind(content.difficulty.as_str())
    .bind(status.as_str())
    .bind(&content.source)
    .bind(Json(&content.tags))
    .bind(created_by)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| {
        tracing::error!("Failed to create question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    Ok(question)
}

async fn fetch_question(
    conn: &mut PgConnection,
    id: i64,
    for_update: bool,
) -> Result<Question, AppError> {
    let lock = if for_update { " FOR UPDATE" } else { "" };
    sqlx::query_as::<_, Question>(&format!(
        "SELECT {QUESTION_COLUMNS} FROM questions WHERE id = $1{lock}"
    ))
    .bind(id)
    .fetch_optional(&mut *conn)
    .await?
    .ok_or(AppError::NotFound("Question not found".to_string()))
}

/// Appends the current state of `question` to its edit history.
async fn record_version(
    conn: &mut PgConnection,
    question: &Question,
    edited_by: &str,
) -> Result<(), AppError> {
    let snapshot = json!({
        "question_text": question.question_text,
        "options": question.options.0,
        "correct_index": question.correct_index,
        "difficulty": question.difficulty,
        "status": question.status,
        "source": question.source,
        "tags": question.tags.0,
        "is_active": question.is_active,
    });

    sqlx::query(
        r#"
        INSERT INTO question_versions (question_id, version, snapshot, edited_by)
        SELECT $1, COALESCE(MAX(version), 0) + 1, $2, $3
        FROM question_versions
        WHERE question_id = $1
        "#,
    )
    .bind(question.id)
    .bind(&snapshot)
    .bind(edited_by)
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Adds a question to the bank. New questions start as drafts unless a
/// status is given.
pub async fn create_question(
    pool: &PgPool,
    payload: CreateQuestionRequest,
    created_by: &str,
) -> Result<Question, AppError> {
    let status = payload.status.unwrap_or(QuestionStatus::Draft);
    let content = QuestionContent {
        question_text: payload.question_text,
        options: payload.options,
        correct_index: payload.correct_index,
        difficulty: payload.difficulty,
        source: payload.source,
        tags: payload.tags,
    }
    .sanitized()?;

    let mut conn = pool.acquire().await?;
    let question = insert_question(&mut conn, &content, status, created_by).await?;
    tracing::info!(question_id = question.id, by = %created_by, "Question created");
    Ok(question)
}

/// Applies a partial edit, keeping the previous content as a new version.
pub async fn update_question(
    pool: &PgPool,
    id: i64,
    patch: UpdateQuestionRequest,
    edited_by: &str,
) -> Result<Question, AppError> {
    let mut tx = pool.begin().await?;
    let current = fetch_question(&mut tx, id, true).await?;

    if patch.is_empty() {
        tx.commit().await?;
        return Ok(current);
    }

    let after = QuestionContent::from_question(&current)?
        .apply(patch)
        .sanitized()?;

    record_version(&mut tx, &current, edited_by).await?;

    let updated = sqlx::query_as::<_, Question>(&format!(
        r#"
        UPDATE questions
        SET question_text = $2,
            normalized_text = $3,
            options = $4,
            correct_index = $5,
            difficulty = $6,
            source = $7,
            tags = $8,
            updated_at = NOW()
        WHERE id = $1
        RETURNING {QUESTION_COLUMNS}
        "#
    ))
    .bind(id)
    .bind(&after.question_text)
    .bind(normalize_question_text(&after.question_text))
    .bind(Json(&after.options))
    .bind(after.correct_index)
    .bind(after.difficulty.as_str())
    .bind(&after.source)
    .bind(Json(&after.tags))
    .fetch_one(&mut *tx)
    .await
    .map_err(|e| {
        tracing::error!("Failed to update question: {:?}", e);
        AppError::InternalServerError(e.to_string())
    })?;

    tx.commit().await?;
    tracing::info!(question_id = id, by = %edited_by, "Question updated");
    Ok(updated)
}

/// Moves a question along its editorial lifecycle, keeping the previous
/// state as a new version.
pub async fn set_status(
    pool: &PgPool,
    id: i64,
    status: QuestionStatus,
    edited_by: &str,
) -> Result<Question, AppError> {
    let mut tx = pool.begin().await?;
    let current = fetch_question(&mut tx, id, true).await?;

    let from = current
        .status
        .as_deref()
        .map(str::parse::<QuestionStatus>)
        .transpose()?;
    if !QuestionStatus::can_transition(from, status) {
        return Err(AppError::BadRequest(format!(
            "Cannot move question from {} to {}",
            current.status.as_deref().unwrap_or("none"),
            status.as_str()
        )));
    }

    record_version(&mut tx, &current, edited_by).await?;

    let updated = sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET status = $2, updated_at = NOW() WHERE id = $1 RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(id)
    .bind(status.as_str())
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    tracing::info!(question_id = id, status = status.as_str(), by = %edited_by, "Question status changed");
    Ok(updated)
}

pub async fn set_active(
    pool: &PgPool,
    id: i64,
    is_active: bool,
    edited_by: &str,
) -> Result<Question, AppError> {
    let mut tx = pool.begin().await?;
    let current = fetch_question(&mut tx, id, true).await?;
    record_version(&mut tx, &current, edited_by).await?;

    let updated = sqlx::query_as::<_, Question>(&format!(
        "UPDATE questions SET is_active = $2, updated_at = NOW() WHERE id = $1 RETURNING {QUESTION_COLUMNS}"
    ))
    .bind(id)
    .bind(is_active)
    .fetch_one(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(updated)
}

/// Filtered page of the bank, newest first.
pub async fn list_questions(
    pool: &PgPool,
    params: &QuestionListParams,
) -> Result<Vec<Question>, AppError> {
    let limit = params.limit.unwrap_or(DEFAULT_PAGE).clamp(1, MAX_PAGE);
    let offset = params.offset.unwrap_or(0).max(0);

    let mut builder: QueryBuilder<Postgres> =
        QueryBuilder::new(format!("SELECT {QUESTION_COLUMNS} FROM questions q WHERE TRUE"));

    if let Some(status) = params.status {
        builder.push(" AND q.status = ");
        builder.push_bind(status.as_str());
    }
    if let Some(difficulty) = params.difficulty {
        builder.push(" AND q.difficulty = ");
        builder.push_bind(difficulty.as_str());
    }
    match params.used {
        Some(true) => {
            builder.push(" AND EXISTS (SELECT 1 FROM question_usage u WHERE u.question_id = q.id)");
        }
        Some(false) => {
            builder.push(
                " AND NOT EXISTS (SELECT 1 FROM question_usage u WHERE u.question_id = q.id)",
            );
        }
        None => {}
    }

    builder.push(" ORDER BY q.created_at DESC, q.id DESC LIMIT ");
    builder.push_bind(limit);
    builder.push(" OFFSET ");
    builder.push_bind(offset);

    let questions = builder
        .build_query_as::<Question>()
        .fetch_all(pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to list questions: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

    Ok(questions)
}

/// Edit history of a question, oldest first.
pub async fn list_versions(pool: &PgPool, id: i64) -> Result<Vec<QuestionVersion>, AppError> {
    let mut conn = pool.acquire().await?;
    fetch_question(&mut conn, id, false).await?;

    let versions = sqlx::query_as::<_, QuestionVersion>(
        r#"
        SELECT id, question_id, version, snapshot, edited_by, created_at
        FROM question_versions
        WHERE question_id = $1
        ORDER BY version
        "#,
    )
    .bind(id)
    .fetch_all(&mut *conn)
    .await?;

    Ok(versions)
}

/// Bulk insert in one transaction. Unusable rows are skipped and counted.
/// Imported questions are validated unless the row says otherwise.
pub async fn import_questions(
    pool: &PgPool,
    rows: &[ImportQuestionRow],
    created_by: &str,
) -> Result<ImportSummary, AppError> {
    let mut tx = pool.begin().await?;
    let mut summary = ImportSummary {
        inserted: 0,
        skipped: 0,
    };

    for row in rows {
        match QuestionContent::from_import(row) {
            Some(content) => {
                let status = row.status.unwrap_or(QuestionStatus::Validated);
                insert_question(&mut tx, &content, status, created_by).await?;
                summary.inserted += 1;
            }
            None => summary.skipped += 1,
        }
    }

    tx.commit().await?;
    tracing::info!(
        inserted = summary.inserted,
        skipped = summary.skipped,
        by = %created_by,
        "Questions imported"
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(text: Option<&str>, options: &[&str], idx: Option<i64>, diff: Option<&str>) -> ImportQuestionRow {
        ImportQuestionRow {
            question_text: text.map(String::from),
            options: options.iter().map(|s| s.to_string()).collect(),
            correct_index: idx,
            difficulty: diff.map(String::from),
            status: None,
            source: None,
            tags: vec![],
        }
    }

    #[test]
    fn test_import_row_accepts_valid() {
        let content =
            QuestionContent::from_import(&row(Some("Capitale ?"), &["A", "B"], Some(1), Some("Easy")))
                .unwrap();
        assert_eq!(content.difficulty, Difficulty::Easy);
        assert_eq!(content.source.as_deref(), Some("import"));
    }

    #[test]
    fn test_import_row_rejects_unusable() {
        assert!(QuestionContent::from_import(&row(None, &["A", "B"], Some(0), Some("easy"))).is_none());
        assert!(QuestionContent::from_import(&row(Some("Q"), &["A"], Some(0), Some("easy"))).is_none());
        assert!(QuestionContent::from_import(&row(Some("Q"), &["A", "B"], Some(2), Some("easy"))).is_none());
        assert!(QuestionContent::from_import(&row(Some("Q"), &["A", "B"], Some(0), Some("expert"))).is_none());
        assert!(QuestionContent::from_import(&row(Some("Q"), &["A", "B"], None, Some("easy"))).is_none());
        assert!(QuestionContent::from_import(&row(Some("<b></b>"), &["A", "B"], Some(0), Some("easy"))).is_none());
    }

    #[test]
    fn test_patch_rechecks_correct_index() {
        let base = QuestionContent {
            question_text: "Q".to_string(),
            options: vec!["A".into(), "B".into(), "C".into()],
            correct_index: 2,
            difficulty: Difficulty::Medium,
            source: None,
            tags: vec![],
        };
        let patch = UpdateQuestionRequest {
            question_text: None,
            options: Some(vec!["A".into(), "B".into()]),
            correct_index: None,
            difficulty: None,
            source: None,
            tags: None,
        };
        assert!(base.clone().apply(patch).sanitized().is_err());
    }

    #[test]
    fn test_sanitized_strips_markup_and_normalizes_tags() {
        let content = QuestionContent {
            question_text: "<i>Qui</i> était Noé ?".to_string(),
            options: vec!["Un prophète".into(), "<b>Un roi</b>".into()],
            correct_index: 0,
            difficulty: Difficulty::Easy,
            source: Some("  ".into()),
            tags: vec![" Prophètes ".into(), "".into()],
        }
        .sanitized()
        .unwrap();
        assert_eq!(content.question_text, "Qui était Noé ?");
        assert_eq!(content.options[1], "Un roi");
        assert_eq!(content.tags, vec!["prophètes".to_string()]);
        assert_eq!(content.source, None);
    }

    #[test]
    fn test_nbsp_variant_shares_normalized_key() {
        let content = |text: &str| QuestionContent {
            question_text: text.to_string(),
            options: vec!["Salah & Zakat".into(), "Hajj".into()],
            correct_index: 0,
            difficulty: Difficulty::Easy,
            source: None,
            tags: vec![],
        }
        .sanitized()
        .unwrap();

        let spaced = content("Où se trouve la Kaaba ?");
        let nbsp = content("Où se trouve la Kaaba\u{a0}?");
        assert_eq!(
            normalize_question_text(&spaced.question_text),
            normalize_question_text(&nbsp.question_text)
        );
        assert_eq!(nbsp.options[0], "Salah & Zakat");
    }
}
