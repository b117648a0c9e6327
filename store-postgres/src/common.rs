use chrono::{DateTime, Utc};
use orchestrator_core::error::CoreError;
use orchestrator_core::ids::{AgentId, TaskId, TenantId};
use orchestrator_core::models::{CompletionMode, CoordinationMode, Task, TaskStatus};
use sqlx::{postgres::PgRow, Row};

pub fn status_to_str(status: TaskStatus) -> &'static str {
    match status {
        TaskStatus::Pending => "Pending",
        TaskStatus::Assigned => "Assigned",
        TaskStatus::Accepted => "Accepted",
        TaskStatus::InProgress => "InProgress",
        TaskStatus::Completed => "Completed",
        TaskStatus::Failed => "Failed",
        TaskStatus::Rejected => "Rejected",
        TaskStatus::Cancelled => "Cancelled",
        TaskStatus::TimedOut => "TimedOut",
    }
}

pub fn str_to_status(s: &str) -> Result<TaskStatus, CoreError> {
    match s {
        "Pending" => Ok(TaskStatus::Pending),
        "Assigned" => Ok(TaskStatus::Assigned),
        "Accepted" => Ok(TaskStatus::Accepted),
        "InProgress" => Ok(TaskStatus::InProgress),
        "Completed" => Ok(TaskStatus::Completed),
        "Failed" => Ok(TaskStatus::Failed),
        "Rejected" => Ok(TaskStatus::Rejected),
        "Cancelled" => Ok(TaskStatus::Cancelled),
        "TimedOut" => Ok(TaskStatus::TimedOut),
        other => Err(CoreError::Internal(format!("invalid task status in database: {other}"))),
    }
}

pub fn coordination_mode_to_str(mode: CoordinationMode) -> &'static str {
    match mode {
        CoordinationMode::Sequential => "Sequential",
        CoordinationMode::Parallel => "Parallel",
    }
}

pub fn str_to_coordination_mode(s: &str) -> Result<CoordinationMode, CoreError> {
    match s {
        "Sequential" => Ok(CoordinationMode::Sequential),
        "Parallel" => Ok(CoordinationMode::Parallel),
        other => Err(CoreError::Internal(format!("invalid coordination mode: {other}"))),
    }
}

pub fn completion_mode_to_str(mode: CompletionMode) -> &'static str {
    match mode {
        CompletionMode::All => "All",
        CompletionMode::Any => "Any",
        CompletionMode::Majority => "Majority",
    }
}

pub fn str_to_completion_mode(s: &str) -> Result<CompletionMode, CoreError> {
    match s {
        "All" => Ok(CompletionMode::All),
        "Any" => Ok(CompletionMode::Any),
        "Majority" => Ok(CompletionMode::Majority),
        other => Err(CoreError::Internal(format!("invalid completion mode: {other}"))),
    }
}

pub fn row_to_task(row: &PgRow) -> Result<Task, CoreError> {
    let status_str: String = row.get("status");
    let tags_json: serde_json::Value = row.get("tags");
    let tags: Vec<String> = serde_json::from_value(tags_json).unwrap_or_default();

    let coordination_mode: Option<String> = row.get("coordination_mode");
    let completion_mode: Option<String> = row.get("completion_mode");

    Ok(Task {
        id: TaskId::from_uuid(row.get("id")),
        tenant_id: TenantId::from_uuid(row.get("tenant_id")),
        task_type: row.get("task_type"),
        created_by: AgentId::new(row.get::<String, _>("created_by")),
        created_at: row.get::<DateTime<Utc>, _>("created_at"),
        parent_task_id: row
            .get::<Option<uuid::Uuid>, _>("parent_task_id")
            .map(TaskId::from_uuid),
        status: str_to_status(&status_str)?,
        priority: row.get("priority"),
        assigned_to: row
            .get::<Option<String>, _>("assigned_to")
            .map(AgentId::new),
        assigned_at: row.get("assigned_at"),
        started_at: row.get("started_at"),
        completed_at: row.get("completed_at"),
        retry_count: row.get::<i32, _>("retry_count") as u32,
        max_retries: row.get::<i32, _>("max_retries") as u32,
        timeout_seconds: row.get("timeout_seconds"),
        parameters: row.get("parameters"),
        result: row.get("result"),
        tags,
        title: row.get("title"),
        description: row.get("description"),
        coordination_mode: coordination_mode.map(|s| str_to_coordination_mode(&s)).transpose()?,
        completion_mode: completion_mode.map(|s| str_to_completion_mode(&s)).transpose()?,
    })
}

/// Map an `sqlx::Error` onto the stable core taxonomy. Unique-violation
/// (`23505`) surfaces as `CoreError::Conflict` since every unique
/// constraint in this schema backs an optimistic-concurrency or
/// idempotency guarantee, never an unrelated duplicate-row error.
pub fn map_sqlx_error(err: sqlx::Error) -> CoreError {
    match &err {
        sqlx::Error::RowNotFound => CoreError::NotFound("row not found".to_string()),
        sqlx::Error::Database(db_err) => {
            if db_err.code().as_deref() == Some("23505") {
                CoreError::Conflict(format!("unique constraint violated: {}", db_err.message()))
            } else {
                CoreError::Internal(format!("database error: {}", db_err.message()))
            }
        }
        sqlx::Error::PoolTimedOut => CoreError::Internal("connection pool timeout".to_string()),
        other => CoreError::Internal(format!("database operation failed: {other}")),
    }
}
