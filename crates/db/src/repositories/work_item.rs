use chrono::Utc;
use sqlx::Row;
use uuid::Uuid;

use bookflow_core::domain::booking::BookingPriority;
use bookflow_core::domain::work_item::{
    NewWorkItem, WorkItem, WorkItemHistory, WorkItemHistoryId, WorkItemId,
};
use bookflow_core::domain::workflow::{StepId, WorkflowId};
use bookflow_core::workflow::lifecycle::TransitionPlan;

use super::resource::{parse_optional_timestamp, parse_timestamp};
use super::{RepositoryError, WorkItemRepository};
use crate::DbPool;

pub struct SqlWorkItemRepository {
    pool: DbPool,
}

impl SqlWorkItemRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_work_item(row: &sqlx::sqlite::SqliteRow) -> Result<WorkItem, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let uuid_str: String =
        row.try_get("uuid").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let org_id: String =
        row.try_get("org_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let workflow_id: i64 =
        row.try_get("workflow_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let current_step: i64 =
        row.try_get("current_step").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority_str: String =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let data_json: String =
        row.try_get("data").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_completed: bool =
        row.try_get("is_completed").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let completed_at: Option<String> =
        row.try_get("completed_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: String =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let uuid = Uuid::parse_str(&uuid_str)
        .map_err(|e| RepositoryError::Decode(format!("work item uuid: {e}")))?;
    let priority = BookingPriority::parse(&priority_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown priority `{priority_str}`")))?;
    let data: serde_json::Value = serde_json::from_str(&data_json)
        .map_err(|e| RepositoryError::Decode(format!("work item data: {e}")))?;

    Ok(WorkItem {
        id: WorkItemId(id),
        uuid,
        org_id,
        workflow_id: WorkflowId(workflow_id),
        current_step: StepId(current_step),
        title,
        description,
        priority,
        data,
        is_completed,
        completed_at: parse_optional_timestamp(completed_at),
        created_by,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn row_to_history(row: &sqlx::sqlite::SqliteRow) -> Result<WorkItemHistory, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let work_item_id: i64 =
        row.try_get("work_item_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let from_step: Option<i64> =
        row.try_get("from_step").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let to_step: i64 =
        row.try_get("to_step").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let changed_by: String =
        row.try_get("changed_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let notes: String = row.try_get("notes").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let snapshot_json: String =
        row.try_get("data_snapshot").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let data_snapshot: serde_json::Value = serde_json::from_str(&snapshot_json)
        .map_err(|e| RepositoryError::Decode(format!("history snapshot: {e}")))?;

    Ok(WorkItemHistory {
        id: WorkItemHistoryId(id),
        work_item_id: WorkItemId(work_item_id),
        from_step: from_step.map(StepId),
        to_step: StepId(to_step),
        changed_by,
        notes,
        data_snapshot,
        created_at: parse_timestamp(&created_at_str),
    })
}

const ITEM_COLUMNS: &str = "id, uuid, org_id, workflow_id, current_step, title, description,
        priority, data, is_completed, completed_at, created_by, created_at, updated_at";

const HISTORY_COLUMNS: &str =
    "id, work_item_id, from_step, to_step, changed_by, notes, data_snapshot, created_at";

#[async_trait::async_trait]
impl WorkItemRepository for SqlWorkItemRepository {
    async fn create(
        &self,
        new: NewWorkItem,
        current_step: StepId,
    ) -> Result<WorkItem, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let uuid = Uuid::new_v4();
        let data_json = serde_json::to_string(&new.data)
            .map_err(|e| RepositoryError::Decode(format!("work item data: {e}")))?;

        let mut tx = self.pool.begin().await?;

        let item_id = sqlx::query(
            "INSERT INTO work_item
                 (uuid, org_id, workflow_id, current_step, title, description, priority,
                  data, is_completed, created_by, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, ?)",
        )
        .bind(uuid.to_string())
        .bind(&new.org_id)
        .bind(new.workflow_id.0)
        .bind(current_step.0)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.priority.as_str())
        .bind(&data_json)
        .bind(&new.created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO work_item_history
                 (work_item_id, from_step, to_step, changed_by, notes, data_snapshot, created_at)
             VALUES (?, NULL, ?, ?, '', ?, ?)",
        )
        .bind(item_id)
        .bind(current_step.0)
        .bind(&new.created_by)
        .bind(&data_json)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        let row = sqlx::query(&format!("SELECT {ITEM_COLUMNS} FROM work_item WHERE id = ?"))
            .bind(item_id)
            .fetch_one(&self.pool)
            .await?;
        row_to_work_item(&row)
    }

    async fn find_by_id(
        &self,
        org_id: &str,
        id: WorkItemId,
    ) -> Result<Option<WorkItem>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {ITEM_COLUMNS} FROM work_item WHERE id = ? AND org_id = ?"
        ))
        .bind(id.0)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_work_item(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_org(
        &self,
        org_id: &str,
        only_open: bool,
    ) -> Result<Vec<WorkItem>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if only_open {
            sqlx::query(&format!(
                "SELECT {ITEM_COLUMNS} FROM work_item
                 WHERE org_id = ? AND is_completed = 0 ORDER BY created_at DESC"
            ))
            .bind(org_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {ITEM_COLUMNS} FROM work_item
                 WHERE org_id = ? ORDER BY created_at DESC"
            ))
            .bind(org_id)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_work_item).collect::<Result<Vec<_>, _>>()
    }

    async fn apply_transition(
        &self,
        plan: &TransitionPlan,
    ) -> Result<WorkItemHistory, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let snapshot_json = serde_json::to_string(&plan.history.data_snapshot)
            .map_err(|e| RepositoryError::Decode(format!("history snapshot: {e}")))?;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "UPDATE work_item SET
                 current_step = ?, data = ?, is_completed = ?, completed_at = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(plan.item.current_step.0)
        .bind(
            serde_json::to_string(&plan.item.data)
                .map_err(|e| RepositoryError::Decode(format!("work item data: {e}")))?,
        )
        .bind(plan.item.is_completed)
        .bind(plan.item.completed_at.map(|dt| dt.to_rfc3339()))
        .bind(plan.item.updated_at.to_rfc3339())
        .bind(plan.item.id.0)
        .execute(&mut *tx)
        .await?;

        let history_id = sqlx::query(
            "INSERT INTO work_item_history
                 (work_item_id, from_step, to_step, changed_by, notes, data_snapshot, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(plan.history.work_item_id.0)
        .bind(plan.history.from_step.map(|s| s.0))
        .bind(plan.history.to_step.0)
        .bind(&plan.history.changed_by)
        .bind(&plan.history.notes)
        .bind(&snapshot_json)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        tx.commit().await?;

        let row = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM work_item_history WHERE id = ?"
        ))
        .bind(history_id)
        .fetch_one(&self.pool)
        .await?;
        row_to_history(&row)
    }

    async fn list_history(
        &self,
        work_item_id: WorkItemId,
    ) -> Result<Vec<WorkItemHistory>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {HISTORY_COLUMNS} FROM work_item_history
             WHERE work_item_id = ? ORDER BY id ASC"
        ))
        .bind(work_item_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_history).collect::<Result<Vec<_>, _>>()
    }
}
