use chrono::Utc;
use sqlx::Row;

use bookflow_core::domain::resource::ResourceId;
use bookflow_core::domain::rule::{NewRule, ResourceScheduleRule, RuleConfig, RuleId};

use super::resource::{parse_optional_timestamp, parse_timestamp};
use super::{RepositoryError, RuleRepository};
use crate::DbPool;

pub struct SqlRuleRepository {
    pool: DbPool,
}

impl SqlRuleRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_rule(row: &sqlx::sqlite::SqliteRow) -> Result<ResourceScheduleRule, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resource_id: i64 =
        row.try_get("resource_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let config_json: String =
        row.try_get("config").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority: i64 =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let effective_start: Option<String> =
        row.try_get("effective_start").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let effective_end: Option<String> =
        row.try_get("effective_end").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_active: bool =
        row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let config: RuleConfig = serde_json::from_str(&config_json)
        .map_err(|e| RepositoryError::Decode(format!("rule config: {e}")))?;

    Ok(ResourceScheduleRule {
        id: RuleId(id),
        resource_id: ResourceId(resource_id),
        name,
        description,
        config,
        priority,
        effective_start: parse_optional_timestamp(effective_start),
        effective_end: parse_optional_timestamp(effective_end),
        is_active,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

const SELECT_COLUMNS: &str = "id, resource_id, name, description, config, priority,
        effective_start, effective_end, is_active, created_at, updated_at";

#[async_trait::async_trait]
impl RuleRepository for SqlRuleRepository {
    async fn create(&self, new: NewRule) -> Result<ResourceScheduleRule, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let config_json = serde_json::to_string(&new.config)
            .map_err(|e| RepositoryError::Decode(format!("rule config: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO resource_schedule_rule
                 (resource_id, name, description, config, priority,
                  effective_start, effective_end, is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(new.resource_id.0)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&config_json)
        .bind(new.priority)
        .bind(new.effective_start.map(|dt| dt.to_rfc3339()))
        .bind(new.effective_end.map(|dt| dt.to_rfc3339()))
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM resource_schedule_rule WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        row_to_rule(&row)
    }

    async fn find_by_id(
        &self,
        id: RuleId,
    ) -> Result<Option<ResourceScheduleRule>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM resource_schedule_rule WHERE id = ?"
        ))
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_rule(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_resource(
        &self,
        resource_id: ResourceId,
        only_active: bool,
    ) -> Result<Vec<ResourceScheduleRule>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if only_active {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM resource_schedule_rule
                 WHERE resource_id = ? AND is_active = 1
                 ORDER BY priority ASC, id ASC"
            ))
            .bind(resource_id.0)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM resource_schedule_rule
                 WHERE resource_id = ?
                 ORDER BY priority ASC, id ASC"
            ))
            .bind(resource_id.0)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_rule).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, rule: ResourceScheduleRule) -> Result<(), RepositoryError> {
        let config_json = serde_json::to_string(&rule.config)
            .map_err(|e| RepositoryError::Decode(format!("rule config: {e}")))?;

        sqlx::query(
            "UPDATE resource_schedule_rule SET
                 name = ?, description = ?, config = ?, priority = ?,
                 effective_start = ?, effective_end = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&rule.name)
        .bind(&rule.description)
        .bind(&config_json)
        .bind(rule.priority)
        .bind(rule.effective_start.map(|dt| dt.to_rfc3339()))
        .bind(rule.effective_end.map(|dt| dt.to_rfc3339()))
        .bind(rule.is_active)
        .bind(Utc::now().to_rfc3339())
        .bind(rule.id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
