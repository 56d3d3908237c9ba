use chrono::{DateTime, Utc};
use sqlx::Row;

use bookflow_core::domain::resource::{
    AvailabilityConfig, NewResource, ResourceId, ResourceType, SchedulableResource,
};

use super::{RepositoryError, ResourceRepository};
use crate::DbPool;

pub struct SqlResourceRepository {
    pool: DbPool,
}

impl SqlResourceRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

pub(crate) fn parse_timestamp(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

pub(crate) fn parse_optional_timestamp(value: Option<String>) -> Option<DateTime<Utc>> {
    value.and_then(|s| DateTime::parse_from_rfc3339(&s).ok()).map(|dt| dt.with_timezone(&Utc))
}

fn row_to_resource(row: &sqlx::sqlite::SqliteRow) -> Result<SchedulableResource, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let org_id: String =
        row.try_get("org_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resource_type_str: String =
        row.try_get("resource_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let max_concurrent_bookings: i64 = row
        .try_get("max_concurrent_bookings")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let availability_json: String =
        row.try_get("availability").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let linked_team: Option<String> =
        row.try_get("linked_team").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let external_resource_id: Option<String> =
        row.try_get("external_resource_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let service_type: String =
        row.try_get("service_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_active: bool =
        row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let resource_type = ResourceType::parse(&resource_type_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown resource type `{resource_type_str}`"))
    })?;
    let availability: AvailabilityConfig = serde_json::from_str(&availability_json)
        .map_err(|e| RepositoryError::Decode(format!("availability config: {e}")))?;

    Ok(SchedulableResource {
        id: ResourceId(id),
        org_id,
        name,
        resource_type,
        description,
        max_concurrent_bookings,
        availability,
        linked_team,
        external_resource_id,
        service_type,
        is_active,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

const SELECT_COLUMNS: &str = "id, org_id, name, resource_type, description,
        max_concurrent_bookings, availability, linked_team, external_resource_id,
        service_type, is_active, created_at, updated_at";

#[async_trait::async_trait]
impl ResourceRepository for SqlResourceRepository {
    async fn create(&self, new: NewResource) -> Result<SchedulableResource, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let availability_json = serde_json::to_string(&new.availability)
            .map_err(|e| RepositoryError::Decode(format!("availability config: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO schedulable_resource
                 (org_id, name, resource_type, description, max_concurrent_bookings,
                  availability, linked_team, external_resource_id, service_type,
                  is_active, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 1, ?, ?)",
        )
        .bind(&new.org_id)
        .bind(&new.name)
        .bind(new.resource_type.as_str())
        .bind(&new.description)
        .bind(new.max_concurrent_bookings)
        .bind(&availability_json)
        .bind(&new.linked_team)
        .bind(&new.external_resource_id)
        .bind(&new.service_type)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM schedulable_resource WHERE id = ?"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await?;
        row_to_resource(&row)
    }

    async fn find_by_id(
        &self,
        org_id: &str,
        id: ResourceId,
    ) -> Result<Option<SchedulableResource>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM schedulable_resource WHERE id = ? AND org_id = ?"
        ))
        .bind(id.0)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_resource(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_external_id(
        &self,
        org_id: &str,
        service_type: &str,
        external_resource_id: &str,
    ) -> Result<Option<SchedulableResource>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM schedulable_resource
             WHERE org_id = ? AND service_type = ? AND external_resource_id = ?"
        ))
        .bind(org_id)
        .bind(service_type)
        .bind(external_resource_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_resource(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_org(
        &self,
        org_id: &str,
        only_active: bool,
    ) -> Result<Vec<SchedulableResource>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if only_active {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM schedulable_resource
                 WHERE org_id = ? AND is_active = 1 ORDER BY name ASC"
            ))
            .bind(org_id)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM schedulable_resource
                 WHERE org_id = ? ORDER BY name ASC"
            ))
            .bind(org_id)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_resource).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, resource: SchedulableResource) -> Result<(), RepositoryError> {
        let availability_json = serde_json::to_string(&resource.availability)
            .map_err(|e| RepositoryError::Decode(format!("availability config: {e}")))?;

        sqlx::query(
            "UPDATE schedulable_resource SET
                 name = ?, resource_type = ?, description = ?, max_concurrent_bookings = ?,
                 availability = ?, linked_team = ?, external_resource_id = ?,
                 service_type = ?, is_active = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&resource.name)
        .bind(resource.resource_type.as_str())
        .bind(&resource.description)
        .bind(resource.max_concurrent_bookings)
        .bind(&availability_json)
        .bind(&resource.linked_team)
        .bind(&resource.external_resource_id)
        .bind(&resource.service_type)
        .bind(resource.is_active)
        .bind(Utc::now().to_rfc3339())
        .bind(resource.id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
