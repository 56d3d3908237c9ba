use chrono::{DateTime, Utc};
use sqlx::Row;
use uuid::Uuid;

use bookflow_core::domain::booking::{
    BookingId, BookingPriority, BookingRequest, BookingStatus, NewBookingRequest, SourceRef,
};
use bookflow_core::domain::resource::ResourceId;

use super::resource::{parse_optional_timestamp, parse_timestamp};
use super::{BookingRepository, RepositoryError};
use crate::DbPool;

pub struct SqlBookingRepository {
    pool: DbPool,
}

impl SqlBookingRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_booking(row: &sqlx::sqlite::SqliteRow) -> Result<BookingRequest, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let uuid_str: String =
        row.try_get("uuid").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let org_id: String =
        row.try_get("org_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let resource_id: i64 =
        row.try_get("resource_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String = row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requested_start: String =
        row.try_get("requested_start").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requested_end: String =
        row.try_get("requested_end").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actual_start: Option<String> =
        row.try_get("actual_start").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let actual_end: Option<String> =
        row.try_get("actual_end").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let required_capacity: i64 =
        row.try_get("required_capacity").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let status_str: String =
        row.try_get("status").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let priority_str: String =
        row.try_get("priority").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let source_service: String =
        row.try_get("source_service").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let source_object_type: String =
        row.try_get("source_object_type").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let source_object_id: String =
        row.try_get("source_object_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let custom_data_json: String =
        row.try_get("custom_data").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requested_by: String =
        row.try_get("requested_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let completed_by: Option<String> =
        row.try_get("completed_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let uuid = Uuid::parse_str(&uuid_str)
        .map_err(|e| RepositoryError::Decode(format!("booking uuid: {e}")))?;
    let status = BookingStatus::parse(&status_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown booking status `{status_str}`")))?;
    let priority = BookingPriority::parse(&priority_str).ok_or_else(|| {
        RepositoryError::Decode(format!("unknown booking priority `{priority_str}`"))
    })?;
    let custom_data: serde_json::Value = serde_json::from_str(&custom_data_json)
        .map_err(|e| RepositoryError::Decode(format!("custom data: {e}")))?;

    Ok(BookingRequest {
        id: BookingId(id),
        uuid,
        org_id,
        resource_id: ResourceId(resource_id),
        title,
        description,
        requested_start: parse_timestamp(&requested_start),
        requested_end: parse_timestamp(&requested_end),
        actual_start: parse_optional_timestamp(actual_start),
        actual_end: parse_optional_timestamp(actual_end),
        required_capacity,
        status,
        priority,
        source: SourceRef {
            service: source_service,
            object_type: source_object_type,
            object_id: source_object_id,
        },
        custom_data,
        requested_by,
        completed_by,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

const SELECT_COLUMNS: &str = "id, uuid, org_id, resource_id, title, description,
        requested_start, requested_end, actual_start, actual_end, required_capacity,
        status, priority, source_service, source_object_type, source_object_id,
        custom_data, requested_by, completed_by, created_at, updated_at";

#[async_trait::async_trait]
impl BookingRepository for SqlBookingRepository {
    async fn create(
        &self,
        new: NewBookingRequest,
        status: BookingStatus,
    ) -> Result<BookingRequest, RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let uuid = Uuid::new_v4();
        let custom_data_json = serde_json::to_string(&new.custom_data)
            .map_err(|e| RepositoryError::Decode(format!("custom data: {e}")))?;

        let result = sqlx::query(
            "INSERT INTO booking_request
                 (uuid, org_id, resource_id, title, description, requested_start,
                  requested_end, required_capacity, status, priority, source_service,
                  source_object_type, source_object_id, custom_data, requested_by,
                  created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(uuid.to_string())
        .bind(&new.org_id)
        .bind(new.resource_id.0)
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.requested_start.to_rfc3339())
        .bind(new.requested_end.to_rfc3339())
        .bind(new.required_capacity)
        .bind(status.as_str())
        .bind(new.priority.as_str())
        .bind(&new.source.service)
        .bind(&new.source.object_type)
        .bind(&new.source.object_id)
        .bind(&custom_data_json)
        .bind(&new.requested_by)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool)
        .await?;

        let id = result.last_insert_rowid();
        let row =
            sqlx::query(&format!("SELECT {SELECT_COLUMNS} FROM booking_request WHERE id = ?"))
                .bind(id)
                .fetch_one(&self.pool)
                .await?;
        row_to_booking(&row)
    }

    async fn find_by_id(
        &self,
        org_id: &str,
        id: BookingId,
    ) -> Result<Option<BookingRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM booking_request WHERE id = ? AND org_id = ?"
        ))
        .bind(id.0)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn find_by_source(
        &self,
        org_id: &str,
        source: &SourceRef,
    ) -> Result<Option<BookingRequest>, RepositoryError> {
        let row = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM booking_request
             WHERE org_id = ? AND source_service = ? AND source_object_type = ? \
               AND source_object_id = ?"
        ))
        .bind(org_id)
        .bind(&source.service)
        .bind(&source.object_type)
        .bind(&source.object_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_booking(r)?)),
            None => Ok(None),
        }
    }

    async fn list_active_for_resource(
        &self,
        resource_id: ResourceId,
    ) -> Result<Vec<BookingRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM booking_request
             WHERE resource_id = ? AND status IN ('pending', 'confirmed', 'in_progress')
             ORDER BY requested_start ASC"
        ))
        .bind(resource_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }

    async fn list_in_window(
        &self,
        resource_id: ResourceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BookingRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM booking_request
             WHERE resource_id = ? AND requested_start < ? AND requested_end > ?
             ORDER BY requested_start ASC"
        ))
        .bind(resource_id.0)
        .bind(end.to_rfc3339())
        .bind(start.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }

    async fn list_for_org(
        &self,
        org_id: &str,
        status: Option<BookingStatus>,
        limit: u32,
    ) -> Result<Vec<BookingRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = if let Some(status) = status {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM booking_request
                 WHERE org_id = ? AND status = ?
                 ORDER BY requested_start DESC LIMIT ?"
            ))
            .bind(org_id)
            .bind(status.as_str())
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query(&format!(
                "SELECT {SELECT_COLUMNS} FROM booking_request
                 WHERE org_id = ?
                 ORDER BY requested_start DESC LIMIT ?"
            ))
            .bind(org_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }

    async fn list_for_work_item(
        &self,
        org_id: &str,
        work_item_id: i64,
    ) -> Result<Vec<BookingRequest>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {SELECT_COLUMNS} FROM booking_request
             WHERE org_id = ? AND json_extract(custom_data, '$.work_item_id') = ?
             ORDER BY requested_start ASC"
        ))
        .bind(org_id)
        .bind(work_item_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_booking).collect::<Result<Vec<_>, _>>()
    }

    async fn save(&self, booking: BookingRequest) -> Result<(), RepositoryError> {
        let custom_data_json = serde_json::to_string(&booking.custom_data)
            .map_err(|e| RepositoryError::Decode(format!("custom data: {e}")))?;

        sqlx::query(
            "UPDATE booking_request SET
                 title = ?, description = ?, requested_start = ?, requested_end = ?,
                 actual_start = ?, actual_end = ?, required_capacity = ?, status = ?,
                 priority = ?, custom_data = ?, completed_by = ?, updated_at = ?
             WHERE id = ?",
        )
        .bind(&booking.title)
        .bind(&booking.description)
        .bind(booking.requested_start.to_rfc3339())
        .bind(booking.requested_end.to_rfc3339())
        .bind(booking.actual_start.map(|dt| dt.to_rfc3339()))
        .bind(booking.actual_end.map(|dt| dt.to_rfc3339()))
        .bind(booking.required_capacity)
        .bind(booking.status.as_str())
        .bind(booking.priority.as_str())
        .bind(&custom_data_json)
        .bind(&booking.completed_by)
        .bind(Utc::now().to_rfc3339())
        .bind(booking.id.0)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}
