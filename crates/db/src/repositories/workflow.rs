use std::collections::HashMap;

use chrono::Utc;
use rust_decimal::Decimal;
use sqlx::Row;

use bookflow_core::domain::workflow::{
    NewWorkflow, NewWorkflowStep, NewWorkflowTransition, StepId, TransitionId, Workflow,
    WorkflowId, WorkflowStep, WorkflowTransition,
};

use super::resource::parse_timestamp;
use super::{RepositoryError, WorkflowRepository};
use crate::DbPool;

pub struct SqlWorkflowRepository {
    pool: DbPool,
}

impl SqlWorkflowRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_workflow(row: &sqlx::sqlite::SqliteRow) -> Result<Workflow, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let org_id: String =
        row.try_get("org_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_active: bool =
        row.try_get("is_active").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_by: Option<String> =
        row.try_get("created_by").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let updated_at_str: String =
        row.try_get("updated_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(Workflow {
        id: WorkflowId(id),
        org_id,
        name,
        description,
        is_active,
        created_by,
        created_at: parse_timestamp(&created_at_str),
        updated_at: parse_timestamp(&updated_at_str),
    })
}

fn row_to_step(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowStep, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let workflow_id: i64 =
        row.try_get("workflow_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let name: String = row.try_get("name").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let description: String =
        row.try_get("description").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let step_order: i64 =
        row.try_get("step_order").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let assigned_team: Option<String> =
        row.try_get("assigned_team").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let requires_booking: bool =
        row.try_get("requires_booking").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let estimated_duration_hours: Option<String> = row
        .try_get("estimated_duration_hours")
        .map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let is_terminal: bool =
        row.try_get("is_terminal").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let estimated_duration_hours = estimated_duration_hours
        .map(|s| {
            s.parse::<Decimal>()
                .map_err(|e| RepositoryError::Decode(format!("estimated duration: {e}")))
        })
        .transpose()?;

    Ok(WorkflowStep {
        id: StepId(id),
        workflow_id: WorkflowId(workflow_id),
        name,
        description,
        order: step_order,
        assigned_team,
        requires_booking,
        estimated_duration_hours,
        is_terminal,
    })
}

fn row_to_transition(row: &sqlx::sqlite::SqliteRow) -> Result<WorkflowTransition, RepositoryError> {
    let id: i64 = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let from_step: i64 =
        row.try_get("from_step").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let to_step: i64 =
        row.try_get("to_step").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let label: Option<String> =
        row.try_get("label").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    Ok(WorkflowTransition {
        id: TransitionId(id),
        from_step: StepId(from_step),
        to_step: StepId(to_step),
        label,
    })
}

const STEP_COLUMNS: &str = "id, workflow_id, name, description, step_order, assigned_team,
        requires_booking, estimated_duration_hours, is_terminal";

#[async_trait::async_trait]
impl WorkflowRepository for SqlWorkflowRepository {
    async fn create_definition(
        &self,
        new: NewWorkflow,
        steps: Vec<NewWorkflowStep>,
        transitions: Vec<NewWorkflowTransition>,
    ) -> Result<(Workflow, Vec<WorkflowStep>, Vec<WorkflowTransition>), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        let mut tx = self.pool.begin().await?;

        let workflow_id = sqlx::query(
            "INSERT INTO workflow (org_id, name, description, is_active, created_by,
                                   created_at, updated_at)
             VALUES (?, ?, ?, 1, ?, ?, ?)",
        )
        .bind(&new.org_id)
        .bind(&new.name)
        .bind(&new.description)
        .bind(&new.created_by)
        .bind(&now)
        .bind(&now)
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        let mut step_ids: HashMap<String, i64> = HashMap::with_capacity(steps.len());
        let mut stored_steps = Vec::with_capacity(steps.len());
        for step in steps {
            let step_id = sqlx::query(
                "INSERT INTO workflow_step
                     (workflow_id, name, description, step_order, assigned_team,
                      requires_booking, estimated_duration_hours, is_terminal)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(workflow_id)
            .bind(&step.name)
            .bind(&step.description)
            .bind(step.order)
            .bind(&step.assigned_team)
            .bind(step.requires_booking)
            .bind(step.estimated_duration_hours.map(|d| d.to_string()))
            .bind(step.is_terminal)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            step_ids.insert(step.name.clone(), step_id);
            stored_steps.push(WorkflowStep {
                id: StepId(step_id),
                workflow_id: WorkflowId(workflow_id),
                name: step.name,
                description: step.description,
                order: step.order,
                assigned_team: step.assigned_team,
                requires_booking: step.requires_booking,
                estimated_duration_hours: step.estimated_duration_hours,
                is_terminal: step.is_terminal,
            });
        }

        let mut stored_transitions = Vec::with_capacity(transitions.len());
        for transition in transitions {
            let from = step_ids.get(&transition.from_step).copied().ok_or_else(|| {
                RepositoryError::Decode(format!("unknown step name `{}`", transition.from_step))
            })?;
            let to = step_ids.get(&transition.to_step).copied().ok_or_else(|| {
                RepositoryError::Decode(format!("unknown step name `{}`", transition.to_step))
            })?;

            let transition_id = sqlx::query(
                "INSERT INTO workflow_transition (workflow_id, from_step, to_step, label)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(workflow_id)
            .bind(from)
            .bind(to)
            .bind(&transition.label)
            .execute(&mut *tx)
            .await?
            .last_insert_rowid();

            stored_transitions.push(WorkflowTransition {
                id: TransitionId(transition_id),
                from_step: StepId(from),
                to_step: StepId(to),
                label: transition.label,
            });
        }

        tx.commit().await?;

        let workflow = Workflow {
            id: WorkflowId(workflow_id),
            org_id: new.org_id,
            name: new.name,
            description: new.description,
            is_active: true,
            created_by: new.created_by,
            created_at: parse_timestamp(&now),
            updated_at: parse_timestamp(&now),
        };

        Ok((workflow, stored_steps, stored_transitions))
    }

    async fn find_by_id(
        &self,
        org_id: &str,
        id: WorkflowId,
    ) -> Result<Option<Workflow>, RepositoryError> {
        let row = sqlx::query(
            "SELECT id, org_id, name, description, is_active, created_by, created_at, updated_at
             FROM workflow WHERE id = ? AND org_id = ?",
        )
        .bind(id.0)
        .bind(org_id)
        .fetch_optional(&self.pool)
        .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_workflow(r)?)),
            None => Ok(None),
        }
    }

    async fn list_for_org(&self, org_id: &str) -> Result<Vec<Workflow>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, org_id, name, description, is_active, created_by, created_at, updated_at
             FROM workflow WHERE org_id = ? ORDER BY name ASC",
        )
        .bind(org_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_workflow).collect::<Result<Vec<_>, _>>()
    }

    async fn list_steps(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowStep>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(&format!(
            "SELECT {STEP_COLUMNS} FROM workflow_step
             WHERE workflow_id = ? ORDER BY step_order ASC, id ASC"
        ))
        .bind(workflow_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_step).collect::<Result<Vec<_>, _>>()
    }

    async fn find_step(&self, id: StepId) -> Result<Option<WorkflowStep>, RepositoryError> {
        let row =
            sqlx::query(&format!("SELECT {STEP_COLUMNS} FROM workflow_step WHERE id = ?"))
                .bind(id.0)
                .fetch_optional(&self.pool)
                .await?;

        match row {
            Some(ref r) => Ok(Some(row_to_step(r)?)),
            None => Ok(None),
        }
    }

    async fn list_transitions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowTransition>, RepositoryError> {
        let rows: Vec<sqlx::sqlite::SqliteRow> = sqlx::query(
            "SELECT id, from_step, to_step, label FROM workflow_transition
             WHERE workflow_id = ? ORDER BY id ASC",
        )
        .bind(workflow_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_transition).collect::<Result<Vec<_>, _>>()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use rust_decimal::Decimal;

    use bookflow_core::domain::workflow::{
        NewWorkflow, NewWorkflowStep, NewWorkflowTransition, Workflow, WorkflowStep,
        WorkflowTransition,
    };

    use super::SqlWorkflowRepository;
    use crate::repositories::resource::tests::setup;
    use crate::repositories::WorkflowRepository;

    pub(crate) fn inspection_steps() -> Vec<NewWorkflowStep> {
        vec![
            NewWorkflowStep {
                name: "intake".to_string(),
                description: String::new(),
                order: 0,
                assigned_team: Some("team-7".to_string()),
                requires_booking: true,
                estimated_duration_hours: Some(Decimal::from(2)),
                is_terminal: false,
            },
            NewWorkflowStep {
                name: "review".to_string(),
                description: String::new(),
                order: 1,
                assigned_team: None,
                requires_booking: false,
                estimated_duration_hours: None,
                is_terminal: false,
            },
            NewWorkflowStep {
                name: "done".to_string(),
                description: String::new(),
                order: 2,
                assigned_team: None,
                requires_booking: false,
                estimated_duration_hours: None,
                is_terminal: true,
            },
        ]
    }

    pub(crate) fn inspection_transitions() -> Vec<NewWorkflowTransition> {
        vec![
            NewWorkflowTransition {
                from_step: "intake".to_string(),
                to_step: "review".to_string(),
                label: Some("submit".to_string()),
            },
            NewWorkflowTransition {
                from_step: "review".to_string(),
                to_step: "done".to_string(),
                label: None,
            },
            NewWorkflowTransition {
                from_step: "done".to_string(),
                to_step: "review".to_string(),
                label: Some("reopen".to_string()),
            },
        ]
    }

    pub(crate) async fn create_inspection_workflow(
        pool: &sqlx::SqlitePool,
        org_id: &str,
    ) -> (Workflow, Vec<WorkflowStep>, Vec<WorkflowTransition>) {
        SqlWorkflowRepository::new(pool.clone())
            .create_definition(
                NewWorkflow {
                    org_id: org_id.to_string(),
                    name: "Vessel inspection".to_string(),
                    description: String::new(),
                    created_by: Some("user-1".to_string()),
                },
                inspection_steps(),
                inspection_transitions(),
            )
            .await
            .expect("create workflow definition")
    }

    #[tokio::test]
    async fn definition_round_trips_with_resolved_edges() {
        let pool = setup().await;
        let (workflow, steps, transitions) = create_inspection_workflow(&pool, "org-1").await;

        assert_eq!(steps.len(), 3);
        assert_eq!(transitions.len(), 3);

        let repo = SqlWorkflowRepository::new(pool);
        let loaded_steps = repo.list_steps(workflow.id).await.expect("list steps");
        assert_eq!(loaded_steps, steps);
        assert_eq!(loaded_steps[0].estimated_duration_hours, Some(Decimal::from(2)));

        let loaded_transitions = repo.list_transitions(workflow.id).await.expect("transitions");
        assert_eq!(loaded_transitions, transitions);
        assert_eq!(loaded_transitions[0].from_step, loaded_steps[0].id);
        assert_eq!(loaded_transitions[0].to_step, loaded_steps[1].id);
    }

    #[tokio::test]
    async fn unknown_transition_step_name_rolls_back() {
        let pool = setup().await;
        let repo = SqlWorkflowRepository::new(pool.clone());

        let result = repo
            .create_definition(
                NewWorkflow {
                    org_id: "org-1".to_string(),
                    name: "Broken".to_string(),
                    description: String::new(),
                    created_by: None,
                },
                inspection_steps(),
                vec![NewWorkflowTransition {
                    from_step: "intake".to_string(),
                    to_step: "missing".to_string(),
                    label: None,
                }],
            )
            .await;
        assert!(result.is_err());

        let workflows = repo.list_for_org("org-1").await.expect("list");
        assert!(workflows.is_empty(), "failed definition should not be persisted");
    }

    #[tokio::test]
    async fn find_is_scoped_to_org() {
        let pool = setup().await;
        let (workflow, _, _) = create_inspection_workflow(&pool, "org-1").await;

        let repo = SqlWorkflowRepository::new(pool);
        assert!(repo.find_by_id("org-1", workflow.id).await.expect("find").is_some());
        assert!(repo.find_by_id("org-2", workflow.id).await.expect("find").is_none());
    }
}
