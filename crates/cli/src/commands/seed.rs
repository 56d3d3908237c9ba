use crate::commands::CommandResult;
use bookflow_core::config::{AppConfig, LoadOptions};
use bookflow_core::{
    AvailabilityConfig, BookingPriority, NewResource, NewRule, NewWorkItem, NewWorkflow,
    NewWorkflowStep, NewWorkflowTransition, ResourceType, RuleConfig,
};
use bookflow_db::repositories::{
    ResourceRepository, RuleRepository, SqlResourceRepository, SqlRuleRepository,
    SqlWorkItemRepository, SqlWorkflowRepository, WorkItemRepository, WorkflowRepository,
};
use bookflow_db::{connect_with_settings, migrations};
use rust_decimal::Decimal;
use serde_json::json;

const DEMO_ORG: &str = "demo-org";
const DEMO_RESOURCE_EXTERNAL_ID: &str = "demo-dockside-crane";
const DEMO_WORKFLOW_NAME: &str = "Vessel Intake";
const DEMO_WORK_ITEM_TITLE: &str = "MV Aurora intake";

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "config_validation",
                format!("configuration issue: {error}"),
                2,
            );
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
        Ok(runtime) => runtime,
        Err(error) => {
            return CommandResult::failure(
                "seed",
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            );
        }
    };

    let result = runtime.block_on(async {
        let pool = connect_with_settings(
            &config.database.url,
            config.database.max_connections,
            config.database.timeout_secs,
        )
        .await
        .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;

        migrations::run_pending(&pool)
            .await
            .map_err(|error| ("migration", error.to_string(), 5u8))?;

        let summary = load_fixtures(&pool)
            .await
            .map_err(|error| ("seed_execution", error.to_string(), 6u8));
        pool.close().await;
        summary
    });

    match result {
        Ok(summary) => {
            let message = format!(
                "demo dataset ready for org `{DEMO_ORG}`:\n  - resource: {}\n  - workflow: {}\n  - work item: {}",
                summary.resource, summary.workflow, summary.work_item
            );
            CommandResult::success("seed", message)
        }
        Err((error_class, message, exit_code)) => {
            CommandResult::failure("seed", error_class, message, exit_code)
        }
    }
}

struct SeedSummary {
    resource: String,
    workflow: String,
    work_item: String,
}

/// Seeding is idempotent: each fixture is looked up before it is
/// created, so repeated runs report the same dataset.
async fn load_fixtures(pool: &bookflow_db::DbPool) -> anyhow::Result<SeedSummary> {
    let resources = SqlResourceRepository::new(pool.clone());
    let rules = SqlRuleRepository::new(pool.clone());
    let workflows = SqlWorkflowRepository::new(pool.clone());
    let items = SqlWorkItemRepository::new(pool.clone());

    let resource = match resources
        .find_by_external_id(DEMO_ORG, "bookflow", DEMO_RESOURCE_EXTERNAL_ID)
        .await?
    {
        Some(existing) => {
            SeedSummary::describe_existing(&existing.name, existing.id.0)
        }
        None => {
            let created = resources
                .create(NewResource {
                    org_id: DEMO_ORG.to_string(),
                    name: "Dockside Crane".to_string(),
                    resource_type: ResourceType::Equipment,
                    description: "Demo crane with weekday working hours".to_string(),
                    max_concurrent_bookings: 2,
                    availability: AvailabilityConfig::default(),
                    linked_team: None,
                    external_resource_id: Some(DEMO_RESOURCE_EXTERNAL_ID.to_string()),
                    service_type: "bookflow".to_string(),
                })
                .await?;

            rules
                .create(NewRule {
                    resource_id: created.id,
                    name: "Critical lifts need sign-off".to_string(),
                    description: "Urgent bookings wait for a coordinator".to_string(),
                    config: RuleConfig::RequireApproval {
                        match_priority: Some(BookingPriority::Critical),
                        max_duration_hours: None,
                    },
                    priority: 10,
                    effective_start: None,
                    effective_end: None,
                })
                .await?;

            SeedSummary::describe_created(&created.name, created.id.0)
        }
    };

    let existing_workflow = workflows
        .list_for_org(DEMO_ORG)
        .await?
        .into_iter()
        .find(|workflow| workflow.name == DEMO_WORKFLOW_NAME);
    let (workflow, workflow_id) = match existing_workflow {
        Some(existing) => (SeedSummary::describe_existing(&existing.name, existing.id.0), existing.id),
        None => {
            let (created, _steps, _transitions) = workflows
                .create_definition(
                    NewWorkflow {
                        org_id: DEMO_ORG.to_string(),
                        name: DEMO_WORKFLOW_NAME.to_string(),
                        description: "Demo intake flow for arriving vessels".to_string(),
                        created_by: Some("seed".to_string()),
                    },
                    vec![
                        NewWorkflowStep {
                            name: "intake".to_string(),
                            description: "Collect vessel papers".to_string(),
                            order: 1,
                            assigned_team: None,
                            requires_booking: false,
                            estimated_duration_hours: None,
                            is_terminal: false,
                        },
                        NewWorkflowStep {
                            name: "inspection".to_string(),
                            description: "Inspect the hold".to_string(),
                            order: 2,
                            assigned_team: Some("inspectors".to_string()),
                            requires_booking: true,
                            estimated_duration_hours: Some(Decimal::from(3)),
                            is_terminal: false,
                        },
                        NewWorkflowStep {
                            name: "cleared".to_string(),
                            description: String::new(),
                            order: 3,
                            assigned_team: None,
                            requires_booking: false,
                            estimated_duration_hours: None,
                            is_terminal: true,
                        },
                    ],
                    vec![
                        NewWorkflowTransition {
                            from_step: "intake".to_string(),
                            to_step: "inspection".to_string(),
                            label: Some("papers complete".to_string()),
                        },
                        NewWorkflowTransition {
                            from_step: "inspection".to_string(),
                            to_step: "cleared".to_string(),
                            label: Some("inspection passed".to_string()),
                        },
                        NewWorkflowTransition {
                            from_step: "inspection".to_string(),
                            to_step: "intake".to_string(),
                            label: Some("papers missing".to_string()),
                        },
                    ],
                )
                .await?;
            (SeedSummary::describe_created(&created.name, created.id.0), created.id)
        }
    };

    let existing_item = items
        .list_for_org(DEMO_ORG, false)
        .await?
        .into_iter()
        .find(|item| item.title == DEMO_WORK_ITEM_TITLE);
    let work_item = match existing_item {
        Some(existing) => SeedSummary::describe_existing(&existing.title, existing.id.0),
        None => {
            let steps = workflows.list_steps(workflow_id).await?;
            let first_step = steps
                .iter()
                .min_by_key(|step| step.order)
                .ok_or_else(|| anyhow::anyhow!("seed workflow has no steps"))?;
            let created = items
                .create(
                    NewWorkItem {
                        org_id: DEMO_ORG.to_string(),
                        workflow_id,
                        title: DEMO_WORK_ITEM_TITLE.to_string(),
                        description: "Demo vessel awaiting intake".to_string(),
                        priority: BookingPriority::Normal,
                        data: json!({"vessel": "MV Aurora", "berth": "E4"}),
                        created_by: "seed".to_string(),
                    },
                    first_step.id,
                )
                .await?;
            SeedSummary::describe_created(&created.title, created.id.0)
        }
    };

    Ok(SeedSummary { resource, workflow, work_item })
}

impl SeedSummary {
    fn describe_created(name: &str, id: i64) -> String {
        format!("{name} (id {id}, created)")
    }

    fn describe_existing(name: &str, id: i64) -> String {
        format!("{name} (id {id}, already present)")
    }
}
