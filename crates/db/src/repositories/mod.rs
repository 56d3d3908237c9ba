use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use bookflow_core::domain::booking::{
    BookingId, BookingRequest, BookingStatus, NewBookingRequest, SourceRef,
};
use bookflow_core::domain::resource::{NewResource, ResourceId, SchedulableResource};
use bookflow_core::domain::rule::{NewRule, ResourceScheduleRule, RuleId};
use bookflow_core::domain::work_item::{NewWorkItem, WorkItem, WorkItemHistory, WorkItemId};
use bookflow_core::domain::workflow::{
    NewWorkflow, NewWorkflowStep, NewWorkflowTransition, StepId, Workflow, WorkflowId,
    WorkflowStep, WorkflowTransition,
};
use bookflow_core::workflow::lifecycle::TransitionPlan;

pub mod booking;
pub mod resource;
pub mod rule;
pub mod work_item;
pub mod workflow;

pub use booking::SqlBookingRepository;
pub use resource::SqlResourceRepository;
pub use rule::SqlRuleRepository;
pub use work_item::SqlWorkItemRepository;
pub use workflow::SqlWorkflowRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
}

#[async_trait]
pub trait ResourceRepository: Send + Sync {
    async fn create(&self, new: NewResource) -> Result<SchedulableResource, RepositoryError>;

    async fn find_by_id(
        &self,
        org_id: &str,
        id: ResourceId,
    ) -> Result<Option<SchedulableResource>, RepositoryError>;

    /// External ids are only unique within one organization; lookups
    /// must never cross the org boundary.
    async fn find_by_external_id(
        &self,
        org_id: &str,
        service_type: &str,
        external_resource_id: &str,
    ) -> Result<Option<SchedulableResource>, RepositoryError>;

    async fn list_for_org(
        &self,
        org_id: &str,
        only_active: bool,
    ) -> Result<Vec<SchedulableResource>, RepositoryError>;

    async fn save(&self, resource: SchedulableResource) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait RuleRepository: Send + Sync {
    async fn create(&self, new: NewRule) -> Result<ResourceScheduleRule, RepositoryError>;

    async fn find_by_id(&self, id: RuleId)
        -> Result<Option<ResourceScheduleRule>, RepositoryError>;

    async fn list_for_resource(
        &self,
        resource_id: ResourceId,
        only_active: bool,
    ) -> Result<Vec<ResourceScheduleRule>, RepositoryError>;

    async fn save(&self, rule: ResourceScheduleRule) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait BookingRepository: Send + Sync {
    /// Insert a new booking with the given initial status and return
    /// the stored row.
    async fn create(
        &self,
        new: NewBookingRequest,
        status: BookingStatus,
    ) -> Result<BookingRequest, RepositoryError>;

    async fn find_by_id(
        &self,
        org_id: &str,
        id: BookingId,
    ) -> Result<Option<BookingRequest>, RepositoryError>;

    /// Source triples are scoped per organization; two orgs may each
    /// mirror the same external object.
    async fn find_by_source(
        &self,
        org_id: &str,
        source: &SourceRef,
    ) -> Result<Option<BookingRequest>, RepositoryError>;

    /// Bookings on a resource in a non-terminal status, any window.
    async fn list_active_for_resource(
        &self,
        resource_id: ResourceId,
    ) -> Result<Vec<BookingRequest>, RepositoryError>;

    /// Bookings on a resource whose requested window intersects
    /// `[start, end)`, all statuses.
    async fn list_in_window(
        &self,
        resource_id: ResourceId,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<BookingRequest>, RepositoryError>;

    async fn list_for_org(
        &self,
        org_id: &str,
        status: Option<BookingStatus>,
        limit: u32,
    ) -> Result<Vec<BookingRequest>, RepositoryError>;

    /// Bookings carrying the given work item id in their custom data.
    async fn list_for_work_item(
        &self,
        org_id: &str,
        work_item_id: i64,
    ) -> Result<Vec<BookingRequest>, RepositoryError>;

    async fn save(&self, booking: BookingRequest) -> Result<(), RepositoryError>;
}

#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Persist a workflow definition atomically: the workflow row, its
    /// steps, and its transitions with step names resolved to ids.
    async fn create_definition(
        &self,
        new: NewWorkflow,
        steps: Vec<NewWorkflowStep>,
        transitions: Vec<NewWorkflowTransition>,
    ) -> Result<(Workflow, Vec<WorkflowStep>, Vec<WorkflowTransition>), RepositoryError>;

    async fn find_by_id(
        &self,
        org_id: &str,
        id: WorkflowId,
    ) -> Result<Option<Workflow>, RepositoryError>;

    async fn list_for_org(&self, org_id: &str) -> Result<Vec<Workflow>, RepositoryError>;

    async fn list_steps(&self, workflow_id: WorkflowId)
        -> Result<Vec<WorkflowStep>, RepositoryError>;

    async fn find_step(&self, id: StepId) -> Result<Option<WorkflowStep>, RepositoryError>;

    async fn list_transitions(
        &self,
        workflow_id: WorkflowId,
    ) -> Result<Vec<WorkflowTransition>, RepositoryError>;
}

#[async_trait]
pub trait WorkItemRepository: Send + Sync {
    /// Insert a work item on its starting step together with the
    /// initial history record, in one transaction.
    async fn create(
        &self,
        new: NewWorkItem,
        current_step: StepId,
    ) -> Result<WorkItem, RepositoryError>;

    async fn find_by_id(
        &self,
        org_id: &str,
        id: WorkItemId,
    ) -> Result<Option<WorkItem>, RepositoryError>;

    async fn list_for_org(
        &self,
        org_id: &str,
        only_open: bool,
    ) -> Result<Vec<WorkItem>, RepositoryError>;

    /// Apply a planned step transition: update the item and append the
    /// history record atomically.
    async fn apply_transition(
        &self,
        plan: &TransitionPlan,
    ) -> Result<WorkItemHistory, RepositoryError>;

    async fn list_history(
        &self,
        work_item_id: WorkItemId,
    ) -> Result<Vec<WorkItemHistory>, RepositoryError>;
}
