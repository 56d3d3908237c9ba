pub mod config;
pub mod domain;
pub mod errors;
pub mod scheduling;
pub mod workflow;

pub use domain::booking::{
    BookingId, BookingPriority, BookingRequest, BookingStatus, NewBookingRequest, SourceRef,
};
pub use domain::resource::{
    AvailabilityConfig, NewResource, ResourceId, ResourceType, SchedulableResource,
};
pub use domain::rule::{NewRule, ResourceScheduleRule, RuleConfig, RuleId, RuleKind};
pub use domain::work_item::{
    NewWorkItem, NewWorkItemHistory, WorkItem, WorkItemHistory, WorkItemHistoryId, WorkItemId,
};
pub use domain::workflow::{
    NewWorkflow, NewWorkflowStep, NewWorkflowTransition, StepId, TransitionId, Workflow,
    WorkflowId, WorkflowStep, WorkflowTransition,
};
pub use errors::{ApplicationError, DomainError, ErrorKind};
pub use scheduling::availability::{DayAvailability, UtilizationStats};
pub use scheduling::rules::AdmissionDecision;
pub use scheduling::suggest::{SearchParams, TimeSuggestion};
pub use workflow::graph::WorkflowGraph;
pub use workflow::lifecycle::TransitionPlan;
