//! In-memory view of one workflow's steps and transitions. Built from
//! persisted rows and validated up front so traversal never has to
//! handle dangling references.

use std::collections::{HashMap, HashSet};

use crate::domain::workflow::{StepId, WorkflowId, WorkflowStep, WorkflowTransition};
use crate::errors::DomainError;

#[derive(Clone, Debug)]
pub struct WorkflowGraph {
    workflow_id: WorkflowId,
    steps: HashMap<StepId, WorkflowStep>,
    outgoing: HashMap<StepId, Vec<StepId>>,
}

impl WorkflowGraph {
    /// Assemble and validate a graph. Every transition endpoint must
    /// be a known step and no directed edge may appear twice.
    pub fn new(
        workflow_id: WorkflowId,
        steps: Vec<WorkflowStep>,
        transitions: Vec<WorkflowTransition>,
    ) -> Result<Self, DomainError> {
        let mut step_map = HashMap::with_capacity(steps.len());
        for step in steps {
            if step.workflow_id != workflow_id {
                return Err(DomainError::Integrity(format!(
                    "step {} belongs to workflow {}, not {}",
                    step.id.0, step.workflow_id.0, workflow_id.0
                )));
            }
            if step_map.insert(step.id, step).is_some() {
                return Err(DomainError::Integrity("duplicate step id".to_string()));
            }
        }

        let mut outgoing: HashMap<StepId, Vec<StepId>> = HashMap::new();
        let mut seen_edges = HashSet::new();
        for transition in &transitions {
            if !step_map.contains_key(&transition.from_step) {
                return Err(DomainError::Integrity(format!(
                    "transition {} leaves unknown step {}",
                    transition.id.0, transition.from_step.0
                )));
            }
            if !step_map.contains_key(&transition.to_step) {
                return Err(DomainError::Integrity(format!(
                    "transition {} enters unknown step {}",
                    transition.id.0, transition.to_step.0
                )));
            }
            if !seen_edges.insert((transition.from_step, transition.to_step)) {
                return Err(DomainError::Integrity(format!(
                    "duplicate transition {} -> {}",
                    transition.from_step.0, transition.to_step.0
                )));
            }
            outgoing.entry(transition.from_step).or_default().push(transition.to_step);
        }

        Ok(Self { workflow_id, steps: step_map, outgoing })
    }

    pub fn workflow_id(&self) -> WorkflowId {
        self.workflow_id
    }

    pub fn step(&self, id: StepId) -> Option<&WorkflowStep> {
        self.steps.get(&id)
    }

    pub fn contains(&self, id: StepId) -> bool {
        self.steps.contains_key(&id)
    }

    /// First step by display order, used as the default placement for
    /// new work items.
    pub fn initial_step(&self) -> Option<&WorkflowStep> {
        self.steps.values().min_by_key(|s| (s.order, s.id.0))
    }

    pub fn is_terminal(&self, id: StepId) -> bool {
        self.steps.get(&id).map(|s| s.is_terminal).unwrap_or(false)
    }

    pub fn terminal_steps(&self) -> Vec<&WorkflowStep> {
        let mut terminal: Vec<&WorkflowStep> =
            self.steps.values().filter(|s| s.is_terminal).collect();
        terminal.sort_by_key(|s| (s.order, s.id.0));
        terminal
    }

    pub fn can_transition(&self, from: StepId, to: StepId) -> bool {
        self.outgoing.get(&from).map(|next| next.contains(&to)).unwrap_or(false)
    }

    /// Steps reachable in one hop from `from`, sorted by display order.
    pub fn legal_next_steps(&self, from: StepId) -> Vec<&WorkflowStep> {
        let mut next: Vec<&WorkflowStep> = self
            .outgoing
            .get(&from)
            .map(|ids| ids.iter().filter_map(|id| self.steps.get(id)).collect())
            .unwrap_or_default();
        next.sort_by_key(|s| (s.order, s.id.0));
        next
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::domain::workflow::{
        StepId, TransitionId, WorkflowId, WorkflowStep, WorkflowTransition,
    };

    pub(crate) fn step(id: i64, order: i64, is_terminal: bool) -> WorkflowStep {
        WorkflowStep {
            id: StepId(id),
            workflow_id: WorkflowId(1),
            name: format!("step {id}"),
            description: String::new(),
            order,
            assigned_team: None,
            requires_booking: false,
            estimated_duration_hours: None,
            is_terminal,
        }
    }

    pub(crate) fn edge(id: i64, from: i64, to: i64) -> WorkflowTransition {
        WorkflowTransition {
            id: TransitionId(id),
            from_step: StepId(from),
            to_step: StepId(to),
            label: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::{edge, step};
    use super::WorkflowGraph;
    use crate::domain::workflow::{StepId, WorkflowId};
    use crate::errors::DomainError;

    fn linear_graph() -> WorkflowGraph {
        WorkflowGraph::new(
            WorkflowId(1),
            vec![step(1, 0, false), step(2, 1, false), step(3, 2, true)],
            vec![edge(1, 1, 2), edge(2, 2, 3), edge(3, 2, 1)],
        )
        .unwrap()
    }

    #[test]
    fn rejects_dangling_transition_endpoints() {
        let err = WorkflowGraph::new(
            WorkflowId(1),
            vec![step(1, 0, false)],
            vec![edge(1, 1, 99)],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Integrity(_)));
    }

    #[test]
    fn rejects_duplicate_edges() {
        let err = WorkflowGraph::new(
            WorkflowId(1),
            vec![step(1, 0, false), step(2, 1, true)],
            vec![edge(1, 1, 2), edge(2, 1, 2)],
        )
        .unwrap_err();
        assert!(matches!(err, DomainError::Integrity(_)));
    }

    #[test]
    fn rejects_steps_from_another_workflow() {
        let mut stray = step(2, 1, false);
        stray.workflow_id = WorkflowId(9);
        let err = WorkflowGraph::new(WorkflowId(1), vec![step(1, 0, false), stray], vec![])
            .unwrap_err();
        assert!(matches!(err, DomainError::Integrity(_)));
    }

    #[test]
    fn legal_next_steps_sorted_by_order() {
        let graph = WorkflowGraph::new(
            WorkflowId(1),
            vec![step(1, 0, false), step(2, 5, false), step(3, 2, true)],
            vec![edge(1, 1, 2), edge(2, 1, 3)],
        )
        .unwrap();

        let next: Vec<i64> = graph.legal_next_steps(StepId(1)).iter().map(|s| s.id.0).collect();
        assert_eq!(next, vec![3, 2]);
    }

    #[test]
    fn transition_legality_follows_edges() {
        let graph = linear_graph();
        assert!(graph.can_transition(StepId(1), StepId(2)));
        assert!(graph.can_transition(StepId(2), StepId(1)));
        assert!(!graph.can_transition(StepId(1), StepId(3)));
        assert!(!graph.can_transition(StepId(3), StepId(1)));
    }

    #[test]
    fn initial_and_terminal_steps() {
        let graph = linear_graph();
        assert_eq!(graph.initial_step().map(|s| s.id.0), Some(1));
        let terminal: Vec<i64> = graph.terminal_steps().iter().map(|s| s.id.0).collect();
        assert_eq!(terminal, vec![3]);
    }
}
