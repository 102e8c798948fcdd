//! The simulated individuals: an arena of agents with an ordered health
//! status and an optional fixed position.
//!
//! Agents are created once at setup and never removed. All status mutation
//! funnels through [`ContextAgentExt::set_health_status`], which enforces
//! that an agent's status only ever moves forward through the disease
//! course and emits a [`HealthStatusEvent`] for observers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::context::Context;
use crate::define_data_plugin;

/// A stable handle for one agent, valid for the whole run.
#[derive(Clone, Copy, Hash, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct AgentId(pub usize);

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "agent_{}", self.0)
    }
}

/// The disease course, ordered: an agent's status only ever increases.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize)]
pub enum HealthStatus {
    Susceptible,
    Infected,
    Infectious,
    SymptomaticInfectious,
    Removed,
}

impl HealthStatus {
    /// All statuses in rank order, for tabulation.
    pub const ALL: [HealthStatus; 5] = [
        HealthStatus::Susceptible,
        HealthStatus::Infected,
        HealthStatus::Infectious,
        HealthStatus::SymptomaticInfectious,
        HealthStatus::Removed,
    ];

    /// True if the agent can transmit the disease on contact.
    #[must_use]
    pub fn is_infectious(self) -> bool {
        matches!(
            self,
            HealthStatus::Infectious | HealthStatus::SymptomaticInfectious
        )
    }

    /// True if the agent can be infected on contact.
    #[must_use]
    pub fn is_susceptible(self) -> bool {
        self == HealthStatus::Susceptible
    }

    /// True if the agent is anywhere mid-progression. When no agent is
    /// active the outbreak has burned out.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(
            self,
            HealthStatus::Infected | HealthStatus::Infectious | HealthStatus::SymptomaticInfectious
        )
    }

    /// True if the agent shows symptoms (and may self-isolate).
    #[must_use]
    pub fn is_symptomatic(self) -> bool {
        self == HealthStatus::SymptomaticInfectious
    }
}

/// Emitted whenever an agent's health status changes.
#[derive(Clone, Copy, Debug)]
pub struct HealthStatusEvent {
    pub agent_id: AgentId,
    pub previous: HealthStatus,
    pub current: HealthStatus,
}

struct AgentRecord {
    status: HealthStatus,
    position: Option<(f64, f64)>,
}

struct AgentsData {
    agents: Vec<AgentRecord>,
}

define_data_plugin!(AgentsPlugin, AgentsData, AgentsData { agents: Vec::new() });

pub trait ContextAgentExt {
    /// Adds one agent, susceptible, with an optional fixed position.
    fn add_agent(&mut self, position: Option<(f64, f64)>) -> AgentId;

    /// The number of agents in the population.
    fn population(&self) -> usize;

    fn get_health_status(&self, agent_id: AgentId) -> HealthStatus;

    fn get_position(&self, agent_id: AgentId) -> Option<(f64, f64)>;

    /// Moves an agent forward in the disease course and emits a
    /// [`HealthStatusEvent`].
    ///
    /// # Panics
    ///
    /// Panics if `status` does not rank strictly above the agent's current
    /// status. A status regression is a logic defect in the caller, not a
    /// recoverable data problem.
    fn set_health_status(&mut self, agent_id: AgentId, status: HealthStatus);

    /// Counts agents whose status satisfies the predicate.
    fn count_agents_where(&self, predicate: impl Fn(HealthStatus) -> bool) -> usize;
}

impl ContextAgentExt for Context {
    fn add_agent(&mut self, position: Option<(f64, f64)>) -> AgentId {
        let data_container = self.get_data_container_mut::<AgentsPlugin>();
        let agent_id = AgentId(data_container.agents.len());
        data_container.agents.push(AgentRecord {
            status: HealthStatus::Susceptible,
            position,
        });
        agent_id
    }

    fn population(&self) -> usize {
        self.get_data_container::<AgentsPlugin>()
            .map_or(0, |data_container| data_container.agents.len())
    }

    fn get_health_status(&self, agent_id: AgentId) -> HealthStatus {
        self.get_data_container::<AgentsPlugin>()
            .expect("No agents have been added")
            .agents[agent_id.0]
            .status
    }

    fn get_position(&self, agent_id: AgentId) -> Option<(f64, f64)> {
        self.get_data_container::<AgentsPlugin>()
            .expect("No agents have been added")
            .agents[agent_id.0]
            .position
    }

    fn set_health_status(&mut self, agent_id: AgentId, status: HealthStatus) {
        let data_container = self.get_data_container_mut::<AgentsPlugin>();
        let record = &mut data_container.agents[agent_id.0];
        let previous = record.status;
        assert!(
            previous < status,
            "Illegal health status transition for {agent_id}: {previous:?} -> {status:?}"
        );
        record.status = status;
        self.emit_event(HealthStatusEvent {
            agent_id,
            previous,
            current: status,
        });
    }

    fn count_agents_where(&self, predicate: impl Fn(HealthStatus) -> bool) -> usize {
        self.get_data_container::<AgentsPlugin>()
            .map_or(0, |data_container| {
                data_container
                    .agents
                    .iter()
                    .filter(|record| predicate(record.status))
                    .count()
            })
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::{AgentId, ContextAgentExt, HealthStatus, HealthStatusEvent};
    use crate::context::Context;

    #[test]
    fn agents_start_susceptible() {
        let mut context = Context::new();
        let agent_id = context.add_agent(None);
        assert_eq!(agent_id, AgentId(0));
        assert_eq!(
            context.get_health_status(agent_id),
            HealthStatus::Susceptible
        );
        assert_eq!(context.get_position(agent_id), None);
        assert_eq!(context.population(), 1);
    }

    #[test]
    fn positions_are_stored() {
        let mut context = Context::new();
        let agent_id = context.add_agent(Some((0.25, 0.75)));
        assert_eq!(context.get_position(agent_id), Some((0.25, 0.75)));
    }

    #[test]
    fn agent_name_renders_from_id() {
        assert_eq!(AgentId(17).to_string(), "agent_17");
    }

    #[test]
    fn status_can_skip_forward() {
        let mut context = Context::new();
        let agent_id = context.add_agent(None);
        // Jumping over intermediate statuses is legal; only regressing is not.
        context.set_health_status(agent_id, HealthStatus::Infectious);
        assert_eq!(
            context.get_health_status(agent_id),
            HealthStatus::Infectious
        );
    }

    #[test]
    #[should_panic(expected = "Illegal health status transition")]
    fn status_regression_panics() {
        let mut context = Context::new();
        let agent_id = context.add_agent(None);
        context.set_health_status(agent_id, HealthStatus::Removed);
        context.set_health_status(agent_id, HealthStatus::Infectious);
    }

    #[test]
    #[should_panic(expected = "Illegal health status transition")]
    fn setting_same_status_panics() {
        let mut context = Context::new();
        let agent_id = context.add_agent(None);
        context.set_health_status(agent_id, HealthStatus::Infected);
        context.set_health_status(agent_id, HealthStatus::Infected);
    }

    #[test]
    fn status_change_emits_event() {
        let mut context = Context::new();
        let observed = Rc::new(RefCell::new(Vec::new()));
        let observed_clone = Rc::clone(&observed);
        context.subscribe_to_event(move |_context, event: HealthStatusEvent| {
            observed_clone
                .borrow_mut()
                .push((event.agent_id, event.previous, event.current));
        });

        let agent_id = context.add_agent(None);
        context.set_health_status(agent_id, HealthStatus::Infected);
        context.execute();

        assert_eq!(
            *observed.borrow(),
            vec![(agent_id, HealthStatus::Susceptible, HealthStatus::Infected)]
        );
    }

    #[test]
    fn predicates_follow_the_disease_course() {
        assert!(HealthStatus::Susceptible.is_susceptible());
        assert!(!HealthStatus::Removed.is_susceptible());

        assert!(HealthStatus::Infectious.is_infectious());
        assert!(HealthStatus::SymptomaticInfectious.is_infectious());
        assert!(!HealthStatus::Infected.is_infectious());

        assert!(HealthStatus::Infected.is_active());
        assert!(HealthStatus::Infectious.is_active());
        assert!(HealthStatus::SymptomaticInfectious.is_active());
        assert!(!HealthStatus::Susceptible.is_active());
        assert!(!HealthStatus::Removed.is_active());

        assert!(HealthStatus::SymptomaticInfectious.is_symptomatic());
        assert!(!HealthStatus::Infectious.is_symptomatic());
    }

    #[test]
    fn count_agents_where_scans_the_population() {
        let mut context = Context::new();
        for _ in 0..5 {
            context.add_agent(None);
        }
        context.set_health_status(AgentId(1), HealthStatus::Infected);
        context.set_health_status(AgentId(3), HealthStatus::Removed);

        assert_eq!(
            context.count_agents_where(HealthStatus::is_susceptible),
            3
        );
        assert_eq!(context.count_agents_where(HealthStatus::is_active), 1);
    }
}
