//! The transmission policy: which members of a contact group get infected.

use crate::agent::{AgentId, ContextAgentExt, HealthStatus};
use crate::context::Context;
use crate::define_rng;
use crate::params::Parameters;
use crate::random::ContextRandomExt;
use crate::ContextGlobalPropertiesExt;

define_rng!(TransmissionRng);

/// Evaluates one contact group and returns the agents that become infected.
///
/// Returns empty unless some member is currently infectious; otherwise each
/// susceptible member is selected independently with probability
/// `p_infected_given_contact`. The caller applies the infection (by spawning
/// disease progression); this function mutates nothing.
pub fn evaluate(context: &Context, group: &[AgentId]) -> Vec<AgentId> {
    let p_infected = context
        .get_global_property_value(Parameters)
        .expect("Parameters must be set before evaluating transmission")
        .disease
        .p_infected_given_contact;

    if !group
        .iter()
        .any(|agent_id| context.get_health_status(*agent_id).is_infectious())
    {
        return Vec::new();
    }

    group
        .iter()
        .copied()
        .filter(|agent_id| {
            context.get_health_status(*agent_id).is_susceptible()
                && context.sample_bool(TransmissionRng, p_infected)
        })
        .collect()
}
