//! Disease progression: drives one agent from infection to removal through
//! stage delays sampled from the configured distributions.
//!
//! Progression is event-driven: a subscriber on [`HealthStatusEvent`] reacts
//! to each stage entry by scheduling the next stage. Entering the infectious
//! stage draws the symptomatic-or-not branch once; the branch then fixes the
//! remaining timeline.
//!
//! At most one progression ever runs per agent: contact generators only
//! expose agents they observed susceptible, and the monotonic guard in the
//! status setter backstops any double exposure.

use log::trace;
use rand_distr::Normal;

use crate::agent::{AgentId, ContextAgentExt, HealthStatus, HealthStatusEvent};
use crate::context::Context;
use crate::define_rng;
use crate::params::{Parameters, ParametersValues, StageDelay};
use crate::random::ContextRandomExt;
use crate::ContextGlobalPropertiesExt;

define_rng!(ProgressionRng);

/// Starts the disease course for a newly infected agent.
pub fn expose(context: &mut Context, agent_id: AgentId) {
    trace!("exposing {agent_id} at t={}", context.get_current_time());
    context.set_health_status(agent_id, HealthStatus::Infected);
}

/// Samples one stage delay, resampling any non-positive Normal draw.
fn sample_stage_delay(context: &Context, delay: StageDelay) -> f64 {
    context.sample_positive_distr(ProgressionRng, Normal::new(delay.mean, delay.sd).unwrap())
}

fn schedule_stage(
    context: &mut Context,
    agent_id: AgentId,
    delay: f64,
    next_status: HealthStatus,
) {
    let stage_time = context.get_current_time() + delay;
    context.add_plan(stage_time, move |context| {
        context.set_health_status(agent_id, next_status);
    });
}

fn handle_status_change(context: &mut Context, event: HealthStatusEvent) {
    let parameters: &ParametersValues = context
        .get_global_property_value(Parameters)
        .expect("Parameters must be set before progression runs");
    let disease = parameters.disease.clone();
    let agent_id = event.agent_id;

    match event.current {
        HealthStatus::Infected => {
            let delay = sample_stage_delay(context, disease.latent_delay);
            schedule_stage(context, agent_id, delay, HealthStatus::Infectious);
        }
        HealthStatus::Infectious => {
            // The branch is drawn once here and fixes the rest of the course.
            if context.sample_bool(ProgressionRng, disease.p_asymptomatic) {
                let delay = sample_stage_delay(context, disease.asymptomatic_clearance_delay);
                schedule_stage(context, agent_id, delay, HealthStatus::Removed);
            } else {
                schedule_stage(
                    context,
                    agent_id,
                    disease.presymptomatic_delay,
                    HealthStatus::SymptomaticInfectious,
                );
            }
        }
        HealthStatus::SymptomaticInfectious => {
            let delay = sample_stage_delay(context, disease.symptomatic_clearance_delay);
            schedule_stage(context, agent_id, delay, HealthStatus::Removed);
        }
        HealthStatus::Susceptible | HealthStatus::Removed => {}
    }
}

pub fn init(context: &mut Context) {
    trace!("initializing disease progression");
    context.subscribe_to_event::<HealthStatusEvent>(handle_status_change);
}
