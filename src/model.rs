//! End-to-end model setup: builds the population, wires the disease
//! processes, and schedules the run horizon.

use log::info;

use crate::agent::{AgentId, ContextAgentExt};
use crate::context::Context;
use crate::error::MiasmaError;
use crate::params::{MixingStrategy, Parameters};
use crate::plan::ExecutionPhase;
use crate::random::ContextRandomExt;
use crate::spatial::uniform_positions;
use crate::{contact, define_rng, progression};
use crate::ContextGlobalPropertiesExt;

define_rng!(PlacementRng);

/// Validates parameters and assembles a ready-to-execute simulation:
/// population (placed if gravity mixing is configured), disease progression,
/// the contact process, the horizon shutdown plan, and the seeded infection.
///
/// # Errors
///
/// Returns a `MiasmaError::ConfigError` if the `Parameters` global property
/// is unset or invalid, or if the contact process cannot be set up.
pub fn init(context: &mut Context) -> Result<(), MiasmaError> {
    let parameters = context
        .get_global_property_value(Parameters)
        .ok_or(MiasmaError::ConfigError(
            "the Parameters global property must be set before model setup".to_string(),
        ))?
        .clone();
    parameters.validate()?;
    context.init_random(parameters.seed);

    info!(
        "setting up {} agents with {:?} mixing, seed {}",
        parameters.population, parameters.mixing, parameters.seed
    );
    if matches!(parameters.mixing, MixingStrategy::Gravity { .. }) {
        let positions = context.sample(PlacementRng, |rng| {
            uniform_positions(parameters.population, rng)
        });
        for position in positions {
            context.add_agent(Some(position));
        }
    } else {
        for _ in 0..parameters.population {
            context.add_agent(None);
        }
    }

    progression::init(context);
    contact::init(context)?;

    // Horizon cutoff: pending plans past max_time are abandoned, not run.
    context.add_plan_with_phase(parameters.max_time, Context::shutdown, ExecutionPhase::Last);

    let seed_agent = AgentId(parameters.initial_infection_index());
    context.add_plan(0.0, move |context| {
        progression::expose(context, seed_agent);
    });
    Ok(())
}
