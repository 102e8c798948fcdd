//! Contact generation: the processes that decide which agents meet, and
//! when.
//!
//! Two mixing strategies are supported. Uniform mixing wakes on a
//! population-level Poisson clock and pairs two agents drawn uniformly
//! without replacement. Gravity mixing draws pairs from the precomputed
//! [`ProximityPairs`](crate::spatial::ProximityPairs) distribution, in
//! batches, with an independent exponential gap per contact; symptomatic
//! agents may self-isolate out of a contact before it happens.
//!
//! Both strategies hand the surviving pair to
//! [`transmission::evaluate`](crate::transmission::evaluate) and expose the
//! returned agents.

use std::cell::RefCell;
use std::collections::VecDeque;

use log::trace;
use rand_distr::Exp;

use crate::agent::{AgentId, ContextAgentExt};
use crate::context::Context;
use crate::error::MiasmaError;
use crate::params::{MixingStrategy, Parameters};
use crate::random::ContextRandomExt;
use crate::spatial::ProximityPairs;
use crate::{define_data_plugin, define_rng, progression, transmission};
use crate::ContextGlobalPropertiesExt;

define_rng!(ContactRng);

struct GravityData {
    pairs: Option<ProximityPairs>,
    pending: RefCell<VecDeque<(AgentId, AgentId)>>,
}

define_data_plugin!(
    GravityPlugin,
    GravityData,
    GravityData {
        pairs: None,
        pending: RefCell::new(VecDeque::new()),
    }
);

/// Starts the configured contact process.
///
/// # Errors
///
/// Returns a `MiasmaError::ConfigError` if gravity mixing is configured and
/// any agent lacks a position, or no agent pair lies within the distance
/// threshold.
pub fn init(context: &mut Context) -> Result<(), MiasmaError> {
    let mixing = context
        .get_global_property_value(Parameters)
        .expect("Parameters must be set before initializing contacts")
        .mixing
        .clone();

    match mixing {
        MixingStrategy::Uniform => {
            trace!("initializing uniform mixing");
            schedule_uniform_contact(context);
        }
        MixingStrategy::Gravity {
            exponent,
            distance_threshold,
            ..
        } => {
            trace!("initializing gravity mixing");
            let positions = (0..context.population())
                .map(|i| {
                    context.get_position(AgentId(i)).ok_or_else(|| {
                        MiasmaError::ConfigError(format!(
                            "{} has no position; gravity mixing requires placed agents",
                            AgentId(i)
                        ))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let pairs = ProximityPairs::build(&positions, distance_threshold, exponent)?;
            trace!("gravity model built with {} candidate pairs", pairs.len());
            context.get_data_container_mut::<GravityPlugin>().pairs = Some(pairs);
            schedule_gravity_contact(context);
        }
    }
    Ok(())
}

fn contact_rate(context: &Context) -> f64 {
    context
        .get_global_property_value(Parameters)
        .expect("Parameters must be set before initializing contacts")
        .contact_rate_per_agent
}

fn schedule_uniform_contact(context: &mut Context) {
    let population = context.population() as f64;
    let rate = contact_rate(context);
    // Each agent meets `rate` others per day and every contact involves two
    // agents, so contacts arrive at population * rate / 2 per day.
    let delay = context.sample_distr(ContactRng, Exp::new(2.0 * rate / population).unwrap());
    let next_time = context.get_current_time() + delay;
    context.add_plan(next_time, run_uniform_contact);
}

fn run_uniform_contact(context: &mut Context) {
    let population = context.population();
    let indices = context.sample(ContactRng, |rng| {
        rand::seq::index::sample(rng, population, 2)
    });
    let group = [AgentId(indices.index(0)), AgentId(indices.index(1))];
    for agent_id in transmission::evaluate(context, &group) {
        progression::expose(context, agent_id);
    }
    schedule_uniform_contact(context);
}

fn schedule_gravity_contact(context: &mut Context) {
    let population = context.population() as f64;
    let rate = contact_rate(context);
    let delay = context.sample_distr(ContactRng, Exp::new(population * rate).unwrap());
    let next_time = context.get_current_time() + delay;
    context.add_plan(next_time, run_gravity_contact);
}

/// Pops the next pair from the pending batch, refilling the batch from the
/// weighted pair distribution when it runs dry.
fn next_gravity_pair(context: &Context) -> (AgentId, AgentId) {
    let population = context.population();
    let data_container = context
        .get_data_container::<GravityPlugin>()
        .expect("Gravity mixing was not initialized");
    let mut pending = data_container.pending.borrow_mut();
    if pending.is_empty() {
        let pairs = data_container
            .pairs
            .as_ref()
            .expect("Gravity mixing was not initialized");
        let batch = context.sample(ContactRng, |rng| pairs.draw_batch(rng, population));
        pending.extend(batch);
    }
    pending.pop_front().unwrap()
}

/// Drops each symptomatic member of the pair independently with probability
/// `p_isolates`.
fn apply_isolation_filter(
    context: &Context,
    pair: (AgentId, AgentId),
    p_isolates: f64,
) -> Vec<AgentId> {
    [pair.0, pair.1]
        .into_iter()
        .filter(|agent_id| {
            !(context.get_health_status(*agent_id).is_symptomatic()
                && context.sample_bool(ContactRng, p_isolates))
        })
        .collect()
}

fn run_gravity_contact(context: &mut Context) {
    let mixing = context
        .get_global_property_value(Parameters)
        .expect("Parameters must be set before initializing contacts")
        .mixing
        .clone();
    let MixingStrategy::Gravity { p_isolates, .. } = mixing else {
        unreachable!("gravity contact scheduled under uniform mixing")
    };

    let pair = next_gravity_pair(context);
    let group = apply_isolation_filter(context, pair, p_isolates);
    // A contact needs both participants; an isolated member cancels it.
    if group.len() == 2 {
        for agent_id in transmission::evaluate(context, &group) {
            progression::expose(context, agent_id);
        }
    }
    schedule_gravity_contact(context);
}
