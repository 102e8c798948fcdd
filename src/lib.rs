//! A stochastic agent-based simulator of infectious-disease spread
//!
//! Miasma models an outbreak in continuous virtual time: a population of
//! agents, a per-agent disease-progression state machine driven by sampled
//! stochastic delays, and contact-generation processes that decide which
//! agents meet and when. A contact between an infectious and a susceptible
//! agent may transmit the disease and spawn a new progression.
//!
//! The central object is the [`Context`](context::Context), which is
//! responsible for managing all the behavior of the simulation:
//! * Maintaining a notion of virtual time and scheduling plans to run at
//!   some point in the future
//! * Queueing callbacks to run now, before any further timed plan
//! * Dispatching typed events to subscribers
//! * Holding module-specific data so that modules can access each other's
//!   state
//!
//! The simulation modules layer on top of the context:
//! * [`agent`] holds the population and the ordered health status machine.
//! * [`progression`] walks an infected agent through the disease stages.
//! * [`contact`] generates contacts under uniform or gravity-model mixing.
//! * [`transmission`] decides which members of a contact become infected.
//! * [`incidence_report`] and [`prevalence_report`] record the outbreak to
//!   CSV.
//!
//! A run is deterministic for a fixed seed and parameter set: all randomness
//! flows through named streams seeded from the one base seed.

pub mod agent;
pub mod contact;
pub mod context;
pub mod error;
pub mod global_properties;
pub mod hashing;
pub mod incidence_report;
pub mod log;
pub mod model;
pub mod params;
pub mod plan;
pub mod prevalence_report;
pub mod progression;
pub mod random;
pub mod report;
pub mod runner;
pub mod spatial;
pub mod transmission;

pub use error::MiasmaError;
pub use global_properties::ContextGlobalPropertiesExt;

// Re-exported for the generated code of `define_rng!`.
pub use rand;
