//! Run parameters: everything a simulation needs beyond its random seed's
//! whims, deserializable from JSON and validated before any plan runs.

use serde::{Deserialize, Serialize};

use crate::define_global_property;
use crate::error::MiasmaError;

/// Mean and spread of one Normal-distributed stage delay, in days.
#[derive(Serialize, Deserialize, Debug, Clone, Copy)]
pub struct StageDelay {
    pub mean: f64,
    pub sd: f64,
}

impl StageDelay {
    fn validate(&self, name: &str) -> Result<(), MiasmaError> {
        if !(self.mean.is_finite() && self.mean > 0.0) {
            return Err(MiasmaError::ConfigError(format!(
                "{name} delay mean must be positive, got {}",
                self.mean
            )));
        }
        if !(self.sd.is_finite() && self.sd >= 0.0) {
            return Err(MiasmaError::ConfigError(format!(
                "{name} delay sd must be non-negative, got {}",
                self.sd
            )));
        }
        Ok(())
    }
}

/// Per-agent disease course parameters.
#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct DiseaseParameters {
    /// Probability an agent reaching the infectious stage follows the
    /// asymptomatic branch.
    pub p_asymptomatic: f64,
    /// Probability a susceptible agent in a contact group with an infectious
    /// member becomes infected.
    pub p_infected_given_contact: f64,
    /// Infected -> Infectious.
    pub latent_delay: StageDelay,
    /// Infectious -> Removed on the asymptomatic branch.
    pub asymptomatic_clearance_delay: StageDelay,
    /// Infectious -> SymptomaticInfectious, a fixed delay.
    pub presymptomatic_delay: f64,
    /// SymptomaticInfectious -> Removed.
    pub symptomatic_clearance_delay: StageDelay,
}

impl Default for DiseaseParameters {
    fn default() -> Self {
        DiseaseParameters {
            p_asymptomatic: 0.5,
            p_infected_given_contact: 1.0,
            latent_delay: StageDelay { mean: 4.6, sd: 0.3 },
            asymptomatic_clearance_delay: StageDelay { mean: 6.5, sd: 0.4 },
            presymptomatic_delay: 0.5,
            symptomatic_clearance_delay: StageDelay { mean: 6.0, sd: 0.4 },
        }
    }
}

/// How contact pairs are drawn from the population.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(tag = "strategy", rename_all = "snake_case")]
pub enum MixingStrategy {
    /// Any two distinct agents are equally likely to meet.
    Uniform,
    /// Contact probability between two agents decays with a power of their
    /// distance; only pairs within `distance_threshold` ever meet.
    Gravity {
        exponent: f64,
        distance_threshold: f64,
        /// Probability a symptomatic agent self-isolates out of a contact.
        p_isolates: f64,
    },
}

#[derive(Serialize, Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ParametersValues {
    pub population: usize,
    pub seed: u64,
    /// Run horizon in virtual days; pending plans past this are abandoned.
    pub max_time: f64,
    /// Index of the initially infected agent; defaults to the population
    /// midpoint.
    pub initial_infection: Option<usize>,
    pub mixing: MixingStrategy,
    pub contact_rate_per_agent: f64,
    pub disease: DiseaseParameters,
    /// Period of the prevalence snapshot, in days.
    pub report_period: f64,
    /// Stop the run early once no agent is mid-progression.
    pub stop_on_burnout: bool,
}

impl Default for ParametersValues {
    /// The stock scenario: 1000 uniformly mixing agents, one seeded
    /// infection at the midpoint, 12 contacts per agent-day, 1000-day
    /// horizon.
    fn default() -> Self {
        ParametersValues {
            population: 1000,
            seed: 0,
            max_time: 1000.0,
            initial_infection: None,
            mixing: MixingStrategy::Uniform,
            contact_rate_per_agent: 12.0,
            disease: DiseaseParameters::default(),
            report_period: 1.0,
            stop_on_burnout: true,
        }
    }
}

fn validate_probability(name: &str, p: f64) -> Result<(), MiasmaError> {
    if !(0.0..=1.0).contains(&p) {
        return Err(MiasmaError::ConfigError(format!(
            "{name} must be a probability in [0, 1], got {p}"
        )));
    }
    Ok(())
}

impl ParametersValues {
    /// The agent seeded with the initial infection.
    #[must_use]
    pub fn initial_infection_index(&self) -> usize {
        self.initial_infection.unwrap_or(self.population / 2)
    }

    /// Checks every configuration-error class before the run starts.
    ///
    /// # Errors
    ///
    /// Returns a `MiasmaError::ConfigError` naming the first invalid field.
    pub fn validate(&self) -> Result<(), MiasmaError> {
        if self.population < 2 {
            return Err(MiasmaError::ConfigError(format!(
                "population must be at least 2 to draw contact pairs, got {}",
                self.population
            )));
        }
        if !(self.max_time.is_finite() && self.max_time > 0.0) {
            return Err(MiasmaError::ConfigError(format!(
                "max_time must be positive, got {}",
                self.max_time
            )));
        }
        if !(self.contact_rate_per_agent.is_finite() && self.contact_rate_per_agent > 0.0) {
            return Err(MiasmaError::ConfigError(format!(
                "contact_rate_per_agent must be positive, got {}",
                self.contact_rate_per_agent
            )));
        }
        if !(self.report_period.is_finite() && self.report_period > 0.0) {
            return Err(MiasmaError::ConfigError(format!(
                "report_period must be positive, got {}",
                self.report_period
            )));
        }
        if self.initial_infection_index() >= self.population {
            return Err(MiasmaError::ConfigError(format!(
                "initial_infection index {} is out of bounds for population {}",
                self.initial_infection_index(),
                self.population
            )));
        }

        validate_probability("p_asymptomatic", self.disease.p_asymptomatic)?;
        validate_probability(
            "p_infected_given_contact",
            self.disease.p_infected_given_contact,
        )?;
        self.disease.latent_delay.validate("latent")?;
        self.disease
            .asymptomatic_clearance_delay
            .validate("asymptomatic clearance")?;
        self.disease
            .symptomatic_clearance_delay
            .validate("symptomatic clearance")?;
        if !(self.disease.presymptomatic_delay.is_finite()
            && self.disease.presymptomatic_delay > 0.0)
        {
            return Err(MiasmaError::ConfigError(format!(
                "presymptomatic delay must be positive, got {}",
                self.disease.presymptomatic_delay
            )));
        }

        if let MixingStrategy::Gravity {
            exponent,
            distance_threshold,
            p_isolates,
        } = self.mixing
        {
            if !exponent.is_finite() {
                return Err(MiasmaError::ConfigError(format!(
                    "gravity exponent must be finite, got {exponent}"
                )));
            }
            if !(distance_threshold.is_finite() && distance_threshold > 0.0) {
                return Err(MiasmaError::ConfigError(format!(
                    "gravity distance_threshold must be positive, got {distance_threshold}"
                )));
            }
            validate_probability("p_isolates", p_isolates)?;
        }
        Ok(())
    }
}

define_global_property!(Parameters, ParametersValues);

#[cfg(test)]
mod tests {
    use super::{MixingStrategy, ParametersValues};
    use crate::error::MiasmaError;

    fn assert_config_error(parameters: &ParametersValues, expected_fragment: &str) {
        match parameters.validate() {
            Err(MiasmaError::ConfigError(message)) => {
                assert!(
                    message.contains(expected_fragment),
                    "unexpected message: {message}"
                );
            }
            other => panic!("expected ConfigError, got {other:?}"),
        }
    }

    #[test]
    fn default_parameters_validate() {
        ParametersValues::default().validate().unwrap();
    }

    #[test]
    fn initial_infection_defaults_to_midpoint() {
        let parameters = ParametersValues::default();
        assert_eq!(parameters.initial_infection_index(), 500);

        let parameters = ParametersValues {
            initial_infection: Some(7),
            ..Default::default()
        };
        assert_eq!(parameters.initial_infection_index(), 7);
    }

    #[test]
    fn tiny_population_is_rejected() {
        let parameters = ParametersValues {
            population: 1,
            ..Default::default()
        };
        assert_config_error(&parameters, "population");
    }

    #[test]
    fn non_positive_contact_rate_is_rejected() {
        let parameters = ParametersValues {
            contact_rate_per_agent: 0.0,
            ..Default::default()
        };
        assert_config_error(&parameters, "contact_rate_per_agent");
    }

    #[test]
    fn out_of_range_probability_is_rejected() {
        let mut parameters = ParametersValues::default();
        parameters.disease.p_asymptomatic = 1.5;
        assert_config_error(&parameters, "p_asymptomatic");
    }

    #[test]
    fn non_positive_delay_mean_is_rejected() {
        let mut parameters = ParametersValues::default();
        parameters.disease.latent_delay.mean = -4.6;
        assert_config_error(&parameters, "latent");
    }

    #[test]
    fn out_of_bounds_seed_index_is_rejected() {
        let parameters = ParametersValues {
            initial_infection: Some(1000),
            ..Default::default()
        };
        assert_config_error(&parameters, "initial_infection");
    }

    #[test]
    fn gravity_threshold_must_be_positive() {
        let parameters = ParametersValues {
            mixing: MixingStrategy::Gravity {
                exponent: 2.0,
                distance_threshold: 0.0,
                p_isolates: 0.5,
            },
            ..Default::default()
        };
        assert_config_error(&parameters, "distance_threshold");
    }

    #[test]
    fn parameters_deserialize_with_defaults() {
        let parameters: ParametersValues = serde_json::from_str(
            r#"{
                "population": 100,
                "mixing": {
                    "strategy": "gravity",
                    "exponent": 2.0,
                    "distance_threshold": 0.1,
                    "p_isolates": 0.9
                }
            }"#,
        )
        .unwrap();
        assert_eq!(parameters.population, 100);
        assert_eq!(parameters.contact_rate_per_agent, 12.0);
        assert_eq!(
            parameters.mixing,
            MixingStrategy::Gravity {
                exponent: 2.0,
                distance_threshold: 0.1,
                p_isolates: 0.9,
            }
        );
        parameters.validate().unwrap();
    }
}
