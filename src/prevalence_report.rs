//! The prevalence report: periodic per-status population counts.
//!
//! The snapshot tick runs in `ExecutionPhase::Last` so every transition at
//! the tick time lands before it is counted. The tick also watches for
//! burnout: once no agent is mid-progression the outbreak can never grow
//! again, and the run may stop early instead of idling to the horizon.

use log::info;
use serde::{Deserialize, Serialize};

use crate::agent::{ContextAgentExt, HealthStatus};
use crate::context::Context;
use crate::create_report_trait;
use crate::error::MiasmaError;
use crate::params::Parameters;
use crate::plan::ExecutionPhase;
use crate::report::ContextReportExt;
use crate::ContextGlobalPropertiesExt;

#[derive(Serialize, Deserialize)]
pub struct PrevalenceReportItem {
    pub time: f64,
    pub health_status: HealthStatus,
    pub count: usize,
}

create_report_trait!(PrevalenceReportItem);

fn snapshot(context: &mut Context, stop_on_burnout: bool) {
    let time = context.get_current_time();
    for health_status in HealthStatus::ALL {
        context.send_report(PrevalenceReportItem {
            time,
            health_status,
            count: context.count_agents_where(|status| status == health_status),
        });
    }

    if stop_on_burnout && context.count_agents_where(HealthStatus::is_active) == 0 {
        info!("outbreak burned out at t={time}, stopping early");
        context.shutdown();
    }
}

/// Opens the prevalence CSV and schedules the periodic snapshot, starting
/// with a baseline at the current time.
///
/// # Errors
///
/// Returns a `MiasmaError` if the report file cannot be created.
pub fn init(context: &mut Context) -> Result<(), MiasmaError> {
    let parameters = context
        .get_global_property_value(Parameters)
        .expect("Parameters must be set before initializing reports");
    let report_period = parameters.report_period;
    let stop_on_burnout = parameters.stop_on_burnout;

    context.add_report::<PrevalenceReportItem>("prevalence")?;
    context.add_periodic_plan_with_phase(
        report_period,
        move |context| snapshot(context, stop_on_burnout),
        ExecutionPhase::Last,
    );
    Ok(())
}
