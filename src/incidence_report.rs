//! The incidence report: one CSV row per health status transition.

use serde::{Deserialize, Serialize};

use crate::agent::{AgentId, HealthStatus, HealthStatusEvent};
use crate::context::Context;
use crate::create_report_trait;
use crate::error::MiasmaError;
use crate::report::ContextReportExt;

#[derive(Serialize, Deserialize)]
pub struct IncidenceReportItem {
    pub time: f64,
    pub agent_id: AgentId,
    pub health_status: HealthStatus,
}

create_report_trait!(IncidenceReportItem);

fn handle_status_change(context: &mut Context, event: HealthStatusEvent) {
    context.send_report(IncidenceReportItem {
        time: context.get_current_time(),
        agent_id: event.agent_id,
        health_status: event.current,
    });
}

/// Opens the incidence CSV and subscribes to status transitions.
///
/// # Errors
///
/// Returns a `MiasmaError` if the report file cannot be created.
pub fn init(context: &mut Context) -> Result<(), MiasmaError> {
    context.add_report::<IncidenceReportItem>("incidence")?;
    context.subscribe_to_event::<HealthStatusEvent>(handle_status_change);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use tempfile::tempdir;

    use super::{init, IncidenceReportItem};
    use crate::agent::{ContextAgentExt, HealthStatus};
    use crate::context::Context;
    use crate::report::ContextReportExt;

    #[test]
    fn transitions_land_in_the_csv() {
        let mut context = Context::new();
        let temp_dir = tempdir().unwrap();
        context
            .report_options()
            .directory(temp_dir.path().to_path_buf());
        init(&mut context).unwrap();

        let agent_id = context.add_agent(None);
        context.add_plan(1.0, move |context| {
            context.set_health_status(agent_id, HealthStatus::Infected);
        });
        context.add_plan(3.0, move |context| {
            context.set_health_status(agent_id, HealthStatus::Removed);
        });
        context.execute();

        let file_path = temp_dir.path().join("incidence.csv");
        let mut reader = csv::Reader::from_path(file_path).unwrap();
        let rows: Vec<IncidenceReportItem> =
            reader.deserialize().map(Result::unwrap).collect();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].time, 1.0);
        assert_eq!(rows[0].agent_id, agent_id);
        assert_eq!(rows[0].health_status, HealthStatus::Infected);
        assert_eq!(rows[1].time, 3.0);
        assert_eq!(rows[1].health_status, HealthStatus::Removed);
    }
}
