use miasma::runner::run_with_args;
use miasma::{incidence_report, model, prevalence_report};

fn main() {
    run_with_args(|context, _args| {
        // Build the population and the disease processes, then wire both
        // report channels before the run starts.
        model::init(context)?;
        incidence_report::init(context)?;
        prevalence_report::init(context)?;
        Ok(())
    })
    .unwrap();
}
