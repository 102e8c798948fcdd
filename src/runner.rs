//! The command-line entry point: parses arguments, loads parameters, and
//! drives one simulation from setup through execution.

use std::path::{Path, PathBuf};

use clap::Parser;

use crate::context::Context;
use crate::error::MiasmaError;
use crate::global_properties::ContextGlobalPropertiesExt;
use crate::log::{set_log_level, LevelFilter};
use crate::params::{Parameters, ParametersValues};
use crate::report::ContextReportExt;

/// Command-line arguments for a simulation run.
#[derive(Parser, Debug)]
#[command(name = "miasma", about = "Stochastic agent-based epidemic simulator")]
pub struct BaseArgs {
    /// Overrides the random seed from the parameter file
    #[arg(short, long)]
    pub random_seed: Option<u64>,

    /// Path to a JSON parameter file; the stock scenario runs if omitted
    #[arg(short, long, default_value = "")]
    pub config: String,

    /// Directory for report output
    #[arg(short, long, default_value = "")]
    pub output_dir: String,

    /// Overwrite existing report files
    #[arg(short, long)]
    pub force_overwrite: bool,

    /// Log level (off, error, warn, info, debug, trace)
    #[arg(short, long)]
    pub log_level: Option<LevelFilter>,
}

/// Parses the command line, prepares a [`Context`], runs the provided setup
/// function, and executes the simulation to completion.
///
/// # Errors
///
/// Returns an error if the parameter file cannot be loaded or the setup
/// function fails.
pub fn run_with_args<F>(setup_fn: F) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs) -> Result<(), MiasmaError>,
{
    let args = BaseArgs::parse();
    run_with_args_internal(args, setup_fn)
}

fn run_with_args_internal<F>(
    args: BaseArgs,
    setup_fn: F,
) -> Result<Context, Box<dyn std::error::Error>>
where
    F: Fn(&mut Context, &BaseArgs) -> Result<(), MiasmaError>,
{
    if let Some(level) = args.log_level {
        set_log_level(level);
    }

    let mut context = Context::new();

    let mut parameters = if args.config.is_empty() {
        ParametersValues::default()
    } else {
        println!("Loading parameters from: {}", args.config);
        context.load_parameters_from_json::<ParametersValues>(Path::new(&args.config))?
    };
    if let Some(seed) = args.random_seed {
        parameters.seed = seed;
    }
    context.set_global_property_value(Parameters, parameters)?;

    let report_config = context.report_options();
    if !args.output_dir.is_empty() {
        report_config.directory(PathBuf::from(&args.output_dir));
    }
    report_config.overwrite(args.force_overwrite);

    setup_fn(&mut context, &args)?;

    context.execute();
    Ok(context)
}
