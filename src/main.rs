use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use orrery::{
    bodies::registry::{self, RegistryOptions},
    cli::ProgramArgs,
    clock::SimulationClock,
    error::OrreryResult,
    gravity::integrator::GravityIntegrator,
    input, output, sim,
};

fn run(args: ProgramArgs) -> OrreryResult<()> {
    let sim_params = input::gather_program_arguments(args)?;

    let source = input::read_body_records(&sim_params.input_bodies_file)?;
    let state = registry::load(
        &source,
        &RegistryOptions {
            gravitational_constant: sim_params.gravitational_constant,
            frame: sim_params.frame,
            implicit_central: Some(sim_params.central_body.clone()),
        },
    )?;

    let integrator =
        GravityIntegrator::new(sim_params.integrator, sim_params.gravitational_constant)?;
    let clock = SimulationClock::new(sim_params.fixed_dt, sim_params.time_scale)?
        .with_max_steps_per_frame(sim_params.max_steps_per_frame);

    let mut output_controller = output::csv_output::CSVController::new(&sim_params.output_dir)?;

    let summary = sim::simulate(
        state,
        &integrator,
        clock,
        &mut output_controller,
        &sim_params,
    )?;
    info!(
        frames_written = summary.frames_written,
        dir = %output_controller.run_dir().display(),
        "output complete"
    );

    Ok(())
}

fn main() -> ExitCode {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = ProgramArgs::parse();
    match run(args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "simulation aborted");
            ExitCode::FAILURE
        }
    }
}
