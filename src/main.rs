use clap::{Parser, Subcommand};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::{Path, PathBuf};

use brunel_snn::analysis::sweep_statistics;
use brunel_snn::backend::{backend_for, Backend, Recording};
use brunel_snn::builder::brunel_network;
use brunel_snn::error::SimError;
use brunel_snn::params::Parameters;
use brunel_snn::plot::activity_figure;
use brunel_snn::recording::save_segments;
use brunel_snn::sweep::{SweepPlan, SweepRunner};

#[derive(Parser, Debug)]
#[command(name = "brunel_snn")]
#[command(about = "Run Brunel (2000) network experiments on external simulator backends")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single experiment
    Run {
        /// The implementation to use ('nineml', 'nest' or '9mltoolkit')
        implementation: String,
        /// Parameter file for this experiment
        parameter_file: PathBuf,
        /// Plot the simulation results to a PNG file
        #[arg(long)]
        plot_figure: bool,
    },
    /// Run a parameter sweep, one subprocess per point
    Sweep {
        /// The implementation to use ('nineml', 'nest' or '9mltoolkit')
        implementation: String,
        /// Baseline parameter file for this experiment
        parameter_file: PathBuf,
        /// Number of concurrent jobs
        #[arg(long, default_value_t = 10)]
        jobs: usize,
        /// Sweep over these seeds instead of the (g, eta) grid
        #[arg(long, num_args = 1..)]
        seeds: Vec<u64>,
    },
    /// Compute spike train statistics over a sweep's results
    Stats {
        /// Directory containing data generated by running a sweep
        directory: PathBuf,
    },
}

fn init_logging() -> Result<(), SimError> {
    let stderr = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new("{l} - {m}\n")))
        .build();
    let config = Config::builder()
        .appender(Appender::builder().build("stderr", Box::new(stderr)))
        .build(Root::builder().appender("stderr").build(LevelFilter::Info))
        .map_err(|e| SimError::IOError(e.to_string()))?;
    log4rs::init_config(config).map_err(|e| SimError::IOError(e.to_string()))?;
    Ok(())
}

fn main() -> Result<(), SimError> {
    let cli = Cli::parse();
    init_logging()?;

    match cli.command {
        Commands::Run {
            implementation,
            parameter_file,
            plot_figure,
        } => {
            let parameters = Parameters::from_file(&parameter_file)?;
            let backend = backend_for(&implementation)?;

            log::info!("Building network");
            let model = brunel_network(&parameters.network)?;

            let output = parameters.experiment.output_path(backend.name())?;
            if let Some(parent) = output.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)
                        .map_err(|e| SimError::IOError(e.to_string()))?;
                }
            }
            let recording = if plot_figure {
                Recording::Figure
            } else {
                Recording::Statistics {
                    n_record: parameters.experiment.n_record,
                }
            };

            log::info!("Running simulation");
            let data = backend.run(&model, &parameters.experiment, &recording, &output)?;

            log::info!("Handling data");
            if plot_figure {
                let figure = output.with_extension("png");
                activity_figure(&data, parameters.experiment.plot_limits, &figure)?;
            } else {
                save_segments(&data, &output)?;
                log::info!("Wrote data to {}", output.display());
            }
            Ok(())
        }
        Commands::Sweep {
            implementation,
            parameter_file,
            jobs,
            seeds,
        } => {
            let parameters = Parameters::from_file(&parameter_file)?;
            // fail on an unknown token before launching anything
            backend_for(&implementation)?;
            let plan = if seeds.is_empty() {
                SweepPlan::default_grid()
            } else {
                SweepPlan::Seeds(seeds)
            };
            let mut runner = SweepRunner::new(&implementation)?;
            runner.jobs = jobs;
            let results_dir = runner.run(&parameters, &plan, Path::new("results"))?;
            log::info!("Sweep results in {}", results_dir.display());
            Ok(())
        }
        Commands::Stats { directory } => {
            let statistics = sweep_statistics(&directory)?;
            log::info!("Statistics written to {}", statistics.display());
            Ok(())
        }
    }
}
