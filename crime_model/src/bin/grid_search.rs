//! Grid search runner
//!
//! Runs every parameter combination listed in a TOML experiment file.
//!
//! Usage:
//!   cargo run --release --bin grid_search -- experiments/baseline.toml

use std::env;
use std::process;
use std::time::Instant;

use crime_model::experiment::ExperimentConfig;
use crime_model::grid_search::{summarize_by, Parameter, Target};
use crime_model::output::SweepOutput;
use crime_model::ExperimentError;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <experiment_config.toml>", args[0]);
        eprintln!("Example: {} experiments/baseline.toml", args[0]);
        process::exit(1);
    }

    if let Err(e) = run(&args[1]) {
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

fn run(config_path: &str) -> Result<(), ExperimentError> {
    println!("=== Crime Model Grid Search ===\n");
    println!("Loading experiment config: {}\n", config_path);

    let config = ExperimentConfig::load(config_path)?;
    let search = config.grid_search();

    println!("Experiment: {}", config.experiment.name);
    println!("Description: {}", config.experiment.description);
    println!(
        "Configuration: {} combinations × {} runs = {} simulations\n",
        config.sweep.num_combinations(),
        search.runs_per_combination,
        search.num_runs()
    );

    let start = Instant::now();
    let results = search.run()?;
    if results.is_empty() {
        return Err(ExperimentError::NoResults(config.experiment.name.clone()));
    }
    println!(
        "✓ {} runs complete in {:.1}s\n",
        results.len(),
        start.elapsed().as_secs_f64()
    );

    for parameter in Parameter::ALL {
        if parameter.num_values(&config.sweep) < 2 {
            continue;
        }
        println!("--- {} ---", parameter);
        println!(
            "{:<20} {:>5} {:>18} {:>18}",
            "Value", "Runs", "Crime rate", "Final Gini"
        );
        println!("{:-<20} {:->5} {:->18} {:->18}", "", "", "", "");
        let crime = summarize_by(&results, parameter, Target::CrimeRate);
        let gini = summarize_by(&results, parameter, Target::GiniEnd);
        for (c, g) in crime.iter().zip(&gini) {
            println!(
                "{:<20} {:>5} {:>9.3} ± {:<6.3} {:>9.3} ± {:<6.3}",
                c.value, c.count, c.stats.mean, c.stats.std, g.stats.mean, g.stats.std
            );
        }
        println!();
    }

    let output = SweepOutput::new(&config, results);
    let output_dir = config.output_dir();
    let written = output.save(&output_dir, &config.output)?;
    for path in &written {
        println!("Wrote {}", path.display());
    }

    Ok(())
}
