use std::env;

use crime_model::collector::DataCollector;
use crime_model::{ModelParams, Population, RngSource, WealthDistribution};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let num_agents = 500;
    let steps = 50;
    let seed = 42;
    let params = ModelParams::gaussian_theft(num_agents, 0.1, 0.3, 0.1);
    let distribution = WealthDistribution::Gamma {
        shape: 2.0,
        scale: 1.0,
    };

    println!("========================================");
    println!("Wealth Disparity Crime Model");
    println!("========================================");
    println!("Agents:        {}", num_agents);
    println!("Steps:         {}", steps);
    println!("Seed:          {}", seed);
    println!("Wealth:        {}", distribution);
    println!("Deterrence:    {} ({})", params.deterrence, params.deterrence_rule);
    println!("Theft share:   {}", params.theft_fraction);

    let mut rng = StdRng::seed_from_u64(seed);
    let wealth = distribution.sample(num_agents, &mut rng)?;
    let mut population = Population::new(params, wealth, RngSource::new(rng))?;

    // Step 0 holds the initial state
    let mut collector = DataCollector::new();
    collector.collect(&population)?;
    for _ in 0..steps {
        population.step()?;
        collector.collect(&population)?;
    }

    println!("\n{:>6} {:>12} {:>10}", "Step", "Crime rate", "Gini");
    println!("{:->6} {:->12} {:->10}", "", "", "");
    for row in collector.model_rows() {
        if row.step <= 1 || row.step % 5 == 0 {
            println!("{:>6} {:>12.4} {:>10.4}", row.step, row.crime_rate, row.gini);
        }
    }

    let stats = population.population_stats();
    let gini_start = collector.model_rows().first().map_or(stats.gini, |row| row.gini);
    println!("\nSummary");
    println!("  Offenders:   {} / {}", stats.num_offenders(), num_agents);
    println!("  Crime rate:  {:.4}", stats.crime_rate);
    println!("  Gini:        {:.4} -> {:.4}", gini_start, stats.gini);

    if let Some(dir) = env::args().nth(1) {
        collector.write_csv(&dir)?;
        info!(dir = %dir, "model.csv and agents.csv written");
    }

    Ok(())
}
