use anyhow::Result;
use clap::{Parser, ValueEnum};
use distflow::debug::{format_f64, format_phasors};
use distflow::{demo, Algorithm, AlgorithmKind, LogProgress, Network, SolveOptionsBuilder};
use spsolve::rlu::RLU;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Feeder {
    /// Unbalanced load behind a line without shunt.
    SimpleLine,
    /// Unbalanced load behind a line with shunt admittances.
    ShuntLine,
    /// Phase to phase fault at the load bus.
    ShortCircuit,
    /// MV source, Dyn11 transformer and LV line.
    Transformer,
    /// Voltage controlled production units.
    Flexible,
}

/// Unbalanced distribution load flow on a demonstration feeder.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Feeder to solve.
    #[arg(value_enum, default_value_t = Feeder::SimpleLine)]
    feeder: Feeder,

    /// Load flow algorithm.
    #[arg(long)]
    alg: Option<AlgorithmKind>,

    /// Goldstein and Price bracket constants.
    #[arg(long)]
    m1: Option<f64>,
    #[arg(long)]
    m2: Option<f64>,

    /// Termination tolerance on the residual.
    #[arg(long)]
    tol: Option<f64>,

    /// Maximum number of iterations.
    #[arg(long)]
    max_it: Option<usize>,

    /// Report every iteration.
    #[arg(short, long, default_value_t = false)]
    verbose: bool,
}

fn main() {
    env_logger::Builder::from_default_env()
        .format_level(false)
        .format_target(false)
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match execute(&cli) {
        Ok(_) => {
            std::process::exit(0);
        }
        Err(err) => {
            eprintln!("error: {}", err);
            std::process::exit(2);
        }
    }
}

fn feeder(feeder: Feeder) -> distflow::Result<Network> {
    match feeder {
        Feeder::SimpleLine => demo::simple_line(),
        Feeder::ShuntLine => demo::shunt_line(),
        Feeder::ShortCircuit => demo::short_circuit(),
        Feeder::Transformer => demo::transformer_feeder(),
        Feeder::Flexible => demo::flexible_feeder(),
    }
}

fn execute(cli: &Cli) -> Result<()> {
    let mut net = feeder(cli.feeder)?;

    let mut builder = SolveOptionsBuilder::default();
    if let Some(kind) = cli.alg {
        let mut params = HashMap::new();
        if let Some(m1) = cli.m1 {
            params.insert("m1".to_string(), m1);
        }
        if let Some(m2) = cli.m2 {
            params.insert("m2".to_string(), m2);
        }
        builder.algorithm(Algorithm::from_params(kind, &params)?);
    }
    if let Some(tol) = cli.tol {
        builder.tolerance(tol);
    }
    if let Some(max_it) = cli.max_it {
        builder.max_iterations(max_it);
    }
    let options = builder.build()?;

    let solver = RLU::default();
    let iterations = if cli.verbose {
        net.solve_with_progress(&options, &solver, Some(&LogProgress))?
    } else {
        net.solve_with(&options, &solver)?
    };
    let results = net.results()?;

    println!("converged in {} iterations", iterations);
    println!();
    println!("Bus potentials (V)");
    for bus in &results.buses {
        println!("  {:<10} {}", bus.id, format_phasors(&bus.phases, &bus.potentials));
    }
    for ground in &results.grounds {
        println!("  {:<10} {}", ground.id, distflow::debug::format_polar(&ground.potential));
    }
    println!();
    println!("Line currents (A)");
    for line in &results.lines {
        println!("  {:<10} {}", line.id, format_phasors(&line.phases, &line.currents1));
        println!("  {:<10} losses {} W", "", format_f64(line.total_losses().re));
    }
    for tr in &results.transformers {
        println!("  {:<10} {}", tr.id, format_phasors(&tr.phases_hv, &tr.currents_hv));
        println!("  {:<10} {}", "", format_phasors(&tr.phases_lv, &tr.currents_lv));
    }
    for sc in &results.short_circuits {
        println!("  {:<10} {}", sc.id, format_phasors(&sc.phases, &sc.currents));
    }
    if let Some(load) = results.loads.iter().find(|l| l.flexible_powers.is_some()) {
        println!();
        println!("Flexible powers (VA)");
        println!("  {:<10} {}", load.id, distflow::debug::format_rect_vec(&load.branch_powers));
    }
    Ok(())
}
