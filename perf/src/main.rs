mod bench;
mod config;
mod error;
mod stats;

use std::time::Duration;

use clap::Parser;
use places_core::{Places, PlacesClient, UreqTransport};
use rand::rngs::StdRng;
use rand::SeedableRng;

use bench::{Bench, Operation, Phase};
use config::PerfArgs;
use error::PerfError;

#[derive(Parser)]
#[command(name = "places-perf", about = "Times add, get, update and search requests against a Places server")]
struct Cli {
    #[command(flatten)]
    args: PerfArgs,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(&cli.args) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(args: &PerfArgs) -> Result<(), PerfError> {
    let config = config::client_config(args)?;
    let client = PlacesClient::new(&config)?;
    tracing::info!(base_url = client.base_url(), requests = args.requests, "starting");

    let transport = UreqTransport::with_timeout(Duration::from_secs(args.timeout_secs));
    let rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };
    let mut bench = Bench::new(Places::with_transport(client, transport), rng);

    for operation in Operation::ALL {
        let phase = bench.run_phase(operation, args.requests);
        print!("{}", report(&phase));
        if operation == Operation::Add && args.settle_secs > 0 {
            tracing::info!(seconds = args.settle_secs, "waiting for new records to settle");
            std::thread::sleep(Duration::from_secs(args.settle_secs));
        }
    }
    Ok(())
}

fn report(phase: &Phase) -> String {
    let mut out = format!(
        "\n{}: {} requests completed, {} requests failed\n",
        phase.operation, phase.completed, phase.failed
    );
    match stats::summarize(&phase.times) {
        Some(summary) => {
            out.push_str(&format!("{summary}\n\n"));
            let edges = stats::default_edges();
            let counts = stats::histogram(&phase.times, &edges);
            out.push_str(&stats::render_histogram(&edges, &counts));
        }
        None => out.push_str("no timings\n"),
    }
    out
}
