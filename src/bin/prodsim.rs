//! prodsim CLI
//!
//! Runs one replication of the production line and optionally writes the
//! event trace and the departed orders as CSV.
//!
//! ```bash
//! prodsim --seed 7 --horizon 10000 --trace-csv trace.csv --orders-csv orders.csv
//! RUST_LOG=prodsim=debug prodsim --horizon 500
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::Parser;
use prodsim::{
    EventRecord, LineConfig, MemoryRecorder, Order, ServiceTimePolicy, Simulation, Snapshot,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Production line simulator
///
/// Single-threaded and reproducible: the same seed and parameters give the
/// same trace.
#[derive(Parser, Debug)]
#[command(name = "prodsim")]
#[command(version, about, long_about = None)]
struct Args {
    /// Random seed
    #[arg(long, default_value = "42")]
    seed: u64,

    /// Simulated time at which the run stops
    #[arg(long, default_value = "1000")]
    horizon: f64,

    /// Number of admission queues
    #[arg(short = 'q', long, default_value = "1")]
    queues: usize,

    /// Mean time between order arrivals
    #[arg(long, default_value = "60")]
    mean_interarrival: f64,

    /// Mean service (construction) time
    #[arg(long, default_value = "45")]
    mean_service: f64,

    /// Mean time between machine breakdowns
    #[arg(long, default_value = "2880")]
    mean_interbreakdown: f64,

    /// Mean repair time
    #[arg(long, default_value = "180")]
    mean_repair: f64,

    /// Time of the first breakdown
    #[arg(long, default_value = "150")]
    first_breakdown_at: f64,

    /// Sample service times instead of using the mean
    #[arg(long)]
    exponential_service: bool,

    /// Write one row per processed event
    #[arg(long)]
    trace_csv: Option<PathBuf>,

    /// Write one row per departed order
    #[arg(long)]
    orders_csv: Option<PathBuf>,
}

impl Args {
    fn config(&self) -> LineConfig {
        LineConfig {
            seed: self.seed,
            horizon: self.horizon,
            queues: self.queues,
            mean_interarrival: self.mean_interarrival,
            mean_service: self.mean_service,
            mean_interbreakdown: self.mean_interbreakdown,
            mean_repair: self.mean_repair,
            first_breakdown_at: self.first_breakdown_at,
            service_policy: if self.exponential_service {
                ServiceTimePolicy::Exponential
            } else {
                ServiceTimePolicy::Deterministic
            },
        }
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,prodsim=info")),
        )
        .init();

    let args = Args::parse();
    let mut sim = match Simulation::new(args.config()) {
        Ok(sim) => sim,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    let mut recorder = MemoryRecorder::new();
    let summary = match sim.run(&mut recorder) {
        Ok(summary) => summary,
        Err(e) => {
            error!(at = sim.now(), "run aborted: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Some(path) = &args.trace_csv {
        match write_trace_csv(path, &recorder.rows) {
            Ok(()) => info!(path = %path.display(), "saved event trace"),
            Err(e) => {
                error!(path = %path.display(), "failed to write event trace: {e}");
                return ExitCode::FAILURE;
            }
        }
    }
    if let Some(path) = &args.orders_csv {
        match write_orders_csv(path, &recorder.departures) {
            Ok(()) => info!(path = %path.display(), "saved departures"),
            Err(e) => {
                error!(path = %path.display(), "failed to write departures: {e}");
                return ExitCode::FAILURE;
            }
        }
    }

    println!("End time:          {:.3}", summary.end_time);
    println!("Events processed:  {}", summary.events_processed);
    println!("Orders created:    {}", summary.orders_created);
    println!("Orders completed:  {}", summary.orders_departed);
    println!("Orders waiting:    {}", summary.orders_waiting);
    println!("Orders in service: {}", summary.orders_in_service);
    println!("Breakdowns:        {}", summary.breakdowns);
    println!("Repairs:           {}", summary.repairs);
    if !recorder.departures.is_empty() {
        let total: f64 = recorder.departures.iter().filter_map(Order::flow_time).sum();
        println!(
            "Mean flow time:    {:.3}",
            total / recorder.departures.len() as f64
        );
    }
    ExitCode::SUCCESS
}

fn write_trace_csv<P: AsRef<Path>>(
    path: P,
    rows: &[(EventRecord, Snapshot)],
) -> std::io::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    writeln!(f, "time,event_id,event,server,pending,queue_lengths,in_service,machine")?;
    for (event, snap) in rows {
        let queues: Vec<String> = snap.queue_lengths.iter().map(usize::to_string).collect();
        let serving: Vec<String> = snap
            .in_service
            .iter()
            .map(|s| s.map_or_else(|| "-".to_string(), |id| id.to_string()))
            .collect();
        writeln!(
            f,
            "{:.6},{},{},{},{},{},{},{}",
            event.time,
            event.id.0,
            event.kind,
            event.server.map_or_else(String::new, |s| s.to_string()),
            snap.pending_events,
            queues.join(";"),
            serving.join(";"),
            snap.machine_status
        )?;
    }
    f.flush()
}

fn write_orders_csv<P: AsRef<Path>>(path: P, orders: &[Order]) -> std::io::Result<()> {
    let mut f = BufWriter::new(File::create(path)?);
    writeln!(f, "order,server,arrival,service_start,completion")?;
    for order in orders {
        writeln!(
            f,
            "{},{},{:.6},{:.6},{:.6}",
            order.id,
            order.server.map_or_else(String::new, |s| s.to_string()),
            order.arrival_time,
            order.service_start,
            order.completion
        )?;
    }
    f.flush()
}
