//! headless — drive a fleet without a presentation layer.
//!
//! Loads a navigation graph (native JSON, or a level document with
//! `--levels`), or builds a synthetic grid when no file is given.  Spawns
//! robots on free spawn points, feeds seeded random tasks and runs the tick
//! loop, auditing invariants every tick.
//!
//! ```text
//! headless --robots 5 --tasks 20 --ticks 500
//! RUST_LOG=debug headless warehouse.json --levels --seed 7
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result, bail};
use clap::Parser;

use fleet_core::{FleetConfig, FleetEvent, NodeId, Point, TimedEvent};
use fleet_graph::{DEFAULT_SPAWN_PREFIX, NavGraph, NavGraphBuilder, load_json_file, load_levels_file};
use fleet_robot::RobotState;
use fleet_sim::{FleetObserver, FleetSimBuilder, FleetSnapshot, WorkloadGenerator};
use fleet_task::TaskStatus;

// ── CLI ───────────────────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "headless", version, about)]
struct Cli {
    /// Navigation graph file.  Omit for a synthetic grid.
    graph: Option<PathBuf>,

    /// Read `graph` as a level document instead of a native description.
    #[arg(long)]
    levels: bool,

    /// Name prefix marking spawn points in a level document.
    #[arg(long, default_value = DEFAULT_SPAWN_PREFIX)]
    spawn_prefix: String,

    /// Side length of the synthetic grid.
    #[arg(long, default_value_t = 6)]
    grid: usize,

    #[arg(short, long, default_value_t = 5)]
    robots: usize,

    #[arg(short, long, default_value_t = 20)]
    tasks: usize,

    #[arg(long, default_value_t = 500)]
    ticks: u64,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Lane weight covered per tick.
    #[arg(long, default_value_t = 1.0)]
    weight_per_tick: f32,

    /// Stop as soon as every task has finished.
    #[arg(long)]
    until_done: bool,

    /// Fallback log filter when `RUST_LOG` is unset.
    #[arg(long, default_value = "info")]
    log_level: String,
}

// ── Observer ──────────────────────────────────────────────────────────────────

#[derive(Default)]
struct Tally {
    ticks:      u64,
    grants:     usize,
    queued:     usize,
    deadlocks:  usize,
    detours:    usize,
    completed:  usize,
    violations: usize,
}

impl FleetObserver for Tally {
    fn on_event(&mut self, event: &TimedEvent) {
        match event.event {
            FleetEvent::ReservationGranted { .. } => self.grants += 1,
            FleetEvent::ReservationQueued { .. } => self.queued += 1,
            FleetEvent::DeadlockDetected { .. } => self.deadlocks += 1,
            FleetEvent::DeadlockResolved { replanned: true, .. } => self.detours += 1,
            FleetEvent::TaskCompleted { .. } => self.completed += 1,
            _ => {}
        }
    }

    fn on_tick_end(&mut self, _snapshot: &FleetSnapshot) {
        self.ticks += 1;
    }
}

// ── Setup ─────────────────────────────────────────────────────────────────────

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("failed to create log filter")?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .compact()
        .init();
    Ok(())
}

fn synthetic_grid(side: usize) -> Result<NavGraph> {
    if side < 2 {
        bail!("grid side must be at least 2, got {side}");
    }
    let mut b = NavGraphBuilder::with_capacity(side * side, 4 * side * (side - 1));
    let id = |x: usize, y: usize| NodeId((y * side + x) as u32);
    for y in 0..side {
        for x in 0..side {
            b.add_node(Point::new(x as f32, y as f32));
        }
    }
    for y in 0..side {
        for x in 0..side {
            if x + 1 < side {
                b.add_lane_pair(id(x, y), id(x + 1, y), 1.0);
            }
            if y + 1 < side {
                b.add_lane_pair(id(x, y), id(x, y + 1), 1.0);
            }
        }
    }
    Ok(b.build()?)
}

fn load_graph(cli: &Cli) -> Result<NavGraph> {
    match &cli.graph {
        Some(path) if cli.levels => load_levels_file(path, &cli.spawn_prefix)
            .with_context(|| format!("loading level document {}", path.display())),
        Some(path) => load_json_file(path).with_context(|| format!("loading graph {}", path.display())),
        None => synthetic_grid(cli.grid),
    }
}

// ── main ──────────────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    let graph = load_graph(&cli)?;
    println!(
        "Graph: {} nodes, {} lanes, {} spawn points, {} task endpoints",
        graph.node_count(),
        graph.lane_count(),
        graph.spawn_points().len(),
        graph.task_endpoints().len(),
    );

    let config = FleetConfig { weight_per_tick: cli.weight_per_tick, ..Default::default() };
    let mut sim = FleetSimBuilder::new(graph).config(config).build()?;

    let mut workload = WorkloadGenerator::new(cli.seed);
    let robots = workload.spawn_robots(&mut sim, cli.robots)?;
    let tasks = workload.submit_tasks(&mut sim, cli.tasks)?;
    println!("Robots: {}  |  Tasks: {}  |  Seed: {}", robots.len(), tasks.len(), cli.seed);
    if robots.len() < cli.robots {
        tracing::warn!(requested = cli.robots, spawned = robots.len(), "ran out of free spawn points");
    }
    println!();

    let mut tally = Tally::default();
    let t0 = Instant::now();
    for _ in 0..cli.ticks {
        sim.step_with(&mut tally)?;
        let violations = sim.audit();
        if !violations.is_empty() {
            tracing::error!(tick = sim.tick().0, ?violations, "invariant violated");
            tally.violations += violations.len();
        }
        sim.drain_events();
        if cli.until_done && sim.is_quiescent() {
            break;
        }
    }
    let elapsed = t0.elapsed();

    // ── Summary ───────────────────────────────────────────────────────────
    let snap = sim.snapshot();
    println!("Ran {} ticks in {:.3} s", tally.ticks, elapsed.as_secs_f64());
    println!(
        "  grants {}  |  queued {}  |  deadlocks {} ({} detoured)  |  violations {}",
        tally.grants, tally.queued, tally.deadlocks, tally.detours, tally.violations
    );
    println!(
        "  tasks: {} completed, {} failed, {} pending, {} active",
        snap.count_tasks(TaskStatus::Completed),
        snap.count_tasks(TaskStatus::Failed),
        snap.count_tasks(TaskStatus::Pending),
        snap.tasks.iter().filter(|t| t.status.is_active()).count(),
    );
    println!();

    println!("{:<8} {:<10} {:<8} {:<8}", "Robot", "State", "Node", "Task");
    println!("{}", "-".repeat(36));
    for r in &snap.robots {
        let task = r.task.map(|t| t.to_string()).unwrap_or_else(|| "-".into());
        println!("{:<8} {:<10} {:<8} {:<8}", r.id.0, r.state.to_string(), r.node.0, task);
    }
    let stuck = snap.robots.iter().filter(|r| r.state == RobotState::Waiting).count();
    if stuck > 0 {
        println!("\n{stuck} robot(s) still waiting at the end of the run");
    }

    if tally.violations > 0 {
        bail!("{} invariant violations", tally.violations);
    }
    Ok(())
}
