//! swarf CLI - cutting-simulation runner
//!
//! Loads a setup file, machine spec, tool table and part program, then
//! plays the program through the volumetric simulation, reporting
//! progress, collisions and envelope violations.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use swarf_config::{parse_machine_spec, PersistedPaths, SetupConfig, ToolTable};
use swarf_motion::{Interpreter, MachineStatus, MotionPlayer};
use swarf_sim::{SimEvent, SimState, Simulator};

#[derive(Parser)]
#[command(name = "swarf")]
#[command(about = "Volumetric cutting simulation", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a part program through the simulation
    Run {
        /// Part program (.ngc via the interpreter, or .canon directly)
        program: PathBuf,
        /// Setup file (octree, step size, stock and parts)
        #[arg(short, long)]
        setup: Option<PathBuf>,
        /// Machine-spec file (limits, feeds, spindle power, holder)
        #[arg(short, long)]
        machine: Option<PathBuf>,
        /// Tool table
        #[arg(short, long)]
        tools: Option<PathBuf>,
        /// RS-274 interpreter binary
        #[arg(short, long)]
        interpreter: Option<PathBuf>,
        /// Resume automatically after hard warnings
        #[arg(long)]
        keep_going: bool,
        /// Stop after this many transactions
        #[arg(long)]
        step_limit: Option<usize>,
    },
    /// Print the parsed configuration
    Info {
        /// Setup file
        #[arg(short, long)]
        setup: Option<PathBuf>,
        /// Machine-spec file
        #[arg(short, long)]
        machine: Option<PathBuf>,
        /// Tool table
        #[arg(short, long)]
        tools: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            program,
            setup,
            machine,
            tools,
            interpreter,
            keep_going,
            step_limit,
        } => run_program(
            program,
            setup,
            machine,
            tools,
            interpreter,
            keep_going,
            step_limit,
        ),
        Commands::Info {
            setup,
            machine,
            tools,
        } => show_info(setup, machine, tools),
    }
}

fn paths_file() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .map(|home| PathBuf::from(home).join(".config").join("swarf").join("paths.json"))
}

fn load_persisted() -> PersistedPaths {
    paths_file()
        .and_then(|p| PersistedPaths::load(&p).ok())
        .unwrap_or_default()
}

#[allow(clippy::too_many_arguments)]
fn run_program(
    program: PathBuf,
    setup_path: Option<PathBuf>,
    machine_path: Option<PathBuf>,
    tools_path: Option<PathBuf>,
    interpreter_path: Option<PathBuf>,
    keep_going: bool,
    step_limit: Option<usize>,
) -> Result<()> {
    let mut persisted = load_persisted();
    let setup_path = setup_path.or(persisted.setup.clone());
    let machine_path = machine_path.or(persisted.machine_spec.clone());
    let tools_path = tools_path.or(persisted.tool_table.clone());
    let interpreter_path = interpreter_path
        .or(persisted.interpreter.clone())
        .unwrap_or_else(|| PathBuf::from("/usr/bin/rs274"));

    // setup
    let (setup, setup_errors) = match &setup_path {
        Some(path) => SetupConfig::parse_file(path)
            .with_context(|| format!("reading setup file {}", path.display()))?,
        None => (SetupConfig::default(), 0),
    };
    if setup_errors > 0 {
        log::warn!("setup file: {setup_errors} erroneous lines skipped");
    }

    // machine spec
    let (envelope, machine_errors) = match &machine_path {
        Some(path) => parse_machine_spec(path)
            .with_context(|| format!("reading machine spec {}", path.display()))?,
        None => (Default::default(), 0),
    };
    if machine_errors > 0 {
        log::warn!("machine spec: {machine_errors} erroneous lines skipped");
    }

    // tool table
    let tool_table = match &tools_path {
        Some(path) => {
            let (table, count) = ToolTable::read_file(path)
                .with_context(|| format!("reading tool table {}", path.display()))?;
            if table.is_empty() {
                bail!("tool table {} holds no usable tools", path.display());
            }
            println!("{count} tools loaded");
            table
        }
        None => ToolTable::default(),
    };

    // interpret the program; failure here leaves nothing mutated
    let tool_table_file = tools_path.clone().unwrap_or_else(|| PathBuf::from("/dev/null"));
    let interp = Interpreter::new(interpreter_path.clone(), tool_table_file);
    let initial = MachineStatus::new(setup.initial_position, setup.user_origin);
    let lines = interp
        .interpret_file(&program, initial)
        .with_context(|| format!("interpreting {}", program.display()))?;
    println!("{} canonical lines", lines.len());

    let player = MotionPlayer::new(lines);
    let (mut sim, events) = Simulator::new(&setup, envelope, tool_table, player)?;

    // remember what we ran with
    persisted.setup = setup_path;
    persisted.machine_spec = machine_path;
    persisted.tool_table = tools_path;
    persisted.interpreter = Some(interpreter_path);
    if let Some(path) = paths_file() {
        if let Err(e) = persisted.save(&path) {
            log::warn!("could not persist paths: {e}");
        }
    }

    sim.play();
    let mut steps = 0usize;
    let mut last_percent = u32::MAX;
    loop {
        let advanced = sim.step()?;
        steps += 1;
        for event in events.try_iter() {
            match event {
                SimEvent::Progress(p) => {
                    if p.percent != last_percent {
                        last_percent = p.percent;
                        println!("{:3}% line {} t={:.1}s", p.percent, p.line, p.elapsed_s);
                    }
                }
                SimEvent::Warning(w) => println!("WARNING: {w}"),
                SimEvent::ToolChange(t) => println!("tool change to slot {t}"),
                SimEvent::Finished => println!("program finished"),
                SimEvent::ToolPosition { .. } | SimEvent::Debug(_) => {}
            }
        }
        if step_limit.is_some_and(|limit| steps >= limit) {
            println!("step limit reached");
            break;
        }
        if !advanced {
            match sim.state() {
                SimState::Paused if keep_going => sim.play(),
                SimState::Paused => {
                    println!("paused on a hard warning; rerun with --keep-going to continue");
                    break;
                }
                _ => break,
            }
        }
    }

    let stats = sim.tree().stats();
    println!("octree: {} nodes", stats.total());
    Ok(())
}

fn show_info(
    setup_path: Option<PathBuf>,
    machine_path: Option<PathBuf>,
    tools_path: Option<PathBuf>,
) -> Result<()> {
    if let Some(path) = setup_path {
        let (setup, errors) = SetupConfig::parse_file(&path)?;
        println!("setup {}:", path.display());
        println!("  cube size {}", setup.octree_cube_size);
        println!("  max depth {}", setup.octree_max_depth);
        println!(
            "  step {} ({})",
            setup.step_size,
            if setup.variable_step { "variable" } else { "fixed" }
        );
        println!("  stock volumes {}", setup.stock.len());
        println!("  parts volumes {}", setup.parts.len());
        if errors > 0 {
            println!("  {errors} erroneous lines skipped");
        }
    }
    if let Some(path) = machine_path {
        let (env, _) = parse_machine_spec(&path)?;
        println!("machine {}:", path.display());
        println!(
            "  X [{}, {}] Y [{}, {}] Z [{}, {}]",
            env.min_x_limit,
            env.max_x_limit,
            env.min_y_limit,
            env.max_y_limit,
            env.min_z_limit,
            env.max_z_limit
        );
        println!("  max feed {} traverse {}", env.max_feed_rate, env.traverse_feed_rate);
        println!("  spindle power {} W", env.max_spindle_power);
    }
    if let Some(path) = tools_path {
        let (table, count) = ToolTable::read_file(&path)?;
        println!("tool table {}: {count} tools", path.display());
        let _ = table;
    }
    Ok(())
}
