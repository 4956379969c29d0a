//! knitc entrypoint: compile traced programs to `.dat` rasters, or inspect
//! the carrier schedule of a skeleton.

mod program;
mod skeleton;

use anyhow::{Context as _, Result};
use clap::{Parser, Subcommand};
use core_bed::{CompileError, ErrorKind};
use core_cast::{CastOffKind, CastOnKind};
use core_config::NeedlePos;
use core_passes::CompileOptions;
use core_raster::NeedlePosition;
use core_schedule::CourseRef;
use core_shape::{infer_all_sizes, infer_sidedness};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};
use tracing_appender::non_blocking::WorkerGuard;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "knitc", version, about = "Knit shape-graph compiler back end")]
struct Args {
    /// Optional configuration file path (overrides discovery of `knitc.toml`).
    #[arg(long = "config")]
    config: Option<PathBuf>,
    /// Also write logs to this file.
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// Compile a traced program (JSON) into a machine raster.
    Compile {
        program: PathBuf,
        /// Output path; defaults to the input with a `.dat` extension.
        #[arg(short, long)]
        out: Option<PathBuf>,
    },
    /// Print the planned block order of a skeleton (JSON).
    Schedule { skeleton: PathBuf },
}

fn configure_logging(log_file: Option<&PathBuf>) -> Option<WorkerGuard> {
    let filter = tracing_subscriber::EnvFilter::from_default_env();
    match log_file {
        Some(path) => {
            let dir = path.parent().unwrap_or_else(|| std::path::Path::new("."));
            let name = path.file_name().map(|n| n.to_owned()).unwrap_or("knitc.log".into());
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .try_init();
            Some(guard)
        },
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .try_init();
            None
        },
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    let _log_guard = configure_logging(args.log_file.as_ref());
    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<CompileError>()
                .map(|ce| match ce.kind() {
                    ErrorKind::Topology => 2,
                    ErrorKind::Structural => 3,
                    ErrorKind::Capacity => 4,
                    ErrorKind::Inference => 5,
                    ErrorKind::Format => 6,
                })
                .unwrap_or(1);
            ExitCode::from(code)
        },
    }
}

fn run(args: &Args) -> Result<()> {
    match &args.cmd {
        Cmd::Compile { program, out } => compile(args, program, out.as_ref()),
        Cmd::Schedule { skeleton } => schedule(skeleton),
    }
}

fn cast_on_kind(config: &core_config::Config) -> CastOnKind {
    match config.file.cast.on.as_deref() {
        Some("kickback") => CastOnKind::Kickback,
        Some("tuck") => CastOnKind::Tuck,
        Some("precast") => CastOnKind::Precast,
        Some("none") => CastOnKind::None,
        _ => CastOnKind::Interlock,
    }
}

fn cast_off_kind(config: &core_config::Config) -> CastOffKind {
    match config.file.cast.off.as_deref() {
        Some("reverse") => CastOffKind::Reverse,
        Some("pickup") => CastOffKind::Pickup,
        Some("none") => CastOffKind::None,
        _ => CastOffKind::Direct,
    }
}

fn compile(args: &Args, program: &PathBuf, out: Option<&PathBuf>) -> Result<()> {
    let mut config = core_config::load_from(args.config.clone())?;
    let beds = program::load(program)
        .with_context(|| format!("loading program {}", program.display()))?;
    let width = beds.iter().map(|b| b.width).max().unwrap_or(0);
    config.apply_context(width as u16);

    let opts = CompileOptions {
        carrier: config.file.machine.carrier,
        cast_on: cast_on_kind(&config),
        cast_off: cast_off_kind(&config),
        use_dscs: config.file.machine.use_dscs,
        needle_pos: match config.needle_pos() {
            NeedlePos::Left => NeedlePosition::Left,
            NeedlePos::Right => NeedlePosition::Right,
            NeedlePos::At(n) => NeedlePosition::At(n),
        },
        max_needles: config.file.machine.max_needles,
    };

    let raster = core_passes::compile(&beds, &opts)?;
    let buffer = raster.to_buffer()?;

    let out_path = out.cloned().unwrap_or_else(|| program.with_extension("dat"));
    std::fs::write(&out_path, &buffer)
        .with_context(|| format!("writing {}", out_path.display()))?;
    info!(
        out = %out_path.display(),
        lines = raster.height(),
        bytes = buffer.len(),
        "raster written"
    );
    println!(
        "{} ({} lines, {} bytes)",
        out_path.display(),
        raster.height(),
        buffer.len()
    );
    Ok(())
}

fn schedule(path: &PathBuf) -> Result<()> {
    let (skel, start, start_path) = skeleton::load(path)
        .with_context(|| format!("loading skeleton {}", path.display()))?;
    let blocks = core_schedule::schedule(&skel, start, start_path)?;
    let sizes = infer_all_sizes(&skel, start);

    for block in &blocks {
        let node = skel.node(block.node);
        let courses: Vec<String> = block
            .courses
            .iter()
            .map(|c| match c {
                CourseRef::All { ascending: true } => "all:up".to_string(),
                CourseRef::All { ascending: false } => "all:down".to_string(),
                CourseRef::Continuity => "continuity".to_string(),
                CourseRef::Branch(b) => format!("branches/{b}"),
                CourseRef::Base => "base".to_string(),
            })
            .collect();
        let mut flags = Vec::new();
        if block.yarn.starting {
            flags.push("start");
        }
        if block.yarn.suspending {
            flags.push("suspend");
        }
        if block.yarn.ending {
            flags.push("end");
        }
        println!(
            "{:>3}  {:<16} [{}] {}",
            block.order,
            node.name,
            courses.join(", "),
            flags.join("+"),
        );
    }

    for node in skel.nodes() {
        for path in node.paths() {
            if let Some(size) = sizes.get(&skel, node.id, path) {
                let two_sided = infer_sidedness(&skel, node.id, path);
                println!(
                    "     {}/{}: width {}{}",
                    node.name,
                    path,
                    size,
                    if two_sided { " (two-sided)" } else { "" }
                );
            }
        }
    }
    Ok(())
}
