use std::{error::Error, path::PathBuf};

use ar_overlay::print::ChessboardChart;
use ar_overlay::replay::{run_replay, ReplayConfig};
use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;

/// Planar-marker AR overlay tools.
#[derive(Debug, Parser)]
#[command(name = "ar-overlay", author, version, about = "Planar-marker AR overlay tools")]
struct Cli {
    /// Log verbosity.
    #[arg(long, global = true, value_enum, default_value_t = LogLevel::Info)]
    log_level: LogLevel,

    /// Emit structured JSON logs through `tracing` instead of plain text.
    #[cfg(feature = "tracing")]
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Render a printable chessboard chart as PNG.
    Chart {
        /// Inner corners per row.
        #[arg(long, default_value_t = 9)]
        cols: u32,
        /// Inner corners per column.
        #[arg(long, default_value_t = 6)]
        rows: u32,
        /// Side of one square in pixels.
        #[arg(long, default_value_t = 100)]
        square_px: u32,
        #[arg(long, default_value = "printable_chessboard.png")]
        out: PathBuf,
    },
    /// Run recorded detections through the pose pipeline.
    Replay {
        /// Path to a JSON replay config.
        config: PathBuf,
        /// Where to write the JSON report; overrides `output_path` in the
        /// config. The report goes to stdout when neither is set.
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

fn main() {
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let cli = Cli::parse();
    init_logging(&cli);

    match cli.command {
        Command::Chart {
            cols,
            rows,
            square_px,
            out,
        } => {
            let chart = ChessboardChart {
                inner_cols: cols,
                inner_rows: rows,
                square_px,
            };
            let (width, height) = chart.write_png(&out)?;
            println!(
                "wrote {width}x{height} chessboard ({cols}x{rows} inner corners) to '{}'",
                out.display()
            );
        }
        Command::Replay { config, out } => {
            let cfg = ReplayConfig::load_json(&config)?;
            let report = run_replay(&cfg)?;
            match out.or(cfg.output_path) {
                Some(path) => {
                    report.write_json(&path)?;
                    println!(
                        "replayed {} frames ({} computed, {} reused, {} failed); report at '{}'",
                        report.frames,
                        report.stats.transform_computations,
                        report.stats.transform_reuses,
                        report.stats.solve_failures,
                        path.display()
                    );
                }
                None => println!("{}", serde_json::to_string_pretty(&report)?),
            }
        }
    }
    Ok(())
}

fn init_logging(cli: &Cli) {
    #[cfg(feature = "tracing")]
    ar_overlay::core::init_tracing(cli.json_logs, cli.log_level.into());
    #[cfg(not(feature = "tracing"))]
    {
        let _ = ar_overlay::core::init_with_level(cli.log_level.into());
    }
}
