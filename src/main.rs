//! cellflow - reactive cell grid on the command line

mod config;

use anyhow::{Context, bail};
use cellflow_core::Document;
use cellflow_core::storage::write_grd;
use cellflow_engine::{CellRef, Value, format_value};
use std::env;
use std::path::{Path, PathBuf};

fn print_usage() {
    eprintln!("Usage: cellflow [OPTIONS] [FILE]");
    eprintln!();
    eprintln!("Arguments:");
    eprintln!("  [FILE]                    Sheet to load (.grd)");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -c, --command <FORMULA>   Evaluate one formula and print the result");
    eprintln!("  -o, --output <FILE>       Export FILE's values to CSV (or .grd)");
    eprintln!("  --rows <N>                Grid rows (default from config, else 100)");
    eprintln!("  --cols <N>                Grid columns (default from config, else 26)");
    eprintln!("  --config <PATH>           Read settings from PATH");
    eprintln!("  --no-config               Ignore the user config file");
    eprintln!("  -h, --help                Print help");
}

struct Args {
    file_path: Option<PathBuf>,
    command: Option<String>,
    output_file: Option<PathBuf>,
    rows: Option<usize>,
    columns: Option<usize>,
    config_file: Option<PathBuf>,
    no_config: bool,
}

fn parse_args(args: &[String]) -> anyhow::Result<Option<Args>> {
    let mut parsed = Args {
        file_path: None,
        command: None,
        output_file: None,
        rows: None,
        columns: None,
        config_file: None,
        no_config: false,
    };

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => return Ok(None),
            "-c" | "--command" => {
                parsed.command = Some(option_value(args, &mut i, "--command")?.to_string());
            }
            "-o" | "--output" => {
                parsed.output_file = Some(PathBuf::from(option_value(args, &mut i, "--output")?));
            }
            "--rows" => {
                let raw = option_value(args, &mut i, "--rows")?;
                let rows = raw
                    .parse::<usize>()
                    .with_context(|| format!("Invalid row count: {}", raw))?;
                parsed.rows = Some(rows);
            }
            "--cols" => {
                let raw = option_value(args, &mut i, "--cols")?;
                let columns = raw
                    .parse::<usize>()
                    .with_context(|| format!("Invalid column count: {}", raw))?;
                parsed.columns = Some(columns);
            }
            "--config" => {
                parsed.config_file = Some(PathBuf::from(option_value(args, &mut i, "--config")?));
            }
            "--no-config" => parsed.no_config = true,
            arg if arg.starts_with('-') => bail!("Unknown option: {}", arg),
            arg => {
                if parsed.file_path.is_some() {
                    bail!("Unexpected argument: {}", arg);
                }
                parsed.file_path = Some(PathBuf::from(arg));
            }
        }
        i += 1;
    }
    Ok(Some(parsed))
}

fn option_value<'a>(args: &'a [String], i: &mut usize, name: &str) -> anyhow::Result<&'a str> {
    *i += 1;
    match args.get(*i) {
        Some(value) => Ok(value.as_str()),
        None => bail!("{} requires a value", name),
    }
}

fn main() {
    let args: Vec<String> = env::args().collect();
    let code = match run(&args) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            print_usage();
            1
        }
    };
    std::process::exit(code);
}

fn run(args: &[String]) -> anyhow::Result<i32> {
    let Some(args) = parse_args(args)? else {
        print_usage();
        return Ok(0);
    };

    let (mut config, warnings) = if args.no_config {
        (config::AppConfig::default(), Vec::new())
    } else {
        config::load_config(args.config_file.as_deref())
    };
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }
    if let Some(rows) = args.rows {
        config.rows = rows;
    }
    if let Some(columns) = args.columns {
        config.columns = columns;
    }

    if let Some(formula) = args.command {
        return run_command(&formula, &config);
    }

    let Some(path) = args.file_path else {
        bail!("Nothing to do: pass a FILE or --command");
    };
    let doc = Document::open(&path, config.rows, config.columns, config.engine)
        .with_context(|| format!("Failed to load {}", path.display()))?;

    match args.output_file {
        Some(output) => {
            export(&doc, &output).with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Exported to {}", output.display());
        }
        None => {
            for cell in doc.grid().cells().filter(|c| c.value().is_some()) {
                println!("{}: {}", cell.position(), format_value(cell.value()));
            }
        }
    }
    Ok(0)
}

/// Evaluate `formula` in the last cell of a blank grid and print the result.
/// Returns exit code 1 when the result is an error.
fn run_command(formula: &str, config: &config::AppConfig) -> anyhow::Result<i32> {
    let formula = if formula.starts_with('=') {
        formula.to_string()
    } else {
        format!("={}", formula)
    };

    let mut doc = Document::with_config(config.rows, config.columns, config.engine.clone())?;
    let scratch = CellRef::new(config.rows - 1, config.columns - 1);
    doc.set_cell_from_input(scratch, &formula)?;

    let value = doc.grid().cell_at(scratch).and_then(|cell| cell.value());
    println!("{}", format_value(value));
    let failed = match value {
        Some(Value::Error(_)) => true,
        Some(Value::Number(n)) => !n.is_finite(),
        _ => false,
    };
    Ok(if failed { 1 } else { 0 })
}

fn export(doc: &Document, output: &Path) -> anyhow::Result<()> {
    let is_grd = output
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("grd"));
    if is_grd {
        write_grd(output, doc.grid())?;
    } else {
        doc.export_csv(output)?;
    }
    Ok(())
}
