use anyhow::Context;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Default)]
struct CliArgs {
    init_config: bool,
    log_file: Option<PathBuf>,
}

fn main() -> anyhow::Result<()> {
    let args = parse_args(std::env::args().skip(1).collect())?;

    if args.init_config {
        let path = bellaster::config::save_settings(&bellaster::config::Settings::default())?;
        println!("wrote {}", path.display());
        return Ok(());
    }

    init_logging(args.log_file)?;
    bellaster::app::run()
}

/// Logs go to a file; the terminal belongs to the UI.
fn init_logging(log_file: Option<PathBuf>) -> anyhow::Result<()> {
    let path = match log_file {
        Some(path) => path,
        None => {
            bellaster::config::ensure_config_dir()?;
            bellaster::config::default_log_path()?
        }
    };
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .with_context(|| format!("failed to open log file {}", path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_writer(Mutex::new(file))
        .init();
    Ok(())
}

fn parse_args(args: Vec<String>) -> anyhow::Result<CliArgs> {
    let mut out = CliArgs::default();
    let mut index = 0;
    while index < args.len() {
        match args[index].as_str() {
            "--init-config" => out.init_config = true,
            "--log-file" => {
                index += 1;
                let Some(value) = args.get(index) else {
                    anyhow::bail!("--log-file requires a path");
                };
                if value.trim().is_empty() {
                    anyhow::bail!("--log-file cannot be empty");
                }
                out.log_file = Some(PathBuf::from(value.trim()));
            }
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            other => anyhow::bail!("unknown argument {other}"),
        }
        index += 1;
    }
    Ok(out)
}

fn print_help() {
    println!("Bellaster");
    println!("  --init-config     Write default settings.json and exit");
    println!("  --log-file path   Log to this file instead of the config directory");
}
