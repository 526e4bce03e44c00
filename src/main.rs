// Only compile UI module when TUI feature is enabled
#[cfg(feature = "tui")]
mod ui;

use anyhow::{bail, Context, Result};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

// Use library instead of local modules
use vendor_reorder::{
    AggregationOrchestrator, Config, FormHandle, InMemoryListService, ListService,
    RestListService, VendorId,
};

const USAGE: &str = "\
Usage:
  reorder [--config PATH] [--fixtures PATH] [tui]
  reorder [--config PATH] [--fixtures PATH] catalog <VENDOR> [--json] [-v|-q]";

#[derive(Debug, Default)]
struct Args {
    config: Option<PathBuf>,
    fixtures: Option<PathBuf>,
    command: Command,
    json: bool,
    verbose: bool,
    quiet: bool,
}

#[derive(Debug, Default, PartialEq)]
enum Command {
    #[default]
    Tui,
    Catalog(String),
    Help,
}

fn parse_args(raw: &[String]) -> Result<Args> {
    let mut args = Args::default();
    let mut iter = raw.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter.next().context("--config needs a path")?;
                args.config = Some(PathBuf::from(path));
            }
            "--fixtures" => {
                let path = iter.next().context("--fixtures needs a path")?;
                args.fixtures = Some(PathBuf::from(path));
            }
            "--json" => args.json = true,
            "-v" | "--verbose" => args.verbose = true,
            "-q" | "--quiet" => args.quiet = true,
            "-h" | "--help" => args.command = Command::Help,
            "tui" => args.command = Command::Tui,
            "catalog" => {
                let vendor = iter.next().context("catalog needs a vendor id")?;
                args.command = Command::Catalog(vendor.clone());
            }
            other => bail!("unknown argument '{}'\n{}", other, USAGE),
        }
    }

    Ok(args)
}

fn init_logging(args: &Args) {
    // The TUI owns the terminal, so stay silent there unless RUST_LOG says otherwise
    let default_filter = match args.command {
        Command::Tui => "off",
        _ => "info",
    };
    let mut builder = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter));
    if args.quiet {
        builder.filter_level(log::LevelFilter::Warn);
    } else if args.verbose {
        builder.filter_level(log::LevelFilter::Debug);
    }
    builder.target(env_logger::Target::Stderr).init();
}

fn build_service(args: &Args, config: &Config) -> Result<Arc<dyn ListService>> {
    match &args.fixtures {
        Some(path) => {
            let service = InMemoryListService::from_json_file(path)
                .with_context(|| format!("Failed to load fixtures from {}", path.display()))?;
            Ok(Arc::new(service))
        }
        None => {
            let service = RestListService::new(&config.site)
                .context("No --fixtures given and the REST list service is not configured")?;
            Ok(Arc::new(service))
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let raw: Vec<String> = env::args().skip(1).collect();
    let args = parse_args(&raw)?;

    if args.command == Command::Help {
        println!("{}", USAGE);
        return Ok(());
    }

    init_logging(&args);

    let config = Config::load(args.config.as_deref()).context("Failed to load configuration")?;
    let service = build_service(&args, &config)?;

    match &args.command {
        Command::Catalog(vendor) => run_catalog(service, config, vendor, args.json).await,
        _ => run_ui_mode(service, config).await,
    }
}

async fn run_catalog(service: Arc<dyn ListService>, config: Config, vendor: &str, json: bool) -> Result<()> {
    let vendor = VendorId::parse(vendor).context("vendor id must not be blank")?;
    let orchestrator = AggregationOrchestrator::new(service, FormHandle::new(), config);

    orchestrator.load_catalog_for_vendor(Some(vendor.clone())).await;
    let state = orchestrator.form().snapshot();

    if let Some(error) = &state.last_error {
        bail!("{}", error);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&state.catalog)?);
        return Ok(());
    }

    println!("📦 Previously purchased from vendor {}", vendor);
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    if state.catalog.is_empty() {
        println!("No previous items for this vendor");
    }
    for (i, entry) in state.catalog.entries.iter().enumerate() {
        println!("{:>3}. {}", i + 1, entry.display_text);
    }
    println!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    println!("✓ {} distinct items", state.catalog.len());

    Ok(())
}

#[cfg(feature = "tui")]
async fn run_ui_mode(service: Arc<dyn ListService>, config: Config) -> Result<()> {
    let vendors = vendor_reorder::load_vendors(service.as_ref(), &config)
        .await
        .context("Failed to load vendors")?;

    let orchestrator = AggregationOrchestrator::new(service, FormHandle::new(), config);
    let mut app = ui::App::new(orchestrator, vendors);

    // The picker loop blocks on terminal input; runs continue on the worker threads
    tokio::task::block_in_place(|| ui::run_ui(&mut app))?;

    let lines = app.form.line_items.len();
    println!("\n✅ Picker closed with {} draft line items", lines);

    Ok(())
}

#[cfg(not(feature = "tui"))]
async fn run_ui_mode(_service: Arc<dyn ListService>, _config: Config) -> Result<()> {
    eprintln!("❌ TUI mode not available!");
    eprintln!("   Rebuild with: cargo build --features tui");
    eprintln!("   Or print a catalog: reorder catalog <VENDOR>");
    std::process::exit(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_command_is_tui() {
        let parsed = parse_args(&[]).unwrap();
        assert_eq!(parsed.command, Command::Tui);
    }

    #[test]
    fn test_catalog_command() {
        let parsed = parse_args(&args(&["--fixtures", "f.json", "catalog", "7", "--json"])).unwrap();
        assert_eq!(parsed.command, Command::Catalog("7".to_string()));
        assert_eq!(parsed.fixtures, Some(PathBuf::from("f.json")));
        assert!(parsed.json);
    }

    #[test]
    fn test_missing_values_rejected() {
        assert!(parse_args(&args(&["catalog"])).is_err());
        assert!(parse_args(&args(&["--config"])).is_err());
        assert!(parse_args(&args(&["--bogus"])).is_err());
    }
}
