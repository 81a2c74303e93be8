use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use crossterm::style::Stylize;
use proxy_verify::{
    config::{Config, DEFAULT_CONFIG_FILE},
    proxy::{ProbeClassifier, ProbeCoordinator, ProxyList, DEFAULT_PROXY_FILE},
    tui::{
        console::{load_proxy_list, print_summary, run_and_print},
        MenuApp, RunDashboard,
    },
};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// A concurrent proxy verifier that keeps only reliable proxies
#[derive(Parser)]
#[command(name = "proxy-verify")]
#[command(about = "A concurrent proxy verifier that keeps only reliable proxies")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Settings file path
    #[arg(short, long, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Proxy list file (one proxy per line)
    #[arg(short, long, default_value = DEFAULT_PROXY_FILE)]
    proxies: PathBuf,

    /// Increase log output (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the interactive menu
    Menu,
    /// Test the proxy list once and keep the working proxies
    Check {
        /// URL to test proxies against (defaults to the configured URL)
        #[arg(short, long)]
        url: Option<String>,
        /// Timeout in seconds for each request
        #[arg(long)]
        timeout: Option<u64>,
        /// Number of proxies tested at the same time (0 = all at once)
        #[arg(short = 'n', long)]
        workers: Option<usize>,
        /// Show the live dashboard instead of plain lines
        #[arg(long)]
        tui: bool,
        /// Do not overwrite the proxy list with the working proxies
        #[arg(long)]
        dry_run: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(&cli.config).context("Failed to load configuration")?;

    let list = load_proxy_list(&cli.proxies).map_err(|e| {
        println!(
            "{}",
            "Failed to load proxies. Please check the proxy list file and try again.".red()
        );
        e
    })?;

    match cli.command {
        Some(Commands::Menu) | None => {
            let mut app = MenuApp::new(config, cli.config, list);
            app.run().await?;
        }
        Some(Commands::Check {
            url,
            timeout,
            workers,
            tui,
            dry_run,
        }) => {
            if let Some(timeout) = timeout {
                config.timeout = timeout;
            }
            if let Some(workers) = workers {
                config.max_workers = workers;
            }
            config.validate()?;

            let target = config.format_url(url.as_deref().unwrap_or(&config.default_url));
            let coordinator = ProbeCoordinator::new(
                ProbeClassifier::new(config.timeout_duration()),
                config.coordinator_config(),
            );

            let report = if tui {
                let run = coordinator.start(list.proxies.clone(), &target)?;
                let mut dashboard = RunDashboard::new(run.total());
                let report = dashboard.run(run).await?;
                print_summary(&report, coordinator.config().trials);
                report
            } else {
                run_and_print(&coordinator, list.proxies.clone(), &target).await?
            };

            if !dry_run {
                ProxyList::save(&report.working, &list.path)?;
                println!(
                    "{}",
                    format!("Working proxies saved to {}", list.path.display()).green()
                );
            }
        }
    }

    Ok(())
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}
