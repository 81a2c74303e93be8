//! Interactive numbered menu

use crate::config::{Config, Mode};
use crate::error::Error;
use crate::proxy::{LoadedList, ProbeClassifier, ProbeCoordinator, Proxy, ProxyList};
use crate::tui::console::{self, create_box, run_and_print};
use crate::Result;
use crossterm::style::Stylize;
use std::io::Write;
use std::path::PathBuf;
use tokio::io::{stdin, AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::warn;

/// Menu-driven front end over a loaded proxy list
pub struct MenuApp {
    config: Config,
    config_path: PathBuf,
    list: LoadedList,
    input: Lines<BufReader<Stdin>>,
}

impl MenuApp {
    pub fn new(config: Config, config_path: PathBuf, list: LoadedList) -> Self {
        Self {
            config,
            config_path,
            list,
            input: BufReader::new(stdin()).lines(),
        }
    }

    /// Show the menu until the user exits or stdin closes
    pub async fn run(&mut self) -> Result<()> {
        loop {
            if let Err(e) = console::clear_screen() {
                warn!(error = %e, "could not clear screen");
            }
            self.display_menu();

            let Some(choice) = self
                .prompt(&"\nEnter your choice (1-5): ".cyan().to_string())
                .await?
            else {
                return Ok(());
            };

            match choice.as_str() {
                "1" => self.test_proxies().await?,
                "2" => self.change_settings().await?,
                "3" => self.create_proxy_list().await?,
                "4" => self.reload_proxies(),
                "5" => {
                    println!("{}", "Thank you for using Proxy Verify. Goodbye!".green());
                    return Ok(());
                }
                _ => println!("{}", "Invalid choice. Please try again.".red()),
            }

            if self
                .prompt(&"\nPress Enter to continue...".yellow().to_string())
                .await?
                .is_none()
            {
                return Ok(());
            }
        }
    }

    fn display_menu(&self) {
        let menu = create_box(
            &format!("Proxy Verify - Version {}", env!("CARGO_PKG_VERSION")),
            &[
                format!("Proxies Loaded: {}", self.list.proxies.len()),
                format!("Current Mode: {}", self.config.mode),
                String::new(),
                "Options:".to_string(),
                "1) Test Proxies".to_string(),
                "2) Change settings".to_string(),
                "3) Create proxy list".to_string(),
                "4) Reload proxy list".to_string(),
                "5) Exit".to_string(),
            ],
        );
        print!("{}", menu.green());
    }

    /// Print `message` and read one trimmed line; `None` once stdin is closed
    async fn prompt(&mut self, message: &str) -> Result<Option<String>> {
        print!("{}", message);
        std::io::stdout().flush()?;
        let line = self.input.next_line().await?;
        Ok(line.map(|l| l.trim().to_string()))
    }

    async fn test_proxies(&mut self) -> Result<()> {
        if self.list.proxies.is_empty() {
            println!("{}", format!("Error: {}", Error::EmptyInput).red());
            return Ok(());
        }

        let input = self
            .prompt(
                &format!("Enter the URL to test (default: {}): ", self.config.default_url)
                    .cyan()
                    .to_string(),
            )
            .await?
            .unwrap_or_default();
        let url = if input.is_empty() {
            self.config.default_url.clone()
        } else {
            input
        };
        let target = self.config.format_url(&url);

        let coordinator = ProbeCoordinator::new(
            ProbeClassifier::new(self.config.timeout_duration()),
            self.config.coordinator_config(),
        );

        let report = match run_and_print(&coordinator, self.list.proxies.clone(), &target).await {
            Ok(report) => report,
            Err(e) => {
                println!("{}", format!("Error: {}", e).red());
                return Ok(());
            }
        };

        match ProxyList::save(&report.working, &self.list.path) {
            Ok(()) => println!(
                "{}",
                format!("Working proxies saved to {}", self.list.path.display()).green()
            ),
            Err(e) => println!("{}", format!("Error saving working proxies: {}", e).red()),
        }
        self.list.proxies = report.working;

        Ok(())
    }

    async fn change_settings(&mut self) -> Result<()> {
        println!("{}", "Current settings:".cyan());
        println!("max_workers: {}", self.config.max_workers);
        println!("timeout: {}", self.config.timeout);
        println!("default_url: {}", self.config.default_url);
        println!("mode: {}", self.config.mode);

        println!(
            "{}",
            "\nEnter new values (or press Enter to keep current value):".yellow()
        );

        let input = self
            .prompt(&format!("max_workers ({}): ", self.config.max_workers))
            .await?
            .unwrap_or_default();
        if !input.is_empty() {
            match input.parse() {
                Ok(value) => self.config.max_workers = value,
                Err(_) => println!("{}", "Invalid number, keeping current value.".red()),
            }
        }

        let input = self
            .prompt(&format!("timeout ({}): ", self.config.timeout))
            .await?
            .unwrap_or_default();
        if !input.is_empty() {
            match input.parse::<u64>() {
                Ok(value) if value > 0 => self.config.timeout = value,
                _ => println!("{}", "Invalid timeout, keeping current value.".red()),
            }
        }

        let input = self
            .prompt(&format!("default_url ({}): ", self.config.default_url))
            .await?
            .unwrap_or_default();
        if !input.is_empty() {
            self.config.default_url = input;
        }

        loop {
            let input = self
                .prompt(&format!(
                    "mode ({}) - Enter 'HTTP' or 'HTTPS': ",
                    self.config.mode
                ))
                .await?
                .unwrap_or_default();
            if input.is_empty() {
                break;
            }
            match input.parse::<Mode>() {
                Ok(mode) => {
                    self.config.mode = mode;
                    break;
                }
                Err(_) => println!("{}", "Invalid input. Please enter 'HTTP' or 'HTTPS'.".red()),
            }
        }

        match self.config.save(&self.config_path) {
            Ok(()) => println!("{}", "Settings updated successfully.".green()),
            Err(e) => println!("{}", format!("Error saving config: {}", e).red()),
        }

        Ok(())
    }

    async fn create_proxy_list(&mut self) -> Result<()> {
        println!(
            "{}",
            "Paste your proxies below. Press Enter twice when you're done:".cyan()
        );

        let mut proxies = Vec::new();
        while let Some(line) = self.prompt("").await? {
            if line.is_empty() {
                break;
            }
            proxies.push(Proxy::new(line));
        }

        if proxies.is_empty() {
            println!("{}", "No proxies entered.".red());
            return Ok(());
        }

        match ProxyList::save(&proxies, &self.list.path) {
            Ok(()) => println!(
                "{}",
                format!(
                    "Proxy list saved to {} with {} proxies.",
                    self.list.path.display(),
                    proxies.len()
                )
                .green()
            ),
            Err(e) => {
                println!("{}", format!("Error creating proxy list: {}", e).red());
                return Ok(());
            }
        }

        self.reload_proxies();
        Ok(())
    }

    fn reload_proxies(&mut self) {
        println!("{}", "Reloading proxies...".yellow());
        match console::load_proxy_list(&self.list.path) {
            Ok(list) => self.list = list,
            Err(e) => println!("{}", format!("Failed to reload proxies: {}", e).red()),
        }
    }
}
