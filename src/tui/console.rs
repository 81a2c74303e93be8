//! Line-oriented terminal output: boxes, colored result lines, run printing

use crate::error::Error;
use crate::proxy::{
    LoadedList, ProbeCoordinator, Proxy, ProxyList, RunEvent, RunReport, Severity,
};
use crossterm::{
    cursor::MoveTo,
    execute,
    style::{Color, Stylize},
    terminal::{Clear, ClearType},
};
use std::io;
use std::path::Path;

/// Draw a titled box around `content`.
///
/// The title is centered, content lines are left-aligned, and the box is
/// two columns wider than the longest line.
pub fn create_box(title: &str, content: &[String]) -> String {
    let width = std::iter::once(title)
        .chain(content.iter().map(String::as_str))
        .map(|line| line.chars().count())
        .max()
        .unwrap_or(0)
        + 2;
    let rule = "─".repeat(width + 2);

    let mut out = format!("┌{}┐\n", rule);
    out.push_str(&format!("│ {} │\n", pad_center(title, width)));
    out.push_str(&format!("├{}┤\n", rule));
    for line in content {
        out.push_str(&format!("│ {} │\n", pad_right(line, width)));
    }
    out.push_str(&format!("└{}┘", rule));
    out
}

fn pad_center(s: &str, width: usize) -> String {
    let len = s.chars().count();
    if len >= width {
        return s.to_string();
    }
    let left = (width - len) / 2;
    let right = width - len - left;
    format!("{}{}{}", " ".repeat(left), s, " ".repeat(right))
}

fn pad_right(s: &str, width: usize) -> String {
    format!("{:<width$}", s, width = width)
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Success => Color::Green,
        Severity::Warning => Color::Yellow,
        Severity::Error => Color::Red,
    }
}

/// Result line with its category tag colored
pub fn styled_event(event: &RunEvent) -> String {
    match event {
        RunEvent::Trial(result) => {
            let tag = format!("{}: ", result.severity()).with(severity_color(result.severity()));
            format!("Test {}: {}{}", result.trial, tag, result.detail())
        }
        RunEvent::Verdict(verdict) if verdict.working => verdict.to_string().green().to_string(),
        RunEvent::Verdict(verdict) => verdict.to_string().red().to_string(),
    }
}

pub fn clear_screen() -> io::Result<()> {
    execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0))
}

/// Run the coordinator, printing every line as it arrives, then the summary
pub async fn run_and_print(
    coordinator: &ProbeCoordinator,
    proxies: Vec<Proxy>,
    target: &str,
) -> Result<RunReport, Error> {
    if proxies.is_empty() {
        return Err(Error::EmptyInput);
    }
    coordinator.config().validate()?;
    let trials = coordinator.config().trials;

    println!(
        "{}",
        format!("\nTesting {} proxies against {}", proxies.len(), target).magenta()
    );
    println!(
        "{}",
        format!("Each proxy will be tested {} times to ensure reliability.\n", trials).magenta()
    );

    let report = coordinator
        .run(proxies, target, |event| println!("{}", styled_event(event)))
        .await?;

    print_summary(&report, trials);
    Ok(report)
}

pub fn print_summary(report: &RunReport, trials: u32) {
    let summary = create_box("Summary", &report.summary.lines(trials));
    println!("\n{}", summary.cyan());
}

/// Find and load the proxy list, narrating each location tried
pub fn load_proxy_list(file: &Path) -> Result<LoadedList, Error> {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| file.display().to_string());

    let result = ProxyList::locate(file, |path| {
        println!(
            "{}",
            format!("Looking for {} at: {}", name, path.display()).yellow()
        );
    });

    let list = match result {
        Ok(list) => list,
        Err(Error::ProxyFileNotFound { checked }) => {
            println!("{}", format!("Error opening {}", name).red());
            println!("{}", "Checked the following locations:".yellow());
            for path in &checked {
                println!("{}", format!("- {}", path.display()).yellow());
            }
            return Err(Error::ProxyFileNotFound { checked });
        }
        Err(e) => return Err(e),
    };

    println!(
        "{}",
        format!("Successfully opened {} at: {}", name, list.path.display()).green()
    );

    if list.proxies.is_empty() {
        if list.line_count == 0 {
            println!("{}", format!("{} is empty", name).red());
        } else {
            println!(
                "{}",
                format!(
                    "File contains {} lines, but no valid proxies found",
                    list.line_count
                )
                .yellow()
            );
        }
    } else {
        println!(
            "{}",
            format!(
                "Loaded {} proxies from {} (File contains {} lines)",
                list.proxies.len(),
                name,
                list.line_count
            )
            .green()
        );
    }

    Ok(list)
}
