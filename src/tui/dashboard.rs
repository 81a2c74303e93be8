//! Live dashboard for a probe run

use crate::proxy::{ProbeRun, ProxyVerdict, RunEvent, RunReport, Severity};
use crate::Result;
use crossterm::{
    event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode, KeyEventKind},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use futures::{FutureExt, StreamExt};
use ratatui::{
    backend::{Backend, CrosstermBackend},
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    widgets::{Block, Borders, Gauge, List, ListItem, ListState, Paragraph, Wrap},
    Frame, Terminal,
};
use std::collections::VecDeque;
use std::io;
use tokio::time::Duration;

/// Trial lines kept for the log panel
const MAX_LOG_LINES: usize = 200;

/// Verdicts kept per list
const MAX_RECENT_VERDICTS: usize = 100;

/// Dashboard state for one run
pub struct RunDashboard {
    /// Proxies in the run
    total: usize,
    /// Proxies with a verdict
    finished: usize,
    working_count: usize,
    failed_count: usize,
    /// Most recent trial lines, oldest first
    trial_log: VecDeque<(Severity, String)>,
    recent_working: VecDeque<ProxyVerdict>,
    recent_failed: VecDeque<ProxyVerdict>,
    /// Selected list (0 = working, 1 = failed)
    selected_list: usize,
    list_state: ListState,
    status_message: String,
    is_complete: bool,
    should_quit: bool,
}

impl RunDashboard {
    pub fn new(total: usize) -> Self {
        let mut list_state = ListState::default();
        list_state.select(Some(0));

        Self {
            total,
            finished: 0,
            working_count: 0,
            failed_count: 0,
            trial_log: VecDeque::new(),
            recent_working: VecDeque::new(),
            recent_failed: VecDeque::new(),
            selected_list: 0,
            list_state,
            status_message: "Testing proxies... Press 'q' to hide the dashboard.".to_string(),
            is_complete: false,
            should_quit: false,
        }
    }

    /// Show the dashboard while `run` progresses, then wait for the run to end.
    ///
    /// Leaving early only closes the dashboard; every proxy is still tested
    /// before this returns.
    pub async fn run(&mut self, mut run: ProbeRun) -> Result<RunReport> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, EnableMouseCapture)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let result = self.run_app(&mut terminal, &mut run).await;

        disable_raw_mode()?;
        execute!(
            terminal.backend_mut(),
            LeaveAlternateScreen,
            DisableMouseCapture
        )?;
        terminal.show_cursor()?;

        result?;
        Ok(run.finish().await?)
    }

    async fn run_app<B: Backend>(
        &mut self,
        terminal: &mut Terminal<B>,
        run: &mut ProbeRun,
    ) -> Result<()> {
        loop {
            terminal.draw(|f| self.ui(f))?;

            if event::poll(Duration::from_millis(50))? {
                if let Event::Key(key) = event::read()? {
                    if key.kind == KeyEventKind::Press {
                        self.handle_input(key.code);
                        if self.should_quit {
                            break;
                        }
                    }
                }
            }

            // Take everything that is ready without waiting
            while !self.is_complete {
                match run.next().now_or_never() {
                    Some(Some(event)) => self.apply(event),
                    Some(None) => self.mark_complete(),
                    None => break,
                }
            }
        }

        Ok(())
    }

    /// Fold one stream line into the dashboard
    pub fn apply(&mut self, event: RunEvent) {
        match event {
            RunEvent::Trial(result) => {
                let line = format!(
                    "[{}] Test {}: {}",
                    result.checked_at.format("%H:%M:%S"),
                    result.trial,
                    result.message()
                );
                self.trial_log.push_back((result.severity(), line));
                if self.trial_log.len() > MAX_LOG_LINES {
                    self.trial_log.pop_front();
                }
            }
            RunEvent::Verdict(verdict) => {
                self.finished += 1;
                let list = if verdict.working {
                    self.working_count += 1;
                    &mut self.recent_working
                } else {
                    self.failed_count += 1;
                    &mut self.recent_failed
                };
                list.push_back(verdict);
                if list.len() > MAX_RECENT_VERDICTS {
                    list.pop_front();
                }

                self.status_message = format!(
                    "Testing... {}% ({}/{}) | Working: {} | Failed: {}",
                    self.progress_percent(),
                    self.finished,
                    self.total,
                    self.working_count,
                    self.failed_count
                );
            }
        }
    }

    /// The stream has ended; every proxy has a verdict
    pub fn mark_complete(&mut self) {
        self.is_complete = true;
        self.status_message = format!(
            "Complete! Tested: {} | Working: {} | Failed: {} | Press 'q' to quit",
            self.total, self.working_count, self.failed_count
        );
    }

    fn progress_percent(&self) -> u16 {
        if self.total > 0 {
            (self.finished as f64 / self.total as f64 * 100.0) as u16
        } else {
            0
        }
    }

    fn handle_input(&mut self, key: KeyCode) {
        let len = if self.selected_list == 0 {
            self.recent_working.len()
        } else {
            self.recent_failed.len()
        };

        match key {
            KeyCode::Char('q') | KeyCode::Esc => {
                self.should_quit = true;
            }
            KeyCode::Tab => {
                self.selected_list = (self.selected_list + 1) % 2;
                self.list_state.select(Some(0));
            }
            KeyCode::Down => {
                let i = match self.list_state.selected() {
                    Some(i) if i + 1 < len => i + 1,
                    _ => 0,
                };
                self.list_state.select(Some(i));
            }
            KeyCode::Up => {
                let i = match self.list_state.selected() {
                    Some(0) | None => len.saturating_sub(1),
                    Some(i) => i - 1,
                };
                self.list_state.select(Some(i));
            }
            _ => {}
        }
    }

    fn ui(&mut self, f: &mut Frame) {
        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .margin(1)
            .constraints([
                Constraint::Length(3),      // Title
                Constraint::Length(3),      // Progress bar
                Constraint::Percentage(45), // Trial log
                Constraint::Min(0),         // Verdict lists
                Constraint::Length(3),      // Status bar
            ])
            .split(f.size());

        let title = Paragraph::new("Proxy Verify")
            .style(Style::default().fg(Color::Cyan))
            .alignment(Alignment::Center)
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(title, chunks[0]);

        let progress = self.progress_percent();
        let gauge = Gauge::default()
            .block(Block::default().borders(Borders::ALL).title("Progress"))
            .gauge_style(Style::default().fg(Color::Green).bg(Color::Black))
            .percent(progress)
            .label(format!("{}/{} ({}%)", self.finished, self.total, progress));
        f.render_widget(gauge, chunks[1]);

        self.render_trial_log(f, chunks[2]);

        let verdict_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
            .split(chunks[3]);

        Self::render_verdict_list(
            f,
            verdict_chunks[0],
            "✓ Working",
            &self.recent_working,
            self.working_count,
            self.selected_list == 0,
            Color::Green,
            if self.selected_list == 0 { Some(&mut self.list_state) } else { None },
        );
        Self::render_verdict_list(
            f,
            verdict_chunks[1],
            "✗ Failed",
            &self.recent_failed,
            self.failed_count,
            self.selected_list == 1,
            Color::Red,
            if self.selected_list == 1 { Some(&mut self.list_state) } else { None },
        );

        let status = Paragraph::new(self.status_message.clone())
            .style(if self.is_complete {
                Style::default().fg(Color::Green)
            } else {
                Style::default().fg(Color::Yellow)
            })
            .wrap(Wrap { trim: true })
            .block(Block::default().borders(Borders::ALL).title("Status"));
        f.render_widget(status, chunks[4]);
    }

    fn render_trial_log(&self, f: &mut Frame, area: Rect) {
        // Newest lines that fit, shown oldest first
        let visible = area.height.saturating_sub(2) as usize;
        let skip = self.trial_log.len().saturating_sub(visible);
        let items: Vec<ListItem> = self
            .trial_log
            .iter()
            .skip(skip)
            .map(|(severity, line)| {
                let color = match severity {
                    Severity::Success => Color::Green,
                    Severity::Warning => Color::Yellow,
                    Severity::Error => Color::Red,
                };
                ListItem::new(line.clone()).style(Style::default().fg(color))
            })
            .collect();

        let log = List::new(items).block(Block::default().borders(Borders::ALL).title("Trials"));
        f.render_widget(log, area);
    }

    #[allow(clippy::too_many_arguments)]
    fn render_verdict_list(
        f: &mut Frame,
        area: Rect,
        title: &str,
        verdicts: &VecDeque<ProxyVerdict>,
        total_count: usize,
        is_selected: bool,
        color: Color,
        list_state: Option<&mut ListState>,
    ) {
        let items: Vec<ListItem> = verdicts
            .iter()
            .rev() // Show newest first
            .map(|verdict| {
                let content = format!(
                    "{} ({}/{})",
                    verdict.proxy, verdict.successes, verdict.trials
                );
                ListItem::new(content).style(Style::default().fg(color))
            })
            .collect();

        let border_style = if is_selected {
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };

        let list = List::new(items)
            .block(
                Block::default()
                    .borders(Borders::ALL)
                    .title(format!("{} ({})", title, total_count))
                    .border_style(border_style),
            )
            .highlight_style(Style::default().bg(Color::DarkGray))
            .highlight_symbol(">> ");

        if let Some(state) = list_state {
            f.render_stateful_widget(list, area, state);
        } else {
            f.render_widget(list, area);
        }
    }
}
