//! Live monitor view for an active session.
//!
//! Full-screen TUI fed by the monitor reporter's event channel. When
//! stdout is not a terminal the view degrades to one plain log line per
//! sample so `--monitor` stays usable under a pipe.

use anyhow::Result;
use booster_common::metrics::Metrics;
use booster_common::monitor::MonitorEvent;
use booster_common::quality::{LatencyQuality, SignalQuality};
use booster_common::Session;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Gauge, Paragraph},
    Frame, Terminal,
};
use std::io::{self, IsTerminal};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// Monitor state and the latest data pushed by the reporter.
struct MonitorView {
    session_id: String,
    level: String,
    target_speed_mbps: Option<f64>,
    started: Instant,
    latest: Option<Metrics>,
    samples: u64,
    /// Set when the reporter gave up after consecutive probe failures.
    degraded: Option<u32>,
    should_quit: bool,
}

impl MonitorView {
    fn new(session: &Session) -> Self {
        MonitorView {
            session_id: session.id.to_string(),
            level: session.level.to_string(),
            target_speed_mbps: session.target_speed_mbps,
            started: Instant::now(),
            latest: None,
            samples: 0,
            degraded: None,
            should_quit: false,
        }
    }

    fn apply(&mut self, event: MonitorEvent) {
        match event {
            MonitorEvent::Sample(metrics) => {
                self.samples += 1;
                self.latest = Some(metrics);
            }
            MonitorEvent::Degraded {
                consecutive_failures,
            } => self.degraded = Some(consecutive_failures),
        }
    }

    fn handle_event(&mut self, event: Event) {
        if let Event::Key(key) = event {
            if key.kind == KeyEventKind::Press {
                match key.code {
                    KeyCode::Char('q') | KeyCode::Esc => self.should_quit = true,
                    KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => {
                        self.should_quit = true
                    }
                    _ => {}
                }
            }
        }
    }
}

fn quality_color((r, g, b): (u8, u8, u8)) -> Color {
    Color::Rgb(r, g, b)
}

fn draw(f: &mut Frame, view: &MonitorView) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // header
            Constraint::Length(3), // signal gauge
            Constraint::Min(7),    // throughput and latency
            Constraint::Length(3), // footer
        ])
        .split(f.size());

    draw_header(f, chunks[0], view);
    draw_signal(f, chunks[1], view);
    draw_metrics(f, chunks[2], view);
    draw_footer(f, chunks[3], view);
}

fn draw_header(f: &mut Frame, area: Rect, view: &MonitorView) {
    let elapsed = view.started.elapsed().as_secs();
    let header = Paragraph::new(Line::from(vec![
        Span::styled(
            "  signal-booster ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!("v{}", booster_common::VERSION),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("level {}", view.level),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("active {}m {:02}s", elapsed / 60, elapsed % 60),
            Style::default().fg(Color::Gray),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan)),
    )
    .alignment(Alignment::Left);

    f.render_widget(header, area);
}

fn draw_signal(f: &mut Frame, area: Rect, view: &MonitorView) {
    let Some(metrics) = &view.latest else {
        let waiting = Paragraph::new("Waiting for first sample...")
            .block(Block::default().borders(Borders::ALL).title(" Signal "));
        f.render_widget(waiting, area);
        return;
    };

    let pct = metrics.signal_strength_pct.clamp(0.0, 100.0);
    let quality = SignalQuality::from_pct(pct);
    let color = quality_color(quality.color());

    let gauge = Gauge::default()
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(color))
                .title(" Signal "),
        )
        .gauge_style(Style::default().fg(color))
        .label(format!("{:.0}% - {}", pct, quality.label()))
        .ratio(pct / 100.0);

    f.render_widget(gauge, area);
}

fn draw_metrics(f: &mut Frame, area: Rect, view: &MonitorView) {
    let mut lines = vec![
        Line::from(Span::styled(
            "Throughput & Latency",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
    ];

    match &view.latest {
        Some(metrics) => {
            let target = view
                .target_speed_mbps
                .map(|t| format!(" / target {:.0} Mbps", t))
                .unwrap_or_default();
            let download_color = match view.target_speed_mbps {
                Some(target) if metrics.download_mbps < target => Color::Yellow,
                _ => Color::Green,
            };
            lines.push(Line::from(vec![
                Span::raw("  Download: "),
                Span::styled(
                    format!("{:.1} Mbps", metrics.download_mbps),
                    Style::default().fg(download_color),
                ),
                Span::styled(target, Style::default().fg(Color::Gray)),
            ]));
            lines.push(Line::from(vec![
                Span::raw("  Upload:   "),
                Span::styled(
                    format!("{:.1} Mbps", metrics.upload_mbps),
                    Style::default().fg(Color::Green),
                ),
            ]));

            let latency = LatencyQuality::from_avg_ms(metrics.latency_ms);
            lines.push(Line::from(vec![
                Span::raw("  Latency:  "),
                Span::styled(
                    format!("{:.1} ms ({})", metrics.latency_ms, latency.label()),
                    Style::default().fg(quality_color(latency.color())),
                ),
            ]));
            lines.push(Line::from(""));
            lines.push(Line::from(vec![
                Span::raw("  Samples:  "),
                Span::styled(view.samples.to_string(), Style::default().fg(Color::Gray)),
            ]));
        }
        None => lines.push(Line::from("  No samples yet.")),
    }

    if let Some(failures) = view.degraded {
        lines.push(Line::from(""));
        lines.push(Line::from(Span::styled(
            format!(
                "  MONITORING DEGRADED: probe failed {} times in a row; sampling stopped. Optimizations remain active.",
                failures
            ),
            Style::default()
                .fg(Color::Red)
                .add_modifier(Modifier::BOLD),
        )));
    }

    let panel = Paragraph::new(lines).block(Block::default().borders(Borders::ALL));
    f.render_widget(panel, area);
}

fn draw_footer(f: &mut Frame, area: Rect, view: &MonitorView) {
    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" q ", Style::default().fg(Color::Black).bg(Color::Gray)),
        Span::raw(" Stop session & roll back  "),
        Span::styled(
            format!("  session {}", view.session_id),
            Style::default().fg(Color::DarkGray),
        ),
    ]))
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Gray)),
    )
    .alignment(Alignment::Left);

    f.render_widget(footer, area);
}

/// Run the monitor view until the user quits. Returning hands control
/// back to the `start` command, which performs the rollback.
pub async fn run(rx: mpsc::Receiver<MonitorEvent>, session: &Session) -> Result<()> {
    if !io::stdout().is_terminal() {
        return run_plain(rx, session).await;
    }

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_loop(&mut terminal, rx, session);

    // Restore the terminal even when the loop failed.
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    result
}

fn run_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    mut rx: mpsc::Receiver<MonitorEvent>,
    session: &Session,
) -> Result<()> {
    let mut view = MonitorView::new(session);
    let tick_rate = Duration::from_millis(100);

    loop {
        while let Ok(event) = rx.try_recv() {
            view.apply(event);
        }

        terminal.draw(|f| draw(f, &view))?;

        if event::poll(tick_rate)? {
            view.handle_event(event::read()?);
        }

        if view.should_quit {
            break;
        }
    }
    Ok(())
}

/// Piped fallback: one line per sample, stop on stdin EOF is not
/// practical here so we stop on Ctrl+C like the plain path.
async fn run_plain(mut rx: mpsc::Receiver<MonitorEvent>, session: &Session) -> Result<()> {
    println!(
        "monitoring session {} (not a terminal; plain output, Ctrl+C stops)",
        session.id
    );
    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(MonitorEvent::Sample(m)) => println!(
                    "signal {:.0}%  down {:.1} Mbps  up {:.1} Mbps  latency {:.1} ms",
                    m.signal_strength_pct, m.download_mbps, m.upload_mbps, m.latency_ms
                ),
                Some(MonitorEvent::Degraded { consecutive_failures }) => {
                    println!(
                        "monitoring degraded after {} consecutive probe failures; optimizations remain active",
                        consecutive_failures
                    );
                }
                None => break,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use booster_common::OptimizationLevel;
    use chrono::Utc;

    fn session() -> Session {
        Session {
            id: uuid::Uuid::new_v4(),
            level: OptimizationLevel::Standard,
            target_speed_mbps: Some(100.0),
            monitor_enabled: true,
            started_at: Utc::now(),
            baseline: None,
            stages: Vec::new(),
        }
    }

    fn metrics(download: f64) -> Metrics {
        Metrics {
            signal_strength_pct: 80.0,
            download_mbps: download,
            upload_mbps: 20.0,
            latency_ms: 12.0,
            sampled_at: Utc::now(),
        }
    }

    #[test]
    fn test_samples_update_state() {
        let mut view = MonitorView::new(&session());
        assert!(view.latest.is_none());

        view.apply(MonitorEvent::Sample(metrics(50.0)));
        view.apply(MonitorEvent::Sample(metrics(90.0)));
        assert_eq!(view.samples, 2);
        assert_eq!(view.latest.as_ref().unwrap().download_mbps, 90.0);
    }

    #[test]
    fn test_degraded_is_sticky() {
        let mut view = MonitorView::new(&session());
        view.apply(MonitorEvent::Degraded {
            consecutive_failures: 3,
        });
        view.apply(MonitorEvent::Sample(metrics(50.0)));
        assert_eq!(view.degraded, Some(3));
    }

    #[test]
    fn test_quit_keys() {
        use crossterm::event::{KeyEvent, KeyEventKind, KeyEventState};

        let mut view = MonitorView::new(&session());
        let key = |code, modifiers| {
            Event::Key(KeyEvent {
                code,
                modifiers,
                kind: KeyEventKind::Press,
                state: KeyEventState::NONE,
            })
        };

        view.handle_event(key(KeyCode::Char('x'), KeyModifiers::NONE));
        assert!(!view.should_quit);
        view.handle_event(key(KeyCode::Char('q'), KeyModifiers::NONE));
        assert!(view.should_quit);

        let mut view = MonitorView::new(&session());
        view.handle_event(key(KeyCode::Char('c'), KeyModifiers::CONTROL));
        assert!(view.should_quit);
    }
}
