use std::{
    io::{stdout, Stdout},
    sync::{Arc, Mutex, PoisonError},
    time::Duration,
};

use crate::control::ControlChannel;
use crate::dispatcher::Dispatcher;
use crate::gui::error::GuiError;
use crate::monitor::{AecHistory, AecSample, AutoRefresh, BEAMS};

use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind},
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
    ExecutableCommand,
};

use log::info;
use ratatui::{
    prelude::*,
    widgets::{block::Title, *},
    Terminal,
};

const MIN_INTERVAL: Duration = Duration::from_millis(100);
const MAX_INTERVAL: Duration = Duration::from_secs(60);

struct Dashboard {
    history: Arc<Mutex<AecHistory>>,
    refresh: AutoRefresh,
    interval: Duration,
}

impl Dashboard {
    fn on_key(&mut self, code: KeyCode) -> bool {
        match code {
            KeyCode::Char('q') | KeyCode::Esc => return false,
            KeyCode::Char('c') => self
                .history
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clear(),
            KeyCode::Char('+') => {
                self.interval = (self.interval / 2).max(MIN_INTERVAL);
                self.refresh.set_interval(self.interval);
            }
            KeyCode::Char('-') => {
                self.interval = self.interval.saturating_mul(2).min(MAX_INTERVAL);
                self.refresh.set_interval(self.interval);
            }
            _ => {}
        }
        true
    }

    fn ui(&self, frame: &mut Frame) {
        let history = self.history.lock().unwrap_or_else(PoisonError::into_inner);

        let chunks = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Min(8), Constraint::Length(5)])
            .split(frame.size());

        let header = Row::new(vec!["Beam", "Energy", "Azimuth (rad)", "Azimuth (deg)"])
            .style(Style::default().add_modifier(Modifier::BOLD));
        let rows = beam_rows(history.latest())
            .into_iter()
            .map(|cells| Row::new(cells.to_vec()));
        let table = Table::new(
            rows,
            [
                Constraint::Length(14),
                Constraint::Length(14),
                Constraint::Length(14),
                Constraint::Length(14),
            ],
        )
        .header(header)
        .block(
            Block::default()
                .title(
                    Title::from(" AEC Monitor ".magenta().bold()).alignment(Alignment::Center),
                )
                .borders(Borders::ALL),
        );
        frame.render_widget(table, chunks[0]);

        let status = Paragraph::new(vec![
            Line::from(status_line(&history, &self.refresh, self.interval)),
            Line::from(" q quit   c clear history   + faster   - slower ".dim()),
        ])
        .block(Block::default().title(" Status ").borders(Borders::ALL));
        frame.render_widget(status, chunks[1]);
    }
}

/// One row per beam: label, energy, azimuth in radians and in degrees.
fn beam_rows(sample: Option<&AecSample>) -> Vec<[String; 4]> {
    BEAMS
        .iter()
        .enumerate()
        .map(|(i, label)| match sample {
            Some(s) => [
                label.to_string(),
                format!("{:.1}", s.energy[i]),
                format!("{:.2}", s.azimuth[i]),
                format!("{:.1}", s.azimuth[i].to_degrees()),
            ],
            None => [label.to_string(), "-".into(), "-".into(), "-".into()],
        })
        .collect()
}

fn status_line(history: &AecHistory, refresh: &AutoRefresh, interval: Duration) -> String {
    let converged = match history.latest() {
        Some(s) if s.converged => "yes",
        Some(_) => "no",
        None => "-",
    };
    let ratio = history
        .converged_ratio()
        .map(|r| format!("{:.0}%", r * 100.0))
        .unwrap_or_else(|| "-".into());
    format!(
        " converged: {} ({} of {} samples)   every {} ms   ticks: {}   failures: {} ",
        converged,
        ratio,
        history.len(),
        interval.as_millis(),
        refresh.ticks(),
        refresh.failures()
    )
}

fn run<C>(
    terminal: &mut Terminal<CrosstermBackend<Stdout>>,
    dashboard: &mut Dashboard,
    dispatcher: Arc<Dispatcher<C>>,
) -> Result<(), GuiError>
where
    C: ControlChannel + Send + 'static,
{
    dashboard
        .refresh
        .start(dispatcher, dashboard.history.clone(), dashboard.interval);

    loop {
        terminal.draw(|frame| dashboard.ui(frame))?;
        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press && !dashboard.on_key(key.code) {
                    return Ok(());
                }
            }
        }
    }
}

/// Shows live AEC energy, azimuth and convergence until the user quits.
///
/// Readings are taken every `interval` by an [`AutoRefresh`] worker that
/// appends to `history`. The worker is stopped and the terminal restored
/// before returning, whether or not drawing failed.
pub fn aec_dashboard<C>(
    dispatcher: Arc<Dispatcher<C>>,
    history: Arc<Mutex<AecHistory>>,
    interval: Duration,
) -> Result<(), GuiError>
where
    C: ControlChannel + Send + 'static,
{
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;
    terminal.clear()?;

    let mut dashboard = Dashboard {
        history,
        refresh: AutoRefresh::new(),
        interval: interval.clamp(MIN_INTERVAL, MAX_INTERVAL),
    };
    let res = run(&mut terminal, &mut dashboard, dispatcher);

    dashboard.refresh.stop();
    info!(
        "dashboard closed after {} ticks, {} failed",
        dashboard.refresh.ticks(),
        dashboard.refresh.failures()
    );

    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rows_before_the_first_reading() {
        let rows = beam_rows(None);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[3], ["Auto select".to_string(), "-".into(), "-".into(), "-".into()]);
    }

    #[test]
    fn rows_show_degrees() {
        let sample = AecSample {
            elapsed: Duration::ZERO,
            energy: [1.0, 2.0, 3.0, 4.0],
            azimuth: [0.0, std::f32::consts::FRAC_PI_2, 0.0, 0.0],
            converged: true,
        };
        let rows = beam_rows(Some(&sample));
        assert_eq!(rows[1][1], "2.0");
        assert_eq!(rows[1][2], "1.57");
        assert_eq!(rows[1][3], "90.0");
    }

    #[test]
    fn status_summarises_history() {
        let mut history = AecHistory::new(10);
        let refresh = AutoRefresh::new();
        assert!(status_line(&history, &refresh, Duration::from_secs(1)).contains("converged: -"));

        for converged in [true, false] {
            history.push(AecSample {
                elapsed: Duration::ZERO,
                energy: [0.0; 4],
                azimuth: [0.0; 4],
                converged,
            });
        }
        let line = status_line(&history, &refresh, Duration::from_secs(1));
        assert!(line.contains("converged: no (50% of 2 samples)"));
        assert!(line.contains("every 1000 ms"));
    }

    #[test]
    fn keys() {
        let mut dashboard = Dashboard {
            history: Arc::new(Mutex::new(AecHistory::new(10))),
            refresh: AutoRefresh::new(),
            interval: Duration::from_millis(150),
        };
        assert!(dashboard.on_key(KeyCode::Char('+')));
        assert_eq!(dashboard.interval, MIN_INTERVAL);
        assert!(dashboard.on_key(KeyCode::Char('-')));
        assert_eq!(dashboard.interval, Duration::from_millis(200));
        assert!(!dashboard.on_key(KeyCode::Char('q')));
        assert!(!dashboard.on_key(KeyCode::Esc));
    }

    #[test]
    fn slowing_down_stops_at_the_cap() {
        let mut dashboard = Dashboard {
            history: Arc::new(Mutex::new(AecHistory::new(10))),
            refresh: AutoRefresh::new(),
            interval: Duration::from_secs(1),
        };
        for _ in 0..80 {
            assert!(dashboard.on_key(KeyCode::Char('-')));
        }
        assert_eq!(dashboard.interval, MAX_INTERVAL);
        assert!(dashboard.on_key(KeyCode::Char('+')));
        assert_eq!(dashboard.interval, MAX_INTERVAL / 2);
    }
}
