//! Dashboard controller: widget set, command table, event loop.
//!
//! Owns the maintenance connection and the focus state machine, dispatches
//! key events to the focused widget first and to the command table second,
//! and draws the screen chrome (header, command bar, status line) around
//! the grids.

use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode,
};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::buffer::Buffer;
use ratatui::layout::{Constraint, Layout, Rect};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Paragraph, Widget};
use tracing::warn;

use crate::client::{JobState, QueueSource, SourceError};

use super::control::Control;
use super::event::{Event, EventHandler};
use super::grid::{GridColumn, ScrollableGrid, TextAlign};
use super::poll::Poller;
use super::style::Styles;

const TITLE_LINE: &str = "tubetop - beanstalkd stats & control";

/// Connection and refresh settings for a dashboard instance.
#[derive(Debug, Clone)]
pub struct DashboardConfig {
    pub host: String,
    pub port: u16,
    pub poll_interval: Duration,
}

/// Errors raised while building or running the dashboard.
#[derive(Debug)]
pub enum DashboardError {
    /// Two command-table entries share a trigger key; under first-match
    /// dispatch the second entry would be dead.
    DuplicateTrigger(String),
    /// The data source failed during startup.
    Source(SourceError),
    /// Terminal or input-surface error.
    Io(io::Error),
}

impl std::fmt::Display for DashboardError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DashboardError::DuplicateTrigger(key) => {
                write!(f, "duplicate command trigger: {}", key)
            }
            DashboardError::Source(err) => write!(f, "data source error: {}", err),
            DashboardError::Io(err) => write!(f, "terminal error: {}", err),
        }
    }
}

impl std::error::Error for DashboardError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DashboardError::Source(err) => Some(err),
            DashboardError::Io(err) => Some(err),
            DashboardError::DuplicateTrigger(_) => None,
        }
    }
}

impl From<io::Error> for DashboardError {
    fn from(err: io::Error) -> Self {
        DashboardError::Io(err)
    }
}

impl From<SourceError> for DashboardError {
    fn from(err: SourceError) -> Self {
        DashboardError::Source(err)
    }
}

/// Key that fires a command-table entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct KeyTrigger {
    code: KeyCode,
    modifiers: KeyModifiers,
}

impl KeyTrigger {
    const fn plain(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: KeyModifiers::NONE,
        }
    }

    fn matches(&self, key: &KeyEvent) -> bool {
        key.code == self.code && key.modifiers == self.modifiers
    }
}

/// Maintenance and navigation actions reachable from the command table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CommandAction {
    Quit,
    NavigateFocus,
    BuryJobs,
    KickJobs,
    DeleteReady,
    DeleteBuried,
    DeleteDelayed,
}

/// One command-table entry. Entries without a trigger are display-only
/// hints in the command bar.
struct Command {
    trigger: Option<KeyTrigger>,
    shortcut: &'static str,
    label: &'static str,
    global: bool,
    action: Option<CommandAction>,
}

fn command_table() -> Vec<Command> {
    vec![
        Command {
            trigger: Some(KeyTrigger {
                code: KeyCode::Char('q'),
                modifiers: KeyModifiers::CONTROL,
            }),
            shortcut: " ^q",
            label: "Quit",
            global: true,
            action: Some(CommandAction::Quit),
        },
        Command {
            trigger: Some(KeyTrigger::plain(KeyCode::F(3))),
            shortcut: " F3",
            label: "Bury",
            global: false,
            action: Some(CommandAction::BuryJobs),
        },
        Command {
            trigger: Some(KeyTrigger::plain(KeyCode::F(4))),
            shortcut: " F4",
            label: "Kick",
            global: false,
            action: Some(CommandAction::KickJobs),
        },
        Command {
            trigger: Some(KeyTrigger::plain(KeyCode::Tab)),
            shortcut: "TAB",
            label: "Navigate",
            global: true,
            action: Some(CommandAction::NavigateFocus),
        },
        Command {
            trigger: None,
            shortcut: "↔ ↕",
            label: "Scroll",
            global: true,
            action: None,
        },
        Command {
            trigger: Some(KeyTrigger::plain(KeyCode::F(5))),
            shortcut: " F5",
            label: "Del-Ready",
            global: false,
            action: Some(CommandAction::DeleteReady),
        },
        Command {
            trigger: Some(KeyTrigger::plain(KeyCode::F(6))),
            shortcut: " F6",
            label: "Del-Buried",
            global: false,
            action: Some(CommandAction::DeleteBuried),
        },
        Command {
            trigger: Some(KeyTrigger::plain(KeyCode::F(7))),
            shortcut: " F7",
            label: "Del-Delayed",
            global: false,
            action: Some(CommandAction::DeleteDelayed),
        },
    ]
}

/// Rejects command tables where two entries share a trigger; dispatch is
/// first-match-wins, so the second entry could never fire.
fn validate_commands(commands: &[Command]) -> Result<(), DashboardError> {
    let mut seen: Vec<KeyTrigger> = Vec::new();
    for cmd in commands {
        let Some(trigger) = cmd.trigger else { continue };
        if seen.contains(&trigger) {
            return Err(DashboardError::DuplicateTrigger(format!(
                "{:?}",
                trigger.code
            )));
        }
        seen.push(trigger);
    }
    Ok(())
}

fn server_columns() -> Vec<GridColumn> {
    [
        ("hostname", TextAlign::Left, 20),
        ("current-jobs-urgent", TextAlign::Right, 20),
        ("current-jobs-ready", TextAlign::Right, 23),
        ("current-jobs-reserved", TextAlign::Right, 25),
        ("current-jobs-delayed", TextAlign::Right, 21),
        ("current-jobs-buried", TextAlign::Right, 21),
        ("cmd-put", TextAlign::Right, 9),
        ("cmd-peek", TextAlign::Right, 10),
        ("cmd-peek-ready", TextAlign::Right, 16),
        ("cmd-peek-delayed", TextAlign::Right, 18),
        ("cmd-peek-buried", TextAlign::Right, 17),
        ("cmd-reserve", TextAlign::Right, 13),
        ("cmd-use", TextAlign::Right, 9),
        ("cmd-watch", TextAlign::Right, 11),
        ("cmd-ignore", TextAlign::Right, 12),
        ("cmd-delete", TextAlign::Right, 12),
        ("cmd-release", TextAlign::Right, 13),
        ("cmd-bury", TextAlign::Right, 10),
        ("cmd-kick", TextAlign::Right, 10),
        ("cmd-stats-job", TextAlign::Right, 15),
        ("cmd-list-tube-used", TextAlign::Right, 20),
        ("cmd-list-tubes-watched", TextAlign::Right, 24),
        ("cmd-pause-tube", TextAlign::Right, 16),
        ("job-timeouts", TextAlign::Right, 14),
        ("total-jobs", TextAlign::Right, 11),
        ("max-job-size", TextAlign::Right, 13),
        ("current-tubes", TextAlign::Right, 14),
        ("current-connections", TextAlign::Right, 21),
        ("current-producers", TextAlign::Right, 19),
        ("current-workers", TextAlign::Right, 17),
        ("current-waiting", TextAlign::Right, 17),
        ("total-connections", TextAlign::Right, 19),
        ("pid", TextAlign::Right, 10),
        ("version", TextAlign::Right, 10),
        ("rusage-utime", TextAlign::Right, 14),
        ("rusage-stime", TextAlign::Right, 14),
        ("uptime", TextAlign::Right, 10),
        ("binlog-oldest-index", TextAlign::Right, 21),
        ("binlog-current-index", TextAlign::Right, 22),
        ("binlog-max-size", TextAlign::Right, 17),
        ("binlog-records-written", TextAlign::Right, 24),
        ("binlog-records-migrated", TextAlign::Right, 25),
        ("id", TextAlign::Right, 20),
    ]
    .into_iter()
    .map(|(name, align, width)| GridColumn::new(name, align, width))
    .collect()
}

fn tube_columns() -> Vec<GridColumn> {
    [
        ("name", TextAlign::Left, 20),
        ("current-jobs-urgent", TextAlign::Right, 21),
        ("current-jobs-ready", TextAlign::Right, 21),
        ("current-jobs-reserved", TextAlign::Right, 25),
        ("current-jobs-delayed", TextAlign::Right, 21),
        ("current-jobs-buried", TextAlign::Right, 21),
        ("total-jobs", TextAlign::Right, 12),
        ("current-using", TextAlign::Right, 15),
        ("current-waiting", TextAlign::Right, 17),
        ("current-watching", TextAlign::Right, 18),
        ("pause", TextAlign::Right, 7),
        ("cmd-delete", TextAlign::Right, 11),
        ("cmd-pause-tube", TextAlign::Right, 16),
        ("pause-time-left", TextAlign::Right, 17),
    ]
    .into_iter()
    .map(|(name, align, width)| GridColumn::new(name, align, width))
    .collect()
}

/// Single-screen dashboard over a queue server.
pub struct Dashboard {
    config: DashboardConfig,
    conn: Box<dyn QueueSource>,
    server_grid: Arc<ScrollableGrid>,
    tube_grid: Arc<ScrollableGrid>,
    controls: Vec<Arc<dyn Control>>,
    commands: Vec<Command>,
    focus: usize,
    status: String,
    server_version: String,
    done: Arc<AtomicBool>,
}

impl Dashboard {
    /// Builds the dashboard: grids, control list, command table. `conn` is
    /// the maintenance connection; the poller gets its own (see `run`).
    /// Fails when the server cannot be queried or the command table is
    /// invalid.
    pub fn new(
        config: DashboardConfig,
        mut conn: Box<dyn QueueSource>,
    ) -> Result<Self, DashboardError> {
        let commands = command_table();
        validate_commands(&commands)?;

        let server_version = conn
            .server_stats()?
            .get("version")
            .cloned()
            .unwrap_or_default();

        let server_grid = Arc::new(
            ScrollableGrid::new("[ Server Stats ]", server_columns(), false).with_style_fn(
                |_, col, _| {
                    if col == "hostname" {
                        Styles::accent()
                    } else {
                        Styles::default()
                    }
                },
            ),
        );
        let tube_grid = Arc::new(
            ScrollableGrid::new("[ Tubes Stats ]", tube_columns(), true).with_style_fn(
                |_, col, value| {
                    if col == "current-jobs-buried" && value.trim() != "0" && !value.trim().is_empty()
                    {
                        Styles::critical()
                    } else {
                        Styles::default()
                    }
                },
            ),
        );
        server_grid.set_visible(true);
        tube_grid.set_visible(true);

        let controls: Vec<Arc<dyn Control>> = vec![server_grid.clone(), tube_grid.clone()];
        controls[0].set_focus(true);

        Ok(Self {
            config,
            conn,
            server_grid,
            tube_grid,
            controls,
            commands,
            focus: 0,
            status: String::new(),
            server_version,
            done: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Runs the interactive loop until quit or a terminal error.
    /// `poll_source` is the background poller's own connection.
    pub fn run(&mut self, poll_source: Box<dyn QueueSource>) -> Result<(), DashboardError> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen)?;
        let backend = CrosstermBackend::new(stdout);
        let mut terminal = Terminal::new(backend)?;

        let events = EventHandler::new();
        let mut poller = Poller::new(poll_source, self.server_grid.clone(), self.tube_grid.clone());
        // first dataset before the first draw
        poller.collect();
        let _poller = poller.spawn(
            self.config.poll_interval,
            events.refresh_sender(),
            self.done.clone(),
        );

        let result = self.event_loop(&mut terminal, &events);

        self.done.store(true, Ordering::Relaxed);
        disable_raw_mode()?;
        execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
        terminal.show_cursor()?;

        result
    }

    fn event_loop(
        &mut self,
        terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
        events: &EventHandler,
    ) -> Result<(), DashboardError> {
        loop {
            terminal.draw(|frame| {
                let area = frame.area();
                self.render(area, frame.buffer_mut());
            })?;

            match events.next() {
                Ok(Event::Key(key)) => {
                    if !self.dispatch_to_focused(key) {
                        self.exec_command(key);
                    }
                }
                Ok(Event::Resize) | Ok(Event::Refresh) => {}
                Ok(Event::Error(err)) => return Err(DashboardError::Io(err)),
                Err(_) => {
                    return Err(DashboardError::Io(io::Error::other("event channel closed")));
                }
            }

            if self.done.load(Ordering::Relaxed) {
                return Ok(());
            }
        }
    }

    /// Draws the full screen: chrome plus every control at its slot in the
    /// vertical layout.
    fn render(&self, area: Rect, buf: &mut Buffer) {
        let chunks = Layout::vertical([
            Constraint::Length(1), // header line
            Constraint::Length(5), // server stats: one data row
            Constraint::Min(6),    // tube stats
            Constraint::Length(2), // command bar
            Constraint::Length(1), // status line
        ])
        .split(area);

        self.render_header(chunks[0], buf);
        let control_areas = [chunks[1], chunks[2]];
        for (control, &slot) in self.controls.iter().zip(control_areas.iter()) {
            control.resize(slot);
            control.render(buf);
        }
        self.render_command_bar(chunks[3], buf);
        self.render_status(chunks[4], buf);
    }

    fn render_header(&self, area: Rect, buf: &mut Buffer) {
        buf.set_stringn(
            area.x,
            area.y,
            TITLE_LINE,
            area.width as usize,
            Styles::default(),
        );
        let info = format!(
            "{}:{} (beanstalkd v{})",
            self.config.host, self.config.port, self.server_version
        );
        let info_w = info.chars().count() as u16;
        if area.width > info_w {
            buf.set_string(area.right() - info_w, area.y, &info, Styles::info());
        }
    }

    /// Two-row command bar: shortcut highlighted, description plain,
    /// aligned into columns sized by the widest entry.
    fn render_command_bar(&self, area: Rect, buf: &mut Buffer) {
        let longest = self
            .commands
            .iter()
            .map(|c| c.shortcut.chars().count() + c.label.chars().count() + 1)
            .max()
            .unwrap_or(0);

        let mut rows: Vec<Vec<Span>> = vec![Vec::new(), Vec::new()];
        for (i, cmd) in self.commands.iter().enumerate() {
            let spans = &mut rows[if i < 4 { 0 } else { 1 }];
            spans.push(Span::styled(cmd.shortcut, Styles::accent()));
            spans.push(Span::raw(" "));
            let pad = longest.saturating_sub(cmd.shortcut.chars().count());
            spans.push(Span::styled(
                format!("{:<pad$}", cmd.label),
                Styles::default(),
            ));
        }
        let lines: Vec<Line> = rows.into_iter().map(Line::from).collect();
        Paragraph::new(lines).render(area, buf);
    }

    fn render_status(&self, area: Rect, buf: &mut Buffer) {
        buf.set_stringn(
            area.x,
            area.y,
            &self.status,
            area.width as usize,
            Styles::status(),
        );
    }

    /// Routes a key to the focused control; returns whether it was consumed.
    fn dispatch_to_focused(&self, key: KeyEvent) -> bool {
        self.controls
            .iter()
            .any(|c| c.focused() && c.handle_event(key))
    }

    /// Scans the command table in order and fires the first matching entry;
    /// non-global commands require the tube grid to hold focus.
    fn exec_command(&mut self, key: KeyEvent) {
        let action = self.commands.iter().find_map(|cmd| {
            let trigger = cmd.trigger?;
            if !trigger.matches(&key) {
                return None;
            }
            if !cmd.global && !self.tube_grid.focused() {
                return None;
            }
            cmd.action
        });
        if let Some(action) = action {
            self.run_action(action);
        }
    }

    fn run_action(&mut self, action: CommandAction) {
        let result = match action {
            CommandAction::Quit => {
                self.done.store(true, Ordering::Relaxed);
                Ok(())
            }
            CommandAction::NavigateFocus => {
                self.navigate_focus();
                Ok(())
            }
            CommandAction::BuryJobs => self.bury_jobs(),
            CommandAction::KickJobs => self.kick_jobs(),
            CommandAction::DeleteReady => self.delete_jobs(JobState::Ready),
            CommandAction::DeleteBuried => self.delete_jobs(JobState::Buried),
            CommandAction::DeleteDelayed => self.delete_jobs(JobState::Delayed),
        };
        if let Err(err) = result {
            warn!("command failed: {err}");
        }
    }

    /// Moves focus to the next visible control in registration order,
    /// wrapping and skipping invisible controls. Afterwards exactly one
    /// visible control is focused, or none when nothing is visible.
    fn navigate_focus(&mut self) {
        let len = self.controls.len();
        if len == 0 {
            return;
        }
        for control in &self.controls {
            control.set_focus(false);
        }
        for step in 1..=len {
            let idx = (self.focus + step) % len;
            if self.controls[idx].visible() {
                self.focus = idx;
                self.controls[idx].set_focus(true);
                return;
            }
        }
    }

    /// Name of the tube selected in the tube grid, while it holds focus.
    fn current_tube(&self) -> Option<String> {
        if !self.tube_grid.focused() {
            return None;
        }
        self.tube_grid
            .current_row()
            .and_then(|row| row.first().cloned())
            .filter(|name| !name.is_empty())
    }

    /// Deletes every job in `state` on the selected tube, one peek/delete
    /// pair at a time. An error aborts the loop early; the status line
    /// reports the partial count either way.
    fn delete_jobs(&mut self, state: JobState) -> Result<(), SourceError> {
        let Some(tube) = self.current_tube() else {
            return Ok(());
        };
        let mut count = 0u64;
        let result = loop {
            match self.conn.peek_job(&tube, state) {
                Ok(Some(id)) => match self.conn.delete_job(id) {
                    Ok(()) => count += 1,
                    Err(err) => break Err(err),
                },
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        self.status = format!("{tube}: {count} {state} jobs deleted");
        result
    }

    /// Buries reserved jobs on the selected tube at their own priority
    /// until the reserve times out.
    fn bury_jobs(&mut self) -> Result<(), SourceError> {
        let Some(tube) = self.current_tube() else {
            return Ok(());
        };
        let mut count = 0u64;
        let result = loop {
            match self.conn.reserve_job(&tube) {
                Ok(Some(id)) => {
                    let priority = match self.conn.job_stats(id) {
                        Ok(stats) => stats
                            .get("pri")
                            .and_then(|p| p.parse::<u32>().ok())
                            .unwrap_or(0),
                        Err(err) => break Err(err),
                    };
                    if let Err(err) = self.conn.bury_job(id, priority) {
                        break Err(err);
                    }
                    count += 1;
                }
                Ok(None) => break Ok(()),
                Err(err) => break Err(err),
            }
        };
        self.status = format!("{tube}: {count} jobs buried");
        result
    }

    /// Kicks the tube's buried jobs back to ready; the buried count from
    /// the tube stats bounds the request, the server's reply is reported.
    fn kick_jobs(&mut self) -> Result<(), SourceError> {
        let Some(tube) = self.current_tube() else {
            return Ok(());
        };
        let buried = self
            .conn
            .queue_stats(&tube)?
            .get("current-jobs-buried")
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(0);
        let kicked = self.conn.kick_jobs(&tube, buried)?;
        self.status = format!("{tube}: {kicked} on hold jobs kicked");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StatsMap;
    use std::collections::BTreeMap;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockState {
        ready: VecDeque<u64>,
        reservable: VecDeque<u64>,
        priorities: BTreeMap<u64, u32>,
        buried_count: u64,
        deleted: Vec<u64>,
        buried: Vec<(u64, u32)>,
        kicked: Vec<(String, u64)>,
        fail_delete_at: Option<usize>,
    }

    #[derive(Clone, Default)]
    struct MockSource {
        state: Arc<Mutex<MockState>>,
    }

    impl MockSource {
        fn lock(&self) -> std::sync::MutexGuard<'_, MockState> {
            self.state.lock().unwrap()
        }
    }

    impl QueueSource for MockSource {
        fn server_stats(&mut self) -> Result<StatsMap, SourceError> {
            Ok(StatsMap::from([(
                "version".to_string(),
                "1.13".to_string(),
            )]))
        }

        fn list_queues(&mut self) -> Result<Vec<String>, SourceError> {
            Ok(vec!["q1".to_string()])
        }

        fn queue_stats(&mut self, name: &str) -> Result<StatsMap, SourceError> {
            let st = self.lock();
            Ok(StatsMap::from([
                ("name".to_string(), name.to_string()),
                (
                    "current-jobs-buried".to_string(),
                    st.buried_count.to_string(),
                ),
            ]))
        }

        fn peek_job(&mut self, _: &str, state: JobState) -> Result<Option<u64>, SourceError> {
            match state {
                JobState::Ready => Ok(self.lock().ready.front().copied()),
                _ => Ok(None),
            }
        }

        fn delete_job(&mut self, id: u64) -> Result<(), SourceError> {
            let mut st = self.lock();
            if st.fail_delete_at == Some(st.deleted.len()) {
                return Err(SourceError::Server("INTERNAL_ERROR".to_string()));
            }
            st.ready.retain(|&j| j != id);
            st.deleted.push(id);
            Ok(())
        }

        fn bury_job(&mut self, id: u64, priority: u32) -> Result<(), SourceError> {
            self.lock().buried.push((id, priority));
            Ok(())
        }

        fn kick_jobs(&mut self, queue: &str, bound: u64) -> Result<u64, SourceError> {
            self.lock().kicked.push((queue.to_string(), bound));
            Ok(bound)
        }

        fn reserve_job(&mut self, _: &str) -> Result<Option<u64>, SourceError> {
            Ok(self.lock().reservable.pop_front())
        }

        fn job_stats(&mut self, id: u64) -> Result<StatsMap, SourceError> {
            let pri = self.lock().priorities.get(&id).copied().unwrap_or(0);
            Ok(StatsMap::from([("pri".to_string(), pri.to_string())]))
        }
    }

    fn config() -> DashboardConfig {
        DashboardConfig {
            host: "127.0.0.1".to_string(),
            port: 11300,
            poll_interval: Duration::from_secs(1),
        }
    }

    fn dashboard_with(source: &MockSource) -> Dashboard {
        Dashboard::new(config(), Box::new(source.clone())).unwrap()
    }

    /// One well-formed tube-grid row for the named tube.
    fn tube_row(name: &str) -> Vec<String> {
        let mut row = vec![name.to_string()];
        row.resize(tube_columns().len(), "0".to_string());
        row
    }

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    fn focused_count(dash: &Dashboard) -> usize {
        dash.controls.iter().filter(|c| c.focused()).count()
    }

    #[test]
    fn command_table_has_no_duplicate_triggers() {
        assert!(validate_commands(&command_table()).is_ok());
    }

    #[test]
    fn duplicate_triggers_are_rejected() {
        let mut commands = command_table();
        commands.push(Command {
            trigger: Some(KeyTrigger::plain(KeyCode::F(5))),
            shortcut: " F5",
            label: "Shadowed",
            global: true,
            action: Some(CommandAction::Quit),
        });
        match validate_commands(&commands) {
            Err(DashboardError::DuplicateTrigger(_)) => {}
            other => panic!("expected duplicate trigger error, got {other:?}"),
        }
    }

    #[test]
    fn navigate_focus_keeps_exactly_one_visible_control_focused() {
        let source = MockSource::default();
        let mut dash = dashboard_with(&source);

        assert!(dash.server_grid.focused());
        assert_eq!(focused_count(&dash), 1);

        dash.navigate_focus();
        assert!(dash.tube_grid.focused());
        assert_eq!(focused_count(&dash), 1);

        dash.navigate_focus();
        assert!(dash.server_grid.focused());
        assert_eq!(focused_count(&dash), 1);
    }

    #[test]
    fn navigate_focus_skips_invisible_controls() {
        let source = MockSource::default();
        let mut dash = dashboard_with(&source);

        dash.server_grid.set_visible(false);
        dash.navigate_focus();
        assert!(dash.tube_grid.focused());
        dash.navigate_focus();
        // wraps back to the tube grid, skipping the hidden server grid
        assert!(dash.tube_grid.focused());
        assert_eq!(focused_count(&dash), 1);
    }

    #[test]
    fn navigate_focus_with_nothing_visible_focuses_nothing() {
        let source = MockSource::default();
        let mut dash = dashboard_with(&source);

        dash.server_grid.set_visible(false);
        dash.tube_grid.set_visible(false);
        dash.navigate_focus();
        assert_eq!(focused_count(&dash), 0);
    }

    #[test]
    fn delete_ready_deletes_all_jobs_and_reports_count() {
        let source = MockSource::default();
        source.lock().ready = VecDeque::from([1, 2, 3]);
        let mut dash = dashboard_with(&source);

        dash.tube_grid.update_data(vec![tube_row("q1")]);
        dash.navigate_focus(); // tube grid takes focus
        dash.exec_command(key(KeyCode::F(5)));

        assert_eq!(source.lock().deleted, vec![1, 2, 3]);
        assert_eq!(dash.status, "q1: 3 ready jobs deleted");
    }

    #[test]
    fn scoped_command_requires_tube_grid_focus() {
        let source = MockSource::default();
        source.lock().ready = VecDeque::from([1, 2, 3]);
        let mut dash = dashboard_with(&source);

        dash.tube_grid.update_data(vec![tube_row("q1")]);
        // server grid holds focus; F5 must not fire
        dash.exec_command(key(KeyCode::F(5)));

        assert!(source.lock().deleted.is_empty());
        assert_eq!(dash.status, "");
    }

    #[test]
    fn failed_delete_reports_partial_count() {
        let source = MockSource::default();
        {
            let mut st = source.lock();
            st.ready = VecDeque::from([1, 2, 3]);
            st.fail_delete_at = Some(2);
        }
        let mut dash = dashboard_with(&source);

        dash.tube_grid.update_data(vec![tube_row("q1")]);
        dash.navigate_focus();
        dash.exec_command(key(KeyCode::F(5)));

        assert_eq!(source.lock().deleted, vec![1, 2]);
        assert_eq!(dash.status, "q1: 2 ready jobs deleted");
    }

    #[test]
    fn bury_reserves_and_buries_at_job_priority() {
        let source = MockSource::default();
        {
            let mut st = source.lock();
            st.reservable = VecDeque::from([10, 11]);
            st.priorities = BTreeMap::from([(10, 100), (11, 5)]);
        }
        let mut dash = dashboard_with(&source);

        dash.tube_grid.update_data(vec![tube_row("q1")]);
        dash.navigate_focus();
        dash.exec_command(key(KeyCode::F(3)));

        assert_eq!(source.lock().buried, vec![(10, 100), (11, 5)]);
        assert_eq!(dash.status, "q1: 2 jobs buried");
    }

    #[test]
    fn kick_uses_buried_count_and_reports_server_reply() {
        let source = MockSource::default();
        source.lock().buried_count = 4;
        let mut dash = dashboard_with(&source);

        dash.tube_grid.update_data(vec![tube_row("q1")]);
        dash.navigate_focus();
        dash.exec_command(key(KeyCode::F(4)));

        assert_eq!(source.lock().kicked, vec![("q1".to_string(), 4)]);
        assert_eq!(dash.status, "q1: 4 on hold jobs kicked");
    }

    #[test]
    fn quit_command_is_global() {
        let source = MockSource::default();
        let mut dash = dashboard_with(&source);

        // server grid focused, quit must still fire
        dash.exec_command(KeyEvent::new(KeyCode::Char('q'), KeyModifiers::CONTROL));
        assert!(dash.done.load(Ordering::Relaxed));
    }

    #[test]
    fn actions_without_a_selected_tube_are_no_ops() {
        let source = MockSource::default();
        source.lock().ready = VecDeque::from([1]);
        let mut dash = dashboard_with(&source);

        dash.navigate_focus(); // tube grid focused but empty
        dash.exec_command(key(KeyCode::F(5)));

        assert!(source.lock().deleted.is_empty());
        assert_eq!(dash.status, "");
    }

    #[test]
    fn arrow_keys_are_consumed_by_the_focused_grid() {
        let source = MockSource::default();
        let mut dash = dashboard_with(&source);

        dash.tube_grid.update_data(vec![tube_row("q1"), tube_row("q2")]);
        dash.tube_grid.resize(Rect::new(0, 0, 60, 8));
        dash.navigate_focus();

        assert!(dash.dispatch_to_focused(key(KeyCode::Down)));
        assert_eq!(
            dash.tube_grid.current_row().map(|r| r[0].clone()),
            Some("q2".to_string())
        );
        // function keys are not grid input and fall through
        assert!(!dash.dispatch_to_focused(key(KeyCode::F(5))));
    }
}
