//! askr-telemetry — TUI diagnostics viewer for askr scene trees.
//!
//! Listens for the JSON snapshots an askr engine sends over UDP and shows
//! them as a live terminal dashboard using ratatui: tick rate and counts, a
//! tick-time sparkline, the node tree (collapsible), and the captured logs.
//!
//! Build the engine with the `diagnostics` feature (on by default), then run
//! `cargo run -p askr-telemetry [ADDRESS]`. The address defaults to
//! `127.0.0.1:9100`.

use std::collections::{HashSet, VecDeque};
use std::io;
use std::net::UdpSocket;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode};
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph, Sparkline};
use serde::Deserialize;

const DEFAULT_ADDRESS: &str = "127.0.0.1:9100";

// ── Wire types (must match askr's JSON format) ──────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DiagSnapshot {
    fps: f32,
    delta_ms: f32,
    frame_count: u64,
    node_count: usize,
    slot_count: usize,
    body_count: usize,
    physics_steps: u32,
    draw_commands: usize,
    drawables: usize,
    frame_budget: FrameBudgetInfo,
    nodes: Vec<NodeInfo>,
    logs: Vec<LogEntryInfo>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FrameBudgetInfo {
    update_us: f64,
    physics_us: f64,
    render_us: f64,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
struct NodeInfo {
    id: String,
    depth: usize,
    name: String,
    type_name: String,
    kind: String,
    enabled: bool,
    children: usize,
    translation: Option<[f32; 3]>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct LogEntryInfo {
    level: String,
    target: String,
    message: String,
    timestamp_secs: f32,
}

// ── Tabs ─────────────────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq)]
enum Tab {
    Tree,
    Logs,
}

impl Tab {
    const ALL: [Tab; 2] = [Tab::Tree, Tab::Logs];

    fn next(self) -> Self {
        match self {
            Tab::Tree => Tab::Logs,
            Tab::Logs => Tab::Tree,
        }
    }

    fn label(self) -> &'static str {
        match self {
            Tab::Tree => "Tree",
            Tab::Logs => "Logs",
        }
    }
}

// ── Input mode ──────────────────────────────────────────────────────────

#[derive(Clone, PartialEq, Eq)]
enum InputMode {
    Normal,
    Search,
}

// ── Log level filter ────────────────────────────────────────────────────

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum LogFilter {
    All,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogFilter {
    fn next(self) -> Self {
        match self {
            LogFilter::All => LogFilter::Debug,
            LogFilter::Debug => LogFilter::Info,
            LogFilter::Info => LogFilter::Warn,
            LogFilter::Warn => LogFilter::Error,
            LogFilter::Error => LogFilter::All,
        }
    }

    fn label(self) -> &'static str {
        match self {
            LogFilter::All => "ALL",
            LogFilter::Debug => "DEBUG+",
            LogFilter::Info => "INFO+",
            LogFilter::Warn => "WARN+",
            LogFilter::Error => "ERROR",
        }
    }

    fn passes(self, level: &str) -> bool {
        match self {
            LogFilter::All => true,
            LogFilter::Debug => level != "TRACE",
            LogFilter::Info => matches!(level, "INFO" | "WARN" | "ERROR"),
            LogFilter::Warn => matches!(level, "WARN" | "ERROR"),
            LogFilter::Error => level == "ERROR",
        }
    }
}

/// A log line kept across snapshots.
#[derive(Clone)]
struct LogEntry {
    level: String,
    target: String,
    message: String,
    timestamp_secs: f32,
}

// ── App state ────────────────────────────────────────────────────────────

const HISTORY_CAP: usize = 1200;
const LOG_CAP: usize = 2000;

struct App {
    latest: DiagSnapshot,
    /// Whole-tick time in microseconds, one entry per snapshot.
    tick_history: VecDeque<u64>,
    steps_history: VecDeque<u64>,
    active_tab: Tab,
    paused: bool,
    connected: bool,

    // Tree tab
    /// Ids of nodes whose children are hidden.
    collapsed: HashSet<String>,
    /// Index into the visible rows.
    cursor: usize,
    input_mode: InputMode,
    search_query: String,
    active_filter: Option<String>,

    // Logs tab
    log_entries: Vec<LogEntry>,
    log_filter: LogFilter,
    log_auto_scroll: bool,
    log_scroll_offset: usize,
}

impl App {
    fn new() -> Self {
        Self {
            latest: DiagSnapshot::default(),
            tick_history: VecDeque::with_capacity(HISTORY_CAP),
            steps_history: VecDeque::with_capacity(HISTORY_CAP),
            active_tab: Tab::Tree,
            paused: false,
            connected: false,
            collapsed: HashSet::new(),
            cursor: 0,
            input_mode: InputMode::Normal,
            search_query: String::new(),
            active_filter: None,
            log_entries: Vec::new(),
            log_filter: LogFilter::Info,
            log_auto_scroll: true,
            log_scroll_offset: 0,
        }
    }

    fn push_snapshot(&mut self, snap: DiagSnapshot) {
        if self.paused {
            return;
        }

        let budget = &snap.frame_budget;
        push_capped(
            &mut self.tick_history,
            (budget.update_us + budget.physics_us + budget.render_us).round().max(0.0) as u64,
        );
        push_capped(&mut self.steps_history, u64::from(snap.physics_steps));

        self.log_entries.extend(snap.logs.iter().map(|log| LogEntry {
            level: log.level.clone(),
            target: log.target.clone(),
            message: log.message.clone(),
            timestamp_secs: log.timestamp_secs,
        }));
        if self.log_entries.len() > LOG_CAP {
            let excess = self.log_entries.len() - LOG_CAP;
            self.log_entries.drain(..excess);
        }

        // Forget collapsed ids that no longer exist.
        self.collapsed.retain(|id| snap.nodes.iter().any(|n| &n.id == id));
        self.latest = snap;
        self.connected = true;
        self.clamp_cursor();
    }

    /// Indices into `latest.nodes` that are currently shown, in order.
    ///
    /// With a search filter every matching node is shown flat; otherwise
    /// the descendants of collapsed nodes are hidden.
    fn visible_rows(&self) -> Vec<usize> {
        let nodes = &self.latest.nodes;
        if let Some(filter) = &self.active_filter {
            let lower = filter.to_lowercase();
            return (0..nodes.len())
                .filter(|&i| {
                    nodes[i].name.to_lowercase().contains(&lower)
                        || nodes[i].type_name.to_lowercase().contains(&lower)
                })
                .collect();
        }

        let mut rows = Vec::new();
        let mut hidden_below: Option<usize> = None;
        for (i, node) in nodes.iter().enumerate() {
            if let Some(depth) = hidden_below {
                if node.depth > depth {
                    continue;
                }
                hidden_below = None;
            }
            rows.push(i);
            if self.collapsed.contains(&node.id) {
                hidden_below = Some(node.depth);
            }
        }
        rows
    }

    fn clamp_cursor(&mut self) {
        let len = self.visible_rows().len();
        self.cursor = self.cursor.min(len.saturating_sub(1));
    }

    fn cursor_node(&self) -> Option<usize> {
        self.visible_rows().get(self.cursor).copied()
    }

    fn log_counts(&self) -> [usize; 5] {
        let mut counts = [0; 5];
        for log in &self.log_entries {
            let slot = match log.level.as_str() {
                "TRACE" => 0,
                "DEBUG" => 1,
                "INFO" => 2,
                "WARN" => 3,
                "ERROR" => 4,
                _ => continue,
            };
            counts[slot] += 1;
        }
        counts
    }

    fn filtered_logs(&self) -> Vec<&LogEntry> {
        self.log_entries
            .iter()
            .filter(|e| self.log_filter.passes(&e.level))
            .collect()
    }
}

fn push_capped(history: &mut VecDeque<u64>, value: u64) {
    if history.len() >= HISTORY_CAP {
        history.pop_front();
    }
    history.push_back(value);
}

// ── Main ─────────────────────────────────────────────────────────────────

fn main() -> io::Result<()> {
    let address = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_ADDRESS.to_string());
    let recv_socket = UdpSocket::bind(&address).map_err(|err| {
        io::Error::new(
            err.kind(),
            format!("failed to bind {address} (is another askr-telemetry running?): {err}"),
        )
    })?;
    recv_socket.set_nonblocking(true)?;

    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let mut app = App::new();
    let mut buf = [0u8; 65536];

    loop {
        // Drain all pending datagrams.
        while let Ok(n) = recv_socket.recv(&mut buf) {
            if let Ok(snap) = serde_json::from_slice::<DiagSnapshot>(&buf[..n]) {
                app.push_snapshot(snap);
            }
        }

        terminal.draw(|f| ui(f, &app))?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if handle_key(&mut app, key) {
                    break;
                }
            }
        }
    }

    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

// ── Key handling ─────────────────────────────────────────────────────────

/// Returns `true` if the app should quit.
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    if app.input_mode == InputMode::Search {
        match key.code {
            KeyCode::Esc => {
                app.input_mode = InputMode::Normal;
                app.search_query.clear();
            }
            KeyCode::Enter => {
                app.input_mode = InputMode::Normal;
                app.active_filter = (!app.search_query.is_empty()).then(|| std::mem::take(&mut app.search_query));
                app.search_query.clear();
                app.clamp_cursor();
            }
            KeyCode::Backspace => {
                app.search_query.pop();
            }
            KeyCode::Char(c) => app.search_query.push(c),
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::Char('q') => return true,
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return true,
        KeyCode::Char('p') => app.paused = !app.paused,
        KeyCode::Char('1') => app.active_tab = Tab::Tree,
        KeyCode::Char('2') => app.active_tab = Tab::Logs,
        KeyCode::Tab => app.active_tab = app.active_tab.next(),

        // Tree tab keys.
        KeyCode::Char('/') if app.active_tab == Tab::Tree => {
            if app.active_filter.take().is_some() {
                app.clamp_cursor();
            } else {
                app.input_mode = InputMode::Search;
                app.search_query.clear();
            }
        }
        KeyCode::Up if app.active_tab == Tab::Tree => {
            app.cursor = app.cursor.saturating_sub(1);
        }
        KeyCode::Down if app.active_tab == Tab::Tree => {
            if app.cursor + 1 < app.visible_rows().len() {
                app.cursor += 1;
            }
        }
        KeyCode::Enter | KeyCode::Right if app.active_tab == Tab::Tree => toggle_collapse(app),
        KeyCode::Left if app.active_tab == Tab::Tree => collapse_or_parent(app),
        KeyCode::Esc if app.active_tab == Tab::Tree => {
            app.collapsed.clear();
            app.cursor = 0;
        }

        // Logs tab keys.
        KeyCode::Char('l') if app.active_tab == Tab::Logs => {
            app.log_filter = app.log_filter.next();
        }
        KeyCode::Char('g') if app.active_tab == Tab::Logs => {
            app.log_auto_scroll = !app.log_auto_scroll;
        }
        KeyCode::Up if app.active_tab == Tab::Logs => {
            app.log_auto_scroll = false;
            app.log_scroll_offset = app.log_scroll_offset.saturating_sub(1);
        }
        KeyCode::Down if app.active_tab == Tab::Logs => {
            app.log_auto_scroll = false;
            app.log_scroll_offset += 1;
        }

        _ => {}
    }
    false
}

fn toggle_collapse(app: &mut App) {
    let Some(index) = app.cursor_node() else {
        return;
    };
    let node = &app.latest.nodes[index];
    if node.children == 0 {
        return;
    }
    if !app.collapsed.remove(&node.id) {
        app.collapsed.insert(node.id.clone());
    }
}

fn collapse_or_parent(app: &mut App) {
    let Some(index) = app.cursor_node() else {
        return;
    };
    let node = &app.latest.nodes[index];
    if node.children > 0 && !app.collapsed.contains(&node.id) {
        app.collapsed.insert(node.id.clone());
        return;
    }

    // Jump to the parent: the closest earlier node one level up.
    let depth = node.depth;
    if depth == 0 {
        return;
    }
    let rows = app.visible_rows();
    if let Some(pos) = rows[..app.cursor]
        .iter()
        .rposition(|&i| app.latest.nodes[i].depth == depth - 1)
    {
        app.cursor = pos;
    }
}

// ── UI rendering ─────────────────────────────────────────────────────────

fn ui(f: &mut ratatui::Frame, app: &App) {
    let has_search_bar = app.input_mode == InputMode::Search;
    let mut constraints = vec![
        Constraint::Length(3), // header
        Constraint::Length(1), // tab bar
        Constraint::Min(6),    // tab content
        Constraint::Length(3), // frame budget
    ];
    if has_search_bar {
        constraints.push(Constraint::Length(1));
    }
    constraints.push(Constraint::Length(1)); // help bar

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(f.area());

    draw_header(f, app, chunks[0]);
    draw_tab_bar(f, app, chunks[1]);
    match app.active_tab {
        Tab::Tree => draw_tree_tab(f, app, chunks[2]),
        Tab::Logs => draw_logs_tab(f, app, chunks[2]),
    }
    draw_budget_panel(f, app, chunks[3]);

    if has_search_bar {
        draw_search_bar(f, app, chunks[4]);
        draw_help_bar(f, app, chunks[5]);
    } else {
        draw_help_bar(f, app, chunks[4]);
    }
}

fn label(text: &str) -> Span<'_> {
    Span::styled(text, Style::default().fg(Color::DarkGray))
}

fn value(text: String) -> Span<'static> {
    Span::styled(text, Style::default().fg(Color::White))
}

fn draw_header(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let s = &app.latest;
    let (status, status_color) = if app.paused {
        (" PAUSED ", Color::Yellow)
    } else if app.connected {
        (" LIVE ", Color::Green)
    } else {
        (" WAITING ", Color::DarkGray)
    };

    let text = Line::from(vec![
        Span::styled(format!(" {status} "), Style::default().bg(status_color).fg(Color::Black)),
        Span::raw("  "),
        label("Ticks/s: "),
        Span::styled(
            format!("{:.1}", s.fps),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        label("Tick: "),
        value(s.frame_count.to_string()),
        Span::raw("  |  "),
        label("\u{0394}: "),
        value(format!("{:.1}ms", s.delta_ms)),
        Span::raw("  |  "),
        label("Nodes: "),
        value(format!("{} ({} slots)", s.node_count, s.slot_count)),
        Span::raw("  |  "),
        label("Bodies: "),
        value(s.body_count.to_string()),
        Span::raw("  |  "),
        label("Draws: "),
        value(format!("{} / {} drawables", s.draw_commands, s.drawables)),
    ]);

    let block = Block::default()
        .title(" askr-telemetry ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_tab_bar(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let mut spans = vec![Span::raw(" ")];
    for (i, tab) in Tab::ALL.iter().enumerate() {
        let (num_style, label_style) = if *tab == app.active_tab {
            (
                Style::default().bg(Color::Cyan).fg(Color::Black).add_modifier(Modifier::BOLD),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            )
        } else {
            (Style::default().fg(Color::DarkGray), Style::default().fg(Color::DarkGray))
        };
        spans.push(Span::styled(format!(" {} ", i + 1), num_style));
        spans.push(Span::styled(format!("{} ", tab.label()), label_style));
        spans.push(Span::raw("  "));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ── Tree Tab ─────────────────────────────────────────────────────────────

fn draw_tree_tab(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(7), Constraint::Min(4)])
        .split(area);
    draw_sparklines(f, app, chunks[0]);
    draw_node_tree(f, app, chunks[1]);
}

fn draw_sparklines(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(area);

    let tick_data: Vec<u64> = app.tick_history.iter().copied().collect();
    let (min, avg, max) = stats(&tick_data);
    draw_sparkline(
        f,
        chunks[0],
        " Tick Time ",
        &tick_data,
        Color::Green,
        format!("min: {:.0}\u{b5}s  avg: {:.0}\u{b5}s  max: {:.0}\u{b5}s", min, avg, max),
    );

    let step_data: Vec<u64> = app.steps_history.iter().copied().collect();
    let (_, avg, max) = stats(&step_data);
    draw_sparkline(
        f,
        chunks[1],
        " Physics Steps ",
        &step_data,
        Color::Yellow,
        format!("avg: {avg:.1}  max: {max:.0}"),
    );
}

fn draw_sparkline(f: &mut ratatui::Frame, area: Rect, title: &str, data: &[u64], color: Color, summary: String) {
    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.height < 2 {
        return;
    }

    let spark_area = Rect {
        height: inner.height - 1,
        ..inner
    };
    let stats_area = Rect {
        y: inner.y + inner.height - 1,
        height: 1,
        ..inner
    };
    // Newest samples on the right.
    let shown = &data[data.len().saturating_sub(spark_area.width as usize)..];
    f.render_widget(Sparkline::default().data(shown).style(Style::default().fg(color)), spark_area);
    f.render_widget(Paragraph::new(label(&summary)), stats_area);
}

fn draw_node_tree(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let mut title = format!(" Scene  {} nodes", app.latest.nodes.len());
    if let Some(filter) = &app.active_filter {
        title.push_str(&format!("  filter: \"{filter}\""));
    }
    title.push(' ');

    let block = Block::default()
        .title(title)
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let rows = app.visible_rows();
    if rows.is_empty() {
        let msg = if app.active_filter.is_some() {
            "  No matching nodes"
        } else {
            "  No root"
        };
        f.render_widget(Paragraph::new(label(msg)), inner);
        return;
    }

    let visible_height = inner.height as usize;
    // Keep the cursor centered.
    let scroll_offset = app
        .cursor
        .saturating_sub(visible_height / 2)
        .min(rows.len().saturating_sub(visible_height));

    let lines: Vec<Line> = rows
        .iter()
        .enumerate()
        .skip(scroll_offset)
        .take(visible_height)
        .map(|(row, &index)| node_line(app, &app.latest.nodes[index], row == app.cursor))
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn node_line<'a>(app: &App, node: &'a NodeInfo, is_cursor: bool) -> Line<'a> {
    let arrow = match (node.children, app.collapsed.contains(&node.id)) {
        (0, _) => " ",
        (_, true) => "\u{25B6}",
        (_, false) => "\u{25BC}",
    };
    let indent = if app.active_filter.is_some() {
        String::new()
    } else {
        "  ".repeat(node.depth)
    };
    let kind_color = match node.kind.as_str() {
        "gui" => Color::Magenta,
        "canvas" => Color::Blue,
        "rigid_body" => Color::Yellow,
        _ => Color::Green,
    };
    let name_style = match (is_cursor, node.enabled) {
        (true, _) => Style::default().fg(Color::White).add_modifier(Modifier::BOLD),
        (false, true) => Style::default().fg(Color::White),
        (false, false) => Style::default().fg(Color::DarkGray),
    };

    let mut spans = vec![
        Span::styled(
            if is_cursor { "> " } else { "  " },
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ),
        Span::raw(indent),
        Span::styled(format!("{arrow} "), Style::default().fg(Color::Yellow)),
        Span::styled(node.name.as_str(), name_style),
        Span::raw("  "),
        Span::styled(node.type_name.as_str(), Style::default().fg(kind_color)),
        Span::raw("  "),
        label(&node.id),
    ];
    if let Some([x, y, z]) = node.translation {
        spans.push(Span::styled(
            format!("  ({x:.2}, {y:.2}, {z:.2})"),
            Style::default().fg(Color::Gray),
        ));
    }
    if !node.enabled {
        spans.push(Span::styled("  disabled", Style::default().fg(Color::Red)));
    }
    Line::from(spans)
}

// ── Logs Tab ─────────────────────────────────────────────────────────────

fn draw_logs_tab(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let [t, d, i, w, e] = app.log_counts();
    let scroll_label = if app.log_auto_scroll { "auto" } else { "manual" };

    let block = Block::default()
        .title(format!(
            " Logs [{}]  T:{t} D:{d} I:{i} W:{w} E:{e}  scroll:{scroll_label} ",
            app.log_filter.label(),
        ))
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let filtered = app.filtered_logs();
    if filtered.is_empty() {
        f.render_widget(Paragraph::new(label("  No log messages")), inner);
        return;
    }

    let visible = inner.height as usize;
    let total = filtered.len();
    let offset = if app.log_auto_scroll {
        total.saturating_sub(visible)
    } else {
        app.log_scroll_offset.min(total.saturating_sub(visible))
    };

    let lines: Vec<Line> = filtered
        .iter()
        .skip(offset)
        .take(visible)
        .map(|entry| {
            let level_color = match entry.level.as_str() {
                "TRACE" => Color::DarkGray,
                "DEBUG" => Color::Gray,
                "INFO" => Color::Cyan,
                "WARN" => Color::Yellow,
                "ERROR" => Color::Red,
                _ => Color::White,
            };
            Line::from(vec![
                label_owned(format!("  [{:>6.1}s] ", entry.timestamp_secs)),
                Span::styled(
                    format!("{:<5} ", entry.level),
                    Style::default().fg(level_color).add_modifier(Modifier::BOLD),
                ),
                label_owned(format!("{} ", entry.target)),
                Span::styled(entry.message.clone(), Style::default().fg(Color::White)),
            ])
        })
        .collect();
    f.render_widget(Paragraph::new(lines), inner);
}

fn label_owned(text: String) -> Span<'static> {
    Span::styled(text, Style::default().fg(Color::DarkGray))
}

// ── Frame budget + help bar ──────────────────────────────────────────────

fn draw_budget_panel(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let block = Block::default()
        .title(" Frame Budget ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::DarkGray));

    let budget = &app.latest.frame_budget;
    let text = Line::from(vec![
        label("  Update: "),
        value(format!("{:.0}\u{b5}s", budget.update_us)),
        Span::raw("  |  "),
        label("Physics: "),
        value(format!("{:.0}\u{b5}s ({} steps)", budget.physics_us, app.latest.physics_steps)),
        Span::raw("  |  "),
        label("Render: "),
        value(format!("{:.0}\u{b5}s", budget.render_us)),
    ]);
    f.render_widget(Paragraph::new(text).block(block), area);
}

fn draw_search_bar(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let line = Line::from(vec![
        Span::styled(" /", Style::default().fg(Color::Cyan)),
        value(format!("{}_", app.search_query)),
    ]);
    f.render_widget(Paragraph::new(line), area);
}

fn draw_help_bar(f: &mut ratatui::Frame, app: &App, area: Rect) {
    let key = |k: &'static str| Span::styled(k, Style::default().fg(Color::Cyan));
    let mut spans = vec![key(" [1-2]"), Span::raw(" tab  "), key("[Tab]"), Span::raw(" next  ")];

    match app.active_tab {
        Tab::Tree => {
            spans.extend([
                key("[\u{2191}\u{2193}]"),
                Span::raw(" navigate  "),
                key("[Enter/\u{2192}]"),
                Span::raw(" fold  "),
                key("[\u{2190}]"),
                Span::raw(" collapse/parent  "),
                key("[/]"),
                Span::raw(if app.active_filter.is_some() {
                    " clear filter  "
                } else {
                    " search  "
                }),
            ]);
        }
        Tab::Logs => {
            spans.extend([
                key("[l]"),
                Span::raw(" filter  "),
                key("[g]"),
                Span::raw(" auto-scroll  "),
                key("[\u{2191}\u{2193}]"),
                Span::raw(" scroll  "),
            ]);
        }
    }
    spans.extend([key("[p]"), Span::raw(" pause  "), key("[q]"), Span::raw(" quit")]);
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn stats(data: &[u64]) -> (f64, f64, f64) {
    let (Some(&min), Some(&max)) = (data.iter().min(), data.iter().max()) else {
        return (0.0, 0.0, 0.0);
    };
    let avg = data.iter().sum::<u64>() as f64 / data.len() as f64;
    (min as f64, avg, max as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, depth: usize, children: usize) -> NodeInfo {
        NodeInfo {
            id: id.to_string(),
            depth,
            name: format!("node-{id}"),
            type_name: "spatial_node".to_string(),
            kind: "spatial".to_string(),
            enabled: true,
            children,
            translation: None,
        }
    }

    fn app_with_tree() -> App {
        let mut app = App::new();
        app.push_snapshot(DiagSnapshot {
            nodes: vec![
                node("0v0", 0, 2),
                node("1v0", 1, 1),
                node("2v0", 2, 0),
                node("3v0", 1, 0),
            ],
            ..DiagSnapshot::default()
        });
        app
    }

    #[test]
    fn collapsing_hides_descendants_only() {
        let mut app = app_with_tree();
        assert_eq!(app.visible_rows(), [0, 1, 2, 3]);

        app.cursor = 1;
        toggle_collapse(&mut app);
        assert_eq!(app.visible_rows(), [0, 1, 3]);

        // Left on a collapsed node jumps to its parent.
        collapse_or_parent(&mut app);
        assert_eq!(app.cursor, 0);
        collapse_or_parent(&mut app);
        assert_eq!(app.visible_rows(), [0]);
    }

    #[test]
    fn search_shows_matches_flat() {
        let mut app = app_with_tree();
        app.collapsed.insert("0v0".into());
        app.active_filter = Some("NODE-2".into());
        assert_eq!(app.visible_rows(), [2]);
    }

    #[test]
    fn snapshots_parse_with_missing_fields() {
        let snap: DiagSnapshot = serde_json::from_str(
            r#"{"fps": 60.0, "node_count": 3, "nodes": [{"id": "0v0", "name": "world"}],
                "frame_budget": {"update_us": 12.5}, "logs": [{"level": "WARN", "message": "hi"}]}"#,
        )
        .unwrap();
        assert_eq!(snap.node_count, 3);
        assert_eq!(snap.nodes[0].name, "world");
        assert_eq!(snap.frame_budget.update_us, 12.5);

        let mut app = App::new();
        app.push_snapshot(snap);
        assert_eq!(app.log_counts(), [0, 0, 0, 1, 0]);
        assert_eq!(app.tick_history.back(), Some(&13));
    }

    #[test]
    fn log_filter_levels() {
        assert!(LogFilter::Info.passes("WARN"));
        assert!(!LogFilter::Info.passes("DEBUG"));
        assert!(LogFilter::All.passes("TRACE"));
        assert_eq!(LogFilter::Error.next(), LogFilter::All);
    }
}
