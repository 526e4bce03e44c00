use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyEventKind, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState},
    Frame, Terminal,
};
use std::io;
use std::time::Duration;
use tokio::sync::watch;
use vendor_reorder::{format_currency, AggregationOrchestrator, FormState, VendorOption};

const SPINNER: [char; 10] = ['⠋', '⠙', '⠹', '⠸', '⠼', '⠴', '⠦', '⠧', '⠇', '⠏'];
const POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pane {
    Vendors,
    Catalog,
    Draft,
}

impl Pane {
    pub fn next(&self) -> Self {
        match self {
            Pane::Vendors => Pane::Catalog,
            Pane::Catalog => Pane::Draft,
            Pane::Draft => Pane::Vendors,
        }
    }

    pub fn previous(&self) -> Self {
        match self {
            Pane::Vendors => Pane::Draft,
            Pane::Catalog => Pane::Vendors,
            Pane::Draft => Pane::Catalog,
        }
    }

    pub fn title(&self) -> &str {
        match self {
            Pane::Vendors => " Vendors ",
            Pane::Catalog => " Previously purchased ",
            Pane::Draft => " Line items ",
        }
    }
}

pub struct App {
    orchestrator: AggregationOrchestrator,
    revision: watch::Receiver<u64>,
    pub vendors: Vec<VendorOption>,
    pub form: FormState,
    pub focus: Pane,
    pub vendor_state: TableState,
    pub catalog_state: TableState,
    pub draft_state: TableState,
    pub tick: usize,
}

impl App {
    pub fn new(orchestrator: AggregationOrchestrator, vendors: Vec<VendorOption>) -> Self {
        let mut vendor_state = TableState::default();
        if !vendors.is_empty() {
            vendor_state.select(Some(0));
        }

        let revision = orchestrator.form().subscribe();
        let form = orchestrator.form().snapshot();

        Self {
            orchestrator,
            revision,
            vendors,
            form,
            focus: Pane::Vendors,
            vendor_state,
            catalog_state: TableState::default(),
            draft_state: TableState::default(),
            tick: 0,
        }
    }

    /// Pick up changes made by background runs
    pub fn sync(&mut self) {
        if self.revision.has_changed().unwrap_or(false) {
            self.revision.borrow_and_update();
            self.form = self.orchestrator.form().snapshot();
            clamp(&mut self.catalog_state, self.form.catalog.len());
            clamp(&mut self.draft_state, self.form.line_items.len());
        }
        self.tick = self.tick.wrapping_add(1);
    }

    fn focused_len(&self) -> usize {
        match self.focus {
            Pane::Vendors => self.vendors.len(),
            Pane::Catalog => self.form.catalog.len(),
            Pane::Draft => self.form.line_items.len(),
        }
    }

    fn focused_state(&mut self) -> &mut TableState {
        match self.focus {
            Pane::Vendors => &mut self.vendor_state,
            Pane::Catalog => &mut self.catalog_state,
            Pane::Draft => &mut self.draft_state,
        }
    }

    pub fn next(&mut self) {
        let len = self.focused_len();
        if len == 0 {
            return;
        }
        let state = self.focused_state();
        let i = match state.selected() {
            Some(i) => {
                if i >= len - 1 {
                    0
                } else {
                    i + 1
                }
            }
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let len = self.focused_len();
        if len == 0 {
            return;
        }
        let state = self.focused_state();
        let i = match state.selected() {
            Some(i) => {
                if i == 0 {
                    len - 1
                } else {
                    i - 1
                }
            }
            None => 0,
        };
        state.select(Some(i));
    }

    pub fn next_pane(&mut self) {
        self.focus = self.focus.next();
        self.ensure_cursor();
    }

    pub fn previous_pane(&mut self) {
        self.focus = self.focus.previous();
        self.ensure_cursor();
    }

    fn ensure_cursor(&mut self) {
        let len = self.focused_len();
        let state = self.focused_state();
        if state.selected().is_none() && len > 0 {
            state.select(Some(0));
        }
    }

    /// Enter on a vendor starts loading its previous items
    pub fn activate(&mut self) {
        match self.focus {
            Pane::Vendors => {
                let vendor = self
                    .vendor_state
                    .selected()
                    .and_then(|i| self.vendors.get(i))
                    .map(|v| v.id.clone());
                if vendor.is_some() && vendor == self.form.vendor {
                    return;
                }
                let _ = self.orchestrator.select_vendor(vendor);
                self.catalog_state.select(None);
            }
            Pane::Catalog => self.toggle_selected(),
            Pane::Draft => {}
        }
    }

    pub fn toggle_selected(&mut self) {
        if self.focus != Pane::Catalog {
            return;
        }
        let key = self
            .catalog_state
            .selected()
            .and_then(|i| self.form.catalog.entries.get(i))
            .map(|e| e.key.clone());
        if let Some(key) = key {
            self.orchestrator.form().toggle_selection(&key);
        }
    }

    pub fn merge_selected(&mut self) {
        if self.orchestrator.form().merge_selected() > 0 {
            self.focus = Pane::Draft;
        }
    }

    pub fn add_blank_line(&mut self) {
        self.orchestrator.form().add_blank_line();
    }

    pub fn dismiss_error(&mut self) {
        self.orchestrator.form().dismiss_error();
    }

    fn vendor_label(&self) -> String {
        match &self.form.vendor {
            Some(id) => self
                .vendors
                .iter()
                .find(|v| &v.id == id)
                .map(|v| v.title.clone())
                .unwrap_or_else(|| id.to_string()),
            None => "none".to_string(),
        }
    }
}

fn clamp(state: &mut TableState, len: usize) {
    match state.selected() {
        Some(_) if len == 0 => state.select(None),
        Some(i) if i >= len => state.select(Some(len - 1)),
        None if len > 0 => state.select(Some(0)),
        _ => {}
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    // Run the app
    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    if let Err(err) = res {
        println!("Error: {:?}", err);
    }

    Ok(())
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        app.sync();
        terminal.draw(|f| ui(f, app))?;

        // Poll so background runs show up without a keypress
        if !event::poll(POLL_INTERVAL)? {
            continue;
        }

        if let Event::Key(key) = event::read()? {
            if key.kind != KeyEventKind::Press {
                continue;
            }
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Tab => app.next_pane(),
                KeyCode::BackTab => app.previous_pane(),
                KeyCode::Enter => app.activate(),
                KeyCode::Char(' ') => app.toggle_selected(),
                KeyCode::Char('a') => app.merge_selected(),
                KeyCode::Char('n') => app.add_blank_line(),
                KeyCode::Char('x') => app.dismiss_error(),
                KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => return Ok(()),
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::Home => {
                    if app.focused_len() > 0 {
                        app.focused_state().select(Some(0));
                    }
                }
                KeyCode::End => {
                    let len = app.focused_len();
                    if len > 0 {
                        app.focused_state().select(Some(len - 1));
                    }
                }
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Panes
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(30), Constraint::Percentage(70)])
        .split(chunks[1]);

    render_vendors(f, columns[0], app);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(55), Constraint::Percentage(45)])
        .split(columns[1]);

    render_catalog(f, right[0], app);
    render_draft(f, right[1], app);

    render_status_bar(f, chunks[2], app);
}

fn pane_block(app: &App, pane: Pane) -> Block<'static> {
    let color = if app.focus == pane { Color::Yellow } else { Color::White };
    Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(color))
        .title(pane.title().to_string())
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = vec![
        Span::styled("Vendor: ", Style::default().fg(Color::DarkGray)),
        Span::styled(
            app.vendor_label(),
            Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Catalog: {}", app.form.catalog.len()),
            Style::default().fg(Color::White),
        ),
        Span::raw("  "),
        Span::styled(
            format!("✓ {}", app.form.selection.len()),
            Style::default().fg(Color::Green),
        ),
        Span::raw("  |  "),
        Span::styled(
            format!("Lines: {}", app.form.line_items.len()),
            Style::default().fg(Color::Cyan),
        ),
    ];

    if app.form.is_loading {
        let frame = SPINNER[app.tick % SPINNER.len()];
        spans.push(Span::raw("  |  "));
        spans.push(Span::styled(
            format!("{} Loading previous items...", frame),
            Style::default().fg(Color::Magenta),
        ));
    }

    let header = Paragraph::new(vec![Line::from(spans)])
        .block(Block::default().borders(Borders::ALL).border_style(Style::default().fg(Color::Cyan)));

    f.render_widget(header, area);
}

fn header_row(titles: &[&'static str]) -> Row<'static> {
    let cells = titles.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    Row::new(cells).style(Style::default().bg(Color::DarkGray)).height(1)
}

fn render_vendors(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.vendors.iter().map(|v| {
        let style = if Some(&v.id) == app.form.vendor.as_ref() {
            Style::default().fg(Color::Green).add_modifier(Modifier::BOLD)
        } else {
            Style::default()
        };
        Row::new(vec![Cell::from(truncate(&v.label, 40))]).style(style)
    });

    let table = Table::new(rows, [Constraint::Percentage(100)])
        .block(pane_block(app, Pane::Vendors))
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.vendor_state);
}

fn render_catalog(f: &mut Frame, area: Rect, app: &mut App) {
    // Inline error sits directly above the catalog it belongs to
    let area = match &app.form.last_error {
        Some(message) => {
            let parts = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(1), Constraint::Min(0)])
                .split(area);
            let line = Line::from(vec![
                Span::styled(
                    format!(" ✗ {} ", truncate(message, 100)),
                    Style::default().fg(Color::White).bg(Color::Red),
                ),
                Span::styled("  x", Style::default().fg(Color::Yellow)),
                Span::raw(" dismiss"),
            ]);
            f.render_widget(Paragraph::new(line), parts[0]);
            parts[1]
        }
        None => area,
    };

    let placeholder = if app.form.vendor.is_none() {
        Some("Select a vendor to see previously purchased items")
    } else if app.form.catalog.is_empty() && !app.form.is_loading {
        Some("No previous items for this vendor")
    } else {
        None
    };

    if let Some(text) = placeholder {
        let empty = Paragraph::new(Line::from(Span::styled(text, Style::default().fg(Color::DarkGray))))
            .block(pane_block(app, Pane::Catalog));
        f.render_widget(empty, area);
        return;
    }

    let symbol = app.orchestrator.config().display.currency_symbol.clone();
    let rows = app.form.catalog.entries.iter().map(|entry| {
        let picked = app.form.selection.contains(&entry.key);
        let mark = if picked { "[x]" } else { "[ ]" };
        let style = if picked {
            Style::default().fg(Color::Green)
        } else {
            Style::default()
        };
        Row::new(vec![
            Cell::from(mark),
            Cell::from(truncate(&entry.item_name, 40)),
            Cell::from(format_currency(entry.unit_price, &symbol)),
            Cell::from(entry.cost_center.clone()),
        ])
        .style(style)
    });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(20),
            Constraint::Length(14),
            Constraint::Length(14),
        ],
    )
    .header(header_row(&["", "Item", "Unit price", "Cost center"]))
    .block(pane_block(app, Pane::Catalog))
    .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.catalog_state);
}

fn render_draft(f: &mut Frame, area: Rect, app: &mut App) {
    let rows = app.form.line_items.iter().map(|line| {
        Row::new(vec![
            Cell::from(truncate(&line.description, 40)),
            Cell::from(line.quantity.clone()),
            Cell::from(line.unit_cost.clone()),
            Cell::from(line.cost_center.clone().unwrap_or_default()),
        ])
    });

    let table = Table::new(
        rows,
        [
            Constraint::Min(20),
            Constraint::Length(6),
            Constraint::Length(12),
            Constraint::Length(14),
        ],
    )
    .header(header_row(&["Description", "Qty", "Unit cost", "Cost center"]))
    .block(pane_block(app, Pane::Draft))
    .highlight_style(Style::default().bg(Color::DarkGray))
    .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut app.draft_state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut status_spans = vec![Span::styled(
        format!(" {} ", app.focus.title().trim()),
        Style::default().fg(Color::Cyan),
    )];

    let hints: &[(&str, &str)] = match app.focus {
        Pane::Vendors => &[("Enter", " Load items")],
        Pane::Catalog => &[("Space", " Pick"), ("a", " Add picked")],
        Pane::Draft => &[("n", " New line")],
    };
    for (key, label) in hints.iter().chain([("Tab", " Pane"), ("↑/↓", " Nav")].iter()) {
        status_spans.push(Span::raw(" | "));
        status_spans.push(Span::styled(*key, Style::default().fg(Color::Yellow)));
        status_spans.push(Span::raw(*label));
    }
    status_spans.push(Span::raw(" | "));
    status_spans.push(Span::styled("q", Style::default().fg(Color::Red)));
    status_spans.push(Span::raw(" Quit"));

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}
