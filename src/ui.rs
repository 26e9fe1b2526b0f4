use crate::render::{metrics, tables, TextTable};
use crate::report::{NoticeLevel, Report};
use anyhow::Result;
use crossterm::{
    event::{self, Event, KeyCode, KeyModifiers},
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Cell, Paragraph, Row, Table, TableState, Wrap},
    Frame, Terminal,
};
use std::io;

const PAGE_JUMP: usize = 10;

/// One tab of the UI: a report table plus its selection.
pub struct Page {
    pub table: TextTable,
    pub state: TableState,
}

impl Page {
    fn new(table: TextTable) -> Self {
        let mut state = TableState::default();
        if !table.rows.is_empty() {
            state.select(Some(0));
        }
        Page { table, state }
    }
}

pub struct App {
    pub report: Report,
    pub pages: Vec<Page>,
    pub current_page: usize,
    pub show_detail: bool,
}

impl App {
    pub fn new(report: Report) -> Self {
        let pages = tables(&report).into_iter().map(Page::new).collect();
        Self {
            report,
            pages,
            current_page: 0,
            show_detail: false,
        }
    }

    pub fn page(&self) -> &Page {
        &self.pages[self.current_page]
    }

    fn page_mut(&mut self) -> &mut Page {
        &mut self.pages[self.current_page]
    }

    pub fn toggle_detail(&mut self) {
        self.show_detail = !self.show_detail;
    }

    pub fn next_page(&mut self) {
        self.current_page = (self.current_page + 1) % self.pages.len();
    }

    pub fn previous_page(&mut self) {
        self.current_page = (self.current_page + self.pages.len() - 1) % self.pages.len();
    }

    /// Header/value pairs of the highlighted row.
    pub fn selected_row(&self) -> Option<Vec<(&'static str, &str)>> {
        let page = self.page();
        let row = page.state.selected().and_then(|i| page.table.rows.get(i))?;
        Some(
            page.table
                .headers
                .iter()
                .copied()
                .zip(row.iter().map(String::as_str))
                .collect(),
        )
    }

    pub fn next(&mut self) {
        let page = self.page_mut();
        let len = page.table.rows.len();
        if len == 0 {
            return;
        }
        let i = match page.state.selected() {
            Some(i) if i + 1 < len => i + 1,
            _ => 0,
        };
        page.state.select(Some(i));
    }

    pub fn previous(&mut self) {
        let page = self.page_mut();
        let len = page.table.rows.len();
        if len == 0 {
            return;
        }
        let i = match page.state.selected() {
            Some(0) | None => len - 1,
            Some(i) => i - 1,
        };
        page.state.select(Some(i));
    }

    pub fn page_down(&mut self) {
        let page = self.page_mut();
        let len = page.table.rows.len();
        if len == 0 {
            return;
        }
        let i = page.state.selected().unwrap_or(0);
        page.state.select(Some((i + PAGE_JUMP).min(len - 1)));
    }

    pub fn page_up(&mut self) {
        let page = self.page_mut();
        if page.table.rows.is_empty() {
            return;
        }
        let i = page.state.selected().unwrap_or(0);
        page.state.select(Some(i.saturating_sub(PAGE_JUMP)));
    }

    pub fn first(&mut self) {
        let page = self.page_mut();
        if !page.table.rows.is_empty() {
            page.state.select(Some(0));
        }
    }

    pub fn last(&mut self) {
        let page = self.page_mut();
        if let Some(last) = page.table.rows.len().checked_sub(1) {
            page.state.select(Some(last));
        }
    }
}

pub fn run_ui(app: &mut App) -> Result<()> {
    // Setup terminal
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let res = run_app(&mut terminal, app);

    // Restore terminal
    disable_raw_mode()?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;

    res.map_err(Into::into)
}

fn run_app<B: ratatui::backend::Backend>(
    terminal: &mut Terminal<B>,
    app: &mut App,
) -> io::Result<()> {
    loop {
        terminal.draw(|f| ui(f, app))?;

        if let Event::Key(key) = event::read()? {
            match key.code {
                KeyCode::Char('q') | KeyCode::Esc => return Ok(()),
                KeyCode::Enter => app.toggle_detail(),
                KeyCode::BackTab => app.previous_page(),
                KeyCode::Tab => {
                    if key.modifiers.contains(KeyModifiers::SHIFT) {
                        app.previous_page();
                    } else {
                        app.next_page();
                    }
                }
                KeyCode::Down | KeyCode::Char('j') => app.next(),
                KeyCode::Up | KeyCode::Char('k') => app.previous(),
                KeyCode::PageDown => app.page_down(),
                KeyCode::PageUp => app.page_up(),
                KeyCode::Home => app.first(),
                KeyCode::End => app.last(),
                _ => {}
            }
        }
    }
}

fn ui(f: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // Tabs + metrics
            Constraint::Min(0),    // Content area
            Constraint::Length(3), // Status bar
        ])
        .split(f.size());

    render_header(f, chunks[0], app);

    if app.show_detail {
        let content_chunks = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
            .split(chunks[1]);

        render_table(f, content_chunks[0], app);
        render_detail_panel(f, content_chunks[1], app);
    } else {
        render_table(f, chunks[1], app);
    }

    render_status_bar(f, chunks[2], app);
}

fn render_header(f: &mut Frame, area: Rect, app: &App) {
    let mut tab_spans = vec![];
    for (i, page) in app.pages.iter().enumerate() {
        if i > 0 {
            tab_spans.push(Span::raw(" │ "));
        }

        let style = if i == app.current_page {
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD | Modifier::UNDERLINED)
        } else {
            Style::default().fg(Color::DarkGray)
        };

        tab_spans.push(Span::styled(page.table.title.clone(), style));
    }

    let mut metric_spans = vec![];
    for (label, value) in metrics(&app.report) {
        metric_spans.push(Span::styled(
            format!("{}: ", label),
            Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
        ));
        metric_spans.push(Span::styled(value, Style::default().fg(Color::Green)));
        metric_spans.push(Span::raw("   "));
    }
    for notice in &app.report.notices {
        let color = match notice.level {
            NoticeLevel::Info => Color::White,
            NoticeLevel::Warning => Color::Red,
        };
        metric_spans.push(Span::raw(" | "));
        metric_spans.push(Span::styled(notice.message.clone(), Style::default().fg(color)));
    }

    let header = Paragraph::new(vec![Line::from(tab_spans), Line::from(metric_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::Cyan))
            .title(format!(" {} ", app.report.source.name())),
    );

    f.render_widget(header, area);
}

fn render_table(f: &mut Frame, area: Rect, app: &mut App) {
    let page = &mut app.pages[app.current_page];
    let widths: Vec<Constraint> = page
        .table
        .widths()
        .into_iter()
        .map(|w| Constraint::Length(w.min(40) as u16 + 2))
        .collect();

    let header_cells = page.table.headers.iter().map(|h| {
        Cell::from(*h).style(Style::default().fg(Color::Yellow).add_modifier(Modifier::BOLD))
    });
    let header = Row::new(header_cells)
        .style(Style::default().bg(Color::DarkGray))
        .height(1);

    let rows = page.table.rows.iter().map(|row| {
        let cells = row.iter().map(|c| Cell::from(truncate(c, 40)));
        Row::new(cells).height(1)
    });

    let table = Table::new(rows, widths)
        .header(header)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::White))
                .title(format!(" {} ", page.table.title)),
        )
        .highlight_style(Style::default().bg(Color::DarkGray).add_modifier(Modifier::BOLD))
        .highlight_symbol("→ ");

    f.render_stateful_widget(table, area, &mut page.state);
}

fn render_status_bar(f: &mut Frame, area: Rect, app: &App) {
    let page = app.page();
    let selected = page.state.selected().map(|i| i + 1).unwrap_or(0);
    let total = page.table.rows.len();

    let status_spans = vec![
        Span::styled(format!(" Row: {}/{} ", selected, total), Style::default().fg(Color::Cyan)),
        Span::raw(" | "),
        Span::styled("Enter", Style::default().fg(Color::Yellow)),
        Span::raw(" Details | "),
        Span::styled("Tab", Style::default().fg(Color::Yellow)),
        Span::raw(" Page | "),
        Span::styled("↑/↓", Style::default().fg(Color::Yellow)),
        Span::raw(" Nav | "),
        Span::styled("PgUp/PgDn", Style::default().fg(Color::Yellow)),
        Span::raw(" Fast | "),
        Span::styled("q", Style::default().fg(Color::Red)),
        Span::raw(" Quit"),
    ];

    let status_bar = Paragraph::new(vec![Line::from(status_spans)]).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::White)),
    );

    f.render_widget(status_bar, area);
}

fn render_detail_panel(f: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Yellow))
        .title(" Details ");

    let fields = match app.selected_row() {
        Some(fields) => fields,
        None => {
            f.render_widget(Paragraph::new("No row selected").block(block), area);
            return;
        }
    };

    let mut content = vec![Line::from("")];
    for (label, value) in fields {
        content.push(Line::from(vec![
            Span::styled(
                format!("  {}: ", label),
                Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
            ),
            Span::raw(value),
        ]));
        content.push(Line::from(""));
    }
    content.push(Line::from(vec![Span::styled(
        "  Press Enter to close",
        Style::default().fg(Color::DarkGray).add_modifier(Modifier::ITALIC),
    )]));

    f.render_widget(
        Paragraph::new(content)
            .block(block)
            .wrap(Wrap { trim: false }),
        area,
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let head: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{}...", head)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::GoogleSale;
    use crate::report::google_report;
    use ratatui::backend::TestBackend;

    fn app() -> App {
        let sale = |net: f64, currency: &str, title: &str| GoogleSale {
            transaction_date: None,
            net_amount: net,
            buyer_amount: net / 1000.0,
            buyer_currency: currency.to_string(),
            product_title: Some(title.to_string()),
        };
        App::new(google_report(
            vec![
                sale(1000.0, "USD", "Gems"),
                sale(500.0, "JPY", "Coins"),
                sale(250.0, "KRW", "Gems"),
            ],
            true,
        ))
    }

    #[test]
    fn test_pages_follow_report_tables() {
        let app = app();
        let titles: Vec<&str> = app.pages.iter().map(|p| p.table.title.as_str()).collect();
        assert_eq!(titles, vec!["Revenue by Currency", "Revenue by Product", "Normalized Rows"]);
        assert_eq!(app.page().state.selected(), Some(0));
    }

    #[test]
    fn test_page_navigation_wraps() {
        let mut app = app();
        app.previous_page();
        assert_eq!(app.current_page, 2);
        app.next_page();
        assert_eq!(app.current_page, 0);
        app.next_page();
        assert_eq!(app.current_page, 1);
    }

    #[test]
    fn test_row_navigation() {
        let mut app = app();
        app.next();
        app.next();
        assert_eq!(app.page().state.selected(), Some(2));
        app.next();
        assert_eq!(app.page().state.selected(), Some(0));
        app.previous();
        assert_eq!(app.page().state.selected(), Some(2));
        app.page_up();
        assert_eq!(app.page().state.selected(), Some(0));
        app.page_down();
        assert_eq!(app.page().state.selected(), Some(2));
        app.first();
        assert_eq!(app.page().state.selected(), Some(0));
        app.last();
        assert_eq!(app.page().state.selected(), Some(2));
    }

    #[test]
    fn test_selected_row_pairs_headers() {
        let app = app();
        let fields = app.selected_row().unwrap();
        assert_eq!(fields.len(), 5);
        assert_eq!(fields[4], ("Currency", "USD"));
    }

    #[test]
    fn test_draw_with_detail_panel() {
        let mut app = app();
        app.toggle_detail();
        let mut terminal = Terminal::new(TestBackend::new(140, 30)).unwrap();
        terminal.draw(|f| ui(f, &mut app)).unwrap();
    }

    #[test]
    fn test_truncate_counts_chars() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("포케팜 매출 계산기 상품", 8), "포케팜 매...");
    }
}
