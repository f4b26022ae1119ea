use crate::app::{App, Focus};
use crate::charts::{Container, GridConfig};
use crate::prefs::Theme;
use crate::source::CoinSource;
use crate::tabs::Tab;
use chrono::DateTime;
use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, List, ListItem, ListState, Paragraph, Tabs},
    Frame,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Areas {
    pub header: Rect,
    pub list: Rect,
    pub chart_error: Option<Rect>,
    pub charts: Rect,
    pub detail: Rect,
    pub footer: Rect,
}

pub fn layout_areas(size: Rect, show_chart_error: bool) -> Areas {
    let rows = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(size);

    let body = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(40), Constraint::Percentage(60)])
        .split(rows[1]);

    let right = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Percentage(60), Constraint::Percentage(40)])
        .split(body[1]);

    let (chart_error, charts) = if show_chart_error {
        let split = Layout::default()
            .direction(Direction::Vertical)
            .constraints([Constraint::Length(1), Constraint::Min(0)])
            .split(right[0]);
        (Some(split[0]), split[1])
    } else {
        (None, right[0])
    };

    Areas {
        header: rows[0],
        list: body[0],
        chart_error,
        charts,
        detail: right[1],
        footer: rows[2],
    }
}

/// Outer rectangles of the grid slots, row-major. Slot `i` hosts tracked
/// coin `i`; coins past the last slot are off screen.
pub fn chart_slots(area: Rect, grid: GridConfig) -> Vec<Rect> {
    let row_constraints: Vec<Constraint> = (0..grid.rows).map(|_| Constraint::Ratio(1, grid.rows as u32)).collect();
    let col_constraints: Vec<Constraint> = (0..grid.cols).map(|_| Constraint::Ratio(1, grid.cols as u32)).collect();

    let row_rects = Layout::default()
        .direction(Direction::Vertical)
        .constraints(row_constraints)
        .split(area);

    let mut slots = Vec::with_capacity(grid.slots());
    for row in row_rects.iter() {
        let cells = Layout::default()
            .direction(Direction::Horizontal)
            .constraints(col_constraints.clone())
            .split(*row);
        slots.extend(cells.iter().copied());
    }
    slots
}

fn chart_grid_block() -> Block<'static> {
    Block::default().borders(Borders::ALL)
}

/// Area left for the slots once the chart panel border is drawn.
pub fn chart_grid_area(charts: Rect) -> Rect {
    chart_grid_block().inner(charts)
}

/// Drawable area inside a slot's border.
pub fn container_of(slot: Rect) -> Container {
    let inner = Block::default().borders(Borders::ALL).inner(slot);
    Container {
        width: inner.width,
        height: inner.height,
    }
}

struct Palette {
    text: Color,
    muted: Color,
    accent: Color,
    highlight_bg: Color,
    line: Color,
    up: Color,
    down: Color,
    error: Color,
}

fn palette(theme: Theme) -> Palette {
    match theme {
        Theme::Dark => Palette {
            text: Color::White,
            muted: Color::Gray,
            accent: Color::Cyan,
            highlight_bg: Color::DarkGray,
            line: Color::Blue,
            up: Color::Green,
            down: Color::Red,
            error: Color::Red,
        },
        Theme::Light => Palette {
            text: Color::Black,
            muted: Color::DarkGray,
            accent: Color::Blue,
            highlight_bg: Color::Gray,
            line: Color::Blue,
            up: Color::Green,
            down: Color::Red,
            error: Color::Red,
        },
    }
}

pub fn render<S: CoinSource>(f: &mut Frame, app: &App<S>) {
    let areas = layout_areas(f.area(), app.show_chart_error());
    let p = palette(app.theme);

    render_header(f, app, &p, areas.header);
    render_coin_list(f, app, &p, areas.list);
    if let Some(error_area) = areas.chart_error {
        render_chart_error(f, app, &p, error_area);
    }
    render_chart_grid(f, app, &p, areas.charts);
    render_detail(f, app, &p, areas.detail);
    render_footer(f, app, &p, areas.footer);
}

fn focused_border(app_focus: Focus, this: Focus, p: &Palette) -> Style {
    if app_focus == this {
        Style::default().fg(p.accent)
    } else {
        Style::default().fg(p.muted)
    }
}

fn render_header<S: CoinSource>(f: &mut Frame, app: &App<S>, p: &Palette, area: Rect) {
    let mut spans = vec![
        Span::styled(" CoinWatch ", Style::default().fg(p.accent).add_modifier(Modifier::BOLD)),
        Span::raw(" | "),
        Span::styled(
            match app.focus {
                Focus::List => "Coins",
                Focus::Charts => "Charts",
                Focus::Detail => "Trade",
            },
            Style::default().fg(Color::Yellow),
        ),
        Span::raw(" | "),
        Span::styled(format!("Watchlist: {}", app.watchlist.len()), Style::default().fg(p.text)),
    ];

    if app.grid_registry.is_loading() || app.tabs_registry.is_loading() {
        spans.push(Span::raw(" | "));
        spans.push(Span::styled("Refreshing...", Style::default().fg(p.muted)));
    }

    if let Some(coin) = app.selection.get() {
        let color = if coin.change24h >= 0.0 { p.up } else { p.down };
        spans.push(Span::raw(" | "));
        spans.push(Span::styled(
            format!("{} ${:.2}", coin.symbol, coin.price),
            Style::default().fg(p.text).add_modifier(Modifier::BOLD),
        ));
        spans.push(Span::raw(" "));
        spans.push(Span::styled(format!("({:+.2}%)", coin.change24h), Style::default().fg(color)));
    }

    let header = Paragraph::new(Line::from(spans)).block(Block::default().borders(Borders::ALL));
    f.render_widget(header, area);
}

fn render_footer<S: CoinSource>(f: &mut Frame, app: &App<S>, p: &Palette, area: Rect) {
    let hint = if app.editing_search {
        "type to search | Enter: done | Esc: clear"
    } else {
        match app.focus {
            Focus::List => "1-5: tab | /: search | j/k: move | Enter: select | w: watch | Tab: focus | t: theme | q: quit",
            Focus::Charts => "a: add chart | +/-: rows | ]/[: cols | e: dismiss error | Tab: focus | q: quit",
            Focus::Detail => "0-9 . : amount | b: buy | s: sell | x: clear selection | Tab: focus | q: quit",
        }
    };

    let footer = Paragraph::new(Line::from(vec![
        Span::styled(" Controls: ", Style::default().fg(p.muted)),
        Span::styled(hint, Style::default().fg(p.text)),
    ]))
    .block(Block::default().borders(Borders::ALL));

    f.render_widget(footer, area);
}

fn render_coin_list<S: CoinSource>(f: &mut Frame, app: &App<S>, p: &Palette, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focused_border(app.focus, Focus::List, p))
        .title(" Markets ");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Length(1),
            Constraint::Min(0),
        ])
        .split(inner);

    let titles: Vec<Line> = Tab::ALL.iter().map(|t| Line::from(t.label())).collect();
    let tabs = Tabs::new(titles)
        .select(app.tabs.active().index())
        .style(Style::default().fg(p.muted))
        .highlight_style(Style::default().fg(p.accent).add_modifier(Modifier::UNDERLINED));
    f.render_widget(tabs, chunks[0]);

    let search_style = if app.editing_search {
        Style::default().fg(Color::Yellow)
    } else {
        Style::default().fg(p.muted)
    };
    let search_text = if app.tabs.search().is_empty() && !app.editing_search {
        "Search coins... (/)".to_string()
    } else {
        format!("Search: {}{}", app.tabs.search(), if app.editing_search { "_" } else { "" })
    };
    f.render_widget(Paragraph::new(search_text).style(search_style), chunks[1]);

    if let Some(err) = app.tabs_registry.error() {
        f.render_widget(Paragraph::new(err).style(Style::default().fg(p.error)), chunks[2]);
    } else if app.tabs_registry.is_loading() && app.tabs_registry.ticks() == 0 {
        f.render_widget(Paragraph::new("Loading coins...").style(Style::default().fg(p.muted)), chunks[2]);
    }

    let visible = app.tabs.visible(app.tabs_registry.coins(), &app.watchlist);
    if visible.is_empty() {
        if app.tabs_registry.error().is_none() && !app.tabs_registry.is_loading() {
            f.render_widget(
                Paragraph::new(app.tabs.empty_message()).style(Style::default().fg(p.muted)),
                chunks[3],
            );
        }
        return;
    }

    let selected_id = app.selection.selected_id();
    let items: Vec<ListItem> = visible
        .iter()
        .map(|coin| {
            let star = if app.watchlist.contains(&coin.id) { "★" } else { "☆" };
            let change_color = if coin.change24h >= 0.0 { p.up } else { p.down };
            let marker = if selected_id.as_deref() == Some(coin.id.as_str()) { "▶ " } else { "  " };
            ListItem::new(vec![
                Line::from(vec![
                    Span::raw(marker),
                    Span::styled(format!("{} ", star), Style::default().fg(Color::Yellow)),
                    Span::styled(
                        format!("{} ({})", coin.name, coin.symbol),
                        Style::default().fg(p.text).add_modifier(Modifier::BOLD),
                    ),
                ]),
                Line::from(vec![
                    Span::raw("    "),
                    Span::styled(format!("${:.2}", coin.price), Style::default().fg(p.text)),
                    Span::raw("  "),
                    Span::styled(format!("{:.2}%", coin.change24h), Style::default().fg(change_color)),
                    Span::raw("  "),
                    Span::styled(
                        format!("MC ${}", format_thousands(coin.market_cap)),
                        Style::default().fg(p.muted),
                    ),
                ]),
            ])
        })
        .collect();

    let list = List::new(items).highlight_style(Style::default().bg(p.highlight_bg));
    let mut state = ListState::default().with_selected(Some(app.tabs.cursor()));
    f.render_stateful_widget(list, chunks[3], &mut state);
}

fn render_chart_error<S: CoinSource>(f: &mut Frame, app: &App<S>, p: &Palette, area: Rect) {
    let message = app
        .grid_registry
        .error()
        .or_else(|| app.charts.manager().error())
        .unwrap_or_default();
    f.render_widget(
        Paragraph::new(format!(" {} (e: dismiss)", message)).style(Style::default().fg(p.error)),
        area,
    );
}

fn render_chart_grid<S: CoinSource>(f: &mut Frame, app: &App<S>, p: &Palette, area: Rect) {
    let grid = app.charts.grid();
    let tracked = app.charts.tracked();
    let add_hint = if app.can_add_chart() { "a: add chart" } else { "all coins charted" };
    let block = chart_grid_block()
        .border_style(focused_border(app.focus, Focus::Charts, p))
        .title(format!(
            " Charts {}x{} ({}/{}) | {} ",
            grid.rows,
            grid.cols,
            tracked.len().min(grid.slots()),
            tracked.len(),
            add_hint
        ));
    let inner = chart_grid_area(area);
    f.render_widget(block, area);

    if app.grid_registry.is_loading() && app.grid_registry.ticks() == 0 {
        f.render_widget(
            Paragraph::new("Loading charts...")
                .alignment(Alignment::Center)
                .style(Style::default().fg(p.muted)),
            inner,
        );
        return;
    }

    for (coin_id, slot) in tracked.iter().zip(chart_slots(inner, grid)) {
        let title = app
            .grid_registry
            .find(coin_id)
            .map(|c| c.name.clone())
            .unwrap_or_else(|| coin_id.clone());
        let slot_block = Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(p.muted))
            .title(Span::styled(
                format!(" {} Chart ", title),
                Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
            ));

        let Some(surface) = app.charts.manager().surface(coin_id) else {
            f.render_widget(
                Paragraph::new("No price history")
                    .alignment(Alignment::Center)
                    .style(Style::default().fg(p.muted))
                    .block(slot_block),
                slot,
            );
            continue;
        };

        let [x_min, x_max] = surface.x_bounds();
        let [y_min, y_max] = surface.y_bounds();
        let datasets = vec![Dataset::default()
            .marker(symbols::Marker::Braille)
            .graph_type(GraphType::Line)
            .style(Style::default().fg(p.line))
            .data(surface.points())];

        let chart = Chart::new(datasets)
            .block(slot_block)
            .x_axis(
                Axis::default()
                    .style(Style::default().fg(p.muted))
                    .bounds([x_min, x_max])
                    .labels(vec![
                        Span::raw(format_day(x_min)),
                        Span::raw(format_day(x_max)),
                    ]),
            )
            .y_axis(
                Axis::default()
                    .style(Style::default().fg(p.muted))
                    .bounds([y_min, y_max])
                    .labels(vec![
                        Span::raw(format_price(y_min)),
                        Span::raw(format_price(y_max)),
                    ]),
            );
        f.render_widget(chart, slot);
    }
}

fn render_detail<S: CoinSource>(f: &mut Frame, app: &App<S>, p: &Palette, area: Rect) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(focused_border(app.focus, Focus::Detail, p))
        .title(" Details ");

    let Some(coin) = app.panel.coin() else {
        f.render_widget(
            Paragraph::new("Select a coin to see details.")
                .style(Style::default().fg(p.muted))
                .block(block),
            area,
        );
        return;
    };

    let change_color = if coin.change24h >= 0.0 { p.up } else { p.down };
    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} ({})", coin.name, coin.symbol),
            Style::default().fg(p.accent).add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Price: ${:.2}", coin.price)),
        Line::from(format!("Market Cap: ${}", format_thousands(coin.market_cap))),
        Line::from(format!("24h Volume: ${}", format_thousands(coin.volume))),
        Line::from(vec![
            Span::raw("24h Change: "),
            Span::styled(format!("{:.2}%", coin.change24h), Style::default().fg(change_color)),
        ]),
        Line::from(""),
        Line::from(vec![
            Span::styled("Amount: ", Style::default().fg(p.muted)),
            Span::styled(
                format!("{}{}", app.panel.amount_input(), if app.focus == Focus::Detail { "_" } else { "" }),
                Style::default().fg(Color::Yellow),
            ),
            Span::styled("   [b] Buy  [s] Sell", Style::default().fg(p.muted)),
        ]),
    ];

    if let Some(err) = app.panel.error() {
        lines.push(Line::from(Span::styled(err.to_string(), Style::default().fg(p.error))));
    }

    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        "Transaction History",
        Style::default().fg(p.text).add_modifier(Modifier::BOLD),
    )));
    if app.panel.ledger().is_empty() {
        lines.push(Line::from(Span::styled("No transactions yet.", Style::default().fg(p.muted))));
    }
    for tx in app.panel.ledger() {
        lines.push(Line::from(format!(
            "{}: {} {} at ${:.2}  {}",
            tx.side.label(),
            tx.quantity,
            coin.symbol,
            tx.price,
            tx.timestamp
        )));
    }

    f.render_widget(
        Paragraph::new(lines).style(Style::default().fg(p.text)).block(block),
        area,
    );
}

/// Integer part grouped with commas; small values keep two decimals.
pub fn format_thousands(value: f64) -> String {
    if value.abs() < 1_000.0 && value.fract() != 0.0 {
        return format!("{:.2}", value);
    }
    let rounded = value.round().abs() as u128;
    let digits = rounded.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    if value < 0.0 {
        format!("-{}", out)
    } else {
        out
    }
}

fn format_day(unix_secs: f64) -> String {
    DateTime::from_timestamp(unix_secs as i64, 0)
        .map(|dt| dt.format("%m-%d").to_string())
        .unwrap_or_default()
}

fn format_price(value: f64) -> String {
    if value.abs() >= 100.0 {
        format!("{:.0}", value)
    } else {
        format!("{:.3}", value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_thousands() {
        assert_eq!(format_thousands(1_200_000_000_000.0), "1,200,000,000,000");
        assert_eq!(format_thousands(50_000.0), "50,000");
        assert_eq!(format_thousands(999.0), "999");
        assert_eq!(format_thousands(0.35), "0.35");
        assert_eq!(format_thousands(-1_234.0), "-1,234");
    }

    #[test]
    fn test_chart_slots_cover_grid() {
        let area = Rect::new(0, 0, 100, 40);
        let slots = chart_slots(area, GridConfig { rows: 2, cols: 3 });
        assert_eq!(slots.len(), 6);
        assert_eq!(slots[0].y, slots[2].y);
        assert!(slots[3].y > slots[0].y);

        let container = container_of(slots[0]);
        assert_eq!(container.width, slots[0].width - 2);
        assert_eq!(container.height, slots[0].height - 2);
    }

    #[test]
    fn test_error_line_is_reserved_only_when_needed() {
        let size = Rect::new(0, 0, 160, 60);
        let plain = layout_areas(size, false);
        let with_error = layout_areas(size, true);
        assert!(plain.chart_error.is_none());
        assert_eq!(with_error.chart_error.map(|r| r.height), Some(1));
        assert_eq!(with_error.charts.height + 1, plain.charts.height);
    }

    #[test]
    fn test_format_day() {
        assert_eq!(format_day(0.0), "01-01");
    }
}
