use std::time::Instant;

use alloy::primitives::Address;
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span, Text};
use ratatui::widgets::{Block, Borders, Cell, Clear, Paragraph, Row, Table, TableState, Wrap};
use ratatui::Frame;

pub mod layout;
pub mod widgets;

use crate::app::{App, StatusLevel};
use crate::domain::event::{EventFields, EventKind, KindCategory, TokenStandard};
use crate::render::PageButton;
use crate::store::EventRecord;
use widgets::MiniSparkline;

pub fn draw(f: &mut Frame, app: &mut App) {
    let areas = layout::areas(f.size());
    app.list_viewport = layout::list_rows(areas.list);

    draw_header(f, areas.header_info, areas.header_activity, app);
    draw_toggle_bar(f, areas.toggles, app);
    draw_events_table(f, areas.list, app);
    draw_pagination_bar(f, areas.pagination, app);
    draw_detail_line(f, areas.detail_line, app);
    draw_status_line(f, areas.status_line, app);

    if app.help_open {
        draw_help_popup(f, areas.size, app);
    }
}

fn draw_header(f: &mut Frame, info_area: Rect, activity_area: Rect, app: &App) {
    let now = Instant::now();
    let (block, age, time) = match app.head {
        Some(head) => (
            format!("#{}", head.number),
            app.seconds_since_block(now)
                .map(|secs| format!("{secs}s ago"))
                .unwrap_or_default(),
            chrono::DateTime::from_timestamp(head.timestamp as i64, 0)
                .map(|ts| ts.format("%H:%M:%S UTC").to_string())
                .unwrap_or_default(),
        ),
        None => ("--".to_string(), String::new(), String::new()),
    };
    let chain = app
        .chain_id
        .map(|id| id.to_string())
        .unwrap_or_else(|| "--".to_string());
    let link_style = if app.connected {
        Style::default().fg(Color::Green)
    } else {
        Style::default().fg(Color::Red)
    };

    let title = Line::from(vec![
        Span::styled(
            "tokenfeed",
            Style::default()
                .fg(Color::LightCyan)
                .add_modifier(Modifier::BOLD),
        ),
        Span::raw("  "),
        Span::styled("● ", link_style),
        Span::styled("RPC", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {} ", truncate_str(&app.rpc_endpoint, 40))),
        Span::styled("Chain", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {chain} ")),
        Span::styled("Block", Style::default().fg(Color::DarkGray)),
        Span::raw(format!(" {block} ")),
        Span::styled(age, Style::default().fg(Color::Yellow)),
        Span::raw(" "),
        Span::styled(time, Style::default().fg(Color::DarkGray)),
    ]);
    let left = Paragraph::new(title)
        .block(Block::default().borders(Borders::ALL))
        .alignment(Alignment::Left);
    f.render_widget(left, info_area);

    let activity = Block::default()
        .title("events/block")
        .borders(Borders::ALL);
    let inner = activity.inner(activity_area);
    f.render_widget(activity, activity_area);
    let color = if app.connected {
        Color::Cyan
    } else {
        Color::DarkGray
    };
    f.render_widget(
        MiniSparkline::new(&app.block_event_counts).style(Style::default().fg(color)),
        inner,
    );
}

fn draw_toggle_bar(f: &mut Frame, area: Rect, app: &App) {
    let mut spans = Vec::with_capacity(EventKind::ALL.len() * 2);
    for (i, kind) in EventKind::ALL.iter().enumerate() {
        let style = if app.store.is_active(*kind) {
            Style::default().fg(kind_color(*kind))
        } else {
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::CROSSED_OUT)
        };
        spans.push(Span::styled(format!("{}:{}", i + 1, kind.label()), style));
        spans.push(Span::raw(" "));
    }
    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_events_table(f: &mut Frame, area: Rect, app: &App) {
    let header = Row::new(vec!["Kind", "Token", "From", "To", "Value", "Block", "Tx"])
        .style(
            Style::default()
                .fg(Color::DarkGray)
                .add_modifier(Modifier::BOLD),
        );

    let rows: Vec<Row> = app.page.rows.iter().map(event_row).collect();
    let widths = [
        Constraint::Length(18),
        Constraint::Min(16),
        Constraint::Length(12),
        Constraint::Length(12),
        Constraint::Min(12),
        Constraint::Length(10),
        Constraint::Length(12),
    ];

    let summary = &app.page.summary;
    let title = format!(
        "Events  page {}/{}  ({} shown of {})",
        summary.page, summary.total_pages, summary.filtered_count, summary.stored_count
    );
    let table = Table::new(rows, widths)
        .header(header)
        .block(Block::default().title(title).borders(Borders::ALL))
        .highlight_style(Style::default().bg(Color::DarkGray))
        .highlight_symbol("› ");

    let mut state = TableState::default()
        .with_offset(app.list_offset)
        .with_selected(if app.page.rows.is_empty() {
            None
        } else {
            Some(app.selected)
        });
    f.render_stateful_widget(table, area, &mut state);

    if app.page.rows.is_empty() {
        let hint = if app.store.is_empty() {
            "Waiting for token events…"
        } else {
            "No events match the active kinds"
        };
        let inner = Rect {
            x: area.x + 2,
            y: area.y + 2,
            width: area.width.saturating_sub(4),
            height: 1.min(area.height.saturating_sub(3)),
        };
        f.render_widget(
            Paragraph::new(hint).style(Style::default().fg(Color::DarkGray)),
            inner,
        );
    }
}

fn event_row(record: &EventRecord) -> Row<'static> {
    let event = &record.event;
    let kind = event.kind();
    let (from, to) = match event.fields() {
        EventFields::Transfer { from, to, .. } => (short_address(from), short_address(to)),
        EventFields::Creation { contract_address } => (short_address(contract_address), String::new()),
    };
    Row::new(vec![
        Cell::from(kind.label()).style(kind_style(kind)),
        Cell::from(truncate_str(&event.token_label(), 28)),
        Cell::from(from),
        Cell::from(to),
        Cell::from(truncate_str(&event.value_display(), 24)),
        Cell::from(event.block_number.to_string()),
        Cell::from(short_hash(&event.transaction_hash.to_string(), 10)),
    ])
}

fn draw_pagination_bar(f: &mut Frame, area: Rect, app: &App) {
    let summary = &app.page.summary;
    let dim = Style::default().fg(Color::DarkGray);
    let nav = |enabled: bool| if enabled { Style::default() } else { dim };

    let mut spans = vec![
        Span::styled("« ‹ ", nav(summary.has_prev())),
    ];
    for button in &summary.buttons {
        match button {
            PageButton::Page(n) if *n == summary.page => spans.push(Span::styled(
                format!("[{n}]"),
                Style::default()
                    .fg(Color::LightCyan)
                    .add_modifier(Modifier::BOLD),
            )),
            PageButton::Page(n) => spans.push(Span::raw(format!(" {n} "))),
            PageButton::Ellipsis => spans.push(Span::styled(" … ", dim)),
        }
    }
    spans.push(Span::styled(" › »", nav(summary.has_next())));
    spans.push(Span::raw("  "));
    if summary.first_index > 0 {
        spans.push(Span::raw(format!(
            "{}–{} of {}",
            summary.first_index, summary.last_index, summary.filtered_count
        )));
    } else {
        spans.push(Span::styled("0 of 0", dim));
    }
    spans.push(Span::styled("  size ", dim));
    for size in &app.page_sizes {
        if *size == summary.page_size {
            spans.push(Span::styled(
                format!("[{size}]"),
                Style::default().fg(Color::LightCyan),
            ));
        } else {
            spans.push(Span::styled(format!(" {size} "), dim));
        }
    }

    f.render_widget(Paragraph::new(Line::from(spans)), area);
}

fn draw_detail_line(f: &mut Frame, area: Rect, app: &App) {
    let dim = Style::default().fg(Color::DarkGray);
    let line = match app.selected_record() {
        Some(record) => {
            let event = &record.event;
            let mut spans = vec![
                Span::styled("Tx ", dim),
                Span::raw(format!("{} ", event.transaction_hash)),
                Span::styled("log ", dim),
                Span::raw(format!("#{} ", event.log_index)),
            ];
            if event.kind().category() == KindCategory::Creation {
                if let EventFields::Creation { contract_address } = event.fields() {
                    spans.push(Span::styled("contract ", dim));
                    spans.push(Span::raw(format!("{contract_address} ")));
                }
            }
            if let Some(link) = app.explorer_link(record) {
                spans.push(Span::styled(link, Style::default().fg(Color::Blue)));
            }
            Line::from(spans)
        }
        None => Line::from(Span::styled("Press ? for help", dim)),
    };
    f.render_widget(Paragraph::new(line), area);
}

fn draw_status_line(f: &mut Frame, area: Rect, app: &App) {
    let line = if let Some((text, level)) = app.status_text() {
        let color = match level {
            StatusLevel::Info => Color::Green,
            StatusLevel::Warn => Color::Yellow,
            StatusLevel::Error => Color::Red,
        };
        Line::from(Span::styled(text.to_string(), Style::default().fg(color)))
    } else {
        let dim = Style::default().fg(Color::DarkGray);
        let totals = &app.totals;
        Line::from(vec![
            Span::styled("Stored ", dim),
            Span::raw(format!("{}/{}  ", app.store.len(), app.store.capacity())),
            Span::styled("Blocks ", dim),
            Span::raw(format!("{}  ", totals.blocks)),
            Span::styled("Logs ", dim),
            Span::raw(format!("{}  ", totals.logs)),
            Span::styled("Decoded ", dim),
            Span::raw(format!("{}  ", totals.decoded)),
            Span::styled("Dropped ", dim),
            Span::raw(totals.dropped.to_string()),
        ])
    };

    let paragraph = Paragraph::new(line)
        .style(Style::default().fg(Color::White))
        .alignment(Alignment::Left);
    f.render_widget(paragraph, area);
}

fn draw_help_popup(f: &mut Frame, area: Rect, app: &App) {
    let popup_area = centered_rect(64, 70, area);
    f.render_widget(Clear, popup_area);

    let mut lines = vec![
        Line::from("Events"),
        Line::from("  j / k / ↓ / ↑  Move selection (↓ on last row loads next page)"),
        Line::from("  Mouse wheel    Scroll, loads next page near the bottom"),
        Line::from("  1-9            Show/hide an event kind"),
        Line::from(""),
        Line::from("Pages"),
        Line::from("  ] / →          Next page"),
        Line::from("  [ / ←          Previous page"),
        Line::from("  g / G          First / last page"),
        Line::from("  p / P          Cycle page size"),
        Line::from(""),
        Line::from("Connection"),
        Line::from("  e / E          Next / previous RPC endpoint"),
        Line::from(""),
        Line::from("  ?              Toggle help"),
        Line::from("  q              Quit"),
        Line::from(""),
    ];
    lines.push(Line::from(format!(
        "Keeping up to {} events, repainting at most every {} ms",
        app.store.capacity(),
        app.scheduler.min_interval().as_millis()
    )));

    let paragraph = Paragraph::new(Text::from(lines))
        .block(Block::default().title("Help").borders(Borders::ALL))
        .alignment(Alignment::Left)
        .wrap(Wrap { trim: true });

    f.render_widget(paragraph, popup_area);
}

fn kind_color(kind: EventKind) -> Color {
    if kind.category() == KindCategory::Creation {
        return Color::Yellow;
    }
    match kind.standard() {
        TokenStandard::Erc20 => Color::LightGreen,
        TokenStandard::Erc721 => Color::LightMagenta,
        TokenStandard::Erc1155 => Color::LightBlue,
    }
}

/// Mints are bolded in the kind column
fn kind_style(kind: EventKind) -> Style {
    let style = Style::default().fg(kind_color(kind));
    if kind.is_mint() {
        style.add_modifier(Modifier::BOLD)
    } else {
        style
    }
}

fn short_address(address: &Address) -> String {
    if *address == Address::ZERO {
        return "0x0".to_string();
    }
    short_addr(&address.to_string())
}

fn short_addr(value: &str) -> String {
    if value.len() <= 10 {
        return value.to_string();
    }
    let start: String = value.chars().take(6).collect();
    let end: String = value
        .chars()
        .rev()
        .take(4)
        .collect::<String>()
        .chars()
        .rev()
        .collect();
    format!("{}..{}", start, end)
}

fn short_hash(value: &str, len: usize) -> String {
    if value.len() <= len {
        return value.to_string();
    }
    value.chars().take(len).collect()
}

fn truncate_str(value: &str, max: usize) -> String {
    if value.chars().count() <= max {
        return value.to_string();
    }
    value.chars().take(max).collect::<String>() + "…"
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
