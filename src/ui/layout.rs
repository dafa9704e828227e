use ratatui::layout::{Constraint, Direction, Layout, Rect};

#[derive(Debug, Clone, Copy)]
pub struct UiAreas {
    pub size: Rect,
    pub header_info: Rect,
    pub header_activity: Rect,
    pub toggles: Rect,
    pub list: Rect,
    pub pagination: Rect,
    pub detail_line: Rect,
    pub status_line: Rect,
}

pub fn areas(size: Rect) -> UiAreas {
    let vertical = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Length(1),
            Constraint::Min(0),
            Constraint::Length(1),
            Constraint::Length(2),
        ])
        .split(size);

    let header_chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(65), Constraint::Percentage(35)])
        .split(vertical[0]);

    let footer_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Length(1), Constraint::Length(1)])
        .split(vertical[4]);

    UiAreas {
        size,
        header_info: header_chunks[0],
        header_activity: header_chunks[1],
        toggles: vertical[1],
        list: vertical[2],
        pagination: vertical[3],
        detail_line: footer_chunks[0],
        status_line: footer_chunks[1],
    }
}

/// Data rows that fit in the events table (borders and header row excluded)
pub fn list_rows(list: Rect) -> usize {
    list.height.saturating_sub(3) as usize
}
