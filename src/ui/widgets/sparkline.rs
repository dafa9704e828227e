//! Mini sparkline widget for inline metrics

use ratatui::{
    buffer::Buffer,
    layout::Rect,
    style::{Color, Style},
    widgets::Widget,
};

const BAR_CHARS: [char; 8] = ['▁', '▂', '▃', '▄', '▅', '▆', '▇', '█'];

/// A compact inline sparkline (single line), newest value on the right
pub struct MiniSparkline<'a> {
    data: &'a [u64],
    style: Style,
}

impl<'a> MiniSparkline<'a> {
    pub fn new(data: &'a [u64]) -> Self {
        Self {
            data,
            style: Style::default().fg(Color::Cyan),
        }
    }

    pub fn style(mut self, style: Style) -> Self {
        self.style = style;
        self
    }
}

impl<'a> Widget for MiniSparkline<'a> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        if area.width == 0 || area.height == 0 || self.data.is_empty() {
            return;
        }

        // Scale against what is visible, not the whole history
        let data_len = self.data.len().min(area.width as usize);
        let visible = &self.data[self.data.len() - data_len..];
        let max = visible.iter().copied().max().unwrap_or(1).max(1);

        for (i, &value) in visible.iter().enumerate() {
            let x = area.x + i as u16;
            let scaled = ((value as f64 / max as f64) * 7.0).round() as usize;
            buf.get_mut(x, area.y)
                .set_char(BAR_CHARS[scaled.min(7)])
                .set_style(self.style);
        }
    }
}
