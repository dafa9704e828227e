//! Page window over the filtered event list

use std::collections::BTreeSet;

pub const PAGE_SIZES: [usize; 4] = [10, 25, 50, 100];
pub const DEFAULT_PAGE_SIZE: usize = 25;
pub const DEFAULT_PAGE_RADIUS: usize = 2;
/// Load-more threshold for the terminal list, in rows
pub const DEFAULT_LOAD_MORE_ROWS: usize = 2;

/// Page size and 1-based page number
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderWindow {
    page_size: usize,
    page_number: usize,
}

impl RenderWindow {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size: page_size.max(1),
            page_number: 1,
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_number(&self) -> usize {
        self.page_number
    }

    pub fn is_first_page(&self) -> bool {
        self.page_number == 1
    }

    /// Index of the first item on the current page
    pub fn offset(&self) -> usize {
        (self.page_number - 1) * self.page_size
    }

    /// Changing the page size always returns to page 1
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.max(1);
        self.page_number = 1;
    }

    /// Jump to `page`, clamped to `1..=total_pages(count)`
    pub fn go_to(&mut self, page: usize, count: usize) {
        self.page_number = page.clamp(1, total_pages(count, self.page_size));
    }

    pub fn next(&mut self, count: usize) -> bool {
        let before = self.page_number;
        self.go_to(self.page_number + 1, count);
        self.page_number != before
    }

    pub fn prev(&mut self) -> bool {
        if self.page_number > 1 {
            self.page_number -= 1;
            true
        } else {
            false
        }
    }

    /// Scroll-driven advance; same bound as [`RenderWindow::next`]
    pub fn load_more(&mut self, count: usize) -> bool {
        self.next(count)
    }

    /// Pull the page number down after the filtered count shrank.
    /// Returns whether the page changed.
    pub fn clamp(&mut self, count: usize) -> bool {
        let last = total_pages(count, self.page_size);
        if self.page_number > last {
            self.page_number = last;
            true
        } else {
            false
        }
    }
}

impl Default for RenderWindow {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

/// `ceil(count / page_size)`, never below 1
pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

/// Items of the current page, taken from any filtered sequence
pub fn visible_slice<I>(filtered: I, window: &RenderWindow) -> Vec<I::Item>
where
    I: IntoIterator,
{
    filtered
        .into_iter()
        .skip(window.offset())
        .take(window.page_size())
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageButton {
    Page(usize),
    Ellipsis,
}

/// First, last and `current ± radius`, with an ellipsis over every gap
pub fn page_buttons(current: usize, total: usize, radius: usize) -> Vec<PageButton> {
    let total = total.max(1);
    let current = current.clamp(1, total);

    let mut pages = BTreeSet::new();
    pages.insert(1);
    pages.insert(total);
    let start = current.saturating_sub(radius).max(1);
    let end = (current + radius).min(total);
    pages.extend(start..=end);

    let mut buttons = Vec::with_capacity(pages.len() + 2);
    let mut prev: Option<usize> = None;
    for page in pages {
        if let Some(prev) = prev {
            if page > prev + 1 {
                buttons.push(PageButton::Ellipsis);
            }
        }
        buttons.push(PageButton::Page(page));
        prev = Some(page);
    }
    buttons
}

/// Scroll position of a list, in whatever unit the host measures (rows, px)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScrollMetrics {
    pub offset: usize,
    pub viewport: usize,
    pub content: usize,
}

impl ScrollMetrics {
    pub fn distance_to_bottom(&self) -> usize {
        self.content.saturating_sub(self.offset + self.viewport)
    }
}

pub fn near_bottom(metrics: ScrollMetrics, threshold: usize) -> bool {
    metrics.distance_to_bottom() < threshold
}

/// Everything the pagination bar needs after a paint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaginationSummary {
    pub page: usize,
    pub total_pages: usize,
    pub page_size: usize,
    pub filtered_count: usize,
    pub stored_count: usize,
    /// 1-based position of the first and last visible item, 0 when empty
    pub first_index: usize,
    pub last_index: usize,
    pub buttons: Vec<PageButton>,
}

impl PaginationSummary {
    pub fn new(
        window: &RenderWindow,
        visible: usize,
        filtered_count: usize,
        stored_count: usize,
        radius: usize,
    ) -> Self {
        let total_pages = total_pages(filtered_count, window.page_size());
        let (first_index, last_index) = if visible == 0 {
            (0, 0)
        } else {
            (window.offset() + 1, window.offset() + visible)
        };
        Self {
            page: window.page_number(),
            total_pages,
            page_size: window.page_size(),
            filtered_count,
            stored_count,
            first_index,
            last_index,
            buttons: page_buttons(window.page_number(), total_pages, radius),
        }
    }

    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

impl Default for PaginationSummary {
    fn default() -> Self {
        Self::new(&RenderWindow::default(), 0, 0, 0, DEFAULT_PAGE_RADIUS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use PageButton::{Ellipsis, Page};

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 10), 1);
        assert_eq!(total_pages(1, 10), 1);
        assert_eq!(total_pages(10, 10), 1);
        assert_eq!(total_pages(11, 10), 2);
        assert_eq!(total_pages(25, 10), 3);
    }

    #[test]
    fn test_visible_slice_pages() {
        let items: Vec<usize> = (1..=25).collect();
        let mut window = RenderWindow::new(10);
        assert_eq!(
            visible_slice(&items, &window),
            items[..10].iter().collect::<Vec<_>>()
        );

        window.go_to(3, items.len());
        let page3: Vec<usize> = visible_slice(items.iter().copied(), &window);
        assert_eq!(page3, vec![21, 22, 23, 24, 25]);
    }

    #[test]
    fn test_empty_slice() {
        let items: Vec<u8> = Vec::new();
        let window = RenderWindow::new(10);
        assert!(visible_slice(&items, &window).is_empty());
    }

    #[test]
    fn test_page_beyond_end_clamps() {
        let mut window = RenderWindow::new(10);
        window.go_to(9, 25);
        assert_eq!(window.page_number(), 3);
        window.go_to(0, 25);
        assert_eq!(window.page_number(), 1);
    }

    #[test]
    fn test_clamp_after_shrink() {
        let mut window = RenderWindow::new(10);
        window.go_to(3, 25);
        assert!(window.clamp(12));
        assert_eq!(window.page_number(), 2);
        assert!(window.clamp(0));
        assert_eq!(window.page_number(), 1);
        assert!(!window.clamp(0));
    }

    #[test]
    fn test_page_size_change_resets_page() {
        let mut window = RenderWindow::new(10);
        window.go_to(2, 25);
        window.set_page_size(50);
        assert_eq!(window.page_number(), 1);
        assert_eq!(window.page_size(), 50);
    }

    #[test]
    fn test_load_more_matches_numbered_jump() {
        let items: Vec<usize> = (0..40).collect();
        let mut scrolled = RenderWindow::new(10);
        assert!(scrolled.load_more(items.len()));
        assert!(scrolled.load_more(items.len()));

        let mut jumped = RenderWindow::new(10);
        jumped.go_to(3, items.len());

        assert_eq!(scrolled, jumped);
        assert_eq!(visible_slice(&items, &scrolled), visible_slice(&items, &jumped));

        scrolled.go_to(4, items.len());
        assert!(!scrolled.load_more(items.len()));
        assert_eq!(scrolled.page_number(), 4);
    }

    #[test]
    fn test_prev_stops_at_first() {
        let mut window = RenderWindow::new(10);
        assert!(!window.prev());
        window.go_to(2, 30);
        assert!(window.prev());
        assert!(window.is_first_page());
    }

    #[test]
    fn test_page_buttons() {
        assert_eq!(page_buttons(1, 1, 2), vec![Page(1)]);
        assert_eq!(
            page_buttons(1, 4, 2),
            vec![Page(1), Page(2), Page(3), Page(4)]
        );
        assert_eq!(
            page_buttons(1, 10, 2),
            vec![Page(1), Page(2), Page(3), Ellipsis, Page(10)]
        );
        assert_eq!(
            page_buttons(6, 12, 2),
            vec![
                Page(1),
                Ellipsis,
                Page(4),
                Page(5),
                Page(6),
                Page(7),
                Page(8),
                Ellipsis,
                Page(12)
            ]
        );
        assert_eq!(
            page_buttons(4, 10, 2),
            vec![
                Page(1),
                Page(2),
                Page(3),
                Page(4),
                Page(5),
                Page(6),
                Ellipsis,
                Page(10)
            ]
        );
        assert_eq!(
            page_buttons(10, 10, 2),
            vec![Page(1), Ellipsis, Page(8), Page(9), Page(10)]
        );
    }

    #[test]
    fn test_near_bottom() {
        let metrics = ScrollMetrics {
            offset: 700,
            viewport: 200,
            content: 1000,
        };
        assert_eq!(metrics.distance_to_bottom(), 100);
        assert!(near_bottom(metrics, 200));
        let top = ScrollMetrics {
            offset: 0,
            viewport: 200,
            content: 1000,
        };
        assert!(!near_bottom(top, 200));
    }

    #[test]
    fn test_summary() {
        let mut window = RenderWindow::new(10);
        window.go_to(3, 25);
        let summary = PaginationSummary::new(&window, 5, 25, 30, 2);
        assert_eq!(summary.total_pages, 3);
        assert_eq!((summary.first_index, summary.last_index), (21, 25));
        assert!(summary.has_prev());
        assert!(!summary.has_next());

        let empty = PaginationSummary::default();
        assert_eq!(empty.total_pages, 1);
        assert_eq!((empty.first_index, empty.last_index), (0, 0));
        assert_eq!(empty.buttons, vec![Page(1)]);
    }
}
