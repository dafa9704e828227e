//! Decides when the event list is repainted and with what

use std::time::Instant;

use tracing::trace;

#[cfg(test)]
use super::debounce::Phase;
use super::debounce::{Debounce, Trigger};
use super::pagination::{visible_slice, PaginationSummary, RenderWindow};
use crate::store::{AppendNotice, EventRecord, EventStore};

/// Receives the visible page on every paint
pub trait EventsView {
    fn events_changed(&mut self, visible: Vec<EventRecord>, summary: PaginationSummary);
}

/// Last painted page, kept for the UI to draw from
#[derive(Debug, Default, Clone)]
pub struct RenderedPage {
    pub rows: Vec<EventRecord>,
    pub summary: PaginationSummary,
    pub paints: u64,
}

impl EventsView for RenderedPage {
    fn events_changed(&mut self, visible: Vec<EventRecord>, summary: PaginationSummary) {
        self.rows = visible;
        self.summary = summary;
        self.paints += 1;
    }
}

/// State the paint routine reads and may correct
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub window: RenderWindow,
    pub page_radius: usize,
}

#[derive(Debug)]
pub struct RenderScheduler {
    debounce: Debounce,
    context: RenderContext,
}

impl RenderScheduler {
    pub fn new(debounce: Debounce, window: RenderWindow, page_radius: usize) -> Self {
        Self {
            debounce,
            context: RenderContext {
                window,
                page_radius,
            },
        }
    }

    pub fn window(&self) -> &RenderWindow {
        &self.context.window
    }

    #[cfg(test)]
    pub fn phase(&self) -> Phase {
        self.debounce.phase()
    }

    pub fn min_interval(&self) -> std::time::Duration {
        self.debounce.min_interval()
    }

    #[cfg(test)]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.debounce.deadline()
    }

    /// How long the host loop may sleep before the next paint is due
    pub fn time_until_paint(&self, now: Instant) -> Option<std::time::Duration> {
        self.debounce.time_until_due(now)
    }

    /// React to a store append. Kinds filtered out of view and viewers
    /// away from page 1 do not trigger a paint. Returns whether the
    /// notice was accepted.
    pub fn notify(&mut self, notice: &AppendNotice, store: &EventStore, now: Instant) -> bool {
        if !store.is_active(notice.kind) || !self.context.window.is_first_page() {
            trace!(seq = notice.seq, kind = %notice.kind, "append ignored by scheduler");
            return false;
        }
        self.request(now);
        true
    }

    /// Ask for a paint; throttled and coalesced
    pub fn request(&mut self, now: Instant) {
        if let Trigger::Scheduled(due) = self.debounce.trigger(now) {
            trace!(delay_ms = due.saturating_duration_since(now).as_millis() as u64, "paint scheduled");
        }
    }

    /// Paint if one is due. Returns whether the view was updated.
    pub fn poll(&mut self, now: Instant, store: &EventStore, view: &mut dyn EventsView) -> bool {
        if !self.debounce.fire(now) {
            return false;
        }
        paint(&mut self.context, store, view);
        self.debounce.complete(now);
        true
    }

    pub fn set_page_size(&mut self, page_size: usize, now: Instant) {
        self.context.window.set_page_size(page_size);
        self.request(now);
    }

    pub fn go_to_page(&mut self, page: usize, store: &EventStore, now: Instant) {
        self.context.window.go_to(page, store.filtered_count());
        self.request(now);
    }

    pub fn next_page(&mut self, store: &EventStore, now: Instant) -> bool {
        let moved = self.context.window.next(store.filtered_count());
        if moved {
            self.request(now);
        }
        moved
    }

    pub fn prev_page(&mut self, now: Instant) -> bool {
        let moved = self.context.window.prev();
        if moved {
            self.request(now);
        }
        moved
    }

    pub fn first_page(&mut self, store: &EventStore, now: Instant) {
        self.go_to_page(1, store, now);
    }

    pub fn last_page(&mut self, store: &EventStore, now: Instant) {
        self.go_to_page(usize::MAX, store, now);
    }

    /// Scroll-driven advance to the next page
    pub fn load_more(&mut self, store: &EventStore, now: Instant) -> bool {
        let moved = self.context.window.load_more(store.filtered_count());
        if moved {
            self.request(now);
        }
        moved
    }
}

fn paint(context: &mut RenderContext, store: &EventStore, view: &mut dyn EventsView) {
    let filtered_count = store.filtered_count();
    context.window.clamp(filtered_count);
    let visible: Vec<EventRecord> = visible_slice(store.filtered(), &context.window)
        .into_iter()
        .cloned()
        .collect();
    let summary = PaginationSummary::new(
        &context.window,
        visible.len(),
        filtered_count,
        store.len(),
        context.page_radius,
    );
    trace!(
        page = summary.page,
        rows = visible.len(),
        filtered = filtered_count,
        "paint"
    );
    view.events_changed(visible, summary);
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::domain::event::EventKind;
    use crate::store::test_event;

    const T: Duration = Duration::from_millis(1000);

    fn scheduler(page_size: usize) -> RenderScheduler {
        RenderScheduler::new(Debounce::new(T), RenderWindow::new(page_size), 2)
    }

    #[test]
    fn test_burst_of_appends_paints_once_per_interval() {
        let start = Instant::now();
        let mut store = EventStore::new(1000);
        let mut sched = scheduler(25);
        let mut page = RenderedPage::default();

        let mut now = start;
        for i in 0..200u64 {
            let notice = store.append(test_event(EventKind::Erc20Transfer, i));
            sched.notify(&notice, &store, now);
            sched.poll(now, &store, &mut page);
            now += Duration::from_millis(10);
        }
        // 2s of appends: paint at 0ms, 1000ms and the trailing one at 2000ms
        assert_eq!(page.paints, 2);
        let deadline = sched.next_deadline().expect("trailing paint scheduled");
        assert!(sched.poll(deadline, &store, &mut page));
        assert_eq!(page.paints, 3);

        assert_eq!(page.rows.len(), 25);
        assert_eq!(page.rows[0].event.log_index, 199);
        assert_eq!(page.summary.filtered_count, 200);
        assert_eq!(page.summary.total_pages, 8);
    }

    #[test]
    fn test_inactive_kind_does_not_schedule() {
        let now = Instant::now();
        let mut store = EventStore::new(100);
        store.set_active(EventKind::Erc721Transfer, false);
        let mut sched = scheduler(10);

        let notice = store.append(test_event(EventKind::Erc721Transfer, 0));
        assert!(!sched.notify(&notice, &store, now));
        assert_eq!(sched.phase(), Phase::Idle);

        let notice = store.append(test_event(EventKind::Erc20Transfer, 1));
        assert!(sched.notify(&notice, &store, now));
        assert!(sched.next_deadline().is_some());
    }

    #[test]
    fn test_append_ignored_away_from_first_page() {
        let start = Instant::now();
        let mut store = EventStore::new(100);
        for i in 0..30 {
            store.append(test_event(EventKind::Erc20Transfer, i));
        }
        let mut sched = scheduler(10);
        let mut page = RenderedPage::default();

        assert!(sched.next_page(&store, start));
        assert!(sched.poll(start, &store, &mut page));
        assert_eq!(page.summary.page, 2);
        let shown: Vec<u64> = page.rows.iter().map(|r| r.event.log_index).collect();

        let later = start + T * 2;
        let notice = store.append(test_event(EventKind::Erc20Transfer, 99));
        assert!(!sched.notify(&notice, &store, later));
        assert!(!sched.poll(later, &store, &mut page));
        let still: Vec<u64> = page.rows.iter().map(|r| r.event.log_index).collect();
        assert_eq!(shown, still);
    }

    #[test]
    fn test_paint_clamps_page_after_filter() {
        let start = Instant::now();
        let mut store = EventStore::new(100);
        for i in 0..25 {
            let kind = if i < 5 {
                EventKind::Erc20Transfer
            } else {
                EventKind::Erc721Transfer
            };
            store.append(test_event(kind, i));
        }
        let mut sched = scheduler(10);
        let mut page = RenderedPage::default();
        sched.go_to_page(3, &store, start);
        assert!(sched.poll(start, &store, &mut page));
        assert_eq!(page.rows.len(), 5);

        store.toggle(EventKind::Erc721Transfer);
        let later = start + T;
        sched.request(later);
        assert!(sched.poll(later, &store, &mut page));
        assert_eq!(page.summary.page, 1);
        assert_eq!(page.summary.total_pages, 1);
        assert_eq!(page.rows.len(), 5);
        assert_eq!(sched.window().page_number(), 1);
    }

    #[test]
    fn test_empty_store_paints_empty_page() {
        let now = Instant::now();
        let store = EventStore::new(10);
        let mut sched = scheduler(10);
        let mut page = RenderedPage::default();
        sched.request(now);
        assert!(sched.poll(now, &store, &mut page));
        assert!(page.rows.is_empty());
        assert_eq!(page.summary.total_pages, 1);
        assert_eq!(page.summary.first_index, 0);
    }

    #[test]
    fn test_page_size_change_repaints_from_first_page() {
        let start = Instant::now();
        let mut store = EventStore::new(100);
        for i in 0..60 {
            store.append(test_event(EventKind::Erc20Transfer, i));
        }
        let mut sched = scheduler(10);
        let mut page = RenderedPage::default();
        sched.last_page(&store, start);
        assert!(sched.poll(start, &store, &mut page));
        assert_eq!(page.summary.page, 6);

        let later = start + T;
        sched.set_page_size(50, later);
        assert!(sched.poll(later, &store, &mut page));
        assert_eq!(page.summary.page, 1);
        assert_eq!(page.rows.len(), 50);
    }
}
