use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::config::{normalize_explorer_prefix, Config};
use crate::domain::event::{BlockStats, DecodedEvent, EventKind};
use crate::render::{
    near_bottom, Debounce, RenderScheduler, RenderWindow, RenderedPage, ScrollMetrics,
};
use crate::store::{EventRecord, EventStore};

/// Blocks kept for the header sparkline
const SPARKLINE_BLOCKS: usize = 120;
/// Rows moved per mouse wheel notch
const WHEEL_ROWS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusLevel {
    Info,
    Warn,
    Error,
}

#[derive(Debug, Clone)]
pub struct StatusMessage {
    pub text: String,
    pub level: StatusLevel,
    pub since: Instant,
}

#[derive(Debug, Clone)]
pub struct RpcEndpointOption {
    pub label: String,
    pub display: String,
}

/// Latest block seen by the worker
#[derive(Debug, Clone, Copy)]
pub struct HeadInfo {
    pub number: u64,
    /// Block timestamp, unix seconds
    pub timestamp: u64,
    pub received_at: Instant,
}

/// Running totals across all processed blocks
#[derive(Debug, Default, Clone, Copy)]
pub struct FeedTotals {
    pub blocks: u64,
    pub logs: u64,
    pub decoded: u64,
    pub dropped: u64,
}

#[derive(Debug)]
pub struct App {
    pub store: EventStore,
    pub scheduler: RenderScheduler,
    /// What the events table shows; only updated by scheduler paints
    pub page: RenderedPage,
    pub page_sizes: Vec<usize>,
    pub load_more_rows: usize,
    pub explorer_prefix: Option<String>,
    /// Selected row within `page.rows`
    pub selected: usize,
    /// First visible row of the events table
    pub list_offset: usize,
    /// Visible row count of the events table, set while drawing
    pub list_viewport: usize,
    pub head: Option<HeadInfo>,
    pub chain_id: Option<u64>,
    pub connected: bool,
    pub block_event_counts: Vec<u64>,
    pub totals: FeedTotals,
    pub rpc_endpoint: String,
    pub rpc_endpoints: Vec<RpcEndpointOption>,
    pub rpc_endpoint_index: usize,
    pub status: Option<StatusMessage>,
    pub pending_endpoint_switch: Option<usize>,
    pub help_open: bool,
    pub should_quit: bool,
}

impl App {
    pub fn new(config: &Config) -> Self {
        let display = &config.display;
        let mut store = EventStore::new(display.max_stored_events);
        let (enabled, unknown) = display.enabled_kinds();
        for kind in EventKind::ALL {
            store.set_active(kind, enabled.contains(&kind));
        }

        let scheduler = RenderScheduler::new(
            Debounce::new(display.min_render_interval()),
            RenderWindow::new(display.page_size),
            display.page_radius,
        );

        let mut app = Self {
            store,
            scheduler,
            page: RenderedPage::default(),
            page_sizes: display.page_sizes(),
            load_more_rows: display.load_more_rows.max(1),
            explorer_prefix: config
                .explorer_prefix
                .as_deref()
                .map(normalize_explorer_prefix)
                .filter(|prefix| !prefix.is_empty()),
            selected: 0,
            list_offset: 0,
            list_viewport: 0,
            head: None,
            chain_id: None,
            connected: false,
            block_event_counts: Vec::new(),
            totals: FeedTotals::default(),
            rpc_endpoint: "--".to_string(),
            rpc_endpoints: Vec::new(),
            rpc_endpoint_index: 0,
            status: None,
            pending_endpoint_switch: None,
            help_open: false,
            should_quit: false,
        };
        if !unknown.is_empty() {
            app.set_status(
                format!("Unknown event kinds in config: {}", unknown.join(", ")),
                StatusLevel::Warn,
            );
        }
        app.scheduler.request(Instant::now());
        app
    }

    pub fn set_status(&mut self, text: impl Into<String>, level: StatusLevel) {
        self.status = Some(StatusMessage {
            text: text.into(),
            level,
            since: Instant::now(),
        });
    }

    pub fn status_text(&self) -> Option<(&str, StatusLevel)> {
        self.status
            .as_ref()
            .map(|status| (status.text.as_str(), status.level))
    }

    /// Expire the status line and run a paint if one is due
    pub fn on_tick(&mut self, now: Instant) {
        if let Some(status) = self.status.as_ref() {
            let ttl = match status.level {
                StatusLevel::Error => Duration::from_secs(8),
                _ => Duration::from_secs(3),
            };
            if now.saturating_duration_since(status.since) > ttl {
                self.status = None;
            }
        }
        if self.scheduler.poll(now, &self.store, &mut self.page) {
            self.clamp_selection();
        }
    }

    /// How long the main loop may block before the next paint is due
    pub fn time_until_paint(&self, now: Instant) -> Option<Duration> {
        self.scheduler.time_until_paint(now)
    }

    pub fn seconds_since_block(&self, now: Instant) -> Option<u64> {
        self.head
            .map(|head| now.saturating_duration_since(head.received_at).as_secs())
    }

    pub fn apply_connected(&mut self, endpoint: String, chain_id: Option<u64>, head: u64) {
        let chain_changed = self.chain_id.is_some() && self.chain_id != chain_id;
        self.connected = true;
        self.rpc_endpoint = endpoint;
        if let Some(index) = self
            .rpc_endpoints
            .iter()
            .position(|candidate| candidate.display.eq_ignore_ascii_case(&self.rpc_endpoint))
        {
            self.rpc_endpoint_index = index;
        }
        if chain_changed {
            info!(?chain_id, "chain changed, clearing events");
            self.store.clear();
            self.block_event_counts.clear();
            self.totals = FeedTotals::default();
            self.scheduler.first_page(&self.store, Instant::now());
        }
        self.chain_id = chain_id;
        let chain = chain_id.map(|id| format!(" (chain {id})")).unwrap_or_default();
        self.set_status(
            format!("Connected{chain}, following from #{head}"),
            StatusLevel::Info,
        );
    }

    pub fn apply_header(&mut self, number: u64, timestamp: u64) {
        self.head = Some(HeadInfo {
            number,
            timestamp,
            received_at: Instant::now(),
        });
    }

    /// Append a block's events in order and notify the scheduler for each
    pub fn ingest_events(&mut self, block: u64, events: Vec<DecodedEvent>, stats: BlockStats) {
        self.ingest_events_at(block, events, stats, Instant::now());
    }

    fn ingest_events_at(
        &mut self,
        block: u64,
        events: Vec<DecodedEvent>,
        stats: BlockStats,
        now: Instant,
    ) {
        if self.block_event_counts.len() >= SPARKLINE_BLOCKS {
            self.block_event_counts.remove(0);
        }
        self.block_event_counts.push(events.len() as u64);
        self.totals.blocks += 1;
        self.totals.logs += stats.logs as u64;
        self.totals.decoded += stats.decoded as u64;
        self.totals.dropped += stats.dropped as u64;

        let mut accepted = 0usize;
        let mut evicted = 0usize;
        for event in events {
            let notice = self.store.append(event);
            evicted += usize::from(notice.evicted);
            if self.scheduler.notify(&notice, &self.store, now) {
                accepted += 1;
            }
        }
        debug!(block, stored = self.store.len(), accepted, evicted, "events ingested");
    }

    pub fn apply_rpc_error(&mut self, message: String) {
        warn!(%message, "worker error");
        self.connected = false;
        self.set_status(message, StatusLevel::Error);
    }

    pub fn toggle_kind(&mut self, kind: EventKind) {
        let active = self.store.toggle(kind);
        self.scheduler.request(Instant::now());
        let state = if active { "shown" } else { "hidden" };
        self.set_status(format!("{} {state}", kind.label()), StatusLevel::Info);
    }

    /// Toggle by position in the toggle bar (0-based)
    pub fn toggle_kind_at(&mut self, index: usize) {
        if let Some(kind) = EventKind::ALL.get(index).copied() {
            self.toggle_kind(kind);
        }
    }

    pub fn next_page(&mut self) {
        if self.scheduler.next_page(&self.store, Instant::now()) {
            self.reset_selection();
        }
    }

    pub fn prev_page(&mut self) {
        if self.scheduler.prev_page(Instant::now()) {
            self.reset_selection();
        }
    }

    pub fn first_page(&mut self) {
        self.scheduler.first_page(&self.store, Instant::now());
        self.reset_selection();
    }

    pub fn last_page(&mut self) {
        self.scheduler.last_page(&self.store, Instant::now());
        self.reset_selection();
    }

    pub fn cycle_page_size(&mut self, forward: bool) {
        if self.page_sizes.is_empty() {
            return;
        }
        let current = self.scheduler.window().page_size();
        let len = self.page_sizes.len();
        let index = self.page_sizes.iter().position(|size| *size == current);
        let next = match (index, forward) {
            (Some(i), true) => (i + 1) % len,
            (Some(i), false) => (i + len - 1) % len,
            (None, _) => 0,
        };
        let size = self.page_sizes[next];
        self.scheduler.set_page_size(size, Instant::now());
        self.reset_selection();
        self.set_status(format!("Page size {size}"), StatusLevel::Info);
    }

    pub fn move_selection_up(&mut self) {
        self.selected = self.selected.saturating_sub(1);
        self.keep_selection_visible();
    }

    /// Move down one row; pressing down on the last row loads the next page
    pub fn move_selection_down(&mut self) {
        let len = self.page.rows.len();
        if self.selected + 1 < len {
            self.selected += 1;
            self.keep_selection_visible();
        } else {
            self.load_more();
        }
    }

    pub fn scroll_up(&mut self) {
        self.list_offset = self.list_offset.saturating_sub(WHEEL_ROWS);
        self.selected = self.selected.clamp(
            self.list_offset,
            (self.list_offset + self.list_viewport.max(1)).saturating_sub(1),
        );
        self.clamp_selection();
    }

    /// Wheel scroll; loads the next page once the view is near the bottom
    pub fn scroll_down(&mut self) {
        let len = self.page.rows.len();
        let max_offset = len.saturating_sub(self.list_viewport);
        self.list_offset = (self.list_offset + WHEEL_ROWS).min(max_offset);
        self.selected = self.selected.max(self.list_offset).min(len.saturating_sub(1));

        let metrics = ScrollMetrics {
            offset: self.list_offset,
            viewport: self.list_viewport,
            content: len,
        };
        if near_bottom(metrics, self.load_more_rows) {
            self.load_more();
        }
    }

    pub fn selected_record(&self) -> Option<&EventRecord> {
        self.page.rows.get(self.selected)
    }

    pub fn explorer_link(&self, record: &EventRecord) -> Option<String> {
        self.explorer_prefix
            .as_ref()
            .map(|prefix| format!("{prefix}/tx/{}", record.event.transaction_hash))
    }

    pub fn cycle_rpc_endpoint(&mut self, forward: bool) {
        if self.rpc_endpoints.is_empty() {
            self.set_status("No RPC endpoints configured", StatusLevel::Warn);
            return;
        }
        let len = self.rpc_endpoints.len();
        let next = if forward {
            (self.rpc_endpoint_index + 1) % len
        } else {
            (self.rpc_endpoint_index + len - 1) % len
        };
        self.rpc_endpoint_index = next;
        self.pending_endpoint_switch = Some(next);
        let label = self
            .rpc_endpoints
            .get(next)
            .map(|endpoint| endpoint.label.as_str())
            .unwrap_or("--");
        self.set_status(format!("Switching RPC endpoint: {label}"), StatusLevel::Info);
    }

    pub fn take_endpoint_switch_request(&mut self) -> Option<usize> {
        self.pending_endpoint_switch.take()
    }

    /// Advance one page, but only once the current page has been painted
    fn load_more(&mut self) {
        if self.page.summary.page != self.scheduler.window().page_number() {
            return;
        }
        if self.scheduler.load_more(&self.store, Instant::now()) {
            self.reset_selection();
        }
    }

    fn reset_selection(&mut self) {
        self.selected = 0;
        self.list_offset = 0;
    }

    fn keep_selection_visible(&mut self) {
        let viewport = self.list_viewport.max(1);
        if self.selected < self.list_offset {
            self.list_offset = self.selected;
        } else if self.selected >= self.list_offset + viewport {
            self.list_offset = self.selected + 1 - viewport;
        }
    }

    fn clamp_selection(&mut self) {
        let len = self.page.rows.len();
        self.selected = self.selected.min(len.saturating_sub(1));
        self.list_offset = self.list_offset.min(len.saturating_sub(1));
        self.keep_selection_visible();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_event;

    fn app_with(page_size: usize) -> App {
        let mut config = Config::default();
        config.display.page_size = page_size;
        config.display.min_render_interval_ms = 1000;
        config.explorer_prefix = Some("https://etherscan.io/".into());
        App::new(&config)
    }

    fn stats(decoded: usize) -> BlockStats {
        BlockStats {
            logs: decoded,
            matched: decoded,
            decoded,
            ..BlockStats::default()
        }
    }

    #[test]
    fn test_startup_paints_empty_page() {
        let mut app = app_with(10);
        app.on_tick(Instant::now());
        assert_eq!(app.page.paints, 1);
        assert!(app.page.rows.is_empty());
        assert_eq!(app.page.summary.total_pages, 1);
    }

    #[test]
    fn test_events_reach_view_only_through_scheduler() {
        let mut app = app_with(10);
        let start = Instant::now();
        app.on_tick(start);

        let events: Vec<_> = (0..3)
            .map(|i| test_event(EventKind::Erc20Transfer, i))
            .collect();
        app.ingest_events_at(7, events, stats(3), start);
        assert!(app.page.rows.is_empty());

        app.on_tick(start + Duration::from_millis(500));
        assert!(app.page.rows.is_empty());

        app.on_tick(start + Duration::from_millis(1000));
        assert_eq!(app.page.rows.len(), 3);
        assert_eq!(app.page.rows[0].event.log_index, 2);
        assert_eq!(app.block_event_counts, vec![3]);
        assert_eq!(app.totals.decoded, 3);
    }

    #[test]
    fn test_explorer_link() {
        let app = app_with(10);
        let record = EventRecord {
            seq: 0,
            event: test_event(EventKind::Erc721Mint, 0),
        };
        let link = app.explorer_link(&record).unwrap();
        assert!(link.starts_with("https://etherscan.io/tx/0xaaaa"));
    }

    #[test]
    fn test_cycle_page_size() {
        let mut app = app_with(25);
        assert_eq!(app.page_sizes, vec![10, 25, 50, 100]);
        app.cycle_page_size(true);
        assert_eq!(app.scheduler.window().page_size(), 50);
        app.cycle_page_size(false);
        app.cycle_page_size(false);
        assert_eq!(app.scheduler.window().page_size(), 10);
    }

    #[test]
    fn test_down_on_last_row_loads_next_page() {
        let mut app = app_with(10);
        let start = Instant::now();
        app.list_viewport = 20;
        let events: Vec<_> = (0..15)
            .map(|i| test_event(EventKind::Erc20Transfer, i))
            .collect();
        app.ingest_events_at(1, events, stats(15), start);
        app.on_tick(start);
        assert_eq!(app.page.rows.len(), 10);

        for _ in 0..9 {
            app.move_selection_down();
        }
        assert_eq!(app.selected, 9);
        assert_eq!(app.scheduler.window().page_number(), 1);

        app.move_selection_down();
        assert_eq!(app.scheduler.window().page_number(), 2);
        assert_eq!(app.selected, 0);

        app.on_tick(start + Duration::from_secs(1));
        assert_eq!(app.page.rows.len(), 5);
    }

    #[test]
    fn test_scrolling_waits_for_loaded_page_to_paint() {
        let mut app = app_with(10);
        let start = Instant::now();
        app.list_viewport = 20;
        let events: Vec<_> = (0..40)
            .map(|i| test_event(EventKind::Erc20Transfer, i))
            .collect();
        app.ingest_events_at(1, events, stats(40), start);
        app.on_tick(start);
        assert_eq!(app.page.summary.page, 1);

        for _ in 0..3 {
            app.scroll_down();
        }
        assert_eq!(app.scheduler.window().page_number(), 2);

        app.on_tick(start + Duration::from_secs(1));
        assert_eq!(app.page.summary.page, 2);

        app.scroll_down();
        assert_eq!(app.scheduler.window().page_number(), 3);
    }

    #[test]
    fn test_toggle_kind_repaints_filtered() {
        let mut app = app_with(10);
        let start = Instant::now();
        let events = vec![
            test_event(EventKind::Erc20Transfer, 0),
            test_event(EventKind::Erc721Transfer, 1),
        ];
        app.ingest_events_at(1, events, stats(2), start);
        app.on_tick(start);
        assert_eq!(app.page.rows.len(), 2);

        app.toggle_kind_at(1);
        assert!(!app.store.is_active(EventKind::Erc721Transfer));
        app.on_tick(start + Duration::from_secs(2));
        assert_eq!(app.page.rows.len(), 1);
        assert_eq!(app.page.summary.stored_count, 2);
    }
}
