//! Render scheduling and pagination for the live event list

mod debounce;
mod pagination;
mod scheduler;

pub use debounce::{Debounce, DEFAULT_MIN_RENDER_INTERVAL};
pub use pagination::{
    near_bottom, PageButton, RenderWindow, ScrollMetrics, DEFAULT_LOAD_MORE_ROWS,
    DEFAULT_PAGE_RADIUS, DEFAULT_PAGE_SIZE, PAGE_SIZES,
};
pub use scheduler::{RenderScheduler, RenderedPage};
