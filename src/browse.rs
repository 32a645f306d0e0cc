//! Query helpers for presenting a dataset.
//!
//! Everything here is a pure function of a [`Dataset`] and the caller's
//! selection: month index, search, pagination and the short date and
//! summary strings used by list views.

use std::sync::Arc;

use serde::Serialize;

use crate::dataset::{Dataset, Zone};
use crate::models::Post;

/// Placeholder shown for posts without text.
pub const EMPTY_TEXT: &str = "(no text)";

/// Pages shown in full before the page list is abbreviated.
const FULL_PAGE_LIST: usize = 9;
/// Pages shown on each side of the current page in an abbreviated list.
const PAGE_WINDOW: usize = 2;

/// The year and month being browsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Selection {
    pub year: i32,
    pub month: u32,
}

impl Selection {
    /// Newest year present, and its newest month.
    pub fn newest(dataset: &Dataset) -> Option<Self> {
        dataset
            .default_selection()
            .map(|(year, month)| Self { year, month })
    }

    /// An explicit year/month, falling back to the newest for missing parts.
    pub fn resolve(dataset: &Dataset, year: Option<i32>, month: Option<u32>) -> Option<Self> {
        match (year, month) {
            (Some(year), Some(month)) => Some(Self { year, month }),
            (Some(year), None) => dataset
                .groups
                .get(&year)
                .and_then(|months| months.keys().next_back())
                .map(|&month| Self { year, month }),
            (None, _) => Self::newest(dataset),
        }
    }

    pub fn label(&self) -> String {
        format!("{}/{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthCount {
    pub month: u32,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct YearIndex {
    pub year: i32,
    pub months: Vec<MonthCount>,
}

/// Years newest first, each with its months newest first.
pub fn month_index(dataset: &Dataset) -> Vec<YearIndex> {
    dataset
        .groups
        .iter()
        .rev()
        .map(|(&year, months)| YearIndex {
            year,
            months: months
                .iter()
                .rev()
                .map(|(&month, posts)| MonthCount {
                    month,
                    count: posts.len(),
                })
                .collect(),
        })
        .collect()
}

/// Case-insensitive substring filter over post text.
pub fn search<'a>(posts: &'a [Arc<Post>], term: &str) -> Vec<&'a Arc<Post>> {
    let term = term.trim().to_lowercase();
    if term.is_empty() {
        return posts.iter().collect();
    }
    posts
        .iter()
        .filter(|p| p.text.to_lowercase().contains(&term))
        .collect()
}

/// One page of a filtered list.
#[derive(Debug, Clone)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    /// Clamped, 1-based.
    pub page: usize,
    pub total_pages: usize,
    pub total_items: usize,
}

impl<T> Page<'_, T> {
    pub fn has_prev(&self) -> bool {
        self.page > 1
    }

    pub fn has_next(&self) -> bool {
        self.page < self.total_pages
    }
}

pub fn total_pages(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1)).max(1)
}

/// Slice out `page` (1-based), clamping it to the valid range.
pub fn paginate<T>(items: &[T], page: usize, page_size: usize) -> Page<'_, T> {
    let page_size = page_size.max(1);
    let total_pages = total_pages(items.len(), page_size);
    let page = page.clamp(1, total_pages);
    let start = ((page - 1) * page_size).min(items.len());
    let end = (start + page_size).min(items.len());
    Page {
        items: &items[start..end],
        page,
        total_pages,
        total_items: items.len(),
    }
}

/// An entry in a page list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageMarker {
    Number(usize),
    Gap,
}

impl Serialize for PageMarker {
    fn serialize<S: serde::Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            PageMarker::Number(n) => s.serialize_u64(*n as u64),
            PageMarker::Gap => s.serialize_str("..."),
        }
    }
}

/// Page numbers for navigation, abbreviated with gaps past nine pages.
pub fn page_numbers(total_pages: usize, current: usize) -> Vec<PageMarker> {
    if total_pages <= FULL_PAGE_LIST {
        return (1..=total_pages).map(PageMarker::Number).collect();
    }

    let mut pages = vec![1];
    let low = current.saturating_sub(PAGE_WINDOW).max(2);
    let high = (current + PAGE_WINDOW).min(total_pages - 1);
    pages.extend(low..=high);
    pages.push(total_pages);

    let mut out = Vec::with_capacity(pages.len() + 2);
    for (i, &n) in pages.iter().enumerate() {
        out.push(PageMarker::Number(n));
        if let Some(&next) = pages.get(i + 1) {
            if next != n + 1 {
                out.push(PageMarker::Gap);
            }
        }
    }
    out
}

/// Collapse whitespace and keep the first `len` characters.
pub fn summarize(text: &str, len: usize) -> String {
    let normalized = text.split_whitespace().collect::<Vec<_>>().join(" ");
    normalized.chars().take(len).collect()
}

/// Summary of a post's text, or the placeholder when it has none.
pub fn post_summary(post: &Post, len: usize) -> String {
    if post.text.is_empty() {
        summarize(EMPTY_TEXT, len)
    } else {
        summarize(&post.text, len)
    }
}

/// `YYYY/MM/DD HH:MM`
pub fn format_datetime(zone: Zone, millis: i64) -> String {
    zone.wall_clock(millis).format("%Y/%m/%d %H:%M").to_string()
}

/// `MM/DD`
pub fn format_month_day(zone: Zone, millis: i64) -> String {
    zone.wall_clock(millis).format("%m/%d").to_string()
}

/// `HH:MM`
pub fn format_time(zone: Zone, millis: i64) -> String {
    zone.wall_clock(millis).format("%H:%M").to_string()
}
