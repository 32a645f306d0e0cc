//! Deduplication, ordering and calendar grouping of built posts.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Local, NaiveDateTime, Utc};

use crate::config::BrowseConfig;
use crate::models::Post;
use crate::report::ReportBuilder;

/// Wall-clock zone used for month grouping and date display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Zone {
    #[default]
    Local,
    Utc,
}

impl Zone {
    pub fn from_config(browse: &BrowseConfig) -> Self {
        if browse.use_utc() {
            Zone::Utc
        } else {
            Zone::Local
        }
    }

    /// Wall-clock time of a millisecond timestamp in this zone.
    ///
    /// Instants past the calendar range clamp to its nearest end, so ordering
    /// by `millis` and grouping by wall clock never disagree.
    pub fn wall_clock(&self, millis: i64) -> NaiveDateTime {
        let utc = DateTime::<Utc>::from_timestamp_millis(millis).unwrap_or(if millis < 0 {
            DateTime::<Utc>::MIN_UTC
        } else {
            DateTime::<Utc>::MAX_UTC
        });
        match self {
            Zone::Utc => utc.naive_utc(),
            Zone::Local => utc.with_timezone(&Local).naive_local(),
        }
    }

    pub fn year_month(&self, millis: i64) -> (i32, u32) {
        let wall = self.wall_clock(millis);
        (wall.year(), wall.month())
    }
}

/// Posts grouped by calendar year and month.
pub type Groups = BTreeMap<i32, BTreeMap<u32, Vec<Arc<Post>>>>;

/// The deduplicated, ordered and grouped posts of one run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    /// All posts, newest first.
    pub posts: Vec<Arc<Post>>,
    pub by_id: HashMap<String, Arc<Post>>,
    pub groups: Groups,
    pub zone: Zone,
}

impl Dataset {
    /// Deduplicate, sort and group `posts`, counting dropped duplicates into
    /// `report`. Input order is construction order and decides which copy
    /// of a duplicate survives.
    pub fn build(posts: Vec<Post>, zone: Zone, report: &mut ReportBuilder) -> Self {
        let mut posts = deduplicate(posts, report);
        sort_newest_first(&mut posts);

        let posts: Vec<Arc<Post>> = posts.into_iter().map(Arc::new).collect();
        let by_id = posts
            .iter()
            .map(|p| (p.id.clone(), Arc::clone(p)))
            .collect();
        let groups = group_posts(&posts, zone);

        Self {
            posts,
            by_id,
            groups,
            zone,
        }
    }

    pub fn len(&self) -> usize {
        self.posts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.posts.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Post>> {
        self.by_id.get(id)
    }

    pub fn month(&self, year: i32, month: u32) -> &[Arc<Post>] {
        self.groups
            .get(&year)
            .and_then(|months| months.get(&month))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Newest year present and its newest month.
    pub fn default_selection(&self) -> Option<(i32, u32)> {
        let (year, months) = self.groups.iter().next_back()?;
        let month = months.keys().next_back()?;
        Some((*year, *month))
    }

    /// Sum of every month group's size; equals `len()`.
    pub fn total_grouped(&self) -> usize {
        self.groups
            .values()
            .flat_map(|months| months.values())
            .map(Vec::len)
            .sum()
    }
}

/// Keep the first post for each id.
pub fn deduplicate(posts: Vec<Post>, report: &mut ReportBuilder) -> Vec<Post> {
    let mut seen = HashSet::with_capacity(posts.len());
    let mut unique = Vec::with_capacity(posts.len());
    for post in posts {
        if seen.insert(post.id.clone()) {
            unique.push(post);
        } else {
            report.duplicate();
        }
    }
    unique
}

/// Stable descending sort by `created_at`.
pub fn sort_newest_first<P: std::borrow::Borrow<Post>>(posts: &mut [P]) {
    posts.sort_by(|a, b| b.borrow().created_at.cmp(&a.borrow().created_at));
}

pub fn group_posts(posts: &[Arc<Post>], zone: Zone) -> Groups {
    let mut groups = Groups::new();
    for post in posts {
        let (year, month) = zone.year_month(post.created_at);
        groups
            .entry(year)
            .or_default()
            .entry(month)
            .or_default()
            .push(Arc::clone(post));
    }
    for months in groups.values_mut() {
        for list in months.values_mut() {
            sort_newest_first(list);
        }
    }
    groups
}
