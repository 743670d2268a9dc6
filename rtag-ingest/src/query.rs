//! Tag and time-range queries over replay records
//!
//! A [`ReplayQuery`] is evaluated as a plain predicate ([`ReplayQuery::matches`]).
//! The store narrows candidates by timestamp in SQL and applies the tag
//! predicate in memory.

use rtag_common::Replay;
use std::collections::{HashMap, HashSet};

/// How the include set is matched
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum MatchMode {
    /// Replay must carry every include tag
    #[default]
    All,
    /// Replay must carry at least one include tag
    Any,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayQuery {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub match_mode: MatchMode,
    pub start_timestamp: Option<i64>,
    pub end_timestamp: Option<i64>,
    /// Candidate digests; `None` means every stored replay
    pub restrict_to: Option<HashSet<String>>,
}

impl ReplayQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn include<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn exclude<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(tags.into_iter().map(Into::into));
        self
    }

    pub fn match_any(mut self) -> Self {
        self.match_mode = MatchMode::Any;
        self
    }

    /// Inclusive timestamp range; only applied when both ends are set
    pub fn between(mut self, start: i64, end: i64) -> Self {
        self.start_timestamp = Some(start);
        self.end_timestamp = Some(end);
        self
    }

    /// Restrict results to the given digests (intersected with any earlier
    /// restriction)
    pub fn restrict_to<I, S>(mut self, digests: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let digests: HashSet<String> = digests.into_iter().map(Into::into).collect();
        self.restrict_to = Some(match self.restrict_to.take() {
            Some(existing) => existing.intersection(&digests).cloned().collect(),
            None => digests,
        });
        self
    }

    /// The inclusive range, when both ends are present
    pub fn time_range(&self) -> Option<(i64, i64)> {
        self.start_timestamp.zip(self.end_timestamp)
    }

    pub fn matches(&self, replay: &Replay) -> bool {
        if replay.tags.is_empty() {
            return false;
        }

        if let Some(candidates) = &self.restrict_to {
            if !candidates.contains(&replay.digest) {
                return false;
            }
        }

        if !self.include.is_empty() {
            let included = match self.match_mode {
                MatchMode::All => replay.tags.contains_all(&self.include),
                MatchMode::Any => replay.tags.contains_any(&self.include),
            };
            if !included {
                return false;
            }
        }

        if !self.exclude.is_empty() && replay.tags.contains_any(&self.exclude) {
            return false;
        }

        match self.time_range() {
            Some((start, end)) => (start..=end).contains(&replay.timestamp),
            None => true,
        }
    }
}

/// Count how many `replays` carry each tag, most frequent first
///
/// Tags in `ignore` are left out. Equal counts are ordered by tag so the
/// table is stable between runs.
pub fn tag_frequency_table<'a, I>(replays: I, ignore: &[String]) -> Vec<(String, usize)>
where
    I: IntoIterator<Item = &'a Replay>,
{
    let ignore: HashSet<&str> = ignore.iter().map(String::as_str).collect();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for replay in replays {
        for tag in replay.tags.iter() {
            if !ignore.contains(tag) {
                *counts.entry(tag).or_insert(0) += 1;
            }
        }
    }

    let mut table: Vec<(String, usize)> = counts
        .into_iter()
        .map(|(tag, count)| (tag.to_string(), count))
        .collect();
    table.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    table
}
