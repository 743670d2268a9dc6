//! Tag namespaces and the ordered tag set
//!
//! Tags are plain strings. Derived tags carry one of three reserved
//! namespace prefixes (`player:`, `opponent:`, `game:`); user tags are
//! unprefixed and never owned by a generator.
//!
//! [`TagSet`] keeps insertion order (newest derived tags first, user tags at
//! the tail) and rejects duplicates through a membership index.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Reserved tag namespace
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Namespace {
    /// Tags describing the player's side
    Player,
    /// Tags describing the opponent's side
    Opponent,
    /// Tags describing the whole game
    Game,
}

impl Namespace {
    pub const ALL: [Namespace; 3] = [Namespace::Player, Namespace::Opponent, Namespace::Game];

    /// Prefix including the trailing separator
    pub fn prefix(self) -> &'static str {
        match self {
            Namespace::Player => "player:",
            Namespace::Opponent => "opponent:",
            Namespace::Game => "game:",
        }
    }

    /// Build a tag in this namespace
    pub fn tag(self, value: &str) -> String {
        format!("{}{}", self.prefix(), value)
    }

    /// Namespace of a tag, or `None` for unprefixed user tags
    pub fn of(tag: &str) -> Option<Namespace> {
        Self::ALL.into_iter().find(|ns| tag.starts_with(ns.prefix()))
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches(':'))
    }
}

pub fn player_tag(value: &str) -> String {
    Namespace::Player.tag(value)
}

pub fn opponent_tag(value: &str) -> String {
    Namespace::Opponent.tag(value)
}

pub fn game_tag(value: &str) -> String {
    Namespace::Game.tag(value)
}

/// Ordered, deduplicated sequence of tags
///
/// Serializes as a plain JSON array.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct TagSet {
    order: Vec<String>,
    index: HashSet<String>,
}

impl TagSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag at the tail. Returns `false` if it was already present.
    pub fn push(&mut self, tag: impl Into<String>) -> bool {
        let tag = tag.into();
        if self.index.contains(&tag) {
            return false;
        }
        self.index.insert(tag.clone());
        self.order.push(tag);
        true
    }

    /// Prepend `tags` in their given order, ahead of the current contents.
    ///
    /// Duplicates (within `tags`, or already present) keep their first-seen
    /// position in the resulting sequence.
    pub fn prepend_all<I, S>(&mut self, tags: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let existing = std::mem::take(&mut self.order);
        self.index.clear();
        for tag in tags {
            self.push(tag);
        }
        for tag in existing {
            self.push(tag);
        }
    }

    /// Remove a tag. Returns `true` if it was present.
    pub fn remove(&mut self, tag: &str) -> bool {
        if !self.index.remove(tag) {
            return false;
        }
        self.order.retain(|t| t != tag);
        true
    }

    /// Keep only tags for which `keep` returns true
    pub fn retain<F>(&mut self, mut keep: F)
    where
        F: FnMut(&str) -> bool,
    {
        let index = &mut self.index;
        self.order.retain(|t| {
            let kept = keep(t);
            if !kept {
                index.remove(t);
            }
            kept
        });
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.index.contains(tag)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    /// True if every tag in `tags` is present
    pub fn contains_all<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter().all(|t| self.index.contains(t))
    }

    /// True if at least one tag in `tags` is present
    pub fn contains_any<'a, I>(&self, tags: I) -> bool
    where
        I: IntoIterator<Item = &'a String>,
    {
        tags.into_iter().any(|t| self.index.contains(t))
    }
}

impl PartialEq for TagSet {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order
    }
}

impl Eq for TagSet {}

impl From<Vec<String>> for TagSet {
    fn from(tags: Vec<String>) -> Self {
        tags.into_iter().collect()
    }
}

impl From<TagSet> for Vec<String> {
    fn from(tags: TagSet) -> Self {
        tags.order
    }
}

impl<S: Into<String>> FromIterator<S> for TagSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = TagSet::new();
        for tag in iter {
            set.push(tag);
        }
        set
    }
}

impl<S: Into<String>> Extend<S> for TagSet {
    fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
        for tag in iter {
            self.push(tag);
        }
    }
}

impl<'a> IntoIterator for &'a TagSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.order.iter()
    }
}
