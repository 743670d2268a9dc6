//! Replay and team data model

use crate::tags::{game_tag, opponent_tag, player_tag, TagSet};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// One side of a game, identified by its members' stable handles
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Team {
    /// Member handles joined with `;` (order-sensitive)
    pub id: String,
    /// Member display names joined with a space
    pub name: String,
}

impl Team {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
        }
    }

    /// Build a team from `(handle, display_name)` pairs in roster order
    pub fn from_members<'a, I>(members: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let (handles, names): (Vec<&str>, Vec<&str>) = members.into_iter().unzip();
        Self {
            id: handles.join(";"),
            name: names.join(" "),
        }
    }
}

/// Role a team plays in a replay from the user's point of view
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Player,
    Opponent,
}

impl Role {
    pub fn other(self) -> Role {
        match self {
            Role::Player => Role::Opponent,
            Role::Opponent => Role::Player,
        }
    }

    /// Build a tag in this role's namespace
    pub fn tag(self, value: &str) -> String {
        match self {
            Role::Player => player_tag(value),
            Role::Opponent => opponent_tag(value),
        }
    }
}

/// A replay record
///
/// Identity is the hex SHA-256 digest of the file's bytes. `path` is the
/// canonical archive copy, not the path the file was uploaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Replay {
    pub digest: String,
    pub path: PathBuf,
    pub tags: TagSet,
    pub notes: String,
    pub teams: Vec<Team>,
    /// Unix epoch seconds of when the game was played
    pub timestamp: i64,
    pub player_team: Option<usize>,
    pub opponent_team: Option<usize>,
}

impl Replay {
    pub fn new(path: impl Into<PathBuf>, digest: impl Into<String>) -> Self {
        Self {
            digest: digest.into(),
            path: path.into(),
            tags: TagSet::new(),
            notes: String::new(),
            teams: Vec::new(),
            timestamp: 0,
            player_team: None,
            opponent_team: None,
        }
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags.extend(tags);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append a tag, ignoring duplicates
    pub fn add_tag(&mut self, tag: impl Into<String>) -> bool {
        self.tags.push(tag)
    }

    pub fn remove_tag(&mut self, tag: &str) -> bool {
        self.tags.remove(tag)
    }

    pub fn add_player_tag(&mut self, value: &str) -> bool {
        self.tags.push(player_tag(value))
    }

    pub fn add_opponent_tag(&mut self, value: &str) -> bool {
        self.tags.push(opponent_tag(value))
    }

    pub fn add_game_tag(&mut self, value: &str) -> bool {
        self.tags.push(game_tag(value))
    }

    pub fn role_index(&self, role: Role) -> Option<usize> {
        match role {
            Role::Player => self.player_team,
            Role::Opponent => self.opponent_team,
        }
    }

    /// Team assigned to `role`, if the index is set and in range
    pub fn role_team(&self, role: Role) -> Option<&Team> {
        self.role_index(role).and_then(|i| self.teams.get(i))
    }

    /// True unless both roles point at the same team
    pub fn has_valid_roles(&self) -> bool {
        match (self.player_team, self.opponent_team) {
            (Some(p), Some(o)) => p != o,
            _ => true,
        }
    }

    pub fn clear_roles(&mut self) {
        self.player_team = None;
        self.opponent_team = None;
    }
}
