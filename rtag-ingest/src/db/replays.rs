//! Replay record persistence
//!
//! One row per replay digest in the `replays` table. Tags and team lists are
//! JSON arrays. Every mutation holds the store-wide writer lock and runs in
//! a transaction, so the merge inside one call never interleaves with
//! another writer. Callers that read a record, edit it, and write it back
//! serialize those cycles themselves (see `ReplayManager`).

use crate::archive::ReplayArchive;
use crate::query::ReplayQuery;
use futures::stream::{BoxStream, StreamExt, TryStreamExt};
use rtag_common::config::RootFolderInitializer;
use rtag_common::db::init_database;
use rtag_common::{Error, Replay, Result, Role, TagSet, Team};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Which fields of an existing record an update overwrites
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateScope {
    /// Tags and notes only; telemetry-derived fields keep their stored values
    TagsAndNotes,
    /// Every field, as after a full processing pass
    Full,
}

const SELECT_COLUMNS: &str = r#"
    SELECT digest, canonical_path, tags, notes, team_ids, team_names,
           timestamp, player_team, opponent_team
    FROM replays
"#;

/// Document store of replay records keyed by digest
pub struct ReplayStore {
    pool: SqlitePool,
    archive: ReplayArchive,
    write_lock: Mutex<()>,
}

impl ReplayStore {
    /// Open (creating if needed) the store under `root_folder`
    pub async fn open(root_folder: &Path, replay_extension: &str) -> Result<Self> {
        let initializer = RootFolderInitializer::new(root_folder.to_path_buf());
        initializer.ensure_directory_exists()?;

        let pool = init_database(&initializer.database_path()).await?;
        let archive = ReplayArchive::new(initializer.archive_path(), replay_extension);

        info!(root = %root_folder.display(), "Replay store opened");
        Ok(Self::from_parts(pool, archive))
    }

    pub fn from_parts(pool: SqlitePool, archive: ReplayArchive) -> Self {
        Self {
            pool,
            archive,
            write_lock: Mutex::new(()),
        }
    }

    pub fn archive(&self) -> &ReplayArchive {
        &self.archive
    }

    /// Wait for pending writes and close all connections
    pub async fn close(self) {
        let _guard = self.write_lock.lock().await;
        self.pool.close().await;
        debug!("Replay store closed");
    }

    /// Insert a new record or merge into the existing one
    ///
    /// Tags and notes always overwrite. Path, teams, timestamp, and roles
    /// overwrite only with [`UpdateScope::Full`]. The stored path is always
    /// the canonical archive path: an incoming path elsewhere has its file
    /// copied into the archive first. Roles pointing at the same team are stored unset. Returns the
    /// record as stored.
    pub async fn insert_or_update(&self, replay: &Replay, scope: UpdateScope) -> Result<Replay> {
        let mut incoming = replay.clone();
        if !incoming.has_valid_roles() {
            warn!(digest = %incoming.digest, "Player and opponent share a team, storing roles unset");
            incoming.clear_roles();
        }
        let replay = &incoming;

        let _guard = self.write_lock.lock().await;
        let mut tx = self.pool.begin().await?;

        let existing = sqlx::query(&format!("{} WHERE digest = ?", SELECT_COLUMNS))
            .bind(&replay.digest)
            .fetch_optional(&mut *tx)
            .await?
            .map(|row| row_to_replay(&row))
            .transpose()?;

        let stored = match existing {
            Some(mut current) => {
                current.tags = replay.tags.clone();
                current.notes = replay.notes.clone();
                if scope == UpdateScope::Full {
                    current.path = self.ensure_archived(replay).await?;
                    current.teams = replay.teams.clone();
                    current.timestamp = replay.timestamp;
                    current.player_team = replay.player_team;
                    current.opponent_team = replay.opponent_team;
                }

                let (team_ids, team_names) = encode_teams(&current.teams)?;
                sqlx::query(
                    r#"
                    UPDATE replays SET
                        canonical_path = ?, tags = ?, notes = ?, team_ids = ?,
                        team_names = ?, timestamp = ?, player_team = ?,
                        opponent_team = ?, updated_at = CURRENT_TIMESTAMP
                    WHERE digest = ?
                    "#,
                )
                .bind(current.path.to_string_lossy().into_owned())
                .bind(serde_json::to_string(&current.tags)?)
                .bind(&current.notes)
                .bind(team_ids)
                .bind(team_names)
                .bind(current.timestamp)
                .bind(current.player_team.map(|i| i as i64))
                .bind(current.opponent_team.map(|i| i as i64))
                .bind(&current.digest)
                .execute(&mut *tx)
                .await?;

                debug!(digest = %current.digest, ?scope, "Updated replay record");
                current
            }
            None => {
                let mut inserted = replay.clone();
                inserted.path = self.ensure_archived(replay).await?;

                let (team_ids, team_names) = encode_teams(&inserted.teams)?;
                sqlx::query(
                    r#"
                    INSERT INTO replays (
                        digest, canonical_path, tags, notes, team_ids, team_names,
                        timestamp, player_team, opponent_team, created_at, updated_at
                    ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, CURRENT_TIMESTAMP, CURRENT_TIMESTAMP)
                    "#,
                )
                .bind(&inserted.digest)
                .bind(inserted.path.to_string_lossy().into_owned())
                .bind(serde_json::to_string(&inserted.tags)?)
                .bind(&inserted.notes)
                .bind(team_ids)
                .bind(team_names)
                .bind(inserted.timestamp)
                .bind(inserted.player_team.map(|i| i as i64))
                .bind(inserted.opponent_team.map(|i| i as i64))
                .execute(&mut *tx)
                .await?;

                info!(digest = %inserted.digest, path = %inserted.path.display(), "Inserted replay record");
                inserted
            }
        };

        tx.commit().await?;
        Ok(stored)
    }

    pub async fn find_by_digest(&self, digest: &str) -> Result<Option<Replay>> {
        let row = sqlx::query(&format!("{} WHERE digest = ?", SELECT_COLUMNS))
            .bind(digest)
            .fetch_optional(&self.pool)
            .await?;

        row.map(|row| row_to_replay(&row)).transpose()
    }

    /// Delete a record. Returns `false` if it did not exist.
    ///
    /// The archived file is left in place.
    pub async fn remove_by_digest(&self, digest: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;
        let result = sqlx::query("DELETE FROM replays WHERE digest = ?")
            .bind(digest)
            .execute(&self.pool)
            .await?;

        let removed = result.rows_affected() > 0;
        if removed {
            info!(digest = %digest, "Removed replay record");
        }
        Ok(removed)
    }

    /// Stream every record in unspecified order
    pub fn all(&self) -> BoxStream<'_, Result<Replay>> {
        sqlx::query(SELECT_COLUMNS)
            .fetch(&self.pool)
            .map(|row| row.map_err(Error::from).and_then(|row| row_to_replay(&row)))
            .boxed()
    }

    pub async fn count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM replays")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Records matching `query`, newest first
    ///
    /// The timestamp range narrows rows in SQL; tag predicates are applied
    /// to the loaded records.
    pub async fn search(&self, query: &ReplayQuery) -> Result<Vec<Replay>> {
        let rows = match query.time_range() {
            Some((start, end)) => {
                sqlx::query(&format!(
                    "{} WHERE timestamp BETWEEN ? AND ? ORDER BY timestamp DESC, digest",
                    SELECT_COLUMNS
                ))
                .bind(start)
                .bind(end)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("{} ORDER BY timestamp DESC, digest", SELECT_COLUMNS))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        let mut matches = Vec::new();
        for row in rows {
            let replay = row_to_replay(&row)?;
            if query.matches(&replay) {
                matches.push(replay);
            }
        }

        debug!(matched = matches.len(), "Replay search complete");
        Ok(matches)
    }

    /// Every team id ever assigned `role` across stored records
    ///
    /// Records whose role index is out of range for their team list are
    /// skipped.
    pub async fn historical_role_ids(&self, role: Role) -> Result<HashSet<String>> {
        let column = match role {
            Role::Player => "player_team",
            Role::Opponent => "opponent_team",
        };
        let sql = format!(
            "SELECT digest, team_ids, {column} AS role_index FROM replays WHERE {column} IS NOT NULL"
        );

        let ids: HashSet<String> = sqlx::query(&sql)
            .fetch(&self.pool)
            .map_err(Error::from)
            .try_fold(HashSet::new(), |mut ids, row| async move {
                let digest: String = row.get("digest");
                let team_ids: Vec<String> = serde_json::from_str(row.get("team_ids"))?;
                let index: i64 = row.get("role_index");

                match usize::try_from(index).ok().and_then(|i| team_ids.get(i)) {
                    Some(id) => {
                        ids.insert(id.clone());
                    }
                    None => {
                        warn!(digest = %digest, index, teams = team_ids.len(), "Role index out of range");
                    }
                }
                Ok::<_, Error>(ids)
            })
            .await?;

        Ok(ids)
    }

    /// Canonical path for a new record, copying the file in when needed
    async fn ensure_archived(&self, replay: &Replay) -> Result<PathBuf> {
        let canonical = self.archive.canonical_path(&replay.digest);
        if replay.path == canonical {
            return Ok(canonical);
        }

        let archive = self.archive.clone();
        let source = replay.path.clone();
        let digest = replay.digest.clone();
        tokio::task::spawn_blocking(move || archive.adopt(&source, &digest))
            .await
            .map_err(|e| Error::Internal(format!("Archive task failed: {}", e)))?
    }
}

fn encode_teams(teams: &[Team]) -> Result<(String, String)> {
    let ids: Vec<&str> = teams.iter().map(|t| t.id.as_str()).collect();
    let names: Vec<&str> = teams.iter().map(|t| t.name.as_str()).collect();
    Ok((serde_json::to_string(&ids)?, serde_json::to_string(&names)?))
}

fn row_to_replay(row: &SqliteRow) -> Result<Replay> {
    let tags: TagSet = serde_json::from_str(row.get("tags"))?;
    let team_ids: Vec<String> = serde_json::from_str(row.get("team_ids"))?;
    let mut team_names: Vec<String> = serde_json::from_str(row.get("team_names"))?;
    team_names.resize(team_ids.len(), String::new());

    let teams = team_ids
        .into_iter()
        .zip(team_names)
        .map(|(id, name)| Team::new(id, name))
        .collect();

    let path: String = row.get("canonical_path");
    let player_team: Option<i64> = row.get("player_team");
    let opponent_team: Option<i64> = row.get("opponent_team");

    Ok(Replay {
        digest: row.get("digest"),
        path: PathBuf::from(path),
        tags,
        notes: row.get("notes"),
        teams,
        timestamp: row.get("timestamp"),
        player_team: player_team.and_then(|i| usize::try_from(i).ok()),
        opponent_team: opponent_team.and_then(|i| usize::try_from(i).ok()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, ReplayStore) {
        let dir = TempDir::new().unwrap();
        let store = ReplayStore::open(dir.path(), "SC2Replay").await.unwrap();
        (dir, store)
    }

    fn archived(store: &ReplayStore, digest: &str) -> Replay {
        let path = store.archive().canonical_path(digest);
        std::fs::write(&path, digest.as_bytes()).unwrap();
        Replay::new(path, digest)
    }

    #[tokio::test]
    async fn test_tags_and_notes_scope_keeps_derived_fields() {
        let (_dir, store) = store().await;
        let mut replay = archived(&store, "d1");
        replay.timestamp = 500;
        replay.teams = vec![Team::new("x", "X"), Team::new("y", "Y")];
        replay.player_team = Some(0);
        replay.opponent_team = Some(1);
        store.insert_or_update(&replay, UpdateScope::Full).await.unwrap();

        let mut stale = Replay::new(replay.path.clone(), "d1").with_tags(["mine"]);
        stale.notes = "good game".to_string();
        let stored = store
            .insert_or_update(&stale, UpdateScope::TagsAndNotes)
            .await
            .unwrap();

        assert_eq!(stored.timestamp, 500);
        assert_eq!(stored.teams.len(), 2);
        assert_eq!(stored.player_team, Some(0));
        assert_eq!(stored.tags.as_slice(), &["mine"]);
        assert_eq!(stored.notes, "good game");

        let loaded = store.find_by_digest("d1").await.unwrap().unwrap();
        assert_eq!(loaded, stored);
    }

    #[tokio::test]
    async fn test_full_scope_overwrites_everything() {
        let (_dir, store) = store().await;
        let mut replay = archived(&store, "d1");
        replay.timestamp = 500;
        replay.player_team = Some(0);
        store.insert_or_update(&replay, UpdateScope::Full).await.unwrap();

        replay.timestamp = 900;
        replay.player_team = None;
        let stored = store.insert_or_update(&replay, UpdateScope::Full).await.unwrap();

        assert_eq!(stored.timestamp, 900);
        assert_eq!(stored.player_team, None);
    }

    #[tokio::test]
    async fn test_insert_adopts_non_canonical_file() {
        let (dir, store) = store().await;
        let upload = dir.path().join("upload.SC2Replay");
        std::fs::write(&upload, b"bytes").unwrap();

        let stored = store
            .insert_or_update(&Replay::new(&upload, "d2"), UpdateScope::Full)
            .await
            .unwrap();

        assert_eq!(stored.path, store.archive().canonical_path("d2"));
        assert_eq!(std::fs::read(&stored.path).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_self_paired_roles_are_never_stored() {
        let (_dir, store) = store().await;
        let mut replay = archived(&store, "d4");
        replay.teams = vec![Team::new("x", "X"), Team::new("y", "Y")];
        replay.player_team = Some(1);
        replay.opponent_team = Some(1);

        let stored = store.insert_or_update(&replay, UpdateScope::Full).await.unwrap();
        assert_eq!(stored.player_team, None);
        assert_eq!(stored.opponent_team, None);

        let loaded = store.find_by_digest("d4").await.unwrap().unwrap();
        assert!(loaded.has_valid_roles());
    }

    #[tokio::test]
    async fn test_full_update_keeps_canonical_path() {
        let (dir, store) = store().await;
        let upload = dir.path().join("upload.SC2Replay");
        std::fs::write(&upload, b"bytes").unwrap();
        let canonical = store.archive().canonical_path("d5");

        store
            .insert_or_update(&Replay::new(&upload, "d5"), UpdateScope::Full)
            .await
            .unwrap();
        let stored = store
            .insert_or_update(&Replay::new(&upload, "d5"), UpdateScope::Full)
            .await
            .unwrap();

        assert_eq!(stored.path, canonical);
        std::fs::remove_file(&upload).unwrap();
        let loaded = store.find_by_digest("d5").await.unwrap().unwrap();
        assert_eq!(loaded.path, canonical);
        assert_eq!(std::fs::read(&loaded.path).unwrap(), b"bytes");
    }

    #[tokio::test]
    async fn test_full_update_archives_file_missing_from_archive() {
        let (dir, store) = store().await;
        let replay = archived(&store, "d6");
        store.insert_or_update(&replay, UpdateScope::Full).await.unwrap();
        std::fs::remove_file(&replay.path).unwrap();

        let upload = dir.path().join("again.SC2Replay");
        std::fs::write(&upload, b"d6").unwrap();
        let stored = store
            .insert_or_update(&Replay::new(&upload, "d6"), UpdateScope::Full)
            .await
            .unwrap();

        assert_eq!(stored.path, replay.path);
        assert!(store.archive().contains("d6"));
    }

    #[tokio::test]
    async fn test_find_and_remove_absent() {
        let (_dir, store) = store().await;
        assert!(store.find_by_digest("missing").await.unwrap().is_none());
        assert!(!store.remove_by_digest("missing").await.unwrap());
    }

    #[tokio::test]
    async fn test_remove_keeps_archive_file() {
        let (_dir, store) = store().await;
        let replay = archived(&store, "d3");
        store.insert_or_update(&replay, UpdateScope::Full).await.unwrap();

        assert!(store.remove_by_digest("d3").await.unwrap());
        assert!(store.find_by_digest("d3").await.unwrap().is_none());
        assert!(replay.path.is_file());
    }

    #[tokio::test]
    async fn test_all_streams_every_record() {
        let (_dir, store) = store().await;
        for digest in ["a", "b", "c"] {
            let replay = archived(&store, digest);
            store.insert_or_update(&replay, UpdateScope::Full).await.unwrap();
        }

        let mut digests: Vec<String> = store
            .all()
            .map_ok(|r| r.digest)
            .try_collect()
            .await
            .unwrap();
        digests.sort();

        assert_eq!(digests, vec!["a", "b", "c"]);
        assert_eq!(store.count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_historical_role_ids_skips_out_of_range() {
        let (_dir, store) = store().await;

        let mut valid = archived(&store, "v");
        valid.teams = vec![Team::new("x", "X"), Team::new("y", "Y")];
        valid.player_team = Some(0);
        valid.opponent_team = Some(1);
        store.insert_or_update(&valid, UpdateScope::Full).await.unwrap();

        let mut broken = archived(&store, "b");
        broken.teams = vec![Team::new("z", "Z")];
        broken.player_team = Some(4);
        store.insert_or_update(&broken, UpdateScope::Full).await.unwrap();

        let players = store.historical_role_ids(Role::Player).await.unwrap();
        let opponents = store.historical_role_ids(Role::Opponent).await.unwrap();
        assert_eq!(players, HashSet::from(["x".to_string()]));
        assert_eq!(opponents, HashSet::from(["y".to_string()]));
    }
}
