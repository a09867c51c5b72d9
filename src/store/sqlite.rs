use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rusqlite_migration::{Migrations, M};

use crate::app::{AnifeedError, Result};
use crate::domain::{ActivityKind, ChannelFilter, Subscription};
use crate::store::{RemoveOutcome, SubscriptionStore};

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn run_migrations(&self) -> Result<()> {
        let migrations = Migrations::new(vec![M::up(include_str!(
            "../../migrations/001-initial/up.sql"
        ))]);

        let mut conn = self.lock()?;
        migrations
            .to_latest(&mut conn)
            .map_err(|_| AnifeedError::Database(rusqlite::Error::InvalidQuery))?;

        Ok(())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| {
            AnifeedError::Database(rusqlite::Error::SqliteFailure(
                rusqlite::ffi::Error::new(1),
                Some(e.to_string()),
            ))
        })
    }

    fn parse_kind(s: &str) -> Result<ActivityKind> {
        s.parse::<ActivityKind>().map_err(AnifeedError::Other)
    }

    fn remove_one(&self, record: &Subscription) -> Result<bool> {
        let conn = self.lock()?;
        let changed = conn.execute(
            "DELETE FROM subscriptions
             WHERE identity = ?1 AND destination = ?2 AND content_kind = ?3",
            params![
                record.identity,
                record.destination,
                record.kind.as_str()
            ],
        )?;
        Ok(changed > 0)
    }
}

impl SubscriptionStore for SqliteStore {
    fn list(&self) -> Result<Vec<Subscription>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(
            "SELECT identity, destination, content_kind
             FROM subscriptions ORDER BY identity, destination, content_kind",
        )?;

        let rows = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let mut records = Vec::with_capacity(rows.len());
        for (identity, destination, kind) in rows {
            records.push(Subscription::new(
                identity,
                destination,
                Self::parse_kind(&kind)?,
            ));
        }

        Ok(records)
    }

    fn insert(&self, records: &[Subscription]) -> Result<()> {
        let conn = self.lock()?;
        for record in records {
            conn.execute(
                "INSERT OR IGNORE INTO subscriptions
                 (identity, destination, content_kind, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    record.identity,
                    record.destination,
                    record.kind.as_str(),
                    Utc::now().to_rfc3339()
                ],
            )?;
        }
        Ok(())
    }

    fn remove(&self, records: &[Subscription]) -> Vec<RemoveOutcome> {
        records
            .iter()
            .map(|record| RemoveOutcome {
                subscription: record.clone(),
                result: self.remove_one(record),
            })
            .collect()
    }

    fn get_filter(&self, destination: &str) -> Result<ChannelFilter> {
        let conn = self.lock()?;
        let filter = conn
            .query_row(
                "SELECT hide_in_progress, hide_planning, hide_dropped, hide_paused
                 FROM channel_filters WHERE destination = ?1",
                params![destination],
                |row| {
                    Ok(ChannelFilter {
                        hide_in_progress: row.get(0)?,
                        hide_planning: row.get(1)?,
                        hide_dropped: row.get(2)?,
                        hide_paused: row.get(3)?,
                    })
                },
            )
            .optional()?;

        Ok(filter.unwrap_or_default())
    }

    fn set_filter(&self, destination: &str, filter: &ChannelFilter) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO channel_filters
             (destination, hide_in_progress, hide_planning, hide_dropped, hide_paused)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(destination) DO UPDATE SET
                 hide_in_progress = excluded.hide_in_progress,
                 hide_planning = excluded.hide_planning,
                 hide_dropped = excluded.hide_dropped,
                 hide_paused = excluded.hide_paused",
            params![
                destination,
                filter.hide_in_progress,
                filter.hide_planning,
                filter.hide_dropped,
                filter.hide_paused
            ],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sub(identity: &str, destination: &str, kind: ActivityKind) -> Subscription {
        Subscription::new(identity, destination, kind)
    }

    #[test]
    fn test_insert_and_list_round_trip() {
        let store = SqliteStore::in_memory().unwrap();
        let records = vec![
            sub("alice", "dest-a", ActivityKind::Anime),
            sub("alice", "dest-a", ActivityKind::Manga),
            sub("bob", "dest-b", ActivityKind::Text),
        ];

        store.insert(&records).unwrap();
        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 3);
        for record in &records {
            assert!(listed.contains(record));
        }
    }

    #[test]
    fn test_duplicate_insert_is_ignored() {
        let store = SqliteStore::in_memory().unwrap();
        let record = sub("alice", "dest", ActivityKind::Anime);

        store.insert(std::slice::from_ref(&record)).unwrap();
        store.insert(std::slice::from_ref(&record)).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_remove_reports_per_record_outcomes() {
        let store = SqliteStore::in_memory().unwrap();
        let present = sub("alice", "dest", ActivityKind::Anime);
        let absent = sub("bob", "dest", ActivityKind::Anime);
        store.insert(std::slice::from_ref(&present)).unwrap();

        let outcomes = store.remove(&[present.clone(), absent.clone()]);
        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0].result, Ok(true)));
        assert!(matches!(outcomes[1].result, Ok(false)));

        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_remove_matches_exact_triple_only() {
        let store = SqliteStore::in_memory().unwrap();
        store
            .insert(&[
                sub("alice", "dest", ActivityKind::Anime),
                sub("alice", "dest", ActivityKind::Manga),
            ])
            .unwrap();

        store.remove(&[sub("alice", "dest", ActivityKind::Anime)]);

        let remaining = store.list().unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].kind, ActivityKind::Manga);
    }

    #[test]
    fn test_remove_then_reinsert_succeeds() {
        let store = SqliteStore::in_memory().unwrap();
        let record = sub("alice", "dest", ActivityKind::Anime);

        store.insert(std::slice::from_ref(&record)).unwrap();
        store.remove(std::slice::from_ref(&record));
        store.insert(std::slice::from_ref(&record)).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn test_filter_defaults_when_absent() {
        let store = SqliteStore::in_memory().unwrap();
        let filter = store.get_filter("nowhere").unwrap();
        assert!(filter.is_default());
    }

    #[test]
    fn test_filter_set_and_update() {
        let store = SqliteStore::in_memory().unwrap();
        let filter = ChannelFilter {
            hide_in_progress: true,
            hide_paused: true,
            ..ChannelFilter::default()
        };

        store.set_filter("dest", &filter).unwrap();
        assert_eq!(store.get_filter("dest").unwrap(), filter);

        let relaxed = ChannelFilter {
            hide_paused: true,
            ..ChannelFilter::default()
        };
        store.set_filter("dest", &relaxed).unwrap();
        assert_eq!(store.get_filter("dest").unwrap(), relaxed);
    }

    #[test]
    fn test_on_disk_store_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anifeed.db");
        let record = sub("alice", "dest", ActivityKind::Anime);

        {
            let store = SqliteStore::new(&path).unwrap();
            store.insert(std::slice::from_ref(&record)).unwrap();
        }

        let store = SqliteStore::new(&path).unwrap();
        assert_eq!(store.list().unwrap(), vec![record]);
    }
}
