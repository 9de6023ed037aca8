use chrono::{DateTime, Utc};
use rusqlite::{params, Row};
use tokio_rusqlite::Connection;

use crate::error::Result;
use crate::models::{Item, UpsertOutcome};

use super::schema::{SCHEMA, UNIQUE_INDEX};

/// Durable item store, scoped to one day partition. All writes for a given
/// id are serialized through a single connection; upserts run inside a
/// transaction so a failure never leaves a partial row behind.
pub struct Store {
    conn: Connection,
    day: String,
}

impl Store {
    /// Open (or create) the database and make the partition ready:
    /// apply the schema, collapse any duplicate rows left over from partial
    /// writes, then enforce uniqueness on (day, id).
    pub async fn open(db_path: &str, day: &str) -> Result<Self> {
        let conn = Connection::open(db_path).await?;

        conn.call(|conn| {
            conn.execute_batch(SCHEMA)?;
            Ok(())
        })
        .await?;

        let store = Self {
            conn,
            day: day.to_string(),
        };
        store.reconcile().await?;
        Ok(store)
    }

    /// Collapse duplicate (day, id) rows: keep the sent row if any duplicate
    /// was already sent, otherwise the most recently written one. Runs once
    /// before the store is considered ready.
    async fn reconcile(&self) -> Result<()> {
        let removed = self
            .conn
            .call(|conn| {
                let removed = conn.execute(
                    r#"DELETE FROM items WHERE rowid NOT IN (
                           SELECT rowid FROM (
                               SELECT rowid,
                                      ROW_NUMBER() OVER (
                                          PARTITION BY day, id
                                          ORDER BY is_sent DESC, rowid DESC
                                      ) AS rn
                               FROM items
                           ) WHERE rn = 1
                       )"#,
                    [],
                )?;
                conn.execute(UNIQUE_INDEX, [])?;
                Ok(removed)
            })
            .await?;

        if removed > 0 {
            tracing::info!(removed, "collapsed duplicate rows during startup");
        }
        Ok(())
    }

    /// Insert a new item, or refresh score/comments when the id already
    /// exists in this partition. Every other field of an existing row is
    /// left untouched.
    pub async fn upsert(&self, item: &Item) -> Result<UpsertOutcome> {
        let day = self.day.clone();
        let item = item.clone();
        let outcome = self
            .conn
            .call(move |conn| {
                let tx = conn.transaction()?;
                let exists: bool = tx.query_row(
                    "SELECT COUNT(*) FROM items WHERE day = ?1 AND id = ?2",
                    params![day, item.id],
                    |row| row.get::<_, i64>(0).map(|n| n > 0),
                )?;

                if exists {
                    tx.execute(
                        "UPDATE items SET score = ?1, comments = ?2 WHERE day = ?3 AND id = ?4",
                        params![item.score, item.comments, day, item.id],
                    )?;
                } else {
                    tx.execute(
                        r#"INSERT INTO items
                               (day, id, title, title_translated, url, source_url,
                                score, comments, summary, summary_translated,
                                discovered_at, sent_at, is_sent)
                           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, NULL, 0)"#,
                        params![
                            day,
                            item.id,
                            item.title,
                            item.title_translated,
                            item.url,
                            item.source_url,
                            item.score,
                            item.comments,
                            item.summary,
                            item.summary_translated,
                            item.discovered_at.to_rfc3339(),
                        ],
                    )?;
                }
                tx.commit()?;
                Ok(if exists {
                    UpsertOutcome::Updated
                } else {
                    UpsertOutcome::Inserted
                })
            })
            .await?;
        Ok(outcome)
    }

    /// Membership check used by ingest to decide whether enrichment is needed.
    pub async fn contains(&self, id: &str) -> Result<bool> {
        let day = self.day.clone();
        let id = id.to_string();
        let exists = self
            .conn
            .call(move |conn| {
                let count: i64 = conn.query_row(
                    "SELECT COUNT(*) FROM items WHERE day = ?1 AND id = ?2",
                    params![day, id],
                    |row| row.get(0),
                )?;
                Ok(count > 0)
            })
            .await?;
        Ok(exists)
    }

    /// All unsent items in this partition, newest first. Ties on the
    /// discovery timestamp break deterministically by id.
    pub async fn list_unsent(&self) -> Result<Vec<Item>> {
        let day = self.day.clone();
        let items = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, title, title_translated, url, source_url,
                              score, comments, summary, summary_translated,
                              discovered_at, sent_at, is_sent
                       FROM items
                       WHERE day = ?1 AND is_sent = 0
                       ORDER BY discovered_at DESC, id ASC"#,
                )?;
                let items = stmt
                    .query_map(params![day], |row| Ok(item_from_row(row)))?
                    .collect::<std::result::Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await?;
        Ok(items)
    }

    /// Flip an item to sent. Returns false when the id is unknown or already
    /// sent, which signals "nothing to do" rather than an error; the sent
    /// timestamp is therefore written at most once.
    pub async fn mark_sent(&self, id: &str) -> Result<bool> {
        let day = self.day.clone();
        let id = id.to_string();
        let changed = self
            .conn
            .call(move |conn| {
                let changed = conn.execute(
                    r#"UPDATE items SET is_sent = 1, sent_at = ?1
                       WHERE day = ?2 AND id = ?3 AND is_sent = 0"#,
                    params![Utc::now().to_rfc3339(), day, id],
                )?;
                Ok(changed > 0)
            })
            .await?;
        Ok(changed)
    }

    /// Fetch a single item by id, used by tests and diagnostics.
    #[allow(dead_code)]
    pub async fn get(&self, id: &str) -> Result<Option<Item>> {
        use rusqlite::OptionalExtension;

        let day = self.day.clone();
        let id = id.to_string();
        let item = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    r#"SELECT id, title, title_translated, url, source_url,
                              score, comments, summary, summary_translated,
                              discovered_at, sent_at, is_sent
                       FROM items WHERE day = ?1 AND id = ?2"#,
                )?;
                let item = stmt
                    .query_row(params![day, id], |row| Ok(item_from_row(row)))
                    .optional()?;
                Ok(item)
            })
            .await?;
        Ok(item)
    }
}

fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    // Try RFC3339 first (e.g., "2026-01-11T12:34:56+00:00")
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    // Try SQLite datetime format (e.g., "2026-01-11 12:34:56")
    if let Ok(naive) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(naive.and_utc());
    }
    None
}

fn item_from_row(row: &Row) -> Item {
    Item {
        id: row.get(0).unwrap(),
        title: row.get(1).unwrap(),
        title_translated: row.get(2).unwrap(),
        url: row.get(3).unwrap(),
        source_url: row.get(4).unwrap(),
        score: row.get(5).unwrap(),
        comments: row.get(6).unwrap(),
        summary: row.get(7).unwrap(),
        summary_translated: row.get(8).unwrap(),
        discovered_at: row
            .get::<_, String>(9)
            .ok()
            .and_then(|s| parse_datetime(&s))
            .unwrap_or_else(Utc::now),
        sent_at: row
            .get::<_, Option<String>>(10)
            .unwrap()
            .and_then(|s| parse_datetime(&s)),
        is_sent: row.get::<_, i64>(11).unwrap() != 0,
    }
}
