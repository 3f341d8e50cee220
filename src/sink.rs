use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;

/// Per-record write result. Failures are data for the caller to log and
/// count; they never abort a batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
    Inserted,
    Skipped,
    Failed(String),
}

impl WriteOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, WriteOutcome::Failed(_))
    }

    pub fn describe(&self) -> String {
        match self {
            WriteOutcome::Inserted => "inserted".to_string(),
            WriteOutcome::Skipped => "already exists, skipped".to_string(),
            WriteOutcome::Failed(reason) => format!("failed: {reason}"),
        }
    }
}

/// Idempotent writes against the destination store. Records are bound as a
/// single JSON payload and unpacked column-by-column with `json_extract`,
/// so one prepared shape covers every entity.
#[derive(Debug, Clone, Copy)]
pub struct WriteSink<'a> {
    pool: &'a SqlitePool,
}

impl<'a> WriteSink<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Insert-or-replace keyed on `id`. Succeeds whether or not the row
    /// exists; the row ends up fully replaced with the transformed fields.
    pub async fn upsert<T: Serialize>(&self, table: &str, record: &T) -> WriteOutcome {
        let (sql, payload) = match build_upsert(table, record) {
            Ok(parts) => parts,
            Err(reason) => return WriteOutcome::Failed(reason),
        };
        match sqlx::query(&sql).bind(payload).execute(self.pool).await {
            Ok(_) => WriteOutcome::Inserted,
            Err(err) => WriteOutcome::Failed(err.to_string()),
        }
    }

    /// Probe a natural key first; a hit skips, a miss inserts. A probe
    /// error is reported as a failure rather than treated as "not found" —
    /// a flaky probe must never produce a duplicate insert.
    pub async fn insert_unless_exists<T: Serialize>(
        &self,
        table: &str,
        probe_column: &str,
        probe_value: &str,
        record: &T,
    ) -> WriteOutcome {
        let probe_sql = format!(
            "SELECT 1 FROM {} WHERE {} = ?1 LIMIT 1",
            quote_ident(table),
            quote_ident(probe_column)
        );
        let existing: Option<i64> = match sqlx::query_scalar(&probe_sql)
            .bind(probe_value)
            .fetch_optional(self.pool)
            .await
        {
            Ok(row) => row,
            Err(err) => return WriteOutcome::Failed(format!("existence probe: {err}")),
        };
        if existing.is_some() {
            return WriteOutcome::Skipped;
        }

        let (sql, payload) = match build_insert(table, record) {
            Ok(parts) => parts,
            Err(reason) => return WriteOutcome::Failed(reason),
        };
        match sqlx::query(&sql).bind(payload).execute(self.pool).await {
            Ok(_) => WriteOutcome::Inserted,
            Err(err) => WriteOutcome::Failed(err.to_string()),
        }
    }
}

fn record_parts<T: Serialize>(record: &T) -> Result<(Vec<String>, String), String> {
    let value = serde_json::to_value(record).map_err(|err| err.to_string())?;
    let Value::Object(map) = &value else {
        return Err("record did not serialize to an object".to_string());
    };
    let columns: Vec<String> = map.keys().cloned().collect();
    let payload = serde_json::to_string(&value).map_err(|err| err.to_string())?;
    Ok((columns, payload))
}

fn build_insert<T: Serialize>(table: &str, record: &T) -> Result<(String, String), String> {
    let (columns, payload) = record_parts(record)?;
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let values: Vec<String> = columns.iter().map(|c| json_extract_for_column(c)).collect();
    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote_ident(table),
        quoted.join(", "),
        values.join(", ")
    );
    Ok((sql, payload))
}

fn build_upsert<T: Serialize>(table: &str, record: &T) -> Result<(String, String), String> {
    let (columns, payload) = record_parts(record)?;
    if !columns.iter().any(|c| c == "id") {
        return Err("record has no id column".to_string());
    }
    let quoted: Vec<String> = columns.iter().map(|c| quote_ident(c)).collect();
    let values: Vec<String> = columns.iter().map(|c| json_extract_for_column(c)).collect();
    let updates: Vec<String> = columns
        .iter()
        .filter(|c| c.as_str() != "id")
        .map(|c| format!("{0} = excluded.{0}", quote_ident(c)))
        .collect();
    // ON CONFLICT DO UPDATE keeps the replace in place, so child rows that
    // reference the id survive a re-run under enforced foreign keys.
    let sql = if updates.is_empty() {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(\"id\") DO NOTHING",
            quote_ident(table),
            quoted.join(", "),
            values.join(", ")
        )
    } else {
        format!(
            "INSERT INTO {} ({}) VALUES ({}) ON CONFLICT(\"id\") DO UPDATE SET {}",
            quote_ident(table),
            quoted.join(", "),
            values.join(", "),
            updates.join(", ")
        )
    };
    Ok((sql, payload))
}

fn quote_ident(name: &str) -> String {
    let escaped = name.replace('"', "\"\"");
    format!("\"{}\"", escaped)
}

fn json_extract_for_column(column: &str) -> String {
    let escaped = column.replace('\\', "\\\\").replace('"', "\\\"");
    format!("json_extract(?1, '$.\"{}\"')", escaped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

    async fn memory_pool() -> SqlitePool {
        let options = SqliteConnectOptions::new()
            .filename(":memory:")
            .foreign_keys(true);
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .expect("open in-memory sqlite")
    }

    #[derive(Serialize)]
    struct Row {
        id: String,
        value: String,
    }

    #[tokio::test]
    async fn upsert_inserts_then_replaces() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE things (id TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        let sink = WriteSink::new(&pool);

        let first = sink
            .upsert(
                "things",
                &Row {
                    id: "a".into(),
                    value: "one".into(),
                },
            )
            .await;
        assert_eq!(first, WriteOutcome::Inserted);

        let second = sink
            .upsert(
                "things",
                &Row {
                    id: "a".into(),
                    value: "two".into(),
                },
            )
            .await;
        assert_eq!(second, WriteOutcome::Inserted);

        let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, value FROM things")
            .fetch_all(&pool)
            .await
            .unwrap();
        assert_eq!(rows, vec![("a".to_string(), "two".to_string())]);
    }

    #[tokio::test]
    async fn upsert_keeps_child_rows_alive() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE parents (id TEXT PRIMARY KEY, name TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE children (id TEXT PRIMARY KEY, parent_id TEXT NOT NULL REFERENCES parents(id))",
        )
        .execute(&pool)
        .await
        .unwrap();
        let sink = WriteSink::new(&pool);

        #[derive(Serialize)]
        struct Parent {
            id: String,
            name: String,
        }
        assert_eq!(
            sink.upsert(
                "parents",
                &Parent {
                    id: "p1".into(),
                    name: "first".into()
                }
            )
            .await,
            WriteOutcome::Inserted
        );
        sqlx::query("INSERT INTO children (id, parent_id) VALUES ('c1', 'p1')")
            .execute(&pool)
            .await
            .unwrap();

        // Re-running the parent upsert must not trip the child's FK.
        assert_eq!(
            sink.upsert(
                "parents",
                &Parent {
                    id: "p1".into(),
                    name: "second".into()
                }
            )
            .await,
            WriteOutcome::Inserted
        );
    }

    #[tokio::test]
    async fn probe_hit_skips_and_miss_inserts() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE things (id TEXT PRIMARY KEY, value TEXT NOT NULL)")
            .execute(&pool)
            .await
            .unwrap();
        let sink = WriteSink::new(&pool);
        let row = Row {
            id: "a".into(),
            value: "one".into(),
        };

        assert_eq!(
            sink.insert_unless_exists("things", "id", "a", &row).await,
            WriteOutcome::Inserted
        );
        assert_eq!(
            sink.insert_unless_exists("things", "id", "a", &row).await,
            WriteOutcome::Skipped
        );

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM things")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 1);
    }

    #[tokio::test]
    async fn probe_error_is_a_failure_not_a_miss() {
        let pool = memory_pool().await;
        let sink = WriteSink::new(&pool);
        let row = Row {
            id: "a".into(),
            value: "one".into(),
        };

        let outcome = sink
            .insert_unless_exists("missing_table", "id", "a", &row)
            .await;
        match outcome {
            WriteOutcome::Failed(reason) => assert!(reason.contains("existence probe")),
            other => panic!("expected probe failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn constraint_violation_reports_failed() {
        let pool = memory_pool().await;
        sqlx::query("CREATE TABLE parents (id TEXT PRIMARY KEY)")
            .execute(&pool)
            .await
            .unwrap();
        sqlx::query(
            "CREATE TABLE children (id TEXT PRIMARY KEY, parent_id TEXT NOT NULL REFERENCES parents(id))",
        )
        .execute(&pool)
        .await
        .unwrap();
        let sink = WriteSink::new(&pool);

        #[derive(Serialize)]
        struct Child {
            id: String,
            parent_id: String,
        }
        let outcome = sink
            .upsert(
                "children",
                &Child {
                    id: "c1".into(),
                    parent_id: "nope".into(),
                },
            )
            .await;
        assert!(outcome.is_failed());
    }

    #[test]
    fn upsert_sql_shape() {
        let (sql, payload) = build_upsert(
            "things",
            &json!({ "id": "a", "value": "x" })
                .as_object()
                .cloned()
                .unwrap(),
        )
        .unwrap();
        assert_eq!(
            sql,
            "INSERT INTO \"things\" (\"id\", \"value\") VALUES (json_extract(?1, '$.\"id\"'), json_extract(?1, '$.\"value\"')) ON CONFLICT(\"id\") DO UPDATE SET \"value\" = excluded.\"value\""
        );
        assert_eq!(payload, "{\"id\":\"a\",\"value\":\"x\"}");
    }
}
