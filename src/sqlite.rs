//! ==============================================================================
//! sqlite.rs - durable readings store on sqlite
//! ==============================================================================
//!
//! purpose:
//!     implements `ReadingStore` over a single sqlite file. the table layout is
//!     the long-standing one: readings(device_uuid, type, value, date_created).
//!
//! connection discipline:
//!     each store call checks a connection out of a small pool and hands it
//!     back once the call finishes, on the error path as well. idle
//!     connections above `pool_size` are closed instead.
//!     all statements are prepared with `?` placeholders and bound values.
//!
//! ==============================================================================

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, Row};

use crate::domain::Reading;
use crate::error::StoreError;
use crate::filter::Predicate;
use crate::store::{ReadingStore, StoreResult};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS readings (
        device_uuid TEXT,
        type TEXT,
        value INTEGER,
        date_created INTEGER
    );
    CREATE INDEX IF NOT EXISTS readings_device_idx ON readings (device_uuid);
";

/// how long a writer waits on a locked database before giving up
const BUSY_TIMEOUT: Duration = Duration::from_millis(5_000);

pub struct SqliteStore {
    path: PathBuf,
    pool_size: usize,
    idle: Mutex<Vec<Connection>>,
}

impl SqliteStore {
    /// open (creating if needed) the database at `path`
    pub fn open<P: AsRef<Path>>(path: P, pool_size: usize) -> StoreResult<Self> {
        let store = Self {
            path: path.as_ref().to_path_buf(),
            pool_size: pool_size.max(1),
            idle: Mutex::new(Vec::new()),
        };
        // first connection creates the schema, then parks in the pool
        store.with_connection(|conn| Ok(conn.execute_batch(SCHEMA)?))?;
        tracing::info!(path = %store.path.display(), pool_size = store.pool_size, "sqlite store ready");
        Ok(store)
    }

    /// run `f` on a pooled connection; the connection goes back to the pool
    /// whether `f` succeeds or fails
    fn with_connection<T>(&self, f: impl FnOnce(&Connection) -> StoreResult<T>) -> StoreResult<T> {
        let conn = self.checkout()?;
        let result = f(&conn);
        self.checkin(conn);
        result
    }

    fn checkout(&self) -> StoreResult<Connection> {
        let parked = self
            .idle
            .lock()
            .map_err(|_| StoreError::Pool("connection pool lock poisoned".to_string()))?
            .pop();
        match parked {
            Some(conn) => Ok(conn),
            None => self.connect(),
        }
    }

    fn checkin(&self, conn: Connection) {
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.pool_size {
                idle.push(conn);
            }
        }
        // otherwise the connection drops and closes here
    }

    fn connect(&self) -> StoreResult<Connection> {
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;
        let conn = Connection::open_with_flags(&self.path, flags)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;
        let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
        tracing::debug!(path = %self.path.display(), "opened sqlite connection");
        Ok(conn)
    }
}

type RawRow = (String, String, Value, Value);

fn reading_from_row(row: &Row<'_>) -> rusqlite::Result<RawRow> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode((device_id, ty, value, created_at): RawRow) -> StoreResult<Reading> {
    let reading_type = ty
        .parse()
        .map_err(|_| StoreError::CorruptRow(format!("unknown reading type {:?}", ty)))?;
    let value = column_integer("value", value)?;
    let created_at = column_integer("date_created", created_at)?;
    Ok(Reading::new(device_id, reading_type, value, created_at))
}

/// older writers stored REAL and numeric TEXT in the integer columns; those
/// are truncated toward zero. stored rows are never re-validated.
fn column_integer(column: &str, raw: Value) -> StoreResult<i64> {
    let converted = match &raw {
        Value::Integer(i) => Some(*i),
        Value::Real(f) => truncate(*f),
        Value::Text(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(truncate))
        }
        Value::Null | Value::Blob(_) => None,
    };
    converted.ok_or_else(|| StoreError::CorruptRow(format!("{} column holds {:?}", column, raw)))
}

fn truncate(f: f64) -> Option<i64> {
    let t = f.trunc();
    (t >= i64::MIN as f64 && t < i64::MAX as f64).then(|| t as i64)
}

impl ReadingStore for SqliteStore {
    fn insert(&self, reading: &Reading) -> StoreResult<()> {
        self.with_connection(|conn| {
            conn.prepare_cached(
                "INSERT INTO readings (device_uuid, type, value, date_created) VALUES (?1, ?2, ?3, ?4)",
            )?
            .execute(params![
                reading.device_id,
                reading.reading_type.as_str(),
                reading.value,
                reading.created_at
            ])?;
            Ok(())
        })
    }

    fn scan(&self, predicate: &Predicate) -> StoreResult<Vec<Reading>> {
        let (clause, bound) = predicate.to_sql();
        let sql = format!(
            "SELECT device_uuid, type, value, date_created FROM readings WHERE {} ORDER BY rowid",
            clause
        );
        let rows = self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(bound.iter()), reading_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })?;
        tracing::debug!(%clause, rows = rows.len(), "sqlite scan");
        rows.into_iter().map(decode).collect()
    }

    fn distinct_device_ids(&self) -> StoreResult<BTreeSet<String>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare_cached("SELECT DISTINCT device_uuid FROM readings")?;
            let ids = stmt
                .query_map([], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<BTreeSet<_>>>()?;
            Ok(ids)
        })
    }
}

// ==============================================================================
// tests
// ==============================================================================
#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ReadingType;
    use crate::filter::DateRange;
    use crate::service::ReadingService;
    use crate::store::MemoryStore;
    use rstest::rstest;
    use std::sync::Arc;

    fn temp_store() -> (tempfile::TempDir, SqliteStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqliteStore::open(dir.path().join("readings.db"), 2).unwrap();
        (dir, store)
    }

    fn sample() -> Vec<Reading> {
        vec![
            Reading::new("a", ReadingType::Temperature, 22, 100),
            Reading::new("b", ReadingType::Humidity, 60, 200),
            Reading::new("a", ReadingType::Humidity, 55, 300),
            Reading::new("c", ReadingType::Temperature, 90, 400),
        ]
    }

    #[test]
    fn insert_then_scan_by_device() {
        let (_dir, store) = temp_store();
        for r in sample() {
            store.insert(&r).unwrap();
        }
        let a = store.scan_by_device("a").unwrap();
        assert_eq!(a, vec![sample()[0].clone(), sample()[2].clone()]);
    }

    #[test]
    fn agrees_with_memory_store_on_every_predicate() {
        let (_dir, store) = temp_store();
        for r in sample() {
            store.insert(&r).unwrap();
        }
        let memory = MemoryStore::with_readings(sample());
        let predicates = vec![
            Predicate::all(),
            Predicate::Type(ReadingType::Temperature),
            Predicate::CreatedBetween(DateRange::new(200, 300)),
            Predicate::CreatedBetween(DateRange::new(300, 200)),
            Predicate::Device("a".into()).and(Predicate::CreatedBetween(DateRange::new(0, 150))),
        ];
        for p in predicates {
            assert_eq!(store.scan(&p).unwrap(), memory.scan(&p).unwrap(), "predicate {:?}", p);
        }
    }

    #[test]
    fn hostile_device_id_is_just_data() {
        let (_dir, store) = temp_store();
        for r in sample() {
            store.insert(&r).unwrap();
        }
        assert!(store.scan_by_device("a\" OR \"1\"=\"1").unwrap().is_empty());
        assert_eq!(store.scan(&Predicate::all()).unwrap().len(), 4);
    }

    #[test]
    fn distinct_device_ids_from_disk() {
        let (_dir, store) = temp_store();
        for r in sample() {
            store.insert(&r).unwrap();
        }
        let ids: Vec<String> = store.distinct_device_ids().unwrap().into_iter().collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn data_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("readings.db");
        {
            let store = SqliteStore::open(&path, 1).unwrap();
            store.insert(&sample()[1]).unwrap();
        }
        let store = SqliteStore::open(&path, 1).unwrap();
        assert_eq!(store.scan_by_type(ReadingType::Humidity).unwrap(), vec![sample()[1].clone()]);
    }

    #[test]
    fn unknown_type_row_is_reported_corrupt() {
        let (_dir, store) = temp_store();
        store
            .with_connection(|conn| {
                conn.execute(
                    "INSERT INTO readings (device_uuid, type, value, date_created) VALUES ('z', 'pressure', 1, 1)",
                    [],
                )?;
                Ok(())
            })
            .unwrap();
        let err = store.scan_by_device("z").unwrap_err();
        assert!(matches!(err, StoreError::CorruptRow(_)));
    }

    fn insert_raw(store: &SqliteStore, values: &str) {
        store
            .with_connection(|conn| {
                let sql = format!(
                    "INSERT INTO readings (device_uuid, type, value, date_created) VALUES {}",
                    values
                );
                conn.execute(&sql, [])?;
                Ok(())
            })
            .unwrap();
    }

    #[test]
    fn legacy_real_value_is_truncated() {
        let (_dir, store) = temp_store();
        insert_raw(&store, "('b', 'humidity', 50.5, 2)");
        insert_raw(&store, "('b', 'humidity', 70, 3.9)");
        let rows = store.scan_by_type(ReadingType::Humidity).unwrap();
        assert_eq!(
            rows,
            vec![
                Reading::new("b", ReadingType::Humidity, 50, 2),
                Reading::new("b", ReadingType::Humidity, 70, 3),
            ]
        );
    }

    #[test]
    fn summary_survives_legacy_rows() {
        let (_dir, store) = temp_store();
        store.insert(&Reading::new("a", ReadingType::Temperature, 10, 1)).unwrap();
        insert_raw(&store, "('b', 'humidity', 50.5, 2)");
        let service = ReadingService::new(Arc::new(store));
        let summary = service.summary().unwrap();
        assert_eq!(summary.len(), 2);
        assert_eq!(summary[1].max, 50);
    }

    #[test]
    fn unconvertible_value_is_reported_corrupt() {
        let (_dir, store) = temp_store();
        insert_raw(&store, "('n', 'humidity', NULL, 1)");
        insert_raw(&store, "('t', 'humidity', 'lots', 1)");
        for device in ["n", "t"] {
            let err = store.scan_by_device(device).unwrap_err();
            assert!(matches!(err, StoreError::CorruptRow(_)), "{}", device);
        }
    }

    #[rstest]
    #[case(Value::Integer(7), Some(7))]
    #[case(Value::Real(-2.7), Some(-2))]
    #[case(Value::Text(" 42 ".into()), Some(42))]
    #[case(Value::Text("12.9".into()), Some(12))]
    #[case(Value::Real(1e300), None)]
    #[case(Value::Real(f64::NAN), None)]
    #[case(Value::Blob(vec![1]), None)]
    fn column_values_convert(#[case] raw: Value, #[case] expected: Option<i64>) {
        assert_eq!(column_integer("value", raw).ok(), expected);
    }

    #[test]
    fn pool_keeps_at_most_pool_size_idle() {
        let (_dir, store) = temp_store();
        let c1 = store.checkout().unwrap();
        let c2 = store.checkout().unwrap();
        let c3 = store.checkout().unwrap();
        for c in [c1, c2, c3] {
            store.checkin(c);
        }
        assert_eq!(store.idle.lock().unwrap().len(), 2);
    }

    #[test]
    fn failed_statement_still_returns_connection() {
        let (_dir, store) = temp_store();
        let before = store.idle.lock().unwrap().len();
        let err = store.with_connection(|conn| {
            conn.execute("INSERT INTO no_such_table VALUES (1)", [])?;
            Ok(())
        });
        assert!(err.is_err());
        assert_eq!(store.idle.lock().unwrap().len(), before);
    }
}
