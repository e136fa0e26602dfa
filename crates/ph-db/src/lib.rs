//! Storage layer for the prepaid hours tracker.
//!
//! Provides persistence for clients, time entries, and the prepaid
//! consumption ledger using `rusqlite`, and implements
//! [`ph_core::LedgerStore`] so the allocation engine can run directly
//! against a [`Database`].
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but
//! not `Sync`. A `Database` instance can be moved between threads but cannot
//! be shared without external synchronization. Note that the allocation
//! engine additionally requires callers to serialize allocation runs per
//! client; see `ph_core::AllocationEngine`.
//!
//! # Schema
//!
//! Timestamps are stored as TEXT in RFC 3339 format (e.g.
//! `2025-01-15T09:30:00Z`), so lexicographic ordering matches chronological
//! ordering. Cycle keys (`allocation_month`) are TEXT dates (`YYYY-MM-DD`).
//!
//! Ledger rows are append-only from the engine's point of view: created when
//! an entry draws prepaid hours, deleted in bulk when the owning invoice's
//! allocation is reset, never updated in place.

use std::path::Path;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use ph_core::{
    BillableEntry, ClientId, EntryId, Hours, InvoiceId, LedgerRow, LedgerStore, PrepaidClient,
    ValidationError, monthly_cycle_start,
};
use rusqlite::{Connection, params, params_from_iter};
use thiserror::Error;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// Failed to parse a stored timestamp.
    #[error("invalid timestamp for {what} {id}: {value}")]
    TimestampParse {
        what: &'static str,
        id: String,
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// Failed to parse a stored cycle date.
    #[error("invalid allocation month: {value}")]
    MonthParse {
        value: String,
        #[source]
        source: chrono::ParseError,
    },
    /// A stored row failed domain validation.
    #[error("invalid {what} row: {id}")]
    InvalidRow {
        what: &'static str,
        id: String,
        #[source]
        source: ValidationError,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A client and its prepaid plan configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientRecord {
    pub id: ClientId,
    pub name: Option<String>,
    pub prepaid_enabled: bool,
    /// Per-cycle allowance.
    pub prepaid_hours_monthly: Hours,
    /// Day of month the billing cycle starts on, 1..=31.
    pub cycle_anchor_day: u32,
}

impl PrepaidClient for ClientRecord {
    fn id(&self) -> &ClientId {
        &self.id
    }

    fn plan_enabled(&self) -> bool {
        self.prepaid_enabled
    }

    fn plan_hours(&self) -> Hours {
        self.prepaid_hours_monthly
    }

    fn cycle_start(&self, at: DateTime<Utc>) -> NaiveDate {
        monthly_cycle_start(self.cycle_anchor_day, at)
    }
}

/// A stored time entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimeEntryRecord {
    pub id: EntryId,
    pub client_id: ClientId,
    pub start_time: Option<DateTime<Utc>>,
    pub duration_seconds: i64,
    pub billable: bool,
    pub description: Option<String>,
}

impl BillableEntry for TimeEntryRecord {
    fn id(&self) -> &EntryId {
        &self.id
    }

    fn start_time(&self) -> Option<DateTime<Utc>> {
        self.start_time
    }

    fn duration_seconds(&self) -> i64 {
        self.duration_seconds
    }

    fn billable(&self) -> bool {
        self.billable
    }

    fn set_billable(&mut self, billable: bool) {
        self.billable = billable;
    }
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS clients (
                id TEXT PRIMARY KEY,
                name TEXT,
                prepaid_enabled INTEGER NOT NULL DEFAULT 0,
                prepaid_centihours INTEGER NOT NULL DEFAULT 0,
                cycle_anchor_day INTEGER NOT NULL DEFAULT 1
            );

            -- Time entries: start_time is RFC 3339 TEXT (nullable)
            CREATE TABLE IF NOT EXISTS time_entries (
                id TEXT PRIMARY KEY,
                client_id TEXT NOT NULL,
                start_time TEXT,
                duration_seconds INTEGER NOT NULL DEFAULT 0,
                billable INTEGER NOT NULL DEFAULT 1,
                description TEXT,
                FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_time_entries_client ON time_entries(client_id);
            CREATE INDEX IF NOT EXISTS idx_time_entries_start ON time_entries(start_time);

            -- Consumption ledger: allocation_month is the cycle start date
            -- ('YYYY-MM-DD'); seconds_consumed is the prepaid portion only
            CREATE TABLE IF NOT EXISTS prepaid_ledger (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id TEXT NOT NULL,
                time_entry_id TEXT NOT NULL,
                invoice_id TEXT,
                allocation_month TEXT NOT NULL,
                seconds_consumed INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                FOREIGN KEY (client_id) REFERENCES clients(id) ON DELETE CASCADE
            );

            CREATE INDEX IF NOT EXISTS idx_ledger_client_month
                ON prepaid_ledger(client_id, allocation_month);
            CREATE INDEX IF NOT EXISTS idx_ledger_invoice ON prepaid_ledger(invoice_id);
            CREATE INDEX IF NOT EXISTS idx_ledger_entry ON prepaid_ledger(time_entry_id);
            ",
        )?;
        Ok(())
    }

    /// Inserts or updates a client.
    pub fn upsert_client(&mut self, client: &ClientRecord) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO clients (id, name, prepaid_enabled, prepaid_centihours, cycle_anchor_day)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                prepaid_enabled = excluded.prepaid_enabled,
                prepaid_centihours = excluded.prepaid_centihours,
                cycle_anchor_day = excluded.cycle_anchor_day
            ",
            params![
                client.id.as_str(),
                client.name,
                client.prepaid_enabled,
                client.prepaid_hours_monthly.centihours(),
                client.cycle_anchor_day,
            ],
        )?;
        Ok(())
    }

    /// Looks up a client by ID.
    pub fn get_client(&self, id: &ClientId) -> Result<Option<ClientRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, name, prepaid_enabled, prepaid_centihours, cycle_anchor_day
            FROM clients
            WHERE id = ?
            ",
        )?;
        let mut rows = stmt.query_map([id.as_str()], raw_client_row)?;
        rows.next().transpose()?.map(client_from_raw).transpose()
    }

    /// Lists all clients ordered by ID.
    pub fn list_clients(&self) -> Result<Vec<ClientRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, name, prepaid_enabled, prepaid_centihours, cycle_anchor_day
            FROM clients
            ORDER BY id ASC
            ",
        )?;
        let rows = stmt.query_map([], raw_client_row)?;
        let mut clients = Vec::new();
        for row in rows {
            clients.push(client_from_raw(row?)?);
        }
        Ok(clients)
    }

    /// Inserts a batch of time entries, ignoring duplicates by ID.
    pub fn insert_entries(&mut self, entries: &[TimeEntryRecord]) -> Result<usize, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO time_entries
                (id, client_id, start_time, duration_seconds, billable, description)
                VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;
            for entry in entries {
                inserted += stmt.execute(params![
                    entry.id.as_str(),
                    entry.client_id.as_str(),
                    entry.start_time.map(format_timestamp),
                    entry.duration_seconds,
                    entry.billable,
                    entry.description,
                ])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    /// Lists a client's time entries ordered by start time then ID.
    ///
    /// Entries without a start time sort first and are always included; the
    /// optional bounds filter timed entries to `start <= t < end`.
    pub fn list_entries(
        &self,
        client: &ClientId,
        start: Option<DateTime<Utc>>,
        end: Option<DateTime<Utc>>,
    ) -> Result<Vec<TimeEntryRecord>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT id, client_id, start_time, duration_seconds, billable, description
            FROM time_entries
            WHERE client_id = ?1
              AND (?2 IS NULL OR start_time IS NULL OR start_time >= ?2)
              AND (?3 IS NULL OR start_time IS NULL OR start_time < ?3)
            ORDER BY start_time ASC, id ASC
            ",
        )?;
        let rows = stmt.query_map(
            params![
                client.as_str(),
                start.map(format_timestamp),
                end.map(format_timestamp),
            ],
            raw_entry_row,
        )?;
        let mut entries = Vec::new();
        for row in rows {
            entries.push(entry_from_raw(row?)?);
        }
        Ok(entries)
    }

    /// Writes back the billable flags of the given entries.
    pub fn update_billable_flags(&mut self, entries: &[TimeEntryRecord]) -> Result<usize, DbError> {
        if entries.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE time_entries SET billable = ? WHERE id = ?")?;
            for entry in entries {
                updated += stmt.execute(params![entry.billable, entry.id.as_str()])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    /// Lists a client's ledger rows tied to an invoice, ordered by cycle
    /// then entry.
    pub fn ledger_rows_for_invoice(
        &self,
        client: &ClientId,
        invoice: &InvoiceId,
    ) -> Result<Vec<LedgerRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT client_id, time_entry_id, invoice_id, allocation_month, seconds_consumed
            FROM prepaid_ledger
            WHERE client_id = ? AND invoice_id = ?
            ORDER BY allocation_month ASC, time_entry_id ASC
            ",
        )?;
        let rows = stmt.query_map(params![client.as_str(), invoice.as_str()], raw_ledger_row)?;
        collect_ledger_rows(rows)
    }

    /// Lists a client's ledger rows for one cycle, ordered by entry.
    pub fn ledger_rows_for_cycle(
        &self,
        client: &ClientId,
        cycle: NaiveDate,
    ) -> Result<Vec<LedgerRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT client_id, time_entry_id, invoice_id, allocation_month, seconds_consumed
            FROM prepaid_ledger
            WHERE client_id = ? AND allocation_month = ?
            ORDER BY time_entry_id ASC
            ",
        )?;
        let rows = stmt.query_map(params![client.as_str(), format_month(cycle)], raw_ledger_row)?;
        collect_ledger_rows(rows)
    }

    /// Lists all of a client's ledger rows, ordered by cycle then entry.
    pub fn ledger_rows_for_client(&self, client: &ClientId) -> Result<Vec<LedgerRow>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT client_id, time_entry_id, invoice_id, allocation_month, seconds_consumed
            FROM prepaid_ledger
            WHERE client_id = ?
            ORDER BY allocation_month ASC, time_entry_id ASC
            ",
        )?;
        let rows = stmt.query_map([client.as_str()], raw_ledger_row)?;
        collect_ledger_rows(rows)
    }
}

impl LedgerStore for Database {
    type Error = DbError;

    /// Deletes the invoice's ledger rows and restores `billable = 1` on the
    /// time entries they referenced, in one transaction committed before
    /// returning. Committing here is the idempotency flush: reads later in
    /// the same allocation run observe the reset state.
    fn reset_invoice(
        &mut self,
        client: &ClientId,
        invoice: &InvoiceId,
    ) -> Result<Vec<EntryId>, DbError> {
        let tx = self.conn.transaction()?;
        let entry_ids: Vec<String> = {
            let mut stmt = tx.prepare(
                "
                SELECT DISTINCT time_entry_id
                FROM prepaid_ledger
                WHERE client_id = ? AND invoice_id = ?
                ",
            )?;
            let rows = stmt.query_map(params![client.as_str(), invoice.as_str()], |row| {
                row.get::<_, String>(0)
            })?;
            let mut ids = Vec::new();
            for row in rows {
                ids.push(row?);
            }
            ids
        };

        tx.execute(
            "DELETE FROM prepaid_ledger WHERE client_id = ? AND invoice_id = ?",
            params![client.as_str(), invoice.as_str()],
        )?;

        if !entry_ids.is_empty() {
            let placeholders = vec!["?"; entry_ids.len()].join(", ");
            let query =
                format!("UPDATE time_entries SET billable = 1 WHERE id IN ({placeholders})");
            tx.execute(&query, params_from_iter(entry_ids.iter()))?;
        }
        tx.commit()?;

        tracing::debug!(
            invoice = invoice.as_str(),
            rows = entry_ids.len(),
            "reset invoice allocations"
        );

        entry_ids
            .into_iter()
            .map(|id| {
                EntryId::new(id.clone()).map_err(|source| DbError::InvalidRow {
                    what: "ledger",
                    id,
                    source,
                })
            })
            .collect()
    }

    fn consumed_seconds(
        &self,
        client: &ClientId,
        cycle: NaiveDate,
        exclude_invoice: Option<&InvoiceId>,
    ) -> Result<i64, DbError> {
        let seconds = match exclude_invoice {
            Some(invoice) => self.conn.query_row(
                "
                SELECT COALESCE(SUM(seconds_consumed), 0)
                FROM prepaid_ledger
                WHERE client_id = ? AND allocation_month = ?
                  AND (invoice_id IS NULL OR invoice_id <> ?)
                ",
                params![client.as_str(), format_month(cycle), invoice.as_str()],
                |row| row.get(0),
            )?,
            None => self.conn.query_row(
                "
                SELECT COALESCE(SUM(seconds_consumed), 0)
                FROM prepaid_ledger
                WHERE client_id = ? AND allocation_month = ?
                ",
                params![client.as_str(), format_month(cycle)],
                |row| row.get(0),
            )?,
        };
        Ok(seconds)
    }

    fn record(&mut self, row: LedgerRow) -> Result<(), DbError> {
        self.conn.execute(
            "
            INSERT INTO prepaid_ledger
            (client_id, time_entry_id, invoice_id, allocation_month, seconds_consumed, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
            params![
                row.client_id.as_str(),
                row.entry_id.as_str(),
                row.invoice_id.as_ref().map(InvoiceId::as_str),
                format_month(row.allocation_month),
                row.seconds_consumed,
                format_timestamp(Utc::now()),
            ],
        )?;
        Ok(())
    }
}

type RawClientRow = (String, Option<String>, bool, i64, u32);
type RawEntryRow = (String, String, Option<String>, i64, bool, Option<String>);
type RawLedgerRow = (String, String, Option<String>, String, i64);

fn raw_client_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawClientRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn raw_entry_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawEntryRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
    ))
}

fn raw_ledger_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RawLedgerRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
    ))
}

fn client_from_raw(raw: RawClientRow) -> Result<ClientRecord, DbError> {
    let (id, name, prepaid_enabled, centihours, cycle_anchor_day) = raw;
    let id = ClientId::new(id.clone()).map_err(|source| DbError::InvalidRow {
        what: "client",
        id,
        source,
    })?;
    Ok(ClientRecord {
        id,
        name,
        prepaid_enabled,
        prepaid_hours_monthly: Hours::from_centihours(centihours),
        cycle_anchor_day,
    })
}

fn entry_from_raw(raw: RawEntryRow) -> Result<TimeEntryRecord, DbError> {
    let (id, client_id, start_time, duration_seconds, billable, description) = raw;
    let start_time = start_time
        .map(|value| parse_timestamp(&value, "time entry", &id))
        .transpose()?;
    let entry_id = EntryId::new(id.clone()).map_err(|source| DbError::InvalidRow {
        what: "time entry",
        id: id.clone(),
        source,
    })?;
    let client_id = ClientId::new(client_id).map_err(|source| DbError::InvalidRow {
        what: "time entry",
        id,
        source,
    })?;
    Ok(TimeEntryRecord {
        id: entry_id,
        client_id,
        start_time,
        duration_seconds,
        billable,
        description,
    })
}

fn ledger_from_raw(raw: RawLedgerRow) -> Result<LedgerRow, DbError> {
    let (client_id, entry_id, invoice_id, month, seconds_consumed) = raw;
    let allocation_month = parse_month(&month)?;
    let client_id = ClientId::new(client_id.clone()).map_err(|source| DbError::InvalidRow {
        what: "ledger",
        id: client_id,
        source,
    })?;
    let entry_id = EntryId::new(entry_id.clone()).map_err(|source| DbError::InvalidRow {
        what: "ledger",
        id: entry_id,
        source,
    })?;
    let invoice_id = invoice_id
        .map(|id| {
            InvoiceId::new(id.clone()).map_err(|source| DbError::InvalidRow {
                what: "ledger",
                id,
                source,
            })
        })
        .transpose()?;
    Ok(LedgerRow {
        client_id,
        entry_id,
        invoice_id,
        allocation_month,
        seconds_consumed,
    })
}

fn collect_ledger_rows(
    rows: impl Iterator<Item = rusqlite::Result<RawLedgerRow>>,
) -> Result<Vec<LedgerRow>, DbError> {
    let mut out = Vec::new();
    for row in rows {
        out.push(ledger_from_raw(row?)?);
    }
    Ok(out)
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(value: &str, what: &'static str, id: &str) -> Result<DateTime<Utc>, DbError> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .map_err(|source| DbError::TimestampParse {
            what,
            id: id.to_string(),
            value: value.to_string(),
            source,
        })
}

fn format_month(month: NaiveDate) -> String {
    month.format("%Y-%m-%d").to_string()
}

fn parse_month(value: &str) -> Result<NaiveDate, DbError> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|source| DbError::MonthParse {
        value: value.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use chrono::TimeZone;
    use ph_core::AllocationEngine;

    fn client(id: &str, centihours: i64) -> ClientRecord {
        ClientRecord {
            id: ClientId::new(id).unwrap(),
            name: Some("Test client".to_string()),
            prepaid_enabled: true,
            prepaid_hours_monthly: Hours::from_centihours(centihours),
            cycle_anchor_day: 1,
        }
    }

    fn entry(id: &str, client_id: &str, start: Option<DateTime<Utc>>, seconds: i64) -> TimeEntryRecord {
        TimeEntryRecord {
            id: EntryId::new(id).unwrap(),
            client_id: ClientId::new(client_id).unwrap(),
            start_time: start,
            duration_seconds: seconds,
            billable: true,
            description: None,
        }
    }

    fn ts(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 15, 9, 0, 0)
            .single()
            .expect("valid test timestamp")
            + chrono::Duration::minutes(minutes)
    }

    fn invoice(id: &str) -> InvoiceId {
        InvoiceId::new(id).unwrap()
    }

    #[test]
    fn open_in_memory_database() {
        let db = Database::open_in_memory();
        assert!(db.is_ok());
    }

    #[test]
    fn open_creates_file_database() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("ph.db");
        let db = Database::open(&path);
        assert!(db.is_ok());
        assert!(path.exists());
    }

    #[test]
    fn schema_matches_data_model() {
        let db = Database::open_in_memory().expect("open in-memory db");

        let clients_columns = table_columns(&db.conn, "clients");
        assert_eq!(
            clients_columns,
            vec![
                "id",
                "name",
                "prepaid_enabled",
                "prepaid_centihours",
                "cycle_anchor_day",
            ]
        );

        let entries_columns = table_columns(&db.conn, "time_entries");
        assert_eq!(
            entries_columns,
            vec![
                "id",
                "client_id",
                "start_time",
                "duration_seconds",
                "billable",
                "description",
            ]
        );

        let ledger_columns = table_columns(&db.conn, "prepaid_ledger");
        assert_eq!(
            ledger_columns,
            vec![
                "id",
                "client_id",
                "time_entry_id",
                "invoice_id",
                "allocation_month",
                "seconds_consumed",
                "created_at",
            ]
        );

        let ledger_indexes = index_names(&db.conn, "prepaid_ledger");
        let expected: HashSet<String> = [
            "idx_ledger_client_month",
            "idx_ledger_invoice",
            "idx_ledger_entry",
        ]
        .into_iter()
        .map(String::from)
        .collect();
        assert!(expected.is_subset(&ledger_indexes));
    }

    fn table_columns(conn: &Connection, table: &str) -> Vec<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA table_info({table})"))
            .expect("prepare table_info");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query table_info");
        rows.map(|row| row.expect("table_info row")).collect()
    }

    fn index_names(conn: &Connection, table: &str) -> HashSet<String> {
        let mut stmt = conn
            .prepare(&format!("PRAGMA index_list({table})"))
            .expect("prepare index_list");
        let rows = stmt
            .query_map([], |row| row.get::<_, String>(1))
            .expect("query index_list");
        rows.map(|row| row.expect("index_list row")).collect()
    }

    #[test]
    fn upsert_and_get_client_roundtrip() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let mut record = client("acme", 500);
        db.upsert_client(&record).unwrap();

        let stored = db.get_client(&record.id).unwrap().expect("client exists");
        assert_eq!(stored, record);

        record.prepaid_enabled = false;
        record.prepaid_hours_monthly = Hours::from_centihours(1000);
        db.upsert_client(&record).unwrap();

        let stored = db.get_client(&record.id).unwrap().expect("client exists");
        assert_eq!(stored, record);
        assert_eq!(db.list_clients().unwrap().len(), 1);
    }

    #[test]
    fn get_client_returns_none_for_unknown() {
        let db = Database::open_in_memory().expect("open in-memory db");
        let id = ClientId::new("nobody").unwrap();
        assert!(db.get_client(&id).unwrap().is_none());
    }

    #[test]
    fn insert_entries_is_idempotent() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_client(&client("acme", 500)).unwrap();
        let record = entry("e1", "acme", Some(ts(0)), 3600);

        let inserted = db.insert_entries(&[record.clone(), record]).unwrap();
        assert_eq!(inserted, 1);

        let count: i64 = db
            .conn
            .query_row("SELECT COUNT(*) FROM time_entries", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn list_entries_orders_missing_start_first() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_client(&client("acme", 500)).unwrap();
        db.insert_entries(&[
            entry("timed-late", "acme", Some(ts(60)), 3600),
            entry("untimed", "acme", None, 1800),
            entry("timed-early", "acme", Some(ts(0)), 3600),
        ])
        .unwrap();

        let client_id = ClientId::new("acme").unwrap();
        let entries = db.list_entries(&client_id, None, None).unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["untimed", "timed-early", "timed-late"]);
    }

    #[test]
    fn list_entries_applies_time_range() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_client(&client("acme", 500)).unwrap();
        db.insert_entries(&[
            entry("in", "acme", Some(ts(0)), 3600),
            entry("out", "acme", Some(ts(120)), 3600),
        ])
        .unwrap();

        let client_id = ClientId::new("acme").unwrap();
        let entries = db
            .list_entries(&client_id, Some(ts(0)), Some(ts(60)))
            .unwrap();
        let ids: Vec<&str> = entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["in"]);
    }

    #[test]
    fn reset_invoice_deletes_rows_and_restores_flags() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_client(&client("acme", 500)).unwrap();
        let mut allocated = entry("e1", "acme", Some(ts(0)), 3600);
        allocated.billable = false;
        db.insert_entries(&[allocated, entry("e2", "acme", Some(ts(60)), 3600)])
            .unwrap();

        let client_id = ClientId::new("acme").unwrap();
        let cycle = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        db.record(LedgerRow {
            client_id: client_id.clone(),
            entry_id: EntryId::new("e1").unwrap(),
            invoice_id: Some(invoice("inv-a")),
            allocation_month: cycle,
            seconds_consumed: 3600,
        })
        .unwrap();
        db.record(LedgerRow {
            client_id: client_id.clone(),
            entry_id: EntryId::new("e2").unwrap(),
            invoice_id: Some(invoice("inv-b")),
            allocation_month: cycle,
            seconds_consumed: 1800,
        })
        .unwrap();

        let restored = db.reset_invoice(&client_id, &invoice("inv-a")).unwrap();
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].as_str(), "e1");

        // inv-a's row is gone; inv-b's row survives.
        assert!(
            db.ledger_rows_for_invoice(&client_id, &invoice("inv-a"))
                .unwrap()
                .is_empty()
        );
        assert_eq!(
            db.ledger_rows_for_invoice(&client_id, &invoice("inv-b"))
                .unwrap()
                .len(),
            1
        );

        // e1's billable flag came back.
        let entries = db.list_entries(&client_id, None, None).unwrap();
        let e1 = entries.iter().find(|e| e.id.as_str() == "e1").unwrap();
        assert!(e1.billable);
    }

    #[test]
    fn ledger_rows_for_invoice_are_scoped_to_the_client() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_client(&client("acme", 500)).unwrap();
        db.upsert_client(&client("globex", 500)).unwrap();
        let cycle = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        // Two clients sharing an invoice ID.
        for client_id in ["acme", "globex"] {
            db.record(LedgerRow {
                client_id: ClientId::new(client_id).unwrap(),
                entry_id: EntryId::new("e1").unwrap(),
                invoice_id: Some(invoice("inv-1")),
                allocation_month: cycle,
                seconds_consumed: 3600,
            })
            .unwrap();
        }

        let acme = ClientId::new("acme").unwrap();
        let rows = db.ledger_rows_for_invoice(&acme, &invoice("inv-1")).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].client_id, acme);
    }

    #[test]
    fn consumed_seconds_excludes_the_given_invoice() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        db.upsert_client(&client("acme", 500)).unwrap();
        let client_id = ClientId::new("acme").unwrap();
        let cycle = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();

        for (entry_id, invoice_id, seconds) in [
            ("e1", Some(invoice("inv-a")), 3600),
            ("e2", Some(invoice("inv-b")), 1800),
            ("e3", None, 900),
        ] {
            db.record(LedgerRow {
                client_id: client_id.clone(),
                entry_id: EntryId::new(entry_id).unwrap(),
                invoice_id,
                allocation_month: cycle,
                seconds_consumed: seconds,
            })
            .unwrap();
        }

        assert_eq!(db.consumed_seconds(&client_id, cycle, None).unwrap(), 6300);
        assert_eq!(
            db.consumed_seconds(&client_id, cycle, Some(&invoice("inv-a")))
                .unwrap(),
            2700
        );
        // Other cycles are empty.
        let other = NaiveDate::from_ymd_opt(2025, 2, 1).unwrap();
        assert_eq!(db.consumed_seconds(&client_id, other, None).unwrap(), 0);
    }

    #[test]
    fn engine_recompute_is_idempotent_against_sqlite() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let record = client("acme", 500);
        db.upsert_client(&record).unwrap();
        db.insert_entries(&[
            entry("e1", "acme", Some(ts(0)), 3 * 3600),
            entry("e2", "acme", Some(ts(60)), 4 * 3600),
        ])
        .unwrap();
        let client_id = record.id.clone();

        let mut run = |db: &mut Database| {
            let mut entries = db.list_entries(&client_id, None, None).unwrap();
            let outcome = AllocationEngine::new(Some(&record), Some(invoice("inv-a")), db)
                .process(&mut entries)
                .unwrap();
            db.update_billable_flags(&entries).unwrap();
            outcome
        };

        let first = run(&mut db);
        let rows_after_first = db
            .ledger_rows_for_invoice(&client_id, &invoice("inv-a"))
            .unwrap();
        let flags_after_first: Vec<bool> = db
            .list_entries(&client_id, None, None)
            .unwrap()
            .iter()
            .map(|e| e.billable)
            .collect();

        let second = run(&mut db);
        let rows_after_second = db
            .ledger_rows_for_invoice(&client_id, &invoice("inv-a"))
            .unwrap();
        let flags_after_second: Vec<bool> = db
            .list_entries(&client_id, None, None)
            .unwrap()
            .iter()
            .map(|e| e.billable)
            .collect();

        assert_eq!(first, second);
        assert_eq!(rows_after_first, rows_after_second);
        assert_eq!(flags_after_first, flags_after_second);
        assert_eq!(rows_after_first.len(), 2);

        let total_seconds: i64 = rows_after_first.iter().map(|r| r.seconds_consumed).sum();
        assert_eq!(total_seconds, 18_000);
    }

    #[test]
    fn engine_sees_other_invoices_as_competing() {
        let mut db = Database::open_in_memory().expect("open in-memory db");
        let record = client("acme", 500);
        db.upsert_client(&record).unwrap();
        db.insert_entries(&[
            entry("a1", "acme", Some(ts(0)), 3 * 3600),
            entry("b1", "acme", Some(ts(60)), 3 * 3600),
        ])
        .unwrap();
        let client_id = record.id.clone();

        let mut entries_a = db.list_entries(&client_id, None, Some(ts(30))).unwrap();
        AllocationEngine::new(Some(&record), Some(invoice("inv-a")), &mut db)
            .process(&mut entries_a)
            .unwrap();
        db.update_billable_flags(&entries_a).unwrap();

        let mut entries_b = db.list_entries(&client_id, Some(ts(30)), None).unwrap();
        let outcome = AllocationEngine::new(Some(&record), Some(invoice("inv-b")), &mut db)
            .process(&mut entries_b)
            .unwrap();

        // Invoice A claimed 3.00 h; B gets only the 2.00 h residual.
        assert_eq!(
            outcome.entries[0].prepaid_hours,
            Hours::from_centihours(200)
        );
        assert_eq!(
            outcome.entries[0].billable_hours,
            Hours::from_centihours(100)
        );
    }
}
