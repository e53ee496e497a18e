// src/order_store.rs

use crate::assemble::DerivedManufacturingRecord;
use crate::order::OrderHeader;
use rusqlite::{Connection, Result as SqliteResult, params};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::info;

pub struct OrderStore {
    conn: Connection,
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredOrder {
    pub uid: String,
    pub filename: String,
    pub order_no: Option<String>,
    pub order_date: Option<String>,
    pub customer: Option<String>,
    pub record_count: usize,
    pub excluded_count: usize,
}

impl StoredOrder {
    pub fn new(
        uid: String,
        filename: impl Into<String>,
        header: &OrderHeader,
        record_count: usize,
        excluded_count: usize,
    ) -> Self {
        Self {
            uid,
            filename: filename.into(),
            order_no: header.order_no.clone(),
            order_date: header.order_date.clone(),
            customer: header.customer.clone(),
            record_count,
            excluded_count,
        }
    }
}

impl OrderStore {
    /// Open (or create) the store with SQLite backend
    pub fn new<P: AsRef<Path>>(db_path: P) -> SqliteResult<Self> {
        Self::init(Connection::open(db_path)?)
    }

    #[cfg(test)]
    pub fn in_memory() -> SqliteResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> SqliteResult<Self> {
        conn.execute_batch(
            "PRAGMA foreign_keys = ON;

             CREATE TABLE IF NOT EXISTS orders (
                uid TEXT PRIMARY KEY,
                filename TEXT NOT NULL,
                order_no TEXT,
                order_date TEXT,
                customer TEXT,
                record_count INTEGER NOT NULL DEFAULT 0,
                excluded_count INTEGER NOT NULL DEFAULT 0,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
             );

             CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                order_uid TEXT NOT NULL,
                position INTEGER NOT NULL,
                core_type TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (order_uid) REFERENCES orders(uid) ON DELETE CASCADE,
                UNIQUE (order_uid, position)
             );

             CREATE INDEX IF NOT EXISTS idx_orders_order_no ON orders(order_no);
             CREATE INDEX IF NOT EXISTS idx_records_order_uid ON records(order_uid);",
        )?;

        info!("Order store initialized");
        Ok(Self { conn })
    }

    /// Content hash of the source document, so the same PDF is recognised
    /// whatever its file name.
    pub fn generate_uid(content: &[u8]) -> String {
        let mut hasher = Sha256::new();
        hasher.update(content);
        format!("{:x}", hasher.finalize())
    }

    pub fn is_known(&self, uid: &str) -> SqliteResult<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM orders WHERE uid = ?1",
            params![uid],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Store an order and replace its records in one transaction. On any
    /// failure nothing is written, so the order stays unknown and is
    /// retried on the next run.
    pub fn save_order(
        &mut self,
        order: &StoredOrder,
        records: &[DerivedManufacturingRecord],
    ) -> Result<usize, Box<dyn std::error::Error>> {
        let tx = self.conn.transaction()?;
        upsert_order(&tx, order)?;
        replace_records(&tx, &order.uid, records)?;
        tx.commit()?;
        info!(
            uid = %order.uid,
            order_no = ?order.order_no,
            records = records.len(),
            "Order stored"
        );
        Ok(records.len())
    }

    /// Stored record payloads of an order, by original position.
    pub fn records_for_order(&self, order_uid: &str) -> SqliteResult<Vec<(usize, String)>> {
        let mut stmt = self.conn.prepare(
            "SELECT position, payload FROM records WHERE order_uid = ?1 ORDER BY position",
        )?;
        let rows = stmt.query_map(params![order_uid], |row| {
            let position: i64 = row.get(0)?;
            Ok((position as usize, row.get(1)?))
        })?;
        rows.collect()
    }

    pub fn get_order(&self, uid: &str) -> SqliteResult<Option<StoredOrder>> {
        let mut stmt = self.conn.prepare(
            "SELECT uid, filename, order_no, order_date, customer, record_count, excluded_count
             FROM orders
             WHERE uid = ?1",
        )?;
        let mut rows = stmt.query(params![uid])?;
        match rows.next()? {
            Some(row) => Ok(Some(StoredOrder {
                uid: row.get(0)?,
                filename: row.get(1)?,
                order_no: row.get(2)?,
                order_date: row.get(3)?,
                customer: row.get(4)?,
                record_count: row.get::<_, i64>(5)? as usize,
                excluded_count: row.get::<_, i64>(6)? as usize,
            })),
            None => Ok(None),
        }
    }

    /// (orders, records, records per core type label)
    pub fn get_counts(&self) -> SqliteResult<(usize, usize, Vec<(String, usize)>)> {
        let orders: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM orders", [], |row| row.get(0))?;
        let records: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM records", [], |row| row.get(0))?;

        let mut stmt = self.conn.prepare(
            "SELECT core_type, COUNT(*) FROM records GROUP BY core_type ORDER BY COUNT(*) DESC, core_type",
        )?;
        let per_core = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get(0)?, count as usize))
            })?
            .collect::<SqliteResult<Vec<_>>>()?;

        Ok((orders as usize, records as usize, per_core))
    }
}

fn upsert_order(conn: &Connection, order: &StoredOrder) -> SqliteResult<()> {
    conn.execute(
        "INSERT INTO orders
            (uid, filename, order_no, order_date, customer, record_count, excluded_count)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(uid) DO UPDATE SET
            filename = excluded.filename,
            order_no = excluded.order_no,
            order_date = excluded.order_date,
            customer = excluded.customer,
            record_count = excluded.record_count,
            excluded_count = excluded.excluded_count",
        params![
            order.uid,
            order.filename,
            order.order_no,
            order.order_date,
            order.customer,
            order.record_count as i64,
            order.excluded_count as i64,
        ],
    )?;
    Ok(())
}

fn replace_records(
    conn: &Connection,
    order_uid: &str,
    records: &[DerivedManufacturingRecord],
) -> Result<(), Box<dyn std::error::Error>> {
    conn.execute("DELETE FROM records WHERE order_uid = ?1", params![order_uid])?;
    for record in records {
        let payload = serde_json::to_string(record)?;
        conn.execute(
            "INSERT INTO records (order_uid, position, core_type, payload)
             VALUES (?1, ?2, ?3, ?4)",
            params![
                order_uid,
                record.position as i64,
                record.core_type.label(),
                payload
            ],
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assemble::Assembler;
    use crate::order::Article;
    use crate::reference::ReferenceTables;

    fn sample_records() -> Vec<DerivedManufacturingRecord> {
        let dir = tempfile::tempdir().unwrap();
        let tables = ReferenceTables::load(dir.path());
        Assembler::new(&tables, &[])
            .assemble(&[
                Article::new("MATELAS LATEX NATUREL 90x200", 2),
                Article::new("PROTEGE MATELAS", 1),
                Article::new("MATELAS SELECT 43 140x190", 1),
            ])
            .records
    }

    #[test]
    fn test_uid_generation() {
        let uid1 = OrderStore::generate_uid(b"%PDF-1.4 order 1");
        let uid2 = OrderStore::generate_uid(b"%PDF-1.4 order 1");
        let uid3 = OrderStore::generate_uid(b"%PDF-1.4 order 2");

        assert_eq!(uid1, uid2); // Same inputs = same hash
        assert_ne!(uid1, uid3); // Different inputs = different hash
        assert_eq!(uid1.len(), 64);
    }

    #[test]
    fn test_order_roundtrip_and_known() {
        let mut store = OrderStore::in_memory().unwrap();
        let uid = OrderStore::generate_uid(b"pdf");
        assert!(!store.is_known(&uid).unwrap());

        let header = OrderHeader {
            order_no: Some("2024-118".into()),
            order_date: None,
            customer: Some("Hôtel des Pins".into()),
        };
        let order = StoredOrder::new(uid.clone(), "commande.pdf", &header, 0, 1);
        store.save_order(&order, &[]).unwrap();

        assert!(store.is_known(&uid).unwrap());
        assert_eq!(store.get_order(&uid).unwrap(), Some(order));
    }

    #[test]
    fn test_records_keep_positions_and_replace() {
        let mut store = OrderStore::in_memory().unwrap();
        let uid = OrderStore::generate_uid(b"pdf");
        let order = StoredOrder::new(uid.clone(), "a.pdf", &OrderHeader::default(), 2, 1);

        let records = sample_records();
        assert_eq!(store.save_order(&order, &records).unwrap(), 2);
        // Saving again replaces instead of duplicating.
        store.save_order(&order, &records).unwrap();

        let stored = store.records_for_order(&uid).unwrap();
        let positions: Vec<usize> = stored.iter().map(|(p, _)| *p).collect();
        assert_eq!(positions, vec![1, 3]);
        assert!(stored[0].1.contains("\"NATURAL_LATEX\""));

        let (orders, total, per_core) = store.get_counts().unwrap();
        assert_eq!((orders, total), (1, 2));
        assert_eq!(per_core.len(), 2);
    }

    #[test]
    fn test_failed_record_write_leaves_order_unknown() {
        let mut store = OrderStore::in_memory().unwrap();
        let uid = OrderStore::generate_uid(b"pdf");
        let order = StoredOrder::new(uid.clone(), "a.pdf", &OrderHeader::default(), 2, 0);

        // Two records at the same position violate UNIQUE(order_uid, position).
        let mut records = sample_records();
        records[1].position = records[0].position;
        assert!(store.save_order(&order, &records).is_err());

        assert!(!store.is_known(&uid).unwrap());
        assert!(store.records_for_order(&uid).unwrap().is_empty());
        assert_eq!(store.get_counts().unwrap().0, 0);

        // The same order goes through on a later attempt.
        store.save_order(&order, &sample_records()).unwrap();
        assert!(store.is_known(&uid).unwrap());
    }
}
