//! SQLite cache of product records.
//!
//! Products fetched from the backend are kept locally so the dashboard and
//! the product screens have something to show before (or without) the
//! network. The database is stored at `<data dir>/unicorns.db`.

use anyhow::Result;
use chrono::DateTime;
use rusqlite::{Connection, Row, params};
use std::path::{Path, PathBuf};

use crate::models::{Category, Product};

const PRODUCT_COLUMNS: &str = "id, company, category, summary, logo_url, updated_at";

/// Product cache backed by SQLite
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Get the database file path
    pub fn db_path() -> Result<PathBuf> {
        let dirs = directories::ProjectDirs::from("com", "unicorns", "Unicorns")
            .ok_or_else(|| anyhow::anyhow!("Could not determine data directory"))?;

        let data_dir = dirs.data_dir();
        std::fs::create_dir_all(data_dir)?;

        Ok(data_dir.join("unicorns.db"))
    }

    /// Open or create the database at the default location
    pub fn open() -> Result<Self> {
        Self::open_at(&Self::db_path()?)
    }

    pub fn open_at(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        let db = Self { conn };
        db.init_schema()?;

        tracing::info!("Opened database at {:?}", path);
        Ok(db)
    }

    /// Initialize the database schema
    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS products (
                id INTEGER PRIMARY KEY,
                company TEXT NOT NULL,
                category TEXT NOT NULL,
                summary TEXT,
                logo_url TEXT,
                updated_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_products_updated ON products(updated_at);
            ",
        )?;
        Ok(())
    }

    /// All cached products, by id
    pub fn all(&self) -> Result<Vec<Product>> {
        self.query(&format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id"), [])
    }

    /// A page of products, by id
    pub fn select(&self, offset: usize, count: usize) -> Result<Vec<Product>> {
        self.query(
            &format!("SELECT {PRODUCT_COLUMNS} FROM products ORDER BY id LIMIT ? OFFSET ?"),
            params![count as i64, offset as i64],
        )
    }

    /// A page of products, most recently updated first
    pub fn select_newest(&self, offset: usize, count: usize) -> Result<Vec<Product>> {
        self.query(
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY updated_at DESC, id LIMIT ? OFFSET ?"
            ),
            params![count as i64, offset as i64],
        )
    }

    /// A page of products, least recently updated first
    pub fn select_oldest(&self, offset: usize, count: usize) -> Result<Vec<Product>> {
        self.query(
            &format!(
                "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY updated_at ASC, id LIMIT ? OFFSET ?"
            ),
            params![count as i64, offset as i64],
        )
    }

    pub fn count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM products", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    /// Look up a single product
    pub fn one(&self, id: i64) -> Result<Option<Product>> {
        let mut stmt = self
            .conn
            .prepare(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?"))?;

        match stmt.query_row(params![id], product_from_row) {
            Ok(product) => Ok(Some(product)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert products, replacing any cached record with the same id
    pub fn insert(&self, products: &[Product]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT OR REPLACE INTO products ({PRODUCT_COLUMNS}) VALUES (?, ?, ?, ?, ?, ?)"
            ))?;
            for product in products {
                stmt.execute(params![
                    product.id,
                    product.company,
                    product.category.key(),
                    product.summary,
                    product.logo_url,
                    product.updated_at.timestamp_millis(),
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!("Cached {} products", products.len());
        Ok(())
    }

    /// Update already cached products. Returns how many rows changed;
    /// products that are not cached are ignored.
    pub fn update(&self, products: &[Product]) -> Result<usize> {
        let tx = self.conn.unchecked_transaction()?;
        let mut changed = 0;
        {
            let mut stmt = tx.prepare(
                "UPDATE products
                 SET company = ?, category = ?, summary = ?, logo_url = ?, updated_at = ?
                 WHERE id = ?",
            )?;
            for product in products {
                changed += stmt.execute(params![
                    product.company,
                    product.category.key(),
                    product.summary,
                    product.logo_url,
                    product.updated_at.timestamp_millis(),
                    product.id,
                ])?;
            }
        }
        tx.commit()?;
        Ok(changed)
    }

    /// Remove one product. Returns whether it was cached.
    pub fn delete(&self, id: i64) -> Result<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM products WHERE id = ?", params![id])?;
        Ok(removed > 0)
    }

    /// Remove every cached product
    pub fn clear(&self) -> Result<usize> {
        let removed = self.conn.execute("DELETE FROM products", [])?;
        tracing::info!("Cleared {} cached products", removed);
        Ok(removed)
    }

    fn query<P: rusqlite::Params>(&self, sql: &str, params: P) -> Result<Vec<Product>> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, product_from_row)?;
        Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
    }
}

fn product_from_row(row: &Row<'_>) -> rusqlite::Result<Product> {
    let category: String = row.get(2)?;
    let updated_millis: i64 = row.get(5)?;
    Ok(Product {
        id: row.get(0)?,
        company: row.get(1)?,
        category: Category::from_key(&category),
        summary: row.get(3)?,
        logo_url: row.get(4)?,
        updated_at: DateTime::from_timestamp_millis(updated_millis).unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::product;

    fn database() -> Database {
        // Create in-memory database for testing
        let conn = Connection::open_in_memory().unwrap();
        let db = Database { conn };
        db.init_schema().unwrap();
        db
    }

    #[test]
    fn test_insert_and_lookup() {
        let db = database();
        db.insert(&[product(1, "Acme"), product(2, "Globex")]).unwrap();

        assert_eq!(db.count().unwrap(), 2);
        assert_eq!(db.one(2).unwrap(), Some(product(2, "Globex")));
        assert_eq!(db.one(3).unwrap(), None);
    }

    #[test]
    fn test_insert_replaces_on_conflict() {
        let db = database();
        db.insert(&[product(1, "Acme")]).unwrap();
        db.insert(&[product(1, "Acme Rebranded")]).unwrap();

        assert_eq!(db.count().unwrap(), 1);
        assert_eq!(db.one(1).unwrap().unwrap().company, "Acme Rebranded");
    }

    #[test]
    fn test_paging_orders() {
        let db = database();
        // Fixture timestamps grow with the id
        db.insert(&[product(2, "B"), product(3, "C"), product(1, "A")]).unwrap();

        let ids = |products: Vec<Product>| products.iter().map(|p| p.id).collect::<Vec<_>>();
        assert_eq!(ids(db.all().unwrap()), vec![1, 2, 3]);
        assert_eq!(ids(db.select(1, 5).unwrap()), vec![2, 3]);
        assert_eq!(ids(db.select_newest(0, 2).unwrap()), vec![3, 2]);
        assert_eq!(ids(db.select_oldest(0, 2).unwrap()), vec![1, 2]);
        assert!(db.select(10, 5).unwrap().is_empty());
    }

    #[test]
    fn test_update_only_touches_cached_rows() {
        let db = database();
        db.insert(&[product(1, "Acme")]).unwrap();

        let mut changed = product(1, "Acme");
        changed.summary = Some("Rockets".to_string());
        let count = db.update(&[changed, product(9, "Missing")]).unwrap();

        assert_eq!(count, 1);
        assert_eq!(db.one(1).unwrap().unwrap().summary.as_deref(), Some("Rockets"));
        assert_eq!(db.one(9).unwrap(), None);
    }

    #[test]
    fn test_delete_and_clear() {
        let db = database();
        db.insert(&[product(1, "A"), product(2, "B"), product(3, "C")]).unwrap();

        assert!(db.delete(2).unwrap());
        assert!(!db.delete(2).unwrap());
        assert_eq!(db.count().unwrap(), 2);

        assert_eq!(db.clear().unwrap(), 2);
        assert_eq!(db.count().unwrap(), 0);
    }

    #[test]
    fn test_open_at_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("cache.db");
        {
            let db = Database::open_at(&path).unwrap();
            db.insert(&[product(5, "Persisted")]).unwrap();
        }
        let db = Database::open_at(&path).unwrap();
        assert_eq!(db.one(5).unwrap().unwrap().company, "Persisted");
    }
}
