//! Shared fixtures for the integration tests.
//!
//! Independent `Database` instances on one SQLite file stand in for
//! separate order stations.

#![allow(dead_code)]

use std::env;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use bestell_core::NewCharge;
use bestell_db::{Database, DbConfig};
use uuid::Uuid;

/// A SQLite file in the temp dir, removed with its WAL files on drop.
pub struct TempDb {
    pub path: PathBuf,
}

impl TempDb {
    pub fn new() -> Self {
        TempDb {
            path: env::temp_dir().join(format!("bestell-test-{}.db", Uuid::new_v4())),
        }
    }

    pub fn config(&self) -> DbConfig {
        DbConfig::new(&self.path)
            .max_connections(2)
            .min_connections(0)
            .busy_timeout(Duration::from_secs(60))
            .connect_timeout(Duration::from_secs(60))
    }

    /// First instance; creates the schema.
    pub async fn open(&self) -> Database {
        Database::new(self.config()).await.unwrap()
    }

    /// `count` more instances sharing the file, like separate processes.
    pub async fn open_many(&self, count: usize) -> Vec<Database> {
        let mut instances = Vec::with_capacity(count);
        for _ in 0..count {
            instances.push(
                Database::new(self.config().initialize_schema(false))
                    .await
                    .unwrap(),
            );
        }
        instances
    }
}

impl Drop for TempDb {
    fn drop(&mut self) {
        for suffix in ["", "-wal", "-shm"] {
            let mut file = self.path.clone().into_os_string();
            file.push(suffix);
            let _ = fs::remove_file(file);
        }
    }
}

/// PostgreSQL URL for the optional backend tests.
pub fn postgres_url() -> Option<String> {
    env::var("BESTELL_TEST_DATABASE_URL")
        .ok()
        .filter(|url| !url.trim().is_empty())
}

/// Short random suffix so PostgreSQL runs don't see each other's rows.
pub fn unique(prefix: &str) -> String {
    format!("{}_{}", prefix, &Uuid::new_v4().simple().to_string()[..12])
}

pub fn lot(product: &str, color: &str, size: &str, amount: i64) -> NewCharge {
    NewCharge {
        product_name: product.to_string(),
        supplier_name: None,
        color: color.to_string(),
        size: size.to_string(),
        manufacturer: "Kahla".to_string(),
        external_id: None,
        delivery_date: "2026-01-15".to_string(),
        amount,
    }
}
