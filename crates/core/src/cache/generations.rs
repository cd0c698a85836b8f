//! Generation identity and CRUD.
//!
//! A generation is one versioned, named instance of the cache. At most one
//! is promoted (current) at a time; promotion is recorded in the store so
//! a restarted process can recover which generation was serving before a
//! failed install.

use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;
use tokio_rusqlite::rusqlite;

use super::connection::CacheStore;
use crate::Error;

/// Identity of one cache generation, rendered as `prefix@version`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Generation(String);

impl Generation {
    pub fn new(prefix: &str, version: &str) -> Self {
        Self(format!("{prefix}@{version}"))
    }

    pub fn from_name(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl CacheStore {
    /// Create the generation row if absent. Idempotent.
    pub async fn open_generation(&self, generation: &Generation) -> Result<(), Error> {
        let name = generation.name().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO generations (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All generations currently present, oldest first.
    pub async fn list_generations(&self) -> Result<Vec<Generation>, Error> {
        self.conn
            .call(move |conn| -> Result<Vec<Generation>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM generations ORDER BY created_at, name")?;
                let names = stmt
                    .query_map([], |row| row.get::<_, String>(0))?
                    .collect::<Result<Vec<_>, rusqlite::Error>>()?;
                Ok(names.into_iter().map(Generation::from_name).collect())
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a generation; its entries cascade away with it.
    pub async fn delete_generation(&self, generation: &Generation) -> Result<(), Error> {
        let name = generation.name().to_string();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute("DELETE FROM generations WHERE name = ?1", params![name])?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// Promote a generation to current, demoting any other.
    pub async fn set_current(&self, generation: &Generation) -> Result<(), Error> {
        let name = generation.name().to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                tx.execute("UPDATE generations SET promoted_at = NULL WHERE promoted_at IS NOT NULL", [])?;
                let updated = tx.execute(
                    "UPDATE generations SET promoted_at = ?1 WHERE name = ?2",
                    params![now, name],
                )?;
                if updated == 0 {
                    return Err(Error::InvalidInput(format!("unknown generation: {name}")));
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// The promoted generation, if any survives in the store.
    pub async fn current_generation(&self) -> Result<Option<Generation>, Error> {
        self.conn
            .call(move |conn| -> Result<Option<Generation>, Error> {
                let result = conn.query_row(
                    "SELECT name FROM generations WHERE promoted_at IS NOT NULL ORDER BY promoted_at DESC LIMIT 1",
                    [],
                    |row| row.get::<_, String>(0),
                );
                match result {
                    Ok(name) => Ok(Some(Generation::from_name(name))),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_open_generation_idempotent() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let generation = Generation::new("site", "1");
        store.open_generation(&generation).await.unwrap();
        store.open_generation(&generation).await.unwrap();

        let all = store.list_generations().await.unwrap();
        assert_eq!(all, vec![generation]);
    }

    #[tokio::test]
    async fn test_delete_generation() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let old = Generation::new("site", "1");
        let new = Generation::new("site", "2");
        store.open_generation(&old).await.unwrap();
        store.open_generation(&new).await.unwrap();

        store.delete_generation(&old).await.unwrap();

        let all = store.list_generations().await.unwrap();
        assert_eq!(all, vec![new]);
    }

    #[tokio::test]
    async fn test_set_current_demotes_previous() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let first = Generation::new("site", "1");
        let second = Generation::new("site", "2");
        store.open_generation(&first).await.unwrap();
        store.open_generation(&second).await.unwrap();

        store.set_current(&first).await.unwrap();
        assert_eq!(store.current_generation().await.unwrap(), Some(first));

        store.set_current(&second).await.unwrap();
        assert_eq!(store.current_generation().await.unwrap(), Some(second));
    }

    #[tokio::test]
    async fn test_set_current_unknown_generation() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let ghost = Generation::new("site", "9");
        let result = store.set_current(&ghost).await;
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_current_generation_empty_store() {
        let store = CacheStore::open_in_memory().await.unwrap();
        assert_eq!(store.current_generation().await.unwrap(), None);
    }

    #[test]
    fn test_generation_display() {
        let generation = Generation::new("overcast", "0.1.3");
        assert_eq!(generation.to_string(), "overcast@0.1.3");
    }
}
