use std::path::PathBuf;

use sqlx::{PgPool, migrate::Migrator};

use crate::store::{JsonStore, MemoryStore};

/// Compile-time discovered SQLx migrations for the `deathraid-database` crate.
pub static MIGRATOR: Migrator = sqlx::migrate!();

#[derive(Clone, Debug)]
pub(crate) enum Backend {
    Postgres(PgPool),
    Json(JsonStore),
    Memory(MemoryStore),
}

/// Shared persistence handle passed across crates.
#[derive(Clone, Debug)]
pub struct Database {
    backend: Backend,
}

impl Database {
    /// Persist into PostgreSQL through an existing pool.
    pub fn postgres(pool: PgPool) -> Self {
        Self {
            backend: Backend::Postgres(pool),
        }
    }

    /// Persist as JSON snapshots under `dir`.
    pub fn json(dir: impl Into<PathBuf>) -> Self {
        Self {
            backend: Backend::Json(JsonStore::new(dir)),
        }
    }

    /// Keep snapshots in process memory only.
    pub fn memory(store: MemoryStore) -> Self {
        Self {
            backend: Backend::Memory(store),
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match &self.backend {
            Backend::Postgres(_) => "postgres",
            Backend::Json(_) => "json",
            Backend::Memory(_) => "memory",
        }
    }

    pub(crate) fn backend(&self) -> &Backend {
        &self.backend
    }
}
