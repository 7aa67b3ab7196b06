//! Persistence seams. Handlers only see the [`Store`] trait object; the
//! concrete backend is picked at start-up by [`connect`].

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use log::{info, warn};
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

use crate::config::Config;
use crate::models::employee::Employee;
use crate::models::user::User;
use crate::query::{EmployeeCounts, EmployeeQuery};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A value that must be unique across its collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueField {
    EmployeeId,
    EmployeeEmail,
    Username,
    UserEmail,
}

impl UniqueField {
    pub fn field(self) -> &'static str {
        match self {
            UniqueField::EmployeeId => "employee_id",
            UniqueField::EmployeeEmail | UniqueField::UserEmail => "email",
            UniqueField::Username => "username",
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            UniqueField::EmployeeId => "An employee with this ID already exists.",
            UniqueField::EmployeeEmail => "An employee with this email already exists.",
            UniqueField::Username => "Username already exists",
            UniqueField::UserEmail => "Email already exists",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("{} is already taken", .0.field())]
    Conflict(UniqueField),
    #[error("record not found")]
    NotFound,
    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        StoreError::Backend(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for StoreError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        StoreError::Backend(err.to_string())
    }
}

/// Which unique values are already held by another record.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Conflicts {
    pub employee_id: bool,
    pub email: bool,
}

#[async_trait]
pub trait EmployeeStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] if `employee_id` or `email` is taken.
    async fn insert_employee(&self, employee: Employee) -> Result<Employee, StoreError>;

    async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>, StoreError>;

    /// Overwrites the record with the same `id`; uniqueness is re-checked
    /// against every other record.
    async fn update_employee(&self, employee: Employee) -> Result<Employee, StoreError>;

    /// Returns the removed record, or `None` if nothing had that id.
    async fn delete_employee(&self, id: Uuid) -> Result<Option<Employee>, StoreError>;

    /// Total number of matches and the requested page of them.
    async fn list_employees(&self, query: &EmployeeQuery) -> Result<(u64, Vec<Employee>), StoreError>;

    async fn employee_counts(&self) -> Result<EmployeeCounts, StoreError>;

    async fn find_employee_conflicts(
        &self,
        employee_id: Option<&str>,
        email: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<Conflicts, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Fails with [`StoreError::Conflict`] on a taken username or non-empty email.
    async fn insert_user(&self, user: User) -> Result<User, StoreError>;

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError>;

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError>;

    /// Returns the fields among `username` and `email` already in use.
    async fn find_user_conflicts(&self, username: &str, email: &str) -> Result<Vec<UniqueField>, StoreError>;
}

#[async_trait]
pub trait TokenBlacklist: Send + Sync {
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError>;

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError>;
}

/// Everything the HTTP layer needs from persistence.
pub trait Store: EmployeeStore + UserStore + TokenBlacklist {}

impl<T> Store for T where T: EmployeeStore + UserStore + TokenBlacklist {}

/// Opens the Postgres store when `DATABASE_URL` is configured and runs the
/// embedded migrations; otherwise falls back to the in-memory store.
pub async fn connect(config: &Config) -> Result<Arc<dyn Store>, StoreError> {
    match &config.database_url {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(10)
                .connect(database_url)
                .await?;
            sqlx::migrate!("./migrations").run(&pool).await?;
            info!("Connected to Postgres and applied migrations");
            Ok(Arc::new(PgStore::new(pool)))
        }
        None => {
            warn!("DATABASE_URL is not set; records are kept in memory and lost on restart");
            Ok(Arc::new(MemoryStore::new()))
        }
    }
}
