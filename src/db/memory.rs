//! In-memory store for tests and database-less development runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{Conflicts, EmployeeStore, StoreError, TokenBlacklist, UniqueField, UserStore};
use crate::models::employee::{Employee, EmploymentStatus};
use crate::models::user::User;
use crate::query::{EmployeeCounts, EmployeeQuery};

#[derive(Default)]
struct Tables {
    employees: HashMap<Uuid, Employee>,
    users: HashMap<Uuid, User>,
    revoked: HashMap<Uuid, DateTime<Utc>>,
}

impl Tables {
    fn employee_conflicts(&self, employee_id: Option<&str>, email: Option<&str>, exclude: Option<Uuid>) -> Conflicts {
        let others = || self.employees.values().filter(|e| Some(e.id) != exclude);
        Conflicts {
            employee_id: employee_id.is_some_and(|id| others().any(|e| e.employee_id == id)),
            email: email.is_some_and(|email| others().any(|e| e.email == email)),
        }
    }

    fn check_employee(&self, employee: &Employee) -> Result<(), StoreError> {
        let conflicts = self.employee_conflicts(
            Some(&employee.employee_id),
            Some(&employee.email),
            Some(employee.id),
        );
        if conflicts.employee_id {
            return Err(StoreError::Conflict(UniqueField::EmployeeId));
        }
        if conflicts.email {
            return Err(StoreError::Conflict(UniqueField::EmployeeEmail));
        }
        Ok(())
    }

    fn user_conflicts(&self, username: &str, email: &str) -> Vec<UniqueField> {
        let mut taken = Vec::new();
        if self.users.values().any(|u| u.username == username) {
            taken.push(UniqueField::Username);
        }
        if !email.is_empty() && self.users.values().any(|u| u.email == email) {
            taken.push(UniqueField::UserEmail);
        }
        taken
    }
}

/// Thread-safe store backed by hash maps behind one `RwLock`, so every write
/// checks uniqueness and mutates under the same guard.
#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<RwLock<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Tables>, StoreError> {
        self.tables
            .read()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire read lock: {}", e)))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Tables>, StoreError> {
        self.tables
            .write()
            .map_err(|e| StoreError::Backend(format!("Failed to acquire write lock: {}", e)))
    }
}

#[async_trait]
impl EmployeeStore for MemoryStore {
    async fn insert_employee(&self, employee: Employee) -> Result<Employee, StoreError> {
        let mut tables = self.write()?;
        tables.check_employee(&employee)?;
        tables.employees.insert(employee.id, employee.clone());
        Ok(employee)
    }

    async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>, StoreError> {
        Ok(self.read()?.employees.get(&id).cloned())
    }

    async fn update_employee(&self, employee: Employee) -> Result<Employee, StoreError> {
        let mut tables = self.write()?;
        if !tables.employees.contains_key(&employee.id) {
            return Err(StoreError::NotFound);
        }
        tables.check_employee(&employee)?;
        tables.employees.insert(employee.id, employee.clone());
        Ok(employee)
    }

    async fn delete_employee(&self, id: Uuid) -> Result<Option<Employee>, StoreError> {
        Ok(self.write()?.employees.remove(&id))
    }

    async fn list_employees(&self, query: &EmployeeQuery) -> Result<(u64, Vec<Employee>), StoreError> {
        let tables = self.read()?;
        let mut matches: Vec<&Employee> = tables
            .employees
            .values()
            .filter(|e| query.filter.matches(e))
            .collect();
        matches.sort_by(|a, b| query.ordering.compare(a, b));

        let count = matches.len() as u64;
        let results = match query.page {
            Some(page) => matches
                .into_iter()
                .skip(page.offset() as usize)
                .take(page.limit() as usize)
                .cloned()
                .collect(),
            None => matches.into_iter().cloned().collect(),
        };
        Ok((count, results))
    }

    async fn employee_counts(&self) -> Result<EmployeeCounts, StoreError> {
        let tables = self.read()?;
        let mut counts = EmployeeCounts::default();
        for employee in tables.employees.values() {
            counts.total += 1;
            if employee.employment_status == EmploymentStatus::Active {
                counts.active += 1;
            }
            *counts.by_department.entry(employee.department).or_default() += 1;
        }
        Ok(counts)
    }

    async fn find_employee_conflicts(
        &self,
        employee_id: Option<&str>,
        email: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<Conflicts, StoreError> {
        Ok(self.read()?.employee_conflicts(employee_id, email, exclude))
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        let mut tables = self.write()?;
        if let Some(field) = tables.user_conflicts(&user.username, &user.email).first() {
            return Err(StoreError::Conflict(*field));
        }
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(self.read()?.users.values().find(|u| u.username == username).cloned())
    }

    async fn find_user_conflicts(&self, username: &str, email: &str) -> Result<Vec<UniqueField>, StoreError> {
        Ok(self.read()?.user_conflicts(username, email))
    }
}

#[async_trait]
impl TokenBlacklist for MemoryStore {
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        let mut tables = self.write()?;
        let now = Utc::now();
        tables.revoked.retain(|_, expiry| *expiry > now);
        tables.revoked.insert(jti, expires_at);
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        Ok(self.read()?.revoked.contains_key(&jti))
    }
}
