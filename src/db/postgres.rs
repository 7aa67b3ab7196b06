//! PostgreSQL store using sqlx runtime-checked queries.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, QueryBuilder};
use uuid::Uuid;

use super::{Conflicts, EmployeeStore, StoreError, TokenBlacklist, UniqueField, UserStore};
use crate::models::employee::Employee;
use crate::models::user::User;
use crate::query::{EmployeeCounts, EmployeeFilter, EmployeeQuery, Ordering};

const EMPLOYEE_COLUMNS: &str = "id, employee_id, first_name, last_name, email, phone, \
    date_of_birth, gender, address, department, position, hire_date, salary, \
    employment_status, emergency_contact_name, emergency_contact_phone, \
    emergency_contact_relationship, profile_picture, created_at, updated_at, \
    created_by, updated_by";

const USER_COLUMNS: &str =
    "id, username, email, first_name, last_name, password_hash, is_staff, is_active, created_at";

#[derive(sqlx::FromRow)]
struct EmployeeRow {
    id: Uuid,
    employee_id: String,
    first_name: String,
    last_name: String,
    email: String,
    phone: String,
    date_of_birth: NaiveDate,
    gender: String,
    address: String,
    department: String,
    position: String,
    hire_date: NaiveDate,
    salary: Decimal,
    employment_status: String,
    emergency_contact_name: String,
    emergency_contact_phone: String,
    emergency_contact_relationship: String,
    profile_picture: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    created_by: Option<Uuid>,
    updated_by: Option<Uuid>,
}

impl TryFrom<EmployeeRow> for Employee {
    type Error = StoreError;

    fn try_from(row: EmployeeRow) -> Result<Self, Self::Error> {
        let corrupt = |column: &str, value: &str| {
            StoreError::Backend(format!("unexpected {} value in employees: {:?}", column, value))
        };
        Ok(Employee {
            gender: row.gender.parse().map_err(|_| corrupt("gender", &row.gender))?,
            department: row
                .department
                .parse()
                .map_err(|_| corrupt("department", &row.department))?,
            employment_status: row
                .employment_status
                .parse()
                .map_err(|_| corrupt("employment_status", &row.employment_status))?,
            id: row.id,
            employee_id: row.employee_id,
            first_name: row.first_name,
            last_name: row.last_name,
            email: row.email,
            phone: row.phone,
            date_of_birth: row.date_of_birth,
            address: row.address,
            position: row.position,
            hire_date: row.hire_date,
            salary: row.salary,
            emergency_contact_name: row.emergency_contact_name,
            emergency_contact_phone: row.emergency_contact_phone,
            emergency_contact_relationship: row.emergency_contact_relationship,
            profile_picture: row.profile_picture,
            created_at: row.created_at,
            updated_at: row.updated_at,
            created_by: row.created_by,
            updated_by: row.updated_by,
        })
    }
}

/// Translates unique-constraint violations into the field they guard.
fn map_write_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let field = match db_err.constraint() {
                Some("employees_employee_id_key") => Some(UniqueField::EmployeeId),
                Some("employees_email_key") => Some(UniqueField::EmployeeEmail),
                Some("users_username_key") => Some(UniqueField::Username),
                Some("users_email_key") => Some(UniqueField::UserEmail),
                _ => None,
            };
            if let Some(field) = field {
                return StoreError::Conflict(field);
            }
        }
    }
    StoreError::from(err)
}

fn escape_like(term: &str) -> String {
    term.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

fn push_filter(builder: &mut QueryBuilder<'_, Postgres>, filter: &EmployeeFilter) {
    builder.push(" WHERE TRUE");
    if let Some(department) = filter.department {
        builder.push(" AND department = ").push_bind(department.code());
    }
    if let Some(status) = filter.employment_status {
        builder.push(" AND employment_status = ").push_bind(status.code());
    }
    if let Some(gender) = filter.gender {
        builder.push(" AND gender = ").push_bind(gender.code());
    }
    if let Some(term) = &filter.search {
        let pattern = format!("%{}%", escape_like(term));
        builder.push(" AND (");
        for (i, column) in ["employee_id", "first_name", "last_name", "email", "position"]
            .iter()
            .enumerate()
        {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        builder.push(")");
    }
}

fn push_ordering(builder: &mut QueryBuilder<'_, Postgres>, ordering: &Ordering) {
    builder.push(" ORDER BY ");
    for key in &ordering.0 {
        builder
            .push(key.field.column())
            .push(if key.descending { " DESC, " } else { " ASC, " });
    }
    builder.push("id ASC");
}

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn exists(&self, sql: &str, value: &str) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>(sql)
            .bind(value)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn exists_excluding(&self, sql: &str, value: &str, exclude: Option<Uuid>) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>(sql)
            .bind(value)
            .bind(exclude)
            .fetch_one(&self.pool)
            .await?)
    }
}

#[async_trait]
impl EmployeeStore for PgStore {
    async fn insert_employee(&self, employee: Employee) -> Result<Employee, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO employees ({EMPLOYEE_COLUMNS}) VALUES \
             ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)"
        ))
        .bind(employee.id)
        .bind(&employee.employee_id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(&employee.phone)
        .bind(employee.date_of_birth)
        .bind(employee.gender.code())
        .bind(&employee.address)
        .bind(employee.department.code())
        .bind(&employee.position)
        .bind(employee.hire_date)
        .bind(employee.salary)
        .bind(employee.employment_status.code())
        .bind(&employee.emergency_contact_name)
        .bind(&employee.emergency_contact_phone)
        .bind(&employee.emergency_contact_relationship)
        .bind(&employee.profile_picture)
        .bind(employee.created_at)
        .bind(employee.updated_at)
        .bind(employee.created_by)
        .bind(employee.updated_by)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(employee)
    }

    async fn get_employee(&self, id: Uuid) -> Result<Option<Employee>, StoreError> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "SELECT {EMPLOYEE_COLUMNS} FROM employees WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Employee::try_from).transpose()
    }

    async fn update_employee(&self, employee: Employee) -> Result<Employee, StoreError> {
        let result = sqlx::query(
            "UPDATE employees SET employee_id = $2, first_name = $3, last_name = $4, email = $5, \
             phone = $6, date_of_birth = $7, gender = $8, address = $9, department = $10, \
             position = $11, hire_date = $12, salary = $13, employment_status = $14, \
             emergency_contact_name = $15, emergency_contact_phone = $16, \
             emergency_contact_relationship = $17, profile_picture = $18, updated_at = $19, \
             updated_by = $20 WHERE id = $1",
        )
        .bind(employee.id)
        .bind(&employee.employee_id)
        .bind(&employee.first_name)
        .bind(&employee.last_name)
        .bind(&employee.email)
        .bind(&employee.phone)
        .bind(employee.date_of_birth)
        .bind(employee.gender.code())
        .bind(&employee.address)
        .bind(employee.department.code())
        .bind(&employee.position)
        .bind(employee.hire_date)
        .bind(employee.salary)
        .bind(employee.employment_status.code())
        .bind(&employee.emergency_contact_name)
        .bind(&employee.emergency_contact_phone)
        .bind(&employee.emergency_contact_relationship)
        .bind(&employee.profile_picture)
        .bind(employee.updated_at)
        .bind(employee.updated_by)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(employee)
    }

    async fn delete_employee(&self, id: Uuid) -> Result<Option<Employee>, StoreError> {
        let row = sqlx::query_as::<_, EmployeeRow>(&format!(
            "DELETE FROM employees WHERE id = $1 RETURNING {EMPLOYEE_COLUMNS}"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(Employee::try_from).transpose()
    }

    async fn list_employees(&self, query: &EmployeeQuery) -> Result<(u64, Vec<Employee>), StoreError> {
        let mut count_query = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM employees");
        push_filter(&mut count_query, &query.filter);
        let count: i64 = count_query
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await?;

        let mut select = QueryBuilder::<Postgres>::new(format!("SELECT {EMPLOYEE_COLUMNS} FROM employees"));
        push_filter(&mut select, &query.filter);
        push_ordering(&mut select, &query.ordering);
        if let Some(page) = query.page {
            select
                .push(" LIMIT ")
                .push_bind(page.limit() as i64)
                .push(" OFFSET ")
                .push_bind(page.offset() as i64);
        }

        let rows: Vec<EmployeeRow> = select.build_query_as::<EmployeeRow>().fetch_all(&self.pool).await?;
        let employees = rows
            .into_iter()
            .map(Employee::try_from)
            .collect::<Result<Vec<_>, _>>()?;

        Ok((count.max(0) as u64, employees))
    }

    async fn employee_counts(&self) -> Result<EmployeeCounts, StoreError> {
        let rows = sqlx::query_as::<_, (String, i64, i64)>(
            "SELECT department, COUNT(*), COUNT(*) FILTER (WHERE employment_status = 'ACTIVE') \
             FROM employees GROUP BY department",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut counts = EmployeeCounts::default();
        for (department, total, active) in rows {
            let department = department
                .parse()
                .map_err(|_| StoreError::Backend(format!("unexpected department value: {:?}", department)))?;
            counts.total += total as u64;
            counts.active += active as u64;
            counts.by_department.insert(department, total as u64);
        }
        Ok(counts)
    }

    async fn find_employee_conflicts(
        &self,
        employee_id: Option<&str>,
        email: Option<&str>,
        exclude: Option<Uuid>,
    ) -> Result<Conflicts, StoreError> {
        let mut conflicts = Conflicts::default();
        if let Some(employee_id) = employee_id {
            conflicts.employee_id = self
                .exists_excluding(
                    "SELECT EXISTS(SELECT 1 FROM employees WHERE employee_id = $1 AND ($2::uuid IS NULL OR id <> $2))",
                    employee_id,
                    exclude,
                )
                .await?;
        }
        if let Some(email) = email {
            conflicts.email = self
                .exists_excluding(
                    "SELECT EXISTS(SELECT 1 FROM employees WHERE email = $1 AND ($2::uuid IS NULL OR id <> $2))",
                    email,
                    exclude,
                )
                .await?;
        }
        Ok(conflicts)
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn insert_user(&self, user: User) -> Result<User, StoreError> {
        sqlx::query(&format!(
            "INSERT INTO users ({USER_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)"
        ))
        .bind(user.id)
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.first_name)
        .bind(&user.last_name)
        .bind(&user.password_hash)
        .bind(user.is_staff)
        .bind(user.is_active)
        .bind(user.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_write_error)?;

        Ok(user)
    }

    async fn find_user_by_id(&self, id: Uuid) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, StoreError> {
        Ok(sqlx::query_as::<_, User>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_conflicts(&self, username: &str, email: &str) -> Result<Vec<UniqueField>, StoreError> {
        let mut taken = Vec::new();
        if self
            .exists("SELECT EXISTS(SELECT 1 FROM users WHERE username = $1)", username)
            .await?
        {
            taken.push(UniqueField::Username);
        }
        if !email.is_empty()
            && self
                .exists("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)", email)
                .await?
        {
            taken.push(UniqueField::UserEmail);
        }
        Ok(taken)
    }
}

#[async_trait]
impl TokenBlacklist for PgStore {
    async fn revoke_token(&self, jti: Uuid, expires_at: DateTime<Utc>) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM token_blacklist WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;
        sqlx::query("INSERT INTO token_blacklist (jti, expires_at) VALUES ($1, $2) ON CONFLICT (jti) DO NOTHING")
            .bind(jti)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn is_token_revoked(&self, jti: Uuid) -> Result<bool, StoreError> {
        Ok(sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM token_blacklist WHERE jti = $1)")
            .bind(jti)
            .fetch_one(&self.pool)
            .await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::employee::{Department, EmploymentStatus};
    use crate::query::EmployeeFilter;

    #[test]
    fn like_metacharacters_are_escaped() {
        assert_eq!(escape_like(r"50%_off\"), r"50\%\_off\\");
    }

    #[test]
    fn filters_render_as_bound_predicates() {
        let filter = EmployeeFilter {
            department: Some(Department::Sales),
            employment_status: Some(EmploymentStatus::OnLeave),
            gender: None,
            search: Some("ada".to_string()),
        };
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM employees");
        push_filter(&mut builder, &filter);
        assert_eq!(
            builder.sql(),
            "SELECT COUNT(*) FROM employees WHERE TRUE AND department = $1 AND employment_status = $2 \
             AND (employee_id ILIKE $3 OR first_name ILIKE $4 OR last_name ILIKE $5 OR email ILIKE $6 \
             OR position ILIKE $7)"
        );
    }

    #[test]
    fn ordering_ends_with_the_surrogate_key() {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT id FROM employees");
        push_ordering(&mut builder, &Ordering::parse(Some("-salary,last_name")));
        assert_eq!(
            builder.sql(),
            "SELECT id FROM employees ORDER BY salary DESC, last_name ASC, id ASC"
        );
    }
}
