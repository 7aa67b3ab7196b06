//! Filtering, ordering, pagination and aggregate shaping for employee lists.
//!
//! The types here are backend-neutral: `MemoryStore` evaluates them directly
//! through [`EmployeeFilter::matches`] and [`Ordering::compare`], while
//! `PgStore` renders them into SQL.

use std::cmp;
use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::models::employee::{Department, Employee, EmploymentStatus, Gender, UnknownChoice};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingConfig {
    pub page_size: u32,
    pub max_page_size: u32,
}

impl Default for PagingConfig {
    fn default() -> Self {
        PagingConfig { page_size: 10, max_page_size: 100 }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmployeeFilter {
    pub department: Option<Department>,
    pub employment_status: Option<EmploymentStatus>,
    pub gender: Option<Gender>,
    /// Free-text term, matched case-insensitively as a substring.
    pub search: Option<String>,
}

impl EmployeeFilter {
    pub fn matches(&self, employee: &Employee) -> bool {
        if self.department.is_some_and(|d| d != employee.department) {
            return false;
        }
        if self.employment_status.is_some_and(|s| s != employee.employment_status) {
            return false;
        }
        if self.gender.is_some_and(|g| g != employee.gender) {
            return false;
        }
        match &self.search {
            Some(term) => {
                let term = term.to_lowercase();
                [
                    &employee.employee_id,
                    &employee.first_name,
                    &employee.last_name,
                    &employee.email,
                    &employee.position,
                ]
                .iter()
                .any(|value| value.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    EmployeeId,
    FirstName,
    LastName,
    HireDate,
    Salary,
    CreatedAt,
}

impl SortField {
    /// Fields a caller may order by. `CreatedAt` is only the default.
    fn from_param(name: &str) -> Option<Self> {
        match name {
            "employee_id" => Some(SortField::EmployeeId),
            "first_name" => Some(SortField::FirstName),
            "last_name" => Some(SortField::LastName),
            "hire_date" => Some(SortField::HireDate),
            "salary" => Some(SortField::Salary),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            SortField::EmployeeId => "employee_id",
            SortField::FirstName => "first_name",
            SortField::LastName => "last_name",
            SortField::HireDate => "hire_date",
            SortField::Salary => "salary",
            SortField::CreatedAt => "created_at",
        }
    }

    fn compare(self, a: &Employee, b: &Employee) -> cmp::Ordering {
        match self {
            SortField::EmployeeId => a.employee_id.cmp(&b.employee_id),
            SortField::FirstName => a.first_name.cmp(&b.first_name),
            SortField::LastName => a.last_name.cmp(&b.last_name),
            SortField::HireDate => a.hire_date.cmp(&b.hire_date),
            SortField::Salary => a.salary.cmp(&b.salary),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ordering(pub Vec<SortKey>);

impl Default for Ordering {
    fn default() -> Self {
        Ordering(vec![SortKey { field: SortField::CreatedAt, descending: true }])
    }
}

impl Ordering {
    /// Parses `salary,-hire_date` style input. Unknown terms are skipped;
    /// if nothing usable remains the default ordering applies.
    pub fn parse(param: Option<&str>) -> Self {
        let keys: Vec<SortKey> = param
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter_map(|term| {
                let (descending, name) = match term.strip_prefix('-') {
                    Some(name) => (true, name),
                    None => (false, term),
                };
                SortField::from_param(name).map(|field| SortKey { field, descending })
            })
            .collect();

        if keys.is_empty() {
            Ordering::default()
        } else {
            Ordering(keys)
        }
    }

    /// Total order: the requested keys, then the surrogate id.
    pub fn compare(&self, a: &Employee, b: &Employee) -> cmp::Ordering {
        self.0
            .iter()
            .map(|key| {
                let ord = key.field.compare(a, b);
                if key.descending { ord.reverse() } else { ord }
            })
            .find(|ord| ord.is_ne())
            .unwrap_or_else(|| a.id.cmp(&b.id))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page: Option<u32>, page_size: Option<u32>, paging: &PagingConfig) -> Self {
        PageRequest {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .filter(|size| *size > 0)
                .unwrap_or(paging.page_size)
                .min(paging.max_page_size),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page - 1) * u64::from(self.page_size)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeQuery {
    pub filter: EmployeeFilter,
    pub ordering: Ordering,
    /// `None` returns every match.
    pub page: Option<PageRequest>,
}

#[derive(Debug, Serialize)]
pub struct Page<T> {
    pub count: u64,
    pub next: Option<u32>,
    pub previous: Option<u32>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Returns `None` for a page past the end; the first page always exists.
    pub fn build(count: u64, request: PageRequest, results: Vec<T>) -> Option<Self> {
        if request.page > 1 && request.offset() >= count {
            return None;
        }
        let next = (request.offset() + request.limit() < count).then_some(request.page + 1);
        let previous = (request.page > 1).then_some(request.page - 1);
        Some(Page { count, next, previous, results })
    }
}

/// Query-string parameters accepted by the employee list endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct EmployeeListParams {
    pub department: Option<String>,
    pub employment_status: Option<String>,
    pub gender: Option<String>,
    pub search: Option<String>,
    pub ordering: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl EmployeeListParams {
    pub fn into_query(self, paging: &PagingConfig) -> Result<EmployeeQuery, UnknownChoice> {
        Ok(EmployeeQuery {
            filter: EmployeeFilter {
                department: parse_choice(self.department)?,
                employment_status: parse_choice(self.employment_status)?,
                gender: parse_choice(self.gender)?,
                search: non_empty(self.search),
            },
            ordering: Ordering::parse(self.ordering.as_deref()),
            page: Some(PageRequest::new(self.page, self.page_size, paging)),
        })
    }
}

/// Query-string parameters of the advanced search endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
    pub department: Option<String>,
    pub status: Option<String>,
    pub page: Option<u32>,
    pub page_size: Option<u32>,
}

impl SearchParams {
    /// Results are only paginated when the caller asks for a page.
    pub fn into_query(self, paging: &PagingConfig) -> Result<EmployeeQuery, UnknownChoice> {
        let page = match (self.page, self.page_size) {
            (None, None) => None,
            (page, page_size) => Some(PageRequest::new(page, page_size, paging)),
        };
        Ok(EmployeeQuery {
            filter: EmployeeFilter {
                department: parse_choice(self.department)?,
                employment_status: parse_choice(self.status)?,
                gender: None,
                search: non_empty(self.q),
            },
            ordering: Ordering::default(),
            page,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn parse_choice<T>(value: Option<String>) -> Result<Option<T>, UnknownChoice>
where
    T: std::str::FromStr<Err = UnknownChoice>,
{
    non_empty(value).map(|v| v.parse()).transpose()
}

/// Raw counters produced by a store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EmployeeCounts {
    pub total: u64,
    pub active: u64,
    pub by_department: HashMap<Department, u64>,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct EmployeeStatistics {
    pub total_employees: u64,
    pub active_employees: u64,
    pub inactive_employees: u64,
    pub department_distribution: IndexMap<&'static str, u64>,
}

impl From<&EmployeeCounts> for EmployeeStatistics {
    fn from(counts: &EmployeeCounts) -> Self {
        let department_distribution = Department::ALL
            .into_iter()
            .filter_map(|department| {
                counts
                    .by_department
                    .get(&department)
                    .copied()
                    .filter(|count| *count > 0)
                    .map(|count| (department.display_name(), count))
            })
            .collect();

        EmployeeStatistics {
            total_employees: counts.total,
            active_employees: counts.active,
            inactive_employees: counts.total.saturating_sub(counts.active),
            department_distribution,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, TimeZone, Utc};
    use rust_decimal::Decimal;
    use uuid::Uuid;

    fn employee(employee_id: &str, first: &str, salary: i64, created_secs: i64) -> Employee {
        Employee {
            id: Uuid::new_v4(),
            employee_id: employee_id.to_string(),
            first_name: first.to_string(),
            last_name: "Doe".to_string(),
            email: format!("{}@example.com", employee_id.to_lowercase()),
            phone: "+1234567890".to_string(),
            date_of_birth: NaiveDate::from_ymd_opt(1990, 1, 1).unwrap(),
            gender: Gender::Female,
            address: "1 Main St".to_string(),
            department: Department::Engineering,
            position: "Backend Developer".to_string(),
            hire_date: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
            salary: Decimal::from(salary),
            employment_status: EmploymentStatus::Active,
            emergency_contact_name: "Sam Doe".to_string(),
            emergency_contact_phone: "+1987654321".to_string(),
            emergency_contact_relationship: "Sibling".to_string(),
            profile_picture: None,
            created_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            updated_at: Utc.timestamp_opt(created_secs, 0).unwrap(),
            created_by: None,
            updated_by: None,
        }
    }

    #[test]
    fn search_is_case_insensitive_across_text_fields() {
        let e = employee("EMP0042", "Ada", 1000, 0);
        let by = |term: &str| EmployeeFilter { search: Some(term.to_string()), ..Default::default() };
        assert!(by("emp004").matches(&e));
        assert!(by("ADA").matches(&e));
        assert!(by("doe").matches(&e));
        assert!(by("BACKEND").matches(&e));
        assert!(by("example.COM").matches(&e));
        assert!(!by("frontend").matches(&e));
    }

    #[test]
    fn exact_filters_combine_with_and() {
        let e = employee("EMP0001", "Ada", 1000, 0);
        let filter = EmployeeFilter {
            department: Some(Department::Engineering),
            gender: Some(Gender::Male),
            ..Default::default()
        };
        assert!(!filter.matches(&e));
        let filter = EmployeeFilter {
            department: Some(Department::Engineering),
            employment_status: Some(EmploymentStatus::Active),
            ..Default::default()
        };
        assert!(filter.matches(&e));
    }

    #[test]
    fn ordering_defaults_to_newest_first_and_skips_unknown_terms() {
        assert_eq!(Ordering::parse(None), Ordering::default());
        assert_eq!(Ordering::parse(Some("password,created_at")), Ordering::default());
        assert_eq!(
            Ordering::parse(Some("-salary, first_name")),
            Ordering(vec![
                SortKey { field: SortField::Salary, descending: true },
                SortKey { field: SortField::FirstName, descending: false },
            ])
        );
    }

    #[test]
    fn ordering_compares_by_keys_in_turn() {
        let mut rows = vec![
            employee("EMP0001", "Cy", 500, 1),
            employee("EMP0002", "Ann", 900, 2),
            employee("EMP0003", "Bo", 500, 3),
        ];

        let ordering = Ordering::parse(Some("salary,first_name"));
        rows.sort_by(|a, b| ordering.compare(a, b));
        let ids: Vec<_> = rows.iter().map(|e| e.employee_id.as_str()).collect();
        assert_eq!(ids, ["EMP0003", "EMP0001", "EMP0002"]);

        rows.sort_by(|a, b| Ordering::default().compare(a, b));
        let ids: Vec<_> = rows.iter().map(|e| e.employee_id.as_str()).collect();
        assert_eq!(ids, ["EMP0003", "EMP0002", "EMP0001"]);
    }

    #[test]
    fn page_requests_are_clamped() {
        let paging = PagingConfig { page_size: 10, max_page_size: 50 };
        assert_eq!(PageRequest::new(None, None, &paging), PageRequest { page: 1, page_size: 10 });
        assert_eq!(PageRequest::new(Some(0), Some(500), &paging), PageRequest { page: 1, page_size: 50 });
        assert_eq!(PageRequest::new(Some(3), Some(5), &paging).offset(), 10);
    }

    #[test]
    fn pages_link_to_neighbours_and_reject_overflow() {
        let request = PageRequest { page: 2, page_size: 2 };
        let page = Page::build(5, request, vec![3, 4]).unwrap();
        assert_eq!((page.previous, page.next), (Some(1), Some(3)));

        let last = Page::build(5, PageRequest { page: 3, page_size: 2 }, vec![5]).unwrap();
        assert_eq!(last.next, None);

        assert!(Page::<u8>::build(5, PageRequest { page: 4, page_size: 2 }, vec![]).is_none());
        assert!(Page::<u8>::build(0, PageRequest { page: 1, page_size: 2 }, vec![]).is_some());
    }

    #[test]
    fn unknown_filter_codes_are_rejected() {
        let params = EmployeeListParams {
            department: Some("LEGAL".to_string()),
            ..Default::default()
        };
        assert_eq!(
            params.into_query(&PagingConfig::default()).unwrap_err(),
            UnknownChoice("LEGAL".to_string())
        );
    }

    #[test]
    fn advanced_search_is_unpaginated_unless_asked() {
        let query = SearchParams { q: Some("ada".into()), ..Default::default() }
            .into_query(&PagingConfig::default())
            .unwrap();
        assert_eq!(query.page, None);
        assert_eq!(query.filter.search.as_deref(), Some("ada"));

        let query = SearchParams { page: Some(2), status: Some("ACTIVE".into()), ..Default::default() }
            .into_query(&PagingConfig::default())
            .unwrap();
        assert_eq!(query.page, Some(PageRequest { page: 2, page_size: 10 }));
        assert_eq!(query.filter.employment_status, Some(EmploymentStatus::Active));
    }

    #[test]
    fn statistics_omit_empty_departments() {
        let counts = EmployeeCounts {
            total: 5,
            active: 3,
            by_department: HashMap::from([
                (Department::Engineering, 3),
                (Department::HumanResources, 2),
                (Department::Sales, 0),
            ]),
        };
        let stats = EmployeeStatistics::from(&counts);
        assert_eq!(stats.total_employees, 5);
        assert_eq!(stats.active_employees, 3);
        assert_eq!(stats.inactive_employees, 2);
        let departments: Vec<_> = stats.department_distribution.iter().collect();
        assert_eq!(departments, [(&"Human Resources", &2), (&"Engineering", &3)]);
    }
}
