use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Datelike, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Raised when a wire code does not name any variant of a choice enum.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("\"{0}\" is not a valid choice.")]
pub struct UnknownChoice(pub String);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    #[serde(rename = "M")]
    Male,
    #[serde(rename = "F")]
    Female,
    #[serde(rename = "O")]
    Other,
}

impl Gender {
    pub fn code(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }
}

impl FromStr for Gender {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "M" => Ok(Gender::Male),
            "F" => Ok(Gender::Female),
            "O" => Ok(Gender::Other),
            other => Err(UnknownChoice(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Department {
    #[serde(rename = "HR")]
    HumanResources,
    #[serde(rename = "IT")]
    InformationTechnology,
    #[serde(rename = "FIN")]
    Finance,
    #[serde(rename = "MKT")]
    Marketing,
    #[serde(rename = "OPS")]
    Operations,
    #[serde(rename = "SALES")]
    Sales,
    #[serde(rename = "ENG")]
    Engineering,
}

impl Department {
    /// Every department, in the order they are reported in statistics.
    pub const ALL: [Department; 7] = [
        Department::HumanResources,
        Department::InformationTechnology,
        Department::Finance,
        Department::Marketing,
        Department::Operations,
        Department::Sales,
        Department::Engineering,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Department::HumanResources => "HR",
            Department::InformationTechnology => "IT",
            Department::Finance => "FIN",
            Department::Marketing => "MKT",
            Department::Operations => "OPS",
            Department::Sales => "SALES",
            Department::Engineering => "ENG",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Department::HumanResources => "Human Resources",
            Department::InformationTechnology => "Information Technology",
            Department::Finance => "Finance",
            Department::Marketing => "Marketing",
            Department::Operations => "Operations",
            Department::Sales => "Sales",
            Department::Engineering => "Engineering",
        }
    }
}

impl FromStr for Department {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Department::ALL
            .into_iter()
            .find(|department| department.code() == s)
            .ok_or_else(|| UnknownChoice(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EmploymentStatus {
    #[default]
    Active,
    Inactive,
    OnLeave,
    Terminated,
}

impl EmploymentStatus {
    pub fn code(self) -> &'static str {
        match self {
            EmploymentStatus::Active => "ACTIVE",
            EmploymentStatus::Inactive => "INACTIVE",
            EmploymentStatus::OnLeave => "ON_LEAVE",
            EmploymentStatus::Terminated => "TERMINATED",
        }
    }
}

impl FromStr for EmploymentStatus {
    type Err = UnknownChoice;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ACTIVE" => Ok(EmploymentStatus::Active),
            "INACTIVE" => Ok(EmploymentStatus::Inactive),
            "ON_LEAVE" => Ok(EmploymentStatus::OnLeave),
            "TERMINATED" => Ok(EmploymentStatus::Terminated),
            other => Err(UnknownChoice(other.to_string())),
        }
    }
}

impl fmt::Display for EmploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// The writable part of an employee, after validation.
#[derive(Debug, Clone, PartialEq)]
pub struct EmployeeFields {
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub department: Department,
    pub position: String,
    pub hire_date: NaiveDate,
    pub salary: Decimal,
    pub employment_status: EmploymentStatus,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub profile_picture: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Employee {
    pub id: Uuid,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub gender: Gender,
    pub address: String,
    pub department: Department,
    pub position: String,
    pub hire_date: NaiveDate,
    pub salary: Decimal,
    pub employment_status: EmploymentStatus,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<Uuid>,
    pub updated_by: Option<Uuid>,
}

impl Employee {
    /// Builds a fresh record stamped with its creator.
    pub fn create(fields: EmployeeFields, actor: Uuid, now: DateTime<Utc>) -> Self {
        let EmployeeFields {
            employee_id,
            first_name,
            last_name,
            email,
            phone,
            date_of_birth,
            gender,
            address,
            department,
            position,
            hire_date,
            salary,
            employment_status,
            emergency_contact_name,
            emergency_contact_phone,
            emergency_contact_relationship,
            profile_picture,
        } = fields;

        Employee {
            id: Uuid::new_v4(),
            employee_id,
            first_name,
            last_name,
            email,
            phone,
            date_of_birth,
            gender,
            address,
            department,
            position,
            hire_date,
            salary,
            employment_status,
            emergency_contact_name,
            emergency_contact_phone,
            emergency_contact_relationship,
            profile_picture,
            created_at: now,
            updated_at: now,
            created_by: Some(actor),
            updated_by: None,
        }
    }

    /// Replaces every writable field and stamps the update.
    pub fn apply(&mut self, fields: EmployeeFields, actor: Uuid, now: DateTime<Utc>) {
        self.employee_id = fields.employee_id;
        self.first_name = fields.first_name;
        self.last_name = fields.last_name;
        self.email = fields.email;
        self.phone = fields.phone;
        self.date_of_birth = fields.date_of_birth;
        self.gender = fields.gender;
        self.address = fields.address;
        self.department = fields.department;
        self.position = fields.position;
        self.hire_date = fields.hire_date;
        self.salary = fields.salary;
        self.employment_status = fields.employment_status;
        self.emergency_contact_name = fields.emergency_contact_name;
        self.emergency_contact_phone = fields.emergency_contact_phone;
        self.emergency_contact_relationship = fields.emergency_contact_relationship;
        self.profile_picture = fields.profile_picture;
        self.touch(actor, now);
    }

    pub fn set_status(&mut self, status: EmploymentStatus, actor: Uuid, now: DateTime<Utc>) {
        self.employment_status = status;
        self.touch(actor, now);
    }

    fn touch(&mut self, actor: Uuid, now: DateTime<Utc>) {
        self.updated_by = Some(actor);
        self.updated_at = now;
    }

    /// Writable view of the record, used as the base of a partial update.
    pub fn fields(&self) -> EmployeeFields {
        EmployeeFields {
            employee_id: self.employee_id.clone(),
            first_name: self.first_name.clone(),
            last_name: self.last_name.clone(),
            email: self.email.clone(),
            phone: self.phone.clone(),
            date_of_birth: self.date_of_birth,
            gender: self.gender,
            address: self.address.clone(),
            department: self.department,
            position: self.position.clone(),
            hire_date: self.hire_date,
            salary: self.salary,
            employment_status: self.employment_status,
            emergency_contact_name: self.emergency_contact_name.clone(),
            emergency_contact_phone: self.emergency_contact_phone.clone(),
            emergency_contact_relationship: self.emergency_contact_relationship.clone(),
            profile_picture: self.profile_picture.clone(),
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    pub fn age_on(&self, today: NaiveDate) -> i32 {
        age_on(self.date_of_birth, today)
    }
}

/// Whole years between `birth` and `today`, counting a year only once its
/// anniversary has been reached.
pub fn age_on(birth: NaiveDate, today: NaiveDate) -> i32 {
    let years = today.year() - birth.year();
    if (today.month(), today.day()) < (birth.month(), birth.day()) {
        years - 1
    } else {
        years
    }
}

/// Full projection returned by retrieve, create, update and status change.
#[derive(Debug, Serialize)]
pub struct EmployeeDetail {
    pub id: Uuid,
    pub employee_id: String,
    pub first_name: String,
    pub last_name: String,
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub date_of_birth: NaiveDate,
    pub age: i32,
    pub gender: Gender,
    pub address: String,
    pub department: Department,
    pub position: String,
    pub hire_date: NaiveDate,
    pub salary: Decimal,
    pub employment_status: EmploymentStatus,
    pub emergency_contact_name: String,
    pub emergency_contact_phone: String,
    pub emergency_contact_relationship: String,
    pub profile_picture: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by_username: Option<String>,
    pub updated_by_username: Option<String>,
}

impl EmployeeDetail {
    pub fn new(
        employee: &Employee,
        today: NaiveDate,
        created_by_username: Option<String>,
        updated_by_username: Option<String>,
    ) -> Self {
        EmployeeDetail {
            id: employee.id,
            employee_id: employee.employee_id.clone(),
            first_name: employee.first_name.clone(),
            last_name: employee.last_name.clone(),
            full_name: employee.full_name(),
            email: employee.email.clone(),
            phone: employee.phone.clone(),
            date_of_birth: employee.date_of_birth,
            age: employee.age_on(today),
            gender: employee.gender,
            address: employee.address.clone(),
            department: employee.department,
            position: employee.position.clone(),
            hire_date: employee.hire_date,
            salary: employee.salary,
            employment_status: employee.employment_status,
            emergency_contact_name: employee.emergency_contact_name.clone(),
            emergency_contact_phone: employee.emergency_contact_phone.clone(),
            emergency_contact_relationship: employee.emergency_contact_relationship.clone(),
            profile_picture: employee.profile_picture.clone(),
            created_at: employee.created_at,
            updated_at: employee.updated_at,
            created_by_username,
            updated_by_username,
        }
    }
}

/// Lightweight projection used by list and search results.
#[derive(Debug, Serialize)]
pub struct EmployeeSummary {
    pub id: Uuid,
    pub employee_id: String,
    pub full_name: String,
    pub email: String,
    pub department: Department,
    pub position: String,
    pub employment_status: EmploymentStatus,
    pub profile_picture: Option<String>,
}

impl From<&Employee> for EmployeeSummary {
    fn from(employee: &Employee) -> Self {
        EmployeeSummary {
            id: employee.id,
            employee_id: employee.employee_id.clone(),
            full_name: employee.full_name(),
            email: employee.email.clone(),
            department: employee.department,
            position: employee.position.clone(),
            employment_status: employee.employment_status,
            profile_picture: employee.profile_picture.clone(),
        }
    }
}
