//! Field and cross-field rules for employee writes.
//!
//! Validation happens in two passes. [`check_payload`] is pure: it runs the
//! format rules declared on [`EmployeePayload`], parses dates, choices and the
//! salary, applies the age/hire-date/salary business rules and merges the
//! payload over the existing record. [`validate_employee`] adds the
//! uniqueness checks, which need the store. Every violation is collected
//! before anything is rejected.

use std::borrow::Cow;
use std::str::FromStr;

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use validator::{Validate, ValidationError};

use crate::db::EmployeeStore;
use crate::errors::AppError;
use crate::models::employee::{
    age_on, Department, Employee, EmployeeFields, EmploymentStatus, Gender,
};
use crate::utils::validation::{validate_payload, FieldErrors};

pub static EMPLOYEE_ID_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^EMP\d{4,}$").unwrap());
pub static PHONE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\+?1?\d{9,15}$").unwrap());

const REQUIRED: &str = "This field is required.";
const BLANK: &str = "This field may not be blank.";
const BAD_DATE: &str = "Date has wrong format. Use one of these formats instead: YYYY-MM-DD.";
const PHONE_FORMAT: &str = "Phone number must be entered in the format: +999999999";

/// Business thresholds for employee records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationPolicy {
    pub min_age: i32,
    pub max_age: i32,
    pub max_salary: Decimal,
}

impl Default for ValidationPolicy {
    fn default() -> Self {
        ValidationPolicy {
            min_age: 18,
            max_age: 100,
            max_salary: Decimal::from(10_000_000),
        }
    }
}

/// Salary as sent by the client: a JSON number or a numeric string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SalaryInput {
    Number(serde_json::Number),
    Text(String),
}

impl SalaryInput {
    fn to_decimal(&self) -> Option<Decimal> {
        match self {
            SalaryInput::Number(n) => Decimal::from_str(&n.to_string())
                .or_else(|_| Decimal::from_scientific(&n.to_string()))
                .ok(),
            SalaryInput::Text(s) => Decimal::from_str(s.trim()).ok(),
        }
    }
}

/// Writable employee fields as received on create or update. Every field is
/// optional at this level; which ones are required depends on the operation.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct EmployeePayload {
    #[validate(
        length(max = 20, message = "Ensure this field has no more than 20 characters."),
        regex(path = "EMPLOYEE_ID_RE", message = "Employee ID must be in format: EMP0001"),
        custom = "validate_employee_id_prefix"
    )]
    pub employee_id: Option<String>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub first_name: Option<String>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub last_name: Option<String>,
    #[validate(
        length(max = 254, message = "Ensure this field has no more than 254 characters."),
        email(message = "Enter a valid email address.")
    )]
    pub email: Option<String>,
    #[validate(
        length(max = 15, message = "Ensure this field has no more than 15 characters."),
        regex(path = "PHONE_RE", message = "Phone number must be entered in the format: +999999999")
    )]
    pub phone: Option<String>,
    pub date_of_birth: Option<String>,
    pub gender: Option<String>,
    pub address: Option<String>,
    pub department: Option<String>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub position: Option<String>,
    pub hire_date: Option<String>,
    pub salary: Option<SalaryInput>,
    pub employment_status: Option<String>,
    #[validate(length(max = 200, message = "Ensure this field has no more than 200 characters."))]
    pub emergency_contact_name: Option<String>,
    #[validate(
        length(max = 15, message = "Ensure this field has no more than 15 characters."),
        regex(path = "PHONE_RE", message = "Phone number must be entered in the format: +999999999")
    )]
    pub emergency_contact_phone: Option<String>,
    #[validate(length(max = 100, message = "Ensure this field has no more than 100 characters."))]
    pub emergency_contact_relationship: Option<String>,
    pub profile_picture: Option<String>,
}

fn validate_employee_id_prefix(employee_id: &str) -> Result<(), ValidationError> {
    if employee_id.starts_with("EMP") {
        return Ok(());
    }
    let mut err = ValidationError::new("prefix");
    err.message = Some(Cow::from("Employee ID must start with 'EMP'."));
    Err(err)
}

/// How a payload relates to the stored record.
#[derive(Debug, Clone, Copy)]
pub enum Mode<'a> {
    Create,
    /// PUT: every required field must be present.
    Replace(&'a Employee),
    /// PATCH: absent fields keep their stored values.
    Patch(&'a Employee),
}

impl<'a> Mode<'a> {
    fn existing(self) -> Option<&'a Employee> {
        match self {
            Mode::Create => None,
            Mode::Replace(e) | Mode::Patch(e) => Some(e),
        }
    }

    fn requires_all(self) -> bool {
        !matches!(self, Mode::Patch(_))
    }
}

/// Collects errors while resolving each field to its final value.
struct Resolver<'a> {
    mode: Mode<'a>,
    errors: FieldErrors,
}

impl<'a> Resolver<'a> {
    fn missing(&mut self, field: &str) {
        if self.mode.requires_all() {
            self.errors.add(field, REQUIRED);
        }
    }

    /// Free-text field: non-blank when present, required unless patching.
    fn text(&mut self, field: &str, value: &Option<String>, current: Option<&String>) -> Option<String> {
        match value {
            Some(v) if v.trim().is_empty() => {
                self.errors.replace(field, BLANK);
                None
            }
            Some(v) => Some(v.clone()),
            None => {
                self.missing(field);
                current.cloned()
            }
        }
    }

    fn date(&mut self, field: &str, value: &Option<String>, current: Option<NaiveDate>) -> Option<NaiveDate> {
        match value {
            Some(v) => match NaiveDate::parse_from_str(v.trim(), "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    self.errors.add(field, BAD_DATE);
                    None
                }
            },
            None => {
                self.missing(field);
                current
            }
        }
    }

    fn choice<T>(&mut self, field: &str, value: &Option<String>, current: Option<T>) -> Option<T>
    where
        T: FromStr<Err = crate::models::employee::UnknownChoice>,
    {
        match value {
            Some(v) => match v.parse() {
                Ok(choice) => Some(choice),
                Err(err) => {
                    self.errors.add(field, err.to_string());
                    None
                }
            },
            None => {
                self.missing(field);
                current
            }
        }
    }
}

/// Runs every rule that does not need the store and returns the merged,
/// normalized field set.
pub fn check_payload(
    payload: &EmployeePayload,
    mode: Mode<'_>,
    policy: &ValidationPolicy,
    today: NaiveDate,
) -> Result<EmployeeFields, FieldErrors> {
    let existing = mode.existing();
    let base = existing.map(Employee::fields);
    let mut r = Resolver {
        mode,
        errors: validate_payload(payload).err().unwrap_or_default(),
    };

    let employee_id = r.text("employee_id", &payload.employee_id, base.as_ref().map(|b| &b.employee_id));
    let first_name = r.text("first_name", &payload.first_name, base.as_ref().map(|b| &b.first_name));
    let last_name = r.text("last_name", &payload.last_name, base.as_ref().map(|b| &b.last_name));
    let email = r.text("email", &payload.email, base.as_ref().map(|b| &b.email));
    let phone = r.text("phone", &payload.phone, base.as_ref().map(|b| &b.phone));
    let address = r.text("address", &payload.address, base.as_ref().map(|b| &b.address));
    let position = r.text("position", &payload.position, base.as_ref().map(|b| &b.position));
    let emergency_contact_name = r.text(
        "emergency_contact_name",
        &payload.emergency_contact_name,
        base.as_ref().map(|b| &b.emergency_contact_name),
    );
    let emergency_contact_phone = r.text(
        "emergency_contact_phone",
        &payload.emergency_contact_phone,
        base.as_ref().map(|b| &b.emergency_contact_phone),
    );
    let emergency_contact_relationship = r.text(
        "emergency_contact_relationship",
        &payload.emergency_contact_relationship,
        base.as_ref().map(|b| &b.emergency_contact_relationship),
    );

    let gender: Option<Gender> = r.choice("gender", &payload.gender, base.as_ref().map(|b| b.gender));
    let department: Option<Department> =
        r.choice("department", &payload.department, base.as_ref().map(|b| b.department));
    let employment_status: Option<EmploymentStatus> = match &payload.employment_status {
        // Status defaults to ACTIVE rather than being required.
        None => Some(base.as_ref().map(|b| b.employment_status).unwrap_or_default()),
        value => r.choice("employment_status", value, None),
    };

    let date_of_birth = r.date("date_of_birth", &payload.date_of_birth, base.as_ref().map(|b| b.date_of_birth));
    if let Some(dob) = date_of_birth {
        let age = age_on(dob, today);
        if age < policy.min_age {
            r.errors.add(
                "date_of_birth",
                format!("Employee must be at least {} years old.", policy.min_age),
            );
        } else if age > policy.max_age {
            r.errors.add("date_of_birth", "Invalid date of birth.");
        }
    }

    let hire_date = r.date("hire_date", &payload.hire_date, base.as_ref().map(|b| b.hire_date));
    if let Some(hired) = hire_date {
        if hired > today {
            r.errors.add("hire_date", "Hire date cannot be in the future.");
        }
    }

    let salary = match &payload.salary {
        Some(input) => check_salary(input, policy, &mut r.errors),
        None => {
            r.missing("salary");
            base.as_ref().map(|b| b.salary)
        }
    };

    let profile_picture = match &payload.profile_picture {
        Some(reference) if reference.trim().is_empty() => None,
        Some(reference) => Some(reference.clone()),
        None => base.as_ref().and_then(|b| b.profile_picture.clone()),
    };

    // Cross-field rule on the merged view, once both dates are individually valid.
    if !r.errors.has("date_of_birth") && !r.errors.has("hire_date") {
        if let (Some(dob), Some(hired)) = (date_of_birth, hire_date) {
            if hired < dob {
                r.errors.add("hire_date", "Hire date cannot be before date of birth.");
            }
        }
    }

    r.errors.into_result()?;

    match (
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
    ) {
        (
            Some(employee_id),
            Some(first_name),
            Some(last_name),
            Some(email),
            Some(phone),
            Some(date_of_birth),
            Some(gender),
            Some(address),
            Some(department),
            Some(position),
            Some(hire_date),
            Some(salary),
            Some(employment_status),
            Some(emergency_contact_name),
            Some(emergency_contact_phone),
            Some(emergency_contact_relationship),
        ) => Ok(EmployeeFields {
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
        }),
        // Unreachable with an empty error set: every None above recorded an error.
        _ => Err(FieldErrors::single("non_field_errors", "Incomplete employee record.")),
    }
}

fn check_salary(input: &SalaryInput, policy: &ValidationPolicy, errors: &mut FieldErrors) -> Option<Decimal> {
    let Some(mut salary) = input.to_decimal() else {
        errors.add("salary", "Salary must be a valid number.");
        return None;
    };

    let normalized = salary.normalize();
    let decimals = normalized.scale() as usize;
    let digits = normalized.mantissa().unsigned_abs().to_string().len().max(decimals);
    if decimals > 2 {
        errors.add("salary", "Ensure that there are no more than 2 decimal places.");
        return None;
    }
    if digits > 10 {
        errors.add("salary", "Ensure that there are no more than 10 digits in total.");
        return None;
    }
    if salary <= Decimal::ZERO {
        errors.add("salary", "Salary must be greater than zero.");
        return None;
    }
    if salary > policy.max_salary {
        errors.add("salary", "Salary seems unreasonably high. Please verify.");
        return None;
    }

    salary.rescale(2);
    Some(salary)
}

/// Full validation including uniqueness of `employee_id` and `email`,
/// excluding the record being updated.
pub async fn validate_employee<S>(
    store: &S,
    payload: &EmployeePayload,
    mode: Mode<'_>,
    policy: &ValidationPolicy,
    today: NaiveDate,
) -> Result<EmployeeFields, AppError>
where
    S: EmployeeStore + ?Sized,
{
    let checked = check_payload(payload, mode, policy, today);

    let exclude: Option<Uuid> = mode.existing().map(|e| e.id);
    let (employee_id, email) = match &checked {
        Ok(fields) => (Some(fields.employee_id.as_str()), Some(fields.email.as_str())),
        Err(errors) => (
            payload.employee_id.as_deref().filter(|_| !errors.has("employee_id")),
            payload.email.as_deref().filter(|_| !errors.has("email")),
        ),
    };

    let conflicts = store.find_employee_conflicts(employee_id, email, exclude).await?;
    let mut errors = checked.as_ref().err().cloned().unwrap_or_default();
    if conflicts.employee_id {
        errors.add("employee_id", "An employee with this ID already exists.");
    }
    if conflicts.email {
        errors.add("email", "An employee with this email already exists.");
    }

    match checked {
        Ok(fields) if errors.is_empty() => Ok(fields),
        _ => Err(AppError::Validation(errors)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Months, Utc};

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 15).unwrap()
    }

    fn valid_payload() -> EmployeePayload {
        EmployeePayload {
            employee_id: Some("EMP0001".into()),
            first_name: Some("Ada".into()),
            last_name: Some("Lovelace".into()),
            email: Some("ada@example.com".into()),
            phone: Some("+14155552671".into()),
            date_of_birth: Some("1990-05-20".into()),
            gender: Some("F".into()),
            address: Some("12 Analytical Way".into()),
            department: Some("ENG".into()),
            position: Some("Engineer".into()),
            hire_date: Some("2015-03-01".into()),
            salary: Some(SalaryInput::Text("85000.5".into())),
            employment_status: None,
            emergency_contact_name: Some("Charles Babbage".into()),
            emergency_contact_phone: Some("987654321".into()),
            emergency_contact_relationship: Some("Colleague".into()),
            profile_picture: None,
        }
    }

    fn stored() -> Employee {
        let fields = check_payload(&valid_payload(), Mode::Create, &ValidationPolicy::default(), today()).unwrap();
        Employee::create(fields, Uuid::new_v4(), Utc::now())
    }

    fn create(payload: &EmployeePayload) -> Result<EmployeeFields, FieldErrors> {
        check_payload(payload, Mode::Create, &ValidationPolicy::default(), today())
    }

    fn messages(errors: &FieldErrors, field: &str) -> Vec<String> {
        errors.get(field).map(<[String]>::to_vec).unwrap_or_default()
    }

    #[test]
    fn accepts_a_complete_payload_and_normalizes_it() {
        let fields = create(&valid_payload()).unwrap();
        assert_eq!(fields.employment_status, EmploymentStatus::Active);
        assert_eq!(fields.salary.to_string(), "85000.50");
        assert_eq!(fields.department, Department::Engineering);
        assert_eq!(fields.gender, Gender::Female);
    }

    #[test]
    fn create_reports_every_missing_field() {
        let errors = create(&EmployeePayload::default()).unwrap_err();
        for field in ["employee_id", "email", "salary", "hire_date", "gender", "emergency_contact_phone"] {
            assert_eq!(messages(&errors, field), [REQUIRED], "{field}");
        }
        assert!(!errors.has("employment_status"));
        assert!(!errors.has("profile_picture"));
    }

    #[test]
    fn format_rules_apply_per_field() {
        let payload = EmployeePayload {
            employee_id: Some("ABC12".into()),
            email: Some("not-an-email".into()),
            phone: Some("12-34".into()),
            gender: Some("X".into()),
            date_of_birth: Some("20/05/1990".into()),
            ..valid_payload()
        };
        let errors = create(&payload).unwrap_err();
        let id_errors = messages(&errors, "employee_id");
        assert!(id_errors.contains(&"Employee ID must be in format: EMP0001".to_string()));
        assert!(id_errors.contains(&"Employee ID must start with 'EMP'.".to_string()));
        assert_eq!(messages(&errors, "email"), ["Enter a valid email address."]);
        assert_eq!(messages(&errors, "phone"), [PHONE_FORMAT]);
        assert_eq!(messages(&errors, "gender"), ["\"X\" is not a valid choice."]);
        assert_eq!(messages(&errors, "date_of_birth"), [BAD_DATE]);
    }

    #[test]
    fn lengths_are_capped_at_the_column_widths() {
        // Matches the phone pattern but is 17 characters long.
        let long_phone = "+1123456789012345".to_string();
        // Syntactically valid: 64-character local part, 247-character domain.
        let domain = format!("{}.com", vec!["a".repeat(60); 4].join("."));
        let long_email = format!("{}@{}", "u".repeat(64), domain);
        assert!(long_email.len() > 254);

        let payload = EmployeePayload {
            phone: Some(long_phone.clone()),
            emergency_contact_phone: Some(long_phone),
            email: Some(long_email),
            ..valid_payload()
        };
        let errors = create(&payload).unwrap_err();
        assert_eq!(messages(&errors, "phone"), ["Ensure this field has no more than 15 characters."]);
        assert_eq!(
            messages(&errors, "emergency_contact_phone"),
            ["Ensure this field has no more than 15 characters."]
        );
        assert!(messages(&errors, "email").contains(&"Ensure this field has no more than 254 characters.".to_string()));
    }

    #[test]
    fn blank_text_is_reported_once() {
        let payload = EmployeePayload { phone: Some("  ".into()), ..valid_payload() };
        assert_eq!(messages(&create(&payload).unwrap_err(), "phone"), [BLANK]);
    }

    #[test]
    fn age_must_fall_within_policy_bounds() {
        let ten_years_ago = today().checked_sub_months(Months::new(120)).unwrap();
        let payload = EmployeePayload {
            date_of_birth: Some(ten_years_ago.format("%Y-%m-%d").to_string()),
            hire_date: Some("2024-01-01".into()),
            ..valid_payload()
        };
        assert_eq!(
            messages(&create(&payload).unwrap_err(), "date_of_birth"),
            ["Employee must be at least 18 years old."]
        );

        let payload = EmployeePayload { date_of_birth: Some("1900-01-01".into()), ..valid_payload() };
        assert_eq!(
            messages(&create(&payload).unwrap_err(), "date_of_birth"),
            ["Invalid date of birth."]
        );

        // Turns 18 exactly today.
        let payload = EmployeePayload {
            date_of_birth: Some("2006-06-15".into()),
            hire_date: Some("2024-06-15".into()),
            ..valid_payload()
        };
        assert!(create(&payload).is_ok());
    }

    #[test]
    fn age_bounds_follow_the_policy() {
        let policy = ValidationPolicy { min_age: 40, ..ValidationPolicy::default() };
        let errors = check_payload(&valid_payload(), Mode::Create, &policy, today()).unwrap_err();
        assert_eq!(messages(&errors, "date_of_birth"), ["Employee must be at least 40 years old."]);
    }

    #[test]
    fn hire_date_cannot_be_in_the_future_or_before_birth() {
        let payload = EmployeePayload { hire_date: Some("2024-06-16".into()), ..valid_payload() };
        assert_eq!(
            messages(&create(&payload).unwrap_err(), "hire_date"),
            ["Hire date cannot be in the future."]
        );

        let payload = EmployeePayload {
            date_of_birth: Some("1990-05-20".into()),
            hire_date: Some("1989-12-31".into()),
            ..valid_payload()
        };
        assert_eq!(
            messages(&create(&payload).unwrap_err(), "hire_date"),
            ["Hire date cannot be before date of birth."]
        );
    }

    #[test]
    fn patch_checks_hire_date_against_the_stored_birth_date() {
        let existing = stored();
        let payload = EmployeePayload { hire_date: Some("1985-01-01".into()), ..Default::default() };
        let errors = check_payload(&payload, Mode::Patch(&existing), &ValidationPolicy::default(), today())
            .unwrap_err();
        assert_eq!(messages(&errors, "hire_date"), ["Hire date cannot be before date of birth."]);
    }

    #[test]
    fn patch_keeps_absent_fields() {
        let existing = stored();
        let payload = EmployeePayload { position: Some("Staff Engineer".into()), ..Default::default() };
        let fields = check_payload(&payload, Mode::Patch(&existing), &ValidationPolicy::default(), today())
            .unwrap();
        assert_eq!(fields.position, "Staff Engineer");
        assert_eq!(fields.email, existing.email);
        assert_eq!(fields.salary, existing.salary);
    }

    #[test]
    fn replace_requires_every_field() {
        let existing = stored();
        let payload = EmployeePayload { position: Some("Staff Engineer".into()), ..Default::default() };
        let errors = check_payload(&payload, Mode::Replace(&existing), &ValidationPolicy::default(), today())
            .unwrap_err();
        assert_eq!(messages(&errors, "email"), [REQUIRED]);
    }

    #[test]
    fn salary_rules() {
        let cases = [
            (SalaryInput::Text("abc".into()), "Salary must be a valid number."),
            (SalaryInput::Number((-5).into()), "Salary must be greater than zero."),
            (SalaryInput::Text("0".into()), "Salary must be greater than zero."),
            (SalaryInput::Text("10000000.01".into()), "Salary seems unreasonably high. Please verify."),
            (SalaryInput::Text("100.123".into()), "Ensure that there are no more than 2 decimal places."),
        ];
        for (salary, expected) in cases {
            let payload = EmployeePayload { salary: Some(salary), ..valid_payload() };
            assert_eq!(messages(&create(&payload).unwrap_err(), "salary"), [expected]);
        }

        let payload = EmployeePayload { salary: Some(SalaryInput::Text("10000000".into())), ..valid_payload() };
        assert!(create(&payload).is_ok());
    }

    #[test]
    fn salary_ceiling_is_configurable() {
        let policy = ValidationPolicy { max_salary: Decimal::from(50_000), ..ValidationPolicy::default() };
        let errors = check_payload(&valid_payload(), Mode::Create, &policy, today()).unwrap_err();
        assert_eq!(messages(&errors, "salary"), ["Salary seems unreasonably high. Please verify."]);
    }

    #[test]
    fn unknown_status_is_a_choice_error() {
        let payload = EmployeePayload { employment_status: Some("RETIRED".into()), ..valid_payload() };
        assert_eq!(
            messages(&create(&payload).unwrap_err(), "employment_status"),
            ["\"RETIRED\" is not a valid choice."]
        );
    }

    #[test]
    fn empty_profile_picture_clears_the_reference() {
        let mut existing = stored();
        existing.profile_picture = Some("employee_profiles/ada.png".into());
        let payload = EmployeePayload { profile_picture: Some(String::new()), ..Default::default() };
        let fields = check_payload(&payload, Mode::Patch(&existing), &ValidationPolicy::default(), today())
            .unwrap();
        assert_eq!(fields.profile_picture, None);
    }
}
