use actix_web::{web, HttpResponse};
use chrono::{NaiveDate, Utc};
use log::info;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::access::{Caller, Operation};
use crate::app::AppState;
use crate::db::{EmployeeStore, StoreError, UserStore};
use crate::errors::AppError;
use crate::models::employee::{Employee, EmployeeDetail, EmployeeSummary, EmploymentStatus};
use crate::query::{EmployeeListParams, EmployeeStatistics, Page, PageRequest, SearchParams};
use crate::validation::{validate_employee, EmployeePayload, Mode};

#[derive(Deserialize)]
pub struct StatusChange {
    employment_status: Option<String>,
}

fn not_found() -> AppError {
    AppError::NotFound("Employee not found".to_string())
}

/// Malformed ids cannot name a record, so they are reported like unknown ones.
fn parse_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| not_found())
}

async fn load(state: &AppState, raw_id: &str) -> Result<Employee, AppError> {
    let id = parse_id(raw_id)?;
    state.store.get_employee(id).await?.ok_or_else(not_found)
}

async fn username_of(state: &AppState, user_id: Option<Uuid>) -> Result<Option<String>, AppError> {
    match user_id {
        Some(id) => Ok(state.store.find_user_by_id(id).await?.map(|u| u.username)),
        None => Ok(None),
    }
}

async fn detail(state: &AppState, employee: &Employee, today: NaiveDate) -> Result<EmployeeDetail, AppError> {
    let created_by = username_of(state, employee.created_by).await?;
    let updated_by = username_of(state, employee.updated_by).await?;
    Ok(EmployeeDetail::new(employee, today, created_by, updated_by))
}

fn summaries(employees: &[Employee]) -> Vec<EmployeeSummary> {
    employees.iter().map(EmployeeSummary::from).collect()
}

pub async fn list_employees(
    caller: Caller,
    state: web::Data<AppState>,
    params: web::Query<EmployeeListParams>,
) -> Result<HttpResponse, AppError> {
    caller.authorize(Operation::ListEmployees)?;

    let query = params
        .into_inner()
        .into_query(&state.paging)
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    let (count, employees) = state.store.list_employees(&query).await?;

    let request = query.page.unwrap_or_else(|| PageRequest::new(None, None, &state.paging));
    let page = Page::build(count, request, summaries(&employees))
        .ok_or_else(|| AppError::NotFound("Invalid page.".to_string()))?;

    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_employee(
    caller: Caller,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    caller.authorize(Operation::RetrieveEmployee)?;

    let employee = load(&state, &path).await?;
    let today = Utc::now().date_naive();
    Ok(HttpResponse::Ok().json(detail(&state, &employee, today).await?))
}

pub async fn create_employee(
    caller: Caller,
    state: web::Data<AppState>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, AppError> {
    let identity = caller.authorize(Operation::CreateEmployee)?;

    let today = Utc::now().date_naive();
    let fields = validate_employee(state.store.as_ref(), &payload, Mode::Create, &state.policy, today).await?;
    let employee = state
        .store
        .insert_employee(Employee::create(fields, identity.user_id, Utc::now()))
        .await?;

    info!("Employee {} created by {}", employee.employee_id, identity.username);
    Ok(HttpResponse::Created().json(detail(&state, &employee, today).await?))
}

async fn update(
    caller: Caller,
    state: web::Data<AppState>,
    raw_id: &str,
    payload: &EmployeePayload,
    partial: bool,
) -> Result<HttpResponse, AppError> {
    let identity = caller.authorize(Operation::UpdateEmployee)?;

    let mut employee = load(&state, raw_id).await?;
    let today = Utc::now().date_naive();
    let mode = if partial { Mode::Patch(&employee) } else { Mode::Replace(&employee) };
    let fields = validate_employee(state.store.as_ref(), payload, mode, &state.policy, today).await?;

    employee.apply(fields, identity.user_id, Utc::now());
    let employee = state.store.update_employee(employee).await.map_err(|err| match err {
        StoreError::NotFound => not_found(),
        other => other.into(),
    })?;

    info!("Employee {} updated by {}", employee.employee_id, identity.username);
    Ok(HttpResponse::Ok().json(detail(&state, &employee, today).await?))
}

pub async fn replace_employee(
    caller: Caller,
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, AppError> {
    update(caller, state, &path, &payload, false).await
}

pub async fn patch_employee(
    caller: Caller,
    state: web::Data<AppState>,
    path: web::Path<String>,
    payload: web::Json<EmployeePayload>,
) -> Result<HttpResponse, AppError> {
    update(caller, state, &path, &payload, true).await
}

pub async fn delete_employee(
    caller: Caller,
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<HttpResponse, AppError> {
    let identity = caller.authorize(Operation::DeleteEmployee)?;

    let id = parse_id(&path)?;
    let employee = state.store.delete_employee(id).await?.ok_or_else(not_found)?;

    info!("Employee {} deleted by {}", employee.employee_id, identity.username);
    Ok(HttpResponse::Ok().json(json!({
        "message": format!("Employee {} has been successfully deleted.", employee.employee_id),
    })))
}

pub async fn statistics(caller: Caller, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    caller.authorize(Operation::EmployeeStatistics)?;

    let counts = state.store.employee_counts().await?;
    Ok(HttpResponse::Ok().json(EmployeeStatistics::from(&counts)))
}

pub async fn change_status(
    caller: Caller,
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<StatusChange>,
) -> Result<HttpResponse, AppError> {
    let identity = caller.authorize(Operation::ChangeEmployeeStatus)?;

    let mut employee = load(&state, &path).await?;

    let status: EmploymentStatus = match body.employment_status.as_deref() {
        None | Some("") => return Err(AppError::BadRequest("employment_status is required".to_string())),
        Some(code) => code
            .parse()
            .map_err(|_| AppError::BadRequest("Invalid employment status".to_string()))?,
    };

    employee.set_status(status, identity.user_id, Utc::now());
    let employee = state.store.update_employee(employee).await?;

    info!("Employee {} status set to {} by {}", employee.employee_id, status, identity.username);
    let today = Utc::now().date_naive();
    Ok(HttpResponse::Ok().json(detail(&state, &employee, today).await?))
}

pub async fn search_advanced(
    caller: Caller,
    state: web::Data<AppState>,
    params: web::Query<SearchParams>,
) -> Result<HttpResponse, AppError> {
    caller.authorize(Operation::SearchEmployees)?;

    let query = params
        .into_inner()
        .into_query(&state.paging)
        .map_err(|err| AppError::BadRequest(err.to_string()))?;
    let (count, employees) = state.store.list_employees(&query).await?;

    match query.page {
        Some(request) => {
            let page = Page::build(count, request, summaries(&employees))
                .ok_or_else(|| AppError::NotFound("Invalid page.".to_string()))?;
            Ok(HttpResponse::Ok().json(page))
        }
        None => Ok(HttpResponse::Ok().json(summaries(&employees))),
    }
}
