#![allow(dead_code)]

use std::sync::Arc;

use actix_web::web;
use chrono::Utc;
use serde_json::{json, Value};
use uuid::Uuid;

use employee_records::app::AppState;
use employee_records::config::Config;
use employee_records::db::{MemoryStore, UserStore};
use employee_records::models::user::User;
use employee_records::utils::jwt::TokenKind;
use employee_records::utils::password::hash_password;

pub const PASSWORD: &str = "password123";

pub struct Fixture {
    pub state: web::Data<AppState>,
    pub admin: User,
    pub staff: User,
    pub admin_token: String,
    pub staff_token: String,
}

impl Fixture {
    pub fn bearer(token: &str) -> (&'static str, String) {
        ("Authorization", format!("Bearer {}", token))
    }

    pub fn admin_auth(&self) -> (&'static str, String) {
        Self::bearer(&self.admin_token)
    }

    pub fn staff_auth(&self) -> (&'static str, String) {
        Self::bearer(&self.staff_token)
    }
}

pub fn user(username: &str, is_staff: bool) -> User {
    User {
        id: Uuid::new_v4(),
        username: username.to_string(),
        email: format!("{}@example.com", username),
        first_name: String::new(),
        last_name: String::new(),
        password_hash: hash_password(PASSWORD).unwrap(),
        is_staff,
        is_active: true,
        created_at: Utc::now(),
    }
}

/// App state over a fresh in-memory store holding one admin (`admin`) and
/// one non-admin (`clerk`) account.
pub async fn fixture() -> Fixture {
    let config = Config::from_lookup(|name| match name {
        "JWT_SECRET" => Some("integration-secret".to_string()),
        _ => None,
    })
    .unwrap();

    let store = Arc::new(MemoryStore::new());
    let admin = store.insert_user(user("admin", true)).await.unwrap();
    let staff = store.insert_user(user("clerk", false)).await.unwrap();

    let state = web::Data::new(AppState::new(&config, store));
    let admin_token = state.tokens.issue(&admin, TokenKind::Access).unwrap();
    let staff_token = state.tokens.issue(&staff, TokenKind::Access).unwrap();

    Fixture { state, admin, staff, admin_token, staff_token }
}

/// A complete, valid create payload.
pub fn employee_json(employee_id: &str, email: &str) -> Value {
    json!({
        "employee_id": employee_id,
        "first_name": "Jane",
        "last_name": "Smith",
        "email": email,
        "phone": "+12345678901",
        "date_of_birth": "1990-05-15",
        "gender": "F",
        "address": "1 Main Street",
        "department": "IT",
        "position": "Engineer",
        "hire_date": "2020-01-10",
        "salary": "85000.50",
        "emergency_contact_name": "John Smith",
        "emergency_contact_phone": "+12345678902",
        "emergency_contact_relationship": "Spouse"
    })
}

#[macro_export]
macro_rules! init_app {
    ($fixture:expr) => {
        actix_web::test::init_service(
            actix_web::App::new()
                .app_data($fixture.state.clone())
                .configure(employee_records::app::configure),
        )
        .await
    };
}

/// Creates an employee as the fixture's admin and returns the response body.
#[macro_export]
macro_rules! create_employee {
    ($app:expr, $fixture:expr, $payload:expr) => {{
        let req = actix_web::test::TestRequest::post()
            .uri("/api/employees")
            .insert_header($fixture.admin_auth())
            .set_json($payload)
            .to_request();
        let resp = actix_web::test::call_service(&$app, req).await;
        assert_eq!(resp.status(), actix_web::http::StatusCode::CREATED);
        let body: serde_json::Value = actix_web::test::read_body_json(resp).await;
        body
    }};
}
