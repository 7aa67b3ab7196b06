use std::sync::Arc;

use actix_web::web;
use chrono::{Duration, Utc};
use log::{info, warn};
use uuid::Uuid;

use crate::config::{AdminSeed, Config};
use crate::db::{Store, StoreError, UniqueField, UserStore};
use crate::errors::AppError;
use crate::handlers;
use crate::models::user::User;
use crate::query::PagingConfig;
use crate::utils::jwt::TokenService;
use crate::utils::password::hash_password;
use crate::validation::ValidationPolicy;

/// Shared, read-only state handed to every worker.
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub tokens: TokenService,
    pub policy: ValidationPolicy,
    pub paging: PagingConfig,
}

impl AppState {
    pub fn new(config: &Config, store: Arc<dyn Store>) -> Self {
        AppState {
            store,
            tokens: TokenService::new(
                &config.jwt_secret,
                Duration::minutes(config.access_token_ttl_minutes),
                Duration::hours(config.refresh_token_ttl_hours),
            ),
            policy: config.policy.clone(),
            paging: config.paging,
        }
    }
}

/// Registers every route under `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .app_data(
        web::QueryConfig::default()
            .error_handler(|err, _req| AppError::BadRequest(err.to_string()).into()),
    )
    .service(
        web::scope("/api")
            .service(
                web::scope("/auth")
                    .route("/register", web::post().to(handlers::auth::register))
                    .route("/login", web::post().to(handlers::auth::login))
                    .route("/logout", web::post().to(handlers::auth::logout))
                    .route("/token/refresh", web::post().to(handlers::auth::refresh_token))
                    .route("/profile", web::get().to(handlers::auth::profile)),
            )
            .service(
                web::scope("/employees")
                    .route("", web::get().to(handlers::employee::list_employees))
                    .route("", web::post().to(handlers::employee::create_employee))
                    .route("/statistics", web::get().to(handlers::employee::statistics))
                    .route("/search_advanced", web::get().to(handlers::employee::search_advanced))
                    .route("/{id}", web::get().to(handlers::employee::get_employee))
                    .route("/{id}", web::put().to(handlers::employee::replace_employee))
                    .route("/{id}", web::patch().to(handlers::employee::patch_employee))
                    .route("/{id}", web::delete().to(handlers::employee::delete_employee))
                    .route("/{id}/change_status", web::patch().to(handlers::employee::change_status)),
            ),
    );
}

/// Makes sure the configured administrator account exists. Existing
/// accounts are left untouched.
pub async fn seed_admin(store: &dyn Store, seed: &AdminSeed) -> Result<(), AppError> {
    if store.find_user_by_username(&seed.username).await?.is_some() {
        info!("Admin user already exists");
        return Ok(());
    }

    let password_hash = hash_password(&seed.password)
        .map_err(|err| AppError::InternalServerError(format!("Hashing error: {}", err)))?;
    let admin = User {
        id: Uuid::new_v4(),
        username: seed.username.clone(),
        email: seed.email.clone(),
        first_name: String::new(),
        last_name: String::new(),
        password_hash,
        is_staff: true,
        is_active: true,
        created_at: Utc::now(),
    };

    match store.insert_user(admin).await {
        Ok(_) => {
            info!("Created admin user {}", seed.username);
            Ok(())
        }
        // Another instance seeded it first.
        Err(StoreError::Conflict(UniqueField::Username)) => Ok(()),
        Err(StoreError::Conflict(field)) => {
            warn!("Cannot create admin user {}: {}", seed.username, field.message());
            Err(StoreError::Conflict(field).into())
        }
        Err(err) => Err(err.into()),
    }
}
