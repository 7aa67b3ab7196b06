use std::env;
use std::str::FromStr;

use rust_decimal::Decimal;

use crate::query::PagingConfig;
use crate::validation::ValidationPolicy;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{0} cannot be empty")]
    Empty(&'static str),
    #[error("{name} has an invalid value: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdminSeed {
    pub username: String,
    pub password: String,
    pub email: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: String,
    pub database_url: Option<String>,
    pub jwt_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_hours: i64,
    pub policy: ValidationPolicy,
    pub paging: PagingConfig,
    pub admin: Option<AdminSeed>,
}

impl Config {
    /// Reads the process environment. Call `dotenv().ok()` first to pick up a `.env` file.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let jwt_secret = lookup("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;
        if jwt_secret.is_empty() {
            return Err(ConfigError::Empty("JWT_SECRET"));
        }

        let defaults = ValidationPolicy::default();
        let policy = ValidationPolicy {
            min_age: parse_or(&lookup, "EMPLOYEE_MIN_AGE", defaults.min_age)?,
            max_age: parse_or(&lookup, "EMPLOYEE_MAX_AGE", defaults.max_age)?,
            max_salary: parse_or::<Decimal, _>(&lookup, "EMPLOYEE_MAX_SALARY", defaults.max_salary)?,
        };
        if policy.min_age > policy.max_age {
            return Err(ConfigError::Invalid {
                name: "EMPLOYEE_MIN_AGE",
                value: policy.min_age.to_string(),
            });
        }

        let paging = PagingConfig {
            page_size: parse_or(&lookup, "PAGE_SIZE", PagingConfig::default().page_size)?,
            max_page_size: parse_or(&lookup, "MAX_PAGE_SIZE", PagingConfig::default().max_page_size)?,
        };
        if paging.page_size == 0 {
            return Err(ConfigError::Invalid { name: "PAGE_SIZE", value: "0".to_string() });
        }

        let admin = match (lookup("ADMIN_USERNAME"), lookup("ADMIN_PASSWORD")) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(AdminSeed {
                    username,
                    password,
                    email: lookup("ADMIN_EMAIL").unwrap_or_default(),
                })
            }
            _ => None,
        };

        Ok(Config {
            bind_addr: lookup("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string()),
            database_url: lookup("DATABASE_URL").filter(|url| !url.is_empty()),
            jwt_secret,
            access_token_ttl_minutes: parse_or(&lookup, "ACCESS_TOKEN_TTL_MINUTES", 5)?,
            refresh_token_ttl_hours: parse_or(&lookup, "REFRESH_TOKEN_TTL_HOURS", 24)?,
            policy,
            paging,
            admin,
        })
    }
}

fn parse_or<T, F>(lookup: &F, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    F: Fn(&str) -> Option<String>,
{
    match lookup(name) {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { name, value }),
    }
}
