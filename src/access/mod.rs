//! Role-based authorization.
//!
//! [`authorize`] is a pure capability check over `(identity, operation)`;
//! [`Caller`] is the actix extractor that turns a bearer token into the
//! optional identity the check consumes.

use actix_web::dev::Payload;
use actix_web::{web, FromRequest, HttpRequest};
use futures_util::future::LocalBoxFuture;
use uuid::Uuid;

use crate::app::AppState;
use crate::db::UserStore;
use crate::errors::AppError;
use crate::models::user::User;
use crate::utils::jwt::TokenKind;

/// The authenticated principal behind a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for Identity {
    fn from(user: &User) -> Self {
        Identity {
            user_id: user.id,
            username: user.username.clone(),
            is_admin: user.is_staff,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    ListEmployees,
    RetrieveEmployee,
    EmployeeStatistics,
    SearchEmployees,
    CreateEmployee,
    UpdateEmployee,
    DeleteEmployee,
    ChangeEmployeeStatus,
    ViewProfile,
    Logout,
}

impl Operation {
    pub fn is_write(self) -> bool {
        matches!(
            self,
            Operation::CreateEmployee
                | Operation::UpdateEmployee
                | Operation::DeleteEmployee
                | Operation::ChangeEmployeeStatus
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,
    #[error("You do not have permission to perform this action.")]
    Forbidden,
}

/// Reads need any authenticated identity; writes also need the admin flag.
pub fn authorize(identity: Option<&Identity>, operation: Operation) -> Result<&Identity, AccessError> {
    let identity = identity.ok_or(AccessError::Unauthenticated)?;
    if operation.is_write() && !identity.is_admin {
        return Err(AccessError::Forbidden);
    }
    Ok(identity)
}

/// The caller of a request, if it presented a valid access token for an
/// active account.
#[derive(Debug, Clone, Default)]
pub struct Caller(Option<Identity>);

impl Caller {
    pub fn identity(&self) -> Option<&Identity> {
        self.0.as_ref()
    }

    pub fn authorize(&self, operation: Operation) -> Result<&Identity, AccessError> {
        authorize(self.identity(), operation)
    }
}

pub(crate) fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|auth| auth.to_str().ok())
        .and_then(|auth| auth.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

impl FromRequest for Caller {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let state = req.app_data::<web::Data<AppState>>().cloned();
        let token = bearer_token(req).map(str::to_owned);

        Box::pin(async move {
            let (Some(state), Some(token)) = (state, token) else {
                return Ok(Caller(None));
            };
            let Ok(claims) = state.tokens.decode(&token, TokenKind::Access) else {
                return Ok(Caller(None));
            };
            // The account may have been disabled or demoted since the token was issued.
            let user = state.store.find_user_by_id(claims.user.id).await?;
            Ok(Caller(user.filter(|u| u.is_active).as_ref().map(Identity::from)))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(is_admin: bool) -> Identity {
        Identity { user_id: Uuid::new_v4(), username: "jane".into(), is_admin }
    }

    const READS: [Operation; 6] = [
        Operation::ListEmployees,
        Operation::RetrieveEmployee,
        Operation::EmployeeStatistics,
        Operation::SearchEmployees,
        Operation::ViewProfile,
        Operation::Logout,
    ];

    const WRITES: [Operation; 4] = [
        Operation::CreateEmployee,
        Operation::UpdateEmployee,
        Operation::DeleteEmployee,
        Operation::ChangeEmployeeStatus,
    ];

    #[test]
    fn anonymous_callers_are_unauthenticated_for_everything() {
        for op in READS.into_iter().chain(WRITES) {
            assert_eq!(authorize(None, op), Err(AccessError::Unauthenticated), "{op:?}");
        }
    }

    #[test]
    fn staff_may_read_but_not_write() {
        let staff = identity(false);
        for op in READS {
            assert!(authorize(Some(&staff), op).is_ok(), "{op:?}");
        }
        for op in WRITES {
            assert_eq!(authorize(Some(&staff), op), Err(AccessError::Forbidden), "{op:?}");
        }
    }

    #[test]
    fn admins_may_do_everything() {
        let admin = identity(true);
        for op in READS.into_iter().chain(WRITES) {
            assert_eq!(authorize(Some(&admin), op), Ok(&admin));
        }
    }

    #[test]
    fn bearer_token_requires_the_scheme() {
        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Bearer abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), Some("abc.def"));

        let req = actix_web::test::TestRequest::default()
            .insert_header(("Authorization", "Token abc.def"))
            .to_http_request();
        assert_eq!(bearer_token(&req), None);
    }
}
