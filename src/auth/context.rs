use crate::error::AppError;
use crate::model::role::Role;
use actix_web::{FromRequest, HttpMessage, HttpRequest, dev::Payload};
use futures::future::{Ready, ready};

/// Authenticated caller, built from the access token by `auth_middleware`
/// and handed to handlers explicitly.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub user_id: u64,
    pub username: String,
    pub role: Role,
    pub school_id: u64,
}

impl FromRequest for RequestContext {
    type Error = AppError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        ready(
            req.extensions()
                .get::<RequestContext>()
                .cloned()
                .ok_or_else(|| AppError::Unauthorized("Not authenticated".into())),
        )
    }
}

impl RequestContext {
    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.role.is_admin() {
            Ok(())
        } else {
            Err(AppError::Forbidden("School admin only".into()))
        }
    }

    pub fn require_any(&self, roles: &[Role]) -> Result<(), AppError> {
        if roles.contains(&self.role) {
            Ok(())
        } else {
            Err(AppError::Forbidden("Your role cannot perform this action".into()))
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role.is_admin()
    }

    pub fn is_teacher(&self) -> bool {
        self.role == Role::Teacher
    }

    /// Super admins reach every school; everyone else only their own.
    pub fn can_access_school(&self, school_id: u64) -> bool {
        self.role == Role::SuperAdmin || self.school_id == school_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(role: Role) -> RequestContext {
        RequestContext {
            user_id: 1,
            username: "u".into(),
            role,
            school_id: 10,
        }
    }

    #[test]
    fn role_guards() {
        assert!(ctx(Role::SchoolAdmin).require_admin().is_ok());
        assert!(ctx(Role::Teacher).require_admin().is_err());
        assert!(ctx(Role::SuperAdmin).require_admin().is_ok());
        assert!(ctx(Role::Staff).require_any(&[Role::Teacher, Role::Staff]).is_ok());
        assert!(ctx(Role::Parent).require_any(&[Role::Teacher]).is_err());
    }

    #[test]
    fn school_scoping() {
        assert!(ctx(Role::SchoolAdmin).can_access_school(10));
        assert!(!ctx(Role::SchoolAdmin).can_access_school(11));
        assert!(ctx(Role::SuperAdmin).can_access_school(11));
    }

    #[actix_web::test]
    async fn extractor_requires_context() {
        let req = actix_web::test::TestRequest::default().to_http_request();
        let result = RequestContext::extract(&req).await;
        assert!(matches!(result, Err(AppError::Unauthorized(_))));

        let req = actix_web::test::TestRequest::default().to_http_request();
        req.extensions_mut().insert(ctx(Role::Teacher));
        let extracted = RequestContext::extract(&req).await.unwrap();
        assert_eq!(extracted.school_id, 10);
    }
}
