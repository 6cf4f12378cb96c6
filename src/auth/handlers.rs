use crate::{
    auth::{
        jwt::{TokenSubject, generate_access_token, generate_refresh_token, verify_token},
        password::verify_password,
    },
    config::Config,
    model::role::Role,
    models::{LoginReqDto, TokenType, UserSql},
};
use actix_web::{HttpRequest, HttpResponse, Responder, web};
use serde::Serialize;
use sqlx::MySqlPool;
use tracing::{debug, error, info, instrument};

#[derive(Serialize)]
struct TokenPair {
    access_token: String,
    refresh_token: String,
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get("Authorization")
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
}

/// Issues an access/refresh pair and stores the refresh token id.
async fn issue_token_pair(
    subject: &TokenSubject,
    pool: &MySqlPool,
    config: &Config,
) -> Result<TokenPair, HttpResponse> {
    let access_token = generate_access_token(subject, &config.jwt_secret, config.access_token_ttl)
        .map_err(|e| {
            error!(error = %e, "Failed to sign access token");
            HttpResponse::InternalServerError().finish()
        })?;

    let (refresh_token, refresh_claims) =
        generate_refresh_token(subject, &config.jwt_secret, config.refresh_token_ttl).map_err(
            |e| {
                error!(error = %e, "Failed to sign refresh token");
                HttpResponse::InternalServerError().finish()
            },
        )?;

    debug!(
        user_id = subject.user_id,
        jti = %refresh_claims.jti,
        "Storing refresh token"
    );

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (user_id, jti, expires_at)
        VALUES (?, ?, FROM_UNIXTIME(?))
        "#,
    )
    .bind(subject.user_id)
    .bind(&refresh_claims.jti)
    .bind(refresh_claims.exp as i64)
    .execute(pool)
    .await
    .map_err(|e| {
        error!(error = %e, "Failed to store refresh token");
        HttpResponse::InternalServerError().finish()
    })?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

#[instrument(
    name = "auth_login",
    skip(pool, config, user),
    fields(username = %user.username)
)]
pub async fn login(
    user: web::Json<LoginReqDto>,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    info!("Login request received");

    if user.username.trim().is_empty() || user.password.is_empty() {
        info!("Validation failed: empty username or password");
        return HttpResponse::BadRequest().body("Username or password required");
    }

    let db_user = match sqlx::query_as::<_, UserSql>(
        r#"
        SELECT id, username, password, role_id, school_id, is_active
        FROM users
        WHERE username = ?
        "#,
    )
    .bind(user.username.trim())
    .fetch_optional(pool.get_ref())
    .await
    {
        Ok(Some(user)) => {
            debug!(user_id = user.id, "User found");
            user
        }
        Ok(None) => {
            info!("Invalid credentials: user not found");
            return HttpResponse::Unauthorized().body("Invalid credentials");
        }
        Err(e) => {
            error!(error = %e, "Database error while fetching user");
            return HttpResponse::InternalServerError().finish();
        }
    };

    if let Err(e) = verify_password(&user.password, &db_user.password) {
        info!(error = %e, "Invalid credentials: password mismatch");
        return HttpResponse::Unauthorized().body("Invalid credentials");
    }

    if !db_user.is_active {
        info!(user_id = db_user.id, "Login refused: account disabled");
        return HttpResponse::Forbidden().body("Account disabled");
    }

    let subject = TokenSubject {
        user_id: db_user.id,
        username: db_user.username,
        role: db_user.role_id,
        school_id: db_user.school_id,
    };

    let pair = match issue_token_pair(&subject, pool.get_ref(), &config).await {
        Ok(pair) => pair,
        Err(resp) => return resp,
    };

    if let Err(e) = sqlx::query("UPDATE users SET last_login_at = NOW() WHERE id = ?")
        .bind(subject.user_id)
        .execute(pool.get_ref())
        .await
    {
        // not fatal for the login itself
        error!(error = %e, "Failed to update last_login_at");
    }

    info!(user_id = subject.user_id, "Login successful");

    HttpResponse::Ok().json(pair)
}

#[derive(sqlx::FromRow)]
struct AccountSql {
    id: u64,
    username: String,
    role_id: u8,
    school_id: u64,
    is_active: bool,
}

impl AccountSql {
    /// Current token identity, or `None` when the account may no longer sign in.
    fn into_subject(self) -> Option<TokenSubject> {
        if !self.is_active || Role::from_id(self.role_id).is_none() {
            return None;
        }
        Some(TokenSubject {
            user_id: self.id,
            username: self.username,
            role: self.role_id,
            school_id: self.school_id,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenSql {
    id: u64,
    revoked: bool,
}

pub async fn refresh_token(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::Unauthorized().body("No token");
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::Unauthorized().finish(),
    };

    let record = sqlx::query_as::<_, RefreshTokenSql>(
        "SELECT id, revoked FROM refresh_tokens WHERE jti = ?",
    )
    .bind(&claims.jti)
    .fetch_optional(pool.get_ref())
    .await;

    let record = match record {
        Ok(Some(r)) if !r.revoked => r,
        Ok(_) => return HttpResponse::Unauthorized().finish(),
        Err(e) => {
            error!(error = %e, "Failed to look up refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    };

    // rotate: the presented refresh token is single use, first caller wins
    match sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE id = ? AND revoked = FALSE")
        .bind(record.id)
        .execute(pool.get_ref())
        .await
    {
        Ok(done) if done.rows_affected() == 0 => {
            info!(user_id = claims.user_id, "Refresh token already used");
            return HttpResponse::Unauthorized().finish();
        }
        Ok(_) => {}
        Err(e) => {
            error!(error = %e, "Failed to revoke refresh token");
            return HttpResponse::InternalServerError().finish();
        }
    }

    // claims may be stale: role, school or active flag can change after login
    let account = sqlx::query_as::<_, AccountSql>(
        "SELECT id, username, role_id, school_id, is_active FROM users WHERE id = ?",
    )
    .bind(claims.user_id)
    .fetch_optional(pool.get_ref())
    .await;

    let subject = match account {
        Ok(account) => match account.and_then(AccountSql::into_subject) {
            Some(subject) => subject,
            None => {
                info!(user_id = claims.user_id, "Refresh refused for inactive or missing user");
                return HttpResponse::Unauthorized().finish();
            }
        },
        Err(e) => {
            error!(error = %e, "Failed to load user for refresh");
            return HttpResponse::InternalServerError().finish();
        }
    };

    match issue_token_pair(&subject, pool.get_ref(), &config).await {
        Ok(pair) => HttpResponse::Ok().json(pair),
        Err(resp) => resp,
    }
}

pub async fn logout(
    req: HttpRequest,
    pool: web::Data<MySqlPool>,
    config: web::Data<Config>,
) -> impl Responder {
    let Some(token) = bearer_token(&req) else {
        return HttpResponse::NoContent().finish();
    };

    let claims = match verify_token(token, &config.jwt_secret) {
        Ok(c) if c.token_type == TokenType::Refresh => c,
        _ => return HttpResponse::NoContent().finish(),
    };

    // idempotent
    if let Err(e) = sqlx::query("UPDATE refresh_tokens SET revoked = TRUE WHERE jti = ?")
        .bind(&claims.jti)
        .execute(pool.get_ref())
        .await
    {
        error!(error = %e, "Failed to revoke refresh token on logout");
    }

    HttpResponse::NoContent().finish()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(is_active: bool) -> AccountSql {
        AccountSql {
            id: 7,
            username: "mrs.bello".into(),
            role_id: Role::SchoolAdmin.id(),
            school_id: 12,
            is_active,
        }
    }

    #[test]
    fn refreshed_identity_comes_from_the_current_account() {
        let subject = account(true).into_subject().expect("active account");
        assert_eq!(subject.user_id, 7);
        assert_eq!(subject.role, Role::SchoolAdmin.id());
        assert_eq!(subject.school_id, 12);
    }

    #[test]
    fn deactivated_accounts_cannot_refresh() {
        assert!(account(false).into_subject().is_none());
    }

    #[test]
    fn unknown_roles_cannot_refresh() {
        let mut account = account(true);
        account.role_id = 42;
        assert!(account.into_subject().is_none());
    }
}
