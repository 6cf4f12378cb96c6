use crate::{
    api::{activity, admission, evaluation, report, subscription, support},
    auth::{handlers, middleware::auth_middleware},
    config::Config,
};
use actix_governor::{
    Governor, GovernorConfigBuilder, PeerIpKeyExtractor, governor::middleware::NoOpMiddleware,
};
use actix_web::{middleware::from_fn, web};
use std::sync::Arc;

// Helper to build per-route limiter
fn build_limiter(requests_per_min: u32) -> Governor<PeerIpKeyExtractor, NoOpMiddleware> {
    let burst = requests_per_min.max(1);
    let per_ms = 60_000 / burst as u64;
    let cfg = GovernorConfigBuilder::default()
        .per_millisecond(per_ms.max(1))
        .burst_size(burst)
        .key_extractor(PeerIpKeyExtractor)
        .finish()
        .unwrap_or_default();
    Governor::new(&cfg)
}

pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let login_limiter = Arc::new(build_limiter(config.rate_login_per_min));
    let refresh_limiter = Arc::new(build_limiter(config.rate_refresh_per_min));
    let protected_limiter = Arc::new(build_limiter(config.rate_protected_per_min));

    // Public routes
    cfg.service(
        web::scope("/auth")
            .service(
                web::resource("/login")
                    .wrap(login_limiter.clone())
                    .route(web::post().to(handlers::login)),
            )
            .service(
                web::resource("/refresh")
                    .wrap(refresh_limiter.clone())
                    .route(web::post().to(handlers::refresh_token)),
            )
            .service(
                web::resource("/logout")
                    .wrap(login_limiter)
                    .route(web::post().to(handlers::logout)),
            ),
    );

    // Protected routes
    cfg.service(
        web::scope(&config.api_prefix)
            .wrap(from_fn(auth_middleware))
            .wrap(protected_limiter)
            .service(
                web::resource("/reports/attendance").route(web::get().to(report::export_report)),
            )
            .service(
                web::resource("/activities")
                    .route(web::post().to(activity::add_activity))
                    .route(web::get().to(activity::list_activities)),
            )
            .service(
                web::resource("/evaluations/{id}/print")
                    .route(web::get().to(evaluation::print_evaluation)),
            )
            .service(
                web::scope("/admissions")
                    // /admissions
                    .service(
                        web::resource("")
                            .route(web::post().to(admission::submit_application))
                            .route(web::get().to(admission::list_applications)),
                    )
                    // /admissions/{id}/process
                    .service(
                        web::resource("/{id}/process")
                            .route(web::put().to(admission::process_application)),
                    ),
            )
            .service(
                web::scope("/support/tickets")
                    .service(web::resource("").route(web::post().to(support::open_ticket)))
                    .service(web::resource("/{id}").route(web::get().to(support::get_ticket)))
                    .service(
                        web::resource("/{id}/replies").route(web::post().to(support::reply_ticket)),
                    )
                    .service(
                        web::resource("/{id}/close").route(web::put().to(support::close_ticket)),
                    ),
            )
            .service(
                web::resource("/subscriptions/{id}/proof")
                    .route(web::post().to(subscription::upload_proof))
                    .route(web::get().to(subscription::serve_proof)),
            ),
    );
}

// LOGIN
//  ├─ access_token (ACCESS_TOKEN_TTL)
//  └─ refresh_token (REFRESH_TOKEN_TTL)

// API REQUEST
//  └─ Authorization: Bearer access_token
