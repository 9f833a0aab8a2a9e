//! # cr-api
//!
//! JSON routing layer for chip-ranking.

pub mod error;
pub mod form;
pub mod handlers;
pub mod middleware;

use actix_web::web;

pub use error::ApiError;
pub use handlers::AppState;

/// Mounts every route under `/api`.
///
/// Scoped so the binary can place static file serving alongside it.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            // Rankings
            .route("/chips/admin", web::get().to(handlers::admin_ranking))
            .route("/chips/public", web::get().to(handlers::public_ranking))
            // Editorial
            .route("/chips", web::post().to(handlers::upload_chip))
            .route("/chips/batch", web::post().to(handlers::upload_batch))
            .route("/chips/{id}", web::delete().to(handlers::delete_chip))
            // Per-chip interaction
            .route("/chips/{id}/vote", web::put().to(handlers::vote))
            .route("/chips/{id}/comments", web::get().to(handlers::recent_comments))
            .route("/chips/{id}/comments", web::post().to(handlers::post_comment))
            // Accounts
            .route("/auth/signup", web::post().to(handlers::sign_up))
            .route("/auth/signin", web::post().to(handlers::sign_in))
            .route("/auth/signout", web::post().to(handlers::sign_out))
            .route("/auth/session", web::get().to(handlers::current_session)),
    );
}
