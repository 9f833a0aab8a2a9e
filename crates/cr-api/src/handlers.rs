//! # cr-api Handlers
//!
//! Thin adapters between HTTP requests and `RankingService`.

use actix_multipart::Multipart;
use actix_web::http::header;
use actix_web::{web, HttpRequest, HttpResponse};
use cr_core::service::{ProfileInput, RankingService};
use cr_core::strength::RankedChip;
use cr_core::AppError;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::error::ApiError;
use crate::form::read_chip_form;

/// State shared across all Actix-web workers.
pub struct AppState {
    pub service: RankingService,
    pub max_upload_bytes: usize,
}

type ApiResult = Result<HttpResponse, ApiError>;

/// Token from `Authorization: Bearer <token>`, if any.
fn bearer(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct VoteBody {
    pub score: i32,
}

#[derive(Debug, Deserialize)]
pub struct CommentBody {
    pub content: String,
}

#[derive(Debug, Deserialize)]
pub struct SignInBody {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct SignUpBody {
    pub email: String,
    pub password: String,
    #[serde(flatten)]
    pub profile: ProfileInput,
}

// ── Rankings ────────────────────────────────────────────────────────────────

pub async fn admin_ranking(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> ApiResult {
    let chips = data.service.admin_ranking(query.q.as_deref()).await?;
    Ok(HttpResponse::Ok().json(chips))
}

pub async fn public_ranking(data: web::Data<AppState>, query: web::Query<SearchQuery>) -> ApiResult {
    let chips = data.service.public_ranking(query.q.as_deref()).await?;
    Ok(HttpResponse::Ok().json(chips))
}

// ── Votes and comments ──────────────────────────────────────────────────────

pub async fn vote(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<VoteBody>,
) -> ApiResult {
    let stats = data
        .service
        .vote(bearer(&req), path.into_inner(), body.score)
        .await?;
    Ok(HttpResponse::Ok().json(RankedChip::from(stats)))
}

pub async fn recent_comments(data: web::Data<AppState>, path: web::Path<Uuid>) -> ApiResult {
    let comments = data.service.recent_comments(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(comments))
}

/// Posts a comment and answers with the refreshed recent list.
pub async fn post_comment(
    data: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<CommentBody>,
) -> ApiResult {
    let comments = data
        .service
        .comment(bearer(&req), path.into_inner(), &body.content)
        .await?;
    Ok(HttpResponse::Created().json(comments))
}

// ── Editorial ───────────────────────────────────────────────────────────────

pub async fn upload_chip(data: web::Data<AppState>, req: HttpRequest, payload: Multipart) -> ApiResult {
    // Reject anonymous uploads before reading the body.
    data.service.authenticate(bearer(&req)).await?;

    let mut entries = read_chip_form(payload, data.max_upload_bytes).await?;
    if entries.len() > 1 {
        return Err(AppError::Validation("use /api/chips/batch for several chips".into()).into());
    }
    let new_chip = entries.pop_first().map(|(_, c)| c).unwrap_or_default();
    let chip = data.service.upload_chip(bearer(&req), new_chip).await?;
    Ok(HttpResponse::Created().json(chip))
}

pub async fn upload_batch(data: web::Data<AppState>, req: HttpRequest, payload: Multipart) -> ApiResult {
    data.service.authenticate(bearer(&req)).await?;

    let entries = read_chip_form(payload, data.max_upload_bytes).await?;
    let report = data
        .service
        .upload_batch(bearer(&req), entries.into_iter().collect())
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

pub async fn delete_chip(data: web::Data<AppState>, req: HttpRequest, path: web::Path<Uuid>) -> ApiResult {
    data.service.delete_chip(bearer(&req), path.into_inner()).await?;
    Ok(HttpResponse::NoContent().finish())
}

// ── Auth ────────────────────────────────────────────────────────────────────

pub async fn sign_up(data: web::Data<AppState>, body: web::Json<SignUpBody>) -> ApiResult {
    let body = body.into_inner();
    let user_id = data
        .service
        .sign_up(&body.email, &body.password, body.profile)
        .await?;
    Ok(HttpResponse::Created().json(json!({ "user_id": user_id })))
}

pub async fn sign_in(data: web::Data<AppState>, body: web::Json<SignInBody>) -> ApiResult {
    let session = data.service.sign_in(&body.email, &body.password).await?;
    Ok(HttpResponse::Ok().json(session))
}

pub async fn sign_out(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    data.service.sign_out(bearer(&req)).await?;
    Ok(HttpResponse::NoContent().finish())
}

pub async fn current_session(data: web::Data<AppState>, req: HttpRequest) -> ApiResult {
    let session = data.service.authenticate(bearer(&req)).await?;
    Ok(HttpResponse::Ok().json(session))
}
