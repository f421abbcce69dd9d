use actix_web::{web, HttpResponse, Responder};

use crate::web::handlers::store_error_response;
use crate::web::models::{RankingQuery, ScoresQuery};
use crate::web::server::AppState;

/// List enriched score rows, optionally filtered by dancer.
pub async fn list_scores(
    data: web::Data<AppState>,
    query: web::Query<ScoresQuery>,
) -> impl Responder {
    let mut service = data.service.write().await;
    if let Err(err) = service.refresh() {
        return store_error_response(err);
    }

    let limit = query.limit.unwrap_or(200).clamp(1, 5000);
    let rows = service.list_scores(
        query.source.unwrap_or_default(),
        query.dancer.as_deref(),
        limit,
    );

    HttpResponse::Ok().json(rows)
}

/// Top-N single and double rankings for one song.
pub async fn song_ranking(
    data: web::Data<AppState>,
    query: web::Query<RankingQuery>,
) -> impl Responder {
    let mut service = data.service.write().await;
    if let Err(err) = service.refresh() {
        return store_error_response(err);
    }

    let limit = query.limit.unwrap_or(5).clamp(1, 50);
    let ranking = service.song_ranking(&query.song_id, query.source.unwrap_or_default(), limit);

    HttpResponse::Ok().json(ranking)
}

/// Unified, deduplicated score rows.
pub async fn unified_scores(data: web::Data<AppState>) -> impl Responder {
    let mut service = data.service.write().await;
    if let Err(err) = service.refresh() {
        return store_error_response(err);
    }

    HttpResponse::Ok().json(service.unified_scores())
}
