use actix_web::{web, HttpResponse, Responder};

use crate::web::handlers::store_error_response;
use crate::web::models::SongsQuery;
use crate::web::server::AppState;

/// Song catalog listing with an optional name/artist filter.
pub async fn list_songs(data: web::Data<AppState>, query: web::Query<SongsQuery>) -> impl Responder {
    let mut service = data.service.write().await;
    if let Err(err) = service.refresh() {
        return store_error_response(err);
    }

    HttpResponse::Ok().json(service.list_songs(query.q.as_deref()))
}
