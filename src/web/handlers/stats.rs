use actix_web::{web, HttpResponse, Responder};

use crate::web::handlers::store_error_response;
use crate::web::server::AppState;

/// Per-dancer clear totals over `score3`.
pub async fn dancers_summary(data: web::Data<AppState>) -> impl Responder {
    let mut service = data.service.write().await;
    if let Err(err) = service.refresh() {
        return store_error_response(err);
    }

    HttpResponse::Ok().json(service.dancers_summary())
}
