pub mod customize;
pub mod profile;
pub mod scores;
pub mod songs;
pub mod stats;

use actix_web::HttpResponse;
use log::error;

use crate::core::error::StoreError;
use crate::web::models::ErrorResponse;

/// Map a store error to a JSON error response.
pub fn store_error_response(err: StoreError) -> HttpResponse {
    error!("Store operation failed: {}", err);
    match err {
        StoreError::NotFound(msg) => {
            HttpResponse::NotFound().json(ErrorResponse::new(msg, "not_found"))
        }
        StoreError::Validation(msg) => {
            HttpResponse::BadRequest().json(ErrorResponse::new(msg, "validation"))
        }
        StoreError::Io(msg) => {
            HttpResponse::InternalServerError().json(ErrorResponse::new(msg, "io"))
        }
        StoreError::Parse(msg) => {
            HttpResponse::InternalServerError().json(ErrorResponse::new(msg, "parse"))
        }
    }
}
