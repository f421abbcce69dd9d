use actix_web::{web, HttpResponse, Responder};
use serde_json::{Map, Value};

use crate::store::customize::{slot_for, SlotKey};
use crate::store::profile::{is_allowed_field, is_customize_field};
use crate::web::handlers::store_error_response;
use crate::web::models::{ErrorResponse, GenericResponse, LinkedQuery, ProfileUpdateRequest};
use crate::web::server::AppState;
use std::collections::HashMap;

/// Snapshot of the caller's current profile (last matching `profile3` line).
pub async fn get_profile(data: web::Data<AppState>, query: web::Query<LinkedQuery>) -> impl Responder {
    let linked = query.into_inner().into_linked();
    if linked.is_empty() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new("No linked player supplied", "not_linked"));
    }

    let service = data.service.read().await;
    match service.read_profile(&linked) {
        Ok(Some(snapshot)) => HttpResponse::Ok().json(snapshot),
        Ok(None) => {
            HttpResponse::NotFound().json(ErrorResponse::new("Profile not found", "not_found"))
        }
        Err(err) => store_error_response(err),
    }
}

/// Apply a profile patch. Core fields append a new `profile3` line;
/// customize-named fields are split out and routed to the customize store.
pub async fn update_profile(
    data: web::Data<AppState>,
    body: web::Json<ProfileUpdateRequest>,
) -> impl Responder {
    let ProfileUpdateRequest { linked, patch } = body.into_inner();
    if linked.is_empty() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new("No linked player supplied", "not_linked"));
    }

    let mut core_patch = Map::new();
    let mut customize_changes: HashMap<SlotKey, i64> = HashMap::new();
    for (key, value) in patch {
        if is_allowed_field(&key) {
            core_patch.insert(key, value);
        } else if is_customize_field(&key) {
            if let (Some(slot), Some(selection)) = (slot_for(&key), value.as_i64()) {
                customize_changes.insert(slot, selection);
            }
        }
    }

    let mut service = data.service.write().await;

    let mut snapshot: Option<Map<String, Value>> = None;
    if !core_patch.is_empty() {
        match service.update_profile(&linked, &core_patch) {
            Ok(Some(updated)) => snapshot = Some(updated),
            Ok(None) => {
                return HttpResponse::NotFound().json(ErrorResponse::new(
                    "Profile not found or nothing to update",
                    "not_found",
                ));
            }
            Err(err) => return store_error_response(err),
        }
    }

    if !customize_changes.is_empty() {
        if let Err(err) = service.update_customize(&linked, &customize_changes) {
            return store_error_response(err);
        }
    }

    HttpResponse::Ok().json(GenericResponse {
        success: true,
        message: "Profile updated".to_string(),
        data: snapshot.map(Value::Object),
    })
}
