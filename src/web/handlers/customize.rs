use actix_web::{web, HttpResponse, Responder};
use serde_json::{Map, Value};

use crate::store::customize::{slot_for, SlotKey, SLOTS};
use crate::web::handlers::store_error_response;
use crate::web::models::{CustomizeUpdateRequest, ErrorResponse, GenericResponse, LinkedQuery};
use crate::web::server::AppState;
use std::collections::HashMap;

/// Current customize selections, keyed by their UI slot names.
pub async fn get_customize(
    data: web::Data<AppState>,
    query: web::Query<LinkedQuery>,
) -> impl Responder {
    let linked = query.into_inner().into_linked();
    if linked.refid_trimmed().is_none() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new("No linked player supplied", "not_linked"));
    }

    let service = data.service.read().await;
    match service.read_customize(&linked) {
        Ok(selections) => {
            let mut out = Map::new();
            for (name, slot) in SLOTS.iter() {
                if let Some(key) = selections.get(slot) {
                    out.insert(name.to_string(), Value::from(*key));
                }
            }
            HttpResponse::Ok().json(out)
        }
        Err(err) => store_error_response(err),
    }
}

/// Apply customize slot changes; each change appends one `customize3` line.
pub async fn update_customize(
    data: web::Data<AppState>,
    body: web::Json<CustomizeUpdateRequest>,
) -> impl Responder {
    let CustomizeUpdateRequest { linked, slots } = body.into_inner();
    if linked.refid_trimmed().is_none() {
        return HttpResponse::BadRequest()
            .json(ErrorResponse::new("No linked player supplied", "not_linked"));
    }

    let mut changes: HashMap<SlotKey, i64> = HashMap::new();
    for (name, value) in &slots {
        if let (Some(slot), Some(key)) = (slot_for(name), value.as_i64()) {
            changes.insert(slot, key);
        }
    }

    if changes.is_empty() {
        return HttpResponse::Ok().json(GenericResponse {
            success: true,
            message: "Nothing to update".to_string(),
            data: Some(Value::Object(Map::new())),
        });
    }

    let mut service = data.service.write().await;
    match service.update_customize(&linked, &changes) {
        Ok(updated) => {
            let mut out = Map::new();
            for (name, _) in slots {
                if let Some(slot) = slot_for(&name) {
                    if let Some(key) = updated.get(&slot) {
                        out.insert(name, Value::from(*key));
                    }
                }
            }
            HttpResponse::Ok().json(GenericResponse {
                success: true,
                message: "Customize updated".to_string(),
                data: Some(Value::Object(out)),
            })
        }
        Err(err) => store_error_response(err),
    }
}
