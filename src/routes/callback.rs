use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::core::InboundMessage;
use crate::models::{CallbackEvent, ErrorResponse};
use crate::routes::AppState;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/callback", web::post().to(callback));
}

/// VK Callback API endpoint
///
/// POST /api/v1/callback
///
/// VK expects the literal body `ok` for every accepted event, and the
/// confirmation token for a `confirmation` event.
async fn callback(state: web::Data<AppState>, event: web::Json<CallbackEvent>) -> impl Responder {
    if let Err(errors) = event.validate() {
        tracing::info!("Rejected callback event: {}", errors);
        return HttpResponse::BadRequest().json(ErrorResponse {
            error: "Validation failed".to_string(),
            message: errors.to_string(),
            status_code: 400,
        });
    }

    if let Some(expected) = state.callback.secret.as_deref() {
        if event.secret.as_deref() != Some(expected) {
            tracing::warn!("Callback event {} with a wrong secret", event.event_type);
            return HttpResponse::Forbidden().json(ErrorResponse {
                error: "Forbidden".to_string(),
                message: "secret does not match".to_string(),
                status_code: 403,
            });
        }
    }

    if let Some(expected) = state.callback.group_id {
        if event.group_id != Some(expected) {
            tracing::warn!(
                "Callback event {} for group {:?}, serving {}",
                event.event_type,
                event.group_id,
                expected
            );
            return HttpResponse::Forbidden().json(ErrorResponse {
                error: "Forbidden".to_string(),
                message: "group does not match".to_string(),
                status_code: 403,
            });
        }
    }

    let event = event.into_inner();
    match event.event_type.as_str() {
        "confirmation" => {
            tracing::info!("Answering callback confirmation for group {:?}", event.group_id);
            HttpResponse::Ok()
                .content_type("text/plain")
                .body(state.callback.confirmation_token.clone())
        }
        "message_new" => {
            let Some(object) = event.object else {
                return HttpResponse::BadRequest().json(ErrorResponse {
                    error: "Validation failed".to_string(),
                    message: "message_new without object".to_string(),
                    status_code: 400,
                });
            };

            let message = object.message;
            tracing::debug!("message_new from user {}", message.from_id);

            // Handled in the background; VK retries events not acknowledged quickly
            state.dispatcher.spawn(InboundMessage {
                user_id: message.from_id,
                text: message.text,
                payload: message.payload,
            });
            ok()
        }
        other => {
            tracing::debug!("Ignoring callback event {}", other);
            ok()
        }
    }
}

fn ok() -> HttpResponse {
    HttpResponse::Ok().content_type("text/plain").body("ok")
}
