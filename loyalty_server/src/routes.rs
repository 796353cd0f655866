//! Request handler definitions
//!
//! The daemon only exposes operational routes. Handlers that are more than a line or two MUST go into a separate
//! module. Keep this module neat and tidy 🙏
//!
//! Handlers run on actix worker threads, so anything that waits (I/O, database access) must be async. Blocking a
//! handler stalls every other request on that worker.
use actix_web::{get, http::StatusCode, web, HttpResponse, Responder};
use log::*;
use loyalty_engine::EngineState;
use serde_json::json;
use tokio::sync::watch;

// ----------------------------------------------   Health  ----------------------------------------------------
#[get("/health")]
pub async fn health() -> impl Responder {
    trace!("💻️ Received health check request");
    HttpResponse::Ok().body("👍️\n")
}

// ----------------------------------------------   Status  ----------------------------------------------------
/// Reports the reconciler's state. A stopped reconciler is reported with `503 Service Unavailable`.
#[get("/status")]
pub async fn status(state: web::Data<watch::Receiver<EngineState>>) -> impl Responder {
    let state = *state.borrow();
    trace!("💻️ Received status request. Reconciler is {state}");
    let code = match state {
        EngineState::Running | EngineState::Draining => StatusCode::OK,
        EngineState::Stopped => StatusCode::SERVICE_UNAVAILABLE,
    };
    HttpResponse::build(code).json(json!({ "reconciler": state }))
}
