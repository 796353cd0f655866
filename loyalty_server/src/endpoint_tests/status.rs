use std::time::Duration;

use actix_web::{http::StatusCode, web};
use loyalty_engine::{
    test_utils::{MemoryLedger, ScriptedAccrualClient},
    EngineState,
    Reconciler,
    ReconcilerConfig,
};
use tokio::sync::watch;

use super::helpers::get_request;
use crate::routes::status;

async fn status_of(state: watch::Receiver<EngineState>) -> (StatusCode, String) {
    get_request("/status", move |cfg| {
        cfg.app_data(web::Data::new(state)).service(status);
    })
    .await
}

#[actix_web::test]
async fn status_reports_engine_state() {
    let _ = env_logger::try_init().ok();
    let (tx, rx) = watch::channel(EngineState::Running);
    let (code, body) = status_of(rx.clone()).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, r#"{"reconciler":"Running"}"#);

    tx.send_replace(EngineState::Draining);
    let (code, body) = status_of(rx.clone()).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, r#"{"reconciler":"Draining"}"#);

    tx.send_replace(EngineState::Stopped);
    let (code, body) = status_of(rx).await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, r#"{"reconciler":"Stopped"}"#);
}

#[actix_web::test]
async fn status_follows_a_live_reconciler() {
    let _ = env_logger::try_init().ok();
    let config = ReconcilerConfig { scan_interval: Duration::from_millis(20), ..Default::default() };
    let (cancel_tx, cancel_rx) = watch::channel(false);
    let handle = Reconciler::new(MemoryLedger::new(), ScriptedAccrualClient::new(), config).start(cancel_rx);

    let (code, body) = status_of(handle.subscribe()).await;
    assert_eq!(code, StatusCode::OK);
    assert_eq!(body, r#"{"reconciler":"Running"}"#);

    cancel_tx.send_replace(true);
    let state = handle.subscribe();
    handle.stopped().await;
    let (code, body) = status_of(state).await;
    assert_eq!(code, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body, r#"{"reconciler":"Stopped"}"#);
}
