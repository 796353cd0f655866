use std::{future::Future, pin::Pin, time::Duration};

use actix_web::{dev::Server, http::KeepAlive, middleware::Logger, web, App, HttpServer};
use log::*;
use loyalty_engine::{
    events::{EventHandlers, EventHooks, EventProducers},
    BalanceGuard,
    EngineState,
    HttpAccrualClient,
    SqliteDatabase,
};
use tokio::sync::watch;

use crate::{
    config::ServerConfig,
    errors::ServerError,
    reconciler_worker::start_reconciler,
    routes::{health, status},
};

const MAX_DB_CONNECTIONS: u32 = 25;

pub async fn run_server(config: ServerConfig) -> Result<(), ServerError> {
    let db = SqliteDatabase::new_with_url(&config.database_url, MAX_DB_CONNECTIONS)
        .await
        .map_err(|e| ServerError::InitializeError(e.to_string()))?;
    if config.run_migrations {
        db.migrate().await?;
    } else {
        info!("🚀️ Skipping database migrations");
    }
    let accrual = HttpAccrualClient::new(&config.accrual_url, config.poll_timeout)?;
    let guard = balance_guard(config.balance_lock_shards);
    let producers = start_event_handlers().await;

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let reconciler = start_reconciler(db, accrual, guard, producers, config.reconciler_config(), cancel_rx);
    let srv = create_server_instance(&config, reconciler.subscribe())?;
    let srv_handle = srv.handle();

    let result = tokio::select! {
        result = srv => {
            warn!("🚀️ HTTP server exited unexpectedly");
            result.map_err(ServerError::from)
        },
        result = tokio::signal::ctrl_c() => {
            match &result {
                Ok(()) => info!("🚀️ Shutdown requested"),
                Err(e) => error!("🚀️ Could not listen for the shutdown signal. {e}. Shutting down."),
            }
            srv_handle.stop(true).await;
            result.map_err(ServerError::from)
        },
    };
    cancel_tx.send_replace(true);
    reconciler.stopped().await;
    info!("🚀️ Reconciler drained. Goodbye.");
    result
}

pub fn create_server_instance(
    config: &ServerConfig,
    state: watch::Receiver<EngineState>,
) -> Result<Server, ServerError> {
    let srv = HttpServer::new(move || {
        App::new()
            .wrap(Logger::new("%t (%D ms) %s %a %{Host}i %U").log_target("loyalty::access_log"))
            .app_data(web::Data::new(state.clone()))
            .service(health)
            .service(status)
    })
    .keep_alive(KeepAlive::Timeout(Duration::from_secs(600)))
    .disable_signals()
    .bind((config.host.as_str(), config.port))?
    .run();
    Ok(srv)
}

fn balance_guard(shards: usize) -> BalanceGuard {
    if shards > 0 {
        info!("🚀️ Balance locks are sharded {shards} ways");
        BalanceGuard::with_shards(shards)
    } else {
        BalanceGuard::new()
    }
}

async fn start_event_handlers() -> EventProducers {
    let mut hooks = EventHooks::default();
    hooks.on_order_updated(|ev| {
        Box::pin(async move {
            if ev.credited.is_positive() {
                info!("💰️ {} credited {} for order {}", ev.user_id, ev.credited, ev.number);
            } else {
                debug!("💰️ Order {} moved from {} to {}", ev.number, ev.old_status, ev.new_status);
            }
        }) as Pin<Box<dyn Future<Output = ()> + Send>>
    });
    let handlers = EventHandlers::new(128, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;
    producers
}
