use std::{
    future::Future,
    pin::Pin,
    sync::{atomic::AtomicI32, Arc},
    time::Duration,
};

use log::*;
use loyalty_engine::{
    db_types::*,
    events::{EventHandlers, EventHooks},
    test_utils::prepare_env::{prepare_test_env, random_db_path},
    BalanceGuard,
    BalanceStore,
    SqliteDatabase,
    WithdrawalsApi,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};
use tokio::runtime::Runtime;

async fn setup() -> (String, SqliteDatabase) {
    let url = random_db_path();
    let db = prepare_test_env(&url).await;
    (url, db)
}

async fn tear_down(url: &str, db: SqliteDatabase) {
    db.pool().close().await;
    Sqlite::drop_database(url).await.unwrap();
}

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    }

    pub fn count(&self) -> i32 {
        self.called.load(std::sync::atomic::Ordering::Relaxed)
    }
}

#[test]
fn on_withdrawal() {
    dotenvy::from_filename(".env.test").ok();
    let _ = env_logger::try_init();
    let rt = Runtime::new().unwrap();
    let event = HookCalled::default();
    let event_copy = event.clone();
    rt.block_on(async move {
        let (url, db) = setup().await;
        let mut hooks = EventHooks::default();
        hooks.on_withdrawal(move |ev| {
            info!("🪝️ {ev:?}");
            event_copy.called();
            Box::pin(async {}) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        let handlers = EventHandlers::new(10, hooks);
        let producers = handlers.producers();
        handlers.start_handlers().await;

        let alice = UserId::from(1);
        db.credit(alice, Points::from_points(100)).await.unwrap();
        let api = WithdrawalsApi::new(db.clone(), BalanceGuard::new(), producers);
        api.withdraw(alice, "2377225624".parse().unwrap(), Points::from_points(40)).await.expect("Withdrawal failed");
        api.withdraw(alice, "12345678903".parse().unwrap(), Points::from_points(40)).await.expect("Withdrawal failed");
        // Refused withdrawals do not fire the hook
        assert!(api.withdraw(alice, "79927398713".parse().unwrap(), Points::from_points(40)).await.is_err());
        tokio::time::sleep(Duration::from_millis(50)).await;
        tear_down(&url, db).await;
    });
    assert_eq!(event.count(), 2);
}
