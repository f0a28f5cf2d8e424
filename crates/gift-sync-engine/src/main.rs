//! 赠品同步服务
//!
//! 单线程协作式运行时：观察循环、对账与进度刷新在同一线程上交错执行。

use std::sync::Arc;
use std::time::Duration;

use gift_shared::{
    cache::Cache, config::AppConfig, config::EngineConfig, database::Database, observability,
};
use gift_sync::collection::{
    CollectionCache, CollectionMembershipResolver, NoCollectionCache, ResolverConfig,
    TtlCollectionCache,
};
use gift_sync::config_cache::{ConfigCache, PgConfigSource, RedisConfigCache};
use gift_sync::ingress::{self, IngressState};
use gift_sync::models::GiftMarkers;
use gift_sync::platform::{CartApi, HttpCartClient, HttpCollectionClient, StorefrontHttp};
use gift_sync::{
    CartChangedBus, CartObserver, DebounceConfig, EngineTrigger, LatestProgress, PassTrigger,
    ProgressProjector, ReconcileTrigger, RuleEvaluationEngine,
};
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load("gift-sync")?;
    let _guard = observability::init(&config.service_name, &config.observability).await?;

    info!(
        environment = %config.environment,
        shop = %config.storefront.shop_key,
        storefront = %config.storefront.base_url,
        "Starting gift-sync on {}",
        config.server_addr()
    );

    // 数据库懒连接：配置读取失败只影响单轮对账
    let db = Database::connect_lazy(&config.database)?;
    let cache = Cache::new(&config.redis)?;
    let config_cache = Arc::new(ConfigCache::new(
        Arc::new(RedisConfigCache::new(cache)),
        Arc::new(PgConfigSource::new(db.pool().clone())),
    ));

    let http = StorefrontHttp::new(&config.storefront)?;
    let cart: Arc<dyn CartApi> = Arc::new(HttpCartClient::new(http.clone()));
    let resolver = Arc::new(CollectionMembershipResolver::with_cache(
        Arc::new(HttpCollectionClient::new(http)),
        collection_cache(&config.engine),
        ResolverConfig {
            page_size: config.engine.collection_page_size,
            max_pages: config.engine.collection_max_pages,
        },
    ));

    let bus = CartChangedBus::default();
    let engine = Arc::new(RuleEvaluationEngine::new(
        config.storefront.shop_key.clone(),
        config_cache.clone(),
        cart.clone(),
        resolver,
        GiftMarkers::new(
            config.engine.gift_marker_key.clone(),
            config.engine.free_gift_marker_key.clone(),
        ),
        bus.clone(),
    ));

    let progress = Arc::new(LatestProgress::new());
    let projector = Arc::new(ProgressProjector::new(
        config.storefront.shop_key.clone(),
        config_cache,
        cart,
        progress.clone(),
    ));
    let projector_task = projector.clone().subscribe(&bus);
    projector.refresh().await;

    let trigger: Arc<dyn ReconcileTrigger> = Arc::new(EngineTrigger::new(engine));
    let observer = CartObserver::spawn(
        trigger.clone(),
        DebounceConfig {
            window: Duration::from_millis(config.engine.debounce_ms),
            slow_window: Duration::from_millis(config.engine.slow_network_debounce_ms),
        },
    );

    // 启动时先对账一次，纠正离线期间的漂移
    trigger.fire(PassTrigger::Manual);

    let app = ingress::router(IngressState::new(&observer, progress, trigger));

    let listener = TcpListener::bind(config.server_addr()).await?;
    info!("Listening on {}", config.server_addr());

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    observer.shutdown().await;
    projector_task.abort();
    db.close().await;

    info!("Service shutdown complete");
    Ok(())
}

fn collection_cache(engine: &EngineConfig) -> Arc<dyn CollectionCache> {
    if engine.collection_cache_ttl_seconds == 0 {
        return Arc::new(NoCollectionCache);
    }
    info!(
        ttl_seconds = engine.collection_cache_ttl_seconds,
        capacity = engine.collection_cache_capacity,
        "商品集合缓存已启用"
    );
    Arc::new(TtlCollectionCache::new(
        Duration::from_secs(engine.collection_cache_ttl_seconds),
        engine.collection_cache_capacity,
    ))
}

/// 优雅关闭信号处理
///
/// 监听 Ctrl+C 和 SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown...");
        },
        _ = terminate => {
            info!("Received SIGTERM, starting graceful shutdown...");
        },
    }
}
