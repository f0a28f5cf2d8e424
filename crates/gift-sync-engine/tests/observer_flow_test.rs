//! 观察器到引擎的端到端测试
//!
//! 时间被暂停，去抖窗口由 tokio 自动推进

use std::sync::Arc;
use std::time::Duration;

use gift_sync::collection::{CollectionMembershipResolver, ResolverConfig};
use gift_sync::models::GiftMarkers;
use gift_sync::test_utils::{
    CartCall, FakeCart, StaticCollections, StaticConfigSource, cart_line, static_config_cache,
};
use gift_sync::{
    CartChangedBus, CartObserver, DebounceConfig, EngineTrigger, LatestProgress, ProgressProjector,
    RuleEvaluationEngine,
};
use serde_json::json;

struct Storefront {
    cart: Arc<FakeCart>,
    observer: CartObserver,
    progress: Arc<LatestProgress>,
}

fn storefront() -> Storefront {
    let cart = Arc::new(FakeCart::new(vec![cart_line("k1", "P1", "V1", 1, 2500)]));
    let config_cache = Arc::new(static_config_cache(Arc::new(StaticConfigSource::from_json(json!({
        "campaigns": [
            {
                "id": "c1", "kind": "bxgy", "status": "active",
                "goals": [{
                    "mode": "product", "buyQty": 2, "getQty": 1,
                    "buyProducts": ["P1"], "getProducts": [{"id": "GV1"}]
                }]
            },
            {
                "id": "t1", "kind": "progress_tiers", "status": "active", "trackType": "cart_value",
                "goals": [{"target": 100, "rewardType": "shipping", "title": "Free shipping"}]
            }
        ]
    })))));

    let bus = CartChangedBus::default();
    let engine = Arc::new(RuleEvaluationEngine::new(
        "demo-shop",
        config_cache.clone(),
        cart.clone(),
        Arc::new(CollectionMembershipResolver::new(
            Arc::new(StaticCollections::new()),
            ResolverConfig::default(),
        )),
        GiftMarkers::default(),
        bus.clone(),
    ));

    let progress = Arc::new(LatestProgress::new());
    let projector = Arc::new(ProgressProjector::new(
        "demo-shop",
        config_cache,
        cart.clone(),
        progress.clone(),
    ));
    projector.subscribe(&bus);

    let observer = CartObserver::spawn(Arc::new(EngineTrigger::new(engine)), DebounceConfig::default());
    Storefront {
        cart,
        observer,
        progress,
    }
}

async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}

fn gift_count(cart: &FakeCart) -> usize {
    cart.gift_lines("_auto_gift").len()
}

/// 连续改量只触发一轮对账，赠品在静默窗口之后到达
#[tokio::test(start_paused = true)]
async fn test_debounced_mutations_reconcile_once() {
    let shop = storefront();

    let mut lines = shop.cart.snapshot().lines;
    lines[0].quantity = 2;
    shop.cart.set_lines(lines);

    for _ in 0..4 {
        shop.observer.request().observe("/cart/change.js", "POST", None);
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    settle().await;
    assert_eq!(gift_count(&shop.cart), 0);
    assert!(shop.cart.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    settle().await;

    assert_eq!(gift_count(&shop.cart), 1);
    let fetches = shop
        .cart
        .calls()
        .into_iter()
        .filter(|c| matches!(c, CartCall::Fetch))
        .count();
    // 一次对账读取 + 一次进度刷新读取
    assert_eq!(fetches, 2);

    let view = shop.progress.latest().unwrap();
    assert_eq!(view.campaign_id, "t1");
    assert_eq!(view.track_value, 50.0);
    assert_eq!(view.message, "Need 50.00 more to unlock Free shipping");

    shop.observer.shutdown().await;
}

/// 表单加购立即对账，不等待去抖窗口
#[tokio::test(start_paused = true)]
async fn test_form_add_reconciles_immediately() {
    let shop = storefront();

    let mut lines = shop.cart.snapshot().lines;
    lines[0].quantity = 3;
    shop.cart.set_lines(lines);

    let signal = shop.observer.form().observe("/cart/add", "post", None);
    assert!(signal.is_some());
    settle().await;

    assert_eq!(gift_count(&shop.cart), 1);
    assert!(shop.progress.latest().is_some());

    shop.observer.shutdown().await;
}

/// 停止观察器后，未到期的改量计时不再触发对账
#[tokio::test(start_paused = true)]
async fn test_shutdown_drops_pending_mutation() {
    let shop = storefront();

    let mut lines = shop.cart.snapshot().lines;
    lines[0].quantity = 2;
    shop.cart.set_lines(lines);

    shop.observer.network().observe("/cart/update.js", "POST", None);
    settle().await;
    let Storefront { cart, observer, .. } = shop;
    observer.shutdown().await;

    tokio::time::sleep(Duration::from_millis(500)).await;
    settle().await;
    assert!(cart.calls().is_empty());
    assert_eq!(gift_count(&cart), 0);
}
