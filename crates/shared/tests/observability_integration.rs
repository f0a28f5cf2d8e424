//! 可观测性模块集成测试
//!
//! 全局 recorder 与 subscriber 每个进程只能安装一次，因此每项只在一个测试中初始化。

use gift_shared::config::ObservabilityConfig;
use gift_shared::observability;
use tokio_test::assert_ok;

#[tokio::test]
async fn test_metrics_exporter_renders_registered_metrics() {
    let _handle = observability::metrics::init("gift-sync-test", 0)
        .await
        .unwrap();

    metrics::counter!("gift_sync_passes_total", "outcome" => "completed").increment(2);
    metrics::counter!("gift_sync_mutations_total", "kind" => "add", "result" => "ok").increment(1);

    let rendered = observability::metrics::get_handle().unwrap().render();
    assert!(rendered.contains("service_starts_total"));
    assert!(rendered.contains("gift_sync_passes_total"));
    assert!(rendered.contains(r#"outcome="completed""#));
    assert!(rendered.contains(r#"kind="add""#));
}

#[tokio::test]
async fn test_tracing_init_only_once() {
    let config = ObservabilityConfig {
        log_level: "debug".to_string(),
        json_logs: true,
        metrics_enabled: false,
        metrics_port: 0,
    };

    let _guard = assert_ok!(observability::init("gift-sync-test", &config).await);

    // 第二次安装全局 subscriber 会失败
    assert!(observability::init("gift-sync-test", &config).await.is_err());
}
