//! 购物车观察器
//!
//! 宿主页面上的任意代码都可能修改购物车。观察器在三个入口通道
//! （网络调用、请求对象调用、表单提交）各有一个注册点，识别出加购与改量信号：
//!
//! - 加购：立即触发一轮对账
//! - 改量：启动或重置唯一的去抖计时器，静默窗口结束后触发一轮对账
//!
//! 观察器从不等待对账完成；对账进行中时的新触发由引擎自行丢弃。

mod adapters;
pub mod classify;

pub use adapters::{Channel, FormAdapter, NetworkAdapter, RequestAdapter};
pub use classify::{CartSignal, NetworkCondition, classify, classify_form};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep_until};
use tracing::{debug, info};

use crate::engine::{PassTrigger, RuleEvaluationEngine};

/// 对账触发入口
///
/// 实现方必须立即返回，不能在调用方上下文中执行对账
pub trait ReconcileTrigger: Send + Sync + 'static {
    fn fire(&self, trigger: PassTrigger);
}

/// 以独立任务执行引擎对账
pub struct EngineTrigger {
    engine: Arc<RuleEvaluationEngine>,
}

impl EngineTrigger {
    pub fn new(engine: Arc<RuleEvaluationEngine>) -> Self {
        Self { engine }
    }
}

impl ReconcileTrigger for EngineTrigger {
    fn fire(&self, trigger: PassTrigger) {
        let engine = self.engine.clone();
        tokio::spawn(async move {
            engine.run_pass(trigger).await;
        });
    }
}

/// 去抖配置
#[derive(Debug, Clone, Copy)]
pub struct DebounceConfig {
    pub window: Duration,
    /// 弱网环境下的窗口
    pub slow_window: Duration,
}

impl Default for DebounceConfig {
    fn default() -> Self {
        Self {
            window: Duration::from_millis(200),
            slow_window: Duration::from_millis(600),
        }
    }
}

impl DebounceConfig {
    pub fn window_for(&self, poor_network: bool) -> Duration {
        if poor_network {
            self.slow_window
        } else {
            self.window
        }
    }
}

#[derive(Debug)]
pub(crate) enum ObserverEvent {
    Signal {
        signal: CartSignal,
        poor_network: bool,
    },
    Shutdown,
}

const QUEUE_CAPACITY: usize = 256;

/// 购物车观察器
pub struct CartObserver {
    network: NetworkAdapter,
    request: RequestAdapter,
    form: FormAdapter,
    tx: mpsc::Sender<ObserverEvent>,
    task: JoinHandle<()>,
}

impl CartObserver {
    /// 启动观察循环
    pub fn spawn(trigger: Arc<dyn ReconcileTrigger>, debounce: DebounceConfig) -> Self {
        let (tx, rx) = mpsc::channel(QUEUE_CAPACITY);
        let task = tokio::spawn(run_loop(rx, trigger, debounce));
        info!(
            window_ms = debounce.window.as_millis() as u64,
            slow_window_ms = debounce.slow_window.as_millis() as u64,
            "购物车观察器已启动"
        );

        Self {
            network: NetworkAdapter::new(tx.clone()),
            request: RequestAdapter::new(tx.clone()),
            form: FormAdapter::new(tx.clone()),
            tx,
            task,
        }
    }

    pub fn network(&self) -> &NetworkAdapter {
        &self.network
    }

    pub fn request(&self) -> &RequestAdapter {
        &self.request
    }

    pub fn form(&self) -> &FormAdapter {
        &self.form
    }

    /// 停止观察循环，未到期的去抖计时直接丢弃
    pub async fn shutdown(self) {
        let _ = self.tx.send(ObserverEvent::Shutdown).await;
        let _ = self.task.await;
        info!("购物车观察器已停止");
    }
}

async fn run_loop(
    mut rx: mpsc::Receiver<ObserverEvent>,
    trigger: Arc<dyn ReconcileTrigger>,
    debounce: DebounceConfig,
) {
    let mut deadline: Option<Instant> = None;

    loop {
        tokio::select! {
            event = rx.recv() => match event {
                Some(ObserverEvent::Signal { signal: CartSignal::Add, .. }) => {
                    debug!("加购信号，立即对账");
                    trigger.fire(PassTrigger::Add);
                }
                Some(ObserverEvent::Signal { signal: CartSignal::Mutate, poor_network }) => {
                    let window = debounce.window_for(poor_network);
                    deadline = Some(Instant::now() + window);
                    debug!(window_ms = window.as_millis() as u64, "改量信号，重置去抖计时");
                }
                Some(ObserverEvent::Shutdown) | None => break,
            },
            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                deadline = None;
                debug!("去抖窗口结束，触发对账");
                trigger.fire(PassTrigger::Mutate);
            }
        }
    }

    if deadline.is_some() {
        debug!("观察器停止，丢弃未到期的去抖计时");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::UnboundedSender;

    struct RecordingTrigger {
        tx: UnboundedSender<(PassTrigger, Instant)>,
    }

    impl ReconcileTrigger for RecordingTrigger {
        fn fire(&self, trigger: PassTrigger) {
            let _ = self.tx.send((trigger, Instant::now()));
        }
    }

    fn observer() -> (CartObserver, mpsc::UnboundedReceiver<(PassTrigger, Instant)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let observer = CartObserver::spawn(Arc::new(RecordingTrigger { tx }), DebounceConfig::default());
        (observer, rx)
    }

    #[tokio::test(start_paused = true)]
    async fn test_burst_of_mutations_fires_once_after_quiet_window() {
        let (observer, mut rx) = observer();

        observer.network().observe("/cart/change.js", "POST", None);
        for _ in 0..4 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            assert_eq!(
                observer.network().observe("/cart/change.js", "POST", None),
                Some(CartSignal::Mutate)
            );
        }
        let last = Instant::now();

        let (trigger, fired_at) = rx.recv().await.unwrap();
        assert_eq!(trigger, PassTrigger::Mutate);
        let waited = fired_at - last;
        assert!(waited >= Duration::from_millis(200) && waited < Duration::from_millis(202));

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert!(rx.try_recv().is_err());
        observer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_nothing_fires_inside_quiet_window() {
        let (observer, mut rx) = observer();
        observer.request().observe("/cart/update.js", "POST", None);

        tokio::time::sleep(Duration::from_millis(199)).await;
        assert!(rx.try_recv().is_err());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(rx.try_recv().unwrap().0, PassTrigger::Mutate);
        observer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_add_fires_immediately() {
        let (observer, mut rx) = observer();
        let start = Instant::now();
        assert_eq!(
            observer.form().observe("/cart/add", "post", None),
            Some(CartSignal::Add)
        );

        let (trigger, fired_at) = rx.recv().await.unwrap();
        assert_eq!(trigger, PassTrigger::Add);
        assert_eq!(fired_at, start);
        observer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_network_widens_window() {
        let (observer, mut rx) = observer();
        let start = Instant::now();
        observer
            .network()
            .observe("/cart/change.js", "POST", Some(&NetworkCondition::new("3g")));

        let (_, fired_at) = rx.recv().await.unwrap();
        let waited = fired_at - start;
        assert!(waited >= Duration::from_millis(600) && waited < Duration::from_millis(602));
        observer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_ignored_calls_never_fire() {
        let (observer, mut rx) = observer();
        assert_eq!(observer.network().observe("/cart.js", "GET", None), None);
        assert_eq!(observer.form().observe("/cart/change", "POST", None), None);

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
        observer.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_discards_pending_timer() {
        let (observer, mut rx) = observer();
        observer.network().observe("/cart/clear.js", "POST", None);
        tokio::task::yield_now().await;
        observer.shutdown().await;

        tokio::time::sleep(Duration::from_secs(1)).await;
        assert!(rx.try_recv().is_err());
    }
}
