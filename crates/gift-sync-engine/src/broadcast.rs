//! "购物车已变更"广播
//!
//! 每轮对账结束后发出，进度展示等只读消费者据此重新渲染。
//! 信号本身不携带数据，订阅方自行拉取最新购物车。

use tokio::sync::broadcast;
use tracing::trace;

/// 购物车变更信号
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartChanged;

/// 购物车变更广播总线
#[derive(Debug, Clone)]
pub struct CartChangedBus {
    sender: broadcast::Sender<CartChanged>,
}

impl CartChangedBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// 发布信号，没有订阅者时静默丢弃
    pub fn publish(&self) {
        let receivers = self.sender.send(CartChanged).unwrap_or(0);
        trace!(receivers, "cart changed broadcast");
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CartChanged> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for CartChangedBus {
    fn default() -> Self {
        Self::new(16)
    }
}
