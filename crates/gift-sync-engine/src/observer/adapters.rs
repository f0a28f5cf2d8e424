//! 三个入口通道的适配器
//!
//! 每个通道只有一个注册点，识别后的信号统一投递给观察循环。

use tokio::sync::mpsc;
use tracing::{trace, warn};

use super::ObserverEvent;
use super::classify::{CartSignal, NetworkCondition, classify, classify_form};

/// 信号来源通道
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// 通用网络调用（fetch 风格）
    Network,
    /// 请求对象风格调用（XHR 风格）
    Request,
    /// 原生表单提交
    Form,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Network => "network",
            Self::Request => "request",
            Self::Form => "form",
        }
    }
}

#[derive(Debug, Clone)]
struct Emitter {
    channel: Channel,
    tx: mpsc::Sender<ObserverEvent>,
}

impl Emitter {
    fn emit(&self, signal: Option<CartSignal>, condition: Option<&NetworkCondition>) -> Option<CartSignal> {
        let signal = signal?;
        metrics::counter!(
            "gift_sync_signals_total",
            "channel" => self.channel.as_str(),
            "kind" => signal.as_str()
        )
        .increment(1);

        let event = ObserverEvent::Signal {
            signal,
            poor_network: condition.is_some_and(NetworkCondition::is_poor),
        };
        match self.tx.try_send(event) {
            Ok(()) => trace!(channel = self.channel.as_str(), kind = signal.as_str(), "购物车信号"),
            Err(e) => warn!(channel = self.channel.as_str(), error = %e, "观察队列不可用，信号丢弃"),
        }
        Some(signal)
    }
}

/// 通用网络调用适配器
#[derive(Debug, Clone)]
pub struct NetworkAdapter {
    emitter: Emitter,
}

impl NetworkAdapter {
    pub(super) fn new(tx: mpsc::Sender<ObserverEvent>) -> Self {
        Self {
            emitter: Emitter {
                channel: Channel::Network,
                tx,
            },
        }
    }

    /// 上报一次调用，返回识别出的信号
    pub fn observe(&self, url: &str, method: &str, condition: Option<&NetworkCondition>) -> Option<CartSignal> {
        self.emitter.emit(classify(url, method), condition)
    }
}

/// 请求对象风格调用适配器
#[derive(Debug, Clone)]
pub struct RequestAdapter {
    emitter: Emitter,
}

impl RequestAdapter {
    pub(super) fn new(tx: mpsc::Sender<ObserverEvent>) -> Self {
        Self {
            emitter: Emitter {
                channel: Channel::Request,
                tx,
            },
        }
    }

    pub fn observe(&self, url: &str, method: &str, condition: Option<&NetworkCondition>) -> Option<CartSignal> {
        self.emitter.emit(classify(url, method), condition)
    }
}

/// 表单提交适配器，只识别加购
#[derive(Debug, Clone)]
pub struct FormAdapter {
    emitter: Emitter,
}

impl FormAdapter {
    pub(super) fn new(tx: mpsc::Sender<ObserverEvent>) -> Self {
        Self {
            emitter: Emitter {
                channel: Channel::Form,
                tx,
            },
        }
    }

    pub fn observe(&self, action: &str, method: &str, condition: Option<&NetworkCondition>) -> Option<CartSignal> {
        self.emitter.emit(classify_form(action, method), condition)
    }
}
