//! 阶梯进度计算
//!
//! 只读：从购物车与活动配置计算进度视图，从不修改购物车。
//! 计量值跟随平台小计与件数，因此赠品行也计入。

use std::sync::Arc;

use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

use super::renderer::ProgressRenderer;
use crate::broadcast::CartChangedBus;
use crate::config_cache::ConfigCache;
use crate::models::{Campaign, CampaignRules, CartSnapshot, ProgressGoal, ShopConfig, TrackType};
use crate::platform::CartApi;

/// 单个阶梯的进度
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TierProgress {
    pub title: String,
    pub description: Option<String>,
    pub reward_type: String,
    pub target: f64,
    pub unlocked: bool,
    pub remaining: f64,
    pub percent: f64,
}

/// 渲染用的进度视图
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressView {
    pub campaign_id: String,
    pub track_type: TrackType,
    pub track_value: f64,
    /// 按目标值升序
    pub tiers: Vec<TierProgress>,
    /// 第一个未解锁阶梯
    pub next_goal: Option<TierProgress>,
    pub message: String,
}

impl ProgressView {
    pub fn all_unlocked(&self) -> bool {
        self.next_goal.is_none()
    }
}

pub const COMPLETION_MESSAGE: &str = "All rewards unlocked!";

/// 选出生效中优先级最高（priority 最小）的进度活动，同优先级取先出现者
pub fn select_campaign(config: &ShopConfig) -> Option<(&Campaign, TrackType, &[ProgressGoal])> {
    config
        .campaigns
        .iter()
        .filter(|c| c.is_active())
        .filter_map(|c| match &c.rules {
            CampaignRules::ProgressTiers { track_type, goals } => Some((c, *track_type, goals.as_slice())),
            _ => None,
        })
        .min_by_key(|(c, _, _)| c.priority)
}

/// 计算进度视图，没有生效中的进度活动时返回 None
pub fn project(config: &ShopConfig, cart: &CartSnapshot) -> Option<ProgressView> {
    let (campaign, track_type, goals) = select_campaign(config)?;

    let track_value = match track_type {
        TrackType::CartValue => cart.subtotal_major().to_f64().unwrap_or(0.0),
        TrackType::Quantity => cart.total_quantity() as f64,
    };

    let mut sorted: Vec<&ProgressGoal> = goals.iter().collect();
    sorted.sort_by(|a, b| a.target.total_cmp(&b.target));

    let tiers: Vec<TierProgress> = sorted
        .into_iter()
        .map(|goal| tier_progress(goal, track_value))
        .collect();
    let next_goal = tiers.iter().find(|t| !t.unlocked).cloned();

    let message = match &next_goal {
        None => COMPLETION_MESSAGE.to_string(),
        Some(next) => format!(
            "Need {} more to unlock {}",
            format_amount(track_type, next.remaining),
            next.title
        ),
    };

    Some(ProgressView {
        campaign_id: campaign.id.clone(),
        track_type,
        track_value,
        tiers,
        next_goal,
        message,
    })
}

fn tier_progress(goal: &ProgressGoal, track_value: f64) -> TierProgress {
    let percent = if goal.target <= 0.0 {
        100.0
    } else {
        (track_value / goal.target * 100.0).min(100.0)
    };

    TierProgress {
        title: goal.title.clone(),
        description: goal.description.clone(),
        reward_type: goal.reward_type.clone(),
        target: goal.target,
        unlocked: track_value >= goal.target,
        remaining: (goal.target - track_value).max(0.0),
        percent,
    }
}

fn format_amount(track_type: TrackType, amount: f64) -> String {
    match track_type {
        TrackType::CartValue => format!("{amount:.2}"),
        TrackType::Quantity => format!("{}", amount.ceil() as u64),
    }
}

/// 进度展示
pub struct ProgressProjector {
    shop_key: String,
    config_cache: Arc<ConfigCache>,
    cart: Arc<dyn CartApi>,
    renderer: Arc<dyn ProgressRenderer>,
}

impl ProgressProjector {
    pub fn new(
        shop_key: impl Into<String>,
        config_cache: Arc<ConfigCache>,
        cart: Arc<dyn CartApi>,
        renderer: Arc<dyn ProgressRenderer>,
    ) -> Self {
        Self {
            shop_key: shop_key.into(),
            config_cache,
            cart,
            renderer,
        }
    }

    /// 重新读取购物车与配置并渲染
    ///
    /// 读取失败时保留上一次的渲染结果
    #[instrument(skip(self), fields(shop = %self.shop_key))]
    pub async fn refresh(&self) {
        let (config, cart) = tokio::join!(self.config_cache.get(&self.shop_key), self.cart.fetch_cart());
        let (config, cart) = match (config, cart) {
            (Ok(config), Ok(cart)) => (config, cart),
            (Err(e), _) | (_, Err(e)) => {
                warn!(code = e.error_code(), error = %e, "进度刷新读取失败");
                return;
            }
        };

        match project(&config, &cart) {
            Some(view) => {
                debug!(campaign_id = %view.campaign_id, track_value = view.track_value, "进度已刷新");
                self.renderer.render(&view);
            }
            None => self.renderer.clear(),
        }
    }

    /// 订阅购物车变更广播，每次信号都重新渲染
    pub fn subscribe(self: Arc<Self>, bus: &CartChangedBus) -> JoinHandle<()> {
        let rx = bus.subscribe();
        tokio::spawn(self.run(rx))
    }

    async fn run(self: Arc<Self>, mut rx: broadcast::Receiver<crate::broadcast::CartChanged>) {
        loop {
            match rx.recv().await {
                Ok(_) => self.refresh().await,
                Err(RecvError::Lagged(missed)) => {
                    debug!(missed, "进度订阅落后，合并为一次刷新");
                    self.refresh().await;
                }
                Err(RecvError::Closed) => break,
            }
        }
    }
}
