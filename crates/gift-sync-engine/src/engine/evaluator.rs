//! 赠品对账引擎
//!
//! 每次触发执行一轮完整对账：
//! 1. 占用互斥标记，已占用则直接丢弃本次触发
//! 2. 并发读取活动配置与购物车快照
//! 3. 按配置列表顺序评估生效中的买赠活动，得到期望赠品集合
//! 4. 与现有赠品行比对，并发下发全部变更
//! 5. 广播"购物车已变更"
//!
//! 读取失败时不做任何变更（fail open），依赖下一次触发重新计算。

use std::sync::Arc;
use std::time::Instant;

use futures::future::join_all;
use tracing::{Span, debug, error, info, instrument, warn};
use uuid::Uuid;

use super::dto::{PassOutcome, PassReport, PassTrigger};
use super::guard::InFlightFlag;
use super::planner::{DesiredGiftSet, GiftMutation, plan_mutations};
use super::qualification::QualificationContext;
use crate::broadcast::CartChangedBus;
use crate::collection::CollectionMembershipResolver;
use crate::config_cache::ConfigCache;
use crate::error::{Result, SyncError};
use crate::models::{CartSnapshot, GiftLine, GiftMarkers, ShopConfig};
use crate::platform::CartApi;

pub struct RuleEvaluationEngine {
    shop_key: String,
    config_cache: Arc<ConfigCache>,
    cart: Arc<dyn CartApi>,
    resolver: Arc<CollectionMembershipResolver>,
    markers: GiftMarkers,
    bus: CartChangedBus,
    in_flight: InFlightFlag,
}

impl RuleEvaluationEngine {
    pub fn new(
        shop_key: impl Into<String>,
        config_cache: Arc<ConfigCache>,
        cart: Arc<dyn CartApi>,
        resolver: Arc<CollectionMembershipResolver>,
        markers: GiftMarkers,
        bus: CartChangedBus,
    ) -> Self {
        Self {
            shop_key: shop_key.into(),
            config_cache,
            cart,
            resolver,
            markers,
            bus,
            in_flight: InFlightFlag::new(),
        }
    }

    pub fn bus(&self) -> &CartChangedBus {
        &self.bus
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.is_held()
    }

    /// 执行一轮对账
    #[instrument(skip(self), fields(shop = %self.shop_key, pass_id = tracing::field::Empty))]
    pub async fn run_pass(&self, trigger: PassTrigger) -> PassOutcome {
        let Some(_guard) = self.in_flight.try_acquire() else {
            debug!(trigger = trigger.as_str(), "已有对账在进行，丢弃本次触发");
            record_pass(&PassOutcome::Skipped, None);
            return PassOutcome::Skipped;
        };

        let pass_id = Uuid::new_v4();
        Span::current().record("pass_id", tracing::field::display(pass_id));
        let started = Instant::now();

        let outcome = self.reconcile(pass_id, trigger, started).await;
        record_pass(&outcome, Some(started));
        outcome
    }

    async fn reconcile(&self, pass_id: Uuid, trigger: PassTrigger, started: Instant) -> PassOutcome {
        let (config, cart) = tokio::join!(self.config_cache.get(&self.shop_key), self.cart.fetch_cart());
        let (config, cart) = match (config, cart) {
            (Ok(config), Ok(cart)) => (config, cart),
            (Err(e), _) | (_, Err(e)) => {
                error!(code = e.error_code(), error = %e, "对账读取失败，本轮不变更赠品");
                return PassOutcome::Aborted(e);
            }
        };

        if !config.has_active_bxgy() {
            debug!("没有生效中的买赠活动");
            self.bus.publish();
            return PassOutcome::NoActiveCampaigns;
        }

        let existing = GiftLine::collect(&cart, &self.markers);
        let (desired, evaluated, qualified) = self.desired_gifts(&config, &cart).await;
        let mutations = plan_mutations(&desired, &existing);

        let failures = self.apply(&mutations).await;
        self.bus.publish();

        let report = PassReport {
            pass_id,
            trigger,
            campaigns_evaluated: evaluated,
            campaigns_qualified: qualified,
            mutations,
            failures,
            elapsed_ms: started.elapsed().as_millis() as u64,
        };

        if report.failures.is_empty() {
            info!(
                evaluated = report.campaigns_evaluated,
                qualified = report.campaigns_qualified,
                mutations = report.mutations.len(),
                elapsed_ms = report.elapsed_ms,
                "对账完成"
            );
        } else {
            warn!(
                mutations = report.mutations.len(),
                failed = report.failures.len(),
                elapsed_ms = report.elapsed_ms,
                "对账完成，部分变更失败"
            );
        }
        PassOutcome::Completed(report)
    }

    /// 计算期望赠品集合，返回（集合，评估数，满足数）
    async fn desired_gifts(
        &self,
        config: &ShopConfig,
        cart: &CartSnapshot,
    ) -> (DesiredGiftSet, usize, usize) {
        let mut desired = DesiredGiftSet::new();
        let mut ctx = QualificationContext::new(cart, &self.markers, &self.resolver);
        let mut evaluated = 0;
        let mut qualified = 0;

        for (campaign, goals) in config.active_bxgy() {
            let Some(goal) = goals.first() else {
                debug!(campaign_id = %campaign.id, "买赠活动没有目标，跳过");
                continue;
            };
            evaluated += 1;

            if !ctx.is_qualified(goal).await {
                debug!(campaign_id = %campaign.id, mode = ?goal.mode, "未满足买赠条件");
                continue;
            }
            qualified += 1;

            if goal.get_qty == 0 {
                debug!(campaign_id = %campaign.id, "赠品数量为 0，不发放");
                continue;
            }
            for product in &goal.get_products {
                desired.insert(product.gift_variant_id(), goal.get_qty, &campaign.id);
            }
        }

        (desired, evaluated, qualified)
    }

    /// 并发下发变更，等待全部完成后返回失败项
    async fn apply(&self, mutations: &[GiftMutation]) -> Vec<SyncError> {
        let results = join_all(mutations.iter().map(|m| self.apply_one(m))).await;

        results
            .into_iter()
            .zip(mutations)
            .filter_map(|(result, mutation)| {
                let outcome = if result.is_ok() { "ok" } else { "error" };
                metrics::counter!(
                    "gift_sync_mutations_total",
                    "kind" => mutation.kind(),
                    "result" => outcome
                )
                .increment(1);

                result.err().map(|e| {
                    warn!(
                        kind = mutation.kind(),
                        variant_id = mutation.variant_id(),
                        error = %e,
                        "赠品变更失败"
                    );
                    SyncError::MutationFailed {
                        operation: mutation.kind(),
                        variant_id: mutation.variant_id().to_string(),
                        reason: e.to_string(),
                    }
                })
            })
            .collect()
    }

    async fn apply_one(&self, mutation: &GiftMutation) -> Result<()> {
        match mutation {
            GiftMutation::Add {
                variant_id,
                quantity,
            } => {
                self.cart
                    .add_line(variant_id, *quantity, self.markers.gift_properties())
                    .await
            }
            GiftMutation::Change {
                line_key, quantity, ..
            } => self.cart.change_line(line_key, *quantity).await,
            GiftMutation::Remove { line_key, .. } => self.cart.change_line(line_key, 0).await,
        }
    }
}

fn record_pass(outcome: &PassOutcome, started: Option<Instant>) {
    metrics::counter!("gift_sync_passes_total", "outcome" => outcome.label()).increment(1);
    if let Some(started) = started {
        metrics::histogram!("gift_sync_pass_duration_seconds").record(started.elapsed().as_secs_f64());
    }
}
