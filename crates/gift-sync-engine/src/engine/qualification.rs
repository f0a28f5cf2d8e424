//! 买赠资格判定
//!
//! 计数与消费金额都排除赠品行和手动免费行。
//! 任一商品集合解析失败时，该目标按不满足处理。

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::collection::{CollectionMembershipResolver, ProductIdSet};
use crate::models::{BxgyGoal, CartLine, CartSnapshot, GiftMarkers, QualifyMode, minor_to_major};

/// 单轮对账内的判定上下文
///
/// 集合解析结果（含失败）在同一轮内复用，不跨轮次保留
pub struct QualificationContext<'a> {
    cart: &'a CartSnapshot,
    markers: &'a GiftMarkers,
    resolver: &'a CollectionMembershipResolver,
    resolved: HashMap<String, Option<Arc<ProductIdSet>>>,
}

impl<'a> QualificationContext<'a> {
    pub fn new(
        cart: &'a CartSnapshot,
        markers: &'a GiftMarkers,
        resolver: &'a CollectionMembershipResolver,
    ) -> Self {
        Self {
            cart,
            markers,
            resolver,
            resolved: HashMap::new(),
        }
    }

    fn qualifying_lines(&self) -> impl Iterator<Item = &'a CartLine> + 'a {
        let markers = self.markers;
        self.cart
            .lines
            .iter()
            .filter(move |line| !markers.is_excluded(line))
    }

    /// 判定目标是否满足
    pub async fn is_qualified(&mut self, goal: &BxgyGoal) -> bool {
        match goal.mode {
            QualifyMode::Product => {
                let qty: u64 = self
                    .qualifying_lines()
                    .filter(|line| {
                        goal.buy_products
                            .iter()
                            .any(|p| p.matches_line(&line.product_id, &line.variant_id))
                    })
                    .map(|line| u64::from(line.quantity))
                    .sum();
                qty >= u64::from(goal.buy_qty)
            }
            QualifyMode::All => {
                let qty: u64 = self
                    .qualifying_lines()
                    .map(|line| u64::from(line.quantity))
                    .sum();
                qty >= u64::from(goal.buy_qty)
            }
            QualifyMode::Collection => {
                let Some(members) = self.collection_members(goal).await else {
                    return false;
                };
                let qty: u64 = self
                    .qualifying_lines()
                    .filter(|line| members.contains(&line.product_id))
                    .map(|line| u64::from(line.quantity))
                    .sum();
                qty >= u64::from(goal.buy_qty)
            }
            QualifyMode::SpendAnyCollection => {
                let Some(threshold) = goal.spend_amount else {
                    debug!("消费门槛未配置，按不满足处理");
                    return false;
                };
                let Some(members) = self.collection_members(goal).await else {
                    return false;
                };
                let spent: i64 = self
                    .qualifying_lines()
                    .filter(|line| members.contains(&line.product_id))
                    .map(CartLine::line_total)
                    .sum();
                minor_to_major(spent) >= threshold
            }
        }
    }

    /// 合并目标引用的所有集合成员；任一集合失败返回 None
    async fn collection_members(&mut self, goal: &BxgyGoal) -> Option<ProductIdSet> {
        let mut members = ProductIdSet::new();
        for collection in &goal.buy_collections {
            let handle = collection.handle.as_str();
            if !self.resolved.contains_key(handle) {
                let result = match self.resolver.resolve(handle).await {
                    Ok(set) => Some(set),
                    Err(e) => {
                        warn!(handle, error = %e, "商品集合解析失败，目标按不满足处理");
                        None
                    }
                };
                self.resolved.insert(handle.to_string(), result);
            }

            match self.resolved.get(handle) {
                Some(Some(set)) => members.extend_from(set),
                _ => return None,
            }
        }
        Some(members)
    }
}
