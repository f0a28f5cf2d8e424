//! 期望赠品集合与变更计划
//!
//! 期望集合每轮从零重算，再与购物车中的赠品行逐一比对得出最小变更。

use serde::Serialize;
use tracing::debug;

use crate::models::GiftLine;

/// 本轮期望存在的赠品：规格 ID → 数量，保留首次写入顺序
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DesiredGiftSet {
    entries: Vec<DesiredGift>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DesiredGift {
    pub variant_id: String,
    pub quantity: u32,
    /// 最后一次写入该规格的活动
    pub campaign_id: String,
}

impl DesiredGiftSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入期望数量，同一规格后写覆盖先写
    pub fn insert(&mut self, variant_id: &str, quantity: u32, campaign_id: &str) {
        if let Some(existing) = self.entries.iter_mut().find(|e| e.variant_id == variant_id) {
            if existing.quantity != quantity {
                debug!(
                    variant_id,
                    previous = existing.quantity,
                    previous_campaign = %existing.campaign_id,
                    quantity,
                    campaign_id,
                    "赠品数量被后续活动覆盖"
                );
            }
            existing.quantity = quantity;
            existing.campaign_id = campaign_id.to_string();
            return;
        }
        self.entries.push(DesiredGift {
            variant_id: variant_id.to_string(),
            quantity,
            campaign_id: campaign_id.to_string(),
        });
    }

    pub fn get(&self, variant_id: &str) -> Option<u32> {
        self.entries
            .iter()
            .find(|e| e.variant_id == variant_id)
            .map(|e| e.quantity)
    }

    pub fn contains(&self, variant_id: &str) -> bool {
        self.get(variant_id).is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &DesiredGift> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// 赠品行变更
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum GiftMutation {
    /// 新增赠品行（带赠品标记）
    Add { variant_id: String, quantity: u32 },
    /// 调整已有赠品行数量
    Change {
        line_key: String,
        variant_id: String,
        quantity: u32,
    },
    /// 移除赠品行（数量设为 0）
    Remove { line_key: String, variant_id: String },
}

impl GiftMutation {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Add { .. } => "add",
            Self::Change { .. } => "change",
            Self::Remove { .. } => "remove",
        }
    }

    pub fn variant_id(&self) -> &str {
        match self {
            Self::Add { variant_id, .. }
            | Self::Change { variant_id, .. }
            | Self::Remove { variant_id, .. } => variant_id,
        }
    }
}

/// 比对期望集合与现有赠品行
///
/// - 期望中有、购物车中没有：新增
/// - 两边都有但数量不同：以该规格的第一条赠品行为准改量
/// - 购物车中有、期望中没有：移除（同一规格的多条行全部移除）
pub fn plan_mutations(desired: &DesiredGiftSet, existing: &[GiftLine]) -> Vec<GiftMutation> {
    let mut mutations = Vec::new();

    for gift in desired.iter() {
        match existing.iter().find(|line| line.variant_id == gift.variant_id) {
            Some(line) if line.quantity != gift.quantity => mutations.push(GiftMutation::Change {
                line_key: line.key.clone(),
                variant_id: gift.variant_id.clone(),
                quantity: gift.quantity,
            }),
            Some(_) => {}
            None => mutations.push(GiftMutation::Add {
                variant_id: gift.variant_id.clone(),
                quantity: gift.quantity,
            }),
        }
    }

    for line in existing {
        if !desired.contains(&line.variant_id) {
            mutations.push(GiftMutation::Remove {
                line_key: line.key.clone(),
                variant_id: line.variant_id.clone(),
            });
        }
    }

    mutations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gift_line(key: &str, variant: &str, qty: u32) -> GiftLine {
        GiftLine {
            key: key.to_string(),
            variant_id: variant.to_string(),
            quantity: qty,
        }
    }

    #[test]
    fn test_later_campaign_overwrites_quantity() {
        let mut desired = DesiredGiftSet::new();
        desired.insert("V2", 1, "c1");
        desired.insert("V3", 1, "c1");
        desired.insert("V2", 3, "c2");

        assert_eq!(desired.len(), 2);
        assert_eq!(desired.get("V2"), Some(3));
        assert_eq!(desired.iter().next().unwrap().campaign_id, "c2");
    }

    #[test]
    fn test_plan_add_change_remove() {
        let mut desired = DesiredGiftSet::new();
        desired.insert("V2", 1, "c1");
        desired.insert("V3", 2, "c1");

        let existing = vec![gift_line("k3", "V3", 1), gift_line("k9", "V9", 1)];
        let plan = plan_mutations(&desired, &existing);

        assert_eq!(
            plan,
            vec![
                GiftMutation::Add {
                    variant_id: "V2".to_string(),
                    quantity: 1
                },
                GiftMutation::Change {
                    line_key: "k3".to_string(),
                    variant_id: "V3".to_string(),
                    quantity: 2
                },
                GiftMutation::Remove {
                    line_key: "k9".to_string(),
                    variant_id: "V9".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_plan_converged_is_empty() {
        let mut desired = DesiredGiftSet::new();
        desired.insert("V2", 1, "c1");
        assert!(plan_mutations(&desired, &[gift_line("k2", "V2", 1)]).is_empty());
    }

    #[test]
    fn test_duplicate_gift_lines_compare_first() {
        let mut desired = DesiredGiftSet::new();
        desired.insert("V2", 1, "c1");
        let existing = vec![gift_line("a", "V2", 1), gift_line("b", "V2", 4)];
        assert!(plan_mutations(&desired, &existing).is_empty());

        let plan = plan_mutations(&DesiredGiftSet::new(), &existing);
        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|m| m.kind() == "remove"));
    }
}
