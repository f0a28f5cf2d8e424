//! 对账引擎的输入输出结构

use serde::Serialize;
use uuid::Uuid;

use super::planner::GiftMutation;
use crate::error::SyncError;

/// 触发对账的来源
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PassTrigger {
    /// 加购信号，立即触发
    Add,
    /// 改量/清空信号，去抖后触发
    Mutate,
    /// 启动或运维手动触发
    Manual,
}

impl PassTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Mutate => "mutate",
            Self::Manual => "manual",
        }
    }
}

/// 单轮对账的结果
#[derive(Debug)]
pub enum PassOutcome {
    /// 已有一轮在执行，本次触发被丢弃
    Skipped,
    /// 配置或购物车读取失败，未动任何赠品行
    Aborted(SyncError),
    /// 没有生效中的买赠活动，未动任何赠品行
    NoActiveCampaigns,
    /// 正常完成
    Completed(PassReport),
}

impl PassOutcome {
    /// 指标标签
    pub fn label(&self) -> &'static str {
        match self {
            Self::Skipped => "skipped",
            Self::Aborted(_) => "aborted",
            Self::NoActiveCampaigns => "no_active_campaigns",
            Self::Completed(_) => "completed",
        }
    }

    pub fn report(&self) -> Option<&PassReport> {
        match self {
            Self::Completed(report) => Some(report),
            _ => None,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }
}

/// 完成一轮对账后的统计
#[derive(Debug)]
pub struct PassReport {
    pub pass_id: Uuid,
    pub trigger: PassTrigger,
    /// 参与评估的买赠活动数
    pub campaigns_evaluated: usize,
    /// 满足条件的买赠活动数
    pub campaigns_qualified: usize,
    /// 本轮下发的全部变更
    pub mutations: Vec<GiftMutation>,
    /// 失败的变更，下一轮会重新计算
    pub failures: Vec<SyncError>,
    pub elapsed_ms: u64,
}

impl PassReport {
    pub fn succeeded(&self) -> usize {
        self.mutations.len().saturating_sub(self.failures.len())
    }

    /// 本轮是否无需任何变更
    pub fn is_noop(&self) -> bool {
        self.mutations.is_empty()
    }
}
