//! 赠品对账引擎
//!
//! 买赠资格判定、期望赠品计算、变更下发与互斥控制。

pub mod dto;
mod evaluator;
mod guard;
mod planner;
mod qualification;

pub use dto::{PassOutcome, PassReport, PassTrigger};
pub use evaluator::RuleEvaluationEngine;
pub use guard::{InFlightFlag, InFlightGuard};
pub use planner::{DesiredGift, DesiredGiftSet, GiftMutation, plan_mutations};
pub use qualification::QualificationContext;
