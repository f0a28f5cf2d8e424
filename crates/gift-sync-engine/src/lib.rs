//! 赠品同步引擎
//!
//! 让店铺购物车中由引擎管理的赠品行（买 X 送 Y）与阶梯进度展示，
//! 始终跟随购物车的实时内容。购物车可能被页面上任意代码修改，
//! 引擎只能观察这些变更并在事后对账。
//!
//! - `observer`: 识别加购与改量信号，改量去抖
//! - `engine`: 单轮对账（互斥、资格判定、期望赠品计算、变更下发）
//! - `collection`: 商品集合成员解析（分页 + 可选 TTL 缓存）
//! - `config_cache`: 两级活动配置缓存（Redis + PostgreSQL）
//! - `progress`: 阶梯进度计算与渲染
//! - `platform`: 店铺前台购物车与集合 API 客户端
//! - `ingress`: 供页面注入脚本上报调用的 HTTP 入口

pub mod broadcast;
pub mod collection;
pub mod config_cache;
pub mod engine;
pub mod error;
pub mod ingress;
pub mod models;
pub mod observer;
pub mod platform;
pub mod progress;
pub mod test_utils;

pub use broadcast::{CartChanged, CartChangedBus};
pub use collection::{CollectionMembershipResolver, ResolverConfig};
pub use config_cache::ConfigCache;
pub use engine::{PassOutcome, PassReport, PassTrigger, RuleEvaluationEngine};
pub use error::{Result, SyncError};
pub use observer::{CartObserver, DebounceConfig, EngineTrigger, ReconcileTrigger};
pub use progress::{LatestProgress, ProgressProjector, ProgressRenderer};
