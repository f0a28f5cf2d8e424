//! 领域模型定义
//!
//! - `campaign`: 活动配置（买赠活动、阶梯进度活动）
//! - `cart`: 购物车快照、赠品行与赠品标记
//! - `ids`: 平台 ID 归一化与宽松的数值反序列化

mod campaign;
mod cart;
mod ids;

pub use campaign::*;
pub use cart::*;
pub use ids::normalize_id;
