//! 商品集合成员解析
//!
//! - `resolver`: 分页拉取集合内的全部商品 ID
//! - `cache`: 可注入的集合缓存，默认不缓存（新鲜度优先于调用量）

mod cache;
mod resolver;

pub use cache::{CollectionCache, NoCollectionCache, TtlCollectionCache};
pub use resolver::{CollectionMembershipResolver, ProductIdSet, ResolverConfig};
