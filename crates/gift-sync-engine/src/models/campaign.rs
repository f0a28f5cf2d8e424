//! 活动配置模型
//!
//! 店铺配置由后台写入持久化存储，这里只负责读取与解析。
//! JSON 字段使用 camelCase，与后台写入格式一致。

use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};

use super::ids::{de_id, de_number, de_opt_id, de_quantity, normalize_id};

/// 店铺活动配置
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShopConfig {
    #[serde(default)]
    pub campaigns: Vec<Campaign>,
}

impl ShopConfig {
    /// 空配置（无任何活动）
    pub fn empty() -> Self {
        Self::default()
    }

    /// 按配置列表顺序返回所有生效中的买赠活动
    ///
    /// 注意这里不按 priority 排序，保持与后台列表一致的评估顺序
    pub fn active_bxgy(&self) -> impl Iterator<Item = (&Campaign, &[BxgyGoal])> {
        self.campaigns.iter().filter_map(|campaign| {
            if !campaign.is_active() {
                return None;
            }
            match &campaign.rules {
                CampaignRules::Bxgy { goals } => Some((campaign, goals.as_slice())),
                _ => None,
            }
        })
    }

    pub fn has_active_bxgy(&self) -> bool {
        self.active_bxgy().next().is_some()
    }
}

/// 活动
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Campaign {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub status: CampaignStatus,
    /// 数值越小优先级越高
    #[serde(default)]
    pub priority: i64,
    #[serde(flatten)]
    pub rules: CampaignRules,
}

impl Campaign {
    pub fn is_active(&self) -> bool {
        self.status == CampaignStatus::Active
    }
}

/// 活动状态
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CampaignStatus {
    /// 草稿 - 不参与评估
    #[default]
    Draft,
    /// 生效中
    Active,
    /// 未识别的状态，按非生效处理
    #[serde(other)]
    Unknown,
}

/// 活动规则，按 kind 区分
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CampaignRules {
    /// 买 X 送 Y
    Bxgy {
        #[serde(default)]
        goals: Vec<BxgyGoal>,
    },
    /// 阶梯进度展示
    #[serde(alias = "progress")]
    ProgressTiers {
        #[serde(default, rename = "trackType")]
        track_type: TrackType,
        #[serde(default)]
        goals: Vec<ProgressGoal>,
    },
    /// 未识别的活动类型，整体忽略
    #[serde(other)]
    Unknown,
}

/// 进度活动的计量方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackType {
    /// 购物车金额（主币种单位）
    #[default]
    CartValue,
    /// 商品总件数
    Quantity,
}

/// 买赠活动的资格判定方式
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualifyMode {
    /// 指定商品的件数
    #[default]
    Product,
    /// 指定集合内商品的件数
    Collection,
    /// 指定集合内商品的金额
    SpendAnyCollection,
    /// 全店任意商品的件数
    All,
}

/// 买赠目标
///
/// 一个买赠活动只评估第一个目标，后续目标不生效
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BxgyGoal {
    #[serde(default, deserialize_with = "de_quantity")]
    pub buy_qty: u32,
    #[serde(default, deserialize_with = "de_quantity")]
    pub get_qty: u32,
    #[serde(default)]
    pub mode: QualifyMode,
    #[serde(default)]
    pub buy_products: Vec<ProductRef>,
    #[serde(default)]
    pub buy_collections: Vec<CollectionRef>,
    #[serde(default)]
    pub get_products: Vec<ProductRef>,
    /// 消费门槛（主币种单位），仅 spend_any_collection 使用
    #[serde(default, deserialize_with = "de_opt_decimal")]
    pub spend_amount: Option<Decimal>,
}

/// 进度阶梯目标
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressGoal {
    #[serde(default, deserialize_with = "de_number")]
    pub target: f64,
    #[serde(default)]
    pub reward_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// 商品引用
///
/// 配置里既可能写 `"123"`，也可能写 `{"id": "gid://...", "variantId": "..."}`
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductRef {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant_id: Option<String>,
}

impl ProductRef {
    pub fn new(id: impl AsRef<str>) -> Self {
        Self {
            id: normalize_id(id.as_ref()),
            variant_id: None,
        }
    }

    pub fn with_variant(id: impl AsRef<str>, variant_id: impl AsRef<str>) -> Self {
        Self {
            id: normalize_id(id.as_ref()),
            variant_id: Some(normalize_id(variant_id.as_ref())),
        }
    }

    /// 作为赠品时实际加购的规格 ID
    pub fn gift_variant_id(&self) -> &str {
        self.variant_id.as_deref().unwrap_or(&self.id)
    }

    /// 作为购买条件时是否命中某一购物车行
    pub fn matches_line(&self, product_id: &str, variant_id: &str) -> bool {
        self.id == product_id
            || self.id == variant_id
            || self.variant_id.as_deref() == Some(variant_id)
    }
}

impl<'de> Deserialize<'de> for ProductRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Object {
            #[serde(deserialize_with = "de_id")]
            id: String,
            #[serde(default, deserialize_with = "de_opt_id")]
            variant_id: Option<String>,
        }

        #[derive(Deserialize)]
        struct Bare(#[serde(deserialize_with = "de_id")] String);

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Object(Object),
            Bare(Bare),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Object(o) => ProductRef {
                id: o.id,
                variant_id: o.variant_id,
            },
            Raw::Bare(Bare(id)) => ProductRef {
                id,
                variant_id: None,
            },
        })
    }
}

/// 商品集合引用（按 handle 解析成员）
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct CollectionRef {
    pub handle: String,
}

impl CollectionRef {
    pub fn new(handle: impl Into<String>) -> Self {
        Self {
            handle: handle.into(),
        }
    }
}

impl<'de> Deserialize<'de> for CollectionRef {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Handle(String),
            Object { handle: String },
        }

        let handle = match Raw::deserialize(deserializer)? {
            Raw::Handle(h) | Raw::Object { handle: h } => h.trim().to_string(),
        };
        Ok(CollectionRef { handle })
    }
}

/// 可选金额：接受数字或字符串，null/空字符串/无法解析视为未配置
fn de_opt_decimal<'de, D>(deserializer: D) -> Result<Option<Decimal>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::String(s)) => s.trim().parse::<Decimal>().ok(),
        Some(serde_json::Value::Number(n)) => n.to_string().parse::<Decimal>().ok(),
        _ => None,
    })
}
