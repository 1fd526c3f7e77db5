use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Promotion {
    pub id: String,
    pub title: String,
    pub discount_percent: f64,
    pub target_type: PromotionTarget,
    /// Non-null only for code-based (global) promotions.
    pub promo_code: Option<String>,
    pub room_id: Option<String>,
    pub branch_id: Option<String>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub per_user_limit: i64,
    pub is_active: bool,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PromotionTarget {
    Global,
    Branch,
    Room,
}

impl PromotionTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            PromotionTarget::Global => "global",
            PromotionTarget::Branch => "branch",
            PromotionTarget::Room => "room",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "branch" => PromotionTarget::Branch,
            "room" => PromotionTarget::Room,
            _ => PromotionTarget::Global,
        }
    }
}
