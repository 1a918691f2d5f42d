use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::RecError;

/// Recommendation target, one trained model each.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Restaurants,
    Dishes,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Restaurants, Target::Dishes];

    pub fn name(&self) -> &'static str {
        match self {
            Target::Restaurants => "restaurants",
            Target::Dishes => "dishes",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Target {
    type Err = RecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "restaurants" => Ok(Target::Restaurants),
            "dishes" => Ok(Target::Dishes),
            other => Err(RecError::InvalidParam(format!("unknown target `{other}`"))),
        }
    }
}

/// Restaurants are keyed by integers, dishes by hashed strings.
/// Derived ordering puts every `Int` before every `Str`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ItemId {
    Int(i64),
    Str(String),
}

impl ItemId {
    pub fn parse(raw: &str) -> Self {
        match raw.parse::<i64>() {
            Ok(i) if i.to_string() == raw => ItemId::Int(i),
            _ => ItemId::Str(raw.to_string()),
        }
    }
}

impl fmt::Display for ItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ItemId::Int(i) => write!(f, "{i}"),
            ItemId::Str(s) => f.write_str(s),
        }
    }
}

impl From<i64> for ItemId {
    fn from(i: i64) -> Self {
        ItemId::Int(i)
    }
}

impl From<&str> for ItemId {
    fn from(s: &str) -> Self {
        ItemId::Str(s.to_string())
    }
}

impl From<String> for ItemId {
    fn from(s: String) -> Self {
        ItemId::Str(s)
    }
}

/// One aggregated (user, item, weight) row of a training partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interaction {
    pub user_id: String,
    pub item_id: ItemId,
    pub weight: f32,
}

impl Interaction {
    pub fn new(user_id: impl Into<String>, item_id: impl Into<ItemId>, weight: f32) -> Self {
        Self {
            user_id: user_id.into(),
            item_id: item_id.into(),
            weight,
        }
    }
}

/// Ground-truth pair from a user's held-out order.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct HeldOut {
    pub user_id: String,
    pub item_id: ItemId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PopularItem {
    pub id: ItemId,
    pub title: String,
    pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Personalized,
    Popular,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationItem {
    pub id: String,
    pub title: String,
    pub score: f32,
}

impl From<PopularItem> for RecommendationItem {
    fn from(p: PopularItem) -> Self {
        Self {
            id: p.id.to_string(),
            title: p.title,
            score: p.score,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub mode: Mode,
    pub user_id: Option<String>,
    pub items: Vec<RecommendationItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvalMetrics {
    pub users_in_train: usize,
    pub items_in_train: usize,
    pub recall: f64,
    pub ndcg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainReport {
    pub target: Target,
    pub metrics: EvalMetrics,
    pub artifact_location: String,
}
