use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Highest number of recommendations a single log entry may carry.
pub const MAX_RECOMMENDATIONS: usize = 6;

/// Field deserializer that reads an explicit `null` as the default value.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Field deserializer for context enums. A known name gives `Some`; unknown
/// names, `null` and non-string values give `None`.
pub fn lenient_enum<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
{
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(|s| s.parse().ok()))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Main,
    Side,
    Beverage,
    Dessert,
    Appetizer,
    Condiment,
    #[default]
    #[serde(other)]
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Main => "main",
            Category::Side => "side",
            Category::Beverage => "beverage",
            Category::Dessert => "dessert",
            Category::Appetizer => "appetizer",
            Category::Condiment => "condiment",
            Category::Other => "other",
        }
    }

    /// Lenient parse used for stored rows; anything unknown is `Other`.
    pub fn from_db(s: &str) -> Self {
        match s {
            "main" => Category::Main,
            "side" => Category::Side,
            "beverage" => Category::Beverage,
            "dessert" => Category::Dessert,
            "appetizer" => Category::Appetizer,
            "condiment" => Category::Condiment,
            _ => Category::Other,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MealTime {
    Breakfast,
    Lunch,
    Dinner,
    LateNight,
}

impl MealTime {
    pub fn as_str(&self) -> &'static str {
        match self {
            MealTime::Breakfast => "breakfast",
            MealTime::Lunch => "lunch",
            MealTime::Dinner => "dinner",
            MealTime::LateNight => "late_night",
        }
    }
}

impl FromStr for MealTime {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "breakfast" => Ok(MealTime::Breakfast),
            "lunch" => Ok(MealTime::Lunch),
            "dinner" => Ok(MealTime::Dinner),
            "late_night" => Ok(MealTime::LateNight),
            _ => Err(format!("unknown meal time: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserSegment {
    Budget,
    Premium,
    Frequent,
    Occasional,
    NewUser,
}

impl UserSegment {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserSegment::Budget => "budget",
            UserSegment::Premium => "premium",
            UserSegment::Frequent => "frequent",
            UserSegment::Occasional => "occasional",
            UserSegment::NewUser => "new_user",
        }
    }
}

impl FromStr for UserSegment {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "budget" => Ok(UserSegment::Budget),
            "premium" => Ok(UserSegment::Premium),
            "frequent" => Ok(UserSegment::Frequent),
            "occasional" => Ok(UserSegment::Occasional),
            "new_user" => Ok(UserSegment::NewUser),
            _ => Err(format!("unknown user segment: {}", s)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MenuItem {
    pub id: String,
    pub name: String,
    pub category: Category,
    pub cuisine: String,
    pub price: f64,
    pub is_veg: bool,
    pub popularity_score: f64,
    pub created_date: DateTime<Utc>,
}

fn default_popularity() -> f64 {
    50.0
}

/// Body of a catalog-create call. Absent fields fall back to defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMenuItem {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub is_veg: bool,
    #[serde(default = "default_popularity")]
    pub popularity_score: f64,
}

fn check_price(price: f64) -> Result<(), String> {
    if !price.is_finite() || price < 0.0 {
        return Err(format!("price must be >= 0, got {}", price));
    }
    Ok(())
}

fn check_popularity(score: f64) -> Result<(), String> {
    if !(0.0..=100.0).contains(&score) {
        return Err(format!("popularity_score must be within 0..=100, got {}", score));
    }
    Ok(())
}

impl NewMenuItem {
    pub fn new(name: &str, category: Category, cuisine: &str, price: f64, is_veg: bool, popularity_score: f64) -> Self {
        Self {
            name: name.to_string(),
            category,
            cuisine: cuisine.to_string(),
            price,
            is_veg,
            popularity_score,
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        check_price(self.price)?;
        check_popularity(self.popularity_score)
    }

    pub fn into_item(self, id: String, created_date: DateTime<Utc>) -> MenuItem {
        MenuItem {
            id,
            name: self.name,
            category: self.category,
            cuisine: self.cuisine,
            price: self.price,
            is_veg: self.is_veg,
            popularity_score: self.popularity_score,
            created_date,
        }
    }
}

/// Partial update. Only fields that are present overwrite the stored item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MenuItemPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_veg: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_score: Option<f64>,
}

impl MenuItemPatch {
    pub fn validate(&self) -> Result<(), String> {
        if let Some(price) = self.price {
            check_price(price)?;
        }
        if let Some(score) = self.popularity_score {
            check_popularity(score)?;
        }
        Ok(())
    }

    pub fn apply(&self, item: &mut MenuItem) {
        if let Some(ref name) = self.name {
            item.name = name.clone();
        }
        if let Some(category) = self.category {
            item.category = category;
        }
        if let Some(ref cuisine) = self.cuisine {
            item.cuisine = cuisine.clone();
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(is_veg) = self.is_veg {
            item.is_veg = is_veg;
        }
        if let Some(popularity_score) = self.popularity_score {
            item.popularity_score = popularity_score;
        }
    }
}

/// Copy of an item as it sits in a cart or a log entry.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ItemSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category: Category,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cuisine: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub price: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_veg: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
}

impl From<&MenuItem> for ItemSnapshot {
    fn from(item: &MenuItem) -> Self {
        Self {
            id: item.id.clone(),
            name: item.name.clone(),
            category: item.category,
            cuisine: item.cuisine.clone(),
            price: item.price,
            is_veg: item.is_veg,
            popularity_score: Some(item.popularity_score),
            score: None,
        }
    }
}

impl From<&ScoredItem> for ItemSnapshot {
    fn from(scored: &ScoredItem) -> Self {
        Self {
            score: Some(scored.score),
            ..ItemSnapshot::from(&scored.item)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    #[serde(flatten)]
    pub item: MenuItem,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecommendationLog {
    pub id: String,
    pub session_id: String,
    pub meal_time: Option<MealTime>,
    pub user_segment: Option<UserSegment>,
    pub city: String,
    pub cart_items: Vec<ItemSnapshot>,
    pub recommended_items: Vec<ItemSnapshot>,
    pub accepted_items: Vec<ItemSnapshot>,
    pub aov_before: f64,
    pub aov_after: f64,
    pub latency_ms: u64,
    pub created_date: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewRecommendationLog {
    #[serde(default, deserialize_with = "null_as_default")]
    pub session_id: String,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub meal_time: Option<MealTime>,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub user_segment: Option<UserSegment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cart_items: Vec<ItemSnapshot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub recommended_items: Vec<ItemSnapshot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub accepted_items: Vec<ItemSnapshot>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aov_before: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aov_after: f64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub latency_ms: u64,
}

impl NewRecommendationLog {
    /// At most `MAX_RECOMMENDATIONS` suggestions, none of them already in the cart.
    pub fn validate(&self) -> Result<(), String> {
        if self.recommended_items.len() > MAX_RECOMMENDATIONS {
            return Err(format!(
                "at most {} recommended items per log, got {}",
                MAX_RECOMMENDATIONS,
                self.recommended_items.len()
            ));
        }

        let cart_ids: HashSet<&str> = self
            .cart_items
            .iter()
            .map(|i| i.id.as_str())
            .filter(|id| !id.is_empty())
            .collect();
        if let Some(dup) = self.recommended_items.iter().find(|r| cart_ids.contains(r.id.as_str())) {
            return Err(format!("recommended item {} is already in the cart", dup.id));
        }
        Ok(())
    }

    pub fn into_log(self, id: String, created_date: DateTime<Utc>) -> RecommendationLog {
        RecommendationLog {
            id,
            session_id: self.session_id,
            meal_time: self.meal_time,
            user_segment: self.user_segment,
            city: self.city,
            cart_items: self.cart_items,
            recommended_items: self.recommended_items,
            accepted_items: self.accepted_items,
            aov_before: self.aov_before,
            aov_after: self.aov_after,
            latency_ms: self.latency_ms,
            created_date,
        }
    }
}

/// Paging window for list calls. `None` means unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub skip: Option<usize>,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl Page {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn apply<T>(&self, items: Vec<T>) -> Vec<T> {
        let skip = self.skip.unwrap_or(0);
        let limit = self.limit.unwrap_or(usize::MAX);
        items.into_iter().skip(skip).take(limit).collect()
    }
}

/// Restricts log listings and stats to one meal time and/or one segment.
/// An unset field matches every log.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meal_time: Option<MealTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_segment: Option<UserSegment>,
}

impl LogFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn matches(&self, log: &RecommendationLog) -> bool {
        self.meal_time.map_or(true, |m| log.meal_time == Some(m))
            && self.user_segment.map_or(true, |s| log.user_segment == Some(s))
    }
}

/// Total price of a cart.
pub fn cart_value(items: &[ItemSnapshot]) -> f64 {
    items.iter().map(|i| i.price).sum()
}

pub fn new_item_id() -> String {
    format!("item_{}", uuid::Uuid::new_v4())
}

pub fn new_log_id() -> String {
    format!("log_{}", uuid::Uuid::new_v4())
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Snapshot encoding error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Not found: {0}")]
    NotFound(String),
}

pub type DbResult<T> = Result<T, DbError>;
