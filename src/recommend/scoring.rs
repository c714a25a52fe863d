// Heuristic add-on scoring.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::db::{
    lenient_enum, null_as_default, Category, ItemSnapshot, MealTime, MenuItem, ScoredItem, UserSegment,
    MAX_RECOMMENDATIONS,
};

/// Where and when the cart is being assembled. Meal times and segments
/// outside the known set read as unset and earn no bonus.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default, deserialize_with = "lenient_enum")]
    pub meal_time: Option<MealTime>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub cuisine: String,
    #[serde(default, deserialize_with = "lenient_enum")]
    pub user_segment: Option<UserSegment>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub city: String,
}

/// What the scorer needs to know about the current cart.
struct CartShape {
    ids: HashSet<String>,
    categories: HashSet<Category>,
    len: usize,
}

impl CartShape {
    fn new(cart: &[ItemSnapshot]) -> Self {
        Self {
            ids: cart.iter().map(|i| i.id.clone()).collect(),
            categories: cart.iter().map(|i| i.category).collect(),
            len: cart.len(),
        }
    }

    fn has(&self, category: Category) -> bool {
        self.categories.contains(&category)
    }
}

/// Category-complement base score. First matching rule wins.
pub fn category_score(candidate: Category, cart: &[ItemSnapshot]) -> f64 {
    category_score_for(candidate, &CartShape::new(cart))
}

fn category_score_for(candidate: Category, cart: &CartShape) -> f64 {
    match candidate {
        Category::Beverage if cart.has(Category::Main) => 0.8,
        Category::Side if cart.has(Category::Main) => 0.7,
        Category::Dessert => 0.6,
        Category::Condiment if cart.has(Category::Main) || cart.has(Category::Side) => 0.7,
        Category::Appetizer if cart.len < 2 => 0.5,
        _ => 0.3,
    }
}

fn cuisine_score(item: &MenuItem, context: &Context) -> f64 {
    if item.cuisine == context.cuisine {
        0.2
    } else if matches!(item.category, Category::Condiment | Category::Beverage | Category::Side) {
        0.1
    } else {
        0.0
    }
}

fn segment_score(item: &MenuItem, context: &Context) -> f64 {
    match context.user_segment {
        Some(UserSegment::Budget) if item.price <= 200.0 => 0.2,
        Some(UserSegment::Premium) if item.price > 250.0 => 0.2,
        Some(UserSegment::Frequent) => 0.1,
        _ => 0.0,
    }
}

fn popularity_score(item: &MenuItem) -> f64 {
    item.popularity_score / 100.0 * 0.15
}

fn meal_time_score(item: &MenuItem, context: &Context) -> f64 {
    use Category::*;

    let mut score = 0.0;
    let meal = context.meal_time;
    if meal == Some(MealTime::Breakfast) && matches!(item.category, Side | Beverage | Condiment) {
        score += 0.1;
    }
    if meal == Some(MealTime::Lunch) && matches!(item.category, Main | Side | Beverage) {
        score += 0.1;
    }
    if meal == Some(MealTime::Dinner) && matches!(item.category, Main | Side | Dessert) {
        score += 0.1;
    }
    if meal == Some(MealTime::LateNight) && item.price <= 300.0 {
        score += 0.1;
    }
    score
}

fn score_with_shape(item: &MenuItem, cart: &CartShape, context: &Context) -> f64 {
    let score = category_score_for(item.category, cart)
        + cuisine_score(item, context)
        + segment_score(item, context)
        + popularity_score(item)
        + meal_time_score(item, context);
    score.clamp(0.0, 1.0)
}

/// Score a single candidate against a cart. Always within `[0, 1]`.
pub fn score_item(item: &MenuItem, cart: &[ItemSnapshot], context: &Context) -> f64 {
    score_with_shape(item, &CartShape::new(cart), context)
}

/// Rank the catalog items that are not already in the cart and return the
/// best `MAX_RECOMMENDATIONS`. Ties keep catalog order.
pub fn generate_recommendations(
    catalog: &[MenuItem],
    cart: &[ItemSnapshot],
    context: &Context,
) -> Vec<ScoredItem> {
    let shape = CartShape::new(cart);

    let mut scored: Vec<ScoredItem> = catalog
        .iter()
        .filter(|item| !shape.ids.contains(&item.id))
        .map(|item| ScoredItem {
            item: item.clone(),
            score: score_with_shape(item, &shape, context),
        })
        .collect();

    // sort_by is stable
    scored.sort_by(|a, b| b.score.total_cmp(&a.score));
    scored.truncate(MAX_RECOMMENDATIONS);
    scored
}
