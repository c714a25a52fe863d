use tracing::info;

use super::model::*;
use super::repo::MenuItemRepo;

/// (name, category, cuisine, price, is_veg, popularity_score)
const SAMPLE_ITEMS: &[(&str, Category, &str, f64, bool, f64)] = &[
    ("Chicken Biryani", Category::Main, "indian", 280.0, false, 95.0),
    ("Paneer Butter Masala", Category::Main, "indian", 220.0, true, 90.0),
    ("Butter Naan", Category::Side, "indian", 45.0, true, 88.0),
    ("Mirchi Ka Salan", Category::Condiment, "indian", 80.0, true, 72.0),
    ("Raita", Category::Condiment, "indian", 50.0, true, 75.0),
    ("Gulab Jamun", Category::Dessert, "indian", 90.0, true, 82.0),
    ("Masala Chai", Category::Beverage, "indian", 40.0, true, 70.0),
    ("Mango Lassi", Category::Beverage, "indian", 60.0, true, 78.0),
    ("Hakka Noodles", Category::Main, "chinese", 180.0, true, 85.0),
    ("Chicken Manchurian", Category::Main, "chinese", 220.0, false, 83.0),
    ("Spring Rolls", Category::Appetizer, "chinese", 120.0, true, 76.0),
    ("Fried Rice", Category::Main, "chinese", 160.0, true, 88.0),
    ("Hot & Sour Soup", Category::Appetizer, "chinese", 100.0, false, 71.0),
    ("Cola", Category::Beverage, "american", 45.0, true, 65.0),
    ("Margherita Pizza", Category::Main, "italian", 250.0, true, 92.0),
    ("Garlic Bread", Category::Side, "italian", 110.0, true, 80.0),
];

pub fn sample_items() -> Vec<NewMenuItem> {
    SAMPLE_ITEMS
        .iter()
        .map(|&(name, category, cuisine, price, is_veg, popularity)| {
            NewMenuItem::new(name, category, cuisine, price, is_veg, popularity)
        })
        .collect()
}

/// Insert the sample catalog when the store holds no menu items yet.
/// Returns the number of items inserted.
pub async fn seed_if_empty<R: MenuItemRepo + ?Sized>(repo: &R) -> DbResult<usize> {
    let existing = repo.count_menu_items().await?;
    if existing > 0 {
        info!("Catalog already has {} items, skipping seed", existing);
        return Ok(0);
    }

    let items = sample_items();
    let count = items.len();
    for item in items {
        repo.create_menu_item(item).await?;
    }

    info!("Seeded catalog with {} menu items", count);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryRepository;

    #[tokio::test]
    async fn test_seed_only_once() {
        let repo = MemoryRepository::new();
        assert_eq!(seed_if_empty(&repo).await.unwrap(), 16);
        assert_eq!(seed_if_empty(&repo).await.unwrap(), 0);
        assert_eq!(repo.count_menu_items().await.unwrap(), 16);

        let all = repo.all_menu_items().await.unwrap();
        assert_eq!(all[0].name, "Chicken Biryani");
        assert_eq!(all[15].name, "Garlic Bread");
    }
}
