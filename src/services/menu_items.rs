use uuid::Uuid;

use crate::{
    db::MessStore,
    error::{AppError, AppResult},
    models::menu_item::{
        CreateMenuItemRequest, ItemRemoval, MenuItem, MenuItemFilter, UpdateMenuItemRequest,
    },
};

fn clean_name(name: &str) -> AppResult<String> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::validation("Item name is required"));
    }
    Ok(name.to_string())
}

fn clean_allergens(allergens: &[String]) -> Vec<String> {
    allergens
        .iter()
        .map(|a| a.trim().to_lowercase())
        .filter(|a| !a.is_empty())
        .collect()
}

fn check_calories(calories: Option<i32>) -> AppResult<()> {
    match calories {
        Some(c) if c < 0 => Err(AppError::validation("Calories cannot be negative")),
        _ => Ok(()),
    }
}

pub struct MenuItemService;

impl MenuItemService {
    pub async fn create(store: &dyn MessStore, req: &CreateMenuItemRequest) -> AppResult<MenuItem> {
        check_calories(req.calories)?;
        let req = CreateMenuItemRequest {
            name: clean_name(&req.name)?,
            description: req.description.as_deref().map(str::trim).map(String::from),
            allergens: clean_allergens(&req.allergens),
            ..req.clone()
        };
        let item = store.insert_menu_item(&req).await?;
        tracing::info!(item_id = %item.id, category = %item.category, "Menu item created");
        Ok(item)
    }

    pub async fn list(store: &dyn MessStore, filter: &MenuItemFilter) -> AppResult<Vec<MenuItem>> {
        Ok(store.list_menu_items(filter).await?)
    }

    pub async fn get(store: &dyn MessStore, id: Uuid) -> AppResult<MenuItem> {
        store
            .find_menu_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Item not found"))
    }

    pub async fn update(
        store: &dyn MessStore,
        id: Uuid,
        req: &UpdateMenuItemRequest,
    ) -> AppResult<MenuItem> {
        check_calories(req.calories)?;
        let changes = UpdateMenuItemRequest {
            name: req.name.as_deref().map(clean_name).transpose()?,
            allergens: req.allergens.as_deref().map(clean_allergens),
            ..req.clone()
        };
        store
            .update_menu_item(id, &changes)
            .await?
            .ok_or_else(|| AppError::not_found("Item not found"))
    }

    /// Items already used by a menu or selection are only deactivated.
    pub async fn remove(store: &dyn MessStore, id: Uuid) -> AppResult<ItemRemoval> {
        let removal = store
            .remove_menu_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Item not found"))?;
        tracing::info!(item_id = %id, ?removal, "Menu item removed");
        Ok(removal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::menu_item::ItemCategory;

    fn request(name: &str, category: ItemCategory) -> CreateMenuItemRequest {
        CreateMenuItemRequest {
            name: name.into(),
            description: None,
            category,
            is_vegetarian: true,
            is_vegan: false,
            allergens: vec![" Gluten ".into(), "".into()],
            calories: Some(250),
        }
    }

    #[tokio::test]
    async fn create_trims_and_normalises() {
        let store = MemoryStore::new();
        let item = MenuItemService::create(&store, &request("  Poha ", ItemCategory::Main))
            .await
            .unwrap();
        assert_eq!(item.name, "Poha");
        assert_eq!(item.allergens, vec!["gluten".to_string()]);
        assert!(item.is_active);
    }

    #[tokio::test]
    async fn blank_name_and_negative_calories_are_rejected() {
        let store = MemoryStore::new();
        let err = MenuItemService::create(&store, &request("   ", ItemCategory::Side))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));

        let mut req = request("Tea", ItemCategory::Beverage);
        req.calories = Some(-1);
        let err = MenuItemService::create(&store, &req).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn list_filters_and_sorts_by_category_then_name() {
        let store = MemoryStore::new();
        for (name, cat) in [
            ("Kheer", ItemCategory::Dessert),
            ("Rice", ItemCategory::Main),
            ("Dal", ItemCategory::Main),
            ("Lassi", ItemCategory::Beverage),
        ] {
            MenuItemService::create(&store, &request(name, cat)).await.unwrap();
        }
        let names: Vec<String> = MenuItemService::list(&store, &MenuItemFilter::default())
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.name)
            .collect();
        assert_eq!(names, vec!["Dal", "Rice", "Lassi", "Kheer"]);

        let mains = MenuItemService::list(
            &store,
            &MenuItemFilter {
                category: Some(ItemCategory::Main),
                is_active: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(mains.len(), 2);
    }

    #[tokio::test]
    async fn update_missing_item_is_not_found() {
        let store = MemoryStore::new();
        let err = MenuItemService::update(&store, Uuid::new_v4(), &UpdateMenuItemRequest::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn unreferenced_item_is_deleted_outright() {
        let store = MemoryStore::new();
        let item = MenuItemService::create(&store, &request("Upma", ItemCategory::Main))
            .await
            .unwrap();
        let removal = MenuItemService::remove(&store, item.id).await.unwrap();
        assert_eq!(removal, ItemRemoval::Deleted);
        assert!(matches!(
            MenuItemService::get(&store, item.id).await,
            Err(AppError::NotFound(_))
        ));
    }
}
