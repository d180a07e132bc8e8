use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use super::store::{ClosedMenu, MenuDeletion, MessStore, NewMenu, StoreError, StoreResult};
use crate::models::{
    menu::{MealType, Menu, MenuFilter, MenuStatus},
    menu_item::{CreateMenuItemRequest, ItemRemoval, MenuItem, MenuItemFilter, UpdateMenuItemRequest},
    selection::{Selection, SelectionWrite, UpsertOutcome},
    user::Student,
};

#[derive(Default)]
struct Tables {
    items: Vec<MenuItem>,
    menus: Vec<Menu>,
    /// Insertion order doubles as the tie-break for equal timestamps.
    selections: Vec<Selection>,
    students: Vec<Student>,
}

/// In-process store with the same constraints as the Postgres schema.
/// A single mutex makes every trait call atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// The student directory is owned elsewhere; this seeds it.
    pub fn add_student(&self, student: Student) {
        self.tables().students.push(student);
    }

    fn tables(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn newest_first(mut rows: Vec<Selection>) -> Vec<Selection> {
    rows.reverse();
    rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    rows
}

#[async_trait]
impl MessStore for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn insert_menu_item(&self, req: &CreateMenuItemRequest) -> StoreResult<MenuItem> {
        let now = Utc::now();
        let item = MenuItem {
            id: Uuid::new_v4(),
            name: req.name.clone(),
            description: req.description.clone(),
            category: req.category,
            is_vegetarian: req.is_vegetarian,
            is_vegan: req.is_vegan,
            allergens: req.allergens.clone(),
            calories: req.calories,
            is_active: true,
            created_at: now,
            updated_at: now,
        };
        self.tables().items.push(item.clone());
        Ok(item)
    }

    async fn find_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>> {
        Ok(self.tables().items.iter().find(|i| i.id == id).cloned())
    }

    async fn list_menu_items(&self, filter: &MenuItemFilter) -> StoreResult<Vec<MenuItem>> {
        let mut items: Vec<MenuItem> = self
            .tables()
            .items
            .iter()
            .filter(|i| filter.matches(i))
            .cloned()
            .collect();
        items.sort_by(|a, b| a.category.cmp(&b.category).then_with(|| a.name.cmp(&b.name)));
        Ok(items)
    }

    async fn menu_items_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<MenuItem>> {
        Ok(self
            .tables()
            .items
            .iter()
            .filter(|i| ids.contains(&i.id))
            .cloned()
            .collect())
    }

    async fn update_menu_item(
        &self,
        id: Uuid,
        changes: &UpdateMenuItemRequest,
    ) -> StoreResult<Option<MenuItem>> {
        let mut tables = self.tables();
        let Some(item) = tables.items.iter_mut().find(|i| i.id == id) else {
            return Ok(None);
        };
        if let Some(name) = &changes.name {
            item.name = name.clone();
        }
        if let Some(description) = &changes.description {
            item.description = Some(description.clone());
        }
        if let Some(category) = changes.category {
            item.category = category;
        }
        if let Some(v) = changes.is_vegetarian {
            item.is_vegetarian = v;
        }
        if let Some(v) = changes.is_vegan {
            item.is_vegan = v;
        }
        if let Some(allergens) = &changes.allergens {
            item.allergens = allergens.clone();
        }
        if let Some(calories) = changes.calories {
            item.calories = Some(calories);
        }
        if let Some(active) = changes.is_active {
            item.is_active = active;
        }
        item.updated_at = Utc::now();
        Ok(Some(item.clone()))
    }

    async fn remove_menu_item(&self, id: Uuid) -> StoreResult<Option<ItemRemoval>> {
        let mut tables = self.tables();
        let Some(pos) = tables.items.iter().position(|i| i.id == id) else {
            return Ok(None);
        };
        let referenced = tables.menus.iter().any(|m| m.offers(id))
            || tables
                .selections
                .iter()
                .any(|s| s.items.iter().any(|si| si.item_id == id));
        if referenced {
            let item = &mut tables.items[pos];
            item.is_active = false;
            item.updated_at = Utc::now();
            Ok(Some(ItemRemoval::Deactivated))
        } else {
            tables.items.remove(pos);
            Ok(Some(ItemRemoval::Deleted))
        }
    }

    async fn insert_menu(&self, new: NewMenu) -> StoreResult<Menu> {
        let mut tables = self.tables();
        if tables
            .menus
            .iter()
            .any(|m| m.meal_type == new.meal_type && m.date == new.date)
        {
            return Err(StoreError::UniqueViolation {
                constraint: "menus_meal_type_date_key".into(),
            });
        }
        let now = Utc::now();
        let menu = Menu {
            id: Uuid::new_v4(),
            meal_type: new.meal_type,
            date: new.date,
            item_ids: new.item_ids,
            published_by: new.published_by,
            window: new.window,
            is_published: true,
            status: MenuStatus::Active,
            created_at: now,
            updated_at: now,
        };
        tables.menus.push(menu.clone());
        Ok(menu)
    }

    async fn find_menu(&self, id: Uuid) -> StoreResult<Option<Menu>> {
        Ok(self.tables().menus.iter().find(|m| m.id == id).cloned())
    }

    async fn find_menu_by_slot(
        &self,
        meal_type: MealType,
        date: NaiveDate,
    ) -> StoreResult<Option<Menu>> {
        Ok(self
            .tables()
            .menus
            .iter()
            .find(|m| m.meal_type == meal_type && m.date == date)
            .cloned())
    }

    async fn list_menus(&self, filter: &MenuFilter) -> StoreResult<Vec<Menu>> {
        let mut menus: Vec<Menu> = self
            .tables()
            .menus
            .iter()
            .filter(|m| filter.matches(m))
            .cloned()
            .collect();
        menus.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| a.meal_type.cmp(&b.meal_type)));
        Ok(menus)
    }

    async fn list_open_menus(&self, now: DateTime<Utc>) -> StoreResult<Vec<Menu>> {
        let mut menus: Vec<Menu> = self
            .tables()
            .menus
            .iter()
            .filter(|m| m.status == MenuStatus::Active && m.window.end > now)
            .cloned()
            .collect();
        menus.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.meal_type.cmp(&b.meal_type)));
        Ok(menus)
    }

    async fn replace_menu_items(&self, id: Uuid, item_ids: &[Uuid]) -> StoreResult<Option<Menu>> {
        let mut tables = self.tables();
        let Some(menu) = tables
            .menus
            .iter_mut()
            .find(|m| m.id == id && m.status != MenuStatus::Closed)
        else {
            return Ok(None);
        };
        menu.item_ids = item_ids.to_vec();
        menu.updated_at = Utc::now();
        Ok(Some(menu.clone()))
    }

    async fn close_menu(&self, id: Uuid) -> StoreResult<Option<ClosedMenu>> {
        let mut tables = self.tables();
        let now = Utc::now();
        let Some(menu) = tables
            .menus
            .iter_mut()
            .find(|m| m.id == id && m.status == MenuStatus::Active)
        else {
            return Ok(None);
        };
        menu.status = MenuStatus::Closed;
        menu.updated_at = now;
        let menu = menu.clone();

        let mut locked_selections = 0;
        for selection in tables
            .selections
            .iter_mut()
            .filter(|s| s.menu_id == id && !s.is_locked)
        {
            selection.is_locked = true;
            selection.updated_at = now;
            locked_selections += 1;
        }
        Ok(Some(ClosedMenu {
            menu,
            locked_selections,
        }))
    }

    async fn delete_menu(&self, id: Uuid) -> StoreResult<MenuDeletion> {
        let mut tables = self.tables();
        let Some(pos) = tables.menus.iter().position(|m| m.id == id) else {
            return Ok(MenuDeletion::NotFound);
        };
        let count = tables.selections.iter().filter(|s| s.menu_id == id).count() as i64;
        if count > 0 {
            return Ok(MenuDeletion::HasSelections(count));
        }
        tables.menus.remove(pos);
        Ok(MenuDeletion::Deleted)
    }

    async fn upsert_selection(&self, write: &SelectionWrite) -> StoreResult<UpsertOutcome> {
        let mut tables = self.tables();
        let Some(menu) = tables.menus.iter().find(|m| m.id == write.menu_id) else {
            return Err(StoreError::ForeignKeyViolation {
                constraint: "selections_menu_id_fkey".into(),
            });
        };
        if menu.status != MenuStatus::Active {
            return Ok(UpsertOutcome::MenuClosed);
        }
        let now = Utc::now();
        if let Some(existing) = tables
            .selections
            .iter_mut()
            .find(|s| s.student_id == write.student_id && s.menu_id == write.menu_id)
        {
            if existing.is_locked {
                return Ok(UpsertOutcome::Locked);
            }
            existing.items = write.items.clone();
            existing.selected_at = write.selected_at;
            existing.updated_at = now;
            return Ok(UpsertOutcome::Replaced(existing.clone()));
        }

        let selection = Selection {
            id: Uuid::new_v4(),
            student_id: write.student_id,
            menu_id: write.menu_id,
            items: write.items.clone(),
            selected_at: write.selected_at,
            is_locked: false,
            created_at: now,
            updated_at: now,
        };
        tables.selections.push(selection.clone());
        Ok(UpsertOutcome::Created(selection))
    }

    async fn find_selection(
        &self,
        student_id: Uuid,
        menu_id: Uuid,
    ) -> StoreResult<Option<Selection>> {
        Ok(self
            .tables()
            .selections
            .iter()
            .find(|s| s.student_id == student_id && s.menu_id == menu_id)
            .cloned())
    }

    async fn lock_selection(&self, id: Uuid) -> StoreResult<Option<Selection>> {
        let mut tables = self.tables();
        let Some(selection) = tables.selections.iter_mut().find(|s| s.id == id) else {
            return Ok(None);
        };
        if !selection.is_locked {
            selection.is_locked = true;
            selection.updated_at = Utc::now();
        }
        Ok(Some(selection.clone()))
    }

    async fn lock_menu_selections(&self, menu_id: Uuid) -> StoreResult<u64> {
        let mut tables = self.tables();
        let now = Utc::now();
        let mut locked = 0;
        for selection in tables
            .selections
            .iter_mut()
            .filter(|s| s.menu_id == menu_id && !s.is_locked)
        {
            selection.is_locked = true;
            selection.updated_at = now;
            locked += 1;
        }
        Ok(locked)
    }

    async fn selections_by_student(&self, student_id: Uuid) -> StoreResult<Vec<Selection>> {
        let rows = self
            .tables()
            .selections
            .iter()
            .filter(|s| s.student_id == student_id)
            .cloned()
            .collect();
        Ok(newest_first(rows))
    }

    async fn selections_by_menus(&self, menu_ids: &[Uuid]) -> StoreResult<Vec<Selection>> {
        let rows = self
            .tables()
            .selections
            .iter()
            .filter(|s| menu_ids.contains(&s.menu_id))
            .cloned()
            .collect();
        Ok(newest_first(rows))
    }

    async fn count_active_students(&self) -> StoreResult<i64> {
        Ok(self.tables().students.iter().filter(|s| s.is_active).count() as i64)
    }

    async fn students_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Student>> {
        Ok(self
            .tables()
            .students
            .iter()
            .filter(|s| ids.contains(&s.id))
            .cloned()
            .collect())
    }
}
