use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{types::Json, FromRow, PgPool};
use uuid::Uuid;

use super::store::{ClosedMenu, MenuDeletion, MessStore, NewMenu, StoreError, StoreResult};
use crate::models::{
    menu::{MealType, Menu, MenuFilter, SelectionWindow},
    menu_item::{CreateMenuItemRequest, ItemRemoval, MenuItem, MenuItemFilter, UpdateMenuItemRequest},
    selection::{SelectedItem, Selection, SelectionWrite, UpsertOutcome},
    user::Student,
};

const ITEM_COLUMNS: &str = "id, name, description, category, is_vegetarian, is_vegan, \
                            allergens, calories, is_active, created_at, updated_at";

const MENU_COLUMNS: &str = "id, meal_type, date, item_ids, published_by, window_start, \
                            window_end, is_published, status, created_at, updated_at";

const SELECTION_COLUMNS: &str =
    "id, student_id, menu_id, items, selected_at, is_locked, created_at, updated_at";

/// Serving order for ORDER BY clauses.
const MEAL_ORDER: &str = "array_position(ARRAY['breakfast','lunch','dinner']::TEXT[], meal_type)";

// Enum columns are TEXT with CHECK constraints; rows carry them as strings.

#[derive(FromRow)]
struct MenuItemRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    category: String,
    is_vegetarian: bool,
    is_vegan: bool,
    allergens: Vec<String>,
    calories: Option<i32>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MenuItemRow> for MenuItem {
    type Error = StoreError;

    fn try_from(row: MenuItemRow) -> Result<Self, Self::Error> {
        Ok(MenuItem {
            id: row.id,
            name: row.name,
            description: row.description,
            category: row
                .category
                .parse()
                .map_err(|e: anyhow::Error| StoreError::Corrupt(e.to_string()))?,
            is_vegetarian: row.is_vegetarian,
            is_vegan: row.is_vegan,
            allergens: row.allergens,
            calories: row.calories,
            is_active: row.is_active,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct MenuRow {
    id: Uuid,
    meal_type: String,
    date: NaiveDate,
    item_ids: Vec<Uuid>,
    published_by: Uuid,
    window_start: DateTime<Utc>,
    window_end: DateTime<Utc>,
    is_published: bool,
    status: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MenuRow> for Menu {
    type Error = StoreError;

    fn try_from(row: MenuRow) -> Result<Self, Self::Error> {
        let corrupt = |e: anyhow::Error| StoreError::Corrupt(e.to_string());
        Ok(Menu {
            id: row.id,
            meal_type: row.meal_type.parse().map_err(corrupt)?,
            date: row.date,
            item_ids: row.item_ids,
            published_by: row.published_by,
            window: SelectionWindow {
                start: row.window_start,
                end: row.window_end,
            },
            is_published: row.is_published,
            status: row.status.parse().map_err(corrupt)?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(FromRow)]
struct SelectionRow {
    id: Uuid,
    student_id: Uuid,
    menu_id: Uuid,
    items: Json<Vec<SelectedItem>>,
    selected_at: DateTime<Utc>,
    is_locked: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<SelectionRow> for Selection {
    fn from(row: SelectionRow) -> Self {
        Selection {
            id: row.id,
            student_id: row.student_id,
            menu_id: row.menu_id,
            items: row.items.0,
            selected_at: row.selected_at,
            is_locked: row.is_locked,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(FromRow)]
struct UpsertRow {
    #[sqlx(flatten)]
    selection: SelectionRow,
    inserted: bool,
}

#[derive(FromRow)]
struct StudentRow {
    id: Uuid,
    name: String,
    email: String,
    roll_number: Option<String>,
    hostel_block: Option<String>,
    is_active: bool,
}

impl From<StudentRow> for Student {
    fn from(row: StudentRow) -> Self {
        Student {
            id: row.id,
            name: row.name,
            email: row.email,
            roll_number: row.roll_number,
            hostel_block: row.hostel_block,
            is_active: row.is_active,
        }
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> StoreResult<Vec<T>>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// PostgreSQL-backed store. Schema lives in ./migrations.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MessStore for PgStore {
    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_menu_item(&self, req: &CreateMenuItemRequest) -> StoreResult<MenuItem> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            r#"INSERT INTO menu_items
                   (id, name, description, category, is_vegetarian, is_vegan, allergens, calories)
               VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
               RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.category.as_str())
        .bind(req.is_vegetarian)
        .bind(req.is_vegan)
        .bind(&req.allergens)
        .bind(req.calories)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_menu_item(&self, id: Uuid) -> StoreResult<Option<MenuItem>> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MenuItem::try_from).transpose()
    }

    async fn list_menu_items(&self, filter: &MenuItemFilter) -> StoreResult<Vec<MenuItem>> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            r#"SELECT {ITEM_COLUMNS} FROM menu_items
               WHERE ($1::TEXT IS NULL OR category = $1)
                 AND ($2::BOOLEAN IS NULL OR is_active = $2)
               ORDER BY array_position(ARRAY['main','side','beverage','dessert']::TEXT[], category),
                        name"#
        ))
        .bind(filter.category.map(|c| c.as_str()))
        .bind(filter.is_active)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn menu_items_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<MenuItem>> {
        let rows = sqlx::query_as::<_, MenuItemRow>(&format!(
            "SELECT {ITEM_COLUMNS} FROM menu_items WHERE id = ANY($1)"
        ))
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn update_menu_item(
        &self,
        id: Uuid,
        changes: &UpdateMenuItemRequest,
    ) -> StoreResult<Option<MenuItem>> {
        let row = sqlx::query_as::<_, MenuItemRow>(&format!(
            r#"UPDATE menu_items
               SET name          = COALESCE($2, name),
                   description   = COALESCE($3, description),
                   category      = COALESCE($4, category),
                   is_vegetarian = COALESCE($5, is_vegetarian),
                   is_vegan      = COALESCE($6, is_vegan),
                   allergens     = COALESCE($7, allergens),
                   calories      = COALESCE($8, calories),
                   is_active     = COALESCE($9, is_active),
                   updated_at    = NOW()
               WHERE id = $1
               RETURNING {ITEM_COLUMNS}"#
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(&changes.description)
        .bind(changes.category.map(|c| c.as_str()))
        .bind(changes.is_vegetarian)
        .bind(changes.is_vegan)
        .bind(&changes.allergens)
        .bind(changes.calories)
        .bind(changes.is_active)
        .fetch_optional(&self.pool)
        .await?;
        row.map(MenuItem::try_from).transpose()
    }

    async fn remove_menu_item(&self, id: Uuid) -> StoreResult<Option<ItemRemoval>> {
        let mut tx = self.pool.begin().await?;

        let exists: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM menu_items WHERE id = $1 FOR UPDATE")
                .bind(id)
                .fetch_optional(&mut *tx)
                .await?;
        if exists.is_none() {
            return Ok(None);
        }

        let referenced: bool = sqlx::query_scalar(
            r#"SELECT EXISTS (SELECT 1 FROM menus WHERE $1 = ANY(item_ids))
                   OR EXISTS (SELECT 1 FROM selections s, jsonb_array_elements(s.items) e
                              WHERE e->>'item_id' = $1::TEXT)"#,
        )
        .bind(id)
        .fetch_one(&mut *tx)
        .await?;

        let removal = if referenced {
            sqlx::query(
                "UPDATE menu_items SET is_active = FALSE, updated_at = NOW() WHERE id = $1",
            )
            .bind(id)
            .execute(&mut *tx)
            .await?;
            ItemRemoval::Deactivated
        } else {
            sqlx::query("DELETE FROM menu_items WHERE id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            ItemRemoval::Deleted
        };

        tx.commit().await?;
        Ok(Some(removal))
    }

    async fn insert_menu(&self, menu: NewMenu) -> StoreResult<Menu> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            r#"INSERT INTO menus
                   (id, meal_type, date, item_ids, published_by,
                    window_start, window_end, is_published, status)
               VALUES ($1, $2, $3, $4, $5, $6, $7, TRUE, 'active')
               RETURNING {MENU_COLUMNS}"#
        ))
        .bind(Uuid::new_v4())
        .bind(menu.meal_type.as_str())
        .bind(menu.date)
        .bind(&menu.item_ids)
        .bind(menu.published_by)
        .bind(menu.window.start)
        .bind(menu.window.end)
        .fetch_one(&self.pool)
        .await?;
        row.try_into()
    }

    async fn find_menu(&self, id: Uuid) -> StoreResult<Option<Menu>> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Menu::try_from).transpose()
    }

    async fn find_menu_by_slot(
        &self,
        meal_type: MealType,
        date: NaiveDate,
    ) -> StoreResult<Option<Menu>> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            "SELECT {MENU_COLUMNS} FROM menus WHERE meal_type = $1 AND date = $2"
        ))
        .bind(meal_type.as_str())
        .bind(date)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Menu::try_from).transpose()
    }

    async fn list_menus(&self, filter: &MenuFilter) -> StoreResult<Vec<Menu>> {
        let rows = sqlx::query_as::<_, MenuRow>(&format!(
            r#"SELECT {MENU_COLUMNS} FROM menus
               WHERE ($1::TEXT IS NULL OR status = $1)
                 AND ($2::TEXT IS NULL OR meal_type = $2)
                 AND ($3::DATE IS NULL OR date >= $3)
                 AND ($4::DATE IS NULL OR date <= $4)
               ORDER BY date DESC, {MEAL_ORDER}"#
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.meal_type.map(|m| m.as_str()))
        .bind(filter.start_date)
        .bind(filter.end_date)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn list_open_menus(&self, now: DateTime<Utc>) -> StoreResult<Vec<Menu>> {
        let rows = sqlx::query_as::<_, MenuRow>(&format!(
            r#"SELECT {MENU_COLUMNS} FROM menus
               WHERE status = 'active' AND window_end > $1
               ORDER BY date, {MEAL_ORDER}"#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await?;
        convert_all(rows)
    }

    async fn replace_menu_items(&self, id: Uuid, item_ids: &[Uuid]) -> StoreResult<Option<Menu>> {
        let row = sqlx::query_as::<_, MenuRow>(&format!(
            r#"UPDATE menus SET item_ids = $2, updated_at = NOW()
               WHERE id = $1 AND status <> 'closed'
               RETURNING {MENU_COLUMNS}"#
        ))
        .bind(id)
        .bind(item_ids)
        .fetch_optional(&self.pool)
        .await?;
        row.map(Menu::try_from).transpose()
    }

    async fn close_menu(&self, id: Uuid) -> StoreResult<Option<ClosedMenu>> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, MenuRow>(&format!(
            r#"UPDATE menus SET status = 'closed', updated_at = NOW()
               WHERE id = $1 AND status = 'active'
               RETURNING {MENU_COLUMNS}"#
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let locked = sqlx::query(
            "UPDATE selections SET is_locked = TRUE, updated_at = NOW()
             WHERE menu_id = $1 AND is_locked = FALSE",
        )
        .bind(id)
        .execute(&mut *tx)
        .await?
        .rows_affected();

        tx.commit().await?;
        Ok(Some(ClosedMenu {
            menu: row.try_into()?,
            locked_selections: locked,
        }))
    }

    async fn delete_menu(&self, id: Uuid) -> StoreResult<MenuDeletion> {
        let deleted = sqlx::query(
            "DELETE FROM menus
             WHERE id = $1 AND NOT EXISTS (SELECT 1 FROM selections WHERE menu_id = $1)",
        )
        .bind(id)
        .execute(&self.pool)
        .await;

        match deleted.map_err(StoreError::from) {
            Ok(done) if done.rows_affected() > 0 => return Ok(MenuDeletion::Deleted),
            // A selection raced in; the RESTRICT foreign key refused the delete.
            Ok(_) | Err(StoreError::ForeignKeyViolation { .. }) => {}
            Err(e) => return Err(e),
        }

        let (exists, selections): (bool, i64) = sqlx::query_as(
            "SELECT EXISTS (SELECT 1 FROM menus WHERE id = $1),
                    (SELECT COUNT(*) FROM selections WHERE menu_id = $1)",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await?;

        Ok(if exists {
            MenuDeletion::HasSelections(selections)
        } else {
            MenuDeletion::NotFound
        })
    }

    async fn upsert_selection(&self, write: &SelectionWrite) -> StoreResult<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;

        // FOR SHARE conflicts with the status UPDATE in close_menu, so a
        // submission and a close of the same menu are strictly ordered.
        let status: Option<String> =
            sqlx::query_scalar("SELECT status FROM menus WHERE id = $1 FOR SHARE")
                .bind(write.menu_id)
                .fetch_optional(&mut *tx)
                .await?;
        match status.as_deref() {
            None => {
                return Err(StoreError::ForeignKeyViolation {
                    constraint: "selections_menu_id_fkey".into(),
                })
            }
            Some("active") => {}
            Some(_) => return Ok(UpsertOutcome::MenuClosed),
        }

        // The row lock taken by ON CONFLICT orders this against lock_selection:
        // a locked row fails the WHERE and nothing is returned.
        let row = sqlx::query_as::<_, UpsertRow>(&format!(
            r#"INSERT INTO selections (id, student_id, menu_id, items, selected_at)
               VALUES ($1, $2, $3, $4, $5)
               ON CONFLICT (student_id, menu_id) DO UPDATE SET
                   items       = EXCLUDED.items,
                   selected_at = EXCLUDED.selected_at,
                   updated_at  = NOW()
               WHERE selections.is_locked = FALSE
               RETURNING {SELECTION_COLUMNS}, (xmax = 0) AS inserted"#
        ))
        .bind(Uuid::new_v4())
        .bind(write.student_id)
        .bind(write.menu_id)
        .bind(Json(write.items.clone()))
        .bind(write.selected_at)
        .fetch_optional(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(match row {
            None => UpsertOutcome::Locked,
            Some(UpsertRow {
                selection,
                inserted: true,
            }) => UpsertOutcome::Created(selection.into()),
            Some(UpsertRow { selection, .. }) => UpsertOutcome::Replaced(selection.into()),
        })
    }

    async fn find_selection(
        &self,
        student_id: Uuid,
        menu_id: Uuid,
    ) -> StoreResult<Option<Selection>> {
        let row = sqlx::query_as::<_, SelectionRow>(&format!(
            "SELECT {SELECTION_COLUMNS} FROM selections WHERE student_id = $1 AND menu_id = $2"
        ))
        .bind(student_id)
        .bind(menu_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Selection::from))
    }

    async fn lock_selection(&self, id: Uuid) -> StoreResult<Option<Selection>> {
        let row = sqlx::query_as::<_, SelectionRow>(&format!(
            r#"UPDATE selections
               SET is_locked  = TRUE,
                   updated_at = CASE WHEN is_locked THEN updated_at ELSE NOW() END
               WHERE id = $1
               RETURNING {SELECTION_COLUMNS}"#
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(Selection::from))
    }

    async fn lock_menu_selections(&self, menu_id: Uuid) -> StoreResult<u64> {
        let done = sqlx::query(
            "UPDATE selections SET is_locked = TRUE, updated_at = NOW()
             WHERE menu_id = $1 AND is_locked = FALSE",
        )
        .bind(menu_id)
        .execute(&self.pool)
        .await?;
        Ok(done.rows_affected())
    }

    async fn selections_by_student(&self, student_id: Uuid) -> StoreResult<Vec<Selection>> {
        let rows = sqlx::query_as::<_, SelectionRow>(&format!(
            r#"SELECT {SELECTION_COLUMNS} FROM selections
               WHERE student_id = $1
               ORDER BY created_at DESC"#
        ))
        .bind(student_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Selection::from).collect())
    }

    async fn selections_by_menus(&self, menu_ids: &[Uuid]) -> StoreResult<Vec<Selection>> {
        let rows = sqlx::query_as::<_, SelectionRow>(&format!(
            r#"SELECT {SELECTION_COLUMNS} FROM selections
               WHERE menu_id = ANY($1)
               ORDER BY created_at DESC"#
        ))
        .bind(menu_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Selection::from).collect())
    }

    async fn count_active_students(&self) -> StoreResult<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE role = 'student' AND is_active = TRUE",
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }

    async fn students_by_ids(&self, ids: &[Uuid]) -> StoreResult<Vec<Student>> {
        let rows = sqlx::query_as::<_, StudentRow>(
            r#"SELECT id, name, email, roll_number, hostel_block, is_active
               FROM users
               WHERE id = ANY($1) AND role = 'student'"#,
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Student::from).collect())
    }
}
