use std::collections::HashSet;

use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::{
    db::{
        store::{ClosedMenu, MenuDeletion, NewMenu},
        MessStore, StoreError,
    },
    error::{AppError, AppResult, GateRejection},
    models::menu::{
        CreateMenuRequest, MealType, Menu, MenuAvailability, MenuFilter, MenuStatus,
        UpdateMenuRequest, WindowPhase,
    },
    services::{metrics, window::WindowCalculator},
};

fn duplicate_slot(meal_type: MealType, date: NaiveDate) -> AppError {
    AppError::conflict(format!(
        "Menu for {meal_type} on {} already exists",
        date.format("%Y-%m-%d")
    ))
}

/// Decides whether `menu` accepts selection writes at `now`.
/// Status is checked first, then the window end, then the window start.
pub fn gate(menu: &Menu, now: DateTime<Utc>) -> Result<(), GateRejection> {
    if menu.status != MenuStatus::Active {
        return Err(GateRejection::NotActive {
            status: menu.status,
        });
    }
    match menu.window.phase(now) {
        WindowPhase::Open => Ok(()),
        WindowPhase::Closed => Err(GateRejection::Closed {
            closed_at: menu.window.end,
        }),
        WindowPhase::NotYetOpen => Err(GateRejection::NotYetOpen {
            opens_at: menu.window.start,
        }),
    }
}

/// Item lists must be non-empty, free of repeats, and reference active items only.
async fn validate_item_ids(store: &dyn MessStore, item_ids: &[Uuid]) -> AppResult<()> {
    if item_ids.is_empty() {
        return Err(AppError::validation("Please provide at least one menu item"));
    }
    let unique: HashSet<&Uuid> = item_ids.iter().collect();
    if unique.len() != item_ids.len() {
        return Err(AppError::validation("Menu items must not repeat"));
    }
    let active = store
        .menu_items_by_ids(item_ids)
        .await?
        .into_iter()
        .filter(|item| item.is_active)
        .count();
    if active != item_ids.len() {
        return Err(AppError::validation("Some menu items are invalid or inactive"));
    }
    Ok(())
}

pub struct MenuService;

impl MenuService {
    /// Publish a menu. Its selection window is computed once, here.
    pub async fn create(
        store: &dyn MessStore,
        windows: &WindowCalculator,
        req: &CreateMenuRequest,
        created_by: Uuid,
    ) -> AppResult<Menu> {
        let meal_type: MealType = req
            .meal_type
            .parse()
            .map_err(|_| AppError::validation("Invalid meal type"))?;
        validate_item_ids(store, &req.item_ids).await?;

        // Early exit only; the unique key on (meal_type, date) is authoritative.
        if store.find_menu_by_slot(meal_type, req.date).await?.is_some() {
            return Err(duplicate_slot(meal_type, req.date));
        }

        let window = windows.selection_window(meal_type, req.date)?;
        let menu = store
            .insert_menu(NewMenu {
                meal_type,
                date: req.date,
                item_ids: req.item_ids.clone(),
                published_by: created_by,
                window,
            })
            .await
            .map_err(|e| match e {
                StoreError::UniqueViolation { .. } => duplicate_slot(meal_type, req.date),
                other => other.into(),
            })?;

        metrics::MENUS_CREATED_COUNTER
            .with_label_values(&[meal_type.as_str()])
            .inc();
        tracing::info!(
            menu_id = %menu.id,
            %meal_type,
            date = %menu.date,
            opens_at = %menu.window.start,
            closes_at = %menu.window.end,
            "Menu published"
        );
        Ok(menu)
    }

    pub async fn get(store: &dyn MessStore, id: Uuid) -> AppResult<Menu> {
        store
            .find_menu(id)
            .await?
            .ok_or_else(|| AppError::not_found("Menu not found"))
    }

    pub async fn list(store: &dyn MessStore, filter: &MenuFilter) -> AppResult<Vec<Menu>> {
        Ok(store.list_menus(filter).await?)
    }

    /// Menus a student can still act on: active and not yet past their window.
    pub async fn list_active(store: &dyn MessStore, now: DateTime<Utc>) -> AppResult<Vec<Menu>> {
        Ok(store.list_open_menus(now).await?)
    }

    /// Runs before every selection write. On success the menu is the
    /// validated context for that write.
    pub async fn check_gate(
        store: &dyn MessStore,
        menu_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<Menu> {
        let menu = Self::get(store, menu_id).await?;
        if let Err(rejection) = gate(&menu, now) {
            metrics::GATE_REJECTIONS_COUNTER
                .with_label_values(&[rejection.reason()])
                .inc();
            tracing::debug!(%menu_id, reason = rejection.reason(), "Selection gate refused");
            return Err(rejection.into());
        }
        Ok(menu)
    }

    /// Same decision as [`MenuService::check_gate`], reported instead of raised.
    pub async fn availability(
        store: &dyn MessStore,
        menu_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<MenuAvailability> {
        let menu = Self::get(store, menu_id).await?;
        let verdict = gate(&menu, now);
        Ok(MenuAvailability {
            menu_id: menu.id,
            open: verdict.is_ok(),
            reason: verdict.as_ref().err().map(GateRejection::reason),
            opens_at: menu.window.start,
            closes_at: menu.window.end,
            seconds_remaining: verdict
                .is_ok()
                .then(|| (menu.window.end - now).num_seconds()),
        })
    }

    pub async fn update(
        store: &dyn MessStore,
        id: Uuid,
        req: &UpdateMenuRequest,
    ) -> AppResult<Menu> {
        let menu = Self::get(store, id).await?;
        if menu.status == MenuStatus::Closed {
            return Err(AppError::validation("Cannot update a closed menu"));
        }
        let Some(item_ids) = &req.item_ids else {
            return Ok(menu);
        };
        validate_item_ids(store, item_ids).await?;

        let updated = store
            .replace_menu_items(id, item_ids)
            .await?
            // Closed between the read and the write.
            .ok_or_else(|| AppError::validation("Cannot update a closed menu"))?;
        tracing::info!(menu_id = %id, items = item_ids.len(), "Menu items replaced");
        Ok(updated)
    }

    /// active → closed. Locks the menu's selections in the same step.
    pub async fn close(store: &dyn MessStore, id: Uuid) -> AppResult<ClosedMenu> {
        let menu = Self::get(store, id).await?;
        match menu.status {
            MenuStatus::Closed => return Err(AppError::validation("Menu is already closed")),
            MenuStatus::Draft => return Err(AppError::validation("Menu has not been published")),
            MenuStatus::Active => {}
        }
        let closed = store
            .close_menu(id)
            .await?
            .ok_or_else(|| AppError::validation("Menu is already closed"))?;

        metrics::MENUS_CLOSED_COUNTER.inc();
        metrics::SELECTIONS_LOCKED_COUNTER.inc_by(closed.locked_selections);
        tracing::info!(
            menu_id = %id,
            locked = closed.locked_selections,
            "Menu closed"
        );
        Ok(closed)
    }

    /// Closes every active menu whose window has ended by `now`.
    pub async fn close_expired(
        store: &dyn MessStore,
        now: DateTime<Utc>,
    ) -> AppResult<Vec<ClosedMenu>> {
        let filter = MenuFilter {
            status: Some(MenuStatus::Active),
            ..MenuFilter::default()
        };
        let mut closed = Vec::new();
        for menu in store.list_menus(&filter).await? {
            if menu.window.phase(now) != WindowPhase::Closed {
                continue;
            }
            match Self::close(store, menu.id).await {
                Ok(done) => closed.push(done),
                // Someone else closed it first.
                Err(AppError::Validation(_)) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(closed)
    }

    /// Only menus nobody has selected from can be deleted.
    pub async fn delete(store: &dyn MessStore, id: Uuid) -> AppResult<()> {
        match store.delete_menu(id).await? {
            MenuDeletion::Deleted => {
                tracing::info!(menu_id = %id, "Menu deleted");
                Ok(())
            }
            MenuDeletion::NotFound => Err(AppError::not_found("Menu not found")),
            MenuDeletion::HasSelections(n) => Err(AppError::conflict(format!(
                "Cannot delete menu with existing selections ({n})"
            ))),
        }
    }
}
