use std::collections::HashSet;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
    db::{MessStore, StoreError},
    error::{AppError, AppResult, GateRejection},
    models::{
        menu::{Menu, MenuStatus},
        selection::{
            SelectedItem, SelectedItemInput, Selection, SelectionWrite, SubmitSelectionRequest,
            UpsertOutcome, MAX_QUANTITY, MIN_QUANTITY,
        },
    },
    services::{menu::MenuService, metrics},
};

const LOCKED: &str = "Selection is locked and cannot be modified";

/// Result of a successful submit; `created` is false for a replacement.
#[derive(Debug, Clone)]
pub struct Submission {
    pub selection: Selection,
    pub created: bool,
}

fn validate_items(items: &[SelectedItemInput]) -> AppResult<Vec<SelectedItem>> {
    if items.is_empty() {
        return Err(AppError::validation("Please select at least one item"));
    }
    let mut seen = HashSet::new();
    items
        .iter()
        .map(|input| {
            if !seen.insert(input.item_id) {
                return Err(AppError::validation("Each item may only be selected once"));
            }
            let quantity = input.quantity.unwrap_or(MIN_QUANTITY);
            if !(MIN_QUANTITY..=MAX_QUANTITY).contains(&quantity) {
                return Err(AppError::validation(format!(
                    "Quantity must be between {MIN_QUANTITY} and {MAX_QUANTITY}"
                )));
            }
            Ok(SelectedItem {
                item_id: input.item_id,
                // Bounded above by MAX_QUANTITY.
                quantity: quantity as u8,
            })
        })
        .collect()
}

fn check_membership(menu: &Menu, items: &[SelectedItem]) -> AppResult<()> {
    match items.iter().find(|i| !menu.offers(i.item_id)) {
        Some(stray) => Err(AppError::validation(format!(
            "Item {} is not on this menu",
            stray.item_id
        ))),
        None => Ok(()),
    }
}

pub struct SelectionService;

impl SelectionService {
    /// Create-or-replace the student's selection for a menu.
    pub async fn submit(
        store: &dyn MessStore,
        student_id: Uuid,
        req: &SubmitSelectionRequest,
        now: DateTime<Utc>,
    ) -> AppResult<Submission> {
        let menu = MenuService::check_gate(store, req.menu_id, now).await?;

        if let Some(existing) = store.find_selection(student_id, menu.id).await? {
            if existing.is_locked {
                return Err(AppError::forbidden(LOCKED));
            }
        }

        let items = validate_items(&req.items)?;
        check_membership(&menu, &items)?;

        let write = SelectionWrite {
            student_id,
            menu_id: menu.id,
            items,
            selected_at: now,
        };
        let outcome = store.upsert_selection(&write).await.map_err(|e| match e {
            // The menu vanished after the gate check.
            StoreError::ForeignKeyViolation { .. } => AppError::not_found("Menu not found"),
            other => other.into(),
        })?;

        let (selection, created) = match outcome {
            UpsertOutcome::Created(s) => (s, true),
            UpsertOutcome::Replaced(s) => (s, false),
            // Locked between the pre-check and the write.
            UpsertOutcome::Locked => return Err(AppError::forbidden(LOCKED)),
            // Closed between the gate and the write.
            UpsertOutcome::MenuClosed => {
                return Err(GateRejection::NotActive {
                    status: MenuStatus::Closed,
                }
                .into())
            }
        };

        let label = if created { "created" } else { "replaced" };
        metrics::SELECTIONS_COUNTER.with_label_values(&[label]).inc();
        tracing::info!(
            selection_id = %selection.id,
            %student_id,
            menu_id = %menu.id,
            items = selection.items.len(),
            outcome = label,
            "Selection saved"
        );
        Ok(Submission { selection, created })
    }

    /// One-way. Locking an already-locked selection returns it unchanged.
    pub async fn lock(store: &dyn MessStore, selection_id: Uuid) -> AppResult<Selection> {
        let selection = store
            .lock_selection(selection_id)
            .await?
            .ok_or_else(|| AppError::not_found("Selection not found"))?;
        metrics::SELECTIONS_LOCKED_COUNTER.inc();
        tracing::info!(%selection_id, "Selection locked");
        Ok(selection)
    }

    /// Administrative cutover for a whole menu. Returns how many were newly locked.
    pub async fn lock_menu(store: &dyn MessStore, menu_id: Uuid) -> AppResult<u64> {
        MenuService::get(store, menu_id).await?;
        let locked = store.lock_menu_selections(menu_id).await?;
        metrics::SELECTIONS_LOCKED_COUNTER.inc_by(locked);
        tracing::info!(%menu_id, locked, "Menu selections locked");
        Ok(locked)
    }

    pub async fn get_for_menu(
        store: &dyn MessStore,
        student_id: Uuid,
        menu_id: Uuid,
    ) -> AppResult<Selection> {
        store
            .find_selection(student_id, menu_id)
            .await?
            .ok_or_else(|| AppError::not_found("No selection found for this menu"))
    }

    pub async fn list_mine(store: &dyn MessStore, student_id: Uuid) -> AppResult<Vec<Selection>> {
        Ok(store.selections_by_student(student_id).await?)
    }

    pub async fn list_by_menu(store: &dyn MessStore, menu_id: Uuid) -> AppResult<Vec<Selection>> {
        MenuService::get(store, menu_id).await?;
        Ok(store.selections_by_menus(&[menu_id]).await?)
    }
}
