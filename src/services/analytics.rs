use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::MessStore,
    error::{AppError, AppResult},
    models::{
        analytics::{
            ItemRef, ItemStat, ItemStudent, MenuAnalytics, MenuSummary, OverviewAnalytics,
            OverviewCounts, OverviewQuery, ParticipationSummary, PopularItem, RecentSelection,
        },
        menu::{MenuFilter, MenuStatus},
        selection::Selection,
        user::Student,
    },
    services::menu::MenuService,
};

const RECENT_LIMIT: usize = 10;
const POPULAR_LIMIT: usize = 10;
const UNKNOWN: &str = "Unknown";

/// `part / whole` as a percentage rounded to two places; 0 for an empty whole.
fn percent(part: i64, whole: i64) -> f64 {
    if whole <= 0 {
        return 0.0;
    }
    (part as f64 / whole as f64 * 10_000.0).round() / 100.0
}

async fn student_directory(
    store: &dyn MessStore,
    selections: &[Selection],
) -> AppResult<HashMap<Uuid, Student>> {
    let mut ids: Vec<Uuid> = selections.iter().map(|s| s.student_id).collect();
    ids.sort();
    ids.dedup();
    Ok(store
        .students_by_ids(&ids)
        .await?
        .into_iter()
        .map(|s| (s.id, s))
        .collect())
}

#[derive(Serialize)]
struct KitchenRow<'a> {
    item: &'a str,
    category: &'a str,
    vegetarian: bool,
    selections: i64,
    total_quantity: i64,
}

pub struct AnalyticsService;

impl AnalyticsService {
    pub async fn menu(store: &dyn MessStore, menu_id: Uuid) -> AppResult<MenuAnalytics> {
        let menu = MenuService::get(store, menu_id).await?;
        let selections = store.selections_by_menus(&[menu.id]).await?;
        let total_students = store.count_active_students().await?;
        let students = student_directory(store, &selections).await?;
        let total_selections = selections.len() as i64;

        let catalogue: HashMap<Uuid, _> = store
            .menu_items_by_ids(&menu.item_ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();

        let mut item_stats: Vec<ItemStat> = menu
            .item_ids
            .iter()
            .filter_map(|id| catalogue.get(id))
            .map(|item| {
                let picks: Vec<(&Selection, u8)> = selections
                    .iter()
                    .filter_map(|s| {
                        s.items
                            .iter()
                            .find(|si| si.item_id == item.id)
                            .map(|si| (s, si.quantity))
                    })
                    .collect();
                let count = picks.len() as i64;
                ItemStat {
                    item: ItemRef {
                        id: item.id,
                        name: item.name.clone(),
                        category: item.category,
                    },
                    total_selections: count,
                    total_quantity: picks.iter().map(|(_, q)| i64::from(*q)).sum(),
                    percentage: percent(count, total_selections),
                    students: picks
                        .iter()
                        .map(|(s, quantity)| {
                            let student = students.get(&s.student_id);
                            ItemStudent {
                                name: student.map_or_else(|| UNKNOWN.into(), |st| st.name.clone()),
                                roll_number: student.and_then(|st| st.roll_number.clone()),
                                quantity: *quantity,
                            }
                        })
                        .collect(),
                }
            })
            .collect();
        item_stats.sort_by(|a, b| b.total_selections.cmp(&a.total_selections));

        let mut hostel_breakdown = BTreeMap::new();
        for selection in &selections {
            let block = students
                .get(&selection.student_id)
                .and_then(|s| s.hostel_block.clone())
                .unwrap_or_else(|| UNKNOWN.into());
            *hostel_breakdown.entry(block).or_insert(0) += 1;
        }

        let recent_selections = selections
            .iter()
            .take(RECENT_LIMIT)
            .map(|s| {
                let student = students.get(&s.student_id);
                RecentSelection {
                    student: student.map_or_else(|| UNKNOWN.into(), |st| st.name.clone()),
                    roll_number: student.and_then(|st| st.roll_number.clone()),
                    items: s.items.len(),
                    selected_at: s.selected_at,
                }
            })
            .collect();

        Ok(MenuAnalytics {
            menu: MenuSummary {
                id: menu.id,
                meal_type: menu.meal_type,
                date: menu.date,
                status: menu.status,
            },
            summary: ParticipationSummary {
                total_students,
                total_selections,
                participation_rate: percent(total_selections, total_students),
                selection_window_end: menu.window.end,
            },
            item_stats,
            hostel_breakdown,
            recent_selections,
        })
    }

    pub async fn overview(
        store: &dyn MessStore,
        query: &OverviewQuery,
    ) -> AppResult<OverviewAnalytics> {
        let menus = store
            .list_menus(&MenuFilter {
                start_date: query.start_date,
                end_date: query.end_date,
                ..MenuFilter::default()
            })
            .await?;
        let menu_ids: Vec<Uuid> = menus.iter().map(|m| m.id).collect();
        let selections = store.selections_by_menus(&menu_ids).await?;
        let total_students = store.count_active_students().await?;

        let total_menus = menus.len() as i64;
        let count_status = |status: MenuStatus| menus.iter().filter(|m| m.status == status).count() as i64;
        let total_selections = selections.len() as i64;

        // item id -> (selections, quantity)
        let mut tally: HashMap<Uuid, (i64, i64)> = HashMap::new();
        for item in selections.iter().flat_map(|s| &s.items) {
            let entry = tally.entry(item.item_id).or_default();
            entry.0 += 1;
            entry.1 += i64::from(item.quantity);
        }
        let mut ranked: Vec<(Uuid, (i64, i64))> = tally.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(POPULAR_LIMIT);

        let ids: Vec<Uuid> = ranked.iter().map(|(id, _)| *id).collect();
        let mut items: HashMap<Uuid, _> = store
            .menu_items_by_ids(&ids)
            .await?
            .into_iter()
            .map(|i| (i.id, i))
            .collect();
        let popular_items = ranked
            .into_iter()
            .map(|(item_id, (total_selections, total_quantity))| PopularItem {
                item: items.remove(&item_id),
                item_id,
                total_selections,
                total_quantity,
            })
            .collect();

        Ok(OverviewAnalytics {
            overview: OverviewCounts {
                total_menus,
                active_menus: count_status(MenuStatus::Active),
                closed_menus: count_status(MenuStatus::Closed),
                total_students,
                total_selections,
                average_participation: percent(total_selections, total_menus * total_students),
            },
            popular_items,
        })
    }

    /// Per-item totals for one menu as CSV, most requested first.
    pub async fn kitchen_sheet(store: &dyn MessStore, menu_id: Uuid) -> AppResult<String> {
        let analytics = Self::menu(store, menu_id).await?;
        let vegetarian: HashMap<Uuid, bool> = store
            .menu_items_by_ids(&analytics.item_stats.iter().map(|s| s.item.id).collect::<Vec<_>>())
            .await?
            .into_iter()
            .map(|i| (i.id, i.is_vegetarian))
            .collect();

        let mut writer = csv::Writer::from_writer(Vec::new());
        for stat in &analytics.item_stats {
            writer
                .serialize(KitchenRow {
                    item: &stat.item.name,
                    category: stat.item.category.as_str(),
                    vegetarian: vegetarian.get(&stat.item.id).copied().unwrap_or(false),
                    selections: stat.total_selections,
                    total_quantity: stat.total_quantity,
                })
                .map_err(|e| AppError::Internal(format!("kitchen sheet: {e}")))?;
        }
        let bytes = writer
            .into_inner()
            .map_err(|e| AppError::Internal(format!("kitchen sheet: {e}")))?;
        String::from_utf8(bytes).map_err(|e| AppError::Internal(format!("kitchen sheet: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::menu::{CreateMenuRequest, Menu};
    use crate::models::menu_item::{CreateMenuItemRequest, ItemCategory};
    use crate::models::selection::{SelectedItemInput, SubmitSelectionRequest};
    use crate::services::selection::SelectionService;
    use crate::services::window::{MealSchedule, WindowCalculator};
    use chrono::{Duration, NaiveDate};

    async fn item(store: &MemoryStore, name: &str, category: ItemCategory) -> Uuid {
        store
            .insert_menu_item(&CreateMenuItemRequest {
                name: name.into(),
                description: None,
                category,
                is_vegetarian: true,
                is_vegan: false,
                allergens: vec![],
                calories: None,
            })
            .await
            .unwrap()
            .id
    }

    fn student(name: &str, block: Option<&str>) -> Student {
        Student {
            id: Uuid::new_v4(),
            name: name.into(),
            email: format!("{}@hostel.test", name.to_lowercase()),
            roll_number: Some(format!("R-{name}")),
            hostel_block: block.map(String::from),
            is_active: true,
        }
    }

    async fn menu(store: &MemoryStore, meal: &str, day: u32, item_ids: Vec<Uuid>) -> Menu {
        let calc = WindowCalculator::new(MealSchedule::default(), chrono_tz::Asia::Kolkata);
        MenuService::create(
            store,
            &calc,
            &CreateMenuRequest {
                meal_type: meal.into(),
                date: NaiveDate::from_ymd_opt(2024, 5, day).unwrap(),
                item_ids,
            },
            Uuid::new_v4(),
        )
        .await
        .unwrap()
    }

    async fn pick(store: &MemoryStore, student: Uuid, menu: &Menu, items: &[(Uuid, i64)]) {
        SelectionService::submit(
            store,
            student,
            &SubmitSelectionRequest {
                menu_id: menu.id,
                items: items
                    .iter()
                    .map(|&(item_id, q)| SelectedItemInput {
                        item_id,
                        quantity: Some(q),
                    })
                    .collect(),
            },
            menu.window.start + Duration::minutes(1),
        )
        .await
        .unwrap();
    }

    #[test]
    fn percent_rounds_and_handles_zero() {
        assert_eq!(percent(1, 3), 33.33);
        assert_eq!(percent(2, 3), 66.67);
        assert_eq!(percent(5, 0), 0.0);
    }

    #[tokio::test]
    async fn menu_analytics_folds_selections() {
        let store = MemoryStore::new();
        let rice = item(&store, "Rice", ItemCategory::Main).await;
        let dal = item(&store, "Dal", ItemCategory::Side).await;
        let lunch = menu(&store, "lunch", 1, vec![rice, dal]).await;

        let asha = student("Asha", Some("A"));
        let ravi = student("Ravi", Some("B"));
        let meera = student("Meera", None);
        let idle = student("Idle", Some("A"));
        for s in [&asha, &ravi, &meera, &idle] {
            store.add_student(s.clone());
        }

        pick(&store, asha.id, &lunch, &[(rice, 2), (dal, 1)]).await;
        pick(&store, ravi.id, &lunch, &[(dal, 3)]).await;
        pick(&store, meera.id, &lunch, &[(dal, 1)]).await;

        let report = AnalyticsService::menu(&store, lunch.id).await.unwrap();
        assert_eq!(report.summary.total_students, 4);
        assert_eq!(report.summary.total_selections, 3);
        assert_eq!(report.summary.participation_rate, 75.0);
        assert_eq!(report.summary.selection_window_end, lunch.window.end);

        assert_eq!(report.item_stats[0].item.id, dal);
        assert_eq!(report.item_stats[0].total_selections, 3);
        assert_eq!(report.item_stats[0].total_quantity, 5);
        assert_eq!(report.item_stats[0].percentage, 100.0);
        assert_eq!(report.item_stats[1].item.id, rice);
        assert_eq!(report.item_stats[1].percentage, 33.33);
        assert_eq!(report.item_stats[1].students[0].name, "Asha");
        assert_eq!(report.item_stats[1].students[0].quantity, 2);

        assert_eq!(report.hostel_breakdown.get("A"), Some(&1));
        assert_eq!(report.hostel_breakdown.get("B"), Some(&1));
        assert_eq!(report.hostel_breakdown.get("Unknown"), Some(&1));
        assert_eq!(report.recent_selections.len(), 3);
    }

    #[tokio::test]
    async fn empty_menu_reports_zeroes() {
        let store = MemoryStore::new();
        let rice = item(&store, "Rice", ItemCategory::Main).await;
        let lunch = menu(&store, "lunch", 1, vec![rice]).await;

        let report = AnalyticsService::menu(&store, lunch.id).await.unwrap();
        assert_eq!(report.summary.participation_rate, 0.0);
        assert_eq!(report.item_stats[0].percentage, 0.0);
        assert!(report.hostel_breakdown.is_empty());

        assert!(matches!(
            AnalyticsService::menu(&store, Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn overview_counts_menus_in_range() {
        let store = MemoryStore::new();
        let rice = item(&store, "Rice", ItemCategory::Main).await;
        let tea = item(&store, "Tea", ItemCategory::Beverage).await;
        let first = menu(&store, "lunch", 1, vec![rice, tea]).await;
        let second = menu(&store, "lunch", 2, vec![rice]).await;
        let outside = menu(&store, "lunch", 9, vec![tea]).await;
        MenuService::close(&store, second.id).await.unwrap();

        let a = student("Asha", Some("A"));
        let b = student("Ravi", Some("B"));
        store.add_student(a.clone());
        store.add_student(b.clone());
        pick(&store, a.id, &first, &[(rice, 1), (tea, 2)]).await;
        pick(&store, b.id, &first, &[(rice, 2)]).await;
        pick(&store, a.id, &outside, &[(tea, 1)]).await;

        let report = AnalyticsService::overview(
            &store,
            &OverviewQuery {
                start_date: NaiveDate::from_ymd_opt(2024, 5, 1),
                end_date: NaiveDate::from_ymd_opt(2024, 5, 2),
            },
        )
        .await
        .unwrap();

        assert_eq!(report.overview.total_menus, 2);
        assert_eq!(report.overview.active_menus, 1);
        assert_eq!(report.overview.closed_menus, 1);
        assert_eq!(report.overview.total_selections, 2);
        // 2 / (2 menus * 2 students)
        assert_eq!(report.overview.average_participation, 50.0);

        assert_eq!(report.popular_items[0].item_id, rice);
        assert_eq!(report.popular_items[0].total_selections, 2);
        assert_eq!(report.popular_items[0].total_quantity, 3);
        assert_eq!(report.popular_items[1].item_id, tea);
        assert_eq!(report.popular_items[1].total_selections, 1);
        assert!(report.popular_items[0].item.is_some());
    }

    #[tokio::test]
    async fn overview_without_students_has_zero_participation() {
        let store = MemoryStore::new();
        let rice = item(&store, "Rice", ItemCategory::Main).await;
        menu(&store, "dinner", 1, vec![rice]).await;
        let report = AnalyticsService::overview(&store, &OverviewQuery::default())
            .await
            .unwrap();
        assert_eq!(report.overview.total_menus, 1);
        assert_eq!(report.overview.average_participation, 0.0);
        assert!(report.popular_items.is_empty());
    }

    #[tokio::test]
    async fn kitchen_sheet_lists_totals() {
        let store = MemoryStore::new();
        let rice = item(&store, "Rice", ItemCategory::Main).await;
        let tea = item(&store, "Tea", ItemCategory::Beverage).await;
        let lunch = menu(&store, "lunch", 1, vec![rice, tea]).await;
        pick(&store, Uuid::new_v4(), &lunch, &[(tea, 2)]).await;
        pick(&store, Uuid::new_v4(), &lunch, &[(tea, 1), (rice, 1)]).await;

        let csv = AnalyticsService::kitchen_sheet(&store, lunch.id).await.unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "item,category,vegetarian,selections,total_quantity");
        assert_eq!(lines[1], "Tea,beverage,true,2,3");
        assert_eq!(lines[2], "Rice,main,true,1,1");
    }
}
