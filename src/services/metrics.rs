use lazy_static::lazy_static;
use prometheus::{register_counter_vec, register_int_counter, CounterVec, IntCounter};

lazy_static! {
    // ── Menu lifecycle ──────────────────────────────────────────────────────
    pub static ref MENUS_CREATED_COUNTER: CounterVec = register_counter_vec!(
        "mess_menus_created_total",
        "Menus published, by meal type",
        &["meal_type"]
    ).unwrap();

    pub static ref MENUS_CLOSED_COUNTER: IntCounter = register_int_counter!(
        "mess_menus_closed_total",
        "Menus moved to closed"
    ).unwrap();

    // ── Selections ──────────────────────────────────────────────────────────
    pub static ref SELECTIONS_COUNTER: CounterVec = register_counter_vec!(
        "mess_selections_submitted_total",
        "Accepted selection submissions, by outcome (created or replaced)",
        &["outcome"]
    ).unwrap();

    pub static ref GATE_REJECTIONS_COUNTER: CounterVec = register_counter_vec!(
        "mess_gate_rejections_total",
        "Selection attempts refused by the menu gate, by reason",
        &["reason"]
    ).unwrap();

    pub static ref SELECTIONS_LOCKED_COUNTER: IntCounter = register_int_counter!(
        "mess_selections_locked_total",
        "Selections frozen against further edits"
    ).unwrap();
}
