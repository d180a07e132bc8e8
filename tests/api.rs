use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use hostel_mess_api::{
    clock::FixedClock,
    config::Config,
    db::MemoryStore,
    models::{auth::Claims, user::{Student, UserRole}},
    routes, AppState,
};

const SECRET: &str = "test-secret";

struct TestApp {
    router: Router,
    clock: Arc<FixedClock>,
    store: Arc<MemoryStore>,
    admin: String,
}

impl TestApp {
    fn new() -> Self {
        let config = Config::from_lookup(|key| match key {
            "DATABASE_URL" => Some("postgres://unused".into()),
            "JWT_SECRET" => Some(SECRET.into()),
            _ => None,
        })
        .unwrap();
        let clock = Arc::new(FixedClock::new(Utc.with_ymd_and_hms(2024, 4, 30, 0, 0, 0).unwrap()));
        let store = Arc::new(MemoryStore::new());
        let state = AppState::new(store.clone(), clock.clone(), config);
        Self {
            router: routes::router(state),
            clock,
            store,
            admin: token(Uuid::new_v4(), UserRole::Admin),
        }
    }

    fn student(&self, name: &str, block: &str) -> (Uuid, String) {
        let id = Uuid::new_v4();
        self.store.add_student(Student {
            id,
            name: name.into(),
            email: format!("{id}@hostel.test"),
            roll_number: Some(format!("R-{name}")),
            hostel_block: Some(block.into()),
            is_active: true,
        });
        (id, token(id, UserRole::Student))
    }

    async fn call(&self, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(t) = token {
            builder = builder.header(header::AUTHORIZATION, format!("Bearer {t}"));
        }
        let request = match body {
            Some(b) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, value)
    }

    async fn item(&self, name: &str) -> String {
        let (status, body) = self
            .call(
                Method::POST,
                "/menu-items",
                Some(&self.admin),
                Some(json!({ "name": name, "category": "main" })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body["id"].as_str().unwrap().to_string()
    }

    async fn lunch(&self, date: &str, items: &[&str]) -> Value {
        let (status, body) = self
            .call(
                Method::POST,
                "/menus",
                Some(&self.admin),
                Some(json!({ "meal_type": "lunch", "date": date, "item_ids": items })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "{body}");
        body
    }
}

fn token(user_id: Uuid, role: UserRole) -> String {
    let now = Utc::now().timestamp() as usize;
    encode(
        &Header::default(),
        &Claims {
            sub: user_id.to_string(),
            role,
            exp: now + 3600,
            iat: now,
        },
        &EncodingKey::from_secret(SECRET.as_bytes()),
    )
    .unwrap()
}

fn instant(value: &Value) -> DateTime<Utc> {
    value.as_str().unwrap().parse().unwrap()
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let (status, body) = app.call(Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}

#[tokio::test]
async fn requests_without_a_valid_token_are_unauthorized() {
    let app = TestApp::new();
    let (status, _) = app.call(Method::GET, "/menus/active", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = app
        .call(Method::GET, "/menus/active", Some("not-a-jwt"), None)
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn students_cannot_manage_menus() {
    let app = TestApp::new();
    let (_, student) = app.student("Asha", "A");
    let (status, body) = app
        .call(
            Method::POST,
            "/menu-items",
            Some(&student),
            Some(json!({ "name": "Poha", "category": "main" })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn duplicate_menu_slot_conflicts() {
    let app = TestApp::new();
    let rice = app.item("Rice").await;
    app.lunch("2024-05-01", &[&rice]).await;

    let (status, body) = app
        .call(
            Method::POST,
            "/menus",
            Some(&app.admin),
            Some(json!({ "meal_type": "lunch", "date": "2024-05-01", "item_ids": [rice] })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Menu for lunch on 2024-05-01 already exists");
}

#[tokio::test]
async fn selection_follows_the_window() {
    let app = TestApp::new();
    let rice = app.item("Rice").await;
    let dal = app.item("Dal").await;
    let menu = app.lunch("2024-05-01", &[&rice, &dal]).await;
    let menu_id = menu["id"].as_str().unwrap();
    let start = instant(&menu["window"]["start"]);
    let end = instant(&menu["window"]["end"]);
    let (_, student) = app.student("Asha", "A");
    let pick = json!({ "menu_id": menu_id, "items": [{ "item_id": rice, "quantity": 2 }] });

    app.clock.set(start - Duration::minutes(1));
    let (status, body) = app
        .call(Method::POST, "/selections", Some(&student), Some(pick.clone()))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "not_yet_open");

    let (_, availability) = app
        .call(Method::GET, &format!("/menus/{menu_id}/availability"), Some(&student), None)
        .await;
    assert_eq!(availability["open"], false);

    app.clock.set(start);
    let (status, body) = app
        .call(Method::POST, "/selections", Some(&student), Some(pick.clone()))
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");

    // Replacing returns 200 and drops the earlier items.
    let (status, body) = app
        .call(
            Method::POST,
            "/selections",
            Some(&student),
            Some(json!({ "menu_id": menu_id, "items": [{ "item_id": dal }] })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"], json!([{ "item_id": dal, "quantity": 1 }]));

    app.clock.set(end);
    let (status, body) = app
        .call(Method::POST, "/selections", Some(&student), Some(pick))
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "closed");

    let (status, body) = app
        .call(Method::GET, &format!("/selections/menu/{menu_id}"), Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["items"][0]["item_id"], json!(dal));
}

#[tokio::test]
async fn foreign_items_and_bad_quantities_are_bad_requests() {
    let app = TestApp::new();
    let rice = app.item("Rice").await;
    let kheer = app.item("Kheer").await;
    let menu = app.lunch("2024-05-01", &[&rice]).await;
    app.clock.set(instant(&menu["window"]["start"]));
    let (_, student) = app.student("Asha", "A");

    for items in [
        json!([{ "item_id": kheer }]),
        json!([{ "item_id": rice, "quantity": 6 }]),
        json!([]),
    ] {
        let (status, _) = app
            .call(
                Method::POST,
                "/selections",
                Some(&student),
                Some(json!({ "menu_id": menu["id"], "items": items })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn closing_a_menu_locks_selections_and_blocks_deletion() {
    let app = TestApp::new();
    let rice = app.item("Rice").await;
    let menu = app.lunch("2024-05-01", &[&rice]).await;
    let menu_id = menu["id"].as_str().unwrap().to_string();
    app.clock.set(instant(&menu["window"]["start"]));
    let (_, student) = app.student("Asha", "A");
    app.call(
        Method::POST,
        "/selections",
        Some(&student),
        Some(json!({ "menu_id": menu_id, "items": [{ "item_id": rice }] })),
    )
    .await;

    let (status, body) = app
        .call(Method::POST, &format!("/menus/{menu_id}/close"), Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["locked_selections"], 1);
    assert_eq!(body["menu"]["status"], "closed");

    let (status, body) = app
        .call(
            Method::POST,
            "/selections",
            Some(&student),
            Some(json!({ "menu_id": menu_id, "items": [{ "item_id": rice }] })),
        )
        .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["reason"], "not_active");

    let (status, _) = app
        .call(Method::DELETE, &format!("/menus/{menu_id}"), Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let empty = app.lunch("2024-05-02", &[&rice]).await;
    let (status, _) = app
        .call(
            Method::DELETE,
            &format!("/menus/{}", empty["id"].as_str().unwrap()),
            Some(&app.admin),
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn analytics_and_kitchen_sheet() {
    let app = TestApp::new();
    let rice = app.item("Rice").await;
    let menu = app.lunch("2024-05-01", &[&rice]).await;
    let menu_id = menu["id"].as_str().unwrap().to_string();
    app.clock.set(instant(&menu["window"]["start"]));
    let (_, asha) = app.student("Asha", "A");
    app.student("Ravi", "B");
    app.call(
        Method::POST,
        "/selections",
        Some(&asha),
        Some(json!({ "menu_id": menu_id, "items": [{ "item_id": rice, "quantity": 3 }] })),
    )
    .await;

    let (status, body) = app
        .call(Method::GET, &format!("/analytics/menu/{menu_id}"), Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["summary"]["participation_rate"], 50.0);
    assert_eq!(body["hostel_breakdown"]["A"], 1);
    assert_eq!(body["item_stats"][0]["total_quantity"], 3);

    let request = Request::builder()
        .uri(format!("/analytics/menu/{menu_id}/kitchen.csv"))
        .header(header::AUTHORIZATION, format!("Bearer {}", app.admin))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let csv = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(csv.contains("Rice,main,true,1,3"));

    let (status, body) = app
        .call(Method::GET, "/analytics/overview", Some(&app.admin), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["overview"]["total_menus"], 1);
    assert_eq!(body["overview"]["average_participation"], 50.0);
}

#[tokio::test]
async fn meal_windows_report_the_schedule() {
    let app = TestApp::new();
    let (_, student) = app.student("Asha", "A");
    let (status, body) = app
        .call(Method::GET, "/meal-windows", Some(&student), None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["timezone"], "Asia/Kolkata");
    assert_eq!(body["windows"][0]["meal_type"], "breakfast");
    assert_eq!(body["windows"][0]["opens_previous_day"], true);
}
