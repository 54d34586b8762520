use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use pickup_tracker::api::rest::router;
use pickup_tracker::simulation::{self, StrategyKind};
use pickup_tracker::state::AppState;
use pickup_tracker::store::JsonStore;
use serde_json::{json, Value};
use tower::ServiceExt;

fn seed() -> Value {
    json!({
        "pickers": [
            { "id": 1, "name": "Karim" },
            { "id": 2, "name": "Samia", "locations": [] },
            {
                "id": 3,
                "name": "Nadir",
                "locations": [
                    { "lat": 36.70, "lng": 3.05, "timestamp": "2024-06-01T09:00:00.000Z" },
                    { "lat": 36.71, "lng": 3.06, "timestamp": "2024-06-01T09:00:05.000Z" }
                ]
            }
        ],
        "pickerRoutes": {
            "1": [
                { "lat": 36.70, "lng": 3.05 },
                { "lat": 36.71, "lng": 3.06 }
            ]
        },
        "users": [
            { "id": 7, "name": "Lina", "totalPoints": 0, "bins": [1, 3] },
            { "id": 8, "name": "Omar", "totalPoints": 5 }
        ],
        "bins": [
            { "id": 1, "type": "Recyclable" },
            { "id": 2, "type": "recyclable" },
            { "id": 3, "type": "Organic" },
            { "id": 4, "type": "Glass" }
        ],
        "pickups": [
            { "id": 42, "userId": 7, "status": "pending" },
            { "id": 43, "userId": 7, "status": "pending" },
            { "id": 50, "userId": 999, "status": "pending" }
        ],
        "pointsHistory": []
    })
}

fn setup_from(data: Value, kind: StrategyKind) -> (axum::Router, Arc<AppState>) {
    let store = JsonStore::in_memory(data).unwrap();
    let state = Arc::new(AppState::new(store, simulation::build(kind), 16));
    (router(state.clone()), state)
}

fn setup_with(kind: StrategyKind) -> (axum::Router, Arc<AppState>) {
    setup_from(seed(), kind)
}

/// Records that only loosely follow the usual field conventions.
fn loose_seed() -> Value {
    json!({
        "pickers": [
            { "id": 4, "locations": [{ "lat": 36.72 }] },
            { "id": "5", "locations": [{ "lat": 36.73, "lng": 3.07, "note": "gate" }] }
        ],
        "users": [
            { "id": 7, "totalPoints": 0, "bins": ["1", 3] },
            { "id": 9, "totalPoints": null }
        ],
        "bins": [
            { "id": 1, "type": "Glass", "userId": "3" },
            { "id": 2, "type": "Glass" },
            { "id": 3, "type": null }
        ],
        "pickups": [
            { "id": 60, "userId": "7", "status": "pending" },
            { "id": 61, "userId": 9 },
            { "id": 62, "userId": "nobody", "status": "pending" }
        ],
        "pointsHistory": [{ "id": 1, "userId": "7", "points": 3 }]
    })
}

fn setup() -> (axum::Router, Arc<AppState>) {
    setup_with(StrategyKind::Route)
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

fn get_request(uri: &str) -> Request<Body> {
    empty_request("GET", uri)
}

async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn call(app: &axum::Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

#[tokio::test]
async fn health_reports_collection_sizes() {
    let (app, _state) = setup();
    let (status, body) = call(&app, get_request("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["strategy"], "route");
    assert_eq!(body["pickers"], 3);
    assert_eq!(body["pickups"], 3);
    assert_eq!(body["points_history"], 0);
}

#[tokio::test]
async fn route_poll_walks_waypoints_and_wraps() {
    let (app, state) = setup();

    let (status, first) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["pickerId"], "1");
    assert_eq!(first["lat"], 36.70);
    assert_eq!(first["lng"], 3.05);
    assert!(first["updatedAt"].is_string());

    let (_, second) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(second["lat"], 36.71);
    assert_eq!(second["lng"], 3.06);

    let (_, third) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(third["lat"], 36.70);

    let snapshot = state.store.snapshot().await;
    let picker = &snapshot.collection("pickers").unwrap()[0];
    assert_eq!(picker["pickerLocation"]["label"], "Moving to user - Step 1/2");
    assert_eq!(picker["pickerLocation"]["lat"], 36.70);
}

#[tokio::test]
async fn route_poll_without_route_is_404_with_error_key() {
    let (app, _state) = setup();
    let (status, body) = call(&app, get_request("/pickers/2/location")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Route not found for this picker");
}

#[tokio::test]
async fn reset_returns_picker_to_first_waypoint() {
    let (app, _state) = setup();

    call(&app, get_request("/pickers/1/location")).await;
    let (status, body) = call(&app, empty_request("POST", "/pickers/1/resetRoute")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Route reset for picker 1");

    let (_, fix) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(fix["lat"], 36.70);
    assert_eq!(fix["lng"], 3.05);
}

#[tokio::test]
async fn persisted_cursor_is_visible_in_meta() {
    let (app, _state) = setup_with(StrategyKind::RoutePersisted);

    call(&app, get_request("/pickers/1/location")).await;
    let (status, meta) = call(&app, get_request("/meta")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(meta["routeSteps"]["1"], 1);
}

#[tokio::test]
async fn history_walk_appends_and_latest_follows() {
    let (app, _state) = setup_with(StrategyKind::History);

    let (status, record) = call(&app, get_request("/pickers/2/location")).await;
    assert_eq!(status, StatusCode::OK);
    let lat = record["lat"].as_f64().unwrap();
    assert!((lat - 36.7538).abs() <= 0.0004 + 1e-9);

    let (_, history) = call(&app, get_request("/pickers/2/locations")).await;
    assert_eq!(history.as_array().unwrap().len(), 1);

    let (_, latest) = call(&app, get_request("/pickers/2/location/latest")).await;
    assert_eq!(latest, record);
}

#[tokio::test]
async fn random_walk_overwrites_coordinates() {
    let (app, state) = setup_with(StrategyKind::RandomWalk);

    let (status, body) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], 1);
    assert_eq!(body["pickerId"], 1);

    let snapshot = state.store.snapshot().await;
    let picker = &snapshot.collection("pickers").unwrap()[0];
    assert_eq!(picker["lat"], body["lat"]);
    assert_eq!(picker["lng"], body["lng"]);

    let (status, body) = call(&app, get_request("/pickers/404/location")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Picker not found");
}

#[tokio::test]
async fn reset_is_not_mounted_for_random_walks() {
    let (app, _state) = setup_with(StrategyKind::History);
    let (status, _) = call(&app, empty_request("POST", "/pickers/1/resetRoute")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn location_history_queries() {
    let (app, _state) = setup();

    let (status, body) = call(&app, get_request("/pickers/3/locations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = call(&app, get_request("/pickers/3/location/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["lat"], 36.71);

    let (status, body) = call(&app, get_request("/pickers/1/locations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!([]));

    let (status, body) = call(&app, get_request("/pickers/1/location/latest")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "No location data found");

    let (status, body) = call(&app, get_request("/pickers/99/locations")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Picker not found");
}

#[tokio::test]
async fn user_scoped_queries() {
    let (app, _state) = setup();

    let (_, pickups) = call(&app, get_request("/users/7/pickups")).await;
    assert_eq!(pickups.as_array().unwrap().len(), 2);

    let (_, bins) = call(&app, get_request("/users/7/bins")).await;
    let bin_ids: Vec<i64> = bins
        .as_array()
        .unwrap()
        .iter()
        .map(|bin| bin["id"].as_i64().unwrap())
        .collect();
    assert_eq!(bin_ids, vec![1, 3]);

    for uri in [
        "/users/8/bins",
        "/users/999/bins",
        "/users/999/pickups",
        "/users/abc/pickups",
        "/users/7/pointsHistory",
    ] {
        let (status, body) = call(&app, get_request(uri)).await;
        assert_eq!(status, StatusCode::OK, "{uri}");
        assert_eq!(body, json!([]), "{uri}");
    }
}

#[tokio::test]
async fn bin_type_filter_is_case_insensitive() {
    let (app, _state) = setup();

    let (_, upper) = call(&app, get_request("/bins?type=Recyclable")).await;
    let (_, lower) = call(&app, get_request("/bins?type=recyclable")).await;
    assert_eq!(upper, lower);
    assert_eq!(upper.as_array().unwrap().len(), 2);

    let (_, all) = call(&app, get_request("/bins")).await;
    assert_eq!(all.as_array().unwrap().len(), 4);
}

#[tokio::test]
async fn confirming_pickup_awards_default_points() {
    let (app, _state) = setup();

    let (status, body) = call(&app, json_request("POST", "/pickups/42/confirm", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Pickup confirmed and points updated");

    let (_, user) = call(&app, get_request("/users/7")).await;
    assert_eq!(user["totalPoints"], 10);

    let (_, history) = call(&app, get_request("/users/7/pointsHistory")).await;
    let history = history.as_array().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0]["points"], 10);
    assert_eq!(history[0]["source"], "pickup_completed");

    let (_, pickup) = call(&app, get_request("/pickups/42")).await;
    assert_eq!(pickup["status"], "done");
    assert_eq!(pickup["weight_verified"], true);
    assert_eq!(pickup["picker_weight_kg"], 0.0);
}

#[tokio::test]
async fn confirming_pickup_accepts_weight_and_points() {
    let (app, _state) = setup();

    let (status, _) = call(
        &app,
        json_request("POST", "/pickups/43/confirm", json!({ "weightKg": 4.2, "points": 25 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, pickup) = call(&app, get_request("/pickups/43")).await;
    assert_eq!(pickup["user_weight_kg"], 4.2);

    let (_, user) = call(&app, get_request("/users/7")).await;
    assert_eq!(user["totalPoints"], 25);
}

#[tokio::test]
async fn confirming_without_body_uses_defaults() {
    let (app, _state) = setup();

    let (status, _) = call(&app, empty_request("POST", "/pickups/42/confirm")).await;
    assert_eq!(status, StatusCode::OK);

    let (_, user) = call(&app, get_request("/users/7")).await;
    assert_eq!(user["totalPoints"], 10);
}

#[tokio::test]
async fn confirming_for_unknown_user_changes_no_points() {
    let (app, state) = setup();
    let users_before = state.store.snapshot().await.collection("users").cloned();

    let (status, body) = call(&app, json_request("POST", "/pickups/50/confirm", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Pickup confirmed and points updated");

    let snapshot = state.store.snapshot().await;
    assert_eq!(snapshot.collection("users").cloned(), users_before);
    assert_eq!(snapshot.collection("pointsHistory"), Some(&Vec::new()));
}

#[tokio::test]
async fn confirming_missing_pickup_is_404() {
    let (app, _state) = setup();

    for uri in ["/pickups/1000/confirm", "/pickups/abc/confirm"] {
        let (status, body) = call(&app, json_request("POST", uri, json!({}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["message"], "Pickup not found");
    }
}

#[tokio::test]
async fn points_history_sums_to_total() {
    let (app, _state) = setup();

    call(&app, json_request("POST", "/pickups/42/confirm", json!({ "points": 15 }))).await;
    call(&app, json_request("POST", "/pickups/43/confirm", json!({}))).await;

    let (_, user) = call(&app, get_request("/users/7")).await;
    let (_, history) = call(&app, get_request("/users/7/pointsHistory")).await;
    let sum: i64 = history
        .as_array()
        .unwrap()
        .iter()
        .map(|entry| entry["points"].as_i64().unwrap())
        .sum();

    assert_eq!(user["totalPoints"], 25);
    assert_eq!(sum, 25);
}

#[tokio::test]
async fn generic_crud_round_trip() {
    let (app, _state) = setup();

    let response = app
        .clone()
        .oneshot(json_request("POST", "/bins", json!({ "type": "Metal" })))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);
    let created = body_json(response).await;
    assert_eq!(created["id"], 5);

    let (status, patched) = call(
        &app,
        json_request("PATCH", "/bins/5", json!({ "capacityLiters": 90 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(patched["type"], "Metal");
    assert_eq!(patched["capacityLiters"], 90);

    let (status, _) = call(&app, empty_request("DELETE", "/bins/5")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, get_request("/bins/5")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, json!({}));

    let (status, _) = call(&app, get_request("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn generic_listing_paginates_with_total_header() {
    let (app, _state) = setup();

    let response = app
        .clone()
        .oneshot(get_request("/pickups?userId=7&_page=1&_limit=1"))
        .await
        .unwrap();
    assert_eq!(response.headers()["x-total-count"], "2");
    let body = body_json(response).await;
    assert_eq!(body.as_array().unwrap().len(), 1);
    assert_eq!(body[0]["id"], 42);
}

#[tokio::test]
async fn jsonp_wraps_json_responses() {
    let (app, _state) = setup();

    let response = app
        .clone()
        .oneshot(get_request("/bins?type=glass&callback=handleBins"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response.headers()["content-type"].to_str().unwrap().to_string();
    assert!(content_type.starts_with("text/javascript"));

    let body = body_string(response).await;
    assert!(body.starts_with("/**/ typeof handleBins === 'function' && handleBins(["));
    assert!(body.ends_with(");"));
}

#[tokio::test]
async fn responses_disable_caching() {
    let (app, _state) = setup();
    let response = app.oneshot(get_request("/bins")).await.unwrap();
    assert_eq!(response.headers()["cache-control"], "no-cache");
}

#[tokio::test]
async fn metrics_count_polls_and_confirmations() {
    let (app, _state) = setup();

    call(&app, get_request("/pickers/1/location")).await;
    call(&app, json_request("POST", "/pickups/42/confirm", json!({}))).await;

    let response = app.clone().oneshot(get_request("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_string(response).await;
    assert!(body.contains("location_polls_total"));
    assert!(body.contains("pickups_confirmed_total"));
    assert!(body.contains("points_awarded_total 10"));
}

#[tokio::test]
async fn location_events_are_broadcast() {
    let (app, state) = setup();
    let mut rx = state.location_events_tx.subscribe();

    call(&app, get_request("/pickers/1/location")).await;

    let event = rx.recv().await.unwrap();
    assert_eq!(event.picker_id, "1");
    assert_eq!(event.lat, 36.70);
    assert_eq!(event.lng, 3.05);
}

#[tokio::test]
async fn bins_of_any_shape_are_listed_as_stored() {
    let (app, _state) = setup_from(loose_seed(), StrategyKind::Route);

    let (status, all) = call(&app, get_request("/bins")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(all, loose_seed()["bins"]);

    let (_, glass) = call(&app, get_request("/bins?type=glass")).await;
    let ids: Vec<i64> = glass
        .as_array()
        .unwrap()
        .iter()
        .map(|bin| bin["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![1, 2]);

    let (_, owned) = call(&app, get_request("/users/7/bins")).await;
    assert_eq!(owned, json!([loose_seed()["bins"][0], loose_seed()["bins"][2]]));
}

#[tokio::test]
async fn user_queries_include_loosely_typed_records() {
    let (app, _state) = setup_from(loose_seed(), StrategyKind::Route);

    let (status, created) = call(
        &app,
        json_request("POST", "/pointsHistory", json!({ "userId": 7, "points": 5 })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let (_, history) = call(&app, get_request("/users/7/pointsHistory")).await;
    assert_eq!(history, json!([{ "id": 1, "userId": "7", "points": 3 }, created]));

    let (_, pickups) = call(&app, get_request("/users/7/pickups")).await;
    assert_eq!(pickups, json!([{ "id": 60, "userId": "7", "status": "pending" }]));
}

#[tokio::test]
async fn partial_location_records_are_returned_as_stored() {
    let (app, _state) = setup_from(loose_seed(), StrategyKind::Route);

    let (status, history) = call(&app, get_request("/pickers/4/locations")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(history, json!([{ "lat": 36.72 }]));

    let (status, latest) = call(&app, get_request("/pickers/4/location/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest, json!({ "lat": 36.72 }));

    let (status, latest) = call(&app, get_request("/pickers/5/location/latest")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(latest["note"], "gate");
}

#[tokio::test]
async fn confirming_tolerates_loosely_typed_owners_and_balances() {
    let (app, _state) = setup_from(loose_seed(), StrategyKind::Route);

    let (status, _) = call(&app, json_request("POST", "/pickups/60/confirm", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, user) = call(&app, get_request("/users/7")).await;
    assert_eq!(user["totalPoints"], 10);

    let (status, _) = call(&app, json_request("POST", "/pickups/61/confirm", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, user) = call(&app, get_request("/users/9")).await;
    assert_eq!(user["totalPoints"], 10);
    let (_, pickup) = call(&app, get_request("/pickups/61")).await;
    assert_eq!(pickup["status"], "done");

    let (status, _) = call(&app, json_request("POST", "/pickups/62/confirm", json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    let (_, pickup) = call(&app, get_request("/pickups/62")).await;
    assert_eq!(pickup["status"], "done");
}

#[tokio::test]
async fn confirming_reads_each_body_field_on_its_own() {
    let (app, _state) = setup();

    let (status, _) = call(
        &app,
        json_request("POST", "/pickups/42/confirm", json!({ "weightKg": 4.2, "points": 2.5 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, pickup) = call(&app, get_request("/pickups/42")).await;
    assert_eq!(pickup["picker_weight_kg"], 4.2);
    let (_, user) = call(&app, get_request("/users/7")).await;
    assert_eq!(user["totalPoints"], 2.5);

    let (status, _) = call(
        &app,
        json_request("POST", "/pickups/43/confirm", json!({ "weightKg": 1.5, "points": "lots" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, pickup) = call(&app, get_request("/pickups/43")).await;
    assert_eq!(pickup["picker_weight_kg"], 1.5);
    let (_, user) = call(&app, get_request("/users/7")).await;
    assert_eq!(user["totalPoints"], 12.5);
}

#[tokio::test]
async fn history_ids_stay_unique_alongside_generic_creates() {
    let (app, state) = setup();

    for _ in 0..50 {
        let (status, _) = call(&app, json_request("POST", "/pickups/42/confirm", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = call(
            &app,
            json_request("POST", "/pointsHistory", json!({ "userId": 8, "points": 1 })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let (status, _) = call(&app, json_request("POST", "/pickups/43/confirm", json!({}))).await;
        assert_eq!(status, StatusCode::OK);
    }

    let snapshot = state.store.snapshot().await;
    let entries = snapshot.collection("pointsHistory").unwrap();
    let ids: std::collections::HashSet<i64> = entries
        .iter()
        .map(|entry| entry["id"].as_i64().unwrap())
        .collect();
    assert_eq!(entries.len(), 150);
    assert_eq!(ids.len(), entries.len());
}

#[tokio::test]
async fn failed_persist_does_not_advance_route() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    std::fs::write(&path, serde_json::to_vec(&seed()).unwrap()).unwrap();

    let store = JsonStore::open(&path).await.unwrap();
    let state = Arc::new(AppState::new(store, simulation::build(StrategyKind::Route), 16));
    let app = router(state.clone());

    std::fs::remove_dir_all(dir.path()).unwrap();
    let (status, _) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    std::fs::create_dir_all(dir.path()).unwrap();
    let (status, first) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["lat"], 36.70);

    let (_, second) = call(&app, get_request("/pickers/1/location")).await;
    assert_eq!(second["lat"], 36.71);
}

#[tokio::test]
async fn reset_of_picker_without_route_leaves_meta_clean() {
    let (app, _state) = setup_with(StrategyKind::RoutePersisted);

    let (status, body) = call(&app, empty_request("POST", "/pickers/77/resetRoute")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Route reset for picker 77");

    let (_, meta) = call(&app, get_request("/meta")).await;
    assert!(meta["routeSteps"].get("77").is_none());
}
