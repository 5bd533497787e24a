use std::sync::Arc;

use perkeval::catalog::Catalog;
use perkeval::perks::PerkEngine;
use perkeval::server::routes::route_request;
use perkeval::store::{Holding, MemoryStore};

const CATALOG: &str = r#"{
    "perks": [
        {"id": 1, "name": "Goldbug", "description": "Hoard gold.", "max_stacks": 3,
         "requirements": [{"req_type": "commodity_qty", "commodity_name": "gold", "operator": ">=", "value": 5}],
         "effects": [{"target_stat": "income", "value_mode": "flat", "value": 20}]}
    ],
    "commodities": [
        {"name": "Gold", "tags": ["metal"]}
    ]
}"#;

fn engine() -> (Arc<MemoryStore>, PerkEngine) {
    let store = Arc::new(MemoryStore::new());
    store.set_catalog(1, Catalog::from_json_str(CATALOG).expect("catalog")).expect("seed");
    store.set_holdings(1, 2, vec![Holding::new("gold", 17).priced(10.0)]).expect("seed");
    store.set_holdings(1, 3, vec![Holding::new("gold", 1).priced(10.0)]).expect("seed");
    let engine = PerkEngine::new(store.clone(), store.clone());
    (store, engine)
}

fn json(body: &str) -> serde_json::Value {
    serde_json::from_str(body).expect("response should be valid json")
}

#[test]
fn health_endpoint_returns_ok_json() {
    let (_store, engine) = engine();
    let response = route_request(&engine, "GET", "/api/health", "");
    assert_eq!(response.status_code, 200);
    assert_eq!(response.content_type, "application/json");
    assert!(response.body.contains("\"status\": \"ok\""));
}

#[test]
fn evaluate_endpoint_returns_final_values_and_matches() {
    let (_store, engine) = engine();
    let response = route_request(
        &engine,
        "POST",
        "/api/evaluate",
        r#"{"guild": 1, "user": 2, "base": {"income": 100}}"#,
    );
    assert_eq!(response.status_code, 200);

    let payload = json(&response.body);
    assert_eq!(payload["final"]["income"], 160.0);
    assert_eq!(payload["base"]["networth"], 170.0);
    assert_eq!(payload["matched_perks"][0]["perk"], "perk:1");
    assert_eq!(payload["matched_perks"][0]["stacks"], 3);
    assert_eq!(payload["matched_perks"][0]["override_mode"], "auto");
}

#[test]
fn evaluate_track_reports_activation_once() {
    let (_store, engine) = engine();
    let body = r#"{"guild": 1, "user": 2}"#;

    let first = json(&route_request(&engine, "POST", "/api/evaluate/track", body).body);
    assert_eq!(first["activated"].as_array().map(Vec::len), Some(1));
    assert_eq!(first["activated"][0]["perk"], "perk:1");
    assert!(first["announcement"]
        .as_str()
        .is_some_and(|text| text.starts_with("**PERK ACTIVATED!!**:\n**Goldbug**\n*Hoard gold.*")));

    let second = json(&route_request(&engine, "POST", "/api/evaluate/track", body).body);
    assert_eq!(second["activated"].as_array().map(Vec::len), Some(0));
    assert_eq!(second["announcement"], "");
}

#[test]
fn override_put_changes_subsequent_evaluations() {
    let (_store, engine) = engine();
    let response = route_request(
        &engine,
        "PUT",
        "/api/overrides",
        r#"{"guild": 1, "user": 3, "perk": 1, "mode": "on"}"#,
    );
    assert_eq!(response.status_code, 200);
    assert_eq!(json(&response.body)["mode"], "on");

    let evaluated = route_request(
        &engine,
        "POST",
        "/api/evaluate",
        r#"{"guild": 1, "user": 3, "base": {"income": 100}}"#,
    );
    assert_eq!(json(&evaluated.body)["final"]["income"], 120.0);
}

#[test]
fn override_put_rejects_unknown_mode() {
    let (_store, engine) = engine();
    let response = route_request(
        &engine,
        "PUT",
        "/api/overrides",
        r#"{"guild": 1, "user": 3, "perk": 1, "mode": "sometimes"}"#,
    );
    assert_eq!(response.status_code, 400);
    assert!(response.body.contains("unknown override mode"));
}

#[test]
fn catalog_endpoint_lists_perks_and_tags() {
    let (_store, engine) = engine();
    let response = route_request(&engine, "GET", "/api/catalog?guild=1", "");
    assert_eq!(response.status_code, 200);
    let payload = json(&response.body);
    assert_eq!(payload["perks"][0]["name"], "Goldbug");
    assert_eq!(payload["perks"][0]["max_stacks"], 3);
    assert_eq!(payload["tags"][0], "metal");
}

#[test]
fn ranking_endpoint_applies_minimum_and_limit() {
    let (_store, engine) = engine();
    let response = route_request(&engine, "GET", "/api/ranking?guild=1&limit=5", "");
    assert_eq!(response.status_code, 200);
    let payload = json(&response.body);
    let ranking = payload["ranking"].as_array().expect("ranking array");
    assert_eq!(ranking.len(), 1);
    assert_eq!(ranking[0]["user"], 2);
    assert_eq!(ranking[0]["networth"], 170.0);
}

#[test]
fn bad_input_is_a_400() {
    let (_store, engine) = engine();
    assert_eq!(route_request(&engine, "POST", "/api/evaluate", "{not json").status_code, 400);
    assert_eq!(route_request(&engine, "GET", "/api/ranking", "").status_code, 400);
    assert_eq!(
        route_request(&engine, "GET", "/api/ranking?guild=1&limit=many", "").status_code,
        400
    );
    assert_eq!(
        route_request(
            &engine,
            "POST",
            "/api/evaluate",
            r#"{"guild": 1, "user": 2, "base": {"luck": 1}}"#,
        )
        .status_code,
        400
    );
}

#[test]
fn store_failure_is_a_500() {
    let (store, engine) = engine();
    store.set_unavailable(true);
    let response = route_request(&engine, "POST", "/api/evaluate", r#"{"guild": 1, "user": 2}"#);
    assert_eq!(response.status_code, 500);
}

#[test]
fn unknown_route_is_a_404() {
    let (_store, engine) = engine();
    assert_eq!(route_request(&engine, "GET", "/api/unknown", "").status_code, 404);
}
