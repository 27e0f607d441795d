use super::common::*;
use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, Request, StatusCode};
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use crate::roster::domain::{Gender, NewClub, UnitGender};
use crate::roster::eligibility::ReferenceDatePolicy;
use crate::roster::router::{self, YearQuery};
use crate::roster::RosterServices;

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .expect("request builds")
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).expect("request builds")
}

#[tokio::test]
async fn club_and_unit_routes_round_trip() {
    let fixture = fixture();
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            "/api/v1/clubs",
            json!({ "name": "Hillside", "description": "Tuesday pack" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let club = read_json_body(response).await;
    let club_id = club["id"].as_str().expect("club id").to_string();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/clubs/{club_id}/units"),
            json!({
                "name": "Otters",
                "gender": "mixed",
                "age_range": { "min": 8, "max": 10 },
                "capacity": 12
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .oneshot(get(&format!("/api/v1/clubs/{club_id}/units")))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let units = read_json_body(response).await;
    assert_eq!(units[0]["name"], json!("Otters"));
    assert_eq!(units[0]["club_id"], json!(club_id));
}

#[tokio::test]
async fn duplicate_club_is_a_conflict() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(json_request(
            "POST",
            "/api/v1/clubs",
            json!({ "name": "LAKESIDE SCOUTS" }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
    let payload = read_json_body(response).await;
    assert!(payload["error"]
        .as_str()
        .unwrap_or_default()
        .contains("already exists"));
}

#[tokio::test]
async fn missing_member_is_not_found() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(get("/api/v1/members/member-unknown"))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_member_is_unprocessable() {
    let fixture = fixture();
    let response = fixture
        .router()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/clubs/{}/members", fixture.club.id),
            json!({
                "first_name": "",
                "last_name": "Lovelace",
                "birth_date": "2016-03-09",
                "gender": "female"
            }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn allocation_route_reports_the_outcome() {
    let fixture = fixture();
    let otters = fixture.unit("Otters", UnitGender::Mixed, (8, 10), 4);
    let ada = fixture.member("Ada", date(2016, 3, 9), Gender::Female, None);

    let response = fixture
        .router()
        .oneshot(
            Request::post(format!("/api/v1/members/{}/allocation?year=2025", ada.id))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["outcome"], json!("assigned"));
    assert_eq!(payload["reference_age"], json!(9));
    assert_eq!(payload["unit"]["unit_id"], json!(otters.id.as_str()));
}

#[tokio::test]
async fn allocation_without_a_matching_unit_is_unprocessable() {
    let fixture = fixture();
    fixture.unit("Otters", UnitGender::Mixed, (8, 10), 4);
    let linus = fixture.member("Linus", date(2009, 12, 28), Gender::Male, None);

    let response = router::allocate_member(
        State(fixture.services.clone()),
        Path(linus.id.to_string()),
        Query(YearQuery { year: Some(YEAR) }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn capacity_tasks_are_listed_and_resolved_over_http() {
    let fixture = fixture();
    let otters = fixture.unit("Otters", UnitGender::Mixed, (8, 10), 1);
    fixture.member("Grace", date(2016, 4, 1), Gender::Female, Some(&otters.id));
    let ada = fixture.member("Ada", date(2016, 3, 9), Gender::Female, None);
    fixture
        .services
        .allocation
        .allocate(&ada.id, YEAR, today())
        .expect("allocation runs");

    let router = fixture.router();
    let response = router
        .clone()
        .oneshot(get(&format!(
            "/api/v1/clubs/{}/tasks?status=open",
            fixture.club.id
        )))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let tasks = read_json_body(response).await;
    assert_eq!(tasks.as_array().map(Vec::len), Some(1));
    assert_eq!(tasks[0]["kind"]["kind"], json!("capacity_exceeded"));
    let task_id = tasks[0]["id"].as_str().expect("task id").to_string();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/tasks/{task_id}/resolve"),
            json!({ "note": "opened a second otter lodge" }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
    let resolved = read_json_body(response).await;
    assert_eq!(resolved["status"], json!("resolved"));

    let response = router
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/tasks/{task_id}/resolve"),
            json!({}),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn manual_assignment_to_a_full_unit_conflicts() {
    let fixture = fixture();
    let otters = fixture.unit("Otters", UnitGender::Mixed, (8, 10), 1);
    fixture.member("Grace", date(2016, 4, 1), Gender::Female, Some(&otters.id));
    let ada = fixture.member("Ada", date(2016, 3, 9), Gender::Female, None);

    let response = fixture
        .router()
        .oneshot(json_request(
            "PUT",
            &format!("/api/v1/members/{}/unit", ada.id),
            json!({ "unit_id": otters.id, "year": YEAR }),
        ))
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn member_age_route_uses_the_reference_day() {
    let fixture = fixture();
    let tom = fixture.member("Tom", date(2016, 6, 2), Gender::Male, None);

    let response = router::member_age(
        State(fixture.services.clone()),
        Path(tom.id.to_string()),
        Query(YearQuery { year: Some(YEAR) }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::OK);
    let payload = read_json_body(response).await;
    assert_eq!(payload["reference_date"], json!("2025-06-01"));
    assert_eq!(payload["reference_age"], json!(8));
}

#[tokio::test]
async fn csv_import_route_returns_the_report() {
    let fixture = fixture();
    fixture.unit("Otters", UnitGender::Mixed, (8, 10), 4);
    let csv = "First Name,Last Name,Birth Date,Gender,Email,Unit\n\
Ada,Lovelace,2016-03-09,F,,Otters\n\
Bob,Builder,someday,M,,\n";

    let response = fixture
        .router()
        .oneshot(
            Request::post(format!("/api/v1/clubs/{}/members/import", fixture.club.id))
                .header(header::CONTENT_TYPE, "text/csv")
                .body(Body::from(csv))
                .expect("request builds"),
        )
        .await
        .expect("route executes");

    assert_eq!(response.status(), StatusCode::OK);
    let report = read_json_body(response).await;
    assert_eq!(report["imported"].as_array().map(Vec::len), Some(1));
    assert_eq!(report["rejected"][0]["line"], json!(3));
}

#[tokio::test]
async fn event_participation_routes() {
    let fixture = fixture();
    let ada = fixture.member("Ada", date(2016, 3, 9), Gender::Female, None);
    let router = fixture.router();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/clubs/{}/events", fixture.club.id),
            json!({
                "title": "Autumn hike",
                "starts_on": "2025-10-11",
                "ends_on": "2025-10-11",
                "age_range": { "min": 8, "max": 10 }
            }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);
    let event = read_json_body(response).await;
    let event_id = event["id"].as_str().expect("event id").to_string();

    let response = router
        .clone()
        .oneshot(json_request(
            "POST",
            &format!("/api/v1/events/{event_id}/participants"),
            json!({ "member_id": ada.id }),
        ))
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = router
        .clone()
        .oneshot(get(&format!("/api/v1/events/{event_id}/eligible-members")))
        .await
        .expect("route executes");
    let eligible = read_json_body(response).await;
    assert_eq!(eligible[0]["registered"], json!(true));

    let response = router
        .oneshot(
            Request::delete(format!("/api/v1/events/{event_id}/participants/{}", ada.id))
                .body(Body::empty())
                .expect("request builds"),
        )
        .await
        .expect("route executes");
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn unavailable_store_maps_to_service_unavailable() {
    let services = Arc::new(RosterServices::new(
        Arc::new(UnavailableStore),
        Arc::new(MemoryNotifications::default()),
        ReferenceDatePolicy::default(),
    ));

    let response = router::create_club(
        State(services),
        axum::Json(NewClub {
            name: "Hillside".to_string(),
            description: None,
        }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn notification_failures_map_to_internal_errors() {
    let services = Arc::new(RosterServices::new(
        Arc::new(crate::roster::memory::InMemoryRosterStore::default()),
        Arc::new(OfflineNotifications),
        ReferenceDatePolicy::default(),
    ));
    let club = services
        .roster
        .create_club(NewClub {
            name: "Hillside".to_string(),
            description: None,
        })
        .expect("club");
    services
        .roster
        .create_unit(
            &club.id,
            crate::roster::domain::NewUnit {
                name: "Otters".to_string(),
                gender: UnitGender::Mixed,
                age_range: crate::roster::domain::AgeRange::new(8, 10),
                capacity: 4,
            },
        )
        .expect("unit");
    let ada = services
        .roster
        .register_member(
            &club.id,
            new_member("Ada", date(2016, 3, 9), Gender::Female, None),
            today(),
        )
        .expect("member");

    let response = router::allocate_member(
        State(services),
        Path(ada.id.to_string()),
        Query(YearQuery { year: Some(YEAR) }),
    )
    .await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
}
