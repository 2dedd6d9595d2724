use actix_web::{
    http::{header::ContentType, StatusCode},
    test::TestRequest,
    web,
    web::ServiceConfig,
};
use chrono::{Duration, Utc};
use pds_common::GeoPoint;
use pharmacy_dispatch_engine::{
    db_types::{
        DispatchTarget,
        EmergencyOrder,
        EmergencyStatus,
        NearbyPharmacy,
        Pharmacy,
        PharmacyResponse,
        Priority,
        Product,
        ResponseDecision,
        StockItem,
    },
    dispatch::DispatchPolicy,
    traits::DispatchError,
    EmergencyOrderApi,
};
use serde_json::json;

use super::{
    helpers::{get_request, json, post_request, send_request, with_identity, As},
    mocks::MockBackend,
};
use crate::{
    identity::USER_ID_HEADER,
    routes::{
        CancelEmergencyOrderRoute,
        CreateEmergencyOrderRoute,
        EmergencyOrderByIdRoute,
        FulfillEmergencyOrderRoute,
        MyEmergencyOrdersRoute,
        PharmacyEmergencyOrdersRoute,
        RespondToEmergencyOrderRoute,
    },
    server::json_config,
};

const REQUESTER: i64 = 5;
const PANADOL: i64 = 3;
const NEAR: i64 = 7;
const FAR: i64 = 8;

fn configure(backend: MockBackend) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        let api = EmergencyOrderApi::new(backend, DispatchPolicy::default());
        cfg.service(CreateEmergencyOrderRoute::<MockBackend>::new())
            .service(EmergencyOrderByIdRoute::<MockBackend>::new())
            .service(RespondToEmergencyOrderRoute::<MockBackend>::new())
            .service(CancelEmergencyOrderRoute::<MockBackend>::new())
            .service(FulfillEmergencyOrderRoute::<MockBackend>::new())
            .service(MyEmergencyOrdersRoute::<MockBackend>::new())
            .service(PharmacyEmergencyOrdersRoute::<MockBackend>::new())
            .app_data(web::Data::new(api))
            .app_data(json_config());
    }
}

fn origin() -> GeoPoint {
    GeoPoint::new(35.9, 31.9).unwrap()
}

fn order(id: i64, status: EmergencyStatus) -> EmergencyOrder {
    let now = Utc::now();
    EmergencyOrder {
        id,
        requester_id: REQUESTER,
        product_id: PANADOL,
        requested_medicine_name: "Panadol Extra".into(),
        additional_notes: String::new(),
        delivery_address: "12 Rainbow St, Amman".into(),
        location: origin(),
        status,
        targeted_pharmacy_ids: vec![NEAR, FAR],
        dispatch_targets: vec![
            DispatchTarget { pharmacy_id: NEAR, score: 95.0, distance: 500.0 },
            DispatchTarget { pharmacy_id: FAR, score: 48.0, distance: 2000.0 },
        ],
        responses: vec![],
        accepted_pharmacy_id: None,
        priority: Priority::Normal,
        response_deadline: now + Duration::minutes(15),
        created_at: now,
        updated_at: now,
    }
}

fn accepted_by(id: i64, pharmacy_id: i64) -> EmergencyOrder {
    let mut order = order(id, EmergencyStatus::Accepted);
    order.accepted_pharmacy_id = Some(pharmacy_id);
    order.responses.push(PharmacyResponse {
        pharmacy_id,
        decision: ResponseDecision::Accepted,
        rejection_reason: None,
        responded_at: Utc::now(),
    });
    order
}

fn nearby(id: i64, distance: f64, rating: f64, quantity: i64) -> NearbyPharmacy {
    let pharmacy = Pharmacy {
        id,
        name: format!("Pharmacy {id}"),
        location: origin(),
        is_active: true,
        average_rating: rating,
        stock: vec![StockItem { product_id: PANADOL, quantity, price: 2.5 }],
    };
    NearbyPharmacy { pharmacy, distance }
}

fn directory_with_stock(backend: &mut MockBackend) {
    backend.expect_find_product_by_name().returning(|_| {
        Ok(Some(Product { id: PANADOL, name: "Panadol Extra".into(), sub_category: "Painkillers".into() }))
    });
    backend
        .expect_active_pharmacies_near()
        .returning(|_, _| Ok(vec![nearby(NEAR, 500.0, 5.0, 10), nearby(FAR, 2000.0, 3.0, 0)]));
}

fn create_body() -> serde_json::Value {
    json!({
        "requestedMedicineName": "panadol",
        "deliveryAddress": "12 Rainbow St, Amman",
        "priority": "high",
        "location": {"type": "Point", "coordinates": [35.9, 31.9]}
    })
}

#[actix_web::test]
async fn create_order_without_identity() {
    let _ = env_logger::try_init().ok();
    let (status, body) =
        post_request(As::Anonymous, "/emergency-orders", create_body(), configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(json(&body)["error"].as_str().unwrap().contains("No caller identity"));
}

#[actix_web::test]
async fn bad_identity_header() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::get().uri("/my/emergency-orders").insert_header((USER_ID_HEADER, "alice"));
    let (status, _) = send_request(req, configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn create_order() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    directory_with_stock(&mut backend);
    backend.expect_fetch_user_location().never();
    backend
        .expect_insert_emergency_order()
        .withf(|o| o.requester_id == REQUESTER && o.targets.len() == 1 && o.targets[0].pharmacy_id == NEAR)
        .returning(|o| {
            let mut order = order(1, EmergencyStatus::Pending);
            order.targeted_pharmacy_ids = o.targets.iter().map(|t| t.pharmacy_id).collect();
            order.dispatch_targets = o
                .targets
                .iter()
                .map(|t| DispatchTarget { pharmacy_id: t.pharmacy_id, score: t.score.total(), distance: t.distance })
                .collect();
            order.priority = o.priority;
            order.response_deadline = o.response_deadline;
            Ok(order)
        });
    let (status, body) =
        post_request(As::User(REQUESTER), "/emergency-orders", create_body(), configure(backend)).await;
    assert_eq!(status, StatusCode::CREATED);
    let body = json(&body);
    assert_eq!(body["id"], 1);
    assert_eq!(body["status"], "pending");
    assert_eq!(body["priority"], "high");
    assert_eq!(body["requestedMedicineName"], "Panadol Extra");
    assert_eq!(body["targetedPharmacyIds"], json!([NEAR]));
    assert_eq!(body["dispatchTargets"][0]["pharmacyId"], NEAR);
    assert_eq!(body["dispatchTargets"][0]["distance"], 500.0);
    assert_eq!(body["dispatchTargets"][0]["score"], 95.0);
    assert_eq!(body["location"]["coordinates"], json!([35.9, 31.9]));
}

#[actix_web::test]
async fn create_order_validation() {
    let _ = env_logger::try_init().ok();
    let mut body = create_body();
    body["requestedMedicineName"] = json!("   ");
    let (status, body) = post_request(As::User(REQUESTER), "/emergency-orders", body, configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json(&body)["error"], "Invalid request. requestedMedicineName is required");

    let mut body = create_body();
    body["responseTimeoutMinutes"] = json!(0);
    let (status, _) = post_request(As::User(REQUESTER), "/emergency-orders", body, configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn create_order_malformed_body() {
    let _ = env_logger::try_init().ok();
    let req = TestRequest::post()
        .uri("/emergency-orders")
        .insert_header(ContentType::json())
        .set_payload(r#"{"requestedMedicineName": "#);
    let (status, body) = send_request(with_identity(req, As::User(REQUESTER)), configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json(&body)["error"].as_str().unwrap().starts_with("Could not read request body"));
}

#[actix_web::test]
async fn create_order_nothing_in_stock() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_find_product_by_name().returning(|_| {
        Ok(Some(Product { id: PANADOL, name: "Panadol Extra".into(), sub_category: "Painkillers".into() }))
    });
    backend.expect_active_pharmacies_near().returning(|_, _| Ok(vec![nearby(FAR, 2000.0, 3.0, 0)]));
    backend.expect_insert_emergency_order().never();
    let (status, body) =
        post_request(As::User(REQUESTER), "/emergency-orders", create_body(), configure(backend)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json(&body)["error"].as_str().unwrap().contains("No nearby pharmacies"));
}

#[actix_web::test]
async fn create_order_without_any_location() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_fetch_user_location().withf(|id| *id == REQUESTER).returning(|_| Ok(None));
    let mut body = create_body();
    body.as_object_mut().unwrap().remove("location");
    let (status, body) = post_request(As::User(REQUESTER), "/emergency-orders", body, configure(backend)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(json(&body)["error"], "The data was not found. User location not found");
}

#[actix_web::test]
async fn customers_cannot_respond() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_record_response().never();
    let (status, body) = post_request(
        As::User(REQUESTER),
        "/emergency-orders/1/respond",
        json!({"decision": "accepted"}),
        configure(backend),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert!(json(&body)["error"].as_str().unwrap().contains("Insufficient Permissions"));

    let (status, _) = post_request(
        As::Anonymous,
        "/emergency-orders/1/respond",
        json!({"decision": "accepted"}),
        configure(MockBackend::new()),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn pharmacist_accepts() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_record_response()
        .withf(|id, r| *id == 1 && r.pharmacy_id == NEAR && r.decision == ResponseDecision::Accepted)
        .times(1)
        .returning(|id, r| Ok(accepted_by(id, r.pharmacy_id)));
    let (status, body) = post_request(
        As::Pharmacist(70, NEAR),
        "/emergency-orders/1/respond",
        json!({"decision": "accepted"}),
        configure(backend),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    assert_eq!(body["status"], "accepted");
    assert_eq!(body["acceptedPharmacyId"], NEAR);
    assert_eq!(body["responses"][0]["decision"], "accepted");
}

#[actix_web::test]
async fn pharmacist_rejects_with_reason() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_record_response()
        .withf(|_, r| r.decision == ResponseDecision::Rejected && r.rejection_reason.as_deref() == Some("Out of stock"))
        .returning(|id, _| Ok(order(id, EmergencyStatus::Pending)));
    let (status, body) = post_request(
        As::Pharmacist(80, FAR),
        "/emergency-orders/1/respond",
        json!({"decision": "rejected", "rejectionReason": "  Out of stock "}),
        configure(backend),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "pending");
}

#[actix_web::test]
async fn late_response_conflicts() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend.expect_record_response().returning(|_, _| Err(DispatchError::not_available_for_response()));
    let (status, body) = post_request(
        As::Pharmacist(80, FAR),
        "/emergency-orders/1/respond",
        json!({"decision": "accepted"}),
        configure(backend),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["error"], "Order not available for response");
}

fn backend_with_order(order: EmergencyOrder) -> MockBackend {
    let mut backend = MockBackend::new();
    backend.expect_fetch_emergency_order().returning(move |id| Ok((id == order.id).then(|| order.clone())));
    backend
}

#[actix_web::test]
async fn fetch_order_access() {
    let _ = env_logger::try_init().ok();
    let stored = order(1, EmergencyStatus::Pending);

    let (status, body) =
        get_request(As::User(REQUESTER), "/emergency-orders/1", configure(backend_with_order(stored.clone()))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["requesterId"], REQUESTER);

    let (status, _) =
        get_request(As::Pharmacist(80, FAR), "/emergency-orders/1", configure(backend_with_order(stored.clone()))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) =
        get_request(As::Pharmacist(90, 99), "/emergency-orders/1", configure(backend_with_order(stored.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) =
        get_request(As::User(REQUESTER + 1), "/emergency-orders/1", configure(backend_with_order(stored.clone()))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, _) = get_request(As::User(REQUESTER), "/emergency-orders/2", configure(backend_with_order(stored))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[actix_web::test]
async fn fulfill_order_rules() {
    let _ = env_logger::try_init().ok();
    let stored = accepted_by(1, NEAR);

    let mut backend = backend_with_order(stored.clone());
    backend.expect_mark_order_fulfilled().never();
    let (status, _) =
        post_request(As::Pharmacist(80, FAR), "/emergency-orders/1/fulfill", json!({}), configure(backend)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut backend = backend_with_order(stored);
    backend.expect_mark_order_fulfilled().withf(|id, _| *id == 1).times(1).returning(|id, _| {
        let mut order = accepted_by(id, NEAR);
        order.status = EmergencyStatus::Fulfilled;
        Ok(order)
    });
    let (status, body) =
        post_request(As::Pharmacist(70, NEAR), "/emergency-orders/1/fulfill", json!({}), configure(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "fulfilled");

    let mut backend = backend_with_order(order(1, EmergencyStatus::Pending));
    backend.expect_mark_order_fulfilled().never();
    let (status, _) =
        post_request(As::User(REQUESTER), "/emergency-orders/1/fulfill", json!({}), configure(backend)).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[actix_web::test]
async fn cancel_order() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_cancel_emergency_order()
        .withf(|id, requester, _| *id == 1 && *requester == REQUESTER)
        .returning(|id, _, _| Ok(order(id, EmergencyStatus::Canceled)));
    let (status, body) =
        post_request(As::User(REQUESTER), "/emergency-orders/1/cancel", json!({}), configure(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body)["status"], "canceled");

    let mut backend = MockBackend::new();
    backend
        .expect_cancel_emergency_order()
        .returning(|id, _, _| Err(DispatchError::Conflict(format!("Emergency order #{id} cannot be canceled"))));
    let (status, body) =
        post_request(As::User(REQUESTER), "/emergency-orders/1/cancel", json!({}), configure(backend)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json(&body)["error"], "Emergency order #1 cannot be canceled");
}

#[actix_web::test]
async fn my_orders() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_orders_for_requester()
        .withf(|id| *id == REQUESTER)
        .returning(|_| Ok(vec![order(2, EmergencyStatus::Pending), order(1, EmergencyStatus::NoResponse)]));
    let (status, body) = get_request(As::User(REQUESTER), "/my/emergency-orders", configure(backend)).await;
    assert_eq!(status, StatusCode::OK);
    let body = json(&body);
    let orders = body.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["id"], 2);
    assert_eq!(orders[1]["status"], "no_response");
}

#[actix_web::test]
async fn pharmacy_queue() {
    let _ = env_logger::try_init().ok();
    let (status, _) = get_request(As::User(REQUESTER), "/pharmacy/emergency-orders", configure(MockBackend::new())).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let mut backend = MockBackend::new();
    backend
        .expect_fetch_pending_orders_for_pharmacy()
        .withf(|id| *id == NEAR)
        .returning(|_| Ok(vec![order(1, EmergencyStatus::Pending)]));
    let (status, body) = get_request(As::Pharmacist(70, NEAR), "/pharmacy/emergency-orders", configure(backend)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json(&body).as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn database_errors_are_500s() {
    let _ = env_logger::try_init().ok();
    let mut backend = MockBackend::new();
    backend
        .expect_fetch_orders_for_requester()
        .returning(|_| Err(DispatchError::DatabaseError("disk I/O error".into())));
    let (status, body) = get_request(As::User(REQUESTER), "/my/emergency-orders", configure(backend)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(json(&body)["error"].as_str().unwrap().contains("disk I/O error"));
}
