use accrual_client::AccrualPoll;
use actix_web::{
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use chrono::Utc;
use lpg_common::Points;
use loyalty_engine::{
    db_types::{Order, OrderNumber, OrderStatus},
    OrderFlowApi,
};
use serde_json::Value;

use super::{
    helpers::{auth_header, status_and_body, test_secret, TEST_USER_ID},
    mocks::{MockAccrual, MockOrderDb},
};
use crate::{
    auth::TokenIssuer,
    routes::{get_orders, upload_order},
};

fn configure_app(db: MockOrderDb, accrual: MockAccrual) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(OrderFlowApi::new(db, accrual)))
            .app_data(web::Data::new(TokenIssuer::new(&test_secret())))
            .service(
                web::scope("/api/user")
                    .route("/orders", web::post().to(upload_order::<MockOrderDb, MockAccrual>))
                    .route("/orders", web::get().to(get_orders::<MockOrderDb, MockAccrual>)),
            );
    }
}

fn order(number: &str, status: OrderStatus, accrual: Option<Points>) -> Order {
    Order {
        number: OrderNumber::from(number),
        status,
        accrual,
        uploaded_at: Utc::now(),
        user_id: TEST_USER_ID,
    }
}

async fn upload(body: &'static str, db: MockOrderDb, accrual: MockAccrual) -> (StatusCode, String) {
    let _ = env_logger::try_init();
    let app = test::init_service(App::new().configure(configure_app(db, accrual))).await;
    let req = TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(auth_header())
        .insert_header(("Content-Type", "text/plain"))
        .set_payload(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    status_and_body(res).await
}

#[actix_web::test]
async fn a_new_order_is_accepted_with_202() {
    let mut db = MockOrderDb::new();
    db.expect_fetch_order_owner().returning(|_| Ok(None));
    db.expect_insert_order().returning(|o| {
        Ok(Order { number: o.number, status: o.status, accrual: None, uploaded_at: o.uploaded_at, user_id: o.user_id })
    });
    let mut accrual = MockAccrual::new();
    accrual.expect_order_status().returning(|_| Ok(AccrualPoll::Unknown));
    let (status, _) = upload("12345678903", db, accrual).await;
    assert_eq!(status, StatusCode::ACCEPTED);
}

#[actix_web::test]
async fn re_uploading_your_own_order_is_ok() {
    let mut db = MockOrderDb::new();
    db.expect_fetch_order_owner().returning(|_| Ok(Some(TEST_USER_ID)));
    db.expect_insert_order().never();
    let (status, _) = upload("12345678903", db, MockAccrual::new()).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn someone_elses_order_is_a_conflict() {
    let mut db = MockOrderDb::new();
    db.expect_fetch_order_owner().returning(|_| Ok(Some(TEST_USER_ID + 1)));
    let (status, body) = upload("12345678903", db, MockAccrual::new()).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("another user"), "was: {body}");
}

#[actix_web::test]
async fn malformed_numbers_are_unprocessable() {
    // Non-digit input and digit strings with a broken checksum both answer 422, before any storage I/O.
    for body in ["abcdefg", "79927398713x", "1234567890"] {
        let mut db = MockOrderDb::new();
        db.expect_fetch_order_owner().never();
        db.expect_insert_order().never();
        let (status, _) = upload(body, db, MockAccrual::new()).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "for body {body:?}");
    }
}

#[actix_web::test]
async fn an_empty_body_is_a_bad_request() {
    let (status, _) = upload("", MockOrderDb::new(), MockAccrual::new()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let (status, _) = upload("   \n", MockOrderDb::new(), MockAccrual::new()).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn uploads_require_a_valid_token() {
    let _ = env_logger::try_init();
    let app =
        test::init_service(App::new().configure(configure_app(MockOrderDb::new(), MockAccrual::new()))).await;
    let bare = TestRequest::post().uri("/api/user/orders").set_payload("12345678903").to_request();
    let res = test::call_service(&app, bare).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);

    let forged = TestRequest::post()
        .uri("/api/user/orders")
        .insert_header(("Authorization", "Bearer not.a.token"))
        .set_payload("12345678903")
        .to_request();
    let res = test::call_service(&app, forged).await;
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
}

#[actix_web::test]
async fn listing_orders_returns_the_callers_orders() {
    let mut db = MockOrderDb::new();
    db.expect_fetch_orders_for_user().withf(|id| *id == TEST_USER_ID).returning(|_| {
        Ok(vec![
            order("12345678903", OrderStatus::Processed, Some(Points::from_points(500))),
            order("79927398713", OrderStatus::New, None),
        ])
    });
    let _ = env_logger::try_init();
    let app = test::init_service(App::new().configure(configure_app(db, MockAccrual::new()))).await;
    let req = TestRequest::get().uri("/api/user/orders").insert_header(auth_header()).to_request();
    let res = test::call_service(&app, req).await;
    let (status, body) = status_and_body(res).await;

    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    let orders = json.as_array().unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0]["number"], "12345678903");
    assert_eq!(orders[0]["status"], "PROCESSED");
    assert_eq!(orders[0]["accrual"], 500);
    assert_eq!(orders[1]["status"], "NEW");
    assert!(orders[1].get("accrual").is_none(), "null accruals must be omitted");
}

#[actix_web::test]
async fn an_empty_order_list_is_204() {
    let mut db = MockOrderDb::new();
    db.expect_fetch_orders_for_user().returning(|_| Ok(vec![]));
    let _ = env_logger::try_init();
    let app = test::init_service(App::new().configure(configure_app(db, MockAccrual::new()))).await;
    let req = TestRequest::get().uri("/api/user/orders").insert_header(auth_header()).to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::NO_CONTENT);
}
