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
    db_types::{Balance, Withdrawal},
    traits::BalanceApiError,
    BalanceApi,
};
use serde_json::{json, Value};

use super::{
    helpers::{auth_header, status_and_body, test_secret, TEST_USER_ID},
    mocks::MockBalanceDb,
};
use crate::{
    auth::TokenIssuer,
    routes::{get_balance, get_withdrawals, withdraw},
};

fn configure_app(db: MockBalanceDb) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(BalanceApi::new(db)))
            .app_data(web::Data::new(TokenIssuer::new(&test_secret())))
            .service(
                web::scope("/api/user")
                    .route("/balance", web::get().to(get_balance::<MockBalanceDb>))
                    .route("/balance/withdraw", web::post().to(withdraw::<MockBalanceDb>))
                    .route("/withdrawals", web::get().to(get_withdrawals::<MockBalanceDb>)),
            );
    }
}

async fn get(path: &str, db: MockBalanceDb) -> (StatusCode, String) {
    let _ = env_logger::try_init();
    let app = test::init_service(App::new().configure(configure_app(db))).await;
    let req = TestRequest::get().uri(path).insert_header(auth_header()).to_request();
    let res = test::call_service(&app, req).await;
    status_and_body(res).await
}

async fn post_withdraw(body: Value, db: MockBalanceDb) -> (StatusCode, String) {
    let _ = env_logger::try_init();
    let app = test::init_service(App::new().configure(configure_app(db))).await;
    let req = TestRequest::post()
        .uri("/api/user/balance/withdraw")
        .insert_header(auth_header())
        .set_json(body)
        .to_request();
    let res = test::call_service(&app, req).await;
    status_and_body(res).await
}

#[actix_web::test]
async fn balance_is_reported_as_decimal_numbers() {
    let mut db = MockBalanceDb::new();
    db.expect_fetch_balance().withf(|id| *id == TEST_USER_ID).returning(|_| {
        Ok(Balance { current: Points::from_hundredths(50_050), withdrawn: Points::from_points(42) })
    });
    let (status, body) = get("/api/user/balance", db).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json["current"], 500.5);
    assert_eq!(json["withdrawn"], 42);
}

#[actix_web::test]
async fn a_withdrawal_that_fits_the_balance_succeeds() {
    let mut db = MockBalanceDb::new();
    db.expect_withdraw()
        .withf(|id, order, sum, _| {
            *id == TEST_USER_ID && order == "79927398713" && *sum == Points::from_points(200)
        })
        .returning(|id, order, sum, processed_at| {
            Ok(Withdrawal { id: 1, order_number: order.to_string(), sum, processed_at, user_id: id })
        });
    let (status, _) = post_withdraw(json!({"order": "79927398713", "sum": 200}), db).await;
    assert_eq!(status, StatusCode::OK);
}

#[actix_web::test]
async fn an_uncovered_withdrawal_is_payment_required() {
    let mut db = MockBalanceDb::new();
    db.expect_withdraw().returning(|_, _, _, _| Err(BalanceApiError::InsufficientFunds));
    let (status, body) = post_withdraw(json!({"order": "79927398713", "sum": 1000}), db).await;
    assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
    assert!(body.contains("Insufficient funds"), "was: {body}");
}

#[actix_web::test]
async fn withdrawing_against_a_bad_number_is_unprocessable() {
    let mut db = MockBalanceDb::new();
    db.expect_withdraw().never();
    let (status, _) = post_withdraw(json!({"order": "1234567890", "sum": 100}), db).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[actix_web::test]
async fn non_positive_sums_are_bad_requests() {
    for sum in [0, -50] {
        let mut db = MockBalanceDb::new();
        db.expect_withdraw().never();
        let (status, _) = post_withdraw(json!({"order": "79927398713", "sum": sum}), db).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "for sum {sum}");
    }
}

#[actix_web::test]
async fn malformed_withdrawal_bodies_are_bad_requests() {
    let _ = env_logger::try_init();
    let mut db = MockBalanceDb::new();
    db.expect_withdraw().never();
    let app = test::init_service(App::new().configure(configure_app(db))).await;
    let req = TestRequest::post()
        .uri("/api/user/balance/withdraw")
        .insert_header(auth_header())
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"order": 12345}"#)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn withdrawals_are_listed_with_their_wire_names() {
    let mut db = MockBalanceDb::new();
    db.expect_fetch_withdrawals().returning(|id| {
        Ok(vec![Withdrawal {
            id: 1,
            order_number: "79927398713".to_string(),
            sum: Points::from_points(200),
            processed_at: Utc::now(),
            user_id: id,
        }])
    });
    let (status, body) = get("/api/user/withdrawals", db).await;
    assert_eq!(status, StatusCode::OK);
    let json: Value = serde_json::from_str(&body).unwrap();
    assert_eq!(json[0]["order"], "79927398713");
    assert_eq!(json[0]["sum"], 200);
    assert!(json[0].get("user_id").is_none());
}

#[actix_web::test]
async fn an_empty_withdrawal_history_is_204() {
    let mut db = MockBalanceDb::new();
    db.expect_fetch_withdrawals().returning(|_| Ok(vec![]));
    let (status, _) = get("/api/user/withdrawals", db).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
}

#[actix_web::test]
async fn balance_routes_require_a_token() {
    let _ = env_logger::try_init();
    let app = test::init_service(App::new().configure(configure_app(MockBalanceDb::new()))).await;
    for req in [
        TestRequest::get().uri("/api/user/balance").to_request(),
        TestRequest::get().uri("/api/user/withdrawals").to_request(),
        TestRequest::post()
            .uri("/api/user/balance/withdraw")
            .set_json(json!({"order": "79927398713", "sum": 10}))
            .to_request(),
    ] {
        let res = test::call_service(&app, req).await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    }
}
