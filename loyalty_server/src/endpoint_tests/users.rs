use actix_web::{
    http::StatusCode,
    test,
    test::TestRequest,
    web,
    web::ServiceConfig,
    App,
};
use loyalty_engine::{traits::UserApiError, AuthApi};
use serde_json::json;

use super::{
    helpers::{status_and_body, test_issuer, test_secret, test_user},
    mocks::MockUserDb,
};
use crate::{
    auth::TokenIssuer,
    data_objects::TokenResponse,
    routes::{login, register},
};

fn configure_app(user_db: MockUserDb) -> impl FnOnce(&mut ServiceConfig) {
    move |cfg| {
        cfg.app_data(web::Data::new(AuthApi::new(user_db)))
            .app_data(web::Data::new(TokenIssuer::new(&test_secret())))
            .service(
                web::scope("/api/user")
                    .route("/register", web::post().to(register::<MockUserDb>))
                    .route("/login", web::post().to(login::<MockUserDb>)),
            );
    }
}

async fn post(path: &str, body: serde_json::Value, db: MockUserDb) -> (StatusCode, String, Option<String>) {
    let _ = env_logger::try_init();
    let app = test::init_service(App::new().configure(configure_app(db))).await;
    let req = TestRequest::post().uri(path).set_json(body).to_request();
    let res = test::call_service(&app, req).await;
    let auth_header =
        res.headers().get("Authorization").and_then(|v| v.to_str().ok()).map(str::to_owned);
    let (status, body) = status_and_body(res).await;
    (status, body, auth_header)
}

#[actix_web::test]
async fn register_issues_a_token_for_the_new_user() {
    let mut db = MockUserDb::new();
    db.expect_create_user().returning(|login, hash| Ok(test_user(42, login, hash)));
    let (status, body, header) = post("/api/user/register", json!({"login": "alice", "password": "secret"}), db).await;

    assert_eq!(status, StatusCode::OK);
    let token: TokenResponse = serde_json::from_str(&body).expect("token body");
    let claims = test_issuer().decode_claims(&token.token).expect("token must verify");
    assert_eq!(claims.user_id, 42);
    assert_eq!(header.unwrap(), format!("Bearer {}", token.token));
}

#[actix_web::test]
async fn registering_a_taken_login_is_a_conflict() {
    let mut db = MockUserDb::new();
    db.expect_create_user().returning(|_, _| Err(UserApiError::UserAlreadyExists));
    let (status, body, _) = post("/api/user/register", json!({"login": "alice", "password": "secret"}), db).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body.contains("already exists"), "was: {body}");
}

#[actix_web::test]
async fn register_rejects_blank_credentials() {
    for body in [json!({"login": "", "password": "secret"}), json!({"login": "alice", "password": ""})] {
        let mut db = MockUserDb::new();
        db.expect_create_user().never();
        let (status, _, _) = post("/api/user/register", body.clone(), db).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "for body {body}");
    }
}

#[actix_web::test]
async fn register_rejects_malformed_json() {
    let _ = env_logger::try_init();
    let mut db = MockUserDb::new();
    db.expect_create_user().never();
    let app = test::init_service(App::new().configure(configure_app(db))).await;
    let req = TestRequest::post()
        .uri("/api/user/register")
        .insert_header(("Content-Type", "application/json"))
        .set_payload(r#"{"login": "alice""#)
        .to_request();
    let res = test::call_service(&app, req).await;
    assert_eq!(res.status(), StatusCode::BAD_REQUEST);
}

#[actix_web::test]
async fn login_round_trips_registered_credentials() {
    let stored_hash = bcrypt::hash("secret", 4).unwrap();
    let mut db = MockUserDb::new();
    db.expect_fetch_user_by_login()
        .returning(move |login| Ok(Some(test_user(42, login, &stored_hash))));
    let (status, body, header) = post("/api/user/login", json!({"login": "alice", "password": "secret"}), db).await;

    assert_eq!(status, StatusCode::OK);
    let token: TokenResponse = serde_json::from_str(&body).expect("token body");
    assert_eq!(test_issuer().decode_claims(&token.token).unwrap().user_id, 42);
    assert!(header.unwrap().starts_with("Bearer "));
}

#[actix_web::test]
async fn login_rejects_unknown_users_and_wrong_passwords_alike() {
    let mut db = MockUserDb::new();
    db.expect_fetch_user_by_login().returning(|_| Ok(None));
    let (unknown_status, unknown_body, _) =
        post("/api/user/login", json!({"login": "mallory", "password": "secret"}), db).await;

    let stored_hash = bcrypt::hash("secret", 4).unwrap();
    let mut db = MockUserDb::new();
    db.expect_fetch_user_by_login()
        .returning(move |login| Ok(Some(test_user(42, login, &stored_hash))));
    let (wrong_status, wrong_body, _) =
        post("/api/user/login", json!({"login": "alice", "password": "wrong"}), db).await;

    assert_eq!(unknown_status, StatusCode::UNAUTHORIZED);
    assert_eq!(wrong_status, StatusCode::UNAUTHORIZED);
    assert_eq!(unknown_body, wrong_body, "responses must not reveal which part was wrong");
}

#[actix_web::test]
async fn login_maps_store_failures_to_500() {
    let mut db = MockUserDb::new();
    db.expect_fetch_user_by_login()
        .returning(|_| Err(UserApiError::DatabaseError("connection lost".to_string())));
    let (status, body, _) = post("/api/user/login", json!({"login": "alice", "password": "secret"}), db).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!body.contains("connection lost"), "store details must not leak: {body}");
}
