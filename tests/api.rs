use actix_http::Method;
use actix_rt::time::sleep;
use actix_web::{test::init_service, web};
use anyhow::Result;
use grovebox::create_web_app;
use razorpay_client::{signature, PaymentStatus};
use serde_json::json;
use std::time::Duration;

mod util;

#[actix_rt::test]
async fn register_verify_login() -> Result<()> {
    let (state, _gateway) = util::create_test_state().await?;
    let state = web::Data::new(state);
    let app = init_service(create_web_app(state.clone())).await;
    sleep(Duration::from_millis(50)).await;

    let (val, status) = util::post(
        &app,
        "/users/register",
        json!({
            "full_name": "Carol Kapoor",
            "email": "Carol@Example.com",
            "phone": "9998887776",
            "password": "hunter2hunter2",
        }),
    )
    .await?;
    assert_eq!(status, 201);
    assert_eq!(val["email"], json!("carol@example.com"));

    // missing fields
    let (val, status) = util::post(
        &app,
        "/users/register",
        json!({ "email": "carol@example.com" }),
    )
    .await?;
    assert_eq!(status, 400);
    assert_eq!(val["error"], json!(true));

    // login before verification
    let (_val, status) = util::post(
        &app,
        "/users/login",
        json!({ "email": "carol@example.com", "password": "hunter2hunter2" }),
    )
    .await?;
    assert_eq!(status, 403);

    // wrong otp
    let (_val, status) = util::post(
        &app,
        "/users/verify-otp",
        json!({ "email": "carol@example.com", "otp": "000000" }),
    )
    .await?;
    assert_eq!(status, 400);

    let otp = state
        .service
        .get_user("carol@example.com")
        .await?
        .unwrap()
        .otp
        .unwrap();
    let (val, status) = util::post(
        &app,
        "/users/verify-otp",
        json!({ "email": "carol@example.com", "otp": otp }),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["user"]["is_verified"], json!(true));

    // resend after verification is rejected
    let (_val, status) = util::post(
        &app,
        "/users/resend-otp",
        json!({ "email": "carol@example.com" }),
    )
    .await?;
    assert_eq!(status, 400);

    let (val, status) = util::post(
        &app,
        "/users/login",
        json!({ "email": "carol@example.com", "password": "hunter2hunter2" }),
    )
    .await?;
    assert_eq!(status, 200);
    assert!(val["access_token"].is_string());
    let token = val["access_token"].as_str().unwrap().to_owned();

    // bad password
    let (_val, status) = util::post(
        &app,
        "/users/login",
        json!({ "email": "carol@example.com", "password": "wrong" }),
    )
    .await?;
    assert_eq!(status, 401);

    let (val, status) = util::auth_get(&app, "/users/profile", &token).await?;
    assert_eq!(status, 200);
    assert_eq!(val["user"]["email"], json!("carol@example.com"));

    let (_val, status) = util::get(&app, "/users/profile").await?;
    assert_eq!(status, 401);

    Ok(())
}

#[actix_rt::test]
async fn order_and_payment_flow() -> Result<()> {
    let (state, gateway) = util::create_test_state().await?;
    let state = web::Data::new(state);
    let app = init_service(create_web_app(state.clone())).await;
    sleep(Duration::from_millis(50)).await;

    let user = util::create_verified_user(&state, "alice@example.com").await?;
    let token = util::token_for(&state, &user)?;

    let order_body = json!({
        "full_name": "Alice Green",
        "phone": "9876543210",
        "number_of_trees": 5,
        "planting_location": "Campus North Lawn",
        "objective": "Shade",
        "latitude": "12.97",
        "longitude": "77.59",
    });

    // authentication required
    let (_val, status) = util::post(&app, "/trees/create-order", order_body.clone()).await?;
    assert_eq!(status, 401);

    // missing required field
    let (val, status) = util::auth_post(
        &app,
        "/trees/create-order",
        &token,
        json!({ "full_name": "Alice Green", "phone": "9876543210", "number_of_trees": 5 }),
    )
    .await?;
    assert_eq!(status, 400);
    assert_eq!(val["error"], json!(true));

    let (val, status) =
        util::auth_post(&app, "/trees/create-order", &token, order_body).await?;
    assert_eq!(status, 200);
    assert_eq!(val["amount_paise"], json!(49500));
    assert_eq!(val["currency"], json!("INR"));
    let order_id = val["order_id"].as_str().unwrap().to_owned();
    let donation_id = val["donation_id"].as_i64().unwrap();

    // verify with a forged signature
    let bad_sig = signature("wrong_secret", &order_id, "pay_1");
    let (val, status) = util::post(
        &app,
        "/trees/verify-payment",
        json!({ "order_id": order_id, "payment_id": "pay_1", "signature": bad_sig }),
    )
    .await?;
    assert_eq!(status, 400);
    assert_eq!(val["error"], json!(true));

    // honest retry
    gateway.script_payment("pay_1", &order_id, 49500, PaymentStatus::Captured);
    let sig = signature(util::TEST_SECRET, &order_id, "pay_1");
    let (val, status) = util::post(
        &app,
        "/trees/verify-payment",
        json!({ "order_id": order_id, "payment_id": "pay_1", "signature": sig }),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["message"], json!("Payment verified successfully"));
    assert_eq!(val["donation_id"], json!(donation_id));

    // idempotent re-submit
    let (val, status) = util::post(
        &app,
        "/trees/verify-payment",
        json!({ "order_id": order_id, "payment_id": "pay_1", "signature": sig }),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["message"], json!("Payment already verified"));

    // owner listing shows the paid order awaiting approval
    let (val, status) = util::auth_get(&app, "/trees/orders", &token).await?;
    assert_eq!(status, 200);
    assert_eq!(val["summary"]["total_orders"], json!(1));
    assert_eq!(val["summary"]["pending_orders"], json!(1));
    assert_eq!(val["orders"][0]["payment_status"], json!("paid"));
    assert_eq!(val["orders"][0]["email"], json!("alice@example.com"));
    let tracking_token = val["orders"][0]["tracking_token"].as_str().unwrap().to_owned();

    // public tracking strips pii
    let (val, status) = util::get(&app, &format!("/trees/track/{}", tracking_token)).await?;
    assert_eq!(status, 200);
    assert!(val["order"]["email"].is_null());
    assert!(val["order"]["phone"].is_null());
    assert_eq!(val["order"]["payment_status"], json!("paid"));
    assert_eq!(val["order"]["full_name"], json!("Alice Green"));

    let (_val, status) = util::get(&app, "/trees/track/not-a-token").await?;
    assert_eq!(status, 404);

    Ok(())
}

#[actix_rt::test]
async fn update_and_delete_orders() -> Result<()> {
    let (state, _gateway) = util::create_test_state().await?;
    let state = web::Data::new(state);
    let app = init_service(create_web_app(state.clone())).await;
    sleep(Duration::from_millis(50)).await;

    let user = util::create_verified_user(&state, "alice@example.com").await?;
    let token = util::token_for(&state, &user)?;

    let (val, _) = util::auth_post(
        &app,
        "/trees/create-order",
        &token,
        json!({
            "full_name": "Alice Green",
            "phone": "9876543210",
            "number_of_trees": 5,
            "planting_location": "Campus North Lawn",
            "objective": "Shade",
        }),
    )
    .await?;
    let id = val["donation_id"].as_i64().unwrap();

    // nothing to update
    let (val, status) = util::auth_req(
        &app,
        Method::PUT,
        &format!("/trees/orders/{}", id),
        &token,
        json!({}),
    )
    .await?;
    assert_eq!(status, 400);
    assert_eq!(val["error"], json!(true));

    // numbers-as-strings are accepted and the amount recomputes pre-payment
    let (val, status) = util::auth_req(
        &app,
        Method::PUT,
        &format!("/trees/orders/{}", id),
        &token,
        json!({ "number_of_trees": "7" }),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["order"]["number_of_trees"], json!(7));
    assert_eq!(val["order"]["amount_paise"], json!(69300));

    // blank required field
    let (_val, status) = util::auth_req(
        &app,
        Method::PATCH,
        &format!("/trees/orders/{}", id),
        &token,
        json!({ "planting_location": "  " }),
    )
    .await?;
    assert_eq!(status, 400);

    let (val, status) = util::call(
        &app,
        actix_web::test::TestRequest::with_uri(&format!("/trees/orders/{}", id))
            .method(Method::DELETE)
            .insert_header((actix_http::header::AUTHORIZATION, format!("Bearer {}", token))),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["message"], json!("Order deleted successfully"));

    let (val, _) = util::auth_get(&app, "/trees/orders", &token).await?;
    assert_eq!(val["summary"]["total_orders"], json!(0));

    // the admin still sees the soft-deleted row
    let (val, status) = util::auth_get(&app, "/admin/donations", "admin-test-token").await?;
    assert_eq!(status, 200);
    assert_eq!(val["donations"].as_array().unwrap().len(), 1);

    let (_val, status) = util::get(&app, "/admin/donations").await?;
    assert_eq!(status, 401);
    let (_val, status) = util::auth_get(&app, "/admin/donations", "wrong-token").await?;
    assert_eq!(status, 401);

    Ok(())
}

#[actix_rt::test]
async fn admin_approval_workflow() -> Result<()> {
    let (state, gateway) = util::create_test_state().await?;
    let state = web::Data::new(state);
    let app = init_service(create_web_app(state.clone())).await;
    sleep(Duration::from_millis(50)).await;

    let user = util::create_verified_user(&state, "alice@example.com").await?;
    let token = util::token_for(&state, &user)?;

    let (val, _) = util::auth_post(
        &app,
        "/trees/create-order",
        &token,
        json!({
            "full_name": "Alice Green",
            "phone": "9876543210",
            "number_of_trees": 5,
            "planting_location": "Campus North Lawn",
            "objective": "Shade",
        }),
    )
    .await?;
    let id = val["donation_id"].as_i64().unwrap();
    let order_id = val["order_id"].as_str().unwrap().to_owned();

    gateway.script_payment("pay_1", &order_id, 49500, PaymentStatus::Captured);
    let sig = signature(util::TEST_SECRET, &order_id, "pay_1");
    let (_val, status) = util::post(
        &app,
        "/trees/verify-payment",
        json!({ "order_id": order_id, "payment_id": "pay_1", "signature": sig }),
    )
    .await?;
    assert_eq!(status, 200);

    // batch approval processes records independently
    let (val, status) = util::auth_post(
        &app,
        "/admin/donations/approve",
        "admin-test-token",
        json!({ "ids": [id, 99999] }),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["approved"], json!(1));
    assert_eq!(val["errors"], json!(1));
    // mail is disabled in tests, the failure is reported, not raised
    assert_eq!(val["emailed"], json!(0));
    assert_eq!(val["email_failed"], json!(1));

    // defaults got filled from the requested order
    let (val, _) = util::auth_get(&app, "/trees/orders", &token).await?;
    assert_eq!(val["orders"][0]["approval_status"], json!("approved"));
    assert_eq!(val["orders"][0]["trees_planted_count"], json!(5));
    assert_eq!(
        val["orders"][0]["planted_location"],
        json!("Campus North Lawn")
    );
    assert_eq!(val["summary"]["completed_orders"], json!(1));

    // re-approving is counted but sends no second email
    let (val, _) = util::auth_post(
        &app,
        "/admin/donations/approve",
        "admin-test-token",
        json!({ "ids": [id] }),
    )
    .await?;
    assert_eq!(val["approved"], json!(1));
    assert_eq!(val["email_failed"], json!(0));

    let (val, status) = util::auth_post(
        &app,
        "/admin/donations/reject",
        "admin-test-token",
        json!({ "ids": [id] }),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["rejected"], json!(1));

    let (val, _) = util::auth_get(&app, "/trees/orders", &token).await?;
    assert_eq!(val["orders"][0]["approval_status"], json!("rejected"));
    assert!(val["orders"][0]["approved_at"].is_null());

    Ok(())
}

#[actix_rt::test]
async fn impact_and_config() -> Result<()> {
    let (state, _gateway) = util::create_test_state().await?;
    let state = web::Data::new(state);
    let app = init_service(create_web_app(state.clone())).await;
    sleep(Duration::from_millis(50)).await;

    let (val, status) = util::get(&app, "/trees/impact").await?;
    assert_eq!(status, 200);
    assert_eq!(val["metrics"]["trees_planted"], json!(0));
    assert_eq!(val["metrics"]["total_projects"], json!(0));
    assert_eq!(val["metrics"]["approval_rate_percent"], json!(0.0));
    assert_eq!(val["growth"]["monthly_growth"].as_array().unwrap().len(), 6);
    assert_eq!(val["commitment"]["plantation_share_percent"], json!(90));

    let (val, status) = util::get(&app, "/trees/config").await?;
    assert_eq!(status, 200);
    assert_eq!(val["gateway_key_id"], json!("rzp_test_key"));
    assert_eq!(val["tree_price"], json!(99));

    // short geocode queries short-circuit to an empty result
    let (val, status) = util::get(&app, "/trees/geocode?q=de").await?;
    assert_eq!(status, 200);
    assert_eq!(val["results"], json!([]));

    // no mapbox token configured
    let (val, status) = util::get(&app, "/trees/geocode?q=delhi").await?;
    assert_eq!(status, 503);
    assert_eq!(val["error"], json!(true));

    Ok(())
}

#[actix_rt::test]
async fn config_requires_gateway_credentials() -> Result<()> {
    let (mut state, _gateway) = util::create_test_state().await?;
    state.setting.gateway.key_id = String::new();
    state.setting.gateway.key_secret = String::new();
    let app = init_service(create_web_app(web::Data::new(state))).await;
    sleep(Duration::from_millis(50)).await;

    let (val, status) = util::get(&app, "/trees/config").await?;
    assert_eq!(status, 503);
    assert_eq!(val["error"], json!(true));

    let (_val, status) = util::post(
        &app,
        "/trees/verify-payment",
        json!({ "order_id": "o", "payment_id": "p", "signature": "s" }),
    )
    .await?;
    assert_eq!(status, 503);

    Ok(())
}

#[actix_rt::test]
async fn reviews_endpoint() -> Result<()> {
    let (state, _gateway) = util::create_test_state().await?;
    let state = web::Data::new(state);
    let app = init_service(create_web_app(state.clone())).await;
    sleep(Duration::from_millis(50)).await;

    let user = util::create_verified_user(&state, "alice@example.com").await?;
    let token = util::token_for(&state, &user)?;

    let (_val, status) = util::post(&app, "/users/reviews", json!({ "rating": 5 })).await?;
    assert_eq!(status, 401);

    let (val, status) = util::auth_post(
        &app,
        "/users/reviews",
        &token,
        json!({ "rating": 5, "review_text": "Wonderful initiative" }),
    )
    .await?;
    assert_eq!(status, 200);
    assert_eq!(val["message"], json!("Review submitted successfully"));

    let (_val, status) = util::auth_post(
        &app,
        "/users/reviews",
        &token,
        json!({ "rating": 6 }),
    )
    .await?;
    assert_eq!(status, 400);

    let (val, status) = util::get(&app, "/users/reviews").await?;
    assert_eq!(status, 200);
    assert_eq!(val["summary"]["total_reviews"], json!(1));
    assert_eq!(val["summary"]["average_rating"], json!(5.0));
    assert_eq!(val["summary"]["rating_breakdown"]["5"], json!(1));
    assert!(val["current_user_review"].is_null());

    let (val, status) = util::auth_get(&app, "/users/reviews", &token).await?;
    assert_eq!(status, 200);
    assert_eq!(val["current_user_review"]["rating"], json!(5));

    Ok(())
}
