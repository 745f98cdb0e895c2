#![allow(unused)]

use actix_http::{body::MessageBody, header::AUTHORIZATION, Method, Request};
use actix_web::{
    dev::{Service as WebService, ServiceResponse},
    test::{call_service, read_body_json, TestRequest},
};
use anyhow::Result;
use async_trait::async_trait;
use entity::user;
use grovebox::{auth, setting::Setting, AppState, Service};
use migration::{Migrator, MigratorTrait};
use parking_lot::Mutex;
use razorpay_client::{Order, Payment, PaymentGateway, PaymentStatus};
use sea_orm::{ConnectOptions, Database};
use serde_json::Value;
use std::{collections::HashMap, sync::Arc};

pub const TEST_SECRET: &str = "test_gateway_secret";

/// scripted in-memory payment gateway
#[derive(Default)]
pub struct FakeGateway {
    pub orders: Mutex<u32>,
    pub payments: Mutex<HashMap<String, Payment>>,
    /// number of get_payment calls observed
    pub lookups: Mutex<u32>,
    /// when set, create_order fails with this gateway api error
    pub fail_create: Mutex<Option<(u16, String)>>,
}

impl FakeGateway {
    pub fn script_payment(
        &self,
        payment_id: &str,
        order_id: &str,
        amount: i64,
        status: PaymentStatus,
    ) {
        self.payments.lock().insert(
            payment_id.to_owned(),
            Payment {
                id: payment_id.to_owned(),
                order_id: order_id.to_owned(),
                amount,
                currency: "INR".to_owned(),
                status,
            },
        );
    }
}

/// wrapper so a shared `Arc<FakeGateway>` handle can be injected as a
/// `Box<dyn PaymentGateway>` — a foreign trait cannot be implemented for
/// `Arc<FakeGateway>` directly (orphan rule), so delegate through a local type
pub struct SharedGateway(pub Arc<FakeGateway>);

#[async_trait]
impl PaymentGateway for SharedGateway {
    async fn create_order(
        &self,
        amount: i64,
        currency: String,
        receipt: String,
        _notes: HashMap<String, String>,
    ) -> razorpay_client::Result<Order> {
        if let Some((status, message)) = self.0.fail_create.lock().clone() {
            return Err(razorpay_client::Error::Api { status, message });
        }
        let mut n = self.0.orders.lock();
        *n += 1;
        Ok(Order {
            id: format!("order_test{:04}", n),
            amount,
            currency,
            receipt: Some(receipt),
            status: Some("created".to_owned()),
        })
    }

    async fn get_payment(&self, payment_id: &str) -> razorpay_client::Result<Payment> {
        *self.0.lookups.lock() += 1;
        self.0
            .payments
            .lock()
            .get(payment_id)
            .cloned()
            .ok_or(razorpay_client::Error::Api {
                status: 404,
                message: "payment not found".to_owned(),
            })
    }
}

pub async fn create_test_state() -> Result<(AppState, Arc<FakeGateway>)> {
    let mut setting = Setting::default();
    setting.db_url = "sqlite::memory:".to_owned();
    setting.gateway.key_id = "rzp_test_key".to_owned();
    setting.gateway.key_secret = TEST_SECRET.to_owned();
    setting.auth.admin_token = Some("admin-test-token".to_owned());

    let mut options = ConnectOptions::new(setting.db_url.clone());
    // a single connection keeps the in-memory database shared
    options.max_connections(1).sqlx_logging(false);
    let conn = Database::connect(options).await?;
    Migrator::fresh(&conn).await?;

    let gateway = Arc::new(FakeGateway::default());
    let service = Service::new(Box::new(SharedGateway(gateway.clone())), conn);
    Ok((
        AppState {
            service,
            setting,
            mailer: None,
            geocoder: None,
        },
        gateway,
    ))
}

/// register and verify a donor account
pub async fn create_verified_user(state: &AppState, email: &str) -> Result<user::Model> {
    let hash = auth::hash_password("password123")?;
    let (_user, otp) = state
        .service
        .register_user("Alice Green", email, "9876543210", &hash, None)
        .await?;
    let (user, _) = state.service.verify_otp(email, &otp).await?;
    Ok(user)
}

pub fn token_for(state: &AppState, user: &user::Model) -> Result<String> {
    Ok(auth::JwtToken::generate(
        user.id,
        3600,
        state.setting.auth.secret.as_bytes(),
    )?)
}

pub async fn call<S, B>(app: &S, req: TestRequest) -> Result<(Value, u16)>
where
    S: WebService<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    let res = call_service(app, req.to_request()).await;
    let status = res.status().as_u16();
    let val = read_body_json::<Value, _>(res).await;
    Ok((val, status))
}

pub async fn get<S, B>(app: &S, path: &str) -> Result<(Value, u16)>
where
    S: WebService<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    call(app, TestRequest::with_uri(path)).await
}

pub async fn auth_get<S, B>(app: &S, path: &str, token: &str) -> Result<(Value, u16)>
where
    S: WebService<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    call(
        app,
        TestRequest::with_uri(path)
            .insert_header((AUTHORIZATION, format!("Bearer {}", token))),
    )
    .await
}

pub async fn post<S, B>(app: &S, path: &str, data: Value) -> Result<(Value, u16)>
where
    S: WebService<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    call(
        app,
        TestRequest::with_uri(path).method(Method::POST).set_json(data),
    )
    .await
}

pub async fn auth_post<S, B>(app: &S, path: &str, token: &str, data: Value) -> Result<(Value, u16)>
where
    S: WebService<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    call(
        app,
        TestRequest::with_uri(path)
            .method(Method::POST)
            .set_json(data)
            .insert_header((AUTHORIZATION, format!("Bearer {}", token))),
    )
    .await
}

pub async fn auth_req<S, B>(
    app: &S,
    method: Method,
    path: &str,
    token: &str,
    data: Value,
) -> Result<(Value, u16)>
where
    S: WebService<Request, Response = ServiceResponse<B>, Error = actix_web::Error>,
    B: MessageBody,
{
    call(
        app,
        TestRequest::with_uri(path)
            .method(method)
            .set_json(data)
            .insert_header((AUTHORIZATION, format!("Bearer {}", token))),
    )
    .await
}
