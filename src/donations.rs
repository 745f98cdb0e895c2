//! donation order http api

use crate::{
    auth::AuthedUser, carbon_offset_kg, mail, mapbox, setting::Setting, AppState, DonationPatch,
    Error, NewDonation, Result,
};
use actix_web::{delete, get, post, route, web, Responder, Scope};
use entity::donation;
use serde::{Deserialize, Serialize};
use serde_aux::prelude::{
    deserialize_number_from_string, deserialize_option_number_from_string,
};
use serde_json::json;

pub fn scope() -> Scope {
    web::scope("/trees")
        .service(payment_config)
        .service(geocode)
        .service(create_order)
        .service(verify_payment)
        .service(list_orders)
        .service(get_order)
        .service(update_order)
        .service(delete_order)
        .service(track_order)
        .service(impact)
}

pub fn tracking_url(setting: &Setting, token: &str) -> String {
    format!("{}/track/{}", setting.site().trim_end_matches('/'), token)
}

pub fn certificate_url(setting: &Setting, token: &str) -> String {
    format!(
        "{}/certificate/{}",
        setting.site().trim_end_matches('/'),
        token
    )
}

#[derive(Debug, Clone, Serialize)]
pub struct ImpactView {
    pub carbon_offset_kg_per_year: f64,
    pub trees_counted: i32,
    pub unit: &'static str,
}

/// order projection returned to owners and admins; `tracking` strips pii
#[derive(Debug, Clone, Serialize)]
pub struct DonationView {
    pub id: i32,
    pub full_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub number_of_trees: i32,
    pub tree_species: String,
    pub planting_location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub objective: String,
    pub dedication_name: String,
    pub notes: String,
    pub amount_paise: i64,
    pub currency: String,
    pub payment_status: donation::PaymentStatus,
    pub approval_status: donation::ApprovalStatus,
    pub gateway_order_id: String,
    pub gateway_payment_id: Option<String>,
    pub created_at: i64,
    pub paid_at: Option<i64>,
    pub approved_at: Option<i64>,
    pub planted_location: String,
    pub planted_latitude: Option<f64>,
    pub planted_longitude: Option<f64>,
    pub plantation_date: Option<i64>,
    pub trees_planted_count: Option<i32>,
    pub plantation_update: String,
    pub thank_you_note: String,
    pub proof_image_1_url: Option<String>,
    pub proof_image_2_url: Option<String>,
    pub tracking_token: String,
    pub tracking_url: String,
    pub certificate_url: String,
    pub requested_map_url: Option<String>,
    pub requested_map_image_url: Option<String>,
    pub planted_map_url: Option<String>,
    pub planted_map_image_url: Option<String>,
    pub impact: ImpactView,
}

impl DonationView {
    pub fn from_model(setting: &Setting, donation: &donation::Model) -> Self {
        let token = &setting.mapbox.access_token;
        let trees_counted = donation
            .trees_planted_count
            .unwrap_or(donation.number_of_trees);
        Self {
            id: donation.id,
            full_name: donation.full_name.clone(),
            email: Some(donation.email.clone()),
            phone: Some(donation.phone.clone()),
            number_of_trees: donation.number_of_trees,
            tree_species: donation.tree_species.clone(),
            planting_location: donation.planting_location.clone(),
            latitude: donation.latitude,
            longitude: donation.longitude,
            objective: donation.objective.clone(),
            dedication_name: donation.dedication_name.clone(),
            notes: donation.notes.clone(),
            amount_paise: donation.amount_paise,
            currency: donation.currency.clone(),
            payment_status: donation.payment_status,
            approval_status: donation.approval_status,
            gateway_order_id: donation.gateway_order_id.clone(),
            gateway_payment_id: donation.gateway_payment_id.clone(),
            created_at: donation.created_at,
            paid_at: donation.paid_at,
            approved_at: donation.approved_at,
            planted_location: donation.planted_location.clone(),
            planted_latitude: donation.planted_latitude,
            planted_longitude: donation.planted_longitude,
            plantation_date: donation.plantation_date,
            trees_planted_count: donation.trees_planted_count,
            plantation_update: donation.plantation_update.clone(),
            thank_you_note: donation.thank_you_note.clone(),
            proof_image_1_url: donation.proof_image_1.clone(),
            proof_image_2_url: donation.proof_image_2.clone(),
            tracking_token: donation.tracking_token.clone(),
            tracking_url: tracking_url(setting, &donation.tracking_token),
            certificate_url: certificate_url(setting, &donation.tracking_token),
            requested_map_url: mapbox::search_url(
                token,
                donation.latitude,
                donation.longitude,
                &donation.planting_location,
            ),
            requested_map_image_url: mapbox::static_map_url(
                token,
                donation.latitude,
                donation.longitude,
            ),
            planted_map_url: mapbox::search_url(
                token,
                donation.planted_latitude,
                donation.planted_longitude,
                &donation.planted_location,
            ),
            planted_map_image_url: mapbox::static_map_url(
                token,
                donation.planted_latitude,
                donation.planted_longitude,
            ),
            impact: ImpactView {
                carbon_offset_kg_per_year: carbon_offset_kg(
                    setting.donation.carbon_offset_kg_per_tree_year,
                    trees_counted as i64,
                ),
                trees_counted,
                unit: "kg/year",
            },
        }
    }

    /// public tracking projection, email and phone stripped
    pub fn tracking(setting: &Setting, donation: &donation::Model) -> Self {
        let mut view = Self::from_model(setting, donation);
        view.email = None;
        view.phone = None;
        view
    }
}

#[get("/config")]
pub async fn payment_config(state: web::Data<AppState>) -> Result<impl Responder, Error> {
    let setting = &state.setting;
    if !setting.gateway.configured() {
        return Err(Error::ServiceUnavailable(
            "Payment gateway credentials are missing on server".to_owned(),
        ));
    }
    Ok(web::Json(json!({
        "gateway_key_id": setting.gateway.key_id,
        "tree_price": setting.donation.tree_price,
        "currency": setting.donation.currency,
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GeocodeReq {
    q: String,
    country: Option<String>,
}

#[get("/geocode")]
pub async fn geocode(
    state: web::Data<AppState>,
    query: web::Query<GeocodeReq>,
) -> Result<impl Responder, Error> {
    let q = query.q.trim();
    if q.len() < 3 {
        return Ok(web::Json(json!({ "results": [] })));
    }
    let geocoder = state.geocoder.as_ref().ok_or_else(|| {
        Error::ServiceUnavailable("Mapbox token is missing on server".to_owned())
    })?;
    let results = geocoder.search(q, query.country.as_deref()).await?;
    Ok(web::Json(json!({ "results": results })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct CreateOrderReq {
    full_name: String,
    phone: String,
    #[serde(deserialize_with = "deserialize_number_from_string")]
    number_of_trees: i32,
    tree_species: String,
    planting_location: String,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    latitude: Option<f64>,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    longitude: Option<f64>,
    objective: String,
    dedication_name: String,
    notes: String,
}

#[post("/create-order")]
pub async fn create_order(
    state: web::Data<AppState>,
    user: AuthedUser,
    data: web::Json<CreateOrderReq>,
) -> Result<impl Responder, Error> {
    let setting = &state.setting;
    if !setting.gateway.configured() {
        return Err(Error::ServiceUnavailable(
            "Payment gateway credentials are missing on server".to_owned(),
        ));
    }
    let data = data.into_inner();

    let full_name = data.full_name.trim().to_owned();
    let phone = data.phone.trim().to_owned();
    let objective = data.objective.trim().to_owned();
    let planting_location = data.planting_location.trim().to_owned();
    if full_name.is_empty() || phone.is_empty() || objective.is_empty() || planting_location.is_empty()
    {
        return Err(Error::InvalidParam("Missing required fields".to_owned()));
    }
    if data.number_of_trees <= 0 {
        return Err(Error::InvalidParam(
            "Number of trees must be greater than 0".to_owned(),
        ));
    }

    let order = NewDonation {
        full_name,
        email: user.user.email.clone(),
        phone,
        number_of_trees: data.number_of_trees,
        tree_species: data.tree_species.trim().to_owned(),
        planting_location,
        latitude: data.latitude,
        longitude: data.longitude,
        objective,
        dedication_name: data.dedication_name.trim().to_owned(),
        notes: data.notes.trim().to_owned(),
    };
    let donation = state
        .service
        .create_donation(
            &user.user,
            order,
            setting.donation.tree_price,
            &setting.donation.currency,
        )
        .await?;

    Ok(web::Json(json!({
        "message": "Order created successfully",
        "order_id": donation.gateway_order_id,
        "amount_paise": donation.amount_paise,
        "currency": donation.currency,
        "gateway_key_id": setting.gateway.key_id,
        "donation_id": donation.id,
        "tree_price": setting.donation.tree_price,
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VerifyPaymentReq {
    order_id: String,
    payment_id: String,
    signature: String,
}

#[post("/verify-payment")]
pub async fn verify_payment(
    state: web::Data<AppState>,
    data: web::Json<VerifyPaymentReq>,
) -> Result<impl Responder, Error> {
    let setting = &state.setting;
    if !setting.gateway.configured() {
        return Err(Error::ServiceUnavailable(
            "Payment gateway credentials are missing on server".to_owned(),
        ));
    }
    let order_id = data.order_id.trim();
    let payment_id = data.payment_id.trim();
    let signature = data.signature.trim();
    if order_id.is_empty() || payment_id.is_empty() || signature.is_empty() {
        return Err(Error::InvalidParam(
            "Missing payment verification fields".to_owned(),
        ));
    }

    let outcome = state
        .service
        .verify_payment(order_id, payment_id, signature, &setting.gateway.key_secret)
        .await?;

    if outcome.newly_paid {
        if let Some(mailer) = &state.mailer {
            let (subject, body) = mail::payment_received_email(setting, &outcome.donation);
            mail::send_detached(&state.mailer, mailer.admin_email().to_owned(), subject, body);
        }
    }

    Ok(web::Json(json!({
        "message": if outcome.newly_paid {
            "Payment verified successfully"
        } else {
            "Payment already verified"
        },
        "donation_id": outcome.donation.id,
    })))
}

#[get("/orders")]
pub async fn list_orders(
    state: web::Data<AppState>,
    user: AuthedUser,
) -> Result<impl Responder, Error> {
    let orders = state.service.list_user_donations(user.user.id).await?;
    let paid = donation::PaymentStatus::Paid;
    let summary = json!({
        "total_orders": orders.len(),
        "completed_orders": orders
            .iter()
            .filter(|o| o.payment_status == paid
                && o.approval_status == donation::ApprovalStatus::Approved)
            .count(),
        "pending_orders": orders
            .iter()
            .filter(|o| o.payment_status == paid
                && o.approval_status == donation::ApprovalStatus::Pending)
            .count(),
        "rejected_orders": orders
            .iter()
            .filter(|o| o.approval_status == donation::ApprovalStatus::Rejected)
            .count(),
        "unpaid_orders": orders.iter().filter(|o| o.payment_status != paid).count(),
    });
    let views: Vec<DonationView> = orders
        .iter()
        .map(|o| DonationView::from_model(&state.setting, o))
        .collect();
    Ok(web::Json(json!({ "orders": views, "summary": summary })))
}

#[get("/orders/{id}")]
pub async fn get_order(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    let donation = state
        .service
        .get_user_donation(user.user.id, path.into_inner())
        .await?
        .ok_or(Error::NotFound("Order not found"))?;
    Ok(web::Json(
        json!({ "order": DonationView::from_model(&state.setting, &donation) }),
    ))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpdateOrderReq {
    full_name: Option<String>,
    phone: Option<String>,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    number_of_trees: Option<i32>,
    tree_species: Option<String>,
    planting_location: Option<String>,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    latitude: Option<f64>,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    longitude: Option<f64>,
    objective: Option<String>,
    dedication_name: Option<String>,
    notes: Option<String>,
}

fn required_trimmed(value: String, name: &str) -> Result<String> {
    let value = value.trim().to_owned();
    if value.is_empty() {
        return Err(Error::InvalidParam(format!("{} cannot be empty", name)));
    }
    Ok(value)
}

#[route("/orders/{id}", method = "PUT", method = "PATCH")]
pub async fn update_order(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<i32>,
    data: web::Json<UpdateOrderReq>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();
    let patch = DonationPatch {
        full_name: data
            .full_name
            .map(|v| required_trimmed(v, "Full name"))
            .transpose()?,
        phone: data
            .phone
            .map(|v| required_trimmed(v, "Phone"))
            .transpose()?,
        number_of_trees: data.number_of_trees,
        tree_species: data.tree_species.map(|v| v.trim().to_owned()),
        planting_location: data
            .planting_location
            .map(|v| required_trimmed(v, "Planting location"))
            .transpose()?,
        latitude: data.latitude,
        longitude: data.longitude,
        objective: data
            .objective
            .map(|v| required_trimmed(v, "Objective"))
            .transpose()?,
        dedication_name: data.dedication_name.map(|v| v.trim().to_owned()),
        notes: data.notes.map(|v| v.trim().to_owned()),
    };

    let donation = state
        .service
        .update_donation(
            user.user.id,
            path.into_inner(),
            patch,
            state.setting.donation.tree_price,
        )
        .await?;
    Ok(web::Json(json!({
        "message": "Order updated successfully",
        "order": DonationView::from_model(&state.setting, &donation),
    })))
}

#[delete("/orders/{id}")]
pub async fn delete_order(
    state: web::Data<AppState>,
    user: AuthedUser,
    path: web::Path<i32>,
) -> Result<impl Responder, Error> {
    state
        .service
        .soft_delete_donation(user.user.id, path.into_inner())
        .await?;
    Ok(web::Json(json!({ "message": "Order deleted successfully" })))
}

#[get("/track/{token}")]
pub async fn track_order(
    state: web::Data<AppState>,
    path: web::Path<String>,
) -> Result<impl Responder, Error> {
    let donation = state
        .service
        .get_donation_by_tracking_token(&path.into_inner())
        .await?
        .ok_or(Error::NotFound("Tracking record not found"))?;
    Ok(web::Json(
        json!({ "order": DonationView::tracking(&state.setting, &donation) }),
    ))
}

#[get("/impact")]
pub async fn impact(state: web::Data<AppState>) -> Result<impl Responder, Error> {
    let stats = state
        .service
        .impact(state.setting.donation.carbon_offset_kg_per_tree_year)
        .await;
    Ok(web::Json(json!({
        "metrics": {
            "trees_planted": stats.trees_planted,
            "approved_trees_planted": stats.approved_trees_planted,
            "co2_offset_tonnes_per_year": stats.co2_offset_tonnes_per_year,
            "co2_offset_kg_per_year": stats.co2_offset_kg_per_year,
            "donations_inr_total": stats.donations_inr_total,
            "active_donors": stats.active_donors,
            "approved_projects": stats.approved_projects,
            "total_projects": stats.total_projects,
            "approval_rate_percent": stats.approval_rate_percent,
        },
        "growth": {
            "monthly_growth": stats.monthly_growth,
            "peak_monthly_trees": stats.peak_monthly_trees,
        },
        "commitment": {
            "operations_share_percent": 10,
            "plantation_share_percent": 90,
            "transparency_percent": 100,
            "monitoring_support": "24/7",
        },
        "benchmarks": {
            "community_survival_rate_percent": 85,
            "industry_survival_rate_percent": 60,
        },
    })))
}
