use crate::{now, Error, Result};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use entity::{donation, review, user};
use rand::{Rng, RngCore};
use razorpay_client::{self as gateway, PaymentGateway};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DbConn, EntityTrait, NotSet, QueryFilter, QueryOrder, Set,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use tracing::error;
use uuid::Uuid;

/// 6-digit email verification code
pub fn rand_otp() -> String {
    rand::thread_rng().gen_range(100_000..1_000_000).to_string()
}

/// human readable idempotency receipt for gateway order creation
pub fn rand_receipt() -> String {
    let mut suffix = [0u8; 3];
    rand::thread_rng().fill_bytes(&mut suffix);
    format!(
        "tree_{}_{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        hex::encode(suffix)
    )
}

pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}

pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// estimated annual co2 offset in kg
pub fn carbon_offset_kg(per_tree_kg: f64, trees: i64) -> f64 {
    round2(trees as f64 * per_tree_kg)
}

fn epoch_date(ts: i64) -> Option<NaiveDate> {
    DateTime::<Utc>::from_timestamp(ts, 0).map(|dt| dt.date_naive())
}

/// order facts collected at creation
#[derive(Debug, Clone, Default)]
pub struct NewDonation {
    pub full_name: String,
    pub email: String,
    pub phone: String,
    pub number_of_trees: i32,
    pub tree_species: String,
    pub planting_location: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub objective: String,
    pub dedication_name: String,
    pub notes: String,
}

/// donor-editable fields, absent means unchanged
#[derive(Debug, Clone, Default)]
pub struct DonationPatch {
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub number_of_trees: Option<i32>,
    pub tree_species: Option<String>,
    pub planting_location: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub objective: Option<String>,
    pub dedication_name: Option<String>,
    pub notes: Option<String>,
}

impl DonationPatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone.is_none()
            && self.number_of_trees.is_none()
            && self.tree_species.is_none()
            && self.planting_location.is_none()
            && self.latitude.is_none()
            && self.longitude.is_none()
            && self.objective.is_none()
            && self.dedication_name.is_none()
            && self.notes.is_none()
    }
}

/// plantation proof supplied by the operator on approval, absent fields
/// default from the requested order
#[derive(Debug, Clone, Default)]
pub struct ApprovalProof {
    pub planted_location: Option<String>,
    pub planted_latitude: Option<f64>,
    pub planted_longitude: Option<f64>,
    pub plantation_date: Option<i64>,
    pub trees_planted_count: Option<i32>,
    pub plantation_update: Option<String>,
    pub proof_image_1: Option<String>,
    pub proof_image_2: Option<String>,
    pub thank_you_note: Option<String>,
}

#[derive(Debug)]
pub struct VerifyOutcome {
    pub donation: donation::Model,
    /// true only for the call that actually committed the paid transition
    pub newly_paid: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct MonthlyGrowth {
    pub month: String,
    pub trees: i64,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ImpactStats {
    pub trees_planted: i64,
    pub approved_trees_planted: i64,
    pub co2_offset_kg_per_year: f64,
    pub co2_offset_tonnes_per_year: f64,
    pub donations_inr_total: f64,
    pub active_donors: i64,
    pub approved_projects: i64,
    pub total_projects: i64,
    pub approval_rate_percent: f64,
    pub monthly_growth: Vec<MonthlyGrowth>,
    pub peak_monthly_trees: i64,
}

/// Donation lifecycle service
pub struct Service {
    gateway: Box<dyn PaymentGateway + Sync + Send>,
    conn: DbConn,
}

impl Service {
    pub fn new(gateway: Box<dyn PaymentGateway + Sync + Send>, conn: DbConn) -> Self {
        Self { gateway, conn }
    }

    pub fn gateway(&self) -> &Box<dyn PaymentGateway + Sync + Send> {
        &self.gateway
    }

    pub fn db(&self) -> &DbConn {
        &self.conn
    }

    // ---- user directory ----

    pub async fn get_user(&self, email: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db())
            .await?)
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<user::Model>> {
        Ok(user::Entity::find_by_id(id).one(self.db()).await?)
    }

    pub async fn get_verified_user(&self, email: &str) -> Result<Option<user::Model>> {
        Ok(user::Entity::find()
            .filter(user::Column::Email.eq(email.trim().to_lowercase()))
            .filter(user::Column::IsVerified.eq(true))
            .one(self.db())
            .await?)
    }

    /// create or refresh an unverified account and issue a fresh otp
    pub async fn register_user(
        &self,
        full_name: &str,
        email: &str,
        phone: &str,
        password_hash: &str,
        avatar_url: Option<String>,
    ) -> Result<(user::Model, String)> {
        let email = email.trim().to_lowercase();
        if self.get_verified_user(&email).await?.is_some() {
            return Err(Error::InvalidParam("Email already exists".to_owned()));
        }

        let otp = rand_otp();
        let time = now() as i64;
        let user = match self.get_user(&email).await? {
            Some(existing) => {
                let mut update = user::ActiveModel {
                    id: Set(existing.id),
                    full_name: Set(full_name.to_owned()),
                    phone: Set(phone.to_owned()),
                    password_hash: Set(password_hash.to_owned()),
                    otp: Set(Some(otp.clone())),
                    updated_at: Set(time),
                    ..Default::default()
                };
                if avatar_url.is_some() {
                    update.avatar_url = Set(avatar_url);
                }
                update.update(self.db()).await?
            }
            None => {
                user::ActiveModel {
                    id: NotSet,
                    full_name: Set(full_name.to_owned()),
                    email: Set(email),
                    phone: Set(phone.to_owned()),
                    password_hash: Set(password_hash.to_owned()),
                    avatar_url: Set(avatar_url),
                    is_verified: Set(false),
                    otp: Set(Some(otp.clone())),
                    created_at: Set(time),
                    updated_at: Set(time),
                }
                .insert(self.db())
                .await?
            }
        };
        Ok((user, otp))
    }

    /// returns the user and whether this call performed the verification
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<(user::Model, bool)> {
        let user = self
            .get_user(email)
            .await?
            .ok_or(Error::NotFound("User not found"))?;
        if user.is_verified {
            return Ok((user, false));
        }
        if user.otp.as_deref() != Some(otp) {
            return Err(Error::InvalidParam("Invalid OTP".to_owned()));
        }
        let user = user::ActiveModel {
            id: Set(user.id),
            is_verified: Set(true),
            otp: Set(None),
            updated_at: Set(now() as i64),
            ..Default::default()
        }
        .update(self.db())
        .await?;
        Ok((user, true))
    }

    pub async fn regenerate_otp(&self, email: &str) -> Result<(user::Model, String)> {
        let user = self
            .get_user(email)
            .await?
            .ok_or(Error::NotFound("User not found"))?;
        if user.is_verified {
            return Err(Error::InvalidParam("Email is already verified".to_owned()));
        }
        let otp = rand_otp();
        let user = user::ActiveModel {
            id: Set(user.id),
            otp: Set(Some(otp.clone())),
            updated_at: Set(now() as i64),
            ..Default::default()
        }
        .update(self.db())
        .await?;
        Ok((user, otp))
    }

    pub async fn update_profile(
        &self,
        user_id: i32,
        full_name: Option<String>,
        phone: Option<String>,
        avatar_url: Option<String>,
    ) -> Result<user::Model> {
        if full_name.is_none() && phone.is_none() && avatar_url.is_none() {
            return Err(Error::InvalidParam("No profile fields provided".to_owned()));
        }
        let mut update = user::ActiveModel {
            id: Set(user_id),
            updated_at: Set(now() as i64),
            ..Default::default()
        };
        if let Some(full_name) = full_name {
            update.full_name = Set(full_name);
        }
        if let Some(phone) = phone {
            update.phone = Set(phone);
        }
        if let Some(avatar_url) = avatar_url {
            update.avatar_url = Set(Some(avatar_url));
        }
        Ok(update.update(self.db()).await?)
    }

    // ---- reviews ----

    pub async fn get_review(&self, email: &str) -> Result<Option<review::Model>> {
        Ok(review::Entity::find()
            .filter(review::Column::Email.eq(email.trim().to_lowercase()))
            .one(self.db())
            .await?)
    }

    pub async fn list_public_reviews(&self) -> Result<Vec<review::Model>> {
        Ok(review::Entity::find()
            .filter(review::Column::IsPublic.eq(true))
            .order_by_desc(review::Column::UpdatedAt)
            .all(self.db())
            .await?)
    }

    /// one review per email, returns whether a new row was created
    pub async fn upsert_review(
        &self,
        user: &user::Model,
        full_name: String,
        rating: i16,
        review_text: String,
    ) -> Result<(review::Model, bool)> {
        if !(1..=5).contains(&rating) {
            return Err(Error::InvalidParam(
                "Rating must be between 1 and 5".to_owned(),
            ));
        }
        let time = now() as i64;
        match self.get_review(&user.email).await? {
            Some(existing) => {
                let model = review::ActiveModel {
                    id: Set(existing.id),
                    user_id: Set(Some(user.id)),
                    full_name: Set(full_name),
                    rating: Set(rating),
                    review_text: Set(review_text),
                    is_public: Set(true),
                    updated_at: Set(time),
                    ..Default::default()
                }
                .update(self.db())
                .await?;
                Ok((model, false))
            }
            None => {
                let model = review::ActiveModel {
                    id: NotSet,
                    user_id: Set(Some(user.id)),
                    full_name: Set(full_name),
                    email: Set(user.email.clone()),
                    rating: Set(rating),
                    review_text: Set(review_text),
                    is_public: Set(true),
                    created_at: Set(time),
                    updated_at: Set(time),
                }
                .insert(self.db())
                .await?;
                Ok((model, true))
            }
        }
    }

    // ---- donation lifecycle ----

    pub async fn get_donation(&self, id: i32) -> Result<Option<donation::Model>> {
        Ok(donation::Entity::find_by_id(id).one(self.db()).await?)
    }

    pub async fn get_donation_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<donation::Model>> {
        Ok(donation::Entity::find()
            .filter(donation::Column::GatewayOrderId.eq(order_id))
            .one(self.db())
            .await?)
    }

    pub async fn get_donation_by_tracking_token(
        &self,
        token: &str,
    ) -> Result<Option<donation::Model>> {
        Ok(donation::Entity::find()
            .filter(donation::Column::TrackingToken.eq(token))
            .one(self.db())
            .await?)
    }

    pub async fn get_user_donation(
        &self,
        user_id: i32,
        id: i32,
    ) -> Result<Option<donation::Model>> {
        Ok(donation::Entity::find_by_id(id)
            .filter(donation::Column::UserId.eq(user_id))
            .filter(donation::Column::IsUserDeleted.eq(false))
            .one(self.db())
            .await?)
    }

    pub async fn list_user_donations(&self, user_id: i32) -> Result<Vec<donation::Model>> {
        Ok(donation::Entity::find()
            .filter(donation::Column::UserId.eq(user_id))
            .filter(donation::Column::IsUserDeleted.eq(false))
            .order_by_desc(donation::Column::CreatedAt)
            .all(self.db())
            .await?)
    }

    pub async fn list_all_donations(&self) -> Result<Vec<donation::Model>> {
        Ok(donation::Entity::find()
            .order_by_desc(donation::Column::CreatedAt)
            .all(self.db())
            .await?)
    }

    /// open a remote order and persist the `created` donation. The local row
    /// is only written after the gateway hands back an order id, so a gateway
    /// failure leaves no orphaned rows behind.
    pub async fn create_donation(
        &self,
        user: &user::Model,
        order: NewDonation,
        tree_price: i64,
        currency: &str,
    ) -> Result<donation::Model> {
        if order.number_of_trees <= 0 {
            return Err(Error::InvalidParam(
                "Number of trees must be greater than 0".to_owned(),
            ));
        }
        let amount_paise = order.number_of_trees as i64 * tree_price * 100;
        let receipt = rand_receipt();
        let mut notes = HashMap::new();
        notes.insert("email".to_owned(), order.email.clone());
        notes.insert("trees".to_owned(), order.number_of_trees.to_string());

        let remote = self
            .gateway
            .create_order(amount_paise, currency.to_owned(), receipt, notes)
            .await
            .map_err(|err| match err {
                gateway::Error::Api { status, message } if status < 500 => {
                    Error::InvalidParam(message)
                }
                gateway::Error::Api { message, .. } => Error::Upstream(message),
                gateway::Error::Http(e) => Error::Upstream(format!("Unable to start payment: {}", e)),
            })?;

        let model = donation::ActiveModel {
            id: NotSet,
            user_id: Set(user.id),
            full_name: Set(order.full_name),
            email: Set(order.email),
            phone: Set(order.phone),
            number_of_trees: Set(order.number_of_trees),
            tree_species: Set(order.tree_species),
            planting_location: Set(order.planting_location),
            latitude: Set(order.latitude),
            longitude: Set(order.longitude),
            objective: Set(order.objective),
            dedication_name: Set(order.dedication_name),
            notes: Set(order.notes),
            amount_paise: Set(amount_paise),
            currency: Set(currency.to_owned()),
            payment_status: Set(donation::PaymentStatus::Created),
            approval_status: Set(donation::ApprovalStatus::Pending),
            gateway_order_id: Set(remote.id),
            gateway_payment_id: Set(None),
            gateway_signature: Set(None),
            tracking_token: Set(Uuid::new_v4().to_string()),
            created_at: Set(now() as i64),
            paid_at: Set(None),
            approved_at: Set(None),
            is_user_deleted: Set(false),
            user_deleted_at: Set(None),
            planted_location: Set(String::new()),
            planted_latitude: Set(None),
            planted_longitude: Set(None),
            plantation_date: Set(None),
            trees_planted_count: Set(None),
            plantation_update: Set(String::new()),
            proof_image_1: Set(None),
            proof_image_2: Set(None),
            thank_you_note: Set(String::new()),
        };
        Ok(model.insert(self.db()).await?)
    }

    async fn mark_payment_failed(&self, id: i32) -> Result<()> {
        // never clobber a paid row
        donation::Entity::update_many()
            .set(donation::ActiveModel {
                payment_status: Set(donation::PaymentStatus::Failed),
                ..Default::default()
            })
            .filter(donation::Column::Id.eq(id))
            .filter(donation::Column::PaymentStatus.ne(donation::PaymentStatus::Paid))
            .exec(self.db())
            .await?;
        Ok(())
    }

    /// verify a checkout callback. Trust order: local signature check first,
    /// then the authoritative gateway record, never the client-asserted
    /// amount or status.
    pub async fn verify_payment(
        &self,
        order_id: &str,
        payment_id: &str,
        signature: &str,
        key_secret: &str,
    ) -> Result<VerifyOutcome> {
        let donation = self
            .get_donation_by_order_id(order_id)
            .await?
            .ok_or(Error::NotFound("Donation order not found"))?;

        // at-most-once side effects
        if donation.payment_status == donation::PaymentStatus::Paid {
            return Ok(VerifyOutcome {
                donation,
                newly_paid: false,
            });
        }

        if !gateway::verify_signature(key_secret, order_id, payment_id, signature) {
            self.mark_payment_failed(donation.id).await?;
            return Err(Error::PaymentVerification(
                "Payment signature verification failed".to_owned(),
            ));
        }

        let payment = self
            .gateway
            .get_payment(payment_id)
            .await
            .map_err(|err| match err {
                gateway::Error::Api { status, message } if status >= 500 => {
                    Error::Upstream(message)
                }
                gateway::Error::Api { .. } => {
                    Error::InvalidParam("Payment validation failed".to_owned())
                }
                gateway::Error::Http(e) => {
                    Error::Upstream(format!("Unable to validate payment status: {}", e))
                }
            })?;

        if payment.order_id != donation.gateway_order_id || payment.amount != donation.amount_paise
        {
            self.mark_payment_failed(donation.id).await?;
            return Err(Error::PaymentVerification(
                "Payment details mismatch".to_owned(),
            ));
        }

        if !payment.status.is_complete() {
            // transient, the caller polls and retries
            return Err(Error::PaymentPending);
        }

        // single winner under concurrent verification calls
        let res = donation::Entity::update_many()
            .set(donation::ActiveModel {
                gateway_payment_id: Set(Some(payment_id.to_owned())),
                gateway_signature: Set(Some(signature.to_owned())),
                payment_status: Set(donation::PaymentStatus::Paid),
                paid_at: Set(Some(now() as i64)),
                ..Default::default()
            })
            .filter(donation::Column::Id.eq(donation.id))
            .filter(donation::Column::PaymentStatus.ne(donation::PaymentStatus::Paid))
            .exec(self.db())
            .await?;
        let newly_paid = res.rows_affected == 1;

        let donation = self
            .get_donation(donation.id)
            .await?
            .ok_or(Error::Str("where is the donation?"))?;
        Ok(VerifyOutcome {
            donation,
            newly_paid,
        })
    }

    /// donor edit of an owned order. Editing a paid order sends it back
    /// through review: approval resets to pending and proof fields clear.
    pub async fn update_donation(
        &self,
        user_id: i32,
        id: i32,
        patch: DonationPatch,
        tree_price: i64,
    ) -> Result<donation::Model> {
        let donation = self
            .get_user_donation(user_id, id)
            .await?
            .ok_or(Error::NotFound("Order not found"))?;
        if patch.is_empty() {
            return Err(Error::InvalidParam(
                "No fields provided to update".to_owned(),
            ));
        }
        let paid = donation.payment_status == donation::PaymentStatus::Paid;

        let mut update = donation::ActiveModel {
            id: Set(donation.id),
            ..Default::default()
        };
        if let Some(full_name) = patch.full_name {
            update.full_name = Set(full_name);
        }
        if let Some(phone) = patch.phone {
            update.phone = Set(phone);
        }
        if let Some(trees) = patch.number_of_trees {
            if trees <= 0 {
                return Err(Error::InvalidParam(
                    "Number of trees must be greater than 0".to_owned(),
                ));
            }
            update.number_of_trees = Set(trees);
            if !paid {
                update.amount_paise = Set(trees as i64 * tree_price * 100);
            }
        }
        if let Some(tree_species) = patch.tree_species {
            update.tree_species = Set(tree_species);
        }
        if let Some(planting_location) = patch.planting_location {
            update.planting_location = Set(planting_location);
        }
        if let Some(latitude) = patch.latitude {
            update.latitude = Set(Some(latitude));
        }
        if let Some(longitude) = patch.longitude {
            update.longitude = Set(Some(longitude));
        }
        if let Some(objective) = patch.objective {
            update.objective = Set(objective);
        }
        if let Some(dedication_name) = patch.dedication_name {
            update.dedication_name = Set(dedication_name);
        }
        if let Some(notes) = patch.notes {
            update.notes = Set(notes);
        }

        if paid {
            update.approval_status = Set(donation::ApprovalStatus::Pending);
            update.approved_at = Set(None);
            update.planted_location = Set(String::new());
            update.planted_latitude = Set(None);
            update.planted_longitude = Set(None);
            update.plantation_date = Set(None);
            update.trees_planted_count = Set(None);
            update.plantation_update = Set(String::new());
            update.proof_image_1 = Set(None);
            update.proof_image_2 = Set(None);
            update.thank_you_note = Set(String::new());
        }

        Ok(update.update(self.db()).await?)
    }

    /// soft delete, the row stays for audit and admin visibility
    pub async fn soft_delete_donation(&self, user_id: i32, id: i32) -> Result<donation::Model> {
        let donation = self
            .get_user_donation(user_id, id)
            .await?
            .ok_or(Error::NotFound("Order not found"))?;
        Ok(donation::ActiveModel {
            id: Set(donation.id),
            is_user_deleted: Set(true),
            user_deleted_at: Set(Some(now() as i64)),
            ..Default::default()
        }
        .update(self.db())
        .await?)
    }

    pub async fn restore_donation(&self, id: i32) -> Result<donation::Model> {
        let donation = self
            .get_donation(id)
            .await?
            .ok_or(Error::NotFound("Donation not found"))?;
        Ok(donation::ActiveModel {
            id: Set(donation.id),
            is_user_deleted: Set(false),
            user_deleted_at: Set(None),
            ..Default::default()
        }
        .update(self.db())
        .await?)
    }

    /// approve with operator proof; unset proof fields default from the
    /// requested order. Returns whether this call flipped the status.
    pub async fn approve_donation(
        &self,
        id: i32,
        proof: ApprovalProof,
    ) -> Result<(donation::Model, bool)> {
        let donation = self
            .get_donation(id)
            .await?
            .ok_or(Error::NotFound("Donation not found"))?;
        let already = donation.approval_status == donation::ApprovalStatus::Approved;

        let mut update = donation::ActiveModel {
            id: Set(donation.id),
            approval_status: Set(donation::ApprovalStatus::Approved),
            ..Default::default()
        };
        if donation.approved_at.is_none() {
            update.approved_at = Set(Some(now() as i64));
        }

        let trees_planted = proof
            .trees_planted_count
            .or(donation.trees_planted_count)
            .unwrap_or(donation.number_of_trees);
        update.trees_planted_count = Set(Some(trees_planted));

        let planted_location = proof
            .planted_location
            .filter(|l| !l.is_empty())
            .unwrap_or_else(|| donation.planted_location.clone());
        update.planted_location = Set(if planted_location.is_empty() {
            donation.planting_location.clone()
        } else {
            planted_location
        });

        update.planted_latitude = Set(proof
            .planted_latitude
            .or(donation.planted_latitude)
            .or(donation.latitude));
        update.planted_longitude = Set(proof
            .planted_longitude
            .or(donation.planted_longitude)
            .or(donation.longitude));

        if let Some(date) = proof.plantation_date {
            update.plantation_date = Set(Some(date));
        }
        if let Some(text) = proof.plantation_update {
            update.plantation_update = Set(text);
        }
        if let Some(url) = proof.proof_image_1 {
            update.proof_image_1 = Set(Some(url));
        }
        if let Some(url) = proof.proof_image_2 {
            update.proof_image_2 = Set(Some(url));
        }
        if let Some(note) = proof.thank_you_note {
            update.thank_you_note = Set(note);
        }

        let model = update.update(self.db()).await?;
        Ok((model, !already))
    }

    pub async fn reject_donation(&self, id: i32) -> Result<donation::Model> {
        let donation = self
            .get_donation(id)
            .await?
            .ok_or(Error::NotFound("Donation not found"))?;
        Ok(donation::ActiveModel {
            id: Set(donation.id),
            approval_status: Set(donation::ApprovalStatus::Rejected),
            approved_at: Set(None),
            ..Default::default()
        }
        .update(self.db())
        .await?)
    }

    // ---- impact reporting ----

    /// public impact metrics, degrades to zeroes on store errors so a
    /// half-migrated deployment never breaks the public page
    pub async fn impact(&self, carbon_per_tree_kg: f64) -> ImpactStats {
        match self.impact_inner(carbon_per_tree_kg).await {
            Ok(stats) => stats,
            Err(e) => {
                error!(
                    error = e.to_string(),
                    "impact query failed, returning fallback metrics"
                );
                ImpactStats::default()
            }
        }
    }

    async fn impact_inner(&self, carbon_per_tree_kg: f64) -> Result<ImpactStats> {
        let paid = donation::Entity::find()
            .filter(donation::Column::PaymentStatus.eq(donation::PaymentStatus::Paid))
            .all(self.db())
            .await?;

        let mut trees_planted: i64 = 0;
        let mut approved_trees_planted: i64 = 0;
        let mut amount_paise: i64 = 0;
        let mut approved_projects: i64 = 0;
        let mut donors = HashSet::new();

        // trailing 6 calendar months, oldest first
        let today = Utc::now().date_naive();
        let mut keys = Vec::with_capacity(6);
        for offset in (0..6).rev() {
            let mut month = today.month() as i32 - offset;
            let mut year = today.year();
            while month <= 0 {
                month += 12;
                year -= 1;
            }
            keys.push((year, month as u32));
        }
        let mut month_totals: HashMap<(i32, u32), i64> = keys.iter().map(|k| (*k, 0)).collect();

        for order in &paid {
            let counted = order.trees_planted_count.unwrap_or(order.number_of_trees) as i64;
            trees_planted += counted;
            amount_paise += order.amount_paise;
            donors.insert(order.email.clone());
            if order.approval_status == donation::ApprovalStatus::Approved {
                approved_projects += 1;
                approved_trees_planted += counted;
            }

            let planted_on = order
                .plantation_date
                .or(order.paid_at)
                .or(order.approved_at)
                .unwrap_or(order.created_at);
            if let Some(date) = epoch_date(planted_on) {
                let key = (date.year(), date.month());
                if let Some(total) = month_totals.get_mut(&key) {
                    *total += counted;
                }
            }
        }

        let total_projects = paid.len() as i64;
        let approval_rate_percent = if total_projects > 0 {
            round1(approved_projects as f64 / total_projects as f64 * 100.0)
        } else {
            0.0
        };
        let co2_offset_kg_per_year = carbon_offset_kg(carbon_per_tree_kg, trees_planted);

        let monthly_growth: Vec<MonthlyGrowth> = keys
            .iter()
            .map(|(year, month)| MonthlyGrowth {
                month: NaiveDate::from_ymd_opt(*year, *month, 1)
                    .map(|d| d.format("%b").to_string())
                    .unwrap_or_default(),
                trees: month_totals.get(&(*year, *month)).copied().unwrap_or(0),
            })
            .collect();
        let peak_monthly_trees = monthly_growth.iter().map(|m| m.trees).max().unwrap_or(0);

        Ok(ImpactStats {
            trees_planted,
            approved_trees_planted,
            co2_offset_kg_per_year,
            co2_offset_tonnes_per_year: round2(co2_offset_kg_per_year / 1000.0),
            donations_inr_total: round2(amount_paise as f64 / 100.0),
            active_donors: donors.len() as i64,
            approved_projects,
            total_projects,
            approval_rate_percent,
            monthly_growth,
            peak_monthly_trees,
        })
    }
}
