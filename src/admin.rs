//! operator api: approval workflow and full listing

use crate::{
    auth::AdminAuth, donations::DonationView, mail, AppState, ApprovalProof, Error, Result,
};
use actix_web::{get, post, web, Responder, Scope};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_option_number_from_string;
use serde_json::json;
use tracing::error;

pub fn scope() -> Scope {
    web::scope("/admin")
        .service(list_donations)
        .service(approve)
        .service(reject)
        .service(restore)
}

#[get("/donations")]
pub async fn list_donations(
    state: web::Data<AppState>,
    _admin: AdminAuth,
) -> Result<impl Responder, Error> {
    let donations = state.service.list_all_donations().await?;
    let views: Vec<DonationView> = donations
        .iter()
        .map(|d| DonationView::from_model(&state.setting, d))
        .collect();
    Ok(web::Json(json!({ "donations": views })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApproveRecord {
    pub id: i32,
    pub planted_location: Option<String>,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    pub planted_latitude: Option<f64>,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    pub planted_longitude: Option<f64>,
    /// YYYY-MM-DD
    pub plantation_date: Option<String>,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    pub trees_planted_count: Option<i32>,
    pub plantation_update: Option<String>,
    pub proof_image_1: Option<String>,
    pub proof_image_2: Option<String>,
    pub thank_you_note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ApproveReq {
    /// records with operator proof
    pub donations: Vec<ApproveRecord>,
    /// bare ids, approved with defaults only
    pub ids: Vec<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct IdsReq {
    pub ids: Vec<i32>,
}

fn parse_plantation_date(value: Option<String>) -> Result<Option<i64>> {
    match value {
        None => Ok(None),
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
                Error::InvalidParam("Plantation date must be YYYY-MM-DD".to_owned())
            })?;
            let ts = date
                .and_hms_opt(0, 0, 0)
                .map(|dt| dt.and_utc().timestamp())
                .ok_or_else(|| Error::InvalidParam("Invalid plantation date".to_owned()))?;
            Ok(Some(ts))
        }
    }
}

impl ApproveRecord {
    fn into_proof(self) -> Result<(i32, ApprovalProof)> {
        let id = self.id;
        let proof = ApprovalProof {
            planted_location: self.planted_location.map(|v| v.trim().to_owned()),
            planted_latitude: self.planted_latitude,
            planted_longitude: self.planted_longitude,
            plantation_date: parse_plantation_date(self.plantation_date)?,
            trees_planted_count: self.trees_planted_count,
            plantation_update: self.plantation_update,
            proof_image_1: self.proof_image_1,
            proof_image_2: self.proof_image_2,
            thank_you_note: self.thank_you_note,
        };
        Ok((id, proof))
    }
}

/// batch approval. Records are processed independently: one donation's
/// failure, or one donor's broken mailbox, never blocks the rest.
#[post("/donations/approve")]
pub async fn approve(
    state: web::Data<AppState>,
    _admin: AdminAuth,
    data: web::Json<ApproveReq>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();
    let mut records: Vec<(i32, ApprovalProof)> = Vec::new();
    for record in data.donations {
        records.push(record.into_proof()?);
    }
    for id in data.ids {
        records.push((id, ApprovalProof::default()));
    }
    if records.is_empty() {
        return Err(Error::InvalidParam("No donations selected".to_owned()));
    }

    let mut approved = 0;
    let mut emailed = 0;
    let mut email_failed = 0;
    let mut errors = 0;

    for (id, proof) in records {
        let (donation, just_approved) = match state.service.approve_donation(id, proof).await {
            Ok(res) => res,
            Err(e) => {
                error!(error = e.to_string(), "failed to approve donation {}", id);
                errors += 1;
                continue;
            }
        };
        approved += 1;

        if !just_approved {
            continue;
        }
        // best effort, the approval itself is already committed
        match &state.mailer {
            Some(mailer) => {
                let (subject, body) = mail::approval_email(&state.setting, &donation);
                match mailer.send(&donation.email, &subject, body).await {
                    Ok(()) => emailed += 1,
                    Err(e) => {
                        error!(
                            error = e.to_string(),
                            "failed to send approval email for donation {}", donation.id
                        );
                        email_failed += 1;
                    }
                }
            }
            None => email_failed += 1,
        }
    }

    Ok(web::Json(json!({
        "approved": approved,
        "emailed": emailed,
        "email_failed": email_failed,
        "errors": errors,
    })))
}

#[post("/donations/reject")]
pub async fn reject(
    state: web::Data<AppState>,
    _admin: AdminAuth,
    data: web::Json<IdsReq>,
) -> Result<impl Responder, Error> {
    let mut rejected = 0;
    let mut errors = 0;
    for id in &data.ids {
        match state.service.reject_donation(*id).await {
            Ok(_) => rejected += 1,
            Err(e) => {
                error!(error = e.to_string(), "failed to reject donation {}", id);
                errors += 1;
            }
        }
    }
    Ok(web::Json(json!({ "rejected": rejected, "errors": errors })))
}

#[post("/donations/restore")]
pub async fn restore(
    state: web::Data<AppState>,
    _admin: AdminAuth,
    data: web::Json<IdsReq>,
) -> Result<impl Responder, Error> {
    let mut restored = 0;
    let mut errors = 0;
    for id in &data.ids {
        match state.service.restore_donation(*id).await {
            Ok(_) => restored += 1,
            Err(e) => {
                error!(error = e.to_string(), "failed to restore donation {}", id);
                errors += 1;
            }
        }
    }
    Ok(web::Json(json!({ "restored": restored, "errors": errors })))
}
