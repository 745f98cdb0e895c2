//! smtp notification dispatch and the plain text templates

use crate::{
    donations::{certificate_url, tracking_url},
    mapbox, carbon_offset_kg,
    setting::{Setting, Smtp},
    Error, Result,
};
use entity::donation;
use lettre::{
    message::header::ContentType, transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use std::sync::Arc;
use tracing::{error, info};

pub struct Mailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
    admin: Option<String>,
    support: Option<String>,
}

impl Mailer {
    /// None when smtp is not configured, every send becomes a logged skip
    pub fn from_setting(smtp: &Smtp) -> Result<Option<Self>> {
        if !smtp.configured() {
            return Ok(None);
        }
        let creds = Credentials::new(smtp.username.clone(), smtp.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&smtp.host)
            .map_err(|e| Error::Message(format!("smtp transport: {}", e)))?
            .port(smtp.port)
            .credentials(creds)
            .build();
        Ok(Some(Self {
            transport,
            from: smtp.from.clone().unwrap_or_else(|| smtp.username.clone()),
            admin: smtp.admin_email.clone(),
            support: smtp.support_email.clone(),
        }))
    }

    /// recipient of paid-donation notifications
    pub fn admin_email(&self) -> &str {
        self.admin.as_deref().unwrap_or(&self.from)
    }

    /// recipient of relayed support requests
    pub fn support_email(&self) -> &str {
        self.support.as_deref().unwrap_or_else(|| self.admin_email())
    }

    pub async fn send(&self, to: &str, subject: &str, body: String) -> Result<()> {
        let email = Message::builder()
            .from(
                self.from
                    .parse()
                    .map_err(|e| Error::Message(format!("invalid from address: {}", e)))?,
            )
            .to(to
                .parse()
                .map_err(|e| Error::Message(format!("invalid recipient: {}", e)))?)
            .subject(subject)
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|e| Error::Message(format!("build email: {}", e)))?;
        self.transport
            .send(email)
            .await
            .map_err(|e| Error::Message(format!("send email: {}", e)))?;
        Ok(())
    }
}

/// deliver in the background. The transition that triggered this is already
/// committed, so failures are logged and never surfaced to the caller.
pub fn send_detached(mailer: &Option<Arc<Mailer>>, to: String, subject: String, body: String) {
    let Some(mailer) = mailer.clone() else {
        info!("mail disabled, skipping notification to {}", to);
        return;
    };
    tokio::spawn(async move {
        match mailer.send(&to, &subject, body).await {
            Ok(()) => info!("notification sent to {}", to),
            Err(e) => error!(
                error = e.to_string(),
                "failed to send notification to {}", to
            ),
        }
    });
}

fn fmt_date(ts: Option<i64>) -> String {
    ts.and_then(|t| chrono::DateTime::<chrono::Utc>::from_timestamp(t, 0))
        .map(|dt| dt.date_naive().to_string())
        .unwrap_or_else(|| "-".to_owned())
}

fn or_dash(value: &str) -> &str {
    if value.is_empty() {
        "-"
    } else {
        value
    }
}

fn fmt_coord(value: Option<f64>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "-".to_owned())
}

pub fn otp_email(otp: &str) -> (String, String) {
    ("Your OTP Code".to_owned(), format!("Your OTP is {}", otp))
}

pub fn payment_received_email(setting: &Setting, donation: &donation::Model) -> (String, String) {
    let token = &setting.mapbox.access_token;
    let map_link = mapbox::search_url(
        token,
        donation.latitude,
        donation.longitude,
        &donation.planting_location,
    )
    .unwrap_or_else(|| "-".to_owned());
    let map_image = mapbox::static_map_url(token, donation.latitude, donation.longitude)
        .unwrap_or_else(|| "-".to_owned());
    let trees_counted = donation
        .trees_planted_count
        .unwrap_or(donation.number_of_trees);
    let carbon = carbon_offset_kg(
        setting.donation.carbon_offset_kg_per_tree_year,
        trees_counted as i64,
    );

    let lines = [
        "A new tree donation has been paid successfully.".to_owned(),
        String::new(),
        format!("Donation ID: {}", donation.id),
        format!("User Name: {}", donation.full_name),
        format!("User Email: {}", donation.email),
        format!("User Phone: {}", donation.phone),
        format!("Trees Ordered: {}", donation.number_of_trees),
        format!("Tree Species: {}", or_dash(&donation.tree_species)),
        format!("Objective: {}", donation.objective),
        format!("Planting Location: {}", donation.planting_location),
        format!("Latitude: {}", fmt_coord(donation.latitude)),
        format!("Longitude: {}", fmt_coord(donation.longitude)),
        format!("Map Link: {}", map_link),
        format!("Map Static Preview: {}", map_image),
        format!("Dedication: {}", or_dash(&donation.dedication_name)),
        format!("Notes: {}", or_dash(&donation.notes)),
        format!(
            "Amount: {:.2} {}",
            donation.amount_paise as f64 / 100.0,
            donation.currency
        ),
        format!("Gateway Order ID: {}", donation.gateway_order_id),
        format!(
            "Gateway Payment ID: {}",
            donation.gateway_payment_id.as_deref().unwrap_or("-")
        ),
        format!("Paid At: {}", fmt_date(donation.paid_at)),
        format!("Estimated Carbon Offset: {} kg/year", carbon),
        format!(
            "Tracking URL: {}",
            tracking_url(setting, &donation.tracking_token)
        ),
        format!(
            "Certificate URL: {}",
            certificate_url(setting, &donation.tracking_token)
        ),
    ];
    (
        format!("New Tree Donation Paid (#{})", donation.id),
        lines.join("\n"),
    )
}

pub fn approval_email(setting: &Setting, donation: &donation::Model) -> (String, String) {
    let token = &setting.mapbox.access_token;
    let planted_location = if donation.planted_location.is_empty() {
        &donation.planting_location
    } else {
        &donation.planted_location
    };
    let planted_map = mapbox::search_url(
        token,
        donation.planted_latitude,
        donation.planted_longitude,
        planted_location,
    )
    .unwrap_or_else(|| "-".to_owned());
    let planted_map_live =
        mapbox::live_map_url(token, donation.planted_latitude, donation.planted_longitude)
            .unwrap_or_else(|| "-".to_owned());
    let planted_map_preview =
        mapbox::static_map_url(token, donation.planted_latitude, donation.planted_longitude)
            .unwrap_or_else(|| "-".to_owned());
    let trees_counted = donation
        .trees_planted_count
        .unwrap_or(donation.number_of_trees);
    let carbon = carbon_offset_kg(
        setting.donation.carbon_offset_kg_per_tree_year,
        trees_counted as i64,
    );

    let lines = [
        format!("Hi {},", donation.full_name),
        String::new(),
        "Your tree plantation order has been approved.".to_owned(),
        format!("Order ID: {}", donation.id),
        format!("Trees Ordered: {}", donation.number_of_trees),
        format!("Trees Planted Count: {}", trees_counted),
        format!("Planting Location: {}", planted_location),
        format!("Plantation Date: {}", fmt_date(donation.plantation_date)),
        format!(
            "Coordinates: {}, {}",
            fmt_coord(donation.planted_latitude),
            fmt_coord(donation.planted_longitude)
        ),
        format!("Map Location: {}", planted_map),
        format!("Live Map: {}", planted_map_live),
        format!("Map Preview: {}", planted_map_preview),
        format!("Estimated Carbon Offset: {} kg/year", carbon),
        String::new(),
        "Plantation Update:".to_owned(),
        or_dash(&donation.plantation_update).to_owned(),
        String::new(),
        "Proof Image 1:".to_owned(),
        donation
            .proof_image_1
            .clone()
            .unwrap_or_else(|| "-".to_owned()),
        "Proof Image 2:".to_owned(),
        donation
            .proof_image_2
            .clone()
            .unwrap_or_else(|| "-".to_owned()),
        String::new(),
        "Thank You Note:".to_owned(),
        if donation.thank_you_note.is_empty() {
            "Thank you for supporting a greener future.".to_owned()
        } else {
            donation.thank_you_note.clone()
        },
        String::new(),
        "Track Your Plantation:".to_owned(),
        tracking_url(setting, &donation.tracking_token),
        "Download/View Certificate:".to_owned(),
        certificate_url(setting, &donation.tracking_token),
        String::new(),
        "Regards,".to_owned(),
        "Grovebox Team".to_owned(),
    ];
    (
        format!("Your Tree Order #{} Has Been Approved", donation.id),
        lines.join("\n"),
    )
}

pub fn support_request_email(
    subject: &str,
    full_name: &str,
    email: &str,
    phone: &str,
    message: &str,
) -> (String, String) {
    let lines = [
        "New support request from dashboard:".to_owned(),
        String::new(),
        format!("Name: {}", or_dash(full_name)),
        format!("Email: {}", email),
        format!("Phone: {}", or_dash(phone)),
        format!("Subject: {}", subject),
        String::new(),
        "Message:".to_owned(),
        message.to_owned(),
    ];
    (
        format!("[Grovebox Support] {}", subject),
        lines.join("\n"),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::setting::Setting;

    fn sample_donation() -> donation::Model {
        donation::Model {
            id: 7,
            user_id: 1,
            full_name: "Alice Green".to_owned(),
            email: "alice@example.com".to_owned(),
            phone: "9876543210".to_owned(),
            number_of_trees: 5,
            tree_species: String::new(),
            planting_location: "Campus North Lawn".to_owned(),
            latitude: Some(12.97),
            longitude: Some(77.59),
            objective: "Shade".to_owned(),
            dedication_name: String::new(),
            notes: String::new(),
            amount_paise: 49500,
            currency: "INR".to_owned(),
            payment_status: donation::PaymentStatus::Paid,
            approval_status: donation::ApprovalStatus::Pending,
            gateway_order_id: "order_1".to_owned(),
            gateway_payment_id: Some("pay_1".to_owned()),
            gateway_signature: None,
            tracking_token: "tok-123".to_owned(),
            created_at: 0,
            paid_at: Some(1_700_000_000),
            approved_at: None,
            is_user_deleted: false,
            user_deleted_at: None,
            planted_location: String::new(),
            planted_latitude: None,
            planted_longitude: None,
            plantation_date: None,
            trees_planted_count: None,
            plantation_update: String::new(),
            proof_image_1: None,
            proof_image_2: None,
            thank_you_note: String::new(),
        }
    }

    #[test]
    fn payment_template() {
        let setting = Setting::default();
        let donation = sample_donation();
        let (subject, body) = payment_received_email(&setting, &donation);
        assert_eq!(subject, "New Tree Donation Paid (#7)");
        assert!(body.contains("Amount: 495.00 INR"));
        assert!(body.contains("Estimated Carbon Offset: 105 kg/year"));
        assert!(body.contains("/track/tok-123"));
        // no mapbox token configured, no map links
        assert!(body.contains("Map Link: -"));
    }

    #[test]
    fn approval_template() {
        let setting = Setting::default();
        let mut donation = sample_donation();
        donation.trees_planted_count = Some(4);
        donation.thank_you_note = "Trees are thriving".to_owned();
        let (subject, body) = approval_email(&setting, &donation);
        assert_eq!(subject, "Your Tree Order #7 Has Been Approved");
        assert!(body.contains("Trees Planted Count: 4"));
        assert!(body.contains("Trees are thriving"));
        assert!(body.contains("/certificate/tok-123"));
    }

    #[test]
    fn otp_template() {
        let (subject, body) = otp_email("123456");
        assert_eq!(subject, "Your OTP Code");
        assert_eq!(body, "Your OTP is 123456");
    }
}
