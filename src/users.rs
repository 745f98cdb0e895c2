//! user registration, otp verification, profile, support and reviews api

use crate::{
    auth::{self, AuthedUser, JwtToken},
    mail, round2, AppState, Error, Result,
};
use actix_web::{get, post, web, HttpResponse, Responder, Scope};
use entity::{review, user};
use serde::{Deserialize, Serialize};
use serde_aux::prelude::deserialize_option_number_from_string;
use serde_json::{json, Value};

pub fn scope() -> Scope {
    web::scope("/users")
        .service(register)
        .service(verify_otp)
        .service(resend_otp)
        .service(login)
        .service(get_profile)
        .service(update_profile)
        .service(support_info)
        .service(send_support)
        .service(list_reviews)
        .service(post_review)
}

fn user_view(user: &user::Model) -> Value {
    json!({
        "id": user.id,
        "full_name": user.full_name,
        "email": user.email,
        "phone": user.phone,
        "avatar": user.avatar_url,
        "is_verified": user.is_verified,
    })
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct RegisterReq {
    full_name: String,
    email: String,
    phone: String,
    password: String,
    avatar_url: Option<String>,
}

#[post("/register")]
pub async fn register(
    state: web::Data<AppState>,
    data: web::Json<RegisterReq>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();
    let full_name = data.full_name.trim().to_owned();
    let email = data.email.trim().to_lowercase();
    let phone = data.phone.trim().to_owned();
    if full_name.is_empty() || email.is_empty() || phone.is_empty() || data.password.is_empty() {
        return Err(Error::InvalidParam("Missing required fields".to_owned()));
    }
    if !email.contains('@') {
        return Err(Error::InvalidParam("Enter a valid email".to_owned()));
    }

    let password_hash = auth::hash_password(&data.password)?;
    let (user, otp) = state
        .service
        .register_user(&full_name, &email, &phone, &password_hash, data.avatar_url)
        .await?;

    // registration stays fast, the otp email goes out in the background
    let (subject, body) = mail::otp_email(&otp);
    mail::send_detached(&state.mailer, user.email.clone(), subject, body);

    Ok(HttpResponse::Created().json(json!({
        "message": "Registration successful. OTP sent to email.",
        "email": user.email,
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VerifyOtpReq {
    email: String,
    otp: String,
}

#[post("/verify-otp")]
pub async fn verify_otp(
    state: web::Data<AppState>,
    data: web::Json<VerifyOtpReq>,
) -> Result<impl Responder, Error> {
    let email = data.email.trim().to_lowercase();
    let otp = data.otp.trim().to_owned();
    if email.is_empty() || otp.is_empty() {
        return Err(Error::InvalidParam("Email and OTP are required".to_owned()));
    }

    let (user, verified_now) = state.service.verify_otp(&email, &otp).await?;
    Ok(web::Json(json!({
        "message": if verified_now {
            "Email verified successfully"
        } else {
            "Email already verified"
        },
        "user": user_view(&user),
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ResendOtpReq {
    email: String,
}

#[post("/resend-otp")]
pub async fn resend_otp(
    state: web::Data<AppState>,
    data: web::Json<ResendOtpReq>,
) -> Result<impl Responder, Error> {
    let email = data.email.trim().to_lowercase();
    if email.is_empty() {
        return Err(Error::InvalidParam("Email is required".to_owned()));
    }

    let (user, otp) = state.service.regenerate_otp(&email).await?;
    let (subject, body) = mail::otp_email(&otp);
    mail::send_detached(&state.mailer, user.email.clone(), subject, body);

    Ok(web::Json(json!({ "message": "OTP resent successfully" })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct LoginReq {
    email: String,
    password: String,
}

#[post("/login")]
pub async fn login(
    state: web::Data<AppState>,
    data: web::Json<LoginReq>,
) -> Result<impl Responder, Error> {
    let email = data.email.trim().to_lowercase();
    if email.is_empty() || data.password.is_empty() {
        return Err(Error::InvalidParam(
            "Email and password are required".to_owned(),
        ));
    }

    let user = state.service.get_user(&email).await?;
    let user = match user {
        Some(user) if auth::verify_password(&user.password_hash, &data.password) => user,
        _ => return Err(Error::Auth(auth::AuthError::Invalid(
            "Invalid email or password",
        ))),
    };
    if !user.is_verified {
        return Err(Error::Forbidden(
            "Please verify your email before login".to_owned(),
        ));
    }

    let access_token = JwtToken::generate(
        user.id,
        state.setting.auth.access_token_expiry,
        state.setting.auth.secret.as_bytes(),
    )?;
    Ok(web::Json(json!({
        "message": "Login successful",
        "access_token": access_token,
        "user": user_view(&user),
    })))
}

#[get("/profile")]
pub async fn get_profile(user: AuthedUser) -> Result<impl Responder, Error> {
    Ok(web::Json(json!({ "user": user_view(&user.user) })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct UpdateProfileReq {
    full_name: Option<String>,
    phone: Option<String>,
    avatar_url: Option<String>,
}

#[post("/profile")]
pub async fn update_profile(
    state: web::Data<AppState>,
    user: AuthedUser,
    data: web::Json<UpdateProfileReq>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();
    let full_name = match data.full_name {
        Some(v) => {
            let v = v.trim().to_owned();
            if v.is_empty() {
                return Err(Error::InvalidParam("Full name cannot be empty".to_owned()));
            }
            Some(v)
        }
        None => None,
    };
    let phone = match data.phone {
        Some(v) => {
            let v = v.trim().to_owned();
            if v.is_empty() {
                return Err(Error::InvalidParam("Phone cannot be empty".to_owned()));
            }
            Some(v)
        }
        None => None,
    };

    let user = state
        .service
        .update_profile(user.user.id, full_name, phone, data.avatar_url)
        .await?;
    Ok(web::Json(json!({
        "message": "Profile updated",
        "user": user_view(&user),
    })))
}

fn normalized_whatsapp(number: &str) -> String {
    let digits: String = number.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() == 10 {
        format!("91{}", digits)
    } else {
        digits
    }
}

#[get("/support")]
pub async fn support_info(state: web::Data<AppState>) -> Result<impl Responder, Error> {
    let smtp = &state.setting.smtp;
    let support_email = state
        .mailer
        .as_ref()
        .map(|m| m.support_email().to_owned())
        .or_else(|| smtp.support_email.clone());
    let whatsapp_digits = normalized_whatsapp(&smtp.support_whatsapp);
    let whatsapp_display = if whatsapp_digits.is_empty() {
        smtp.support_whatsapp.clone()
    } else {
        format!("+{}", whatsapp_digits)
    };
    Ok(web::Json(json!({
        "support_email": support_email,
        "whatsapp_number": if whatsapp_digits.is_empty() {
            smtp.support_whatsapp.clone()
        } else {
            whatsapp_digits
        },
        "whatsapp_display": whatsapp_display,
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct SupportReq {
    full_name: String,
    email: String,
    phone: String,
    subject: String,
    message: String,
}

#[post("/support")]
pub async fn send_support(
    state: web::Data<AppState>,
    data: web::Json<SupportReq>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();
    let email = data.email.trim().to_lowercase();
    let message = data.message.trim().to_owned();
    if email.is_empty() {
        return Err(Error::InvalidParam("Email is required".to_owned()));
    }
    if message.is_empty() {
        return Err(Error::InvalidParam("Message is required".to_owned()));
    }

    let mailer = state.mailer.as_ref().ok_or_else(|| {
        Error::ServiceUnavailable("Support email is not configured".to_owned())
    })?;
    let subject = {
        let s = data.subject.trim();
        if s.is_empty() {
            "Support request"
        } else {
            s
        }
    };
    let (subject, body) = mail::support_request_email(
        subject,
        data.full_name.trim(),
        &email,
        data.phone.trim(),
        &message,
    );
    mailer
        .send(&mailer.support_email().to_owned(), &subject, body)
        .await
        .map_err(|e| Error::Upstream(format!("Unable to send support request: {}", e)))?;

    Ok(web::Json(json!({
        "message": "Support request sent. Our team will contact you shortly."
    })))
}

fn review_view(review: &review::Model) -> Value {
    json!({
        "id": review.id,
        "user_id": review.user_id,
        "full_name": review.full_name,
        "email": review.email,
        "rating": review.rating,
        "review_text": review.review_text,
        "is_public": review.is_public,
        "created_at": review.created_at,
        "updated_at": review.updated_at,
    })
}

#[get("/reviews")]
pub async fn list_reviews(
    state: web::Data<AppState>,
    user: Option<AuthedUser>,
) -> Result<impl Responder, Error> {
    let reviews = state.service.list_public_reviews().await?;

    let total = reviews.len() as i64;
    let sum: i64 = reviews.iter().map(|r| r.rating as i64).sum();
    let average = if total > 0 {
        round2(sum as f64 / total as f64)
    } else {
        0.0
    };
    let breakdown: Value = json!({
        "1": reviews.iter().filter(|r| r.rating == 1).count(),
        "2": reviews.iter().filter(|r| r.rating == 2).count(),
        "3": reviews.iter().filter(|r| r.rating == 3).count(),
        "4": reviews.iter().filter(|r| r.rating == 4).count(),
        "5": reviews.iter().filter(|r| r.rating == 5).count(),
    });

    let current_user_review = match user {
        Some(user) => state
            .service
            .get_review(&user.user.email)
            .await?
            .map(|r| review_view(&r)),
        None => None,
    };

    Ok(web::Json(json!({
        "summary": {
            "average_rating": average,
            "total_reviews": total,
            "rating_breakdown": breakdown,
        },
        "reviews": reviews.iter().map(review_view).collect::<Vec<_>>(),
        "current_user_review": current_user_review,
    })))
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ReviewReq {
    full_name: String,
    #[serde(deserialize_with = "deserialize_option_number_from_string")]
    rating: Option<i16>,
    review_text: String,
}

#[post("/reviews")]
pub async fn post_review(
    state: web::Data<AppState>,
    user: AuthedUser,
    data: web::Json<ReviewReq>,
) -> Result<impl Responder, Error> {
    let data = data.into_inner();
    let rating = data
        .rating
        .ok_or_else(|| Error::InvalidParam("Rating is required".to_owned()))?;
    let full_name = {
        let name = data.full_name.trim();
        if name.is_empty() {
            user.user.full_name.clone()
        } else {
            name.to_owned()
        }
    };

    let (review, created) = state
        .service
        .upsert_review(
            &user.user,
            full_name,
            rating,
            data.review_text.trim().to_owned(),
        )
        .await?;
    Ok(web::Json(json!({
        "message": if created {
            "Review submitted successfully"
        } else {
            "Review updated successfully"
        },
        "review": review_view(&review),
    })))
}
