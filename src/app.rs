use crate::{
    admin, donations, mail::Mailer, mapbox::Geocoder, setting::Setting, users, Result, Service,
};
use actix_cors::Cors;
use actix_web::{
    body::MessageBody,
    dev::{ServiceFactory, ServiceRequest},
    middleware, web, App as WebApp, HttpServer,
};
use razorpay_client::Razorpay;
use sea_orm::{ConnectOptions, Database};
use std::{path::Path, sync::Arc, time::Duration};
use tracing::info;

pub struct AppState {
    pub service: Service,
    pub setting: Setting,
    pub mailer: Option<Arc<Mailer>>,
    pub geocoder: Option<Geocoder>,
}

impl AppState {
    pub async fn create<P: AsRef<Path>>(
        setting_path: Option<P>,
        setting_env_prefix: Option<String>,
    ) -> Result<Self> {
        let env_notice = setting_env_prefix
            .as_ref()
            .map(|s| {
                format!(
                    ", config will be overrided by ENV seting with prefix `{}_`",
                    s
                )
            })
            .unwrap_or_default();

        let setting = if let Some(path) = setting_path {
            info!("Load config {:?}{}", path.as_ref(), env_notice);
            Setting::read(path.as_ref(), setting_env_prefix)?
        } else if let Some(prefix) = setting_env_prefix {
            info!("Load default config{}", env_notice);
            Setting::from_env(prefix)?
        } else {
            info!("Load default config");
            Setting::default()
        };

        Self::from_setting(setting).await
    }

    pub async fn from_setting(setting: Setting) -> Result<Self> {
        let gateway = Razorpay::new(
            setting.gateway.key_id.clone(),
            setting.gateway.key_secret.clone(),
            setting.gateway.api_base.clone(),
            Some(Duration::from_secs(setting.gateway.timeout)),
        )
        .map_err(|e| crate::Error::Message(e.to_string()))?;

        let mut options = ConnectOptions::from(&setting.db_url);
        options.sqlx_logging_level(tracing::log::LevelFilter::Trace);
        let conn = Database::connect(options).await?;
        let service = Service::new(Box::new(gateway), conn);

        let mailer = Mailer::from_setting(&setting.smtp)?.map(Arc::new);
        if mailer.is_none() {
            info!("smtp not configured, mail disabled");
        }
        let geocoder = if setting.mapbox.support() {
            Some(Geocoder::new(
                setting.mapbox.access_token.clone(),
                setting.mapbox.api_base.clone(),
                Some(Duration::from_secs(setting.mapbox.timeout)),
            )?)
        } else {
            info!("mapbox not configured, geocoding disabled");
            None
        };

        Ok(Self {
            service,
            setting,
            mailer,
            geocoder,
        })
    }
}

pub fn create_web_app(
    data: web::Data<AppState>,
) -> WebApp<
    impl ServiceFactory<
        ServiceRequest,
        Config = (),
        Response = actix_web::dev::ServiceResponse<impl MessageBody>,
        Error = actix_web::Error,
        InitError = (),
    >,
> {
    let cors = match &data.setting.site {
        Some(site) => Cors::default()
            .allowed_origin(site)
            .allow_any_header()
            .allow_any_method()
            .supports_credentials()
            .max_age(86_400),
        None => Cors::permissive(),
    };
    WebApp::new()
        .app_data(data)
        .wrap(middleware::Logger::default()) // enable logger
        .wrap(cors)
        .service(users::scope())
        .service(donations::scope())
        .service(admin::scope())
}

/// start app
pub async fn start(state: AppState) -> Result<()> {
    let state = web::Data::new(state);

    let c_data = state.clone();
    let server = HttpServer::new(move || create_web_app(c_data.clone()));
    let num = if state.setting.thread.http == 0 {
        num_cpus::get()
    } else {
        state.setting.thread.http
    };
    let host = state.setting.network.host.clone();
    let port = state.setting.network.port;
    info!("Start http server {}:{}", host, port);
    server.workers(num).bind((host, port))?.run().await?;
    Ok(())
}
