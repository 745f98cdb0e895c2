use crate::{Error, Result};
use config::{Config, Environment, File, FileFormat};
use notify::{event::ModifyKind, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::{fs, ops::Deref, path::Path, sync::Arc};
use tracing::{error, info};

pub const CARGO_PKG_VERSION: Option<&'static str> = option_env!("CARGO_PKG_VERSION");

/// number of threads config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(default)]
pub struct Thread {
    /// number of http server threads
    pub http: usize,
}

/// network config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Network {
    /// server bind host
    pub host: String,
    /// server bind port
    pub port: u16,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

/// auth config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Auth {
    /// jwt secret
    pub secret: String,

    /// jwt access token expiry in seconds
    pub access_token_expiry: usize,

    /// operator bearer token for the admin api, admin routes are disabled if not set
    pub admin_token: Option<String>,
}

impl Default for Auth {
    fn default() -> Self {
        Self {
            secret: "test".to_owned(),
            access_token_expiry: 2 * 24 * 60 * 60,
            admin_token: None,
        }
    }
}

/// payment gateway config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Gateway {
    pub key_id: String,
    pub key_secret: String,
    /// override the gateway REST base url, for tests
    pub api_base: Option<String>,
    /// outbound request timeout in seconds
    pub timeout: u64,
}

impl Default for Gateway {
    fn default() -> Self {
        Self {
            key_id: String::new(),
            key_secret: String::new(),
            api_base: None,
            timeout: 20,
        }
    }
}

impl Gateway {
    pub fn configured(&self) -> bool {
        !self.key_id.is_empty() && !self.key_secret.is_empty()
    }
}

/// mapbox geocoding and map link config
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Mapbox {
    pub access_token: String,
    /// override the geocoding base url, for tests
    pub api_base: Option<String>,
    /// outbound request timeout in seconds
    pub timeout: u64,
}

impl Default for Mapbox {
    fn default() -> Self {
        Self {
            access_token: String::new(),
            api_base: None,
            timeout: 15,
        }
    }
}

impl Mapbox {
    pub fn support(&self) -> bool {
        !self.access_token.is_empty()
    }
}

/// smtp config, mail is disabled if host or username is empty
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct Smtp {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// sender address, defaults to username
    pub from: Option<String>,
    /// recipient of paid-donation notifications, defaults to from
    pub admin_email: Option<String>,
    /// recipient of support requests, defaults to admin
    pub support_email: Option<String>,
    pub support_whatsapp: String,
}

impl Default for Smtp {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 587,
            username: String::new(),
            password: String::new(),
            from: None,
            admin_email: None,
            support_email: None,
            support_whatsapp: String::new(),
        }
    }
}

impl Smtp {
    pub fn configured(&self) -> bool {
        !self.host.is_empty() && !self.username.is_empty()
    }
}

/// donation pricing and impact constants
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(default)]
pub struct Donation {
    /// unit price per tree in whole currency units
    pub tree_price: i64,
    pub currency: String,
    /// co2 absorbed per tree per year, kg
    pub carbon_offset_kg_per_tree_year: f64,
}

impl Default for Donation {
    fn default() -> Self {
        Self {
            tree_price: 99,
            currency: "INR".to_owned(),
            carbon_offset_kg_per_tree_year: 21.0,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Setting {
    /// database url
    /// https://www.sea-ql.org/SeaORM/docs/install-and-config/connection/
    pub db_url: String,

    /// the public frontend url, used for tracking and certificate links
    pub site: Option<String>,

    pub thread: Thread,
    pub network: Network,

    pub auth: Auth,
    pub gateway: Gateway,
    pub mapbox: Mapbox,
    pub smtp: Smtp,
    pub donation: Donation,
}

impl Setting {
    pub fn site(&self) -> String {
        self.site
            .clone()
            .unwrap_or_else(|| format!("http://{}:{}", self.network.host, self.network.port))
    }
}

impl Default for Setting {
    fn default() -> Self {
        Self {
            db_url: "sqlite://grovebox.sqlite".to_string(),
            site: None,
            thread: Default::default(),
            network: Default::default(),
            auth: Default::default(),
            gateway: Default::default(),
            mapbox: Default::default(),
            smtp: Default::default(),
            donation: Default::default(),
        }
    }
}

impl PartialEq for Setting {
    fn eq(&self, other: &Self) -> bool {
        self.db_url == other.db_url
            && self.thread == other.thread
            && self.network == other.network
            && self.gateway == other.gateway
            && self.donation == other.donation
    }
}

#[derive(Debug, Clone)]
pub struct SettingWrapper {
    inner: Arc<RwLock<Setting>>,
    watcher: Option<Arc<RecommendedWatcher>>,
}

impl Deref for SettingWrapper {
    type Target = Arc<RwLock<Setting>>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl From<Setting> for SettingWrapper {
    fn from(setting: Setting) -> Self {
        Self {
            inner: Arc::new(RwLock::new(setting)),
            watcher: None,
        }
    }
}

impl SettingWrapper {
    /// reload setting from file
    pub fn reload<P: AsRef<Path>>(&self, file: P, env_prefix: Option<String>) -> Result<()> {
        let setting = Setting::read(&file, env_prefix)?;
        {
            let mut w = self.write();
            *w = setting;
        }
        Ok(())
    }

    /// config from file and watch file update then reload
    pub fn watch<P: AsRef<Path>, F: Fn(&SettingWrapper) + Send + 'static>(
        file: P,
        env_prefix: Option<String>,
        f: F,
    ) -> Result<Self> {
        let mut setting: SettingWrapper = Setting::read(&file, env_prefix.clone())?.into();
        let c_setting = setting.clone();

        // symbolic links
        let file = fs::canonicalize(file.as_ref())?;
        let c_file = file.clone();

        // support vim editor. watch dir
        // https://docs.rs/notify/latest/notify/#editor-behaviour
        let dir = file
            .parent()
            .ok_or_else(|| Error::Message("failed to get config dir".to_owned()))?;

        let mut watcher = RecommendedWatcher::new(
            move |result: Result<Event, notify::Error>| match result {
                Ok(event) => {
                    if matches!(event.kind, EventKind::Modify(ModifyKind::Data(_)))
                        && event.paths.contains(&c_file)
                    {
                        match c_setting.reload(&c_file, env_prefix.clone()) {
                            Ok(_) => {
                                info!("Reload config success {:?}", c_file);
                                info!("{:?}", c_setting.read());
                                f(&c_setting);
                            }
                            Err(e) => {
                                error!(
                                    error = e.to_string(),
                                    "failed to reload config {:?}", c_file
                                );
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(error = e.to_string(), "failed to watch file {:?}", c_file);
                }
            },
            notify::Config::default(),
        )?;

        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        // save watcher
        setting.watcher = Some(Arc::new(watcher));

        Ok(setting)
    }
}

impl Setting {
    /// read config from file and env
    pub fn read<P: AsRef<Path>>(file: P, env_prefix: Option<String>) -> Result<Self> {
        let builder = Config::builder();
        let mut config = builder
            // Use serde default feature
            // override with file contents
            .add_source(File::with_name(file.as_ref().to_str().unwrap()));
        if let Some(prefix) = env_prefix {
            config = config.add_source(Self::env_source(&prefix));
        }

        let config = config.build()?;
        let mut setting: Setting = config.try_deserialize()?;
        setting.validate()?;
        Ok(setting)
    }

    fn env_source(prefix: &str) -> Environment {
        Environment::with_prefix(prefix)
            .try_parsing(true)
            .prefix_separator("_")
            .separator("__")
    }

    /// read config from env
    pub fn from_env(env_prefix: String) -> Result<Self> {
        let mut config = Config::builder();
        config = config.add_source(Self::env_source(&env_prefix));

        let config = config.build()?;
        let mut setting: Setting = config.try_deserialize()?;
        setting.validate()?;
        Ok(setting)
    }

    /// config from str
    pub fn from_str(s: &str, format: FileFormat) -> Result<Self> {
        let builder = Config::builder();
        let config = builder.add_source(File::from_str(s, format)).build()?;
        let mut setting: Setting = config.try_deserialize()?;
        setting.validate()?;
        Ok(setting)
    }

    fn validate(&mut self) -> Result<()> {
        if self.donation.tree_price <= 0 {
            return Err(Error::Message(
                "donation.tree_price must be greater than 0".to_owned(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use config::FileFormat;
    use std::{fs, thread::sleep, time::Duration};
    use tempfile::Builder;

    #[test]
    fn der() -> Result<()> {
        let json = r#"{
            "network": {"port": 1},
            "thread": {"http": 1},
            "donation": {"tree_price": 120}
        }"#;

        let mut def = Setting::default();
        def.network.port = 1;
        def.thread.http = 1;
        def.donation.tree_price = 120;

        let s2 = serde_json::from_str::<Setting>(json)?;
        let s1: Setting = Setting::from_str(json, FileFormat::Json)?;

        assert_eq!(def, s1);
        assert_eq!(def, s2);

        Ok(())
    }

    #[test]
    fn invalid_price() {
        let res = Setting::from_str(r#"{"donation": {"tree_price": 0}}"#, FileFormat::Json);
        assert!(res.is_err());
    }

    #[test]
    fn read() -> Result<()> {
        let setting = Setting::default();
        assert_eq!(setting.network.host, "127.0.0.1");
        assert_eq!(setting.donation.tree_price, 99);

        let file = Builder::new()
            .prefix("grovebox-config-test-read")
            .suffix(".toml")
            .rand_bytes(0)
            .tempfile()?;

        let setting = Setting::read(&file, None)?;
        assert_eq!(setting.network.host, "127.0.0.1");
        fs::write(
            &file,
            r#"
        [network]
        host = "127.0.0.2"
        "#,
        )?;

        temp_env::with_vars(
            [
                ("GB_network.port", Some("1")),
                ("GB_network__host", Some("127.0.0.3")),
            ],
            || {
                let setting = Setting::read(&file, Some("GB".to_owned())).unwrap();
                assert_eq!(setting.network.host, "127.0.0.3".to_string());
                assert_eq!(setting.network.port, 1);
            },
        );
        Ok(())
    }

    #[test]
    fn watch() -> Result<()> {
        let file = Builder::new()
            .prefix("grovebox-config-test-watch")
            .suffix(".toml")
            .tempfile()?;

        let setting = SettingWrapper::watch(&file, None, |_s| {})?;
        {
            let r = setting.read();
            assert_eq!(r.network.port, 8080);
        }

        fs::write(
            &file,
            r#"[network]
    port = 1
    "#,
        )?;
        sleep(Duration::from_millis(300));
        {
            let r = setting.read();
            assert_eq!(r.network.port, 1);
        }
        Ok(())
    }
}
