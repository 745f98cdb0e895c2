//! mapbox geocoding and map link helpers

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_API_BASE: &str = "https://api.mapbox.com";

/// percent-encode a single path or query component
fn encode(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for b in s.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(b as char)
            }
            _ => out.push_str(&format!("%{:02X}", b)),
        }
    }
    out
}

#[derive(Debug, Clone, Serialize)]
pub struct Place {
    pub place_name: String,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

/// forward geocoding client
pub struct Geocoder {
    http: reqwest::Client,
    token: String,
    base: String,
}

impl Geocoder {
    pub fn new(token: String, base: Option<String>, timeout: Option<Duration>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout.unwrap_or(Duration::from_secs(15)))
            .build()
            .map_err(|e| Error::Message(e.to_string()))?;
        Ok(Self {
            http,
            token,
            base: base.unwrap_or_else(|| DEFAULT_API_BASE.to_owned()),
        })
    }

    /// resolve a free-text location query, capped at 5 places
    pub async fn search(&self, query: &str, country: Option<&str>) -> Result<Vec<Place>> {
        #[derive(Deserialize)]
        struct Feature {
            place_name: Option<String>,
            #[serde(default)]
            center: Vec<f64>,
        }
        #[derive(Deserialize)]
        struct FeatureCollection {
            #[serde(default)]
            features: Vec<Feature>,
        }

        let url = format!(
            "{}/geocoding/v5/mapbox.places/{}.json",
            self.base,
            encode(query)
        );
        let mut params = vec![
            ("access_token", self.token.clone()),
            ("autocomplete", "true".to_owned()),
            ("limit", "5".to_owned()),
            ("types", "place,locality,neighborhood,address".to_owned()),
            ("language", "en".to_owned()),
        ];
        if let Some(country) = country {
            if !country.is_empty() {
                params.push(("country", country.to_lowercase()));
            }
        }

        let resp = self
            .http
            .get(url)
            .query(&params)
            .send()
            .await
            .map_err(|e| Error::Upstream(format!("Unable to fetch locations: {}", e)))?;
        if !resp.status().is_success() {
            return Err(Error::Upstream("Unable to fetch locations".to_owned()));
        }
        let payload: FeatureCollection = resp
            .json()
            .await
            .map_err(|e| Error::Upstream(format!("Unable to fetch locations: {}", e)))?;

        Ok(payload
            .features
            .into_iter()
            .map(|f| Place {
                place_name: f.place_name.unwrap_or_default(),
                latitude: f.center.get(1).copied(),
                longitude: f.center.first().copied(),
            })
            .collect())
    }
}

/// interactive map centered on the coordinates
pub fn live_map_url(token: &str, latitude: Option<f64>, longitude: Option<f64>) -> Option<String> {
    let (latitude, longitude) = (latitude?, longitude?);
    if token.is_empty() {
        return None;
    }
    Some(format!(
        "https://api.mapbox.com/styles/v1/mapbox/streets-v12.html\
        ?title=false&zoomwheel=true&access_token={}#14/{}/{}",
        encode(token),
        latitude,
        longitude
    ))
}

/// live map when coordinates exist, text search otherwise
pub fn search_url(
    token: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
    location_text: &str,
) -> Option<String> {
    if let Some(url) = live_map_url(token, latitude, longitude) {
        return Some(url);
    }
    if !location_text.is_empty() {
        return Some(format!(
            "https://www.mapbox.com/search?query={}",
            encode(location_text)
        ));
    }
    None
}

/// static preview image with a pin
pub fn static_map_url(
    token: &str,
    latitude: Option<f64>,
    longitude: Option<f64>,
) -> Option<String> {
    let (latitude, longitude) = (latitude?, longitude?);
    if token.is_empty() {
        return None;
    }
    Some(format!(
        "https://api.mapbox.com/styles/v1/mapbox/streets-v12/static/\
        pin-s+0f766e({lon},{lat})/{lon},{lat},13,0/720x360?access_token={token}",
        lon = longitude,
        lat = latitude,
        token = token
    ))
}
