use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry of the fixed dashboard city list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct City {
    /// Numeric OpenWeather city code, kept as a string (it is only ever
    /// passed through as a query parameter or used as a map key).
    pub code: String,
    pub name: String,
}

impl City {
    pub fn new(code: impl Into<String>, name: impl Into<String>) -> Self {
        Self { code: code.into(), name: name.into() }
    }
}

/// Current conditions for one dashboard card.
///
/// Immutable once constructed; a fresh fetch supersedes the value, it is
/// never mutated in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSummary {
    pub id: String,
    pub city_name: String,
    pub description: String,
    pub temperature_c: f64,
}

impl WeatherSummary {
    /// Placeholder for a city whose fetch failed inside a batch load. The
    /// grid slot for the city is kept; the card just reads "unavailable".
    pub fn unavailable(city: &City) -> Self {
        Self {
            id: city.code.clone(),
            city_name: city.name.clone(),
            description: "unavailable".to_string(),
            temperature_c: f64::NAN,
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.temperature_c.is_nan()
    }
}

/// Full conditions for the drill-down view. Same lifecycle rules as
/// [`WeatherSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherDetail {
    pub id: String,
    pub city_name: String,
    /// Human-readable observation date in the city's local time.
    pub date: String,
    pub description: String,
    pub temperature_c: f64,
    pub temp_min_c: f64,
    pub temp_max_c: f64,
    pub pressure_hpa: f64,
    pub humidity_pct: f64,
    pub visibility_m: f64,
    pub wind_speed_mps: f64,
    pub wind_deg: f64,
    /// Formatted local time strings, e.g. "6:04 AM".
    pub sunrise: String,
    pub sunset: String,
}

/// Who the identity provider says is signed in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub picture: Option<String>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}
