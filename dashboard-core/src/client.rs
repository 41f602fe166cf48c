use anyhow::{Context, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Offset, Utc};
use futures::future::join_all;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::{
    cache::Cache,
    error::{Error, Result},
    model::{City, WeatherDetail, WeatherSummary},
};

pub const OPENWEATHER_BASE_URL: &str = "https://api.openweathermap.org";

/// Lookup seam the dashboard controller is driven through. Implemented by
/// [`OpenWeatherClient`] for real and by stubs in controller tests.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    async fn summary_by_id(&self, id: &str) -> Result<WeatherSummary>;
    async fn summary_by_name(&self, name: &str) -> Result<WeatherSummary>;
    async fn detail_by_id(&self, id: &str) -> Result<WeatherDetail>;

    /// Fetch every city concurrently. The result always has one entry per
    /// input city, in input order; a per-city failure becomes a placeholder
    /// card instead of failing the batch.
    async fn all_summaries(&self, cities: &[City]) -> Result<Vec<WeatherSummary>>;
}

/// Client for the OpenWeather "current weather" endpoint with the cache as
/// a front-line lookup. On a cache hit the stored value is returned
/// unchanged; there is no re-validation against upstream within the TTL.
pub struct OpenWeatherClient {
    api_key: Option<String>,
    http: Client,
    cache: Cache,
    base_url: String,
}

impl OpenWeatherClient {
    pub fn new(api_key: Option<String>, cache: Cache) -> Self {
        Self::with_base_url(api_key, cache, OPENWEATHER_BASE_URL)
    }

    pub fn with_base_url(
        api_key: Option<String>,
        cache: Cache,
        base_url: impl Into<String>,
    ) -> Self {
        Self {
            api_key,
            http: Client::new(),
            cache,
            base_url: base_url.into(),
        }
    }

    /// Checked before the cache and before any network I/O.
    fn credential(&self) -> Result<&str> {
        self.api_key.as_deref().ok_or(Error::MissingApiKey)
    }

    fn cached<T: for<'de> Deserialize<'de>>(&self, key: &str) -> Option<T> {
        let value = self.cache.get(key)?;
        match serde_json::from_value(value) {
            Ok(decoded) => Some(decoded),
            Err(e) => {
                // Undecodable payload counts as a miss; the fresh fetch
                // below overwrites it.
                warn!(key, error = %e, "cached payload did not decode");
                None
            }
        }
    }

    fn store<T: Serialize>(&self, key: &str, value: &T) {
        match serde_json::to_value(value) {
            Ok(json) => self.cache.put(key, json),
            Err(e) => warn!(key, error = %e, "failed to encode cache payload"),
        }
    }

    /// One GET against `/data/2.5/weather`. `label` names what was looked
    /// up, for the not-found error.
    async fn fetch_raw(&self, lookup: (&str, &str), label: &str) -> Result<OwResponse> {
        let api_key = self.credential()?;
        let url = format!("{}/data/2.5/weather", self.base_url);

        let res = self
            .http
            .get(&url)
            .query(&[lookup, ("appid", api_key), ("units", "metric")])
            .send()
            .await
            .context("Failed to send request to OpenWeather")
            .map_err(Error::Upstream)?;

        let status = res.status();
        let body = res
            .text()
            .await
            .context("Failed to read OpenWeather response body")
            .map_err(Error::Upstream)?;

        if status == StatusCode::NOT_FOUND {
            return Err(Error::CityNotFound(label.to_string()));
        }

        if !status.is_success() {
            return Err(Error::Upstream(anyhow!(
                "OpenWeather request failed with status {}: {}",
                status,
                truncate_body(&body),
            )));
        }

        let parsed: OwResponse = serde_json::from_str(&body)
            .context("Failed to parse OpenWeather JSON")
            .map_err(Error::Upstream)?;

        Ok(parsed)
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn summary_by_id(&self, id: &str) -> Result<WeatherSummary> {
        self.credential()?;

        let key = summary_id_key(id);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let raw = self.fetch_raw(("id", id), id).await?;
        let summary = raw.to_summary();
        self.store(&key, &summary);
        Ok(summary)
    }

    async fn summary_by_name(&self, name: &str) -> Result<WeatherSummary> {
        self.credential()?;

        let key = summary_name_key(name);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let raw = self.fetch_raw(("q", name), name).await?;
        let summary = raw.to_summary();
        self.store(&key, &summary);
        Ok(summary)
    }

    async fn detail_by_id(&self, id: &str) -> Result<WeatherDetail> {
        self.credential()?;

        let key = detail_key(id);
        if let Some(hit) = self.cached(&key) {
            return Ok(hit);
        }

        let raw = self.fetch_raw(("id", id), id).await?;
        let detail = raw.to_detail();
        self.store(&key, &detail);
        Ok(detail)
    }

    async fn all_summaries(&self, cities: &[City]) -> Result<Vec<WeatherSummary>> {
        // A missing credential fails the whole batch; any other per-city
        // failure is downgraded to a placeholder so the grid still renders.
        self.credential()?;

        let fetches = cities.iter().map(|city| async move {
            match self.summary_by_id(&city.code).await {
                Ok(summary) => summary,
                Err(e) => {
                    warn!(city = %city.name, error = %e, "city fetch failed, rendering placeholder");
                    WeatherSummary::unavailable(city)
                }
            }
        });

        // join_all keeps input order, so each result lands in its own slot
        // no matter which fetch finishes first.
        Ok(join_all(fetches).await)
    }
}

fn summary_id_key(id: &str) -> String {
    format!("weather:id:{id}")
}

/// Name lookups are cached case-insensitively.
fn summary_name_key(name: &str) -> String {
    format!("weather:name:{}", name.trim().to_lowercase())
}

fn detail_key(id: &str) -> String {
    format!("weather:detail:{id}")
}

/// Raw OpenWeather response. Every field is defaulted: upstream absence is
/// not an error, it maps to zero / empty / "Clear Sky" in the models.
#[derive(Debug, Default, Deserialize)]
struct OwResponse {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    weather: Vec<OwWeather>,
    #[serde(default)]
    main: OwMain,
    #[serde(default)]
    visibility: f64,
    #[serde(default)]
    wind: OwWind,
    #[serde(default)]
    sys: OwSys,
    #[serde(default)]
    dt: i64,
    /// UTC offset of the city, in seconds.
    #[serde(default)]
    timezone: i64,
}

#[derive(Debug, Default, Deserialize)]
struct OwWeather {
    #[serde(default)]
    description: String,
    #[serde(default)]
    main: String,
}

#[derive(Debug, Default, Deserialize)]
struct OwMain {
    #[serde(default)]
    temp: f64,
    #[serde(default)]
    temp_min: f64,
    #[serde(default)]
    temp_max: f64,
    #[serde(default)]
    pressure: f64,
    #[serde(default)]
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    #[serde(default)]
    sunrise: i64,
    #[serde(default)]
    sunset: i64,
}

impl OwResponse {
    fn description(&self) -> String {
        let text = self
            .weather
            .first()
            .map(|w| {
                if w.description.is_empty() {
                    w.main.clone()
                } else {
                    w.description.clone()
                }
            })
            .unwrap_or_default();

        if text.is_empty() {
            "Clear Sky".to_string()
        } else {
            title_case(&text)
        }
    }

    fn id_string(&self) -> String {
        self.id.map(|id| id.to_string()).unwrap_or_default()
    }

    fn local_offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.timezone as i32).unwrap_or_else(|| Utc.fix())
    }

    fn to_summary(&self) -> WeatherSummary {
        WeatherSummary {
            id: self.id_string(),
            city_name: self.name.clone(),
            description: self.description(),
            temperature_c: self.main.temp,
        }
    }

    fn to_detail(&self) -> WeatherDetail {
        let offset = self.local_offset();

        WeatherDetail {
            id: self.id_string(),
            city_name: self.name.clone(),
            date: format_local(self.dt, offset, "%-I:%M%P, %b %-d"),
            description: self.description(),
            temperature_c: self.main.temp,
            temp_min_c: self.main.temp_min,
            temp_max_c: self.main.temp_max,
            pressure_hpa: self.main.pressure,
            humidity_pct: self.main.humidity,
            visibility_m: self.visibility,
            wind_speed_mps: self.wind.speed,
            wind_deg: self.wind.deg,
            sunrise: format_local(self.sys.sunrise, offset, "%-I:%M %p"),
            sunset: format_local(self.sys.sunset, offset, "%-I:%M %p"),
        }
    }
}

fn format_local(ts: i64, offset: FixedOffset, fmt: &str) -> String {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|dt| dt.with_timezone(&offset).format(fmt).to_string())
        .unwrap_or_default()
}

fn title_case(text: &str) -> String {
    text.split_whitespace()
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        format!("{}...", &body[..MAX])
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{DEFAULT_TTL_MS, SystemClock};
    use crate::storage::MemoryStorage;
    use serde_json::json;
    use std::sync::Arc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn memory_cache() -> Cache {
        Cache::new(
            Arc::new(MemoryStorage::default()),
            Arc::new(SystemClock),
            DEFAULT_TTL_MS,
        )
    }

    fn paris_body() -> serde_json::Value {
        json!({
            "id": 2988507,
            "name": "Paris",
            "dt": 1_700_000_000,
            "timezone": 3600,
            "weather": [{"main": "Clouds", "description": "few clouds"}],
            "main": {
                "temp": 12.3,
                "temp_min": 9.0,
                "temp_max": 14.5,
                "pressure": 1013.0,
                "humidity": 76.0
            },
            "visibility": 8000.0,
            "wind": {"speed": 4.2, "deg": 250.0},
            // 2023-11-14 06:30:00Z and 16:15:00Z
            "sys": {"sunrise": 1_699_943_400, "sunset": 1_699_978_500}
        })
    }

    #[tokio::test]
    async fn summary_by_name_normalizes_the_response() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("q", "Paris"))
            .and(query_param("units", "metric"))
            .and(query_param("appid", "KEY"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url(Some("KEY".into()), memory_cache(), server.uri());
        let summary = client.summary_by_name("Paris").await.expect("summary");

        assert_eq!(summary.id, "2988507");
        assert_eq!(summary.city_name, "Paris");
        assert_eq!(summary.description, "Few Clouds");
        assert!((summary.temperature_c - 12.3).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn second_lookup_is_served_from_cache() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .expect(1)
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url(Some("KEY".into()), memory_cache(), server.uri());
        let first = client.summary_by_name("Paris").await.expect("first");
        // Cached case-insensitively under the lowercased name.
        let second = client.summary_by_name("PARIS").await.expect("second");

        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn missing_api_key_fails_before_any_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .expect(0)
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url(None, memory_cache(), server.uri());
        let err = client.summary_by_name("Paris").await.unwrap_err();

        assert!(matches!(err, Error::MissingApiKey));
    }

    #[tokio::test]
    async fn not_found_city_is_a_distinct_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(404).set_body_json(json!({
                "cod": "404", "message": "city not found"
            })))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url(Some("KEY".into()), memory_cache(), server.uri());
        let err = client.summary_by_name("Nowhereville").await.unwrap_err();

        assert!(err.is_not_found());
        assert!(err.to_string().contains("Nowhereville"));
    }

    #[tokio::test]
    async fn missing_upstream_fields_default_instead_of_erroring() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url(Some("KEY".into()), memory_cache(), server.uri());
        let summary = client.summary_by_name("Paris").await.expect("summary");

        assert_eq!(summary.id, "");
        assert_eq!(summary.city_name, "");
        assert_eq!(summary.description, "Clear Sky");
        assert_eq!(summary.temperature_c, 0.0);
    }

    #[tokio::test]
    async fn batch_keeps_order_and_length_despite_failures() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("id", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": 1,
                "name": "A",
                "weather": [{"description": "clear sky"}],
                "main": {"temp": 21.0}
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("id", "2"))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url(Some("KEY".into()), memory_cache(), server.uri());
        let cities = vec![City::new("1", "A"), City::new("2", "B")];
        let cards = client.all_summaries(&cities).await.expect("batch");

        assert_eq!(cards.len(), 2);
        assert_eq!(cards[0].id, "1");
        assert_eq!(cards[0].description, "Clear Sky");
        assert!((cards[0].temperature_c - 21.0).abs() < f64::EPSILON);

        assert_eq!(cards[1].id, "2");
        assert_eq!(cards[1].city_name, "B");
        assert_eq!(cards[1].description, "unavailable");
        assert!(cards[1].temperature_c.is_nan());
    }

    #[tokio::test]
    async fn batch_fails_as_a_whole_only_on_missing_credential() {
        let client = OpenWeatherClient::with_base_url(None, memory_cache(), "http://127.0.0.1:9");
        let cities = vec![City::new("1", "A")];
        let err = client.all_summaries(&cities).await.unwrap_err();

        assert!(matches!(err, Error::MissingApiKey));
    }

    #[tokio::test]
    async fn detail_formats_local_times() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/data/2.5/weather"))
            .and(query_param("id", "2988507"))
            .respond_with(ResponseTemplate::new(200).set_body_json(paris_body()))
            .mount(&server)
            .await;

        let client = OpenWeatherClient::with_base_url(Some("KEY".into()), memory_cache(), server.uri());
        let detail = client.detail_by_id("2988507").await.expect("detail");

        assert_eq!(detail.city_name, "Paris");
        assert!((detail.temp_min_c - 9.0).abs() < f64::EPSILON);
        assert!((detail.visibility_m - 8000.0).abs() < f64::EPSILON);
        // The +1h offset shifts the 06:30Z sunrise to 7:30 local time.
        assert_eq!(detail.sunrise, "7:30 AM");
        assert_eq!(detail.sunset, "5:15 PM");
        // dt is 2023-11-14 22:13:20Z, i.e. 23:13 local.
        assert_eq!(detail.date, "11:13pm, Nov 14");
    }

    #[test]
    fn name_keys_are_case_insensitive() {
        assert_eq!(summary_name_key("  Paris "), summary_name_key("paris"));
        assert_eq!(summary_name_key("NEW YORK"), "weather:name:new york");
    }

    #[test]
    fn title_case_capitalizes_each_word() {
        assert_eq!(title_case("few clouds"), "Few Clouds");
        assert_eq!(title_case("mist"), "Mist");
    }
}
