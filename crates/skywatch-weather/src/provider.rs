//! OpenWeatherMap "current weather" client.

use crate::types::{Observation, MAX_CONDITION_LEN};
use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use skywatch_core::{ConfigError, NetworkError, ReqwestErrorExt, WeatherConfig, WeatherError};
use std::sync::Arc;
use std::time::Duration;

/// Readings are stored in °C
const UNITS: &str = "metric";

#[derive(Debug, Deserialize)]
struct CurrentWeatherResponse {
    weather: Vec<ConditionEntry>,
    main: MainBlock,
    dt: i64,
}

#[derive(Debug, Deserialize)]
struct ConditionEntry {
    main: String,
}

#[derive(Debug, Deserialize)]
struct MainBlock {
    temp: f64,
    feels_like: f64,
}

/// Parse a current-weather JSON body into an observation.
///
/// Missing or mistyped fields, an empty `weather` array, an out-of-range
/// `dt` and non-finite temperatures are all reported as
/// [`WeatherError::MalformedResponse`].
pub fn parse_current(body: &str) -> Result<Observation, WeatherError> {
    let response: CurrentWeatherResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::malformed(e.to_string()))?;

    let condition = response
        .weather
        .into_iter()
        .next()
        .map(|entry| entry.main)
        .ok_or_else(|| WeatherError::malformed("`weather` array is empty"))?;

    if condition.trim().is_empty() {
        return Err(WeatherError::malformed("`weather[0].main` is empty"));
    }
    if condition.chars().count() > MAX_CONDITION_LEN {
        return Err(WeatherError::malformed(format!(
            "`weather[0].main` longer than {} characters",
            MAX_CONDITION_LEN
        )));
    }

    let MainBlock { temp, feels_like } = response.main;
    if !temp.is_finite() || !feels_like.is_finite() {
        return Err(WeatherError::malformed("non-finite temperature"));
    }

    let observed_at = DateTime::<Utc>::from_timestamp(response.dt, 0)
        .ok_or_else(|| WeatherError::malformed(format!("`dt` out of range: {}", response.dt)))?;

    Ok(Observation {
        condition,
        temp,
        feels_like,
        observed_at,
    })
}

/// HTTP client for the provider's current-weather endpoint
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    client: Arc<Client>,
    base_url: String,
    api_key: Option<String>,
}

impl OpenWeatherClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, ConfigError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ConfigError::Invalid(format!("HTTP client: {}", e)))?;

        Ok(Self {
            client: Arc::new(client),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key,
        })
    }

    pub fn from_config(config: &WeatherConfig) -> Result<Self, ConfigError> {
        Self::new(
            config.base_url.clone(),
            config.api_key().map(str::to_string),
            config.request_timeout(),
        )
    }

    /// Fetch current conditions for `location` (a city name).
    ///
    /// # Errors
    /// Transport failures and non-2xx statuses become
    /// [`WeatherError::Network`], except 401 ([`WeatherError::InvalidApiKey`])
    /// and 404 ([`WeatherError::LocationNotFound`]). Unusable bodies become
    /// [`WeatherError::MalformedResponse`].
    pub async fn current(&self, location: &str) -> Result<Observation, WeatherError> {
        let api_key = self.api_key.as_deref().ok_or(WeatherError::MissingApiKey)?;
        let url = format!("{}/weather", self.base_url);

        tracing::debug!("Requesting current weather for {}", location);

        // without_url keeps the appid query parameter out of error messages
        let response = self
            .client
            .get(&url)
            .query(&[("q", location), ("appid", api_key), ("units", UNITS)])
            .send()
            .await
            .map_err(|e| e.without_url().into_network_error())?;

        let status = response.status();
        match status {
            StatusCode::UNAUTHORIZED => return Err(WeatherError::InvalidApiKey),
            StatusCode::NOT_FOUND => {
                return Err(WeatherError::LocationNotFound(location.to_string()))
            }
            s if !s.is_success() => {
                return Err(NetworkError::ServerError {
                    status: s.as_u16(),
                    message: s.canonical_reason().unwrap_or("unknown status").to_string(),
                }
                .into())
            }
            _ => {}
        }

        let body = response
            .text()
            .await
            .map_err(|e| e.without_url().into_network_error())?;

        parse_current(&body)
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_body() -> serde_json::Value {
        serde_json::json!({
            "coord": { "lon": -0.1257, "lat": 51.5085 },
            "weather": [
                { "id": 803, "main": "Clouds", "description": "broken clouds", "icon": "04d" }
            ],
            "main": { "temp": 14.2, "feels_like": 13.6, "pressure": 1012, "humidity": 77 },
            "dt": 1_700_000_000,
            "name": "London"
        })
    }

    fn client_for(server: &MockServer, key: Option<&str>) -> OpenWeatherClient {
        OpenWeatherClient::new(server.uri(), key.map(str::to_string), Duration::from_secs(5))
            .unwrap()
    }

    #[test]
    fn test_parse_current() {
        let obs = parse_current(&sample_body().to_string()).unwrap();
        assert_eq!(obs.condition, "Clouds");
        assert_eq!(obs.temp, 14.2);
        assert_eq!(obs.feels_like, 13.6);
        assert_eq!(obs.observed_at.timestamp(), 1_700_000_000);
    }

    #[test]
    fn test_parse_uses_first_condition() {
        let mut body = sample_body();
        body["weather"] = serde_json::json!([{ "main": "Rain" }, { "main": "Mist" }]);
        assert_eq!(parse_current(&body.to_string()).unwrap().condition, "Rain");
    }

    #[test]
    fn test_parse_missing_field_is_malformed() {
        let mut body = sample_body();
        body["main"].as_object_mut().unwrap().remove("feels_like");
        assert!(parse_current(&body.to_string()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_mistyped_field_is_malformed() {
        let mut body = sample_body();
        body["dt"] = serde_json::json!("yesterday");
        assert!(parse_current(&body.to_string()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_empty_weather_is_malformed() {
        let mut body = sample_body();
        body["weather"] = serde_json::json!([]);
        assert!(parse_current(&body.to_string()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_overlong_condition_is_malformed() {
        let mut body = sample_body();
        body["weather"][0]["main"] = serde_json::json!("x".repeat(MAX_CONDITION_LEN + 1));
        assert!(parse_current(&body.to_string()).unwrap_err().is_malformed());
    }

    #[test]
    fn test_parse_not_json_is_malformed() {
        assert!(parse_current("<html>gateway</html>").unwrap_err().is_malformed());
    }

    #[tokio::test]
    async fn test_current_sends_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/weather"))
            .and(query_param("q", "Oslo"))
            .and(query_param("appid", "secret"))
            .and(query_param("units", "metric"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(1)
            .mount(&server)
            .await;

        let obs = client_for(&server, Some("secret")).current("Oslo").await.unwrap();
        assert_eq!(obs.condition, "Clouds");
    }

    #[tokio::test]
    async fn test_current_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let err = client_for(&server, Some("secret")).current("London").await.unwrap_err();
        match err {
            WeatherError::Network(net) => assert_eq!(net.status(), Some(500)),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_current_unauthorized_and_not_found() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(query_param("q", "Nowhere"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(query_param("q", "London"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("bad"));
        assert!(matches!(
            client.current("Nowhere").await,
            Err(WeatherError::LocationNotFound(loc)) if loc == "Nowhere"
        ));
        assert!(matches!(client.current("London").await, Err(WeatherError::InvalidApiKey)));
    }

    #[tokio::test]
    async fn test_current_without_key_makes_no_request() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample_body()))
            .expect(0)
            .mount(&server)
            .await;

        let err = client_for(&server, None).current("London").await.unwrap_err();
        assert!(matches!(err, WeatherError::MissingApiKey));
    }
}
