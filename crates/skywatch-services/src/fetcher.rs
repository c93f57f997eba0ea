//! Weather fetcher: one provider request, one stored reading.

use skywatch_core::AppResult;
use skywatch_weather::OpenWeatherClient;

use crate::store::SharedStore;
use crate::store_backend::ReadingStore;

#[derive(Clone)]
pub struct WeatherFetcher {
    client: OpenWeatherClient,
    store: SharedStore,
    default_location: String,
}

impl WeatherFetcher {
    pub fn new(
        client: OpenWeatherClient,
        store: SharedStore,
        default_location: impl Into<String>,
    ) -> Self {
        Self {
            client,
            store,
            default_location: default_location.into(),
        }
    }

    pub fn default_location(&self) -> &str {
        &self.default_location
    }

    /// Fetch current weather for `location` (or the default location) and
    /// store it as a reading timestamped with the provider's observation
    /// time.
    ///
    /// Returns `Ok(false)` without writing anything when the request fails
    /// or the response is unusable; the caller decides what happens next.
    ///
    /// # Errors
    /// Only store failures are returned as errors.
    pub async fn fetch(&self, location: Option<&str>) -> AppResult<bool> {
        let location = location.unwrap_or(&self.default_location);

        let observation = match self.client.current(location).await {
            Ok(observation) => observation,
            Err(e) if e.is_malformed() => {
                tracing::error!("Discarding weather response for {}: {}", location, e);
                return Ok(false);
            }
            Err(e) => {
                tracing::warn!("Error fetching weather for {}: {}", location, e);
                return Ok(false);
            }
        };

        let store = self.store.clone();
        let reading =
            tokio::task::spawn_blocking(move || store.lock().insert_reading(&observation))
                .await
                .map_err(anyhow::Error::from)??;

        tracing::info!("Stored reading {} for {}: {}", reading.id, location, reading);
        Ok(true)
    }
}
