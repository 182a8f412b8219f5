use crate::{
    Config, CurrentWeather, Forecast, LookupError, provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Capability to fetch weather for a city from some upstream.
///
/// The lookup orchestrator only talks to this trait, so tests can substitute a
/// scripted source for the real HTTP client.
#[async_trait]
pub trait WeatherSource: Send + Sync + Debug {
    async fn current(&self, city: &str) -> Result<CurrentWeather, LookupError>;

    /// Daily forecast, already reduced to one entry per day.
    async fn forecast(&self, city: &str) -> Result<Forecast, LookupError>;
}

/// Construct the OpenWeather source from config.
pub fn source_from_config(config: &Config) -> anyhow::Result<Arc<dyn WeatherSource>> {
    let api_key = config.api_key()?;
    let client = OpenWeatherClient::builder(api_key)
        .base_url(config.base_url())
        .timeout(config.timeout())
        .build()?;

    Ok(Arc::new(client))
}
