use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::{fmt, time::Duration};
use tracing::debug;

use crate::{
    config::DEFAULT_BASE_URL,
    error::LookupError,
    model::{Condition, CurrentWeather, Forecast, ForecastEntry, daily_entries},
};

use super::WeatherSource;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenWeather 2.5 API client (`/weather` and `/forecast`, metric units).
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    api_key: String,
    base_url: String,
    http: Client,
}

#[derive(Debug, Clone)]
pub struct OpenWeatherClientBuilder {
    api_key: String,
    base_url: String,
    timeout: Duration,
}

impl OpenWeatherClientBuilder {
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<OpenWeatherClient, LookupError> {
        let http = Client::builder().timeout(self.timeout).build()?;

        Ok(OpenWeatherClient {
            api_key: self.api_key,
            base_url: self.base_url,
            http,
        })
    }
}

impl OpenWeatherClient {
    pub fn builder(api_key: impl Into<String>) -> OpenWeatherClientBuilder {
        OpenWeatherClientBuilder {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// GET `{base_url}/{endpoint}` for a city and return the body once its `cod` says success.
    ///
    /// OpenWeather embeds `cod`/`message` in error bodies, so the body is read
    /// whatever the HTTP status is.
    async fn fetch(&self, endpoint: &str, city: &str) -> Result<Value, LookupError> {
        let url = format!("{}/{endpoint}", self.base_url);
        debug!(%url, city, "requesting OpenWeather {endpoint}");

        let res = self
            .http
            .get(&url)
            .query(&[
                ("q", city),
                ("appid", self.api_key.as_str()),
                ("units", "metric"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;
        debug!(%status, bytes = body.len(), "OpenWeather {endpoint} responded");

        let value: Value = match serde_json::from_str(&body) {
            Ok(value) => value,
            Err(_) if !status.is_success() => {
                return Err(LookupError::Upstream {
                    code: status.as_u16().to_string(),
                    message: truncate_body(&body),
                });
            }
            Err(err) => return Err(err.into()),
        };

        let envelope = OwEnvelope::deserialize(&value)?;
        envelope.check(status.as_u16())?;

        Ok(value)
    }
}

#[async_trait]
impl WeatherSource for OpenWeatherClient {
    async fn current(&self, city: &str) -> Result<CurrentWeather, LookupError> {
        let body = self.fetch("weather", city).await?;
        parse_current(body)
    }

    async fn forecast(&self, city: &str) -> Result<Forecast, LookupError> {
        let body = self.fetch("forecast", city).await?;
        parse_forecast(body)
    }
}

/// `cod` is a number on `/weather` and a string on `/forecast`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OwCode {
    Number(i64),
    Text(String),
}

impl OwCode {
    fn is_success(&self) -> bool {
        match self {
            OwCode::Number(n) => *n == 200,
            OwCode::Text(s) => s.trim() == "200",
        }
    }
}

impl fmt::Display for OwCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OwCode::Number(n) => write!(f, "{n}"),
            OwCode::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwEnvelope {
    cod: Option<OwCode>,
    // Error message on failure; `0` on forecast success.
    #[serde(default)]
    message: Option<Value>,
}

impl OwEnvelope {
    fn check(&self, http_status: u16) -> Result<(), LookupError> {
        match &self.cod {
            Some(cod) if cod.is_success() => Ok(()),
            cod => Err(LookupError::Upstream {
                code: cod
                    .as_ref()
                    .map(ToString::to_string)
                    .unwrap_or_else(|| http_status.to_string()),
                message: self.message_text(),
            }),
        }
    }

    fn message_text(&self) -> String {
        match &self.message {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => "no message".to_string(),
            Some(other) => other.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    main: String,
    description: String,
    icon: String,
}

impl From<OwWeather> for Condition {
    fn from(w: OwWeather) -> Self {
        Condition {
            main: w.main,
            description: w.description,
            icon: w.icon,
        }
    }
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    humidity: u8,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Default, Deserialize)]
struct OwSys {
    country: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OwCurrentResponse {
    name: String,
    #[serde(default)]
    sys: OwSys,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecastMain {
    temp: f64,
}

#[derive(Debug, Deserialize)]
struct OwForecastEntry {
    dt: i64,
    main: OwForecastMain,
    weather: Vec<OwWeather>,
}

#[derive(Debug, Default, Deserialize)]
struct OwCity {
    timezone: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct OwForecastResponse {
    #[serde(default)]
    city: OwCity,
    list: Vec<OwForecastEntry>,
}

fn parse_current(body: Value) -> Result<CurrentWeather, LookupError> {
    let parsed: OwCurrentResponse = serde_json::from_value(body)?;

    let condition = parsed
        .weather
        .into_iter()
        .next()
        .ok_or(LookupError::Incomplete("current weather condition"))?;

    Ok(CurrentWeather {
        location_name: parsed.name,
        country: parsed.sys.country.unwrap_or_default(),
        temperature_c: parsed.main.temp,
        humidity_pct: parsed.main.humidity,
        wind_speed_mps: parsed.wind.speed,
        condition: condition.into(),
    })
}

fn parse_forecast(body: Value) -> Result<Forecast, LookupError> {
    let parsed: OwForecastResponse = serde_json::from_value(body)?;

    let days = daily_entries(parsed.list)
        .into_iter()
        .map(|entry| -> Result<ForecastEntry, LookupError> {
            let condition = entry
                .weather
                .into_iter()
                .next()
                .ok_or(LookupError::Incomplete("forecast condition"))?;

            Ok(ForecastEntry {
                timestamp: entry.dt,
                temperature_c: entry.main.temp,
                condition: condition.into(),
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Forecast {
        utc_offset_secs: parsed.city.timezone.unwrap_or(0),
        days,
    })
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
