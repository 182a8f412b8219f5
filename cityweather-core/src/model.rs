use chrono::{DateTime, FixedOffset, Offset, Utc};

/// Upstream entries are 3 hours apart, so every 8th one is a day apart.
pub const ENTRIES_PER_DAY: usize = 8;

/// Number of days kept in the forecast strip.
pub const FORECAST_DAYS: usize = 5;

const ICON_BASE_URL: &str = "http://openweathermap.org/img/wn";

/// Weather condition as reported by the upstream: category, free text and icon id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Condition {
    /// Broad category, e.g. "Clouds".
    pub main: String,
    pub description: String,
    /// Icon id such as "04d".
    pub icon: String,
}

impl Condition {
    /// Large icon used next to the current conditions.
    pub fn icon_url(&self) -> String {
        format!("{ICON_BASE_URL}/{}@2x.png", self.icon)
    }

    /// Small icon used on forecast cards.
    pub fn small_icon_url(&self) -> String {
        format!("{ICON_BASE_URL}/{}.png", self.icon)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentWeather {
    pub location_name: String,
    pub country: String,
    pub temperature_c: f64,
    pub humidity_pct: u8,
    pub wind_speed_mps: f64,
    pub condition: Condition,
}

/// One 3-hour slot of the upstream forecast.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastEntry {
    /// Seconds since the unix epoch.
    pub timestamp: i64,
    pub temperature_c: f64,
    pub condition: Condition,
}

impl ForecastEntry {
    pub fn time_at(&self, offset: FixedOffset) -> Option<DateTime<FixedOffset>> {
        DateTime::<Utc>::from_timestamp(self.timestamp, 0).map(|utc| utc.with_timezone(&offset))
    }
}

/// Daily forecast for one city.
#[derive(Debug, Clone, PartialEq)]
pub struct Forecast {
    /// Shift from UTC in seconds, as reported for the city.
    pub utc_offset_secs: i32,
    pub days: Vec<ForecastEntry>,
}

impl Forecast {
    pub fn offset(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_secs).unwrap_or_else(|| Utc.fix())
    }
}

/// Keep one entry per day from a 3-hourly series: indices 0, 8, 16, ... capped at
/// [`FORECAST_DAYS`], in original order.
pub fn daily_entries<T>(series: impl IntoIterator<Item = T>) -> Vec<T> {
    series
        .into_iter()
        .step_by(ENTRIES_PER_DAY)
        .take(FORECAST_DAYS)
        .collect()
}
