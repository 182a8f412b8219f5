//! View state and the pure mapping from state to what gets displayed.

use crate::model::{CurrentWeather, Forecast};

/// Everything the display knows at a given moment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ViewState {
    /// City of the most recent lookup.
    pub city: Option<String>,
    pub current: Option<CurrentWeather>,
    pub forecast: Option<Forecast>,
    pub loading: bool,
    pub error: Option<String>,
}

impl ViewState {
    pub fn forecast_len(&self) -> usize {
        self.forecast.as_ref().map_or(0, |f| f.days.len())
    }
}

/// One of the mutually exclusive displays.
#[derive(Debug, Clone, PartialEq)]
pub enum Screen {
    /// Nothing has been looked up yet.
    Empty,
    /// First load, nothing on screen to keep showing.
    Loading,
    Error(String),
    Weather(WeatherPanel),
}

#[derive(Debug, Clone, PartialEq)]
pub struct WeatherPanel {
    /// "Name, CC".
    pub heading: String,
    pub temperature: String,
    pub icon_url: String,
    pub description: String,
    pub humidity: String,
    pub wind_speed: String,
    /// A newer lookup is in flight while this data is still shown.
    pub busy: bool,
    pub forecast: Vec<ForecastCard>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForecastCard {
    /// Short weekday, e.g. "Mon".
    pub day: String,
    pub icon_url: String,
    pub temperature: String,
    pub label: String,
}

/// Map a view state to the display it calls for.
pub fn present(state: &ViewState) -> Screen {
    if state.loading && state.current.is_none() {
        return Screen::Loading;
    }
    if let Some(error) = &state.error {
        return Screen::Error(error.clone());
    }
    match &state.current {
        Some(current) => Screen::Weather(panel(current, state.forecast.as_ref(), state.loading)),
        None => Screen::Empty,
    }
}

fn panel(current: &CurrentWeather, forecast: Option<&Forecast>, busy: bool) -> WeatherPanel {
    let heading = if current.country.is_empty() {
        current.location_name.clone()
    } else {
        format!("{}, {}", current.location_name, current.country)
    };

    WeatherPanel {
        heading,
        temperature: celsius(current.temperature_c),
        icon_url: current.condition.icon_url(),
        description: current.condition.description.clone(),
        humidity: format!("{}%", current.humidity_pct),
        wind_speed: format!("{} m/s", round(current.wind_speed_mps)),
        busy,
        forecast: forecast.map(cards).unwrap_or_default(),
    }
}

/// Weekday labels are taken in the city's own UTC offset, not the viewer's
/// `chrono::Local` zone, so a card reads as the city's calendar day.
fn cards(forecast: &Forecast) -> Vec<ForecastCard> {
    let offset = forecast.offset();
    forecast
        .days
        .iter()
        .map(|entry| ForecastCard {
            day: entry
                .time_at(offset)
                .map(|t| t.format("%a").to_string())
                .unwrap_or_default(),
            icon_url: entry.condition.small_icon_url(),
            temperature: celsius(entry.temperature_c),
            label: entry.condition.main.clone(),
        })
        .collect()
}

fn celsius(temp: f64) -> String {
    format!("{}°C", round(temp))
}

// Half-way values round up: -0.5 shows as 0, not -1.
fn round(value: f64) -> i64 {
    (value + 0.5).floor() as i64
}
