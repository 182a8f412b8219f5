//! Plain-text rendering of [`Screen`]s for the terminal.

use std::fmt::Write;

use cityweather_core::{ForecastCard, Screen, WeatherPanel};

const RULE: &str = "────────────────────────────────────────";

/// Line to print while a lookup is still running, if the screen calls for one.
pub fn progress_line(screen: &Screen) -> Option<&'static str> {
    match screen {
        Screen::Loading => Some("Loading weather data..."),
        Screen::Weather(panel) if panel.busy => Some("Searching..."),
        _ => None,
    }
}

pub fn render(screen: &Screen) -> String {
    match screen {
        Screen::Empty => "Enter a city name (e.g., Pune) to see its weather.".to_string(),
        Screen::Loading => "Loading weather data...".to_string(),
        Screen::Error(message) => format!("! {message}"),
        Screen::Weather(panel) => render_panel(panel),
    }
}

fn render_panel(panel: &WeatherPanel) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", panel.heading);
    let _ = writeln!(out, "{}", panel.temperature);
    let _ = writeln!(
        out,
        "{} {}",
        glyph(&panel.icon_url),
        capitalize(&panel.description)
    );
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(
        out,
        "Humidity {}   |   Wind Speed {}",
        panel.humidity, panel.wind_speed
    );

    if !panel.forecast.is_empty() {
        let _ = writeln!(out, "{RULE}");
        let _ = writeln!(out, "5-Day Forecast");
        for card in &panel.forecast {
            let _ = writeln!(out, "{}", card_line(card));
        }
    }

    out.trim_end().to_string()
}

fn card_line(card: &ForecastCard) -> String {
    format!(
        "{:<4} {} {:>5}  {}",
        card.day,
        glyph(&card.icon_url),
        card.temperature,
        card.label
    )
}

/// Terminal stand-in for an OpenWeather icon, picked from the icon id in its URL.
fn glyph(icon_url: &str) -> &'static str {
    let id = icon_url.rsplit('/').next().unwrap_or_default();
    match id.get(..2) {
        Some("01") => "☀",
        Some("02") => "⛅",
        Some("03" | "04") => "☁",
        Some("09" | "10") => "☂",
        Some("11") => "⚡",
        Some("13") => "❄",
        Some("50") => "≋",
        _ => "·",
    }
}

fn capitalize(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
