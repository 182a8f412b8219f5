//! Core library for the `cityweather` display.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The weather source abstraction and its OpenWeather client
//! - The last-city key-value store
//! - View state, the lookup orchestrator and the pure presentation step
//!
//! It is used by `cityweather-cli`, but any other front end can drive a
//! [`WeatherView`] and render [`Screen`]s the same way.

pub mod config;
pub mod error;
pub mod lookup;
pub mod model;
pub mod provider;
pub mod store;
pub mod view;

pub use config::Config;
pub use error::{LOOKUP_FAILED_MESSAGE, LookupError, StoreError};
pub use lookup::WeatherView;
pub use model::{Condition, CurrentWeather, Forecast, ForecastEntry};
pub use provider::{WeatherSource, openweather::OpenWeatherClient, source_from_config};
pub use store::{FileStore, KeyValueStore, LAST_CITY_KEY, MemoryStore};
pub use view::{ForecastCard, Screen, ViewState, WeatherPanel, present};
