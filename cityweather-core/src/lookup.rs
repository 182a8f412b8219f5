//! The lookup orchestrator: city in, view state out.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::{
    error::LookupError,
    provider::WeatherSource,
    store::{KeyValueStore, LAST_CITY_KEY},
    view::ViewState,
};

/// Owns the view state and drives lookups against a [`WeatherSource`].
///
/// Every state transition is published on a `watch` channel; front ends get
/// a receiver from [`WeatherView::subscribe`] and re-render from it.
///
/// Lookups may overlap. Each one takes a generation number when it starts and
/// only the most recently started lookup is allowed to touch the state, so a
/// slow response for an older city can never overwrite a newer one.
#[derive(Debug)]
pub struct WeatherView {
    source: Arc<dyn WeatherSource>,
    store: Arc<dyn KeyValueStore>,
    fallback_city: String,
    state: watch::Sender<ViewState>,
    generation: AtomicU64,
}

impl WeatherView {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        store: Arc<dyn KeyValueStore>,
        fallback_city: impl Into<String>,
    ) -> Self {
        let (state, _) = watch::channel(ViewState::default());
        Self {
            source,
            store,
            fallback_city: fallback_city.into(),
            state,
            generation: AtomicU64::new(0),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ViewState> {
        self.state.subscribe()
    }

    /// Snapshot of the current state.
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// The persisted last city, or the fallback when there is none.
    pub fn initial_city(&self) -> String {
        match self.store.get(LAST_CITY_KEY) {
            Ok(Some(city)) if !city.trim().is_empty() => city.trim().to_string(),
            Ok(_) => self.fallback_city.clone(),
            Err(err) => {
                warn!(error = %err, "could not read last city, using fallback");
                self.fallback_city.clone()
            }
        }
    }

    /// Initial load: look up the last searched city.
    pub async fn start(&self) -> Result<(), LookupError> {
        let city = self.initial_city();
        info!(%city, "loading initial city");
        self.lookup(&city).await
    }

    /// Run one lookup for `raw_city`.
    ///
    /// Blank input is ignored: no request is made and the state is untouched.
    /// On failure the state carries the generic error message and no weather
    /// data; the returned error holds the underlying cause.
    pub async fn lookup(&self, raw_city: &str) -> Result<(), LookupError> {
        let city = raw_city.trim();
        if city.is_empty() {
            debug!("ignoring blank city");
            return Ok(());
        }

        if let Err(err) = self.store.set(LAST_CITY_KEY, city) {
            warn!(error = %err, %city, "failed to persist last city");
        }

        let mut generation = 0;
        self.state.send_modify(|s| {
            generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            s.city = Some(city.to_string());
            s.loading = true;
            s.error = None;
        });
        debug!(%city, generation, "lookup started");

        let mut guard = LoadingGuard {
            view: self,
            generation,
            armed: true,
        };

        let outcome = self.fetch_into_state(city, generation).await;

        if let Err(err) = &outcome {
            error!(%city, error = %err, "weather lookup failed");
        }

        guard.armed = false;
        self.apply(generation, |s| {
            if let Err(err) = &outcome {
                s.error = Some(err.user_message().to_string());
                s.current = None;
                s.forecast = None;
            }
            s.loading = false;
        });

        outcome
    }

    async fn fetch_into_state(&self, city: &str, generation: u64) -> Result<(), LookupError> {
        let current = self.source.current(city).await?;
        self.apply(generation, |s| {
            s.current = Some(current);
            s.forecast = None;
        });

        let forecast = self.source.forecast(city).await?;
        debug!(%city, days = forecast.days.len(), "forecast received");
        self.apply(generation, |s| s.forecast = Some(forecast));

        Ok(())
    }

    /// Apply `update` unless a newer lookup has started since `generation`.
    fn apply(&self, generation: u64, update: impl FnOnce(&mut ViewState)) {
        let applied = self.state.send_if_modified(|s| {
            if self.generation.load(Ordering::SeqCst) != generation {
                return false;
            }
            update(s);
            true
        });
        if !applied {
            debug!(generation, "discarding result of superseded lookup");
        }
    }
}

/// Turns `loading` off when a lookup future is dropped before it settles.
///
/// Whatever the lookup already applied stays; only the flag is cleared, and
/// only while no newer lookup has taken over.
struct LoadingGuard<'a> {
    view: &'a WeatherView,
    generation: u64,
    armed: bool,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            debug!(generation = self.generation, "lookup cancelled before it settled");
            self.view.apply(self.generation, |s| s.loading = false);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::{LOOKUP_FAILED_MESSAGE, StoreError},
        model::{Condition, CurrentWeather, Forecast, ForecastEntry, daily_entries},
        store::MemoryStore,
        view::{Screen, present},
    };
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;
    use tokio::sync::Notify;

    /// Scripted upstream. Behaviour is keyed on the city:
    /// "Nowhere" fails on current, "Halfway" fails on forecast,
    /// "Slow" waits on `gate` before answering current, anything else succeeds.
    #[derive(Debug, Default)]
    struct ScriptedSource {
        calls: Mutex<Vec<String>>,
        gate: Notify,
    }

    impl ScriptedSource {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().clone()
        }
    }

    fn not_found() -> LookupError {
        LookupError::Upstream {
            code: "404".into(),
            message: "city not found".into(),
        }
    }

    fn condition() -> Condition {
        Condition {
            main: "Clear".into(),
            description: "clear sky".into(),
            icon: "01d".into(),
        }
    }

    #[async_trait]
    impl WeatherSource for ScriptedSource {
        async fn current(&self, city: &str) -> Result<CurrentWeather, LookupError> {
            self.calls.lock().push(format!("current:{city}"));
            match city {
                "Nowhere" => return Err(not_found()),
                "Slow" => self.gate.notified().await,
                _ => {}
            }
            Ok(CurrentWeather {
                location_name: city.to_string(),
                country: "IN".into(),
                temperature_c: 28.0,
                humidity_pct: 50,
                wind_speed_mps: 2.0,
                condition: condition(),
            })
        }

        async fn forecast(&self, city: &str) -> Result<Forecast, LookupError> {
            self.calls.lock().push(format!("forecast:{city}"));
            if city == "Halfway" {
                return Err(not_found());
            }
            let series = (0..40).map(|i| ForecastEntry {
                timestamp: 1_700_000_000 + i * 10_800,
                temperature_c: i as f64,
                condition: condition(),
            });
            Ok(Forecast {
                utc_offset_secs: 0,
                days: daily_entries(series),
            })
        }
    }

    #[derive(Debug)]
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>, StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }

        fn set(&self, _key: &str, _value: &str) -> Result<(), StoreError> {
            Err(StoreError::Io(std::io::Error::other("disk gone")))
        }
    }

    fn view_with(store: Arc<dyn KeyValueStore>) -> (WeatherView, Arc<ScriptedSource>) {
        let source = Arc::new(ScriptedSource::default());
        let view = WeatherView::new(source.clone(), store, "Pune");
        (view, source)
    }

    #[tokio::test]
    async fn blank_input_changes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let (view, source) = view_with(store.clone());
        let rx = view.subscribe();

        for input in ["", "   ", "\t\n"] {
            view.lookup(input).await.unwrap();
        }

        assert!(source.calls().is_empty());
        assert_eq!(view.state(), ViewState::default());
        assert!(!rx.has_changed().unwrap());
        assert_eq!(store.get(LAST_CITY_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn successful_lookup_fills_state_and_persists_trimmed_city() {
        let store = Arc::new(MemoryStore::new());
        let (view, source) = view_with(store.clone());

        view.lookup("  Pune ").await.unwrap();

        let state = view.state();
        assert_eq!(state.city.as_deref(), Some("Pune"));
        assert_eq!(state.current.as_ref().unwrap().location_name, "Pune");
        assert!(!state.loading);
        assert!(state.error.is_none());

        let temps: Vec<f64> = state
            .forecast
            .unwrap()
            .days
            .iter()
            .map(|d| d.temperature_c)
            .collect();
        assert_eq!(temps, vec![0.0, 8.0, 16.0, 24.0, 32.0]);

        assert_eq!(source.calls(), vec!["current:Pune", "forecast:Pune"]);
        assert_eq!(store.get(LAST_CITY_KEY).unwrap().as_deref(), Some("Pune"));
    }

    #[tokio::test]
    async fn unknown_city_never_requests_forecast() {
        let store = Arc::new(MemoryStore::new());
        let (view, source) = view_with(store.clone());

        let err = view.lookup("Nowhere").await.unwrap_err();
        assert!(matches!(err, LookupError::Upstream { .. }));

        assert_eq!(source.calls(), vec!["current:Nowhere"]);

        let state = view.state();
        assert!(!state.loading);
        assert!(state.current.is_none());
        assert!(state.forecast.is_none());
        assert_eq!(state.error.as_deref(), Some(LOOKUP_FAILED_MESSAGE));
        assert_eq!(present(&state), Screen::Error(LOOKUP_FAILED_MESSAGE.into()));

        // Persisted before the request went out.
        assert_eq!(store.get(LAST_CITY_KEY).unwrap().as_deref(), Some("Nowhere"));
    }

    #[tokio::test]
    async fn forecast_failure_clears_current_conditions_too() {
        let (view, source) = view_with(Arc::new(MemoryStore::new()));

        view.lookup("Halfway").await.unwrap_err();

        assert_eq!(source.calls(), vec!["current:Halfway", "forecast:Halfway"]);
        let state = view.state();
        assert!(state.current.is_none());
        assert!(state.forecast.is_none());
        assert!(!state.loading);
        assert!(state.error.is_some());
    }

    #[tokio::test]
    async fn failure_wipes_earlier_results_and_success_clears_error() {
        let (view, _source) = view_with(Arc::new(MemoryStore::new()));

        view.lookup("Pune").await.unwrap();
        view.lookup("Nowhere").await.unwrap_err();
        assert!(view.state().current.is_none());
        assert_eq!(view.state().forecast_len(), 0);

        view.lookup("Delhi").await.unwrap();
        let state = view.state();
        assert!(state.error.is_none());
        assert_eq!(state.current.unwrap().location_name, "Delhi");
    }

    #[tokio::test]
    async fn shows_loader_while_first_lookup_is_in_flight() {
        let (view, source) = view_with(Arc::new(MemoryStore::new()));

        let (result, _) = tokio::join!(view.lookup("Slow"), async {
            let state = view.state();
            assert!(state.loading);
            assert_eq!(present(&state), Screen::Loading);
            source.gate.notify_one();
        });

        result.unwrap();
        assert!(!view.state().loading);
    }

    #[tokio::test]
    async fn superseded_lookup_does_not_overwrite_newer_result() {
        let (view, source) = view_with(Arc::new(MemoryStore::new()));

        let (slow, _) = tokio::join!(view.lookup("Slow"), async {
            view.lookup("Delhi").await.unwrap();
            source.gate.notify_one();
        });
        slow.unwrap();

        let state = view.state();
        assert_eq!(state.city.as_deref(), Some("Delhi"));
        assert_eq!(state.current.unwrap().location_name, "Delhi");
        assert!(!state.loading);
        // The slow lookup still ran to completion upstream.
        assert!(source.calls().contains(&"forecast:Slow".to_string()));
    }

    #[tokio::test]
    async fn dropped_lookup_still_clears_loading() {
        let (view, _source) = view_with(Arc::new(MemoryStore::new()));

        // "Slow" never gets its gate opened, so the lookup is cut off mid-flight.
        let timed_out = tokio::time::timeout(Duration::from_millis(50), view.lookup("Slow")).await;
        assert!(timed_out.is_err());

        let state = view.state();
        assert!(!state.loading);
        assert_eq!(state.city.as_deref(), Some("Slow"));
        assert!(state.error.is_none());
        assert_eq!(present(&state), Screen::Empty);
    }

    #[tokio::test]
    async fn dropped_superseded_lookup_leaves_newer_loading_flag() {
        let (view, source) = view_with(Arc::new(MemoryStore::new()));

        // Start the first lookup and leave it parked on the gate.
        let mut first = Box::pin(view.lookup("Slow"));
        assert!(
            tokio::time::timeout(Duration::from_millis(20), &mut first)
                .await
                .is_err()
        );

        // A second lookup starts and is parked too, then the first is dropped.
        let mut second = Box::pin(view.lookup("Slow"));
        assert!(
            tokio::time::timeout(Duration::from_millis(20), &mut second)
                .await
                .is_err()
        );
        drop(first);
        assert!(view.state().loading);

        source.gate.notify_one();
        second.await.unwrap();
        assert!(!view.state().loading);
    }

    #[tokio::test]
    async fn start_uses_fallback_then_persisted_city() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());

        let (view, source) = view_with(store.clone());
        assert_eq!(view.initial_city(), "Pune");
        view.start().await.unwrap();
        view.lookup("Oslo").await.unwrap();
        assert_eq!(source.calls()[0], "current:Pune");

        // A fresh view over the same store picks up the last search.
        let (reloaded, source) = view_with(store);
        reloaded.start().await.unwrap();
        assert_eq!(source.calls()[0], "current:Oslo");
    }

    #[tokio::test]
    async fn store_failures_do_not_block_lookups() {
        let (view, source) = view_with(Arc::new(BrokenStore));

        assert_eq!(view.initial_city(), "Pune");
        view.start().await.unwrap();

        assert_eq!(source.calls(), vec!["current:Pune", "forecast:Pune"]);
        assert!(view.state().current.is_some());
    }

    #[tokio::test]
    async fn subscribers_see_final_state() {
        let (view, _source) = view_with(Arc::new(MemoryStore::new()));
        let mut rx = view.subscribe();

        view.lookup("Pune").await.unwrap();

        assert!(rx.has_changed().unwrap());
        let state = rx.borrow_and_update().clone();
        assert!(!state.loading);
        assert!(matches!(present(&state), Screen::Weather(_)));
    }
}
