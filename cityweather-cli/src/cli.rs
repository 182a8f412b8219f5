use std::{io::Write, process::ExitCode, sync::Arc};

use anyhow::Context;
use cityweather_core::{
    Config, FileStore, KeyValueStore, LookupError, MemoryStore, WeatherView, present,
    source_from_config,
};
use clap::{Parser, Subcommand};
use inquire::{InquireError, Password, PasswordDisplayMode, Text};
use tracing::warn;

use crate::output;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(
    name = "cityweather",
    version,
    about = "Current weather and 5-day forecast for a city"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the OpenWeather API key and default city.
    Configure,

    /// Show weather once and exit.
    Show {
        /// City name; defaults to the last searched city.
        city: Option<String>,
    },

    /// Show the last searched city, then keep prompting for new ones.
    Search,
}

impl Cli {
    pub async fn run(self) -> anyhow::Result<ExitCode> {
        match self.command {
            Command::Configure => {
                // inquire blocks on the terminal, so keep it off the runtime workers.
                tokio::task::spawn_blocking(configure)
                    .await
                    .context("Configuration prompt did not finish")??;
                Ok(ExitCode::SUCCESS)
            }
            Command::Show { city } => {
                let view = build_view(&Config::load()?)?;
                let which = match &city {
                    Some(city) => Lookup::City(city.as_str()),
                    None => Lookup::Initial,
                };
                let outcome = lookup_and_render(&view, which, &mut std::io::stdout()).await;
                Ok(if outcome.is_ok() { ExitCode::SUCCESS } else { ExitCode::FAILURE })
            }
            Command::Search => {
                let view = build_view(&Config::load()?)?;
                search_loop(&view).await?;
                Ok(ExitCode::SUCCESS)
            }
        }
    }
}

fn configure() -> anyhow::Result<()> {
    let mut config = Config::load()?;

    let api_key = Password::new("OpenWeather API key:")
        .with_display_mode(PasswordDisplayMode::Masked)
        .without_confirmation()
        .prompt()
        .context("Failed to read API key")?;

    let default_city = Text::new("Default city:")
        .with_default(config.fallback_city())
        .prompt()
        .context("Failed to read default city")?;

    config.set_api_key(api_key);
    config.default_city = Some(default_city.trim().to_string()).filter(|c| !c.is_empty());
    config.save()?;

    println!("Saved configuration to {}", Config::config_file_path()?.display());
    Ok(())
}

fn build_view(config: &Config) -> anyhow::Result<WeatherView> {
    let source = source_from_config(config)?;

    let store: Arc<dyn KeyValueStore> = match Config::state_file_path() {
        Ok(path) => Arc::new(FileStore::new(path)),
        Err(err) => {
            warn!(error = %err, "last city will not be remembered");
            Arc::new(MemoryStore::new())
        }
    };

    Ok(WeatherView::new(source, store, config.fallback_city()))
}

async fn search_loop(view: &WeatherView) -> anyhow::Result<()> {
    let mut stdout = std::io::stdout();

    // Failures are already rendered; the prompt stays open.
    let _ = lookup_and_render(view, Lookup::Initial, &mut stdout).await;

    loop {
        let answer = tokio::task::spawn_blocking(|| {
            Text::new("City:")
                .with_placeholder("e.g. Pune")
                .with_help_message("Esc or Ctrl+C to quit")
                .prompt()
        })
        .await
        .context("City prompt did not finish")?;

        let Some(input) = city_from_answer(answer)? else {
            break;
        };
        if input.trim().is_empty() {
            continue;
        }

        let _ = lookup_and_render(view, Lookup::City(&input), &mut stdout).await;
    }

    Ok(())
}

/// `None` when the user backed out of the prompt.
fn city_from_answer(answer: Result<String, InquireError>) -> anyhow::Result<Option<String>> {
    match answer {
        Ok(input) => Ok(Some(input)),
        Err(InquireError::OperationCanceled | InquireError::OperationInterrupted) => Ok(None),
        Err(err) => Err(err).context("Failed to read city"),
    }
}

enum Lookup<'a> {
    Initial,
    City(&'a str),
}

/// Run a lookup, printing one progress line while it is in flight and the
/// final screen once it settles.
async fn lookup_and_render(
    view: &WeatherView,
    which: Lookup<'_>,
    out: &mut impl Write,
) -> Result<(), LookupError> {
    let mut updates = view.subscribe();

    let lookup = async {
        match which {
            Lookup::Initial => view.start().await,
            Lookup::City(city) => view.lookup(city).await,
        }
    };
    tokio::pin!(lookup);

    let mut progress_shown = false;
    let outcome = loop {
        // State changes are looked at before the lookup is polled again, so a
        // loading screen is seen before the lookup can settle past it.
        tokio::select! {
            biased;
            changed = updates.changed(), if !progress_shown => {
                if changed.is_err() {
                    break (&mut lookup).await;
                }
                let screen = present(&updates.borrow_and_update());
                if let Some(line) = output::progress_line(&screen) {
                    let _ = writeln!(out, "{line}");
                    progress_shown = true;
                }
            }
            outcome = &mut lookup => break outcome,
        }
    };

    let _ = writeln!(out, "{}", output::render(&present(&view.state())));
    outcome
}
