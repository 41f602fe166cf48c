use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Parser, Subcommand};
use inquire::{Select, Text};
use tracing::warn;

use dashboard_core::{
    AuthGate, Cache, Config, DEFAULT_TTL_MS, Dashboard, DashboardState, FileStorage,
    MemoryStorage, OpenWeatherClient, Session, Storage, SystemClock, UserProfile, View,
};

use crate::render;

/// Top-level CLI struct.
#[derive(Debug, Parser)]
#[command(name = "weather-dash", version, about = "Terminal weather dashboard")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Store the weather API key and identity provider settings.
    Configure,

    /// Sign in through the configured identity provider.
    Login,

    /// Sign out and print the provider's logout URL.
    Logout,

    /// Open the dashboard.
    Run,
}

impl Cli {
    pub async fn run(self) -> Result<()> {
        match self.command {
            Command::Configure => configure(),
            Command::Login => login(),
            Command::Logout => logout(),
            Command::Run => run_dashboard().await,
        }
    }
}

fn configure() -> Result<()> {
    let mut config = Config::load()?;

    let api_key = Text::new("OpenWeatherMap API key:")
        .with_initial_value(config.weather.api_key.as_deref().unwrap_or(""))
        .prompt()?;
    if !api_key.trim().is_empty() {
        config.set_weather_api_key(api_key.trim().to_string());
    }

    let domain = Text::new("Identity provider domain (e.g. example.eu.auth0.com):")
        .with_initial_value(config.auth.domain.as_deref().unwrap_or(""))
        .prompt()?;
    if !domain.trim().is_empty() {
        config.auth.domain = Some(domain.trim().to_string());
    }

    let client_id = Text::new("Identity provider client id:")
        .with_initial_value(config.auth.client_id.as_deref().unwrap_or(""))
        .prompt()?;
    if !client_id.trim().is_empty() {
        config.auth.client_id = Some(client_id.trim().to_string());
    }

    let callback_url = Text::new("Callback URL:")
        .with_initial_value(config.callback_url())
        .prompt()?;
    if !callback_url.trim().is_empty() {
        config.auth.callback_url = Some(callback_url.trim().to_string());
    }

    let audience = Text::new("API audience (optional, leave empty to skip):")
        .with_initial_value(config.auth.audience.as_deref().unwrap_or(""))
        .prompt()?;
    config.auth.audience =
        if audience.trim().is_empty() { None } else { Some(audience.trim().to_string()) };

    config.save()?;
    println!("Saved configuration to {}", Config::config_file_path()?.display());

    Ok(())
}

fn login() -> Result<()> {
    let config = Config::load()?;
    let gate = AuthGate::from_config(&config)?;

    println!("Open this URL in your browser and complete the login:");
    println!("\n  {}\n", gate.authorize_url("/"));

    // The redirect dance runs at the provider; record who came back.
    let name = Text::new("Name on the account you signed in with:").prompt()?;
    let email = Text::new("Email on that account:").prompt()?;

    let mut session = Session::load()?;
    session.store(UserProfile {
        name: name.trim().to_string(),
        email: email.trim().to_string(),
        email_verified: false,
        picture: None,
        updated_at: Some(Utc::now()),
    })?;

    println!("Signed in.");
    Ok(())
}

fn logout() -> Result<()> {
    let config = Config::load()?;
    let mut session = Session::load()?;
    session.clear()?;

    match AuthGate::from_config(&config) {
        Ok(gate) => {
            println!("Signed out locally. Finish at the provider:");
            println!("\n  {}\n", gate.logout_url(config.callback_url()));
        }
        Err(_) => println!("Signed out."),
    }

    Ok(())
}

async fn run_dashboard() -> Result<()> {
    let config = Config::load()?;
    let gate = AuthGate::from_config(&config)?;
    let session = Session::load()?;
    // Unauthenticated users are redirected out before any weather fetch.
    let user = gate.require(&session)?;

    let storage: Arc<dyn Storage> = match FileStorage::in_project_cache_dir() {
        Ok(files) => Arc::new(files),
        Err(e) => {
            warn!(error = %e, "no cache directory available, caching in memory only");
            Arc::new(MemoryStorage::default())
        }
    };
    let cache = Cache::new(storage, Arc::new(SystemClock), DEFAULT_TTL_MS);
    let client = OpenWeatherClient::new(config.weather.api_key.clone(), cache);
    let mut dashboard = Dashboard::new(client, config.cities.clone());

    println!("{}", render::greeting(&user));
    println!("Loading...");
    dashboard.initialize().await;

    loop {
        match dashboard.view() {
            View::List => {
                println!("{}", render::list(dashboard.state()));

                const OPEN: &str = "Open a city";
                const ADD: &str = "Add a city";
                const REMOVE: &str = "Remove a city";
                const REFRESH: &str = "Refresh";
                const QUIT: &str = "Quit";

                let action =
                    Select::new("Dashboard", vec![OPEN, ADD, REMOVE, REFRESH, QUIT]).prompt()?;
                match action {
                    OPEN => {
                        if let Some(id) = pick_city(dashboard.state())? {
                            dashboard.select_city(&id).await;
                        }
                    }
                    ADD => {
                        let name = Text::new("City name:").prompt()?;
                        dashboard.add_city(&name).await;
                    }
                    REMOVE => {
                        if let Some(id) = pick_city(dashboard.state())? {
                            dashboard.remove_city(&id);
                        }
                    }
                    REFRESH => {
                        println!("Loading...");
                        dashboard.initialize().await;
                    }
                    _ => break,
                }
            }
            View::Detail => {
                if let Some(detail) = &dashboard.state().selected {
                    println!("{}", render::detail(detail));
                }

                const BACK: &str = "Back to dashboard";
                const REMOVE_THIS: &str = "Remove this city";
                const QUIT: &str = "Quit";

                let action = Select::new("City", vec![BACK, REMOVE_THIS, QUIT]).prompt()?;
                match action {
                    BACK => dashboard.clear_selection(),
                    REMOVE_THIS => {
                        let selected_id =
                            dashboard.state().selected.as_ref().map(|d| d.id.clone());
                        if let Some(id) = selected_id {
                            // Also leaves the detail view.
                            dashboard.remove_city(&id);
                        }
                    }
                    _ => break,
                }
            }
        }
    }

    Ok(())
}

fn pick_city(state: &DashboardState) -> Result<Option<String>> {
    if state.cities.is_empty() {
        println!("No cities on the dashboard.");
        return Ok(None);
    }

    let labels: Vec<String> = state.cities.iter().map(render::card_label).collect();
    let picked = Select::new("Which city?", labels.clone()).prompt()?;

    let index = labels.iter().position(|label| *label == picked);
    Ok(index.map(|i| state.cities[i].id.clone()))
}
