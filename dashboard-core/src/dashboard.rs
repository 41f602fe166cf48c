use tracing::debug;

use crate::{
    client::WeatherSource,
    model::{City, WeatherDetail, WeatherSummary},
};

/// Everything the presentation layer renders. Owned exclusively by
/// [`Dashboard`] and mutated only through its actions.
#[derive(Debug, Clone, Default)]
pub struct DashboardState {
    pub cities: Vec<WeatherSummary>,
    pub selected: Option<WeatherDetail>,
    pub loading: bool,
    pub loading_detail: bool,
    pub error: Option<String>,
}

/// The view alternates between the card grid and the drill-down panel,
/// driven entirely by whether a detail is selected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    List,
    Detail,
}

/// Owns the visible city list and the selected detail; the only component
/// that mutates [`DashboardState`].
pub struct Dashboard<S> {
    source: S,
    city_list: Vec<City>,
    state: DashboardState,
}

impl<S: WeatherSource> Dashboard<S> {
    pub fn new(source: S, city_list: Vec<City>) -> Self {
        Self {
            source,
            city_list,
            state: DashboardState { loading: true, ..DashboardState::default() },
        }
    }

    pub fn state(&self) -> &DashboardState {
        &self.state
    }

    pub fn view(&self) -> View {
        if self.state.selected.is_some() { View::Detail } else { View::List }
    }

    /// Load the fixed city batch. Per-city failures arrive as placeholder
    /// cards inside the batch; only a failure of the batch call itself
    /// (missing credential) sets the global error. `loading` drops either way.
    pub async fn initialize(&mut self) {
        match self.source.all_summaries(&self.city_list).await {
            Ok(cards) => {
                debug!(count = cards.len(), "dashboard loaded");
                self.state.cities = cards;
            }
            Err(e) => {
                debug!(error = %e, "dashboard batch load failed");
                self.state.error = Some("Failed to load weather data. Check API key.".to_string());
            }
        }
        self.state.loading = false;
    }

    /// Append a card looked up by name. Blank input is a no-op; a failed
    /// lookup leaves the existing list untouched and surfaces a message.
    pub async fn add_city(&mut self, name: &str) {
        let name = name.trim();
        if name.is_empty() {
            return;
        }

        match self.source.summary_by_name(name).await {
            Ok(summary) => {
                self.state.cities.push(summary);
                self.state.error = None;
            }
            Err(e) if e.is_not_found() => {
                self.state.error = Some("Could not find that city".to_string());
            }
            Err(e) => {
                self.state.error = Some(e.to_string());
            }
        }
    }

    /// Drop the card with this id; unknown ids are a no-op. Removing the
    /// currently selected city also leaves the detail view.
    pub fn remove_city(&mut self, id: &str) {
        self.state.cities.retain(|c| c.id != id);

        if self.state.selected.as_ref().is_some_and(|d| d.id == id) {
            self.state.selected = None;
        }
    }

    pub async fn select_city(&mut self, id: &str) {
        self.state.loading_detail = true;
        let result = self.source.detail_by_id(id).await;
        self.state.loading_detail = false;

        match result {
            Ok(detail) => self.state.selected = Some(detail),
            Err(e) => {
                // Selection stays as it was; the grid remains interactive.
                self.state.error = Some(format!("Failed to load weather details: {e}"));
            }
        }
    }

    pub fn clear_selection(&mut self) {
        self.state.selected = None;
    }
}
