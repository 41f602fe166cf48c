use thiserror::Error;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure taxonomy for the dashboard.
///
/// Configuration errors are fatal to the operation that needed the missing
/// value and are never retried. Upstream errors are user-visible but leave
/// the rest of the dashboard interactive. Storage failures never appear
/// here; the cache recovers from them locally.
#[derive(Debug, Error)]
pub enum Error {
    #[error(
        "No weather API key configured.\n\
         Hint: run `weather-dash configure` and enter your OpenWeatherMap key."
    )]
    MissingApiKey,

    #[error(
        "Identity provider is not configured (missing {0}).\n\
         Hint: run `weather-dash configure` and fill in the auth settings."
    )]
    MissingAuthConfig(&'static str),

    #[error("Not signed in. Open this URL in your browser to sign in:\n{authorize_url}")]
    Unauthenticated { authorize_url: String },

    #[error("could not find city '{0}'")]
    CityNotFound(String),

    #[error("{0}")]
    Upstream(anyhow::Error),
}

impl Error {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::CityNotFound(_))
    }
}
