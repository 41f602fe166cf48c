use anyhow::{Context, Result as AnyResult};
use std::{fs, io, path::PathBuf};
use tracing::{info, warn};
use url::Url;

use crate::{config::Config, error::Error, model::UserProfile};

/// Guard in front of the protected dashboard flow.
///
/// The login/logout protocol itself runs at the identity provider; this
/// gate only decides whether to admit the caller and builds the redirect
/// URLs an unauthenticated user must follow. It is invoked explicitly
/// before entering the dashboard, never as a side effect of rendering.
#[derive(Debug, Clone)]
pub struct AuthGate {
    base: Url,
    client_id: String,
    callback_url: String,
    audience: Option<String>,
}

impl AuthGate {
    /// Missing domain or client id is fatal to the whole application.
    pub fn from_config(config: &Config) -> Result<Self, Error> {
        let domain = config.auth.domain.as_deref().ok_or(Error::MissingAuthConfig("domain"))?;
        let client_id = config
            .auth
            .client_id
            .clone()
            .ok_or(Error::MissingAuthConfig("client id"))?;

        let base = Url::parse(&format!("https://{domain}"))
            .map_err(|_| Error::MissingAuthConfig("valid domain"))?;

        Ok(Self {
            base,
            client_id,
            callback_url: config.callback_url().to_string(),
            audience: config.auth.audience.clone(),
        })
    }

    /// Redirect-based login entry point.
    pub fn authorize_url(&self, return_to: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path("/authorize");

        {
            let mut query = url.query_pairs_mut();
            query
                .append_pair("client_id", &self.client_id)
                .append_pair("redirect_uri", &self.callback_url)
                .append_pair("response_type", "code")
                .append_pair("scope", "openid profile email")
                .append_pair("returnTo", return_to);

            if let Some(audience) = &self.audience {
                query.append_pair("audience", audience);
            }
        }

        url
    }

    /// Provider-side logout, redirecting back to `return_to` when done.
    pub fn logout_url(&self, return_to: &str) -> Url {
        let mut url = self.base.clone();
        url.set_path("/v2/logout");
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("returnTo", return_to);
        url
    }

    /// Admit the caller when a session exists; otherwise hand back the
    /// login redirect so the caller leaves before the protected flow runs.
    pub fn require(&self, session: &Session) -> Result<UserProfile, Error> {
        match session.profile() {
            Some(profile) => Ok(profile.clone()),
            None => Err(Error::Unauthenticated {
                authorize_url: self.authorize_url("/").to_string(),
            }),
        }
    }
}

/// Signed-in user, persisted as JSON next to the config file so the
/// dashboard stays admitted across invocations until logout.
#[derive(Debug)]
pub struct Session {
    path: PathBuf,
    profile: Option<UserProfile>,
}

impl Session {
    pub fn load() -> AnyResult<Self> {
        let path = crate::config::project_dirs()?.config_dir().join("session.json");
        Ok(Self::load_from(path))
    }

    pub fn load_from(path: PathBuf) -> Self {
        let profile = match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    // A corrupt session file means signing in again.
                    warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                    None
                }
            },
            Err(e) if e.kind() == io::ErrorKind::NotFound => None,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "ignoring unreadable session file");
                None
            }
        };

        Self { path, profile }
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn store(&mut self, profile: UserProfile) -> AnyResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create session directory: {}", parent.display())
            })?;
        }

        let json = serde_json::to_string_pretty(&profile)
            .context("Failed to serialize session profile")?;
        fs::write(&self.path, json)
            .with_context(|| format!("Failed to write session file: {}", self.path.display()))?;

        info!(user = %profile.email, "session stored");
        self.profile = Some(profile);
        Ok(())
    }

    pub fn clear(&mut self) -> AnyResult<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => {
                return Err(e).with_context(|| {
                    format!("Failed to remove session file: {}", self.path.display())
                });
            }
        }

        self.profile = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn configured() -> Config {
        let mut config = Config::default();
        config.auth.domain = Some("example.eu.auth0.com".to_string());
        config.auth.client_id = Some("CLIENT".to_string());
        config
    }

    fn profile() -> UserProfile {
        UserProfile {
            name: "Carol Smith".to_string(),
            email: "carol@example.com".to_string(),
            email_verified: true,
            picture: None,
            updated_at: None,
        }
    }

    #[test]
    fn missing_domain_is_fatal() {
        let mut config = configured();
        config.auth.domain = None;

        let err = AuthGate::from_config(&config).unwrap_err();
        assert!(err.to_string().contains("missing domain"));
    }

    #[test]
    fn missing_client_id_is_fatal() {
        let mut config = configured();
        config.auth.client_id = None;

        assert!(AuthGate::from_config(&config).is_err());
    }

    #[test]
    fn authorize_url_carries_the_login_parameters() {
        let mut config = configured();
        config.auth.audience = Some("https://api.example.com".to_string());
        let gate = AuthGate::from_config(&config).expect("gate");

        let url = gate.authorize_url("/dashboard");
        assert_eq!(url.host_str(), Some("example.eu.auth0.com"));
        assert_eq!(url.path(), "/authorize");

        let query: Vec<(String, String)> =
            url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect();
        assert!(query.contains(&("client_id".into(), "CLIENT".into())));
        assert!(query.contains(&("response_type".into(), "code".into())));
        assert!(query.contains(&("scope".into(), "openid profile email".into())));
        assert!(query.contains(&("returnTo".into(), "/dashboard".into())));
        assert!(query.contains(&("audience".into(), "https://api.example.com".into())));
    }

    #[test]
    fn logout_url_redirects_back() {
        let gate = AuthGate::from_config(&configured()).expect("gate");

        let url = gate.logout_url("http://localhost:3000");
        assert_eq!(url.path(), "/v2/logout");
        assert!(url.query().unwrap_or("").contains("client_id=CLIENT"));
    }

    #[test]
    fn gate_rejects_without_a_session() {
        let gate = AuthGate::from_config(&configured()).expect("gate");
        let dir = tempfile::tempdir().expect("tempdir");
        let session = Session::load_from(dir.path().join("session.json"));

        let err = gate.require(&session).unwrap_err();
        match err {
            Error::Unauthenticated { authorize_url } => {
                assert!(authorize_url.contains("/authorize"));
            }
            other => panic!("expected Unauthenticated, got {other:?}"),
        }
    }

    #[test]
    fn session_round_trips_through_disk() {
        let gate = AuthGate::from_config(&configured()).expect("gate");
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");

        let mut session = Session::load_from(path.clone());
        session.store(profile()).expect("store");

        let reloaded = Session::load_from(path.clone());
        let admitted = gate.require(&reloaded).expect("admitted");
        assert_eq!(admitted.email, "carol@example.com");

        let mut reloaded = reloaded;
        reloaded.clear().expect("clear");
        assert!(gate.require(&reloaded).is_err());
        assert!(!path.exists());
    }

    #[test]
    fn corrupt_session_file_reads_as_signed_out() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("session.json");
        fs::write(&path, "{ not json").expect("write");

        let session = Session::load_from(path);
        assert!(session.profile().is_none());
    }
}
