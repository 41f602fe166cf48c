//! Core library for the `weather-dash` dashboard.
//!
//! This crate defines:
//! - Configuration & credentials handling
//! - The time-boxed lookup cache and its storage backends
//! - The OpenWeather client and the dashboard controller
//! - The identity-provider gate in front of the dashboard
//!
//! It is used by `dashboard-cli`, but can also be reused by other binaries or services.

pub mod auth;
pub mod cache;
pub mod client;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod model;
pub mod storage;

pub use auth::{AuthGate, Session};
pub use cache::{Cache, Clock, DEFAULT_TTL_MS, SystemClock};
pub use client::{OpenWeatherClient, WeatherSource};
pub use config::Config;
pub use dashboard::{Dashboard, DashboardState, View};
pub use error::{Error, Result};
pub use model::{City, UserProfile, WeatherDetail, WeatherSummary};
pub use storage::{FileStorage, MemoryStorage, Storage};
