//! Pure text rendering of dashboard state. No logic of its own: every
//! function formats what the controller already decided.

use dashboard_core::{DashboardState, UserProfile, WeatherDetail, WeatherSummary};

pub fn greeting(user: &UserProfile) -> String {
    format!("Welcome back, {} <{}>.", user.name, user.email)
}

/// Same condition-to-icon mapping the web cards use.
fn icon(description: &str) -> &'static str {
    match description {
        "Clear Sky" | "Clear" => "*",
        "Light Rain" | "Rain" => "/",
        "Mist" => "=",
        _ => "~",
    }
}

pub fn card(summary: &WeatherSummary) -> String {
    if summary.is_unavailable() {
        format!("  {} {:<14} {}", icon(&summary.description), summary.city_name, summary.description)
    } else {
        format!(
            "  {} {:<14} {:>6.1}°C  {}",
            icon(&summary.description),
            summary.city_name,
            summary.temperature_c,
            summary.description,
        )
    }
}

pub fn card_label(summary: &WeatherSummary) -> String {
    format!("{} ({})", summary.city_name, summary.id)
}

pub fn list(state: &DashboardState) -> String {
    let mut out = String::from("\nWeather App\n===========\n");

    if state.loading {
        out.push_str("Loading...\n");
        return out;
    }

    if let Some(error) = &state.error {
        out.push_str(&format!("! {error}\n"));
    }

    if state.cities.is_empty() {
        out.push_str("No cities yet. Add one to get started.\n");
    }

    for summary in &state.cities {
        out.push_str(&card(summary));
        out.push('\n');
    }

    out
}

pub fn detail(detail: &WeatherDetail) -> String {
    let mut out = String::new();

    out.push_str(&format!("\n{}\n", detail.city_name));
    out.push_str(&format!("{}\n\n", detail.date));
    out.push_str(&format!("  {} {}\n", icon(&detail.description), detail.description));
    out.push_str(&format!(
        "  Temp:       {:.1}°C (min {:.1}°C, max {:.1}°C)\n",
        detail.temperature_c, detail.temp_min_c, detail.temp_max_c,
    ));
    out.push_str(&format!("  Pressure:   {:.0} hPa\n", detail.pressure_hpa));
    out.push_str(&format!("  Humidity:   {:.0}%\n", detail.humidity_pct));
    out.push_str(&format!("  Visibility: {:.1} km\n", detail.visibility_m / 1000.0));
    out.push_str(&format!(
        "  Wind:       {:.1} m/s at {:.0}°\n",
        detail.wind_speed_mps, detail.wind_deg,
    ));
    out.push_str(&format!("  Sunrise:    {}\n", detail.sunrise));
    out.push_str(&format!("  Sunset:     {}\n", detail.sunset));

    out
}
