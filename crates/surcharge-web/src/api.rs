//! API Client

use serde::Deserialize;

use surcharge_core::UpdateSurchargeRequest;

/// Fallback when the page origin can't be read
const DEFAULT_ORIGIN: &str = "http://localhost:3000";

/// Checkout bootstrap payload
#[derive(Clone, Debug, Deserialize)]
pub struct CheckoutInfo {
    pub ajax_url: String,
    pub nonce: String,
}

/// Background endpoint envelope
#[derive(Debug, Deserialize)]
struct AjaxResponse {
    success: bool,
    #[serde(default)]
    data: serde_json::Value,
}

fn origin() -> String {
    web_sys::window()
        .and_then(|w| w.location().origin().ok())
        .unwrap_or_else(|| DEFAULT_ORIGIN.into())
}

/// Resolve a server path against the page origin
pub fn absolute_url(origin: &str, path: &str) -> String {
    if path.starts_with("http://") || path.starts_with("https://") {
        return path.to_string();
    }
    format!("{}/{}", origin.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Start (or resume) the checkout session
pub async fn fetch_checkout() -> Result<CheckoutInfo, String> {
    let response = reqwest::Client::new()
        .get(absolute_url(&origin(), "/api/checkout"))
        .send()
        .await
        .map_err(|e| e.to_string())?;

    if response.status().is_success() {
        response.json().await.map_err(|e| e.to_string())
    } else {
        Err(format!("Checkout unavailable ({})", response.status()))
    }
}

/// Post the payment-method change to the background endpoint
pub async fn update_surcharge(ajax_url: &str, request: &UpdateSurchargeRequest) -> Result<(), String> {
    let response = reqwest::Client::new()
        .post(absolute_url(&origin(), ajax_url))
        .form(request)
        .send()
        .await
        .map_err(|e| e.to_string())?;

    let status = response.status();
    let body: AjaxResponse = response.json().await.map_err(|e| e.to_string())?;

    if status.is_success() && body.success {
        Ok(())
    } else {
        Err(body.data["message"]
            .as_str()
            .map_or_else(|| format!("Request failed ({status})"), String::from))
    }
}
