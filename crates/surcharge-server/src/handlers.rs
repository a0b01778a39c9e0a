//! HTTP Handlers

use std::collections::{BTreeMap, HashMap};

use axum::{
    Form, Json,
    extract::State,
    http::{HeaderMap, StatusCode},
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;

use surcharge_checkout::{CartTotals, CheckoutError, SessionId};
use surcharge_core::{PaymentGateway, SettingsField, UpdateSurchargeRequest, save_settings, settings_schema};

use crate::state::AppState;

/// Cookie carrying the shopper session id
pub const SESSION_COOKIE: &str = "surcharge_session";

/// Path of the background update endpoint
pub const AJAX_PATH: &str = "/ajax";

// ============================================================================
// Request / Response Types
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub gateways: usize,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

#[derive(Debug, Serialize)]
pub struct CheckoutResponse {
    pub ajax_url: &'static str,
    pub nonce: String,
    pub gateways: Vec<PaymentGateway>,
    pub chosen_payment_method: Option<String>,
    pub totals: CartTotals,
}

#[derive(Debug, Serialize)]
pub struct AjaxSuccess<T: Serialize> {
    pub success: bool,
    pub data: T,
}

#[derive(Debug, Deserialize)]
pub struct CartRequest {
    pub contents_total: Decimal,
    #[serde(default)]
    pub shipping_total: Decimal,
}

#[derive(Debug, Serialize)]
pub struct SettingsResponse {
    pub schema: Vec<SettingsField>,
    pub values: BTreeMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SaveSettingsResponse {
    pub saved: Vec<String>,
}

type AdminError = (StatusCode, Json<ErrorResponse>);

// ============================================================================
// Helpers
// ============================================================================

/// Session id from the request cookies
fn session_id(jar: &CookieJar) -> Option<SessionId> {
    jar.get(SESSION_COOKIE)
        .map(|c| c.value_trimmed())
        .filter(|v| !v.is_empty())
        .map(SessionId::from_string)
}

fn session_cookie(id: &SessionId) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, id.to_string()))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .build()
}

fn require_admin(state: &AppState, headers: &HeaderMap) -> Result<(), AdminError> {
    let Some(expected) = state.admin_token.as_deref() else {
        return Ok(());
    };

    let provided = headers.get("x-admin-token").map_or(&[][..], |v| v.as_bytes());
    if bool::from(provided.ct_eq(expected.as_bytes())) {
        Ok(())
    } else {
        tracing::warn!("Rejected admin request with missing or wrong token");
        Err((
            StatusCode::UNAUTHORIZED,
            Json(ErrorResponse {
                error: "Admin token required".into(),
                code: "UNAUTHORIZED".into(),
            }),
        ))
    }
}

fn settings_error(e: &surcharge_core::SurchargeError) -> AdminError {
    tracing::warn!(error = %e, "Surcharge settings rejected");
    (
        StatusCode::UNPROCESSABLE_ENTITY,
        Json(ErrorResponse {
            error: e.user_message(),
            code: "INVALID_SETTINGS".into(),
        }),
    )
}

// ============================================================================
// Handlers
// ============================================================================

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        gateways: state.registry.len(),
    })
}

/// Start or resume the checkout session, issue the update token
pub async fn checkout_bootstrap(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<(CookieJar, Json<CheckoutResponse>), CheckoutError> {
    let boot = state.checkout.bootstrap(session_id(&jar).as_ref())?;

    let jar = jar.add(session_cookie(&boot.session_id));
    let body = CheckoutResponse {
        ajax_url: AJAX_PATH,
        nonce: boot.nonce,
        gateways: boot.gateways,
        chosen_payment_method: boot.chosen_payment_method,
        totals: boot.totals,
    };

    Ok((jar, Json(body)))
}

/// Background request dispatcher (`action`, `payment_method`, `nonce`)
pub async fn ajax_handler(
    State(state): State<AppState>,
    jar: CookieJar,
    Form(request): Form<UpdateSurchargeRequest>,
) -> Result<Json<AjaxSuccess<CartTotals>>, CheckoutError> {
    let totals = state
        .checkout
        .handle_action(session_id(&jar).as_ref(), &request)?;

    Ok(Json(AjaxSuccess {
        success: true,
        data: totals,
    }))
}

/// Set the cart amounts (stand-in for the storefront's own cart)
pub async fn update_cart(
    State(state): State<AppState>,
    jar: CookieJar,
    Json(payload): Json<CartRequest>,
) -> Result<Json<CartTotals>, CheckoutError> {
    let totals = state.checkout.update_cart(
        session_id(&jar).as_ref(),
        payload.contents_total,
        payload.shipping_total,
    )?;
    Ok(Json(totals))
}

/// Recalculated cart totals
pub async fn cart_totals(
    State(state): State<AppState>,
    jar: CookieJar,
) -> Result<Json<CartTotals>, CheckoutError> {
    Ok(Json(state.checkout.totals(session_id(&jar).as_ref())?))
}

/// Settings page schema
pub async fn settings_schema_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<Vec<SettingsField>>, AdminError> {
    require_admin(&state, &headers)?;
    Ok(Json(settings_schema(&state.registry)))
}

/// Schema plus current values of its fields
pub async fn get_settings(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<SettingsResponse>, AdminError> {
    require_admin(&state, &headers)?;

    let schema = settings_schema(&state.registry);
    let mut options = state.options.snapshot().map_err(|e| settings_error(&e))?;
    let values = schema
        .iter()
        .filter(|f| f.kind.is_input())
        .filter_map(|f| options.remove(&f.id).map(|v| (f.id.clone(), v)))
        .collect();

    Ok(Json(SettingsResponse { schema, values }))
}

/// Save the settings form
pub async fn save_settings_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(form): Json<HashMap<String, String>>,
) -> Result<Json<SaveSettingsResponse>, AdminError> {
    require_admin(&state, &headers)?;

    let schema = settings_schema(&state.registry);
    let saved = save_settings(state.options.as_ref(), &schema, &form).map_err(|e| settings_error(&e))?;

    Ok(Json(SaveSettingsResponse { saved }))
}
