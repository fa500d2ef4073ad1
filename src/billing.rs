// src/billing.rs
//! Subscription state, Stripe checkout/portal sessions and webhook handling.
use crate::auth::AuthError;
use crate::config::BillingConfig;
use crate::db::{get_timestamp, list_or_empty, DbError};
use crate::profile::{apply_subscription_change, set_stripe_customer_id, Profile, SubscriptionChange};
use chrono::{DateTime, TimeZone, Utc};
use ring::hmac;
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use strum_macros::{Display, EnumString};
use thiserror::Error;
use tracing::{debug, error, info, warn};

const STRIPE_API_BASE: &str = "https://api.stripe.com/v1";

/// Metadata key carrying our profile id on Stripe objects.
pub const USER_ID_METADATA_KEY: &str = "user_id";

#[derive(Error, Debug)]
pub enum BillingError {
    #[error("Stripe is not configured ({0} missing)")]
    NotConfigured(&'static str),
    #[error("Missing webhook signature")]
    MissingSignature,
    #[error("Invalid webhook signature")]
    InvalidSignature,
    #[error("Webhook timestamp outside the tolerance window")]
    ExpiredSignature,
    #[error("Malformed webhook payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
    #[error("No subscription found")]
    NoSubscription,
    #[error("Payment provider request failed: {0}")]
    Gateway(String),
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Database error: {0}")]
    Db(#[from] DbError),
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum SubscriptionStatus {
    #[default]
    Free,
    Premium,
    Cancelled,
    PastDue,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SubscriptionInfo {
    pub status: SubscriptionStatus,
    pub is_premium: bool,
    pub ends_at: Option<DateTime<Utc>>,
    pub stripe_customer_id: Option<String>,
}

/// Effective subscription of a profile. Premium requires the premium status
/// and an end date that is absent or still ahead. A premium profile past its
/// end date keeps reporting `Premium` as status but is not premium.
#[must_use]
pub fn subscription_info(profile: Option<&Profile>, now: DateTime<Utc>) -> SubscriptionInfo {
    let Some(profile) = profile else {
        return SubscriptionInfo {
            status: SubscriptionStatus::Free,
            is_premium: false,
            ends_at: None,
            stripe_customer_id: None,
        };
    };
    let is_premium = profile.subscription_status == SubscriptionStatus::Premium
        && profile.subscription_ends_at.map_or(true, |ends| ends > now);
    SubscriptionInfo {
        status: profile.subscription_status,
        is_premium,
        ends_at: profile.subscription_ends_at,
        stripe_customer_id: profile.stripe_customer_id.clone(),
    }
}

pub fn require_premium(info: &SubscriptionInfo) -> Result<(), AuthError> {
    if info.is_premium {
        Ok(())
    } else {
        Err(AuthError::UpgradeRequired)
    }
}

// ---- Webhook payloads ----

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CheckoutSessionObject {
    pub id: String,
    pub subscription: Option<String>,
    pub customer: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionObject {
    pub id: String,
    pub status: String,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub current_period_start: Option<i64>,
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SubscriptionObject {
    pub fn user_id(&self) -> Option<&str> {
        self.metadata.get(USER_ID_METADATA_KEY).map(String::as_str)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct InvoiceObject {
    pub id: String,
    pub subscription: Option<String>,
    pub billing_reason: Option<String>,
}

/// Maps a processor subscription onto our status.
#[must_use]
pub fn status_for_subscription(subscription: &SubscriptionObject) -> SubscriptionStatus {
    if subscription.status == "active" && !subscription.cancel_at_period_end {
        SubscriptionStatus::Premium
    } else if subscription.cancel_at_period_end {
        SubscriptionStatus::Cancelled
    } else if subscription.status == "past_due" {
        SubscriptionStatus::PastDue
    } else {
        SubscriptionStatus::Free
    }
}

fn from_unix(secs: Option<i64>) -> Option<DateTime<Utc>> {
    secs.and_then(|s| Utc.timestamp_opt(s, 0).single())
}

// ---- Signature verification ----

/// Verifies `Stripe-Signature` headers of the form `t=<unix>,v1=<hex>[,v1=...]`.
pub struct WebhookVerifier {
    secret: String,
    tolerance_secs: i64,
}

impl WebhookVerifier {
    #[must_use]
    pub fn new(secret: String, tolerance_secs: i64) -> Self {
        Self {
            secret,
            tolerance_secs,
        }
    }

    pub fn from_config(config: &BillingConfig) -> Result<Self, BillingError> {
        let secret = config
            .webhook_secret()
            .ok_or(BillingError::NotConfigured("webhook secret"))?;
        Ok(Self::new(secret, config.webhook_tolerance_secs))
    }

    /// Checks the signature and timestamp, then parses the event.
    pub fn verify(
        &self,
        signature_header: Option<&str>,
        body: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, BillingError> {
        let header = signature_header
            .filter(|h| !h.trim().is_empty())
            .ok_or(BillingError::MissingSignature)?;

        let mut timestamp: Option<i64> = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            match part.trim().split_once('=') {
                Some(("t", value)) => timestamp = value.parse().ok(),
                Some(("v1", value)) => signatures.push(value),
                _ => {}
            }
        }
        let timestamp = timestamp.ok_or(BillingError::InvalidSignature)?;
        if signatures.is_empty() {
            return Err(BillingError::InvalidSignature);
        }
        if (now.timestamp() - timestamp).abs() > self.tolerance_secs {
            return Err(BillingError::ExpiredSignature);
        }

        let expected = sign(&self.secret, timestamp, body);
        let matched = signatures
            .iter()
            .any(|sig| bool::from(subtle::ConstantTimeEq::ct_eq(sig.as_bytes(), expected.as_bytes())));
        if !matched {
            warn!("Webhook signature verification failed");
            return Err(BillingError::InvalidSignature);
        }

        Ok(serde_json::from_str(body)?)
    }
}

fn sign(secret: &str, timestamp: i64, body: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, secret.as_bytes());
    let tag = hmac::sign(&key, format!("{timestamp}.{body}").as_bytes());
    hex::encode(tag.as_ref())
}

/// Builds a header value the verifier accepts. Used to replay events locally.
#[must_use]
pub fn signature_header(secret: &str, timestamp: i64, body: &str) -> String {
    format!("t={timestamp},v1={}", sign(secret, timestamp, body))
}

// ---- Payment gateway ----

#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub customer_id: String,
    pub price_id: String,
    pub user_id: String,
    pub success_url: String,
    pub cancel_url: String,
}

pub trait PaymentGateway {
    /// Returns the new customer id.
    fn create_customer(&self, user_id: &str, username: &str) -> Result<String, BillingError>;
    /// Returns the checkout redirect URL.
    fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, BillingError>;
    /// Returns the billing portal URL.
    fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError>;
    fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionObject, BillingError>;
}

pub struct StripeClient {
    client: reqwest::blocking::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Deserialize)]
struct IdResponse {
    id: String,
}

#[derive(Deserialize)]
struct UrlResponse {
    url: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            client: reqwest::blocking::Client::new(),
            secret_key,
            api_base: STRIPE_API_BASE.to_string(),
        }
    }

    pub fn from_config(config: &BillingConfig) -> Result<Self, BillingError> {
        let key = config
            .secret_key()
            .ok_or(BillingError::NotConfigured("secret key"))?;
        Ok(Self::new(key))
    }

    fn check(
        &self,
        response: reqwest::blocking::Response,
        path: &str,
    ) -> Result<reqwest::blocking::Response, BillingError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        error!("Stripe request to {} failed with status {}: {}", path, status, body);
        Err(BillingError::Gateway(format!("{path} returned {status}")))
    }

    fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        form: &[(&str, String)],
    ) -> Result<T, BillingError> {
        let url = format!("{}{}", self.api_base, path);
        debug!("POST {}", url);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(form)
            .send()?;
        Ok(self.check(response, path)?.json()?)
    }

    fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, BillingError> {
        let url = format!("{}{}", self.api_base, path);
        debug!("GET {}", url);
        let response = self.client.get(&url).bearer_auth(&self.secret_key).send()?;
        Ok(self.check(response, path)?.json()?)
    }
}

impl PaymentGateway for StripeClient {
    fn create_customer(&self, user_id: &str, username: &str) -> Result<String, BillingError> {
        let customer: IdResponse = self.post_form(
            "/customers",
            &[
                ("metadata[user_id]", user_id.to_string()),
                ("metadata[username]", username.to_string()),
            ],
        )?;
        info!("Created Stripe customer {} for user {}", customer.id, user_id);
        Ok(customer.id)
    }

    fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, BillingError> {
        let session: UrlResponse = self.post_form(
            "/checkout/sessions",
            &[
                ("customer", request.customer_id.clone()),
                ("mode", "subscription".to_string()),
                ("line_items[0][price]", request.price_id.clone()),
                ("line_items[0][quantity]", "1".to_string()),
                ("success_url", request.success_url.clone()),
                ("cancel_url", request.cancel_url.clone()),
                ("metadata[user_id]", request.user_id.clone()),
                ("subscription_data[metadata][user_id]", request.user_id.clone()),
            ],
        )?;
        session
            .url
            .ok_or_else(|| BillingError::Gateway("checkout session has no url".to_string()))
    }

    fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError> {
        let session: UrlResponse = self.post_form(
            "/billing_portal/sessions",
            &[
                ("customer", customer_id.to_string()),
                ("return_url", return_url.to_string()),
            ],
        )?;
        session
            .url
            .ok_or_else(|| BillingError::Gateway("portal session has no url".to_string()))
    }

    fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionObject, BillingError> {
        self.get(&format!("/subscriptions/{subscription_id}"))
    }
}

// ---- Checkout / portal ----

fn base_url(config: &BillingConfig) -> &str {
    config.base_url.trim_end_matches('/')
}

/// Starts a subscription checkout, creating the processor customer on first use.
/// Returns the URL to send the user to.
pub fn create_checkout(
    conn: &Connection,
    gateway: &dyn PaymentGateway,
    config: &BillingConfig,
    profile: &Profile,
) -> Result<String, BillingError> {
    let price_id = config
        .price_id()
        .ok_or(BillingError::NotConfigured("price id"))?;

    let customer_id = match &profile.stripe_customer_id {
        Some(id) => id.clone(),
        None => {
            let id = gateway.create_customer(&profile.id, &profile.username)?;
            set_stripe_customer_id(conn, &profile.id, &id)?;
            id
        }
    };

    let base = base_url(config);
    let request = CheckoutRequest {
        customer_id,
        price_id,
        user_id: profile.id.clone(),
        success_url: format!("{base}/upgrade?success=true"),
        cancel_url: format!("{base}/upgrade?cancelled=true"),
    };
    gateway.create_checkout_session(&request)
}

pub fn create_portal(
    gateway: &dyn PaymentGateway,
    config: &BillingConfig,
    profile: &Profile,
) -> Result<String, BillingError> {
    let customer_id = profile
        .stripe_customer_id
        .as_deref()
        .ok_or(BillingError::NoSubscription)?;
    gateway.create_portal_session(customer_id, &format!("{}/profile", base_url(config)))
}

// ---- Event handling ----

/// What a handled webhook did to a profile.
#[derive(Debug, Clone, PartialEq)]
pub struct AppliedEvent {
    pub user_id: String,
    pub event_type: &'static str,
    pub status: SubscriptionStatus,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionEvent {
    pub id: i64,
    pub user_id: String,
    pub event_type: String,
    pub stripe_event_id: Option<String>,
    pub data: Option<String>,
    pub created_at: DateTime<Utc>,
}

fn log_event(
    conn: &Connection,
    user_id: &str,
    event_type: &str,
    event: &WebhookEvent,
    now: DateTime<Utc>,
) -> Result<(), DbError> {
    conn.execute(
        "INSERT INTO subscription_events (user_id, event_type, stripe_event_id, data, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            user_id,
            event_type,
            event.id,
            event.data.object.to_string(),
            now.to_rfc3339()
        ],
    )
    .map_err(DbError::InsertFailed)?;
    Ok(())
}

/// A user's subscription event log, newest first.
pub fn list_subscription_events(conn: &Connection, user_id: &str) -> Result<Vec<SubscriptionEvent>, DbError> {
    list_or_empty("subscription_events", || {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, event_type, stripe_event_id, data, created_at
             FROM subscription_events
             WHERE user_id = ?1
             ORDER BY id DESC",
        )?;
        let rows = stmt.query_map(params![user_id], |row| {
            Ok(SubscriptionEvent {
                id: row.get(0)?,
                user_id: row.get(1)?,
                event_type: row.get(2)?,
                stripe_event_id: row.get(3)?,
                data: row.get(4)?,
                created_at: get_timestamp(row, 5)?,
            })
        })?;
        rows.collect()
    })
}

fn apply(
    conn: &Connection,
    event: &WebhookEvent,
    user_id: &str,
    event_type: &'static str,
    change: SubscriptionChange,
    now: DateTime<Utc>,
) -> Result<Option<AppliedEvent>, BillingError> {
    let status = change.status.unwrap_or_default();
    // The status change and its event row land together or not at all.
    let tx = conn.unchecked_transaction().map_err(DbError::Connection)?;
    apply_subscription_change(&tx, user_id, &change, now)?;
    log_event(&tx, user_id, event_type, event, now)?;
    tx.commit().map_err(DbError::Connection)?;
    info!("Webhook {} applied to user {}: {}", event.kind, user_id, status);
    Ok(Some(AppliedEvent {
        user_id: user_id.to_string(),
        event_type,
        status,
    }))
}

/// Applies a verified webhook event to the affected profile. Events without a
/// resolvable user and unknown kinds are acknowledged with `None`.
pub fn handle_webhook_event(
    conn: &Connection,
    gateway: &dyn PaymentGateway,
    event: &WebhookEvent,
    now: DateTime<Utc>,
) -> Result<Option<AppliedEvent>, BillingError> {
    let object = event.data.object.clone();
    match event.kind.as_str() {
        "checkout.session.completed" => {
            let session: CheckoutSessionObject = serde_json::from_value(object)?;
            let (Some(user_id), Some(sub_id)) = (
                session.metadata.get(USER_ID_METADATA_KEY),
                session.subscription.as_deref(),
            ) else {
                debug!("Checkout session {} has no user or subscription", session.id);
                return Ok(None);
            };
            let subscription = gateway.retrieve_subscription(sub_id)?;
            let change = SubscriptionChange {
                status: Some(SubscriptionStatus::Premium),
                subscription_id: Some(Some(subscription.id.clone())),
                started_at: Some(from_unix(subscription.current_period_start)),
                ends_at: Some(from_unix(subscription.current_period_end)),
            };
            apply(conn, event, user_id, "subscription_created", change, now)
        }
        "customer.subscription.updated" => {
            let subscription: SubscriptionObject = serde_json::from_value(object)?;
            let Some(user_id) = subscription.user_id() else {
                return Ok(None);
            };
            let change = SubscriptionChange {
                status: Some(status_for_subscription(&subscription)),
                ends_at: Some(from_unix(subscription.current_period_end)),
                ..SubscriptionChange::default()
            };
            apply(conn, event, user_id, "subscription_updated", change, now)
        }
        "customer.subscription.deleted" => {
            let subscription: SubscriptionObject = serde_json::from_value(object)?;
            let Some(user_id) = subscription.user_id() else {
                return Ok(None);
            };
            let change = SubscriptionChange {
                status: Some(SubscriptionStatus::Free),
                subscription_id: Some(None),
                ends_at: Some(None),
                ..SubscriptionChange::default()
            };
            apply(conn, event, user_id, "subscription_cancelled", change, now)
        }
        "invoice.payment_failed" => {
            let invoice: InvoiceObject = serde_json::from_value(object)?;
            let Some(sub_id) = invoice.subscription.as_deref() else {
                return Ok(None);
            };
            let subscription = gateway.retrieve_subscription(sub_id)?;
            let Some(user_id) = subscription.user_id() else {
                return Ok(None);
            };
            let change = SubscriptionChange {
                status: Some(SubscriptionStatus::PastDue),
                ..SubscriptionChange::default()
            };
            apply(conn, event, user_id, "payment_failed", change, now)
        }
        "invoice.payment_succeeded" => {
            let invoice: InvoiceObject = serde_json::from_value(object)?;
            let Some(sub_id) = invoice.subscription.as_deref() else {
                return Ok(None);
            };
            if invoice.billing_reason.as_deref() != Some("subscription_cycle") {
                return Ok(None);
            }
            let subscription = gateway.retrieve_subscription(sub_id)?;
            let Some(user_id) = subscription.user_id() else {
                return Ok(None);
            };
            let change = SubscriptionChange {
                status: Some(SubscriptionStatus::Premium),
                ends_at: Some(from_unix(subscription.current_period_end)),
                ..SubscriptionChange::default()
            };
            apply(conn, event, user_id, "subscription_renewed", change, now)
        }
        other => {
            debug!("Ignoring webhook event type {}", other);
            Ok(None)
        }
    }
}
