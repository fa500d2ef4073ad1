use anyhow::{Context, Result};
use chrono::{DateTime, Duration, TimeZone, Utc};
use gym_tracker_lib::billing::{
    create_checkout, create_portal, handle_webhook_event, list_subscription_events,
    signature_header, status_for_subscription, subscription_info, BillingError, CheckoutRequest,
    PaymentGateway, SubscriptionObject, SubscriptionStatus, WebhookEvent, WebhookVerifier,
};
use gym_tracker_lib::profile::{create_profile, get_profile, Profile};
use gym_tracker_lib::BillingConfig;
use rusqlite::Connection;
use std::cell::{Cell, RefCell};
use std::collections::HashMap;

const SECRET: &str = "whsec_test_secret";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 12, 12, 0, 0).unwrap()
}

fn setup() -> Result<(Connection, Profile)> {
    let conn = Connection::open_in_memory()?;
    gym_tracker_lib::db::init_db(&conn)?;
    let profile = create_profile(&conn, "mia", None, now())?;
    Ok((conn, profile))
}

fn subscription(user_id: &str, status: &str, cancel_at_period_end: bool) -> SubscriptionObject {
    let mut metadata = HashMap::new();
    metadata.insert("user_id".to_string(), user_id.to_string());
    SubscriptionObject {
        id: "sub_123".to_string(),
        status: status.to_string(),
        cancel_at_period_end,
        current_period_start: Some(now().timestamp()),
        current_period_end: Some((now() + Duration::days(30)).timestamp()),
        metadata,
    }
}

struct FakeGateway {
    subscription: SubscriptionObject,
    customers_created: Cell<u32>,
    checkouts: RefCell<Vec<CheckoutRequest>>,
}

impl FakeGateway {
    fn new(subscription: SubscriptionObject) -> Self {
        Self {
            subscription,
            customers_created: Cell::new(0),
            checkouts: RefCell::new(Vec::new()),
        }
    }
}

impl PaymentGateway for FakeGateway {
    fn create_customer(&self, _user_id: &str, _username: &str) -> Result<String, BillingError> {
        self.customers_created.set(self.customers_created.get() + 1);
        Ok(format!("cus_{}", self.customers_created.get()))
    }

    fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<String, BillingError> {
        self.checkouts.borrow_mut().push(request.clone());
        Ok("https://checkout.example/session".to_string())
    }

    fn create_portal_session(&self, customer_id: &str, return_url: &str) -> Result<String, BillingError> {
        Ok(format!("https://portal.example/{customer_id}?return={return_url}"))
    }

    fn retrieve_subscription(&self, subscription_id: &str) -> Result<SubscriptionObject, BillingError> {
        if subscription_id == self.subscription.id {
            Ok(self.subscription.clone())
        } else {
            Err(BillingError::Gateway(format!("unknown subscription {subscription_id}")))
        }
    }
}

fn event(kind: &str, object: serde_json::Value) -> WebhookEvent {
    serde_json::from_value(serde_json::json!({
        "id": format!("evt_{kind}"),
        "type": kind,
        "data": { "object": object },
    }))
    .unwrap()
}

fn verifier() -> WebhookVerifier {
    WebhookVerifier::new(SECRET.to_string(), 300)
}

const BODY: &str = r#"{"id":"evt_1","type":"customer.subscription.deleted","data":{"object":{"id":"sub_123","status":"canceled","metadata":{}}}}"#;

#[test]
fn test_valid_signature_is_accepted() -> Result<()> {
    let header = signature_header(SECRET, now().timestamp(), BODY);
    let parsed = verifier().verify(Some(&header), BODY, now())?;
    assert_eq!(parsed.id, "evt_1");
    assert_eq!(parsed.kind, "customer.subscription.deleted");

    // Any matching v1 entry is enough.
    let rotated = format!("{header},v1=deadbeef");
    assert!(verifier().verify(Some(&rotated), BODY, now()).is_ok());
    Ok(())
}

#[test]
fn test_bad_signatures_are_rejected() {
    let ts = now().timestamp();

    assert!(matches!(
        verifier().verify(None, BODY, now()),
        Err(BillingError::MissingSignature)
    ));
    assert!(matches!(
        verifier().verify(Some("  "), BODY, now()),
        Err(BillingError::MissingSignature)
    ));

    let wrong_secret = signature_header("whsec_other", ts, BODY);
    assert!(matches!(
        verifier().verify(Some(&wrong_secret), BODY, now()),
        Err(BillingError::InvalidSignature)
    ));

    let header = signature_header(SECRET, ts, BODY);
    let tampered = BODY.replace("canceled", "active");
    assert!(matches!(
        verifier().verify(Some(&header), &tampered, now()),
        Err(BillingError::InvalidSignature)
    ));

    assert!(matches!(
        verifier().verify(Some(&format!("t={ts}")), BODY, now()),
        Err(BillingError::InvalidSignature)
    ));
    assert!(matches!(
        verifier().verify(Some("v1=abc"), BODY, now()),
        Err(BillingError::InvalidSignature)
    ));
}

#[test]
fn test_stale_timestamp_is_rejected() {
    let old = (now() - Duration::minutes(10)).timestamp();
    let header = signature_header(SECRET, old, BODY);
    assert!(matches!(
        verifier().verify(Some(&header), BODY, now()),
        Err(BillingError::ExpiredSignature)
    ));
}

#[test]
fn test_signed_garbage_is_malformed() {
    let body = "not json";
    let header = signature_header(SECRET, now().timestamp(), body);
    assert!(matches!(
        verifier().verify(Some(&header), body, now()),
        Err(BillingError::MalformedPayload(_))
    ));
}

#[test]
fn test_status_for_subscription() {
    let status = |s: &str, cancel: bool| status_for_subscription(&subscription("u", s, cancel));
    assert_eq!(status("active", false), SubscriptionStatus::Premium);
    assert_eq!(status("active", true), SubscriptionStatus::Cancelled);
    assert_eq!(status("past_due", false), SubscriptionStatus::PastDue);
    assert_eq!(status("past_due", true), SubscriptionStatus::Cancelled);
    assert_eq!(status("incomplete", false), SubscriptionStatus::Free);
    assert_eq!(status("canceled", false), SubscriptionStatus::Free);
}

#[test]
fn test_checkout_completed_grants_premium() -> Result<()> {
    let (conn, profile) = setup()?;
    let gateway = FakeGateway::new(subscription(&profile.id, "active", false));

    let completed = event(
        "checkout.session.completed",
        serde_json::json!({
            "id": "cs_1",
            "subscription": "sub_123",
            "customer": "cus_1",
            "metadata": { "user_id": profile.id },
        }),
    );
    let applied = handle_webhook_event(&conn, &gateway, &completed, now())?
        .context("event should apply")?;
    assert_eq!(applied.event_type, "subscription_created");
    assert_eq!(applied.status, SubscriptionStatus::Premium);

    let stored = get_profile(&conn, &profile.id)?.context("profile exists")?;
    assert_eq!(stored.subscription_status, SubscriptionStatus::Premium);
    assert_eq!(stored.subscription_id.as_deref(), Some("sub_123"));
    assert_eq!(stored.subscription_started_at, Some(now()));
    assert_eq!(stored.subscription_ends_at, Some(now() + Duration::days(30)));
    assert!(subscription_info(Some(&stored), now()).is_premium);

    let events = list_subscription_events(&conn, &profile.id)?;
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].event_type, "subscription_created");
    assert_eq!(events[0].stripe_event_id.as_deref(), Some("evt_checkout.session.completed"));
    Ok(())
}

#[test]
fn test_subscription_updated_and_deleted() -> Result<()> {
    let (conn, profile) = setup()?;
    let gateway = FakeGateway::new(subscription(&profile.id, "active", false));

    let cancelling = serde_json::json!({
        "id": "sub_123",
        "status": "active",
        "cancel_at_period_end": true,
        "current_period_end": (now() + Duration::days(5)).timestamp(),
        "metadata": { "user_id": profile.id },
    });
    let applied = handle_webhook_event(&conn, &gateway, &event("customer.subscription.updated", cancelling), now())?
        .context("update should apply")?;
    assert_eq!(applied.status, SubscriptionStatus::Cancelled);
    let stored = get_profile(&conn, &profile.id)?.context("profile exists")?;
    assert_eq!(stored.subscription_ends_at, Some(now() + Duration::days(5)));

    let deleted = serde_json::json!({
        "id": "sub_123",
        "status": "canceled",
        "metadata": { "user_id": profile.id },
    });
    let applied = handle_webhook_event(&conn, &gateway, &event("customer.subscription.deleted", deleted), now())?
        .context("delete should apply")?;
    assert_eq!(applied.event_type, "subscription_cancelled");
    assert_eq!(applied.status, SubscriptionStatus::Free);

    let stored = get_profile(&conn, &profile.id)?.context("profile exists")?;
    assert_eq!(stored.subscription_status, SubscriptionStatus::Free);
    assert!(stored.subscription_id.is_none());
    assert!(stored.subscription_ends_at.is_none());
    assert_eq!(list_subscription_events(&conn, &profile.id)?.len(), 2);
    Ok(())
}

#[test]
fn test_failed_event_log_rolls_back_status_change() -> Result<()> {
    let (conn, profile) = setup()?;
    let gateway = FakeGateway::new(subscription(&profile.id, "active", false));
    conn.execute_batch("DROP TABLE subscription_events;")?;

    let active = serde_json::json!({
        "id": "sub_123",
        "status": "active",
        "cancel_at_period_end": false,
        "current_period_end": (now() + Duration::days(30)).timestamp(),
        "metadata": { "user_id": profile.id },
    });
    let result = handle_webhook_event(&conn, &gateway, &event("customer.subscription.updated", active), now());
    assert!(matches!(result, Err(BillingError::Db(_))));

    let stored = get_profile(&conn, &profile.id)?.context("profile exists")?;
    assert_eq!(stored.subscription_status, profile.subscription_status);
    assert_eq!(stored.subscription_id, profile.subscription_id);
    assert!(stored.subscription_ends_at.is_none());
    Ok(())
}

#[test]
fn test_invoice_events() -> Result<()> {
    let (conn, profile) = setup()?;
    let gateway = FakeGateway::new(subscription(&profile.id, "active", false));

    let failed = event(
        "invoice.payment_failed",
        serde_json::json!({ "id": "in_1", "subscription": "sub_123" }),
    );
    let applied = handle_webhook_event(&conn, &gateway, &failed, now())?.context("should apply")?;
    assert_eq!(applied.status, SubscriptionStatus::PastDue);

    // Only renewals count; the first invoice is covered by checkout.
    let first_invoice = event(
        "invoice.payment_succeeded",
        serde_json::json!({ "id": "in_2", "subscription": "sub_123", "billing_reason": "subscription_create" }),
    );
    assert!(handle_webhook_event(&conn, &gateway, &first_invoice, now())?.is_none());

    let renewal = event(
        "invoice.payment_succeeded",
        serde_json::json!({ "id": "in_3", "subscription": "sub_123", "billing_reason": "subscription_cycle" }),
    );
    let applied = handle_webhook_event(&conn, &gateway, &renewal, now())?.context("should apply")?;
    assert_eq!(applied.event_type, "subscription_renewed");
    assert_eq!(applied.status, SubscriptionStatus::Premium);

    let no_subscription = event("invoice.payment_failed", serde_json::json!({ "id": "in_4" }));
    assert!(handle_webhook_event(&conn, &gateway, &no_subscription, now())?.is_none());
    Ok(())
}

#[test]
fn test_unresolvable_events_are_acknowledged() -> Result<()> {
    let (conn, profile) = setup()?;
    let gateway = FakeGateway::new(subscription(&profile.id, "active", false));

    let unknown = event("customer.created", serde_json::json!({ "id": "cus_9" }));
    assert!(handle_webhook_event(&conn, &gateway, &unknown, now())?.is_none());

    let anonymous = event(
        "customer.subscription.updated",
        serde_json::json!({ "id": "sub_123", "status": "active" }),
    );
    assert!(handle_webhook_event(&conn, &gateway, &anonymous, now())?.is_none());
    assert!(list_subscription_events(&conn, &profile.id)?.is_empty());

    // A user id that matches no profile is an error.
    let orphan = event(
        "customer.subscription.deleted",
        serde_json::json!({ "id": "sub_123", "status": "canceled", "metadata": { "user_id": "ghost" } }),
    );
    assert!(handle_webhook_event(&conn, &gateway, &orphan, now()).is_err());
    Ok(())
}

#[test]
fn test_checkout_creates_customer_once() -> Result<()> {
    let (conn, profile) = setup()?;
    let gateway = FakeGateway::new(subscription(&profile.id, "active", false));
    let config = BillingConfig {
        price_id: Some("price_monthly".to_string()),
        base_url: "https://gym.example/".to_string(),
        ..BillingConfig::default()
    };

    let url = create_checkout(&conn, &gateway, &config, &profile)?;
    assert_eq!(url, "https://checkout.example/session");
    let profile = get_profile(&conn, &profile.id)?.context("profile exists")?;
    assert_eq!(profile.stripe_customer_id.as_deref(), Some("cus_1"));

    create_checkout(&conn, &gateway, &config, &profile)?;
    assert_eq!(gateway.customers_created.get(), 1);

    let checkouts = gateway.checkouts.borrow();
    assert_eq!(checkouts.len(), 2);
    assert_eq!(checkouts[0].customer_id, "cus_1");
    assert_eq!(checkouts[0].user_id, profile.id);
    assert_eq!(checkouts[0].success_url, "https://gym.example/upgrade?success=true");
    Ok(())
}

#[test]
fn test_portal_needs_customer() -> Result<()> {
    let (conn, profile) = setup()?;
    let gateway = FakeGateway::new(subscription(&profile.id, "active", false));
    let config = BillingConfig::default();

    assert!(matches!(
        create_portal(&gateway, &config, &profile),
        Err(BillingError::NoSubscription)
    ));

    gym_tracker_lib::profile::set_stripe_customer_id(&conn, &profile.id, "cus_7")?;
    let profile = get_profile(&conn, &profile.id)?.context("profile exists")?;
    let url = create_portal(&gateway, &config, &profile)?;
    assert_eq!(url, "https://portal.example/cus_7?return=http://localhost:3000/profile");
    Ok(())
}

#[test]
fn test_subscription_info_for_signed_out_user() {
    let info = subscription_info(None, now());
    assert_eq!(info.status, SubscriptionStatus::Free);
    assert!(!info.is_premium);
}
