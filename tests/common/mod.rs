use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use sea_orm::{ActiveModelTrait, Set};
use sea_orm_migration::MigratorTrait;
use tempfile::TempDir;
use uuid::Uuid;

use storefront_api::auth::{AuthContext, Role};
use storefront_api::config::AppConfig;
use storefront_api::db::establish_connection;
use storefront_api::entities::pending_payment::PaymentStatus;
use storefront_api::entities::product;
use storefront_api::errors::ServiceError;
use storefront_api::migrator::Migrator;
use storefront_api::services::payment_provider::{
    CreateSessionRequest, CreatedSession, PaymentProvider, SessionStatus,
};
use storefront_api::AppState;

/// In-memory stand-in for the hosted checkout provider. Sessions start
/// unpaid; tests flip their status to drive the reconciliation paths.
pub struct MockPaymentProvider {
    sessions: Mutex<HashMap<String, SessionStatus>>,
    counter: AtomicU64,
    fail_create: AtomicBool,
    fail_status: AtomicBool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            counter: AtomicU64::new(1),
            fail_create: AtomicBool::new(false),
            fail_status: AtomicBool::new(false),
        }
    }

    /// Makes subsequent `create_session` calls fail like a provider outage
    pub fn fail_session_creation(&self, fail: bool) {
        self.fail_create.store(fail, Ordering::SeqCst);
    }

    /// Makes subsequent `get_session_status` calls fail
    pub fn fail_status_lookup(&self, fail: bool) {
        self.fail_status.store(fail, Ordering::SeqCst);
    }

    pub fn mark_paid(&self, session_id: &str) {
        self.set_status(session_id, PaymentStatus::Paid, Some("https://receipts.example.com/r1"));
    }

    pub fn mark_failed(&self, session_id: &str) {
        self.set_status(session_id, PaymentStatus::Failed, None);
    }

    pub fn set_status(&self, session_id: &str, status: PaymentStatus, receipt_url: Option<&str>) {
        self.sessions.lock().unwrap().insert(
            session_id.to_string(),
            SessionStatus {
                status,
                receipt_url: receipt_url.map(str::to_string),
                payer_email: Some("shopper@example.com".to_string()),
            },
        );
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().unwrap().len()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_session(
        &self,
        _request: CreateSessionRequest,
    ) -> Result<CreatedSession, ServiceError> {
        if self.fail_create.load(Ordering::SeqCst) {
            return Err(ServiceError::PaymentProviderError(
                "provider unavailable".to_string(),
            ));
        }
        let n = self.counter.fetch_add(1, Ordering::SeqCst);
        let session_id = format!("cs_test_{}", n);
        self.sessions.lock().unwrap().insert(
            session_id.clone(),
            SessionStatus {
                status: PaymentStatus::Unpaid,
                receipt_url: None,
                payer_email: None,
            },
        );
        Ok(CreatedSession {
            checkout_url: format!("https://checkout.example.com/pay/{}", session_id),
            session_id,
        })
    }

    async fn get_session_status(&self, session_id: &str) -> Result<SessionStatus, ServiceError> {
        if self.fail_status.load(Ordering::SeqCst) {
            return Err(ServiceError::PaymentProviderError(
                "provider unavailable".to_string(),
            ));
        }
        self.sessions
            .lock()
            .unwrap()
            .get(session_id)
            .cloned()
            .ok_or_else(|| {
                ServiceError::PaymentProviderError(format!("unknown session {}", session_id))
            })
    }
}

/// A fully wired application over a throwaway SQLite database
pub struct TestApp {
    pub state: AppState,
    pub provider: Arc<MockPaymentProvider>,
    _tmp: TempDir,
}

impl TestApp {
    pub async fn new() -> Self {
        Self::with_pricing(1000, 100, 1000).await
    }

    /// Builds the app with explicit pricing parameters, for tests that
    /// exercise threshold and zero-fee edge cases
    pub async fn with_pricing(
        free_shipping_threshold_minor: i64,
        flat_shipping_fee_minor: i64,
        tax_rate_bps: u32,
    ) -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let db_path = tmp.path().join("test.db");
        let database_url = format!("sqlite://{}?mode=rwc", db_path.display());

        let db = establish_connection(&database_url)
            .await
            .expect("connect to test database");
        Migrator::up(&db, None).await.expect("run migrations");

        let mut config = AppConfig::new(
            database_url,
            "test_secret_key_that_is_long_enough_for_validation".to_string(),
            "127.0.0.1".to_string(),
            0,
            "test".to_string(),
        );
        config.pricing.free_shipping_threshold_minor = free_shipping_threshold_minor;
        config.pricing.flat_shipping_fee_minor = flat_shipping_fee_minor;
        config.pricing.tax_rate_bps = tax_rate_bps;

        let provider = Arc::new(MockPaymentProvider::new());
        let state = AppState::new(db, config, provider.clone(), None);

        Self {
            state,
            provider,
            _tmp: tmp,
        }
    }

    pub fn customer(&self) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), Role::Customer)
    }

    pub fn seller(&self) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), Role::Seller)
    }

    pub fn admin(&self) -> AuthContext {
        AuthContext::new(Uuid::new_v4(), Role::Admin)
    }

    pub async fn seed_product(&self, seller_id: Uuid, name: &str, price_minor: i64) -> Uuid {
        let id = Uuid::new_v4();
        product::ActiveModel {
            id: Set(id),
            seller_id: Set(seller_id),
            name: Set(name.to_string()),
            description: Set(None),
            image_url: Set(Some(format!("https://img.example.com/{}.jpg", name))),
            price_minor: Set(price_minor),
            currency: Set("USD".to_string()),
            is_active: Set(true),
            created_at: Set(Utc::now()),
            updated_at: Set(Utc::now()),
        }
        .insert(&*self.state.db)
        .await
        .expect("insert product");
        id
    }
}

/// The shipping address used across tests
pub fn test_address() -> storefront_api::services::checkout::ShippingAddress {
    storefront_api::services::checkout::ShippingAddress {
        address: "1 Main St".to_string(),
        city: "Springfield".to_string(),
        zip: "12345".to_string(),
    }
}
