#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_storefront_api::{
    cache::InMemoryCache,
    config::{AppConfig, MailConfig, PaymentConfig},
    dto::orders::OrderWithItems,
    entity::{
        AuditLogs, CartItems, OrderItems, Orders, Products, Reviews, Users,
        products::{ActiveModel as ProductActive, ProductImage, ProductImages},
        users::{ActiveModel as UserActive, UserRole},
    },
    middleware::auth::AuthUser,
    notify::{Notifier, NotifyError},
    payment::{GatewayError, GatewayIntent, GatewayPayment, PaymentGateway},
    state::AppState,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ConnectOptions, ConnectionTrait, Database, DatabaseConnection, Schema, Set,
    Statement,
};
use uuid::Uuid;

pub const KEY_SECRET: &str = "test_key_secret";
pub const KEY_ID: &str = "rzp_test_key";

/// Gateway double: intents get sequential ids, payments are scripted per test.
#[derive(Default)]
pub struct FakeGateway {
    intents: Mutex<Vec<GatewayIntent>>,
    payments: Mutex<HashMap<String, GatewayPayment>>,
    pub fail_intents: Mutex<bool>,
}

impl FakeGateway {
    pub fn script_payment(&self, payment_id: &str, gateway_order_id: &str, status: &str, amount: i64) {
        self.payments.lock().unwrap().insert(
            payment_id.to_string(),
            GatewayPayment {
                id: payment_id.to_string(),
                status: status.to_string(),
                amount,
                order_id: Some(gateway_order_id.to_string()),
            },
        );
    }

    pub fn intents(&self) -> Vec<GatewayIntent> {
        self.intents.lock().unwrap().clone()
    }
}

#[async_trait]
impl PaymentGateway for FakeGateway {
    fn key_id(&self) -> &str {
        KEY_ID
    }

    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        receipt: &str,
    ) -> Result<GatewayIntent, GatewayError> {
        if *self.fail_intents.lock().unwrap() {
            return Err(GatewayError::Rejected {
                status: 503,
                body: "gateway down".into(),
            });
        }
        let mut intents = self.intents.lock().unwrap();
        let intent = GatewayIntent {
            id: format!("order_test_{}", intents.len() + 1),
            amount: amount_minor,
            currency: currency.to_string(),
            receipt: Some(receipt.to_string()),
        };
        intents.push(intent.clone());
        Ok(intent)
    }

    async fn fetch_payment(&self, payment_id: &str) -> Result<GatewayPayment, GatewayError> {
        self.payments
            .lock()
            .unwrap()
            .get(payment_id)
            .cloned()
            .ok_or_else(|| GatewayError::Rejected {
                status: 404,
                body: format!("payment {payment_id} not found"),
            })
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub confirmations: Mutex<Vec<(String, Uuid)>>,
    pub resets: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_order_confirmation(
        &self,
        email: &str,
        order: &OrderWithItems,
    ) -> Result<(), NotifyError> {
        self.confirmations
            .lock()
            .unwrap()
            .push((email.to_string(), order.order.id));
        Ok(())
    }

    async fn send_password_reset(&self, email: &str, reset_url: &str) -> Result<(), NotifyError> {
        self.resets
            .lock()
            .unwrap()
            .push((email.to_string(), reset_url.to_string()));
        Ok(())
    }
}

pub struct TestApp {
    pub state: AppState,
    pub gateway: Arc<FakeGateway>,
    pub notifier: Arc<RecordingNotifier>,
}

fn test_config(database_url: String) -> AppConfig {
    AppConfig {
        database_url,
        host: "127.0.0.1".into(),
        port: 0,
        jwt_secret: "test_jwt_secret".into(),
        redis_url: None,
        cache_ttl_secs: 60,
        payment: PaymentConfig {
            key_id: KEY_ID.into(),
            key_secret: KEY_SECRET.into(),
            base_url: "http://127.0.0.1:9".into(),
            currency: "INR".into(),
            timeout_secs: 1,
        },
        mail: MailConfig {
            relay_url: None,
            from: "no-reply@test.local".into(),
            timeout_secs: 1,
        },
        frontend_url: "http://localhost:5173".into(),
    }
}

/// Fresh SQLite file per test with the schema generated from the entities.
pub async fn setup() -> anyhow::Result<TestApp> {
    let path = std::env::temp_dir().join(format!("storefront-{}.db", Uuid::new_v4()));
    let database_url = format!("sqlite://{}?mode=rwc", path.display());

    let mut opts = ConnectOptions::new(database_url.clone());
    opts.max_connections(4).sqlx_logging(false);
    let orm = Database::connect(opts).await?;
    create_schema(&orm).await?;

    let gateway = Arc::new(FakeGateway::default());
    let notifier = Arc::new(RecordingNotifier::default());
    let state = AppState {
        orm,
        config: Arc::new(test_config(database_url)),
        gateway: gateway.clone(),
        notifier: notifier.clone(),
        cache: Arc::new(InMemoryCache::new()),
    };

    Ok(TestApp {
        state,
        gateway,
        notifier,
    })
}

async fn create_schema(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let backend = orm.get_database_backend();
    let schema = Schema::new(backend);

    orm.execute(backend.build(&schema.create_table_from_entity(Users))).await?;
    orm.execute(backend.build(&schema.create_table_from_entity(Products))).await?;
    orm.execute(backend.build(&schema.create_table_from_entity(CartItems))).await?;
    orm.execute(backend.build(&schema.create_table_from_entity(Orders))).await?;
    orm.execute(backend.build(&schema.create_table_from_entity(OrderItems))).await?;
    orm.execute(backend.build(&schema.create_table_from_entity(Reviews))).await?;
    orm.execute(backend.build(&schema.create_table_from_entity(AuditLogs))).await?;

    for sql in [
        "CREATE UNIQUE INDEX ux_cart_items_user_product ON cart_items (user_id, product_id)",
        "CREATE UNIQUE INDEX ux_reviews_user_product ON reviews (user_id, product_id)",
    ] {
        orm.execute(Statement::from_string(backend, sql)).await?;
    }
    Ok(())
}

pub async fn create_user(state: &AppState, name: &str, role: UserRole) -> anyhow::Result<AuthUser> {
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(format!("{name}@example.com")),
        password_hash: Set(None),
        google_id: Set(None),
        role: Set(role.clone()),
        address: Set(None),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(&state.orm)
    .await?;

    Ok(AuthUser {
        user_id: user.id,
        role,
    })
}

pub async fn create_product(
    state: &AppState,
    name: &str,
    price: Decimal,
    stock: i32,
) -> anyhow::Result<Uuid> {
    let now = Utc::now();
    let product = ProductActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        description: Set(format!("{name} for tests")),
        price: Set(price),
        category: Set("General".into()),
        sub_category: Set(None),
        stock: Set(stock),
        images: Set(ProductImages(vec![ProductImage {
            url: format!("https://img.test/{name}.png"),
            public_id: format!("test/{name}"),
        }])),
        num_of_reviews: Set(0),
        rating_sum: Set(0),
        average_rating: Set(0.0),
        created_at: Set(now.into()),
        updated_at: Set(now.into()),
    }
    .insert(&state.orm)
    .await?;
    Ok(product.id)
}
