use std::sync::Arc;

use crate::{cache::CatalogCache, config::AppConfig, db::OrmConn, notify::Notifier, payment::PaymentGateway};

/// Everything a request handler may touch. Built once by the composition root.
#[derive(Clone)]
pub struct AppState {
    pub orm: OrmConn,
    pub config: Arc<AppConfig>,
    pub gateway: Arc<dyn PaymentGateway>,
    pub notifier: Arc<dyn Notifier>,
    pub cache: Arc<dyn CatalogCache>,
}
