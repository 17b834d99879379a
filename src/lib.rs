pub mod app;
pub mod config;
pub mod domain;
pub mod http;
pub mod infra;

use crate::app::auth::{IdentityService, SessionKeys};
use crate::app::photos::PhotoService;
use crate::config::AppConfig;
use crate::infra::{db::Db, storage::ObjectStorage};
use time::Duration;

/// Shared, immutable per-process state handed to every request.
#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub storage: ObjectStorage,
    pub upload_url_ttl_seconds: u64,
    pub upload_max_bytes: i64,
    pub photo_url_ttl_seconds: u64,
    pub admin_token: Option<String>,
    pub session_keys: SessionKeys,
}

impl AppState {
    pub fn new(config: &AppConfig, db: Db, storage: ObjectStorage) -> Self {
        Self {
            db,
            storage,
            upload_url_ttl_seconds: config.upload_url_ttl_seconds,
            upload_max_bytes: config.upload_max_bytes,
            photo_url_ttl_seconds: config.photo_url_ttl_seconds,
            admin_token: config.admin_token.clone(),
            session_keys: SessionKeys {
                access_key: config.paseto_access_key,
                refresh_key: config.paseto_refresh_key,
                access_ttl: Duration::minutes(i64::from(config.access_ttl_minutes)),
                refresh_ttl: Duration::days(i64::from(config.refresh_ttl_days)),
            },
        }
    }

    pub fn identity(&self) -> IdentityService {
        IdentityService::new(self.db.clone(), self.session_keys.clone())
    }

    pub fn photo_service(&self) -> PhotoService {
        PhotoService::new(self.storage.clone(), self.photo_url_ttl_seconds)
    }
}
