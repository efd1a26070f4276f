//! HTTP interface - router, shared state and handlers.
//!
//! Every endpoint resolves the session, delegates to `crate::core` and wraps
//! the outcome in an [`ActionResult`]. List endpoints are served through the
//! [`TagCache`]; mutations invalidate the tags their reads depend on.

/// Request extractors for sessions and payloads
pub mod extract;
/// Endpoint handlers grouped by resource
pub mod handlers;
/// Response envelope and error mapping
pub mod response;

pub use response::{ActionResult, ApiResult};

use crate::{
    cache::{TagCache, tags},
    config::AppConfig,
    errors::Result,
    mailer::Mailer,
};
use axum::{
    Router,
    routing::{delete, get, post, put},
};
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::Value;
use std::{future::Future, sync::Arc};
use tower_http::trace::TraceLayer;

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    /// Pooled database connection
    pub db: DatabaseConnection,
    /// Read cache for list and detail payloads, invalidated by tag
    pub cache: TagCache,
    /// Outgoing mail, used for invitations
    pub mailer: Arc<dyn Mailer>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Builds the state, sizing the cache from `config.cache`.
    pub fn new(db: DatabaseConnection, config: AppConfig, mailer: Arc<dyn Mailer>) -> Self {
        Self {
            db,
            cache: TagCache::new(config.cache.ttl(), config.cache.max_entries),
            mailer,
            config: Arc::new(config),
        }
    }

    /// Returns the cached payload under `key`, or awaits `load` and caches its
    /// JSON under `tags`. Access checks must happen before calling this.
    pub(crate) async fn cached<T, F>(&self, key: String, tags: &[String], load: F) -> Result<Value>
    where
        T: Serialize,
        F: Future<Output = Result<T>>,
    {
        if let Some(hit) = self.cache.get(&key).await {
            return Ok(hit);
        }
        // Stamped before loading so a mutation during the load is not cached
        let stamp = self.cache.stamp(tags).await;
        let value = serde_json::to_value(load.await?)?;
        self.cache.insert_stamped(key, stamp, value.clone()).await;
        Ok(value)
    }

    /// Invalidates the `collection` list of an organization, its overview and,
    /// when given, the tag of the touched row.
    pub(crate) async fn touched(&self, org_id: i64, collection: &str, row: Option<(&str, i64)>) {
        let mut invalidated = vec![
            tags::collection(org_id, collection),
            tags::collection(org_id, "overview"),
        ];
        if let Some((kind, id)) = row {
            invalidated.push(tags::entity(kind, id));
        }
        self.cache.invalidate_tags(&invalidated).await;
    }
}

/// Tags of a cached list inside an organization.
pub(crate) fn list_tags(org_id: i64, collection: &str) -> Vec<String> {
    vec![tags::collection(org_id, collection), tags::organization(org_id)]
}

/// Builds the full application router.
pub fn router(state: AppState) -> Router {
    use handlers::{
        addresses, clients, contacts, fiscal_years, invitations, members, organizations,
        products, session, suppliers, system,
    };

    let org = Router::new()
        .route(
            "/",
            get(organizations::get)
                .put(organizations::update)
                .delete(organizations::delete),
        )
        .route("/overview", get(organizations::overview))
        .route("/members", get(members::list))
        .route("/members/{member_id}", delete(members::remove))
        .route("/members/{member_id}/role", put(members::update_role))
        .route("/leave", post(members::leave))
        .route("/invitations", get(invitations::list).post(invitations::create))
        .route(
            "/invitations/{invitation_id}",
            delete(invitations::cancel),
        )
        .route("/clients", get(clients::list).post(clients::create))
        .route("/clients/next-reference", get(clients::next_reference))
        .route(
            "/clients/{client_id}",
            get(clients::get).put(clients::update).delete(clients::delete),
        )
        .route("/clients/{client_id}/status", put(clients::update_status))
        .route(
            "/clients/{client_id}/contacts",
            get(contacts::list_for_client).post(contacts::create_for_client),
        )
        .route(
            "/clients/{client_id}/addresses",
            get(addresses::list_for_client).post(addresses::create_for_client),
        )
        .route("/suppliers", get(suppliers::list).post(suppliers::create))
        .route("/suppliers/next-reference", get(suppliers::next_reference))
        .route(
            "/suppliers/{supplier_id}",
            get(suppliers::get)
                .put(suppliers::update)
                .delete(suppliers::delete),
        )
        .route("/suppliers/{supplier_id}/status", put(suppliers::update_status))
        .route(
            "/suppliers/{supplier_id}/contacts",
            get(contacts::list_for_supplier).post(contacts::create_for_supplier),
        )
        .route(
            "/suppliers/{supplier_id}/addresses",
            get(addresses::list_for_supplier).post(addresses::create_for_supplier),
        )
        .route(
            "/contacts/{contact_id}",
            get(contacts::get).put(contacts::update).delete(contacts::delete),
        )
        .route("/contacts/{contact_id}/primary", post(contacts::set_primary))
        .route(
            "/addresses/{address_id}",
            get(addresses::get)
                .put(addresses::update)
                .delete(addresses::delete),
        )
        .route("/addresses/{address_id}/default", post(addresses::set_default))
        .route(
            "/product-categories",
            get(products::list_categories).post(products::create_category),
        )
        .route(
            "/product-categories/{category_id}",
            put(products::update_category).delete(products::delete_category),
        )
        .route("/products", get(products::list).post(products::create))
        .route(
            "/products/{product_id}",
            get(products::get).put(products::update).delete(products::delete),
        )
        .route("/products/{product_id}/archive", post(products::archive))
        .route("/products/{product_id}/restore", post(products::restore))
        .route(
            "/fiscal-years",
            get(fiscal_years::list).post(fiscal_years::create),
        )
        .route("/fiscal-years/current", get(fiscal_years::current))
        .route(
            "/fiscal-years/{fiscal_year_id}",
            get(fiscal_years::get)
                .put(fiscal_years::update)
                .delete(fiscal_years::delete),
        )
        .route(
            "/fiscal-years/{fiscal_year_id}/status",
            put(fiscal_years::update_status),
        );

    let api = Router::new()
        .route("/health", get(system::health))
        .route("/labels", get(system::labels))
        .route(
            "/auth/session",
            post(session::open).delete(session::close),
        )
        .route("/me", get(session::me))
        .route("/invitations", get(invitations::received))
        .route("/invitations/{token}/accept", post(invitations::accept))
        .route("/invitations/{token}/reject", post(invitations::reject))
        .route(
            "/organizations",
            get(organizations::list).post(organizations::create),
        )
        .nest("/organizations/{org_id}", org);

    Router::new()
        .nest("/api", api)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
