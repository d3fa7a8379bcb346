//! Shared application state.

use std::sync::Arc;

use sqlx::SqlitePool;

use crate::config::ServerConfig;
use crate::db::{OrderRepository, PersonaRepository, ProductRepository};
use crate::llm::{AnthropicClient, ModelProvider};
use crate::services::{ChatService, FulfillmentEngine, PersonaService};

/// Handle to everything the request handlers need.
///
/// One `Arc` inside, so the per-request clone is cheap. Repositories and
/// services share the same pool; handlers pick whichever layer fits.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ServerConfig,
    pool: SqlitePool,
    products: ProductRepository,
    orders: OrderRepository,
    settings: PersonaRepository,
    fulfillment: FulfillmentEngine,
    chat: ChatService,
}

impl AppState {
    /// Build state backed by the real Anthropic client.
    ///
    /// # Panics
    ///
    /// Panics if the configured API key contains characters that cannot form
    /// an HTTP header (see [`AnthropicClient::new`]).
    #[must_use]
    pub fn new(config: ServerConfig, pool: SqlitePool) -> Self {
        let provider = Arc::new(AnthropicClient::new(&config.model));
        Self::with_provider(config, pool, provider)
    }

    /// Build state over an arbitrary model provider.
    ///
    /// Tests use this to swap in a scripted provider.
    #[must_use]
    pub fn with_provider(
        config: ServerConfig,
        pool: SqlitePool,
        provider: Arc<dyn ModelProvider>,
    ) -> Self {
        let products = ProductRepository::new(pool.clone());
        let orders = OrderRepository::new(pool.clone());
        let settings = PersonaRepository::new(pool.clone());
        let fulfillment = FulfillmentEngine::new(pool.clone());
        let chat = ChatService::new(
            provider,
            PersonaService::new(settings.clone()),
            products.clone(),
            orders.clone(),
            fulfillment.clone(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                products,
                orders,
                settings,
                fulfillment,
                chat,
            }),
        }
    }

    /// Server configuration.
    #[must_use]
    pub fn config(&self) -> &ServerConfig {
        &self.inner.config
    }

    /// Database connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.inner.pool
    }

    /// Product storage.
    #[must_use]
    pub fn products(&self) -> &ProductRepository {
        &self.inner.products
    }

    /// Order storage.
    #[must_use]
    pub fn orders(&self) -> &OrderRepository {
        &self.inner.orders
    }

    /// Persona settings storage.
    #[must_use]
    pub fn settings(&self) -> &PersonaRepository {
        &self.inner.settings
    }

    /// Validated order placement.
    #[must_use]
    pub fn fulfillment(&self) -> &FulfillmentEngine {
        &self.inner.fulfillment
    }

    /// The conversational loop.
    #[must_use]
    pub fn chat(&self) -> &ChatService {
        &self.inner.chat
    }
}
