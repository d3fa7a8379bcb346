//! The closed set of commerce tools exposed to the model.
//!
//! Four tools: `searchProducts`, `getProductDetails`, `getCustomerOrders`,
//! `createOrder`. Inputs are declared as JSON Schema and parsed into typed
//! structs before execution; outputs are plain English text that goes to the
//! shopper verbatim. Failures of any kind (malformed input, unknown product,
//! storage trouble) come back as readable text too, never as a transport
//! error, so one bad tool call cannot sink a chat turn.

use serde::Deserialize;
use serde_json::json;
use tracing::instrument;

use shoptalk_core::Email;

use crate::db::{CUSTOMER_ORDERS_LIMIT, OrderRepository, ProductRepository, RepositoryError};
use crate::llm::Tool;
use crate::models::{Order, Product};
use crate::services::fulfillment::{
    FulfillmentEngine, OrderError, OrderLineRequest, ProductRef,
};

/// Returned by `searchProducts` when nothing matches the query.
const NO_SEARCH_RESULTS: &str = "No products matched that search.";

/// Shown when a storage failure keeps a tool from answering.
const STORE_UNAVAILABLE: &str =
    "The store is temporarily unavailable. Please try again in a moment.";

/// The tool declarations sent with every model request.
#[must_use]
pub fn storefront_tools() -> Vec<Tool> {
    vec![
        Tool {
            name: "searchProducts".to_string(),
            description: "Search the product catalog by name or category. \
                          Returns matching products with price and stock."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "query": {
                        "type": "string",
                        "description": "Name or category to search for"
                    }
                },
                "required": ["query"]
            }),
        },
        Tool {
            name: "getProductDetails".to_string(),
            description: "Get full details for one product by its exact name, \
                          including description, price, category, and stock."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "productName": {
                        "type": "string",
                        "description": "Exact product name (case-insensitive)"
                    }
                },
                "required": ["productName"]
            }),
        },
        Tool {
            name: "getCustomerOrders".to_string(),
            description: "Get a customer's recent orders by email, newest \
                          first, with items and totals."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "customerEmail": {
                        "type": "string",
                        "description": "The customer's email address"
                    }
                },
                "required": ["customerEmail"]
            }),
        },
        Tool {
            name: "createOrder".to_string(),
            description: "Create an order for a customer. Checks stock for \
                          every item and returns the order number and total."
                .to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "customerEmail": {
                        "type": "string",
                        "description": "The customer's email address"
                    },
                    "items": {
                        "type": "array",
                        "description": "Products to order",
                        "items": {
                            "type": "object",
                            "properties": {
                                "productName": {
                                    "type": "string",
                                    "description": "Exact product name"
                                },
                                "quantity": {
                                    "type": "integer",
                                    "minimum": 1
                                }
                            },
                            "required": ["productName", "quantity"]
                        }
                    }
                },
                "required": ["customerEmail", "items"]
            }),
        },
    ]
}

#[derive(Debug, Deserialize)]
struct SearchProductsInput {
    query: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetProductDetailsInput {
    product_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetCustomerOrdersInput {
    customer_email: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderInput {
    customer_email: String,
    items: Vec<CreateOrderItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateOrderItem {
    product_name: String,
    quantity: u32,
}

#[derive(Debug, thiserror::Error)]
enum ToolError {
    #[error("unknown tool: {0}")]
    Unknown(String),
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Order(#[from] OrderError),
}

/// Executes tool calls against the catalog, the order store, and the
/// fulfillment engine.
///
/// Owns cheap clones of the repository handles so an execution can be
/// moved onto a task of its own.
#[derive(Clone)]
pub struct ToolExecutor {
    products: ProductRepository,
    orders: OrderRepository,
    fulfillment: FulfillmentEngine,
}

impl ToolExecutor {
    #[must_use]
    pub const fn new(
        products: ProductRepository,
        orders: OrderRepository,
        fulfillment: FulfillmentEngine,
    ) -> Self {
        Self {
            products,
            orders,
            fulfillment,
        }
    }

    /// Run one tool call and return its text output.
    ///
    /// Never fails: anything that goes wrong is rendered as readable text
    /// for the shopper, and storage failures are additionally logged.
    #[instrument(skip(self, input), fields(tool_name = %name))]
    pub async fn execute(&self, name: &str, input: &serde_json::Value) -> String {
        match self.try_execute(name, input).await {
            Ok(output) => output,
            Err(error) => {
                tracing::warn!(tool = name, %error, "tool call failed");
                failure_text(name, &error)
            }
        }
    }

    /// Run one tool call on a task of its own and return its text output.
    ///
    /// The spawned task keeps running even when this future is dropped, so
    /// a shopper who disconnects mid-turn cannot abort an order the model
    /// already dispatched.
    pub async fn execute_detached(&self, name: String, input: serde_json::Value) -> String {
        let executor = self.clone();
        let tool = name.clone();
        let task = tokio::spawn(async move { executor.execute(&tool, &input).await });
        match task.await {
            Ok(output) => output,
            Err(error) => {
                tracing::error!(tool = %name, %error, "tool task failed");
                STORE_UNAVAILABLE.to_string()
            }
        }
    }

    async fn try_execute(
        &self,
        name: &str,
        input: &serde_json::Value,
    ) -> Result<String, ToolError> {
        match name {
            "searchProducts" => self.search_products(parse_input(input)?).await,
            "getProductDetails" => self.get_product_details(parse_input(input)?).await,
            "getCustomerOrders" => self.get_customer_orders(parse_input(input)?).await,
            "createOrder" => self.create_order(parse_input(input)?).await,
            _ => Err(ToolError::Unknown(name.to_string())),
        }
    }

    async fn search_products(&self, input: SearchProductsInput) -> Result<String, ToolError> {
        let products = self.products.search(&input.query).await?;
        if products.is_empty() {
            return Ok(NO_SEARCH_RESULTS.to_string());
        }

        let listing = products
            .iter()
            .map(|p| format!("- {}: ${} (stock: {})", p.name, p.price, p.stock))
            .collect::<Vec<_>>()
            .join("\n");
        Ok(format!("Products found:\n{listing}"))
    }

    async fn get_product_details(
        &self,
        input: GetProductDetailsInput,
    ) -> Result<String, ToolError> {
        let Some(product) = self.products.find_by_name(&input.product_name).await? else {
            return Ok(format!(
                "No product named \"{}\" was found.",
                input.product_name
            ));
        };
        Ok(render_product_details(&product))
    }

    async fn get_customer_orders(
        &self,
        input: GetCustomerOrdersInput,
    ) -> Result<String, ToolError> {
        let email = Email::parse(&input.customer_email)
            .map_err(|e| ToolError::InvalidInput(format!("customerEmail: {e}")))?;

        let orders = self
            .orders
            .find_by_email(email.as_str(), Some(CUSTOMER_ORDERS_LIMIT))
            .await?;
        if orders.is_empty() {
            return Ok(format!("No orders were found for {email}."));
        }

        let rendered = orders
            .iter()
            .map(render_order)
            .collect::<Vec<_>>()
            .join("\n\n");
        Ok(rendered)
    }

    async fn create_order(&self, input: CreateOrderInput) -> Result<String, ToolError> {
        let lines: Vec<OrderLineRequest> = input
            .items
            .iter()
            .map(|item| OrderLineRequest {
                product: ProductRef::Name(item.product_name.clone()),
                quantity: item.quantity,
            })
            .collect();

        let order = self
            .fulfillment
            .place_order(&input.customer_email, &lines)
            .await?;

        Ok(format!(
            "Order placed successfully.\nOrder number: {}\nTotal: ${}\nA confirmation will be sent to {}.",
            order.order_number, order.total_amount, order.customer_email
        ))
    }
}

/// Render a tool failure as text the shopper can act on. Storage details
/// stay in the logs.
fn failure_text(name: &str, error: &ToolError) -> String {
    match error {
        ToolError::Unknown(tool) => format!("The tool \"{tool}\" is not available."),
        ToolError::InvalidInput(detail) => format!("Invalid input for {name}: {detail}"),
        ToolError::Order(OrderError::Repository(_)) | ToolError::Repository(_) => {
            STORE_UNAVAILABLE.to_string()
        }
        ToolError::Order(e) => format!("Could not create the order: {e}"),
    }
}

fn parse_input<T: serde::de::DeserializeOwned>(input: &serde_json::Value) -> Result<T, ToolError> {
    serde_json::from_value(input.clone()).map_err(|e| ToolError::InvalidInput(e.to_string()))
}

fn render_product_details(product: &Product) -> String {
    format!(
        "{}\nPrice: ${}\nCategory: {}\nStock: {} units\n{}",
        product.name, product.price, product.category, product.stock, product.description
    )
}

fn render_order(order: &Order) -> String {
    let items = order
        .items
        .iter()
        .map(|line| {
            format!(
                "  - {} x{} (${} each)",
                line.display_name(),
                line.quantity,
                line.unit_price
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Order {} ({})\nDate: {}\nTotal: ${}\nItems:\n{}",
        order.order_number,
        order.status,
        order.created_at.format("%Y-%m-%d"),
        order.total_amount,
        items
    )
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::db::{create_pool_with, run_migrations};
    use crate::models::NewProduct;

    use super::*;

    #[test]
    fn test_declares_all_four_tools() {
        let tools = storefront_tools();
        let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(
            names,
            vec![
                "searchProducts",
                "getProductDetails",
                "getCustomerOrders",
                "createOrder"
            ]
        );
    }

    #[test]
    fn test_schemas_are_objects_with_required_fields() {
        for tool in storefront_tools() {
            assert_eq!(
                tool.input_schema.get("type").and_then(|t| t.as_str()),
                Some("object"),
                "{} schema must be an object",
                tool.name
            );
            assert!(
                tool.input_schema.get("required").is_some(),
                "{} schema must declare required fields",
                tool.name
            );
        }
    }

    struct Fixture {
        products: ProductRepository,
        orders: OrderRepository,
        fulfillment: FulfillmentEngine,
    }

    impl Fixture {
        fn executor(&self) -> ToolExecutor {
            ToolExecutor::new(
                self.products.clone(),
                self.orders.clone(),
                self.fulfillment.clone(),
            )
        }
    }

    async fn setup() -> Fixture {
        let pool = create_pool_with("sqlite::memory:", 1, 30).await.expect("connect");
        run_migrations(&pool).await.expect("migrate");
        let fixture = Fixture {
            products: ProductRepository::new(pool.clone()),
            orders: OrderRepository::new(pool.clone()),
            fulfillment: FulfillmentEngine::new(pool),
        };

        for (name, price, stock, category) in [
            ("MacBook Pro M2", "1299.00", 5, "Laptops"),
            ("Logitech MX Master 3", "99.00", 12, "Accessories"),
            ("Bose QC45", "329.00", 0, "Audio"),
        ] {
            fixture
                .products
                .create(&NewProduct {
                    name: name.to_string(),
                    description: format!("{name} description"),
                    price: price.parse().unwrap(),
                    stock,
                    category: category.to_string(),
                    image_url: None,
                })
                .await
                .expect("seed");
        }

        fixture
    }

    #[tokio::test]
    async fn test_search_products_renders_listing() {
        let fixture = setup().await;
        let output = fixture
            .executor()
            .execute("searchProducts", &json!({ "query": "laptop" }))
            .await;

        assert!(output.starts_with("Products found:"));
        assert!(output.contains("- MacBook Pro M2: $1299.00 (stock: 5)"));
    }

    #[tokio::test]
    async fn test_search_products_empty_result() {
        let fixture = setup().await;
        let output = fixture
            .executor()
            .execute("searchProducts", &json!({ "query": "submarine" }))
            .await;
        assert_eq!(output, NO_SEARCH_RESULTS);
    }

    #[tokio::test]
    async fn test_product_details_by_exact_name_any_case() {
        let fixture = setup().await;
        let output = fixture
            .executor()
            .execute("getProductDetails", &json!({ "productName": "bose qc45" }))
            .await;

        assert!(output.starts_with("Bose QC45\n"));
        assert!(output.contains("Price: $329.00"));
        assert!(output.contains("Stock: 0 units"));
    }

    #[tokio::test]
    async fn test_product_details_missing_product() {
        let fixture = setup().await;
        let output = fixture
            .executor()
            .execute("getProductDetails", &json!({ "productName": "Flux Capacitor" }))
            .await;
        assert_eq!(output, "No product named \"Flux Capacitor\" was found.");
    }

    #[tokio::test]
    async fn test_customer_orders_round_trip() {
        let fixture = setup().await;
        let executor = fixture.executor();

        let placed = executor
            .execute(
                "createOrder",
                &json!({
                    "customerEmail": "shopper@example.com",
                    "items": [{ "productName": "MacBook Pro M2", "quantity": 2 }]
                }),
            )
            .await;
        assert!(placed.starts_with("Order placed successfully."));
        assert!(placed.contains("Total: $2598.00"));

        let history = executor
            .execute(
                "getCustomerOrders",
                &json!({ "customerEmail": "shopper@example.com" }),
            )
            .await;
        assert!(history.contains("Order ORD-"));
        assert!(history.contains("(PENDING)"));
        assert!(history.contains("  - MacBook Pro M2 x2 ($1299.00 each)"));
    }

    #[tokio::test]
    async fn test_customer_orders_none_found() {
        let fixture = setup().await;
        let output = fixture
            .executor()
            .execute(
                "getCustomerOrders",
                &json!({ "customerEmail": "nobody@example.com" }),
            )
            .await;
        assert_eq!(output, "No orders were found for nobody@example.com.");
    }

    #[tokio::test]
    async fn test_create_order_failures_become_text() {
        let fixture = setup().await;
        let executor = fixture.executor();

        let out_of_stock = executor
            .execute(
                "createOrder",
                &json!({
                    "customerEmail": "shopper@example.com",
                    "items": [{ "productName": "Bose QC45", "quantity": 1 }]
                }),
            )
            .await;
        assert_eq!(
            out_of_stock,
            "Could not create the order: Insufficient stock for Bose QC45"
        );

        let missing = executor
            .execute(
                "createOrder",
                &json!({
                    "customerEmail": "shopper@example.com",
                    "items": [{ "productName": "Flux Capacitor", "quantity": 1 }]
                }),
            )
            .await;
        assert_eq!(
            missing,
            "Could not create the order: Product not found: Flux Capacitor"
        );
    }

    #[tokio::test]
    async fn test_malformed_input_becomes_text() {
        let fixture = setup().await;
        let executor = fixture.executor();

        let output = executor
            .execute("searchProducts", &json!({ "q": "laptop" }))
            .await;
        assert!(output.starts_with("Invalid input for searchProducts:"));

        let output = executor
            .execute(
                "createOrder",
                &json!({ "customerEmail": "shopper@example.com", "items": "not-an-array" }),
            )
            .await;
        assert!(output.starts_with("Invalid input for createOrder:"));
    }

    #[tokio::test]
    async fn test_unknown_tool_becomes_text() {
        let fixture = setup().await;
        let output = fixture
            .executor()
            .execute("launchMissiles", &json!({}))
            .await;
        assert_eq!(output, "The tool \"launchMissiles\" is not available.");
    }
}
