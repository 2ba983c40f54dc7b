use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

use dealerdesk_core::domain::inventory::InventoryFilter;
use dealerdesk_db::repositories::InventoryRepository;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("unknown tool `{0}`")]
    UnknownTool(String),
    #[error("invalid arguments for `{tool}`: {message}")]
    InvalidArguments { tool: String, message: String },
    #[error("tool `{tool}` failed: {message}")]
    Execution { tool: String, message: String },
}

/// A function the model may call mid-conversation.
///
/// `definition` returns the provider wire shape
/// (`{"type":"function","function":{...}}`); `execute` receives the raw
/// argument string exactly as the model produced it.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn definition(&self) -> Value;
    async fn execute(&self, arguments: &str) -> Result<Value, ToolError>;
}

/// Registered tools in insertion order, so the definitions the model sees
/// are stable across requests.
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
}

impl ToolRegistry {
    pub fn register<T>(&mut self, tool: T)
    where
        T: Tool + 'static,
    {
        self.tools.push(Box::new(tool));
    }

    pub fn definitions(&self) -> Vec<Value> {
        self.tools.iter().map(|tool| tool.definition()).collect()
    }

    pub async fn dispatch(&self, name: &str, arguments: &str) -> Result<Value, ToolError> {
        let tool = self
            .tools
            .iter()
            .find(|tool| tool.name() == name)
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        tool.execute(arguments).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Inventory search exposed to the model. Numeric fields use `-1` for
/// "no constraint" and string fields use the empty string, mirroring the
/// instructions embedded in the schema below.
pub struct FetchCarsTool {
    inventory: Arc<dyn InventoryRepository>,
}

impl FetchCarsTool {
    pub const NAME: &'static str = "fetch_cars";

    pub fn new(inventory: Arc<dyn InventoryRepository>) -> Self {
        Self { inventory }
    }
}

#[async_trait]
impl Tool for FetchCarsTool {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn definition(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": Self::NAME,
                "description": "Search the dealership inventory for vehicles matching the customer's criteria. Use -1 for numeric fields the customer did not mention and an empty string for text fields they did not mention.",
                "parameters": {
                    "type": "object",
                    "properties": {
                        "make": {
                            "type": "string",
                            "description": "Vehicle make, e.g. Nissan. Empty string if not specified."
                        },
                        "model": {
                            "type": "string",
                            "description": "Vehicle model, e.g. Altima. Empty string if not specified."
                        },
                        "year": {
                            "type": "integer",
                            "description": "Minimum model year. -1 if not specified."
                        },
                        "max_year": {
                            "type": "integer",
                            "description": "Maximum model year. -1 if not specified."
                        },
                        "price": {
                            "type": "number",
                            "description": "Minimum price in dollars. -1 if not specified."
                        },
                        "max_price": {
                            "type": "number",
                            "description": "Maximum price in dollars. -1 if not specified."
                        },
                        "mileage": {
                            "type": "integer",
                            "description": "Maximum mileage. -1 if not specified."
                        },
                        "color": {
                            "type": "string",
                            "description": "Exterior color. Empty string if not specified."
                        },
                        "stock_number": {
                            "type": "string",
                            "description": "Exact stock number. Empty string if not specified."
                        },
                        "vin": {
                            "type": "string",
                            "description": "Exact VIN. Empty string if not specified."
                        }
                    },
                    "required": ["make", "model"]
                }
            }
        })
    }

    async fn execute(&self, arguments: &str) -> Result<Value, ToolError> {
        let filter: InventoryFilter =
            serde_json::from_str(arguments).map_err(|error| ToolError::InvalidArguments {
                tool: Self::NAME.to_string(),
                message: error.to_string(),
            })?;

        let vehicles = self.inventory.search(&filter).await.map_err(|error| {
            ToolError::Execution { tool: Self::NAME.to_string(), message: error.to_string() }
        })?;

        let cars = serde_json::to_value(&vehicles).map_err(|error| ToolError::Execution {
            tool: Self::NAME.to_string(),
            message: error.to_string(),
        })?;
        Ok(json!({ "count": vehicles.len(), "cars": cars }))
    }
}
