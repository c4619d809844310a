//! Tool definitions and the registry.

use std::collections::HashMap;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};

use crate::tools::catalog::{ProductCatalog, SearchArgs};
use crate::tools::imaging::{GenerateArgs, ImageGenerator};
use crate::tools::pricing::{CompareArgs, PriceComparer};
use crate::tools::schema::ArgumentSchema;
use crate::tools::{ToolCategory, ToolError, ToolOutput};

/// The closed set of tools, each holding its handler.
#[derive(Debug, Clone)]
pub enum Tool {
    SearchProducts(Arc<ProductCatalog>),
    GenerateImage(Arc<ImageGenerator>),
    ComparePrices(Arc<PriceComparer>),
}

impl Tool {
    pub fn category(&self) -> ToolCategory {
        match self {
            Tool::SearchProducts(_) => ToolCategory::Search,
            Tool::GenerateImage(_) => ToolCategory::Generation,
            Tool::ComparePrices(_) => ToolCategory::Comparison,
        }
    }

    /// Deserialize the variant's typed arguments and run it.
    pub async fn invoke(&self, name: &str, args: Map<String, Value>) -> Result<ToolOutput, ToolError> {
        let args = Value::Object(args);
        match self {
            Tool::SearchProducts(catalog) => {
                let args: SearchArgs = typed_args(name, args)?;
                Ok(ToolOutput::Products(catalog.search(&args)))
            }
            Tool::GenerateImage(generator) => {
                let args: GenerateArgs = typed_args(name, args)?;
                Ok(ToolOutput::Image(generator.generate(&args).await?))
            }
            Tool::ComparePrices(comparer) => {
                let args: CompareArgs = typed_args(name, args)?;
                Ok(ToolOutput::Comparison(comparer.compare(&args)))
            }
        }
    }
}

fn typed_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args).map_err(|e| ToolError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

/// A registered tool. Immutable after construction.
#[derive(Debug)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub schema: ArgumentSchema,
    pub tool: Tool,
}

impl ToolDefinition {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
        tool: Tool,
    ) -> Result<Self, ToolError> {
        let name = name.into();
        let schema = ArgumentSchema::compile(parameters).map_err(|reason| ToolError::Schema {
            tool: name.clone(),
            reason,
        })?;
        Ok(Self {
            name,
            description: description.into(),
            schema,
            tool,
        })
    }

    pub fn category(&self) -> ToolCategory {
        self.tool.category()
    }

    /// OpenAI function-calling declaration.
    pub fn function_schema(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.schema.raw(),
            }
        })
    }
}

/// Ordered registry with unique names.
#[derive(Debug, Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<ToolDefinition>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, definition: ToolDefinition) -> Result<(), ToolError> {
        if self.index.contains_key(&definition.name) {
            return Err(ToolError::DuplicateTool(definition.name));
        }
        tracing::debug!(tool = %definition.name, category = ?definition.category(), "Tool registered");
        self.index.insert(definition.name.clone(), self.tools.len());
        self.tools.push(Arc::new(definition));
        Ok(())
    }

    /// Exact-name lookup.
    pub fn get(&self, name: &str) -> Option<Arc<ToolDefinition>> {
        self.index.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub fn definitions(&self) -> impl Iterator<Item = &ToolDefinition> {
        self.tools.iter().map(|t| t.as_ref())
    }

    /// Function declarations in registration order.
    pub fn function_schemas(&self) -> Vec<Value> {
        self.definitions().map(ToolDefinition::function_schema).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

/// The shopping tool set: product search, image generation, price comparison.
pub fn commerce_registry(
    catalog: Arc<ProductCatalog>,
    images: Arc<ImageGenerator>,
    prices: Arc<PriceComparer>,
) -> Result<ToolRegistry, ToolError> {
    let mut registry = ToolRegistry::new();

    registry.register(ToolDefinition::new(
        "search_products",
        "Search for products matching the given criteria",
        json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query for products"},
                "category": {"type": "string", "description": "Product category filter (optional)"},
                "max_price": {"type": "number", "description": "Maximum price filter (optional)"},
                "min_price": {"type": "number", "description": "Minimum price filter (optional)"}
            },
            "required": ["query"]
        }),
        Tool::SearchProducts(catalog),
    )?)?;

    registry.register(ToolDefinition::new(
        "generate_image",
        "Generate a product image based on a text description",
        json!({
            "type": "object",
            "properties": {
                "prompt": {"type": "string", "description": "Detailed description of the image to generate"},
                "style": {
                    "type": "string",
                    "enum": ["product", "lifestyle", "minimalist", "artistic"],
                    "description": "Style of the generated image"
                },
                "aspect_ratio": {
                    "type": "string",
                    "enum": ["1:1", "16:9", "9:16", "4:3", "3:4"],
                    "description": "Aspect ratio for the image"
                }
            },
            "required": ["prompt"]
        }),
        Tool::GenerateImage(images),
    )?)?;

    registry.register(ToolDefinition::new(
        "compare_prices",
        "Compare prices for a product across multiple sources",
        json!({
            "type": "object",
            "properties": {
                "product_name": {"type": "string", "description": "Name of the product to compare"},
                "product_id": {"type": "string", "description": "Product ID if known (optional)"}
            },
            "required": ["product_name"]
        }),
        Tool::ComparePrices(prices),
    )?)?;

    Ok(registry)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::PricingConfig;

    fn registry() -> ToolRegistry {
        commerce_registry(
            Arc::new(ProductCatalog::new()),
            Arc::new(ImageGenerator::unconfigured("flux")),
            Arc::new(PriceComparer::new(&PricingConfig::default())),
        )
        .unwrap()
    }

    #[test]
    fn test_commerce_tools_in_order() {
        let registry = registry();
        let names: Vec<_> = registry.definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["search_products", "generate_image", "compare_prices"]);
        assert_eq!(
            registry.get("generate_image").unwrap().category(),
            ToolCategory::Generation
        );
        assert!(registry.get("Generate_Image").is_none());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut registry = registry();
        let duplicate = ToolDefinition::new(
            "search_products",
            "again",
            json!({"type": "object"}),
            Tool::SearchProducts(Arc::new(ProductCatalog::new())),
        )
        .unwrap();
        assert!(matches!(
            registry.register(duplicate),
            Err(ToolError::DuplicateTool(name)) if name == "search_products"
        ));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn test_function_schema_shape() {
        let schemas = registry().function_schemas();
        assert_eq!(schemas[2]["type"], "function");
        assert_eq!(schemas[2]["function"]["name"], "compare_prices");
        assert_eq!(
            schemas[2]["function"]["parameters"]["required"],
            json!(["product_name"])
        );
    }

    #[tokio::test]
    async fn test_invoke_search_returns_products() {
        let registry = registry();
        let definition = registry.get("search_products").unwrap();
        let args = json!({"query": "desk", "max_price": 60}).as_object().cloned().unwrap();
        match definition.tool.invoke(&definition.name, args).await.unwrap() {
            ToolOutput::Products(products) => {
                assert_eq!(products.len(), 1);
                assert_eq!(products[0].name, "Budget Desk");
            }
            other => panic!("unexpected output {other:?}"),
        }
    }
}
