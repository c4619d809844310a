//! Product search over a deterministic catalog.

use serde::{Deserialize, Serialize};

const PLACEHOLDER_IMAGE: &str = "https://via.placeholder.com/300";
const SOURCE: &str = "toolgate";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub price: f64,
    pub currency: String,
    pub category: String,
    pub image_url: String,
    pub source: String,
    pub rating: f64,
}

/// Arguments of `search_products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SearchArgs {
    pub query: String,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub min_price: Option<f64>,
    #[serde(default)]
    pub max_price: Option<f64>,
}

/// Tier offered for every query. `{q}` in the description is the raw query.
struct Tier {
    prefix: &'static str,
    description: &'static str,
    price: f64,
    rating: f64,
}

const TIERS: [Tier; 3] = [
    Tier {
        prefix: "Premium",
        description: "High-quality {q} with excellent features",
        price: 99.99,
        rating: 4.5,
    },
    Tier {
        prefix: "Budget",
        description: "Affordable {q} with good value",
        price: 49.99,
        rating: 4.0,
    },
    Tier {
        prefix: "Luxury",
        description: "Premium {q} with top-tier quality",
        price: 199.99,
        rating: 4.8,
    },
];

#[derive(Debug, Default)]
pub struct ProductCatalog;

impl ProductCatalog {
    pub fn new() -> Self {
        Self
    }

    /// Products matching `args`, in tier order, with price filters applied.
    pub fn search(&self, args: &SearchArgs) -> Vec<Product> {
        let title = title_case(&args.query);
        let category = args
            .category
            .clone()
            .unwrap_or_else(|| "general".to_string());

        tracing::info!(query = %args.query, category = %category, "Searching products");

        TIERS
            .iter()
            .enumerate()
            .map(|(i, tier)| Product {
                id: format!("prod_{:03}", i + 1),
                name: format!("{} {}", tier.prefix, title),
                description: tier.description.replace("{q}", &args.query),
                price: tier.price,
                currency: "USD".to_string(),
                category: category.clone(),
                image_url: PLACEHOLDER_IMAGE.to_string(),
                source: SOURCE.to_string(),
                rating: tier.rating,
            })
            .filter(|p| args.min_price.is_none_or(|min| p.price >= min))
            .filter(|p| args.max_price.is_none_or(|max| p.price <= max))
            .collect()
    }
}

/// Uppercase the first letter of every word, lowercase the rest.
fn title_case(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut at_word_start = true;
    for c in input.chars() {
        if c.is_alphabetic() {
            if at_word_start {
                out.extend(c.to_uppercase());
            } else {
                out.extend(c.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(c);
            at_word_start = true;
        }
    }
    out
}
