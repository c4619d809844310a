//! Price comparison across retailers.
//!
//! # Responsibilities
//! - Quote a product at every configured source (deterministic per name)
//! - Pick the best in-stock deal and its savings against the average
//! - Cache comparisons with a TTL and a capacity bound
//!
//! # Design Decisions
//! - Quotes derive from a stable hash of the product name so repeated
//!   comparisons agree across restarts
//! - The cache is a `DashMap`; lookups never block other comparisons

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use url::Url;

use crate::config::schema::PricingConfig;

/// A retailer with its price multiplier and flat shipping fee.
#[derive(Debug, Clone, Copy)]
struct PriceSource {
    name: &'static str,
    multiplier: f64,
    shipping: f64,
}

const SOURCES: [PriceSource; 5] = [
    PriceSource { name: "Amazon", multiplier: 1.0, shipping: 0.0 },
    PriceSource { name: "eBay", multiplier: 0.92, shipping: 5.99 },
    PriceSource { name: "Walmart", multiplier: 0.95, shipping: 0.0 },
    PriceSource { name: "BestBuy", multiplier: 1.05, shipping: 0.0 },
    PriceSource { name: "Target", multiplier: 1.02, shipping: 5.99 },
];

const EXPENSIVE_KEYWORDS: [&str; 5] = ["luxury", "premium", "pro", "max", "ultra"];
const CHEAP_KEYWORDS: [&str; 4] = ["budget", "basic", "mini", "lite"];

/// Arguments of `compare_prices`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompareArgs {
    pub product_name: String,
    #[serde(default)]
    pub product_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceOffer {
    pub source: String,
    pub price: f64,
    pub currency: String,
    pub url: String,
    pub in_stock: bool,
    pub shipping: f64,
    pub total: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BestDeal {
    #[serde(flatten)]
    pub offer: PriceOffer,
    /// Average total across all offers minus this offer's total.
    pub savings: f64,
    pub savings_percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceComparison {
    pub product_name: String,
    pub product_id: Option<String>,
    pub sources: Vec<PriceOffer>,
    pub best_deal: Option<BestDeal>,
    /// Unix seconds when the quotes were produced.
    pub fetched_at: u64,
    pub cached: bool,
}

#[derive(Debug)]
struct CacheEntry {
    stored_at: Instant,
    comparison: PriceComparison,
}

/// Comparison engine with a TTL cache.
#[derive(Debug)]
pub struct PriceComparer {
    cache: DashMap<String, CacheEntry>,
    ttl: Duration,
    capacity: usize,
}

impl PriceComparer {
    pub fn new(config: &PricingConfig) -> Self {
        Self {
            cache: DashMap::new(),
            ttl: config.cache_ttl(),
            capacity: config.cache_capacity.max(1),
        }
    }

    pub fn compare(&self, args: &CompareArgs) -> PriceComparison {
        let key = format!(
            "{}:{}",
            args.product_name,
            args.product_id.as_deref().unwrap_or("none")
        );

        if let Some(hit) = self.cached(&key) {
            tracing::debug!(key = %key, "Price comparison cache hit");
            return hit;
        }

        tracing::info!(product = %args.product_name, "Comparing prices");
        let sources: Vec<PriceOffer> = SOURCES
            .iter()
            .map(|source| quote(source, &args.product_name))
            .collect();
        let best_deal = best_deal(&sources);

        let comparison = PriceComparison {
            product_name: args.product_name.clone(),
            product_id: args.product_id.clone(),
            sources,
            best_deal,
            fetched_at: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            cached: false,
        };

        self.store(key, comparison.clone());
        comparison
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    fn cached(&self, key: &str) -> Option<PriceComparison> {
        {
            let entry = self.cache.get(key)?;
            if entry.stored_at.elapsed() <= self.ttl {
                let mut hit = entry.comparison.clone();
                hit.cached = true;
                return Some(hit);
            }
        }
        self.cache.remove(key);
        None
    }

    fn store(&self, key: String, comparison: PriceComparison) {
        self.cache.insert(
            key,
            CacheEntry {
                stored_at: Instant::now(),
                comparison,
            },
        );

        while self.cache.len() > self.capacity {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|entry| entry.value().stored_at)
                .map(|entry| entry.key().clone());
            match oldest {
                Some(key) => {
                    self.cache.remove(&key);
                }
                None => break,
            }
        }
    }
}

fn quote(source: &PriceSource, product_name: &str) -> PriceOffer {
    let price = round_to(base_price(product_name) * source.multiplier, 2);
    let url = Url::parse_with_params(
        &format!("https://{}.com/search", source.name.to_lowercase()),
        &[("q", product_name)],
    )
    .map(String::from)
    .unwrap_or_default();

    let seed = stable_hash(&format!("{product_name}{}", source.name));
    let in_stock = fastrand::Rng::with_seed(seed).u64(0..10) > 2;

    PriceOffer {
        source: source.name.to_string(),
        price,
        currency: "USD".to_string(),
        url,
        in_stock,
        shipping: source.shipping,
        total: round_to(price + source.shipping, 2),
    }
}

fn base_price(product_name: &str) -> f64 {
    let lower = product_name.to_lowercase();
    let hash = stable_hash(&lower);

    let base = if EXPENSIVE_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        200 + hash % 500
    } else if CHEAP_KEYWORDS.iter().any(|kw| lower.contains(kw)) {
        20 + hash % 80
    } else {
        50 + hash % 200
    };
    base as f64
}

/// Cheapest in-stock offer, or cheapest overall when nothing is in stock.
fn best_deal(offers: &[PriceOffer]) -> Option<BestDeal> {
    if offers.is_empty() {
        return None;
    }

    let in_stock: Vec<&PriceOffer> = offers.iter().filter(|o| o.in_stock).collect();
    let candidates: Vec<&PriceOffer> = if in_stock.is_empty() {
        offers.iter().collect()
    } else {
        in_stock
    };
    let best = candidates
        .into_iter()
        .min_by(|a, b| a.total.total_cmp(&b.total))?;

    let average = offers.iter().map(|o| o.total).sum::<f64>() / offers.len() as f64;
    let savings = average - best.total;
    let savings_percent = if average > 0.0 {
        round_to(savings / average * 100.0, 1)
    } else {
        0.0
    };

    Some(BestDeal {
        offer: best.clone(),
        savings: round_to(savings, 2),
        savings_percent,
    })
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// FNV-1a, stable across processes.
fn stable_hash(input: &str) -> u64 {
    input.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn comparer() -> PriceComparer {
        PriceComparer::new(&PricingConfig {
            cache_ttl_secs: 60,
            cache_capacity: 2,
        })
    }

    fn args(name: &str) -> CompareArgs {
        CompareArgs {
            product_name: name.to_string(),
            product_id: None,
        }
    }

    #[tokio::test]
    async fn test_quotes_all_sources_deterministically() {
        let first = comparer().compare(&args("Wireless Mouse"));
        let second = comparer().compare(&args("Wireless Mouse"));

        let names: Vec<_> = first.sources.iter().map(|o| o.source.as_str()).collect();
        assert_eq!(names, vec!["Amazon", "eBay", "Walmart", "BestBuy", "Target"]);
        assert_eq!(first.sources, second.sources);

        let amazon = &first.sources[0];
        let ebay = &first.sources[1];
        assert!(amazon.price >= 50.0 && amazon.price < 250.0);
        assert_eq!(ebay.total, round_to(ebay.price + 5.99, 2));
        assert!(amazon.url.starts_with("https://amazon.com/search?q=Wireless+Mouse"));
    }

    #[tokio::test]
    async fn test_keyword_tiers() {
        assert!(base_price("Ultra Blender") >= 200.0);
        assert!(base_price("mini fan") < 100.0);
    }

    #[test]
    fn test_best_deal_prefers_in_stock() {
        let offer = |source: &str, total: f64, in_stock: bool| PriceOffer {
            source: source.to_string(),
            price: total,
            currency: "USD".to_string(),
            url: String::new(),
            in_stock,
            shipping: 0.0,
            total,
        };
        let offers = vec![
            offer("A", 80.0, false),
            offer("B", 100.0, true),
            offer("C", 120.0, true),
        ];

        let deal = best_deal(&offers).unwrap();
        assert_eq!(deal.offer.source, "B");
        assert_eq!(deal.savings, 0.0);

        let none_in_stock: Vec<_> = offers
            .into_iter()
            .map(|mut o| {
                o.in_stock = false;
                o
            })
            .collect();
        let deal = best_deal(&none_in_stock).unwrap();
        assert_eq!(deal.offer.source, "A");
        assert_eq!(deal.savings, 20.0);
        assert_eq!(deal.savings_percent, 20.0);
        assert!(best_deal(&[]).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_hits_expire_after_ttl() {
        let comparer = comparer();
        assert!(!comparer.compare(&args("kettle")).cached);
        assert!(comparer.compare(&args("kettle")).cached);

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(!comparer.compare(&args("kettle")).cached);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cache_evicts_oldest_over_capacity() {
        let comparer = comparer();
        comparer.compare(&args("a"));
        tokio::time::advance(Duration::from_secs(1)).await;
        comparer.compare(&args("b"));
        tokio::time::advance(Duration::from_secs(1)).await;
        comparer.compare(&args("c"));

        assert_eq!(comparer.cache_len(), 2);
        assert!(!comparer.compare(&args("a")).cached);
        assert!(comparer.compare(&args("c")).cached);
    }
}
