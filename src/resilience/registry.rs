//! Named breaker registry.
//!
//! Built once from `[breakers]` and shared; lookups are read-only afterwards.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::config::schema::BreakerConfig;
use crate::resilience::circuit_breaker::{BreakerStatus, CircuitBreaker};

#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: BTreeMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn from_config(configs: &HashMap<String, BreakerConfig>) -> Self {
        let breakers = configs
            .iter()
            .map(|(name, config)| {
                (
                    name.clone(),
                    Arc::new(CircuitBreaker::new(name.clone(), config.clone())),
                )
            })
            .collect();
        Self { breakers }
    }

    /// Register an already-built breaker, replacing any with the same name.
    pub fn insert(&mut self, breaker: Arc<CircuitBreaker>) {
        self.breakers.insert(breaker.name().to_string(), breaker);
    }

    pub fn get(&self, name: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(name).cloned()
    }

    pub fn status(&self, name: &str) -> Option<BreakerStatus> {
        self.breakers.get(name).map(|b| b.status())
    }

    /// Snapshots of every breaker, ordered by name.
    pub fn statuses(&self) -> Vec<BreakerStatus> {
        self.breakers.values().map(|b| b.status()).collect()
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
