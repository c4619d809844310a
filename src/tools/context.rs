//! Caller context merged into tool arguments.

use serde_json::{Map, Value};

/// Who is acting on this turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallContext {
    pub user_id: Option<String>,
    pub connection_id: Option<String>,
}

impl CallContext {
    pub fn new(user_id: Option<String>, connection_id: Option<String>) -> Self {
        Self {
            user_id,
            connection_id,
        }
    }

    /// Merge system-controlled fields into `args`.
    ///
    /// Only identity is injected, and it always wins: a model cannot act as
    /// another user by supplying `user_id` itself. Other arguments are untouched.
    pub fn inject(&self, args: &mut Map<String, Value>) {
        if let Some(user_id) = &self.user_id {
            args.insert("user_id".to_string(), Value::String(user_id.clone()));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identity_overrides_but_arguments_survive() {
        let ctx = CallContext::new(Some("42".to_string()), None);
        let mut args = json!({"prompt": "lamp", "user_id": "7"})
            .as_object()
            .cloned()
            .unwrap();
        ctx.inject(&mut args);
        assert_eq!(Value::Object(args), json!({"prompt": "lamp", "user_id": "42"}));
    }

    #[test]
    fn test_anonymous_context_injects_nothing() {
        let mut args = Map::new();
        CallContext::default().inject(&mut args);
        assert!(args.is_empty());
    }
}
