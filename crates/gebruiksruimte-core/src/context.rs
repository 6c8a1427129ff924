//! Explicit caller identity for every resolver and aggregation call.

use serde::{Deserialize, Serialize};

/// Who is asking, and on whose behalf.
///
/// An administrator viewing another user's data carries both ids; all data
/// scoping uses [`effective_user`](Self::effective_user).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    user_id: String,
    view_as_user_id: Option<String>,
}

impl CallContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            view_as_user_id: None,
        }
    }

    /// Act on behalf of `target` while authenticated as `user_id`.
    pub fn impersonating(user_id: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            view_as_user_id: Some(target.into()),
        }
    }

    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    pub fn effective_user(&self) -> &str {
        self.view_as_user_id.as_deref().unwrap_or(&self.user_id)
    }

    pub fn is_impersonating(&self) -> bool {
        self.view_as_user_id.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_user_defaults_to_self() {
        let ctx = CallContext::new("u1");
        assert_eq!(ctx.effective_user(), "u1");
        assert!(!ctx.is_impersonating());
    }

    #[test]
    fn impersonation_switches_effective_user() {
        let ctx = CallContext::impersonating("admin", "farmer");
        assert_eq!(ctx.user_id(), "admin");
        assert_eq!(ctx.effective_user(), "farmer");
        assert!(ctx.is_impersonating());
    }
}
