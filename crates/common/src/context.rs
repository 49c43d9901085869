use serde::{Deserialize, Serialize};

use crate::types::{CorrelationId, TenantId, UserId};

/// Who is acting, for which tenant, and under which correlation id.
///
/// Threaded through every command so that mutations and published events can
/// be attributed to the triggering request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandContext {
    pub tenant_id: TenantId,
    pub user_id: UserId,
    pub correlation_id: CorrelationId,
}

impl CommandContext {
    /// Creates a context with a fresh correlation id.
    pub fn new(tenant_id: TenantId, user_id: UserId) -> Self {
        Self {
            tenant_id,
            user_id,
            correlation_id: CorrelationId::new(),
        }
    }

    /// Returns a copy of this context carrying the given correlation id.
    pub fn with_correlation_id(mut self, correlation_id: CorrelationId) -> Self {
        self.correlation_id = correlation_id;
        self
    }
}
