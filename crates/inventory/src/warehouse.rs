use common::{LocationId, TenantId, WarehouseId};
use serde::{Deserialize, Serialize};

/// A tenant's warehouse, as far as fulfillment needs to know about it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Warehouse {
    pub id: WarehouseId,
    pub tenant_id: TenantId,
    pub code: String,
    pub name: String,
    /// Slot used for picking when no finer-grained placement is known.
    pub default_pick_location: LocationId,
    pub active: bool,
}

impl Warehouse {
    pub fn new(tenant_id: TenantId, code: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: WarehouseId::new(),
            tenant_id,
            code: code.into(),
            name: name.into(),
            default_pick_location: LocationId::new(),
            active: true,
        }
    }
}
