use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::IdError;

/// Declares a UUID-backed identifier newtype.
///
/// Each identifier wraps a UUID to provide type safety and prevent mixing up
/// ids of different entities. Parsing rejects malformed and nil UUIDs.
macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident, $kind:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID.
            pub fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the underlying UUID.
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an identifier from its string form.
            pub fn parse(value: &str) -> Result<Self, IdError> {
                value.parse()
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match Uuid::parse_str(s.trim()) {
                    Ok(uuid) if !uuid.is_nil() => Ok(Self(uuid)),
                    _ => Err(IdError::new($kind, s)),
                }
            }
        }

        impl From<Uuid> for $name {
            fn from(uuid: Uuid) -> Self {
                Self(uuid)
            }
        }

        impl From<$name> for Uuid {
            fn from(id: $name) -> Self {
                id.0
            }
        }
    };
}

define_id!(
    /// Tenant owning inventory, warehouses and orders.
    TenantId,
    "tenant id"
);
define_id!(
    /// Acting user recorded on every mutation and event.
    UserId,
    "user id"
);
define_id!(
    /// Correlation id inherited from the triggering command.
    CorrelationId,
    "correlation id"
);
define_id!(ProductId, "product id");
define_id!(VariantId, "variant id");
define_id!(WarehouseId, "warehouse id");
define_id!(
    /// Storage slot inside a warehouse.
    LocationId,
    "location id"
);
define_id!(OrderId, "order id");
define_id!(CustomerId, "customer id");
define_id!(SagaId, "saga id");
define_id!(ReservationId, "reservation id");
define_id!(
    /// Identifier of a warehouse task (receipt, pick, pack, ship).
    OperationId,
    "operation id"
);
