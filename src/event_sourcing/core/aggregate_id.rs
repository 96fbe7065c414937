use std::fmt;
use std::hash::Hash;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::KernelError;

// ============================================================================
// Aggregate Identifiers
// ============================================================================
//
// Each aggregate gets its own id newtype over a UUID. Distinct newtypes can't
// be compared with each other at all; once erased into an AggregateIdentity
// the kind tag keeps ids of different aggregates apart even when the UUIDs
// match.
//
// ============================================================================

/// Identity of an event-sourced aggregate
pub trait AggregateId:
    Clone + Copy + Eq + Hash + fmt::Debug + fmt::Display + Send + Sync + 'static
{
    /// Type tag distinguishing ids of different aggregates
    const KIND: &'static str;

    /// New random identifier
    fn generate() -> Self;

    /// Parse and validate the string form of an identifier
    fn from_string(value: &str) -> Result<Self, KernelError>;

    fn as_uuid(&self) -> &Uuid;

    /// String form of the underlying UUID
    fn value(&self) -> String {
        self.as_uuid().to_string()
    }

    fn identity(&self) -> AggregateIdentity {
        AggregateIdentity {
            kind: Self::KIND,
            uuid: *self.as_uuid(),
        }
    }
}

/// Type-erased, kind-qualified aggregate identity.
///
/// Used as the stream key by stores and wherever ids of different aggregates
/// share a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct AggregateIdentity {
    pub kind: &'static str,
    pub uuid: Uuid,
}

impl fmt::Display for AggregateIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.uuid)
    }
}

/// Shared validation for `AggregateId::from_string`
pub fn parse_uuid(kind: &'static str, value: &str) -> Result<Uuid, KernelError> {
    if value.trim().is_empty() {
        return Err(KernelError::InvalidAggregateId {
            kind,
            value: value.to_string(),
            reason: "identifier cannot be empty".to_string(),
        });
    }

    Uuid::parse_str(value).map_err(|e| KernelError::InvalidAggregateId {
        kind,
        value: value.to_string(),
        reason: e.to_string(),
    })
}

/// Declare an aggregate id newtype.
///
/// ```ignore
/// define_aggregate_id!(OrderId, "order");
/// ```
#[macro_export]
macro_rules! define_aggregate_id {
    ($name:ident, $kind:literal) => {
        #[derive(
            Debug,
            Clone,
            Copy,
            PartialEq,
            Eq,
            Hash,
            ::serde::Serialize,
            ::serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(::uuid::Uuid);

        impl $crate::event_sourcing::AggregateId for $name {
            const KIND: &'static str = $kind;

            fn generate() -> Self {
                Self(::uuid::Uuid::new_v4())
            }

            fn from_string(
                value: &str,
            ) -> ::std::result::Result<Self, $crate::event_sourcing::KernelError> {
                $crate::event_sourcing::parse_uuid($kind, value).map(Self)
            }

            fn as_uuid(&self) -> &::uuid::Uuid {
                &self.0
            }
        }

        impl ::std::fmt::Display for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl ::std::str::FromStr for $name {
            type Err = $crate::event_sourcing::KernelError;

            fn from_str(value: &str) -> ::std::result::Result<Self, Self::Err> {
                <Self as $crate::event_sourcing::AggregateId>::from_string(value)
            }
        }
    };
}
