//! Hypertable-side catalog entities.
//!
//! These are in-memory handles produced by the storage layer's lookups.
//! Nothing here is persisted by the scheduler; policy configs carry only
//! ids and re-resolve them to these handles on every use, because the
//! underlying object may change between scheduling and execution.

use std::fmt;

use tempodb_commons::{DimensionId, HypertableId};

/// How a dimension partitions its column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionKind {
    /// Wall-clock partitioning; lags are intervals against the clock.
    Timestamp,
    /// Integer partitioning; lags are integers against the dimension's
    /// "integer now" resolver.
    Integer,
}

/// Schema-qualified relation name.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RelationName {
    schema: String,
    name: String,
}

impl RelationName {
    pub fn new(schema: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            name: name.into(),
        }
    }

    pub fn schema(&self) -> &str {
        &self.schema
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.name)
    }
}

/// A partitioning dimension of a hypertable.
#[derive(Debug, Clone, PartialEq)]
pub struct Dimension {
    pub id: DimensionId,
    pub hypertable_id: HypertableId,
    pub kind: PartitionKind,
    /// Whether an "integer now" resolver is configured for this dimension.
    /// Only meaningful for integer partitioning.
    pub has_integer_now: bool,
}

/// A partitioned table handle.
#[derive(Debug, Clone, PartialEq)]
pub struct Hypertable {
    pub id: HypertableId,
    pub relation: RelationName,
    pub dimensions: Vec<Dimension>,
}

impl Hypertable {
    /// The open (primary, usually time) dimension.
    pub fn open_dimension(&self) -> Option<&Dimension> {
        self.dimensions.first()
    }
}

/// A continuous aggregate: a user-facing view backed by a hidden
/// materialization hypertable.
#[derive(Debug, Clone, PartialEq)]
pub struct ContinuousAggregate {
    pub mat_hypertable_id: HypertableId,
    pub raw_hypertable_id: HypertableId,
    pub user_view: RelationName,
}

/// Handle to an index resolved by name within a hypertable's schema.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexRef {
    pub name: String,
    /// The hypertable the index is defined on, if any.
    pub hypertable_id: Option<HypertableId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_relation_name_display() {
        let rel = RelationName::new("public", "conditions");
        assert_eq!(rel.to_string(), "public.conditions");
    }

    #[test]
    fn test_open_dimension_is_first() {
        let ht = Hypertable {
            id: HypertableId::new(1),
            relation: RelationName::new("public", "conditions"),
            dimensions: vec![
                Dimension {
                    id: DimensionId::new(10),
                    hypertable_id: HypertableId::new(1),
                    kind: PartitionKind::Timestamp,
                    has_integer_now: false,
                },
                Dimension {
                    id: DimensionId::new(11),
                    hypertable_id: HypertableId::new(1),
                    kind: PartitionKind::Integer,
                    has_integer_now: false,
                },
            ],
        };
        assert_eq!(ht.open_dimension().unwrap().id, DimensionId::new(10));
    }
}
