mod filter_model;
mod query_builder;

pub use filter_model::{
    ColumnRef, Field, FieldType, FilterCondition, FilterGroup, FilterRequest, FilterValue,
    LogicalOperator, ModelRegistry, Operator, Relatable, Relation, RelationKind, SortDirection,
    SortOrder, Table,
};
pub use query_builder::{build_query, SqlQueryBuilder};

/// Marker tying a root model (and its reachable relations) to a static
/// registry the query builder can walk.
pub trait ModelRegistryProvider {
    fn registry() -> &'static ModelRegistry;
}
