use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Comparison operators the admin list screens can issue.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum Operator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "!=")]
    NotEqual,
    #[serde(rename = ">")]
    GreaterThan,
    #[serde(rename = ">=")]
    GreaterThanOrEqual,
    #[serde(rename = "<")]
    LessThan,
    #[serde(rename = "<=")]
    LessThanOrEqual,
    #[serde(rename = "like")]
    Like,
    #[serde(rename = "in")]
    In,
    #[serde(rename = "is_null")]
    IsNull,
    #[serde(rename = "is_not_null")]
    IsNotNull,
}

impl Operator {
    pub fn to_sql(&self) -> &'static str {
        match self {
            Operator::Equal => "=",
            Operator::NotEqual => "!=",
            Operator::GreaterThan => ">",
            Operator::GreaterThanOrEqual => ">=",
            Operator::LessThan => "<",
            Operator::LessThanOrEqual => "<=",
            Operator::Like => "LIKE",
            Operator::In => "IN",
            Operator::IsNull => "IS NULL",
            Operator::IsNotNull => "IS NOT NULL",
        }
    }

    /// Whether the operator compares against a bound value.
    pub fn binds_value(&self) -> bool {
        !matches!(self, Operator::IsNull | Operator::IsNotNull)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum FilterValue {
    String(String),
    Number(f64),
    Boolean(bool),
    StringList(Vec<String>),
    NumberList(Vec<f64>),
}

/// One predicate against a registry column. Columns on related tables
/// are addressed as `relation.column` (e.g. `customer.username`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterCondition {
    pub column: String,
    pub operator: Operator,
    #[serde(default)]
    pub value: Option<FilterValue>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum LogicalOperator {
    #[serde(rename = "and")]
    And,
    #[serde(rename = "or")]
    Or,
}

impl LogicalOperator {
    pub fn to_sql(&self) -> &'static str {
        match self {
            LogicalOperator::And => "AND",
            LogicalOperator::Or => "OR",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FilterGroup {
    pub operator: LogicalOperator,
    #[serde(default)]
    pub conditions: Vec<FilterCondition>,
    #[serde(default)]
    pub groups: Vec<FilterGroup>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub enum SortDirection {
    #[serde(rename = "asc")]
    Ascending,
    #[serde(rename = "desc")]
    Descending,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Ascending => "ASC",
            SortDirection::Descending => "DESC",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortOrder {
    pub column: String,
    pub direction: SortDirection,
}

/// A full admin list query: optional predicate tree, sort order and
/// paging window.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FilterRequest {
    #[serde(default)]
    pub filter: Option<FilterGroup>,
    #[serde(default)]
    pub sort: Vec<SortOrder>,
    #[serde(default)]
    pub limit: Option<i64>,
    #[serde(default)]
    pub offset: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    String,
    Number,
    Boolean,
    DateTime,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: &'static str,
    pub field_type: FieldType,
}

#[derive(Debug, Clone, Copy)]
pub enum RelationKind {
    BelongsTo,
    HasMany,
}

/// Edge from the root table to a related table. The relation name is
/// also the join alias, so two relations may target the same table
/// (e.g. shipping and billing addresses).
#[derive(Debug, Clone)]
pub struct Relation {
    pub kind: RelationKind,
    pub target: &'static str,
    pub foreign_key: &'static str,
}

#[derive(Debug, Clone)]
pub struct Table {
    pub name: &'static str,
    pub primary_key: &'static str,
    pub fields: Vec<Field>,
    pub relations: HashMap<&'static str, Relation>,
}

/// Implemented per admin root model to describe its table and edges.
pub trait Relatable {
    fn table_name() -> &'static str;

    fn primary_key() -> &'static str {
        "id"
    }

    fn fields() -> Vec<Field>;

    fn relations() -> HashMap<&'static str, Relation> {
        HashMap::new()
    }

    fn into_table() -> Table {
        Table {
            name: Self::table_name(),
            primary_key: Self::primary_key(),
            fields: Self::fields(),
            relations: Self::relations(),
        }
    }
}

/// A column reference resolved against a registry: which join alias and
/// SQL column a `relation.column` path lands on.
#[derive(Debug, Clone)]
pub struct ColumnRef {
    pub relation: Option<String>,
    pub alias: String,
    pub column: &'static str,
    pub field_type: FieldType,
}

impl ColumnRef {
    pub fn qualified(&self) -> String {
        format!("{}.{}", self.alias, self.column)
    }
}

/// Root table plus every table reachable through its relations.
pub struct ModelRegistry {
    root: Table,
    related: HashMap<&'static str, Table>,
}

impl ModelRegistry {
    pub fn new(root: Table) -> Self {
        Self {
            root,
            related: HashMap::new(),
        }
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.related.insert(table.name, table);
        self
    }

    pub fn root(&self) -> &Table {
        &self.root
    }

    pub fn relation(&self, name: &str) -> Option<(&Relation, &Table)> {
        let relation = self.root.relations.get(name)?;
        let table = self.related.get(relation.target)?;
        Some((relation, table))
    }

    /// Resolve `column` or `relation.column` to a join alias + field.
    pub fn resolve(&self, column: &str) -> Option<ColumnRef> {
        match column.split_once('.') {
            None => {
                let field = self.root.fields.iter().find(|f| f.name == column)?;
                Some(ColumnRef {
                    relation: None,
                    alias: self.root.name.to_string(),
                    column: field.name,
                    field_type: field.field_type,
                })
            }
            Some((relation_name, field_name)) => {
                let (_, table) = self.relation(relation_name)?;
                let field = table.fields.iter().find(|f| f.name == field_name)?;
                Some(ColumnRef {
                    relation: Some(relation_name.to_string()),
                    alias: relation_name.to_string(),
                    column: field.name,
                    field_type: field.field_type,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_request_parses_from_json() {
        let json = r#"{
            "filter": {
                "operator": "and",
                "conditions": [
                    {"column": "ordered", "operator": "=", "value": true},
                    {"column": "customer.username", "operator": "like", "value": "%kim%"},
                    {"column": "ref_code", "operator": "is_null"}
                ]
            },
            "sort": [{"column": "start_date", "direction": "desc"}],
            "limit": 25,
            "offset": 50
        }"#;

        let request: FilterRequest = serde_json::from_str(json).unwrap();
        let group = request.filter.unwrap();
        assert_eq!(group.conditions.len(), 3);
        assert_eq!(group.conditions[0].operator, Operator::Equal);
        assert_eq!(group.conditions[0].value, Some(FilterValue::Boolean(true)));
        assert_eq!(group.conditions[2].operator, Operator::IsNull);
        assert_eq!(group.conditions[2].value, None);
        assert_eq!(request.limit, Some(25));
        assert_eq!(request.offset, Some(50));
    }

    #[test]
    fn untagged_values_pick_the_right_variant() {
        let values: Vec<FilterValue> =
            serde_json::from_str(r#"["abc", 4.5, false, ["a", "b"], [1, 2]]"#).unwrap();
        assert_eq!(
            values,
            vec![
                FilterValue::String("abc".to_string()),
                FilterValue::Number(4.5),
                FilterValue::Boolean(false),
                FilterValue::StringList(vec!["a".to_string(), "b".to_string()]),
                FilterValue::NumberList(vec![1.0, 2.0]),
            ]
        );
    }

    #[test]
    fn registry_resolves_root_and_relation_columns() {
        let registry = ModelRegistry::new(Table {
            name: "orders",
            primary_key: "id",
            fields: vec![Field {
                name: "ref_code",
                field_type: FieldType::String,
            }],
            relations: HashMap::from([(
                "customer",
                Relation {
                    kind: RelationKind::BelongsTo,
                    target: "users",
                    foreign_key: "user_id",
                },
            )]),
        })
        .with_table(Table {
            name: "users",
            primary_key: "id",
            fields: vec![Field {
                name: "username",
                field_type: FieldType::String,
            }],
            relations: HashMap::new(),
        });

        let root_column = registry.resolve("ref_code").unwrap();
        assert_eq!(root_column.qualified(), "orders.ref_code");
        assert!(root_column.relation.is_none());

        let related = registry.resolve("customer.username").unwrap();
        assert_eq!(related.qualified(), "customer.username");
        assert_eq!(related.relation.as_deref(), Some("user"));

        assert!(registry.resolve("user.missing").is_none());
        assert!(registry.resolve("bogus").is_none());
    }
}
