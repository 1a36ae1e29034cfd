use sqlx::postgres::PgArguments;
use sqlx::Arguments;
use std::collections::HashSet;
use std::marker::PhantomData;
use tracing::debug;

use crate::model::GenericError;
use crate::ui_model::{
    FieldType, FilterCondition, FilterGroup, FilterRequest, FilterValue, ModelRegistry,
    ModelRegistryProvider, Operator, RelationKind, SortOrder,
};

/// Build a parameterised PostgreSQL statement for a filter request.
pub fn build_query<T: ModelRegistryProvider>(
    request: &FilterRequest,
) -> Result<(String, PgArguments), GenericError> {
    SqlQueryBuilder::<T>::build(request)
}

/// Compiles a [`FilterRequest`] against `T`'s model registry into
/// `SELECT DISTINCT root.pk` with the joins the referenced columns need.
pub struct SqlQueryBuilder<T: ModelRegistryProvider> {
    _marker: PhantomData<T>,
}

impl<T: ModelRegistryProvider> SqlQueryBuilder<T> {
    pub fn build(request: &FilterRequest) -> Result<(String, PgArguments), GenericError> {
        let registry = T::registry();
        let root = registry.root();

        // DISTINCT: has-many joins can fan the root rows out.
        let mut query = format!(
            "SELECT DISTINCT {root}.{pk} FROM {root} {root}",
            root = root.name,
            pk = root.primary_key,
        );

        let inner_joined = Self::relations_with_value_filters(request);
        for relation_name in Self::referenced_relations(request, registry)? {
            let (relation, target) = registry
                .relation(&relation_name)
                .ok_or_else(|| format!("unknown relation in filter: {}", relation_name))?;

            // A relation only filtered with IS NULL must stay a left
            // join or the missing rows it is asking for disappear.
            let join = if inner_joined.contains(relation_name.as_str()) {
                "JOIN"
            } else {
                "LEFT JOIN"
            };
            let on = match relation.kind {
                RelationKind::BelongsTo => format!(
                    "{alias}.{pk} = {root}.{fk}",
                    alias = relation_name,
                    pk = target.primary_key,
                    root = root.name,
                    fk = relation.foreign_key,
                ),
                RelationKind::HasMany => format!(
                    "{alias}.{fk} = {root}.{pk}",
                    alias = relation_name,
                    fk = relation.foreign_key,
                    root = root.name,
                    pk = root.primary_key,
                ),
            };
            query.push_str(&format!(
                " {} {} {} ON {}",
                join, target.name, relation_name, on
            ));
        }

        let mut args = PgArguments::default();
        let mut next_placeholder = 1usize;

        if let Some(group) = &request.filter {
            let clause =
                Self::build_where_clause(registry, group, &mut args, &mut next_placeholder)?;
            if !clause.is_empty() {
                query = format!("{} WHERE {}", query, clause);
            }
        }

        let order_by = Self::build_order_by(registry, &request.sort)?;
        if !order_by.is_empty() {
            query = format!("{} {}", query, order_by);
        }

        if let Some(limit) = request.limit {
            if limit < 0 {
                return Err("limit must not be negative".into());
            }
            query = format!("{} LIMIT {}", query, limit);
        }
        if let Some(offset) = request.offset {
            if offset < 0 {
                return Err("offset must not be negative".into());
            }
            query = format!("{} OFFSET {}", query, offset);
        }

        debug!("Compiled filter query: {}", query);
        Ok((query, args))
    }

    /// Relation names whose conditions bind a value; these become inner
    /// joins.
    fn relations_with_value_filters(request: &FilterRequest) -> HashSet<String> {
        let mut relations = HashSet::new();
        if let Some(group) = &request.filter {
            Self::collect_value_filtered(group, &mut relations);
        }
        relations
    }

    fn collect_value_filtered(group: &FilterGroup, relations: &mut HashSet<String>) {
        for condition in &group.conditions {
            if condition.operator != Operator::IsNull {
                if let Some((relation, _)) = condition.column.split_once('.') {
                    relations.insert(relation.to_string());
                }
            }
        }
        for nested in &group.groups {
            Self::collect_value_filtered(nested, relations);
        }
    }

    /// Every relation mentioned by a condition or sort column, in first
    /// appearance order.
    fn referenced_relations(
        request: &FilterRequest,
        registry: &ModelRegistry,
    ) -> Result<Vec<String>, GenericError> {
        let mut seen = HashSet::new();
        let mut ordered = Vec::new();
        let mut visit = |column: &str| -> Result<(), GenericError> {
            registry
                .resolve(column)
                .ok_or_else(|| format!("unknown filter column: {}", column))?;
            if let Some((relation, _)) = column.split_once('.') {
                if seen.insert(relation.to_string()) {
                    ordered.push(relation.to_string());
                }
            }
            Ok(())
        };

        fn walk(
            group: &FilterGroup,
            visit: &mut dyn FnMut(&str) -> Result<(), GenericError>,
        ) -> Result<(), GenericError> {
            for condition in &group.conditions {
                visit(&condition.column)?;
            }
            for nested in &group.groups {
                walk(nested, visit)?;
            }
            Ok(())
        }

        if let Some(group) = &request.filter {
            walk(group, &mut visit)?;
        }
        for sort in &request.sort {
            visit(&sort.column)?;
        }
        Ok(ordered)
    }

    fn build_where_clause(
        registry: &ModelRegistry,
        group: &FilterGroup,
        args: &mut PgArguments,
        next_placeholder: &mut usize,
    ) -> Result<String, GenericError> {
        let mut parts = Vec::new();
        for condition in &group.conditions {
            parts.push(Self::render_condition(
                registry,
                condition,
                args,
                next_placeholder,
            )?);
        }
        for nested in &group.groups {
            let clause = Self::build_where_clause(registry, nested, args, next_placeholder)?;
            if !clause.is_empty() {
                parts.push(format!("({})", clause));
            }
        }
        Ok(parts.join(&format!(" {} ", group.operator.to_sql())))
    }

    fn render_condition(
        registry: &ModelRegistry,
        condition: &FilterCondition,
        args: &mut PgArguments,
        next_placeholder: &mut usize,
    ) -> Result<String, GenericError> {
        let column = registry
            .resolve(&condition.column)
            .ok_or_else(|| format!("unknown filter column: {}", condition.column))?;

        if !condition.operator.binds_value() {
            return Ok(format!(
                "{} {}",
                column.qualified(),
                condition.operator.to_sql()
            ));
        }

        let value = condition.value.as_ref().ok_or_else(|| {
            format!(
                "operator {} on {} requires a value",
                condition.operator.to_sql(),
                condition.column
            )
        })?;

        if condition.operator == Operator::In {
            let placeholder = Self::take_placeholder(next_placeholder);
            match value {
                FilterValue::StringList(list) => Self::bind(args, list.clone())?,
                FilterValue::NumberList(list) => Self::bind(args, list.clone())?,
                other => {
                    return Err(format!(
                        "IN filter on {} needs a list value, got {:?}",
                        condition.column, other
                    )
                    .into())
                }
            }
            return Ok(format!("{} = ANY({})", column.qualified(), placeholder));
        }

        let placeholder = Self::take_placeholder(next_placeholder);
        let rendered = match value {
            FilterValue::String(text) => {
                Self::bind(args, text.clone())?;
                // Bound text compared to a timestamp column needs the
                // cast spelled out.
                if column.field_type == FieldType::DateTime {
                    format!("CAST({} AS TIMESTAMP)", placeholder)
                } else {
                    placeholder
                }
            }
            FilterValue::Number(number) => {
                Self::bind(args, *number)?;
                placeholder
            }
            FilterValue::Boolean(flag) => {
                Self::bind(args, *flag)?;
                placeholder
            }
            FilterValue::StringList(_) | FilterValue::NumberList(_) => {
                return Err(format!(
                    "list value on {} only works with the in operator",
                    condition.column
                )
                .into())
            }
        };

        Ok(format!(
            "{} {} {}",
            column.qualified(),
            condition.operator.to_sql(),
            rendered
        ))
    }

    fn build_order_by(
        registry: &ModelRegistry,
        sort: &[SortOrder],
    ) -> Result<String, GenericError> {
        if sort.is_empty() {
            return Ok(String::new());
        }
        let mut rendered = Vec::new();
        for order in sort {
            let column = registry
                .resolve(&order.column)
                .ok_or_else(|| format!("unknown sort column: {}", order.column))?;
            rendered.push(format!("{} {}", column.qualified(), order.direction.to_sql()));
        }
        Ok(format!("ORDER BY {}", rendered.join(", ")))
    }

    fn take_placeholder(next_placeholder: &mut usize) -> String {
        let placeholder = format!("${}", next_placeholder);
        *next_placeholder += 1;
        placeholder
    }

    fn bind<'q, V>(args: &mut PgArguments, value: V) -> Result<(), GenericError>
    where
        V: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres> + Send + 'q,
    {
        args.add(value)
            .map_err(|e| -> GenericError { format!("failed to bind filter value: {}", e).into() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ui_model::{
        Field, FilterCondition, LogicalOperator, ModelRegistry, Relation, RelationKind,
        SortDirection, Table,
    };
    use lazy_static::lazy_static;
    use std::collections::HashMap;

    struct OrderRows;

    lazy_static! {
        static ref ORDER_ROWS_REGISTRY: ModelRegistry = ModelRegistry::new(Table {
            name: "orders",
            primary_key: "id",
            fields: vec![
                Field {
                    name: "ref_code",
                    field_type: FieldType::String
                },
                Field {
                    name: "ordered",
                    field_type: FieldType::Boolean
                },
                Field {
                    name: "start_date",
                    field_type: FieldType::DateTime
                },
            ],
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
                field_type: FieldType::String
            }],
            relations: HashMap::new(),
        });
    }

    impl ModelRegistryProvider for OrderRows {
        fn registry() -> &'static ModelRegistry {
            &ORDER_ROWS_REGISTRY
        }
    }

    fn condition(column: &str, operator: Operator, value: Option<FilterValue>) -> FilterCondition {
        FilterCondition {
            column: column.to_string(),
            operator,
            value,
        }
    }

    fn request_with(conditions: Vec<FilterCondition>) -> FilterRequest {
        FilterRequest {
            filter: Some(FilterGroup {
                operator: LogicalOperator::And,
                conditions,
                groups: vec![],
            }),
            ..Default::default()
        }
    }

    #[test]
    fn empty_request_selects_root_ids() {
        let (sql, _) = build_query::<OrderRows>(&FilterRequest::default()).unwrap();
        assert_eq!(sql, "SELECT DISTINCT orders.id FROM orders orders");
    }

    #[test]
    fn root_condition_binds_a_placeholder() {
        let request = request_with(vec![condition(
            "ordered",
            Operator::Equal,
            Some(FilterValue::Boolean(true)),
        )]);
        let (sql, _) = build_query::<OrderRows>(&request).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT orders.id FROM orders orders WHERE orders.ordered = $1"
        );
    }

    #[test]
    fn relation_condition_adds_inner_join() {
        let request = request_with(vec![condition(
            "customer.username",
            Operator::Like,
            Some(FilterValue::String("%kim%".to_string())),
        )]);
        let (sql, _) = build_query::<OrderRows>(&request).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT orders.id FROM orders orders \
             JOIN users customer ON customer.id = orders.user_id \
             WHERE customer.username LIKE $1"
        );
    }

    #[test]
    fn is_null_keeps_left_join_and_binds_nothing() {
        let request = request_with(vec![condition("customer.username", Operator::IsNull, None)]);
        let (sql, _) = build_query::<OrderRows>(&request).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT orders.id FROM orders orders \
             LEFT JOIN users customer ON customer.id = orders.user_id \
             WHERE customer.username IS NULL"
        );
    }

    #[test]
    fn in_operator_compiles_to_any() {
        let request = request_with(vec![condition(
            "ref_code",
            Operator::In,
            Some(FilterValue::StringList(vec![
                "A1".to_string(),
                "B2".to_string(),
            ])),
        )]);
        let (sql, _) = build_query::<OrderRows>(&request).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT orders.id FROM orders orders WHERE orders.ref_code = ANY($1)"
        );
    }

    #[test]
    fn datetime_strings_are_cast() {
        let request = request_with(vec![condition(
            "start_date",
            Operator::GreaterThanOrEqual,
            Some(FilterValue::String("2026-01-01T00:00:00".to_string())),
        )]);
        let (sql, _) = build_query::<OrderRows>(&request).unwrap();
        assert!(sql.ends_with("WHERE orders.start_date >= CAST($1 AS TIMESTAMP)"));
    }

    #[test]
    fn sort_limit_offset_render_in_order() {
        let request = FilterRequest {
            sort: vec![SortOrder {
                column: "start_date".to_string(),
                direction: SortDirection::Descending,
            }],
            limit: Some(10),
            offset: Some(20),
            ..Default::default()
        };
        let (sql, _) = build_query::<OrderRows>(&request).unwrap();
        assert_eq!(
            sql,
            "SELECT DISTINCT orders.id FROM orders orders \
             ORDER BY orders.start_date DESC LIMIT 10 OFFSET 20"
        );
    }

    #[test]
    fn nested_groups_parenthesize() {
        let request = FilterRequest {
            filter: Some(FilterGroup {
                operator: LogicalOperator::And,
                conditions: vec![condition(
                    "ordered",
                    Operator::Equal,
                    Some(FilterValue::Boolean(true)),
                )],
                groups: vec![FilterGroup {
                    operator: LogicalOperator::Or,
                    conditions: vec![
                        condition(
                            "ref_code",
                            Operator::Equal,
                            Some(FilterValue::String("A1".to_string())),
                        ),
                        condition("ref_code", Operator::IsNull, None),
                    ],
                    groups: vec![],
                }],
            }),
            ..Default::default()
        };
        let (sql, _) = build_query::<OrderRows>(&request).unwrap();
        assert!(sql.ends_with(
            "WHERE orders.ordered = $1 AND (orders.ref_code = $2 OR orders.ref_code IS NULL)"
        ));
    }

    #[test]
    fn unknown_column_is_rejected() {
        let request = request_with(vec![condition(
            "bogus",
            Operator::Equal,
            Some(FilterValue::Number(1.0)),
        )]);
        assert!(build_query::<OrderRows>(&request).is_err());
    }
}
