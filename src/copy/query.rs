//! Rewriting of serialized queries
//!
//! Cards store their query (and dashboard cards their parameter mappings) as JSON in the
//! MBQL dialect. A copy bound to another database has to point at that database's
//! tables and fields, and at the copies of any cards it builds on. The walk is a pure
//! structural recursion over [`serde_json::Value`]; every id lookup goes through a
//! [`ReferenceResolver`], which the copy run implements against the store and tests
//! implement with plain maps.
//!
//! Substitutions:
//!
//! | Shape | Replacement |
//! |---|---|
//! | `["field-id", id]` | target field id |
//! | `["field", id, opts]` | target field id, `opts` rewritten |
//! | `"database": _` | target database id |
//! | `"source-table": id` | target table id |
//! | `"source-table": "card__id"` | `"card__<copied id>"` |
//! | `"source-field": id` | target field id |
//! | `"card_id": id` | copied card id |
//! | `"fingerprint": _` | `null` |

use async_trait::async_trait;
use futures_util::future::{FutureExt, LocalBoxFuture};
use serde_json::{Map, Value};
use tracing::debug;

use super::Target;
use crate::errors::{CopyResult, RemapError, RemapResult};

const FIELD_ID: &str = "field-id";
const FIELD: &str = "field";
const CARD_TABLE_PREFIX: &str = "card__";

/// Id lookups needed while rewriting a query for one target
#[async_trait(?Send)]
pub trait ReferenceResolver {
    /// Id of the table with the same schema and name in the target database
    async fn resolve_table(&mut self, table_id: i32, target: &Target) -> CopyResult<i32>;

    /// Id of the field with the same name on the resolved target table
    async fn resolve_field(&mut self, field_id: i32, target: &Target) -> CopyResult<i32>;

    /// Id of the copy of a card used as a query source, copying it first if needed
    async fn resolve_source_card(&mut self, card_id: i32, target: &Target) -> CopyResult<i32>;

    /// Id of the copy of a card referenced from parameter mappings
    fn resolve_card(&self, card_id: i32, target: &Target) -> RemapResult<i32>;
}

/// Rewrite `query` for `target`, returning a fresh value that shares nothing with the input
pub async fn rewrite_query<R>(resolver: &mut R, query: &Value, target: &Target) -> CopyResult<Value>
where
    R: ReferenceResolver + ?Sized,
{
    rewrite_value(resolver, query, target).await
}

fn rewrite_value<'a, R>(
    resolver: &'a mut R,
    value: &'a Value,
    target: &'a Target,
) -> LocalBoxFuture<'a, CopyResult<Value>>
where
    R: ReferenceResolver + ?Sized + 'a,
{
    async move {
        match value {
            Value::Array(items) => rewrite_array(resolver, items, target).await,
            Value::Object(map) => rewrite_object(resolver, map, target).await,
            scalar => Ok(scalar.clone()),
        }
    }
    .boxed_local()
}

async fn rewrite_array<R>(resolver: &mut R, items: &[Value], target: &Target) -> CopyResult<Value>
where
    R: ReferenceResolver + ?Sized,
{
    match items {
        [Value::String(tag), id] if tag == FIELD_ID => {
            if let Some(field_id) = as_id(id) {
                let new_id = resolver.resolve_field(field_id, target).await?;
                debug!("remap field {} -> {}", field_id, new_id);
                return Ok(Value::Array(vec![Value::String(tag.clone()), Value::from(new_id)]));
            }
        }
        [Value::String(tag), id, options @ ..] if tag == FIELD => {
            if let Some(field_id) = as_id(id) {
                let new_id = resolver.resolve_field(field_id, target).await?;
                debug!("remap field {} -> {}", field_id, new_id);
                let mut rewritten = vec![Value::String(tag.clone()), Value::from(new_id)];
                for option in options {
                    rewritten.push(rewrite_value(&mut *resolver, option, target).await?);
                }
                return Ok(Value::Array(rewritten));
            }
        }
        _ => {}
    }

    let mut rewritten = Vec::with_capacity(items.len());
    for item in items {
        rewritten.push(rewrite_value(&mut *resolver, item, target).await?);
    }
    Ok(Value::Array(rewritten))
}

async fn rewrite_object<R>(
    resolver: &mut R,
    map: &Map<String, Value>,
    target: &Target,
) -> CopyResult<Value>
where
    R: ReferenceResolver + ?Sized,
{
    let mut rewritten = Map::with_capacity(map.len());
    for (key, value) in map {
        let new_value = match key.as_str() {
            "database" => {
                debug!("remap database {} -> {}", value, target.id);
                Value::from(target.id)
            }
            "source-table" => rewrite_source_table(resolver, value, target).await?,
            "source-field" => match as_id(value) {
                Some(field_id) => Value::from(resolver.resolve_field(field_id, target).await?),
                None => rewrite_value(&mut *resolver, value, target).await?,
            },
            "card_id" => match value {
                Value::Null => Value::Null,
                other => {
                    let card_id = as_id(other).ok_or_else(|| invalid("card_id", other))?;
                    Value::from(resolver.resolve_card(card_id, target)?)
                }
            },
            "fingerprint" => Value::Null,
            _ => rewrite_value(&mut *resolver, value, target).await?,
        };
        rewritten.insert(key.clone(), new_value);
    }
    Ok(Value::Object(rewritten))
}

async fn rewrite_source_table<R>(resolver: &mut R, value: &Value, target: &Target) -> CopyResult<Value>
where
    R: ReferenceResolver + ?Sized,
{
    match value {
        Value::Null => Ok(Value::Null),
        Value::String(table) => {
            let card_id = parse_card_table(table).ok_or_else(|| invalid("source-table", value))?;
            let new_id = resolver.resolve_source_card(card_id, target).await?;
            debug!("remap table {} -> {}{}", table, CARD_TABLE_PREFIX, new_id);
            Ok(Value::String(format!("{}{}", CARD_TABLE_PREFIX, new_id)))
        }
        other => {
            let table_id = as_id(other).ok_or_else(|| invalid("source-table", other))?;
            let new_id = resolver.resolve_table(table_id, target).await?;
            debug!("remap table {} -> {}", table_id, new_id);
            Ok(Value::from(new_id))
        }
    }
}

/// Card id of a `card__<id>` pseudo-table
pub fn parse_card_table(table: &str) -> Option<i32> {
    table.strip_prefix(CARD_TABLE_PREFIX)?.parse().ok()
}

fn as_id(value: &Value) -> Option<i32> {
    value.as_i64().and_then(|id| i32::try_from(id).ok())
}

fn invalid(key: &'static str, value: &Value) -> RemapError {
    RemapError::InvalidReference {
        key,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::{EntityKind, TranslationMap};
    use crate::errors::CopyError;
    use serde_json::json;
    use std::collections::HashMap;

    /// Resolver over fixed maps: ids are keyed by (source id, target id)
    #[derive(Default)]
    struct FakeResolver {
        tables: HashMap<(i32, i32), i32>,
        fields: HashMap<(i32, i32), i32>,
        cards: Option<TranslationMap>,
        table_calls: usize,
    }

    #[async_trait(?Send)]
    impl ReferenceResolver for FakeResolver {
        async fn resolve_table(&mut self, table_id: i32, target: &Target) -> CopyResult<i32> {
            self.table_calls += 1;
            let id = self.tables.get(&(table_id, target.id)).copied();
            Ok(id.ok_or(RemapError::TableNotFound {
                table_id,
                target: target.id,
            })?)
        }

        async fn resolve_field(&mut self, field_id: i32, target: &Target) -> CopyResult<i32> {
            let id = self.fields.get(&(field_id, target.id)).copied();
            Ok(id.ok_or(RemapError::FieldNotFound {
                field_id,
                target: target.id,
            })?)
        }

        async fn resolve_source_card(&mut self, card_id: i32, target: &Target) -> CopyResult<i32> {
            Ok(self.resolve_card(card_id, target)?)
        }

        fn resolve_card(&self, card_id: i32, target: &Target) -> RemapResult<i32> {
            match &self.cards {
                Some(cards) => cards.get(card_id, target.id),
                None => Err(RemapError::Unmapped {
                    kind: EntityKind::Card,
                    source_id: card_id,
                    target: target.id,
                }),
            }
        }
    }

    fn resolver() -> FakeResolver {
        let mut cards = TranslationMap::new(EntityKind::Card);
        cards.insert(40, 2, 400);
        cards.insert(40, 3, 401);
        FakeResolver {
            tables: HashMap::from([((10, 2), 20), ((10, 3), 30)]),
            fields: HashMap::from([((100, 2), 200), ((100, 3), 300), ((101, 2), 201)]),
            cards: Some(cards),
            table_calls: 0,
        }
    }

    fn run<F: std::future::Future>(future: F) -> F::Output {
        tokio_test::block_on(future)
    }

    #[test]
    fn test_query_without_references_is_unchanged() {
        let query = json!({
            "type": "query",
            "query": {"limit": 10, "order-by": [["asc", 1]], "expressions": {}},
            "parameters": [null, true, 1.5, "text"]
        });
        let mut resolver = resolver();
        let rewritten = run(rewrite_query(&mut resolver, &query, &Target::new(2, "b"))).unwrap();
        assert_eq!(rewritten, query);
        assert_eq!(resolver.table_calls, 0);
    }

    #[test]
    fn test_structured_query_is_rebound() {
        let query = json!({
            "database": 1,
            "type": "query",
            "query": {
                "source-table": 10,
                "filter": ["=", ["field-id", 100], "paid"],
                "breakout": [["field", 101, {"temporal-unit": "month"}]],
                "aggregation": [["sum", ["field-id", 100]]]
            }
        });
        let rewritten = run(rewrite_query(&mut resolver(), &query, &Target::new(2, "b"))).unwrap();
        assert_eq!(
            rewritten,
            json!({
                "database": 2,
                "type": "query",
                "query": {
                    "source-table": 20,
                    "filter": ["=", ["field-id", 200], "paid"],
                    "breakout": [["field", 201, {"temporal-unit": "month"}]],
                    "aggregation": [["sum", ["field-id", 200]]]
                }
            })
        );
    }

    #[test]
    fn test_field_without_options_is_rebound() {
        let query = json!({"query": {"fields": [["field", 101], ["field", "total", null]]}});
        let rewritten = run(rewrite_query(&mut resolver(), &query, &Target::new(2, "b"))).unwrap();
        assert_eq!(
            rewritten,
            json!({"query": {"fields": [["field", 201], ["field", "total", null]]}})
        );
    }

    #[test]
    fn test_targets_are_not_cross_wired() {
        let query = json!({"database": 1, "query": {"source-table": 10}});
        let mut resolver = resolver();
        let first = run(rewrite_query(&mut resolver, &query, &Target::new(2, "b"))).unwrap();
        let second = run(rewrite_query(&mut resolver, &query, &Target::new(3, "c"))).unwrap();
        assert_eq!(first, json!({"database": 2, "query": {"source-table": 20}}));
        assert_eq!(second, json!({"database": 3, "query": {"source-table": 30}}));
    }

    #[test]
    fn test_fingerprints_are_dropped_at_any_depth() {
        let query = json!({
            "fingerprint": {"global": {"distinct-count": 3}},
            "result_metadata": [
                {"name": "total", "fingerprint": {"type": {"type/Number": {"avg": 2.0}}}},
                {"name": "id", "fingerprint": null}
            ]
        });
        let rewritten = run(rewrite_query(&mut resolver(), &query, &Target::new(2, "b"))).unwrap();
        assert_eq!(rewritten["fingerprint"], Value::Null);
        assert_eq!(rewritten["result_metadata"][0]["fingerprint"], Value::Null);
        assert_eq!(rewritten["result_metadata"][0]["name"], "total");
        assert_eq!(rewritten["result_metadata"][1]["fingerprint"], Value::Null);
    }

    #[test]
    fn test_nested_card_source_table() {
        let query = json!({"database": 1, "query": {"source-table": "card__40"}});
        let rewritten = run(rewrite_query(&mut resolver(), &query, &Target::new(3, "c"))).unwrap();
        assert_eq!(rewritten["query"]["source-table"], "card__401");
    }

    #[test]
    fn test_parameter_mapping_card_ids() {
        let mappings = json!([
            {"parameter_id": "abc", "card_id": 40, "target": ["dimension", ["field-id", 100]]},
            {"parameter_id": "def", "card_id": null}
        ]);
        let rewritten = run(rewrite_query(&mut resolver(), &mappings, &Target::new(2, "b"))).unwrap();
        assert_eq!(
            rewritten,
            json!([
                {"parameter_id": "abc", "card_id": 400, "target": ["dimension", ["field-id", 200]]},
                {"parameter_id": "def", "card_id": null}
            ])
        );
    }

    #[test]
    fn test_unresolved_field_is_fatal() {
        let query = json!({"query": {"fields": [["field-id", 999]]}});
        let err = run(rewrite_query(&mut resolver(), &query, &Target::new(2, "b"))).unwrap_err();
        assert!(matches!(
            err,
            CopyError::Remap(RemapError::FieldNotFound {
                field_id: 999,
                target: 2
            })
        ));
    }

    #[test]
    fn test_unmapped_card_is_fatal() {
        let mappings = json!([{"card_id": 41}]);
        let err = run(rewrite_query(&mut resolver(), &mappings, &Target::new(2, "b"))).unwrap_err();
        assert!(err.is_remap_error());
    }

    #[test]
    fn test_malformed_source_table() {
        let query = json!({"source-table": "orders"});
        let err = run(rewrite_query(&mut resolver(), &query, &Target::new(2, "b"))).unwrap_err();
        assert!(matches!(
            err,
            CopyError::Remap(RemapError::InvalidReference {
                key: "source-table",
                ..
            })
        ));
    }

    #[test]
    fn test_parse_card_table() {
        assert_eq!(parse_card_table("card__12"), Some(12));
        assert_eq!(parse_card_table("card__x"), None);
        assert_eq!(parse_card_table("orders"), None);
    }
}
