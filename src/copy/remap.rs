//! Per-entity row rewriting
//!
//! Each function takes a source row and returns an insertable row for one target: the
//! primary key is left unset so the store assigns a fresh one, and every foreign key goes
//! through the matching [`TranslationMap`]. Query JSON is rewritten beforehand by
//! [`super::query`] and passed in.

use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use sea_orm::ActiveValue::{NotSet, Set};
use serde_json::Value;

use super::location::{depth, remap_location};
use super::{Target, TranslationMap};
use crate::database::entities::{card, card_series, collection, dashboard, dashboard_card, permission};
use crate::errors::{RemapError, RemapResult};

static PERMISSION_OBJECT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/collection/(\d+)/(.*)$").expect("permission object pattern is valid")
});

/// How a copied card's `collection_id` is bound
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectionBinding {
    /// The collection must have been copied to the target
    Required,
    /// Use the copied collection when there is one, else keep the original
    IfMapped,
    /// Use the copied collection when there is one, else the target's copy of this collection
    Fallback(i32),
}

/// Collapse runs of `.`, `_`, `(` and `)` into a single `_`
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut in_separator = false;
    for c in name.chars() {
        if matches!(c, '.' | '_' | '(' | ')') {
            if !in_separator {
                slug.push('_');
            }
            in_separator = true;
        } else {
            slug.push(c);
            in_separator = false;
        }
    }
    slug
}

pub fn remap_collection(
    collection: &collection::Model,
    target: &Target,
    collections: &TranslationMap,
    rename_depth: usize,
) -> RemapResult<collection::ActiveModel> {
    let location = remap_location(&collection.location, target.id, collections)?;

    let mut name = collection.name.clone();
    let mut description = collection.description.clone();
    if depth(&location) == rename_depth {
        let old_slug = slugify(&collection.name);
        let new_slug = slugify(&target.label);
        description = description.map(|text| {
            if old_slug.is_empty() {
                text
            } else {
                text.replace(&old_slug, &new_slug)
            }
        });
        name = target.label.clone();
    }

    Ok(collection::ActiveModel {
        id: NotSet,
        name: Set(name),
        description: Set(description),
        location: Set(location),
        color: Set(collection.color.clone()),
        archived: Set(collection.archived),
    })
}

pub fn remap_card(
    card: &card::Model,
    target: &Target,
    dataset_query: &Value,
    table_id: Option<i32>,
    collections: &TranslationMap,
    binding: CollectionBinding,
) -> RemapResult<card::ActiveModel> {
    let collection_id = match (card.collection_id, binding) {
        (Some(id), CollectionBinding::Required) => Some(collections.get(id, target.id)?),
        (Some(id), CollectionBinding::IfMapped) => {
            Some(collections.lookup(id, target.id).unwrap_or(id))
        }
        (id, CollectionBinding::Fallback(home)) => {
            match id.and_then(|id| collections.lookup(id, target.id)) {
                Some(copied) => Some(copied),
                None => Some(collections.get(home, target.id)?),
            }
        }
        (None, _) => None,
    };

    let now = Utc::now();
    Ok(card::ActiveModel {
        id: NotSet,
        name: Set(card.name.clone()),
        description: Set(card.description.clone()),
        collection_id: Set(collection_id),
        database_id: Set(target.id),
        table_id: Set(table_id),
        query_type: Set(card.query_type.clone()),
        dataset_query: Set(dataset_query.to_string()),
        display: Set(card.display.clone()),
        visualization_settings: Set(card.visualization_settings.clone()),
        archived: Set(card.archived),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

pub fn remap_dashboard(
    dashboard: &dashboard::Model,
    target: &Target,
    collections: &TranslationMap,
) -> RemapResult<dashboard::ActiveModel> {
    let collection_id = dashboard
        .collection_id
        .map(|id| collections.get(id, target.id))
        .transpose()?;

    let now = Utc::now();
    Ok(dashboard::ActiveModel {
        id: NotSet,
        name: Set(dashboard.name.clone()),
        description: Set(dashboard.description.clone()),
        collection_id: Set(collection_id),
        parameters: Set(dashboard.parameters.clone()),
        archived: Set(dashboard.archived),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

pub fn remap_dashboard_card(
    dashboard_card: &dashboard_card::Model,
    target: &Target,
    parameter_mappings: &Value,
    cards: &TranslationMap,
    dashboards: &TranslationMap,
) -> RemapResult<dashboard_card::ActiveModel> {
    let card_id = dashboard_card
        .card_id
        .map(|id| cards.get(id, target.id))
        .transpose()?;
    let dashboard_id = dashboards.get(dashboard_card.dashboard_id, target.id)?;

    let now = Utc::now();
    Ok(dashboard_card::ActiveModel {
        id: NotSet,
        dashboard_id: Set(dashboard_id),
        card_id: Set(card_id),
        parameter_mappings: Set(parameter_mappings.to_string()),
        visualization_settings: Set(dashboard_card.visualization_settings.clone()),
        size_x: Set(dashboard_card.size_x),
        size_y: Set(dashboard_card.size_y),
        row: Set(dashboard_card.row),
        col: Set(dashboard_card.col),
        created_at: Set(now),
        updated_at: Set(now),
    })
}

pub fn remap_card_series(
    series: &card_series::Model,
    target: &Target,
    cards: &TranslationMap,
    dashboard_cards: &TranslationMap,
) -> RemapResult<card_series::ActiveModel> {
    Ok(card_series::ActiveModel {
        id: NotSet,
        dashboardcard_id: Set(dashboard_cards.get(series.dashboardcard_id, target.id)?),
        card_id: Set(cards.get(series.card_id, target.id)?),
        position: Set(series.position),
    })
}

/// A collection permission object split around its collection id
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionObject {
    pub collection_id: i32,
    pub remainder: String,
}

impl PermissionObject {
    pub fn parse(object: &str) -> Option<Self> {
        let captures = PERMISSION_OBJECT.captures(object)?;
        Some(Self {
            collection_id: captures[1].parse().ok()?,
            remainder: captures[2].to_string(),
        })
    }

    pub fn with_collection(&self, collection_id: i32) -> String {
        format!("/collection/{}/{}", collection_id, self.remainder)
    }
}

/// One new permission per target the referenced collection was copied to
pub fn remap_permission(
    permission: &permission::Model,
    collections: &TranslationMap,
) -> RemapResult<Vec<permission::ActiveModel>> {
    let object = PermissionObject::parse(&permission.object)
        .ok_or_else(|| RemapError::InvalidPermissionObject(permission.object.clone()))?;

    Ok(collections
        .copies_of(object.collection_id)
        .map(|(_, copied_id)| permission::ActiveModel {
            id: NotSet,
            object: Set(object.with_collection(copied_id)),
            group_id: Set(permission.group_id),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::EntityKind;
    use sea_orm::ActiveValue;
    use serde_json::json;

    fn set<T: Into<sea_orm::Value>>(value: ActiveValue<T>) -> T {
        match value {
            ActiveValue::Set(v) => v,
            _ => panic!("value not set"),
        }
    }

    fn collection(id: i32, name: &str, location: &str, description: Option<&str>) -> collection::Model {
        collection::Model {
            id,
            name: name.to_string(),
            description: description.map(str::to_string),
            location: location.to_string(),
            color: None,
            archived: false,
        }
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("staging (eu).v2"), "staging _eu_v2");
        assert_eq!(slugify("a__b"), "a_b");
        assert_eq!(slugify("plain"), "plain");
    }

    #[test]
    fn test_top_level_copy_is_renamed() {
        let target = Target::new(3, "prod_eu");
        let collections = TranslationMap::new(EntityKind::Collection);
        let source = collection(
            5,
            "staging",
            "/1/",
            Some("Dashboards for staging. See staging_reports."),
        );

        let copy = remap_collection(&source, &target, &collections, 1).unwrap();
        assert_eq!(set(copy.name), "prod_eu");
        assert_eq!(set(copy.location), "/1/");
        assert_eq!(
            set(copy.description),
            Some("Dashboards for prod_eu. See prod_eu_reports.".to_string())
        );
        assert!(matches!(copy.id, ActiveValue::NotSet));
    }

    #[test]
    fn test_nested_copy_keeps_name() {
        let target = Target::new(3, "prod");
        let mut collections = TranslationMap::new(EntityKind::Collection);
        collections.insert(5, 3, 50);
        let source = collection(6, "Finance", "/1/5/", None);

        let copy = remap_collection(&source, &target, &collections, 1).unwrap();
        assert_eq!(set(copy.name), "Finance");
        assert_eq!(set(copy.location), "/1/50/");
    }

    #[test]
    fn test_card_binding() {
        let now = Utc::now();
        let card = card::Model {
            id: 9,
            name: "Revenue".to_string(),
            description: None,
            collection_id: Some(5),
            database_id: 1,
            table_id: Some(10),
            query_type: Some("query".to_string()),
            dataset_query: "{}".to_string(),
            display: "line".to_string(),
            visualization_settings: "{}".to_string(),
            archived: false,
            created_at: now,
            updated_at: now,
        };
        let target = Target::new(3, "prod");
        let empty = TranslationMap::new(EntityKind::Collection);

        let err = remap_card(&card, &target, &json!({}), Some(20), &empty, CollectionBinding::Required)
            .unwrap_err();
        assert!(matches!(err, RemapError::Unmapped { source_id: 5, .. }));

        let copy =
            remap_card(&card, &target, &json!({"database": 3}), Some(20), &empty, CollectionBinding::IfMapped)
                .unwrap();
        assert_eq!(set(copy.collection_id), Some(5));
        assert_eq!(set(copy.database_id), 3);
        assert_eq!(set(copy.table_id), Some(20));
        assert_eq!(set(copy.dataset_query), r#"{"database":3}"#);

        let mut collections = TranslationMap::new(EntityKind::Collection);
        collections.insert(2, 3, 42);
        let copy = remap_card(&card, &target, &json!({}), None, &collections, CollectionBinding::Fallback(2))
            .unwrap();
        assert_eq!(set(copy.collection_id), Some(42));

        collections.insert(5, 3, 55);
        let copy = remap_card(&card, &target, &json!({}), None, &collections, CollectionBinding::Fallback(2))
            .unwrap();
        assert_eq!(set(copy.collection_id), Some(55));

        let err = remap_card(&card, &target, &json!({}), None, &empty, CollectionBinding::Fallback(2))
            .unwrap_err();
        assert!(matches!(err, RemapError::Unmapped { source_id: 2, .. }));
    }

    #[test]
    fn test_permission_fan_out() {
        let mut collections = TranslationMap::new(EntityKind::Collection);
        collections.insert(5, 2, 50);
        collections.insert(5, 3, 60);
        let permission = permission::Model {
            id: 1,
            object: "/collection/5/read/".to_string(),
            group_id: 4,
        };

        let copies = remap_permission(&permission, &collections).unwrap();
        let objects: Vec<String> = copies.into_iter().map(|p| set(p.object)).collect();
        assert_eq!(objects, vec!["/collection/50/read/", "/collection/60/read/"]);
    }

    #[test]
    fn test_permission_object_parsing() {
        assert_eq!(
            PermissionObject::parse("/collection/12/"),
            Some(PermissionObject {
                collection_id: 12,
                remainder: String::new()
            })
        );
        assert_eq!(PermissionObject::parse("/db/1/schema/"), None);

        let permission = permission::Model {
            id: 1,
            object: "/db/1/".to_string(),
            group_id: 1,
        };
        let collections = TranslationMap::new(EntityKind::Collection);
        assert!(remap_permission(&permission, &collections).is_err());
    }
}
