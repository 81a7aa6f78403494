//! Query planner for child listings
//!
//! Translates the listing DSL (keywords, filters, mode, ordering, paging)
//! into a [`ListPlan`]. Unknown filter keys and malformed values are
//! rejected here, before any SQL is rendered.

use crate::predicate::{
    FilterMode, FixedField, ListPlan, OrderField, Predicate, RangeField, Scope,
};
use depot_core::types::ArtifactRecord;
use depot_core::{Error, Result};
use serde_json::Value as JsonValue;

fn fixed_field(key: &str) -> Option<FixedField> {
    match key {
        "type" => Some(FixedField::Type),
        "alias" => Some(FixedField::Alias),
        "workspace" => Some(FixedField::Workspace),
        "parent_id" => Some(FixedField::ParentId),
        "created_by" => Some(FixedField::CreatedBy),
        _ => None,
    }
}

fn range_field(key: &str) -> Option<RangeField> {
    match key {
        "created_at" => Some(RangeField::CreatedAt),
        "last_modified" => Some(RangeField::LastModified),
        "download_count" => Some(RangeField::DownloadCount),
        "view_count" => Some(RangeField::ViewCount),
        _ => None,
    }
}

fn range_bound(value: &JsonValue) -> Result<Option<f64>> {
    match value {
        JsonValue::Null => Ok(None),
        JsonValue::Number(n) => Ok(n.as_f64()),
        _ => Err(Error::Validation(format!(
            "Range bound must be a number or null, got: {}",
            value
        ))),
    }
}

/// JSON keys are embedded in extraction paths after quoting; refuse the one
/// character the quoting cannot carry.
fn validate_json_key(key: &str) -> Result<()> {
    if key.contains('"') {
        return Err(Error::Validation(format!("Invalid filter key: {}", key)));
    }
    Ok(())
}

fn manifest_conditions(value: &JsonValue, conditions: &mut Vec<Predicate>) -> Result<()> {
    let entries = value.as_object().ok_or_else(|| {
        Error::Validation("The `manifest` filter must be an object of key-value pairs".into())
    })?;
    for (key, value) in entries {
        validate_json_key(key)?;
        let value = value.as_str().ok_or_else(|| {
            Error::Validation(format!("Manifest filter value for '{}' must be a string", key))
        })?;
        if value.contains('*') {
            conditions.push(Predicate::ManifestLike {
                key: key.clone(),
                pattern: value.replace('*', "%"),
            });
        } else {
            conditions.push(Predicate::ManifestEq {
                key: key.clone(),
                value: value.to_string(),
            });
        }
    }
    Ok(())
}

fn config_conditions(value: &JsonValue, conditions: &mut Vec<Predicate>) -> Result<()> {
    let entries = value.as_object().ok_or_else(|| {
        Error::Validation("The `config` filter must be an object".into())
    })?;
    for (key, value) in entries {
        if key != "permissions" {
            return Err(Error::Validation(format!(
                "Invalid filter key: config.{}",
                key
            )));
        }
        let grants = value.as_object().ok_or_else(|| {
            Error::Validation("The `config.permissions` filter must be an object".into())
        })?;
        for (user_id, permission) in grants {
            validate_json_key(user_id)?;
            let permission = permission.as_str().ok_or_else(|| {
                Error::Validation(format!(
                    "Permission filter value for '{}' must be a string",
                    user_id
                ))
            })?;
            conditions.push(Predicate::PermissionEq {
                user_id: user_id.clone(),
                value: permission.to_string(),
            });
        }
    }
    Ok(())
}

/// Parse `order_by`: a field name with an optional trailing `<` for
/// ascending order. Without `order_by` the listing is by id, ascending.
fn parse_order(order_by: Option<&str>) -> Result<(OrderField, bool)> {
    let order_by = match order_by {
        None => return Ok((OrderField::Id, true)),
        Some(o) => o,
    };
    let ascending = order_by.contains('<');
    let name = order_by.split('<').next().unwrap_or("id");
    let field = OrderField::parse(name)
        .ok_or_else(|| Error::Validation(format!("Invalid order_by field: {}", name)))?;
    Ok((field, ascending))
}

/// Plan a child listing. `parent` is the resolved parent artifact (already
/// permission-checked), or `None` for the workspace's top level.
#[allow(clippy::too_many_arguments)]
pub fn plan_children(
    parent: Option<&ArtifactRecord>,
    workspace: &str,
    keywords: Option<&[String]>,
    filters: Option<&JsonValue>,
    mode: FilterMode,
    order_by: Option<&str>,
    offset: i64,
    limit: i64,
) -> Result<ListPlan> {
    let scope = match parent {
        Some(parent) => Scope::Children(parent.id.clone()),
        None => Scope::TopLevel(workspace.to_string()),
    };

    let mut stage = false;
    let mut conditions = Vec::new();

    if let Some(keywords) = keywords {
        for keyword in keywords {
            conditions.push(Predicate::KeywordLike(format!("%{}%", keyword)));
        }
    }

    if let Some(filters) = filters {
        let filters = filters
            .as_object()
            .ok_or_else(|| Error::Validation("Filters must be an object".into()))?;
        for (key, value) in filters {
            if key == "stage" {
                stage = value.as_bool().ok_or_else(|| {
                    Error::Validation("The `stage` filter must be a boolean".into())
                })?;
                continue;
            }
            if key == "manifest" {
                manifest_conditions(value, &mut conditions)?;
                continue;
            }
            if key == "config" {
                config_conditions(value, &mut conditions)?;
                continue;
            }
            if let Some(field) = fixed_field(key) {
                let value = value.as_str().ok_or_else(|| {
                    Error::Validation(format!("Filter value for '{}' must be a string", key))
                })?;
                conditions.push(Predicate::FieldEq(field, value.to_string()));
                continue;
            }
            if let Some(field) = range_field(key) {
                match value {
                    JsonValue::Number(n) => {
                        let v = n.as_f64().ok_or_else(|| {
                            Error::Validation(format!("Invalid number for '{}'", key))
                        })?;
                        conditions.push(Predicate::RangeGe(field, v));
                    }
                    JsonValue::Array(bounds) if bounds.len() == 2 => {
                        conditions.push(Predicate::RangeBetween(
                            field,
                            range_bound(&bounds[0])?,
                            range_bound(&bounds[1])?,
                        ));
                    }
                    _ => {
                        return Err(Error::Validation(format!(
                            "Filter value for '{}' must be a number or a [lo, hi] pair",
                            key
                        )))
                    }
                }
                continue;
            }
            return Err(Error::Validation(format!("Invalid filter key: {}", key)));
        }
    }

    Ok(ListPlan {
        scope,
        stage,
        conditions,
        mode,
        order: parse_order(order_by)?,
        offset,
        limit,
    })
}
