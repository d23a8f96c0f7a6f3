use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::data::ResourceData;
use crate::error::CoreError;

/// Value type of one attribute.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum AttrType {
    String,
    Int,
    Bool,
    /// Ordered list; order is significant for diffing.
    List { element: Box<AttrType> },
    /// Unordered collection; compared as a set.
    Set { element: Box<AttrType> },
    /// Ordered list of nested objects sharing one schema.
    Block { schema: Schema },
}

impl AttrType {
    pub fn string_list() -> Self {
        Self::List {
            element: Box::new(Self::String),
        }
    }

    pub fn string_set() -> Self {
        Self::Set {
            element: Box::new(Self::String),
        }
    }

    pub fn block(schema: Schema) -> Self {
        Self::Block { schema }
    }

    fn is_collection(&self) -> bool {
        matches!(self, Self::List { .. } | Self::Set { .. } | Self::Block { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AttrMode {
    Required,
    Optional,
    /// Server-issued; the declaration may not set it.
    Computed,
    /// Declared when the user cares, otherwise whatever the server reports.
    OptionalComputed,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Attribute {
    #[serde(rename = "type")]
    pub ty: AttrType,
    pub mode: AttrMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    pub force_new: bool,
    pub sensitive: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub one_of: Option<&'static [&'static str]>,
    #[serde(skip_serializing_if = "str::is_empty")]
    pub description: &'static str,
}

impl Attribute {
    fn new(ty: AttrType, mode: AttrMode) -> Self {
        Self {
            ty,
            mode,
            default: None,
            force_new: false,
            sensitive: false,
            one_of: None,
            description: "",
        }
    }

    pub fn required(ty: AttrType) -> Self {
        Self::new(ty, AttrMode::Required)
    }

    pub fn optional(ty: AttrType) -> Self {
        Self::new(ty, AttrMode::Optional)
    }

    pub fn computed(ty: AttrType) -> Self {
        Self::new(ty, AttrMode::Computed)
    }

    pub fn optional_computed(ty: AttrType) -> Self {
        Self::new(ty, AttrMode::OptionalComputed)
    }

    pub fn with_default(mut self, value: impl Into<Value>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn force_new(mut self) -> Self {
        self.force_new = true;
        self
    }

    pub fn sensitive(mut self) -> Self {
        self.sensitive = true;
        self
    }

    pub fn one_of(mut self, allowed: &'static [&'static str]) -> Self {
        self.one_of = Some(allowed);
        self
    }

    pub fn describe(mut self, description: &'static str) -> Self {
        self.description = description;
        self
    }
}

/// A declared attribute whose value differs from state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AttributeChange {
    pub attribute: String,
    pub before: Value,
    pub after: Value,
    pub force_new: bool,
}

/// Attribute map for one resource kind (or one nested block).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Schema {
    pub attributes: BTreeMap<String, Attribute>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attr(mut self, name: &str, attribute: Attribute) -> Self {
        self.attributes.insert(name.to_string(), attribute);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(name)
    }

    /// Type, presence and allowed-value checks. Runs before any API call.
    pub fn validate(&self, data: &ResourceData) -> Result<(), CoreError> {
        self.validate_map(&data.attributes, "")
    }

    fn validate_map(&self, map: &Map<String, Value>, prefix: &str) -> Result<(), CoreError> {
        for key in map.keys() {
            if !self.attributes.contains_key(key) {
                return Err(CoreError::invalid(
                    format!("{prefix}{key}"),
                    "unsupported argument",
                ));
            }
        }

        for (name, attr) in &self.attributes {
            let path = format!("{prefix}{name}");
            let value = map.get(name).filter(|v| !v.is_null());
            match (attr.mode, value) {
                (AttrMode::Required, None) => {
                    return Err(CoreError::invalid(path, "attribute is required"));
                }
                (AttrMode::Computed, Some(_)) => {
                    return Err(CoreError::invalid(
                        path,
                        "attribute is computed and cannot be set",
                    ));
                }
                (_, Some(v)) => check_value(&attr.ty, attr.one_of, v, &path)?,
                (_, None) => {}
            }
        }
        Ok(())
    }

    /// Fill absent attributes that declare a default, recursing into blocks.
    pub fn apply_defaults(&self, data: &mut ResourceData) {
        apply_defaults_map(self, &mut data.attributes);
    }

    /// Compare a declaration against state over every settable attribute.
    ///
    /// `OptionalComputed` attributes the declaration leaves out never
    /// produce a change.
    pub fn diff(&self, desired: &ResourceData, state: &ResourceData) -> Vec<AttributeChange> {
        self.attributes
            .iter()
            .filter(|(_, attr)| attr.mode != AttrMode::Computed)
            .filter_map(|(name, attr)| {
                let want = desired.get(name);
                if want.is_none() && attr.mode == AttrMode::OptionalComputed {
                    return None;
                }
                let have = state.get(name);
                if values_equal(&attr.ty, want, have) {
                    return None;
                }
                Some(AttributeChange {
                    attribute: name.clone(),
                    before: have.cloned().unwrap_or(Value::Null),
                    after: want.cloned().unwrap_or(Value::Null),
                    force_new: attr.force_new,
                })
            })
            .collect()
    }

    /// True when any settable attribute other than `except` differs.
    pub fn has_changes_except(
        &self,
        desired: &ResourceData,
        state: &ResourceData,
        except: &[&str],
    ) -> bool {
        self.diff(desired, state)
            .iter()
            .any(|c| !except.contains(&c.attribute.as_str()))
    }
}

fn apply_defaults_map(schema: &Schema, map: &mut Map<String, Value>) {
    for (name, attr) in &schema.attributes {
        let present = map.get(name).is_some_and(|v| !v.is_null());
        if !present {
            if let Some(default) = &attr.default {
                map.insert(name.clone(), default.clone());
            }
            continue;
        }
        if let AttrType::Block { schema: nested } = &attr.ty {
            if let Some(Value::Array(items)) = map.get_mut(name) {
                for item in items.iter_mut() {
                    if let Value::Object(obj) = item {
                        apply_defaults_map(nested, obj);
                    }
                }
            }
        }
    }
}

fn check_value(
    ty: &AttrType,
    one_of: Option<&'static [&'static str]>,
    value: &Value,
    path: &str,
) -> Result<(), CoreError> {
    match ty {
        AttrType::String => {
            let s = value
                .as_str()
                .ok_or_else(|| CoreError::invalid(path, "expected a string"))?;
            if let Some(allowed) = one_of {
                if !allowed.contains(&s) {
                    return Err(CoreError::invalid(
                        path,
                        format!("expected one of [{}], got \"{s}\"", allowed.join(", ")),
                    ));
                }
            }
            Ok(())
        }
        AttrType::Int => {
            if value.is_i64() || value.is_u64() {
                Ok(())
            } else {
                Err(CoreError::invalid(path, "expected an integer"))
            }
        }
        AttrType::Bool => {
            if value.is_boolean() {
                Ok(())
            } else {
                Err(CoreError::invalid(path, "expected a boolean"))
            }
        }
        AttrType::List { element } | AttrType::Set { element } => {
            let items = value
                .as_array()
                .ok_or_else(|| CoreError::invalid(path, "expected a list"))?;
            for (i, item) in items.iter().enumerate() {
                check_value(element, one_of, item, &format!("{path}.{i}"))?;
            }
            Ok(())
        }
        AttrType::Block { schema } => {
            let items = value
                .as_array()
                .ok_or_else(|| CoreError::invalid(path, "expected a list of blocks"))?;
            for (i, item) in items.iter().enumerate() {
                let obj = item
                    .as_object()
                    .ok_or_else(|| CoreError::invalid(format!("{path}.{i}"), "expected a block"))?;
                schema.validate_map(obj, &format!("{path}.{i}."))?;
            }
            Ok(())
        }
    }
}

fn values_equal(ty: &AttrType, a: Option<&Value>, b: Option<&Value>) -> bool {
    let a = a.filter(|v| !v.is_null());
    let b = b.filter(|v| !v.is_null());

    if ty.is_collection() {
        let empty = Vec::new();
        let left = a.and_then(Value::as_array).unwrap_or(&empty);
        let right = b.and_then(Value::as_array).unwrap_or(&empty);
        return match ty {
            AttrType::Set { .. } => {
                let left: BTreeSet<String> = left.iter().map(Value::to_string).collect();
                let right: BTreeSet<String> = right.iter().map(Value::to_string).collect();
                left == right
            }
            AttrType::List { element } => {
                left.len() == right.len()
                    && left
                        .iter()
                        .zip(right)
                        .all(|(l, r)| values_equal(element, Some(l), Some(r)))
            }
            AttrType::Block { schema } => {
                left.len() == right.len()
                    && left.iter().zip(right).all(|(l, r)| {
                        match (l.as_object(), r.as_object()) {
                            (Some(l), Some(r)) => blocks_equal(schema, l, r),
                            _ => l == r,
                        }
                    })
            }
            _ => unreachable!("is_collection covers list, set and block"),
        };
    }

    a == b
}

fn blocks_equal(schema: &Schema, desired: &Map<String, Value>, state: &Map<String, Value>) -> bool {
    schema
        .attributes
        .iter()
        .filter(|(_, attr)| attr.mode != AttrMode::Computed)
        .all(|(name, attr)| {
            let want = desired.get(name).filter(|v| !v.is_null());
            if want.is_none() && attr.mode == AttrMode::OptionalComputed {
                return true;
            }
            values_equal(&attr.ty, want, state.get(name))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn app_schema() -> Schema {
        Schema::new()
            .attr("label", Attribute::required(AttrType::String))
            .attr(
                "status",
                Attribute::optional(AttrType::String)
                    .with_default("ACTIVE")
                    .one_of(&["ACTIVE", "INACTIVE"]),
            )
            .attr("groups", Attribute::optional(AttrType::string_set()))
            .attr("sign_on_mode", Attribute::computed(AttrType::String))
            .attr("logo_url", Attribute::optional_computed(AttrType::String))
    }

    fn data(value: Value) -> ResourceData {
        let Value::Object(map) = value else {
            panic!("expected an object")
        };
        ResourceData::from_attributes(map)
    }

    #[test]
    fn missing_required_attribute_is_rejected() {
        let err = app_schema().validate(&data(json!({}))).unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid value for \"label\": attribute is required"
        );
    }

    #[test]
    fn computed_attribute_cannot_be_declared() {
        let err = app_schema()
            .validate(&data(json!({"label": "x", "sign_on_mode": "SAML_2_0"})))
            .unwrap_err();
        assert!(err.to_string().contains("computed"));
    }

    #[test]
    fn one_of_violation_names_allowed_values() {
        let err = app_schema()
            .validate(&data(json!({"label": "x", "status": "STAGED"})))
            .unwrap_err();
        assert!(err.to_string().contains("ACTIVE, INACTIVE"));
    }

    #[test]
    fn unknown_attribute_is_rejected() {
        let err = app_schema()
            .validate(&data(json!({"label": "x", "bogus": 1})))
            .unwrap_err();
        assert!(err.to_string().contains("unsupported argument"));
    }

    #[test]
    fn defaults_fill_absent_attributes() {
        let mut d = data(json!({"label": "x"}));
        app_schema().apply_defaults(&mut d);
        assert_eq!(d.get_str("status"), Some("ACTIVE"));
    }

    #[test]
    fn sets_compare_without_order() {
        let desired = data(json!({"label": "x", "status": "ACTIVE", "groups": ["a", "b"]}));
        let state = data(json!({"label": "x", "status": "ACTIVE", "groups": ["b", "a"]}));
        assert!(app_schema().diff(&desired, &state).is_empty());
    }

    #[test]
    fn undeclared_optional_computed_is_not_drift() {
        let desired = data(json!({"label": "x", "status": "ACTIVE"}));
        let state = data(json!({
            "label": "x",
            "status": "ACTIVE",
            "logo_url": "https://cdn/logo.png",
            "sign_on_mode": "BASIC_AUTH"
        }));
        assert!(app_schema().diff(&desired, &state).is_empty());
    }

    #[test]
    fn empty_list_equals_absent() {
        let desired = data(json!({"label": "x", "status": "ACTIVE", "groups": []}));
        let state = data(json!({"label": "x", "status": "ACTIVE"}));
        assert!(app_schema().diff(&desired, &state).is_empty());
    }

    #[test]
    fn changes_except_ignores_listed_attributes() {
        let schema = app_schema();
        let desired = data(json!({"label": "x", "status": "INACTIVE"}));
        let state = data(json!({"label": "x", "status": "ACTIVE"}));
        assert!(!schema.has_changes_except(&desired, &state, &["status"]));

        let desired = data(json!({"label": "y", "status": "INACTIVE"}));
        assert!(schema.has_changes_except(&desired, &state, &["status"]));
    }

    #[test]
    fn nested_blocks_validate_and_diff() {
        let rule = Schema::new()
            .attr("name", Attribute::required(AttrType::String))
            .attr("priority", Attribute::optional_computed(AttrType::Int));
        let schema = Schema::new().attr("rules", Attribute::required(AttrType::block(rule)));

        let err = schema
            .validate(&data(json!({"rules": [{"priority": 1}]})))
            .unwrap_err();
        assert!(err.to_string().contains("rules.0.name"));

        let desired = data(json!({"rules": [{"name": "a"}]}));
        let state = data(json!({"rules": [{"name": "a", "priority": 4}]}));
        assert!(schema.diff(&desired, &state).is_empty());
    }
}
