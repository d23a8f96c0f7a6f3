//! `okta_user_schema_property` and `okta_group_schema_property`.
//!
//! A profile schema is a single document; every custom attribute write is
//! a partial update of that document. Writes to one schema are serialized
//! through the arbiter, retried while the platform finishes cleaning up a
//! previously deleted attribute of the same name, and only count as done
//! once a re-read shows the posted shape.

use oktaform_client::ApiRequest;
use oktaform_core::models::schema_property::{
    ArrayItems, AttributePermission, EnumChoice, Master, ProfileSchema, SchemaAttribute,
};
use oktaform_core::{AttrType, Attribute, ResourceData, Schema, api_paths, shape};
use serde_json::{Value, json};

use crate::arbiter;
use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};
use crate::retry;

const INDEX: &str = "index";
const TITLE: &str = "title";
const TYPE: &str = "type";
const DESCRIPTION: &str = "description";
const REQUIRED: &str = "required";
const MIN_LENGTH: &str = "min_length";
const MAX_LENGTH: &str = "max_length";
const ENUM: &str = "enum";
const ONE_OF: &str = "one_of";
const PERMISSIONS: &str = "permissions";
const MASTER: &str = "master";
const SCOPE: &str = "scope";
const UNIQUE: &str = "unique";
const ARRAY_TYPE: &str = "array_type";
const EXTERNAL_NAME: &str = "external_name";
const PATTERN: &str = "pattern";
const USER_TYPE: &str = "user_type";

const DEFAULT_USER_TYPE: &str = "default";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    User,
    Group,
}

pub struct SchemaProperty {
    target: Target,
    schema: Schema,
}

impl SchemaProperty {
    pub fn user() -> Self {
        let schema = base_schema().attr(
            USER_TYPE,
            Attribute::optional(AttrType::String)
                .with_default(DEFAULT_USER_TYPE)
                .force_new()
                .describe("User type ID whose schema holds the attribute"),
        );
        Self {
            target: Target::User,
            schema,
        }
    }

    pub fn group() -> Self {
        Self {
            target: Target::Group,
            schema: base_schema(),
        }
    }

    fn schema_path(&self, data: &ResourceData) -> String {
        match self.target {
            Target::User => {
                api_paths::user_schema(data.get_str(USER_TYPE).unwrap_or(DEFAULT_USER_TYPE))
            }
            Target::Group => api_paths::GROUP_SCHEMA.to_string(),
        }
    }

    /// Arbiter key: one writer per schema document.
    fn parent_key(&self, data: &ResourceData) -> String {
        arbiter::parent_key("schema", &self.schema_path(data))
    }

    fn attribute_wire(&self, desired: &ResourceData) -> Result<SchemaAttribute, ProvisionerError> {
        let text = |key| desired.get_str(key).map(String::from);
        let kind = desired.require_str(TYPE)?.to_string();
        let enum_values = desired
            .get(ENUM)
            .and_then(Value::as_array)
            .filter(|v| !v.is_empty())
            .cloned();
        let one_of = desired
            .get(ONE_OF)
            .and_then(Value::as_array)
            .filter(|v| !v.is_empty())
            .map(|choices| {
                choices
                    .iter()
                    .map(|c| EnumChoice {
                        value: c.get("const").cloned().unwrap_or(Value::Null),
                        title: c
                            .get("title")
                            .and_then(Value::as_str)
                            .unwrap_or_default()
                            .to_string(),
                    })
                    .collect()
            });
        let items = (kind == "array").then(|| ArrayItems {
            kind: text(ARRAY_TYPE).unwrap_or_else(|| "string".to_string()),
        });
        Ok(SchemaAttribute {
            title: desired.require_str(TITLE)?.to_string(),
            kind,
            description: text(DESCRIPTION),
            required: desired.get_bool(REQUIRED),
            min_length: desired.get_i64(MIN_LENGTH),
            max_length: desired.get_i64(MAX_LENGTH),
            enum_values,
            one_of,
            permissions: text(PERMISSIONS)
                .map(|action| vec![AttributePermission::self_principal(&action)])
                .unwrap_or_default(),
            scope: text(SCOPE),
            master: text(MASTER).map(|kind| Master { kind }),
            unique: text(UNIQUE),
            items,
            external_name: text(EXTERNAL_NAME),
            pattern: text(PATTERN),
        })
    }

    fn observed(&self, index: &str, attr: &SchemaAttribute, prior: &ResourceData) -> ResourceData {
        let mut data = ResourceData::with_id(index);
        data.set(INDEX, index);
        data.set(TITLE, attr.title.clone());
        data.set(TYPE, attr.kind.clone());
        data.set_opt(DESCRIPTION, attr.description.clone());
        data.set_opt(REQUIRED, attr.required);
        data.set_opt(MIN_LENGTH, attr.min_length);
        data.set_opt(MAX_LENGTH, attr.max_length);
        data.set_opt(ENUM, attr.enum_values.clone().map(Value::Array));
        data.set_opt(
            ONE_OF,
            attr.one_of.as_ref().map(|choices| {
                choices
                    .iter()
                    .map(|c| json!({"const": c.value, "title": c.title}))
                    .collect::<Vec<_>>()
            }),
        );
        data.set_opt(
            PERMISSIONS,
            attr.permissions
                .iter()
                .find(|p| p.principal == "SELF")
                .map(|p| p.action.clone()),
        );
        data.set_opt(SCOPE, attr.scope.clone());
        data.set_opt(MASTER, attr.master.as_ref().map(|m| m.kind.clone()));
        data.set_opt(UNIQUE, attr.unique.clone());
        data.set_opt(ARRAY_TYPE, attr.items.as_ref().map(|i| i.kind.clone()));
        data.set_opt(EXTERNAL_NAME, attr.external_name.clone());
        data.set_opt(PATTERN, attr.pattern.clone());
        if self.target == Target::User {
            data.set(USER_TYPE, prior.get_str(USER_TYPE).unwrap_or(DEFAULT_USER_TYPE));
        }
        data
    }

    /// Fetch the schema and pick out `index`.
    async fn fetch(
        &self,
        ctx: &OpContext,
        path: &str,
        index: &str,
    ) -> Result<Option<SchemaAttribute>, ProvisionerError> {
        let Some(doc) = ctx.get_opt::<ProfileSchema>(path).await? else {
            return Ok(None);
        };
        doc.custom_property(index)
            .map(|v| serde_json::from_value(v.clone()))
            .transpose()
            .map_err(ProvisionerError::from)
    }

    /// One write attempt: post the partial schema, then re-read and compare.
    async fn write_once(
        &self,
        ctx: &OpContext,
        path: &str,
        index: &str,
        body: &Value,
    ) -> Result<SchemaAttribute, ProvisionerError> {
        let doc = ProfileSchema::single_property(index, body.clone());
        ctx.send(ApiRequest::post(path).body(serde_json::to_value(&doc)?))
            .await?;
        match self.fetch(ctx, path, index).await? {
            Some(observed) if shape::is_subset(body, &serde_json::to_value(&observed)?) => {
                Ok(observed)
            }
            _ => Err(ProvisionerError::Transient(format!(
                "schema attribute \"{index}\" does not yet read back as written"
            ))),
        }
    }

    async fn write(
        &self,
        ctx: &OpContext,
        desired: &ResourceData,
    ) -> Result<ResourceData, ProvisionerError> {
        let index = desired.require_str(INDEX)?;
        let path = self.schema_path(desired);
        let body = serde_json::to_value(self.attribute_wire(desired)?)?;
        let policy = ctx.settings().schema_retry;

        let observed = ctx
            .serialized(
                &self.parent_key(desired),
                ctx.retry(
                    &policy,
                    || self.write_once(ctx, &path, index, &body),
                    retry::transient,
                ),
            )
            .await?;
        tracing::info!(schema = %path, index = %index, "schema attribute written");
        Ok(self.observed(index, &observed, desired))
    }
}

fn base_schema() -> Schema {
    let text = || Attribute::optional(AttrType::String);
    let choice = Schema::new()
        .attr("const", Attribute::required(AttrType::String))
        .attr("title", Attribute::required(AttrType::String));
    Schema::new()
        .attr(
            INDEX,
            Attribute::required(AttrType::String)
                .force_new()
                .describe("Attribute name in the schema"),
        )
        .attr(TITLE, Attribute::required(AttrType::String))
        .attr(
            TYPE,
            Attribute::required(AttrType::String)
                .force_new()
                .one_of(&["string", "boolean", "number", "integer", "array"]),
        )
        .attr(DESCRIPTION, text())
        .attr(REQUIRED, Attribute::optional_computed(AttrType::Bool))
        .attr(MIN_LENGTH, Attribute::optional(AttrType::Int))
        .attr(MAX_LENGTH, Attribute::optional(AttrType::Int))
        .attr(ENUM, Attribute::optional(AttrType::string_list()))
        .attr(ONE_OF, Attribute::optional(AttrType::block(choice)))
        .attr(
            PERMISSIONS,
            Attribute::optional(AttrType::String)
                .with_default("READ_ONLY")
                .one_of(&["READ_ONLY", "READ_WRITE", "HIDE"]),
        )
        .attr(
            MASTER,
            Attribute::optional_computed(AttrType::String).one_of(&["PROFILE_MASTER", "OKTA"]),
        )
        .attr(
            SCOPE,
            Attribute::optional_computed(AttrType::String).one_of(&["SELF", "NONE"]),
        )
        .attr(
            UNIQUE,
            Attribute::optional_computed(AttrType::String)
                .one_of(&["UNIQUE_VALIDATED", "NOT_UNIQUE"]),
        )
        .attr(
            ARRAY_TYPE,
            Attribute::optional(AttrType::String)
                .one_of(&["string", "number", "integer", "reference"]),
        )
        .attr(EXTERNAL_NAME, text())
        .attr(PATTERN, text())
}

impl Resource for SchemaProperty {
    fn type_name(&self) -> &'static str {
        match self.target {
            Target::User => "okta_user_schema_property",
            Target::Group => "okta_group_schema_property",
        }
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn validate(&self, desired: &ResourceData) -> Result<(), ProvisionerError> {
        let kind = desired.get_str(TYPE).unwrap_or_default();
        if desired.has(ARRAY_TYPE) && kind != "array" {
            return Err(ProvisionerError::PreconditionViolated(format!(
                "\"{ARRAY_TYPE}\" is only valid when type is \"array\""
            )));
        }
        if (desired.has(MIN_LENGTH) || desired.has(MAX_LENGTH)) && kind != "string" {
            return Err(ProvisionerError::PreconditionViolated(
                "min_length/max_length are only valid for string attributes".into(),
            ));
        }
        if let (Some(min), Some(max)) = (desired.get_i64(MIN_LENGTH), desired.get_i64(MAX_LENGTH)) {
            if min > max {
                return Err(ProvisionerError::PreconditionViolated(format!(
                    "min_length {min} exceeds max_length {max}"
                )));
            }
        }
        Ok(())
    }

    fn import(&self, id: &str) -> Result<ResourceData, ProvisionerError> {
        let mut data = ResourceData::with_id(id);
        data.set(INDEX, id);
        Ok(data)
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(self.write(ctx, desired))
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let index = state.require_id()?;
            let path = self.schema_path(state);
            Ok(self
                .fetch(ctx, &path, index)
                .await?
                .map(|attr| self.observed(index, &attr, state)))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        _prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(self.write(ctx, desired))
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let index = state.require_id()?;
            let path = self.schema_path(state);
            let doc = serde_json::to_value(ProfileSchema::single_property(index, Value::Null))?;
            let policy = ctx.settings().schema_retry;
            ctx.serialized(
                &self.parent_key(state),
                ctx.retry(
                    &policy,
                    || async {
                        match ctx.send(ApiRequest::post(path.as_str()).body(doc.clone())).await {
                            Ok(_) => Ok(()),
                            Err(e) if e.is_not_found() => Ok(()),
                            Err(e) => Err(e),
                        }
                    },
                    retry::transient,
                ),
            )
            .await?;
            tracing::info!(schema = %path, index = %index, "schema attribute removed");
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(v: Value) -> ResourceData {
        ResourceData::from_attributes(v.as_object().cloned().unwrap())
    }

    #[test]
    fn wire_shape_matches_platform_layout() {
        let resource = SchemaProperty::group();
        let mut desired = data(json!({
            "index": "costCenter",
            "title": "Cost center",
            "type": "string",
            "max_length": 20,
            "one_of": [{"const": "eng", "title": "Engineering"}],
        }));
        resource.schema().apply_defaults(&mut desired);
        let body = serde_json::to_value(resource.attribute_wire(&desired).unwrap()).unwrap();
        assert_eq!(
            body,
            json!({
                "title": "Cost center",
                "type": "string",
                "maxLength": 20,
                "oneOf": [{"const": "eng", "title": "Engineering"}],
                "permissions": [{"principal": "SELF", "action": "READ_ONLY"}],
            })
        );
    }

    #[test]
    fn observed_image_matches_declaration() {
        let resource = SchemaProperty::user();
        let mut desired = data(json!({
            "index": "nickName",
            "title": "Nick",
            "type": "array",
            "array_type": "string",
            "permissions": "READ_WRITE",
        }));
        resource.schema().apply_defaults(&mut desired);
        let attr = resource.attribute_wire(&desired).unwrap();
        let observed = resource.observed("nickName", &attr, &desired);
        assert!(resource.schema().diff(&desired, &observed).is_empty());
        assert_eq!(observed.get_str(USER_TYPE), Some("default"));
    }

    #[test]
    fn schemas_are_keyed_separately() {
        let user = SchemaProperty::user();
        let group = SchemaProperty::group();
        let d = data(json!({"user_type": "oty123"}));
        assert_eq!(user.parent_key(&d), "schema:/api/v1/meta/schemas/user/oty123");
        assert_eq!(group.parent_key(&d), "schema:/api/v1/meta/schemas/group/default");
    }

    #[test]
    fn array_type_requires_array() {
        let resource = SchemaProperty::group();
        let err = resource
            .validate(&data(json!({"type": "string", "array_type": "string"})))
            .unwrap_err();
        assert!(matches!(err, ProvisionerError::PreconditionViolated(_)));
    }
}
