//! `okta_link_definition`: a linked-object relationship (e.g. manager /
//! subordinate). Definitions are immutable; every attribute forces a
//! replacement. The registry accepts one writer at a time.

use oktaform_core::models::link_definition::{LinkDefinition, LinkSide};
use oktaform_core::{AttrType, Attribute, ResourceData, Schema, api_paths};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};

const PRIMARY_NAME: &str = "primary_name";
const PRIMARY_TITLE: &str = "primary_title";
const PRIMARY_DESCRIPTION: &str = "primary_description";
const ASSOCIATED_NAME: &str = "associated_name";
const ASSOCIATED_TITLE: &str = "associated_title";
const ASSOCIATED_DESCRIPTION: &str = "associated_description";

const REGISTRY_KEY: &str = "linked_objects";

pub struct LinkDefinitionResource {
    schema: Schema,
}

impl LinkDefinitionResource {
    pub fn new() -> Self {
        let fixed = |a: Attribute| a.force_new();
        let schema = Schema::new()
            .attr(PRIMARY_NAME, fixed(Attribute::required(AttrType::String)))
            .attr(PRIMARY_TITLE, fixed(Attribute::required(AttrType::String)))
            .attr(PRIMARY_DESCRIPTION, fixed(Attribute::optional(AttrType::String)))
            .attr(ASSOCIATED_NAME, fixed(Attribute::required(AttrType::String)))
            .attr(ASSOCIATED_TITLE, fixed(Attribute::required(AttrType::String)))
            .attr(
                ASSOCIATED_DESCRIPTION,
                fixed(Attribute::optional(AttrType::String)),
            );
        Self { schema }
    }

    fn wire(desired: &ResourceData) -> Result<LinkDefinition, ProvisionerError> {
        let side = |name, title, description| -> Result<LinkSide, ProvisionerError> {
            Ok(LinkSide {
                name: desired.require_str(name)?.to_string(),
                title: desired.require_str(title)?.to_string(),
                description: desired.get_str(description).unwrap_or_default().to_string(),
                kind: "USER".to_string(),
            })
        };
        Ok(LinkDefinition {
            primary: side(PRIMARY_NAME, PRIMARY_TITLE, PRIMARY_DESCRIPTION)?,
            associated: side(ASSOCIATED_NAME, ASSOCIATED_TITLE, ASSOCIATED_DESCRIPTION)?,
        })
    }

    fn observed(link: &LinkDefinition) -> ResourceData {
        let mut data = ResourceData::with_id(link.primary.name.clone());
        data.set(PRIMARY_NAME, link.primary.name.clone());
        data.set(PRIMARY_TITLE, link.primary.title.clone());
        data.set(ASSOCIATED_NAME, link.associated.name.clone());
        data.set(ASSOCIATED_TITLE, link.associated.title.clone());
        if !link.primary.description.is_empty() {
            data.set(PRIMARY_DESCRIPTION, link.primary.description.clone());
        }
        if !link.associated.description.is_empty() {
            data.set(ASSOCIATED_DESCRIPTION, link.associated.description.clone());
        }
        data
    }
}

impl Default for LinkDefinitionResource {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for LinkDefinitionResource {
    fn type_name(&self) -> &'static str {
        "okta_link_definition"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn import(&self, id: &str) -> Result<ResourceData, ProvisionerError> {
        let mut data = ResourceData::with_id(id);
        data.set(PRIMARY_NAME, id);
        Ok(data)
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let body = Self::wire(desired)?;
            let created: LinkDefinition = ctx
                .serialized(REGISTRY_KEY, ctx.post_json(api_paths::LINKED_OBJECTS, &body))
                .await?;
            tracing::info!(primary = %created.primary.name, "link definition created");
            Ok(Self::observed(&created))
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let found: Option<LinkDefinition> = ctx
                .get_opt(&api_paths::linked_object(state.require_id()?))
                .await?;
            Ok(found.as_ref().map(Self::observed))
        })
    }

    fn update<'a>(
        &'a self,
        _ctx: &'a OpContext,
        _desired: &'a ResourceData,
        _prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async {
            Err(ProvisionerError::UpdateForbidden(
                "link definitions cannot be changed in place".into(),
            ))
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let path = api_paths::linked_object(state.require_id()?);
            ctx.serialized(REGISTRY_KEY, ctx.delete(&path)).await
        })
    }
}
