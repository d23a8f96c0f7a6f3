//! `okta_user_type`
//!
//! Deleting a user type races the platform's cleanup of users and schema
//! attributes that referenced it; the API answers 500 until the cleanup
//! finishes, so deletion retries within a short budget.

use oktaform_client::ApiRequest;
use oktaform_core::models::user_type::UserType;
use oktaform_core::{AttrType, Attribute, ResourceData, Schema, api_paths};

use crate::context::OpContext;
use crate::error::ProvisionerError;
use crate::resource::{OpResult, Resource};
use crate::retry;

const NAME: &str = "name";
const DISPLAY_NAME: &str = "display_name";
const DESCRIPTION: &str = "description";

pub struct UserTypeResource {
    schema: Schema,
}

impl UserTypeResource {
    pub fn new() -> Self {
        let schema = Schema::new()
            .attr(NAME, Attribute::required(AttrType::String).force_new())
            .attr(DISPLAY_NAME, Attribute::required(AttrType::String))
            .attr(DESCRIPTION, Attribute::optional(AttrType::String));
        Self { schema }
    }

    fn wire(desired: &ResourceData) -> Result<UserType, ProvisionerError> {
        Ok(UserType {
            id: None,
            name: desired.require_str(NAME)?.to_string(),
            display_name: desired.require_str(DISPLAY_NAME)?.to_string(),
            description: desired.get_str(DESCRIPTION).unwrap_or_default().to_string(),
            default: None,
        })
    }

    fn observed(user_type: &UserType) -> ResourceData {
        let mut data = ResourceData::new();
        if let Some(id) = &user_type.id {
            data.set_id(id.clone());
        }
        data.set(NAME, user_type.name.clone());
        data.set(DISPLAY_NAME, user_type.display_name.clone());
        if !user_type.description.is_empty() {
            data.set(DESCRIPTION, user_type.description.clone());
        }
        data
    }
}

impl Default for UserTypeResource {
    fn default() -> Self {
        Self::new()
    }
}

impl Resource for UserTypeResource {
    fn type_name(&self) -> &'static str {
        "okta_user_type"
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let created: UserType = ctx.post_json(api_paths::USER_TYPES, &Self::wire(desired)?).await?;
            tracing::info!(name = %created.name, "user type created");
            Ok(Self::observed(&created))
        })
    }

    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>> {
        Box::pin(async move {
            let found: Option<UserType> = ctx.get_opt(&api_paths::user_type(state.require_id()?)).await?;
            Ok(found.as_ref().map(Self::observed))
        })
    }

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData> {
        Box::pin(async move {
            let id = prior.require_id()?;
            let updated: UserType = ctx.put_json(&api_paths::user_type(id), &Self::wire(desired)?).await?;
            Ok(Self::observed(&updated))
        })
    }

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()> {
        Box::pin(async move {
            let path = api_paths::user_type(state.require_id()?);
            let policy = ctx.settings().user_type_delete_retry;
            ctx.retry(
                &policy,
                || async {
                    match ctx.send(ApiRequest::delete(path.as_str())).await {
                        Ok(_) => Ok(()),
                        Err(e) if e.is_not_found() => Ok(()),
                        Err(e) => Err(e),
                    }
                },
                retry::transient,
            )
            .await?;
            tracing::info!(path = %path, "user type deleted");
            Ok(())
        })
    }
}
