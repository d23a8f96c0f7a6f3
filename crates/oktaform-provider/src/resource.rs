use std::future::Future;
use std::pin::Pin;

use oktaform_core::{AttributeChange, ResourceData, Schema};

use crate::context::OpContext;
use crate::error::ProvisionerError;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub type OpResult<'a, T> = BoxFuture<'a, Result<T, ProvisionerError>>;

/// One impl per resource kind.
///
/// Callbacks receive the declared image (`desired`) and/or the last
/// observed image (`state`), and return the freshly observed image.
pub trait Resource: Send + Sync {
    /// e.g. "okta_network_zone"
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> &Schema;

    /// Cross-field rules the schema cannot express. Runs at plan time,
    /// before any API call.
    fn validate(&self, _desired: &ResourceData) -> Result<(), ProvisionerError> {
        Ok(())
    }

    /// True when `change` is expected server behaviour, not drift.
    fn suppress_diff(
        &self,
        _change: &AttributeChange,
        _desired: &ResourceData,
        _state: &ResourceData,
    ) -> bool {
        false
    }

    /// Turn a user-supplied import ID into seed state for `read`.
    fn import(&self, id: &str) -> Result<ResourceData, ProvisionerError> {
        Ok(ResourceData::with_id(id))
    }

    fn create<'a>(&'a self, ctx: &'a OpContext, desired: &'a ResourceData)
    -> OpResult<'a, ResourceData>;

    /// `None` means the remote entity is gone (404 or tombstone).
    fn read<'a>(
        &'a self,
        ctx: &'a OpContext,
        state: &'a ResourceData,
    ) -> OpResult<'a, Option<ResourceData>>;

    fn update<'a>(
        &'a self,
        ctx: &'a OpContext,
        desired: &'a ResourceData,
        prior: &'a ResourceData,
    ) -> OpResult<'a, ResourceData>;

    fn delete<'a>(&'a self, ctx: &'a OpContext, state: &'a ResourceData) -> OpResult<'a, ()>;
}
