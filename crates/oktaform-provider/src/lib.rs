//! oktaform-provider
//!
//! Declarative reconciler for Okta entities. Each resource kind maps a
//! declared attribute image onto REST calls and reports the observed image
//! back into state.
//!
//! Public API:
//! - `refresh()`: re-read every tracked resource
//! - `plan()`: validate declarations and diff them against state
//! - `apply()`: execute a plan in dependency waves, flushing state after each action
//! - `import()`: adopt an existing remote entity
//! - `destroy_all()`: tear down every managed resource

pub mod addr;
pub mod arbiter;
pub mod context;
pub mod declaration;
pub mod error;
pub mod orchestrate;
pub mod persistence;
pub mod plan;
pub mod priority;
pub mod registry;
pub mod resource;
pub mod resources;
pub mod retry;
pub mod settings;
pub mod state;
pub mod transition;

pub use crate::addr::ResourceAddr;
pub use crate::context::{OpContext, Operation, ProviderContext};
pub use crate::declaration::{Declarations, ProviderSection, ResourceDecl};
pub use crate::error::ProvisionerError;
pub use crate::orchestrate::{ApplyReport, RefreshReport, apply, destroy_all, import, plan, refresh};
pub use crate::persistence::StatePersistence;
pub use crate::plan::{Action, Plan, PlanEntry};
pub use crate::registry::Registry;
pub use crate::resource::Resource;
pub use crate::settings::ProviderSettings;
pub use crate::state::ProviderState;
