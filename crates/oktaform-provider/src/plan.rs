use std::fmt;

use serde::{Deserialize, Serialize};

use oktaform_core::{AttributeChange, ResourceData};

use crate::addr::ResourceAddr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Create,
    Update,
    /// A `force_new` attribute changed: delete, then create.
    Replace,
    Delete,
    NoOp,
}

/// One resource's planned action.
#[derive(Debug, Clone, Serialize)]
pub struct PlanEntry {
    pub addr: ResourceAddr,
    pub action: Action,
    pub changes: Vec<AttributeChange>,
    /// Validated declaration with defaults applied. `None` for deletes.
    #[serde(skip)]
    pub desired: Option<ResourceData>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Plan {
    pub entries: Vec<PlanEntry>,
}

impl Plan {
    pub fn has_changes(&self) -> bool {
        self.entries.iter().any(|e| e.action != Action::NoOp)
    }

    pub fn count(&self, action: Action) -> usize {
        self.entries.iter().filter(|e| e.action == action).count()
    }

    pub fn get(&self, addr: &ResourceAddr) -> Option<&PlanEntry> {
        self.entries.iter().find(|e| &e.addr == addr)
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        for entry in self.entries.iter().filter(|e| e.action != Action::NoOp) {
            let marker = match entry.action {
                Action::Create => "+",
                Action::Update => "~",
                Action::Replace => "-/+",
                Action::Delete => "-",
                Action::NoOp => " ",
            };
            writeln!(f, "{marker} {}", entry.addr)?;
            for change in &entry.changes {
                let note = if change.force_new { " (forces replacement)" } else { "" };
                writeln!(
                    f,
                    "    {}: {} -> {}{note}",
                    change.attribute, change.before, change.after
                )?;
            }
        }
        let replace = self.count(Action::Replace);
        write!(
            f,
            "Plan: {} to add, {} to change, {} to destroy.",
            self.count(Action::Create) + replace,
            self.count(Action::Update),
            self.count(Action::Delete) + replace,
        )
    }
}
