//! The step record: one identified, ordered unit of a protocol.
//!
//! Within any list presented as "current", `order` values are exactly
//! `1..=N` matching array position and ids are unique. [`renumber`] restores
//! the ordering half of that invariant after a list has been edited.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::StepId;

/// One procedure instruction with its metadata.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Step {
    /// Identity across versions.
    pub id: StepId,
    /// 1-based position. Authoritative only after [`renumber`].
    pub order: u32,
    /// Short instruction text.
    pub title: String,
    /// Reagents used, in display order.
    #[serde(default)]
    pub reagents: Vec<String>,
    /// Equipment used, in display order.
    #[serde(default)]
    pub equipment: Vec<String>,
    /// Free-form duration, e.g. `"30 min at 37C"`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timing: Option<String>,
    /// Free-form notes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl Step {
    /// Create a step with only the required fields set.
    #[must_use]
    pub fn new(id: StepId, order: u32, title: impl Into<String>) -> Self {
        Self {
            id,
            order,
            title: title.into(),
            reagents: Vec::new(),
            equipment: Vec::new(),
            timing: None,
            notes: None,
        }
    }

    /// `true` if any compared field differs, `order` included.
    ///
    /// An order-only change counts as a difference.
    #[must_use]
    pub fn differs_from(&self, other: &Self) -> bool {
        self.order != other.order || !self.same_content(other)
    }

    /// Field-by-field equality ignoring `order`.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.id == other.id
            && self.title == other.title
            && self.reagents == other.reagents
            && self.equipment == other.equipment
            && self.timing == other.timing
            && self.notes == other.notes
    }

    /// Check the fields every persisted step must carry.
    ///
    /// # Errors
    /// Returns [`StepError`] if the title is blank or the order is zero.
    pub fn validate(&self) -> Result<(), StepError> {
        if self.title.trim().is_empty() {
            return Err(StepError::BlankTitle {
                id: self.id.clone(),
            });
        }
        if self.order == 0 {
            return Err(StepError::ZeroOrder {
                id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Rewrite every `order` to its 1-based array position.
pub fn renumber(steps: &mut [Step]) {
    for (index, step) in steps.iter_mut().enumerate() {
        step.order = u32::try_from(index + 1).unwrap_or(u32::MAX);
    }
}

/// A step record that is missing a required field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StepError {
    /// `title` is empty or whitespace.
    BlankTitle {
        /// The offending step.
        id: StepId,
    },
    /// `order` is 0; orders are 1-based.
    ZeroOrder {
        /// The offending step.
        id: StepId,
    },
}

impl fmt::Display for StepError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BlankTitle { id } => write!(f, "step '{id}' has a blank title"),
            Self::ZeroOrder { id } => write!(f, "step '{id}' has order 0 (orders start at 1)"),
        }
    }
}

impl std::error::Error for StepError {}
