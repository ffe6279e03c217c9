//! Capability checks.
//!
//! Every role decision in the crate goes through [`permits`], so the rules
//! for who may review, merge, comment or close live in one table.

use std::fmt;
use std::str::FromStr;

use protoreview_core::UserId;
use serde::{Deserialize, Serialize};

use crate::protocol::{Protocol, ProtocolStatus};
use crate::pull_request::PullRequest;

/// A user's global role, supplied by the identity collaborator.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Regular user.
    #[default]
    Researcher,
    /// Designated reviewer. Carries no extra capabilities on its own.
    Reviewer,
    /// Administrator: may act on any protocol.
    Admin,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Researcher => write!(f, "researcher"),
            Self::Reviewer => write!(f, "reviewer"),
            Self::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "researcher" => Ok(Self::Researcher),
            "reviewer" => Ok(Self::Reviewer),
            "admin" => Ok(Self::Admin),
            other => Err(format!(
                "unknown role '{other}' (expected researcher, reviewer or admin)"
            )),
        }
    }
}

/// The authenticated user performing an operation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Actor {
    /// Who is acting.
    pub id: UserId,
    /// Their role.
    pub role: Role,
}

impl Actor {
    /// Create an actor.
    #[must_use]
    pub const fn new(id: UserId, role: Role) -> Self {
        Self { id, role }
    }

    /// A non-privileged actor.
    #[must_use]
    pub const fn researcher(id: UserId) -> Self {
        Self::new(id, Role::Researcher)
    }

    /// An administrator.
    #[must_use]
    pub const fn admin(id: UserId) -> Self {
        Self::new(id, Role::Admin)
    }

    /// `true` for administrators.
    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Operations that require a capability check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Action {
    /// Read a protocol's current state.
    ViewProtocol,
    /// Edit a protocol, snapshot it, or compare its versions.
    EditProtocol,
    /// Open a pull request against a protocol.
    CreatePullRequest,
    /// Submit a review verdict.
    Review,
    /// Merge a pull request.
    Merge,
    /// Comment on a pull request.
    Comment,
    /// Close a pull request without merging.
    Close,
}

impl Action {
    /// Who is allowed to perform this action, for error messages.
    #[must_use]
    pub const fn who_may(self) -> &'static str {
        match self {
            Self::ViewProtocol => {
                "ask the protocol's author to publish it, or to share it with an administrator."
            }
            Self::EditProtocol | Self::CreatePullRequest => {
                "only the protocol's author or an administrator may do this."
            }
            Self::Review => {
                "ask to be added as a reviewer; the protocol's author and administrators may also review."
            }
            Self::Merge => {
                "ask the protocol's author, an administrator, or the pull request's author to merge."
            }
            Self::Comment => "anyone may comment.",
            Self::Close => {
                "ask the pull request's author, the protocol's author, or an administrator to close it."
            }
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ViewProtocol => write!(f, "view this protocol"),
            Self::EditProtocol => write!(f, "edit this protocol"),
            Self::CreatePullRequest => write!(f, "open a pull request on this protocol"),
            Self::Review => write!(f, "review this pull request"),
            Self::Merge => write!(f, "merge this pull request"),
            Self::Comment => write!(f, "comment on this pull request"),
            Self::Close => write!(f, "close this pull request"),
        }
    }
}

/// Decide whether `actor` may perform `action`.
///
/// `pr` is required for the pull-request actions; without it only the
/// protocol-level rules apply.
#[must_use]
pub fn permits(action: Action, actor: &Actor, protocol: &Protocol, pr: Option<&PullRequest>) -> bool {
    let owns_protocol = protocol.author_id == actor.id;
    let authored_pr = pr.is_some_and(|pr| pr.author_id == actor.id);
    let is_reviewer = pr.is_some_and(|pr| pr.reviewer(&actor.id).is_some());

    match action {
        Action::ViewProtocol => {
            owns_protocol || actor.is_admin() || protocol.status == ProtocolStatus::Published
        }
        Action::EditProtocol | Action::CreatePullRequest => owns_protocol || actor.is_admin(),
        Action::Review => is_reviewer || owns_protocol || actor.is_admin(),
        Action::Merge | Action::Close => owns_protocol || actor.is_admin() || authored_pr,
        Action::Comment => true,
    }
}

/// `true` if `actor` may open a pull request on `protocol`.
#[must_use]
pub fn can_create_pull_request(actor: &Actor, protocol: &Protocol) -> bool {
    permits(Action::CreatePullRequest, actor, protocol, None)
}

/// `true` if `actor` may submit a verdict on `pr`.
#[must_use]
pub fn can_review(actor: &Actor, protocol: &Protocol, pr: &PullRequest) -> bool {
    permits(Action::Review, actor, protocol, Some(pr))
}

/// `true` if `actor` may merge `pr`.
#[must_use]
pub fn can_merge(actor: &Actor, protocol: &Protocol, pr: &PullRequest) -> bool {
    permits(Action::Merge, actor, protocol, Some(pr))
}

/// `true` if `actor` may comment on `pr`. Always true; comments are an
/// audit trail.
#[must_use]
pub fn can_comment(actor: &Actor, protocol: &Protocol, pr: &PullRequest) -> bool {
    permits(Action::Comment, actor, protocol, Some(pr))
}

/// `true` if `actor` may close `pr`.
#[must_use]
pub fn can_close(actor: &Actor, protocol: &Protocol, pr: &PullRequest) -> bool {
    permits(Action::Close, actor, protocol, Some(pr))
}

/// `true` if `actor` may read `protocol`. Drafts and archived protocols are
/// private to their author and administrators.
#[must_use]
pub fn can_view_protocol(actor: &Actor, protocol: &Protocol) -> bool {
    permits(Action::ViewProtocol, actor, protocol, None)
}

/// `true` if `actor` may edit `protocol` or inspect its version history.
#[must_use]
pub fn can_edit_protocol(actor: &Actor, protocol: &Protocol) -> bool {
    permits(Action::EditProtocol, actor, protocol, None)
}
