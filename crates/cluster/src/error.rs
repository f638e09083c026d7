//! Error types for membership operations

use std::error::Error;
use std::fmt::{self, Debug};

/// Marker trait for `ClusterMembership` errors
pub trait ClusterMembershipError: Debug + Error + Send + Sync + 'static {
    /// Returns the kind of this error
    fn kind(&self) -> ClusterMembershipErrorKind;
}

/// The kind of membership error.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ClusterMembershipErrorKind {
    /// The coordination store could not be reached or the session is gone
    Connection,

    /// The node is not registered
    NotRegistered,

    /// The node is already registered
    AlreadyRegistered,

    /// The subscription is unknown or already released
    UnknownSubscription,

    /// Other/unknown error
    Other,
}

impl fmt::Display for ClusterMembershipErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}
