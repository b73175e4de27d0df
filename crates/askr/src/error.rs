//! Error type shared by every askr module.
//!
//! Errors from direct API calls propagate to the caller. Errors returned by a
//! node's hooks during a traversal are logged at the traversal boundary and
//! never abort the tick; see [`SceneTree::advance`](crate::tree::SceneTree::advance).

use crate::tree::NodeId;

/// Broad classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A property was read as a type it can't be widened to.
    TypeMismatch,
    /// A registered type without a constructor was instantiated.
    AbstractType,
    /// An unknown type, property, node or child was named.
    NotFound,
    /// A value was rejected (bad mass, bad shape, malformed data).
    InvalidArgument,
    /// The node is in the wrong state for the call (e.g. detached).
    InvalidState,
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("property `{property}` holds {found} and can't be read as {expected}")]
    TypeMismatch {
        property: String,
        expected: &'static str,
        found: &'static str,
    },

    #[error("can't construct abstract node type `{0}`")]
    AbstractType(String),

    #[error("unknown node type `{0}`")]
    UnknownType(String),

    #[error("no subproperty `{name}` in property `{property}`")]
    MissingProperty { property: String, name: String },

    #[error("node {0} does not exist")]
    NodeNotFound(NodeId),

    #[error("can't remove the non-existent child {child} of {parent}")]
    ChildNotFound { parent: NodeId, child: NodeId },

    #[error("scene node {node} names the unknown parent {parent}")]
    UnknownSceneParent { node: u64, parent: u64 },

    #[error("child index {index} is out of range ({len} children)")]
    IndexOutOfRange { index: usize, len: usize },

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::TypeMismatch { .. } => ErrorKind::TypeMismatch,
            Error::AbstractType(_) => ErrorKind::AbstractType,
            Error::UnknownType(_)
            | Error::MissingProperty { .. }
            | Error::NodeNotFound(_)
            | Error::ChildNotFound { .. }
            | Error::UnknownSceneParent { .. }
            | Error::IndexOutOfRange { .. } => ErrorKind::NotFound,
            Error::InvalidArgument(_) | Error::Json(_) | Error::Io(_) => ErrorKind::InvalidArgument,
            Error::InvalidState(_) => ErrorKind::InvalidState,
        }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Error::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Error::InvalidState(msg.into())
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(Error::AbstractType("node".into()).kind(), ErrorKind::AbstractType);
        assert_eq!(Error::IndexOutOfRange { index: 3, len: 1 }.kind(), ErrorKind::NotFound);
        assert_eq!(Error::invalid_state("detached").kind(), ErrorKind::InvalidState);

        let json = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        assert_eq!(Error::from(json).kind(), ErrorKind::InvalidArgument);
    }

    #[test]
    fn messages_name_the_culprit() {
        let err = Error::TypeMismatch {
            property: "mass".into(),
            expected: "float",
            found: "string",
        };
        assert_eq!(err.to_string(), "property `mass` holds string and can't be read as float");
    }
}
