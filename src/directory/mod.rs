//! Resource directory abstraction consumed by the reclaimer.
//!
//! A directory lists and deletes remote objects within an owner context (a
//! cloud project). Parents own children; the remote service refuses to delete
//! a parent while children remain, so callers must delete children first.

use std::fmt;
use std::future::Future;
use std::pin::Pin;

/// Kind of remote object handled by a sweeper.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub enum ResourceKind {
    /// Private network attached to a cloud project through a vRack.
    PrivateNetwork,
    /// Subnet living inside a private network.
    PrivateSubnet,
}

impl ResourceKind {
    /// Stable name used in logs and reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::PrivateNetwork => "cloud_network_private",
            Self::PrivateSubnet => "cloud_network_private_subnet",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parent/child pairing reclaimed by a single sweeper.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Cascade {
    /// Kind of the top-level objects matched by name.
    pub parent: ResourceKind,
    /// Kind of the objects that must be deleted before their parent.
    pub child: ResourceKind,
}

impl Cascade {
    /// Private networks and their subnets.
    pub const PRIVATE_NETWORK: Self = Self {
        parent: ResourceKind::PrivateNetwork,
        child: ResourceKind::PrivateSubnet,
    };
}

/// Top-level remote object eligible for reclamation.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParentResource {
    /// Server-assigned identifier.
    pub id: String,
    /// Display name; only names carrying the test prefix are reclaimed.
    pub name: String,
    /// Project the resource belongs to.
    pub owner_context: String,
}

impl ParentResource {
    /// Returns `true` when the name starts with `prefix`.
    #[must_use]
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.name.starts_with(prefix)
    }
}

/// Remote object that only exists inside one parent.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ChildResource {
    /// Server-assigned identifier.
    pub id: String,
    /// Identifier of the owning parent.
    pub parent_id: String,
}

/// Address of a delete target.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResourceRef {
    /// Kind of the target.
    pub kind: ResourceKind,
    /// Identifier of the target.
    pub id: String,
    /// Owning parent, set for children only.
    pub parent_id: Option<String>,
}

impl ResourceRef {
    /// Addresses a parent resource.
    #[must_use]
    pub fn parent(kind: ResourceKind, parent: &ParentResource) -> Self {
        Self {
            kind,
            id: parent.id.clone(),
            parent_id: None,
        }
    }

    /// Addresses a child resource.
    #[must_use]
    pub fn child(kind: ResourceKind, child: &ChildResource) -> Self {
        Self {
            kind,
            id: child.id.clone(),
            parent_id: Some(child.parent_id.clone()),
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.parent_id {
            Some(parent_id) => write!(f, "{} {parent_id}/{}", self.kind, self.id),
            None => write!(f, "{} {}", self.kind, self.id),
        }
    }
}

/// How the reclaimer should react to an [`ApiError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorClass {
    /// Retrying the same request could succeed.
    Retryable,
    /// Retrying cannot help; abort the cycle.
    Terminal,
    /// The target does not exist. On delete this means the work is done.
    NotFound,
}

/// Origin of an [`ApiError`].
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ApiErrorKind {
    /// The service answered with a non-success HTTP status.
    Http(u16),
    /// The request never produced a response.
    Transport,
    /// The response body could not be decoded.
    Decode,
    /// The directory cannot serve this request for the given kind.
    Unsupported,
}

/// Failure reported by a [`ResourceDirectory`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ApiError {
    /// Where the failure came from.
    pub kind: ApiErrorKind,
    /// Message returned by the service or the transport.
    pub message: String,
}

impl ApiError {
    /// Builds an error from an HTTP status and message.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Http(status),
            message: message.into(),
        }
    }

    /// Builds an error for a request that never got a response.
    #[must_use]
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Transport,
            message: message.into(),
        }
    }

    /// Builds an error for an undecodable response.
    #[must_use]
    pub fn decode(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Decode,
            message: message.into(),
        }
    }

    /// Builds an error for a request the directory cannot express.
    #[must_use]
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self {
            kind: ApiErrorKind::Unsupported,
            message: message.into(),
        }
    }

    /// HTTP status, when the service answered.
    #[must_use]
    pub const fn status(&self) -> Option<u16> {
        match self.kind {
            ApiErrorKind::Http(status) => Some(status),
            ApiErrorKind::Transport | ApiErrorKind::Decode | ApiErrorKind::Unsupported => None,
        }
    }

    /// Classifies the error for the retry loop.
    ///
    /// Transport failures, conflicts, throttling and server errors are
    /// retryable; not-found is reported separately so deletes can treat it
    /// as success; everything else is terminal.
    #[must_use]
    pub const fn class(&self) -> ErrorClass {
        match self.kind {
            ApiErrorKind::Transport => ErrorClass::Retryable,
            ApiErrorKind::Decode | ApiErrorKind::Unsupported => ErrorClass::Terminal,
            ApiErrorKind::Http(404) => ErrorClass::NotFound,
            ApiErrorKind::Http(408 | 409 | 423 | 425 | 429 | 500..=599) => ErrorClass::Retryable,
            ApiErrorKind::Http(_) => ErrorClass::Terminal,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ApiErrorKind::Http(status) => write!(f, "HTTP {status}: {}", self.message),
            ApiErrorKind::Transport => write!(f, "transport error: {}", self.message),
            ApiErrorKind::Decode => write!(f, "invalid response: {}", self.message),
            ApiErrorKind::Unsupported => write!(f, "unsupported request: {}", self.message),
        }
    }
}

impl std::error::Error for ApiError {}

/// Future returned by directory operations.
pub type DirectoryFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, ApiError>> + Send + 'a>>;

/// Lists and deletes remote resources within an owner context.
pub trait ResourceDirectory: Send + Sync {
    /// Lists every parent of `kind` visible in `owner_context`.
    fn list_parents<'a>(
        &'a self,
        owner_context: &'a str,
        kind: ResourceKind,
    ) -> DirectoryFuture<'a, Vec<ParentResource>>;

    /// Lists the children of `kind` currently owned by `parent`.
    fn list_children<'a>(
        &'a self,
        owner_context: &'a str,
        kind: ResourceKind,
        parent: &'a ParentResource,
    ) -> DirectoryFuture<'a, Vec<ChildResource>>;

    /// Deletes a single resource.
    fn delete<'a>(
        &'a self,
        owner_context: &'a str,
        target: &'a ResourceRef,
    ) -> DirectoryFuture<'a, ()>;
}

#[cfg(test)]
mod tests;
