//! Wire types for the OVH cloud project API.

use serde::Deserialize;

/// Entry of `GET /cloud/project/{project}/network/private`.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct PrivateNetworkResponse {
    pub(super) id: String,
    #[serde(default)]
    pub(super) name: String,
}

/// Entry of `GET .../network/private/{network}/subnet`.
///
/// Older API versions answer with bare identifiers, newer ones with objects.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(untagged)]
pub(super) enum SubnetEntry {
    Id(String),
    Object { id: String },
}

impl SubnetEntry {
    pub(super) fn into_id(self) -> String {
        match self {
            Self::Id(id) | Self::Object { id } => id,
        }
    }
}

/// Error body returned by the OVH API.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
pub(super) struct OvhErrorBody {
    pub(super) message: String,
}
