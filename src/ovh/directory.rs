//! [`ResourceDirectory`] implementation backed by the OVH API.

use crate::directory::{
    ApiError, ChildResource, DirectoryFuture, ParentResource, ResourceDirectory, ResourceKind,
    ResourceRef,
};

use super::OvhClient;
use super::types::{PrivateNetworkResponse, SubnetEntry};

/// Path listing resources of `kind`, optionally scoped to a parent.
pub(super) fn collection_path(
    owner_context: &str,
    kind: ResourceKind,
    parent_id: Option<&str>,
) -> Result<String, ApiError> {
    match (kind, parent_id) {
        (ResourceKind::PrivateNetwork, None) => {
            Ok(format!("/cloud/project/{owner_context}/network/private"))
        }
        (ResourceKind::PrivateSubnet, Some(network_id)) => Ok(format!(
            "/cloud/project/{owner_context}/network/private/{network_id}/subnet"
        )),
        (ResourceKind::PrivateNetwork, Some(_)) => Err(ApiError::unsupported(
            "private networks are not nested in another resource",
        )),
        (ResourceKind::PrivateSubnet, None) => Err(ApiError::unsupported(
            "subnets can only be listed within a private network",
        )),
    }
}

/// Path addressing a single resource.
pub(super) fn resource_path(owner_context: &str, target: &ResourceRef) -> Result<String, ApiError> {
    let collection = collection_path(owner_context, target.kind, target.parent_id.as_deref())?;
    Ok(format!("{collection}/{}", target.id))
}

impl ResourceDirectory for OvhClient {
    fn list_parents<'a>(
        &'a self,
        owner_context: &'a str,
        kind: ResourceKind,
    ) -> DirectoryFuture<'a, Vec<ParentResource>> {
        Box::pin(async move {
            let path = collection_path(owner_context, kind, None)?;
            let networks: Vec<PrivateNetworkResponse> = self.get_json(&path).await?;
            Ok(networks
                .into_iter()
                .map(|network| ParentResource {
                    id: network.id,
                    name: network.name,
                    owner_context: owner_context.to_owned(),
                })
                .collect())
        })
    }

    fn list_children<'a>(
        &'a self,
        owner_context: &'a str,
        kind: ResourceKind,
        parent: &'a ParentResource,
    ) -> DirectoryFuture<'a, Vec<ChildResource>> {
        Box::pin(async move {
            let path = collection_path(owner_context, kind, Some(&parent.id))?;
            let entries: Vec<SubnetEntry> = self.get_json(&path).await?;
            Ok(entries
                .into_iter()
                .map(|entry| ChildResource {
                    id: entry.into_id(),
                    parent_id: parent.id.clone(),
                })
                .collect())
        })
    }

    fn delete<'a>(
        &'a self,
        owner_context: &'a str,
        target: &'a ResourceRef,
    ) -> DirectoryFuture<'a, ()> {
        Box::pin(async move {
            let path = resource_path(owner_context, target)?;
            self.delete_path(&path).await
        })
    }
}
