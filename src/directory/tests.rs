//! Unit tests for directory types and error classification.

use super::*;
use rstest::rstest;

#[rstest]
#[case(ApiError::transport("connection reset"), ErrorClass::Retryable)]
#[case(ApiError::http(404, "not found"), ErrorClass::NotFound)]
#[case(ApiError::http(409, "network still has subnets"), ErrorClass::Retryable)]
#[case(ApiError::http(429, "slow down"), ErrorClass::Retryable)]
#[case(ApiError::http(500, "internal"), ErrorClass::Retryable)]
#[case(ApiError::http(503, "unavailable"), ErrorClass::Retryable)]
#[case(ApiError::http(400, "bad request"), ErrorClass::Terminal)]
#[case(ApiError::http(401, "invalid credential"), ErrorClass::Terminal)]
#[case(ApiError::http(403, "forbidden"), ErrorClass::Terminal)]
#[case(ApiError::decode("expected array"), ErrorClass::Terminal)]
#[case(ApiError::unsupported("subnets have no parent listing"), ErrorClass::Terminal)]
fn api_errors_are_classified(#[case] error: ApiError, #[case] expected: ErrorClass) {
    assert_eq!(error.class(), expected, "unexpected class for {error}");
}

#[rstest]
fn status_is_only_reported_for_http_errors() {
    assert_eq!(ApiError::http(409, "conflict").status(), Some(409));
    assert_eq!(ApiError::transport("timeout").status(), None);
}

#[rstest]
#[case("terraform_testacc_private_net", true)]
#[case("terraform_testacc", true)]
#[case("prod_terraform_testacc", false)]
#[case("", false)]
fn parent_prefix_match_is_anchored(#[case] name: &str, #[case] expected: bool) {
    let parent = ParentResource {
        id: String::from("pn-1"),
        name: name.to_owned(),
        owner_context: String::from("project"),
    };
    assert_eq!(parent.matches_prefix("terraform_testacc"), expected);
}

#[rstest]
fn resource_refs_render_parent_path_for_children() {
    let child = ChildResource {
        id: String::from("sub-1"),
        parent_id: String::from("pn-1"),
    };
    let target = ResourceRef::child(ResourceKind::PrivateSubnet, &child);
    assert_eq!(target.to_string(), "cloud_network_private_subnet pn-1/sub-1");

    let parent = ParentResource {
        id: String::from("pn-1"),
        name: String::from("terraform_testacc_net"),
        owner_context: String::from("project"),
    };
    let parent_ref = ResourceRef::parent(ResourceKind::PrivateNetwork, &parent);
    assert_eq!(parent_ref.to_string(), "cloud_network_private pn-1");
}
