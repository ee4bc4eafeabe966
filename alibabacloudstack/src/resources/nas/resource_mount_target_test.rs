#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::form_param;
    use crate::resources::test_support::{object, provider_data, s};
    use mockito::{Matcher, Server};
    use tfplug::types::Dynamic;

    const DOMAIN: &str = "31a8e4-abc12.cn-test-1.nas.example.com";

    fn describe_body(status: &str) -> String {
        format!(
            r#"{{"RequestId":"r-1","MountTargets":{{"MountTarget":[{{
                "MountTargetDomain":"{}",
                "AccessGroup":"DEFAULT_VPC_GROUP_NAME",
                "Status":"{}",
                "VswId":"vsw-1",
                "VpcId":"vpc-1",
                "NetworkType":"Vpc"
            }}]}}}}"#,
            DOMAIN, status
        )
    }

    async fn configured(url: &str) -> MountTargetResource {
        let mut resource = MountTargetResource::new();
        resource
            .configure(
                Context::new(),
                ConfigureResourceRequest {
                    provider_data: provider_data(url),
                },
            )
            .await;
        resource
    }

    fn state(id: &str) -> DynamicValue {
        object(&[
            ("id", s(id)),
            ("file_system_id", s("31a8e4")),
            ("access_group_name", s("DEFAULT_VPC_GROUP_NAME")),
            ("vswitch_id", s("vsw-1")),
            ("security_group_id", Dynamic::Null),
            ("status", s("Active")),
            ("mount_target_domain", s(DOMAIN)),
        ])
    }

    #[test]
    fn test_parse_mount_target_id() {
        assert_eq!(
            parse_mount_target_id(&format!("31a8e4:{}", DOMAIN)),
            Some(("31a8e4".to_string(), DOMAIN.to_string()))
        );
        // bare domain from older states
        assert_eq!(
            parse_mount_target_id(DOMAIN),
            Some(("31a8e4".to_string(), DOMAIN.to_string()))
        );
        assert_eq!(parse_mount_target_id("a:b:c"), None);
    }

    #[tokio::test]
    async fn test_create_vpc_mount_target() {
        let mut server = Server::new_async().await;
        let vswitch = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "DescribeVSwitchAttributes"),
                form_param("VSwitchId", "vsw-1"),
                form_param("Product", "Vpc"),
            ]))
            .with_body(r#"{"VSwitchId":"vsw-1","VpcId":"vpc-1","RequestId":"r-0"}"#)
            .expect(1)
            .create_async()
            .await;
        let create = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "CreateMountTarget"),
                form_param("FileSystemId", "31a8e4"),
                form_param("NetworkType", "Vpc"),
                form_param("VpcId", "vpc-1"),
                form_param("VSwitchId", "vsw-1"),
                form_param("AccessGroupName", "DEFAULT_VPC_GROUP_NAME"),
            ]))
            .with_body(format!(r#"{{"MountTargetDomain":"{}","RequestId":"r-2"}}"#, DOMAIN))
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeMountTargets"))
            .with_body(describe_body("Active"))
            .create_async()
            .await;
        let modify = server
            .mock("POST", "/")
            .match_body(form_param("Action", "ModifyMountTarget"))
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let mut planned = state("");
        let _ = planned.mark_unknown(&AttributePath::new("id"));
        let _ = planned.mark_unknown(&AttributePath::new("mount_target_domain"));
        let _ = planned.mark_unknown(&AttributePath::new("status"));

        let response = resource
            .create(
                Context::new(),
                CreateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            get_string(&response.new_state, "id"),
            Some(format!("31a8e4:{}", DOMAIN))
        );
        assert_eq!(
            get_string(&response.new_state, "status").as_deref(),
            Some("Active")
        );
        vswitch.assert_async().await;
        create.assert_async().await;
        modify.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_upgrades_legacy_id() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "DescribeMountTargets"),
                form_param("FileSystemId", "31a8e4"),
                form_param("MountTargetDomain", DOMAIN),
            ]))
            .with_body(describe_body("Inactive"))
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state(DOMAIN),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        let new_state = response.new_state.unwrap();
        assert_eq!(get_string(&new_state, "id"), Some(format!("31a8e4:{}", DOMAIN)));
        assert_eq!(get_string(&new_state, "status").as_deref(), Some("Inactive"));
        assert_eq!(get_string(&new_state, "vswitch_id").as_deref(), Some("vsw-1"));
    }

    #[tokio::test]
    async fn test_read_not_found_clears_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(404)
            .with_body(r#"{"Code":"InvalidMountTarget.NotFound","Message":"gone","RequestId":"r-3"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state(&format!("31a8e4:{}", DOMAIN)),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_update_status_only() {
        let mut server = Server::new_async().await;
        let modify = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "ModifyMountTarget"),
                form_param("Status", "Inactive"),
            ]))
            .with_body(r#"{"RequestId":"r-4"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeMountTargets"))
            .with_body(describe_body("Inactive"))
            .create_async()
            .await;

        let id = format!("31a8e4:{}", DOMAIN);
        let mut planned = state(&id);
        let _ = planned.set_string(&AttributePath::new("status"), "Inactive".to_string());

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(&id),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        modify.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("POST", "/")
            .match_body(form_param("Action", "DeleteMountTarget"))
            .with_body(r#"{"RequestId":"r-5"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeMountTargets"))
            .with_body(r#"{"RequestId":"r-6","MountTargets":{"MountTarget":[]}}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(&format!("31a8e4:{}", DOMAIN)),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_mount_target() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DeleteMountTarget"))
            .with_status(404)
            .with_body(r#"{"Code":"InvalidMountTarget.NotFound","Message":"gone","RequestId":"r-7"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(&format!("31a8e4:{}", DOMAIN)),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
    }
}
