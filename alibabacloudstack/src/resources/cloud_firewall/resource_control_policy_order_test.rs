#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::form_param;
    use crate::resources::test_support::{object, provider_data, s};
    use mockito::{Matcher, Server};
    use tfplug::types::Dynamic;

    const POLICIES: &str = r#"{"RequestId":"r-1","TotalCount":"2","Policys":[
        {"AclUuid":"acl-other","Order":1,"Direction":"in"},
        {"AclUuid":"acl-1","Order":3,"Direction":"in"}
    ]}"#;

    fn state(order: f64) -> DynamicValue {
        object(&[
            ("id", s("acl-1:in")),
            ("acl_uuid", s("acl-1")),
            ("direction", s("in")),
            ("order", Dynamic::Number(order)),
        ])
    }

    async fn configured(url: &str) -> ControlPolicyOrderResource {
        let mut resource = ControlPolicyOrderResource::new();
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

    #[tokio::test]
    async fn test_create_sets_priority() {
        let mut server = Server::new_async().await;
        let modify = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "ModifyControlPolicyPriority"),
                form_param("Product", "Cloudfw"),
                form_param("AclUuid", "acl-1"),
                form_param("Direction", "in"),
                form_param("Order", "3"),
            ]))
            .with_body(r#"{"RequestId":"r-0"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "DescribeControlPolicy"),
                form_param("CurrentPage", "1"),
                form_param("PageSize", "100"),
            ]))
            .with_body(POLICIES)
            .create_async()
            .await;

        let mut planned = state(3.0);
        let _ = planned.mark_unknown(&AttributePath::new("id"));

        let resource = configured(&server.url()).await;
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
            get_string(&response.new_state, "id").as_deref(),
            Some("acl-1:in")
        );
        assert_eq!(get_number(&response.new_state, "order"), Some(3.0));
        modify.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_missing_policy_clears_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"r-2","Policys":[{"AclUuid":"acl-other","Order":1}]}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state(3.0),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_update_unchanged_order_sends_nothing() {
        let mut server = Server::new_async().await;
        let modify = server
            .mock("POST", "/")
            .match_body(form_param("Action", "ModifyControlPolicyPriority"))
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeControlPolicy"))
            .with_body(POLICIES)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(3.0),
                    planned_state: state(3.0),
                    config: state(3.0),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        modify.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_makes_no_call() {
        let mut server = Server::new_async().await;
        let any = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(3.0),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
        any.assert_async().await;
    }

    #[tokio::test]
    async fn test_import_rejects_malformed_id() {
        let resource = ControlPolicyOrderResource::new();
        let response = resource
            .import_state(
                Context::new(),
                ImportResourceStateRequest {
                    type_name: TYPE_NAME.to_string(),
                    id: "acl-1".to_string(),
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.imported_resources.is_empty());
        assert_eq!(response.diagnostics[0].summary, "Invalid import ID");
    }
}
