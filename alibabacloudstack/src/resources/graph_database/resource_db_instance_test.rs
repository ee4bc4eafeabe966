#[cfg(test)]
mod tests {
    use super::super::*;
    use crate::api::test_helpers::form_param;
    use crate::resources::test_support::{object, provider_data, s};
    use mockito::{Matcher, Server};

    fn describe_body(status: &str) -> String {
        format!(
            r#"{{"RequestId":"r-1","Items":{{"DBInstance":[{{
                "DBInstanceId":"gds-1",
                "DBInstanceStatus":"{}",
                "DBNodeClass":"gdb.r.xlarge",
                "DBInstanceNetworkType":"vpc",
                "DBVersion":"1.0",
                "Category":"ha",
                "DBInstanceStorageType":"cloud_essd",
                "DBNodeStorage":50,
                "PayType":"Postpaid",
                "DBInstanceDescription":"graph",
                "ZoneId":"cn-test-1a",
                "VSwitchId":"vsw-1",
                "VpcId":"vpc-1",
                "ConnectionString":"gds-1.graphdb.example.com"
            }}]}}}}"#,
            status
        )
    }

    const WHITELIST: &str = r#"{"RequestId":"r-2","Items":{"DbInstanceIpArray":[
        {"DBInstanceIPArrayName":"default","SecurityIps":"127.0.0.1"},
        {"DBInstanceIPArrayName":"hidden_gdb","SecurityIps":"100.104.0.0/16"}
    ]}}"#;

    fn ip_array(name: &str, ips: &str) -> Dynamic {
        object(&[
            ("db_instance_ip_array_name", s(name)),
            ("security_ips", s(ips)),
        ])
        .value
    }

    fn state(storage: f64, groups: Vec<Dynamic>) -> DynamicValue {
        object(&[
            ("id", s("gds-1")),
            ("db_node_class", s("gdb.r.xlarge")),
            ("db_instance_network_type", s("vpc")),
            ("db_version", s("1.0")),
            ("db_instance_category", s("HA")),
            ("db_instance_storage_type", s("cloud_essd")),
            ("db_node_storage", Dynamic::Number(storage)),
            ("payment_type", s("PayAsYouGo")),
            ("db_instance_description", s("graph")),
            ("zone_id", s("cn-test-1a")),
            ("vswitch_id", s("vsw-1")),
            ("vpc_id", s("vpc-1")),
            ("status", s("Running")),
            ("connection_string", s("gds-1.graphdb.example.com")),
            ("db_instance_ip_array", Dynamic::List(groups)),
        ])
    }

    async fn configured(url: &str) -> DbInstanceResource {
        let mut resource = DbInstanceResource::new();
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

    fn groups(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(name, ips)| (name.to_string(), ips.to_string()))
            .collect()
    }

    #[test]
    fn test_ip_array_changes_cover_and_delete() {
        let prior = groups(&[("default", "127.0.0.1"), ("office", "10.0.0.0/8")]);
        let planned = groups(&[("default", "127.0.0.2"), ("vpn", "192.168.0.1")]);

        let changes = ip_array_changes(&prior, &planned);
        assert_eq!(
            changes,
            vec![
                ("default".to_string(), "127.0.0.2".to_string(), "Cover"),
                ("vpn".to_string(), "192.168.0.1".to_string(), "Cover"),
                ("office".to_string(), "10.0.0.0/8".to_string(), "Delete"),
            ]
        );
        assert!(ip_array_changes(&planned, &planned).is_empty());
    }

    #[test]
    fn test_hidden_whitelist_groups_are_skipped() {
        let body: Value = serde_json::from_str(WHITELIST).unwrap();
        let listed = crate::api::common::json_array(&body, "Items.DbInstanceIpArray");

        let visible = visible_ip_arrays(listed, &groups(&[("default", "10.0.0.1")]));
        assert_eq!(visible, vec![ip_array("default", "127.0.0.1")]);
    }

    #[test]
    fn test_default_group_only_shown_when_configured() {
        let body: Value = serde_json::from_str(
            r#"{"Items":{"DbInstanceIpArray":[
                {"DBInstanceIPArrayName":"default","SecurityIps":"127.0.0.1"},
                {"DBInstanceIPArrayName":"office","SecurityIps":"10.0.0.0/8"}
            ]}}"#,
        )
        .unwrap();
        let listed = crate::api::common::json_array(&body, "Items.DbInstanceIpArray");

        assert_eq!(
            visible_ip_arrays(listed, &BTreeMap::new()),
            vec![ip_array("office", "10.0.0.0/8")]
        );
    }

    #[tokio::test]
    async fn test_create_without_whitelist_keeps_planned_groups() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "CreateDBInstance"))
            .with_body(r#"{"DBInstanceId":"gds-1","RequestId":"r-0"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAttribute"))
            .with_body(describe_body("Running"))
            .create_async()
            .await;
        let modify = server
            .mock("POST", "/")
            .match_body(form_param("Action", "ModifyDBInstanceAccessWhiteList"))
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAccessWhiteList"))
            .with_body(WHITELIST)
            .create_async()
            .await;

        let mut planned = state(50.0, vec![]);
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
        assert!(response
            .new_state
            .get_list(&AttributePath::new("db_instance_ip_array"))
            .unwrap()
            .is_empty());
        modify.assert_async().await;
    }

    #[test]
    fn test_create_params_map_payment_type() {
        let params = create_params(&state(50.0, vec![]));
        assert_eq!(params.get("PayType"), Some("Postpaid"));
        assert_eq!(params.get("DBInstanceVersion"), Some("1.0"));
        assert_eq!(params.get("DBNodeStorage"), Some("50"));
        assert!(Uuid::parse_str(params.get("ClientToken").unwrap()).is_ok());

        let empty = create_params(&DynamicValue::new(Dynamic::Map(Default::default())));
        assert_eq!(empty.get("PayType"), None);
    }

    #[tokio::test]
    async fn test_create_waits_and_applies_whitelist() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "CreateDBInstance"),
                form_param("Product", "gdb"),
                form_param("DBNodeClass", "gdb.r.xlarge"),
                form_param("DBInstanceCategory", "HA"),
                form_param("PayType", "Postpaid"),
                form_param("VPCId", "vpc-1"),
            ]))
            .with_body(r#"{"DBInstanceId":"gds-1","RequestId":"r-0"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAttribute"))
            .with_body(describe_body("Running"))
            .create_async()
            .await;
        let cover = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "ModifyDBInstanceAccessWhiteList"),
                form_param("DBInstanceIPArrayName", "default"),
                form_param("SecurityIps", "127.0.0.1"),
                form_param("ModifyMode", "Cover"),
            ]))
            .with_body(r#"{"RequestId":"r-3"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAccessWhiteList"))
            .with_body(WHITELIST)
            .create_async()
            .await;

        let mut planned = state(50.0, vec![ip_array("default", "127.0.0.1")]);
        for computed in ["id", "status", "connection_string"] {
            let _ = planned.mark_unknown(&AttributePath::new(computed));
        }

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
        assert_eq!(get_string(&response.new_state, "id").as_deref(), Some("gds-1"));
        assert_eq!(
            get_string(&response.new_state, "db_instance_category").as_deref(),
            Some("HA")
        );
        assert_eq!(
            get_string(&response.new_state, "payment_type").as_deref(),
            Some("PayAsYouGo")
        );
        assert_eq!(
            get_string(&response.new_state, "connection_string").as_deref(),
            Some("gds-1.graphdb.example.com")
        );
        create.assert_async().await;
        cover.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_fails_when_instance_is_deleting() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "CreateDBInstance"))
            .with_body(r#"{"DBInstanceId":"gds-1"}"#)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAttribute"))
            .with_body(describe_body("Deleting"))
            .create_async()
            .await;

        let planned = state(50.0, vec![]);
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

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("Deleting"));
        assert_eq!(get_string(&response.new_state, "id").as_deref(), Some("gds-1"));
    }

    #[tokio::test]
    async fn test_read_not_found_clears_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(404)
            .with_body(r#"{"Code":"InvalidDBInstanceId.NotFound","Message":"gone","RequestId":"r-4"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state(50.0, vec![]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_update_without_changes_sends_nothing() {
        let mut server = Server::new_async().await;
        let writes = server
            .mock("POST", "/")
            .match_body(Matcher::Regex("Action=Modify".to_string()))
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAttribute"))
            .with_body(describe_body("Running"))
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAccessWhiteList"))
            .with_body(WHITELIST)
            .create_async()
            .await;

        let current = state(50.0, vec![ip_array("default", "127.0.0.1")]);
        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: current.clone(),
                    planned_state: current.clone(),
                    config: current,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        writes.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_storage_changes_spec_and_waits() {
        let mut server = Server::new_async().await;
        let spec = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "ModifyDBInstanceSpec"),
                form_param("DBInstanceId", "gds-1"),
                form_param("DBNodeClass", "gdb.r.xlarge"),
                form_param("DBNodeStorage", "80"),
                form_param("DBInstanceStorageType", "cloud_essd"),
            ]))
            .with_body(r#"{"RequestId":"r-5"}"#)
            .expect(1)
            .create_async()
            .await;
        let describe = server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAttribute"))
            .with_body(describe_body("Running").replace("\"DBNodeStorage\":50", "\"DBNodeStorage\":80"))
            .expect(2)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAccessWhiteList"))
            .with_body(WHITELIST)
            .create_async()
            .await;

        let groups = vec![ip_array("default", "127.0.0.1")];
        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(50.0, groups.clone()),
                    planned_state: state(80.0, groups.clone()),
                    config: state(80.0, groups),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(get_number(&response.new_state, "db_node_storage"), Some(80.0));
        spec.assert_async().await;
        describe.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_waits_until_gone() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "DeleteDBInstance"),
                form_param("DBInstanceId", "gds-1"),
            ]))
            .with_body(r#"{"RequestId":"r-6"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAttribute"))
            .with_body(r#"{"RequestId":"r-7","Items":{"DBInstance":[]}}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(50.0, vec![]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_tolerates_missing_instance() {
        let mut server = Server::new_async().await;
        let describe = server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeDBInstanceAttribute"))
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "DeleteDBInstance"))
            .with_status(404)
            .with_body(r#"{"Code":"InvalidDBInstance.NotFound","Message":"gone","RequestId":"r-8"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(50.0, vec![]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        describe.assert_async().await;
    }
}
