//! Quick BI user resource

use async_trait::async_trait;
use serde_json::Value;
use tfplug::context::Context;
use tfplug::plan_modifier::UseStateForUnknown;
use tfplug::resource::{
    ConfigureResourceRequest, ConfigureResourceResponse, CreateResourceRequest,
    CreateResourceResponse, DeleteResourceRequest, DeleteResourceResponse,
    ImportResourceStateRequest, ImportResourceStateResponse, ReadResourceRequest,
    ReadResourceResponse, Resource, ResourceSchemaRequest, ResourceSchemaResponse,
    ResourceWithConfigure, ResourceWithImportState, UpdateResourceRequest,
    UpdateResourceResponse,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringInSlice;

use crate::api::common::{json_bool, json_f64, json_string};
use crate::api::quickbi::USER_GONE;
use crate::api::{ApiError, Client, Retry, RpcParams};
use crate::resources::{
    api_error, changed, get_bool, get_string, not_configured, provider_data_from, set_attr,
};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_quick_bi_user";

/// Organization role; the API takes it as an integer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserType {
    Developer,
    Visitor,
    Analyst,
}

impl UserType {
    pub fn code(self) -> i64 {
        match self {
            UserType::Developer => 1,
            UserType::Visitor => 2,
            UserType::Analyst => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(UserType::Developer),
            2 => Some(UserType::Visitor),
            3 => Some(UserType::Analyst),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UserType::Developer => "Developer",
            UserType::Visitor => "Visitor",
            UserType::Analyst => "Analyst",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "Developer" => Some(UserType::Developer),
            "Visitor" => Some(UserType::Visitor),
            "Analyst" => Some(UserType::Analyst),
            _ => None,
        }
    }
}

/// `account_name` may be configured as `<prefix>:<name>` while the API only
/// reports `<name>`; keep the configured form in that case.
fn account_name_for_state(configured: Option<String>, reported: Option<String>) -> Option<String> {
    match (configured, reported) {
        (Some(configured), Some(reported))
            if configured
                .split_once(':')
                .map(|(_, name)| name == reported)
                .unwrap_or(false) =>
        {
            Some(configured)
        }
        (_, reported) => reported,
    }
}

#[derive(Default)]
pub struct UserResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl UserResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn read_state(
        &self,
        ctx: &Context,
        client: &Client,
        id: &str,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, ApiError> {
        let user = Retry::new(TYPE_NAME, "QueryUserInfoByUserId")
            .run(ctx, || async move { client.quickbi().query_user(id).await })
            .await?;
        let Some(user) = user else {
            return Ok(None);
        };

        apply_user(&mut state, id, &user);
        Ok(Some(state))
    }

    fn user_params(planned: &DynamicValue) -> RpcParams {
        RpcParams::new()
            .add_optional("AdminUser", get_bool(planned, "admin_user"))
            .add_optional("AuthAdminUser", get_bool(planned, "auth_admin_user"))
            .add_optional("NickName", get_string(planned, "nick_name"))
            .add_optional(
                "UserType",
                get_string(planned, "user_type")
                    .and_then(|t| UserType::parse(&t))
                    .map(UserType::code),
            )
    }
}

fn apply_user(state: &mut DynamicValue, id: &str, user: &Value) {
    let _ = state.set_string(&AttributePath::new("id"), id.to_string());
    set_attr(
        state,
        "account_id",
        json_string(user, "AccountId").filter(|s| !s.is_empty()),
    );
    let account_name = account_name_for_state(
        get_string(state, "account_name"),
        json_string(user, "AccountName"),
    );
    set_attr(state, "account_name", account_name);
    set_attr(state, "admin_user", json_bool(user, "AdminUser"));
    set_attr(state, "auth_admin_user", json_bool(user, "AuthAdminUser"));
    set_attr(state, "nick_name", json_string(user, "NickName"));
    set_attr(
        state,
        "user_type",
        json_f64(user, "UserType")
            .and_then(|code| UserType::from_code(code as i64))
            .map(UserType::as_str),
    );
}

#[async_trait]
impl Resource for UserResource {
    fn type_name(&self) -> &str {
        TYPE_NAME
    }

    async fn schema(
        &self,
        _ctx: Context,
        _request: ResourceSchemaRequest,
    ) -> ResourceSchemaResponse {
        let schema = SchemaBuilder::new()
            .version(0)
            .description("Manages a user of the Quick BI organization")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("Quick BI user ID")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("account_id", AttributeType::String)
                    .description("Alibaba Cloud account ID of the user")
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("account_name", AttributeType::String)
                    .description("Account name, optionally prefixed with its account type")
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("admin_user", AttributeType::Bool)
                    .description("Whether the user is an organization administrator")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("auth_admin_user", AttributeType::Bool)
                    .description("Whether the user is a permission administrator")
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("nick_name", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("user_type", AttributeType::String)
                    .required()
                    .validator(StringInSlice::new(&["Analyst", "Developer", "Visitor"]))
                    .build(),
            )
            .build();

        ResourceSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn create(&self, ctx: Context, request: CreateResourceRequest) -> CreateResourceResponse {
        let Some(data) = &self.provider_data else {
            return CreateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };
        let client = data.client.as_ref();
        let planned = request.planned_state;

        let mut params = Self::user_params(&planned);
        if let Some(account_id) = get_string(&planned, "account_id") {
            params.insert("AccountId", account_id);
        }
        if let Some(account_name) = get_string(&planned, "account_name") {
            params.insert("AccountName", account_name);
        }

        let created = Retry::new(TYPE_NAME, "AddUser")
            .run(&ctx, || {
                let params = params.clone();
                async move { client.quickbi().add_user(params).await }
            })
            .await;

        let id = match created {
            Ok(id) => id,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create Quick BI user", &e)],
                }
            }
        };
        tracing::info!(user_id = %id, "created Quick BI user");

        let mut state = planned.clone();
        let _ = state.set_string(&AttributePath::new("id"), id.clone());

        match self.read_state(&ctx, client, &id, state.clone()).await {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Quick BI user disappeared after create",
                    format!("User {} was not found after creation", id),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to read Quick BI user", &e)],
            },
        }
    }

    async fn read(&self, ctx: Context, request: ReadResourceRequest) -> ReadResourceResponse {
        let Some(data) = &self.provider_data else {
            return ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![not_configured()],
                private: request.private,
                deferred: None,
            };
        };
        let Some(id) = get_string(&request.current_state, "id") else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            };
        };

        match self
            .read_state(&ctx, &data.client, &id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResourceResponse {
                new_state: Some(state),
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Ok(None) => {
                tracing::warn!(user_id = %id, "Quick BI user not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read Quick BI user", &e)],
                private: request.private,
                deferred: None,
            },
        }
    }

    async fn update(&self, ctx: Context, request: UpdateResourceRequest) -> UpdateResourceResponse {
        let Some(data) = &self.provider_data else {
            return UpdateResourceResponse {
                new_state: request.planned_state,
                private: vec![],
                diagnostics: vec![not_configured()],
            };
        };
        let client = data.client.as_ref();
        let prior = &request.prior_state;
        let planned = request.planned_state.clone();

        let Some(id) = get_string(prior, "id") else {
            return UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Missing ID",
                    "The prior state has no Quick BI user ID",
                )],
            };
        };

        let needs_update = ["admin_user", "auth_admin_user", "nick_name", "user_type"]
            .iter()
            .any(|name| changed(prior, &planned, name));

        if needs_update {
            let params = Self::user_params(&planned).add("UserId", &id);
            let updated = Retry::new(TYPE_NAME, "UpdateUser")
                .run(&ctx, || {
                    let params = params.clone();
                    async move { client.quickbi().update_user(params).await }
                })
                .await;
            if let Err(e) = updated {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to update Quick BI user", &e)],
                };
            }
        }

        match self.read_state(&ctx, client, &id, planned.clone()).await {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Quick BI user not found",
                    format!("User {} no longer exists", id),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![api_error("Failed to read Quick BI user", &e)],
            },
        }
    }

    async fn delete(&self, ctx: Context, request: DeleteResourceRequest) -> DeleteResourceResponse {
        let Some(data) = &self.provider_data else {
            return DeleteResourceResponse {
                diagnostics: vec![not_configured()],
            };
        };
        let client = data.client.as_ref();
        let Some(id) = get_string(&request.prior_state, "id") else {
            return DeleteResourceResponse {
                diagnostics: vec![],
            };
        };
        let user_id = id.as_str();

        match Retry::new(TYPE_NAME, "DeleteUser")
            .run(&ctx, || async move { client.quickbi().delete_user(user_id).await })
            .await
        {
            Ok(()) => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) if e.is_expected(USER_GONE) => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) => DeleteResourceResponse {
                diagnostics: vec![api_error("Failed to delete Quick BI user", &e)],
            },
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for UserResource {
    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureResourceRequest,
    ) -> ConfigureResourceResponse {
        match provider_data_from(request.provider_data) {
            Ok(data) => {
                self.provider_data = Some(data);
                ConfigureResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(diag) => ConfigureResourceResponse {
                diagnostics: vec![diag],
            },
        }
    }

    fn as_import_state(&self) -> Option<&dyn ResourceWithImportState> {
        Some(self)
    }
}

#[async_trait]
impl ResourceWithImportState for UserResource {
    async fn import_state(
        &self,
        ctx: Context,
        request: ImportResourceStateRequest,
    ) -> ImportResourceStateResponse {
        let mut response = ImportResourceStateResponse {
            imported_resources: vec![],
            diagnostics: vec![],
            deferred: None,
        };
        tfplug::import_state_passthrough_id(&ctx, AttributePath::new("id"), &request, &mut response);
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::test_helpers::form_param;
    use crate::resources::test_support::{object, provider_data, s};
    use mockito::{Matcher, Server};
    use tfplug::schema::{PlanModifier, PlanModifierRequest};
    use tfplug::types::Dynamic;

    const USER_BODY: &str = r#"{"RequestId":"r-1","Success":true,"Result":{
        "UserId":"u-1","AccountId":"1234","AccountName":"alice",
        "AdminUser":false,"AuthAdminUser":true,"NickName":"Alice","UserType":3}}"#;

    fn state() -> DynamicValue {
        object(&[
            ("id", s("u-1")),
            ("account_id", s("1234")),
            ("account_name", s("alice")),
            ("admin_user", Dynamic::Bool(false)),
            ("auth_admin_user", Dynamic::Bool(true)),
            ("nick_name", s("Alice")),
            ("user_type", s("Analyst")),
        ])
    }

    async fn configured(url: &str) -> UserResource {
        let mut resource = UserResource::new();
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

    #[test]
    fn user_type_codes() {
        for t in [UserType::Developer, UserType::Visitor, UserType::Analyst] {
            assert_eq!(UserType::from_code(t.code()), Some(t));
            assert_eq!(UserType::parse(t.as_str()), Some(t));
        }
        assert_eq!(UserType::Analyst.code(), 3);
        assert_eq!(UserType::from_code(0), None);
    }

    #[test]
    fn prefixed_account_name_is_kept() {
        assert_eq!(
            account_name_for_state(Some("ram:alice".into()), Some("alice".into())),
            Some("ram:alice".to_string())
        );
        assert_eq!(
            account_name_for_state(Some("ram:bob".into()), Some("alice".into())),
            Some("alice".to_string())
        );
    }

    #[tokio::test]
    async fn test_account_name_change_replaces_user() {
        let schema = UserResource::new()
            .schema(Context::new(), ResourceSchemaRequest)
            .await
            .schema;
        let account_name = schema
            .block
            .attributes
            .iter()
            .find(|a| a.name == "account_name")
            .unwrap();

        let replaces = account_name.plan_modifiers.iter().any(|modifier| {
            modifier
                .modify(PlanModifierRequest {
                    config_value: DynamicValue::new(s("bob")),
                    state_value: DynamicValue::new(s("alice")),
                    plan_value: DynamicValue::new(s("bob")),
                    path: AttributePath::new("account_name"),
                })
                .requires_replace
        });
        assert!(replaces);
    }

    #[tokio::test]
    async fn test_create_maps_user_type() {
        let mut server = Server::new_async().await;
        let add = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "AddUser"),
                form_param("Product", "quickbi-public"),
                form_param("AccountName", "alice"),
                form_param("UserType", "3"),
                form_param("AdminUser", "false"),
                form_param("AuthAdminUser", "true"),
            ]))
            .with_body(r#"{"RequestId":"r-0","Success":true,"Result":{"UserId":"u-1"}}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "QueryUserInfoByUserId"))
            .with_body(USER_BODY)
            .create_async()
            .await;

        let mut planned = state();
        let _ = planned.mark_unknown(&AttributePath::new("id"));
        let _ = planned.mark_unknown(&AttributePath::new("account_id"));

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
        assert_eq!(get_string(&response.new_state, "id").as_deref(), Some("u-1"));
        assert_eq!(
            get_string(&response.new_state, "user_type").as_deref(),
            Some("Analyst")
        );
        add.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_user_not_in_organization() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"Code":"User.Not.In.Organization","Message":"no such user","RequestId":"r-2"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state(),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.new_state.is_none());
        assert!(response.diagnostics.is_empty());
    }

    #[tokio::test]
    async fn test_update_without_changes_skips_update_user() {
        let mut server = Server::new_async().await;
        let update = server
            .mock("POST", "/")
            .match_body(form_param("Action", "UpdateUser"))
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "QueryUserInfoByUserId"))
            .with_body(USER_BODY)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(),
                    planned_state: state(),
                    config: state(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_update_user_type() {
        let mut server = Server::new_async().await;
        let update = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "UpdateUser"),
                form_param("UserId", "u-1"),
                form_param("UserType", "1"),
            ]))
            .with_body(r#"{"RequestId":"r-3","Success":true,"Result":true}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "QueryUserInfoByUserId"))
            .with_body(USER_BODY.replace(r#""UserType":3"#, r#""UserType":1"#))
            .create_async()
            .await;

        let mut planned = state();
        let _ = planned.set_string(&AttributePath::new("user_type"), "Developer".to_string());

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(),
                    planned_state: planned.clone(),
                    config: planned,
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        assert_eq!(
            get_string(&response.new_state, "user_type").as_deref(),
            Some("Developer")
        );
        update.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_tolerates_removed_user() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(400)
            .with_body(r#"{"Code":"User.Not.In.Organization","Message":"no such user","RequestId":"r-4"}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .delete(
                Context::new(),
                DeleteResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty());
    }
}
