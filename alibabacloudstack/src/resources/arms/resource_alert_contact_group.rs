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
use tfplug::types::{AttributePath, Diagnostic, Dynamic, DynamicValue};

use crate::api::common::{json_array, json_string};
use crate::api::{ApiError, Client, Retry};
use crate::resources::{
    api_error, changed, get_string, get_string_list, not_configured, provider_data_from,
    set_attr,
};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_arms_alert_contact_group";

#[derive(Default)]
pub struct AlertContactGroupResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl AlertContactGroupResource {
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
        let group = Retry::new(TYPE_NAME, "SearchAlertContactGroup")
            .run(ctx, || async move {
                client.arms().describe_alert_contact_group(id).await
            })
            .await?;
        let Some(group) = group else {
            return Ok(None);
        };

        let _ = state.set_string(&AttributePath::new("id"), id.to_string());
        set_attr(
            &mut state,
            "alert_contact_group_name",
            json_string(&group, "ContactGroupName"),
        );

        let ids = contact_ids(&group);
        if ids.is_empty() {
            set_attr::<Dynamic>(&mut state, "contact_ids", None);
        } else {
            let _ = state.set_list(
                &AttributePath::new("contact_ids"),
                ids.into_iter().map(Dynamic::String).collect(),
            );
        }
        Ok(Some(state))
    }
}

/// `Contacts[].ContactId` of a contact group
fn contact_ids(group: &Value) -> Vec<String> {
    json_array(group, "Contacts")
        .iter()
        .filter_map(|contact| json_string(contact, "ContactId"))
        .collect()
}

#[async_trait]
impl Resource for AlertContactGroupResource {
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
            .description("Manages an ARMS alert contact group")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("alert_contact_group_name", AttributeType::String)
                    .required()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "contact_ids",
                    AttributeType::Set(Box::new(AttributeType::String)),
                )
                .description("IDs of the alert contacts in the group")
                .optional()
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

        let name = get_string(&planned, "alert_contact_group_name").unwrap_or_default();
        let ids = get_string_list(&planned, "contact_ids");

        let created = Retry::new(TYPE_NAME, "CreateAlertContactGroup")
            .run(&ctx, || {
                let (name, ids) = (name.as_str(), ids.as_slice());
                async move { client.arms().create_alert_contact_group(name, ids).await }
            })
            .await;

        let id = match created {
            Ok(id) => id,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create ARMS alert contact group", &e)],
                }
            }
        };
        tracing::info!(id = %id, "created ARMS alert contact group");

        let mut state = planned;
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
                    "ARMS alert contact group disappeared after create",
                    format!("Contact group {} was not found after creation", id),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to read ARMS alert contact group", &e)],
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

        let (new_state, diagnostics) = match self
            .read_state(&ctx, &data.client, &id, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => (Some(state), vec![]),
            Ok(None) => {
                tracing::warn!(id = %id, "ARMS alert contact group not found, removing from state");
                (None, vec![])
            }
            Err(e) => (
                Some(request.current_state),
                vec![api_error("Failed to read ARMS alert contact group", &e)],
            ),
        };

        ReadResourceResponse {
            new_state,
            diagnostics,
            private: request.private,
            deferred: None,
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
        let id = get_string(prior, "id").unwrap_or_default();

        if changed(prior, &planned, "alert_contact_group_name")
            || changed(prior, &planned, "contact_ids")
        {
            let name = get_string(&planned, "alert_contact_group_name").unwrap_or_default();
            let ids = get_string_list(&planned, "contact_ids");
            let updated = Retry::new(TYPE_NAME, "UpdateAlertContactGroup")
                .run(&ctx, || {
                    let (id, name, ids) = (id.as_str(), name.as_str(), ids.as_slice());
                    async move {
                        client
                            .arms()
                            .update_alert_contact_group(id, name, ids)
                            .await
                    }
                })
                .await;
            if let Err(e) = updated {
                return UpdateResourceResponse {
                    new_state: request.prior_state,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to update ARMS alert contact group", &e)],
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
                    "ARMS alert contact group not found",
                    format!("Contact group {} no longer exists", id),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![api_error("Failed to read ARMS alert contact group", &e)],
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
        let group_id = id.as_str();

        let diagnostics = match Retry::new(TYPE_NAME, "DeleteAlertContactGroup")
            .run(&ctx, || async move {
                client.arms().delete_alert_contact_group(group_id).await
            })
            .await
        {
            Ok(()) => vec![],
            Err(e) => vec![api_error("Failed to delete ARMS alert contact group", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for AlertContactGroupResource {
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
impl ResourceWithImportState for AlertContactGroupResource {
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

    fn state(ids: &[&str]) -> DynamicValue {
        object(&[
            ("id", s("2001")),
            ("alert_contact_group_name", s("oncall")),
            (
                "contact_ids",
                Dynamic::List(ids.iter().map(|id| s(id)).collect()),
            ),
        ])
    }

    async fn configured(url: &str) -> AlertContactGroupResource {
        let mut resource = AlertContactGroupResource::new();
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
    async fn test_create_joins_contact_ids() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "CreateAlertContactGroup"),
                form_param("Product", "ARMS"),
                form_param("ContactGroupName", "oncall"),
                form_param("ContactIds", "11 12"),
            ]))
            .with_body(r#"{"ContactGroupId":2001,"RequestId":"r-0"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "SearchAlertContactGroup"),
                form_param("ContactGroupIds", "2001"),
                form_param("IsDetail", "true"),
            ]))
            .with_body(
                r#"{"RequestId":"r-1","ContactGroups":[{"ContactGroupId":2001,"ContactGroupName":"oncall",
                    "Contacts":[{"ContactId":11},{"ContactId":12}]}]}"#,
            )
            .create_async()
            .await;

        let mut planned = state(&["11", "12"]);
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
        assert_eq!(get_string(&response.new_state, "id").as_deref(), Some("2001"));
        assert_eq!(
            get_string_list(&response.new_state, "contact_ids"),
            vec!["11".to_string(), "12".to_string()]
        );
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_empty_result_clears_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"r-2","ContactGroups":[]}"#)
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .read(
                Context::new(),
                ReadResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    current_state: state(&["11"]),
                    private: vec![],
                    provider_meta: None,
                    client_capabilities: Default::default(),
                },
            )
            .await;

        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_update_only_when_changed() {
        let mut server = Server::new_async().await;
        let update = server
            .mock("POST", "/")
            .match_body(form_param("Action", "UpdateAlertContactGroup"))
            .expect(0)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(form_param("Action", "SearchAlertContactGroup"))
            .with_body(
                r#"{"ContactGroups":[{"ContactGroupName":"oncall","Contacts":[{"ContactId":"11"}]}]}"#,
            )
            .create_async()
            .await;

        let resource = configured(&server.url()).await;
        let response = resource
            .update(
                Context::new(),
                UpdateResourceRequest {
                    type_name: TYPE_NAME.to_string(),
                    prior_state: state(&["11"]),
                    planned_state: state(&["11"]),
                    config: state(&["11"]),
                    planned_private: vec![],
                    provider_meta: None,
                },
            )
            .await;

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        update.assert_async().await;
    }
}
