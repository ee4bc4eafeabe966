//! ECS storage set, a placement group for block storage partitions
//!
//! Every attribute forces replacement, so Update only refreshes state.

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

use crate::api::common::json_string;
use crate::api::ecs::STORAGE_SET_GONE;
use crate::api::{ApiError, Client, Retry};
use crate::resources::{api_error, get_string, not_configured, provider_data_from, set_attr};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_ecs_ebs_storage_set";

#[derive(Default)]
pub struct EbsStorageSetResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl EbsStorageSetResource {
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
        let storage_set = Retry::new(TYPE_NAME, "DescribeStorageSets")
            .run(ctx, || async move { client.ecs().describe_storage_set(id).await })
            .await?;
        let Some(storage_set) = storage_set else {
            return Ok(None);
        };

        let _ = state.set_string(&AttributePath::new("id"), id.to_string());
        apply_storage_set(&mut state, &storage_set);
        Ok(Some(state))
    }
}

fn apply_storage_set(state: &mut DynamicValue, storage_set: &Value) {
    set_attr(
        state,
        "storage_set_name",
        json_string(storage_set, "StorageSetName"),
    );
    set_attr(state, "zone_id", json_string(storage_set, "ZoneId"));
    set_attr(
        state,
        "maxpartition_number",
        json_string(storage_set, "StorageSetPartitionNumber"),
    );
    set_attr(
        state,
        "storage_set_id",
        json_string(storage_set, "StorageSetId"),
    );
}

#[async_trait]
impl Resource for EbsStorageSetResource {
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
            .description("Manages an ECS block storage set")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("storage_set_name", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("maxpartition_number", AttributeType::String)
                    .description("Maximum number of partitions in the storage set")
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("zone_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("storage_set_id", AttributeType::String)
                    .computed()
                    .plan_modifier(UseStateForUnknown)
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

        let name = get_string(&planned, "storage_set_name").unwrap_or_default();
        let max_partition = get_string(&planned, "maxpartition_number");
        let zone_id = get_string(&planned, "zone_id");

        let created = Retry::new(TYPE_NAME, "CreateStorageSet")
            .run(&ctx, || {
                let name = name.as_str();
                let max_partition = max_partition.as_deref();
                let zone_id = zone_id.as_deref();
                async move {
                    client
                        .ecs()
                        .create_storage_set(name, max_partition, zone_id)
                        .await
                }
            })
            .await;
        let id = match created {
            Ok(id) => id,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create storage set", &e)],
                }
            }
        };
        tracing::info!(id = %id, "created ECS storage set");

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
                    "Storage set disappeared after create",
                    format!("Storage set {} was not found after creation", id),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to read storage set", &e)],
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
                tracing::warn!(id = %id, "storage set not found, removing from state");
                (None, vec![])
            }
            Err(e) => (
                Some(request.current_state),
                vec![api_error("Failed to read storage set", &e)],
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
        let planned = request.planned_state;
        let Some(id) = get_string(&request.prior_state, "id") else {
            return UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![],
            };
        };

        match self
            .read_state(&ctx, &data.client, &id, planned.clone())
            .await
        {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Storage set not found",
                    format!("Storage set {} no longer exists", id),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![api_error("Failed to read storage set", &e)],
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
        let storage_set_id = id.as_str();

        let deleted = Retry::new(TYPE_NAME, "DeleteStorageSet")
            .run(&ctx, || async move {
                client.ecs().delete_storage_set(storage_set_id).await
            })
            .await;
        let diagnostics = match deleted {
            Ok(()) => vec![],
            Err(e) if e.is_expected(STORAGE_SET_GONE) => {
                tracing::debug!(id = %id, code = ?e.code(), "storage set already gone");
                vec![]
            }
            Err(e) => vec![api_error("Failed to delete storage set", &e)],
        };
        DeleteResourceResponse { diagnostics }
    }
}

#[async_trait]
impl ResourceWithConfigure for EbsStorageSetResource {
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
impl ResourceWithImportState for EbsStorageSetResource {
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
    use tfplug::types::Dynamic;

    const DESCRIBE: &str = r#"{"RequestId":"r-1","TotalCount":1,"StorageSets":{"StorageSet":[{
        "StorageSetId":"ss-1",
        "StorageSetName":"db-set",
        "StorageSetPartitionNumber":3,
        "ZoneId":"cn-test-1a"
    }]}}"#;

    fn state() -> DynamicValue {
        object(&[
            ("id", s("ss-1")),
            ("storage_set_name", s("db-set")),
            ("maxpartition_number", s("3")),
            ("zone_id", Dynamic::Null),
            ("storage_set_id", s("ss-1")),
        ])
    }

    async fn configured(url: &str) -> EbsStorageSetResource {
        let mut resource = EbsStorageSetResource::new();
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
    async fn test_create_reads_back_partition_count() {
        let mut server = Server::new_async().await;
        let create = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "CreateStorageSet"),
                form_param("Product", "Ecs"),
                form_param("Version", "2014-05-26"),
                form_param("StorageSetName", "db-set"),
                form_param("MaxPartitionNumber", "3"),
            ]))
            .with_body(r#"{"StorageSetId":"ss-1","RequestId":"r-0"}"#)
            .expect(1)
            .create_async()
            .await;
        server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "DescribeStorageSets"),
                form_param("StorageSetIds", r#"["ss-1"]"#),
            ]))
            .with_body(DESCRIBE)
            .create_async()
            .await;

        let mut planned = state();
        let _ = planned.mark_unknown(&AttributePath::new("id"));
        let _ = planned.mark_unknown(&AttributePath::new("zone_id"));
        let _ = planned.mark_unknown(&AttributePath::new("storage_set_id"));

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
        assert_eq!(get_string(&response.new_state, "id").as_deref(), Some("ss-1"));
        assert_eq!(
            get_string(&response.new_state, "zone_id").as_deref(),
            Some("cn-test-1a")
        );
        assert_eq!(
            get_string(&response.new_state, "maxpartition_number").as_deref(),
            Some("3")
        );
        create.assert_async().await;
    }

    #[tokio::test]
    async fn test_read_empty_list_clears_state() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/")
            .with_body(r#"{"RequestId":"r-2","StorageSets":{"StorageSet":[]}}"#)
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

        assert!(response.diagnostics.is_empty());
        assert!(response.new_state.is_none());
    }

    #[tokio::test]
    async fn test_update_only_refreshes() {
        let mut server = Server::new_async().await;
        let describe = server
            .mock("POST", "/")
            .match_body(form_param("Action", "DescribeStorageSets"))
            .with_body(DESCRIBE)
            .expect(1)
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
        describe.assert_async().await;
    }

    #[tokio::test]
    async fn test_delete_tolerates_forbidden() {
        let mut server = Server::new_async().await;
        let delete = server
            .mock("POST", "/")
            .match_body(Matcher::AllOf(vec![
                form_param("Action", "DeleteStorageSet"),
                form_param("StorageSetId", "ss-1"),
            ]))
            .with_status(403)
            .with_body(r#"{"Code":"Operation.Forbidden","Message":"no","RequestId":"r-3"}"#)
            .expect(1)
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

        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);
        delete.assert_async().await;
    }
}
