//! NAS file system resource

use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::defaults::StaticDefault;
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
use tfplug::types::{AttributePath, DynamicValue};
use tfplug::validator::{IntInSlice, StringInSlice, StringLenBetween};

use crate::api::common::{json_f64, json_string};
use crate::api::nas::FILE_SYSTEM_GONE;
use crate::api::{ApiError, Client, Refresh, Retry, RpcParams, StateConf};
use crate::resources::{
    api_error, changed, get_number, get_string, not_configured, provider_data_from, set_attr,
};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_nas_file_system";

/// Nas rejects calls while another operation on the file system is in flight
const STATUS_ORDERING: &[&str] = &["InvalidFileSystemStatus.Ordering"];

#[derive(Default)]
pub struct FileSystemResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl FileSystemResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn wait_running(&self, ctx: &Context, client: &Client, id: &str) -> Result<(), ApiError> {
        StateConf::new(&["Running"])
            .pending(&["Pending"])
            .fail(&["Stopped", "Stopping", "Deleting"])
            .interval(Duration::from_secs(3))
            .wait(ctx, || async move {
                Ok(match client.nas().describe_file_system(id).await? {
                    Some(fs) => Refresh::Found(json_string(&fs, "Status").unwrap_or_default()),
                    None => Refresh::Gone,
                })
            })
            .await
            .map(|_| ())
            .map_err(|e| e.wrap(TYPE_NAME, "waiting for file system Running"))
    }

    /// Sends `ModifyFileSystem` for whichever of description and capacity
    /// is given. Does nothing when neither is.
    async fn modify(
        &self,
        ctx: &Context,
        client: &Client,
        id: &str,
        description: Option<String>,
        capacity: Option<f64>,
    ) -> Result<(), ApiError> {
        if description.is_none() && capacity.is_none() {
            return Ok(());
        }

        let params = RpcParams::new()
            .add("FileSystemId", id)
            .add_optional("Description", description)
            .add_optional("VolumeSize", capacity.map(|c| c as i64));

        Retry::new(TYPE_NAME, "ModifyFileSystem")
            .retry_on_codes(STATUS_ORDERING)
            .run(ctx, || {
                let params = params.clone();
                async move { client.nas().modify_file_system(params).await }
            })
            .await
    }

    async fn read_state(
        &self,
        ctx: &Context,
        client: &Client,
        id: &str,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, ApiError> {
        let file_system = Retry::new(TYPE_NAME, "DescribeFileSystems")
            .run(ctx, || async move { client.nas().describe_file_system(id).await })
            .await?;

        let Some(fs) = file_system else {
            return Ok(None);
        };

        apply_file_system(&mut state, id, &fs);
        Ok(Some(state))
    }
}

fn non_empty(value: &Value, path: &str) -> Option<String> {
    json_string(value, path).filter(|s| !s.is_empty())
}

fn apply_file_system(state: &mut DynamicValue, id: &str, fs: &Value) {
    let _ = state.set_string(&AttributePath::new("id"), id.to_string());
    set_attr(state, "description", non_empty(fs, "Description"));
    set_attr(state, "protocol_type", non_empty(fs, "ProtocolType"));
    set_attr(state, "storage_type", non_empty(fs, "StorageType"));
    set_attr(
        state,
        "encrypt_type",
        Some(json_f64(fs, "EncryptType").unwrap_or(0.0)),
    );
    set_attr(state, "file_system_type", non_empty(fs, "FileSystemType"));
    set_attr(state, "capacity", json_f64(fs, "VolumeSize"));
    set_attr(state, "zone_id", non_empty(fs, "ZoneId"));
    set_attr(state, "kms_key_id", non_empty(fs, "KMSKeyId"));
}

#[async_trait]
impl Resource for FileSystemResource {
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
            .description("Manages a NAS file system")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("File system ID")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol_type", AttributeType::String)
                    .description("File transfer protocol")
                    .required()
                    .force_new()
                    .validator(StringInSlice::new(&["NFS", "SMB"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("storage_type", AttributeType::String)
                    .description("Storage class of the file system")
                    .required()
                    .force_new()
                    .validator(StringInSlice::new(&[
                        "Capacity",
                        "Performance",
                        "standard",
                        "advance",
                        "advance_100",
                        "advance_200",
                    ]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("file_system_type", AttributeType::String)
                    .description("standard or extreme")
                    .optional()
                    .computed()
                    .force_new()
                    .default(StaticDefault::string("standard"))
                    .validator(StringInSlice::new(&["standard", "extreme"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("description", AttributeType::String)
                    .optional()
                    .validator(StringLenBetween::new(2, 128))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("encrypt_type", AttributeType::Number)
                    .description("0 (none), 1 (NAS managed key) or 2 (KMS key)")
                    .optional()
                    .computed()
                    .force_new()
                    .default(StaticDefault::number(0.0))
                    .validator(IntInSlice::new(&[0, 1, 2]))
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
                AttributeBuilder::new("capacity", AttributeType::Number)
                    .description("Capacity in GiB")
                    .optional()
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("kms_key_id", AttributeType::String)
                    .optional()
                    .computed()
                    .force_new()
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

        let params = RpcParams::new()
            .add_optional("ProtocolType", get_string(&planned, "protocol_type"))
            .add_optional("StorageType", get_string(&planned, "storage_type"))
            .add_optional("FileSystemType", get_string(&planned, "file_system_type"))
            .add(
                "EncryptType",
                get_number(&planned, "encrypt_type").unwrap_or(0.0) as i64,
            )
            .add_optional("ZoneId", get_string(&planned, "zone_id"))
            .add_optional(
                "VolumeSize",
                get_number(&planned, "capacity").map(|c| c as i64),
            )
            .add_optional("KmsKeyId", get_string(&planned, "kms_key_id"));

        let created = Retry::new(TYPE_NAME, "CreateFileSystem")
            .retry_on_codes(STATUS_ORDERING)
            .run(&ctx, || {
                let params = params.clone();
                async move { client.nas().create_file_system(params).await }
            })
            .await;

        let id = match created {
            Ok(id) => id,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create NAS file system", &e)],
                }
            }
        };
        tracing::info!(id = %id, "created NAS file system");

        let mut state = planned.clone();
        let _ = state.set_string(&AttributePath::new("id"), id.clone());

        let result = async {
            self.wait_running(&ctx, client, &id).await?;
            self.modify(
                &ctx,
                client,
                &id,
                get_string(&planned, "description"),
                None,
            )
            .await?;
            self.read_state(&ctx, client, &id, planned.clone()).await
        }
        .await;

        match result {
            Ok(Some(new_state)) => CreateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![tfplug::Diagnostic::error(
                    "NAS file system disappeared after create",
                    format!("File system {} was not found after creation", id),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to create NAS file system", &e)],
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
                tracing::warn!(id = %id, "NAS file system not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read NAS file system", &e)],
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
                diagnostics: vec![tfplug::Diagnostic::error(
                    "Missing ID",
                    "The prior state has no file system ID",
                )],
            };
        };

        let description = changed(prior, &planned, "description")
            .then(|| get_string(&planned, "description").unwrap_or_default());
        let capacity = if changed(prior, &planned, "capacity") {
            get_number(&planned, "capacity")
        } else {
            None
        };

        let result = async {
            self.modify(&ctx, client, &id, description, capacity).await?;
            self.read_state(&ctx, client, &id, planned.clone()).await
        }
        .await;

        match result {
            Ok(Some(new_state)) => UpdateResourceResponse {
                new_state,
                private: vec![],
                diagnostics: vec![],
            },
            Ok(None) => UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![tfplug::Diagnostic::error(
                    "NAS file system not found",
                    format!("File system {} no longer exists", id),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to update NAS file system", &e)],
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

        let result = Retry::new(TYPE_NAME, "DeleteFileSystem")
            .retry_on_codes(STATUS_ORDERING)
            .run(&ctx, || {
                let id = id.clone();
                async move { client.nas().delete_file_system(&id).await }
            })
            .await;

        match result {
            Ok(()) => {
                tracing::info!(id = %id, "deleted NAS file system");
                DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(e) if e.is_expected(FILE_SYSTEM_GONE) => DeleteResourceResponse {
                diagnostics: vec![],
            },
            Err(e) => DeleteResourceResponse {
                diagnostics: vec![api_error("Failed to delete NAS file system", &e)],
            },
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for FileSystemResource {
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
impl ResourceWithImportState for FileSystemResource {
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
#[path = "./resource_file_system_test.rs"]
mod resource_file_system_test;
