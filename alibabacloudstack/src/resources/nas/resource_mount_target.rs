//! NAS mount target resource
//!
//! The Terraform ID is `<file_system_id>:<mount_target_domain>`. Older states
//! stored the bare domain; those are upgraded on read.

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
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::StringInSlice;

use crate::api::common::json_string;
use crate::api::nas::MOUNT_TARGET_GONE;
use crate::api::{ApiError, Client, Refresh, Retry, RpcParams, StateConf};
use crate::resources::{
    api_error, changed, get_string, not_configured, provider_data_from, set_attr, split_id,
};
use crate::AlibabacloudStackProviderData;

const TYPE_NAME: &str = "alibabacloudstack_nas_mount_target";
const CREATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const POLL_INTERVAL: Duration = Duration::from_secs(10);

/// `(file_system_id, mount_target_domain)` from a Terraform ID.
///
/// A bare domain such as `31a8e4-abc.cn-test-1.nas.example.com` is
/// resolved by taking the file system ID from its first `-` segment.
pub(crate) fn parse_mount_target_id(id: &str) -> Option<(String, String)> {
    if id.contains(':') {
        return split_id(id).map(|(fs, domain)| (fs.to_string(), domain.to_string()));
    }
    let fs = id.split('-').next().filter(|fs| !fs.is_empty())?;
    Some((fs.to_string(), id.to_string()))
}

#[derive(Default)]
pub struct MountTargetResource {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl MountTargetResource {
    pub fn new() -> Self {
        Self::default()
    }

    async fn describe(
        &self,
        ctx: &Context,
        client: &Client,
        fs: &str,
        domain: &str,
    ) -> Result<Option<Value>, ApiError> {
        Retry::new(TYPE_NAME, "DescribeMountTargets")
            .run(ctx, || async move {
                client.nas().describe_mount_target(fs, domain).await
            })
            .await
    }

    async fn modify(
        &self,
        ctx: &Context,
        client: &Client,
        fs: &str,
        domain: &str,
        access_group_name: Option<String>,
        status: Option<String>,
    ) -> Result<(), ApiError> {
        if access_group_name.is_none() && status.is_none() {
            return Ok(());
        }
        let params = RpcParams::new()
            .add("FileSystemId", fs)
            .add("MountTargetDomain", domain)
            .add_optional("AccessGroupName", access_group_name)
            .add_optional("Status", status);

        Retry::new(TYPE_NAME, "ModifyMountTarget")
            .run(ctx, || {
                let params = params.clone();
                async move { client.nas().modify_mount_target(params).await }
            })
            .await
    }

    async fn read_state(
        &self,
        ctx: &Context,
        client: &Client,
        fs: &str,
        domain: &str,
        mut state: DynamicValue,
    ) -> Result<Option<DynamicValue>, ApiError> {
        let Some(target) = self.describe(ctx, client, fs, domain).await? else {
            return Ok(None);
        };

        let _ = state.set_string(&AttributePath::new("id"), format!("{}:{}", fs, domain));
        set_attr(&mut state, "file_system_id", Some(fs));
        set_attr(&mut state, "mount_target_domain", Some(domain));
        set_attr(
            &mut state,
            "access_group_name",
            json_string(&target, "AccessGroup").filter(|s| !s.is_empty()),
        );
        set_attr(&mut state, "status", json_string(&target, "Status"));
        set_attr(
            &mut state,
            "vswitch_id",
            json_string(&target, "VswId").filter(|s| !s.is_empty()),
        );
        Ok(Some(state))
    }
}

#[async_trait]
impl Resource for MountTargetResource {
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
            .description("Manages a mount target of a NAS file system")
            .attribute(
                AttributeBuilder::new("id", AttributeType::String)
                    .description("<file_system_id>:<mount_target_domain>")
                    .computed()
                    .plan_modifier(UseStateForUnknown)
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("file_system_id", AttributeType::String)
                    .required()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("access_group_name", AttributeType::String)
                    .description("Permission group bound to the mount target")
                    .optional()
                    .computed()
                    .default(StaticDefault::string("DEFAULT_VPC_GROUP_NAME"))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("vswitch_id", AttributeType::String)
                    .description("VSwitch of a VPC mount target; classic network when unset")
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("security_group_id", AttributeType::String)
                    .optional()
                    .force_new()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("status", AttributeType::String)
                    .optional()
                    .computed()
                    .validator(StringInSlice::new(&["Active", "Inactive"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("mount_target_domain", AttributeType::String)
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

        let Some(fs) = get_string(&planned, "file_system_id") else {
            return CreateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Missing file_system_id",
                    "file_system_id is required to create a mount target",
                )],
            };
        };

        let mut params = RpcParams::new()
            .add("FileSystemId", &fs)
            .add("NetworkType", "Classic")
            .add_optional("AccessGroupName", get_string(&planned, "access_group_name"))
            .add_optional("SecurityGroupId", get_string(&planned, "security_group_id"));

        if let Some(vswitch_id) = get_string(&planned, "vswitch_id") {
            let vswitch = Retry::new(TYPE_NAME, "DescribeVSwitchAttributes")
                .run(&ctx, || {
                    let vswitch_id = vswitch_id.clone();
                    async move { client.vpc().describe_vswitch(&vswitch_id).await }
                })
                .await;
            let vpc_id = match vswitch {
                Ok(Some(vsw)) => json_string(&vsw, "VpcId").unwrap_or_default(),
                Ok(None) => {
                    return CreateResourceResponse {
                        new_state: planned,
                        private: vec![],
                        diagnostics: vec![Diagnostic::error(
                            "VSwitch not found",
                            format!("VSwitch {} does not exist", vswitch_id),
                        )
                        .with_attribute(AttributePath::new("vswitch_id"))],
                    };
                }
                Err(e) => {
                    return CreateResourceResponse {
                        new_state: planned,
                        private: vec![],
                        diagnostics: vec![api_error("Failed to look up VSwitch", &e)],
                    };
                }
            };
            params.insert("NetworkType", "Vpc");
            params.insert("VpcId", vpc_id);
            params.insert("VSwitchId", &vswitch_id);
        }

        let created = Retry::new(TYPE_NAME, "CreateMountTarget")
            .timeout(CREATE_TIMEOUT)
            .run(&ctx, || {
                let params = params.clone();
                async move { client.nas().create_mount_target(params).await }
            })
            .await;

        let domain = match created {
            Ok(domain) => domain,
            Err(e) => {
                return CreateResourceResponse {
                    new_state: planned,
                    private: vec![],
                    diagnostics: vec![api_error("Failed to create NAS mount target", &e)],
                }
            }
        };
        tracing::info!(file_system_id = %fs, domain = %domain, "created NAS mount target");

        let mut state = planned.clone();
        let _ = state.set_string(&AttributePath::new("id"), format!("{}:{}", fs, domain));
        set_attr(&mut state, "mount_target_domain", Some(domain.as_str()));

        let result = async {
            let observed = StateConf::new(&["Active"])
                .fail(&["Inactive"])
                .interval(POLL_INTERVAL)
                .timeout(CREATE_TIMEOUT)
                .wait(&ctx, || {
                    let (fs, domain) = (fs.as_str(), domain.as_str());
                    async move {
                        Ok(match client.nas().describe_mount_target(fs, domain).await? {
                            Some(t) => Refresh::Found(json_string(&t, "Status").unwrap_or_default()),
                            None => Refresh::Gone,
                        })
                    }
                })
                .await
                .map_err(|e| e.wrap(TYPE_NAME, "waiting for mount target Active"))?;

            let wanted = get_string(&planned, "status").filter(|s| *s != observed);
            self.modify(&ctx, client, &fs, &domain, None, wanted).await?;
            self.read_state(&ctx, client, &fs, &domain, state.clone())
                .await
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
                diagnostics: vec![Diagnostic::error(
                    "NAS mount target disappeared after create",
                    format!("Mount target {} was not found after creation", domain),
                )],
            },
            Err(e) => CreateResourceResponse {
                new_state: state,
                private: vec![],
                diagnostics: vec![api_error("Failed to create NAS mount target", &e)],
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

        let Some((fs, domain)) =
            get_string(&request.current_state, "id").and_then(|id| parse_mount_target_id(&id))
        else {
            return ReadResourceResponse {
                new_state: None,
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            };
        };

        match self
            .read_state(&ctx, &data.client, &fs, &domain, request.current_state.clone())
            .await
        {
            Ok(Some(state)) => ReadResourceResponse {
                new_state: Some(state),
                diagnostics: vec![],
                private: request.private,
                deferred: None,
            },
            Ok(None) => {
                tracing::warn!(file_system_id = %fs, domain = %domain, "NAS mount target not found, removing from state");
                ReadResourceResponse {
                    new_state: None,
                    diagnostics: vec![],
                    private: request.private,
                    deferred: None,
                }
            }
            Err(e) => ReadResourceResponse {
                new_state: Some(request.current_state),
                diagnostics: vec![api_error("Failed to read NAS mount target", &e)],
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

        let Some((fs, domain)) = get_string(prior, "id").and_then(|id| parse_mount_target_id(&id))
        else {
            return UpdateResourceResponse {
                new_state: planned,
                private: vec![],
                diagnostics: vec![Diagnostic::error(
                    "Invalid ID",
                    "Expected <file_system_id>:<mount_target_domain>",
                )],
            };
        };

        let access_group_name = changed(prior, &planned, "access_group_name")
            .then(|| get_string(&planned, "access_group_name"))
            .flatten();
        let status = changed(prior, &planned, "status")
            .then(|| get_string(&planned, "status"))
            .flatten();

        let result = async {
            self.modify(&ctx, client, &fs, &domain, access_group_name, status)
                .await?;
            self.read_state(&ctx, client, &fs, &domain, planned.clone())
                .await
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
                diagnostics: vec![Diagnostic::error(
                    "NAS mount target not found",
                    format!("Mount target {} no longer exists", domain),
                )],
            },
            Err(e) => UpdateResourceResponse {
                new_state: request.prior_state,
                private: vec![],
                diagnostics: vec![api_error("Failed to update NAS mount target", &e)],
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

        let Some((fs, domain)) =
            get_string(&request.prior_state, "id").and_then(|id| parse_mount_target_id(&id))
        else {
            return DeleteResourceResponse {
                diagnostics: vec![],
            };
        };
        let (fs, domain) = (fs.as_str(), domain.as_str());

        let deleted = Retry::new(TYPE_NAME, "DeleteMountTarget")
            .run(&ctx, || async move {
                client.nas().delete_mount_target(fs, domain).await
            })
            .await;

        match deleted {
            Ok(()) => {}
            Err(e) if e.is_expected(&["Forbidden.NasNotFound", "InvalidMountTarget.NotFound"]) => {
                return DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(e) => {
                return DeleteResourceResponse {
                    diagnostics: vec![api_error("Failed to delete NAS mount target", &e)],
                }
            }
        }

        let gone = StateConf::new(&[])
            .pending(&["Active", "Inactive"])
            .interval(POLL_INTERVAL)
            .wait(&ctx, || async move {
                match client.nas().describe_mount_target(fs, domain).await {
                    Ok(Some(t)) => Ok(Refresh::Found(
                        json_string(&t, "Status").unwrap_or_default(),
                    )),
                    Ok(None) => Ok(Refresh::Gone),
                    Err(e) if e.is_expected(MOUNT_TARGET_GONE) => Ok(Refresh::Gone),
                    Err(e) => Err(e),
                }
            })
            .await;

        match gone {
            Ok(_) => {
                tracing::info!(file_system_id = %fs, domain = %domain, "deleted NAS mount target");
                DeleteResourceResponse {
                    diagnostics: vec![],
                }
            }
            Err(e) => DeleteResourceResponse {
                diagnostics: vec![api_error(
                    "Failed waiting for NAS mount target deletion",
                    &e.wrap(TYPE_NAME, "waiting for deletion"),
                )],
            },
        }
    }
}

#[async_trait]
impl ResourceWithConfigure for MountTargetResource {
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
impl ResourceWithImportState for MountTargetResource {
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
#[path = "./resource_mount_target_test.rs"]
mod resource_mount_target_test;
