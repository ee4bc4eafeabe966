pub mod api;
pub mod data_sources;
pub mod provider_data;
pub mod resources;

pub use provider_data::AlibabacloudStackProviderData;

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tfplug::context::Context;
use tfplug::provider::{
    ConfigureProviderRequest, ConfigureProviderResponse, DataSourceFactory, Provider,
    ProviderMetadataRequest, ProviderMetadataResponse, ProviderSchemaRequest,
    ProviderSchemaResponse, ResourceFactory,
};
use tfplug::schema::{AttributeBuilder, AttributeType, SchemaBuilder};
use tfplug::types::{AttributePath, Diagnostic, DynamicValue};
use tfplug::validator::{IntBetween, StringInSlice};

const PROVIDER_NAME: &str = "alibabacloudstack";

pub struct AlibabacloudStackProvider {
    provider_data: Option<AlibabacloudStackProviderData>,
}

impl Default for AlibabacloudStackProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AlibabacloudStackProvider {
    pub fn new() -> Self {
        Self {
            provider_data: None,
        }
    }
}

/// Configured value first, then the environment variable
fn string_setting(config: &DynamicValue, name: &str, env: &str) -> Option<String> {
    config
        .get_string(&AttributePath::new(name))
        .ok()
        .or_else(|| std::env::var(env).ok())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required(name: &str, env: &str) -> Diagnostic {
    Diagnostic::error(
        format!(
            "{} is required (set in provider config or {} env var)",
            name, env
        ),
        format!("The provider cannot call the API without {}", name),
    )
    .with_attribute(AttributePath::new(name))
}

#[async_trait]
impl Provider for AlibabacloudStackProvider {
    fn type_name(&self) -> &str {
        PROVIDER_NAME
    }

    async fn metadata(
        &self,
        _ctx: Context,
        _request: ProviderMetadataRequest,
    ) -> ProviderMetadataResponse {
        ProviderMetadataResponse {
            type_name: PROVIDER_NAME.to_string(),
            server_capabilities: Default::default(),
        }
    }

    async fn schema(&self, _ctx: Context, _request: ProviderSchemaRequest) -> ProviderSchemaResponse {
        let schema = SchemaBuilder::new()
            .description("AlibabaCloudStack (Apsara Stack) provider")
            .attribute(
                AttributeBuilder::new("access_key", AttributeType::String)
                    .description("Access key ID. Falls back to ALIBABACLOUDSTACK_ACCESS_KEY")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("secret_key", AttributeType::String)
                    .description("Access key secret. Falls back to ALIBABACLOUDSTACK_SECRET_KEY")
                    .optional()
                    .sensitive()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("region", AttributeType::String)
                    .description("Region ID. Falls back to ALIBABACLOUDSTACK_REGION")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("domain", AttributeType::String)
                    .description("ASAPI gateway host. Falls back to ALIBABACLOUDSTACK_DOMAIN")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("protocol", AttributeType::String)
                    .description("HTTP or HTTPS, default HTTPS")
                    .optional()
                    .validator(StringInSlice::new(&["HTTP", "HTTPS"]))
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("insecure", AttributeType::Bool)
                    .description("Skip TLS certificate verification")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("department", AttributeType::String)
                    .description("Organization (department) ID sent with every request")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new("resource_group", AttributeType::String)
                    .description("Resource group ID sent with every request")
                    .optional()
                    .build(),
            )
            .attribute(
                AttributeBuilder::new(
                    "endpoints",
                    AttributeType::Map(Box::new(AttributeType::String)),
                )
                .description(
                    "Per-product endpoint overrides keyed by nas, arms, cms, ecs, cloudfw, quickbi, gdb or vpc",
                )
                .optional()
                .build(),
            )
            .attribute(
                AttributeBuilder::new("timeout", AttributeType::Number)
                    .description("Per-request HTTP timeout in seconds, default 60")
                    .optional()
                    .validator(IntBetween::new(1, 3600))
                    .build(),
            )
            .build();

        ProviderSchemaResponse {
            schema,
            diagnostics: vec![],
        }
    }

    async fn configure(
        &mut self,
        _ctx: Context,
        request: ConfigureProviderRequest,
    ) -> ConfigureProviderResponse {
        let config = &request.config;
        let mut diagnostics = vec![];

        let access_key = string_setting(config, "access_key", "ALIBABACLOUDSTACK_ACCESS_KEY");
        let secret_key = string_setting(config, "secret_key", "ALIBABACLOUDSTACK_SECRET_KEY");
        let region = string_setting(config, "region", "ALIBABACLOUDSTACK_REGION");
        let domain = string_setting(config, "domain", "ALIBABACLOUDSTACK_DOMAIN");
        let protocol = string_setting(config, "protocol", "ALIBABACLOUDSTACK_PROTOCOL")
            .unwrap_or_else(|| "HTTPS".to_string());
        let department = string_setting(config, "department", "ALIBABACLOUDSTACK_DEPARTMENT");
        let resource_group =
            string_setting(config, "resource_group", "ALIBABACLOUDSTACK_RESOURCE_GROUP");

        let insecure = config
            .get_bool(&AttributePath::new("insecure"))
            .ok()
            .or_else(|| {
                std::env::var("ALIBABACLOUDSTACK_INSECURE")
                    .ok()
                    .and_then(|v| v.parse::<bool>().ok())
            })
            .unwrap_or(false);

        let timeout = config
            .get_number(&AttributePath::new("timeout"))
            .ok()
            .or_else(|| {
                std::env::var("ALIBABACLOUDSTACK_TIMEOUT")
                    .ok()
                    .and_then(|v| v.parse::<f64>().ok())
            })
            .filter(|t| *t > 0.0)
            .map(|t| Duration::from_secs(t as u64))
            .unwrap_or(Duration::from_secs(60));

        let mut endpoints = HashMap::new();
        if let Ok(configured) = config.get_map(&AttributePath::new("endpoints")) {
            for (key, value) in configured {
                let Some(url) = value.as_str().filter(|u| !u.is_empty()) else {
                    continue;
                };
                if !api::Product::all().iter().any(|p| p.endpoint_key() == key) {
                    diagnostics.push(
                        Diagnostic::warning(
                            format!("Unknown endpoint key '{}'", key),
                            "Supported keys: nas, arms, cms, ecs, cloudfw, quickbi, gdb, vpc",
                        )
                        .with_attribute(AttributePath::new("endpoints").key(&key)),
                    );
                }
                endpoints.insert(key, url.to_string());
            }
        }

        if protocol != "HTTP" && protocol != "HTTPS" {
            diagnostics.push(Diagnostic::error(
                "Invalid protocol",
                format!("protocol must be HTTP or HTTPS, got '{}'", protocol),
            ));
        }
        if access_key.is_none() {
            diagnostics.push(required("access_key", "ALIBABACLOUDSTACK_ACCESS_KEY"));
        }
        if secret_key.is_none() {
            diagnostics.push(required("secret_key", "ALIBABACLOUDSTACK_SECRET_KEY"));
        }
        if region.is_none() {
            diagnostics.push(required("region", "ALIBABACLOUDSTACK_REGION"));
        }
        if domain.is_none() && endpoints.is_empty() {
            diagnostics.push(required("domain", "ALIBABACLOUDSTACK_DOMAIN"));
        }

        if diagnostics.iter().any(Diagnostic::is_error) {
            return ConfigureProviderResponse {
                diagnostics,
                provider_data: None,
            };
        }

        let client_config = api::ClientConfig {
            access_key: access_key.unwrap_or_default(),
            secret_key: secret_key.unwrap_or_default(),
            region: region.unwrap_or_default(),
            domain,
            protocol,
            insecure,
            department,
            resource_group,
            endpoints,
            timeout,
        };

        match api::Client::new(client_config) {
            Ok(client) => {
                tracing::info!(region = client.region(), "provider configured");
                let data = AlibabacloudStackProviderData::new(client);
                self.provider_data = Some(data.clone());
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: Some(Arc::new(data)),
                }
            }
            Err(e) => {
                diagnostics.push(Diagnostic::error(
                    "Failed to create API client",
                    e.to_string(),
                ));
                ConfigureProviderResponse {
                    diagnostics,
                    provider_data: None,
                }
            }
        }
    }

    fn resources(&self) -> HashMap<String, ResourceFactory> {
        let mut resources: HashMap<String, ResourceFactory> = HashMap::new();
        resources.insert(
            "alibabacloudstack_nas_file_system".to_string(),
            Box::new(|| Box::new(resources::FileSystemResource::new())),
        );
        resources.insert(
            "alibabacloudstack_nas_mount_target".to_string(),
            Box::new(|| Box::new(resources::MountTargetResource::new())),
        );
        resources.insert(
            "alibabacloudstack_quick_bi_user".to_string(),
            Box::new(|| Box::new(resources::UserResource::new())),
        );
        resources.insert(
            "alibabacloudstack_arms_alert_contact_group".to_string(),
            Box::new(|| Box::new(resources::AlertContactGroupResource::new())),
        );
        resources.insert(
            "alibabacloudstack_cloud_firewall_control_policy_order".to_string(),
            Box::new(|| Box::new(resources::ControlPolicyOrderResource::new())),
        );
        resources.insert(
            "alibabacloudstack_ecs_ebs_storage_set".to_string(),
            Box::new(|| Box::new(resources::EbsStorageSetResource::new())),
        );
        resources.insert(
            "alibabacloudstack_cms_metric_rule_template".to_string(),
            Box::new(|| Box::new(resources::MetricRuleTemplateResource::new())),
        );
        resources.insert(
            "alibabacloudstack_graph_database_db_instance".to_string(),
            Box::new(|| Box::new(resources::DbInstanceResource::new())),
        );
        resources
    }

    fn data_sources(&self) -> HashMap<String, DataSourceFactory> {
        let mut data_sources: HashMap<String, DataSourceFactory> = HashMap::new();
        data_sources.insert(
            "alibabacloudstack_nas_protocols".to_string(),
            Box::new(|| Box::new(data_sources::NasProtocolsDataSource::new())),
        );
        data_sources
    }
}
