use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use super::common::{json_bool, json_string, RpcParams};
use super::error::{ApiError, Result};
use super::signer;

/// Cloud products reachable through the ASAPI gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Product {
    Nas,
    Arms,
    Cms,
    Ecs,
    Cloudfw,
    QuickBi,
    Gdb,
    Vpc,
}

impl Product {
    /// Value of the `Product` request parameter
    pub fn name(&self) -> &'static str {
        match self {
            Product::Nas => "Nas",
            Product::Arms => "ARMS",
            Product::Cms => "Cms",
            Product::Ecs => "Ecs",
            Product::Cloudfw => "Cloudfw",
            Product::QuickBi => "quickbi-public",
            Product::Gdb => "gdb",
            Product::Vpc => "Vpc",
        }
    }

    pub fn version(&self) -> &'static str {
        match self {
            Product::Nas => "2017-06-26",
            Product::Arms => "2019-08-08",
            Product::Cms => "2019-01-01",
            Product::Ecs => "2014-05-26",
            Product::Cloudfw => "2017-12-07",
            Product::QuickBi => "2022-03-01",
            Product::Gdb => "2019-09-03",
            Product::Vpc => "2016-04-28",
        }
    }

    /// Key in the provider `endpoints` map
    pub fn endpoint_key(&self) -> &'static str {
        match self {
            Product::Nas => "nas",
            Product::Arms => "arms",
            Product::Cms => "cms",
            Product::Ecs => "ecs",
            Product::Cloudfw => "cloudfw",
            Product::QuickBi => "quickbi",
            Product::Gdb => "gdb",
            Product::Vpc => "vpc",
        }
    }

    pub fn all() -> &'static [Product] {
        &[
            Product::Nas,
            Product::Arms,
            Product::Cms,
            Product::Ecs,
            Product::Cloudfw,
            Product::QuickBi,
            Product::Gdb,
            Product::Vpc,
        ]
    }
}

#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub access_key: String,
    pub secret_key: String,
    pub region: String,
    /// ASAPI gateway host, e.g. `server.asapi.cn-qingdao-env17-d01.intra.env17e.shuguang.com`
    pub domain: Option<String>,
    pub protocol: String,
    pub insecure: bool,
    pub department: Option<String>,
    pub resource_group: Option<String>,
    pub endpoints: HashMap<String, String>,
    pub timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            access_key: String::new(),
            secret_key: String::new(),
            region: String::new(),
            domain: None,
            protocol: "HTTPS".to_string(),
            insecure: false,
            department: None,
            resource_group: None,
            endpoints: HashMap::new(),
            timeout: Duration::from_secs(60),
        }
    }
}

/// Signed RPC client for the AlibabaCloudStack APIs
#[derive(Clone)]
pub struct Client {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http_client: reqwest::Client,
    config: ClientConfig,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("region", &self.inner.config.region)
            .field("domain", &self.inner.config.domain)
            .finish()
    }
}

impl Client {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(ApiError::Config(
                "access_key and secret_key must not be empty".to_string(),
            ));
        }

        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .danger_accept_invalid_certs(config.insecure)
            .build()?;

        Ok(Self {
            inner: Arc::new(ClientInner {
                http_client,
                config,
            }),
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    pub fn region(&self) -> &str {
        &self.inner.config.region
    }

    /// Base URL for `product`: an explicit endpoint wins over the gateway domain
    pub fn endpoint(&self, product: Product) -> Result<String> {
        let config = &self.inner.config;
        let scheme = config.protocol.to_lowercase();

        let host = match config.endpoints.get(product.endpoint_key()) {
            Some(endpoint) if !endpoint.trim().is_empty() => endpoint.trim().to_string(),
            _ => match config.domain.as_deref().map(str::trim) {
                Some(domain) if !domain.is_empty() => domain.to_string(),
                _ => {
                    return Err(ApiError::NoEndpoint {
                        product: product.name().to_string(),
                        key: product.endpoint_key().to_string(),
                    })
                }
            },
        };

        let url = if host.contains("://") {
            host
        } else {
            format!("{}://{}", scheme, host)
        };
        Ok(url.trim_end_matches('/').to_string())
    }

    /// Invoke `action` on `product` and return the decoded JSON body
    pub async fn rpc(&self, product: Product, action: &str, params: RpcParams) -> Result<Value> {
        let url = format!("{}/", self.endpoint(product)?);
        let form = self.signed_form(product, action, params);

        tracing::debug!(
            product = product.name(),
            action,
            "invoking {} {}",
            product.name(),
            action
        );

        let response = self
            .inner
            .http_client
            .post(&url)
            .headers(self.headers())
            .form(&form)
            .send()
            .await?;

        let status = response.status().as_u16();
        let text = response.text().await?;
        tracing::debug!(action, status, "response body: {}", text);

        let body = if text.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            match serde_json::from_str::<Value>(&text) {
                Ok(body) => body,
                Err(_) if status >= 400 => {
                    return Err(ApiError::Service {
                        status,
                        code: status.to_string(),
                        message: text,
                        request_id: String::new(),
                    })
                }
                Err(e) => {
                    return Err(ApiError::Parse(format!(
                        "{} returned invalid JSON: {}",
                        action, e
                    )))
                }
            }
        };

        check_response(status, body)
    }

    fn signed_form(
        &self,
        product: Product,
        action: &str,
        params: RpcParams,
    ) -> std::collections::BTreeMap<String, String> {
        let config = &self.inner.config;
        let mut form = params.into_inner();

        let mut put = |key: &str, value: String| {
            form.entry(key.to_string()).or_insert(value);
        };
        put("Action", action.to_string());
        put("Version", product.version().to_string());
        put("Format", "JSON".to_string());
        put("AccessKeyId", config.access_key.clone());
        put("SignatureMethod", signer::SIGNATURE_METHOD.to_string());
        put("SignatureVersion", signer::SIGNATURE_VERSION.to_string());
        put("SignatureNonce", uuid::Uuid::new_v4().to_string());
        put(
            "Timestamp",
            chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string(),
        );
        put("RegionId", config.region.clone());
        put("Product", product.name().to_string());
        if let Some(department) = &config.department {
            put("OrganizationId", department.clone());
            put("Department", department.clone());
        }
        if let Some(resource_group) = &config.resource_group {
            put("ResourceGroup", resource_group.clone());
        }

        let string_to_sign = signer::string_to_sign("POST", &form);
        let signature = signer::sign(&config.secret_key, &string_to_sign);
        form.insert("Signature".to_string(), signature);
        form
    }

    fn headers(&self) -> HeaderMap {
        let config = &self.inner.config;
        let mut headers = HeaderMap::new();

        let mut put = |name: &'static str, value: &str| {
            if let Ok(value) = HeaderValue::from_str(value) {
                headers.insert(HeaderName::from_static(name), value);
            }
        };
        put("x-acs-regionid", &config.region);
        if let Some(department) = &config.department {
            put("x-acs-organizationid", department);
        }
        if let Some(resource_group) = &config.resource_group {
            put("x-acs-resourcegroupid", resource_group);
        }
        headers
    }

    pub fn nas(&self) -> super::nas::NasApi<'_> {
        super::nas::NasApi::new(self)
    }

    pub fn arms(&self) -> super::arms::ArmsApi<'_> {
        super::arms::ArmsApi::new(self)
    }

    pub fn cms(&self) -> super::cms::CmsApi<'_> {
        super::cms::CmsApi::new(self)
    }

    pub fn ecs(&self) -> super::ecs::EcsApi<'_> {
        super::ecs::EcsApi::new(self)
    }

    pub fn cloudfw(&self) -> super::cloudfw::CloudfwApi<'_> {
        super::cloudfw::CloudfwApi::new(self)
    }

    pub fn quickbi(&self) -> super::quickbi::QuickBiApi<'_> {
        super::quickbi::QuickBiApi::new(self)
    }

    pub fn gdb(&self) -> super::gdb::GdbApi<'_> {
        super::gdb::GdbApi::new(self)
    }

    pub fn vpc(&self) -> super::vpc::VpcApi<'_> {
        super::vpc::VpcApi::new(self)
    }
}

/// Map error bodies to `ApiError::Service`. Besides HTTP errors the gateway
/// reports failures in 200 responses through `Success=false` or
/// `asapiSuccess=false`.
fn check_response(status: u16, body: Value) -> Result<Value> {
    let code = json_string(&body, "Code").or_else(|| json_string(&body, "errorCode"));
    let failed = status >= 400
        || json_bool(&body, "asapiSuccess") == Some(false)
        || (json_bool(&body, "Success") == Some(false)
            && code.as_deref().map(|c| c != "200").unwrap_or(true));

    if !failed {
        return Ok(body);
    }

    let message = json_string(&body, "Message")
        .or_else(|| json_string(&body, "errorMsg"))
        .or_else(|| json_string(&body, "message"))
        .unwrap_or_default();
    let request_id = json_string(&body, "RequestId")
        .or_else(|| json_string(&body, "asapiRequestId"))
        .unwrap_or_default();

    Err(ApiError::Service {
        status,
        code: code.unwrap_or_else(|| status.to_string()),
        message,
        request_id,
    })
}
