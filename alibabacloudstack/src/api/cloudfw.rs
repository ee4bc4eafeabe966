use serde_json::Value;

use super::client::{Client, Product};
use super::common::{json_array, json_string, RpcParams};
use super::error::Result;

pub struct CloudfwApi<'a> {
    client: &'a Client,
}

impl<'a> CloudfwApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn modify_control_policy_priority(
        &self,
        acl_uuid: &str,
        direction: &str,
        order: i64,
    ) -> Result<()> {
        let params = RpcParams::new()
            .add("AclUuid", acl_uuid)
            .add("Direction", direction)
            .add("Order", order);
        self.client
            .rpc(Product::Cloudfw, "ModifyControlPolicyPriority", params)
            .await
            .map(|_| ())
    }

    /// The policy with `acl_uuid` from the first page of `direction` policies
    pub async fn describe_control_policy(
        &self,
        acl_uuid: &str,
        direction: &str,
    ) -> Result<Option<Value>> {
        let params = RpcParams::new()
            .add("AclUuid", acl_uuid)
            .add("Direction", direction)
            .add("CurrentPage", 1)
            .add("PageSize", 100);
        let body = self
            .client
            .rpc(Product::Cloudfw, "DescribeControlPolicy", params)
            .await?;
        Ok(json_array(&body, "Policys")
            .iter()
            .find(|policy| json_string(policy, "AclUuid").as_deref() == Some(acl_uuid))
            .cloned())
    }
}
