use serde_json::Value;

use super::client::{Client, Product};
use super::common::RpcParams;
use super::error::Result;

pub struct VpcApi<'a> {
    client: &'a Client,
}

impl<'a> VpcApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    /// `DescribeVSwitchAttributes`, `None` when the vswitch does not exist
    pub async fn describe_vswitch(&self, vswitch_id: &str) -> Result<Option<Value>> {
        let params = RpcParams::new().add("VSwitchId", vswitch_id);
        match self
            .client
            .rpc(Product::Vpc, "DescribeVSwitchAttributes", params)
            .await
        {
            Ok(body) if body.get("VSwitchId").is_some() => Ok(Some(body)),
            Ok(_) => Ok(None),
            Err(e) if e.is_expected(&["InvalidVswitchID.NotFound"]) || e.is_not_found() => {
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }
}
