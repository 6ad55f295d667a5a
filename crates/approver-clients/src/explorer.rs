// Copyright 2024 Msig Labs Inc.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
// http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde::{Deserialize, Serialize};
use subxt::utils::AccountId32;

use msig_approver_utils::{probe, Error, Result};

/// A client for a Subscan-style indexing service, used to look up
/// historical on-chain events that are no longer cheaply queryable from
/// the node itself.
#[derive(Debug, Clone)]
pub struct ExplorerClient {
    base_url: url::Url,
    api_key: Option<String>,
    client: reqwest::Client,
}

/// A `proxy.PureCreated` record recovered from the indexing service.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyCreated {
    /// The derived pure-proxy address.
    pub proxy: AccountId32,
    /// The multisig address the proxy delegates to.
    pub multisig: AccountId32,
}

#[derive(Debug, Deserialize)]
struct EventsResponse {
    data: Option<EventsData>,
}

#[derive(Debug, Deserialize)]
struct EventsData {
    count: u64,
    #[serde(default)]
    events: Vec<EventRecord>,
}

#[derive(Debug, Deserialize)]
struct EventRecord {
    /// The event parameters, JSON-encoded as a string by the service.
    params: String,
}

#[derive(Debug, Deserialize)]
struct EventParam {
    value: String,
}

impl ExplorerClient {
    /// Creates a new indexing service client.
    pub fn new(
        base_url: url::Url,
        api_key: Option<String>,
        client: reqwest::Client,
    ) -> Self {
        Self {
            base_url,
            api_key,
            client,
        }
    }

    /// Queries the most recent `proxy.PureCreated` event for the given
    /// multisig address. Returns `None` if the service has no record of a
    /// pure proxy created by this multisig.
    pub async fn proxy_created(
        &self,
        multisig: &AccountId32,
    ) -> Result<Option<ProxyCreated>> {
        #[derive(Serialize)]
        struct Body {
            row: u32,
            page: u32,
            module: &'static str,
            call: &'static str,
            address: String,
        }
        let url = self.base_url.join("api/scan/events")?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Explorer,
            address = %multisig,
            call = "PureCreated",
        );
        let mut request = self.client.post(url).json(&Body {
            row: 1,
            page: 0,
            module: "proxy",
            call: "PureCreated",
            address: multisig.to_string(),
        });
        if let Some(ref key) = self.api_key {
            request = request.header("X-API-Key", key);
        }
        let response: EventsResponse = request.send().await?.json().await?;
        let data = response.data.ok_or(Error::ExplorerApi {
            message: "missing data in events response".to_string(),
        })?;
        if data.count == 0 || data.events.is_empty() {
            return Ok(None);
        }
        // the params field is a JSON string containing the event arguments,
        // pure (created proxy) first, then the delegating account.
        let params: Vec<EventParam> =
            serde_json::from_str(&data.events[0].params)?;
        if params.len() < 2 {
            return Err(Error::ExplorerApi {
                message: format!(
                    "expected at least 2 event params, got {}",
                    params.len()
                ),
            });
        }
        let proxy = parse_account(&params[0].value)?;
        let delegator = parse_account(&params[1].value)?;
        Ok(Some(ProxyCreated {
            proxy,
            multisig: delegator,
        }))
    }
}

/// Parses a 32-byte public key (with or without a `0x` prefix) into an
/// account id.
fn parse_account(value: &str) -> Result<AccountId32> {
    let raw = value.trim_start_matches("0x");
    let bytes = hex::decode(raw).map_err(|e| Error::ExplorerApi {
        message: format!("invalid public key hex: {e}"),
    })?;
    let arr: [u8; 32] =
        bytes.as_slice().try_into().map_err(|_| Error::ExplorerApi {
            message: format!("expected 32 byte public key, got {}", raw.len() / 2),
        })?;
    Ok(AccountId32::from(arr))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_public_keys() {
        let hex_key =
            "d43593c715fdd31c61141abd04a99fd6822c8558854ccde39a5684e7a56da27d";
        let parsed = parse_account(hex_key).unwrap();
        let prefixed = parse_account(&format!("0x{hex_key}")).unwrap();
        assert_eq!(parsed, prefixed);
        // Alice's well-known ss58 address.
        assert_eq!(
            parsed.to_string(),
            "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY"
        );
    }

    #[test]
    fn rejects_short_keys() {
        assert!(parse_account("0xdeadbeef").is_err());
        assert!(parse_account("not-hex").is_err());
    }
}
