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

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use msig_approver_utils::{probe, Error, Result};

use crate::Credentials;

/// The display name given to signatories added to the address book
/// during multisig registration, until the user renames them.
pub const DEFAULT_ADDRESS_NAME: &str = "New Address";

/// A client for the off-chain backend API that stores multisigs, address
/// book entries and transaction notes.
///
/// Every response uses the `{ data, error }` envelope; a non-empty `error`
/// field is the failure signal regardless of the HTTP status code.
#[derive(Debug, Clone)]
pub struct BackendClient {
    base_url: url::Url,
    client: reqwest::Client,
}

/// The `{ data, error }` response envelope of the backend API.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    data: Option<T>,
    error: Option<String>,
}

/// Request body for registering a new multisig with the backend.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMultisigRequest {
    /// All signatory addresses (ss58), including the caller.
    pub signatories: Vec<String>,
    /// Number of approvals required to execute a call.
    pub threshold: u16,
    /// Display name of the multisig.
    pub multisig_name: String,
}

/// A stored multisig record, as returned by the backend.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultisigRecord {
    /// The multisig address (ss58).
    pub address: String,
    /// Display name of the multisig.
    pub name: String,
    /// All signatory addresses.
    pub signatories: Vec<String>,
    /// Number of approvals required to execute a call.
    pub threshold: u16,
    /// The derived pure-proxy address, if one has been created.
    #[serde(default)]
    pub proxy: Option<String>,
}

impl BackendClient {
    /// Creates a new backend client for the given base URL, reusing the
    /// provided HTTP client.
    pub fn new(base_url: url::Url, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        creds: &Credentials,
        body: &B,
    ) -> Result<T> {
        let url = self.base_url.join(endpoint)?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Backend,
            endpoint = %endpoint,
        );
        let response = self
            .client
            .post(url)
            .header("x-address", &creds.address)
            .header("x-signature", &creds.signature)
            .json(body)
            .send()
            .await?;
        let envelope: ApiResponse<T> = response.json().await?;
        match envelope.error {
            Some(message) if !message.is_empty() => {
                tracing::event!(
                    target: probe::TARGET,
                    tracing::Level::WARN,
                    kind = %probe::Kind::Backend,
                    endpoint = %endpoint,
                    errored = true,
                    error = %message,
                );
                Err(Error::BackendApi { message })
            }
            _ => envelope.data.ok_or(Error::BackendApi {
                message: "empty data in backend response".to_string(),
            }),
        }
    }

    /// Registers a new multisig with the backend.
    pub async fn create_multisig(
        &self,
        creds: &Credentials,
        request: &CreateMultisigRequest,
    ) -> Result<MultisigRecord> {
        self.post("createMultisig", creds, request).await
    }

    /// Registers a new multisig and adds every signatory to the caller's
    /// address book under [`DEFAULT_ADDRESS_NAME`].
    ///
    /// Address book entries are best-effort: by the time they are added
    /// the multisig is already stored, so failures are logged and the
    /// record is still returned.
    pub async fn register_multisig(
        &self,
        creds: &Credentials,
        request: &CreateMultisigRequest,
    ) -> Result<MultisigRecord> {
        let record = self.create_multisig(creds, request).await?;
        for signatory in &record.signatories {
            let added = self
                .add_to_address_book(creds, signatory, DEFAULT_ADDRESS_NAME)
                .await;
            if let Err(e) = added {
                tracing::warn!(
                    "failed to add {signatory} to the address book: {e}"
                );
            }
        }
        Ok(record)
    }

    /// Adds an entry to the caller's address book.
    pub async fn add_to_address_book(
        &self,
        creds: &Credentials,
        address: &str,
        name: &str,
    ) -> Result<Vec<AddressBookEntry>> {
        #[derive(Serialize)]
        struct Body<'a> {
            address: &'a str,
            name: &'a str,
        }
        self.post("addToAddressBook", creds, &Body { address, name })
            .await
    }

    /// Persists a free-text note against an executed transaction.
    pub async fn update_transaction_note(
        &self,
        creds: &Credentials,
        call_hash: &str,
        multisig_address: &str,
        note: &str,
    ) -> Result<serde_json::Value> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct Body<'a> {
            call_hash: &'a str,
            multisig_address: &'a str,
            note: &'a str,
        }
        self.post(
            "updateTransactionNote",
            creds,
            &Body {
                call_hash,
                multisig_address,
                note,
            },
        )
        .await
    }
}

/// One entry of the caller's address book.
#[derive(Debug, Clone, Deserialize)]
pub struct AddressBookEntry {
    /// The stored address (ss58).
    pub address: String,
    /// The display name for that address.
    pub name: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn sample_request() -> CreateMultisigRequest {
        CreateMultisigRequest {
            signatories: vec![
                "5GrwvaEF5zXb26Fz9rcQpDWS57CtERHpNehXCPcNoHGKutQY".to_string(),
                "5FHneW46xGXgs5mUiveU4sbTyGBzmstUspZC92UhjJM694ty".to_string(),
                "5FLSigC9HGRKVhB9FiEo4Y3koPsNmBmLJbpXg2mp1hXcS59Y".to_string(),
            ],
            threshold: 2,
            multisig_name: "treasury".to_string(),
        }
    }

    async fn mock_backend(request: &CreateMultisigRequest) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createMultisig"))
            .and(header("x-address", "5Grw..."))
            .and(header("x-signature", "0xsig"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": {
                    "address": "5DmsigDerived",
                    "name": "treasury",
                    "signatories": request.signatories.clone(),
                    "threshold": 2,
                },
                "error": null,
            })))
            .expect(1)
            .mount(&server)
            .await;
        server
    }

    fn client_for(server: &MockServer) -> BackendClient {
        let base = url::Url::parse(&server.uri()).unwrap();
        BackendClient::new(base, reqwest::Client::new())
    }

    #[tokio::test]
    async fn registration_fills_the_address_book() {
        let request = sample_request();
        let server = mock_backend(&request).await;
        // one address book entry per signatory, under the default name
        Mock::given(method("POST"))
            .and(path("/addToAddressBook"))
            .and(body_partial_json(json!({
                "name": DEFAULT_ADDRESS_NAME,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": [],
                "error": null,
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let creds = Credentials::new("5Grw...", "0xsig");
        let record =
            client.register_multisig(&creds, &request).await.unwrap();
        assert_eq!(record.address, "5DmsigDerived");
        assert_eq!(record.signatories.len(), 3);
    }

    #[tokio::test]
    async fn address_book_failures_do_not_fail_registration() {
        let request = sample_request();
        let server = mock_backend(&request).await;
        Mock::given(method("POST"))
            .and(path("/addToAddressBook"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "error": "address book is on fire",
            })))
            .expect(3)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let creds = Credentials::new("5Grw...", "0xsig");
        // the multisig is stored before any address book call happens
        let record =
            client.register_multisig(&creds, &request).await.unwrap();
        assert_eq!(record.name, "treasury");
    }

    #[tokio::test]
    async fn backend_errors_surface_from_the_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/createMultisig"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "data": null,
                "error": "invalid signature",
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        let creds = Credentials::new("5Grw...", "0xsig");
        let err = client
            .create_multisig(&creds, &sample_request())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("invalid signature"));
    }
}
