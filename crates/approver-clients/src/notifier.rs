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

use msig_approver_utils::{probe, Error, Result};

use crate::Credentials;

/// A client for the out-of-band notification fan-out endpoint. Given a
/// list of addresses, a message and a link, the backend delivers alerts
/// (e.g. email) to the owners of those addresses.
#[derive(Debug, Clone)]
pub struct NotifierClient {
    base_url: url::Url,
    client: reqwest::Client,
}

/// One fan-out request to the notification endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// The addresses to notify (ss58).
    pub addresses: Vec<String>,
    /// The message body.
    pub message: String,
    /// An in-app link the alert should point at.
    pub link: String,
    /// The notification type understood by the backend, e.g. `sent`.
    #[serde(rename = "type")]
    pub kind: String,
    /// The network the transaction happened on.
    pub network: String,
}

#[derive(Debug, Deserialize)]
struct NotifyResponse {
    #[serde(default)]
    error: Option<String>,
}

impl NotifierClient {
    /// Creates a new notifier client for the given backend base URL.
    pub fn new(base_url: url::Url, client: reqwest::Client) -> Self {
        Self { base_url, client }
    }

    /// Delivers the given notification to all listed addresses.
    pub async fn send(
        &self,
        creds: &Credentials,
        notification: &Notification,
    ) -> Result<()> {
        let url = self.base_url.join("sendNotification")?;
        tracing::event!(
            target: probe::TARGET,
            tracing::Level::DEBUG,
            kind = %probe::Kind::Notification,
            recipients = notification.addresses.len(),
            message = %notification.message,
        );
        let response: NotifyResponse = self
            .client
            .post(url)
            .header("x-address", &creds.address)
            .header("x-signature", &creds.signature)
            .json(notification)
            .send()
            .await?
            .json()
            .await?;
        match response.error {
            Some(message) if !message.is_empty() => {
                Err(Error::BackendApi { message })
            }
            _ => Ok(()),
        }
    }
}
