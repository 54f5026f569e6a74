use crate::managers::hypervisor_backend::{BackendError, ConsoleStream, HypervisorBackend};
use agent_protocol::{
    Domain, DomainDefinition, DomainStateReport, HypervisorSpecs, SetStateRequest, StateAction,
};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use log::debug;
use reqwest::header::{CONNECTION, SEC_WEBSOCKET_KEY, SEC_WEBSOCKET_VERSION, UPGRADE};
use reqwest::{Client, Response, StatusCode, Url};
use rustls::ClientConfig;
use serde::de::DeserializeOwned;
use std::time::Duration;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgentTimeouts {
    pub request: Duration,
    pub connect: Duration,
}

impl Default for AgentTimeouts {
    fn default() -> Self {
        AgentTimeouts {
            request: Duration::from_secs(5),
            connect: Duration::from_secs(3),
        }
    }
}

/// HTTPS client bound to one agent. The tls configuration decides which
/// server certificate is acceptable, see `TlsIdentity::client_config`.
pub struct AgentClient {
    base_url: String,
    client: Client,
}

fn validate_url(agent_url: &str) -> Result<String, BackendError> {
    let url = Url::parse(agent_url.trim())
        .map_err(|err| BackendError::InvalidUrl(format!("{}: {}", agent_url, err)))?;
    if url.scheme() != "https" {
        return Err(BackendError::InvalidUrl(format!(
            "{}: scheme must be https",
            agent_url
        )));
    }
    if url.host_str().map_or(true, str::is_empty) {
        return Err(BackendError::InvalidUrl(format!(
            "{}: missing host",
            agent_url
        )));
    }
    Ok(url.as_str().trim_end_matches('/').to_string())
}

async fn check_status(response: Response) -> Result<Response, BackendError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BackendError::Status {
        status: status.as_u16(),
        body,
    })
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, BackendError> {
    let body = check_status(response).await?.bytes().await?;
    Ok(serde_json::from_slice(&body)?)
}

impl AgentClient {
    pub fn new(
        agent_url: &str,
        tls: ClientConfig,
        timeouts: AgentTimeouts,
    ) -> Result<Self, BackendError> {
        let base_url = validate_url(agent_url)?;
        let client = Client::builder()
            .use_preconfigured_tls(tls)
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|err| BackendError::Tls(err.to_string()))?;
        Ok(AgentClient { base_url, client })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BackendError> {
        debug!("GET {}{}", self.base_url, path);
        decode(self.client.get(self.url(path)).send().await?).await
    }
}

#[async_trait]
impl HypervisorBackend for AgentClient {
    async fn get_specs(&self) -> Result<HypervisorSpecs, BackendError> {
        self.get("/libvirt").await
    }

    async fn list_vms(&self) -> Result<Vec<Domain>, BackendError> {
        self.get("/libvirt/domains").await
    }

    async fn get_vm(&self, vm_id: &Uuid) -> Result<Domain, BackendError> {
        self.get(&format!("/libvirt/domain/{}", vm_id)).await
    }

    async fn get_vm_state(&self, vm_id: &Uuid) -> Result<DomainStateReport, BackendError> {
        self.get(&format!("/libvirt/domains/{}/state", vm_id)).await
    }

    async fn set_vm_state(
        &self,
        vm_id: &Uuid,
        action: StateAction,
    ) -> Result<DomainStateReport, BackendError> {
        let path = format!("/libvirt/domains/{}/state", vm_id);
        debug!("POST {}{} {}", self.base_url, path, action);
        let response = self
            .client
            .post(self.url(&path))
            .json(&SetStateRequest { state: action })
            .send()
            .await?;
        decode(response).await
    }

    async fn create_vm(&self, definition: &DomainDefinition) -> Result<(), BackendError> {
        let path = format!("/libvirt/domains/{}", definition.id);
        debug!("PUT {}{}", self.base_url, path);
        let response = self.client.put(self.url(&path)).json(definition).send().await?;
        check_status(response).await.map(|_| ())
    }

    async fn delete_vm(&self, vm_id: &Uuid) -> Result<(), BackendError> {
        let path = format!("/libvirt/domains/{}", vm_id);
        debug!("DELETE {}{}", self.base_url, path);
        let response = self.client.delete(self.url(&path)).send().await?;
        check_status(response).await.map(|_| ())
    }

    async fn open_console(&self, vm_id: &Uuid) -> Result<ConsoleStream, BackendError> {
        let path = format!("/libvirt/domains/{}/console", vm_id);
        debug!("Upgrading {}{}", self.base_url, path);
        let response = self
            .client
            .get(self.url(&path))
            .header(CONNECTION, "Upgrade")
            .header(UPGRADE, "websocket")
            .header(SEC_WEBSOCKET_VERSION, "13")
            .header(SEC_WEBSOCKET_KEY, STANDARD.encode(Uuid::new_v4().as_bytes()))
            .send()
            .await?;
        if response.status() != StatusCode::SWITCHING_PROTOCOLS {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::Console(format!(
                "agent answered {} instead of switching protocols: {}",
                status, body
            )));
        }
        let upgraded = response
            .upgrade()
            .await
            .map_err(|err| BackendError::Console(err.to_string()))?;
        Ok(Box::new(upgraded))
    }
}
