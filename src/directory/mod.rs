//! On-demand client for the orchestrator's service/container REST API.
//!
//! No retries happen here. The regeneration cycle decides whether a failed
//! fetch skips the cycle; the next inbound event re-triggers naturally.

pub mod model;

use std::time::Duration;

use url::Url;

use crate::config::Config;
use model::{RawContainer, RawService, ServiceList, ServiceRecord, container_uuid, resolve_record};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, thiserror::Error)]
pub enum DirectoryError {
    #[error("service directory unavailable: {0}")]
    Unavailable(#[from] reqwest::Error),
    #[error("container {container} of service {service} has no VIRTUAL_HOST variable")]
    MalformedRecord { service: String, container: String },
}

pub struct DirectoryClient {
    http: reqwest::Client,
    base: Url,
    auth: String,
}

impl DirectoryClient {
    pub fn new(config: &Config) -> Self {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Unable to construct the HTTP client");
        Self {
            http,
            base: config.api_url.clone(),
            auth: config.auth.clone(),
        }
    }

    /// The full fetch-and-filter pass: every service that exposes an
    /// http/https port and whose reloaded state is serving, resolved down to
    /// host, ssl flag and sorted upstream IPs.
    ///
    /// A service missing its VIRTUAL_HOST is dropped from the batch with a
    /// warning instead of failing the whole cycle.
    pub async fn running_http_services(&self) -> Result<Vec<ServiceRecord>, DirectoryError> {
        let mut records = Vec::new();

        for listed in self.list_services().await? {
            if !listed.exposes_http() {
                continue;
            }
            // Reload the record; the listing may carry a stale state.
            let service = self.get_service(&listed.uuid).await?;
            if !service.state.is_serving() {
                continue;
            }
            match self.resolve(&service).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {
                    log::debug!("Service {} has no routable container", service.name);
                }
                Err(err @ DirectoryError::MalformedRecord { .. }) => {
                    log::warn!("Excluding service from config: {err}");
                }
                Err(err) => return Err(err),
            }
        }

        Ok(records)
    }

    async fn resolve(&self, service: &RawService) -> Result<Option<ServiceRecord>, DirectoryError> {
        let mut containers = Vec::with_capacity(service.containers.len());
        for uri in &service.containers {
            containers.push(self.get_container(container_uuid(uri)).await?);
        }
        resolve_record(service, &containers)
    }

    async fn list_services(&self) -> Result<Vec<RawService>, DirectoryError> {
        let list: ServiceList = self.get_json(self.endpoint(&["service"])).await?;
        Ok(list.objects)
    }

    async fn get_service(&self, uuid: &str) -> Result<RawService, DirectoryError> {
        self.get_json(self.endpoint(&["service", uuid])).await
    }

    async fn get_container(&self, uuid: &str) -> Result<RawContainer, DirectoryError> {
        self.get_json(self.endpoint(&["container", uuid])).await
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: String,
    ) -> Result<T, DirectoryError> {
        let response = self
            .http
            .get(&url)
            .header(reqwest::header::AUTHORIZATION, self.auth.as_str())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json().await?)
    }

    /// The API uses trailing slashes on resource paths.
    fn endpoint(&self, segments: &[&str]) -> String {
        let mut url = self.base.to_string();
        while url.ends_with('/') {
            url.pop();
        }
        for segment in segments {
            url.push('/');
            url.push_str(segment);
        }
        url.push('/');
        url
    }
}
