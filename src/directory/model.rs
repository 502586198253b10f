use serde::Deserialize;

use crate::directory::DirectoryError;

/// Lifecycle states reported by the orchestrator, both on stream events and
/// on service/container records. Anything the API grows later decodes as
/// `Unknown` and is ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum State {
    Starting,
    Running,
    #[serde(rename = "Partly running")]
    PartlyRunning,
    Scaling,
    Redeploying,
    Stopping,
    Terminating,
    Stopped,
    #[serde(rename = "Not running")]
    NotRunning,
    Terminated,
    #[serde(other)]
    Unknown,
}

impl State {
    /// A fleet change is known to be in progress.
    pub fn is_transitioning(self) -> bool {
        matches!(
            self,
            State::Scaling
                | State::Redeploying
                | State::Stopping
                | State::Starting
                | State::Terminating
        )
    }

    /// The service has settled, for better or worse.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            State::Running | State::Stopped | State::NotRunning | State::Terminated
        )
    }

    /// Service-level filter: only these states are worth routing to.
    pub fn is_serving(self) -> bool {
        matches!(self, State::Running | State::PartlyRunning)
    }

    /// Container-level filter: containers coming up are included so a rolling
    /// deploy never empties the upstream list.
    pub fn is_routable(self) -> bool {
        matches!(self, State::Starting | State::Running)
    }
}

#[derive(Debug, Deserialize)]
pub struct ServiceList {
    pub objects: Vec<RawService>,
}

#[derive(Debug, Deserialize)]
pub struct RawService {
    pub uuid: String,
    pub name: String,
    pub state: State,
    #[serde(default)]
    pub container_ports: Vec<PortSpec>,
    /// Container resource URIs; the trailing path segment is the uuid.
    #[serde(default)]
    pub containers: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct PortSpec {
    pub port_name: String,
}

impl RawService {
    pub fn exposes_http(&self) -> bool {
        self.container_ports
            .iter()
            .any(|p| p.port_name == "http" || p.port_name == "https")
    }
}

#[derive(Debug, Deserialize)]
pub struct RawContainer {
    pub uuid: String,
    pub private_ip: Option<String>,
    pub state: State,
    #[serde(default)]
    pub container_envvars: Vec<EnvVar>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EnvVar {
    pub key: String,
    pub value: String,
}

impl RawContainer {
    pub fn env(&self, key: &str) -> Option<&str> {
        self.container_envvars
            .iter()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }
}

/// What the template consumes, fully resolved and deterministic.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct ServiceRecord {
    pub name: String,
    pub host: String,
    pub ssl: bool,
    /// Private IPs of routable containers, sorted ascending so repeated
    /// renders of an unchanged topology are byte-identical.
    pub upstreams: Vec<String>,
}

/// Collapse a reloaded service and its fetched containers into a
/// [`ServiceRecord`]. Returns `Ok(None)` when the service has no routable
/// container to point the proxy at.
pub fn resolve_record(
    service: &RawService,
    containers: &[RawContainer],
) -> Result<Option<ServiceRecord>, DirectoryError> {
    let Some(first) = containers.first() else {
        return Ok(None);
    };

    let host = first
        .env("VIRTUAL_HOST")
        .ok_or_else(|| DirectoryError::MalformedRecord {
            service: service.name.clone(),
            container: first.uuid.clone(),
        })?
        .to_string();

    // A missing FORCE_SSL is an explicit "absent", which routes plain http.
    let ssl = first.env("FORCE_SSL").map(truthy).unwrap_or(false);

    let mut upstreams: Vec<String> = containers
        .iter()
        .filter(|c| c.state.is_routable())
        .filter_map(|c| c.private_ip.clone())
        .collect();
    upstreams.sort();

    if upstreams.is_empty() {
        return Ok(None);
    }

    Ok(Some(ServiceRecord {
        name: service.name.clone(),
        host,
        ssl,
        upstreams,
    }))
}

fn truthy(value: &str) -> bool {
    !matches!(value.trim(), "" | "0" | "false" | "False" | "FALSE")
}

/// Last path segment of a container resource URI.
pub fn container_uuid(uri: &str) -> &str {
    uri.trim_end_matches('/').rsplit('/').next().unwrap_or(uri)
}
