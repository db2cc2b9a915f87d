//! HTTP client for the fleet v1 API.
//!
//! Endpoints used:
//!
//! - `GET    /fleet/v1/machines`        (paginated)
//! - `GET    /fleet/v1/units`           (paginated)
//! - `GET    /fleet/v1/units/{name}`
//! - `PUT    /fleet/v1/units/{name}`    create, or change the target state
//! - `DELETE /fleet/v1/units/{name}`
//! - `GET    /fleet/v1/state`           (paginated)
//!
//! Paginated endpoints return a `nextPageToken` that is passed back as a query
//! parameter until it is absent.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::{Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::types::{
    ActivationState, Machine, MachineId, OptionSet, TargetState, UnitName, UnitOption,
};

use super::api::{FleetApi, FleetUnit, UnitState};
use super::error::FleetApiError;

const API_PREFIX: &str = "/fleet/v1";

/// Timeout for a single HTTP request.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A fleet API client talking HTTP(S) to `fleetd`.
#[derive(Clone)]
pub struct FleetHttpClient {
    client: Client,
    base_url: String,
}

impl FleetHttpClient {
    /// Creates a client for the given endpoint, e.g. `http://127.0.0.1:49153`.
    pub fn new(endpoint: &str) -> Result<Self, FleetApiError> {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(FleetApiError::from_reqwest)?;

        Ok(Self {
            client,
            base_url: endpoint.trim_end_matches('/').to_string(),
        })
    }

    /// Returns the endpoint this client talks to.
    pub fn endpoint(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}{}", self.base_url, API_PREFIX, path)
    }

    fn unit_url(&self, name: &UnitName) -> String {
        self.url(&format!("/units/{}", name))
    }

    /// Fetches every page of a paginated collection.
    async fn get_all<P: Page>(&self, path: &str) -> Result<Vec<P::Item>, FleetApiError> {
        let url = self.url(path);
        let mut items = Vec::new();
        let mut token: Option<String> = None;

        loop {
            let mut request = self.client.get(&url);
            if let Some(ref t) = token {
                request = request.query(&[("nextPageToken", t.as_str())]);
            }

            let response = request.send().await.map_err(FleetApiError::from_reqwest)?;
            let page: P = decode(check_status(response).await?).await?;
            let (mut page_items, next) = page.into_parts();
            trace!(path, count = page_items.len(), "Fetched page");
            items.append(&mut page_items);

            match next {
                Some(t) if !t.is_empty() => token = Some(t),
                _ => break,
            }
        }

        Ok(items)
    }

    async fn put_unit(&self, name: &UnitName, body: &WireUnitUpdate<'_>) -> Result<(), FleetApiError> {
        let response = self
            .client
            .put(self.unit_url(name))
            .json(body)
            .send()
            .await
            .map_err(FleetApiError::from_reqwest)?;
        check_status(response).await?;
        Ok(())
    }
}

impl std::fmt::Debug for FleetHttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FleetHttpClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

impl FleetApi for FleetHttpClient {
    async fn machines(&self) -> Result<Vec<Machine>, FleetApiError> {
        let machines = self.get_all::<MachinePage>("/machines").await?;
        Ok(machines.into_iter().map(Machine::from).collect())
    }

    async fn units(&self) -> Result<Vec<FleetUnit>, FleetApiError> {
        let units = self.get_all::<UnitPage>("/units").await?;
        Ok(units.into_iter().map(FleetUnit::from).collect())
    }

    async fn unit(&self, name: &UnitName) -> Result<Option<FleetUnit>, FleetApiError> {
        let response = self
            .client
            .get(self.unit_url(name))
            .send()
            .await
            .map_err(FleetApiError::from_reqwest)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let unit: WireUnit = decode(check_status(response).await?).await?;
        Ok(Some(unit.into()))
    }

    async fn create_unit(
        &self,
        name: &UnitName,
        options: &OptionSet,
        desired_state: TargetState,
    ) -> Result<(), FleetApiError> {
        debug!(unit = %name, state = %desired_state, "PUT unit");
        self.put_unit(
            name,
            &WireUnitUpdate {
                desired_state,
                options: Some(&options.0),
            },
        )
        .await
    }

    async fn set_unit_target_state(
        &self,
        name: &UnitName,
        state: TargetState,
    ) -> Result<(), FleetApiError> {
        debug!(unit = %name, state = %state, "PUT unit target state");
        self.put_unit(
            name,
            &WireUnitUpdate {
                desired_state: state,
                options: None,
            },
        )
        .await
    }

    async fn destroy_unit(&self, name: &UnitName) -> Result<(), FleetApiError> {
        debug!(unit = %name, "DELETE unit");
        let response = self
            .client
            .delete(self.unit_url(name))
            .send()
            .await
            .map_err(FleetApiError::from_reqwest)?;

        // Already gone is as good as destroyed.
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(());
        }

        check_status(response).await?;
        Ok(())
    }

    async fn unit_states(&self) -> Result<Vec<UnitState>, FleetApiError> {
        let states = self.get_all::<StatePage>("/state").await?;
        Ok(states.into_iter().map(UnitState::from).collect())
    }
}

/// Turns a non-2xx response into a categorized error.
async fn check_status(response: Response) -> Result<Response, FleetApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(FleetApiError::from_status(status.as_u16(), body))
}

async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, FleetApiError> {
    response.json::<T>().await.map_err(FleetApiError::from_reqwest)
}

// ─── Wire Types ───────────────────────────────────────────────────────────────

/// A page of a paginated fleet collection.
trait Page: DeserializeOwned {
    type Item;

    fn into_parts(self) -> (Vec<Self::Item>, Option<String>);
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MachinePage {
    #[serde(default)]
    machines: Vec<WireMachine>,
    next_page_token: Option<String>,
}

impl Page for MachinePage {
    type Item = WireMachine;

    fn into_parts(self) -> (Vec<WireMachine>, Option<String>) {
        (self.machines, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMachine {
    id: String,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

impl From<WireMachine> for Machine {
    fn from(m: WireMachine) -> Self {
        Machine {
            id: MachineId(m.id),
            metadata: m.metadata,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UnitPage {
    #[serde(default)]
    units: Vec<WireUnit>,
    next_page_token: Option<String>,
}

impl Page for UnitPage {
    type Item = WireUnit;

    fn into_parts(self) -> (Vec<WireUnit>, Option<String>) {
        (self.units, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUnit {
    name: String,
    #[serde(default)]
    options: Vec<UnitOption>,
    desired_state: Option<TargetState>,
    current_state: Option<TargetState>,
    #[serde(rename = "machineID")]
    machine_id: Option<String>,
}

impl From<WireUnit> for FleetUnit {
    fn from(u: WireUnit) -> Self {
        FleetUnit {
            name: UnitName(u.name),
            machine_id: u.machine_id.filter(|m| !m.is_empty()).map(MachineId),
            options: OptionSet(u.options),
            desired_state: u.desired_state,
            current_state: u.current_state,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct WireUnitUpdate<'a> {
    desired_state: TargetState,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<&'a [UnitOption]>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatePage {
    #[serde(default)]
    states: Vec<WireUnitState>,
    next_page_token: Option<String>,
}

impl Page for StatePage {
    type Item = WireUnitState;

    fn into_parts(self) -> (Vec<WireUnitState>, Option<String>) {
        (self.states, self.next_page_token)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireUnitState {
    name: String,
    #[serde(rename = "machineID")]
    machine_id: Option<String>,
    systemd_active_state: Option<String>,
}

impl From<WireUnitState> for UnitState {
    fn from(s: WireUnitState) -> Self {
        UnitState {
            name: UnitName(s.name),
            machine_id: s.machine_id.filter(|m| !m.is_empty()).map(MachineId),
            active_state: s
                .systemd_active_state
                .as_deref()
                .map(ActivationState::parse)
                .unwrap_or(ActivationState::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_rooted_at_api_prefix() {
        let client = FleetHttpClient::new("http://fleet:49153/").unwrap();
        assert_eq!(client.endpoint(), "http://fleet:49153");
        assert_eq!(client.url("/machines"), "http://fleet:49153/fleet/v1/machines");
        assert_eq!(
            client.unit_url(&UnitName::new("svc-m1.service")),
            "http://fleet:49153/fleet/v1/units/svc-m1.service"
        );
    }

    #[test]
    fn machine_page_decodes() {
        let json = r#"{
            "machines": [
                {"id": "m1", "primaryIP": "10.0.0.1", "metadata": {"role": "worker"}},
                {"id": "m2", "primaryIP": "10.0.0.2"}
            ],
            "nextPageToken": "abc"
        }"#;
        let page: MachinePage = serde_json::from_str(json).unwrap();
        let (machines, next) = page.into_parts();
        assert_eq!(next.as_deref(), Some("abc"));

        let machines: Vec<Machine> = machines.into_iter().map(Machine::from).collect();
        assert_eq!(machines[0].id, MachineId::new("m1"));
        assert!(machines[0].has_tag("role"));
        assert!(machines[1].metadata.is_empty());
    }

    #[test]
    fn unit_page_decodes() {
        let json = r#"{
            "units": [{
                "name": "svc-m1.service",
                "options": [{"section": "Service", "name": "ExecStart", "value": "/bin/true"}],
                "desiredState": "launched",
                "currentState": "launched",
                "machineID": "m1"
            }, {
                "name": "other.service",
                "desiredState": "inactive",
                "machineID": ""
            }]
        }"#;
        let page: UnitPage = serde_json::from_str(json).unwrap();
        let (units, next) = page.into_parts();
        assert!(next.is_none());

        let units: Vec<FleetUnit> = units.into_iter().map(FleetUnit::from).collect();
        assert_eq!(units[0].machine_id, Some(MachineId::new("m1")));
        assert_eq!(units[0].desired_state, Some(TargetState::Launched));
        assert_eq!(units[0].options.get("Service", "ExecStart"), Some("/bin/true"));
        assert_eq!(units[1].machine_id, None);
        assert!(units[1].options.is_empty());
    }

    #[test]
    fn state_page_decodes() {
        let json = r#"{
            "states": [
                {"name": "a.service", "hash": "x", "machineID": "m1",
                 "systemdLoadState": "loaded", "systemdActiveState": "active", "systemdSubState": "running"},
                {"name": "b.service", "machineID": "m2", "systemdActiveState": "weird"},
                {"name": "c.service"}
            ]
        }"#;
        let page: StatePage = serde_json::from_str(json).unwrap();
        let states: Vec<UnitState> = page.into_parts().0.into_iter().map(UnitState::from).collect();
        assert_eq!(states[0].active_state, ActivationState::Active);
        assert_eq!(states[1].active_state, ActivationState::Unknown);
        assert_eq!(states[2].active_state, ActivationState::Unknown);
        assert_eq!(states[2].machine_id, None);
    }

    #[test]
    fn unit_update_omits_options_when_retargeting() {
        let body = WireUnitUpdate {
            desired_state: TargetState::Loaded,
            options: None,
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({"desiredState": "loaded"})
        );

        let options = vec![UnitOption::new("X-Fleet", "MachineID", "m1")];
        let body = WireUnitUpdate {
            desired_state: TargetState::Launched,
            options: Some(&options),
        };
        assert_eq!(
            serde_json::to_value(&body).unwrap(),
            serde_json::json!({
                "desiredState": "launched",
                "options": [{"section": "X-Fleet", "name": "MachineID", "value": "m1"}]
            })
        );
    }
}
