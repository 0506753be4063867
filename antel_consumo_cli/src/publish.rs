//! Publishes snapshot fields as Home Assistant sensor states through the
//! Supervisor API.

use std::time::Duration;

use antel_consumo_lib::ConsumptionSnapshot;
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{debug, warn};

/// Supervisor proxy to the Home Assistant core API.
pub const DEFAULT_SUPERVISOR_URL: &str = "http://supervisor/core/api";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(thiserror::Error, Debug)]
pub enum PublishError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status} for {entity}")]
    Status {
        entity: String,
        status: reqwest::StatusCode,
    },
}

/// One sensor update: `POST {base}/states/sensor.{entity}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorState {
    #[serde(skip)]
    pub entity: &'static str,
    pub state: Value,
    pub attributes: Map<String, Value>,
}

impl SensorState {
    fn new(entity: &'static str, state: impl Into<Value>, unit: Option<&str>, icon: &str) -> Self {
        let mut attributes = Map::new();
        if let Some(unit) = unit {
            attributes.insert("unit_of_measurement".into(), unit.into());
        }
        attributes.insert("icon".into(), icon.into());
        attributes.insert("friendly_name".into(), friendly_name(entity).into());
        Self {
            entity,
            state: state.into(),
            attributes,
        }
    }

    fn with_attribute(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.to_string(), value.into());
        self
    }
}

/// `antel_datos_usados` -> `Antel Datos Usados`.
fn friendly_name(entity: &str) -> String {
    entity
        .split('_')
        .filter(|word| !word.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

fn round(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

fn format_date(date: NaiveDate) -> String {
    date.format("%d/%m/%Y").to_string()
}

/// Sensor states for every field present in `snapshot`. Absent fields are
/// skipped. `daily` is today's usage from the baseline store.
pub fn sensor_states(
    snapshot: &ConsumptionSnapshot,
    daily: Option<(f64, NaiveDate)>,
) -> Vec<SensorState> {
    let mut states = Vec::new();
    if let Some(used) = snapshot.used_data_gb() {
        states.push(SensorState::new("antel_datos_usados", round(used, 2), Some("GB"), "mdi:download"));
    }
    if let Some((gb, day)) = daily {
        states.push(
            SensorState::new("antel_consumo_hoy", gb, Some("GB"), "mdi:calendar-today")
                .with_attribute("state_class", "total_increasing")
                .with_attribute("last_reset", day.format("%Y-%m-%d").to_string()),
        );
    }
    if let Some(total) = snapshot.total_data_gb() {
        states.push(SensorState::new("antel_datos_totales", round(total, 2), Some("GB"), "mdi:database"));
    }
    if let Some(remaining) = snapshot.remaining_data_gb() {
        states.push(SensorState::new(
            "antel_datos_restantes",
            round(remaining, 2),
            Some("GB"),
            "mdi:database-check",
        ));
    }
    if let Some(pct) = snapshot.percentage_used() {
        states.push(SensorState::new("antel_porcentaje_usado", round(pct, 1), Some("%"), "mdi:percent"));
    }
    if let Some(plan) = snapshot.plan_name() {
        states.push(SensorState::new("antel_plan", plan, None, "mdi:file-document"));
    }
    if let Some(period) = snapshot.billing_period() {
        let mut state = SensorState::new("antel_periodo_facturacion", period, None, "mdi:calendar");
        if let Some(cycle) = snapshot.billing_cycle() {
            state = state
                .with_attribute("start", cycle.start.format("%Y-%m-%d").to_string())
                .with_attribute("end", cycle.end.format("%Y-%m-%d").to_string());
        }
        states.push(state);
    }
    if let Some(days) = snapshot.days_until_renewal() {
        states.push(SensorState::new("antel_dias_para_renovar", days, Some("días"), "mdi:calendar-refresh"));
    }
    if let Some(end) = snapshot.contract_end_date() {
        states.push(SensorState::new("antel_fin_contrato", format_date(end), None, "mdi:calendar-end"));
    }
    if let Some(balance) = snapshot.topup_balance_gb() {
        states.push(SensorState::new(
            "antel_saldo_recargas",
            round(balance, 2),
            Some("GB"),
            "mdi:sim-outline",
        ));
    }
    if let Some(expires) = snapshot.topup_expiration() {
        states.push(SensorState::new(
            "antel_vencimiento_recargas",
            format_date(expires),
            None,
            "mdi:calendar-clock",
        ));
    }
    states
}

/// Home Assistant state publisher.
pub struct StatePublisher {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

impl StatePublisher {
    /// Publisher against `base_url`, normally [`DEFAULT_SUPERVISOR_URL`].
    pub fn with_base_url(base_url: &str, token: String) -> Result<Self, PublishError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        })
    }

    /// Posts every present field. Failures are logged and skipped; returns
    /// the number of sensors updated.
    pub async fn publish(
        &self,
        snapshot: &ConsumptionSnapshot,
        daily: Option<(f64, NaiveDate)>,
    ) -> usize {
        let mut published = 0;
        for state in sensor_states(snapshot, daily) {
            match self.post(&state).await {
                Ok(()) => {
                    debug!("Updated sensor.{}: {}", state.entity, state.state);
                    published += 1;
                }
                Err(e) => warn!("Failed to update sensor.{}: {}", state.entity, e),
            }
        }
        published
    }

    async fn post(&self, state: &SensorState) -> Result<(), PublishError> {
        let url = format!("{}/states/sensor.{}", self.base_url, state.entity);
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.token)
            .json(state)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            return Err(PublishError::Status {
                entity: state.entity.to_string(),
                status,
            });
        }
        Ok(())
    }
}
