use serde::{Deserialize, Serialize};

use crate::core::{ContainerSize, TargetId};
use crate::error::{SchedResult, SchedulerError};

use super::{Dashboard, SetupState, TargetState};

pub const DASHBOARD_SNAPSHOT_JSON_SCHEMA_V1: u32 = 1;

/// Diagnostic view of one target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetSnapshot {
    pub id: TargetId,
    pub visualization: String,
    pub state: TargetState,
    pub setup: SetupState,
    pub busy: bool,
    pub pending_passes: Vec<String>,
    pub invalid_passes: Vec<String>,
    pub scales: Vec<String>,
    pub render_count: u64,
    pub size: ContainerSize,
    pub printing: bool,
}

/// Diagnostic view of a whole dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshot {
    pub targets: Vec<TargetSnapshot>,
    pub queued_passes: usize,
    pub held_passes: usize,
    pub live_scales: Vec<String>,
    pub printing: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardSnapshotJsonContractV1 {
    pub schema_version: u32,
    pub snapshot: DashboardSnapshot,
}

impl Dashboard {
    #[must_use]
    pub fn snapshot(&self) -> DashboardSnapshot {
        let targets = self
            .targets
            .values()
            .map(|target| TargetSnapshot {
                id: target.id(),
                visualization: target.type_name().to_owned(),
                state: target.state(),
                setup: target.setup_state(),
                busy: target.in_flight().is_some(),
                pending_passes: target.pending().names().map(str::to_owned).collect(),
                invalid_passes: self
                    .scheduler
                    .invalid_passes(target.id())
                    .into_iter()
                    .map(str::to_owned)
                    .collect(),
                scales: target.scales().keys().cloned().collect(),
                render_count: target.render_count(),
                size: target.size(),
                printing: target.is_printing(),
            })
            .collect();

        DashboardSnapshot {
            targets,
            queued_passes: self.scheduler.queued_len(),
            held_passes: self.scheduler.held_len(),
            live_scales: self.scales.live_scale_names(),
            printing: self.printing,
        }
    }
}

impl DashboardSnapshot {
    #[must_use]
    pub fn target(&self, id: TargetId) -> Option<&TargetSnapshot> {
        self.targets.iter().find(|target| target.id == id)
    }

    pub fn to_json_contract_v1_pretty(&self) -> SchedResult<String> {
        let payload = DashboardSnapshotJsonContractV1 {
            schema_version: DASHBOARD_SNAPSHOT_JSON_SCHEMA_V1,
            snapshot: self.clone(),
        };
        serde_json::to_string_pretty(&payload).map_err(|e| {
            SchedulerError::Serialization(format!("failed to serialize snapshot contract v1: {e}"))
        })
    }

    pub fn from_json_compat_str(input: &str) -> SchedResult<Self> {
        if let Ok(snapshot) = serde_json::from_str::<Self>(input) {
            return Ok(snapshot);
        }
        let payload: DashboardSnapshotJsonContractV1 =
            serde_json::from_str(input).map_err(|e| {
                SchedulerError::Serialization(format!("failed to parse snapshot json payload: {e}"))
            })?;
        if payload.schema_version != DASHBOARD_SNAPSHOT_JSON_SCHEMA_V1 {
            return Err(SchedulerError::Serialization(format!(
                "unsupported snapshot schema version: {}",
                payload.schema_version
            )));
        }
        Ok(payload.snapshot)
    }
}
