use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum AgentStatus {
    #[serde(rename = "PENDING")]
    Pending,
    #[serde(rename = "ACTIVE")]
    Active,
    #[serde(rename = "INACTIVE")]
    Inactive,
    #[serde(rename = "SUSPENDED")]
    Suspended,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Active => "ACTIVE",
            Self::Inactive => "INACTIVE",
            Self::Suspended => "SUSPENDED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "ACTIVE" => Some(Self::Active),
            "INACTIVE" => Some(Self::Inactive),
            "SUSPENDED" => Some(Self::Suspended),
            _ => None,
        }
    }
}

/// A registered worker. Owned by the registry; the scheduler only reads it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub capabilities: BTreeSet<String>,
    #[serde(default)]
    pub networks: BTreeSet<String>,
    pub status: AgentStatus,
    pub owner: String,
    /// Quoted cost per step, in the same unit as task budgets.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cost_estimate: Option<f64>,
    /// Quoted execution time per step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub time_estimate_ms: Option<u64>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl Agent {
    pub fn new(
        id: String,
        name: String,
        owner: String,
        capabilities: impl IntoIterator<Item = String>,
        networks: impl IntoIterator<Item = String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id,
            name,
            capabilities: capabilities.into_iter().collect(),
            networks: networks.into_iter().collect(),
            status: AgentStatus::Pending,
            owner,
            cost_estimate: None,
            time_estimate_ms: None,
            created_at: now,
            updated_at: now,
            metadata: HashMap::new(),
        }
    }

    pub fn with_quote(mut self, cost_estimate: Option<f64>, time_estimate_ms: Option<u64>) -> Self {
        self.cost_estimate = cost_estimate;
        self.time_estimate_ms = time_estimate_ms;
        self
    }
}

/// Input for registering a worker.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterAgentInput {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub capabilities: Vec<String>,
    #[serde(default)]
    pub networks: Vec<String>,
    /// Roster files may declare a worker as already verified.
    #[serde(default)]
    pub status: Option<AgentStatus>,
    #[serde(default)]
    pub cost_estimate: Option<f64>,
    #[serde(default)]
    pub time_estimate_ms: Option<u64>,
}
