use serde::{Deserialize, Serialize};

/// Opaque ID types for type safety
pub type SessionId = String;
pub type ConnectionId = String;

/// Materialized state of a collaborative session
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub session_id: SessionId,
    pub code_document: String,
    pub console_output: String,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub display_name: String,
    pub is_leader: bool,
}

/// A proposed change to a session. Never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Update {
    pub session_id: SessionId,
    /// Either `{"fullText": "..."}` or the literal new document body
    #[serde(default)]
    pub editor_delta: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_append: Option<String>,
    #[serde(default)]
    pub author: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AlgorithmFamily {
    Pathfinding,
    Sorting,
    GraphTraversal,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PathfindingVariant {
    Dijkstra,
    AStar,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortingVariant {
    MergeSort,
    QuickSort,
    HeapSort,
}

/// Step as it goes over the wire: the visual state is pre-encoded as a JSON string
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StepRecord {
    pub step_index: u32,
    pub state_snapshot: String,
    pub cost: f64,
    pub heuristic: f64,
}
