use serde::{Deserialize, Serialize};

/// Where a breakpoint should be set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum BreakpointSpec {
    FileLine { file: String, line: u32 },
    Function { name: String },
}

/// A breakpoint as reported back to the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BreakpointInfo {
    pub id: i64,
    pub spec: BreakpointSpec,
    pub raw_output: String,
}

/// One entry in the DAP backend's set-oriented breakpoint state: the spec
/// plus whatever condition is currently attached to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BreakpointRecord {
    pub id: i64,
    pub spec: BreakpointSpec,
    pub condition: Option<String>,
}

/// Allocates synthetic negative ids for DAP responses that omit an id,
/// strictly decreasing so they never collide with adapter-assigned
/// (non-negative) ids.
#[derive(Debug, Default)]
pub struct SyntheticIdAllocator {
    next: i64,
}

impl SyntheticIdAllocator {
    pub fn new() -> Self {
        Self { next: -1 }
    }

    pub fn allocate(&mut self) -> i64 {
        let id = self.next;
        self.next -= 1;
        id
    }
}
