use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::{Address, LeakMeta, LeakStatus};

/// Current on-disk format version of [`LeakDump`].
pub const DUMP_FORMAT_VERSION: u32 = 1;

/// The persisted analysis result: a raw call history whose leaks carry
/// triage metadata once a session has annotated them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakDump {
    pub version: u32,
    /// Absent for an empty recording; the resulting call tree is empty.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub root: Option<CallHistory>,
}

impl LeakDump {
    pub fn new(root: Option<CallHistory>) -> Self {
        Self { version: DUMP_FORMAT_VERSION, root }
    }
}

/// Caller/callee pair identifying one dynamic call context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    pub caller: Address,
    pub callee: Address,
}

/// One recorded leak as stored in the dump.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeakRecord {
    pub ip: Address,
    #[serde(default)]
    pub status: LeakStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<LeakMeta>,
}

impl LeakRecord {
    pub fn new(ip: Address) -> Self {
        Self { ip, status: LeakStatus::default(), meta: None }
    }
}

/// Raw call-history node. The root has no context; every other node
/// describes the call that entered it. Children are keyed, and the key order
/// defines traversal order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallHistory {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<CallContext>,
    #[serde(default)]
    pub children: BTreeMap<String, CallHistory>,
    #[serde(default)]
    pub data_leaks: Vec<LeakRecord>,
    #[serde(default)]
    pub cf_leaks: Vec<LeakRecord>,
}

impl CallHistory {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn with_context(caller: Address, callee: Address) -> Self {
        Self { context: Some(CallContext { caller, callee }), ..Self::default() }
    }

    /// Follow a path of child keys starting at this node.
    pub fn descendant_mut(&mut self, path: &[String]) -> Option<&mut CallHistory> {
        let mut current = self;
        for key in path {
            current = current.children.get_mut(key)?;
        }
        Some(current)
    }
}
