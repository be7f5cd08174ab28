//! Fully resolved work units.

use ps_types::ParameterValue;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// The value a work unit takes for one dimension.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Assignment {
    Single(ParameterValue),
    /// Member name and value pairs, in member declaration order.
    Group(Vec<(String, ParameterValue)>),
}

/// One point of the sweep.
///
/// Identity is the assignment map: two units are equal iff every
/// dimension takes the same value, regardless of `index` or `name`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkUnit {
    /// Position in the sorted enumeration (0-indexed).
    pub index: usize,
    /// Canonical name, unique within the sweep.
    pub name: String,
    assignments: BTreeMap<String, Assignment>,
}

impl WorkUnit {
    pub(crate) fn new(index: usize, assignments: BTreeMap<String, Assignment>) -> Self {
        Self {
            index,
            name: canonical_name(&assignments),
            assignments,
        }
    }

    /// Assignments keyed by parameter or group name.
    pub fn assignments(&self) -> &BTreeMap<String, Assignment> {
        &self.assignments
    }

    pub fn get(&self, dimension: &str) -> Option<&Assignment> {
        self.assignments.get(dimension)
    }

    /// Look up a single parameter, whether declared on its own or as a group
    /// member.
    pub fn value_of(&self, parameter: &str) -> Option<&ParameterValue> {
        if let Some(Assignment::Single(value)) = self.assignments.get(parameter) {
            return Some(value);
        }
        self.assignments.values().find_map(|assignment| match assignment {
            Assignment::Group(pairs) => pairs
                .iter()
                .find(|(member, _)| member == parameter)
                .map(|(_, value)| value),
            Assignment::Single(_) => None,
        })
    }

    /// Every parameter (group members included) mapped to its value.
    pub fn flatten(&self) -> BTreeMap<String, ParameterValue> {
        let mut flat = BTreeMap::new();
        for (name, assignment) in &self.assignments {
            match assignment {
                Assignment::Single(value) => {
                    flat.insert(name.clone(), value.clone());
                }
                Assignment::Group(pairs) => {
                    for (member, value) in pairs {
                        flat.insert(member.clone(), value.clone());
                    }
                }
            }
        }
        flat
    }

    /// Sort key: assignments taken in lexicographic dimension order.
    pub fn sort_key(&self) -> Vec<&Assignment> {
        self.assignments.values().collect()
    }
}

impl PartialEq for WorkUnit {
    fn eq(&self, other: &Self) -> bool {
        self.assignments == other.assignments
    }
}

impl Eq for WorkUnit {}

impl Ord for WorkUnit {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for WorkUnit {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// `name + value` per plain parameter and `name-v1-v2...` per group, in
/// dimension order.
pub fn canonical_name(assignments: &BTreeMap<String, Assignment>) -> String {
    let mut name = String::new();
    for (dimension, assignment) in assignments {
        name.push_str(dimension);
        match assignment {
            Assignment::Single(value) => name.push_str(&value.to_string()),
            Assignment::Group(pairs) => {
                for (_, value) in pairs {
                    name.push('-');
                    name.push_str(&value.to_string());
                }
            }
        }
    }
    name
}
