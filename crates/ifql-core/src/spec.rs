//! The operation graph: vertices are operations, edges parent to child.
//!
//! Wire form: `{"operations": [{"id", "kind", "spec"}], "edges":
//! [{"parent", "child"}]}`. Array order is significant since generated IDs
//! encode the call index.

use std::collections::{HashMap, HashSet, VecDeque};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::ops::OperationSpec;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OperationId(pub String);

impl From<&str> for OperationId {
    fn from(s: &str) -> Self {
        OperationId(s.to_string())
    }
}

impl fmt::Display for OperationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Operation {
    pub id: OperationId,
    #[serde(flatten)]
    pub spec: OperationSpec,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    pub parent: OperationId,
    pub child: OperationId,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct QuerySpec {
    pub operations: Vec<Operation>,
    pub edges: Vec<Edge>,
}

impl QuerySpec {
    pub fn operation(&self, id: &OperationId) -> Option<&Operation> {
        self.operations.iter().find(|o| &o.id == id)
    }

    pub fn parents_of(&self, id: &OperationId) -> Vec<&OperationId> {
        self.edges
            .iter()
            .filter(|e| &e.child == id)
            .map(|e| &e.parent)
            .collect()
    }

    pub fn children_of(&self, id: &OperationId) -> Vec<&OperationId> {
        self.edges
            .iter()
            .filter(|e| &e.parent == id)
            .map(|e| &e.child)
            .collect()
    }

    /// Duplicate IDs, dangling edges, and cycles are construction errors.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for op in &self.operations {
            if !seen.insert(&op.id) {
                return Err(Error::Query(format!("duplicate operation id {:?}", op.id.0)));
            }
        }
        for e in &self.edges {
            if !seen.contains(&e.parent) {
                return Err(Error::Query(format!(
                    "edge references unknown operation {:?}",
                    e.parent.0
                )));
            }
            if !seen.contains(&e.child) {
                return Err(Error::Query(format!(
                    "edge references unknown operation {:?}",
                    e.child.0
                )));
            }
        }
        self.topological_order().map(|_| ())
    }

    /// Kahn's algorithm; stable with respect to operation declaration
    /// order. Fails on cycles.
    pub fn topological_order(&self) -> Result<Vec<OperationId>> {
        let mut in_degree: HashMap<&OperationId, usize> =
            self.operations.iter().map(|o| (&o.id, 0)).collect();
        for e in &self.edges {
            if let Some(d) = in_degree.get_mut(&e.child) {
                *d += 1;
            }
        }
        let mut queue: VecDeque<&OperationId> = self
            .operations
            .iter()
            .filter(|o| in_degree[&o.id] == 0)
            .map(|o| &o.id)
            .collect();

        let mut order = Vec::with_capacity(self.operations.len());
        while let Some(id) = queue.pop_front() {
            order.push(id.clone());
            for child in self.children_of(id) {
                let d = in_degree
                    .get_mut(child)
                    .ok_or_else(|| Error::Query("edge references unknown operation".into()))?;
                *d -= 1;
                if *d == 0 {
                    queue.push_back(child);
                }
            }
        }
        if order.len() != self.operations.len() {
            return Err(Error::Query("operation graph contains a cycle".into()));
        }
        Ok(order)
    }
}
