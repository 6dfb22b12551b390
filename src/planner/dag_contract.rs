use crate::error::PlanError;
use crate::planner::{PlanStep, StepStatus};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagNode {
    pub id: String,
}

impl DagNode {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

/// `from` must finish before `to` may start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagEdge {
    pub from: String,
    pub to: String,
}

impl DagEdge {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

/// Static shape of a plan's dependency relation.
///
/// Nodes keep plan order. Cycles are tolerated here: they are found on
/// demand with [`DagContract::find_cycle`] and otherwise show up as steps
/// that never become ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DagContract {
    pub nodes: Vec<DagNode>,
    pub edges: Vec<DagEdge>,
}

impl DagContract {
    pub fn new(nodes: Vec<DagNode>, edges: Vec<DagEdge>) -> Self {
        Self { nodes, edges }
    }

    pub fn from_steps(steps: &[PlanStep]) -> Self {
        let nodes = steps.iter().map(|step| DagNode::new(step.id.clone())).collect();
        let edges = steps
            .iter()
            .flat_map(|step| {
                step.dependencies
                    .iter()
                    .map(|dependency| DagEdge::new(dependency.clone(), step.id.clone()))
            })
            .collect();
        Self { nodes, edges }
    }

    pub fn validate(&self) -> Result<(), PlanError> {
        let node_ids = self.validate_nodes()?;
        for edge in &self.edges {
            if edge.from == edge.to {
                return Err(PlanError::SelfDependency(edge.to.clone()));
            }
            if !node_ids.contains(&edge.from) {
                return Err(PlanError::UnknownDependency {
                    step: edge.to.clone(),
                    dependency: edge.from.clone(),
                });
            }
        }
        Ok(())
    }

    /// First cycle found, as a closed path (`A -> B -> A`).
    pub fn find_cycle(&self) -> Option<Vec<String>> {
        let adjacency = self.adjacency();
        let mut states = BTreeMap::new();
        let mut stack = Vec::new();

        for node in &self.nodes {
            if states.contains_key(node.id.as_str()) {
                continue;
            }
            if let Some(path) = detect_cycle(&node.id, &adjacency, &mut states, &mut stack) {
                return Some(path);
            }
        }
        None
    }

    /// Every step that transitively depends on `root_id`.
    pub fn dependents(&self, root_id: &str) -> BTreeSet<String> {
        let adjacency = self.adjacency();
        let mut reached = BTreeSet::new();
        let mut queue = VecDeque::new();
        queue.push_back(root_id.to_string());

        while let Some(current) = queue.pop_front() {
            if let Some(children) = adjacency.get(current.as_str()) {
                for child in children {
                    if reached.insert((*child).to_string()) {
                        queue.push_back((*child).to_string());
                    }
                }
            }
        }
        reached.remove(root_id);
        reached
    }

    /// Groups of steps that would run together when every step succeeds.
    /// Each layer is in plan order; steps caught in a cycle are left out.
    pub fn execution_layers(&self) -> Vec<Vec<String>> {
        let mut in_degree = self
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), 0_usize))
            .collect::<BTreeMap<_, _>>();
        for edge in &self.edges {
            if let Some(degree) = in_degree.get_mut(edge.to.as_str()) {
                *degree += 1;
            }
        }
        let adjacency = self.adjacency();

        let mut layers = Vec::new();
        let mut current = self
            .nodes
            .iter()
            .filter(|node| in_degree.get(node.id.as_str()) == Some(&0))
            .map(|node| node.id.as_str())
            .collect::<Vec<_>>();

        while !current.is_empty() {
            let mut released = BTreeSet::new();
            for node_id in &current {
                for neighbor in adjacency.get(node_id).into_iter().flatten() {
                    if let Some(degree) = in_degree.get_mut(neighbor) {
                        *degree -= 1;
                        if *degree == 0 {
                            released.insert(*neighbor);
                        }
                    }
                }
            }
            layers.push(current.iter().map(|id| (*id).to_string()).collect());
            current = self
                .nodes
                .iter()
                .map(|node| node.id.as_str())
                .filter(|id| released.contains(id))
                .collect();
        }
        layers
    }

    fn validate_nodes(&self) -> Result<BTreeSet<String>, PlanError> {
        let mut node_ids = BTreeSet::new();

        for node in &self.nodes {
            if node.id.trim().is_empty() {
                return Err(PlanError::EmptyStepId);
            }

            if !node_ids.insert(node.id.clone()) {
                return Err(PlanError::DuplicateStep(node.id.clone()));
            }
        }

        Ok(node_ids)
    }

    fn adjacency(&self) -> BTreeMap<&str, Vec<&str>> {
        let mut adjacency = self
            .nodes
            .iter()
            .map(|node| (node.id.as_str(), Vec::new()))
            .collect::<BTreeMap<_, _>>();
        for edge in &self.edges {
            adjacency
                .entry(edge.from.as_str())
                .or_default()
                .push(edge.to.as_str());
        }
        for neighbors in adjacency.values_mut() {
            neighbors.sort_unstable();
            neighbors.dedup();
        }
        adjacency
    }
}

/// Pending steps whose dependencies are all satisfied, in plan order.
pub fn ready_set(steps: &[PlanStep]) -> Vec<String> {
    let by_id = index_by_id(steps);
    steps
        .iter()
        .filter(|step| step.status == StepStatus::Pending)
        .filter(|step| {
            step.dependencies.iter().all(|dependency| {
                by_id
                    .get(dependency.as_str())
                    .is_some_and(|dep| dep.satisfies_dependents())
            })
        })
        .map(|step| step.id.clone())
        .collect()
}

/// Pending steps that can never become ready: a blocking failure, a skipped
/// step, a cycle, or an unknown id sits somewhere upstream. In plan order.
pub fn unreachable_steps(steps: &[PlanStep]) -> Vec<String> {
    let by_id = index_by_id(steps);

    // Least fixpoint of "can still run": every dependency is satisfied,
    // in flight, or itself able to run.
    let mut live = BTreeSet::new();
    loop {
        let before = live.len();
        for step in steps.iter().filter(|step| step.status == StepStatus::Pending) {
            if live.contains(step.id.as_str()) {
                continue;
            }
            let runnable = step.dependencies.iter().all(|dependency| {
                by_id.get(dependency.as_str()).is_some_and(|dep| {
                    dep.satisfies_dependents()
                        || dep.status == StepStatus::Running
                        || (dep.status == StepStatus::Pending && live.contains(dep.id.as_str()))
                })
            });
            if runnable {
                live.insert(step.id.as_str());
            }
        }
        if live.len() == before {
            break;
        }
    }

    steps
        .iter()
        .filter(|step| step.status == StepStatus::Pending && !live.contains(step.id.as_str()))
        .map(|step| step.id.clone())
        .collect()
}

fn index_by_id(steps: &[PlanStep]) -> BTreeMap<&str, &PlanStep> {
    steps.iter().map(|step| (step.id.as_str(), step)).collect()
}

fn detect_cycle<'a>(
    node_id: &'a str,
    adjacency: &BTreeMap<&'a str, Vec<&'a str>>,
    states: &mut BTreeMap<&'a str, NodeState>,
    stack: &mut Vec<&'a str>,
) -> Option<Vec<String>> {
    states.insert(node_id, NodeState::Visiting);
    stack.push(node_id);

    if let Some(neighbors) = adjacency.get(node_id) {
        for neighbor in neighbors {
            match states.get(neighbor) {
                Some(NodeState::Visiting) => {
                    let index = stack.iter().position(|entry| entry == neighbor)?;
                    let mut cycle = stack[index..]
                        .iter()
                        .map(|id| (*id).to_string())
                        .collect::<Vec<_>>();
                    cycle.push((*neighbor).to_string());
                    return Some(cycle);
                }
                Some(NodeState::Visited) => {}
                None => {
                    if let Some(path) = detect_cycle(*neighbor, adjacency, states, stack) {
                        return Some(path);
                    }
                }
            }
        }
    }

    stack.pop();
    states.insert(node_id, NodeState::Visited);
    None
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum NodeState {
    Visiting,
    Visited,
}
