//! Execution planner - builds staged resource execution plans
//!
//! A plan is a list of named stages. Stages run strictly one after another;
//! resources inside a stage are independent of each other and may run
//! concurrently.

use crate::resource::{BoxedResource, Resource};

/// A named group of resources applied together
#[derive(Debug)]
pub struct Stage {
    pub name: String,
    pub resources: Vec<BoxedResource>,
}

impl Stage {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            resources: Vec::new(),
        }
    }
}

/// An execution plan with resources grouped into ordered stages
#[derive(Debug, Default)]
pub struct ExecutionPlan {
    pub stages: Vec<Stage>,
}

impl ExecutionPlan {
    /// Create a new empty plan
    pub fn new() -> Self {
        Self { stages: Vec::new() }
    }

    /// Add a resource to the named stage
    ///
    /// Stages are created on first use and keep their insertion order.
    pub fn push(&mut self, stage: &str, resource: BoxedResource) {
        if let Some(existing) = self.stages.iter_mut().find(|s| s.name == stage) {
            existing.resources.push(resource);
        } else {
            let mut new_stage = Stage::new(stage);
            new_stage.resources.push(resource);
            self.stages.push(new_stage);
        }
    }

    /// Filter plan to only include resources matching a predicate
    ///
    /// Stages left empty are dropped.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&dyn Resource) -> bool,
    {
        let stages = self
            .stages
            .into_iter()
            .map(|stage| Stage {
                name: stage.name,
                resources: stage
                    .resources
                    .into_iter()
                    .filter(|r| predicate(r.as_ref()))
                    .collect(),
            })
            .filter(|stage| !stage.resources.is_empty())
            .collect();
        Self { stages }
    }

    /// Filter plan to only include resources matching a target pattern
    ///
    /// Target format: "type" or "type.name"
    pub fn filter_by_target(self, target: Option<&str>) -> Self {
        match target {
            None => self,
            Some(t) => {
                let (resource_type, name) = parse_target(t);
                self.filter(|r| matches_filter(r, resource_type.as_deref(), name.as_deref()))
            }
        }
    }

    /// All resources in stage order
    pub fn resources(&self) -> impl Iterator<Item = &BoxedResource> {
        self.stages.iter().flat_map(|s| s.resources.iter())
    }

    /// Total number of resources in the plan
    pub fn total_resources(&self) -> usize {
        self.stages.iter().map(|s| s.resources.len()).sum()
    }

    /// Check if plan is empty
    pub fn is_empty(&self) -> bool {
        self.total_resources() == 0
    }
}

/// Parse a target string like "type.name" into (type, name)
///
/// Names may themselves contain dots, so only the first dot separates.
fn parse_target(target: &str) -> (Option<String>, Option<String>) {
    match target.split_once('.') {
        None => (Some(target.to_string()), None),
        Some(("", name)) => (None, Some(name.to_string())),
        Some((kind, name)) => (Some(kind.to_string()), Some(name.to_string())),
    }
}

/// Check if a resource matches the filter criteria
fn matches_filter(
    resource: &dyn Resource,
    resource_type: Option<&str>,
    name: Option<&str>,
) -> bool {
    let kind = resource.resource_type();
    if let Some(rt) = resource_type {
        // Allow common aliases
        let matches_type = match rt {
            "database" | "databases" => kind == "postgres_database",
            "role" | "roles" => kind == "postgres_role",
            "grant" | "grants" => kind == "postgres_grant",
            _ => kind == rt || kind.starts_with(rt),
        };
        if !matches_type {
            return false;
        }
    }

    if let Some(n) = name {
        let id = resource.id();
        let local = id.split_once('.').map_or(id.as_str(), |(_, rest)| rest);
        if local != n {
            return false;
        }
    }

    true
}
