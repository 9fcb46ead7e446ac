//! Output-driven routing.
//!
//! The plan is computed once per run from the configuration and decides, per
//! entity type, which Gold shapes must be built. Nothing downstream branches
//! on the destination set again.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::config::PipelineConfig;
use realty_indexer_shared::{Destination, DocumentShape, EntityType};

/// What to build for one entity type.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityPlan {
    /// Gold shapes to build.
    pub shapes: BTreeSet<DocumentShape>,
    /// Hand Silver records to the columnar store instead of a columnar Gold shape.
    pub silver_passthrough: bool,
}

impl EntityPlan {
    /// Whether any Gold document has to be built.
    pub fn build_required(&self) -> bool {
        !self.shapes.is_empty()
    }
}

/// Static plan for a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingPlan {
    destinations: BTreeSet<Destination>,
    entities: BTreeMap<EntityType, EntityPlan>,
}

impl ProcessingPlan {
    pub fn destinations(&self) -> &BTreeSet<Destination> {
        &self.destinations
    }

    pub fn entity(&self, entity_type: EntityType) -> Option<&EntityPlan> {
        self.entities.get(&entity_type)
    }

    /// Whether any entity type needs document building at all.
    pub fn build_required(&self) -> bool {
        self.entities.values().any(EntityPlan::build_required)
    }

    /// Whether any records must be prepared for writing, as Gold documents or Silver passthrough.
    pub fn has_output(&self) -> bool {
        self.entities
            .values()
            .any(|plan| plan.build_required() || plan.silver_passthrough)
    }
}

/// Decide the processing paths for the configured destinations.
pub fn route(config: &PipelineConfig) -> ProcessingPlan {
    let mut shapes = BTreeSet::new();
    let mut silver_passthrough = false;

    for destination in &config.destinations {
        match destination {
            Destination::Columnar if config.columnar_receives_silver => silver_passthrough = true,
            other => {
                shapes.insert(other.shape());
            }
        }
    }

    let entities = EntityType::ALL
        .iter()
        .map(|entity_type| {
            (
                *entity_type,
                EntityPlan {
                    shapes: shapes.clone(),
                    silver_passthrough,
                },
            )
        })
        .collect();

    let plan = ProcessingPlan {
        destinations: config.destinations.clone(),
        entities,
    };
    debug!(
        destinations = ?plan.destinations,
        build_required = plan.build_required(),
        silver_passthrough,
        "Processing plan routed"
    );
    plan
}
