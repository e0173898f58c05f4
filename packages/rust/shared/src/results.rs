//! Work items flowing through the pipeline and the run output.

use serde::{Serialize, Serializer};

use crate::error::CatalogError;
use crate::types::{Entity, LocationSpec};

// ---------------------------------------------------------------------------
// Work items
// ---------------------------------------------------------------------------

/// One unit of work produced by a processor and consumed by the next round.
#[derive(Debug)]
pub enum ProcessorResult {
    /// Resolve this location to data.
    Location {
        location: LocationSpec,
        optional: bool,
    },
    /// Raw bytes read from a location, waiting to be parsed.
    Data {
        location: LocationSpec,
        data: Vec<u8>,
    },
    /// A parsed entity, waiting for policy and transforms.
    Entity {
        location: LocationSpec,
        entity: Entity,
    },
    /// A failure tied to a location.
    Error {
        location: LocationSpec,
        error: CatalogError,
    },
}

impl ProcessorResult {
    pub fn location(location: LocationSpec, optional: bool) -> Self {
        Self::Location { location, optional }
    }

    pub fn data(location: &LocationSpec, data: Vec<u8>) -> Self {
        Self::Data {
            location: location.clone(),
            data,
        }
    }

    pub fn entity(location: &LocationSpec, entity: Entity) -> Self {
        Self::Entity {
            location: location.clone(),
            entity,
        }
    }

    pub fn error(location: &LocationSpec, error: CatalogError) -> Self {
        Self::Error {
            location: location.clone(),
            error,
        }
    }

    /// The location this item belongs to.
    pub fn source(&self) -> &LocationSpec {
        match self {
            Self::Location { location, .. }
            | Self::Data { location, .. }
            | Self::Entity { location, .. }
            | Self::Error { location, .. } => location,
        }
    }

    /// Short tag for log lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Location { .. } => "location",
            Self::Data { .. } => "data",
            Self::Entity { .. } => "entity",
            Self::Error { .. } => "error",
        }
    }
}

// ---------------------------------------------------------------------------
// Output
// ---------------------------------------------------------------------------

/// An entity that made it through the pipeline, with where it came from.
#[derive(Debug, Clone, Serialize)]
pub struct LocationEntity {
    pub entity: Entity,
    pub location: LocationSpec,
}

/// A failure surfaced by a run.
#[derive(Debug, Serialize)]
pub struct LocationError {
    pub location: LocationSpec,
    #[serde(serialize_with = "error_message")]
    pub error: CatalogError,
}

/// Everything a run produced. Partial success is normal.
#[derive(Debug, Default, Serialize)]
pub struct ReadLocationResult {
    pub entities: Vec<LocationEntity>,
    pub errors: Vec<LocationError>,
}

impl ReadLocationResult {
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty()
    }
}

fn error_message<S: Serializer>(error: &CatalogError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}
