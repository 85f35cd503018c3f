//! Common types shared between the mobility collaborator and the engine.

use crate::error::EnvError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Identifier of a tracked entity.
///
/// Stable across steps; only required to be unique within one snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub String);

impl EntityId {
    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<u64> for EntityId {
    fn from(value: u64) -> Self {
        Self(value.to_string())
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One entity's reported state for a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    /// Unique identifier
    pub id: EntityId,
    
    /// Reported position [x, y] in area coordinates
    pub position: [f64; 2],
    
    /// Position uncertainty radius (meters)
    pub accuracy: f64,
}

impl EntitySnapshot {
    /// Creates a new entity snapshot.
    pub fn new(id: impl Into<EntityId>, position: [f64; 2], accuracy: f64) -> Self {
        Self {
            id: id.into(),
            position,
            accuracy,
        }
    }
}

/// All entities reported for one simulation step.
///
/// Immutable once built; the engine only borrows it for the duration of one
/// update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    step: u64,
    entities: Vec<EntitySnapshot>,
}

impl Snapshot {
    /// Builds a snapshot, rejecting duplicate ids and invalid accuracies.
    pub fn new(step: u64, entities: Vec<EntitySnapshot>) -> Result<Self, EnvError> {
        {
            let mut seen = HashSet::with_capacity(entities.len());
            
            for entity in &entities {
                if !entity.accuracy.is_finite() || entity.accuracy < 0.0 {
                    return Err(EnvError::InvalidAccuracy {
                        id: entity.id.to_string(),
                        accuracy: entity.accuracy,
                    });
                }
                if !seen.insert(&entity.id) {
                    return Err(EnvError::duplicate(&entity.id));
                }
            }
        }
        
        Ok(Self { step, entities })
    }
    
    /// Step number this snapshot belongs to.
    pub fn step(&self) -> u64 {
        self.step
    }
    
    /// Entities in the order they were supplied.
    pub fn entities(&self) -> &[EntitySnapshot] {
        &self.entities
    }
    
    /// Looks up an entity by id.
    pub fn get(&self, id: &EntityId) -> Option<&EntitySnapshot> {
        self.entities.iter().find(|e| &e.id == id)
    }
    
    pub fn len(&self) -> usize {
        self.entities.len()
    }
    
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}
