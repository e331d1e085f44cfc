use cellsim_common::{ObjectId, WorldId};
use cellsim_kernel::{ObjectRef, World};
use glam::Vec3;
use std::collections::BTreeMap;
use std::fmt;

/// World inspector for front ends.
///
/// Read-only queries against the world state for summaries, object listings
/// and debugging output.
pub struct WorldInspector;

impl WorldInspector {
    pub fn summary(world: &World) -> WorldSummary {
        let mut kinds = BTreeMap::new();
        for object in world.objects() {
            *kinds.entry(object.kind().to_string()).or_insert(0) += 1;
        }
        WorldSummary {
            world: world.id(),
            step: world.step_number(),
            elapsed: world.elapsed(),
            seed: world.seed(),
            object_count: world.object_count(),
            registered_bodies: world.registered_body_count(),
            pending_events: world.events().len(),
            kinds,
            modules: world.modules().map(|m| m.name().to_string()).collect(),
        }
    }

    pub fn inspect_object(world: &World, id: ObjectId) -> Option<ObjectInfo> {
        world.object(id).and_then(|object| ObjectInfo::from_ref(&object))
    }

    /// Ids of all live objects in slot order.
    pub fn list_objects(world: &World) -> Vec<ObjectId> {
        world.objects().map(|o| o.id()).collect()
    }

    pub fn objects(world: &World) -> Vec<ObjectInfo> {
        world.objects().filter_map(|o| ObjectInfo::from_ref(&o)).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct WorldSummary {
    pub world: WorldId,
    pub step: u64,
    pub elapsed: f64,
    pub seed: u64,
    pub object_count: usize,
    pub registered_bodies: usize,
    pub pending_events: usize,
    /// Live objects per kind.
    pub kinds: BTreeMap<String, usize>,
    /// Installed world modules in run order.
    pub modules: Vec<String>,
}

impl fmt::Display for WorldSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "World [{}]: step={} elapsed={:.2}s seed={} objects={} bodies={} pending_events={}",
            self.world,
            self.step,
            self.elapsed,
            self.seed,
            self.object_count,
            self.registered_bodies,
            self.pending_events
        )?;
        for (kind, count) in &self.kinds {
            write!(f, "\n  {kind}: {count}")?;
        }
        if !self.modules.is_empty() {
            write!(f, "\n  modules: {}", self.modules.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ObjectInfo {
    pub id: ObjectId,
    pub kind: String,
    pub position: Vec3,
    pub velocity: Vec3,
    pub volume: f32,
}

impl ObjectInfo {
    fn from_ref(object: &ObjectRef<'_>) -> Option<Self> {
        Some(Self {
            id: object.id(),
            kind: object.kind().to_string(),
            position: object.position().ok()?,
            velocity: object.velocity().ok()?,
            volume: object.shape().volume(),
        })
    }
}

impl fmt::Display for ObjectInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} pos=({:.2}, {:.2}, {:.2}) vol={:.1}",
            self.id, self.kind, self.position.x, self.position.y, self.position.z, self.volume
        )
    }
}
