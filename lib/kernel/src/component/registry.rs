use super::Schedulable;
use rustc_hash::FxBuildHasher;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, num::NonZero};

#[derive(thiserror::Error, Debug)]
pub enum RegistryError {
    #[error("a device named {0:?} is already registered")]
    DuplicateName(String),
}

/// Stable handle to a device in a [DeviceRegistry]
///
/// Generational: removing a device bumps its slot's generation, so a handle
/// that outlives its device is detectable and rejected instead of
/// dereferenced. The scheduler stores these, never device references.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DeviceId {
    index: u32,
    generation: NonZero<u32>,
}

#[derive(Debug)]
struct Slot {
    generation: NonZero<u32>,
    name: Option<String>,
    // None transiently while the device is out being dispatched
    device: Option<Box<dyn Schedulable>>,
}

/// Arena that owns every [Schedulable] device of one machine
///
/// Names are unique per machine and double as the persistent owner ids in
/// snapshots, since generational indices are only meaningful within one
/// process.
#[derive(Debug, Default)]
pub struct DeviceRegistry {
    slots: Vec<Slot>,
    free: Vec<u32>,
    ids_by_name: HashMap<String, DeviceId, FxBuildHasher>,
}

impl DeviceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        name: impl Into<String>,
        device: Box<dyn Schedulable>,
    ) -> Result<DeviceId, RegistryError> {
        self.insert_with(name, move |_| device)
    }

    /// Like [insert](Self::insert), but the device is built after its id is
    /// allocated, for devices that re-arm their own sync points
    pub fn insert_with(
        &mut self,
        name: impl Into<String>,
        build: impl FnOnce(DeviceId) -> Box<dyn Schedulable>,
    ) -> Result<DeviceId, RegistryError> {
        let name = name.into();

        if self.ids_by_name.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }

        let index = match self.free.pop() {
            Some(index) => index,
            None => {
                self.slots.push(Slot {
                    generation: NonZero::new(1).unwrap(),
                    name: None,
                    device: None,
                });

                (self.slots.len() - 1).try_into().unwrap()
            }
        };

        let id = DeviceId {
            index,
            generation: self.slots[index as usize].generation,
        };
        let device = build(id);

        let slot = &mut self.slots[index as usize];
        slot.name = Some(name.clone());
        slot.device = Some(device);

        tracing::debug!("Registered device {:?} as {:?}", name, id);
        self.ids_by_name.insert(name, id);

        Ok(id)
    }

    /// Removes the device and invalidates every copy of its id
    ///
    /// Pending sync points are the caller's problem; go through
    /// [Machine::remove_device](crate::machine::Machine::remove_device),
    /// which cancels them first
    pub fn remove(&mut self, id: DeviceId) -> Option<Box<dyn Schedulable>> {
        if !self.contains(id) {
            return None;
        }

        let slot = &mut self.slots[id.index as usize];
        let name = slot.name.take().unwrap();
        let device = slot.device.take().unwrap();

        // Invalidate outstanding ids to this slot
        slot.generation = slot.generation.checked_add(1).unwrap();

        self.ids_by_name.remove(&name);
        self.free.push(id.index);

        tracing::debug!("Removed device {:?} ({:?})", name, id);

        Some(device)
    }

    #[inline]
    pub fn contains(&self, id: DeviceId) -> bool {
        self.slots
            .get(id.index as usize)
            .is_some_and(|slot| slot.generation == id.generation && slot.name.is_some())
    }

    #[inline]
    pub fn name(&self, id: DeviceId) -> Option<&str> {
        let slot = self.slots.get(id.index as usize)?;

        if slot.generation != id.generation {
            return None;
        }

        slot.name.as_deref()
    }

    #[inline]
    pub fn device_id(&self, name: &str) -> Option<DeviceId> {
        self.ids_by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.ids_by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids_by_name.is_empty()
    }

    /// Moves the device out of its slot for dispatch, so the callback can be
    /// handed the scheduler without aliasing the registry
    pub(crate) fn take(&mut self, id: DeviceId) -> Option<Box<dyn Schedulable>> {
        if !self.contains(id) {
            return None;
        }

        self.slots[id.index as usize].device.take()
    }

    /// Puts a dispatched device back
    pub(crate) fn restore(&mut self, id: DeviceId, device: Box<dyn Schedulable>) {
        debug_assert!(self.contains(id));

        let slot = &mut self.slots[id.index as usize];
        debug_assert!(slot.device.is_none());
        slot.device = Some(device);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{component::SyncTag, scheduler::Scheduler};
    use quartz_time::EmuTime;
    use std::error::Error;

    #[derive(Debug)]
    struct Inert;

    impl Schedulable for Inert {
        fn execute_until(
            &mut self,
            _scheduler: &mut Scheduler,
            _time: EmuTime,
            _tag: SyncTag,
        ) -> Result<(), Box<dyn Error + Send + Sync>> {
            Ok(())
        }
    }

    #[test]
    fn insert_lookup_remove() {
        let mut registry = DeviceRegistry::new();

        let id = registry.insert("vdp", Box::new(Inert)).unwrap();

        assert!(registry.contains(id));
        assert_eq!(registry.name(id), Some("vdp"));
        assert_eq!(registry.device_id("vdp"), Some(id));
        assert_eq!(registry.len(), 1);

        assert!(registry.remove(id).is_some());
        assert!(!registry.contains(id));
        assert_eq!(registry.device_id("vdp"), None);
        assert!(registry.is_empty());
    }

    #[test]
    fn duplicate_names_are_refused() {
        let mut registry = DeviceRegistry::new();

        registry.insert("psg", Box::new(Inert)).unwrap();

        assert!(matches!(
            registry.insert("psg", Box::new(Inert)),
            Err(RegistryError::DuplicateName(_))
        ));
    }

    #[test]
    fn stale_id_never_resolves_after_slot_reuse() {
        let mut registry = DeviceRegistry::new();

        let old = registry.insert("fdc", Box::new(Inert)).unwrap();
        registry.remove(old);

        // Reuses the freed slot with a bumped generation
        let new = registry.insert("rtc", Box::new(Inert)).unwrap();

        assert_ne!(old, new);
        assert!(!registry.contains(old));
        assert!(registry.contains(new));
        assert_eq!(registry.name(old), None);
        assert!(registry.take(old).is_none());
    }

    #[test]
    fn take_and_restore_keep_the_slot_occupied() {
        let mut registry = DeviceRegistry::new();

        let id = registry.insert("timer", Box::new(Inert)).unwrap();
        let device = registry.take(id).unwrap();

        // Still registered while out for dispatch
        assert!(registry.contains(id));
        assert!(registry.take(id).is_none());

        registry.restore(id, device);
        assert!(registry.take(id).is_some());
    }
}
