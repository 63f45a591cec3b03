use std::{
    collections::BTreeMap,
    sync::{Mutex, PoisonError},
};

use crate::data::ReflectionData;

/// Largest size seen for every buffer binding across all shaders reflected by a shader system.
///
/// Shaders sharing a global buffer may declare it with different amounts of tail padding. All of
/// them must agree on one size, so the registry keeps the maximum.
#[derive(Debug, Default)]
pub struct GlobalReflectionRegistry {
    tables: Mutex<GlobalTables>,
}

#[derive(Debug, Default)]
struct GlobalTables {
    /// Keyed by `(set, binding)`.
    uniform_buffers: BTreeMap<(u32, u32), u32>,
    storage_buffers: BTreeMap<(u32, u32), u32>,
}

impl GlobalReflectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a uniform buffer declaration and returns the converged size of the binding.
    pub fn register_uniform_buffer(&self, set: u32, binding: u32, size: u32) -> u32 {
        let mut tables = self.lock();
        let entry = tables.uniform_buffers.entry((set, binding)).or_insert(size);
        *entry = (*entry).max(size);
        *entry
    }

    /// Records a storage buffer declaration and returns the converged size of the binding.
    pub fn register_storage_buffer(&self, set: u32, binding: u32, size: u32) -> u32 {
        let mut tables = self.lock();
        let entry = tables.storage_buffers.entry((set, binding)).or_insert(size);
        *entry = (*entry).max(size);
        *entry
    }

    #[inline]
    pub fn uniform_buffer_size(&self, set: u32, binding: u32) -> Option<u32> {
        self.lock().uniform_buffers.get(&(set, binding)).copied()
    }

    #[inline]
    pub fn storage_buffer_size(&self, set: u32, binding: u32) -> Option<u32> {
        self.lock().storage_buffers.get(&(set, binding)).copied()
    }

    /// Registers every buffer of previously reflected data. Used when reflection data comes
    /// from the cache instead of from a binary.
    pub fn absorb(&self, data: &ReflectionData) {
        for (set, descriptors) in data.descriptor_sets.iter().enumerate() {
            for buffer in descriptors.uniform_buffers.values() {
                self.register_uniform_buffer(set as u32, buffer.binding, buffer.size);
            }
            for buffer in descriptors.storage_buffers.values() {
                self.register_storage_buffer(set as u32, buffer.binding, buffer.size);
            }
        }
    }

    /// Forgets every recorded size.
    pub fn clear(&self) {
        let mut tables = self.lock();
        tables.uniform_buffers.clear();
        tables.storage_buffers.clear();
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        let tables = self.lock();
        tables.uniform_buffers.is_empty() && tables.storage_buffers.is_empty()
    }

    #[inline]
    fn lock(&self) -> std::sync::MutexGuard<'_, GlobalTables> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
