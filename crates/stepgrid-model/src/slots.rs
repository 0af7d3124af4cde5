//! Generational slot storage.
//!
//! Removing a value bumps the slot generation when the slot is reused, so a
//! [`SlotId`] held across a removal is detected as stale instead of aliasing
//! whatever value moved in afterwards.

use serde::{Deserialize, Serialize};

/// Handle into a [`SlotArray`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SlotId {
    index: u32,
    generation: u32,
}

impl SlotId {
    pub const NULL: SlotId = SlotId {
        index: u32::MAX,
        generation: 0,
    };

    #[inline]
    pub fn is_null(self) -> bool {
        self.index == u32::MAX
    }

    #[inline]
    pub fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    pub fn generation(self) -> u32 {
        self.generation
    }
}

impl Default for SlotId {
    fn default() -> Self {
        Self::NULL
    }
}

#[derive(Debug, Clone)]
pub struct SlotArray<T> {
    data: Vec<Option<T>>,
    generations: Vec<u32>,
    free: Vec<u32>,
}

impl<T> Default for SlotArray<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            generations: Vec::new(),
            free: Vec::new(),
        }
    }
}

impl<T> SlotArray<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a value, reusing a freed slot when one is available.
    pub fn push(&mut self, value: T) -> SlotId {
        if let Some(index) = self.free.pop() {
            let slot = index as usize;
            let generation = self.generations[slot].wrapping_add(1);
            self.generations[slot] = generation;
            self.data[slot] = Some(value);
            SlotId { index, generation }
        } else {
            let index = self.data.len() as u32;
            self.data.push(Some(value));
            self.generations.push(0);
            SlotId {
                index,
                generation: 0,
            }
        }
    }

    pub fn exists(&self, id: SlotId) -> bool {
        let slot = id.index();
        !id.is_null()
            && slot < self.data.len()
            && self.data[slot].is_some()
            && self.generations[slot] == id.generation
    }

    pub fn get(&self, id: SlotId) -> Option<&T> {
        if self.exists(id) {
            self.data[id.index()].as_ref()
        } else {
            None
        }
    }

    pub fn get_mut(&mut self, id: SlotId) -> Option<&mut T> {
        if self.exists(id) {
            self.data[id.index()].as_mut()
        } else {
            None
        }
    }

    /// Removes the value behind `id`, returning it if the handle was live.
    pub fn remove(&mut self, id: SlotId) -> Option<T> {
        if !self.exists(id) {
            return None;
        }
        let value = self.data[id.index()].take();
        self.free.push(id.index);
        value
    }

    pub fn remove_if_exists(&mut self, id: SlotId) {
        let _ = self.remove(id);
    }

    /// Removes every value for which `keep` returns false.
    pub fn retain(&mut self, mut keep: impl FnMut(&T) -> bool) {
        for (index, slot) in self.data.iter_mut().enumerate() {
            if slot.as_ref().is_some_and(|value| !keep(value)) {
                *slot = None;
                self.free.push(index as u32);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.data.len() - self.free.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        for (index, slot) in self.data.iter_mut().enumerate() {
            if slot.take().is_some() {
                self.free.push(index as u32);
            }
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (SlotId, &T)> + '_ {
        self.data
            .iter()
            .zip(self.generations.iter())
            .enumerate()
            .filter_map(|(index, (slot, &generation))| {
                slot.as_ref().map(|value| {
                    (
                        SlotId {
                            index: index as u32,
                            generation,
                        },
                        value,
                    )
                })
            })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (SlotId, &mut T)> + '_ {
        self.data
            .iter_mut()
            .zip(self.generations.iter())
            .enumerate()
            .filter_map(|(index, (slot, &generation))| {
                slot.as_mut().map(|value| {
                    (
                        SlotId {
                            index: index as u32,
                            generation,
                        },
                        value,
                    )
                })
            })
    }

    pub fn values(&self) -> impl Iterator<Item = &T> + '_ {
        self.data.iter().filter_map(Option::as_ref)
    }
}
