use crate::handle::Handle;
use std::collections::TryReserveError;
use std::fmt;
use std::marker::PhantomData;
use std::ops::{Index, IndexMut};

/// A [`Handle`]/index-based arena.
///
/// Removed slots are recycled by later insertions, so handles of live values
/// never move. A handle to a removed value may later name a different value.
///
/// Also see:
/// - [slotmap](https://docs.rs/slotmap/)
pub struct Pool<T, H: Handle> {
    slots: Vec<Option<T>>,
    vacant: Vec<H>,
    marker: PhantomData<H>,
}

impl<T, H: Handle> Pool<T, H> {
    pub const fn new() -> Self {
        Self {
            slots: Vec::new(),
            vacant: Vec::new(),
            marker: PhantomData,
        }
    }

    /// Makes room for `additional` insertions, reporting allocation failure
    /// instead of aborting.
    pub fn try_reserve(&mut self, additional: usize) -> Result<(), TryReserveError> {
        let needed = additional.saturating_sub(self.vacant.len());
        self.slots.try_reserve(needed)
    }

    pub fn insert(&mut self, value: T) -> H {
        match self.vacant.pop() {
            Some(handle) => {
                self.slots[handle.to_usize()] = Some(value);
                handle
            }
            None => {
                let handle = H::from_usize(self.slots.len());
                self.slots.push(Some(value));
                handle
            }
        }
    }

    pub fn remove(&mut self, handle: H) -> Option<T> {
        let value = self.slots.get_mut(handle.to_usize())?.take()?;
        self.vacant.push(handle);
        Some(value)
    }

    pub fn get(&self, handle: H) -> Option<&T> {
        self.slots.get(handle.to_usize())?.as_ref()
    }

    pub fn get_mut(&mut self, handle: H) -> Option<&mut T> {
        self.slots.get_mut(handle.to_usize())?.as_mut()
    }

    pub fn contains(&self, handle: H) -> bool {
        self.get(handle).is_some()
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consumes the pool, yielding every live value with its handle.
    pub fn into_entries(self) -> impl Iterator<Item = (H, T)> {
        self.slots
            .into_iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.map(|value| (H::from_usize(i), value)))
    }

    pub fn iter(&self) -> impl Iterator<Item = (H, &T)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|value| (H::from_usize(i), value)))
    }
}

impl<T: Clone, H: Handle> Pool<T, H> {
    /// Clones the pool, reserving its slot storage fallibly. The values are
    /// cloned with `T::clone`, which may still allocate infallibly.
    pub fn try_clone(&self) -> Result<Self, TryReserveError> {
        let mut slots = Vec::new();
        slots.try_reserve_exact(self.slots.len())?;
        slots.extend(self.slots.iter().cloned());
        let mut vacant = Vec::new();
        vacant.try_reserve_exact(self.vacant.len())?;
        vacant.extend_from_slice(&self.vacant);
        Ok(Self {
            slots,
            vacant,
            marker: PhantomData,
        })
    }
}

impl<T, H: Handle> Default for Pool<T, H> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone, H: Handle> Clone for Pool<T, H> {
    fn clone(&self) -> Self {
        Self {
            slots: self.slots.clone(),
            vacant: self.vacant.clone(),
            marker: PhantomData,
        }
    }
}

impl<T: fmt::Debug, H: Handle + fmt::Debug> fmt::Debug for Pool<T, H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.iter()).finish()
    }
}

impl<T, H: Handle> Index<H> for Pool<T, H> {
    type Output = T;
    fn index(&self, index: H) -> &Self::Output {
        match self.get(index) {
            Some(value) => value,
            None => panic!("{} {} does not name a live value", H::NAME, index.to_usize()),
        }
    }
}

impl<T, H: Handle> IndexMut<H> for Pool<T, H> {
    fn index_mut(&mut self, index: H) -> &mut Self::Output {
        match self.get_mut(index) {
            Some(value) => value,
            None => panic!("{} {} does not name a live value", H::NAME, index.to_usize()),
        }
    }
}
