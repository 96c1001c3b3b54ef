//! Fixed-capacity record tables.
//!
//! Each table owns [`TABLE_SIZE`] slots allocated once. A slot index is a
//! stable handle: a record never moves, and clearing a table resets the
//! slots in place.

/// Capacity of every record table.
pub const TABLE_SIZE: usize = 64;

/// A record stored in a [`Table`].
pub trait Slot: Default {
    fn in_use(&self) -> bool;
}

#[derive(Debug, Clone)]
pub struct Table<T> {
    slots: Vec<T>,
}

impl<T: Slot> Default for Table<T> {
    fn default() -> Self {
        Self {
            slots: (0..TABLE_SIZE).map(|_| T::default()).collect(),
        }
    }
}

impl<T: Slot> Table<T> {
    /// Slot `index` whether in use or not.
    pub fn slot(&self, index: usize) -> Option<&T> {
        self.slots.get(index)
    }

    pub fn slot_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index)
    }

    /// Slot `index` if it holds a record.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.slots.get(index).filter(|slot| slot.in_use())
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.slots.get_mut(index).filter(|slot| slot.in_use())
    }

    /// Index of the first record matching `pred`.
    pub fn position<F>(&self, mut pred: F) -> Option<usize>
    where
        F: FnMut(&T) -> bool,
    {
        self.slots.iter().position(|slot| slot.in_use() && pred(slot))
    }

    pub fn first_free(&self) -> Option<usize> {
        self.slots.iter().position(|slot| !slot.in_use())
    }

    /// Records in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter(|(_, slot)| slot.in_use())
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.in_use()).count()
    }

    /// Marks every slot unused. Capacity is kept.
    pub fn clear(&mut self) {
        self.slots.iter_mut().for_each(|slot| *slot = T::default());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Default)]
    struct Entry {
        used: bool,
        id: u32,
    }

    impl Slot for Entry {
        fn in_use(&self) -> bool {
            self.used
        }
    }

    #[test]
    fn allocation_and_lookup() {
        let mut table = Table::<Entry>::default();

        for id in 0..TABLE_SIZE as u32 {
            let index = table.first_free().unwrap();
            let slot = table.slot_mut(index).unwrap();
            slot.used = true;
            slot.id = id;
        }

        assert_eq!(table.first_free(), None);
        assert_eq!(table.count(), TABLE_SIZE);
        assert_eq!(table.position(|e| e.id == 17), Some(17));
        assert!(table.slot(TABLE_SIZE).is_none());
    }

    #[test]
    fn clear_keeps_capacity() {
        let mut table = Table::<Entry>::default();
        table.slot_mut(5).unwrap().used = true;

        assert!(table.get(5).is_some());
        table.clear();

        assert!(table.get(5).is_none());
        assert_eq!(table.count(), 0);
        assert_eq!(table.first_free(), Some(0));
        assert!(table.slot(TABLE_SIZE - 1).is_some());
    }
}
