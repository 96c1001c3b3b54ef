//! Service records.

use crate::structs::label::Label;
use crate::structs::table::Slot;

/// Maximum entries per cross-reference list.
pub const MAX_CROSS_REFS: usize = 4;

/// A small set of identifiers, unique, capped at [`MAX_CROSS_REFS`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CrossRefs {
    values: [u16; MAX_CROSS_REFS],
    len: usize,
}

impl CrossRefs {
    /// Appends `value` unless already present or the list is full.
    /// Returns whether the value was added.
    pub fn insert(&mut self, value: u16) -> bool {
        if self.len >= MAX_CROSS_REFS || self.contains(value) {
            return false;
        }

        self.values[self.len] = value;
        self.len += 1;
        true
    }

    pub fn contains(&self, value: u16) -> bool {
        self.as_slice().contains(&value)
    }

    pub fn as_slice(&self) -> &[u16] {
        &self.values[..self.len]
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct Service {
    pub in_use: bool,
    /// A programme or data service label has been received.
    pub has_name: bool,
    /// The service has been announced to the application.
    pub published: bool,

    /// 16-bit (programme) or 32-bit (data) service identifier.
    pub service_id: u32,
    pub label: Label,

    pub language: Option<u8>,
    pub programme_type: u8,
    pub programme_number: Option<u8>,

    /// Service component identifiers within the service (FIG 0/8).
    pub sc_ids: CrossRefs,
    /// Packet-mode service component identifiers (FIG 0/8 long form).
    pub sc_id_list: CrossRefs,
    /// Subchannels carrying the service (FIG 0/3, FIG 0/8 short form).
    pub sub_ch_ids: CrossRefs,
}

impl Slot for Service {
    fn in_use(&self) -> bool {
        self.in_use
    }
}

impl Service {
    pub fn new(service_id: u32) -> Self {
        Self {
            in_use: true,
            service_id,
            ..Default::default()
        }
    }
}

#[test]
fn cross_refs_are_unique_and_capped() {
    let mut refs = CrossRefs::default();

    assert!(refs.insert(3));
    assert!(!refs.insert(3));
    assert!(refs.insert(1));
    assert!(refs.insert(7));
    assert!(refs.insert(9));
    assert!(!refs.insert(11));

    assert_eq!(refs.as_slice(), &[3, 1, 7, 9]);
    assert_eq!(refs.len(), MAX_CROSS_REFS);
}
