//! Service linking (FIG 0/6) accumulation and the recent-announcement cache.
//!
//! Linking sets arrive spread over many FIGs and FIBs. The accumulator keeps
//! two things in parallel:
//!
//! - the structured sets, keyed by (LSN, active, hard), each with up to three
//!   id classes (DAB service ids, RDS PI codes, DRM/AMSS service ids) holding
//!   a reference id and a multiset of member ids;
//! - a textual rendering of everything received since the last database
//!   start (C/N = 0). On the next database start the rendering is compared
//!   against the [`RecentLinkCache`]; only renderings not seen recently are
//!   reported.

use std::collections::BTreeMap;
use std::fmt;
use std::fmt::Write as _;

/// Number of renderings remembered by the cache.
pub const LINK_CACHE_SIZE: usize = 16;

/// Ages saturate here.
pub const MAX_LINK_AGE: u32 = 65536;

/// Identifies a linkage set.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LinkKey {
    /// Linkage set number (12 bits).
    pub lsn: u16,
    /// LA: the link is active.
    pub active: bool,
    /// S/H: hard link.
    pub hard: bool,
}

impl LinkKey {
    /// `LSN | LA << 16 | S/H << 24`.
    pub fn packed(&self) -> u32 {
        self.lsn as u32 | (self.active as u32) << 16 | (self.hard as u32) << 24
    }
}

/// Id list qualifier (IdLQ).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdQuality {
    DabServiceId,
    RdsPi,
    DrmAmssServiceId,
}

impl IdQuality {
    /// Maps the 2-bit IdLQ field. Value 2 is reserved.
    pub fn from_idlq(idlq: u8) -> Option<Self> {
        match idlq & 3 {
            0 => Some(IdQuality::DabServiceId),
            1 => Some(IdQuality::RdsPi),
            3 => Some(IdQuality::DrmAmssServiceId),
            _ => None,
        }
    }

    pub fn index(&self) -> usize {
        match self {
            IdQuality::DabServiceId => 0,
            IdQuality::RdsPi => 1,
            IdQuality::DrmAmssServiceId => 2,
        }
    }

    fn description(&self) -> &'static str {
        match self {
            IdQuality::DabServiceId => "DAB SIDs",
            IdQuality::RdsPi => "RDS PIs",
            IdQuality::DrmAmssServiceId => "DRM/AMSS SID",
        }
    }

    fn short_name(index: usize) -> &'static str {
        match index {
            0 => "DAB",
            1 => "PS ",
            _ => "AM ",
        }
    }
}

/// Ids of one quality class within a linkage set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkClass {
    /// First id after a database start.
    pub reference: Option<u32>,
    /// Member ids with their occurrence counts.
    pub members: BTreeMap<u32, u32>,
    /// ILS: ids carry an extended country code.
    pub international: bool,
    /// P/D of the carrying FIG: 32-bit ids.
    pub data: bool,
    /// SHD: ids are shorthand.
    pub shorthand: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceLink {
    pub key: LinkKey,
    pub classes: [LinkClass; 3],
}

impl fmt::Display for ServiceLink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{}, {} link, LSN: 0x{:X}",
            if self.key.active { "  Active" } else { "Inactive" },
            if self.key.hard { "Hard" } else { "Soft" },
            self.key.lsn
        )?;

        for (index, class) in self.classes.iter().enumerate() {
            if class.members.is_empty() {
                continue;
            }

            write!(
                f,
                "  {} SID=0x{:X}, {}: ",
                IdQuality::short_name(index),
                class.reference.unwrap_or(0),
                if class.international { "Intl" } else { "Nat." }
            )?;
            for id in class.members.keys() {
                write!(f, "0x{id:X}, ")?;
            }
            writeln!(f)?;
        }

        Ok(())
    }
}

/// A rendering reported for the first time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkReport {
    pub sequence: u32,
    pub header: String,
    pub body: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheEntry {
    pub header: String,
    pub body: String,
    /// Flushes since this entry was last written or matched.
    pub age: u32,
    /// Times the entry was matched again after insertion.
    pub refresh_count: u32,
    /// Assigned when the entry was reported.
    pub sequence: Option<u32>,
}

/// Outcome of [`RecentLinkCache::write`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheWrite {
    /// Header or body empty, nothing stored.
    Skipped,
    /// Matched an existing entry.
    Refreshed(usize),
    /// Stored in a free slot or over the oldest entry.
    Inserted(usize),
}

#[derive(Debug, Clone, Default)]
pub struct RecentLinkCache {
    entries: [Option<CacheEntry>; LINK_CACHE_SIZE],
}

impl RecentLinkCache {
    pub fn write(&mut self, header: &str, body: &str) -> CacheWrite {
        if header.is_empty() || body.is_empty() {
            return CacheWrite::Skipped;
        }

        let matched = self.entries.iter().position(|entry| {
            entry
                .as_ref()
                .is_some_and(|e| e.header == header && e.body == body)
        });

        let (index, outcome) = match matched {
            Some(index) => (index, CacheWrite::Refreshed(index)),
            None => {
                let index = self.victim();
                self.entries[index] = Some(CacheEntry {
                    header: header.to_string(),
                    body: body.to_string(),
                    ..Default::default()
                });
                (index, CacheWrite::Inserted(index))
            }
        };

        for (i, entry) in self.entries.iter_mut().enumerate() {
            if let Some(entry) = entry {
                if i == index {
                    if matched.is_some() {
                        entry.refresh_count += 1;
                    }
                    entry.age = 0;
                } else if entry.age < MAX_LINK_AGE {
                    entry.age += 1;
                }
            }
        }

        outcome
    }

    /// First free slot, else the entry with the highest age (lowest index
    /// on ties).
    fn victim(&self) -> usize {
        if let Some(free) = self.entries.iter().position(Option::is_none) {
            return free;
        }

        let mut index = 0;
        let mut max_age = 0;
        for (i, entry) in self.entries.iter().enumerate() {
            if let Some(entry) = entry {
                if i == 0 || entry.age > max_age {
                    max_age = entry.age;
                    index = i;
                }
            }
        }

        index
    }

    pub fn get(&self, index: usize) -> Option<&CacheEntry> {
        self.entries.get(index).and_then(Option::as_ref)
    }

    fn get_mut(&mut self, index: usize) -> Option<&mut CacheEntry> {
        self.entries.get_mut(index).and_then(Option::as_mut)
    }

    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&mut self) {
        self.entries = Default::default();
    }
}

#[derive(Debug, Clone, Default)]
pub struct LinkAccumulator {
    sets: BTreeMap<LinkKey, ServiceLink>,
    cache: RecentLinkCache,
    header: String,
    body: String,
    /// A database start has been seen, so the pending rendering is complete.
    from_begin: bool,
    /// The next id is the reference id of its class.
    first_is_reference: bool,
    sequence: u32,
    received: u32,
}

impl LinkAccumulator {
    /// Handles C/N = 0: finalizes the rendering gathered since the previous
    /// database start and starts a new one.
    pub fn database_start(&mut self) -> Option<LinkReport> {
        let body = std::mem::take(&mut self.body);

        let report = match self.cache.write(&self.header, &body) {
            CacheWrite::Inserted(index) if self.from_begin => {
                self.sequence += 1;
                let sequence = self.sequence;
                self.cache.get_mut(index).map(|entry| {
                    entry.sequence = Some(sequence);
                    LinkReport {
                        sequence,
                        header: entry.header.clone(),
                        body: entry.body.clone(),
                    }
                })
            }
            CacheWrite::Refreshed(index) => {
                let sequence = self.cache.get(index).and_then(|e| e.sequence);
                log::trace!("Service linking info {sequence:?} repeated");
                None
            }
            _ => None,
        };

        self.header.clear();
        self.first_is_reference = true;
        self.from_begin = true;

        report
    }

    /// Records the C/N-independent header of a FIG 0/6.
    pub fn fig_header(&mut self, other_ensemble: bool, data: bool) {
        self.received += 1;

        let header = format!(
            "OE {} Ensemble, {}",
            if other_ensemble { "OTHR" } else { "THIS" },
            if data { "32/data" } else { "16/program" }
        );

        if self.header.is_empty() {
            self.header = header;
        } else if self.header != header {
            self.body.push_str(&header);
        }
    }

    /// Records the start of a linkage entry carrying an id list.
    pub fn link_entry(&mut self, key: LinkKey, international: bool) {
        let _ = writeln!(
            self.body,
            "Link: {}, {} link, {} link, LSN: 0x{:X}",
            if key.active { "  Active" } else { "Inactive" },
            if key.hard { "Hard" } else { "Soft" },
            if international { "Intl" } else { "Nat." },
            key.lsn
        );
    }

    /// Adds an id list. With `international`, each id is `ECC << 16 | id`.
    pub fn id_list(
        &mut self,
        key: LinkKey,
        quality: IdQuality,
        international: bool,
        data: bool,
        shorthand: bool,
        ids: &[u32],
    ) {
        let link = self.sets.entry(key).or_insert_with(|| ServiceLink {
            key,
            ..Default::default()
        });
        let class = &mut link.classes[quality.index()];

        if !ids.is_empty() {
            class.international = international;
            class.data = data;
            class.shorthand = shorthand;
        }

        let separator = if ids.is_empty() { "\n" } else { " " };
        let _ = if data {
            write!(self.body, "  {} 32Bit:{separator}", quality.description())
        } else if international {
            write!(
                self.body,
                "  SHD-{}, {}, ECC/ID 8/16-Bit:{separator}",
                shorthand as u8,
                quality.description()
            )
        } else {
            write!(
                self.body,
                "  SHD-{}, {}, ID 16-Bit:{separator}",
                shorthand as u8,
                quality.description()
            )
        };

        for (k, &id) in ids.iter().enumerate() {
            let _ = if international && !data {
                write!(self.body, "0x{:X}/0x{:X}", id >> 16, id & 0xFFFF)
            } else {
                write!(self.body, "0x{id:X}")
            };
            if k == 0 && self.first_is_reference {
                self.body.push_str(" (=DAB_SID)");
            }
            self.body.push_str(if k + 1 == ids.len() { "\n" } else { ", " });

            if self.first_is_reference {
                class.reference = Some(id);
            } else {
                *class.members.entry(id).or_insert(0) += 1;
            }
            self.first_is_reference = false;
        }
    }

    /// Linkage sets accumulated so far, ordered by key.
    pub fn links(&self) -> Vec<ServiceLink> {
        self.sets.values().cloned().collect()
    }

    /// Returns the accumulated linkage sets and starts over. The cache and
    /// the pending rendering are kept.
    pub fn flush(&mut self) -> Vec<ServiceLink> {
        log::debug!(
            "Flushing {} linkage sets ({} FIG 0/6 received, {} distinct)",
            self.sets.len(),
            self.received,
            self.sequence
        );

        std::mem::take(&mut self.sets).into_values().collect()
    }

    pub fn cache(&self) -> &RecentLinkCache {
        &self.cache
    }

    /// Forgets everything except the sequence counter, which stays monotonic.
    pub fn reset(&mut self) {
        *self = Self {
            sequence: self.sequence,
            ..Default::default()
        };
    }
}
