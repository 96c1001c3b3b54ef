//! Subchannel organization (FIG 0/1) and derived bit rates.

use crate::structs::table::Slot;

/// Short form protection table (EN 300 401 Table 8):
/// subchannel size in capacity units, protection level, bit rate in kbit/s.
#[rustfmt::skip]
pub const PROTECTION_TABLE: [(u16, u8, u16); 64] = [
    ( 16, 5,  32), ( 21, 4,  32), ( 24, 3,  32), ( 29, 2,  32), ( 35, 1,  32),
    ( 24, 5,  48), ( 29, 4,  48), ( 35, 3,  48), ( 42, 2,  48), ( 52, 1,  48),
    ( 29, 5,  56), ( 35, 4,  56), ( 42, 3,  56), ( 52, 2,  56), ( 32, 5,  64),
    ( 42, 4,  64), ( 48, 3,  64), ( 58, 2,  64), ( 70, 1,  64), ( 40, 5,  80),
    ( 52, 4,  80), ( 58, 3,  80), ( 70, 2,  80), ( 84, 1,  80), ( 48, 5,  96),
    ( 58, 4,  96), ( 70, 3,  96), ( 84, 2,  96), (104, 1,  96), ( 58, 5, 112),
    ( 70, 4, 112), ( 84, 3, 112), (104, 2, 112), ( 64, 5, 128), ( 84, 4, 128),
    ( 96, 3, 128), (116, 2, 128), (140, 1, 128), ( 80, 5, 160), (104, 4, 160),
    (116, 3, 160), (140, 2, 160), (168, 1, 160), ( 96, 5, 192), (116, 4, 192),
    (140, 3, 192), (168, 2, 192), (208, 1, 192), (116, 5, 224), (140, 4, 224),
    (168, 3, 224), (208, 2, 224), (232, 1, 224), (128, 5, 256), (168, 4, 256),
    (192, 3, 256), (232, 2, 256), (280, 1, 256), (160, 5, 320), (208, 4, 320),
    (280, 2, 320), (192, 5, 384), (280, 3, 384), (416, 1, 384),
];

/// Long form EEP-A: (divisor, multiplier) per protection level 1A..4A.
pub const EEP_A_FACTORS: [(u16, u16); 4] = [(12, 8), (8, 8), (6, 8), (4, 8)];

/// Long form EEP-B: (divisor, multiplier) per protection level 1B..4B.
pub const EEP_B_FACTORS: [(u16, u16); 4] = [(27, 32), (21, 32), (18, 32), (15, 32)];

/// Protection profile of a subchannel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Protection {
    /// Not yet signalled.
    #[default]
    Unknown,
    /// UEP, by index into [`PROTECTION_TABLE`].
    Short { table_index: u8, level: u8 },
    /// EEP set A; `level` is the 2-bit field (0 = protection level 1-A).
    EepA { level: u8 },
    /// EEP set B; `level` is the 2-bit field (0 = protection level 1-B).
    EepB { level: u8 },
    /// Long form with a reserved option field.
    Reserved { option: u8 },
}

impl Protection {
    pub fn is_short_form(&self) -> bool {
        matches!(self, Protection::Short { .. })
    }

    /// Compact numeric form: table index for short form, `100 + level` for
    /// EEP-A, `200 + level` for EEP-B, `300 + option` for reserved options.
    pub fn code(&self) -> Option<u16> {
        match *self {
            Protection::Unknown => None,
            Protection::Short { table_index, .. } => Some(table_index as u16),
            Protection::EepA { level } => Some(100 + level as u16),
            Protection::EepB { level } => Some(200 + level as u16),
            Protection::Reserved { option } => Some(300 + option as u16),
        }
    }

    /// Protection level. EEP-B levels are offset by 4 so both sets stay
    /// distinguishable.
    pub fn level(&self) -> Option<u8> {
        match *self {
            Protection::Short { level, .. } => Some(level),
            Protection::EepA { level } => Some(level),
            Protection::EepB { level } => Some(level + 4),
            Protection::Unknown | Protection::Reserved { .. } => None,
        }
    }
}

/// Bit rate of a long form subchannel of `size` capacity units.
///
/// The division truncates before the multiplication.
pub fn long_form_bit_rate(factors: &[(u16, u16); 4], level: u8, size: u16) -> u16 {
    let (divisor, multiplier) = factors[(level & 3) as usize];
    size / divisor * multiplier
}

#[derive(Debug, Clone, Default)]
pub struct Subchannel {
    pub in_use: bool,
    pub sub_ch_id: u8,
    /// Start address in capacity units.
    pub start_addr: u16,
    /// Size in capacity units.
    pub length: u16,
    pub protection: Protection,
    /// kbit/s; `None` for reserved long form options.
    pub bit_rate: Option<u16>,
    pub fec_scheme: u8,
    pub language: Option<u8>,
}

impl Slot for Subchannel {
    fn in_use(&self) -> bool {
        self.in_use
    }
}

impl Subchannel {
    /// Applies a short form entry from [`PROTECTION_TABLE`].
    pub fn set_short_form(&mut self, table_index: u8) {
        let (length, level, bit_rate) = PROTECTION_TABLE[(table_index & 0x3F) as usize];
        self.length = length;
        self.protection = Protection::Short { table_index, level };
        self.bit_rate = Some(bit_rate);
    }

    /// Applies a long form entry.
    pub fn set_long_form(&mut self, option: u8, level: u8, size: u16) {
        match option {
            0 => {
                self.length = size;
                self.protection = Protection::EepA { level };
                self.bit_rate = Some(long_form_bit_rate(&EEP_A_FACTORS, level, size));
            }
            1 => {
                self.length = size;
                self.protection = Protection::EepB { level };
                self.bit_rate = Some(long_form_bit_rate(&EEP_B_FACTORS, level, size));
            }
            _ => {
                self.protection = Protection::Reserved { option };
                self.bit_rate = None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_form_table_lookup() {
        let mut sub = Subchannel::default();
        sub.set_short_form(3);

        assert_eq!(sub.length, 29);
        assert_eq!(sub.protection.level(), Some(2));
        assert_eq!(sub.bit_rate, Some(32));
        assert_eq!(sub.protection.code(), Some(3));

        sub.set_short_form(63);
        assert_eq!((sub.length, sub.bit_rate), (416, Some(384)));
    }

    #[test]
    fn long_form_truncates_before_scaling() {
        let mut sub = Subchannel::default();

        // 84 CU at 3-A: 84 / 6 * 8
        sub.set_long_form(0, 2, 84);
        assert_eq!(sub.bit_rate, Some(112));

        // 100 CU at 1-A: 100 / 12 = 8 (not 8.33), * 8
        sub.set_long_form(0, 0, 100);
        assert_eq!(sub.bit_rate, Some(64));
        assert_eq!(sub.protection.code(), Some(100));

        // 100 CU at 4-B: 100 / 15 = 6, * 32
        sub.set_long_form(1, 3, 100);
        assert_eq!(sub.bit_rate, Some(192));
        assert_eq!(sub.protection.level(), Some(7));
        assert_eq!(sub.protection.code(), Some(203));
    }

    #[test]
    fn reserved_long_form_option() {
        let mut sub = Subchannel::default();
        sub.set_long_form(5, 0, 10);

        assert_eq!(sub.protection, Protection::Reserved { option: 5 });
        assert_eq!(sub.bit_rate, None);
        assert_eq!(sub.protection.code(), Some(305));
    }

    #[test]
    fn table_rates_are_monotonic_per_level() {
        for level in 1..=5u8 {
            let rates: Vec<u16> = PROTECTION_TABLE
                .iter()
                .filter(|(_, l, _)| *l == level)
                .map(|(_, _, r)| *r)
                .collect();
            assert!(rates.windows(2).all(|w| w[0] < w[1]), "level {level}");
        }
    }
}
