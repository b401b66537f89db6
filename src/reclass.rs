//! Maps raw sensor class codes to semantic output codes.

use std::fmt;

use clap::ValueEnum;
use ndarray::Array2;

/// Raw Sentinel wet-snow and snow-cover product codes.
pub mod code {
    pub const WET_SNOW: u8 = 110;
    pub const DRY_OR_SNOW_FREE: u8 = 125;
    pub const RADAR_SHADOW: u8 = 200;
    pub const CLOUD: u8 = 205;
    pub const WATER: u8 = 210;
    pub const FOREST: u8 = 220;
    pub const URBAN: u8 = 230;
    pub const NO_DATA: u8 = 240;
}

const NON_SNOW: [u8; 5] = [
    code::RADAR_SHADOW,
    code::WATER,
    code::FOREST,
    code::URBAN,
    code::NO_DATA,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Reclassification {
    /// Wet snow 1, dry or snow-free 0, every other category to the sentinel.
    Binary,
    /// Wet snow 1, dry or snow-free 0, each other category kept as 21..=25.
    Fine,
    /// Fractional snow cover: clouds to the sentinel, fractions untouched.
    Fsc,
}

impl fmt::Display for Reclassification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Reclassification::Binary => "binary",
            Reclassification::Fine => "fine",
            Reclassification::Fsc => "fsc",
        };
        write!(f, "{}", name)
    }
}

impl Reclassification {
    /// Full `u8` lookup table; codes without a mapping map to themselves.
    pub fn table(&self, sentinel: u8) -> [u8; 256] {
        let mut table = [0u8; 256];
        for (value, slot) in table.iter_mut().enumerate() {
            *slot = value as u8;
        }

        match self {
            Reclassification::Binary => {
                table[code::WET_SNOW as usize] = 1;
                table[code::DRY_OR_SNOW_FREE as usize] = 0;
                for raw in NON_SNOW {
                    table[raw as usize] = sentinel;
                }
            }
            Reclassification::Fine => {
                table[code::WET_SNOW as usize] = 1;
                table[code::DRY_OR_SNOW_FREE as usize] = 0;
                for (i, raw) in NON_SNOW.iter().enumerate() {
                    table[*raw as usize] = 21 + i as u8;
                }
            }
            Reclassification::Fsc => {
                table[code::CLOUD as usize] = sentinel;
            }
        }

        table
    }

    pub fn apply(&self, data: &mut Array2<u8>, sentinel: u8) {
        let table = self.table(sentinel);
        data.mapv_inplace(|v| table[v as usize]);
    }
}

// -- Tests -------------------------------------------------------------------
