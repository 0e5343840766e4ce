// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Bit depth, shared by VP9 and AV1. VP8 is always 8-bit.

/// Pixel bit depth. Only 8/10/12-bit are defined by VP9/AV1.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum BitDepth {
    #[default]
    Depth8 = 8,
    Depth10 = 10,
    Depth12 = 12,
}

impl BitDepth {
    /// The divisor `ac_quant` is scaled down by to express a step size in
    /// 8-bit-equivalent units, per §4.A.
    pub fn scale(self) -> f64 {
        match self {
            BitDepth::Depth8 => 4.0,
            BitDepth::Depth10 => 16.0,
            BitDepth::Depth12 => 64.0,
        }
    }

    /// Index into a 3-wide per-depth table.
    pub fn table_index(self) -> usize {
        match self {
            BitDepth::Depth8 => 0,
            BitDepth::Depth10 => 1,
            BitDepth::Depth12 => 2,
        }
    }
}

impl TryFrom<u32> for BitDepth {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        match value {
            8 => Ok(BitDepth::Depth8),
            10 => Ok(BitDepth::Depth10),
            12 => Ok(BitDepth::Depth12),
            _ => Err(format!("invalid bit depth {value}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scale_matches_spec_table() {
        assert_eq!(BitDepth::Depth8.scale(), 4.0);
        assert_eq!(BitDepth::Depth10.scale(), 16.0);
        assert_eq!(BitDepth::Depth12.scale(), 64.0);
    }

    #[test]
    fn try_from_rejects_unknown_depth() {
        assert!(BitDepth::try_from(9).is_err());
    }
}
