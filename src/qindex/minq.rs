// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Min-Q lookup tables (§4.A): `kf_low`, `kf_high`, `arfgf_low`,
//! `arfgf_high`, `inter`, `rtc`, built once per engine `init` via
//! `init_minq_luts`'s 3rd-order-polynomial-fit formula, the same coefficients
//! libvpx/libaom compute them with (`get_minq_index(maxq, x3, x2, x1,
//! bit_depth)`). AV1's `inter` curve uses a different constant term (0.90)
//! than VP9's/the rtc curve (0.70) — both are reproduced here rather than
//! collapsed into one shared table.

use crate::bitdepth::BitDepth;
use crate::codec::CodecKind;

use super::tables::convert_qindex_to_q;

#[derive(Copy, Clone, Debug)]
struct Coeffs {
    x3: f64,
    x2: f64,
    x1: f64,
}

const KF_LOW: Coeffs = Coeffs { x3: 0.000001, x2: -0.0004, x1: 0.150 };
const KF_HIGH: Coeffs = Coeffs { x3: 0.0000021, x2: -0.00125, x1: 0.45 };
const ARFGF_LOW: Coeffs = Coeffs { x3: 0.0000015, x2: -0.0009, x1: 0.30 };
const ARFGF_HIGH: Coeffs = Coeffs { x3: 0.0000021, x2: -0.00125, x1: 0.55 };
const INTER_VP9: Coeffs = Coeffs { x3: 0.00000271, x2: -0.00113, x1: 0.70 };
const INTER_AV1: Coeffs = Coeffs { x3: 0.00000271, x2: -0.00113, x1: 0.90 };
const RTC: Coeffs = Coeffs { x3: 0.00000271, x2: -0.00113, x1: 0.70 };

/// `get_minq_index`: converts a target minq *value* (in real Q units) back
/// to the smallest qindex whose AC step is at least that big, special-casing
/// the near-lossless region below a real Q of 2.0.
fn get_minq_index(maxq: f64, coeffs: Coeffs, table: &[i32], bit_depth: BitDepth) -> i32 {
    let minqtarget = (((coeffs.x3 * maxq + coeffs.x2) * maxq + coeffs.x1) * maxq).min(maxq);
    if minqtarget <= 2.0 {
        return 0;
    }
    for i in 0..table.len() {
        if minqtarget <= convert_qindex_to_q(i as i32, bit_depth, table) {
            return i as i32;
        }
    }
    table.len() as i32 - 1
}

fn init_lut(coeffs: Coeffs, table: &[i32], bit_depth: BitDepth) -> Vec<i32> {
    (0..table.len())
        .map(|i| {
            let maxq = convert_qindex_to_q(i as i32, bit_depth, table);
            get_minq_index(maxq, coeffs, table, bit_depth)
        })
        .collect()
}

/// All six min-Q tables for a given codec/bit depth, sized to `ac_qlookup`'s
/// length (the codec's `Q_RANGE`).
#[derive(Clone, Debug)]
pub struct MinQTables {
    pub kf_low: Vec<i32>,
    pub kf_high: Vec<i32>,
    pub arfgf_low: Vec<i32>,
    pub arfgf_high: Vec<i32>,
    pub inter: Vec<i32>,
    pub rtc: Vec<i32>,
}

impl MinQTables {
    pub fn build(codec: CodecKind, bit_depth: BitDepth, ac_qlookup: &[i32]) -> Self {
        let inter_coeffs = if matches!(codec, CodecKind::Av1) { INTER_AV1 } else { INTER_VP9 };
        Self {
            kf_low: init_lut(KF_LOW, ac_qlookup, bit_depth),
            kf_high: init_lut(KF_HIGH, ac_qlookup, bit_depth),
            arfgf_low: init_lut(ARFGF_LOW, ac_qlookup, bit_depth),
            arfgf_high: init_lut(ARFGF_HIGH, ac_qlookup, bit_depth),
            inter: init_lut(inter_coeffs, ac_qlookup, bit_depth),
            rtc: init_lut(RTC, ac_qlookup, bit_depth),
        }
    }
}

/// `get_kf_active_quality`: blends `kf_low`/`kf_high` by `kf_boost`, as
/// §4.D's "Intra subsequent" path requires.
pub fn get_kf_active_quality(tables: &MinQTables, avg_qi_key: i32, kf_boost: i32) -> i32 {
    let maxq = tables.kf_low.len() as i32 - 1;
    let idx = avg_qi_key.clamp(0, maxq) as usize;
    let low = tables.kf_low[idx];
    let high = tables.kf_high[idx];

    // kf_boost ranges roughly 0..128 in the reference implementation; blend
    // linearly between the low- and high-motion tables.
    let t = (kf_boost.clamp(0, 128) as f64) / 128.0;
    (low as f64 + (high as f64 - low as f64) * t).round() as i32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::qindex::tables::build_ac_qlookup;

    #[test]
    fn tables_are_bounded() {
        let table = build_ac_qlookup(256, BitDepth::Depth8);
        let tables = MinQTables::build(CodecKind::Vp9, BitDepth::Depth8, &table);
        for t in [&tables.kf_low, &tables.kf_high, &tables.arfgf_low, &tables.arfgf_high, &tables.inter, &tables.rtc]
        {
            assert_eq!(t.len(), 256);
            for &v in t {
                assert!((0..=255).contains(&v));
            }
        }
    }

    #[test]
    fn kf_active_quality_is_between_low_and_high() {
        let table = build_ac_qlookup(256, BitDepth::Depth8);
        let tables = MinQTables::build(CodecKind::Vp9, BitDepth::Depth8, &table);
        let low = tables.kf_low[100];
        let high = tables.kf_high[100];
        let q = get_kf_active_quality(&tables, 100, 64);
        assert!(q >= low.min(high) && q <= low.max(high));
    }

    #[test]
    fn av1_inter_curve_differs_from_vp9() {
        let table = build_ac_qlookup(256, BitDepth::Depth8);
        let vp9 = MinQTables::build(CodecKind::Vp9, BitDepth::Depth8, &table);
        let av1 = MinQTables::build(CodecKind::Av1, BitDepth::Depth8, &table);
        assert_ne!(vp9.inter, av1.inter);
    }

    #[test]
    fn low_qindex_maps_to_minq_zero() {
        let table = build_ac_qlookup(256, BitDepth::Depth8);
        let tables = MinQTables::build(CodecKind::Vp9, BitDepth::Depth8, &table);
        assert_eq!(tables.kf_low[0], 0);
    }
}
