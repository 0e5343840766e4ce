// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Codec discriminators and the per-codec constants of §6.3.

/// The codec a rate control engine is driving.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum CodecKind {
    Vp8,
    Vp9,
    Av1,
    #[default]
    Unknown,
}

/// Selects the backend implementation for a codec. Each codec currently has
/// exactly one real backend, plus a `Default` alias that resolves to it.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum AlgoId {
    #[default]
    Default,
    LibvpxVp8,
    LibvpxVp9,
    AomAv1,
    Unknown,
}

impl AlgoId {
    /// Resolves `Default` to the concrete backend for `codec`. Returns
    /// `None` if `algo` names a backend that does not belong to `codec`.
    pub fn resolve(self, codec: CodecKind) -> Option<AlgoId> {
        match (self, codec) {
            (AlgoId::Default, CodecKind::Vp8) => Some(AlgoId::LibvpxVp8),
            (AlgoId::Default, CodecKind::Vp9) => Some(AlgoId::LibvpxVp9),
            (AlgoId::Default, CodecKind::Av1) => Some(AlgoId::AomAv1),
            (AlgoId::LibvpxVp8, CodecKind::Vp8) => Some(AlgoId::LibvpxVp8),
            (AlgoId::LibvpxVp9, CodecKind::Vp9) => Some(AlgoId::LibvpxVp9),
            (AlgoId::AomAv1, CodecKind::Av1) => Some(AlgoId::AomAv1),
            _ => None,
        }
    }
}

/// Number of distinct slots in `rate_correction_factors`, per §3.1.
///
/// Real libvpx/aom index this array by a `RATE_FACTOR_LEVEL` that
/// distinguishes key frames from golden/alt-ref frames from ordinary inter
/// frames, so that a sudden golden-frame boost doesn't corrupt the
/// correction factor ordinary inter frames rely on. This engine's
/// `FrameParams` only distinguishes `Key`/`Inter` (golden/alt-ref frame
/// selection is a GOP-structuring decision this crate's non-goals exclude),
/// so only the `KfStd` and `InterNormal` slots are ever written; the
/// remaining slots are reserved so that a future caller that does
/// distinguish golden/alt-ref frames can do so without a layout change.
pub const VP9_AV1_RATE_FACTOR_LEVELS: usize = 5;
pub const VP8_RATE_FACTOR_LEVELS: usize = 2;

/// Per-codec constants from §6.3.
#[derive(Copy, Clone, Debug)]
pub struct CodecLimits {
    pub q_range: i32,
    pub max_spatial_layers: u8,
    pub max_temporal_layers: u8,
    pub max_layers: usize,
    pub min_bpb_factor: f64,
    pub max_bpb_factor: f64,
    pub max_mb_rate: u64,
    pub maxrate_1080p: u64,
    pub max_width: u32,
    pub max_height: u32,
}

pub const MAX_LOOP_FILTER: i32 = 63;

impl CodecKind {
    pub fn limits(self) -> CodecLimits {
        match self {
            CodecKind::Vp8 => CodecLimits {
                q_range: 128,
                max_spatial_layers: 1,
                max_temporal_layers: 1,
                max_layers: 1,
                min_bpb_factor: 0.01,
                max_bpb_factor: 50.0,
                max_mb_rate: 250,
                maxrate_1080p: 2_025_000,
                max_width: 16383,
                max_height: 16383,
            },
            CodecKind::Vp9 => CodecLimits {
                q_range: 256,
                max_spatial_layers: 5,
                max_temporal_layers: 5,
                max_layers: 12,
                min_bpb_factor: 0.005,
                max_bpb_factor: 50.0,
                max_mb_rate: 250,
                maxrate_1080p: 4_000_000,
                max_width: 65535,
                max_height: 65535,
            },
            CodecKind::Av1 => CodecLimits {
                q_range: 256,
                max_spatial_layers: 4,
                max_temporal_layers: 8,
                max_layers: 32,
                min_bpb_factor: 0.005,
                max_bpb_factor: 50.0,
                max_mb_rate: 250,
                maxrate_1080p: 2_025_000,
                max_width: 65535,
                max_height: 65535,
            },
            CodecKind::Unknown => CodecLimits {
                q_range: 0,
                max_spatial_layers: 0,
                max_temporal_layers: 0,
                max_layers: 0,
                min_bpb_factor: 0.0,
                max_bpb_factor: 0.0,
                max_mb_rate: 0,
                maxrate_1080p: 0,
                max_width: 0,
                max_height: 0,
            },
        }
    }

    pub fn rate_factor_levels(self) -> usize {
        match self {
            CodecKind::Vp8 => VP8_RATE_FACTOR_LEVELS,
            CodecKind::Vp9 | CodecKind::Av1 => VP9_AV1_RATE_FACTOR_LEVELS,
            CodecKind::Unknown => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_resolves_per_codec() {
        assert_eq!(AlgoId::Default.resolve(CodecKind::Vp8), Some(AlgoId::LibvpxVp8));
        assert_eq!(AlgoId::Default.resolve(CodecKind::Vp9), Some(AlgoId::LibvpxVp9));
        assert_eq!(AlgoId::Default.resolve(CodecKind::Av1), Some(AlgoId::AomAv1));
    }

    #[test]
    fn mismatched_backend_is_rejected() {
        assert_eq!(AlgoId::LibvpxVp8.resolve(CodecKind::Vp9), None);
    }

    #[test]
    fn limits_match_spec_table() {
        assert_eq!(CodecKind::Vp8.limits().q_range, 128);
        assert_eq!(CodecKind::Vp9.limits().q_range, 256);
        assert_eq!(CodecKind::Vp8.limits().maxrate_1080p, 2_025_000);
        assert_eq!(CodecKind::Av1.limits().maxrate_1080p, 2_025_000);
        assert_eq!(CodecKind::Vp9.limits().maxrate_1080p, 4_000_000);
    }
}
