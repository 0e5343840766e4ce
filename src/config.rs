// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Caller-provided rate control configuration (§3.1, §6.2) and its
//! validation (§4.I).

use log::debug;

use crate::codec::CodecKind;
use crate::error::ConfigError;

/// Caller-provided rate control configuration. Purely in-memory: nothing
/// here is persisted, and no field reaches for `serde` — the reference
/// crate's own config-like structs (`EncoderConfig`, capability structs)
/// are likewise plain validated data, not a deserialization schema.
#[derive(Clone, Debug, PartialEq)]
pub struct RateControlConfig {
    pub width: u32,
    pub height: u32,

    pub min_quantizer: i32,
    pub max_quantizer: i32,

    /// Kilobits per second.
    pub target_bandwidth: i64,

    /// Milliseconds of bandwidth.
    pub buf_initial_sz: i64,
    pub buf_optimal_sz: i64,
    pub buf_sz: i64,

    /// VP9/AV1: 0-100. VP8: 0-1000.
    pub undershoot_pct: i32,
    pub overshoot_pct: i32,

    /// Zero means "no cap".
    pub max_intra_bitrate_pct: i32,
    pub max_inter_bitrate_pct: i32,

    pub framerate: f64,

    pub ss_number_layers: u8,
    pub ts_number_layers: u8,

    /// One entry per `(spatial, temporal)` layer, indexed
    /// `sl * ts_number_layers + tl`.
    pub max_quantizers: Vec<i32>,
    pub min_quantizers: Vec<i32>,

    /// One entry per spatial layer.
    pub scaling_factor_num: Vec<u32>,
    pub scaling_factor_den: Vec<u32>,

    /// Cumulative target bitrate per layer, kbps, indexed as above.
    pub layer_target_bitrate: Vec<i64>,

    /// One entry per temporal layer.
    pub ts_rate_decimator: Vec<u32>,
}

impl RateControlConfig {
    /// A single-layer config with otherwise sane defaults, for tests and
    /// simple callers.
    pub fn single_layer(width: u32, height: u32, target_bandwidth_kbps: i64, framerate: f64) -> Self {
        Self {
            width,
            height,
            min_quantizer: 0,
            max_quantizer: 63,
            target_bandwidth: target_bandwidth_kbps,
            buf_initial_sz: 500,
            buf_optimal_sz: 600,
            buf_sz: 1000,
            undershoot_pct: 50,
            overshoot_pct: 50,
            max_intra_bitrate_pct: 0,
            max_inter_bitrate_pct: 0,
            framerate,
            ss_number_layers: 1,
            ts_number_layers: 1,
            max_quantizers: vec![63],
            min_quantizers: vec![0],
            scaling_factor_num: vec![1],
            scaling_factor_den: vec![1],
            layer_target_bitrate: vec![target_bandwidth_kbps],
            ts_rate_decimator: vec![1],
        }
    }

    pub fn num_layers(&self) -> usize {
        self.ss_number_layers as usize * self.ts_number_layers as usize
    }

    pub fn layer_index(&self, spatial_layer_id: u8, temporal_layer_id: u8) -> usize {
        spatial_layer_id as usize * self.ts_number_layers as usize + temporal_layer_id as usize
    }

    /// Target bandwidth expressed in bits per second.
    pub fn target_bandwidth_bps(&self) -> i64 {
        self.target_bandwidth * 1000
    }

    /// Range-checks every field named in §3.1 for `codec`. Does not mutate
    /// `self`; `init`/`update_config` call this before adopting a config.
    pub fn validate(&self, codec: CodecKind) -> Result<(), ConfigError> {
        let limits = codec.limits();

        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::DimensionsOutOfRange(
                self.width,
                self.height,
                limits.max_width,
                limits.max_height,
            ));
        }
        if self.width > limits.max_width || self.height > limits.max_height {
            return Err(ConfigError::DimensionsOutOfRange(
                self.width,
                self.height,
                limits.max_width,
                limits.max_height,
            ));
        }

        if !(0..=63).contains(&self.min_quantizer) {
            return Err(ConfigError::QuantizerOutOfRange(self.min_quantizer));
        }
        if !(0..=63).contains(&self.max_quantizer) {
            return Err(ConfigError::QuantizerOutOfRange(self.max_quantizer));
        }
        if self.min_quantizer > self.max_quantizer {
            return Err(ConfigError::QuantizerRangeInverted(self.min_quantizer, self.max_quantizer));
        }

        let max_adapt_pct = if matches!(codec, CodecKind::Vp8) { 1000 } else { 100 };
        if !(0..=max_adapt_pct).contains(&self.undershoot_pct) {
            return Err(ConfigError::AdaptationPctOutOfRange(self.undershoot_pct, max_adapt_pct));
        }
        if !(0..=max_adapt_pct).contains(&self.overshoot_pct) {
            return Err(ConfigError::AdaptationPctOutOfRange(self.overshoot_pct, max_adapt_pct));
        }

        if self.ss_number_layers == 0 || self.ts_number_layers == 0 {
            return Err(ConfigError::ZeroLayers);
        }
        if matches!(codec, CodecKind::Vp8)
            && (self.ss_number_layers != 1 || self.ts_number_layers != 1)
        {
            return Err(ConfigError::Vp8LayeringUnsupported);
        }
        if self.ss_number_layers > limits.max_spatial_layers {
            return Err(ConfigError::TooManySpatialLayers(
                self.ss_number_layers,
                limits.max_spatial_layers,
            ));
        }
        if self.ts_number_layers > limits.max_temporal_layers {
            return Err(ConfigError::TooManyTemporalLayers(
                self.ts_number_layers,
                limits.max_temporal_layers,
            ));
        }
        let num_layers = self.num_layers();
        if num_layers > limits.max_layers {
            return Err(ConfigError::TooManyLayers(num_layers, limits.max_layers));
        }

        for l in 0..num_layers {
            let min_q = *self.min_quantizers.get(l).unwrap_or(&self.min_quantizer);
            let max_q = *self.max_quantizers.get(l).unwrap_or(&self.max_quantizer);
            if min_q > max_q {
                return Err(ConfigError::LayerQuantizerRangeInverted(l, min_q, max_q));
            }
        }

        if self.ts_number_layers > 1 {
            for sl in 0..self.ss_number_layers {
                let mut prev = i64::MIN;
                for tl in 0..self.ts_number_layers {
                    let idx = self.layer_index(sl, tl);
                    let rate = *self.layer_target_bitrate.get(idx).unwrap_or(&0);
                    if rate < prev {
                        return Err(ConfigError::BitrateNotMonotonic(sl));
                    }
                    prev = rate;
                }
            }

            let top = self.ts_number_layers as usize - 1;
            let top_dec = *self.ts_rate_decimator.get(top).unwrap_or(&0);
            if top_dec != 1 {
                return Err(ConfigError::TopDecimatorNotOne(top, top_dec));
            }
            for tl in (1..self.ts_number_layers as usize).rev() {
                let hi = *self.ts_rate_decimator.get(tl).unwrap_or(&0);
                let lo = *self.ts_rate_decimator.get(tl - 1).unwrap_or(&0);
                if lo != 2 * hi {
                    return Err(ConfigError::DecimatorNotDoubling(tl - 1, lo, tl, hi));
                }
            }
        }

        debug!("rate control config for {codec:?} validated ok");
        Ok(())
    }

    /// `framerate < 0.1` is coerced to 30 (§4.I, §8 boundary behavior 9).
    pub fn effective_framerate(&self) -> f64 {
        if self.framerate < 0.1 {
            30.0
        } else {
            self.framerate
        }
    }
}
