// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! Component B: the leaky-bucket buffer model.
//!
//! Grounded on the reference crate's own `bitrate_ctrl::leaky_bucket`
//! module: `LeakyBucket` there tracks a `fullness` that rises by the
//! encoded frame size and drains by a per-frame share of the target
//! bitrate, clamped to a capacity. `BufferModel` keeps that same shape but
//! replaces the capacity/drain bookkeeping with the decoder-buffer
//! semantics of §4.B: `buffer_level`/`bits_off_target` rise every frame
//! tick by `avg_frame_bandwidth` and fall by the actual encoded size,
//! clamped to `maximum_buffer_size`.

use log::trace;

use crate::config::RateControlConfig;

/// HRD buffer state (§3.1 "Buffer", §4.B).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct BufferModel {
    pub buffer_level: i64,
    pub bits_off_target: i64,
    pub starting_buffer_level: i64,
    pub optimal_buffer_level: i64,
    pub maximum_buffer_size: i64,
}

impl BufferModel {
    /// Sizes the buffer from config (§4.B "Sizing from config").
    /// `bandwidth_bps` is the stream's (or layer's) target bandwidth in
    /// bits per second.
    pub fn from_config(cfg: &RateControlConfig, bandwidth_bps: i64) -> Self {
        let starting_buffer_level = cfg.buf_initial_sz * bandwidth_bps / 1000;
        let optimal_buffer_level = if cfg.buf_optimal_sz == 0 {
            bandwidth_bps / 8
        } else {
            cfg.buf_optimal_sz * bandwidth_bps / 1000
        };
        let maximum_buffer_size = if cfg.buf_sz == 0 {
            bandwidth_bps / 8
        } else {
            cfg.buf_sz * bandwidth_bps / 1000
        };

        let buffer_level = starting_buffer_level.min(maximum_buffer_size);

        BufferModel {
            buffer_level,
            bits_off_target: buffer_level,
            starting_buffer_level,
            optimal_buffer_level,
            maximum_buffer_size,
        }
    }

    /// Pre-encode update: the buffer fills by one frame's worth of average
    /// bandwidth before the frame is produced (§4.B).
    pub fn pre_encode_update(&mut self, avg_frame_bandwidth: i64) {
        self.bits_off_target =
            (self.bits_off_target + avg_frame_bandwidth).min(self.maximum_buffer_size);
        self.buffer_level = self.bits_off_target;
    }

    /// Post-encode update: the buffer drains by the actual encoded size
    /// (§4.B). Returns the clamped value for convenience.
    pub fn post_encode_update(&mut self, encoded_frame_bits: i64) -> i64 {
        self.bits_off_target =
            (self.bits_off_target - encoded_frame_bits).min(self.maximum_buffer_size);
        self.buffer_level = self.bits_off_target;
        trace!(
            "buffer post-update: level={} max={}",
            self.buffer_level, self.maximum_buffer_size
        );
        self.buffer_level
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cfg() -> RateControlConfig {
        RateControlConfig::single_layer(1280, 720, 1000, 30.0)
    }

    #[test]
    fn zero_optimal_and_max_fall_back_to_bandwidth_over_8() {
        let mut cfg = cfg();
        cfg.buf_optimal_sz = 0;
        cfg.buf_sz = 0;
        let model = BufferModel::from_config(&cfg, 1_000_000);
        assert_eq!(model.optimal_buffer_level, 1_000_000 / 8);
        assert_eq!(model.maximum_buffer_size, 1_000_000 / 8);
    }

    #[test]
    fn buffer_level_tracks_bits_off_target() {
        let mut model = BufferModel::from_config(&cfg(), 1_000_000);
        model.pre_encode_update(33_333);
        assert_eq!(model.buffer_level, model.bits_off_target);
        model.post_encode_update(40_000);
        assert_eq!(model.buffer_level, model.bits_off_target);
    }

    #[test]
    fn buffer_never_exceeds_maximum() {
        let mut model = BufferModel::from_config(&cfg(), 1_000_000);
        for _ in 0..1000 {
            model.pre_encode_update(1_000_000);
            assert!(model.buffer_level <= model.maximum_buffer_size);
        }
    }

    #[test]
    fn post_encode_can_drain_below_zero_bound() {
        // The spec only clamps the upper bound; a frame far larger than the
        // buffer's current fullness is allowed to drive it negative, same
        // as the reference leaky bucket does not floor at zero on its own
        // (callers react to a deeply negative buffer via active_worst_quality).
        let mut model = BufferModel::from_config(&cfg(), 1_000_000);
        model.post_encode_update(10_000_000);
        assert!(model.buffer_level < 0);
    }
}
