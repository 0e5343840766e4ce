// Copyright 2025 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

//! The C-API-flavored status vocabulary of §6.1, kept as a thin projection
//! of [`crate::error::EngineError`] for callers bridging to the external
//! façade described in §1 (out of scope for this crate).

use crate::error::EngineError;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum Status {
    #[default]
    Success,
    Warning,
    Error,
    Failed,
    InvalidParam,
    UnsupportedCodec,
    Unimplemented,
    Unknown,
}

impl From<&EngineError> for Status {
    fn from(err: &EngineError) -> Self {
        match err {
            EngineError::InvalidConfig(_) => Status::InvalidParam,
            EngineError::UnsupportedCodec => Status::UnsupportedCodec,
            EngineError::Unimplemented => Status::Unimplemented,
            EngineError::InvalidState(_) => Status::Failed,
        }
    }
}

impl<T> From<&Result<T, EngineError>> for Status {
    fn from(result: &Result<T, EngineError>) -> Self {
        match result {
            Ok(_) => Status::Success,
            Err(e) => Status::from(e),
        }
    }
}
