// Copyright 2026 the Grebe Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Errors reported across the rendering boundary.

use thiserror::Error;

use crate::geom::Size;

/// Errors that can occur in the rendering core.
///
/// Creation failures are reported as values and never panic; callers are
/// expected to check and degrade gracefully (e.g. skip rendering).
/// Violations of the frame allocator's stack discipline and in-pass format
/// mismatches are programmer errors and fail fast in debug builds instead.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum GfxError {
    /// A requested surface or canvas exceeds the backend's maximum size.
    #[error("requested size {requested:?} exceeds backend maximum {max:?}")]
    InvalidSize { requested: Size, max: Size },
    /// Backing memory or a GPU resource could not be obtained.
    #[error("could not allocate backing storage for {requested:?}")]
    AllocationFailure { requested: Size },
    /// A blit or pixel access between incompatible pixel formats, or an
    /// imported buffer too small for its declared format.
    #[error("pixel format mismatch: {0}")]
    FormatMismatch(&'static str),
    /// Drawing was attempted before any canvas binding succeeded.
    #[error("no canvas is bound")]
    UnboundCanvas,
    /// The frame allocator was released out of stack order.
    #[error("frame allocator released out of stack order")]
    AllocatorOrderViolation,
}
