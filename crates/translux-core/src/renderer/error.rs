// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Defines the hierarchy of error types for the compute and rendering subsystem.

use crate::lane::LaneError;
use crate::renderer::api::{BufferId, BufferUsage};
use std::fmt;

/// An error raised by a compute kernel while processing a workgroup.
#[derive(Debug)]
pub enum KernelError {
    /// The kernel asked for a binding index that was not bound.
    MissingBinding {
        /// The binding index.
        binding: u32,
    },
    /// The kernel asked for write access to a read-only binding.
    ReadOnlyBinding {
        /// The binding index.
        binding: u32,
    },
    /// A writable binding was requested twice within one workgroup.
    BindingTaken {
        /// The binding index.
        binding: u32,
    },
    /// The bound bytes cannot be viewed as the requested element type.
    Layout {
        /// The binding index.
        binding: u32,
        /// Why the cast failed.
        reason: String,
    },
    /// Kernel-specific failure.
    Failed(String),
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::MissingBinding { binding } => {
                write!(f, "No buffer bound at binding {binding}")
            }
            KernelError::ReadOnlyBinding { binding } => {
                write!(f, "Binding {binding} is read-only")
            }
            KernelError::BindingTaken { binding } => {
                write!(f, "Binding {binding} was already borrowed mutably")
            }
            KernelError::Layout { binding, reason } => {
                write!(f, "Binding {binding} has an incompatible layout: {reason}")
            }
            KernelError::Failed(msg) => write!(f, "Kernel failed: {msg}"),
        }
    }
}

impl std::error::Error for KernelError {}

/// An error related to the creation or use of a device buffer or query.
#[derive(Debug)]
pub enum ResourceError {
    /// No buffer exists for the given handle.
    NotFound {
        /// The unknown handle.
        id: BufferId,
    },
    /// The handle or ID used to reference a resource is invalid.
    InvalidHandle,
    /// An access fell outside the buffer.
    OutOfBounds {
        /// Start of the access in bytes.
        offset: u64,
        /// Length of the access in bytes.
        len: u64,
        /// Size of the buffer in bytes.
        size: u64,
    },
    /// The buffer was not created with the usage the operation needs.
    UsageViolation {
        /// Label of the offending buffer.
        label: String,
        /// The usage that was required.
        required: BufferUsage,
    },
    /// The buffer is currently mapped and cannot be mapped again or bound.
    AlreadyMapped {
        /// Label of the offending buffer.
        label: String,
    },
    /// The buffer was written by a dispatch and no memory barrier has been
    /// issued since, so its contents are not yet visible.
    MissingBarrier {
        /// Label of the offending buffer.
        label: String,
    },
    /// A byte length does not match the expected size.
    SizeMismatch {
        /// Expected size in bytes.
        expected: u64,
        /// Actual size in bytes.
        actual: u64,
    },
    /// A buffer larger than the device allows was requested.
    TooLarge {
        /// Requested size in bytes.
        size: u64,
        /// Largest size the device accepts.
        limit: u64,
    },
    /// The same buffer or binding index appears twice in one dispatch.
    DuplicateBinding {
        /// The binding index.
        binding: u32,
    },
    /// A kernel reported an error during a dispatch.
    Kernel {
        /// Label of the kernel.
        label: String,
        /// The kernel's error.
        source: KernelError,
    },
    /// An error originating from the specific backend implementation.
    BackendError(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceError::NotFound { id } => write!(f, "Buffer not found: {id:?}"),
            ResourceError::InvalidHandle => write!(f, "Invalid resource handle or ID."),
            ResourceError::OutOfBounds { offset, len, size } => write!(
                f,
                "Access of {len} bytes at offset {offset} exceeds buffer size {size}"
            ),
            ResourceError::UsageViolation { label, required } => {
                write!(f, "Buffer '{label}' lacks required usage {required:?}")
            }
            ResourceError::AlreadyMapped { label } => {
                write!(f, "Buffer '{label}' is currently mapped")
            }
            ResourceError::MissingBarrier { label } => write!(
                f,
                "Buffer '{label}' was written by a dispatch without a following memory barrier"
            ),
            ResourceError::SizeMismatch { expected, actual } => {
                write!(f, "Size mismatch: expected {expected} bytes, got {actual}")
            }
            ResourceError::TooLarge { size, limit } => {
                write!(f, "Buffer of {size} bytes exceeds the device limit of {limit}")
            }
            ResourceError::DuplicateBinding { binding } => {
                write!(f, "Binding {binding} is bound more than once")
            }
            ResourceError::Kernel { label, source } => {
                write!(f, "Kernel '{label}' failed: {source}")
            }
            ResourceError::BackendError(msg) => {
                write!(f, "Backend-specific resource error: {msg}")
            }
        }
    }
}

impl std::error::Error for ResourceError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ResourceError::Kernel { source, .. } => Some(source),
            _ => None,
        }
    }
}

/// A high-level error produced by a render mode or one of its passes.
#[derive(Debug)]
pub enum RenderError {
    /// An operation was attempted before the mode was initialized.
    NotInitialized,
    /// Device resources for the mode could not be created.
    InitializationFailed(String),
    /// An error occurred while managing a device resource.
    ResourceError(ResourceError),
    /// Tiles overflowed their light list while strict capacity was requested.
    CapacityOverflow {
        /// Number of tiles that dropped at least one light.
        tiles: u32,
        /// Total number of dropped light references.
        dropped: u64,
    },
    /// A lane of the active mode failed.
    LaneFailed {
        /// Strategy name of the lane.
        lane: &'static str,
        /// The lane's error.
        source: LaneError,
    },
    /// An unexpected or internal error occurred.
    Internal(String),
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderError::NotInitialized => {
                write!(f, "The rendering system is not initialized.")
            }
            RenderError::InitializationFailed(msg) => {
                write!(f, "Failed to initialize render resources: {msg}")
            }
            RenderError::ResourceError(err) => {
                write!(f, "Graphics resource operation failed: {err}")
            }
            RenderError::CapacityOverflow { tiles, dropped } => write!(
                f,
                "{tiles} tiles exceeded their light capacity ({dropped} lights dropped)"
            ),
            RenderError::LaneFailed { lane, source } => {
                write!(f, "Lane '{lane}' failed: {source}")
            }
            RenderError::Internal(msg) => {
                write!(f, "An internal or unexpected error occurred: {msg}")
            }
        }
    }
}

impl std::error::Error for RenderError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RenderError::ResourceError(err) => Some(err),
            RenderError::LaneFailed { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<ResourceError> for RenderError {
    fn from(err: ResourceError) -> Self {
        RenderError::ResourceError(err)
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error;

    use super::*;

    #[test]
    fn resource_error_display() {
        let err = ResourceError::OutOfBounds {
            offset: 16,
            len: 32,
            size: 40,
        };
        assert_eq!(
            format!("{err}"),
            "Access of 32 bytes at offset 16 exceeds buffer size 40"
        );

        let err = ResourceError::MissingBarrier {
            label: "tile_light_indices".to_string(),
        };
        assert_eq!(
            format!("{err}"),
            "Buffer 'tile_light_indices' was written by a dispatch without a following memory barrier"
        );
    }

    #[test]
    fn resource_error_wrapping_kernel_error() {
        let err = ResourceError::Kernel {
            label: "light_culling".to_string(),
            source: KernelError::MissingBinding { binding: 3 },
        };
        assert_eq!(
            format!("{err}"),
            "Kernel 'light_culling' failed: No buffer bound at binding 3"
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn render_error_display_wrapping_resource_error() {
        let res_err = ResourceError::NotFound { id: BufferId(7) };
        let render_err: RenderError = res_err.into();
        assert_eq!(
            format!("{render_err}"),
            "Graphics resource operation failed: Buffer not found: BufferId(7)"
        );
        assert!(render_err.source().is_some());
    }

    #[test]
    fn render_error_capacity_overflow_display() {
        let err = RenderError::CapacityOverflow {
            tiles: 2,
            dropped: 5,
        };
        assert_eq!(
            format!("{err}"),
            "2 tiles exceeded their light capacity (5 lights dropped)"
        );
        assert!(err.source().is_none());
    }
}
