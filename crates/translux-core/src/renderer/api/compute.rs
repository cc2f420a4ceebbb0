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

//! Compute kernels, their buffer bindings and the dispatch descriptor.
//!
//! A [`ComputeKernel`] is the program abstraction: the device invokes it once
//! per workgroup of a [`ComputeDispatch`] and hands it the bound buffers as a
//! [`KernelResources`] table, addressed by binding index like shader bindings.

use crate::renderer::api::buffer::BufferId;
use crate::renderer::error::KernelError;
use bytemuck::Pod;

/// Coordinates of one workgroup within a dispatch grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkgroupId {
    /// X coordinate.
    pub x: u32,
    /// Y coordinate.
    pub y: u32,
    /// Z coordinate.
    pub z: u32,
}

impl WorkgroupId {
    /// Creates a workgroup id.
    pub const fn new(x: u32, y: u32, z: u32) -> Self {
        Self { x, y, z }
    }
}

/// How a kernel accesses a bound buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BindingAccess {
    /// Read-only storage or uniform data.
    ReadOnly,
    /// Read/write storage; the buffer counts as written by the dispatch.
    ReadWrite,
}

/// Associates a buffer with a binding index for one dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferBinding {
    /// Binding index seen by the kernel.
    pub binding: u32,
    /// The bound buffer.
    pub buffer: BufferId,
    /// Access mode.
    pub access: BindingAccess,
}

impl BufferBinding {
    /// A read-only binding.
    pub const fn read(binding: u32, buffer: BufferId) -> Self {
        Self {
            binding,
            buffer,
            access: BindingAccess::ReadOnly,
        }
    }

    /// A read/write binding.
    pub const fn read_write(binding: u32, buffer: BufferId) -> Self {
        Self {
            binding,
            buffer,
            access: BindingAccess::ReadWrite,
        }
    }
}

/// The WGSL program of a kernel, for devices that compile shaders.
///
/// Bindings live in group 0 at the kernel's binding indices. Read-only
/// bindings are declared `var<storage, read>`, writable ones
/// `var<storage, read_write>`. One workgroup of the program covers the same
/// output region as one [`ComputeKernel::run_workgroup`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KernelSource {
    /// WGSL source text.
    pub wgsl: &'static str,
    /// Name of the `@compute` entry point.
    pub entry_point: &'static str,
}

/// A program executed by the device over a grid of workgroups.
///
/// Workgroups of one dispatch may run in any order; a kernel must only
/// write the output region owned by the workgroup it is given.
pub trait ComputeKernel: Send + Sync {
    /// Debug label used in logs and errors.
    fn label(&self) -> &str;

    /// The kernel's WGSL program, if it has one.
    fn source(&self) -> Option<KernelSource> {
        None
    }

    /// Processes one workgroup.
    fn run_workgroup(
        &self,
        id: WorkgroupId,
        resources: &mut KernelResources<'_>,
    ) -> Result<(), KernelError>;
}

/// Everything the device needs to run a kernel.
pub struct ComputeDispatch<'a> {
    /// Debug label of the dispatch.
    pub label: &'a str,
    /// The kernel to run.
    pub kernel: &'a dyn ComputeKernel,
    /// Buffers bound for this dispatch.
    pub bindings: &'a [BufferBinding],
    /// Grid size in workgroups.
    pub workgroups: [u32; 3],
}

impl<'a> ComputeDispatch<'a> {
    /// A dispatch over a 2D grid.
    pub fn new_2d(
        label: &'a str,
        kernel: &'a dyn ComputeKernel,
        bindings: &'a [BufferBinding],
        x: u32,
        y: u32,
    ) -> Self {
        Self {
            label,
            kernel,
            bindings,
            workgroups: [x, y, 1],
        }
    }

    /// Total number of workgroups.
    pub fn workgroup_count(&self) -> u64 {
        self.workgroups.iter().map(|&n| n as u64).product()
    }
}

/// A bound buffer as seen from inside a kernel.
#[derive(Debug)]
pub enum ResourceBinding<'a> {
    /// Read-only bytes.
    Read(&'a [u8]),
    /// Writable bytes; `None` once the kernel has borrowed them.
    Write(Option<&'a mut [u8]>),
}

/// The binding table handed to [`ComputeKernel::run_workgroup`].
///
/// Typed views borrow for the whole workgroup (`'a`), so a kernel can hold
/// several input slices and its output slices at the same time. Each
/// writable binding can be borrowed once per workgroup.
#[derive(Debug, Default)]
pub struct KernelResources<'a> {
    entries: Vec<(u32, ResourceBinding<'a>)>,
}

impl<'a> KernelResources<'a> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Binds read-only bytes.
    pub fn bind_read(&mut self, binding: u32, bytes: &'a [u8]) {
        self.entries.push((binding, ResourceBinding::Read(bytes)));
    }

    /// Binds writable bytes.
    pub fn bind_write(&mut self, binding: u32, bytes: &'a mut [u8]) {
        self.entries
            .push((binding, ResourceBinding::Write(Some(bytes))));
    }

    fn entry(&self, binding: u32) -> Result<&ResourceBinding<'a>, KernelError> {
        self.entries
            .iter()
            .find(|(b, _)| *b == binding)
            .map(|(_, r)| r)
            .ok_or(KernelError::MissingBinding { binding })
    }

    /// Views a read-only binding as a slice of `T`.
    pub fn read<T: Pod>(&self, binding: u32) -> Result<&'a [T], KernelError> {
        match self.entry(binding)? {
            ResourceBinding::Read(bytes) => {
                let bytes: &'a [u8] = *bytes;
                bytemuck::try_cast_slice(bytes).map_err(|e| KernelError::Layout {
                    binding,
                    reason: format!("{e:?}"),
                })
            }
            ResourceBinding::Write(_) => Err(KernelError::Layout {
                binding,
                reason: "binding is writable, borrow it with `write`".into(),
            }),
        }
    }

    /// Views the start of a read-only binding as a single `T` (uniform block).
    pub fn uniform<T: Pod>(&self, binding: u32) -> Result<&'a T, KernelError> {
        let size = std::mem::size_of::<T>();
        let bytes: &'a [u8] = match self.entry(binding)? {
            ResourceBinding::Read(bytes) => *bytes,
            ResourceBinding::Write(_) => {
                return Err(KernelError::Layout {
                    binding,
                    reason: "uniform blocks must be bound read-only".into(),
                })
            }
        };
        let head = bytes.get(..size).ok_or_else(|| KernelError::Layout {
            binding,
            reason: format!("{} bytes bound, uniform needs {size}", bytes.len()),
        })?;
        bytemuck::try_from_bytes(head).map_err(|e| KernelError::Layout {
            binding,
            reason: format!("{e:?}"),
        })
    }

    /// Borrows a writable binding as a mutable slice of `T`.
    pub fn write<T: Pod>(&mut self, binding: u32) -> Result<&'a mut [T], KernelError> {
        let slot = self
            .entries
            .iter_mut()
            .find(|(b, _)| *b == binding)
            .map(|(_, r)| r)
            .ok_or(KernelError::MissingBinding { binding })?;
        match slot {
            ResourceBinding::Read(_) => Err(KernelError::ReadOnlyBinding { binding }),
            ResourceBinding::Write(bytes) => {
                let bytes = bytes.take().ok_or(KernelError::BindingTaken { binding })?;
                bytemuck::try_cast_slice_mut(bytes).map_err(|e| KernelError::Layout {
                    binding,
                    reason: format!("{e:?}"),
                })
            }
        }
    }
}
