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

//! Binding checks shared by every compute backend.

use translux_core::renderer::api::{BindingAccess, BufferBinding, BufferUsage};
use translux_core::renderer::ResourceError;

/// What a backend knows about a buffer when it is bound.
pub(crate) struct BindingState<'a> {
    pub(crate) label: &'a str,
    pub(crate) usage: BufferUsage,
    pub(crate) mapped: bool,
    pub(crate) pending_writes: bool,
}

/// Validates `bindings` against the state `lookup` reports for each buffer
/// and returns the looked-up values in binding order.
pub(crate) fn validate_bindings<T>(
    bindings: &[BufferBinding],
    mut lookup: impl FnMut(&BufferBinding) -> Result<T, ResourceError>,
    state: impl Fn(&T) -> BindingState<'_>,
) -> Result<Vec<(BufferBinding, T)>, ResourceError> {
    let mut resolved: Vec<(BufferBinding, T)> = Vec::with_capacity(bindings.len());

    for binding in bindings {
        if resolved
            .iter()
            .any(|(b, _)| b.binding == binding.binding || b.buffer == binding.buffer)
        {
            return Err(ResourceError::DuplicateBinding {
                binding: binding.binding,
            });
        }

        let value = lookup(binding)?;
        let buffer = state(&value);

        let storage = buffer.usage.contains(BufferUsage::STORAGE);
        let allowed = match binding.access {
            BindingAccess::ReadWrite => storage,
            BindingAccess::ReadOnly => storage || buffer.usage.contains(BufferUsage::UNIFORM),
        };
        if !allowed {
            return Err(ResourceError::UsageViolation {
                label: buffer.label.to_owned(),
                required: BufferUsage::STORAGE,
            });
        }
        if buffer.mapped {
            return Err(ResourceError::AlreadyMapped {
                label: buffer.label.to_owned(),
            });
        }
        // Write-after-write of disjoint regions needs no barrier; reads do.
        if binding.access == BindingAccess::ReadOnly && buffer.pending_writes {
            return Err(ResourceError::MissingBarrier {
                label: buffer.label.to_owned(),
            });
        }
        resolved.push((*binding, value));
    }
    Ok(resolved)
}
