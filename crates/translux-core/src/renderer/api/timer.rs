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

//! Device timer query handles.

/// An opaque handle to an elapsed-time query on the device timeline.
///
/// Created by `begin_timer_query`, closed by `end_timer_query`, and resolved
/// asynchronously: the result becomes available some time after the
/// measured work has completed on the device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerQueryId(pub u64);
