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

//! # Lane Abstraction
//!
//! A **Lane** is one pass of a render mode's pipeline: the geometry pass,
//! the tile light culling dispatch, the tiled shading pass, the Haar bake,
//! the scattering reconstruction, and so on. The render agent owns the lanes
//! of the active mode and runs them in order every frame.
//!
//! Lanes never talk to each other directly. The agent populates a
//! [`LaneContext`] (a type-map) with the device, the scene and the frame's
//! view, and every lane publishes its outputs (buffer handles, reports) back
//! into the same context for the lanes that follow.
//!
//! ```rust,ignore
//! use translux_core::lane::{Lane, LaneKind, LaneError, LaneContext};
//!
//! struct ClearLane;
//!
//! impl Lane for ClearLane {
//!     fn strategy_name(&self) -> &'static str { "Clear" }
//!     fn lane_kind(&self) -> LaneKind { LaneKind::Shading }
//!
//!     fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
//!         let target = ctx.get::<ColorTarget>().ok_or(LaneError::missing("ColorTarget"))?;
//!         // ...
//!         Ok(())
//!     }
//!
//!     fn as_any(&self) -> &dyn std::any::Any { self }
//!     fn as_any_mut(&mut self) -> &mut dyn std::any::Any { self }
//! }
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;

pub mod context_keys;
pub use context_keys::*;

/// Failure of a lane hook.
#[derive(Debug)]
pub enum LaneError {
    /// `execute` ran before `on_initialize` succeeded.
    NotInitialized,
    /// A value the lane needs is missing from (or malformed in) the context.
    InvalidContext {
        /// Type name the lane looked up.
        expected: &'static str,
        /// What was found instead.
        received: String,
    },
    /// A pass failed while running.
    ExecutionFailed(Box<dyn std::error::Error + Send + Sync>),
    /// A pass failed while allocating or loading its resources.
    InitializationFailed(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for LaneError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneError::NotInitialized => write!(f, "lane used before initialization"),
            LaneError::InvalidContext { expected, received } => {
                write!(
                    f,
                    "lane context is missing {expected}: {received}"
                )
            }
            LaneError::ExecutionFailed(e) => write!(f, "pass failed: {e}"),
            LaneError::InitializationFailed(e) => write!(f, "pass setup failed: {e}"),
        }
    }
}

impl std::error::Error for LaneError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            LaneError::ExecutionFailed(e) | LaneError::InitializationFailed(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl LaneError {
    /// A required context entry was absent.
    pub fn missing(type_name: &'static str) -> Self {
        LaneError::InvalidContext {
            expected: type_name,
            received: "no such entry".into(),
        }
    }

    /// Wraps an execution error.
    pub fn execution<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        LaneError::ExecutionFailed(Box::new(err))
    }

    /// Wraps an initialization error.
    pub fn initialization<E: std::error::Error + Send + Sync + 'static>(err: E) -> Self {
        LaneError::InitializationFailed(Box::new(err))
    }
}

/// Classification of lanes, used for routing, filtering and logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LaneKind {
    /// Screen-space or texture-space geometry rasterization.
    Geometry,
    /// Per-tile light culling.
    Culling,
    /// Lighting evaluation into the color target.
    Shading,
    /// Debug geometry drawn over the shaded image.
    Overlay,
    /// Offline kernel baking.
    Bake,
    /// Runtime subsurface scattering reconstruction.
    Scattering,
}

impl fmt::Display for LaneKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LaneKind::Geometry => write!(f, "Geometry"),
            LaneKind::Culling => write!(f, "Culling"),
            LaneKind::Shading => write!(f, "Shading"),
            LaneKind::Overlay => write!(f, "Overlay"),
            LaneKind::Bake => write!(f, "Bake"),
            LaneKind::Scattering => write!(f, "Scattering"),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LaneContext
// ─────────────────────────────────────────────────────────────────────────────

/// Blackboard the agent and its lanes share, holding one value per type.
///
/// Agents populate a `LaneContext` with the data their lanes need, then pass
/// it to [`Lane::on_initialize`], [`Lane::execute`] and [`Lane::on_shutdown`].
/// Lanes retrieve values by type with [`get`](LaneContext::get) and publish
/// their results with [`insert`](LaneContext::insert).
///
/// ```rust,ignore
/// use translux_core::lane::LaneContext;
///
/// let mut ctx = LaneContext::new();
/// ctx.insert(42u32);
/// assert_eq!(ctx.get::<u32>(), Some(&42));
/// ```
pub struct LaneContext {
    data: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
}

impl LaneContext {
    /// An empty blackboard.
    pub fn new() -> Self {
        Self {
            data: HashMap::new(),
        }
    }

    /// Stores `value`, replacing any earlier value of the same type.
    pub fn insert<T: 'static + Send + Sync>(&mut self, value: T) {
        self.data.insert(TypeId::of::<T>(), Box::new(value));
    }

    /// The stored `T`, if any.
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.data.get(&TypeId::of::<T>())?.downcast_ref()
    }

    /// Mutable access to the stored `T`.
    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.data.get_mut(&TypeId::of::<T>())?.downcast_mut()
    }

    /// Like [`get`](Self::get) but reports a [`LaneError::missing`] on absence.
    pub fn require<T: 'static>(&self, type_name: &'static str) -> Result<&T, LaneError> {
        self.get::<T>().ok_or(LaneError::missing(type_name))
    }

    /// `true` if a `T` is stored.
    pub fn contains<T: 'static>(&self) -> bool {
        self.data.contains_key(&TypeId::of::<T>())
    }

    /// Takes the stored `T` out.
    pub fn remove<T: 'static>(&mut self) -> Option<T> {
        self.data
            .remove(&TypeId::of::<T>())?
            .downcast::<T>()
            .ok()
            .map(|b| *b)
    }

    /// Number of stored entries.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// `true` when the context holds nothing.
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl Default for LaneContext {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LaneContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LaneContext")
            .field("entries", &self.data.len())
            .finish()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LaneRegistry — ordered container for a mode's lanes
// ─────────────────────────────────────────────────────────────────────────────

/// An ordered registry of [`Lane`] trait objects.
///
/// Registration order is execution order.
pub struct LaneRegistry {
    lanes: Vec<Box<dyn Lane>>,
}

impl LaneRegistry {
    /// A registry with no lanes.
    pub fn new() -> Self {
        Self { lanes: Vec::new() }
    }

    /// Appends a lane.
    pub fn register(&mut self, lane: Box<dyn Lane>) {
        self.lanes.push(lane);
    }

    /// The lane whose `strategy_name` is `name`.
    pub fn get(&self, name: &str) -> Option<&dyn Lane> {
        self.lanes
            .iter()
            .find(|l| l.strategy_name() == name)
            .map(|b| b.as_ref())
    }

    /// Finds a lane by name and downcasts it to its concrete type.
    pub fn get_as<T: 'static>(&self, name: &str) -> Option<&T> {
        self.get(name)?.as_any().downcast_ref::<T>()
    }

    /// Lanes of `kind`, in registration order.
    pub fn find_by_kind(&self, kind: LaneKind) -> Vec<&dyn Lane> {
        self.lanes
            .iter()
            .filter(|l| l.lane_kind() == kind)
            .map(|b| b.as_ref())
            .collect()
    }

    /// Returns all registered lanes in execution order.
    pub fn all(&self) -> &[Box<dyn Lane>] {
        &self.lanes
    }

    /// Number of lanes.
    pub fn len(&self) -> usize {
        self.lanes.len()
    }

    /// `true` when nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }
}

impl Default for LaneRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LaneRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.lanes.iter().map(|l| l.strategy_name()))
            .finish()
    }
}

/// Base trait for every pass.
///
/// ## Lifecycle
///
/// ```text
/// on_initialize(ctx)  →  [ execute(ctx) ]*  →  on_shutdown(ctx)
/// ```
///
/// - **`on_initialize`** creates the lane's device resources. A failure here
///   is a resource-creation failure and is fatal for the mode.
/// - **`execute`** runs the pass once (per frame, or once for the bake).
/// - **`on_shutdown`** releases the lane's device resources.
pub trait Lane: Send + Sync {
    /// Human-readable name identifying this lane, unique within a mode.
    fn strategy_name(&self) -> &'static str;

    /// Which stage of the frame this lane belongs to.
    fn lane_kind(&self) -> LaneKind;

    // --- Lifecycle ---

    /// Called once before the first execution.
    ///
    /// Default is a no-op returning `Ok(())`.
    fn on_initialize(&self, _ctx: &mut LaneContext) -> Result<(), LaneError> {
        Ok(())
    }

    /// Main execution entry point.
    ///
    /// Default is a no-op returning `Ok(())`.
    fn execute(&self, _ctx: &mut LaneContext) -> Result<(), LaneError> {
        Ok(())
    }

    /// Called when the owning agent shuts down.
    ///
    /// Default is a no-op.
    fn on_shutdown(&self, _ctx: &mut LaneContext) {}

    // --- Downcasting ---

    /// Lets agents reach lane-specific accessors.
    fn as_any(&self) -> &dyn Any;

    /// Mutable counterpart of [`as_any`](Lane::as_any).
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingLane {
        name: &'static str,
        kind: LaneKind,
        runs: AtomicU32,
    }

    impl Lane for CountingLane {
        fn strategy_name(&self) -> &'static str {
            self.name
        }
        fn lane_kind(&self) -> LaneKind {
            self.kind
        }
        fn execute(&self, ctx: &mut LaneContext) -> Result<(), LaneError> {
            let n = self.runs.fetch_add(1, Ordering::Relaxed) + 1;
            ctx.insert(n);
            Ok(())
        }
        fn as_any(&self) -> &dyn Any {
            self
        }
        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn lane(name: &'static str, kind: LaneKind) -> Box<dyn Lane> {
        Box::new(CountingLane {
            name,
            kind,
            runs: AtomicU32::new(0),
        })
    }

    #[test]
    fn test_context_insert_get_remove() {
        let mut ctx = LaneContext::new();
        assert!(ctx.is_empty());
        ctx.insert(7u32);
        ctx.insert(String::from("tile"));
        assert_eq!(ctx.get::<u32>(), Some(&7));
        *ctx.get_mut::<u32>().unwrap() = 9;
        assert_eq!(ctx.remove::<u32>(), Some(9));
        assert!(!ctx.contains::<u32>());
        assert_eq!(ctx.len(), 1);
    }

    #[test]
    fn test_require_reports_missing_type() {
        let ctx = LaneContext::new();
        let err = ctx.require::<u64>("u64").unwrap_err();
        assert_eq!(
            err.to_string(),
            "lane context is missing u64: no such entry"
        );
    }

    #[test]
    fn test_registry_preserves_order_and_filters_by_kind() {
        let mut reg = LaneRegistry::new();
        reg.register(lane("Geometry", LaneKind::Geometry));
        reg.register(lane("Culling", LaneKind::Culling));
        reg.register(lane("Shading", LaneKind::Shading));

        let names: Vec<_> = reg.all().iter().map(|l| l.strategy_name()).collect();
        assert_eq!(names, ["Geometry", "Culling", "Shading"]);
        assert_eq!(reg.find_by_kind(LaneKind::Culling).len(), 1);
        assert!(reg.get("Missing").is_none());
        assert!(reg.get_as::<CountingLane>("Shading").is_some());
    }

    #[test]
    fn test_lane_execute_publishes_into_context() {
        let l = lane("Counter", LaneKind::Bake);
        let mut ctx = LaneContext::new();
        l.execute(&mut ctx).unwrap();
        l.execute(&mut ctx).unwrap();
        assert_eq!(ctx.get::<u32>(), Some(&2));
    }

    #[test]
    fn test_lane_error_source() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        let err = LaneError::execution(io);
        assert_eq!(err.to_string(), "pass failed: disk");
        assert!(err.source().is_some());
        assert!(LaneError::NotInitialized.source().is_none());
    }
}
