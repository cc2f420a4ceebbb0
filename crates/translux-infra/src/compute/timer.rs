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

//! Wall-clock timer queries shared by the compute backends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};
use translux_core::renderer::api::TimerQueryId;
use translux_core::renderer::ResourceError;

#[derive(Debug)]
struct TimerQuery {
    label: String,
    begin: Instant,
    elapsed: Option<Duration>,
}

/// Open and resolved queries. A result is handed out once, then forgotten.
#[derive(Debug, Default)]
pub(crate) struct TimerQueries {
    next_id: AtomicU64,
    queries: Mutex<HashMap<TimerQueryId, TimerQuery>>,
}

impl TimerQueries {
    pub(crate) fn begin(&self, label: &str) -> TimerQueryId {
        let id = TimerQueryId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                id,
                TimerQuery {
                    label: label.to_owned(),
                    begin: Instant::now(),
                    elapsed: None,
                },
            );
        id
    }

    pub(crate) fn end(&self, id: TimerQueryId) -> Result<(), ResourceError> {
        let mut queries = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
        let query = queries.get_mut(&id).ok_or(ResourceError::InvalidHandle)?;
        if query.elapsed.is_some() {
            return Err(ResourceError::BackendError(format!(
                "timer query '{}' ended twice",
                query.label
            )));
        }
        query.elapsed = Some(query.begin.elapsed());
        Ok(())
    }

    pub(crate) fn poll(&self, id: TimerQueryId) -> Result<Option<Duration>, ResourceError> {
        let mut queries = self.queries.lock().unwrap_or_else(PoisonError::into_inner);
        let elapsed = queries
            .get(&id)
            .ok_or(ResourceError::InvalidHandle)?
            .elapsed;
        if elapsed.is_some() {
            queries.remove(&id);
        }
        Ok(elapsed)
    }

    pub(crate) fn pending(&self) -> usize {
        self.queries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}
