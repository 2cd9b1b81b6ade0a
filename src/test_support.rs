//! Test support utilities shared across unit and integration tests.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::env;
use std::ffi::OsString;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::{Mutex as AsyncMutex, MutexGuard as AsyncMutexGuard};
use tokio::time::sleep;

use crate::directory::{
    ApiError, ChildResource, DirectoryFuture, ParentResource, ResourceDirectory, ResourceKind,
    ResourceRef,
};

/// Records a single call made through [`ScriptedDirectory`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum DirectoryCall {
    /// `list_parents` was called.
    ListParents {
        /// Owner context passed by the caller.
        owner_context: String,
        /// Kind requested.
        kind: ResourceKind,
    },
    /// `list_children` was called.
    ListChildren {
        /// Owner context passed by the caller.
        owner_context: String,
        /// Kind requested.
        kind: ResourceKind,
        /// Parent whose children were listed.
        parent_id: String,
    },
    /// `delete` was called.
    Delete {
        /// Owner context passed by the caller.
        owner_context: String,
        /// Target of the delete.
        target: ResourceRef,
    },
}

#[derive(Debug, Default)]
struct DirectoryState {
    parents: Vec<ParentResource>,
    children: BTreeMap<String, Vec<String>>,
    parent_listing_failure: Option<ApiError>,
    child_listing_failures: BTreeMap<String, VecDeque<ApiError>>,
    delete_failures: BTreeMap<String, VecDeque<ApiError>>,
    persistent_delete_failures: BTreeMap<String, ApiError>,
    late_children: BTreeMap<String, Vec<String>>,
    child_listing_stalls: BTreeMap<String, Duration>,
    calls: Vec<DirectoryCall>,
}

/// In-memory [`ResourceDirectory`] with scripted failures.
///
/// Behaves like the remote service: deleting a parent that still has children
/// answers `409`, and deleting something absent answers `404`. Every call is
/// recorded for assertions.
#[derive(Clone, Debug, Default)]
pub struct ScriptedDirectory {
    state: Arc<Mutex<DirectoryState>>,
}

impl ScriptedDirectory {
    /// Creates an empty directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, DirectoryState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Adds a parent with no children.
    pub fn add_parent(&self, owner_context: &str, id: &str, name: &str) {
        let mut state = self.lock();
        state.parents.push(ParentResource {
            id: id.to_owned(),
            name: name.to_owned(),
            owner_context: owner_context.to_owned(),
        });
        state.children.entry(id.to_owned()).or_default();
    }

    /// Adds a child under an existing parent.
    pub fn add_child(&self, parent_id: &str, child_id: &str) {
        self.lock()
            .children
            .entry(parent_id.to_owned())
            .or_default()
            .push(child_id.to_owned());
    }

    /// Makes every parent listing fail with `error`.
    pub fn fail_parent_listing(&self, error: ApiError) {
        self.lock().parent_listing_failure = Some(error);
    }

    /// Makes the next child listing of `parent_id` fail with `error`.
    pub fn fail_child_listing_once(&self, parent_id: &str, error: ApiError) {
        self.lock()
            .child_listing_failures
            .entry(parent_id.to_owned())
            .or_default()
            .push_back(error);
    }

    /// Makes the next delete of `id` fail with `error`.
    pub fn fail_delete_once(&self, id: &str, error: ApiError) {
        self.lock()
            .delete_failures
            .entry(id.to_owned())
            .or_default()
            .push_back(error);
    }

    /// Makes every delete of `id` fail with `error`.
    pub fn fail_delete_always(&self, id: &str, error: ApiError) {
        self.lock()
            .persistent_delete_failures
            .insert(id.to_owned(), error);
    }

    /// Adds `child_id` under `parent_id` right after the next listing of that
    /// parent's children, as a concurrent actor would.
    pub fn add_child_after_listing(&self, parent_id: &str, child_id: &str) {
        self.lock()
            .late_children
            .entry(parent_id.to_owned())
            .or_default()
            .push(child_id.to_owned());
    }

    /// Delays every listing of `parent_id`'s children by `delay`, as a stalled
    /// connection would.
    pub fn stall_child_listing(&self, parent_id: &str, delay: Duration) {
        self.lock()
            .child_listing_stalls
            .insert(parent_id.to_owned(), delay);
    }

    /// Returns a snapshot of all calls recorded so far.
    #[must_use]
    pub fn calls(&self) -> Vec<DirectoryCall> {
        self.lock().calls.clone()
    }

    /// Identifiers passed to `delete`, in call order.
    #[must_use]
    pub fn delete_order(&self) -> Vec<String> {
        self.lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                DirectoryCall::Delete { target, .. } => Some(target.id.clone()),
                DirectoryCall::ListParents { .. } | DirectoryCall::ListChildren { .. } => None,
            })
            .collect()
    }

    /// Identifiers of the parents that still exist.
    #[must_use]
    pub fn remaining_parents(&self) -> Vec<String> {
        self.lock()
            .parents
            .iter()
            .map(|parent| parent.id.clone())
            .collect()
    }

    /// Identifiers of the children of `parent_id` that still exist.
    #[must_use]
    pub fn remaining_children(&self, parent_id: &str) -> Vec<String> {
        self.lock()
            .children
            .get(parent_id)
            .cloned()
            .unwrap_or_default()
    }

    fn do_list_parents(&self, owner_context: &str, kind: ResourceKind) -> Result<Vec<ParentResource>, ApiError> {
        let mut state = self.lock();
        state.calls.push(DirectoryCall::ListParents {
            owner_context: owner_context.to_owned(),
            kind,
        });
        if let Some(error) = state.parent_listing_failure.clone() {
            return Err(error);
        }
        Ok(state
            .parents
            .iter()
            .filter(|parent| parent.owner_context == owner_context)
            .cloned()
            .collect())
    }

    fn do_list_children(
        &self,
        owner_context: &str,
        kind: ResourceKind,
        parent: &ParentResource,
    ) -> Result<Vec<ChildResource>, ApiError> {
        let mut state = self.lock();
        state.calls.push(DirectoryCall::ListChildren {
            owner_context: owner_context.to_owned(),
            kind,
            parent_id: parent.id.clone(),
        });
        if let Some(error) = state
            .child_listing_failures
            .get_mut(&parent.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }
        let Some(current) = state.children.get(&parent.id).cloned() else {
            return Err(ApiError::http(404, "network not found"));
        };
        if let Some(late) = state.late_children.remove(&parent.id) {
            state
                .children
                .entry(parent.id.clone())
                .or_default()
                .extend(late);
        }
        Ok(current
            .into_iter()
            .map(|id| ChildResource {
                id,
                parent_id: parent.id.clone(),
            })
            .collect())
    }

    fn do_delete(&self, owner_context: &str, target: &ResourceRef) -> Result<(), ApiError> {
        let mut state = self.lock();
        state.calls.push(DirectoryCall::Delete {
            owner_context: owner_context.to_owned(),
            target: target.clone(),
        });
        if let Some(error) = state.persistent_delete_failures.get(&target.id) {
            return Err(error.clone());
        }
        if let Some(error) = state
            .delete_failures
            .get_mut(&target.id)
            .and_then(VecDeque::pop_front)
        {
            return Err(error);
        }

        match &target.parent_id {
            Some(parent_id) => {
                let siblings = state.children.get_mut(parent_id);
                let Some(position) = siblings
                    .as_ref()
                    .and_then(|ids| ids.iter().position(|id| *id == target.id))
                else {
                    return Err(ApiError::http(404, "subnet not found"));
                };
                if let Some(ids) = siblings {
                    ids.remove(position);
                }
                Ok(())
            }
            None => {
                let Some(position) = state
                    .parents
                    .iter()
                    .position(|parent| parent.id == target.id)
                else {
                    return Err(ApiError::http(404, "network not found"));
                };
                if state
                    .children
                    .get(&target.id)
                    .is_some_and(|ids| !ids.is_empty())
                {
                    return Err(ApiError::http(409, "network still has subnets"));
                }
                state.parents.remove(position);
                state.children.remove(&target.id);
                Ok(())
            }
        }
    }
}

impl ResourceDirectory for ScriptedDirectory {
    fn list_parents<'a>(
        &'a self,
        owner_context: &'a str,
        kind: ResourceKind,
    ) -> DirectoryFuture<'a, Vec<ParentResource>> {
        let result = self.do_list_parents(owner_context, kind);
        Box::pin(async move { result })
    }

    fn list_children<'a>(
        &'a self,
        owner_context: &'a str,
        kind: ResourceKind,
        parent: &'a ParentResource,
    ) -> DirectoryFuture<'a, Vec<ChildResource>> {
        let stall = self.lock().child_listing_stalls.get(&parent.id).copied();
        let result = self.do_list_children(owner_context, kind, parent);
        Box::pin(async move {
            if let Some(delay) = stall {
                sleep(delay).await;
            }
            result
        })
    }

    fn delete<'a>(
        &'a self,
        owner_context: &'a str,
        target: &'a ResourceRef,
    ) -> DirectoryFuture<'a, ()> {
        let result = self.do_delete(owner_context, target);
        Box::pin(async move { result })
    }
}

/// Global mutex used to serialise environment mutation in tests.
pub static ENV_LOCK: AsyncMutex<()> = AsyncMutex::const_new(());

/// Guard that holds the env mutex and restores variables on drop.
pub struct EnvGuard {
    previous: Vec<(String, Option<OsString>)>,
    _guard: AsyncMutexGuard<'static, ()>,
}

impl EnvGuard {
    /// Sets multiple environment variables while holding a global mutex.
    pub async fn set_vars(pairs: &[(&str, &str)]) -> Self {
        debug_assert!(
            {
                let mut seen = BTreeSet::new();
                pairs.iter().all(|(key, _)| seen.insert(*key))
            },
            "duplicate environment variable keys passed to EnvGuard::set_vars"
        );

        let guard = ENV_LOCK.lock().await;
        let mut previous = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let old = env::var_os(key);
            // SAFETY: Environment mutation is serialised by `ENV_LOCK`, preventing races.
            unsafe { env::set_var(key, value) };
            previous.push(((*key).to_owned(), old));
        }

        Self {
            previous,
            _guard: guard,
        }
    }
}

impl Drop for EnvGuard {
    fn drop(&mut self) {
        for (key, old) in &self.previous {
            // SAFETY: Environment mutation is serialised by holding `_guard`.
            unsafe {
                match old {
                    Some(val) => env::set_var(key, val),
                    None => env::remove_var(key),
                }
            }
        }
    }
}
