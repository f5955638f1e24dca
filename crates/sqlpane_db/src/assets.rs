//! Asset reference resolution.
//!
//! The codec stores object references as logical asset paths. Mapping a path
//! to a loaded object (and back) belongs to the host; it plugs in through
//! [`AssetResolver`].

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use crate::types::{ObjectHandle, ObjectKind};

/// Host hook mapping logical asset paths to loaded objects.
pub trait AssetResolver: Send + Sync {
    /// Load (or look up) the object at `path`.
    fn resolve(&self, kind: ObjectKind, path: &str) -> Option<ObjectHandle>;

    /// Stable path of a loaded object, if it has one.
    fn logical_path(&self, kind: ObjectKind, handle: ObjectHandle) -> Option<String>;
}

#[derive(Debug, Default)]
struct RegistryState {
    next_handle: u64,
    by_path: HashMap<(ObjectKind, String), ObjectHandle>,
    by_handle: HashMap<ObjectHandle, (ObjectKind, String)>,
}

/// In-memory resolver.
///
/// With `auto_register` enabled, unknown paths are registered on first
/// resolve, so every non-empty path resolves.
#[derive(Debug, Default)]
pub struct AssetRegistry {
    auto_register: bool,
    state: RwLock<RegistryState>,
}

impl AssetRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_auto_register(auto_register: bool) -> Self {
        Self {
            auto_register,
            state: RwLock::default(),
        }
    }

    /// Register `path`, returning its handle (existing handle if known).
    pub fn register(&self, kind: ObjectKind, path: &str) -> ObjectHandle {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        if let Some(handle) = state.by_path.get(&(kind, path.to_string())) {
            return *handle;
        }
        state.next_handle += 1;
        let handle = ObjectHandle(state.next_handle);
        state.by_path.insert((kind, path.to_string()), handle);
        state.by_handle.insert(handle, (kind, path.to_string()));
        debug!(%kind, path, handle = handle.0, "Registered asset");
        handle
    }

    /// Forget an object; later encodes of its handle fail.
    pub fn unregister(&self, handle: ObjectHandle) -> bool {
        let mut state = self.state.write().unwrap_or_else(|e| e.into_inner());
        match state.by_handle.remove(&handle) {
            Some(key) => {
                state.by_path.remove(&key);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_handle
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl AssetResolver for AssetRegistry {
    fn resolve(&self, kind: ObjectKind, path: &str) -> Option<ObjectHandle> {
        let known = self
            .state
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .by_path
            .get(&(kind, path.to_string()))
            .copied();
        match known {
            Some(handle) => Some(handle),
            None if self.auto_register && !path.is_empty() => Some(self.register(kind, path)),
            None => None,
        }
    }

    fn logical_path(&self, kind: ObjectKind, handle: ObjectHandle) -> Option<String> {
        let state = self.state.read().unwrap_or_else(|e| e.into_inner());
        match state.by_handle.get(&handle) {
            Some((registered_kind, path)) if *registered_kind == kind => Some(path.clone()),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_is_idempotent() {
        let registry = AssetRegistry::new();
        let a = registry.register(ObjectKind::Sprite, "Sprites/hero.png");
        let b = registry.register(ObjectKind::Sprite, "Sprites/hero.png");
        assert_eq!(a, b);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn resolves_both_directions() {
        let registry = AssetRegistry::new();
        let handle = registry.register(ObjectKind::GameObject, "Prefabs/Enemy.prefab");
        assert_eq!(
            registry.resolve(ObjectKind::GameObject, "Prefabs/Enemy.prefab"),
            Some(handle)
        );
        assert_eq!(
            registry.logical_path(ObjectKind::GameObject, handle).as_deref(),
            Some("Prefabs/Enemy.prefab")
        );
        assert_eq!(registry.logical_path(ObjectKind::Sprite, handle), None);
    }

    #[test]
    fn unknown_paths_need_auto_register() {
        let strict = AssetRegistry::new();
        assert_eq!(strict.resolve(ObjectKind::Sprite, "missing.png"), None);

        let lenient = AssetRegistry::with_auto_register(true);
        assert!(lenient.resolve(ObjectKind::Sprite, "missing.png").is_some());
        assert_eq!(lenient.resolve(ObjectKind::Sprite, ""), None);
    }

    #[test]
    fn unregister_forgets_path() {
        let registry = AssetRegistry::new();
        let handle = registry.register(ObjectKind::Sprite, "a.png");
        assert!(registry.unregister(handle));
        assert_eq!(registry.logical_path(ObjectKind::Sprite, handle), None);
        assert!(registry.is_empty());
    }
}
