use std::collections::BTreeMap;
use std::sync::{
    Arc, RwLock, Weak,
    atomic::{AtomicUsize, Ordering},
};

/// Low-level change callback registered on a [`Property`]
pub type Hook<V> = Arc<dyn Fn(&V) + Send + Sync + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct HookId(usize);

/// A shared mutable value that reports every change to its hooks.
///
/// This is the native change-notification source that a [`PropertyObservation`](super::PropertyObservation)
/// adapts into signals. Clones share the value and the hooks.
pub struct Property<V>(Arc<Inner<V>>);

/// A non-owning reference to a [`Property`]
pub struct WeakProperty<V>(Weak<Inner<V>>);

struct Inner<V> {
    value: RwLock<V>,
    hooks: RwLock<BTreeMap<HookId, Hook<V>>>,
    next_id: AtomicUsize,
}

impl<V> Clone for Property<V> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<V> Clone for WeakProperty<V> {
    fn clone(&self) -> Self { Self(self.0.clone()) }
}

impl<V> Property<V> {
    pub fn new(value: V) -> Self {
        Self(Arc::new(Inner { value: RwLock::new(value), hooks: RwLock::new(BTreeMap::new()), next_id: AtomicUsize::new(0) }))
    }

    /// Calls a closure with a borrow of the current value
    pub fn with<R>(&self, f: impl FnOnce(&V) -> R) -> R { f(&*self.0.value.read().expect("property value lock is poisoned")) }

    /// Registers `hook` to be called with the new value after every `set`
    pub fn add_hook<F>(&self, hook: F) -> HookId
    where F: Fn(&V) + Send + Sync + 'static {
        let id = HookId(self.0.next_id.fetch_add(1, Ordering::Relaxed));
        self.0.hooks.write().expect("property hooks lock is poisoned").insert(id, Arc::new(hook));
        id
    }

    /// Returns false if no hook was registered under `id`
    pub fn remove_hook(&self, id: HookId) -> bool { self.0.hooks.write().expect("property hooks lock is poisoned").remove(&id).is_some() }

    pub fn hook_count(&self) -> usize { self.0.hooks.read().expect("property hooks lock is poisoned").len() }

    pub fn downgrade(&self) -> WeakProperty<V> { WeakProperty(Arc::downgrade(&self.0)) }

    /// True if both handles share the same value
    pub fn ptr_eq(&self, other: &Property<V>) -> bool { Arc::ptr_eq(&self.0, &other.0) }
}

impl<V> Property<V>
where V: Clone
{
    /// Returns a clone of the current value
    pub fn get(&self) -> V { self.0.value.read().expect("property value lock is poisoned").clone() }

    /// Stores `value`, then calls every hook with it. Hooks run without any lock held, so they
    /// may read or write this property.
    pub fn set(&self, value: V) {
        *self.0.value.write().expect("property value lock is poisoned") = value.clone();

        let hooks = self.0.hooks.read().expect("property hooks lock is poisoned").values().cloned().collect::<Vec<_>>();
        for hook in hooks {
            hook(&value);
        }
    }
}

impl<V> WeakProperty<V> {
    pub fn upgrade(&self) -> Option<Property<V>> { self.0.upgrade().map(Property) }
}

impl<V: std::fmt::Debug> std::fmt::Debug for Property<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.with(|value| f.debug_struct("Property").field("value", value).field("hooks", &self.hook_count()).finish())
    }
}
