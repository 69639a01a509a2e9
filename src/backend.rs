// Engine binding resolution.
//
// Every operation that needs the native engine resolves a binding in this
// order: an explicit binding passed by the caller, the innermost scoped
// binding on the current thread, then the process-wide default installed
// in the registry. Nothing is installed by default; resolution with no
// binding available fails with `Error::Configuration`.
//
// Scopes are thread-local and form a stack. `enter_scope` pushes a binding
// and returns a guard that pops back to the depth it was entered at when
// dropped, including during unwinding. Dropping an outer guard first also
// ends every scope nested inside it, so a later drop never brings back a
// binding whose scope already ended.

use crate::engine::{Engine, Pcre2};
use crate::error::{Error, Result};
use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock, RwLock};
use tracing::debug;

/// A shared engine binding.
pub type Binding = Arc<dyn Engine>;

/// Holds the process-wide default binding.
#[derive(Default)]
pub struct Registry {
    default: RwLock<Option<Binding>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_default(binding: Binding) -> Self {
        Self {
            default: RwLock::new(Some(binding)),
        }
    }

    /// Install `binding` as the default, returning the one it replaces.
    pub fn install_default(&self, binding: Binding) -> Option<Binding> {
        debug!(binding = binding.name(), "installing default engine binding");
        let mut guard = self
            .default
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.replace(binding)
    }

    pub fn clear_default(&self) -> Option<Binding> {
        let mut guard = self
            .default
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.take()
    }

    pub fn default_binding(&self) -> Option<Binding> {
        let guard = self
            .default
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard.clone()
    }

    /// The default binding, installing the one `init` builds if none is
    /// installed yet. Concurrent callers all observe the same binding.
    pub fn default_or_install<F>(&self, init: F) -> Binding
    where
        F: FnOnce() -> Binding,
    {
        if let Some(binding) = self.default_binding() {
            return binding;
        }
        let mut guard = self
            .default
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        guard
            .get_or_insert_with(|| {
                let binding = init();
                debug!(binding = binding.name(), "installing default engine binding");
                binding
            })
            .clone()
    }

    /// Resolve a binding using the current thread's scope and this
    /// registry's default.
    pub fn resolve(&self) -> Result<Binding> {
        self.resolve_with(None)
    }

    /// Resolve a binding, preferring `explicit` when given.
    pub fn resolve_with(&self, explicit: Option<&Binding>) -> Result<Binding> {
        if let Some(binding) = explicit {
            return Ok(binding.clone());
        }
        let scoped = current_scope();
        let default = self.default_binding();
        resolve_from(None, scoped.as_ref(), default.as_ref())
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let default = self.default_binding();
        f.debug_struct("Registry")
            .field("default", &default.as_ref().map(|b| b.name().to_string()))
            .finish()
    }
}

/// The resolution order as a pure function.
pub fn resolve_from(
    explicit: Option<&Binding>,
    scoped: Option<&Binding>,
    default: Option<&Binding>,
) -> Result<Binding> {
    explicit.or(scoped).or(default).cloned().ok_or_else(|| {
        Error::Configuration(
            "no engine binding available: install a default, enter a scope, \
             or pass an engine explicitly"
                .to_string(),
        )
    })
}

thread_local! {
    static SCOPES: RefCell<Vec<Binding>> = const { RefCell::new(Vec::new()) };
}

/// The innermost scoped binding on this thread.
pub fn current_scope() -> Option<Binding> {
    SCOPES.with(|scopes| scopes.borrow().last().cloned())
}

/// Ends its scope, and any scope entered after it, when dropped.
#[must_use = "the scope ends as soon as the guard is dropped"]
pub struct ScopeGuard {
    depth: usize,
    // Scopes belong to the thread that entered them.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ScopeGuard {
    fn drop(&mut self) {
        // The thread-local may already be gone during thread teardown.
        let _ = SCOPES.try_with(|scopes| scopes.borrow_mut().truncate(self.depth));
    }
}

/// Make `binding` the current thread's scoped binding until the guard drops.
pub fn enter_scope(binding: Binding) -> ScopeGuard {
    let depth = SCOPES.with(|scopes| {
        let mut scopes = scopes.borrow_mut();
        scopes.push(binding);
        scopes.len() - 1
    });
    ScopeGuard {
        depth,
        _not_send: PhantomData,
    }
}

/// Run `f` with `binding` scoped on the current thread.
pub fn with_engine<R, F>(binding: Binding, f: F) -> R
where
    F: FnOnce() -> R,
{
    let _guard = enter_scope(binding);
    f()
}

/// The process-wide registry.
pub fn registry() -> &'static Registry {
    static REGISTRY: OnceLock<Registry> = OnceLock::new();
    REGISTRY.get_or_init(Registry::new)
}

pub fn install_default(binding: Binding) -> Option<Binding> {
    registry().install_default(binding)
}

/// Install the native PCRE2 binding as the default unless one is already
/// installed, and return the default.
pub fn install_native_default() -> Binding {
    registry().default_or_install(|| Arc::new(Pcre2::new()))
}

pub fn resolve() -> Result<Binding> {
    registry().resolve()
}

pub fn resolve_with(explicit: Option<&Binding>) -> Result<Binding> {
    registry().resolve_with(explicit)
}

/// True when both refer to the same binding instance.
pub fn same_binding(a: &Binding, b: &Binding) -> bool {
    std::ptr::eq(
        Arc::as_ptr(a) as *const (),
        Arc::as_ptr(b) as *const (),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::Instrumented;

    fn native() -> Binding {
        Arc::new(Pcre2::new())
    }

    fn counted() -> Binding {
        Arc::new(Instrumented::new(Pcre2::new()))
    }

    #[test]
    fn test_resolve_order() {
        let explicit = native();
        let scoped = counted();
        let default = native();

        let got = resolve_from(Some(&explicit), Some(&scoped), Some(&default)).unwrap();
        assert!(same_binding(&got, &explicit));

        let got = resolve_from(None, Some(&scoped), Some(&default)).unwrap();
        assert!(same_binding(&got, &scoped));

        let got = resolve_from(None, None, Some(&default)).unwrap();
        assert!(same_binding(&got, &default));

        let err = resolve_from(None, None, None).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }

    #[test]
    fn test_empty_registry_fails() {
        let registry = Registry::new();
        assert!(matches!(registry.resolve(), Err(Error::Configuration(_))));
    }

    #[test]
    fn test_registry_default_and_scope() {
        let default = native();
        let registry = Registry::with_default(default.clone());
        assert!(same_binding(&registry.resolve().unwrap(), &default));

        let scoped = counted();
        {
            let _guard = enter_scope(scoped.clone());
            assert!(same_binding(&registry.resolve().unwrap(), &scoped));

            let explicit = native();
            let got = registry.resolve_with(Some(&explicit)).unwrap();
            assert!(same_binding(&got, &explicit));
        }
        assert!(same_binding(&registry.resolve().unwrap(), &default));
    }

    #[test]
    fn test_nested_scopes_restore() {
        let outer = native();
        let inner = counted();

        let _outer_guard = enter_scope(outer.clone());
        with_engine(inner.clone(), || {
            assert!(same_binding(&current_scope().unwrap(), &inner));
        });
        assert!(same_binding(&current_scope().unwrap(), &outer));
    }

    #[test]
    fn test_out_of_order_drop_does_not_revive_scope() {
        let first = native();
        let second = counted();

        let first_guard = enter_scope(first);
        let second_guard = enter_scope(second.clone());
        assert!(same_binding(&current_scope().unwrap(), &second));

        drop(first_guard);
        assert!(current_scope().is_none());
        drop(second_guard);
        assert!(current_scope().is_none());
    }

    #[test]
    fn test_install_replaces_and_clears() {
        let registry = Registry::new();
        let first = native();
        let second = native();

        assert!(registry.install_default(first.clone()).is_none());
        let replaced = registry.install_default(second.clone()).unwrap();
        assert!(same_binding(&replaced, &first));

        let cleared = registry.clear_default().unwrap();
        assert!(same_binding(&cleared, &second));
        assert!(registry.default_binding().is_none());
    }

    #[test]
    fn test_default_or_install_runs_once() {
        let registry = Registry::new();
        let first = registry.default_or_install(native);
        let second = registry.default_or_install(|| panic!("already installed"));
        assert!(same_binding(&first, &second));
    }

    #[test]
    fn test_scope_is_per_thread() {
        let _guard = enter_scope(native());
        let seen = std::thread::spawn(|| current_scope().is_none())
            .join()
            .unwrap();
        assert!(seen);
    }
}
