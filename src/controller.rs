//! Non-owning link from a device back to the controller that created it.

use std::fmt;
use std::sync::{Arc, Weak};

/// Read-only view of the controller that devices may consult.
///
/// Devices never drive the controller; they only observe it (for example to
/// look up a peripheral's parent hub by label).
pub trait Controller: Send + Sync {
    /// Labels of the devices the controller currently owns.
    fn device_labels(&self) -> Vec<String>;

    /// Label of the parent hub of `label`, if any.
    fn parent_label(&self, label: &str) -> Option<String> {
        let _ = label;
        None
    }
}

/// Weak handle to a [`Controller`].
///
/// Never keeps the controller alive. Every query reports absence once the
/// controller has been dropped.
#[derive(Clone, Default)]
pub struct ControllerRef {
    inner: Option<Weak<dyn Controller>>,
}

impl ControllerRef {
    /// Observe `controller` without owning it.
    pub fn new(controller: &Arc<dyn Controller>) -> Self {
        Self {
            inner: Some(Arc::downgrade(controller)),
        }
    }

    /// A reference to no controller (tools and tests).
    pub fn detached() -> Self {
        Self { inner: None }
    }

    /// Run `f` against the controller if it is still alive.
    pub fn query<R>(&self, f: impl FnOnce(&dyn Controller) -> R) -> Option<R> {
        let controller = self.inner.as_ref()?.upgrade()?;
        Some(f(controller.as_ref()))
    }

    /// Whether the controller is still alive.
    pub fn is_alive(&self) -> bool {
        self.inner
            .as_ref()
            .map(|weak| weak.strong_count() > 0)
            .unwrap_or(false)
    }
}

impl fmt::Debug for ControllerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ControllerRef")
            .field("alive", &self.is_alive())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Bench(Vec<String>);

    impl Controller for Bench {
        fn device_labels(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    #[test]
    fn query_reports_absence_after_drop() {
        let controller: Arc<dyn Controller> = Arc::new(Bench(vec!["Wheel".into()]));
        let observer = ControllerRef::new(&controller);

        assert_eq!(observer.query(|c| c.device_labels()), Some(vec!["Wheel".to_string()]));
        assert_eq!(Arc::strong_count(&controller), 1);

        drop(controller);
        assert!(!observer.is_alive());
        assert_eq!(observer.query(|c| c.device_labels()), None);
    }

    #[test]
    fn detached_reference_is_never_alive() {
        let observer = ControllerRef::detached();
        assert!(!observer.is_alive());
        assert_eq!(observer.query(|c| c.parent_label("x")), None);
    }
}
