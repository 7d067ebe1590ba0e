//! The store's diagnostic stack.
//!
//! Failed lookups inside the store push a message here, the way HDF5
//! pushes onto its error stack. Probes that are expected to miss run
//! under a [`SuppressDiagnostics`] guard so they leave no trace.

use std::cell::{Cell, RefCell};

use tracing::trace;

#[derive(Debug, Default)]
pub struct Diagnostics {
    quiet: Cell<usize>,
    messages: RefCell<Vec<String>>,
}

impl Diagnostics {
    pub(crate) fn push(&self, message: String) {
        if self.quiet.get() > 0 {
            trace!(%message, "suppressed diagnostic");
            return;
        }
        self.messages.borrow_mut().push(message);
    }

    pub fn is_suppressed(&self) -> bool {
        self.quiet.get() > 0
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.borrow().clone()
    }

    pub fn clear(&self) {
        self.messages.borrow_mut().clear();
    }

    pub(crate) fn suppress(&self) -> SuppressDiagnostics<'_> {
        SuppressDiagnostics::new(self)
    }
}

/// Silences [`Diagnostics`] until dropped; restores the previous level on
/// every exit path.
#[must_use]
pub struct SuppressDiagnostics<'a> {
    diagnostics: &'a Diagnostics,
    previous: usize,
}

impl<'a> SuppressDiagnostics<'a> {
    pub fn new(diagnostics: &'a Diagnostics) -> Self {
        let previous = diagnostics.quiet.get();
        diagnostics.quiet.set(previous + 1);
        Self { diagnostics, previous }
    }
}

impl Drop for SuppressDiagnostics<'_> {
    fn drop(&mut self) {
        self.diagnostics.quiet.set(self.previous);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_restores_on_every_exit() {
        let d = Diagnostics::default();
        let probe = |fail: bool| -> Result<(), ()> {
            let _quiet = d.suppress();
            d.push("probe missed".into());
            if fail {
                return Err(());
            }
            Ok(())
        };
        assert!(probe(true).is_err());
        assert!(probe(false).is_ok());
        assert!(!d.is_suppressed());
        assert!(d.messages().is_empty());

        d.push("real failure".into());
        assert_eq!(d.messages(), vec!["real failure".to_string()]);
    }

    #[test]
    fn guards_nest() {
        let d = Diagnostics::default();
        let outer = d.suppress();
        {
            let _inner = d.suppress();
        }
        assert!(d.is_suppressed());
        drop(outer);
        assert!(!d.is_suppressed());
    }
}
