//! Ctrl-C while a child owns the terminal
//!
//! The terminal delivers SIGINT to the whole foreground process group, so a
//! `logs -f` child and `sbot` receive it together. While a child is attached
//! the signal is left to the child; otherwise the process exits with 130.

use std::sync::atomic::{AtomicUsize, Ordering};

/// Exit code after an interrupt outside an attached child
pub const EXIT_CODE_INTERRUPTED: i32 = 130;

static ATTACHED: AtomicUsize = AtomicUsize::new(0);

/// Install the process-wide handler. Call once at startup.
pub fn install() -> Result<(), ctrlc::Error> {
    ctrlc::set_handler(|| {
        if child_attached() {
            return;
        }
        eprintln!();
        std::process::exit(EXIT_CODE_INTERRUPTED);
    })
}

/// Whether a foreground child is running
pub fn child_attached() -> bool {
    ATTACHED.load(Ordering::SeqCst) > 0
}

/// Marks a foreground child as running until dropped.
#[derive(Debug)]
pub struct AttachedChild {
    _private: (),
}

impl AttachedChild {
    pub fn enter() -> Self {
        ATTACHED.fetch_add(1, Ordering::SeqCst);
        Self { _private: () }
    }
}

impl Drop for AttachedChild {
    fn drop(&mut self) {
        ATTACHED.fetch_sub(1, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attached_child_scopes() {
        let outer = AttachedChild::enter();
        {
            let _inner = AttachedChild::enter();
            assert!(child_attached());
        }
        assert!(child_attached());
        drop(outer);
    }
}
