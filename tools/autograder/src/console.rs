//! Line-based console primitive used by exercise functions.
//!
//! Exercise code never touches stdin/stdout directly. It calls [`input`],
//! [`print`] and [`write`], which dispatch to the console active on the
//! current thread. With nothing installed that is the real terminal
//! ([`StdConsole`]); [`install_console`] swaps in another implementation for
//! the lifetime of the returned guard.

use crate::errors::ExerciseError;
use crate::types::AbortReason;
use std::cell::RefCell;
use std::io::{BufRead, Write};
use std::marker::PhantomData;
use std::rc::Rc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleError {
    /// No more input is available.
    Exhausted,
    /// The invocation must stop now.
    Abort(AbortReason),
    Io(String),
}

pub trait Console {
    /// Show `prompt` and return the next line of input, without its line ending.
    fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError>;
    fn write(&mut self, text: &str) -> Result<(), ConsoleError>;
}

pub type SharedConsole = Rc<RefCell<dyn Console>>;

/// The process terminal.
pub struct StdConsole;

impl Console for StdConsole {
    fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError> {
        self.write(prompt)?;
        let mut line = String::new();
        let read = std::io::stdin()
            .lock()
            .read_line(&mut line)
            .map_err(|e| ConsoleError::Io(e.to_string()))?;
        if read == 0 {
            return Err(ConsoleError::Exhausted);
        }
        if line.ends_with('\n') {
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
        }
        Ok(line)
    }

    fn write(&mut self, text: &str) -> Result<(), ConsoleError> {
        let mut out = std::io::stdout().lock();
        out.write_all(text.as_bytes())
            .and_then(|()| out.flush())
            .map_err(|e| ConsoleError::Io(e.to_string()))
    }
}

thread_local! {
    static ACTIVE_CONSOLE: RefCell<Option<SharedConsole>> = const { RefCell::new(None) };
}

/// Restores the previously active console when dropped, including during unwinding.
#[must_use = "the console is restored as soon as the guard is dropped"]
pub struct ConsoleGuard {
    previous: Option<SharedConsole>,
    // Tied to the thread whose slot it restores.
    _not_send: PhantomData<*const ()>,
}

impl Drop for ConsoleGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        let _ = ACTIVE_CONSOLE.try_with(|slot| *slot.borrow_mut() = previous);
    }
}

pub fn install_console(console: SharedConsole) -> ConsoleGuard {
    let previous = ACTIVE_CONSOLE.with(|slot| slot.borrow_mut().replace(console));
    ConsoleGuard {
        previous,
        _not_send: PhantomData,
    }
}

/// The console installed on this thread, or `None` when the real terminal is active.
pub fn current_console() -> Option<SharedConsole> {
    ACTIVE_CONSOLE.with(|slot| slot.borrow().clone())
}

/// Prompt for one line of input.
///
/// Returns [`ExerciseError::InputExhausted`] once no input is left. When the
/// active console decides the call has run away, this does not return at all:
/// the invocation is unwound back to whoever is supervising it.
pub fn input(prompt: &str) -> Result<String, ExerciseError> {
    match dispatch(|console| console.read_line(prompt)) {
        Ok(line) => Ok(line),
        Err(ConsoleError::Exhausted) => Err(ExerciseError::InputExhausted),
        Err(ConsoleError::Abort(reason)) => abort_invocation(reason),
        Err(ConsoleError::Io(message)) => Err(ExerciseError::Failed(message)),
    }
}

/// Write `text` followed by a newline.
pub fn print(text: impl AsRef<str>) {
    let mut line = text.as_ref().to_string();
    line.push('\n');
    write(line);
}

/// Write `text` as-is.
pub fn write(text: impl AsRef<str>) {
    if let Err(ConsoleError::Abort(reason)) = dispatch(|console| console.write(text.as_ref())) {
        abort_invocation(reason);
    }
}

fn dispatch<T>(
    call: impl FnOnce(&mut dyn Console) -> Result<T, ConsoleError>,
) -> Result<T, ConsoleError> {
    match current_console() {
        Some(shared) => {
            let mut console = shared
                .try_borrow_mut()
                .map_err(|_| ConsoleError::Io("console is already in use".to_string()))?;
            call(&mut *console)
        }
        None => call(&mut StdConsole),
    }
}

/// Unwind without running the panic hook; the payload is the [`AbortReason`].
fn abort_invocation(reason: AbortReason) -> ! {
    std::panic::resume_unwind(Box::new(reason))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        answers: Vec<String>,
        written: String,
    }

    impl Console for Recorder {
        fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError> {
            self.written.push_str(prompt);
            if self.answers.is_empty() {
                return Err(ConsoleError::Exhausted);
            }
            Ok(self.answers.remove(0))
        }

        fn write(&mut self, text: &str) -> Result<(), ConsoleError> {
            self.written.push_str(text);
            Ok(())
        }
    }

    #[test]
    fn installed_console_receives_calls_until_guard_drops() {
        let recorder = Rc::new(RefCell::new(Recorder {
            answers: vec!["42".to_string()],
            ..Recorder::default()
        }));
        assert!(current_console().is_none());
        {
            let _guard = install_console(recorder.clone());
            assert_eq!(input("n? ").expect("answer"), "42");
            assert_eq!(input("again? "), Err(ExerciseError::InputExhausted));
            print("done");
            write("partial");
        }
        assert!(current_console().is_none());
        assert_eq!(recorder.borrow().written, "n? again? done\npartial");
    }

    #[test]
    fn nested_guards_restore_in_reverse_order() {
        let outer: SharedConsole = Rc::new(RefCell::new(Recorder::default()));
        let inner: SharedConsole = Rc::new(RefCell::new(Recorder::default()));
        let outer_guard = install_console(outer.clone());
        {
            let _inner_guard = install_console(inner.clone());
            let active = current_console().expect("inner active");
            assert!(Rc::ptr_eq(&active, &inner));
        }
        let active = current_console().expect("outer active");
        assert!(Rc::ptr_eq(&active, &outer));
        drop(outer_guard);
        assert!(current_console().is_none());
    }

    #[test]
    fn guard_restores_console_when_caller_panics() {
        let recorder: SharedConsole = Rc::new(RefCell::new(Recorder::default()));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = install_console(recorder.clone());
            panic!("exercise blew up");
        }));
        assert!(result.is_err());
        assert!(current_console().is_none());
    }
}
