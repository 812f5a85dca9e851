//! Interception sessions: run one exercise invocation against a scripted console.
//!
//! A [`Session`] installs an in-memory console for exactly one invocation.
//! Every prompt is echoed into the captured output and answered from the
//! scripted input queue. After the call the previous console is restored,
//! no matter how the call ended. The captured output is then finalized into
//! a [`Transcript`] in which each prompt line carries the answer it was given.
//!
//! Two failure modes are flagged in the [`SessionOutcome`]:
//! * `ran_past_inputs`: input was requested after the queue ran dry. The
//!   overrun sentinel is written and the transcript is cut after it.
//! * `ended_early`: the call returned with inputs left. The early-end
//!   sentinel is appended.

use crate::console::{install_console, Console, ConsoleError, ConsoleGuard, SharedConsole};
use crate::errors::GraderError;
use crate::logging::{append_run_log, fingerprint};
use crate::types::{AbortReason, Arguments, Completion, ExerciseResult};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::any::Any;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::rc::Rc;

pub const OVERRUN_SENTINEL: &str = "THE FUNCTION SHOULD HAVE ENDED HERE, BUT INSTEAD CONTINUED.";
pub const ENDED_EARLY_SENTINEL: &str = "FUNCTION SHOULD HAVE CONTINUED, BUT INSTEAD ENDED.";

pub const DEFAULT_MAX_OVERRUN_REQUESTS: u32 = 3;
pub const DEFAULT_MAX_OUTPUT_LINES: usize = 10_000;
pub const DEFAULT_MAX_OUTPUT_BYTES: usize = 1_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionLimits {
    /// Input requests tolerated after the queue is exhausted before the call is aborted.
    pub max_overrun_requests: u32,
    pub max_output_lines: usize,
    /// Caps output written without newlines, which the line limit never sees.
    pub max_output_bytes: usize,
}

impl Default for SessionLimits {
    fn default() -> Self {
        Self {
            max_overrun_requests: DEFAULT_MAX_OVERRUN_REQUESTS,
            max_output_lines: DEFAULT_MAX_OUTPUT_LINES,
            max_output_bytes: DEFAULT_MAX_OUTPUT_BYTES,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Idle,
    Acquired,
    Invoking,
    SuspendedOnInput,
    Released,
    Finalized,
}

pub fn validate_transition(from: SessionState, to: SessionState) -> Result<(), GraderError> {
    use SessionState as S;

    let allowed = match from {
        S::Idle => matches!(to, S::Acquired),
        S::Acquired => matches!(to, S::Invoking | S::Released),
        S::Invoking => matches!(to, S::SuspendedOnInput | S::Released),
        S::SuspendedOnInput => matches!(to, S::Invoking),
        S::Released => matches!(to, S::Finalized),
        S::Finalized => false,
    };

    if !allowed {
        return Err(GraderError::IllegalTransition(format!(
            "session {:?} -> {:?}",
            from, to
        )));
    }
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionOutcome {
    pub ended_early: bool,
    pub ran_past_inputs: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transcript {
    lines: Vec<String>,
}

impl Transcript {
    pub fn from_lines(lines: Vec<String>) -> Self {
        Self { lines }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn text(&self) -> String {
        self.lines.join("\n")
    }
}

/// Everything a session observed, before finalization.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCapture {
    pub output: String,
    pub prompts: Vec<String>,
    /// Unmutated copy of the scripted inputs.
    pub scripted: Vec<String>,
    pub consumed: usize,
    /// Line index at which the overrun sentinel was written.
    pub overrun_line: Option<usize>,
}

impl RawCapture {
    /// Split the output into lines, cut at the overrun sentinel, and merge each
    /// answered prompt with its input. Pure: the same capture always yields the
    /// same transcript.
    pub fn finalize(&self) -> Transcript {
        let mut lines: Vec<String> = self.output.lines().map(str::to_string).collect();
        if let Some(at) = self.overrun_line {
            lines.truncate(at + 1);
        }

        let mut touched = vec![false; lines.len()];
        let answered = self.scripted.iter().take(self.consumed);
        for (prompt, value) in self.prompts.iter().zip(answered) {
            let found = lines
                .iter()
                .enumerate()
                .position(|(idx, line)| !touched[idx] && line == prompt);
            if let Some(idx) = found {
                lines[idx].push_str(value);
                touched[idx] = true;
            }
        }

        Transcript::from_lines(lines)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionReport {
    pub outcome: SessionOutcome,
    pub transcript: Transcript,
    pub completion: Completion,
    pub capture: RawCapture,
}

/// The scripted console installed for the duration of a session.
struct Interception {
    state: SessionState,
    queue: VecDeque<String>,
    capture: RawCapture,
    limits: SessionLimits,
    outcome: SessionOutcome,
    overrun_requests: u32,
    newlines: usize,
}

impl Interception {
    fn new(inputs: Vec<String>, limits: SessionLimits) -> Self {
        Self {
            state: SessionState::Idle,
            capture: RawCapture {
                scripted: inputs.clone(),
                ..RawCapture::default()
            },
            queue: inputs.into(),
            limits,
            outcome: SessionOutcome::default(),
            overrun_requests: 0,
            newlines: 0,
        }
    }

    fn transition(&mut self, next: SessionState) -> Result<(), GraderError> {
        validate_transition(self.state, next)?;
        self.state = next;
        Ok(())
    }

    fn push_output(&mut self, text: &str) {
        self.newlines += text.matches('\n').count();
        self.capture.output.push_str(text);
    }

    fn push_line(&mut self, line: &str) {
        if !self.capture.output.is_empty() && !self.capture.output.ends_with('\n') {
            self.push_output("\n");
        }
        self.push_output(line);
        self.push_output("\n");
    }

    fn over_output_limit(&self) -> bool {
        self.newlines > self.limits.max_output_lines
            || self.capture.output.len() > self.limits.max_output_bytes
    }

    fn answer(&mut self, prompt: &str) -> Result<String, ConsoleError> {
        self.capture.prompts.push(prompt.to_string());
        self.push_output(prompt);
        self.push_output("\n");
        if self.over_output_limit() {
            return Err(ConsoleError::Abort(AbortReason::OutputLimit));
        }

        if let Some(value) = self.queue.pop_front() {
            self.capture.consumed += 1;
            return Ok(value);
        }

        self.overrun_requests = self.overrun_requests.saturating_add(1);
        if !self.outcome.ran_past_inputs {
            self.outcome.ran_past_inputs = true;
            self.capture.overrun_line = Some(self.newlines);
            self.push_output(OVERRUN_SENTINEL);
            self.push_output("\n");
            append_run_log(
                "info",
                "session.overrun",
                json!({
                    "prompt": prompt,
                    "scripted_inputs": self.capture.scripted.len(),
                }),
            );
        }
        if self.overrun_requests > self.limits.max_overrun_requests {
            return Err(ConsoleError::Abort(AbortReason::OverrunLimit));
        }
        Err(ConsoleError::Exhausted)
    }

    /// Close the books after the console has been restored.
    fn release(&mut self) -> Result<(), GraderError> {
        if self.state == SessionState::SuspendedOnInput {
            self.transition(SessionState::Invoking)?;
        }
        self.transition(SessionState::Released)?;
        if !self.queue.is_empty() {
            self.outcome.ended_early = true;
            self.push_line(ENDED_EARLY_SENTINEL);
        }
        Ok(())
    }
}

impl Console for Interception {
    fn read_line(&mut self, prompt: &str) -> Result<String, ConsoleError> {
        self.transition(SessionState::SuspendedOnInput)
            .map_err(|e| ConsoleError::Io(e.to_string()))?;
        let answer = self.answer(prompt);
        self.transition(SessionState::Invoking)
            .map_err(|e| ConsoleError::Io(e.to_string()))?;
        answer
    }

    fn write(&mut self, text: &str) -> Result<(), ConsoleError> {
        self.push_output(text);
        if self.over_output_limit() {
            return Err(ConsoleError::Abort(AbortReason::OutputLimit));
        }
        Ok(())
    }
}

thread_local! {
    static SESSION_ACTIVE: Cell<bool> = const { Cell::new(false) };
}

/// Owns the thread's console slot while a session is acquired.
struct ActiveSlot {
    _console: ConsoleGuard,
}

impl ActiveSlot {
    fn claim(console: SharedConsole) -> Result<Self, GraderError> {
        if SESSION_ACTIVE.with(Cell::get) {
            return Err(GraderError::SessionActive);
        }
        SESSION_ACTIVE.with(|active| active.set(true));
        Ok(Self {
            _console: install_console(console),
        })
    }
}

impl Drop for ActiveSlot {
    fn drop(&mut self) {
        let _ = SESSION_ACTIVE.try_with(|active| active.set(false));
    }
}

/// A single-use interception session.
///
/// `Idle -> Acquired -> Invoking (<-> SuspendedOnInput) -> Released -> Finalized`.
pub struct Session {
    core: Rc<RefCell<Interception>>,
    slot: Option<ActiveSlot>,
    completion: Option<Completion>,
}

impl Session {
    pub fn new(inputs: Vec<String>, limits: SessionLimits) -> Self {
        Self {
            core: Rc::new(RefCell::new(Interception::new(inputs, limits))),
            slot: None,
            completion: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.core.borrow().state
    }

    /// Install the scripted console on this thread.
    pub fn acquire(&mut self) -> Result<(), GraderError> {
        validate_transition(self.state(), SessionState::Acquired)?;
        let console: SharedConsole = self.core.clone();
        self.slot = Some(ActiveSlot::claim(console)?);
        let mut core = self.core.borrow_mut();
        core.transition(SessionState::Acquired)?;
        append_run_log(
            "debug",
            "session.acquired",
            json!({ "scripted_inputs": core.capture.scripted.len() }),
        );
        Ok(())
    }

    /// Run `call` with the scripted console active, then release.
    ///
    /// Errors and panics raised by `call` are recorded as the session's
    /// [`Completion`]; only misuse of the session itself is returned as `Err`.
    pub fn invoke<F>(&mut self, call: F) -> Result<(), GraderError>
    where
        F: FnOnce() -> ExerciseResult,
    {
        self.core.borrow_mut().transition(SessionState::Invoking)?;
        let completion = match panic::catch_unwind(AssertUnwindSafe(call)) {
            Ok(Ok(value)) => Completion::Completed(value),
            Ok(Err(error)) => Completion::Raised(error.to_string()),
            Err(payload) => match payload.downcast::<AbortReason>() {
                Ok(reason) => {
                    append_run_log(
                        "warn",
                        "session.aborted",
                        json!({ "reason": reason.as_str() }),
                    );
                    Completion::DidNotTerminate(*reason)
                }
                Err(payload) => Completion::Raised(panic_message(payload.as_ref())),
            },
        };
        self.completion = Some(completion);
        self.release()
    }

    /// Restore the previous console. Also runs on drop if a session is abandoned.
    pub fn release(&mut self) -> Result<(), GraderError> {
        self.slot = None;
        let mut core = self.core.borrow_mut();
        core.release()?;
        append_run_log(
            "debug",
            "session.released",
            json!({
                "consumed": core.capture.consumed,
                "ended_early": core.outcome.ended_early,
                "ran_past_inputs": core.outcome.ran_past_inputs,
                "output": fingerprint(&core.capture.output),
            }),
        );
        Ok(())
    }

    pub fn finalize(self) -> Result<SessionReport, GraderError> {
        let mut core = self.core.borrow_mut();
        core.transition(SessionState::Finalized)?;
        let completion = self
            .completion
            .clone()
            .unwrap_or(Completion::Completed(serde_json::Value::Null));
        Ok(SessionReport {
            outcome: core.outcome,
            transcript: core.capture.finalize(),
            completion,
            capture: core.capture.clone(),
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.slot.is_some() {
            let _ = self.release();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        return (*message).to_string();
    }
    if let Some(message) = payload.downcast_ref::<String>() {
        return message.clone();
    }
    "function panicked".to_string()
}

/// Run `invoke` inside a fresh session fed with `inputs`.
pub fn with_session<F>(
    inputs: Vec<String>,
    limits: SessionLimits,
    invoke: F,
) -> Result<SessionReport, GraderError>
where
    F: FnOnce() -> ExerciseResult,
{
    let mut session = Session::new(inputs, limits);
    session.acquire()?;
    session.invoke(invoke)?;
    session.finalize()
}

/// Call `function(args)` with `inputs` scripted as its console input.
pub fn simulate_interaction(
    inputs: &[String],
    function: &dyn Fn(&Arguments) -> ExerciseResult,
    args: &Arguments,
    limits: SessionLimits,
) -> Result<SessionReport, GraderError> {
    with_session(inputs.to_vec(), limits, || function(args))
}
