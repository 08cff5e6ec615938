use std::collections::BTreeSet;

/// Commands an operator can issue while the engine is paused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugCommand {
    Continue,
    Step,
    Variables,
    CallStack,
    Memory,
    Quit,
}

/// Operator channel for debug pauses; the interactive prompt lives in the
/// adapter, never inside the engine.
pub trait DebugHandler {
    fn on_pause(&mut self, line: usize, statement: &str) -> DebugCommand;
    fn show(&mut self, text: &str);
}

/// Default handler: resumes immediately.
#[derive(Debug, Default)]
pub struct AutoContinue;

impl DebugHandler for AutoContinue {
    fn on_pause(&mut self, _line: usize, _statement: &str) -> DebugCommand {
        DebugCommand::Continue
    }

    fn show(&mut self, _text: &str) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DebugState {
    Running,
    Paused,
}

#[derive(Debug)]
pub struct Debugger {
    enabled: bool,
    step_mode: bool,
    state: DebugState,
    breakpoints: BTreeSet<usize>,
    current_line: usize,
}

impl Debugger {
    pub fn new() -> Self {
        Self {
            enabled: false,
            step_mode: false,
            state: DebugState::Running,
            breakpoints: BTreeSet::new(),
            current_line: 0,
        }
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.step_mode = false;
            self.state = DebugState::Running;
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_step(&mut self, step: bool) {
        self.step_mode = step;
        if step {
            self.enabled = true;
        }
    }

    pub fn step_mode(&self) -> bool {
        self.step_mode
    }

    pub fn state(&self) -> DebugState {
        self.state
    }

    pub fn pause(&mut self) {
        self.state = DebugState::Paused;
    }

    pub fn resume(&mut self) {
        self.state = DebugState::Running;
    }

    pub fn note_line(&mut self, line: usize) {
        self.current_line = line;
    }

    pub fn current_line(&self) -> usize {
        self.current_line
    }

    pub fn should_pause(&self, line: usize) -> bool {
        self.enabled && (self.step_mode || self.breakpoints.contains(&line))
    }

    pub fn set_breakpoint(&mut self, line: usize) {
        self.breakpoints.insert(line);
    }

    /// Returns whether the breakpoint existed.
    pub fn clear_breakpoint(&mut self, line: usize) -> bool {
        self.breakpoints.remove(&line)
    }

    pub fn clear_all(&mut self) {
        self.breakpoints.clear();
    }

    pub fn breakpoints(&self) -> Vec<usize> {
        self.breakpoints.iter().copied().collect()
    }
}

impl Default for Debugger {
    fn default() -> Self {
        Self::new()
    }
}
