use std::fmt::Display;

use super::ExecutionErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub enum FrameKind {
    If {
        condition_met: bool,
    },
    While {
        condition: String,
    },
    For {
        condition: String,
        increment: String,
        iterations: usize,
    },
}

impl FrameKind {
    fn name(&self) -> &'static str {
        match self {
            FrameKind::If { .. } => "if",
            FrameKind::While { .. } => "while",
            FrameKind::For { .. } => "for",
        }
    }
}

/// An open `if`/`while`/`for` construct.
#[derive(Debug, Clone, PartialEq)]
pub struct ControlFrame {
    /// Line holding the opening statement.
    pub start: usize,
    /// Line holding the matching terminator.
    pub end: usize,
    pub kind: FrameKind,
}

impl ControlFrame {
    pub fn condition_met(&self) -> bool {
        matches!(
            self.kind,
            FrameKind::If {
                condition_met: true
            }
        )
    }

    pub fn set_condition_met(&mut self) {
        if let FrameKind::If { condition_met } = &mut self.kind {
            *condition_met = true;
        }
    }
}

/// Fixed-depth stack. Pushing past the limit is an error instead of a panic.
#[derive(Debug, Clone)]
pub struct Stack<T> {
    storage: Vec<T>,
    max_depth: usize,
    overflow: fn() -> ExecutionErrorKind,
}

impl<T> Stack<T> {
    fn new(max_depth: usize, overflow: fn() -> ExecutionErrorKind) -> Self {
        Stack {
            storage: Vec::with_capacity(max_depth),
            max_depth,
            overflow,
        }
    }

    pub fn push(&mut self, value: T) -> Result<(), ExecutionErrorKind> {
        if self.storage.len() >= self.max_depth {
            return Err((self.overflow)());
        }
        self.storage.push(value);
        Ok(())
    }

    pub fn pop(&mut self) -> Option<T> {
        self.storage.pop()
    }

    pub fn peek(&self) -> Option<&T> {
        self.storage.last()
    }

    pub fn peek_mut(&mut self) -> Option<&mut T> {
        self.storage.last_mut()
    }

    pub fn len(&self) -> usize {
        self.storage.len()
    }

    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }
}

pub type ControlStack = Stack<ControlFrame>;

/// Return addresses of the active function calls.
pub type CallStack = Stack<usize>;

impl ControlStack {
    pub fn control(max_depth: usize) -> Self {
        Stack::new(max_depth, || ExecutionErrorKind::ControlStackOverflow)
    }

    /// The innermost frame, if it belongs to `construct`.
    pub fn innermost(&mut self, construct: &'static str) -> Option<&mut ControlFrame> {
        self.peek_mut().filter(|frame| frame.kind.name() == construct)
    }
}

impl CallStack {
    pub fn calls(max_depth: usize) -> Self {
        Stack::new(max_depth, || ExecutionErrorKind::CallStackOverflow)
    }
}

impl Display for ControlStack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for frame in self.storage.iter() {
            write!(f, "[ {} {}..{} ]", frame.kind.name(), frame.start, frame.end)?;
        }
        Ok(())
    }
}
