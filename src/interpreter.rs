mod control;
mod expression;
mod jump_table;
mod scope;

use std::{
    cell::RefCell,
    fmt::{Debug, Display},
    io::{BufRead, Write},
    rc::Rc,
};

use crate::{
    tokenizer,
    value::{Value, VariableType},
};

use self::control::{CallStack, ControlFrame, ControlStack, FrameKind};

pub use self::{
    expression::{evaluate, InfixOperator},
    jump_table::{FunctionSpan, JumpTable},
    scope::{SymbolTable, Variable},
};

/// Fixed capacities of a program run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_variables: usize,
    pub max_labels: usize,
    pub max_functions: usize,
    pub max_control_depth: usize,
    pub max_call_depth: usize,
    /// How many times an `endfor` may jump back before the loop is left.
    pub max_for_iterations: usize,
    pub max_tokens_per_line: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_variables: 100,
            max_labels: 100,
            max_functions: 100,
            max_control_depth: 20,
            max_call_depth: 20,
            max_for_iterations: 1000,
            max_tokens_per_line: 50,
        }
    }
}

/// Source lines of a program, immutable for the whole run.
#[derive(Debug, Clone)]
pub struct Program {
    lines: Rc<[String]>,
}

impl Program {
    pub fn from_source(source: &str) -> Self {
        Self::from_lines(source.lines())
    }

    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            lines: lines.into_iter().map(Into::into).collect(),
        }
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }
}

/// What the interpreter should do after a statement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Next,
    Jump(usize),
    Halt(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    /// An `exit` statement ran with this code.
    Exit(String),
    EndOfProgram,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Syntax,
    TypeMismatch,
    UndefinedReference,
    DivisionByZero,
    DuplicateDeclaration,
    StackOverflow,
    MissingTerminator,
    ResourceExhausted,
    Input,
}

impl Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorCategory::Syntax => "SyntaxError",
            ErrorCategory::TypeMismatch => "TypeMismatch",
            ErrorCategory::UndefinedReference => "UndefinedReference",
            ErrorCategory::DivisionByZero => "DivisionByZero",
            ErrorCategory::DuplicateDeclaration => "DuplicateDeclaration",
            ErrorCategory::StackOverflow => "StackOverflow",
            ErrorCategory::MissingTerminator => "MissingTerminator",
            ErrorCategory::ResourceExhausted => "ResourceExhausted",
            ErrorCategory::Input => "InputError",
        };
        write!(f, "{name}")
    }
}

/// A reported error and the line that caused it.
#[derive(Debug, thiserror::Error)]
#[error("Error at line {}: {kind}\n    {statement}", .line + 1)]
pub struct ExecutionError {
    /// Zero-based index of the offending line.
    pub line: usize,
    pub statement: String,
    pub kind: ExecutionErrorKind,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionErrorKind {
    #[error("IO error: {0}")]
    IO(#[from] std::io::Error),
    #[error("{0} requires {1}")]
    MissingOperand(&'static str, &'static str),
    #[error("Syntax error: expected `<type> <name> = <expression>`")]
    MalformedDeclaration,
    #[error("Syntax error: expected `<name> = <expression>`")]
    MalformedAssignment,
    #[error("Syntax error: expected `for ( init ; condition ; increment )`")]
    MalformedFor,
    #[error("for clause cannot transfer control: {0}")]
    ForClauseTransfersControl(String),
    #[error("{0} without matching {1}")]
    Unmatched(&'static str, &'static str),
    #[error("return outside function")]
    ReturnOutsideFunction,
    #[error("Empty expression")]
    EmptyExpression,
    #[error("Unsupported expression format: {0}")]
    UnsupportedExpression(String),
    #[error("Invalid not operation: !{0}")]
    InvalidNot(Value),
    #[error("Invalid logical operation: {1} {0} {2}")]
    InvalidLogical(InfixOperator, Value, Value),
    #[error("Invalid comparison: {1} {0} {2}")]
    InvalidComparison(InfixOperator, Value, Value),
    #[error("Invalid arithmetic operation: {1} {0} {2}")]
    InvalidArithmetic(InfixOperator, Value, Value),
    #[error("Condition must be boolean, found {0}")]
    NonBooleanCondition(VariableType),
    #[error("Type mismatch: cannot store {found} in {expected} variable '{name}'")]
    AssignmentTypeMismatch {
        name: String,
        expected: VariableType,
        found: VariableType,
    },
    #[error("Type mismatch: '{name}' is already declared as {existing}, not {declared}")]
    RedeclaredWithDifferentType {
        name: String,
        existing: VariableType,
        declared: VariableType,
    },
    #[error("Variable '{0}' has no type")]
    UnknownVariableType(String),
    #[error("Undeclared variable: {0}")]
    UndeclaredVariable(String),
    #[error("Label '{0}' not found")]
    UndefinedLabel(String),
    #[error("Function '{0}' not defined")]
    UndefinedFunction(String),
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Variable redeclaration: {0}")]
    VariableRedeclaration(String),
    #[error("Duplicate label: {0}")]
    DuplicateLabel(String),
    #[error("Duplicate function: {0}")]
    DuplicateFunction(String),
    #[error("Control stack overflow")]
    ControlStackOverflow,
    #[error("Call stack overflow")]
    CallStackOverflow,
    #[error("Missing {terminator} for {construct}")]
    MissingTerminator {
        construct: &'static str,
        terminator: &'static str,
    },
    #[error("Too many variables (limit {0})")]
    TooManyVariables(usize),
    #[error("Too many labels (limit {0})")]
    TooManyLabels(usize),
    #[error("Too many functions (limit {0})")]
    TooManyFunctions(usize),
    #[error("Error reading input")]
    InputUnavailable,
    #[error("Invalid {ty} value for '{name}': {text}")]
    InvalidInput {
        name: String,
        ty: VariableType,
        text: String,
    },
}

impl ExecutionErrorKind {
    pub fn category(&self) -> ErrorCategory {
        use ExecutionErrorKind::*;

        match self {
            MissingOperand(..)
            | MalformedDeclaration
            | MalformedAssignment
            | MalformedFor
            | ForClauseTransfersControl(_)
            | Unmatched(..)
            | ReturnOutsideFunction
            | EmptyExpression
            | UnsupportedExpression(_) => ErrorCategory::Syntax,
            InvalidNot(_)
            | InvalidLogical(..)
            | InvalidComparison(..)
            | InvalidArithmetic(..)
            | NonBooleanCondition(_)
            | AssignmentTypeMismatch { .. }
            | RedeclaredWithDifferentType { .. }
            | UnknownVariableType(_) => ErrorCategory::TypeMismatch,
            UndeclaredVariable(_) | UndefinedLabel(_) | UndefinedFunction(_) => {
                ErrorCategory::UndefinedReference
            }
            DivisionByZero => ErrorCategory::DivisionByZero,
            VariableRedeclaration(_) | DuplicateLabel(_) | DuplicateFunction(_) => {
                ErrorCategory::DuplicateDeclaration
            }
            ControlStackOverflow | CallStackOverflow => ErrorCategory::StackOverflow,
            MissingTerminator { .. } => ErrorCategory::MissingTerminator,
            TooManyVariables(_) | TooManyLabels(_) | TooManyFunctions(_) => {
                ErrorCategory::ResourceExhausted
            }
            IO(_) | InputUnavailable | InvalidInput { .. } => ErrorCategory::Input,
        }
    }
}

/// Whether a `for` init or increment clause would move the program counter.
fn transfers_control(tokens: &[&str]) -> bool {
    match tokens {
        [] => false,
        [
            "exit" | "goto" | "return" | "function" | "if" | "elseif" | "else" | "endif" | "while"
            | "endwhile" | "for" | "endfor",
            ..,
        ] => true,
        _ => call_target(tokens).is_some(),
    }
}

fn is_keyword(word: &str) -> bool {
    matches!(
        word,
        "exit"
            | "print"
            | "input"
            | "goto"
            | "return"
            | "if"
            | "elseif"
            | "else"
            | "endif"
            | "while"
            | "endwhile"
            | "for"
            | "endfor"
            | "function"
    ) || VariableType::from_keyword(word).is_some()
}

/// Splits `for ( init ; condition ; increment )` into its three clauses.
fn for_clauses<'t, 's>(tokens: &'t [&'s str]) -> Option<[&'t [&'s str]; 3]> {
    let ["for", "(", inner @ .., ")"] = tokens else {
        return None;
    };
    let mut clauses = inner.split(|token| *token == ";");
    let (Some(init), Some(condition), Some(increment), None) = (
        clauses.next(),
        clauses.next(),
        clauses.next(),
        clauses.next(),
    ) else {
        return None;
    };
    if condition.is_empty() {
        return None;
    }
    Some([init, condition, increment])
}

/// Name of the function invoked by `name()` or `name ()`.
fn call_target<'s>(tokens: &[&'s str]) -> Option<&'s str> {
    let name = match *tokens {
        [name, "()"] => name,
        [token] => token.strip_suffix("()")?,
        _ => return None,
    };
    (tokenizer::is_identifier(name) && !is_keyword(name)).then_some(name)
}

fn parse_input(text: &str, ty: VariableType) -> Option<Value> {
    match ty {
        VariableType::Int => text.trim().parse().ok().map(Value::Int),
        VariableType::Float => text.trim().parse().ok().map(Value::Float),
        VariableType::String => Some(Value::String(text.to_string())),
        VariableType::Bool => match text {
            "true" => Some(Value::Bool(true)),
            "false" => Some(Value::Bool(false)),
            _ => None,
        },
        VariableType::Unknown => None,
    }
}

/// State of one program run: symbols, stacks, jump targets, and the program
/// counter.
pub struct Interpreter {
    lines: Rc<[String]>,
    symbols: SymbolTable,
    jumps: JumpTable,
    frames: ControlStack,
    calls: CallStack,
    pc: usize,
    skip_until_endif: usize,
    limits: Limits,
    diagnostics: Vec<ExecutionError>,
    stdout: Rc<RefCell<dyn Write>>,
    stdin: Rc<RefCell<dyn BufRead>>,
}

impl Debug for Interpreter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Interpreter")
            .field("pc", &self.pc)
            .field("symbols", &self.symbols)
            .field("frames", &self.frames.to_string())
            .field("calls", &self.calls)
            .field("skip_until_endif", &self.skip_until_endif)
            .finish()
    }
}

impl Default for Interpreter {
    fn default() -> Self {
        Self::new(Rc::new(RefCell::new(std::io::stdout())))
    }
}

impl Interpreter {
    pub fn new(stdout: Rc<RefCell<dyn Write>>) -> Self {
        let limits = Limits::default();
        Self {
            lines: Rc::from(Vec::new()),
            symbols: SymbolTable::new(limits.max_variables),
            jumps: JumpTable::default(),
            frames: ControlStack::control(limits.max_control_depth),
            calls: CallStack::calls(limits.max_call_depth),
            pc: 0,
            skip_until_endif: 0,
            limits,
            diagnostics: Vec::new(),
            stdout,
            stdin: Rc::new(RefCell::new(std::io::BufReader::new(std::io::stdin()))),
        }
    }

    pub fn with_input(mut self, stdin: Rc<RefCell<dyn BufRead>>) -> Self {
        self.stdin = stdin;
        self
    }

    pub fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &Limits {
        &self.limits
    }

    pub fn pc(&self) -> usize {
        self.pc
    }

    pub fn current_scope(&self) -> usize {
        self.symbols.current_scope()
    }

    /// The binding `name` resolves to right now.
    pub fn variable(&self, name: &str) -> Option<&Variable> {
        self.symbols.find(name)
    }

    pub fn jump_table(&self) -> &JumpTable {
        &self.jumps
    }

    pub fn call_depth(&self) -> usize {
        self.calls.len()
    }

    pub fn control_depth(&self) -> usize {
        self.frames.len()
    }

    /// Every error reported during the last run, in order.
    pub fn diagnostics(&self) -> &[ExecutionError] {
        &self.diagnostics
    }

    /// Runs `program` from its first line until `exit` or the end.
    ///
    /// Program errors are reported and skipped; only a failing output sink
    /// makes this return `Err`.
    pub fn run(&mut self, program: &Program) -> std::io::Result<Termination> {
        self.load(program)?;
        tracing::info!(lines = self.lines.len(), "program start");

        while self.pc < self.lines.len() {
            if let Some(termination) = self.step()? {
                tracing::info!(?termination, "program exit");
                return Ok(termination);
            }
        }

        tracing::info!("end of program");
        Ok(Termination::EndOfProgram)
    }

    fn load(&mut self, program: &Program) -> std::io::Result<()> {
        self.lines = program.lines.clone();
        self.symbols = SymbolTable::new(self.limits.max_variables);
        self.frames = ControlStack::control(self.limits.max_control_depth);
        self.calls = CallStack::calls(self.limits.max_call_depth);
        self.pc = 0;
        self.skip_until_endif = 0;
        self.diagnostics.clear();

        let (jumps, errors) = JumpTable::scan(&self.lines[..], &self.limits);
        self.jumps = jumps;
        for error in errors {
            self.report(error)?;
        }
        Ok(())
    }

    fn step(&mut self) -> std::io::Result<Option<Termination>> {
        let lines = Rc::clone(&self.lines);
        let line = lines[self.pc].as_str();

        let Some(keyword) = line.split_ascii_whitespace().next() else {
            self.pc += 1;
            return Ok(None);
        };
        if tokenizer::label(line).is_some() {
            self.pc += 1;
            return Ok(None);
        }

        if self.skip_until_endif > 0 {
            if keyword == "endif" {
                self.skip_until_endif -= 1;
            }
            self.pc += 1;
            return Ok(None);
        }

        match self.execute_statement(line) {
            Ok(Flow::Next) => self.pc += 1,
            Ok(Flow::Jump(target)) => self.pc = target,
            Ok(Flow::Halt(code)) => return Ok(Some(Termination::Exit(code))),
            Err(kind) => {
                self.report(ExecutionError {
                    line: self.pc,
                    statement: line.to_string(),
                    kind,
                })?;
                self.pc += 1;
            }
        }
        Ok(None)
    }

    fn report(&mut self, error: ExecutionError) -> std::io::Result<()> {
        tracing::warn!(
            line = error.line + 1,
            category = %error.kind.category(),
            "{}",
            error.kind
        );
        writeln!(self.stdout.borrow_mut(), "Error: {}", error.kind)?;
        self.diagnostics.push(error);
        Ok(())
    }

    /// Executes a single line of text as a statement at the current program
    /// counter, without moving it.
    pub fn execute_statement(&mut self, line: &str) -> Result<Flow, ExecutionErrorKind> {
        let tokens = tokenizer::tokens(line, self.limits.max_tokens_per_line);
        self.execute(&tokens)
    }

    fn execute(&mut self, tokens: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        let Some((&keyword, args)) = tokens.split_first() else {
            return Ok(Flow::Next);
        };
        tracing::debug!(line = self.pc + 1, keyword, "execute");

        match keyword {
            "exit" => {
                let code = args.first().copied().unwrap_or("0");
                writeln!(self.stdout.borrow_mut(), "Program ended with exit code '{code}'")?;
                Ok(Flow::Halt(code.to_string()))
            }
            "print" => self.print(args),
            "input" => self.input(args),
            "goto" => self.goto(args),
            "return" => self.return_from_function(),
            "if" => self.if_statement(args),
            "elseif" => self.elseif_statement(args),
            "else" => self.else_statement(),
            "endif" => self.endif_statement(),
            "while" => self.while_statement(args),
            "endwhile" => self.endwhile_statement(),
            "for" => self.for_statement(tokens),
            "endfor" => self.endfor_statement(),
            "function" => self.skip_function(),
            _ if keyword.starts_with('#') || keyword.starts_with("//") => Ok(Flow::Next),
            _ => {
                if let Some(ty) = VariableType::from_keyword(keyword) {
                    self.declare(ty, args)
                } else if let Some(name) = call_target(tokens) {
                    self.call(name)
                } else if let ["=", expression @ ..] = args {
                    self.assign(keyword, expression)
                } else {
                    Ok(Flow::Next)
                }
            }
        }
    }

    fn evaluate_text(&self, expression: &str) -> Result<Value, ExecutionErrorKind> {
        let tokens = tokenizer::tokens(expression, self.limits.max_tokens_per_line);
        evaluate(&tokens, &self.symbols)
    }

    fn condition(&self, tokens: &[&str]) -> Result<bool, ExecutionErrorKind> {
        match evaluate(tokens, &self.symbols)? {
            Value::Bool(b) => Ok(b),
            value => Err(ExecutionErrorKind::NonBooleanCondition(value.ty())),
        }
    }

    fn matching_end(
        &self,
        construct: &'static str,
        opener: &str,
        terminator: &'static str,
    ) -> Result<usize, ExecutionErrorKind> {
        tokenizer::find_matching_end(&self.lines[..], self.pc, opener, terminator).ok_or(
            ExecutionErrorKind::MissingTerminator {
                construct,
                terminator,
            },
        )
    }

    fn print(&mut self, args: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        if args.is_empty() {
            return Err(ExecutionErrorKind::MissingOperand("print", "an argument"));
        }
        let text = args.join(" ");
        match self.symbols.find(&text) {
            Some(variable) => writeln!(self.stdout.borrow_mut(), "{}", variable.value())?,
            None => writeln!(self.stdout.borrow_mut(), "{}", text)?,
        }
        Ok(Flow::Next)
    }

    fn input(&mut self, args: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        let name = *args
            .first()
            .ok_or(ExecutionErrorKind::MissingOperand("input", "a variable name"))?;
        let ty = self
            .symbols
            .find(name)
            .ok_or_else(|| ExecutionErrorKind::UndeclaredVariable(name.to_string()))?
            .ty();

        {
            let mut stdout = self.stdout.borrow_mut();
            write!(stdout, "Enter value for {name}: ")?;
            stdout.flush()?;
        }

        let mut buffer = String::new();
        if self.stdin.borrow_mut().read_line(&mut buffer)? == 0 {
            return Err(ExecutionErrorKind::InputUnavailable);
        }
        let text = buffer.trim_end_matches(&['\n', '\r'][..]);
        let value = parse_input(text, ty).ok_or_else(|| ExecutionErrorKind::InvalidInput {
            name: name.to_string(),
            ty,
            text: text.to_string(),
        })?;

        self.symbols
            .find_mut(name)
            .ok_or_else(|| ExecutionErrorKind::UndeclaredVariable(name.to_string()))?
            .assign(value)?;
        Ok(Flow::Next)
    }

    fn goto(&mut self, args: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        let label = *args
            .first()
            .ok_or(ExecutionErrorKind::MissingOperand("goto", "a label name"))?;
        let target = self.jumps.find_label(label)?;
        tracing::debug!(label, target = target + 1, "goto");
        Ok(Flow::Jump(target))
    }

    fn call(&mut self, name: &str) -> Result<Flow, ExecutionErrorKind> {
        let function = self.jumps.find_function(name)?;
        self.calls.push(self.pc + 1)?;
        self.symbols.enter_scope();
        tracing::debug!(
            name,
            depth = self.calls.len(),
            scope = self.symbols.current_scope(),
            "call"
        );
        Ok(Flow::Jump(function.start + 1))
    }

    fn return_from_function(&mut self) -> Result<Flow, ExecutionErrorKind> {
        let target = self
            .calls
            .pop()
            .ok_or(ExecutionErrorKind::ReturnOutsideFunction)?;
        let scope = self.symbols.current_scope();
        self.symbols.exit_scope(scope);
        tracing::debug!(target = target + 1, scope, "return");
        Ok(Flow::Jump(target))
    }

    fn skip_function(&mut self) -> Result<Flow, ExecutionErrorKind> {
        let end = self.matching_end("function", "{", "}")?;
        Ok(Flow::Jump(end + 1))
    }

    fn if_statement(&mut self, args: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        if args.is_empty() {
            return Err(ExecutionErrorKind::MissingOperand("if", "a condition"));
        }
        let condition = self.condition(args)?;
        let end = self.matching_end("if", "if", "endif")?;

        if condition {
            self.frames.push(ControlFrame {
                start: self.pc,
                end,
                kind: FrameKind::If {
                    condition_met: true,
                },
            })?;
            Ok(Flow::Next)
        } else {
            // Lands on the matching endif; any elseif/else in between is
            // never looked at.
            self.skip_until_endif = 1;
            Ok(Flow::Jump(end))
        }
    }

    fn elseif_statement(&mut self, args: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        let frame = self
            .frames
            .innermost("if")
            .ok_or(ExecutionErrorKind::Unmatched("elseif", "if"))?;
        if frame.condition_met() {
            return Ok(Flow::Jump(frame.end));
        }
        if args.is_empty() {
            return Err(ExecutionErrorKind::MissingOperand("elseif", "a condition"));
        }

        if self.condition(args)? {
            if let Some(frame) = self.frames.innermost("if") {
                frame.set_condition_met();
            }
        }
        Ok(Flow::Next)
    }

    fn else_statement(&mut self) -> Result<Flow, ExecutionErrorKind> {
        let frame = self
            .frames
            .innermost("if")
            .ok_or(ExecutionErrorKind::Unmatched("else", "if"))?;
        if frame.condition_met() {
            Ok(Flow::Jump(frame.end))
        } else {
            frame.set_condition_met();
            Ok(Flow::Next)
        }
    }

    fn endif_statement(&mut self) -> Result<Flow, ExecutionErrorKind> {
        self.frames
            .innermost("if")
            .ok_or(ExecutionErrorKind::Unmatched("endif", "if"))?;
        self.frames.pop();
        Ok(Flow::Next)
    }

    fn while_statement(&mut self, args: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        if args.is_empty() {
            return Err(ExecutionErrorKind::MissingOperand("while", "a condition"));
        }
        let condition = self.condition(args)?;
        let end = self.matching_end("while", "while", "endwhile")?;

        if !condition {
            return Ok(Flow::Jump(end + 1));
        }
        self.frames.push(ControlFrame {
            start: self.pc,
            end,
            kind: FrameKind::While {
                condition: args.join(" "),
            },
        })?;
        Ok(Flow::Next)
    }

    fn endwhile_statement(&mut self) -> Result<Flow, ExecutionErrorKind> {
        let (start, condition) = match self.frames.peek() {
            Some(ControlFrame {
                start,
                kind: FrameKind::While { condition },
                ..
            }) => (*start, condition.clone()),
            _ => return Err(ExecutionErrorKind::Unmatched("endwhile", "while")),
        };

        if self.loop_condition(&condition)? {
            Ok(Flow::Jump(start + 1))
        } else {
            self.frames.pop();
            Ok(Flow::Next)
        }
    }

    fn for_statement(&mut self, tokens: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        let [init, condition, increment] =
            for_clauses(tokens).ok_or(ExecutionErrorKind::MalformedFor)?;
        for clause in [init, increment] {
            if transfers_control(clause) {
                return Err(ExecutionErrorKind::ForClauseTransfersControl(
                    clause.join(" "),
                ));
            }
        }
        let end = self.matching_end("for", "for", "endfor")?;

        self.frames.push(ControlFrame {
            start: self.pc,
            end,
            kind: FrameKind::For {
                condition: condition.join(" "),
                increment: increment.join(" "),
                iterations: 0,
            },
        })?;
        self.run_clause(&init.join(" "))?;
        Ok(Flow::Next)
    }

    fn endfor_statement(&mut self) -> Result<Flow, ExecutionErrorKind> {
        let (start, condition, increment, iterations) = match self.frames.peek() {
            Some(ControlFrame {
                start,
                kind:
                    FrameKind::For {
                        condition,
                        increment,
                        iterations,
                    },
                ..
            }) => (*start, condition.clone(), increment.clone(), *iterations),
            _ => return Err(ExecutionErrorKind::Unmatched("endfor", "for")),
        };

        self.run_clause(&increment)?;
        if self.loop_condition(&condition)? && iterations < self.limits.max_for_iterations {
            if let Some(ControlFrame {
                kind: FrameKind::For { iterations, .. },
                ..
            }) = self.frames.peek_mut()
            {
                *iterations += 1;
            }
            Ok(Flow::Jump(start + 1))
        } else {
            if iterations >= self.limits.max_for_iterations {
                tracing::debug!(line = self.pc + 1, iterations, "for loop hit iteration cap");
            }
            self.frames.pop();
            Ok(Flow::Next)
        }
    }

    /// Runs a `for` init or increment clause. Its errors are reported but do
    /// not abort the loop.
    fn run_clause(&mut self, clause: &str) -> Result<(), ExecutionErrorKind> {
        if let Err(kind) = self.execute_statement(clause) {
            self.report(ExecutionError {
                line: self.pc,
                statement: clause.to_string(),
                kind,
            })?;
        }
        Ok(())
    }

    /// Re-evaluates a stored loop condition. The innermost frame is popped
    /// when the condition is not a boolean.
    fn loop_condition(&mut self, condition: &str) -> Result<bool, ExecutionErrorKind> {
        let result = match self.evaluate_text(condition) {
            Ok(Value::Bool(b)) => Ok(b),
            Ok(value) => Err(ExecutionErrorKind::NonBooleanCondition(value.ty())),
            Err(kind) => Err(kind),
        };
        if result.is_err() {
            self.frames.pop();
        }
        result
    }

    fn declare(&mut self, ty: VariableType, args: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        let [name, "=", expression @ ..] = args else {
            return Err(ExecutionErrorKind::MalformedDeclaration);
        };
        if expression.is_empty() || !tokenizer::is_identifier(name) {
            return Err(ExecutionErrorKind::MalformedDeclaration);
        }

        match self.symbols.find_local_mut(name).map(|variable| variable.ty()) {
            Some(existing) if existing != ty => {
                return Err(ExecutionErrorKind::RedeclaredWithDifferentType {
                    name: name.to_string(),
                    existing,
                    declared: ty,
                })
            }
            Some(_) => {}
            None => {
                self.symbols.declare(name, ty)?;
            }
        }

        let value = evaluate(expression, &self.symbols)?;
        self.symbols
            .find_local_mut(name)
            .ok_or_else(|| ExecutionErrorKind::UndeclaredVariable(name.to_string()))?
            .assign(value)?;
        Ok(Flow::Next)
    }

    fn assign(&mut self, name: &str, expression: &[&str]) -> Result<Flow, ExecutionErrorKind> {
        if expression.is_empty() {
            return Err(ExecutionErrorKind::MalformedAssignment);
        }
        if self.symbols.find(name).is_none() {
            return Err(ExecutionErrorKind::UndeclaredVariable(name.to_string()));
        }

        let value = evaluate(expression, &self.symbols)?;
        self.symbols
            .find_mut(name)
            .ok_or_else(|| ExecutionErrorKind::UndeclaredVariable(name.to_string()))?
            .assign(value)?;
        Ok(Flow::Next)
    }
}
