use rustc_hash::FxHashMap;

use crate::tokenizer;

use super::{ExecutionError, ExecutionErrorKind, Limits};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionSpan {
    /// Line of the `function` header.
    pub start: usize,
    /// Line of the matching closing `}`.
    pub end: usize,
}

/// Label and function positions, built once before execution starts.
#[derive(Debug, Clone, Default)]
pub struct JumpTable {
    labels: FxHashMap<String, usize>,
    functions: FxHashMap<String, FunctionSpan>,
}

impl JumpTable {
    /// Registers every label and function in `lines`.
    ///
    /// Function bodies are skipped as a whole, so labels inside them are never
    /// registered. Registration problems do not stop the scan; they are
    /// returned alongside the table.
    pub fn scan<S: AsRef<str>>(lines: &[S], limits: &Limits) -> (Self, Vec<ExecutionError>) {
        let mut table = Self::default();
        let mut errors = Vec::new();

        let mut index = 0;
        while index < lines.len() {
            let line = lines[index].as_ref();
            let at = index;
            let report = |kind: ExecutionErrorKind| ExecutionError {
                line: at,
                statement: line.to_string(),
                kind,
            };

            if let Some(name) = tokenizer::label(line) {
                if let Err(kind) = table.add_label(name, index, limits.max_labels) {
                    errors.push(report(kind));
                }
            } else if let Some(name) = function_name(line) {
                match tokenizer::find_matching_end(lines, index, "{", "}") {
                    Some(end) => {
                        let span = FunctionSpan { start: index, end };
                        if let Err(kind) = table.add_function(name, span, limits.max_functions)
                        {
                            errors.push(report(kind));
                        }
                        index = end;
                    }
                    None => errors.push(report(ExecutionErrorKind::MissingTerminator {
                        construct: "function",
                        terminator: "}",
                    })),
                }
            }
            index += 1;
        }

        tracing::debug!(
            labels = table.labels.len(),
            functions = table.functions.len(),
            "pre-scan complete"
        );
        (table, errors)
    }

    fn add_label(
        &mut self,
        name: &str,
        line: usize,
        capacity: usize,
    ) -> Result<(), ExecutionErrorKind> {
        if self.labels.contains_key(name) {
            return Err(ExecutionErrorKind::DuplicateLabel(name.to_string()));
        }
        if self.labels.len() >= capacity {
            return Err(ExecutionErrorKind::TooManyLabels(capacity));
        }
        self.labels.insert(name.to_string(), line);
        Ok(())
    }

    fn add_function(
        &mut self,
        name: &str,
        span: FunctionSpan,
        capacity: usize,
    ) -> Result<(), ExecutionErrorKind> {
        if self.functions.contains_key(name) {
            return Err(ExecutionErrorKind::DuplicateFunction(name.to_string()));
        }
        if self.functions.len() >= capacity {
            return Err(ExecutionErrorKind::TooManyFunctions(capacity));
        }
        self.functions.insert(name.to_string(), span);
        Ok(())
    }

    pub fn find_label(&self, name: &str) -> Result<usize, ExecutionErrorKind> {
        self.labels
            .get(name)
            .copied()
            .ok_or_else(|| ExecutionErrorKind::UndefinedLabel(name.to_string()))
    }

    pub fn find_function(&self, name: &str) -> Result<FunctionSpan, ExecutionErrorKind> {
        self.functions
            .get(name)
            .copied()
            .ok_or_else(|| ExecutionErrorKind::UndefinedFunction(name.to_string()))
    }

    /// Labels sorted by line.
    pub fn labels(&self) -> Vec<(&str, usize)> {
        let mut labels = self
            .labels
            .iter()
            .map(|(name, line)| (name.as_str(), *line))
            .collect::<Vec<_>>();
        labels.sort_by_key(|(_, line)| *line);
        labels
    }

    /// Functions sorted by header line.
    pub fn functions(&self) -> Vec<(&str, FunctionSpan)> {
        let mut functions = self
            .functions
            .iter()
            .map(|(name, span)| (name.as_str(), *span))
            .collect::<Vec<_>>();
        functions.sort_by_key(|(_, span)| span.start);
        functions
    }
}

/// Name declared by a `function <name>` header, without any trailing `()`.
pub fn function_name(line: &str) -> Option<&str> {
    let mut tokens = line.split_ascii_whitespace();
    if tokens.next()? != "function" {
        return None;
    }
    let name = tokens.next()?;
    let name = name.strip_suffix("()").unwrap_or(name);
    if tokenizer::is_identifier(name) {
        Some(name)
    } else {
        None
    }
}
