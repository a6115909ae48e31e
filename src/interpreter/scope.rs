use std::fmt::Debug;

use crate::value::{Value, VariableType};

use super::ExecutionErrorKind;

#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    ty: VariableType,
    value: Value,
    scope: usize,
}

impl Variable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn ty(&self) -> VariableType {
        self.ty
    }

    pub fn value(&self) -> &Value {
        &self.value
    }

    pub fn scope(&self) -> usize {
        self.scope
    }

    /// Stores `value`, widening Int into a Float variable. Any other type
    /// mismatch is rejected and the current value is kept.
    pub fn assign(&mut self, value: Value) -> Result<(), ExecutionErrorKind> {
        match value.coerce_to(self.ty) {
            Ok(value) => {
                self.value = value;
                Ok(())
            }
            Err(value) => Err(ExecutionErrorKind::AssignmentTypeMismatch {
                name: self.name.clone(),
                expected: self.ty,
                found: value.ty(),
            }),
        }
    }
}

/// Every live variable of a program run, oldest first.
///
/// Lookups scan from the newest binding backwards, so a declaration in a
/// deeper scope shadows an older one with the same name.
#[derive(Clone)]
pub struct SymbolTable {
    variables: Vec<Variable>,
    current_scope: usize,
    capacity: usize,
}

impl SymbolTable {
    pub fn new(capacity: usize) -> Self {
        Self {
            variables: Vec::new(),
            current_scope: 0,
            capacity,
        }
    }

    pub fn current_scope(&self) -> usize {
        self.current_scope
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.variables
            .iter()
            .rposition(|v| v.name == name && v.scope <= self.current_scope)
    }

    pub fn find(&self, name: &str) -> Option<&Variable> {
        self.position(name).map(|i| &self.variables[i])
    }

    pub fn find_mut(&mut self, name: &str) -> Option<&mut Variable> {
        self.position(name).map(|i| &mut self.variables[i])
    }

    /// Like [`SymbolTable::find_mut`] but only matches a binding owned by the
    /// current scope.
    pub fn find_local_mut(&mut self, name: &str) -> Option<&mut Variable> {
        let scope = self.current_scope;
        self.find_mut(name).filter(|v| v.scope == scope)
    }

    pub fn declare(
        &mut self,
        name: &str,
        ty: VariableType,
    ) -> Result<&mut Variable, ExecutionErrorKind> {
        if self
            .variables
            .iter()
            .any(|v| v.name == name && v.scope == self.current_scope)
        {
            return Err(ExecutionErrorKind::VariableRedeclaration(name.to_string()));
        }
        if self.variables.len() >= self.capacity {
            return Err(ExecutionErrorKind::TooManyVariables(self.capacity));
        }
        let value = Value::default_for(ty)
            .ok_or_else(|| ExecutionErrorKind::UnknownVariableType(name.to_string()))?;

        self.variables.push(Variable {
            name: name.to_string(),
            ty,
            value,
            scope: self.current_scope,
        });
        let last = self.variables.len() - 1;
        Ok(&mut self.variables[last])
    }

    pub fn enter_scope(&mut self) {
        self.current_scope += 1;
    }

    /// Drops every variable whose scope level is `level` or deeper and makes
    /// the enclosing level current.
    pub fn exit_scope(&mut self, level: usize) {
        self.variables.retain(|v| v.scope < level);
        self.current_scope = level.saturating_sub(1);
    }
}

impl Debug for SymbolTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SymbolTable")
            .field(
                "variables",
                &self
                    .variables
                    .iter()
                    .map(|v| format!("{}: {} = {} @{}", v.name, v.ty, v.value, v.scope))
                    .collect::<Vec<_>>(),
            )
            .field("current_scope", &self.current_scope)
            .finish()
    }
}
