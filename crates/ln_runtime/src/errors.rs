//! Runtime error types.

use std::fmt;

use thiserror::Error;

pub mod messages {
    pub const STACK_OVERFLOW: &str = "Stack overflow";
    pub const NOT_CALLABLE: &str = "Can only call classes or functions";
    pub const NO_METHODS: &str = "Only instances have methods.";
    pub const SUPERCLASS_NOT_CLASS: &str = "Superclass must be a class.";
    pub const NOT_INDEXABLE: &str = "Only lists and maps can be indexed.";
    pub const INDEX_NOT_NUMBER: &str = "List index must be a whole number.";
    pub const NO_FRONTEND: &str = "no compiler frontend installed";
}

/// Every way executing bytecode can fail. The display text is the message
/// shown to the user.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum VmError {
    #[error("Undefined variable '{0}'.")]
    UndefinedVariable(String),
    #[error("Undefined property '{0}'.")]
    UndefinedProperty(String),
    /// `owner` reads like `'Point' class` or `'math' module`.
    #[error("{owner} has no property: '{name}'.")]
    NoProperty { owner: String, name: String },
    #[error("'{0}' type has no properties")]
    NoProperties(String),
    #[error("Cannot set property on type '{0}'")]
    CannotSetProperty(String),
    #[error("{receiver} has no method {name}().")]
    NoMethod { receiver: &'static str, name: String },
    #[error("{}", messages::NO_METHODS)]
    NoMethods,
    #[error("Function '{name}' expected {expected} argument(s) but got {got}.")]
    Arity { name: String, expected: u8, got: u8 },
    #[error("Expected 0 arguments but got {0}.")]
    InitArity(u8),
    #[error("{}", messages::NOT_CALLABLE)]
    NotCallable,
    #[error("Unsupported operand types for {op}: '{left}', '{right}'")]
    OperandTypes {
        op: &'static str,
        left: String,
        right: String,
    },
    #[error("Unsupported operand type for unary -: '{0}'")]
    UnaryOperand(String),
    #[error("{}", messages::SUPERCLASS_NOT_CLASS)]
    SuperclassNotClass,
    #[error("{}", messages::NOT_INDEXABLE)]
    NotIndexable,
    #[error("{}", messages::INDEX_NOT_NUMBER)]
    IndexNotNumber,
    #[error("List index {index} out of bounds for length {len}.")]
    IndexOutOfBounds { index: f64, len: usize },
    #[error("Key {0} does not exist within map.")]
    KeyNotFound(String),
    #[error("{}", messages::STACK_OVERFLOW)]
    StackOverflow,
    #[error("Cannot pass {0} arguments; at most 255 are allowed.")]
    TooManyArguments(usize),
    #[error("{0}")]
    Native(String),
    #[error("Could not import '{path}': {reason}.")]
    Import { path: String, reason: String },
    #[error("{0}")]
    Io(String),
}

impl From<std::io::Error> for VmError {
    fn from(err: std::io::Error) -> Self {
        VmError::Io(err.to_string())
    }
}

/// One line of a runtime stack trace, innermost frame first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceFrame {
    pub function: String,
    pub module: String,
    pub line: u32,
}

impl fmt::Display for TraceFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Function '{}' in '{}', [line {}]",
            self.function, self.module, self.line
        )
    }
}

/// A fatal runtime error together with the frames it unwound.
#[derive(Debug, Clone, PartialEq)]
pub struct RuntimeError {
    pub error: VmError,
    pub trace: Vec<TraceFrame>,
}

impl RuntimeError {
    pub fn message(&self) -> String {
        self.error.to_string()
    }
}

impl fmt::Display for RuntimeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Traceback (most recent call last):")?;
        for frame in self.trace.iter().rev() {
            writeln!(f, "  {frame}")?;
        }
        write!(f, "{}", self.error)
    }
}

impl std::error::Error for RuntimeError {}
