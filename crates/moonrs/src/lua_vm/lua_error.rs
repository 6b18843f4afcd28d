// Error taxonomy shared by the compiler and the runtime
// One Result channel carries language-level error() payloads and internal
// domain faults; pcall/xpcall are the only conversion points back to values

use std::fmt;

use crate::lua_value::LuaValue;

pub type LuaResult<T> = Result<T, LuaError>;

#[derive(Debug, Clone)]
pub enum LuaError {
    /// Malformed source or a construct rejected at compile time.
    /// The message already carries its `chunk:line:` prefix.
    Syntax { message: String, line: u32 },
    /// A fault from the fixed runtime taxonomy.
    Runtime(RuntimeError),
    /// A language-level `error()` with an arbitrary payload. `level` records
    /// how many frames were unwound to attribute the source location.
    User { value: LuaValue, level: u32 },
    /// A failure inside a host-provided function, with the original message
    /// preserved as the cause.
    Host { message: String, inner: Option<String> },
}

#[derive(Debug, Clone)]
pub struct RuntimeError {
    pub kind: RuntimeErrorKind,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeErrorKind {
    /// An operation with no built-in semantics and no metamethod, e.g.
    /// indexing a number or adding a table.
    UndefinedOperation,
    /// Overwrite of a locked (constant) table entry.
    AlreadyConstant,
    /// A nil or NaN table key.
    InvalidKey,
    /// A stack level that does not name a live frame.
    InvalidStackLevel,
    /// A host function received an argument it cannot use.
    BadArgument,
    /// The call stack exceeded its depth limit.
    StackOverflow,
}

impl LuaError {
    pub fn syntax(message: impl Into<String>, line: u32) -> Self {
        LuaError::Syntax {
            message: message.into(),
            line,
        }
    }

    pub fn runtime(kind: RuntimeErrorKind, message: impl Into<String>) -> Self {
        LuaError::Runtime(RuntimeError {
            kind,
            message: message.into(),
        })
    }

    /// The value a protected call hands back: the original payload for user
    /// errors, the prefixed message string for everything else.
    pub fn into_value(self) -> LuaValue {
        match self {
            LuaError::User { value, .. } => value,
            other => LuaValue::from(other.to_string()),
        }
    }
}

impl fmt::Display for LuaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaError::Syntax { message, .. } => write!(f, "{}", message),
            LuaError::Runtime(err) => write!(f, "{}", err.message),
            LuaError::User { value, .. } => write!(f, "{}", value.display_raw()),
            LuaError::Host { message, inner } => match inner {
                Some(cause) => write!(f, "{} ({})", message, cause),
                None => write!(f, "{}", message),
            },
        }
    }
}

impl std::error::Error for LuaError {}
