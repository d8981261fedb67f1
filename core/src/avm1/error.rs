//! Error types raised while executing ActionScript.

use crate::avm1::Value;
use thiserror::Error;

#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Primitive conversion found no callable `valueOf`/`toString`, or the
    /// probe returned a non-primitive.
    #[error("Couldn't coerce a value to a primitive")]
    Coercion,

    /// Write to a read-only property or delete of an undeletable one.
    /// Logged by the operation and completed as a no-op; never unwinds.
    #[error("Property is protected from this operation")]
    PropertyDenied,

    /// A path needed to resolve to an object but did not.
    #[error("Target path {0:?} does not resolve to an object")]
    UnknownTarget(String),

    /// The call stack hit its depth limit. Aborts the current interpreter
    /// invocation only.
    #[error("Call stack depth limit of {0} exceeded")]
    CallStackOverflow(usize),

    /// Too many backward branches in one invocation. Aborts the current
    /// interpreter invocation only.
    #[error("Loop iteration limit of {0} exceeded")]
    ActionLimit(u32),

    /// An opcode needed more operands than the slice pushed. Repaired by
    /// synthesizing `undefined`; reported for diagnostics only.
    #[error("Operand stack underrun: {0} missing values")]
    StackUnderrun(usize),

    /// An action's declared length runs past the code buffer.
    #[error("Action length overflows the code buffer")]
    MalformedCode,

    /// An `InitAction` tag appeared in an ActionScript 3 movie. Fatal for
    /// the enclosing tag only.
    #[error("InitAction tag in an ActionScript 3 movie")]
    Parser,

    /// A value thrown by the `Throw` opcode, looking for a `Try` region.
    #[error("A value was thrown by ActionScript")]
    ThrownValue(Value),
}

impl Error {
    /// Whether the dispatch loop should abort its invocation over this
    /// error rather than let it propagate further.
    pub fn aborts_invocation(&self) -> bool {
        matches!(
            self,
            Error::CallStackOverflow(_) | Error::ActionLimit(_)
        )
    }
}
