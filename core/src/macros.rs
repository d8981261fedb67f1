//! Logging helpers with the stable diagnostic targets used across the VM.
//!
//! Every non-fatal error emits exactly one message under one of these
//! targets so hosts can filter them: `ascoding` (questionable ActionScript
//! the movie author wrote), `aserror` (runtime errors such as exceeded
//! limits), `malformedswf` (broken bytecode), `unimpl` (features we know
//! about but do not support), and `avm_trace` (the `trace()` output).

macro_rules! log_ascoding {
    ($($arg:tt)*) => (
        log::warn!(target: "ascoding", $($arg)*)
    )
}

macro_rules! log_aserror {
    ($($arg:tt)*) => (
        log::error!(target: "aserror", $($arg)*)
    )
}

macro_rules! log_malformed {
    ($($arg:tt)*) => (
        log::warn!(target: "malformedswf", $($arg)*)
    )
}

macro_rules! log_unimpl {
    ($($arg:tt)*) => (
        log::warn!(target: "unimpl", $($arg)*)
    )
}

macro_rules! avm_trace {
    ($($arg:tt)*) => (
        log::info!(target: "avm_trace", $($arg)*)
    )
}

#[cfg(feature = "avm_debug")]
macro_rules! avm_debug {
    ($($arg:tt)*) => (
        log::debug!($($arg)*)
    )
}

#[cfg(not(feature = "avm_debug"))]
macro_rules! avm_debug {
    ($($arg:tt)*) => {};
}
