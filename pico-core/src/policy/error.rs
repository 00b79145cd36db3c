#[cfg(feature = "use_backtrace")]
use backtrace::Backtrace;

use ValidationErrorKind::*;

use crate::chain::oracle;
use crate::prelude::*;

/// Kind of validation error
#[derive(Clone, Debug, PartialEq)]
pub enum ValidationErrorKind {
    /// A script could not be parsed, or a word was out of range
    ScriptFormat(String),
    /// A script didn't match the expected template, or a spend
    /// type does not apply to the template
    Mismatch(String),
    /// A decoded relative timelock exceeds the 16-bit sequence bound
    TimelockRange(String),
    /// A commitment quantity is not strictly greater than the transferred
    /// amount, or exceeds the deposit
    TransferQuantity(String),
    /// Neither role's key material is available for the operation
    UndefinedRole(String),
    /// A counterparty signature did not verify
    SignatureVerification(String),
    /// The confirmation oracle failed, a retry is possible
    OracleUnavailable(String),
    /// A required channel field is not populated yet
    MissingState(String),
    /// A persisted snapshot could not be decoded
    Snapshot(String),
}

// Explicit PartialEq which ignores backtrace.
impl PartialEq for ValidationError {
    fn eq(&self, other: &ValidationError) -> bool {
        self.kind == other.kind
    }
}

/// Validation error
#[derive(Clone)]
pub struct ValidationError {
    /// The kind of error
    pub kind: ValidationErrorKind,
    /// A non-resolved backtrace
    #[cfg(feature = "use_backtrace")]
    pub bt: Backtrace,
}

impl ValidationError {
    /// Resolve the backtrace for display to the user
    #[cfg(feature = "use_backtrace")]
    pub fn resolved_backtrace(&self) -> Backtrace {
        let mut mve = self.clone();
        mve.bt.resolve();
        mve.bt
    }

    /// True if the operation may succeed if retried later
    pub fn is_temporary(&self) -> bool {
        matches!(self.kind, OracleUnavailable(_))
    }

    /// Return a new ValidationError with the message prepended
    pub fn prepend_msg(&self, premsg: String) -> ValidationError {
        let modkind = match &self.kind {
            ScriptFormat(s0) => ScriptFormat(premsg + &s0),
            Mismatch(s0) => Mismatch(premsg + &s0),
            TimelockRange(s0) => TimelockRange(premsg + &s0),
            TransferQuantity(s0) => TransferQuantity(premsg + &s0),
            UndefinedRole(s0) => UndefinedRole(premsg + &s0),
            SignatureVerification(s0) => SignatureVerification(premsg + &s0),
            OracleUnavailable(s0) => OracleUnavailable(premsg + &s0),
            MissingState(s0) => MissingState(premsg + &s0),
            Snapshot(s0) => Snapshot(premsg + &s0),
        };
        ValidationError {
            kind: modkind,
            #[cfg(feature = "use_backtrace")]
            bt: self.bt.clone(),
        }
    }
}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        write!(f, "{:?}", self.kind)
    }
}

impl core::fmt::Debug for ValidationError {
    #[cfg(not(feature = "use_backtrace"))]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("ValidationError").field("kind", &self.kind).finish()
    }
    #[cfg(feature = "use_backtrace")]
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        f.debug_struct("ValidationError")
            .field("kind", &self.kind)
            .field("bt", &self.resolved_backtrace())
            .finish()
    }
}

impl std::error::Error for ValidationError {}

impl Into<String> for ValidationError {
    fn into(self) -> String {
        match self.kind {
            ScriptFormat(s) => "script format: ".to_string() + &s,
            Mismatch(s) => "script template mismatch: ".to_string() + &s,
            TimelockRange(s) => "timelock out of range: ".to_string() + &s,
            TransferQuantity(s) => "invalid transfer quantity: ".to_string() + &s,
            UndefinedRole(s) => "undefined role: ".to_string() + &s,
            SignatureVerification(s) => "signature verification failed: ".to_string() + &s,
            OracleUnavailable(s) => "oracle unavailable: ".to_string() + &s,
            MissingState(s) => "missing channel state: ".to_string() + &s,
            Snapshot(s) => "malformed snapshot: ".to_string() + &s,
        }
    }
}

impl From<oracle::Error> for ValidationError {
    fn from(e: oracle::Error) -> Self {
        oracle_unavailable_error(format!("{:?}", e))
    }
}

fn make_error(kind: ValidationErrorKind) -> ValidationError {
    ValidationError {
        kind,
        #[cfg(feature = "use_backtrace")]
        bt: Backtrace::new_unresolved(),
    }
}

pub(crate) fn script_format_error(msg: impl Into<String>) -> ValidationError {
    make_error(ScriptFormat(msg.into()))
}

pub(crate) fn mismatch_error(msg: impl Into<String>) -> ValidationError {
    make_error(Mismatch(msg.into()))
}

pub(crate) fn timelock_range_error(msg: impl Into<String>) -> ValidationError {
    make_error(TimelockRange(msg.into()))
}

pub(crate) fn transfer_quantity_error(msg: impl Into<String>) -> ValidationError {
    make_error(TransferQuantity(msg.into()))
}

pub(crate) fn undefined_role_error(msg: impl Into<String>) -> ValidationError {
    make_error(UndefinedRole(msg.into()))
}

pub(crate) fn signature_verification_error(msg: impl Into<String>) -> ValidationError {
    make_error(SignatureVerification(msg.into()))
}

pub(crate) fn oracle_unavailable_error(msg: impl Into<String>) -> ValidationError {
    make_error(OracleUnavailable(msg.into()))
}

pub(crate) fn missing_state_error(msg: impl Into<String>) -> ValidationError {
    make_error(MissingState(msg.into()))
}

pub(crate) fn snapshot_error(msg: impl Into<String>) -> ValidationError {
    make_error(Snapshot(msg.into()))
}

/// Return a script format error from the current function
#[doc(hidden)]
#[macro_export]
macro_rules! script_format_err {
	($($arg:tt)*) => (
            return Err($crate::policy::error::script_format_error(format!(
                "{}: {}",
                $crate::short_function!(),
                format!($($arg)*)
            )))
        )
}

/// Return a template mismatch error from the current function
#[doc(hidden)]
#[macro_export]
macro_rules! mismatch_err {
	($($arg:tt)*) => (
            return Err($crate::policy::error::mismatch_error(format!(
                "{}: {}",
                $crate::short_function!(),
                format!($($arg)*)
            )))
        )
}

/// Log and return a transfer quantity error from the current function
#[doc(hidden)]
#[macro_export]
macro_rules! transfer_quantity_err {
	($($arg:tt)*) => ({
            let msg = format!("{}: {}", $crate::short_function!(), format!($($arg)*));
            ::log::error!("INVALID TRANSFER QUANTITY: {}", &msg);
            return Err($crate::policy::error::transfer_quantity_error(msg))
        })
}

/// Return a missing state error from the current function
#[doc(hidden)]
#[macro_export]
macro_rules! missing_state_err {
	($($arg:tt)*) => (
            return Err($crate::policy::error::missing_state_error(format!(
                "{}: {}",
                $crate::short_function!(),
                format!($($arg)*)
            )))
        )
}
