// Copyright 2025 Hostlink Contributors
// SPDX-License-Identifier: Apache-2.0

//! Failure classification
//!
//! Maps a raw [`FailureDescriptor`](crate::environment::FailureDescriptor)
//! (kind, message, trace) onto a closed set of categories so downstream
//! automation can branch on a stable tag instead of parsing free-form text.
//! Rules are ordered and the first match wins: kind-based rules run before
//! substring heuristics, so a `RuntimeError` is never shadowed by an
//! incidental keyword in its message.

use serde::{Deserialize, Serialize};

use crate::environment::FailureDescriptor;

/// Closed set of failure categories
///
/// Serialized in snake_case on the wire, e.g. `undefined_reference`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Malformed source that never started executing
    Syntax,
    /// Reference to a name that does not exist
    UndefinedReference,
    /// Attribute known not to exist on the target object
    InvalidAttribute,
    /// Attribute access failed for another reason
    AttributeAccess,
    /// Callable invoked with wrong argument count or names
    WrongArgumentType,
    /// Value used as a callable when it is not one
    NotCallable,
    /// Operand or argument of an incompatible type
    TypeMismatch,
    /// Right type, unacceptable value
    InvalidValue,
    /// Key or index outside the valid range of a collection
    AccessOutOfRange,
    /// Operation attempted from a state where it is not permitted
    ContextInvalid,
    /// Handle to an environment object that has been freed
    EnvironmentFreedHandle,
    /// Environment API called incorrectly
    EnvironmentApiMisuse,
    /// Memory or recursion limits exceeded
    ResourceExhausted,
    /// A required module or symbol failed to load
    ImportFailure,
    /// Runtime failure tied to execution context restrictions
    RuntimeContext,
    /// Runtime failure with no more specific classification
    RuntimeGeneric,
    /// Division by zero and kin
    Arithmetic,
    /// Execution exceeded a time limit
    Timeout,
    /// Nothing matched
    Unknown,
}

impl ErrorCategory {
    /// Wire tag for this category, matching the serde representation.
    pub fn as_tag(&self) -> &'static str {
        match self {
            Self::Syntax => "syntax",
            Self::UndefinedReference => "undefined_reference",
            Self::InvalidAttribute => "invalid_attribute",
            Self::AttributeAccess => "attribute_access",
            Self::WrongArgumentType => "wrong_argument_type",
            Self::NotCallable => "not_callable",
            Self::TypeMismatch => "type_mismatch",
            Self::InvalidValue => "invalid_value",
            Self::AccessOutOfRange => "access_out_of_range",
            Self::ContextInvalid => "context_invalid",
            Self::EnvironmentFreedHandle => "environment_freed_handle",
            Self::EnvironmentApiMisuse => "environment_api_misuse",
            Self::ResourceExhausted => "resource_exhausted",
            Self::ImportFailure => "import_failure",
            Self::RuntimeContext => "runtime_context",
            Self::RuntimeGeneric => "runtime_generic",
            Self::Arithmetic => "arithmetic",
            Self::Timeout => "timeout",
            Self::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_tag())
    }
}

/// Classify a failure into exactly one category.
///
/// Rule order is significant. Kind-based rules come first; substring
/// heuristics over the message and trace only run for kinds with no
/// dedicated rule.
pub fn classify(failure: &FailureDescriptor) -> ErrorCategory {
    let kind = failure.kind.as_str();
    let message = failure.message.to_lowercase();
    let trace = failure.trace.to_lowercase();

    match kind {
        "SyntaxError" | "IndentationError" | "TabError" => return ErrorCategory::Syntax,
        "NameError" => return ErrorCategory::UndefinedReference,
        "AttributeError" => {
            if message.contains("has no attribute") {
                return ErrorCategory::InvalidAttribute;
            }
            return ErrorCategory::AttributeAccess;
        }
        "TypeError" => {
            if message.contains("argument") || message.contains("parameter") {
                return ErrorCategory::WrongArgumentType;
            }
            if message.contains("not callable") {
                return ErrorCategory::NotCallable;
            }
            return ErrorCategory::TypeMismatch;
        }
        "ValueError" => return ErrorCategory::InvalidValue,
        "KeyError" | "IndexError" => return ErrorCategory::AccessOutOfRange,
        _ => {}
    }

    if message.contains("context") || message.contains("poll") {
        return ErrorCategory::ContextInvalid;
    }

    if trace.contains("handle") {
        if message.contains("freed") || message.contains("invalid") {
            return ErrorCategory::EnvironmentFreedHandle;
        }
        if message.contains("operator") || message.contains("api") {
            return ErrorCategory::EnvironmentApiMisuse;
        }
    }

    match kind {
        "MemoryError" | "RecursionError" => return ErrorCategory::ResourceExhausted,
        "ImportError" | "ModuleNotFoundError" => return ErrorCategory::ImportFailure,
        "RuntimeError" => {
            // A context mention in the message was already caught above;
            // this only sees context restrictions surfaced via the trace.
            if trace.contains("context") {
                return ErrorCategory::RuntimeContext;
            }
            return ErrorCategory::RuntimeGeneric;
        }
        "ZeroDivisionError" => return ErrorCategory::Arithmetic,
        "TimeoutError" => return ErrorCategory::Timeout,
        _ => {}
    }

    ErrorCategory::Unknown
}

/// Fixed remediation hints for a category.
///
/// Every category has at least one hint so a failed response is always
/// actionable, even for `Unknown`.
pub fn remediation(category: ErrorCategory) -> &'static [&'static str] {
    match category {
        ErrorCategory::Syntax => &[
            "Check for missing colons, unbalanced brackets, or bad indentation",
            "Verify the reported line and the line just above it",
            "Make sure string literals are properly closed",
        ],
        ErrorCategory::UndefinedReference => &[
            "Check the spelling of the reported name",
            "Define the variable or function before its first use",
            "Verify required imports or setup ran earlier in the script",
        ],
        ErrorCategory::InvalidAttribute => &[
            "The named attribute does not exist on this object; check the spelling",
            "Inspect the object's available attributes before accessing them",
            "The attribute may only exist on a different object type",
        ],
        ErrorCategory::AttributeAccess => &[
            "Verify the object is initialized before accessing its attributes",
            "Check whether the value is None or otherwise not what you expect",
        ],
        ErrorCategory::WrongArgumentType => &[
            "Check the number and names of arguments against the callable's signature",
            "Supply all required arguments; remove any unexpected ones",
        ],
        ErrorCategory::NotCallable => &[
            "The value being called is not a function; remove the parentheses",
            "Check whether a variable shadowed a function of the same name",
        ],
        ErrorCategory::TypeMismatch => &[
            "Check the types of operands involved in the failing operation",
            "Convert values explicitly before combining them",
        ],
        ErrorCategory::InvalidValue => &[
            "The value is the right type but outside what the operation accepts",
            "Validate ranges and formats before passing values in",
        ],
        ErrorCategory::AccessOutOfRange => &[
            "Check that the key or index exists before accessing it",
            "Collection contents may differ from what the script assumes",
            "Guard lookups with an existence check",
        ],
        ErrorCategory::ContextInvalid => &[
            "The operation is not available from the current execution context",
            "Ensure required preconditions are established before this call",
        ],
        ErrorCategory::EnvironmentFreedHandle => &[
            "A handle to an environment object outlived the object itself",
            "Re-fetch the object by name instead of holding a stale handle",
        ],
        ErrorCategory::EnvironmentApiMisuse => &[
            "The environment API was called in an unsupported way",
            "Check the expected call sequence for this operation",
        ],
        ErrorCategory::ResourceExhausted => &[
            "Reduce the size of the data the script processes at once",
            "Check for unbounded recursion or accidental infinite loops",
        ],
        ErrorCategory::ImportFailure => &[
            "The named module is not available in the execution environment",
            "Remove the import or restrict the script to built-in modules",
        ],
        ErrorCategory::RuntimeContext => &[
            "The runtime refused the operation in the current context",
            "Defer the operation until the environment reaches a valid state",
        ],
        ErrorCategory::RuntimeGeneric => &[
            "Read the error message for the specific runtime condition",
            "Add logging around the failing section to narrow it down",
        ],
        ErrorCategory::Arithmetic => &[
            "Guard divisions against zero denominators",
            "Check computed values before using them as divisors",
        ],
        ErrorCategory::Timeout => &[
            "The script exceeded its execution time limit",
            "Split the work into smaller submissions",
            "Remove long sleeps or unbounded loops",
        ],
        ErrorCategory::Unknown => &[
            "Read the full error message and trace for details",
            "Simplify the script to isolate the failing operation",
            "Run the script one section at a time",
            "Check for environment-specific restrictions on the operation",
        ],
    }
}

/// Extract the failing line number from a trace.
///
/// Scans for the last `, line N` marker, which points at the deepest frame.
pub fn failure_line(trace: &str) -> Option<u32> {
    let mut found = None;
    let mut rest = trace;
    while let Some(idx) = rest.find(", line ") {
        let tail = &rest[idx + ", line ".len()..];
        let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
        if let Ok(n) = digits.parse::<u32>() {
            found = Some(n);
        }
        rest = tail;
    }
    found
}

/// Cut the section of source code around a failing line.
///
/// Shows two lines of context on each side with the failing line marked.
/// Line numbers are 1-based; out-of-range lines yield `None`.
pub fn problem_section(code: &str, line: u32) -> Option<String> {
    if line == 0 {
        return None;
    }
    let lines: Vec<&str> = code.lines().collect();
    let idx = (line - 1) as usize;
    if idx >= lines.len() {
        return None;
    }
    let start = idx.saturating_sub(2);
    let end = (idx + 3).min(lines.len());
    let mut out = String::new();
    for (i, text) in lines.iter().enumerate().take(end).skip(start) {
        let marker = if i == idx { ">>" } else { "  " };
        out.push_str(&format!("{} {:>4}: {}\n", marker, i + 1, text));
    }
    Some(out.trim_end().to_string())
}
