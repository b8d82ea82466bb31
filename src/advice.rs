//! Advice dispatch for intercepted calls
//!
//! The host application (or whatever weaving mechanism it embeds) decides
//! *how* calls are physically intercepted; this module decides *what runs
//! around them*. A [`Hook`] declares its interception interest as a
//! static table (target types plus one [`CallShape`] per method
//! overload) and provides one canonical [`before`](Hook::before) and one
//! canonical [`after`](Hook::after). The [`Dispatcher`] matches an
//! occurring [`CallInvocation`] against every registered hook and drives
//! the advice around the original call.
//!
//! Design rules the dispatcher enforces:
//!
//! - **Total shape matching.** A binding matches only when the method
//!   name and the full parameter-kind tuple are equal. Overloaded
//!   signatures never partially match; an undeclared overload simply
//!   passes through uninstrumented.
//! - **Overload fan-in.** All declared overloads of a hook funnel into
//!   its single `before`/`after` pair; extra trailing arguments carry no
//!   instrumentation-relevant information.
//! - **Deterministic order.** Matching hooks run in registration order,
//!   for `before` and `after` alike.
//! - **Per-call state, not per-hook state.** Whatever `before` returns is
//!   threaded by the dispatcher into the matching `after` of the *same*
//!   invocation. Hooks stay immutable and can be shared across
//!   concurrent calls; storing a start timestamp in a hook field would
//!   race.
//! - **`after` always runs.** On normal return and on error alike, with
//!   the [`CallOutcome`] saying which. Modules that want to skip failed
//!   calls must do so explicitly and document it.

use crate::error::ConfigError;
use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

/// Declared parameter type of an intercepted method signature.
///
/// This mirrors the signatures of the statement/connection API being
/// wrapped: SQL text plus trailing key/index/name hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParamKind {
    /// A string parameter (the SQL text)
    Str,
    /// An integer parameter (e.g. a generated-keys flag)
    Int,
    /// An integer-array parameter (e.g. column indexes)
    IntList,
    /// A string-array parameter (e.g. column names)
    StrList,
}

impl ParamKind {
    fn label(&self) -> &'static str {
        match self {
            Self::Str => "str",
            Self::Int => "int",
            Self::IntList => "int[]",
            Self::StrList => "str[]",
        }
    }
}

/// One declared overload binding: method name plus the full parameter
/// shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallShape {
    /// Intercepted method name
    pub method: &'static str,
    /// Declared parameter kinds, in order
    pub params: &'static [ParamKind],
}

impl CallShape {
    /// Const constructor so binding tables can be `static`.
    pub const fn new(method: &'static str, params: &'static [ParamKind]) -> Self {
        Self { method, params }
    }

    /// Total match: method name and the complete parameter-kind tuple.
    fn matches(&self, call: &CallInvocation<'_>) -> bool {
        self.method == call.method
            && self.params.len() == call.args.len()
            && self
                .params
                .iter()
                .zip(call.args.iter())
                .all(|(param, arg)| *param == arg.kind())
    }

    fn render_params(&self) -> String {
        self.params
            .iter()
            .map(ParamKind::label)
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// A runtime argument of an intercepted call.
#[derive(Debug, Clone, Copy)]
pub enum CallArg<'a> {
    /// String value (the SQL text)
    Str(&'a str),
    /// Integer value
    Int(i64),
    /// Integer-array value
    IntList(&'a [i64]),
    /// String-array value
    StrList(&'a [&'a str]),
}

impl CallArg<'_> {
    /// The declared kind this argument matches.
    pub fn kind(&self) -> ParamKind {
        match self {
            Self::Str(_) => ParamKind::Str,
            Self::Int(_) => ParamKind::Int,
            Self::IntList(_) => ParamKind::IntList,
            Self::StrList(_) => ParamKind::StrList,
        }
    }

    /// The string value, if this is a string argument.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }
}

/// One intercepted call as reported by the host.
#[derive(Debug, Clone, Copy)]
pub struct CallInvocation<'a> {
    /// Target type the call was made on (e.g. `Statement`)
    pub target: &'a str,
    /// Method name (e.g. `executeQuery`)
    pub method: &'a str,
    /// Actual arguments
    pub args: &'a [CallArg<'a>],
}

impl<'a> CallInvocation<'a> {
    /// Describe one intercepted call.
    pub fn new(target: &'a str, method: &'a str, args: &'a [CallArg<'a>]) -> Self {
        Self {
            target,
            method,
            args,
        }
    }
}

/// How the original call ended, as seen by after-advice.
#[derive(Debug, Clone, Copy)]
pub enum CallOutcome<'a> {
    /// The original call returned normally
    Returned,
    /// The original call failed with this error
    Failed(&'a (dyn std::error::Error + 'static)),
}

impl CallOutcome<'_> {
    /// Whether the original call failed.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Per-invocation state threaded from before-advice to after-advice.
pub type CallState = Box<dyn Any + Send>;

/// An instrumentation module: declared interception interest plus one
/// canonical before/after pair.
pub trait Hook: Send + Sync {
    /// Target types this hook instruments.
    fn targets(&self) -> &'static [&'static str];

    /// Declared overload bindings. Every entry funnels into the same
    /// [`before`](Self::before)/[`after`](Self::after) pair.
    fn shapes(&self) -> &'static [CallShape];

    /// Runs immediately before the original call. The returned state is
    /// handed back to [`after`](Self::after) for this invocation only.
    fn before(&self, call: &CallInvocation<'_>) -> Option<CallState>;

    /// Runs immediately after the original call, on normal return and on
    /// failure alike.
    fn after(
        &self,
        call: &CallInvocation<'_>,
        state: Option<CallState>,
        outcome: &CallOutcome<'_>,
    );
}

/// Matches intercepted calls to registered hooks and drives their advice
/// around the original call.
pub struct Dispatcher {
    hooks: Vec<Arc<dyn Hook>>,
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl Dispatcher {
    /// Start declaring hooks.
    pub fn builder() -> DispatcherBuilder {
        DispatcherBuilder::default()
    }

    /// Run `original` with all matching advice around it.
    ///
    /// Every matching hook's `before` runs first (registration order),
    /// then the original call, then every matching hook's `after` in the
    /// same order. `after` runs regardless of whether the original call
    /// returned or failed; the error is passed through unchanged.
    pub fn around<T, E, F>(&self, call: &CallInvocation<'_>, original: F) -> Result<T, E>
    where
        F: FnOnce() -> Result<T, E>,
        E: std::error::Error + 'static,
    {
        let matched: Vec<&Arc<dyn Hook>> = self
            .hooks
            .iter()
            .filter(|hook| hook.targets().contains(&call.target))
            .filter(|hook| hook.shapes().iter().any(|shape| shape.matches(call)))
            .collect();

        if matched.is_empty() {
            tracing::debug!(
                target_type = call.target,
                method = call.method,
                "no advice bound for intercepted call"
            );
            return original();
        }

        let states: Vec<Option<CallState>> =
            matched.iter().map(|hook| hook.before(call)).collect();

        let result = original();

        let outcome = match &result {
            Ok(_) => CallOutcome::Returned,
            Err(err) => CallOutcome::Failed(err),
        };
        for (hook, state) in matched.iter().zip(states) {
            hook.after(call, state, &outcome);
        }

        result
    }

    /// Number of registered hooks.
    pub fn hook_count(&self) -> usize {
        self.hooks.len()
    }
}

/// Builder for [`Dispatcher`]. Bindings are validated once at `build`;
/// the dispatcher is immutable afterwards.
#[derive(Default)]
pub struct DispatcherBuilder {
    hooks: Vec<Arc<dyn Hook>>,
}

impl DispatcherBuilder {
    /// Register a hook. Registration order is invocation order.
    pub fn register(mut self, hook: Arc<dyn Hook>) -> Self {
        self.hooks.push(hook);
        self
    }

    /// Validate all declared bindings and build the dispatcher.
    ///
    /// # Errors
    ///
    /// [`ConfigError::AmbiguousBinding`] if one hook declares the same
    /// (method, parameter shape) twice: the canonical handler would run
    /// twice per call, which is never intended.
    pub fn build(self) -> crate::error::Result<Dispatcher> {
        for hook in &self.hooks {
            let mut seen: HashSet<CallShape> = HashSet::new();
            for shape in hook.shapes() {
                if !seen.insert(*shape) {
                    return Err(ConfigError::AmbiguousBinding {
                        target: hook.targets().join("|"),
                        method: shape.method.to_string(),
                        shape: shape.render_params(),
                    });
                }
            }
        }
        Ok(Dispatcher { hooks: self.hooks })
    }
}
