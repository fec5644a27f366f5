//! Callback dispatcher for lifecycle events.
//!
//! # Responsibility
//! - Resolve the handler of one event, apply the required/optional policy of
//!   the calling operation, call the handler and check its result shape.
//! - Forward native value to payable handlers.
//!
//! # Invariants
//! - The handler is resolved once; reentrant registry changes made by the
//!   handler only affect later dispatches.
//! - Dispatch never writes registry tables.
//! - A handler's revert reason reaches the caller unmodified.

use crate::extension::envelope::run_discarding;
use crate::extension::error::{CoreError, CoreResult};
use crate::extension::host::CallContext;
use crate::extension::kernel::ModularCore;
use crate::model::address::Address;
use crate::model::event::{EventSpec, HandlerMode};
use crate::model::hook::{CallEnv, HookArgs, HookOutput};
use log::{debug, warn};

/// Result of one dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Optional event without a handler; no call was made.
    Skipped,
    Handled { handler: Address, output: HookOutput },
}

impl DispatchOutcome {
    pub fn output(&self) -> Option<&HookOutput> {
        match self {
            Self::Skipped => None,
            Self::Handled { output, .. } => Some(output),
        }
    }

    pub fn handler(&self) -> Option<Address> {
        match self {
            Self::Skipped => None,
            Self::Handled { handler, .. } => Some(*handler),
        }
    }
}

/// Routes lifecycle events of one core to installed handlers.
pub struct CallbackDispatcher<'a, 'conn> {
    core: &'a ModularCore<'conn>,
}

impl<'a, 'conn> CallbackDispatcher<'a, 'conn> {
    pub(crate) fn new(core: &'a ModularCore<'conn>) -> Self {
        Self { core }
    }

    /// Dispatches one state-changing event inside the caller's envelope.
    ///
    /// Any attached value moves from the caller to the core, then on to the
    /// handler of a payable event.
    pub fn dispatch(&self, env: CallEnv, args: HookArgs) -> CoreResult<DispatchOutcome> {
        let spec = self.core.spec_for(args.kind())?;
        if env.value > 0 {
            if !spec.payable {
                return Err(CoreError::NonPayableEvent(spec.event));
            }
            self.core
                .move_native(&env.caller, &self.core.address(), env.value)?;
        }
        self.call(spec, env, &args, false)
    }

    /// Dispatches one view event; every write it causes is discarded.
    pub fn dispatch_view(&self, args: HookArgs) -> CoreResult<DispatchOutcome> {
        let spec = self.core.spec_for(args.kind())?;
        run_discarding(self.core.conn(), || {
            self.call(spec, CallEnv::new(Address::ZERO), &args, true)
        })
    }

    fn call(
        &self,
        spec: &EventSpec,
        env: CallEnv,
        args: &HookArgs,
        read_only: bool,
    ) -> CoreResult<DispatchOutcome> {
        let Some(entry) = self.core.registry().handler_of(spec.event)? else {
            return match spec.mode {
                HandlerMode::Required => {
                    warn!(
                        "event=hook_dispatch module=dispatch status=error kind={} error_code=required_hook_missing",
                        spec.kind.as_str()
                    );
                    Err(CoreError::RequiredHookMissing(spec.event))
                }
                HandlerMode::Optional => {
                    debug!(
                        "event=hook_dispatch module=dispatch status=ok kind={} outcome=skipped",
                        spec.kind.as_str()
                    );
                    Ok(DispatchOutcome::Skipped)
                }
            };
        };

        let handler = entry.handler;
        let code = self
            .core
            .host()
            .code_at(&handler)
            .ok_or(CoreError::NoExtensionCode(handler))?;

        let forwarded = if spec.payable { env.value } else { 0 };
        if forwarded > 0 {
            self.core
                .move_native(&self.core.address(), &handler, forwarded)?;
        }

        let ctx = CallContext::new(self.core, handler, env.caller, forwarded, read_only);
        let output = code
            .handle_hook(&ctx, spec.event, args)
            .map_err(|revert| {
                debug!(
                    "event=hook_dispatch module=dispatch status=error kind={} handler={} error_code=handler_reverted",
                    spec.kind.as_str(),
                    handler
                );
                CoreError::HandlerCallFailed {
                    handler,
                    reason: revert.reason,
                }
            })?;

        if !output.fits(spec.kind) {
            return Err(CoreError::MalformedHandlerResult {
                handler,
                event: spec.event,
            });
        }
        debug!(
            "event=hook_dispatch module=dispatch status=ok kind={} handler={} outcome=handled",
            spec.kind.as_str(),
            handler
        );
        Ok(DispatchOutcome::Handled { handler, output })
    }
}
