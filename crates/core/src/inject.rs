//! Identity injection for tool calls.
//!
//! Every tool invocation, whether planned or model-initiated, goes
//! through [`invoke_with_identity`]. The caller's identity comes from
//! [`CallerContext`] alone; any identity-looking argument supplied by
//! the planner or the model is discarded before the call. When a tool's
//! schema spells the identity parameter differently, the known alias
//! spellings are probed in order until one is accepted.

use crate::tool::{Args, BankingTool, ToolError, CUSTOMER_ALIASES};
use crate::types::{CallerContext, ToolReply};
use std::time::Duration;
use tracing::{debug, info, warn};

async fn attempt(tool: &dyn BankingTool, args: Args, timeout_ms: u64) -> Result<ToolReply, ToolError> {
    match tokio::time::timeout(Duration::from_millis(timeout_ms), tool.call(args)).await {
        Ok(Ok(out)) => Ok(out.into()),
        Ok(Err(e)) => Err(e),
        Err(_) => Err(ToolError::Timeout(timeout_ms)),
    }
}

/// Invoke a tool with the caller's identity injected.
///
/// Always resolves to a [`ToolReply`]; failures are folded into
/// `ToolReply::Error` rather than propagated.
pub async fn invoke_with_identity(
    tool: &dyn BankingTool,
    mut args: Args,
    ctx: &CallerContext,
    timeout_ms: u64,
) -> ToolReply {
    // Upstream-supplied identity is never trusted.
    for alias in CUSTOMER_ALIASES {
        if args.remove(alias).is_some() {
            warn!(
                tool = tool.name(),
                alias,
                "discarded caller-supplied identity argument"
            );
        }
    }

    let params = tool.param_names();
    let accepts_identity = CUSTOMER_ALIASES.iter().any(|a| params.iter().any(|p| p == a));

    if !accepts_identity {
        // Identity-free tool: exactly one call, no probing.
        debug!(tool = tool.name(), keys = ?crate::redact::arg_keys(&args), "tool call");
        return match attempt(tool, args, timeout_ms).await {
            Ok(reply) => reply,
            Err(e) => {
                info!(tool = tool.name(), error = %e, "tool call failed");
                ToolReply::Error(e)
            }
        };
    }

    let mut last_err = None;
    for alias in CUSTOMER_ALIASES {
        let mut attempt_args = args.clone();
        attempt_args.insert(alias.to_owned(), serde_json::json!(ctx.customer_id));
        debug!(
            tool = tool.name(),
            alias,
            keys = ?crate::redact::arg_keys(&attempt_args),
            "tool call attempt"
        );
        match attempt(tool, attempt_args, timeout_ms).await {
            Ok(reply) => return reply,
            Err(ToolError::SchemaMismatch(param)) => {
                debug!(tool = tool.name(), alias, rejected = %param, "alias rejected, trying next");
                last_err = Some(ToolError::SchemaMismatch(param));
            }
            // Anything other than a schema mismatch is a real answer;
            // retrying with another spelling cannot change it.
            Err(e) => {
                info!(tool = tool.name(), alias, error = %e, "tool call failed");
                return ToolReply::Error(e);
            }
        }
    }

    // Every spelling rejected: one final try without identity, then
    // surface the failure.
    match attempt(tool, args, timeout_ms).await {
        Ok(reply) => reply,
        Err(e) => {
            // The final attempt's own failure class wins unless it is
            // yet another schema mismatch, which says nothing new.
            let err = match e {
                ToolError::SchemaMismatch(param) => {
                    last_err.unwrap_or(ToolError::SchemaMismatch(param))
                }
                other => other,
            };
            warn!(tool = tool.name(), error = %err, "all identity spellings rejected");
            ToolReply::Error(err)
        }
    }
}
