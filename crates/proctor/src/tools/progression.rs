//! `suggest_progression`: the agent signals that the candidate is ready to
//! move on. Pure acknowledgement; the caller decides what to do with it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::core::{Tool, ToolContext, ToolFuture, ToolKind, ToolOutput, parse_tool_args};
use super::names;
use super::spec::ToolSpec;
use crate::ToolDef;

#[derive(Debug, Clone, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionArgs {
    /// Why the candidate should progress.
    pub reason: String,
    /// Short summary of how the candidate has performed so far.
    pub performance_summary: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionOutput {
    pub acknowledged: bool,
    pub reason: String,
    pub performance_summary: String,
}

pub struct SuggestProgressionTool;

impl Tool for SuggestProgressionTool {
    fn kind(&self) -> ToolKind {
        ToolKind::SuggestProgression
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(
            names::SUGGEST_PROGRESSION,
            "Suggest that the candidate move on to the next stage of the interview",
        )
        .when_to_use("When the candidate has solved the current problem or clearly needs a change of pace")
        .when_not_to_use("To verify a solution; call run_tests first")
        .parameters_for::<ProgressionArgs>()
        .output_format("{acknowledged: true, reason, performanceSummary}")
        .to_tool_def()
    }

    fn execute<'a>(&'a self, ctx: &'a ToolContext, arguments: serde_json::Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: ProgressionArgs = parse_tool_args(arguments)?;
            info!(candidate = %ctx.candidate_id, "progression suggested: {}", args.reason);
            Ok(ToolOutput::SuggestProgression(ProgressionOutput {
                acknowledged: true,
                reason: args.reason,
                performance_summary: args.performance_summary,
            }))
        })
    }
}
