//! `run_tests`: execute the candidate's solution against their problem's
//! test cases. A thin adapter over [`TestHarness`].

use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;

use super::core::{Tool, ToolContext, ToolFuture, ToolKind, ToolOutput, parse_tool_args};
use super::names;
use super::spec::ToolSpec;
use crate::ToolDef;
use crate::harness::TestHarness;

#[derive(Debug, Clone, Default, Deserialize, JsonSchema)]
pub struct RunTestsArgs {
    /// File to test, relative to the workspace root. Defaults to
    /// `solution.<ext>` for the candidate's language.
    #[serde(default)]
    pub file: Option<String>,
}

pub struct RunTestsTool {
    harness: Arc<TestHarness>,
}

impl RunTestsTool {
    pub fn new(harness: Arc<TestHarness>) -> Self {
        Self { harness }
    }
}

impl Tool for RunTestsTool {
    fn kind(&self) -> ToolKind {
        ToolKind::RunTests
    }

    fn definition(&self) -> ToolDef {
        ToolSpec::builder(
            names::RUN_TESTS,
            "Run the candidate's current solution against the problem's test cases",
        )
        .when_to_use("To check whether the candidate's code is correct right now")
        .when_not_to_use("To look at the code; use search")
        .parameters_for::<RunTestsArgs>()
        .example(
            "run_tests()",
            r#"{"passed":1,"failed":0,"total":1,"results":[{"name":"test_add","passed":true,"output":"5","duration":12}]}"#,
        )
        .output_format(
            "{passed, failed, total, results: [{name, passed, output?, error?, duration?}]}; \
             hidden cases show only name, passed and duration",
        )
        .to_tool_def()
    }

    fn execute<'a>(&'a self, ctx: &'a ToolContext, arguments: serde_json::Value) -> ToolFuture<'a> {
        Box::pin(async move {
            let args: RunTestsArgs = parse_tool_args(arguments)?;
            let output = self
                .harness
                .run(&ctx.candidate_id, args.file.as_deref())
                .await?;
            Ok(ToolOutput::RunTests(output))
        })
    }
}
