//! Script runtimes.
//!
//! The pipeline treats a script invocation as an opaque, synchronous call
//! with no retry and no timeout. Three runtimes are provided:
//!
//! - [`CommandRuntime`]: runs an external command, JSON in on stdin, a
//!   [`HookResult`] JSON object out on stdout
//! - [`InProcessRuntime`]: named Rust closures, including the built-ins
//! - [`LayeredRuntime`]: `builtin:` references in-process, everything else
//!   as a command

use super::context::ExecutionContext;
use super::types::HookResult;
use crate::error::PromptfanError;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::path::PathBuf;
use std::process::{Command, Stdio};
use thiserror::Error;
use tracing::debug;

/// Prefix that routes a script reference to the in-process runtime.
pub const BUILTIN_PREFIX: &str = "builtin:";

/// Maximum number of output lines kept in a failure message.
pub const FAILURE_OUTPUT_MAX_LINES: usize = 50;

/// Maximum total characters kept in a failure message.
pub const FAILURE_OUTPUT_MAX_CHARS: usize = 4096;

/// Why a script invocation produced no [`HookResult`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ScriptFailure {
    /// The script could not be found, parsed, or started.
    #[error("script '{script}' is unavailable: {reason}")]
    Unavailable { script: String, reason: String },

    /// The script started but raised instead of returning a result.
    #[error("script '{script}' raised: {message}")]
    Raised { script: String, message: String },
}

impl From<ScriptFailure> for PromptfanError {
    fn from(failure: ScriptFailure) -> Self {
        match failure {
            ScriptFailure::Unavailable { .. } => {
                PromptfanError::ScriptInfrastructure(failure.to_string())
            }
            ScriptFailure::Raised { .. } => PromptfanError::Hook(failure.to_string()),
        }
    }
}

/// Executes a script reference against a context.
pub trait ScriptRuntime {
    fn invoke(
        &self,
        script: &str,
        ctx: &ExecutionContext,
        params: &Value,
    ) -> Result<HookResult, ScriptFailure>;
}

// ============================================================================
// In-process scripts
// ============================================================================

/// Signature of an in-process script. An `Err` counts as a raised failure.
pub type ScriptFn = dyn Fn(&ExecutionContext, &Value) -> anyhow::Result<HookResult>;

/// Registry of named Rust closures.
#[derive(Default)]
pub struct InProcessRuntime {
    scripts: HashMap<String, Box<ScriptFn>>,
}

impl InProcessRuntime {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runtime preloaded with `builtin:echo` and `builtin:skip`.
    pub fn with_builtins() -> Self {
        let mut runtime = Self::new();
        runtime.register(format!("{}echo", BUILTIN_PREFIX), |ctx, _| {
            Ok(HookResult::success_with(json!(ctx.prompt)))
        });
        runtime.register(format!("{}skip", BUILTIN_PREFIX), |_, params| {
            let reason = params
                .get("reason")
                .and_then(Value::as_str)
                .unwrap_or("skipped by builtin:skip");
            Ok(HookResult::skip(reason))
        });
        runtime
    }

    pub fn register<F>(&mut self, name: impl Into<String>, script: F)
    where
        F: Fn(&ExecutionContext, &Value) -> anyhow::Result<HookResult> + 'static,
    {
        self.scripts.insert(name.into(), Box::new(script));
    }

    pub fn contains(&self, name: &str) -> bool {
        self.scripts.contains_key(name)
    }
}

impl ScriptRuntime for InProcessRuntime {
    fn invoke(
        &self,
        script: &str,
        ctx: &ExecutionContext,
        params: &Value,
    ) -> Result<HookResult, ScriptFailure> {
        let f = self
            .scripts
            .get(script)
            .ok_or_else(|| ScriptFailure::Unavailable {
                script: script.to_string(),
                reason: "no script registered under this name".to_string(),
            })?;

        match panic::catch_unwind(AssertUnwindSafe(|| f(ctx, params))) {
            Ok(Ok(result)) => Ok(result),
            Ok(Err(err)) => Err(ScriptFailure::Raised {
                script: script.to_string(),
                message: format!("{:#}", err),
            }),
            Err(payload) => Err(ScriptFailure::Raised {
                script: script.to_string(),
                message: panic_message(payload.as_ref()),
            }),
        }
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panicked: {}", s)
    } else {
        "panicked".to_string()
    }
}

// ============================================================================
// External commands
// ============================================================================

/// Runs scripts as external commands (shell-words parsed; no shell).
#[derive(Debug, Clone)]
pub struct CommandRuntime {
    workdir: PathBuf,
}

impl CommandRuntime {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }
}

impl ScriptRuntime for CommandRuntime {
    fn invoke(
        &self,
        script: &str,
        ctx: &ExecutionContext,
        params: &Value,
    ) -> Result<HookResult, ScriptFailure> {
        let unavailable = |reason: String| ScriptFailure::Unavailable {
            script: script.to_string(),
            reason,
        };
        let raised = |message: String| ScriptFailure::Raised {
            script: script.to_string(),
            message,
        };

        let args = shell_words::split(script.trim()).map_err(|e| {
            unavailable(format!(
                "failed to parse command: {}\nFix: check for unmatched quotes or invalid escape sequences.",
                e
            ))
        })?;
        let Some((program, cmd_args)) = args.split_first() else {
            return Err(unavailable("command is empty".to_string()));
        };

        let payload = serde_json::to_vec(&json!({ "context": ctx, "params": params }))
            .map_err(|e| raised(format!("failed to serialize script input: {}", e)))?;

        debug!(script, workdir = %self.workdir.display(), "spawning script");
        let mut child = Command::new(program)
            .args(cmd_args)
            .current_dir(&self.workdir)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| {
                unavailable(format!(
                    "failed to execute command: {}\nFix: ensure the command is installed and in PATH.",
                    e
                ))
            })?;

        // stdin is fed from its own thread while stdout drains.
        let writer = child.stdin.take().map(|mut stdin| {
            std::thread::spawn(move || {
                // Scripts may exit without reading their input.
                let _ = stdin.write_all(&payload);
            })
        });

        let output = child
            .wait_with_output()
            .map_err(|e| raised(format!("failed to wait for command: {}", e)))?;
        if let Some(writer) = writer {
            let _ = writer.join();
        }

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).to_string();

        if !output.status.success() {
            let exit_code = output.status.code().unwrap_or(-1);
            let combined = if stderr.is_empty() {
                stdout
            } else {
                format!("{}\n{}", stdout, stderr)
            };
            let mut msg = format!("command failed with exit code {}", exit_code);
            let truncated =
                truncate_output(&combined, FAILURE_OUTPUT_MAX_LINES, FAILURE_OUTPUT_MAX_CHARS);
            if !truncated.trim().is_empty() {
                msg.push_str("\nOutput (truncated):\n");
                msg.push_str(&truncated);
            }
            return Err(raised(msg));
        }

        parse_hook_result(&stdout).ok_or_else(|| {
            raised(format!(
                "output is not a hook result object\nOutput (truncated):\n{}",
                truncate_output(&stdout, FAILURE_OUTPUT_MAX_LINES, FAILURE_OUTPUT_MAX_CHARS)
            ))
        })
    }
}

/// Parse stdout as a result; fall back to its last non-empty line so
/// scripts may print progress before the result.
fn parse_hook_result(stdout: &str) -> Option<HookResult> {
    if let Ok(result) = serde_json::from_str(stdout.trim()) {
        return Some(result);
    }
    let last = stdout.lines().rev().find(|l| !l.trim().is_empty())?;
    serde_json::from_str(last.trim()).ok()
}

fn truncate_output(output: &str, max_lines: usize, max_chars: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    let relevant_lines: Vec<&str> = if lines.len() > max_lines {
        lines[lines.len() - max_lines..].to_vec()
    } else {
        lines
    };

    let mut result = relevant_lines.join("\n");

    if result.len() > max_chars {
        let mut cut = result.len() - max_chars;
        while !result.is_char_boundary(cut) {
            cut += 1;
        }
        result = format!("...(truncated)...\n{}", &result[cut..]);
    }

    result
}

// ============================================================================
// Routing
// ============================================================================

/// Routes `builtin:` references in-process and the rest to commands.
pub struct LayeredRuntime {
    builtins: InProcessRuntime,
    commands: CommandRuntime,
}

impl LayeredRuntime {
    pub fn new(builtins: InProcessRuntime, commands: CommandRuntime) -> Self {
        Self { builtins, commands }
    }

    /// Built-ins plus commands run from `workdir`.
    pub fn for_project(workdir: impl Into<PathBuf>) -> Self {
        Self::new(InProcessRuntime::with_builtins(), CommandRuntime::new(workdir))
    }
}

impl ScriptRuntime for LayeredRuntime {
    fn invoke(
        &self,
        script: &str,
        ctx: &ExecutionContext,
        params: &Value,
    ) -> Result<HookResult, ScriptFailure> {
        if script.starts_with(BUILTIN_PREFIX) {
            self.builtins.invoke(script, ctx, params)
        } else {
            self.commands.invoke(script, ctx, params)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::HookStatus;
    use tempfile::TempDir;

    fn ctx() -> ExecutionContext {
        ExecutionContext::for_block("job", "0", 0, None).for_composition(
            3,
            Default::default(),
            "a formal note".to_string(),
        )
    }

    #[test]
    fn test_builtin_echo_returns_prompt() {
        let runtime = InProcessRuntime::with_builtins();
        let result = runtime.invoke("builtin:echo", &ctx(), &Value::Null).unwrap();
        assert_eq!(result.status, HookStatus::Success);
        assert_eq!(result.data, json!("a formal note"));
    }

    #[test]
    fn test_builtin_skip_uses_reason_param() {
        let runtime = InProcessRuntime::with_builtins();
        let result = runtime
            .invoke("builtin:skip", &ctx(), &json!({"reason": "not today"}))
            .unwrap();
        assert_eq!(result.status, HookStatus::Skip);
        assert_eq!(result.message.as_deref(), Some("not today"));
    }

    #[test]
    fn test_unknown_in_process_script_is_unavailable() {
        let runtime = InProcessRuntime::new();
        let err = runtime.invoke("nope", &ctx(), &Value::Null).unwrap_err();
        assert!(matches!(err, ScriptFailure::Unavailable { .. }));
        assert!(matches!(
            PromptfanError::from(err),
            PromptfanError::ScriptInfrastructure(_)
        ));
    }

    #[test]
    fn test_in_process_error_is_raised() {
        let mut runtime = InProcessRuntime::new();
        runtime.register("boom", |_, _| anyhow::bail!("disk full"));
        let err = runtime.invoke("boom", &ctx(), &Value::Null).unwrap_err();
        assert_eq!(
            err,
            ScriptFailure::Raised {
                script: "boom".to_string(),
                message: "disk full".to_string()
            }
        );
    }

    #[test]
    fn test_in_process_panic_is_raised() {
        let mut runtime = InProcessRuntime::new();
        runtime.register("panics", |_, _| panic!("bad state"));
        let err = runtime.invoke("panics", &ctx(), &Value::Null).unwrap_err();
        match err {
            ScriptFailure::Raised { message, .. } => assert!(message.contains("bad state")),
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[test]
    fn test_command_result_is_parsed_from_stdout() {
        let temp = TempDir::new().unwrap();
        let runtime = CommandRuntime::new(temp.path());
        let script = r#"sh -c 'cat >/dev/null; echo progress; echo "{\"status\":\"success\",\"data\":42}"'"#;
        let result = runtime.invoke(script, &ctx(), &Value::Null).unwrap();
        assert_eq!(result.status, HookResult::success().status);
        assert_eq!(result.data, json!(42));
    }

    #[test]
    fn test_command_receives_context_on_stdin() {
        let temp = TempDir::new().unwrap();
        let runtime = CommandRuntime::new(temp.path());
        // Echo stdin back as the data field.
        let script = r#"sh -c 'printf "{\"status\":\"success\",\"data\":"; cat; printf "}"'"#;
        let result = runtime
            .invoke(script, &ctx(), &json!({"steps": 20}))
            .unwrap();
        assert_eq!(result.data["context"]["composition_id"], 3);
        assert_eq!(result.data["context"]["prompt"], "a formal note");
        assert_eq!(result.data["params"]["steps"], 20);
    }

    #[test]
    fn test_command_nonzero_exit_is_raised() {
        let temp = TempDir::new().unwrap();
        let runtime = CommandRuntime::new(temp.path());
        let err = runtime
            .invoke("sh -c 'echo nope >&2; exit 3'", &ctx(), &Value::Null)
            .unwrap_err();
        match err {
            ScriptFailure::Raised { message, .. } => {
                assert!(message.contains("exit code 3"));
                assert!(message.contains("nope"));
            }
            other => panic!("unexpected failure: {:?}", other),
        }
    }

    #[test]
    fn test_command_garbage_output_is_raised() {
        let temp = TempDir::new().unwrap();
        let runtime = CommandRuntime::new(temp.path());
        let err = runtime
            .invoke("echo not-json", &ctx(), &Value::Null)
            .unwrap_err();
        assert!(matches!(err, ScriptFailure::Raised { .. }));
    }

    #[test]
    fn test_missing_command_is_unavailable() {
        let temp = TempDir::new().unwrap();
        let runtime = CommandRuntime::new(temp.path());
        let err = runtime
            .invoke("definitely-not-a-real-binary-xyz", &ctx(), &Value::Null)
            .unwrap_err();
        assert!(matches!(err, ScriptFailure::Unavailable { .. }));
    }

    #[test]
    fn test_layered_runtime_routes_by_prefix() {
        let temp = TempDir::new().unwrap();
        let runtime = LayeredRuntime::for_project(temp.path());
        let echoed = runtime.invoke("builtin:echo", &ctx(), &Value::Null).unwrap();
        assert_eq!(echoed.data, json!("a formal note"));

        let missing = runtime
            .invoke("builtin:unknown", &ctx(), &Value::Null)
            .unwrap_err();
        assert!(matches!(missing, ScriptFailure::Unavailable { .. }));
    }

    #[test]
    fn test_truncate_output_keeps_tail() {
        let output = (0..100).map(|i| i.to_string()).collect::<Vec<_>>().join("\n");
        let truncated = truncate_output(&output, 3, 4096);
        assert_eq!(truncated, "97\n98\n99");
    }
}
