use std::cell::RefCell;

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{Context, JsResult, JsString, JsValue, NativeFunction, Source, js_string};

use crate::error::{PluginError, Result};
use crate::plugin::manifest::{PluginFile, PluginKind};
use crate::plugin::runtime::{ExecutionResult, ExecutionStrategy};

/// Output reported when a script neither defines `run` nor leaves a value behind.
pub const SCRIPT_EXECUTED: &str = "script executed";

const CONSOLE_METHODS: [&str; 5] = ["log", "info", "warn", "error", "debug"];

thread_local! {
    // Lines written through `console.*` by the script running on this thread.
    static CONSOLE: RefCell<Vec<String>> = const { RefCell::new(Vec::new()) };
}

/// Runs `.js` plugins in a fresh JavaScript context per call.
///
/// The whole file is evaluated first. If it defines a global `run` function,
/// that is called with no arguments and its return value becomes the output.
/// Otherwise the script's completion value is reported. Anything written
/// through `console` comes first in the output, one line per call.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmbeddedStrategy;

impl EmbeddedStrategy {
    fn failed(plugin: &PluginFile, diagnostic: String) -> PluginError {
        let output = join_output(CONSOLE.take(), Some(diagnostic.clone()));
        PluginError::ExecutionFailed {
            plugin: plugin.name(),
            detail: diagnostic,
            result: ExecutionResult::failed(output),
        }
    }
}

impl ExecutionStrategy for EmbeddedStrategy {
    fn kind(&self) -> PluginKind {
        PluginKind::Embedded
    }

    fn execute(&self, plugin: &PluginFile, _args: &[String]) -> Result<ExecutionResult> {
        let source = std::fs::read_to_string(&plugin.path).map_err(|source| {
            PluginError::ReadError {
                path: plugin.path.clone(),
                source,
            }
        })?;

        CONSOLE.take();
        let mut context = Context::default();
        install_console(&mut context).map_err(|err| Self::failed(plugin, err.to_string()))?;

        let completion = context
            .eval(Source::from_bytes(source.as_bytes()))
            .map_err(|err| Self::failed(plugin, err.to_string()))?;

        let entry = context
            .global_object()
            .get(js_string!("run"), &mut context)
            .map_err(|err| Self::failed(plugin, err.to_string()))?;

        let value = match entry.as_callable() {
            Some(run) => run
                .call(&JsValue::undefined(), &[], &mut context)
                .map_err(|err| Self::failed(plugin, err.to_string()))?,
            None => completion,
        };

        let printed = CONSOLE.take();

        if value.is_undefined() {
            if !printed.is_empty() {
                return Ok(ExecutionResult::succeeded(join_output(printed, None)));
            }
            if !entry.is_callable() {
                return Ok(ExecutionResult::succeeded(SCRIPT_EXECUTED));
            }
        }

        let value = value
            .to_string(&mut context)
            .map_err(|err| Self::failed(plugin, err.to_string()))?
            .to_std_string_escaped();

        Ok(ExecutionResult::succeeded(join_output(printed, Some(value))))
    }
}

/// Registers a global `console` whose methods append to [`CONSOLE`].
fn install_console(context: &mut Context) -> JsResult<()> {
    let mut console = ObjectInitializer::new(context);
    for method in CONSOLE_METHODS {
        console.function(
            NativeFunction::from_fn_ptr(console_write),
            JsString::from(method),
            0,
        );
    }
    let console = console.build();

    context.register_global_property(
        js_string!("console"),
        console,
        Attribute::WRITABLE | Attribute::CONFIGURABLE,
    )
}

fn console_write(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(arg.to_string(context)?.to_std_string_escaped());
    }
    CONSOLE.with_borrow_mut(|lines| lines.push(parts.join(" ")));
    Ok(JsValue::undefined())
}

fn join_output(mut lines: Vec<String>, last: Option<String>) -> String {
    lines.extend(last);
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn run_script(dir: &Path, body: &str) -> Result<ExecutionResult> {
        let path = dir.join("plugin.js");
        std::fs::write(&path, body).unwrap();
        EmbeddedStrategy.execute(&PluginFile::new(path), &[])
    }

    #[test]
    fn run_function_return_value_is_output() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_script(
            dir.path(),
            "// Greeter\nfunction run() { return 'hello ' + (40 + 2); }\n",
        )
        .unwrap();
        assert_eq!(result, ExecutionResult::succeeded("hello 42"));
    }

    #[test]
    fn run_return_value_is_stringified() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_script(dir.path(), "function run() { return [1, 2, 3]; }").unwrap();
        assert_eq!(result.output, "1,2,3");
    }

    #[test]
    fn run_returning_undefined_prints_undefined() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_script(dir.path(), "function run() {}").unwrap();
        assert_eq!(result.output, "undefined");
    }

    #[test]
    fn without_run_reports_completion_value() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_script(dir.path(), "var total = 2 * 21; total;").unwrap();
        assert_eq!(result.output, "42");

        let result = run_script(dir.path(), "var quiet = 1;").unwrap();
        assert_eq!(result.output, SCRIPT_EXECUTED);
    }

    #[test]
    fn each_run_gets_a_fresh_context() {
        let dir = tempfile::tempdir().unwrap();
        run_script(dir.path(), "function run() { return 'first'; }").unwrap();
        let result = run_script(dir.path(), "typeof run;").unwrap();
        assert_eq!(result.output, "undefined");
    }

    #[test]
    fn thrown_errors_become_execution_failures() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_script(dir.path(), "function run() { throw new Error('boom'); }")
            .unwrap_err();
        match err {
            PluginError::ExecutionFailed { result, .. } => {
                assert!(!result.succeeded);
                assert!(result.output.contains("boom"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn syntax_errors_become_execution_failures() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_script(dir.path(), "function (").unwrap_err();
        assert!(matches!(err, PluginError::ExecutionFailed { ref result, .. } if !result.output.is_empty()));
    }

    #[test]
    fn console_output_is_captured() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_script(dir.path(), "console.log('hello from plugin');").unwrap();
        assert_eq!(result, ExecutionResult::succeeded("hello from plugin"));

        let result = run_script(
            dir.path(),
            "console.info('count', 1 + 1);\nconsole.error('careful');\n",
        )
        .unwrap();
        assert_eq!(result.output, "count 2\ncareful");
    }

    #[test]
    fn console_lines_precede_run_return_value() {
        let dir = tempfile::tempdir().unwrap();
        let result = run_script(
            dir.path(),
            "function run() { console.log('working'); return 'done'; }",
        )
        .unwrap();
        assert_eq!(result.output, "working\ndone");

        let result = run_script(dir.path(), "function run() { console.log('only'); }").unwrap();
        assert_eq!(result.output, "only");
    }

    #[test]
    fn console_lines_survive_a_throw() {
        let dir = tempfile::tempdir().unwrap();
        let err = run_script(
            dir.path(),
            "function run() { console.log('before'); throw new Error('boom'); }",
        )
        .unwrap_err();
        let output = err.captured_output().unwrap_or_default().to_string();
        assert!(output.starts_with("before\n"));
        assert!(output.contains("boom"));
    }

    #[test]
    fn missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let plugin = PluginFile::new(dir.path().join("absent.js"));
        let err = EmbeddedStrategy.execute(&plugin, &[]).unwrap_err();
        assert!(matches!(err, PluginError::ReadError { .. }));
    }
}
