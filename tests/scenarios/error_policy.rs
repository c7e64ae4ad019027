//! Scenario: Broken source in development versus production
//!
//! Journey: a file fails to translate or throws while executing. Development
//! mode keeps the process alive on a stub module; production mode refuses.

use hotload::{HotloadError, RawEvent, RuntimeMode, Severity};
use serde_json::json;

use crate::common::*;

#[test]
fn scenario_dev_translation_error_stubs_the_module() {
    let env = TestEnv::new();
    env.write("src/good.ts", "export value: number = 1\n");
    let bad = env.write("src/bad.ts", "export value: number = 1\nerror type mismatch\n");
    let ctx = env.context(RuntimeMode::Development, false);

    let report = ctx.init().unwrap();
    assert_eq!(report.files, 2);
    assert_eq!(report.stubbed, 1);
    assert!(ctx.is_stubbed(&bad));

    let diagnostics = ctx.diagnostics(&bad);
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].severity, Severity::Error);
    assert_eq!(diagnostics[0].line, Some(2));
    assert!(diagnostics[0].message.contains("type mismatch"));

    let exports = ctx.require_path(&bad).unwrap();
    assert!(exports.keys().is_empty());
}

#[test]
fn scenario_dev_warnings_do_not_stub() {
    let env = TestEnv::new();
    let file = env.write("src/a.ts", "warn unused import\nexport value: number = 1\n");
    let ctx = env.context(RuntimeMode::Development, false);
    ctx.init().unwrap();

    assert!(!ctx.is_stubbed(&file));
    assert_eq!(ctx.diagnostics(&file).len(), 1);
    assert_eq!(ctx.require_path(&file).unwrap().get("value"), Some(json!(1)));
}

#[test]
fn scenario_prod_translation_error_aborts_init() {
    let env = TestEnv::new();
    env.write("src/bad.ts", "error type mismatch\n");
    let ctx = env.context(RuntimeMode::Production, false);

    let err = ctx.init().err().unwrap();
    assert!(matches!(err, HotloadError::Translation { .. }));
    assert!(err.to_string().contains("type mismatch"));
    assert_eq!(err.diagnostics().len(), 1);
    assert!(!ctx.is_initialized());
}

#[test]
fn scenario_dev_execution_failure_retries_with_stub() {
    let env = TestEnv::new();
    let file = env.write("src/a.ts", "export value: number = 1\nthrow boom\n");
    let ctx = env.context(RuntimeMode::Development, false);
    ctx.init().unwrap();
    assert!(!ctx.is_stubbed(&file));

    let exports = ctx.require_path(&file).unwrap();

    assert!(exports.keys().is_empty());
    assert_eq!(env.executor.executions(&file), 2);
    assert!(ctx.is_stubbed(&file));
    assert!(ctx.module_cache().contains(&file));
}

#[test]
fn scenario_prod_execution_failure_is_fatal() {
    let env = TestEnv::new();
    let file = env.write("src/a.ts", "throw boom\n");
    let ctx = env.context(RuntimeMode::Production, false);
    ctx.init().unwrap();

    let err = ctx.require_path(&file).err().unwrap();
    match err {
        HotloadError::Execution { path, message } => {
            assert_eq!(path, file);
            assert!(message.contains("boom"));
        }
        other => panic!("expected execution error, got {}", other),
    }
    assert_eq!(env.executor.executions(&file), 1);
    assert!(!ctx.module_cache().contains(&file));
}

#[test]
fn scenario_fixing_a_stubbed_module_reloads_real_code() {
    let env = TestEnv::new();
    let file = env.write("src/a.ts", "throw boom\n");
    let (ctx, log) = env.watching();

    let held = ctx.require_path(&file).unwrap();
    assert!(held.keys().is_empty());

    env.write("src/a.ts", "export value: number = 9\n");
    env.watch.send(RawEvent::changed(&file));
    ctx.process_pending().unwrap();
    assert!(ctx.is_reload_pending(&file));
    assert!(!ctx.is_stubbed(&file));

    ctx.require_path(&file).unwrap();
    assert_eq!(held.get("value"), Some(json!(9)));
    assert_eq!(log.names(), vec!["required-after a.ts", "changed a.ts"]);
}

#[test]
fn scenario_nested_failure_keeps_its_own_policy() {
    let env = TestEnv::new();
    env.write("src/dep.ts", "throw boom\n");
    let main = env.write("src/main.ts", "import dep from \"./dep\"\nexport value: number = 1\n");
    let ctx = env.context(RuntimeMode::Development, false);
    ctx.init().unwrap();

    // The dependency is stubbed, the importer runs normally
    let exports = ctx.require_path(&main).unwrap();
    assert_eq!(exports.get("value"), Some(json!(1)));
    assert_eq!(env.executor.executions(&main), 1);
    assert!(ctx.is_stubbed(&env.path("src/dep.ts")));
    assert!(!ctx.is_stubbed(&main));
}

#[test]
fn scenario_dev_missing_dependency_stubs_the_importer() {
    let env = TestEnv::new();
    let main = env.write(
        "src/main.ts",
        "import dep from \"./missing\"\nexport value: number = 1\n",
    );
    let ctx = env.context(RuntimeMode::Development, false);
    ctx.init().unwrap();

    let exports = ctx.require_path(&main).unwrap();

    assert!(exports.keys().is_empty());
    assert!(ctx.is_stubbed(&main));
    assert_eq!(env.executor.executions(&main), 2);
    assert!(ctx.module_cache().contains(&main));
}

#[test]
fn scenario_prod_missing_dependency_is_fatal() {
    let env = TestEnv::new();
    let main = env.write("src/main.ts", "import dep from \"./missing\"\n");
    let ctx = env.context(RuntimeMode::Production, false);
    ctx.init().unwrap();

    let err = ctx.require_path(&main).err().unwrap();
    assert!(matches!(err, HotloadError::ModuleNotFound { .. }));
    assert!(!ctx.is_stubbed(&main));
}

#[test]
fn scenario_dev_circular_require_stubs_the_inner_module() {
    let env = TestEnv::new();
    let a = env.write("src/a.ts", "import b from \"./b\"\nexport value: number = 1\n");
    let b = env.write("src/b.ts", "import a from \"./a\"\nexport value: number = 2\n");
    let ctx = env.context(RuntimeMode::Development, false);
    ctx.init().unwrap();

    let exports = ctx.require_path(&a).unwrap();

    // The cycle is cut at b; a runs its real code
    assert_eq!(exports.get("value"), Some(json!(1)));
    assert!(!ctx.is_stubbed(&a));
    assert!(ctx.is_stubbed(&b));
    assert_eq!(env.executor.executions(&a), 1);
    assert_eq!(env.executor.executions(&b), 2);
    assert!(ctx.require_path(&b).unwrap().keys().is_empty());
}
