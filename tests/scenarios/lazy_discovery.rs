//! Scenario: Loading files the startup scan never saw
//!
//! Journey: a file appears after boot (or lives outside the project root).
//! The first load compiles and executes it exactly once; afterwards it is an
//! ordinary member of the root set.

use hotload::{HotloadError, RuntimeMode};
use serde_json::json;

use crate::common::*;

#[test]
fn scenario_late_file_compiles_once_and_joins_root_set() {
    let env = TestEnv::new();
    env.write("src/main.ts", "export value: number = 1\n");
    let ctx = env.context(RuntimeMode::Development, false);
    let report = ctx.init().unwrap();
    assert_eq!(report.files, 1);

    let late = env.write("src/late.ts", "export value: number = 5\n");
    assert!(!ctx.root_set().contains(&late));
    let before = env.translator.translations();

    let exports = ctx.require("./src/late", None).unwrap();
    assert_eq!(exports.get("value"), Some(json!(5)));
    assert_eq!(env.executor.executions(&late), 1);
    assert_eq!(env.translator.translations(), before + 1);
    assert!(ctx.root_set().contains(&late));
    assert_eq!(ctx.version(&late), Some(0));

    // Cached from now on
    ctx.require("./src/late", None).unwrap();
    assert_eq!(env.executor.executions(&late), 1);
    assert_eq!(env.translator.translations(), before + 1);
}

#[test]
fn scenario_library_modules_are_never_wrapped() {
    let env = TestEnv::new();
    env.write("src/main.ts", "import lib from \"../vendor/lib\"\n");
    let lib = env.write("vendor/lib.ts", "export version: string = \"1.0\"\n");
    let (ctx, _log) = env.watching();

    // The library directory is not scanned
    assert!(!ctx.root_set().contains(&lib));

    let main = ctx.require("./src/main", None).unwrap();
    assert_eq!(main.call("lib", &[json!("version")]).unwrap(), json!("1.0"));
    assert!(ctx.hot_module(&env.path("src/main.ts")).is_some());
    assert!(ctx.hot_module(&lib).is_none());
}

#[test]
fn scenario_file_outside_root_is_loaded_but_not_wrapped() {
    let env = TestEnv::new();
    env.write("src/main.ts", "export value: number = 1\n");
    let outside = tempfile::tempdir().unwrap();
    let shared = outside.path().canonicalize().unwrap().join("shared.ts");
    std::fs::write(&shared, "export greeting: string = \"hi\"\n").unwrap();
    let (ctx, _log) = env.watching();

    let exports = ctx.require(shared.to_str().unwrap(), None).unwrap();

    assert_eq!(exports.get("greeting"), Some(json!("hi")));
    assert!(ctx.hot_module(&shared).is_none());
    assert!(ctx.root_set().contains(&shared));
}

#[test]
fn scenario_directory_request_resolves_index() {
    let env = TestEnv::new();
    let index = env.write("src/util/index.ts", "export value: number = 3\n");
    let ctx = env.context(RuntimeMode::Development, false);
    ctx.init().unwrap();

    let exports = ctx.require("./src/util", None).unwrap();
    assert_eq!(exports.get("value"), Some(json!(3)));
    assert_eq!(env.executor.executions(&index), 1);
}

#[test]
fn scenario_unresolvable_requests_fail_clearly() {
    let env = TestEnv::new();
    env.write("src/data.json", "{}");
    let ctx = env.context(RuntimeMode::Development, false);
    ctx.init().unwrap();

    let missing = ctx.require("./src/missing", None).err().unwrap();
    assert!(matches!(missing, HotloadError::ModuleNotFound { .. }));
    assert!(missing.to_string().contains("./src/missing"));

    let unsupported = ctx.require("./src/data.json", None).err().unwrap();
    assert!(matches!(unsupported, HotloadError::UnsupportedModule { .. }));
}

#[test]
fn scenario_circular_require_is_fatal_in_production() {
    let env = TestEnv::new();
    env.write("src/a.ts", "import b from \"./b\"\n");
    env.write("src/b.ts", "import a from \"./a\"\n");
    let ctx = env.context(RuntimeMode::Production, false);
    ctx.init().unwrap();

    let err = ctx.require("./src/a", None).err().unwrap();
    match err {
        HotloadError::CircularRequire { path } => assert_eq!(path, env.path("src/a.ts")),
        other => panic!("expected circular require, got {}", other),
    }

    // The failed chain leaves nothing half-loaded
    assert!(!ctx.module_cache().contains(&env.path("src/a.ts")));
    assert!(!ctx.module_cache().contains(&env.path("src/b.ts")));
}

#[test]
fn scenario_require_before_init_is_rejected() {
    let env = TestEnv::new();
    env.write("src/a.ts", "export value: number = 1\n");
    let ctx = env.context(RuntimeMode::Development, false);

    let err = ctx.require("./src/a", None).err().unwrap();
    assert!(matches!(err, HotloadError::NotInitialized));
}
