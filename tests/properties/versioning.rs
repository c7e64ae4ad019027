//! Property tests for per-path versioning and watch-mode idempotence.

use proptest::prelude::*;

use std::sync::Arc;

use hotload::{ContentTypeResolver, IncrementalCompiler, RawEvent};
use serde_json::json;

use crate::common::*;

fn source(value: u8) -> String {
    format!("export value: number = {}\n", value)
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 32,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Every observed change bumps the version by one; only content
    /// changes translate, emit `changed` and re-execute.
    #[test]
    fn property_versions_track_observed_changes(
        edits in proptest::collection::vec(proptest::option::of(0u8..4), 1..12),
    ) {
        let env = TestEnv::new();
        let a = env.write("src/a.ts", &source(0));
        let (ctx, log) = env.watching();
        ctx.require_path(&a).unwrap();
        log.clear();

        let mut current = 0u8;
        let mut content_changes = 0usize;
        let translations = env.translator.translations();

        for (step, edit) in edits.iter().enumerate() {
            // None: saved without touching the content
            if let Some(value) = edit {
                env.write("src/a.ts", &source(*value));
                if *value != current {
                    content_changes += 1;
                    current = *value;
                }
            }
            env.watch.send(RawEvent::changed(&a));
            ctx.process_pending().unwrap();

            prop_assert_eq!(ctx.version(&a), Some(step as u64 + 1));
            let exports = ctx.require_path(&a).unwrap();
            prop_assert_eq!(exports.get("value"), Some(json!(current)));
        }

        prop_assert_eq!(log.names().len(), content_changes);
        prop_assert!(log.names().iter().all(|name| name == "changed a.ts"));
        prop_assert_eq!(env.translator.translations(), translations + content_changes);
        prop_assert_eq!(env.executor.executions(&a), 1 + content_changes);
    }

    /// PROPERTY: Without watching, unchanged content is translated again on
    /// every compile.
    #[test]
    fn property_unwatched_compiles_are_never_skipped(compiles in 1usize..5) {
        let env = TestEnv::new();
        let a = env.write("src/a.ts", &source(1));
        let mut resolver = ContentTypeResolver::new(&env.root);
        resolver.register_extension("ts", env.translator.clone()).unwrap();
        let mut compiler = IncrementalCompiler::new(
            Arc::new(resolver),
            hotload::RuntimeMode::Development,
            false,
        );

        compiler.prime(&[a.clone()]).unwrap();
        for _ in 0..compiles {
            let outcome = compiler.compile(&a).unwrap();
            prop_assert!(outcome.recompiled);
            prop_assert!(!outcome.output_changed);
        }

        prop_assert_eq!(env.translator.translations(), 1 + compiles);
    }
}
