//! Property tests for transformer pipeline composition.

use proptest::prelude::*;

use hotload::{PatternSet, Phase, TransformerDescriptor, TransformerPipeline};
use tempfile::TempDir;

fn phase_strategy() -> impl Strategy<Value = Phase> {
    prop_oneof![
        Just(Phase::Before),
        Just(Phase::After),
        Just(Phase::AfterDeclarations),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// PROPERTY: Within a phase, transformers run by ascending priority and
    /// ties keep registration order. Resolving again yields the same order.
    #[test]
    fn property_phase_order_is_priority_then_registration(
        builtins in proptest::collection::vec((phase_strategy(), 0u32..100), 0..10),
    ) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let mut pipeline =
            TransformerPipeline::new(root, PatternSet::empty(root), PatternSet::empty(root));
        for (index, (phase, priority)) in builtins.iter().enumerate() {
            pipeline
                .register_builtin(
                    TransformerDescriptor::new(*phase, format!("t{}", index), |t, _| {
                        Ok(t.to_string())
                    })
                    .with_priority(*priority),
                )
                .unwrap();
        }

        let first = pipeline.resolve_pipeline().unwrap();
        let second = pipeline.resolve_pipeline().unwrap();
        prop_assert_eq!(first.len(), builtins.len());

        for phase in Phase::ALL {
            let mut expected: Vec<(u32, usize)> = builtins
                .iter()
                .enumerate()
                .filter(|(_, (p, _))| *p == phase)
                .map(|(index, (_, priority))| (*priority, index))
                .collect();
            expected.sort();
            let expected: Vec<String> =
                expected.into_iter().map(|(_, index)| format!("t{}", index)).collect();

            prop_assert_eq!(first.names(phase), expected);
            prop_assert_eq!(first.names(phase), second.names(phase));
        }
    }

    /// PROPERTY: Built-in priorities at or above the reserved limit are
    /// always rejected.
    #[test]
    fn property_reserved_range_is_enforced(priority in 100u32..10_000) {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        let mut pipeline =
            TransformerPipeline::new(root, PatternSet::empty(root), PatternSet::empty(root));

        let result = pipeline.register_builtin(
            TransformerDescriptor::new(Phase::Before, "late", |t, _| Ok(t.to_string()))
                .with_priority(priority),
        );

        prop_assert!(result.is_err());
    }
}
