use lilith_gate::core::models::Decision;
use lilith_gate::engine::PolicyEngine;
use proptest::prelude::*;

const RULES: &str = r#"
global:
  allow_prefixes: [get_, list_]
  block_keywords: [delete, drop]
  default_action: block
"#;

fn engine() -> PolicyEngine {
    PolicyEngine::from_yaml(RULES, None).unwrap()
}

proptest! {
    #[test]
    fn prefix_match_always_allows(suffix in "[a-zA-Z0-9_]{0,24}") {
        // Even a suffix containing a block keyword cannot override the prefix
        let engine = engine();
        prop_assert_eq!(engine.evaluate(&format!("get_{}", suffix)), Decision::Allow);
        prop_assert_eq!(engine.evaluate(&format!("get_delete_{}", suffix)), Decision::Allow);
    }

    #[test]
    fn keyword_without_prefix_always_blocks(
        head in "[a-fh-z]",
        tail in "[a-z0-9_]{0,16}"
    ) {
        // Names starting with anything but 'g'/'l' cannot match an allow prefix
        let engine = engine();
        let name = format!("{}x_delete_{}", head, tail);
        prop_assert_eq!(engine.evaluate(&name), Decision::Block);
    }

    #[test]
    fn unmatched_names_fall_to_default(body in "[m-z]{1,16}") {
        // [m-z] avoids the prefixes and both keywords entirely
        let engine = engine();
        prop_assert_eq!(engine.evaluate(&body), Decision::Block);
    }

    #[test]
    fn evaluate_never_panics(name in "\\PC*") {
        let engine = engine();
        let _ = engine.evaluate(&name);
    }
}
