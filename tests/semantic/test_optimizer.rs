// Context optimizer: the token-budget scenario (50k-token candidate set
// into a 10k budget) and budget monotonicity.

use felix_core::config::FelixConfig;
use felix_core::types::RelationshipKind;
use felix_semantic::optimizer::{
    estimate_tokens, ContentType, ContextCandidates, ContextItem, ContextOptimizer,
    ContextRelationship,
};

fn code_body(i: usize) -> String {
    let body: String = (0..40)
        .map(|j| format!("    let value_{j} = compute_{j}(input) + {i};\n"))
        .collect();
    format!("pub fn process_batch_{i:03}(input: &Input) -> Output {{\n{body}}}\n")
}

/// `relevant` query-matching code items plus `noise` off-topic metadata
/// items, chained by call relationships. 100 items render to ~50k tokens.
fn candidates(relevant: usize, noise: usize) -> ContextCandidates {
    let mut items = Vec::new();
    for i in 0..relevant {
        items.push(ContextItem {
            id: format!("fn-{i:03}"),
            name: format!("process_batch_{i:03}"),
            kind: "function".to_string(),
            path: format!("src/batch/worker_{i:03}.rs"),
            content: code_body(i),
            content_type: ContentType::Code,
            description: Some(format!("Processes batch shard {i} of the ingest queue.")),
            raw_score: 0.0,
            weighted_score: 0.0,
        });
    }
    for i in 0..noise {
        items.push(ContextItem {
            id: format!("misc-{i:03}"),
            name: format!("misc_entry_{i:03}"),
            kind: "variable".to_string(),
            path: format!("src/misc/entry_{i:03}.rs"),
            content: code_body(relevant + i),
            content_type: ContentType::Metadata,
            description: None,
            raw_score: 0.0,
            weighted_score: 0.0,
        });
    }
    let all_ids: Vec<String> = items.iter().map(|i| i.id.clone()).collect();
    let relationships = all_ids
        .windows(2)
        .map(|pair| ContextRelationship {
            source_id: pair[0].clone(),
            target_id: pair[1].clone(),
            kind: RelationshipKind::Calls,
        })
        .collect();
    ContextCandidates {
        items,
        relationships,
    }
}

#[test]
fn test_token_budget_scenario() {
    let set = candidates(60, 40);
    let naive: usize = set.items.iter().map(estimate_tokens).sum();
    assert!(naive > 40_000, "candidate set should be ~50k tokens, got {naive}");

    let optimizer = ContextOptimizer::new(&FelixConfig::default());
    let outcome = optimizer.optimize("process batch ingest", set, 10_000);

    assert!(outcome.final_tokens <= 10_000, "got {}", outcome.final_tokens);
    assert!(outcome.items_removed > 0);
    assert!(outcome
        .strategies_applied
        .contains(&"relevance-scoring".to_string()));
    assert!(outcome
        .strategies_applied
        .contains(&"window-sizing".to_string()));
    assert!(
        !outcome.warnings.is_empty(),
        "a truncation warning must surface"
    );
    assert_eq!(outcome.original_tokens, naive);

    // Ordering by weighted score survives every stage.
    let scores: Vec<f64> = outcome
        .optimized
        .items
        .iter()
        .map(|i| i.weighted_score)
        .collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]));
}

#[test]
fn test_budget_monotonicity() {
    let optimizer = ContextOptimizer::new(&FelixConfig::default());

    let mut previous_final = 0usize;
    let mut previous_kept: Vec<String> = Vec::new();
    for budget in [2_000usize, 5_000, 10_000, 20_000, 100_000] {
        let outcome = optimizer.optimize("process batch ingest", candidates(60, 40), budget);
        let kept: Vec<String> = outcome
            .optimized
            .items
            .iter()
            .map(|i| i.id.clone())
            .collect();

        assert!(
            outcome.final_tokens >= previous_final,
            "final tokens shrank when the budget grew to {budget}"
        );
        for id in &previous_kept {
            assert!(
                kept.contains(id),
                "budget {budget} dropped {id}, which a smaller budget kept"
            );
        }
        previous_final = outcome.final_tokens;
        previous_kept = kept;
    }
}

#[test]
fn test_relationships_follow_dropped_items() {
    let optimizer = ContextOptimizer::new(&FelixConfig::default());
    let outcome = optimizer.optimize("process batch ingest", candidates(60, 40), 2_000);

    let kept: std::collections::HashSet<&str> = outcome
        .optimized
        .items
        .iter()
        .map(|i| i.id.as_str())
        .collect();
    for relationship in &outcome.optimized.relationships {
        assert!(kept.contains(relationship.source_id.as_str()));
        assert!(kept.contains(relationship.target_id.as_str()));
    }
    assert!(outcome.relationships_removed > 0);
}

#[test]
fn test_generous_budget_keeps_relevant_set_untouched() {
    let optimizer = ContextOptimizer::new(&FelixConfig::default());
    let outcome = optimizer.optimize("process batch ingest", candidates(50, 0), 1_000_000);
    assert_eq!(outcome.items_removed, 0);
    assert_eq!(outcome.final_tokens, outcome.original_tokens);
    assert!(outcome.warnings.is_empty());
}
