use graphflow_core::types::{
    ActionId, Expression, ExpressionKind, OnError, OnErrorAction, Resource, ResourceKind,
    ResourceMetadata, RunConfig,
};
use graphflow_core::types::{LlmConfig, Workflow, WorkflowMetadata};
use std::collections::HashSet;

fn sample_resource(id: &str, requires: &[&str]) -> Resource {
    Resource {
        metadata: ResourceMetadata {
            action_id: ActionId::new(id),
            name: id.to_string(),
            requires: requires.iter().map(|r| ActionId::new(*r)).collect(),
        },
        run: RunConfig {
            kind: ResourceKind::Llm(LlmConfig {
                prompt: Expression::direct("get('q')"),
                model: None,
                system_prompt: None,
                temperature: None,
                max_tokens: None,
            }),
            skip_condition: None,
            preflight_check: None,
            on_error: Some(OnError {
                action: OnErrorAction::Retry,
                max_retries: Some(3),
                retry_delay: Some(Expression::literal("10ms")),
                fallback: None,
                expr: vec![],
            }),
        },
    }
}

#[test]
fn workflow_round_trips_through_json() {
    let workflow = Workflow {
        metadata: WorkflowMetadata {
            name: "demo".into(),
            version: "1.0".into(),
            target_action_id: ActionId::new("c"),
        },
        settings: Default::default(),
        resources: vec![
            sample_resource("a", &[]),
            sample_resource("b", &["a"]),
            sample_resource("c", &["b"]),
        ],
    };

    let json = serde_json::to_string(&workflow).expect("serialize");
    let round_tripped: Workflow = serde_json::from_str(&json).expect("deserialize");

    assert_eq!(round_tripped.resources.len(), 3);
    assert_eq!(round_tripped.target_action_id().as_str(), "c");
    let b = round_tripped.find_resource(&ActionId::new("b")).unwrap();
    assert_eq!(
        b.metadata.requires,
        HashSet::from([ActionId::new("a")])
    );
}

#[test]
fn expression_kind_is_stable_under_round_trip() {
    for expr in [
        Expression::literal("https://example.com"),
        Expression::direct("get('q')"),
        Expression::interpolated("Hello {{name}}"),
    ] {
        let json = serde_json::to_string(&expr).unwrap();
        let back: Expression = serde_json::from_str(&json).unwrap();
        assert_eq!(back.kind, expr.kind);
        assert_eq!(back.raw, expr.raw);
    }
}

#[test]
fn expression_kind_equality_is_by_variant_not_by_raw_text() {
    assert_eq!(
        Expression::direct("a").kind,
        ExpressionKind::Direct
    );
    assert_ne!(Expression::direct("a").kind, ExpressionKind::Literal);
}
