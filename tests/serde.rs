#![cfg(feature = "serde")]
use calcex::{AngleUnit, EvalConfig, Evaluator, ExResult, Node, Rational, Value};

#[test]
fn test_config_from_toml() {
    let config: EvalConfig = toml::from_str(
        r#"
        angle_unit = "degrees"
        max_depth = 64
        "#,
    )
    .unwrap();
    assert_eq!(config.angle_unit, AngleUnit::Degrees);
    assert_eq!(config.max_depth, 64);
    assert_eq!(config.rational_max_terms, EvalConfig::default().rational_max_terms);
    let evaluator = Evaluator::with_config(config);
    assert_eq!(evaluator.angle_unit(), AngleUnit::Degrees);
}

#[test]
fn test_config_json_round_trip() {
    let config = EvalConfig {
        angle_unit: AngleUnit::Gradians,
        rational_epsilon: 1e-6,
        ..EvalConfig::default()
    };
    let serialized = serde_json::to_string(&config).unwrap();
    assert!(serialized.contains("\"gradians\""));
    let deserialized: EvalConfig = serde_json::from_str(&serialized).unwrap();
    assert_eq!(config, deserialized);
}

#[test]
fn test_values() -> ExResult<()> {
    let third = Rational::new(1, 3)?;
    serde_test::assert_tokens(
        &third,
        &[
            serde_test::Token::Tuple { len: 2 },
            serde_test::Token::I64(1),
            serde_test::Token::I64(3),
            serde_test::Token::TupleEnd,
        ],
    );
    let mut evaluator = Evaluator::new();
    evaluator.evaluate("f(x) := x^2 + 1")?;
    let value = evaluator.evaluate("{f, 1/2, 5%, true, {{1.5}}}")?;
    let serialized = serde_json::to_string(&value).unwrap();
    let deserialized: Value = serde_json::from_str(&serialized).unwrap();
    assert_eq!(value, deserialized);
    let node: Node = serde_json::from_str("\"sin(x)^2\"").unwrap();
    assert_eq!(format!("{}", node), "sin(x)^2");
    Ok(())
}
