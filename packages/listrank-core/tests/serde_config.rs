#![cfg(feature = "serde")]

use listrank_core::{EntitySchema, Error, ListConfig, ScopeSpec};

#[test]
fn missing_fields_take_defaults() {
    let config = ListConfig::from_json("{}").unwrap();
    assert_eq!(config, ListConfig::new());
    assert_eq!(config.column, "position");
    assert_eq!(config.scope, ScopeSpec::None);
}

#[test]
fn scope_variants_load_from_json() {
    let config = ListConfig::from_json(r#"{"column":"pos","scope":{"attributes":["parent_id","parent_type"]}}"#)
        .unwrap();
    assert_eq!(
        config,
        ListConfig::new()
            .column("pos")
            .scope(ScopeSpec::Attributes(vec!["parent_id".into(), "parent_type".into()]))
    );

    let config = ListConfig::from_json(r#"{"scope":{"predicate":"parent_id = #{parent_id}"}}"#).unwrap();
    let schema = EntitySchema::new("Mixin", "mixins").attributes(["position", "parent_id"]);
    let list = config.resolve(&schema).unwrap();
    assert_eq!(list.scope().key_attributes(), vec!["parent_id"]);
}

#[test]
fn round_trips_through_serde_json() {
    let config = ListConfig::new().scope(ScopeSpec::BelongsTo("todo_list".into()));
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(json, r#"{"column":"position","scope":{"belongs_to":"todo_list"}}"#);
    assert_eq!(ListConfig::from_json(&json).unwrap(), config);
}

#[test]
fn malformed_documents_are_configuration_errors() {
    let err = ListConfig::from_json(r#"{"scope": 3}"#).unwrap_err();
    assert!(matches!(err, Error::Configuration(_)));
}
