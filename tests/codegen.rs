//! Codegen runs against a real executor, writing into a temp directory.

use std::sync::{Arc, Mutex};

use graphql_bridge::codegen::{run_codegen, CodegenError, CodegenTrigger, OnError};
use graphql_bridge::config::CodegenConfig;
use graphql_bridge::{AppConfig, GraphQLApp};

mod common;

fn collecting() -> (OnError, Arc<Mutex<Vec<String>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let on_error: OnError = Arc::new(move |error: &CodegenError| sink.lock().unwrap().push(error.to_string()));
    (on_error, seen)
}

#[tokio::test]
async fn writes_typescript_once_and_skips_identical_output() {
    let dir = tempfile::tempdir().unwrap();
    let documents = dir.path().join("ops.graphql");
    std::fs::write(&documents, "query Hello { hello }\nsubscription Count { countdown(from: 2) }\n").unwrap();

    let config = CodegenConfig {
        enabled: true,
        target_path: dir.path().join("generated/types.ts"),
        documents: vec![documents],
        ..CodegenConfig::default()
    };
    let (on_error, errors) = collecting();

    let first = CodegenTrigger::spawn(common::schema(), config.clone(), on_error.clone())
        .await
        .unwrap();
    assert!(first.typescript_written);
    assert_eq!(first.errors, 0, "{:?}", errors.lock().unwrap());

    let generated = std::fs::read_to_string(&config.target_path).unwrap();
    assert!(generated.contains("export type Query = {"));
    assert!(generated.contains("export type HelloQuery = { __typename?: 'Query', hello: string };"));
    assert!(generated.contains("export type CountSubscription = { __typename?: 'SubscriptionRoot', countdown: number };"));
    assert!(generated.contains("export const HelloDocument = parse(`query Hello { hello }`)"));
    assert!(generated.contains("declare module \"graphql-bridge\""));

    let second = run_codegen(&common::schema(), &config, &on_error).await;
    assert!(!second.typescript_written);
    assert_eq!(second.errors, 0);
}

#[tokio::test]
async fn schema_outputs_by_extension() {
    let dir = tempfile::tempdir().unwrap();
    let sdl = dir.path().join("schema.graphql");
    let json = dir.path().join("schema.json");
    let unsupported = dir.path().join("schema.txt");

    let config = CodegenConfig {
        enabled: true,
        target_path: dir.path().join("types.ts"),
        output_schema: vec![sdl.clone(), json.clone(), unsupported.clone()],
        ..CodegenConfig::default()
    };
    let (on_error, errors) = collecting();

    let report = run_codegen(&common::schema(), &config, &on_error).await;

    assert_eq!(report.schemas_written, vec![sdl.clone(), json.clone()]);
    assert_eq!(report.errors, 1);
    assert!(errors.lock().unwrap()[0].contains("schema.txt"));
    assert!(!unsupported.exists());

    assert!(std::fs::read_to_string(&sdl).unwrap().contains("hello: String!"));
    let introspection: serde_json::Value = serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
    assert_eq!(introspection["__schema"]["queryType"]["name"], "Query");
    assert_eq!(introspection["__schema"]["subscriptionType"]["name"], "SubscriptionRoot");
}

#[tokio::test]
async fn document_errors_go_to_the_callback() {
    let dir = tempfile::tempdir().unwrap();
    let documents = dir.path().join("bad.graphql");
    std::fs::write(&documents, "{ hello }").unwrap();

    let config = CodegenConfig {
        enabled: true,
        target_path: dir.path().join("types.ts"),
        documents: vec![documents],
        ..CodegenConfig::default()
    };
    let (on_error, errors) = collecting();

    let report = run_codegen(&common::schema(), &config, &on_error).await;

    assert_eq!(report.errors, 1);
    assert!(!config.target_path.exists());
    assert!(errors.lock().unwrap()[0].starts_with("anonymous operation"));
}

#[tokio::test]
async fn app_build_schedules_codegen_when_enabled() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AppConfig::default();
    config.codegen.enabled = true;
    config.codegen.target_path = dir.path().join("types.ts");

    let app = GraphQLApp::new(common::schema(), config.clone()).build();
    let report = app.codegen.unwrap().await.unwrap();

    assert!(report.typescript_written);
    assert!(config.codegen.target_path.exists());
}
