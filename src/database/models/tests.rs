use super::*;
use serde_json::json;

#[test]
fn remote_endpoint_validation() {
    let endpoint = VectorEndpoint::remote(" localhost ", 19530).expect("endpoint is valid");
    assert_eq!(
        endpoint,
        VectorEndpoint::Remote {
            host: "localhost".to_string(),
            port: 19530
        }
    );
    assert_eq!(endpoint.to_string(), "localhost:19530");

    assert_eq!(
        VectorEndpoint::remote("", 19530),
        Err(ValidationError::InvalidHost(String::new()))
    );
    assert_eq!(
        VectorEndpoint::remote("localhost", 0),
        Err(ValidationError::InvalidPort(0))
    );
    assert_eq!(
        VectorEndpoint::remote("localhost", 65536),
        Err(ValidationError::InvalidPort(65536))
    );
    assert!(VectorEndpoint::remote("local host", 80).is_err());
    assert!(VectorEndpoint::remote("localhost", 65535).is_ok());
}

#[test]
fn search_params_defaults_and_aliases() {
    let params: SearchParams = serde_json::from_value(json!({})).expect("should parse");
    assert_eq!(params, SearchParams::default());
    assert_eq!(params.metric, Metric::L2);
    assert_eq!(params.nprobes, 10);

    let params: SearchParams =
        serde_json::from_value(json!({"metric_type": "IP", "nprobe": 4})).expect("should parse");
    assert_eq!(params.metric, Metric::Dot);
    assert_eq!(params.nprobes, 4);

    let params: SearchParams =
        serde_json::from_value(json!({"metric": "cosine"})).expect("should parse");
    assert_eq!(params.metric, Metric::Cosine);
}

#[test]
fn search_params_accept_nested_index_params() {
    let params: SearchParams = serde_json::from_value(json!({
        "metric_type": "L2",
        "params": {"nprobe": 32, "refine_factor": 5}
    }))
    .expect("should parse");
    assert_eq!(params.metric, Metric::L2);
    assert_eq!(params.nprobes, 32);
    assert_eq!(params.refine_factor, Some(5));

    let params: SearchParams =
        serde_json::from_value(json!({"nprobes": 8, "params": {"nprobe": 32}}))
            .expect("should parse");
    assert_eq!(params.nprobes, 8);

    let params: SearchParams =
        serde_json::from_value(json!({"params": {}})).expect("should parse");
    assert_eq!(params, SearchParams::default());
}

#[test]
fn search_params_reject_unknown_keys() {
    for input in [
        json!({"metric_type": "L2", "nprob": 4}),
        json!({"params": {"ef": 64}}),
        json!({"metric": "HAMMING"}),
    ] {
        let result: Result<SearchParams, _> = serde_json::from_value(input.clone());
        assert!(result.is_err(), "{input} should be rejected");
    }
}

#[test]
fn query_result_omits_unknown_counts() {
    let result = QueryResult {
        query: "DELETE FROM t".to_string(),
        returned_count: None,
        total_count: None,
        affected_rows: Some(2),
        data: Vec::new(),
        execution_time: None,
        message: None,
    };

    let value = serde_json::to_value(&result).expect("should serialize");
    assert_eq!(
        value,
        json!({"query": "DELETE FROM t", "affected_rows": 2, "data": []})
    );
}

#[test]
fn connect_summary_reports_endpoint() {
    let endpoint = VectorEndpoint::Remote {
        host: "db.internal".to_string(),
        port: 19530,
    };
    let summary = ConnectSummary::new(&endpoint, 3);
    assert_eq!(summary.host.as_deref(), Some("db.internal"));
    assert_eq!(summary.port, Some(19530));
    assert_eq!(summary.path, None);
    assert_eq!(summary.collections_count, 3);

    let value = serde_json::to_value(&summary).expect("should serialize");
    assert!(value.get("path").is_none());
}

#[test]
fn field_descriptor_serializes_type_key() {
    let field = FieldDescriptor {
        name: "vector".to_string(),
        data_type: "FixedSizeList(4 x Float32)".to_string(),
        is_primary: false,
        auto_id: false,
        dimension: Some(4),
        vector_kind: Some(VectorKind::Float),
    };
    assert!(field.is_vector());

    let value = serde_json::to_value(&field).expect("should serialize");
    assert_eq!(value["type"], json!("FixedSizeList(4 x Float32)"));
    assert_eq!(value["dimension"], json!(4));
    assert_eq!(value["vector_kind"], json!("float"));
}
