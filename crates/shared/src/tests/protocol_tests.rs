use crate::protocol::RpcResponse;

#[test]
fn error_only_response_has_no_result() {
    let body = r#"{"jsonrpc":"2.0","id":1,"error":{"code":-32602,"message":"Invalid params"}}"#;
    let response: RpcResponse<u64> = serde_json::from_str(body).expect("error response");
    assert!(response.result.is_none());
    let error = response.error.expect("error object");
    assert_eq!(error.code, -32602);
    assert_eq!(error.message, "Invalid params");
    assert!(error.data.is_none());
}

#[test]
fn result_payload_is_generic_over_non_default_types() {
    #[derive(Debug, serde::Deserialize, PartialEq)]
    struct Slot(u64);

    let response: RpcResponse<Slot> =
        serde_json::from_str(r#"{"jsonrpc":"2.0","id":7,"result":42}"#).expect("result");
    assert_eq!(response.result, Some(Slot(42)));
    assert!(response.error.is_none());
}
