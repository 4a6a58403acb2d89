//! GraphQL-over-HTTP parameter extraction.
//!
//! `GET` requests carry `query`, `operationName` and `variables` in the query
//! string; everything else carries them in the JSON body.

use axum::http::Method;
use serde_json::Value;

use crate::error::AdapterError;
use crate::http::request::NormalizedRequest;

/// The three standard GraphQL request parameters.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GraphQLParams {
    pub query: Option<String>,
    pub operation_name: Option<String>,
    /// Always a JSON object when present.
    pub variables: Option<Value>,
}

impl GraphQLParams {
    /// Pull the parameters out of a normalized request.
    pub fn extract(request: &NormalizedRequest) -> Result<Self, AdapterError> {
        let source = if request.method == Method::GET {
            &request.query
        } else {
            &request.body
        };

        let string_param = |key: &str| {
            source
                .get(key)
                .and_then(Value::as_str)
                .filter(|value| !value.is_empty())
                .map(str::to_owned)
        };

        Ok(Self {
            query: string_param("query"),
            operation_name: string_param("operationName"),
            variables: parse_variables(source.get("variables"))?,
        })
    }
}

fn parse_variables(raw: Option<&Value>) -> Result<Option<Value>, AdapterError> {
    let value = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(text)) if text.is_empty() => return Ok(None),
        Some(Value::String(text)) => {
            serde_json::from_str(text).map_err(|_| AdapterError::InvalidVariables)?
        }
        Some(value) => value.clone(),
    };

    match value {
        Value::Null => Ok(None),
        Value::Object(_) => Ok(Some(value)),
        _ => Err(AdapterError::InvalidVariables),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderMap;
    use serde_json::json;

    fn request(method: Method, body: Value, query: Value) -> NormalizedRequest {
        NormalizedRequest {
            body,
            headers: HeaderMap::new(),
            method,
            query,
        }
    }

    #[test]
    fn post_reads_body() {
        let req = request(
            Method::POST,
            json!({ "query": "{ hello }", "operationName": "Op", "variables": { "a": 1 } }),
            json!({ "query": "{ ignored }" }),
        );
        let params = GraphQLParams::extract(&req).unwrap();
        assert_eq!(params.query.as_deref(), Some("{ hello }"));
        assert_eq!(params.operation_name.as_deref(), Some("Op"));
        assert_eq!(params.variables, Some(json!({ "a": 1 })));
    }

    #[test]
    fn get_reads_query_string_and_decodes_variables() {
        let req = request(
            Method::GET,
            Value::Null,
            json!({ "query": "{ hello }", "variables": "{\"name\":\"x\"}" }),
        );
        let params = GraphQLParams::extract(&req).unwrap();
        assert_eq!(params.query.as_deref(), Some("{ hello }"));
        assert_eq!(params.operation_name, None);
        assert_eq!(params.variables, Some(json!({ "name": "x" })));
    }

    #[test]
    fn missing_parameters_are_none() {
        let req = request(Method::POST, Value::Null, Value::Null);
        assert_eq!(GraphQLParams::extract(&req).unwrap(), GraphQLParams::default());
    }

    #[test]
    fn rejects_non_object_variables() {
        let req = request(Method::POST, json!({ "query": "{ a }", "variables": [1] }), Value::Null);
        assert!(matches!(
            GraphQLParams::extract(&req),
            Err(AdapterError::InvalidVariables)
        ));

        let req = request(Method::GET, Value::Null, json!({ "variables": "{nope" }));
        assert!(matches!(
            GraphQLParams::extract(&req),
            Err(AdapterError::InvalidVariables)
        ));
    }
}
