//! Schema files written next to the generated TypeScript.
//!
//! The file extension picks the representation: `.gql`/`.graphql` get the
//! SDL, `.json` gets the `data` of the standard introspection query.

use std::path::Path;

use async_graphql::Executor;

use super::writer::write_if_changed;
use super::CodegenError;

/// The introspection query graphql-js tooling sends.
pub const INTROSPECTION_QUERY: &str = r#"query IntrospectionQuery {
  __schema {
    queryType { name }
    mutationType { name }
    subscriptionType { name }
    types { ...FullType }
    directives {
      name
      description
      locations
      args { ...InputValue }
    }
  }
}

fragment FullType on __Type {
  kind
  name
  description
  fields(includeDeprecated: true) {
    name
    description
    args { ...InputValue }
    type { ...TypeRef }
    isDeprecated
    deprecationReason
  }
  inputFields { ...InputValue }
  interfaces { ...TypeRef }
  enumValues(includeDeprecated: true) {
    name
    description
    isDeprecated
    deprecationReason
  }
  possibleTypes { ...TypeRef }
}

fragment InputValue on __InputValue {
  name
  description
  type { ...TypeRef }
  defaultValue
}

fragment TypeRef on __Type {
  kind
  name
  ofType {
    kind
    name
    ofType {
      kind
      name
      ofType {
        kind
        name
        ofType {
          kind
          name
          ofType {
            kind
            name
            ofType {
              kind
              name
              ofType {
                kind
                name
              }
            }
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaFormat {
    Sdl,
    Introspection,
}

impl SchemaFormat {
    pub fn from_path(path: &Path) -> Result<Self, CodegenError> {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("gql" | "graphql") => Ok(Self::Sdl),
            Some("json") => Ok(Self::Introspection),
            _ => Err(CodegenError::UnsupportedSchemaExtension {
                path: path.to_path_buf(),
            }),
        }
    }
}

/// Run the introspection query and return its `data`.
pub async fn introspect<E: Executor>(executor: &E) -> Result<serde_json::Value, CodegenError> {
    let response = executor.execute(async_graphql::Request::new(INTROSPECTION_QUERY)).await;
    if let Some(error) = response.errors.first() {
        return Err(CodegenError::Introspection(error.message.clone()));
    }
    response
        .data
        .into_json()
        .map_err(|e| CodegenError::Introspection(e.to_string()))
}

/// Write one schema file. Returns whether the file changed.
pub async fn write_schema<E: Executor>(executor: &E, sdl: &str, path: &Path) -> Result<bool, CodegenError> {
    let contents = match SchemaFormat::from_path(path)? {
        SchemaFormat::Sdl => sdl.to_string(),
        SchemaFormat::Introspection => {
            let data = introspect(executor).await?;
            let mut json = serde_json::to_string_pretty(&data).map_err(|e| CodegenError::Introspection(e.to_string()))?;
            json.push('\n');
            json
        }
    };

    write_if_changed(path, &contents).await.map_err(|source| CodegenError::Write {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_extension() {
        assert_eq!(SchemaFormat::from_path(Path::new("schema.gql")).unwrap(), SchemaFormat::Sdl);
        assert_eq!(SchemaFormat::from_path(Path::new("a/schema.graphql")).unwrap(), SchemaFormat::Sdl);
        assert_eq!(
            SchemaFormat::from_path(Path::new("schema.json")).unwrap(),
            SchemaFormat::Introspection
        );
        assert!(matches!(
            SchemaFormat::from_path(Path::new("schema.txt")),
            Err(CodegenError::UnsupportedSchemaExtension { .. })
        ));
        assert!(SchemaFormat::from_path(Path::new("schema")).is_err());
    }
}
