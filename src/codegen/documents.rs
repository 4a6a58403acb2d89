//! Operation documents fed to the operation and document-node plugins.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use async_graphql_parser::types as ast;
use async_graphql_parser::{Pos, Positioned};

use super::CodegenError;

/// A named operation and the source text that defines it.
#[derive(Debug, Clone)]
pub struct Operation {
    pub name: String,
    pub definition: ast::OperationDefinition,
    pub source: String,
}

#[derive(Debug, Clone)]
pub struct Fragment {
    pub name: String,
    pub definition: ast::FragmentDefinition,
    pub source: String,
}

/// Every operation and fragment across all documents, in name order.
#[derive(Debug, Default)]
pub struct Documents {
    pub operations: BTreeMap<String, Operation>,
    pub fragments: BTreeMap<String, Fragment>,
}

impl Documents {
    /// Read and parse each document file.
    pub async fn load(paths: &[PathBuf]) -> Result<Self, CodegenError> {
        let mut documents = Self::default();
        for path in paths {
            let source = tokio::fs::read_to_string(path).await.map_err(|source| CodegenError::Read {
                path: path.clone(),
                source,
            })?;
            documents.add(path, &source)?;
        }
        Ok(documents)
    }

    /// Parse one document's source.
    pub fn add(&mut self, path: &Path, source: &str) -> Result<(), CodegenError> {
        let document = async_graphql_parser::parse_query(source).map_err(|e| CodegenError::DocumentParse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let mut starts: Vec<usize> = Vec::new();
        let mut operations: Vec<(Option<String>, Positioned<ast::OperationDefinition>)> = Vec::new();
        match document.operations {
            ast::DocumentOperations::Single(operation) => operations.push((None, operation)),
            ast::DocumentOperations::Multiple(named) => {
                operations.extend(named.into_iter().map(|(name, op)| (Some(name.to_string()), op)))
            }
        }
        starts.extend(operations.iter().map(|(_, op)| offset_of(source, op.pos)));
        starts.extend(document.fragments.values().map(|fragment| offset_of(source, fragment.pos)));
        starts.sort_unstable();

        let text = |pos: Pos| definition_text(source, &starts, offset_of(source, pos));

        for (name, operation) in operations {
            let Some(name) = name else {
                return Err(CodegenError::AnonymousOperation { path: path.to_path_buf() });
            };
            let source = text(operation.pos);
            self.operations.insert(
                name.clone(),
                Operation {
                    name,
                    definition: operation.node,
                    source,
                },
            );
        }

        for (name, fragment) in document.fragments {
            let source = text(fragment.pos);
            self.fragments.insert(
                name.to_string(),
                Fragment {
                    name: name.to_string(),
                    definition: fragment.node,
                    source,
                },
            );
        }

        Ok(())
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty() && self.fragments.is_empty()
    }

    /// Fragments reachable from a selection set, transitively, in name order.
    pub fn fragments_used_by(&self, selection_set: &ast::SelectionSet) -> Result<Vec<&Fragment>, CodegenError> {
        let mut seen = BTreeSet::new();
        self.collect_spreads(selection_set, &mut seen)?;
        Ok(seen.into_iter().filter_map(|name| self.fragments.get(&name)).collect())
    }

    fn collect_spreads(&self, selection_set: &ast::SelectionSet, seen: &mut BTreeSet<String>) -> Result<(), CodegenError> {
        for selection in &selection_set.items {
            match &selection.node {
                ast::Selection::Field(field) => self.collect_spreads(&field.node.selection_set.node, seen)?,
                ast::Selection::InlineFragment(inline) => {
                    self.collect_spreads(&inline.node.selection_set.node, seen)?
                }
                ast::Selection::FragmentSpread(spread) => {
                    let name = spread.node.fragment_name.node.to_string();
                    if seen.insert(name.clone()) {
                        let fragment = self
                            .fragments
                            .get(&name)
                            .ok_or_else(|| CodegenError::UnknownFragment(name.clone()))?;
                        self.collect_spreads(&fragment.definition.selection_set.node, seen)?;
                    }
                }
            }
        }
        Ok(())
    }
}

/// Byte offset of a 1-based line/column position.
fn offset_of(source: &str, pos: Pos) -> usize {
    let line_start: usize = source
        .split_inclusive('\n')
        .take(pos.line.saturating_sub(1))
        .map(str::len)
        .sum();

    source[line_start..]
        .char_indices()
        .nth(pos.column.saturating_sub(1))
        .map_or(source.len(), |(index, _)| line_start + index)
}

/// Text from `start` up to the next definition, without trailing comments.
fn definition_text(source: &str, starts: &[usize], start: usize) -> String {
    let end = starts
        .iter()
        .copied()
        .find(|&next| next > start)
        .unwrap_or(source.len());

    let mut lines: Vec<&str> = source[start..end].trim().lines().collect();
    while lines
        .last()
        .is_some_and(|line| line.trim().is_empty() || line.trim_start().starts_with('#'))
    {
        lines.pop();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOCUMENT: &str = r#"
query Hello { hello }

# profile with shared fields
query Profile($id: ID!) {
  user(id: $id) { ...UserFields }
}

fragment UserFields on User { id name ...Extra }
fragment Extra on User { email }
"#;

    fn documents() -> Documents {
        let mut documents = Documents::default();
        documents.add(Path::new("ops.graphql"), DOCUMENT).unwrap();
        documents
    }

    #[test]
    fn splits_definitions_by_position() {
        let documents = documents();
        assert_eq!(documents.operations["Hello"].source, "query Hello { hello }");
        assert!(documents.operations["Profile"].source.starts_with("query Profile($id: ID!)"));
        assert_eq!(documents.fragments["Extra"].source, "fragment Extra on User { email }");
    }

    #[test]
    fn collects_transitive_fragments() {
        let documents = documents();
        let profile = &documents.operations["Profile"];
        let used: Vec<&str> = documents
            .fragments_used_by(&profile.definition.selection_set.node)
            .unwrap()
            .into_iter()
            .map(|fragment| fragment.name.as_str())
            .collect();
        assert_eq!(used, vec!["Extra", "UserFields"]);
    }

    #[test]
    fn anonymous_operations_are_rejected() {
        let err = Documents::default().add(Path::new("anon.graphql"), "{ hello }").unwrap_err();
        assert!(matches!(err, CodegenError::AnonymousOperation { .. }));
    }

    #[test]
    fn offsets_count_characters() {
        let source = "é\n  query";
        assert_eq!(offset_of(source, Pos { line: 2, column: 3 }), 5);
    }
}
