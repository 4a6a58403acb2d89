//! Schema index used by every plugin.
//!
//! Built from the executor's printed SDL. `extend` definitions are folded
//! into the type they extend so plugins see one definition per name.

use std::collections::BTreeMap;

use async_graphql_parser::types as ast;
use async_graphql_parser::Positioned;

use super::CodegenError;

/// Scalars every schema has.
pub const BUILTIN_SCALARS: [&str; 5] = ["ID", "String", "Boolean", "Int", "Float"];

pub struct SchemaIndex {
    types: BTreeMap<String, ast::TypeDefinition>,
    query: String,
    mutation: Option<String>,
    subscription: Option<String>,
    scalar_overrides: BTreeMap<String, String>,
}

impl SchemaIndex {
    pub fn parse(sdl: &str, scalar_overrides: &BTreeMap<String, String>) -> Result<Self, CodegenError> {
        let document = async_graphql_parser::parse_schema(sdl).map_err(|e| CodegenError::SchemaParse(e.to_string()))?;

        let mut types: BTreeMap<String, ast::TypeDefinition> = BTreeMap::new();
        let mut extensions = Vec::new();
        let mut roots = (None, None, None);

        for definition in document.definitions {
            match definition {
                ast::TypeSystemDefinition::Type(definition) => {
                    let definition = definition.node;
                    if definition.extend {
                        extensions.push(definition);
                    } else {
                        types.insert(definition.name.node.to_string(), definition);
                    }
                }
                ast::TypeSystemDefinition::Schema(schema) => {
                    let schema = schema.node;
                    roots.0 = root_name(schema.query).or(roots.0);
                    roots.1 = root_name(schema.mutation).or(roots.1);
                    roots.2 = root_name(schema.subscription).or(roots.2);
                }
                ast::TypeSystemDefinition::Directive(_) => {}
            }
        }

        for extension in extensions {
            let name = extension.name.node.to_string();
            let Some(target) = types.get_mut(&name) else {
                return Err(CodegenError::UnknownType(name));
            };
            merge_extension(target, extension.kind);
        }

        let query = roots.0.unwrap_or_else(|| "Query".to_string());
        if !types.contains_key(&query) {
            return Err(CodegenError::UnknownType(query));
        }
        let mutation = roots.1.or_else(|| types.contains_key("Mutation").then(|| "Mutation".to_string()));
        let subscription = roots
            .2
            .or_else(|| types.contains_key("Subscription").then(|| "Subscription".to_string()));

        Ok(Self {
            types,
            query,
            mutation,
            subscription,
            scalar_overrides: scalar_overrides.clone(),
        })
    }

    pub fn get(&self, name: &str) -> Option<&ast::TypeDefinition> {
        self.types.get(name)
    }

    /// Named types a user would write, in name order.
    pub fn user_types(&self) -> impl Iterator<Item = (&str, &ast::TypeDefinition)> {
        self.types
            .iter()
            .filter(|(name, _)| !name.starts_with("__") && !BUILTIN_SCALARS.contains(&name.as_str()))
            .map(|(name, definition)| (name.as_str(), definition))
    }

    /// Custom scalars declared by the schema.
    pub fn custom_scalars(&self) -> impl Iterator<Item = &str> {
        self.user_types()
            .filter(|(_, definition)| matches!(definition.kind, ast::TypeKind::Scalar))
            .map(|(name, _)| name)
    }

    pub fn root_type(&self, kind: ast::OperationType) -> Option<&str> {
        match kind {
            ast::OperationType::Query => Some(self.query.as_str()),
            ast::OperationType::Mutation => self.mutation.as_deref(),
            ast::OperationType::Subscription => self.subscription.as_deref(),
        }
    }

    pub fn is_root(&self, name: &str) -> bool {
        name == self.query || self.mutation.as_deref() == Some(name) || self.subscription.as_deref() == Some(name)
    }

    pub fn is_subscription_root(&self, name: &str) -> bool {
        self.subscription.as_deref() == Some(name)
    }

    pub fn is_scalar(&self, name: &str) -> bool {
        BUILTIN_SCALARS.contains(&name)
            || matches!(self.get(name).map(|d| &d.kind), Some(ast::TypeKind::Scalar))
    }

    pub fn is_enum(&self, name: &str) -> bool {
        matches!(self.get(name).map(|d| &d.kind), Some(ast::TypeKind::Enum(_)))
    }

    pub fn is_leaf(&self, name: &str) -> bool {
        self.is_scalar(name) || self.is_enum(name)
    }

    /// Output fields of an object or interface.
    pub fn fields(&self, type_name: &str) -> Option<&[Positioned<ast::FieldDefinition>]> {
        match &self.get(type_name)?.kind {
            ast::TypeKind::Object(object) => Some(&object.fields),
            ast::TypeKind::Interface(interface) => Some(&interface.fields),
            _ => None,
        }
    }

    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&ast::FieldDefinition> {
        self.fields(type_name)?
            .iter()
            .map(|field| &field.node)
            .find(|field| field.name.node.as_str() == field_name)
    }

    /// Concrete object types a value of `name` can be, sorted.
    pub fn possible_types(&self, name: &str) -> Vec<String> {
        match self.get(name).map(|d| &d.kind) {
            Some(ast::TypeKind::Object(_)) => vec![name.to_string()],
            Some(ast::TypeKind::Union(union)) => {
                let mut members: Vec<String> = union.members.iter().map(|m| m.node.to_string()).collect();
                members.sort();
                members
            }
            Some(ast::TypeKind::Interface(_)) => self
                .types
                .iter()
                .filter(|(_, definition)| match &definition.kind {
                    ast::TypeKind::Object(object) => object.implements.iter().any(|i| i.node.as_str() == name),
                    _ => false,
                })
                .map(|(type_name, _)| type_name.clone())
                .collect(),
            _ => Vec::new(),
        }
    }

    /// TypeScript type of a scalar value.
    pub fn scalar_ts(&self, name: &str) -> String {
        if let Some(mapped) = self.scalar_overrides.get(name) {
            return mapped.clone();
        }
        match name {
            "ID" | "String" => "string",
            "Boolean" => "boolean",
            "Int" | "Float" => "number",
            _ => "any",
        }
        .to_string()
    }
}

fn root_name<T: ToString>(root: Option<Positioned<T>>) -> Option<String> {
    root.map(|name| name.node.to_string())
}

fn merge_extension(target: &mut ast::TypeDefinition, extension: ast::TypeKind) {
    match (&mut target.kind, extension) {
        (ast::TypeKind::Object(object), ast::TypeKind::Object(extra)) => {
            object.implements.extend(extra.implements);
            object.fields.extend(extra.fields);
        }
        (ast::TypeKind::Interface(interface), ast::TypeKind::Interface(extra)) => {
            interface.implements.extend(extra.implements);
            interface.fields.extend(extra.fields);
        }
        (ast::TypeKind::Union(union), ast::TypeKind::Union(extra)) => union.members.extend(extra.members),
        (ast::TypeKind::Enum(enumeration), ast::TypeKind::Enum(extra)) => enumeration.values.extend(extra.values),
        (ast::TypeKind::InputObject(input), ast::TypeKind::InputObject(extra)) => input.fields.extend(extra.fields),
        _ => {}
    }
}

/// The innermost named type.
pub fn named_type(ty: &ast::Type) -> &str {
    match &ty.base {
        ast::BaseType::Named(name) => name.as_str(),
        ast::BaseType::List(item) => named_type(item),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SDL: &str = r#"
        schema { query: Root }
        type Root { node(id: ID!): Node search: [SearchResult!]! }
        interface Node { id: ID! }
        type User implements Node { id: ID! name: String }
        type Post implements Node { id: ID! title: String! }
        union SearchResult = User | Post
        extend type User { email: String! }
        scalar DateTime
    "#;

    fn index() -> SchemaIndex {
        let mut scalars = BTreeMap::new();
        scalars.insert("DateTime".to_string(), "string".to_string());
        SchemaIndex::parse(SDL, &scalars).unwrap()
    }

    #[test]
    fn honours_schema_roots() {
        let schema = index();
        assert_eq!(schema.root_type(ast::OperationType::Query), Some("Root"));
        assert_eq!(schema.root_type(ast::OperationType::Mutation), None);
        assert!(schema.is_root("Root"));
    }

    #[test]
    fn extensions_are_merged() {
        let schema = index();
        assert!(schema.field("User", "email").is_some());
        assert!(schema.field("User", "name").is_some());
    }

    #[test]
    fn possible_types_of_abstract_types() {
        let schema = index();
        assert_eq!(schema.possible_types("Node"), vec!["Post", "User"]);
        assert_eq!(schema.possible_types("SearchResult"), vec!["Post", "User"]);
        assert_eq!(schema.possible_types("User"), vec!["User"]);
    }

    #[test]
    fn scalar_mapping() {
        let schema = index();
        assert_eq!(schema.scalar_ts("ID"), "string");
        assert_eq!(schema.scalar_ts("Float"), "number");
        assert_eq!(schema.scalar_ts("DateTime"), "string");
        assert_eq!(schema.custom_scalars().collect::<Vec<_>>(), vec!["DateTime"]);
    }

    #[test]
    fn extending_unknown_type_fails() {
        let err = SchemaIndex::parse("type Query { a: Int } extend type Nope { b: Int }", &BTreeMap::new())
            .err()
            .unwrap();
        assert!(matches!(err, CodegenError::UnknownType(name) if name == "Nope"));
    }
}
