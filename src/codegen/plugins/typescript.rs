use async_graphql_parser::types as ast;
use async_graphql_parser::Positioned;
use heck::ToUpperCamelCase;

use super::{doc_comment, CodegenPlugin, PluginContext, PluginOutput};
use crate::codegen::schema::{SchemaIndex, BUILTIN_SCALARS};
use crate::codegen::CodegenError;

const PRELUDE: &str = "\
export type Maybe<T> = T | null;
export type InputMaybe<T> = Maybe<T>;
export type Exact<T extends { [key: string]: unknown }> = { [K in keyof T]: T[K] };
";

/// Base types: scalars, objects, interfaces, inputs, enums and unions.
pub struct TypeScriptTypes;

impl CodegenPlugin for TypeScriptTypes {
    fn name(&self) -> &'static str {
        "typescript"
    }

    fn generate(&self, ctx: &PluginContext<'_>) -> Result<PluginOutput, CodegenError> {
        let schema = ctx.schema;
        let mut blocks = vec![PRELUDE.trim_end().to_string(), scalars_block(schema)];

        for (name, definition) in schema.user_types() {
            let doc = doc_comment(definition.description.as_ref().map(|d| d.node.as_str()), "");
            match &definition.kind {
                ast::TypeKind::Scalar => {}
                ast::TypeKind::Object(object) => {
                    blocks.push(format!("{doc}{}", object_block(schema, name, &object.fields, true)));
                    blocks.extend(args_blocks(schema, name, &object.fields));
                }
                ast::TypeKind::Interface(interface) => {
                    blocks.push(format!("{doc}{}", object_block(schema, name, &interface.fields, false)));
                    blocks.extend(args_blocks(schema, name, &interface.fields));
                }
                ast::TypeKind::InputObject(input) => {
                    blocks.push(format!("{doc}{}", input_block(schema, name, &input.fields)));
                }
                ast::TypeKind::Enum(enumeration) => {
                    let mut block = format!("{doc}export enum {name} {{\n");
                    for value in &enumeration.values {
                        let value = &value.node;
                        block.push_str(&doc_comment(value.description.as_ref().map(|d| d.node.as_str()), "  "));
                        let raw = value.value.node.as_str();
                        block.push_str(&format!("  {} = '{raw}',\n", raw.to_upper_camel_case()));
                    }
                    block.push('}');
                    blocks.push(block);
                }
                ast::TypeKind::Union(union) => {
                    let mut members: Vec<&str> = union.members.iter().map(|m| m.node.as_str()).collect();
                    members.sort_unstable();
                    blocks.push(format!("{doc}export type {name} = {};", members.join(" | ")));
                }
            }
        }

        Ok(PluginOutput {
            prepend: Vec::new(),
            content: blocks.join("\n\n"),
        })
    }
}

fn scalars_block(schema: &SchemaIndex) -> String {
    let mut block =
        String::from("/** All built-in and custom scalars, mapped to their actual values */\nexport type Scalars = {\n");
    for name in BUILTIN_SCALARS.into_iter().chain(schema.custom_scalars()) {
        block.push_str(&format!("  {name}: {};\n", schema.scalar_ts(name)));
    }
    block.push_str("};");
    block
}

/// Reference to a schema type; `maybe` wraps nullable positions.
pub(crate) fn type_ref(schema: &SchemaIndex, ty: &ast::Type, maybe: &str) -> String {
    let inner = match &ty.base {
        ast::BaseType::Named(name) if schema.is_scalar(name) => format!("Scalars['{name}']"),
        ast::BaseType::Named(name) => name.to_string(),
        ast::BaseType::List(item) => format!("Array<{}>", type_ref(schema, item, maybe)),
    };
    if ty.nullable {
        format!("{maybe}<{inner}>")
    } else {
        inner
    }
}

fn object_block(
    schema: &SchemaIndex,
    name: &str,
    fields: &[Positioned<ast::FieldDefinition>],
    typename: bool,
) -> String {
    let mut block = format!("export type {name} = {{\n");
    if typename {
        block.push_str(&format!("  __typename?: '{name}';\n"));
    }
    for field in fields {
        let field = &field.node;
        let ty = &field.ty.node;
        block.push_str(&doc_comment(field.description.as_ref().map(|d| d.node.as_str()), "  "));
        let optional = if ty.nullable { "?" } else { "" };
        block.push_str(&format!(
            "  {}{optional}: {};\n",
            field.name.node,
            type_ref(schema, ty, "Maybe")
        ));
    }
    block.push_str("};");
    block
}

/// `{Type}{Field}Args` name for a field with arguments.
pub(crate) fn args_type_name(type_name: &str, field_name: &str) -> String {
    format!("{type_name}{}Args", field_name.to_upper_camel_case())
}

fn args_blocks(schema: &SchemaIndex, type_name: &str, fields: &[Positioned<ast::FieldDefinition>]) -> Vec<String> {
    fields
        .iter()
        .map(|field| &field.node)
        .filter(|field| !field.arguments.is_empty())
        .map(|field| input_block(schema, &args_type_name(type_name, &field.name.node), &field.arguments))
        .collect()
}

fn input_block(schema: &SchemaIndex, name: &str, fields: &[Positioned<ast::InputValueDefinition>]) -> String {
    let mut block = format!("export type {name} = {{\n");
    for field in fields {
        let field = &field.node;
        let ty = &field.ty.node;
        block.push_str(&doc_comment(field.description.as_ref().map(|d| d.node.as_str()), "  "));
        let optional = if ty.nullable || field.default_value.is_some() { "?" } else { "" };
        block.push_str(&format!(
            "  {}{optional}: {};\n",
            field.name.node,
            type_ref(schema, ty, "InputMaybe")
        ));
    }
    block.push_str("};");
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::documents::Documents;
    use crate::config::CodegenConfig;

    fn generate(sdl: &str, config: &CodegenConfig) -> String {
        let schema = SchemaIndex::parse(sdl, &config.scalars).unwrap();
        let documents = Documents::default();
        TypeScriptTypes
            .generate(&PluginContext {
                schema: &schema,
                documents: &documents,
                config,
            })
            .unwrap()
            .content
    }

    #[test]
    fn objects_arguments_and_nullability() {
        let out = generate(
            r#"
            type Query {
              "Greets"
              hello(name: String, times: Int! = 1): String!
              tags: [String]
            }
            "#,
            &CodegenConfig::default(),
        );

        assert!(out.contains(
            "export type Query = {\n  __typename?: 'Query';\n  /** Greets */\n  hello: Scalars['String'];\n  tags?: Maybe<Array<Maybe<Scalars['String']>>>;\n};"
        ));
        assert!(out.contains(
            "export type QueryHelloArgs = {\n  name?: InputMaybe<Scalars['String']>;\n  times?: Scalars['Int'];\n};"
        ));
    }

    #[test]
    fn enums_unions_inputs_and_scalars() {
        let mut config = CodegenConfig::default();
        config.scalars.insert("DateTime".into(), "Date".into());
        let out = generate(
            r#"
            type Query { a: Int }
            enum Role { ADMIN READ_ONLY }
            type A { x: Int }
            type B { y: Int }
            union AorB = B | A
            input Filter { role: Role! since: DateTime }
            scalar DateTime
            scalar JSON
            "#,
            &config,
        );

        assert!(out.contains("export enum Role {\n  Admin = 'ADMIN',\n  ReadOnly = 'READ_ONLY',\n}"));
        assert!(out.contains("export type AorB = A | B;"));
        assert!(out.contains("export type Filter = {\n  role: Role;\n  since?: InputMaybe<Scalars['DateTime']>;\n};"));
        assert!(out.contains("  DateTime: Date;\n  JSON: any;\n};"));
    }
}
