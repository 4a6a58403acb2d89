use async_graphql_parser::types as ast;
use async_graphql_parser::Positioned;

use super::typescript::{args_type_name, type_ref};
use super::{CodegenPlugin, PluginContext, PluginOutput};
use crate::codegen::schema::SchemaIndex;
use crate::codegen::CodegenError;

const IMPORT: &str = "import type { GraphQLResolveInfo, GraphQLScalarType, GraphQLScalarTypeConfig } from 'graphql';";

const HELPERS: &str = "\
export type ResolverFn<TResult, TParent, TContext, TArgs> = (
  parent: TParent,
  args: TArgs,
  context: TContext,
  info: GraphQLResolveInfo
) => Promise<TResult> | TResult;

export type SubscriptionSubscribeFn<TResult, TParent, TContext, TArgs> = (
  parent: TParent,
  args: TArgs,
  context: TContext,
  info: GraphQLResolveInfo
) => AsyncIterable<TResult> | Promise<AsyncIterable<TResult>>;

export type SubscriptionResolveFn<TResult, TParent, TContext, TArgs> = (
  parent: TParent,
  args: TArgs,
  context: TContext,
  info: GraphQLResolveInfo
) => TResult | Promise<TResult>;

export interface SubscriptionResolverObject<TResult, TKey extends string, TParent, TContext, TArgs> {
  subscribe: SubscriptionSubscribeFn<{ [key in TKey]: TResult }, TParent, TContext, TArgs>;
  resolve?: SubscriptionResolveFn<TResult, { [key in TKey]: TResult }, TContext, TArgs>;
}

export type SubscriptionResolver<TResult, TKey extends string, TParent = {}, TContext = {}, TArgs = {}> =
  | SubscriptionResolverObject<TResult, TKey, TParent, TContext, TArgs>
  | ((...args: any[]) => SubscriptionResolverObject<TResult, TKey, TParent, TContext, TArgs>);

export type TypeResolveFn<TTypes, TParent = {}, TContext = {}> = (
  parent: TParent,
  context: TContext,
  info: GraphQLResolveInfo
) => Maybe<TTypes> | Promise<Maybe<TTypes>>;
";

/// Resolver signatures per type plus the aggregate `Resolvers<ContextType>`.
pub struct ResolverTypes;

impl CodegenPlugin for ResolverTypes {
    fn name(&self) -> &'static str {
        "typescript-resolvers"
    }

    fn generate(&self, ctx: &PluginContext<'_>) -> Result<PluginOutput, CodegenError> {
        let schema = ctx.schema;
        let mut blocks = vec![HELPERS.trim_end().to_string()];
        let mut aggregate = Vec::new();

        for (name, definition) in schema.user_types() {
            match &definition.kind {
                ast::TypeKind::Object(object) => {
                    blocks.push(fields_block(schema, name, &object.fields, None));
                    aggregate.push(format!("  {name}?: {name}Resolvers<ContextType>;"));
                }
                ast::TypeKind::Interface(interface) => {
                    blocks.push(fields_block(schema, name, &interface.fields, Some(schema.possible_types(name))));
                    aggregate.push(format!("  {name}?: {name}Resolvers<ContextType>;"));
                }
                ast::TypeKind::Union(_) => {
                    blocks.push(fields_block(schema, name, &[], Some(schema.possible_types(name))));
                    aggregate.push(format!("  {name}?: {name}Resolvers<ContextType>;"));
                }
                ast::TypeKind::Scalar => {
                    blocks.push(format!(
                        "export interface {name}ScalarConfig extends GraphQLScalarTypeConfig<Scalars['{name}'], any> {{\n  name: '{name}';\n}}"
                    ));
                    aggregate.push(format!("  {name}?: GraphQLScalarType;"));
                }
                ast::TypeKind::Enum(_) | ast::TypeKind::InputObject(_) => {}
            }
        }

        blocks.push(format!(
            "export type Resolvers<ContextType = any> = {{\n{}\n}};",
            aggregate.join("\n")
        ));

        Ok(PluginOutput {
            prepend: vec![IMPORT.to_string()],
            content: blocks.join("\n\n"),
        })
    }
}

/// `XResolvers`; abstract types also get `__resolveType`.
fn fields_block(
    schema: &SchemaIndex,
    name: &str,
    fields: &[Positioned<ast::FieldDefinition>],
    possible_types: Option<Vec<String>>,
) -> String {
    let parent = if schema.is_root(name) { "{}".to_string() } else { name.to_string() };
    let mut block = format!("export type {name}Resolvers<ContextType = any, ParentType = {parent}> = {{\n");

    if let Some(possible) = possible_types {
        let names = if possible.is_empty() {
            "never".to_string()
        } else {
            possible.iter().map(|p| format!("'{p}'")).collect::<Vec<_>>().join(" | ")
        };
        block.push_str(&format!("  __resolveType: TypeResolveFn<{names}, ParentType, ContextType>;\n"));
    }

    for field in fields {
        let field = &field.node;
        let field_name = field.name.node.as_str();
        let result = type_ref(schema, &field.ty.node, "Maybe");
        let args = if field.arguments.is_empty() {
            "{}".to_string()
        } else {
            args_type_name(name, field_name)
        };

        if schema.is_subscription_root(name) {
            block.push_str(&format!(
                "  {field_name}?: SubscriptionResolver<{result}, '{field_name}', ParentType, ContextType, {args}>;\n"
            ));
        } else {
            block.push_str(&format!(
                "  {field_name}?: ResolverFn<{result}, ParentType, ContextType, {args}>;\n"
            ));
        }
    }

    block.push_str("};");
    block
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codegen::documents::Documents;
    use crate::config::CodegenConfig;

    #[test]
    fn resolvers_for_roots_objects_and_abstract_types() {
        let config = CodegenConfig::default();
        let schema = SchemaIndex::parse(
            r#"
            type Query { node(id: ID!): Node }
            type Subscription { ticks(limit: Int!): Int! }
            interface Node { id: ID! }
            type User implements Node { id: ID! }
            scalar DateTime
            "#,
            &config.scalars,
        )
        .unwrap();
        let documents = Documents::default();
        let output = ResolverTypes
            .generate(&PluginContext {
                schema: &schema,
                documents: &documents,
                config: &config,
            })
            .unwrap();

        assert_eq!(output.prepend, vec![IMPORT.to_string()]);
        let out = output.content;
        assert!(out.contains(
            "export type QueryResolvers<ContextType = any, ParentType = {}> = {\n  node?: ResolverFn<Maybe<Node>, ParentType, ContextType, QueryNodeArgs>;\n};"
        ));
        assert!(out.contains(
            "  ticks?: SubscriptionResolver<Scalars['Int'], 'ticks', ParentType, ContextType, SubscriptionTicksArgs>;"
        ));
        assert!(out.contains("  __resolveType: TypeResolveFn<'User', ParentType, ContextType>;"));
        assert!(out.contains("export type UserResolvers<ContextType = any, ParentType = User> = {"));
        assert!(out.contains("export interface DateTimeScalarConfig extends GraphQLScalarTypeConfig<Scalars['DateTime'], any>"));
        assert!(out.contains("  DateTime?: GraphQLScalarType;"));
        assert!(out.contains("  User?: UserResolvers<ContextType>;"));
    }
}
