//! GraphQL layer: type definitions, resolver bindings, and compilation.
//!
//! The schema is described as a [`SchemaDefinition`] of
//! `async_graphql::dynamic` items and compiled exactly once at startup into
//! a [`GatewaySchema`]. Compilation validates the type graph, so a broken
//! definition is caught before any socket is opened.

pub mod resolvers;
pub mod schema;

use std::fmt;

use async_graphql::dynamic;

use crate::error::GatewayError;

pub use schema::SchemaDefinition;

/// Path of the query/mutation transport.
pub const GRAPHQL_PATH: &str = "/graphql";

/// Path of the subscription transport.
pub const SUBSCRIPTIONS_PATH: &str = "/graphql/subscriptions";

/// Limits applied while compiling.
#[derive(Debug, Clone, Copy)]
pub struct SchemaLimits {
    /// Maximum selection depth of a single operation.
    pub max_depth: usize,
}

impl Default for SchemaLimits {
    fn default() -> Self {
        Self { max_depth: 16 }
    }
}

/// A compiled, executable schema shared by both transports.
#[derive(Clone)]
pub struct GatewaySchema {
    inner: dynamic::Schema,
}

impl GatewaySchema {
    /// Compiles `definition` into an executable schema.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::SchemaCompilation`] if a type is undefined,
    /// duplicated, or otherwise invalid.
    pub fn compile(
        definition: SchemaDefinition,
        limits: SchemaLimits,
    ) -> Result<Self, GatewayError> {
        let query_name = definition.query.type_name().to_string();
        let mutation_name = definition
            .mutation
            .as_ref()
            .map(|m| m.type_name().to_string());
        let subscription_name = definition
            .subscription
            .as_ref()
            .map(|s| s.type_name().to_string());

        let mut builder = dynamic::Schema::build(
            &query_name,
            mutation_name.as_deref(),
            subscription_name.as_deref(),
        )
        .register(definition.query)
        .limit_depth(limits.max_depth);

        if let Some(mutation) = definition.mutation {
            builder = builder.register(mutation);
        }
        if let Some(subscription) = definition.subscription {
            builder = builder.register(subscription);
        }
        for ty in definition.types {
            builder = builder.register(ty);
        }

        let inner = builder
            .finish()
            .map_err(|e| GatewayError::SchemaCompilation(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Executes one operation.
    pub async fn execute(&self, request: async_graphql::Request) -> async_graphql::Response {
        self.inner.execute(request).await
    }

    /// Returns the executor handed to the WebSocket transport.
    #[must_use]
    pub fn executor(&self) -> dynamic::Schema {
        self.inner.clone()
    }

    /// Renders the compiled schema as SDL.
    #[must_use]
    pub fn sdl(&self) -> String {
        self.inner.sdl()
    }
}

impl fmt::Debug for GatewaySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySchema").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use async_graphql::dynamic::{Field, FieldFuture, Object, TypeRef};

    use super::*;

    #[test]
    fn messenger_schema_compiles() {
        let Ok(schema) =
            GatewaySchema::compile(SchemaDefinition::messenger(), SchemaLimits::default())
        else {
            panic!("messenger schema should compile");
        };
        let sdl = schema.sdl();
        assert!(sdl.contains("messageSent"));
        assert!(sdl.contains("createUsername"));
    }

    #[test]
    fn undefined_type_fails_compilation() {
        let query = Object::new("Query").field(Field::new(
            "broken",
            TypeRef::named_nn("DoesNotExist"),
            |_| FieldFuture::new(async { Ok(None::<async_graphql::Value>) }),
        ));
        let definition = SchemaDefinition::new(query);

        let result = GatewaySchema::compile(definition, SchemaLimits::default());
        assert!(matches!(result, Err(GatewayError::SchemaCompilation(_))));
    }
}
