//! Type definitions of the messenger schema.
//!
//! Each object is declared here and bound to its resolver functions from
//! [`super::resolvers`]. The SDL equivalent:
//!
//! ```graphql
//! type User { id: ID!, username: String, email: String, name: String, image: String }
//! type CreateUsernameResponse { success: Boolean!, error: String }
//! type Message { id: ID!, conversationId: ID!, senderId: ID!, body: String!, createdAt: String! }
//!
//! type Query { me: User, searchUsers(username: String!): [User!]! }
//! type Mutation {
//!   createUsername(username: String!): CreateUsernameResponse!
//!   sendMessage(conversationId: ID!, body: String!): Message!
//! }
//! type Subscription { messageSent(conversationId: ID!): Message! }
//! ```

use std::fmt;

use async_graphql::dynamic::{
    Field, InputValue, Object, Subscription, SubscriptionField, Type, TypeRef,
};

use super::resolvers;

/// Type definitions plus resolver bindings, ready to compile.
pub struct SchemaDefinition {
    /// Root query type.
    pub query: Object,
    /// Root mutation type.
    pub mutation: Option<Object>,
    /// Root subscription type.
    pub subscription: Option<Subscription>,
    /// Every other type reachable from the roots.
    pub types: Vec<Type>,
}

impl SchemaDefinition {
    /// Starts a definition with only a query root.
    #[must_use]
    pub fn new(query: Object) -> Self {
        Self {
            query,
            mutation: None,
            subscription: None,
            types: Vec::new(),
        }
    }

    /// Sets the mutation root.
    #[must_use]
    pub fn mutation(mut self, mutation: Object) -> Self {
        self.mutation = Some(mutation);
        self
    }

    /// Sets the subscription root.
    #[must_use]
    pub fn subscription(mut self, subscription: Subscription) -> Self {
        self.subscription = Some(subscription);
        self
    }

    /// Adds a non-root type.
    #[must_use]
    pub fn register(mut self, ty: impl Into<Type>) -> Self {
        self.types.push(ty.into());
        self
    }

    /// The schema served by the gateway.
    #[must_use]
    pub fn messenger() -> Self {
        Self::new(query_root())
            .mutation(mutation_root())
            .subscription(subscription_root())
            .register(user_type())
            .register(create_username_response_type())
            .register(message_type())
    }
}

impl fmt::Debug for SchemaDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SchemaDefinition")
            .field("query", &self.query.type_name())
            .field("mutation", &self.mutation.as_ref().map(Object::type_name))
            .field(
                "subscription",
                &self.subscription.as_ref().map(Subscription::type_name),
            )
            .field("types", &self.types.len())
            .finish()
    }
}

fn query_root() -> Object {
    Object::new("Query")
        .field(Field::new("me", TypeRef::named("User"), resolvers::me))
        .field(
            Field::new(
                "searchUsers",
                TypeRef::named_nn_list_nn("User"),
                resolvers::search_users,
            )
            .argument(InputValue::new("username", TypeRef::named_nn(TypeRef::STRING))),
        )
}

fn mutation_root() -> Object {
    Object::new("Mutation")
        .field(
            Field::new(
                "createUsername",
                TypeRef::named_nn("CreateUsernameResponse"),
                resolvers::create_username,
            )
            .argument(InputValue::new("username", TypeRef::named_nn(TypeRef::STRING))),
        )
        .field(
            Field::new(
                "sendMessage",
                TypeRef::named_nn("Message"),
                resolvers::send_message,
            )
            .argument(InputValue::new("conversationId", TypeRef::named_nn(TypeRef::ID)))
            .argument(InputValue::new("body", TypeRef::named_nn(TypeRef::STRING))),
        )
}

fn subscription_root() -> Subscription {
    Subscription::new("Subscription").field(
        SubscriptionField::new(
            "messageSent",
            TypeRef::named_nn("Message"),
            resolvers::message_sent,
        )
        .argument(InputValue::new("conversationId", TypeRef::named_nn(TypeRef::ID))),
    )
}

fn user_type() -> Object {
    Object::new("User")
        .field(Field::new("id", TypeRef::named_nn(TypeRef::ID), resolvers::user_id))
        .field(Field::new(
            "username",
            TypeRef::named(TypeRef::STRING),
            resolvers::user_username,
        ))
        .field(Field::new(
            "email",
            TypeRef::named(TypeRef::STRING),
            resolvers::user_email,
        ))
        .field(Field::new(
            "name",
            TypeRef::named(TypeRef::STRING),
            resolvers::user_name,
        ))
        .field(Field::new(
            "image",
            TypeRef::named(TypeRef::STRING),
            resolvers::user_image,
        ))
}

fn create_username_response_type() -> Object {
    Object::new("CreateUsernameResponse")
        .field(Field::new(
            "success",
            TypeRef::named_nn(TypeRef::BOOLEAN),
            resolvers::username_success,
        ))
        .field(Field::new(
            "error",
            TypeRef::named(TypeRef::STRING),
            resolvers::username_error,
        ))
}

fn message_type() -> Object {
    Object::new("Message")
        .field(Field::new("id", TypeRef::named_nn(TypeRef::ID), resolvers::message_id))
        .field(Field::new(
            "conversationId",
            TypeRef::named_nn(TypeRef::ID),
            resolvers::message_conversation_id,
        ))
        .field(Field::new(
            "senderId",
            TypeRef::named_nn(TypeRef::ID),
            resolvers::message_sender_id,
        ))
        .field(Field::new(
            "body",
            TypeRef::named_nn(TypeRef::STRING),
            resolvers::message_body,
        ))
        .field(Field::new(
            "createdAt",
            TypeRef::named_nn(TypeRef::STRING),
            resolvers::message_created_at,
        ))
}
