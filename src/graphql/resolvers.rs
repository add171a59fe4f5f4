//! Resolver functions bound by [`super::schema`].
//!
//! Root resolvers pull the [`ExecutionContext`] out of the operation data;
//! authorization is decided here, not by the transports.

use async_graphql::Value;
use async_graphql::dynamic::{FieldFuture, FieldValue, ResolverContext, SubscriptionFieldFuture};
use futures_util::StreamExt;
use futures_util::future::ready;

use crate::context::ExecutionContext;
use crate::domain::{BusEvent, Message, NewMessage, Topic, User};
use crate::persistence::UsernameUpdate;

/// Parent value of `CreateUsernameResponse`.
#[derive(Debug, Clone)]
struct UsernameResult {
    success: bool,
    error: Option<String>,
}

/// `Query.me`: the caller's user, or `null` when unauthenticated.
pub fn me(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<ExecutionContext>()?;
        Ok(context
            .session()
            .map(|session| FieldValue::owned_any(session.user.clone())))
    })
}

/// `Query.searchUsers`: users matching a username fragment.
pub fn search_users(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<ExecutionContext>()?;
        let session = context.require_session()?;
        let query = ctx.args.try_get("username")?.string()?.to_string();

        let users = context
            .database()
            .repository()
            .search_users(&query, &session.user.id)
            .await?;

        Ok(Some(FieldValue::list(
            users.into_iter().map(FieldValue::owned_any),
        )))
    })
}

/// `Mutation.createUsername`: claims a username for the caller.
pub fn create_username(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<ExecutionContext>()?;
        let session = context.require_session()?;
        let username = ctx.args.try_get("username")?.string()?.trim().to_string();

        if username.is_empty() {
            return Ok(Some(FieldValue::owned_any(UsernameResult {
                success: false,
                error: Some("Username must not be empty".to_string()),
            })));
        }

        let repository = context.database().repository();
        repository.upsert_user(&session.user).await?;
        let outcome = repository.set_username(&session.user.id, &username).await?;

        let result = match outcome {
            UsernameUpdate::Updated => UsernameResult {
                success: true,
                error: None,
            },
            UsernameUpdate::Taken => UsernameResult {
                success: false,
                error: Some("Username already taken. Try another".to_string()),
            },
        };
        Ok(Some(FieldValue::owned_any(result)))
    })
}

/// `Mutation.sendMessage`: stores a message and publishes it on the bus.
pub fn send_message(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    FieldFuture::new(async move {
        let context = ctx.data::<ExecutionContext>()?;
        let session = context.require_session()?;
        let conversation_id = ctx.args.try_get("conversationId")?.string()?.to_string();
        let body = ctx.args.try_get("body")?.string()?.to_string();

        if body.trim().is_empty() {
            return Err(async_graphql::Error::new("Message body must not be empty"));
        }

        let repository = context.database().repository();
        repository.upsert_user(&session.user).await?;
        let message = repository
            .insert_message(NewMessage {
                conversation_id,
                sender_id: session.user.id.clone(),
                body,
            })
            .await?;

        let delivered = context
            .event_bus()
            .publish(BusEvent::MessageSent(message.clone()));
        tracing::debug!(message_id = %message.id, delivered, "message published");

        Ok(Some(FieldValue::owned_any(message)))
    })
}

/// `Subscription.messageSent`: messages sent to one conversation.
pub fn message_sent(ctx: ResolverContext<'_>) -> SubscriptionFieldFuture<'_> {
    SubscriptionFieldFuture::new(async move {
        let context = ctx.data::<ExecutionContext>()?;
        context.require_session()?;
        let conversation_id = ctx.args.try_get("conversationId")?.string()?.to_string();

        let stream = context
            .event_bus()
            .topic_stream(Topic::MessageSent)
            .filter_map(move |event| {
                let item = match event {
                    BusEvent::MessageSent(message) if message.conversation_id == conversation_id => {
                        Some(Ok::<_, async_graphql::Error>(FieldValue::owned_any(message)))
                    }
                    BusEvent::MessageSent(_) => None,
                };
                ready(item)
            });
        Ok(stream)
    })
}

fn parent_field<'a, T>(
    ctx: ResolverContext<'a>,
    project: fn(&T) -> Option<Value>,
) -> FieldFuture<'a>
where
    T: Send + Sync + 'static,
{
    FieldFuture::new(async move {
        let parent = ctx.parent_value.try_downcast_ref::<T>()?;
        Ok(project(parent))
    })
}

/// `User.id`.
pub fn user_id(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<User>(ctx, |u| Some(Value::from(u.id.clone())))
}

/// `User.username`.
pub fn user_username(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<User>(ctx, |u| u.username.clone().map(Value::from))
}

/// `User.email`.
pub fn user_email(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<User>(ctx, |u| u.email.clone().map(Value::from))
}

/// `User.name`.
pub fn user_name(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<User>(ctx, |u| u.name.clone().map(Value::from))
}

/// `User.image`.
pub fn user_image(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<User>(ctx, |u| u.image.clone().map(Value::from))
}

/// `CreateUsernameResponse.success`.
pub fn username_success(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<UsernameResult>(ctx, |r| Some(Value::from(r.success)))
}

/// `CreateUsernameResponse.error`.
pub fn username_error(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<UsernameResult>(ctx, |r| r.error.clone().map(Value::from))
}

/// `Message.id`.
pub fn message_id(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<Message>(ctx, |m| Some(Value::from(m.id.to_string())))
}

/// `Message.conversationId`.
pub fn message_conversation_id(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<Message>(ctx, |m| Some(Value::from(m.conversation_id.clone())))
}

/// `Message.senderId`.
pub fn message_sender_id(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<Message>(ctx, |m| Some(Value::from(m.sender_id.clone())))
}

/// `Message.body`.
pub fn message_body(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<Message>(ctx, |m| Some(Value::from(m.body.clone())))
}

/// `Message.createdAt`, RFC 3339.
pub fn message_created_at(ctx: ResolverContext<'_>) -> FieldFuture<'_> {
    parent_field::<Message>(ctx, |m| Some(Value::from(m.created_at.to_rfc3339())))
}
