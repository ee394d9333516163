//! Conversion from remote API wire types to domain models

use super::api::ApiConversation;
use crate::models::{AuthorKind, Conversation, ConversationId, Message, MessageId};

/// Normalize a wire conversation into a domain [`Conversation`], enforcing
/// model invariants (timestamp ordering, message uniqueness and order).
pub fn normalize_conversation(api: ApiConversation) -> Conversation {
    let conversation_id = ConversationId::new(api.id);

    let messages = api
        .messages
        .into_iter()
        .map(|m| Message {
            id: MessageId::new(m.id),
            conversation_id: conversation_id.clone(),
            author: AuthorKind::parse(&m.author_type),
            body: m.body,
            created_at: m.created_at,
            part_kind: m.part_kind,
        })
        .collect();

    Conversation {
        id: conversation_id,
        created_at: api.created_at,
        updated_at: api.updated_at,
        customer_email: api.customer.and_then(|c| c.email),
        tags: api.tags,
        messages,
    }
    .normalize()
}
