//! Store Tests

use wadev_common::{
    Direction, NewMessage, NewMessageButton, TemplateButtonInput, TemplateInput,
};

use super::*;

fn text(body: &str) -> NewMessage {
    NewMessage::text("wamid.test", Direction::Outgoing, body, 1700000000)
}

// ========================================================================
// Conversations
// ========================================================================

#[tokio::test]
async fn create_or_append_reuses_conversation_by_phone() {
    let store = Store::new();

    let (first, m1) = store.create_or_append("31612345678", text("one")).await;
    let (second, m2) = store.create_or_append("31612345678", text("two")).await;
    let (other, _) = store.create_or_append("31600000000", text("three")).await;

    assert_eq!(first.id, second.id);
    assert_ne!(first.id, other.id);
    assert_eq!(second.messages.len(), 2);
    assert_eq!(m1.conversation_id, first.id);
    assert!(m2.id > m1.id);
    assert_eq!(first.phone_number_id, "31612345678");
    assert_eq!(store.list_conversations().await.len(), 2);
}

#[tokio::test]
async fn insert_message_requires_conversation() {
    let store = Store::new();
    assert_eq!(
        store.insert_message(9, text("lost")).await.unwrap_err(),
        StoreError::ConversationNotFound(9)
    );

    let (conversation, _) = store.create_or_append("31612345678", text("hi")).await;
    let (after, message) = store
        .insert_message(conversation.id, text("again"))
        .await
        .unwrap();
    assert_eq!(after.messages.len(), 2);
    assert_eq!(message.message, "again");
    assert_eq!(
        store.find_conversation(conversation.id).await.unwrap().messages.len(),
        2
    );
}

#[tokio::test]
async fn latest_message_spans_conversations() {
    let store = Store::new();
    assert!(store.latest_message().await.is_none());

    store.create_or_append("31611111111", text("a")).await;
    store.create_or_append("31622222222", text("b")).await;
    store.create_or_append("31611111111", text("c")).await;

    let (message, conversation) = store.latest_message().await.unwrap();
    assert_eq!(message.message, "c");
    assert_eq!(conversation.phone_number, "31611111111");
}

#[tokio::test]
async fn buttons_are_scoped_to_their_conversation() {
    let store = Store::new();
    let mut new = text("pick one");
    new.buttons = vec![
        NewMessageButton {
            text: "Yes".into(),
            payload: Some("YES".into()),
        },
        NewMessageButton {
            text: "No".into(),
            payload: Some("NO".into()),
        },
    ];
    let (conversation, message) = store.create_or_append("31612345678", new).await;
    let (other, _) = store.create_or_append("31600000000", text("x")).await;

    let no = &message.buttons[1];
    assert_eq!(no.message_id, message.id);
    let found = store.find_button(conversation.id, no.id).await.unwrap();
    assert_eq!(found.payload.as_deref(), Some("NO"));
    assert!(store.find_button(other.id, no.id).await.is_none());
}

// ========================================================================
// Templates
// ========================================================================

fn template_input(name: &str, buttons: &[&str]) -> TemplateInput {
    TemplateInput {
        name: name.into(),
        header: None,
        body: "Hi {{1}}".into(),
        footer: None,
        template_custom_buttons: buttons
            .iter()
            .map(|t| TemplateButtonInput { text: (*t).into() })
            .collect(),
    }
}

#[tokio::test]
async fn template_crud() {
    let store = Store::new();
    let created = store.create_template(template_input("greet", &["A", "B"])).await;
    assert_eq!(created.template_custom_buttons.len(), 2);
    assert_eq!(created.template_custom_buttons[0].template_id, created.id);

    let updated = store
        .update_template(created.id, template_input("greet_v2", &["C"]))
        .await
        .unwrap();
    assert_eq!(updated.name, "greet_v2");
    assert_eq!(updated.template_custom_buttons.len(), 1);
    assert!(store.find_template_by_name("greet").await.is_none());
    assert!(store.find_template_by_name("greet_v2").await.is_some());

    store.delete_template(created.id).await.unwrap();
    assert_eq!(
        store.delete_template(created.id).await,
        Err(StoreError::TemplateNotFound(created.id))
    );
    assert!(store.list_templates().await.is_empty());
}

#[tokio::test]
async fn default_template_seeded_once() {
    let store = Store::new();
    assert!(store.seed_default_template().await);
    assert!(!store.seed_default_template().await);

    let templates = store.list_templates().await;
    assert_eq!(templates.len(), 1);
    assert_eq!(templates[0].name, DEFAULT_TEMPLATE_NAME);
    assert_eq!(templates[0].header.as_deref(), Some("Hello World"));
}
