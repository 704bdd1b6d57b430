//! Integration tests for `ChannelRepository` against an in-memory SQLite database

use whispr_core::ChannelType;
use whispr_db::{models::NewChannel, ChannelRepository, SqliteDb};

async fn db() -> SqliteDb {
    SqliteDb::in_memory().await.expect("could not create in-memory db")
}

fn voice(name: &str) -> NewChannel<'_> {
    NewChannel { name, channel_type: ChannelType::Voice, is_default: false, key_material: None }
}

#[tokio::test]
async fn create_and_load_channel() {
    let db = db().await;

    let channel = ChannelRepository::create(
        &db,
        NewChannel { is_default: true, ..voice("Lobby") },
    )
    .await
    .unwrap();

    assert_eq!(channel.name, "Lobby");
    assert!(channel.is_default);
    assert_eq!(channel.channel_type, ChannelType::Voice);

    let loaded = ChannelRepository::get_by_id(&db, channel.id).await.unwrap().unwrap();
    assert_eq!(loaded.id, channel.id);
    assert_eq!(loaded.name, "Lobby");
}

#[tokio::test]
async fn list_channels() {
    let db = db().await;

    ChannelRepository::create(&db, voice("A")).await.unwrap();
    ChannelRepository::create(&db, voice("B")).await.unwrap();
    ChannelRepository::create(&db, voice("C")).await.unwrap();

    let channels = ChannelRepository::list(&db).await.unwrap();
    assert!(channels.len() >= 3);
}

#[tokio::test]
async fn delete_channel() {
    let db = db().await;

    let channel = ChannelRepository::create(&db, voice("Deleteme")).await.unwrap();

    let deleted = ChannelRepository::delete(&db, channel.id).await.unwrap();
    assert!(deleted);

    let missing = ChannelRepository::get_by_id(&db, channel.id).await.unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn text_channel_type_round_trips() {
    let db = db().await;

    let channel = ChannelRepository::create(
        &db,
        NewChannel { channel_type: ChannelType::Text, ..voice("Chat") },
    )
    .await
    .unwrap();

    assert_eq!(channel.channel_type, ChannelType::Text);

    let loaded = ChannelRepository::get_by_id(&db, channel.id).await.unwrap().unwrap();
    assert_eq!(loaded.channel_type, ChannelType::Text);
}

#[tokio::test]
async fn key_material_round_trips() {
    let db = db().await;

    let key = vec![7u8; 32];
    let channel = ChannelRepository::create(
        &db,
        NewChannel { key_material: Some(key.clone()), ..voice("Secret") },
    )
    .await
    .unwrap();

    assert_eq!(channel.key_material, Some(key.clone()));

    let loaded = ChannelRepository::get_by_id(&db, channel.id).await.unwrap().unwrap();
    assert_eq!(loaded.key_material, Some(key));
}
