use mongodb::{Database, IndexModel, options::IndexOptions};
use tracing::info;

use crate::models::{Chat, Message, Organization, Project, Team, User};

pub async fn ensure_indexes(db: &Database) -> Result<(), mongodb::error::Error> {
    // Organizations
    create_indexes(
        db,
        Organization::COLLECTION,
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index_unique(bson::doc! { "domain": 1 }),
        ],
    )
    .await?;

    // Users
    create_indexes(
        db,
        User::COLLECTION,
        vec![
            index_unique(bson::doc! { "email": 1 }),
            index(bson::doc! { "organization_id": 1, "name": 1 }),
        ],
    )
    .await?;

    // Teams
    create_indexes(
        db,
        Team::COLLECTION,
        vec![
            index(bson::doc! { "organization_id": 1, "name": 1 }),
            index(bson::doc! { "members.user_id": 1 }),
        ],
    )
    .await?;

    // Projects
    create_indexes(
        db,
        Project::COLLECTION,
        vec![index(bson::doc! { "team_id": 1, "created_at": -1 })],
    )
    .await?;

    // Chats
    create_indexes(
        db,
        Chat::COLLECTION,
        vec![index(bson::doc! { "project_id": 1, "created_at": -1 })],
    )
    .await?;

    // Messages
    create_indexes(
        db,
        Message::COLLECTION,
        vec![index(bson::doc! { "chat_id": 1, "created_at": 1 })],
    )
    .await?;

    info!("All indexes ensured");
    Ok(())
}

fn index(keys: bson::Document) -> IndexModel {
    IndexModel::builder().keys(keys).build()
}

fn index_unique(keys: bson::Document) -> IndexModel {
    IndexModel::builder()
        .keys(keys)
        .options(IndexOptions::builder().unique(true).build())
        .build()
}

async fn create_indexes(
    db: &Database,
    collection: &str,
    indexes: Vec<IndexModel>,
) -> Result<(), mongodb::error::Error> {
    db.collection::<bson::Document>(collection)
        .create_indexes(indexes)
        .await?;
    info!(collection, "Indexes created");
    Ok(())
}
