use axum::{
    Json, Router,
    extract::State,
    routing::post,
};
use datatable::{
    ColumnFilter, DataTableError, DataTableService, GlobalFilter, Rendered, RelationSpec,
    RequestParams, SeaQuery,
};
use sea_orm::{
    ConnectionTrait, Database, DatabaseConnection, DbErr, EntityTrait, Schema, Set,
};

pub mod post_entity;
pub mod role_entity;
pub mod user_entity;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

pub async fn setup_test_db() -> Result<DatabaseConnection, DbErr> {
    init_tracing();
    let db = Database::connect("sqlite::memory:").await?;
    let backend = db.get_database_backend();
    let schema = Schema::new(backend);

    db.execute(backend.build(&schema.create_table_from_entity(role_entity::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(user_entity::Entity)))
        .await?;
    db.execute(backend.build(&schema.create_table_from_entity(post_entity::Entity)))
        .await?;

    seed(&db).await?;
    Ok(db)
}

async fn seed(db: &DatabaseConnection) -> Result<(), DbErr> {
    role_entity::Entity::insert_many([
        role_entity::ActiveModel {
            id: Set(1),
            name: Set("Admin".to_string()),
        },
        role_entity::ActiveModel {
            id: Set(2),
            name: Set("Editor".to_string()),
        },
    ])
    .exec(db)
    .await?;

    let users = [
        (1, "John", "john@example.com", 30, 1),
        (2, "jose", "jose@example.org", 25, 2),
        (3, "Amy", "amy@example.com", 30, 2),
        (4, "Bob", "bob@test.io", 41, 1),
    ];
    user_entity::Entity::insert_many(users.into_iter().map(|(id, name, email, age, role_id)| {
        user_entity::ActiveModel {
            id: Set(id),
            name: Set(name.to_string()),
            email: Set(email.to_string()),
            age: Set(age),
            role_id: Set(role_id),
        }
    }))
    .exec(db)
    .await?;

    let posts = [
        (1, 1, "Rust tips", true),
        (2, 3, "Draft notes", false),
        (3, 3, "Hello world", true),
    ];
    post_entity::Entity::insert_many(posts.into_iter().map(|(id, user_id, title, published)| {
        post_entity::ActiveModel {
            id: Set(id),
            user_id: Set(user_id),
            title: Set(title.to_string()),
            published: Set(published),
        }
    }))
    .exec(db)
    .await?;

    Ok(())
}

/// Users query with its `role` and `posts` relations registered.
pub fn users_query(db: DatabaseConnection) -> SeaQuery<user_entity::Entity> {
    SeaQuery::new(db)
        .with_relation("role", RelationSpec::new("roles", "id", "role_id"))
        .with_relation("posts", RelationSpec::new("posts", "user_id", "id"))
}

pub fn users_table(db: DatabaseConnection) -> DataTableService<SeaQuery<user_entity::Entity>> {
    DataTableService::new(users_query(db)).with_path("/users")
}

async fn list_users(
    State(db): State<DatabaseConnection>,
    Json(params): Json<RequestParams>,
) -> Result<Rendered<user_entity::Model>, DataTableError> {
    let mut table = users_table(db);
    table
        .set_global_filters([GlobalFilter::new("name"), GlobalFilter::new("email")])?
        .set_column_filters([ColumnFilter::new("role_id"), ColumnFilter::new("role.name")])?
        .set_download_columns(["id", "name", "email"]);
    table.ingest_request(&params);
    table.render().await
}

async fn search_users(
    State(db): State<DatabaseConnection>,
    axum::extract::Query(params): axum::extract::Query<RequestParams>,
) -> Result<Rendered<user_entity::Model>, DataTableError> {
    let mut table = users_table(db);
    table.set_global_filters([GlobalFilter::new("name")])?;
    table.ingest_request(&params);
    table.render().await
}

/// Rejects out of range page sizes instead of clamping them.
async fn strict_users(
    State(db): State<DatabaseConnection>,
    Json(params): Json<RequestParams>,
) -> Result<Rendered<user_entity::Model>, DataTableError> {
    let mut table = users_table(db);
    table.set_items_per_page(params.items_per_page.unwrap_or(10))?;
    table.render().await
}

pub fn setup_test_app(db: DatabaseConnection) -> Router {
    let api = Router::new()
        .route("/users", post(list_users).get(search_users))
        .route("/users/strict", post(strict_users))
        .with_state(db);

    Router::new().nest("/api/v1", api)
}
