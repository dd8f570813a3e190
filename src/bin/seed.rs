use axum_storefront_api::{
    config::AppConfig,
    db::{create_orm_conn, run_migrations},
    entity::{
        products::{ActiveModel as ProductActive, Column as ProductCol, Entity as Products, ProductImage, ProductImages},
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, UserRole},
    },
    services::auth_service::hash_password,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set};
use uuid::Uuid;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = AppConfig::from_env()?;

    let orm = create_orm_conn(&config.database_url).await?;
    // Ensure migrations are applied.
    run_migrations(&orm).await?;

    let admin_id = ensure_user(&orm, "admin", "admin@example.com", "admin1234", UserRole::Admin).await?;
    let user_id =
        ensure_user(&orm, "customer", "user@example.com", "user12345", UserRole::Customer).await?;
    seed_products(&orm).await?;

    println!("Seed completed. Admin ID: {admin_id}, User ID: {user_id}");
    Ok(())
}

async fn ensure_user(
    orm: &DatabaseConnection,
    name: &str,
    email: &str,
    password: &str,
    role: UserRole,
) -> anyhow::Result<Uuid> {
    if let Some(existing) = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(orm)
        .await?
    {
        println!("User {email} already present");
        return Ok(existing.id);
    }

    let password_hash = hash_password(password).map_err(|e| anyhow::anyhow!(e.to_string()))?;
    let user = UserActive {
        id: Set(Uuid::new_v4()),
        name: Set(name.to_string()),
        email: Set(email.to_string()),
        password_hash: Set(Some(password_hash)),
        google_id: Set(None),
        role: Set(role.clone()),
        address: Set(None),
        reset_password_token: Set(None),
        reset_password_expires: Set(None),
        created_at: Set(Utc::now().into()),
    }
    .insert(orm)
    .await?;

    println!("Ensured user {email} (role={})", role.as_str());
    Ok(user.id)
}

async fn seed_products(orm: &DatabaseConnection) -> anyhow::Result<()> {
    let products = vec![
        ("Classic Cotton Tee", "Soft everyday t-shirt", "Apparel", Some("Tops"), Decimal::new(49900, 2), 50),
        ("Trail Running Shoes", "Lightweight shoes with grippy soles", "Footwear", Some("Running"), Decimal::new(349900, 2), 25),
        ("Steel Water Bottle", "Keeps drinks cold for 24 hours", "Accessories", None, Decimal::new(79900, 2), 120),
        ("Canvas Backpack", "20L backpack with laptop sleeve", "Bags", Some("Backpacks"), Decimal::new(149900, 2), 40),
    ];

    for (name, description, category, sub_category, price, stock) in products {
        if Products::find()
            .filter(ProductCol::Name.eq(name))
            .one(orm)
            .await?
            .is_some()
        {
            continue;
        }

        let now = Utc::now();
        ProductActive {
            id: Set(Uuid::new_v4()),
            name: Set(name.to_string()),
            description: Set(description.to_string()),
            price: Set(price),
            category: Set(category.to_string()),
            sub_category: Set(sub_category.map(str::to_string)),
            stock: Set(stock),
            images: Set(ProductImages(vec![ProductImage {
                url: format!("https://images.example.com/{}.jpg", name.to_lowercase().replace(' ', "-")),
                public_id: format!("seed/{}", name.to_lowercase().replace(' ', "-")),
            }])),
            num_of_reviews: Set(0),
            rating_sum: Set(0),
            average_rating: Set(0.0),
            created_at: Set(now.into()),
            updated_at: Set(now.into()),
        }
        .insert(orm)
        .await?;
    }

    println!("Seeded products");
    Ok(())
}
