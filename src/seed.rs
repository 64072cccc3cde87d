use uuid::Uuid;

use crate::{
    error::AppResult,
    models::{Product, ProductDraft, Role, User},
    services::auth_service::hash_password,
    storage::Storage,
};

const DEMO_PRODUCTS: [(&str, &str, i64, u8, i32, &[&str]); 4] = [
    (
        "Noir Oversized Hoodie",
        "Heavyweight cotton hoodie with a dropped shoulder.",
        4500,
        10,
        25,
        &["Black", "Charcoal"],
    ),
    (
        "Street Cargo Pants",
        "Relaxed cargo pants with six pockets.",
        3800,
        5,
        40,
        &["Black", "Olive"],
    ),
    (
        "Signature Tee",
        "Boxy tee with the signature chest print.",
        1500,
        0,
        60,
        &["Black", "White"],
    ),
    (
        "Urban Bomber Jacket",
        "Nylon bomber with a quilted lining.",
        6500,
        15,
        15,
        &["Black"],
    ),
];

/// Creates the demo catalog when no products exist yet. Returns how many
/// products were inserted.
pub async fn seed_catalog(store: &dyn Storage) -> AppResult<usize> {
    if !store.list_products(None).await?.is_empty() {
        return Ok(0);
    }

    for (name, description, price, discount, stock, colors) in DEMO_PRODUCTS {
        let draft = ProductDraft {
            name: name.to_string(),
            description: description.to_string(),
            original_price: price,
            discount,
            images: Vec::new(),
            colors: colors.iter().map(|c| c.to_string()).collect(),
            sizes: ["S", "M", "L", "XL"].map(String::from).to_vec(),
            stock,
            enabled: true,
        };
        store
            .insert_product(Product::from_draft(Uuid::new_v4(), draft))
            .await?;
    }

    tracing::info!(count = DEMO_PRODUCTS.len(), "demo catalog seeded");
    Ok(DEMO_PRODUCTS.len())
}

/// Returns the id of the account registered under `email`, creating it with
/// `role` when absent.
pub async fn ensure_account(
    store: &dyn Storage,
    email: &str,
    password: &str,
    name: &str,
    role: Role,
) -> AppResult<Uuid> {
    if let Some(existing) = store.find_user_by_email(email).await? {
        return Ok(existing.id);
    }

    let user = User {
        id: Uuid::new_v4(),
        email: email.to_string(),
        password_hash: hash_password(password)?,
        name: name.to_string(),
        role,
        phone: None,
        address: None,
    };
    let user = store.insert_user(user).await?;
    tracing::info!(user_id = %user.id, role = role.as_str(), "account created");
    Ok(user.id)
}
