pub mod order_items;
pub mod orders;
pub mod products;
pub mod reviews;
pub mod settings;
pub mod users;

pub use order_items::Entity as OrderItems;
pub use orders::Entity as Orders;
pub use products::Entity as Products;
pub use reviews::Entity as Reviews;
pub use settings::Entity as SettingsRecords;
pub use users::Entity as Users;
