//! Entity module - Contains all SeaORM entity definitions for the database.
//! These entities represent the database tables and their relationships.
//! Each entity has a Model struct for data and an Entity struct for operations.

pub mod address;
pub mod client;
pub mod contact;
pub mod enums;
pub mod fiscal_year;
pub mod invitation;
pub mod member;
pub mod organization;
pub mod product;
pub mod product_category;
pub mod session;
pub mod supplier;
pub mod user;

// Re-export specific types to avoid conflicts
pub use address::{Column as AddressColumn, Entity as Address, Model as AddressModel};
pub use client::{Column as ClientColumn, Entity as Client, Model as ClientModel};
pub use contact::{Column as ContactColumn, Entity as Contact, Model as ContactModel};
pub use fiscal_year::{
    Column as FiscalYearColumn, Entity as FiscalYear, Model as FiscalYearModel,
};
pub use invitation::{
    Column as InvitationColumn, Entity as Invitation, Model as InvitationModel,
};
pub use member::{Column as MemberColumn, Entity as Member, Model as MemberModel};
pub use organization::{
    Column as OrganizationColumn, Entity as Organization, Model as OrganizationModel,
};
pub use product::{Column as ProductColumn, Entity as Product, Model as ProductModel};
pub use product_category::{
    Column as ProductCategoryColumn, Entity as ProductCategory, Model as ProductCategoryModel,
};
pub use session::{Column as SessionColumn, Entity as Session, Model as SessionModel};
pub use supplier::{Column as SupplierColumn, Entity as Supplier, Model as SupplierModel};
pub use user::{Column as UserColumn, Entity as User, Model as UserModel};
