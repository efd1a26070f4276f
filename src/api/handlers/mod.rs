/// Postal addresses of clients and suppliers
pub mod addresses;
/// Client records
pub mod clients;
/// Client and supplier contacts
pub mod contacts;
/// Fiscal years
pub mod fiscal_years;
/// Sent and received invitations
pub mod invitations;
/// Memberships and roles
pub mod members;
/// Organizations and their dashboard
pub mod organizations;
/// Product catalog and categories
pub mod products;
/// Session bridge and the current user
pub mod session;
/// Supplier records
pub mod suppliers;
/// Health and enum labels
pub mod system;
