/// Postal addresses of clients and suppliers
pub mod address;
/// Sessions, users and membership checks
pub mod auth;
/// Client records, references and statuses
pub mod client;
/// Contacts of clients and suppliers
pub mod contact;
/// Fiscal year periods and their lifecycle
pub mod fiscal_year;
/// Invitations to join an organization
pub mod invitation;
/// Display labels for every enumerated value
pub mod labels;
/// Memberships and roles
pub mod member;
/// Tenant creation, settings and overview
pub mod organization;
/// Page requests and paginated results
pub mod pagination;
/// Product catalog and categories
pub mod product;
/// Supplier records, references and statuses
pub mod supplier;
/// Allowed status transitions
pub mod transitions;
/// Field validation helpers shared by every form
pub mod validation;
