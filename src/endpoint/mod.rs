// ABOUTME: Endpoint resolution: catalog lookups, token parsing and group expansion.
// ABOUTME: Produces the immutable EndpointSpec/RelaySpec values consumed by the dialer.

mod catalog;
mod error;
mod resolver;
mod spec;
mod token;

pub use catalog::{Catalog, CatalogHost, RelayRecord, UserRecord};
pub use error::{Error, Result};
pub use resolver::{AuthPolicy, ExpandedTokens, GROUP_MARKER, Resolver, resolve, system_username};
pub use spec::{CredentialHint, DEFAULT_PORT, EndpointSpec, RelaySpec};
