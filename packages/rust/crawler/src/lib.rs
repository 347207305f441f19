//! Listing navigation and profile extraction over a browser capability.
//!
//! This crate provides:
//! - [`normalize`]: contact-number canonicalization
//! - [`listing`]: the Listing Navigator (resolve, paginate, dedup)
//! - [`resolvers`]: the ordered ways of reaching a member listing
//! - [`profile`]: the Profile Extractor and its [`SectionCatalog`]
//! - [`retry`] and [`strategy`]: retry policy and named fallback chains

pub mod listing;
pub mod normalize;
pub mod profile;
pub mod resolvers;
pub mod retry;
pub mod strategy;

pub use listing::{ListingNavigator, ListingPatterns, dedup_by_profile_url};
pub use normalize::{find_phone, normalize_phone};
pub use profile::{NAVIGATION_FAILED, ProfileExtractor, SectionCatalog};
pub use resolvers::{ListingResolver, ResolveContext, ResolvedListing, ResolverChain};
pub use retry::RetryPolicy;
pub use strategy::{Strategy, first_match};
