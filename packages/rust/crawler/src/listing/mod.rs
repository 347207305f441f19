//! Listing Navigator: from a chapter entry URL to every member stub.

mod dedup;
mod harvest;
mod navigator;
mod patterns;

pub use dedup::dedup_by_profile_url;
pub use harvest::{
    LISTING_ROWS, LISTING_TABLE, ListingPage, NEXT_CONTROL, NextControl, RowData,
    read_listing_page, stub_from_row,
};
pub use navigator::ListingNavigator;
pub use patterns::ListingPatterns;
