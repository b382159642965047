//! # Content
//!
//! Domain layer of the portfolio service: the content model, the public
//! read-path cache, and the admin save pipeline.
//!
//! ## Save pipeline
//!
//! Every admin editor follows the same round trip: load (materializing a
//! default singleton on first read), edit locally through pure array
//! helpers, stage images as `data:` URLs, then save. A save uploads all
//! staged slots concurrently, substitutes the returned retrieval URLs,
//! writes the full document with a single store call, and invalidates the
//! affected cache keys. The save payload becomes the reconciled state; no
//! refetch, no automatic retry, errors leave state untouched for the
//! operator to resubmit.
//!
//! ## Read path
//!
//! Public reads go exclusively through [`ContentCache`]: TTL'd entries with
//! a stale-on-error fallback and an invalidation bus the save pipeline
//! feeds.

pub mod activity;
pub mod blog;
pub mod cache;
pub mod editor;
pub mod error;
pub mod model;
pub mod projects;
pub mod resources;
pub mod subscribers;

pub use cache::ContentCache;
pub use error::ContentError;

/// Collection names, well-known document ids, cache keys and TTL tiers.
pub mod keys {
    use std::time::Duration;

    pub const CONTENT: &str = "content";
    pub const SETTINGS: &str = "settings";
    pub const PROJECTS: &str = "projects";
    pub const BLOG: &str = "blog";
    pub const RESOURCE_CATEGORIES: &str = "resourceCategories";
    pub const SUBSCRIBERS: &str = "subscribers";
    pub const MESSAGES: &str = "messages";
    pub const ADMIN_ACTIVITY: &str = "adminActivity";

    pub const HERO_ID: &str = "hero";
    pub const ABOUT_ID: &str = "about";
    pub const FOOTER_ID: &str = "footer";
    pub const HOMEPAGE_ID: &str = "homepage";

    pub const HERO_CACHE: &str = "hero-content";
    pub const ABOUT_CACHE: &str = "about-content";
    pub const FOOTER_CACHE: &str = "footer-content";
    pub const PROJECTS_CACHE: &str = "projects";
    pub const FEATURED_CACHE: &str = "featured-projects";
    pub const BLOG_CACHE: &str = "blog-posts";
    pub const RESOURCES_CACHE: &str = "resource-categories";

    pub const LONG_TTL: Duration = Duration::from_secs(60 * 60);
    pub const MEDIUM_TTL: Duration = Duration::from_secs(15 * 60);
    pub const SHORT_TTL: Duration = Duration::from_secs(5 * 60);
}
