//! Content entities.
//!
//! The store itself is schemaless; these structs are the shape the
//! application imposes. Image fields hold either a retrieval URL or, while
//! an edit is in flight, a staged `data:` URL the save pipeline resolves.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const HERO_IMAGE_SLOTS: usize = 3;
pub const PROJECT_IMAGE_SLOTS: usize = 3;
pub const FEATURED_CAP: usize = 3;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HeroContent {
    pub heading: String,
    pub description: String,
    /// Exactly three slots; each independently optional while editing.
    pub images: Vec<String>,
}

impl Default for HeroContent {
    fn default() -> Self {
        Self {
            heading: String::new(),
            description: String::new(),
            images: vec![String::new(); HERO_IMAGE_SLOTS],
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AboutLinks {
    pub github: String,
    pub linkedin: String,
    pub email: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Experience {
    pub title: String,
    pub company: String,
    pub period: String,
    pub description: String,
    /// Up to two images per role.
    pub images: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Education {
    pub degree: String,
    pub institution: String,
    pub period: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Skill {
    pub name: String,
    pub level: String,
    pub image: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AboutContent {
    pub name: String,
    pub designation: String,
    pub profile_image: String,
    pub location: String,
    pub languages: Vec<String>,
    pub introduction: String,
    pub links: AboutLinks,
    pub experience: Vec<Experience>,
    pub education: Vec<Education>,
    pub skills: Vec<Skill>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SocialLink {
    pub platform: String,
    pub url: String,
    pub icon: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FooterContent {
    pub copyright: String,
    pub email: String,
    pub phone: String,
    pub location: String,
    pub social_links: Vec<SocialLink>,
}

/// Denormalized mirror of `Project.featured`, capped at [`FEATURED_CAP`].
/// Kept in sync with the flag through one atomic batch write.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HomepageSettings {
    pub featured_projects: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Project {
    pub title: String,
    pub description: String,
    pub images: Vec<String>,
    pub github: String,
    pub demo: String,
    pub tags: Vec<String>,
    pub featured: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BlogStatus {
    #[default]
    Draft,
    Published,
    Scheduled,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct BlogPost {
    pub title: String,
    /// HTML body.
    pub content: String,
    /// Derived from `content` when left empty: tags stripped, 150 chars.
    pub excerpt: String,
    pub cover_image: String,
    pub category: String,
    pub publish_date: Option<DateTime<Utc>>,
    pub status: BlogStatus,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceItem {
    pub id: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub image: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceCategory {
    pub name: String,
    pub description: String,
    /// Contiguous gapless rank matching the displayed sequence.
    pub order: i64,
    pub items: Vec<ResourceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subscriber {
    pub email: String,
    pub created_at: DateTime<Utc>,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactMessage {
    pub name: String,
    pub email: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    pub user_id: String,
    pub action: String,
    pub details: String,
    pub timestamp: DateTime<Utc>,
}
