use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;
use validator::Validate;

/// Tenant class. Candidates are single-user B2C accounts, companies are
/// B2B organizations with a team.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TenantType {
    Candidate,
    Company,
}

impl TenantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Candidate => "candidate",
            Self::Company => "company",
        }
    }
}

impl std::fmt::Display for TenantType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for TenantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "candidate" => Ok(Self::Candidate),
            "company" => Ok(Self::Company),
            other => Err(format!("unknown tenant type: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub tenant_type: TenantType,
    pub name: String,
    pub slug: String,
    pub website: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Tenant {
    pub fn is_company(&self) -> bool {
        self.tenant_type == TenantType::Company
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct NewTenant {
    pub tenant_type: TenantType,

    #[validate(length(min = 1, max = 255))]
    pub name: String,

    #[validate(length(min = 3, max = 63), regex(path = *SLUG_REGEX))]
    pub slug: String,

    #[validate(url)]
    pub website: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate)]
pub struct UpdateTenant {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,

    #[validate(url)]
    pub website: Option<String>,
}

lazy_static::lazy_static! {
    pub static ref SLUG_REGEX: regex::Regex = regex::Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").unwrap();
}

/// Turn a display name into a slug candidate ("Acme Corp." -> "acme-corp").
/// Short results are padded so they still satisfy the 3-character minimum.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut last_dash = true;

    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
            last_dash = false;
        } else if !last_dash {
            slug.push('-');
            last_dash = true;
        }
    }

    while slug.ends_with('-') {
        slug.pop();
    }
    slug.truncate(50);
    while slug.ends_with('-') {
        slug.pop();
    }

    if slug.len() < 3 {
        if !slug.is_empty() {
            slug.push('-');
        }
        slug.push_str("team");
    }

    slug
}
