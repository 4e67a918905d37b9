use std::fmt;

use serde::{Deserialize, Serialize};

/// One of the fixed square sizes an uploaded image is rendered at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum Resolution {
    Large,
    Medium,
    Thumbnail,
}

impl Resolution {
    /// Every resolution, largest first.
    pub const ALL: [Resolution; 3] = [Resolution::Large, Resolution::Medium, Resolution::Thumbnail];

    pub const fn px(self) -> u32 {
        match self {
            Resolution::Large => 1080,
            Resolution::Medium => 400,
            Resolution::Thumbnail => 48,
        }
    }
}

impl TryFrom<u32> for Resolution {
    type Error = String;

    fn try_from(px: u32) -> Result<Self, Self::Error> {
        match px {
            1080 => Ok(Resolution::Large),
            400 => Ok(Resolution::Medium),
            48 => Ok(Resolution::Thumbnail),
            other => Err(format!("unsupported resolution {other}, expected 1080, 400 or 48")),
        }
    }
}

impl From<Resolution> for u32 {
    fn from(r: Resolution) -> Self {
        r.px()
    }
}

impl fmt::Display for Resolution {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.px())
    }
}

/// A raw file received from a client, before any checks.
#[derive(Clone)]
pub struct Upload {
    pub file_name: Option<String>,
    pub declared_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(file_name: Option<String>, declared_type: Option<String>, bytes: Vec<u8>) -> Self {
        Self { file_name, declared_type, bytes }
    }

    /// Name used in log lines and rejection messages.
    pub fn label(&self) -> &str {
        self.file_name.as_deref().unwrap_or("<unnamed>")
    }
}

impl fmt::Debug for Upload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Upload")
            .field("file_name", &self.file_name)
            .field("declared_type", &self.declared_type)
            .field("size", &self.bytes.len())
            .finish()
    }
}

/// One re-encoded rendition ready to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedVariant {
    pub resolution: Resolution,
    pub width: u32,
    pub height: u32,
    pub content_type: &'static str,
    pub bytes: Vec<u8>,
}

/// Image references persisted on a product row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductImages {
    pub primary: String,
    #[serde(default)]
    pub additional: Vec<String>,
}

impl ProductImages {
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        std::iter::once(&self.primary)
            .filter(|p| !p.is_empty())
            .chain(self.additional.iter())
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_empty() && self.additional.is_empty()
    }

    /// References held by `self` that `other` no longer mentions.
    pub fn superseded_by(&self, other: &ProductImages) -> ProductImages {
        let keep: Vec<&String> = other.iter().collect();
        let mut dropped = self.iter().filter(|r| !keep.contains(r)).cloned();

        ProductImages {
            primary: dropped.next().unwrap_or_default(),
            additional: dropped.collect(),
        }
    }
}

/// Locators for one reference at every standard size.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ResolvedImage {
    pub reference: String,
    pub large: String,
    pub medium: String,
    pub thumbnail: String,
}

/// Outcome of a best-effort cleanup.
#[derive(Debug, Default, Clone, Serialize, PartialEq, Eq)]
pub struct DiscardReport {
    pub removed: Vec<String>,
    pub failed: Vec<String>,
}

impl DiscardReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}
