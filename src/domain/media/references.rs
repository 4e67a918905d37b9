use once_cell::sync::Lazy;
use regex::Regex;
use uuid::Uuid;

use crate::{constants::VARIANT_EXTENSION, entities::image::Resolution};

static MANAGED_KEY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?P<id>[0-9A-Fa-f-]{36})(?:_(?P<px>1080|400|48))?\.(?P<ext>[A-Za-z0-9]+)$")
        .expect("managed key pattern is valid")
});

/// `{id}_{px}.jpg`
pub fn variant_key(id: &Uuid, resolution: Resolution) -> String {
    format!("{}_{}.{}", id, resolution.px(), VARIANT_EXTENSION)
}

/// `{id}.jpg`, the unresized original. Not written by the pipeline, but
/// swept on cleanup.
pub fn original_key(id: &Uuid) -> String {
    format!("{}.{}", id, VARIANT_EXTENSION)
}

pub fn is_external_url(reference: &str) -> bool {
    let lower = reference.get(..8).unwrap_or(reference).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Already a locator: an absolute URL or a root-relative path.
pub fn is_locator(reference: &str) -> bool {
    is_external_url(reference) || reference.starts_with('/')
}

/// A storage key following the variant naming convention.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageRef {
    pub id: Uuid,
    pub resolution: Option<Resolution>,
}

impl ImageRef {
    /// `None` for keys the pipeline did not produce, such as legacy raw uploads.
    pub fn parse(key: &str) -> Option<ImageRef> {
        let caps = MANAGED_KEY.captures(key)?;

        if !caps["ext"].eq_ignore_ascii_case(VARIANT_EXTENSION) {
            return None;
        }

        let id = Uuid::parse_str(&caps["id"]).ok()?;
        let resolution = match caps.name("px") {
            Some(px) => Some(Resolution::try_from(px.as_str().parse::<u32>().ok()?).ok()?),
            None => None,
        };

        Some(ImageRef { id, resolution })
    }

    pub fn variant_key(&self, resolution: Resolution) -> String {
        variant_key(&self.id, resolution)
    }

    /// Every key that may exist for this image.
    pub fn all_keys(&self) -> Vec<String> {
        Resolution::ALL
            .into_iter()
            .map(|r| self.variant_key(r))
            .chain(std::iter::once(original_key(&self.id)))
            .collect()
    }
}

/// Keys to delete when `key` is no longer referenced.
pub fn keys_for_key(key: &str) -> Vec<String> {
    match ImageRef::parse(key) {
        Some(image) => image.all_keys(),
        None => vec![key.to_string()],
    }
}
