use std::collections::HashMap;
use std::fmt;

use url::Url;

use crate::naming::{safe_member_name, short_hash};

/// Directory prefix, relative to the content root, that every image lives under.
pub const IMAGE_DIR: &str = "images/";

const FALLBACK_NAME: &str = "image";

/// Media type inferred from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaType {
    Gif,
    Jpeg,
    Png,
    Svg,
    Unknown,
}

impl MediaType {
    const BY_EXTENSION: &'static [(&'static str, MediaType)] = &[
        ("gif", MediaType::Gif),
        ("jpg", MediaType::Jpeg),
        ("jpeg", MediaType::Jpeg),
        ("png", MediaType::Png),
        ("svg", MediaType::Svg),
    ];

    /// Looks up the media type for the extension of `name` (case-insensitive).
    pub fn from_name(name: &str) -> Self {
        let Some((_, ext)) = name.rsplit_once('.') else {
            return MediaType::Unknown;
        };
        Self::BY_EXTENSION
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(ext))
            .map(|(_, media_type)| *media_type)
            .unwrap_or(MediaType::Unknown)
    }

    /// MIME string for the manifest; `None` for [`MediaType::Unknown`].
    pub fn mime(self) -> Option<&'static str> {
        match self {
            MediaType::Gif => Some("image/gif"),
            MediaType::Jpeg => Some("image/jpeg"),
            MediaType::Png => Some("image/png"),
            MediaType::Svg => Some("image/svg+xml"),
            MediaType::Unknown => None,
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime().unwrap_or("unknown"))
    }
}

/// One embedded picture with a deterministic local name and path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Image {
    source: Url,
    name: String,
    rel_path: String,
    media_type: MediaType,
    id: String,
}

impl Image {
    /// Builds an image named after the basename of its source path.
    pub fn from_source(source: Url) -> Self {
        let name = basename(&source);
        Self::with_name(source, name)
    }

    /// Builds an image with an explicit local name (the cover uses this).
    pub fn with_name(source: Url, name: impl AsRef<str>) -> Self {
        let name = safe_member_name(name.as_ref());
        let id = format!(
            "image{}",
            name.chars()
                .filter(char::is_ascii_alphanumeric)
                .collect::<String>()
        );
        Self {
            rel_path: format!("{IMAGE_DIR}{name}"),
            media_type: MediaType::from_name(&name),
            source,
            name,
            id,
        }
    }

    pub fn source(&self) -> &Url {
        &self.source
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Path relative to the content root, e.g. `images/a.jpg`.
    pub fn rel_path(&self) -> &str {
        &self.rel_path
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }
}

fn basename(source: &Url) -> String {
    source
        .path_segments()
        .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
        .map(ToOwned::to_owned)
        .unwrap_or_else(|| format!("{FALLBACK_NAME}-{}", short_hash(source.as_str())))
}

/// Issue-wide registry of local image names and manifest ids.
///
/// The first source claiming a basename keeps it, the same source seen again maps
/// to the same name, and a different source whose basename or derived id is taken
/// is renamed to `<stem>-<hash>.<ext>`.
#[derive(Debug, Default, Clone)]
pub struct ImageNames {
    claimed: HashMap<String, Url>,
    ids: HashMap<String, Url>,
}

impl ImageNames {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an image whose name was chosen elsewhere (e.g. the cover).
    pub fn claim(&mut self, image: &Image) {
        self.claimed
            .entry(image.name().to_string())
            .or_insert_with(|| image.source().clone());
        self.ids
            .entry(image.id().to_string())
            .or_insert_with(|| image.source().clone());
    }

    /// Returns the image for `source`, renaming it if its basename or id is taken.
    pub fn image_for(&mut self, source: Url) -> Image {
        let image = Image::from_source(source);
        if self.is_free_for(&image) {
            self.claim(&image);
            return image;
        }
        let mut renamed = Image::with_name(
            image.source().clone(),
            disambiguate(image.name(), image.source().as_str()),
        );
        // A second round only happens when the hashed id itself collides.
        let mut salt = 1;
        while !self.is_free_for(&renamed) {
            let seed = format!("{}#{salt}", image.source());
            renamed = Image::with_name(image.source().clone(), disambiguate(image.name(), &seed));
            salt += 1;
        }
        self.claim(&renamed);
        renamed
    }

    fn is_free_for(&self, image: &Image) -> bool {
        let free = |owner: Option<&Url>| owner.is_none_or(|owner| owner == image.source());
        free(self.claimed.get(image.name())) && free(self.ids.get(image.id()))
    }
}

fn disambiguate(name: &str, seed: &str) -> String {
    let hash = short_hash(seed);
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{hash}.{ext}"),
        _ => format!("{name}-{hash}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    #[test]
    fn media_type_lookup_is_case_insensitive() {
        assert_eq!(MediaType::from_name("a.JPG"), MediaType::Jpeg);
        assert_eq!(MediaType::from_name("a.jpeg"), MediaType::Jpeg);
        assert_eq!(MediaType::from_name("a.svg"), MediaType::Svg);
        assert_eq!(MediaType::from_name("a.webp"), MediaType::Unknown);
        assert_eq!(MediaType::from_name("noext"), MediaType::Unknown);
        assert_eq!(MediaType::Unknown.mime(), None);
    }

    #[test]
    fn trailing_slash_uses_last_non_empty_segment() {
        let image = Image::from_source(url("http://x/img/chart.png/"));
        assert_eq!(image.name(), "chart.png");
    }

    #[test]
    fn root_path_gets_hashed_fallback_name() {
        let image = Image::from_source(url("http://x/"));
        assert!(image.name().starts_with("image-"));
        assert_eq!(image.media_type(), MediaType::Unknown);
    }

    #[test]
    fn collision_renames_second_source_only() {
        let mut names = ImageNames::new();
        let first = names.image_for(url("http://x/one/chart.png"));
        let again = names.image_for(url("http://x/one/chart.png"));
        let other = names.image_for(url("http://x/two/chart.png"));

        assert_eq!(first.name(), "chart.png");
        assert_eq!(again, first);
        assert_ne!(other.name(), "chart.png");
        assert!(other.name().starts_with("chart-"));
        assert!(other.name().ends_with(".png"));
        assert_eq!(other.media_type(), MediaType::Png);
    }

    #[test]
    fn names_differing_only_in_separators_get_distinct_ids() {
        let mut names = ImageNames::new();
        let dashed = names.image_for(url("http://x/a-b.png"));
        let plain = names.image_for(url("http://x/ab.png"));
        let again = names.image_for(url("http://x/ab.png"));

        assert_eq!(dashed.id(), "imageabpng");
        assert_ne!(plain.id(), dashed.id());
        assert!(plain.name().starts_with("ab-"));
        assert_eq!(again, plain);
    }
}
