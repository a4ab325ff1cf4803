use std::fmt;
use std::num::NonZeroU32;

/// Artwork category a provider image belongs to.
///
/// `Primary` is the portrait poster/cover the rotation engine promotes. The
/// other kinds only matter as fallbacks when a provider has no primary art.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ImageKind {
    Primary,
    Thumb,
    Backdrop,
}

impl ImageKind {
    /// Secondary kind tried when a provider returns nothing of `self`.
    pub const fn fallback(self) -> ImageKind {
        match self {
            ImageKind::Primary => ImageKind::Thumb,
            ImageKind::Thumb => ImageKind::Primary,
            ImageKind::Backdrop => ImageKind::Thumb,
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageKind::Primary => write!(f, "primary"),
            ImageKind::Thumb => write!(f, "thumb"),
            ImageKind::Backdrop => write!(f, "backdrop"),
        }
    }
}

/// Non-zero pixel dimensions of an image.
///
/// Declared dimensions come from provider metadata; probed dimensions come
/// from the downloaded file header. Neither requires decoding pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ImageDimensions {
    pub width: NonZeroU32,
    pub height: NonZeroU32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageDimensionsError {
    ZeroWidth,
    ZeroHeight,
}

impl ImageDimensions {
    pub const fn new(width: NonZeroU32, height: NonZeroU32) -> Self {
        Self { width, height }
    }

    pub const fn width_u32(self) -> u32 {
        self.width.get()
    }

    pub const fn height_u32(self) -> u32 {
        self.height.get()
    }

    /// Wider than tall. Square images count as portrait.
    pub const fn is_landscape(self) -> bool {
        self.width.get() > self.height.get()
    }

    pub const fn meets_minimum(self, min_width: u32, min_height: u32) -> bool {
        self.width.get() >= min_width && self.height.get() >= min_height
    }
}

impl TryFrom<(u32, u32)> for ImageDimensions {
    type Error = ImageDimensionsError;

    fn try_from(value: (u32, u32)) -> Result<Self, Self::Error> {
        let (width, height) = value;
        let width =
            NonZeroU32::new(width).ok_or(ImageDimensionsError::ZeroWidth)?;
        let height =
            NonZeroU32::new(height).ok_or(ImageDimensionsError::ZeroHeight)?;
        Ok(Self { width, height })
    }
}

/// A provider-returned image descriptor.
///
/// Candidates are transient: they live for one top-up attempt and are never
/// persisted. Only the downloaded bytes (and the language tag) survive.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Candidate {
    pub url: String,
    pub kind: ImageKind,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub language: Option<String>,
    pub provider: String,
}

impl Candidate {
    pub fn new(
        provider: impl Into<String>,
        url: impl Into<String>,
        kind: ImageKind,
    ) -> Self {
        Self {
            url: url.into(),
            kind,
            width: None,
            height: None,
            language: None,
            provider: provider.into(),
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Declared dimensions, only when both sides are known and non-zero.
    pub fn dimensions(&self) -> Option<ImageDimensions> {
        match (self.width, self.height) {
            (Some(w), Some(h)) => ImageDimensions::try_from((w, h)).ok(),
            _ => None,
        }
    }

    /// Declared language with empty/placeholder tags treated as absent.
    pub fn language_tag(&self) -> Option<&str> {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|tag| !tag.is_empty() && !tag.eq_ignore_ascii_case("xx"))
    }
}
