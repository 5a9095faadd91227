//! Public content with fallbacks.
//!
//! `ContentStore::load` reads one table once. Zero usable rows, whether the
//! read failed or the table is empty, yields the kind's fallback payload from
//! `fallback`. Nothing is cached between calls.

pub mod fallback;
pub mod models;

use crate::backend::{
    rest::{Order, Query},
    BackendClient,
};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::{fmt, str::FromStr};
use tracing::{debug, instrument, warn};
use utoipa::ToSchema;

use self::models::{
    AboutSection, Announcement, Facility, FooterSection, GalleryItem, HeroSection,
    LeadershipMember, LearningMaterial, VisionSection,
};

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Hero,
    About,
    Vision,
    Announcements,
    Gallery,
    Materials,
    Leadership,
    Facilities,
    Footer,
}

impl ContentKind {
    pub const ALL: [Self; 9] = [
        Self::Hero,
        Self::About,
        Self::Vision,
        Self::Announcements,
        Self::Gallery,
        Self::Materials,
        Self::Leadership,
        Self::Facilities,
        Self::Footer,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hero => "hero",
            Self::About => "about",
            Self::Vision => "vision",
            Self::Announcements => "announcements",
            Self::Gallery => "gallery",
            Self::Materials => "materials",
            Self::Leadership => "leadership",
            Self::Facilities => "facilities",
            Self::Footer => "footer",
        }
    }

    #[must_use]
    pub const fn table(self) -> &'static str {
        match self {
            Self::Hero => "hero_section",
            Self::About => "about_section",
            Self::Vision => "vision_section",
            Self::Announcements => "announcements",
            Self::Gallery => "gallery_items",
            Self::Materials => "learning_materials",
            Self::Leadership => "leadership_members",
            Self::Facilities => "facilities",
            Self::Footer => "footer_sections",
        }
    }

    /// Singleton sections render only their most recent active row.
    #[must_use]
    pub const fn is_singleton(self) -> bool {
        matches!(self, Self::Hero | Self::About | Self::Vision)
    }

    const fn order(self) -> (&'static str, Order) {
        match self {
            Self::Gallery | Self::Leadership | Self::Facilities | Self::Footer => {
                ("display_order", Order::Asc)
            }
            Self::Hero
            | Self::About
            | Self::Vision
            | Self::Announcements
            | Self::Materials => ("created_at", Order::Desc),
        }
    }

    /// Query used by the public site: active rows in display order.
    #[must_use]
    pub fn public_query(self) -> Query {
        let (column, order) = self.order();
        let query = Query::new().eq("is_active", "true").order(column, order);
        if self.is_singleton() {
            query.limit(1)
        } else {
            query
        }
    }

    /// Query used by the editors: every row, active or not.
    #[must_use]
    pub fn editor_query(self) -> Query {
        let (column, order) = self.order();
        Query::new().order(column, order)
    }

    /// Check that `row` is a complete record of this kind and return it in
    /// canonical form (unknown columns dropped).
    ///
    /// # Errors
    /// Returns the decode error when the row does not match the kind's shape.
    pub fn validate(self, row: Value) -> Result<Value, serde_json::Error> {
        match self {
            Self::Hero => canonical::<HeroSection>(row),
            Self::About => canonical::<AboutSection>(row),
            Self::Vision => canonical::<VisionSection>(row),
            Self::Announcements => canonical::<Announcement>(row),
            Self::Gallery => canonical::<GalleryItem>(row),
            Self::Materials => canonical::<LearningMaterial>(row),
            Self::Leadership => canonical::<LeadershipMember>(row),
            Self::Facilities => canonical::<Facility>(row),
            Self::Footer => canonical::<FooterSection>(row),
        }
    }
}

fn canonical<T: ContentRecord>(row: Value) -> Result<Value, serde_json::Error> {
    let record: T = serde_json::from_value(row)?;
    serde_json::to_value(record)
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownContentKind(pub String);

impl fmt::Display for UnknownContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown content kind: {}", self.0)
    }
}

impl std::error::Error for UnknownContentKind {}

impl FromStr for ContentKind {
    type Err = UnknownContentKind;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == value)
            .ok_or_else(|| UnknownContentKind(value.to_string()))
    }
}

/// A typed row of one content table, with its default payload.
pub trait ContentRecord: Serialize + DeserializeOwned + Send + Sync + 'static {
    const KIND: ContentKind;

    /// Rows shown when the live table has no usable data.
    fn fallback() -> Vec<Self>;
}

#[derive(ToSchema, Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Live,
    Fallback,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Loaded<T> {
    pub source: Source,
    pub rows: Vec<T>,
}

impl<T: ContentRecord> Loaded<T> {
    fn fallback() -> Self {
        Self {
            source: Source::Fallback,
            rows: T::fallback(),
        }
    }

    fn into_json(self) -> Loaded<Value> {
        Loaded {
            source: self.source,
            rows: self
                .rows
                .into_iter()
                .filter_map(|row| serde_json::to_value(row).ok())
                .collect(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ContentStore {
    backend: BackendClient,
}

impl ContentStore {
    #[must_use]
    pub fn new(backend: BackendClient) -> Self {
        Self { backend }
    }

    /// Read `T`'s table once with the public key.
    #[instrument(skip(self), fields(kind = %T::KIND))]
    pub async fn load<T: ContentRecord>(&self) -> Loaded<T> {
        let kind = T::KIND;

        let rows = match self
            .backend
            .select(kind.table(), &kind.public_query(), None)
            .await
        {
            Ok(rows) => rows,
            Err(err) => {
                warn!("Content fetch for {kind} failed, serving defaults: {err}");
                Vec::new()
            }
        };

        let decoded: Vec<T> = rows
            .into_iter()
            .filter_map(|row| match serde_json::from_value(row) {
                Ok(record) => Some(record),
                Err(err) => {
                    debug!("Skipping unusable {kind} row: {err}");
                    None
                }
            })
            .collect();

        if decoded.is_empty() {
            debug!("No usable {kind} rows, serving defaults");
            return Loaded::fallback();
        }

        Loaded {
            source: Source::Live,
            rows: decoded,
        }
    }

    /// `load` for a kind chosen at runtime.
    pub async fn load_json(&self, kind: ContentKind) -> Loaded<Value> {
        match kind {
            ContentKind::Hero => self.load::<HeroSection>().await.into_json(),
            ContentKind::About => self.load::<AboutSection>().await.into_json(),
            ContentKind::Vision => self.load::<VisionSection>().await.into_json(),
            ContentKind::Announcements => self.load::<Announcement>().await.into_json(),
            ContentKind::Gallery => self.load::<GalleryItem>().await.into_json(),
            ContentKind::Materials => self.load::<LearningMaterial>().await.into_json(),
            ContentKind::Leadership => self.load::<LeadershipMember>().await.into_json(),
            ContentKind::Facilities => self.load::<Facility>().await.into_json(),
            ContentKind::Footer => self.load::<FooterSection>().await.into_json(),
        }
    }
}
