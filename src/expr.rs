//! Immutable, lazily evaluated image expressions.
//!
//! Building an expression never touches data. Each builder call returns a new
//! node that shares its inputs with the receiver, so a filtered collection can
//! be reused for every year of a season without copying. Nothing is evaluated
//! until the expression is handed to a [`Backend`](crate::backend::Backend).

use std::{collections::BTreeMap, fmt, sync::Arc};

use chrono::NaiveDate;

use crate::{error::ConfigError, geometry::Geometry};

/// Half-open calendar range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, ConfigError> {
        if start >= end {
            return Err(ConfigError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            });
        }

        Ok(DateRange { start, end })
    }

    /// Parses two `YYYY-MM-DD` dates.
    pub fn parse(start: &str, end: &str) -> Result<Self, ConfigError> {
        let parse = |s: &str| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|_| ConfigError::InvalidDateRange {
                start: start.to_string(),
                end: end.to_string(),
            })
        };

        Self::new(parse(start)?, parse(end)?)
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date < self.end
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Metadata value attached to an image.
#[derive(Debug, Clone, PartialEq)]
pub enum Property {
    Int(i64),
    Float(f64),
    Text(String),
}

impl From<i64> for Property {
    fn from(v: i64) -> Self {
        Property::Int(v)
    }
}

impl From<i32> for Property {
    fn from(v: i32) -> Self {
        Property::Int(v.into())
    }
}

impl From<f64> for Property {
    fn from(v: f64) -> Self {
        Property::Float(v)
    }
}

impl From<&str> for Property {
    fn from(v: &str) -> Self {
        Property::Text(v.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reducer {
    Sum,
    Mean,
}

impl Reducer {
    pub fn name(&self) -> &'static str {
        match self {
            Reducer::Sum => "sum",
            Reducer::Mean => "mean",
        }
    }
}

#[derive(Debug, PartialEq)]
pub enum CollectionNode {
    /// A hosted collection, addressed by its catalog id.
    Load { id: String },
    FilterBounds {
        input: ImageCollection,
        geometry: Geometry,
    },
    FilterDate {
        input: ImageCollection,
        range: DateRange,
    },
    FromImages { images: Vec<Image> },
}

#[derive(Debug, PartialEq)]
pub enum ImageNode {
    Reduce {
        collection: ImageCollection,
        reducer: Reducer,
    },
    Clip {
        input: Image,
        geometry: Geometry,
    },
    Set {
        input: Image,
        key: String,
        value: Property,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageCollection(Arc<CollectionNode>);

impl ImageCollection {
    pub fn load(id: &str) -> Self {
        ImageCollection(Arc::new(CollectionNode::Load { id: id.to_string() }))
    }

    pub fn from_images(images: Vec<Image>) -> Self {
        ImageCollection(Arc::new(CollectionNode::FromImages { images }))
    }

    pub fn filter_bounds(&self, geometry: &Geometry) -> Self {
        ImageCollection(Arc::new(CollectionNode::FilterBounds {
            input: self.clone(),
            geometry: geometry.clone(),
        }))
    }

    pub fn filter_date(&self, range: DateRange) -> Self {
        ImageCollection(Arc::new(CollectionNode::FilterDate {
            input: self.clone(),
            range,
        }))
    }

    pub fn reduce(&self, reducer: Reducer) -> Image {
        Image(Arc::new(ImageNode::Reduce {
            collection: self.clone(),
            reducer,
        }))
    }

    pub fn sum(&self) -> Image {
        self.reduce(Reducer::Sum)
    }

    pub fn mean(&self) -> Image {
        self.reduce(Reducer::Mean)
    }

    pub fn node(&self) -> &CollectionNode {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Image(Arc<ImageNode>);

impl Image {
    pub fn clip(&self, geometry: &Geometry) -> Self {
        Image(Arc::new(ImageNode::Clip {
            input: self.clone(),
            geometry: geometry.clone(),
        }))
    }

    pub fn set(&self, key: &str, value: impl Into<Property>) -> Self {
        Image(Arc::new(ImageNode::Set {
            input: self.clone(),
            key: key.to_string(),
            value: value.into(),
        }))
    }

    pub fn node(&self) -> &ImageNode {
        &self.0
    }

    /// True when both handles point at the same graph node.
    pub fn same_node(&self, other: &Image) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Metadata visible on this image. Clipping keeps properties, reducing a
    /// collection starts from none.
    pub fn properties(&self) -> BTreeMap<String, Property> {
        let mut chain = Vec::new();
        let mut current = self;
        loop {
            match current.node() {
                ImageNode::Set { input, key, value } => {
                    chain.push((key, value));
                    current = input;
                }
                ImageNode::Clip { input, .. } => current = input,
                ImageNode::Reduce { .. } => break,
            }
        }

        // Outermost set wins, so apply innermost first.
        chain
            .into_iter()
            .rev()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    pub fn property(&self, key: &str) -> Option<Property> {
        self.properties().remove(key)
    }
}

// -- Tests -------------------------------------------------------------------
