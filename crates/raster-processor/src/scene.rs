//! Scene records: metadata plus a lazily resolved raster payload.
//!
//! Resolution is an explicit phase. A record starts out [`ScenePayload::Pending`]
//! and only becomes [`ScenePayload::Resolved`] through
//! [`crate::resolve::resolve_collection`] (or by constructing it from a raster
//! directly), so fetch failures surface as collection warnings rather than as
//! side effects of reading pixels.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use raster_common::{AttributeValue, Attributes, Crs, Extent};

use crate::error::{RasterProcessorError, Result};
use crate::raster::Raster;

/// Attribute name of the record id.
pub const FIELD_ID: &str = "id";
/// Attribute name of the acquisition time.
pub const FIELD_DATETIME: &str = "datetime";
/// Attribute name of the platform (satellite) name.
pub const FIELD_PLATFORM: &str = "platform";
/// Attribute name of the cloud cover percentage.
pub const FIELD_CLOUD_COVER: &str = "cloud_cover";
/// Attribute name of the spatial reference.
pub const FIELD_CRS: &str = "crs";

/// Attributes every record exposes regardless of its properties.
pub const BUILTIN_FIELDS: [&str; 5] = [
    FIELD_ID,
    FIELD_DATETIME,
    FIELD_PLATFORM,
    FIELD_CLOUD_COVER,
    FIELD_CRS,
];

/// Pixel payload state of a record.
#[derive(Debug, Clone)]
pub enum ScenePayload {
    /// Metadata only; `href` locates the asset for a resolver.
    Pending { href: Option<String> },
    /// Pixel data is available.
    Resolved(Arc<Raster>),
}

/// One scene: catalog metadata plus its raster payload.
#[derive(Debug, Clone)]
pub struct SceneRecord {
    id: String,
    acquisition_time: DateTime<Utc>,
    platform: String,
    cloud_cover: Option<f64>,
    crs: Crs,
    extent: Extent,
    properties: Attributes,
    payload: ScenePayload,
}

impl SceneRecord {
    /// Create a metadata-only record.
    pub fn new(
        id: impl Into<String>,
        acquisition_time: DateTime<Utc>,
        platform: impl Into<String>,
        crs: Crs,
        extent: Extent,
    ) -> Self {
        Self {
            id: id.into(),
            acquisition_time,
            platform: platform.into(),
            cloud_cover: None,
            crs,
            extent,
            properties: Attributes::new(),
            payload: ScenePayload::Pending { href: None },
        }
    }

    /// Create a resolved record whose spatial reference comes from a raster.
    pub fn from_raster(
        id: impl Into<String>,
        acquisition_time: DateTime<Utc>,
        platform: impl Into<String>,
        raster: Raster,
    ) -> Self {
        let crs = raster.crs().clone();
        let extent = *raster.extent();
        Self::new(id, acquisition_time, platform, crs, extent).with_raster(raster)
    }

    /// Set the cloud cover percentage, clamped to [0, 100].
    pub fn with_cloud_cover(mut self, cloud_cover: f64) -> Self {
        self.cloud_cover = Some(cloud_cover.clamp(0.0, 100.0));
        self
    }

    /// Set the asset location used by resolvers.
    pub fn with_href(mut self, href: impl Into<String>) -> Self {
        self.payload = ScenePayload::Pending {
            href: Some(href.into()),
        };
        self
    }

    /// Attach a resolved raster payload. The record takes the raster's
    /// CRS and extent.
    pub fn with_raster(self, raster: Raster) -> Self {
        self.with_shared_raster(Arc::new(raster))
    }

    pub(crate) fn with_shared_raster(mut self, raster: Arc<Raster>) -> Self {
        self.crs = raster.crs().clone();
        self.extent = *raster.extent();
        self.payload = ScenePayload::Resolved(raster);
        self
    }

    /// Set one attribute. Built-in names update the typed fields.
    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Result<Self> {
        self.set_attribute(name, value.into())?;
        Ok(self)
    }

    pub(crate) fn set_attribute(&mut self, name: &str, value: AttributeValue) -> Result<()> {
        match name {
            FIELD_ID => {
                self.id = value
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| value.to_string());
            }
            FIELD_DATETIME => {
                self.acquisition_time = value.as_time().ok_or_else(|| {
                    RasterProcessorError::transform(
                        &self.id,
                        format!("'{}' is not a timestamp", value),
                    )
                })?;
            }
            FIELD_PLATFORM => self.platform = value.to_string(),
            FIELD_CLOUD_COVER => self.cloud_cover = value.as_f64().map(|c| c.clamp(0.0, 100.0)),
            FIELD_CRS => {
                self.crs = match &value {
                    AttributeValue::Integer(code) => Crs::epsg(*code as u32),
                    other => Crs::parse(&other.to_string())?,
                };
            }
            _ => {
                self.properties.insert(name.to_string(), value);
            }
        }
        Ok(())
    }

    /// Replace the extension properties, keeping built-in fields.
    pub(crate) fn replace_properties(&mut self, properties: Attributes) -> Result<()> {
        self.properties = Attributes::new();
        for (name, value) in properties {
            self.set_attribute(&name, value)?;
        }
        Ok(())
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn acquisition_time(&self) -> DateTime<Utc> {
        self.acquisition_time
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn cloud_cover(&self) -> Option<f64> {
        self.cloud_cover
    }

    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    pub fn extent(&self) -> &Extent {
        &self.extent
    }

    /// Extension properties beyond the built-in fields.
    pub fn properties(&self) -> &Attributes {
        &self.properties
    }

    pub fn payload(&self) -> &ScenePayload {
        &self.payload
    }

    /// Asset location of a pending record.
    pub fn href(&self) -> Option<&str> {
        match &self.payload {
            ScenePayload::Pending { href } => href.as_deref(),
            ScenePayload::Resolved(_) => None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self.payload, ScenePayload::Resolved(_))
    }

    /// The resolved raster, or an `Unresolved` error.
    pub fn raster(&self) -> Result<&Raster> {
        match &self.payload {
            ScenePayload::Resolved(raster) => Ok(raster),
            ScenePayload::Pending { .. } => Err(RasterProcessorError::Unresolved(self.id.clone())),
        }
    }

    pub(crate) fn shared_raster(&self) -> Result<Arc<Raster>> {
        match &self.payload {
            ScenePayload::Resolved(raster) => Ok(Arc::clone(raster)),
            ScenePayload::Pending { .. } => Err(RasterProcessorError::Unresolved(self.id.clone())),
        }
    }

    /// Value of any attribute; unknown names yield `Absent`.
    pub fn attribute(&self, name: &str) -> AttributeValue {
        match name {
            FIELD_ID => AttributeValue::Text(self.id.clone()),
            FIELD_DATETIME => AttributeValue::Time(self.acquisition_time),
            FIELD_PLATFORM => AttributeValue::Text(self.platform.clone()),
            FIELD_CLOUD_COVER => self.cloud_cover.into(),
            FIELD_CRS => AttributeValue::Text(self.crs.to_string()),
            _ => self.properties.get(name).cloned().unwrap_or_default(),
        }
    }

    /// Every attribute name this record carries a value for.
    pub fn attribute_names(&self) -> impl Iterator<Item = &str> {
        BUILTIN_FIELDS
            .iter()
            .copied()
            .chain(self.properties.keys().map(String::as_str))
    }

    /// All attributes, built-in fields included.
    pub fn attributes(&self) -> Attributes {
        self.attribute_names()
            .map(|name| (name.to_string(), self.attribute(name)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Band;
    use raster_common::time::parse_datetime;

    fn record() -> SceneRecord {
        SceneRecord::new(
            "S2A_T33PTM_20210704",
            parse_datetime("2021-07-04T10:00:00Z").unwrap(),
            "sentinel-2a",
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 100.0, 100.0),
        )
    }

    #[test]
    fn test_builtin_attributes() {
        let rec = record().with_cloud_cover(12.5);
        assert_eq!(rec.attribute(FIELD_ID), AttributeValue::from("S2A_T33PTM_20210704"));
        assert_eq!(rec.attribute(FIELD_CLOUD_COVER), AttributeValue::Number(12.5));
        assert_eq!(rec.attribute(FIELD_CRS), AttributeValue::from("EPSG:32633"));
        assert!(rec.attribute("s2:mgrs_tile").is_absent());
    }

    #[test]
    fn test_missing_cloud_cover_is_absent() {
        assert!(record().attribute(FIELD_CLOUD_COVER).is_absent());
    }

    #[test]
    fn test_set_attribute_routes_builtins() {
        let rec = record()
            .with_attribute(FIELD_CLOUD_COVER, 140.0)
            .unwrap()
            .with_attribute(FIELD_CRS, 32634i64)
            .unwrap()
            .with_attribute("s2:mgrs_tile", "33PTM")
            .unwrap();
        assert_eq!(rec.cloud_cover(), Some(100.0));
        assert_eq!(rec.crs(), &Crs::epsg(32634));
        assert_eq!(rec.attribute("s2:mgrs_tile"), AttributeValue::from("33PTM"));

        assert!(record().with_attribute(FIELD_DATETIME, "not a time").is_err());
    }

    #[test]
    fn test_pending_record_has_no_raster() {
        let rec = record().with_href("s3://bucket/scene.tif");
        assert_eq!(rec.href(), Some("s3://bucket/scene.tif"));
        assert!(matches!(
            rec.raster(),
            Err(RasterProcessorError::Unresolved(_))
        ));
    }

    #[test]
    fn test_from_raster_takes_grid_reference() {
        let raster = Raster::new(
            1,
            1,
            vec![Band::new("b", vec![1.0])],
            Crs::epsg(3857),
            Extent::new(5.0, 5.0, 6.0, 6.0),
        )
        .unwrap();
        let rec = SceneRecord::from_raster(
            "r1",
            parse_datetime("2020-01-01").unwrap(),
            "composite",
            raster,
        );
        assert!(rec.is_resolved());
        assert_eq!(rec.crs(), &Crs::epsg(3857));
        assert_eq!(rec.extent(), &Extent::new(5.0, 5.0, 6.0, 6.0));
    }
}
