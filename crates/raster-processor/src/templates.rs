//! Named band subsets per sensor product.

use crate::collection::{SceneTransform, TransformOutput};
use crate::error::{RasterProcessorError, Result};
use crate::raster::Raster;
use crate::scene::SceneRecord;

/// Sentinel-2 L2A asset bands in catalog order.
pub const SENTINEL2_L2A_BANDS: [&str; 16] = [
    "B01", "B02", "B03", "B04", "B05", "B06", "B07", "B08", "B8A", "B09", "B11", "B12", "AOT",
    "WVP", "SCL", "visual",
];

/// Landsat Collection 2 surface reflectance bands (OLI/TIRS).
pub const LANDSAT_C2_SR_BANDS: [&str; 7] =
    ["coastal", "blue", "green", "red", "nir08", "swir16", "swir22"];

/// Landsat Collection 2 pixel quality band.
pub const LANDSAT_QA_BAND: &str = "qa_pixel";

/// Landsat Collection 2 surface temperature band (OLI/TIRS).
pub const LANDSAT_ST_BAND: &str = "lwir11";

/// A named, ordered band subset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingTemplate {
    pub name: String,
    pub bands: Vec<String>,
}

impl ProcessingTemplate {
    pub fn new<S: AsRef<str>>(name: impl Into<String>, bands: &[S]) -> Self {
        Self {
            name: name.into(),
            bands: bands.iter().map(|b| b.as_ref().to_string()).collect(),
        }
    }

    /// Keep only this template's bands.
    pub fn select(&self, raster: &Raster) -> Result<Raster> {
        raster.select_bands(&self.bands)
    }
}

impl SceneTransform for ProcessingTemplate {
    fn apply(&self, _record: &SceneRecord, raster: &Raster) -> Result<TransformOutput> {
        self.select(raster).map(TransformOutput::new)
    }
}

/// Templates of the Sentinel-2 L2A product.
pub fn sentinel2_l2a_templates() -> Vec<ProcessingTemplate> {
    let b = &SENTINEL2_L2A_BANDS;
    let mut reflectance_10m = b[1..4].to_vec();
    reflectance_10m.push(b[7]);
    vec![
        ProcessingTemplate::new("Aerosol Optical Thickness", &b[12..13]),
        ProcessingTemplate::new("BOA Reflectance", &b[..12]),
        ProcessingTemplate::new("BOA Reflectance-10m", &reflectance_10m),
        ProcessingTemplate::new("Multiband", &b[..15]),
        ProcessingTemplate::new("SCL-20m", &b[14..15]),
        ProcessingTemplate::new("True Color", &b[15..]),
        ProcessingTemplate::new("Water Vapor", &b[13..14]),
    ]
}

/// Templates of a Landsat Collection 2 Level-2 product.
///
/// With surface temperature (`L2SP`) the product gains the thermal band and
/// the reflectance template is called "Surface Reflectance", otherwise
/// "Multispectral".
pub fn landsat_c2_l2_templates(surface_temperature: bool) -> Vec<ProcessingTemplate> {
    let sr = &LANDSAT_C2_SR_BANDS;
    let mut multiband = sr.to_vec();
    if surface_temperature {
        multiband.push(LANDSAT_ST_BAND);
    }
    multiband.push(LANDSAT_QA_BAND);

    let mut templates = vec![
        ProcessingTemplate::new("Multiband", &multiband),
        ProcessingTemplate::new("QA", &[LANDSAT_QA_BAND]),
    ];
    if surface_temperature {
        templates.push(ProcessingTemplate::new("Surface Temperature", &[LANDSAT_ST_BAND]));
        templates.push(ProcessingTemplate::new("Surface Reflectance", sr));
    } else {
        templates.push(ProcessingTemplate::new("Multispectral", sr));
    }
    templates
}

/// Find a template by name, case-insensitively.
pub fn find_template(templates: &[ProcessingTemplate], name: &str) -> Result<ProcessingTemplate> {
    templates
        .iter()
        .find(|t| t.name.eq_ignore_ascii_case(name))
        .cloned()
        .ok_or_else(|| {
            let known: Vec<&str> = templates.iter().map(|t| t.name.as_str()).collect();
            RasterProcessorError::Config(format!(
                "unknown processing template '{}', expected one of: {}",
                name,
                known.join(", ")
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::raster::Band;
    use raster_common::{Crs, Extent};

    #[test]
    fn test_sentinel2_groups() {
        let templates = sentinel2_l2a_templates();
        let ten_m = find_template(&templates, "boa reflectance-10m").unwrap();
        assert_eq!(ten_m.bands, vec!["B02", "B03", "B04", "B08"]);
        assert_eq!(find_template(&templates, "True Color").unwrap().bands, vec!["visual"]);
        assert_eq!(find_template(&templates, "BOA Reflectance").unwrap().bands.len(), 12);
        assert!(find_template(&templates, "Panchromatic").is_err());
    }

    #[test]
    fn test_landsat_groups() {
        let l2sp = landsat_c2_l2_templates(true);
        let multiband = find_template(&l2sp, "Multiband").unwrap();
        assert_eq!(multiband.bands.last().map(String::as_str), Some("qa_pixel"));
        assert!(multiband.bands.contains(&"lwir11".to_string()));
        assert!(find_template(&l2sp, "Multispectral").is_err());

        let l2sr = landsat_c2_l2_templates(false);
        assert_eq!(find_template(&l2sr, "Multispectral").unwrap().bands.len(), 7);
    }

    #[test]
    fn test_apply_selects_in_template_order() {
        let raster = Raster::new(
            1,
            1,
            ["B08", "B04", "B03", "B02", "SCL"]
                .iter()
                .map(|name| Band::new(*name, vec![1.0]))
                .collect(),
            Crs::epsg(32633),
            Extent::new(0.0, 0.0, 10.0, 10.0),
        )
        .unwrap();
        let template = find_template(&sentinel2_l2a_templates(), "BOA Reflectance-10m").unwrap();
        let selected = template.select(&raster).unwrap();
        assert_eq!(selected.band_names(), vec!["B02", "B03", "B04", "B08"]);
    }
}
