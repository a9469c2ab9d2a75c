//! GDAL-backed input and output for the batch pipeline.

use anyhow::{bail, Context, Result};
use gdal::spatial_ref::SpatialRef;
use gdal::vector::{
    Feature, FieldValue, LayerAccess, LayerOptions, OGRFieldType, OGRwkbGeometryType, ToGdal,
};
use gdal::{Dataset, DriverManager};
use geo::{Geometry, MultiPolygon, Polygon};
use std::fs;
use std::path::Path;
use tracing::warn;

use crate::error::Error;
use crate::grid::{GridTransform, ScalarGrid};
use crate::merge::CountryCoastline;

/// Reads a single-band raster tile into a [`ScalarGrid`].
///
/// Cells equal to the band's no-data value become 0 (background). Rasters
/// with rotated geo transforms are not supported.
pub fn read_grid(path: &Path) -> Result<ScalarGrid> {
    let dataset = Dataset::open(path)
        .with_context(|| format!("Failed to open raster {}", path.display()))?;

    let gt = dataset
        .geo_transform()
        .context("Failed to read geo transform")?;
    let transform = GridTransform::from_gdal(&gt).ok_or_else(|| Error::UnsupportedRaster {
        path: path.display().to_string(),
        reason: "rotated affine transforms are not supported".to_string(),
    })?;

    let band = dataset.rasterband(1).context("Failed to get raster band")?;
    let (cols, rows) = dataset.raster_size();
    let buffer = band
        .read_as::<f32>((0, 0), (cols, rows), (cols, rows), None)
        .context("Failed to read raster data")?;

    let mut values = buffer.data().to_vec();
    if let Some(no_data) = band.no_data_value() {
        let no_data = no_data as f32;
        for v in values.iter_mut() {
            if *v == no_data {
                *v = 0.0;
            }
        }
    }

    Ok(ScalarGrid::new(
        rows,
        cols,
        values,
        transform,
        dataset.projection(),
    ))
}

/// Reads the authoritative per-country boundary into one multipolygon.
pub fn read_boundary(path: &Path) -> Result<MultiPolygon<f64>> {
    let dataset = Dataset::open(path)
        .with_context(|| format!("Failed to open boundary {}", path.display()))?;
    let mut layer = dataset.layer(0).context("Failed to open boundary layer")?;

    let mut parts: Vec<Polygon<f64>> = Vec::new();
    for feature in layer.features() {
        let geometry = match feature.geometry() {
            Some(g) => g,
            None => continue,
        };
        let geometry = geometry
            .to_geo()
            .context("Failed to convert boundary geometry")?;
        collect_polygons(geometry, &mut parts);
    }

    if parts.is_empty() {
        bail!("Boundary {} contains no polygon features", path.display());
    }
    Ok(MultiPolygon::new(parts))
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::GeometryCollection(gc) => {
            for inner in gc.0 {
                collect_polygons(inner, out);
            }
        }
        _ => warn!("Ignoring non-polygon boundary geometry"),
    }
}

/// Writes a country coastline as one attributed vector feature.
///
/// The driver is chosen from the output extension. Refusing to clobber an
/// existing output (without `overwrite`) fails that single unit only.
pub fn write_coastline(path: &Path, coastline: &CountryCoastline, overwrite: bool) -> Result<()> {
    if path.exists() {
        if !overwrite {
            bail!("Output {} already exists (use overwrite)", path.display());
        }
        fs::remove_file(path)
            .with_context(|| format!("Failed to remove existing output {}", path.display()))?;
    }

    let driver_name = driver_for_extension(path)?;
    let driver = DriverManager::get_driver_by_name(driver_name)
        .with_context(|| format!("Failed to get {} driver", driver_name))?;
    let mut dataset = driver
        .create_vector_only(path)
        .context("Failed to create dataset")?;

    let srs = SpatialRef::from_epsg(4326).context("Failed to create SpatialRef from EPSG:4326")?;
    let mut layer = dataset
        .create_layer(LayerOptions {
            name: "coastline",
            srs: Some(&srs),
            ty: OGRwkbGeometryType::wkbMultiPolygon,
            ..Default::default()
        })
        .context("Failed to create layer")?;

    layer
        .create_defn_fields(&[
            ("UID", OGRFieldType::OFTString),
            ("Geo_Area", OGRFieldType::OFTReal),
            ("Geo_Length", OGRFieldType::OFTReal),
        ])
        .context("Failed to create attribute fields")?;

    let geometry = coastline
        .geometry
        .to_gdal()
        .context("Failed to convert coastline geometry")?;
    let field_names = ["UID", "Geo_Area", "Geo_Length"];
    let field_values = [
        FieldValue::StringValue(coastline.uid.clone()),
        FieldValue::RealValue(coastline.geo_area_km2),
        FieldValue::RealValue(coastline.geo_length_km),
    ];
    let mut feature = Feature::new(layer.defn()).context("Failed to write coastline feature")?;
    feature
        .set_geometry(geometry)
        .context("Failed to write coastline feature")?;
    for (name, value) in field_names.iter().zip(field_values.iter()) {
        let idx = layer
            .defn()
            .field_index(name)
            .context("Failed to write coastline feature")?;
        feature
            .set_field(idx, value)
            .context("Failed to write coastline feature")?;
    }
    feature
        .create(&layer)
        .context("Failed to write coastline feature")?;

    Ok(())
}

fn driver_for_extension(path: &Path) -> Result<&'static str> {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "gpkg" => Ok("GPKG"),
        "shp" => Ok("ESRI Shapefile"),
        "geojson" | "json" => Ok("GeoJSON"),
        other => Err(Error::Config(format!(
            "unsupported output extension: {:?}",
            other
        ))
        .into()),
    }
}
