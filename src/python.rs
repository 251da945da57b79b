//! Notebook-facing Python bindings

use crate::io;
use crate::types::{AcquisitionIntent, BandSet, BoundingBox, SatError};
use crate::{normalize_ring, EnhancementClient, QueryBuilder, RasterBandReader, TileArchiveBandReader};
use numpy::IntoPyArray;
use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

fn to_py_err(e: SatError) -> PyErr {
    match e {
        SatError::InvalidGeometry(_)
        | SatError::InvalidDateRange { .. }
        | SatError::InvalidRegion(_) => PyValueError::new_err(format!("{}", e)),
        other => PyRuntimeError::new_err(format!("{}", other)),
    }
}

/// Python module definition
#[pymodule]
fn _core(_py: Python, m: &PyModule) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(normalize_coordinates, m)?)?;
    m.add_function(wrap_pyfunction!(build_queries, m)?)?;
    m.add_function(wrap_pyfunction!(read_raster_bands, m)?)?;
    m.add_function(wrap_pyfunction!(read_tile_archive, m)?)?;
    m.add_class::<PyBandSet>()?;
    m.add_class::<PyEnhancementClient>()?;
    Ok(())
}

/// Normalize a drawn-rectangle ring into a (W, S, E, N) tuple
#[pyfunction]
fn normalize_coordinates(ring: Vec<(f64, f64)>) -> PyResult<(f64, f64, f64, f64)> {
    let bbox = normalize_ring(&ring).map_err(to_py_err)?;
    Ok((bbox.west, bbox.south, bbox.east, bbox.north))
}

/// Build the Sentinel-2 and Landsat-8 download descriptors as JSON strings
#[pyfunction]
fn build_queries(
    inidate: String,
    enddate: String,
    region: String,
    bbox: (f64, f64, f64, f64),
    cloud: u8,
    output_path: String,
) -> PyResult<(String, String)> {
    let parse = |s: &str| {
        chrono::NaiveDate::parse_from_str(s, "%Y-%m-%d")
            .map_err(|e| PyValueError::new_err(format!("Invalid date '{}': {}", s, e)))
    };

    let intent = AcquisitionIntent {
        inidate: parse(&inidate)?,
        enddate: parse(&enddate)?,
        region,
        bbox: BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3),
        cloud_cover_max: cloud,
        output_path: output_path.into(),
    };

    let pair = QueryBuilder::build(&intent).map_err(to_py_err)?;
    Ok((
        pair.sentinel2.to_json().map_err(to_py_err)?,
        pair.landsat8.to_json().map_err(to_py_err)?,
    ))
}

/// Read every named band of a single raster product
#[pyfunction]
fn read_raster_bands(path: String) -> PyResult<PyBandSet> {
    let bands = RasterBandReader::new().read(&path).map_err(to_py_err)?;
    Ok(PyBandSet { inner: bands })
}

/// Read a compressed tile archive, grouping bands by native resolution
#[pyfunction]
fn read_tile_archive(path: String) -> PyResult<PyBandSet> {
    let bands = TileArchiveBandReader::new()
        .read(std::path::Path::new(&path), None)
        .map_err(to_py_err)?;
    Ok(PyBandSet { inner: bands })
}

/// Python wrapper for BandSet
#[pyclass(name = "BandSet")]
struct PyBandSet {
    inner: BandSet,
}

#[pymethods]
impl PyBandSet {
    /// Band names in sorted order
    fn names(&self) -> Vec<String> {
        self.inner.names().iter().map(|s| s.to_string()).collect()
    }

    /// Native resolution in meters, when known
    fn resolution(&self, name: &str) -> Option<u32> {
        self.inner.resolution_of(name)
    }

    /// Band pixel grid as a 2-D numpy array
    fn get<'py>(&self, py: Python<'py>, name: &str) -> PyResult<&'py numpy::PyArray2<f32>> {
        let band = self
            .inner
            .get(name)
            .ok_or_else(|| PyValueError::new_err(format!("No band named '{}'", name)))?;
        Ok(band.clone().into_pyarray(py))
    }

    fn __len__(&self) -> usize {
        self.inner.len()
    }

    fn __repr__(&self) -> String {
        format!("BandSet({:?})", self.inner.names())
    }
}

/// Python wrapper for EnhancementClient
#[pyclass(name = "EnhancementClient")]
struct PyEnhancementClient {
    inner: EnhancementClient,
}

#[pymethods]
impl PyEnhancementClient {
    #[new]
    #[pyo3(signature = (base_url = None))]
    fn new(base_url: Option<String>) -> PyResult<Self> {
        let url = base_url.unwrap_or_else(|| io::enhance::DEFAULT_ENDPOINT.to_string());
        let inner = EnhancementClient::new(url).map_err(to_py_err)?;
        Ok(Self { inner })
    }

    /// Submit a product archive for enhancement; returns the output path
    fn enhance(&self, file_path: String, bbox: (f64, f64, f64, f64)) -> PyResult<String> {
        let bbox = BoundingBox::new(bbox.0, bbox.1, bbox.2, bbox.3);
        let output = self
            .inner
            .enhance(std::path::Path::new(&file_path), &bbox)
            .map_err(to_py_err)?;
        Ok(output.to_string_lossy().into_owned())
    }
}
