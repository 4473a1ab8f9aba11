use pyo3::prelude::*;
use pyo3::types::PyBytes;
use sslkml::{ConvertOptions, EtrsTm35FinConverter, MapType};
use std::fs::{self, File};
use std::io::BufReader;

#[pymodule]
fn sslkml_py(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PyTransformReport>()?;
    m.add_function(wrap_pyfunction!(convert_kml, m)?)?;
    m.add_function(wrap_pyfunction!(convert_file, m)?)?;
    m.add_function(wrap_pyfunction!(convert_coordinates, m)?)?;
    m.add_function(wrap_pyfunction!(map_types, m)?)?;
    Ok(())
}

#[pyclass(name = "TransformReport")]
#[derive(Clone)]
pub struct PyTransformReport {
    #[pyo3(get)]
    pub placemarks: usize,
    #[pyo3(get)]
    pub converted_shapes: usize,
    /// Map identifiers of placemarks whose polygon was removed.
    #[pyo3(get)]
    pub dropped_map_ids: Vec<Option<String>>,
}

impl From<sslkml::TransformReport> for PyTransformReport {
    fn from(report: sslkml::TransformReport) -> Self {
        PyTransformReport {
            placemarks: report.placemarks,
            converted_shapes: report.converted_shapes,
            dropped_map_ids: report
                .dropped_shapes
                .into_iter()
                .map(|dropped| dropped.map_id)
                .collect(),
        }
    }
}

#[pymethods]
impl PyTransformReport {
    fn __repr__(&self) -> String {
        format!(
            "TransformReport(placemarks={}, converted_shapes={}, dropped={})",
            self.placemarks,
            self.converted_shapes,
            self.dropped_map_ids.len()
        )
    }
}

fn options(label: Option<String>) -> ConvertOptions {
    label.map(ConvertOptions::with_label).unwrap_or_default()
}

#[pyfunction]
#[pyo3(signature = (data, label=None))]
pub fn convert_kml<'py>(
    py: Python<'py>,
    data: &[u8],
    label: Option<String>,
) -> PyResult<Bound<'py, PyBytes>> {
    let mut output = Vec::new();
    sslkml::convert_kml(data, &mut output, &options(label)).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Failed to convert KML: {}", e))
    })?;
    Ok(PyBytes::new_bound(py, &output))
}

#[pyfunction]
#[pyo3(signature = (input_path, output_path, label=None))]
pub fn convert_file(
    input_path: String,
    output_path: String,
    label: Option<String>,
) -> PyResult<PyTransformReport> {
    let file = File::open(&input_path).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("Failed to open file: {}", e))
    })?;

    let mut output = Vec::new();
    let report = sslkml::convert_kml(BufReader::new(file), &mut output, &options(label))
        .map_err(|e| {
            PyErr::new::<pyo3::exceptions::PyValueError, _>(format!("Failed to convert KML: {}", e))
        })?;

    fs::write(&output_path, output).map_err(|e| {
        PyErr::new::<pyo3::exceptions::PyIOError, _>(format!("Failed to write file: {}", e))
    })?;

    Ok(PyTransformReport::from(report))
}

#[pyfunction]
pub fn convert_coordinates(text: String) -> PyResult<String> {
    sslkml::convert_coordinates(&text, &EtrsTm35FinConverter::new())
        .map_err(|e| PyErr::new::<pyo3::exceptions::PyValueError, _>(e.to_string()))
}

#[pyfunction]
pub fn map_types() -> Vec<(u8, &'static str, &'static str)> {
    MapType::ALL
        .iter()
        .map(|t| (t.id(), t.key(), t.label()))
        .collect()
}
