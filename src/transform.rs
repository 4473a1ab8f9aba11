//! Placemark rewriting for SSL Karttarekisteri KML exports.
//!
//! Per `<Placemark>`, in document order:
//! 1. resolve a map type label from `<styleUrl>`,
//! 2. prefix `<name>` with the label,
//! 3. append the registry info URL to `<description>`,
//! 4. drop `<altitudeMode>` from the `<Polygon>` and convert its
//!    `<coordinates>` to WGS84. A polygon with unreadable coordinates is
//!    removed; the rest of the Placemark stays.

use std::io::{BufRead, Write};

use tracing::{debug, error, info};

use crate::coordinates::convert_coordinates;
use crate::error::{CoordinateError, Result};
use crate::map_type::MapType;
use crate::model::{Document, Element, Node, KML_NS};
use crate::parser::parse_document;
use crate::projection::{EtrsTm35FinConverter, ProjectionConverter};
use crate::writer::KmlWriter;

/// Registry page for a single map, `{id}` is the map identifier.
pub const INFO_URL_TEMPLATE: &str =
    "http://www.karttarekisteri.fi/karttarekisteri2/www_visualisointi/tiedot.php?t={id}";

/// Style used by the registry for embargoed areas.
pub const RED_STYLE: &str = "#transRedPoly";
/// Style used by the registry for regular maps.
pub const GREEN_STYLE: &str = "#transGreenPoly";

pub fn info_url(map_id: &str) -> String {
    INFO_URL_TEMPLATE.replace("{id}", map_id)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConvertOptions {
    /// Label used for green-styled Placemarks.
    pub default_map_type_label: String,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            default_map_type_label: MapType::Orienteering.label().to_string(),
        }
    }
}

impl ConvertOptions {
    pub fn with_label(label: impl Into<String>) -> Self {
        Self {
            default_map_type_label: label.into(),
        }
    }

    pub fn for_map_type(map_type: MapType) -> Self {
        Self::with_label(map_type.label())
    }
}

/// A polygon removed because its coordinates could not be converted.
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedShape {
    /// Map identifier from `<name>`, if the Placemark had one.
    pub map_id: Option<String>,
    /// The offending `<coordinates>` text as found in the source.
    pub raw: String,
    pub error: CoordinateError,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransformReport {
    pub placemarks: usize,
    pub converted_shapes: usize,
    pub dropped_shapes: Vec<DroppedShape>,
}

/// Result of processing one `<Polygon>`.
#[derive(Debug)]
enum ShapeOutcome {
    Converted { blocks: usize },
    Malformed { raw: String, error: CoordinateError },
}

pub struct KmlTransformer<C = EtrsTm35FinConverter> {
    options: ConvertOptions,
    converter: C,
}

impl KmlTransformer<EtrsTm35FinConverter> {
    pub fn new(options: ConvertOptions) -> Self {
        Self::with_converter(options, EtrsTm35FinConverter::new())
    }
}

impl<C: ProjectionConverter> KmlTransformer<C> {
    pub fn with_converter(options: ConvertOptions, converter: C) -> Self {
        Self { options, converter }
    }

    pub fn options(&self) -> &ConvertOptions {
        &self.options
    }

    /// Rewrites every KML Placemark in the document in place.
    pub fn transform(&self, document: &mut Document) -> TransformReport {
        let mut report = TransformReport::default();
        document.walk_mut(&mut |element: &mut Element| {
            if element.is(KML_NS, "Placemark") {
                self.transform_placemark(element, &mut report);
            }
        });
        report
    }

    /// Parses `input`, transforms it and writes the result to `output`.
    ///
    /// Nothing is written unless the whole input parsed.
    pub fn convert<R: BufRead, W: Write>(&self, input: R, output: W) -> Result<TransformReport> {
        let mut document = parse_document(input)?;
        let report = self.transform(&mut document);
        KmlWriter::new().write(&document, output)?;

        info!(
            "Converted {} placemarks ({} polygons converted, {} dropped)",
            report.placemarks,
            report.converted_shapes,
            report.dropped_shapes.len()
        );
        Ok(report)
    }

    fn transform_placemark(&self, placemark: &mut Element, report: &mut TransformReport) {
        report.placemarks += 1;

        let label = self.resolve_label(placemark);
        let map_id = rewrite_name(placemark, label);
        if let Some(map_id) = map_id.as_deref() {
            append_info_url(placemark, map_id);
        }

        let Some(index) = placemark.position_child(KML_NS, "Polygon") else {
            debug!("Placemark {:?} has no <Polygon>", map_id);
            return;
        };
        let Some(Node::Element(polygon)) = placemark.children.get_mut(index) else {
            return;
        };

        match self.process_shape(polygon) {
            ShapeOutcome::Converted { blocks } => {
                debug!("Converted {} coordinate blocks for map {:?}", blocks, map_id);
                report.converted_shapes += 1;
            }
            ShapeOutcome::Malformed { raw, error } => {
                error!(
                    "Invalid coordinate data for map {}: {:?} ({})",
                    map_id.as_deref().unwrap_or("<unnamed>"),
                    raw,
                    error
                );
                placemark.children.remove(index);
                report.dropped_shapes.push(DroppedShape { map_id, raw, error });
            }
        }
    }

    fn resolve_label(&self, placemark: &Element) -> &str {
        let style = placemark
            .find_child(KML_NS, "styleUrl")
            .map(|style| style.text());
        let label = match style.as_deref().map(str::trim) {
            Some(RED_STYLE) => MapType::Embargoed.label(),
            Some(GREEN_STYLE) => self.options.default_map_type_label.as_str(),
            _ => "",
        };
        debug!("Map type for style {:?}: {:?}", style, label);
        label
    }

    fn process_shape(&self, polygon: &mut Element) -> ShapeOutcome {
        // Without altitudeMode the polygon is implicitly clampToGround.
        polygon.remove_children(KML_NS, "altitudeMode");

        let mut blocks = 0;
        let result = polygon.try_walk_mut(&mut |element: &mut Element| {
            if !element.is(KML_NS, "coordinates") {
                return Ok(());
            }
            let raw = element.text();
            match convert_coordinates(&raw, &self.converter) {
                Ok(converted) => {
                    element.set_text(converted);
                    blocks += 1;
                    Ok(())
                }
                Err(error) => Err(ShapeOutcome::Malformed { raw, error }),
            }
        });

        match result {
            Ok(()) => ShapeOutcome::Converted { blocks },
            Err(outcome) => outcome,
        }
    }
}

/// Prefixes `<name>` with the label and returns the map identifier.
fn rewrite_name(placemark: &mut Element, label: &str) -> Option<String> {
    let name = placemark.find_child_mut(KML_NS, "name")?;
    let map_id = name.text().trim().to_string();
    debug!("Map ID {:?}", map_id);
    name.set_text(format!("{} {}", label, map_id).trim());

    if map_id.is_empty() {
        None
    } else {
        Some(map_id)
    }
}

fn append_info_url(placemark: &mut Element, map_id: &str) {
    let Some(description) = placemark.find_child_mut(KML_NS, "description") else {
        return;
    };
    let mut text = description.text();
    if !text.is_empty() {
        text.push('\n');
    }
    text.push_str(&info_url(map_id));
    description.set_text(text);
}

/// Converts a KML stream with the default ETRS-TM35FIN converter.
pub fn convert_kml<R: BufRead, W: Write>(
    input: R,
    output: W,
    options: &ConvertOptions,
) -> Result<TransformReport> {
    KmlTransformer::new(options.clone()).convert(input, output)
}
