use crate::error::{CoordinateError, CoordinateFault};
use crate::projection::{GeodeticPoint, ProjectedPoint, ProjectionConverter};

/// Altitude written for every vertex; the registry's altitude values are junk.
const ALTITUDE: u8 = 0;

/// Converts an ETRS-TM35FIN `<coordinates>` block to WGS84.
///
/// Each non-blank line holds `easting,northing[,ignored]` in integer metres.
/// Vertices are written as `lon,lat,0` with six decimals, separated by a
/// single space. The ring is closed by repeating the first vertex when the
/// source did not already do so. Any unreadable line fails the whole block.
pub fn convert_coordinates<C>(text: &str, converter: &C) -> Result<String, CoordinateError>
where
    C: ProjectionConverter + ?Sized,
{
    let mut vertices = Vec::new();

    // quick-xml leaves bare CR line endings in text content
    let text = text.replace("\r\n", "\n").replace('\r', "\n");
    for (index, line) in text.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let point = parse_line(line).map_err(|fault| CoordinateError {
            line_number: index + 1,
            line: line.to_string(),
            fault,
        })?;
        vertices.push(format_vertex(converter.to_geodetic(point)));
    }

    if let (Some(first), Some(last)) = (vertices.first(), vertices.last()) {
        if first != last {
            vertices.push(first.clone());
        }
    }

    Ok(vertices.join(" "))
}

fn parse_line(line: &str) -> Result<ProjectedPoint, CoordinateFault> {
    let mut fields = line.split(',').map(str::trim);
    let easting = parse_field(fields.next())?;
    let northing = parse_field(fields.next())?;
    Ok(ProjectedPoint { easting, northing })
}

fn parse_field(field: Option<&str>) -> Result<i64, CoordinateFault> {
    let field = field.ok_or(CoordinateFault::MissingField)?;
    field
        .parse()
        .map_err(|_| CoordinateFault::InvalidInteger(field.to_string()))
}

fn format_vertex(point: GeodeticPoint) -> String {
    format!("{:.6},{:.6},{}", point.longitude, point.latitude, ALTITUDE)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scales metres down so expected strings are easy to read.
    fn scaled(p: ProjectedPoint) -> GeodeticPoint {
        GeodeticPoint {
            longitude: p.easting as f64 / 10_000.0,
            latitude: p.northing as f64 / 100_000.0,
        }
    }

    #[test]
    fn test_open_ring_is_closed() {
        let result = convert_coordinates("100000,6700000\n100100,6700000", &scaled).unwrap();
        assert_eq!(
            result,
            "10.000000,67.000000,0 10.010000,67.000000,0 10.000000,67.000000,0"
        );
    }

    #[test]
    fn test_closed_ring_is_not_closed_twice() {
        let result = convert_coordinates(
            "100000,6700000,0\n100100,6700000,0\n100100,6700100,0\n100000,6700000,0",
            &scaled,
        )
        .unwrap();
        let vertices: Vec<_> = result.split(' ').collect();
        assert_eq!(vertices.len(), 4);
        assert_eq!(vertices.first(), vertices.last());
    }

    #[test]
    fn test_whitespace_and_third_field_are_ignored() {
        let text = "\n    100000 , 6700000 , 123.4\n\t  200000,6800000,xyz  \n  ";
        let result = convert_coordinates(text, &scaled).unwrap();
        assert_eq!(
            result,
            "10.000000,67.000000,0 20.000000,68.000000,0 10.000000,67.000000,0"
        );
    }

    #[test]
    fn test_carriage_return_separates_vertices() {
        let converted = convert_coordinates("500000,6700000\r500100,6700000\r\n", &scaled).unwrap();
        assert_eq!(
            converted,
            "50.000000,67.000000,0 50.010000,67.000000,0 50.000000,67.000000,0"
        );
    }

    #[test]
    fn test_single_vertex_is_its_own_ring() {
        let result = convert_coordinates("100000,6700000", &scaled).unwrap();
        assert_eq!(result, "10.000000,67.000000,0");
    }

    #[test]
    fn test_empty_block_yields_empty_string() {
        assert_eq!(convert_coordinates("", &scaled).unwrap(), "");
        assert_eq!(convert_coordinates("  \n \n", &scaled).unwrap(), "");
    }

    #[test]
    fn test_fixed_point_formatting() {
        let tiny = |_: ProjectedPoint| GeodeticPoint {
            longitude: 0.000_000_1,
            latitude: -1.5,
        };
        assert_eq!(convert_coordinates("1,2", &tiny).unwrap(), "0.000000,-1.500000,0");
    }

    #[test]
    fn test_non_numeric_field_fails_whole_block() {
        let err = convert_coordinates("100000,6700000\nabc,def\n100100,6700000", &scaled)
            .unwrap_err();
        assert_eq!(err.line_number, 2);
        assert_eq!(err.line, "abc,def");
        assert_eq!(err.fault, CoordinateFault::InvalidInteger("abc".to_string()));
    }

    #[test]
    fn test_missing_field_fails() {
        let err = convert_coordinates("100000", &scaled).unwrap_err();
        assert_eq!(err.fault, CoordinateFault::MissingField);
    }

    #[test]
    fn test_decimal_values_are_rejected() {
        let err = convert_coordinates("100000.5,6700000", &scaled).unwrap_err();
        assert_eq!(
            err.fault,
            CoordinateFault::InvalidInteger("100000.5".to_string())
        );
    }

    #[test]
    fn test_empty_field_is_invalid() {
        let err = convert_coordinates("100000,,0", &scaled).unwrap_err();
        assert_eq!(err.fault, CoordinateFault::InvalidInteger(String::new()));
    }
}
