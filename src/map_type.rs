use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Registry endpoint serving the KML export of one map type, `{type}` is the numeric id.
pub const DOWNLOAD_URL_TEMPLATE: &str =
    "http://www.karttarekisteri.fi/karttarekisteri2/ssl_kml_lataus_testi.php?laji={type}";

/// Map types known to the registry, in registry id order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MapType {
    Orienteering,
    Sprint,
    SkiOrienteering,
    MountainBikeOrienteering,
    TrailOrienteering,
    Teaching,
    Embargoed,
}

impl MapType {
    pub const ALL: [MapType; 7] = [
        MapType::Orienteering,
        MapType::Sprint,
        MapType::SkiOrienteering,
        MapType::MountainBikeOrienteering,
        MapType::TrailOrienteering,
        MapType::Teaching,
        MapType::Embargoed,
    ];

    /// Numeric id used by the registry download endpoint.
    pub fn id(self) -> u8 {
        match self {
            MapType::Orienteering => 1,
            MapType::Sprint => 2,
            MapType::SkiOrienteering => 3,
            MapType::MountainBikeOrienteering => 4,
            MapType::TrailOrienteering => 5,
            MapType::Teaching => 6,
            MapType::Embargoed => 7,
        }
    }

    /// Short key used on the command line and in output file names.
    pub fn key(self) -> &'static str {
        match self {
            MapType::Orienteering => "orienteering",
            MapType::Sprint => "sprint",
            MapType::SkiOrienteering => "skio",
            MapType::MountainBikeOrienteering => "mtbo",
            MapType::TrailOrienteering => "trailo",
            MapType::Teaching => "opetus",
            MapType::Embargoed => "embargoed",
        }
    }

    /// Human readable label prefixed to map names.
    pub fn label(self) -> &'static str {
        match self {
            MapType::Orienteering => "Orienteering Map",
            MapType::Sprint => "Sprint Orienteering Map",
            MapType::SkiOrienteering => "Ski-Orienteering Map",
            MapType::MountainBikeOrienteering => "MTB-O Map",
            MapType::TrailOrienteering => "Trail Orienteering Map",
            MapType::Teaching => "Opetuskartta",
            MapType::Embargoed => "Embargoed Area",
        }
    }

    pub fn download_url(self) -> String {
        DOWNLOAD_URL_TEMPLATE.replace("{type}", &self.id().to_string())
    }

    pub fn from_id(id: u8) -> Option<MapType> {
        MapType::ALL.into_iter().find(|t| t.id() == id)
    }
}

impl fmt::Display for MapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown map type '{0}' (expected one of: {keys})", keys = known_keys())]
pub struct UnknownMapType(pub String);

fn known_keys() -> String {
    let keys: Vec<_> = MapType::ALL.iter().map(|t| t.key()).collect();
    keys.join(", ")
}

impl FromStr for MapType {
    type Err = UnknownMapType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase();
        MapType::ALL
            .into_iter()
            .find(|t| t.key() == key)
            .ok_or_else(|| UnknownMapType(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_follow_table_order() {
        let ids: Vec<u8> = MapType::ALL.iter().map(|t| t.id()).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_keys_round_trip() {
        for map_type in MapType::ALL {
            assert_eq!(map_type.key().parse::<MapType>(), Ok(map_type));
            assert_eq!(MapType::from_id(map_type.id()), Some(map_type));
        }
        assert_eq!(" Sprint ".parse::<MapType>(), Ok(MapType::Sprint));
    }

    #[test]
    fn test_unknown_key_lists_choices() {
        let err = "rogaining".parse::<MapType>().unwrap_err();
        let message = err.to_string();
        assert!(message.contains("rogaining"));
        assert!(message.contains("orienteering, sprint"));
    }

    #[test]
    fn test_labels() {
        assert_eq!(MapType::Orienteering.label(), "Orienteering Map");
        assert_eq!(MapType::Sprint.label(), "Sprint Orienteering Map");
        assert_eq!(MapType::Embargoed.label(), "Embargoed Area");
        assert_eq!(MapType::from_id(0), None);
    }

    #[test]
    fn test_download_url_uses_numeric_id() {
        assert!(MapType::Sprint.download_url().ends_with("ssl_kml_lataus_testi.php?laji=2"));
        assert!(MapType::Embargoed.download_url().ends_with("laji=7"));
    }
}
