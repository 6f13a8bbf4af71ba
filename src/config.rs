use std::env;
use std::path::PathBuf;

use chrono_tz::Tz;

/// Which GPS record wins when two are equally close to a proximity record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeTieBreak {
    /// Prefer the GPS fix taken before the proximity record.
    Earlier,
    /// Prefer the GPS fix taken after the proximity record.
    Later,
}

impl MergeTieBreak {
    #[must_use]
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "later" | "after" => Self::Later,
            _ => Self::Earlier,
        }
    }
}

/// Options for [`crate::wildfi::importer::import_observations`].
#[derive(Debug, Clone)]
pub struct ImportOptions {
    /// Fold GPS-only records into the nearest proximity record of the same tag.
    pub merge_gps_points: bool,
    /// Largest time gap (seconds) for which a GPS record may be merged.
    pub merge_max_gap_seconds: i64,
    pub merge_tie_break: MergeTieBreak,
    /// Decode acceleration bursts eagerly into summary statistics.
    pub parse_acc: bool,
    /// Target timezone of the derived `time` column (`None` keeps UTC).
    pub convert_to_tz: Option<Tz>,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            merge_gps_points: true,
            merge_max_gap_seconds: 300,
            merge_tie_break: MergeTieBreak::Earlier,
            parse_acc: true,
            convert_to_tz: None,
        }
    }
}

/// Location labels and their precedence.
#[derive(Debug, Clone)]
pub struct LocationSettings {
    /// Labels in precedence order, highest first.
    pub precedence: Vec<String>,
    /// Label assigned to observations with a GPS fix.
    pub gps_label: String,
    /// Label assigned when neither a gateway nor a GPS fix applies.
    pub none_label: String,
}

impl Default for LocationSettings {
    fn default() -> Self {
        Self {
            precedence: vec![
                "InCave".to_string(),
                "Outside".to_string(),
                "Unknown".to_string(),
            ],
            gps_label: "Outside".to_string(),
            none_label: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    // Inputs
    pub data_dir: PathBuf,
    pub tag_meta_file: PathBuf,
    pub raw_delimiter: u8,

    // Caching
    pub cache_dir: Option<PathBuf>,
    pub cache_max_rows: u64,

    // Import
    pub import: ImportOptions,
    pub locations: LocationSettings,

    // Reporting
    pub bad_rows_export: Option<PathBuf>,
}

impl Config {
    /// Defaults for everything but the two input paths; no timezone conversion,
    /// in-memory cache.
    #[must_use]
    pub fn for_paths(data_dir: impl Into<PathBuf>, tag_meta_file: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            tag_meta_file: tag_meta_file.into(),
            raw_delimiter: b',',
            cache_dir: None,
            cache_max_rows: 50_000_000,
            import: ImportOptions::default(),
            locations: LocationSettings::default(),
            bad_rows_export: None,
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Missing` if required environment variables are not set
    /// and `ConfigError::Invalid` if a value cannot be interpreted.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let raw_delimiter = match env::var("RAW_DELIMITER") {
            Ok(d) => single_byte("RAW_DELIMITER", &d)?,
            Err(_) => b',',
        };

        let convert_to_tz = parse_timezone(
            &env::var("CONVERT_TO_TZ").unwrap_or_else(|_| "EET".to_string()),
        )?;

        let precedence = env::var("LOCATION_PRECEDENCE")
            .map(|s| {
                s.split(',')
                    .map(str::trim)
                    .filter(|l| !l.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_else(|_| LocationSettings::default().precedence);

        Ok(Self {
            // Inputs
            data_dir: env::var("WILDFI_DATA_DIR")
                .map(PathBuf::from)
                .map_err(|_| ConfigError::Missing("WILDFI_DATA_DIR"))?,
            tag_meta_file: env::var("TAG_META_FILE")
                .map(PathBuf::from)
                .map_err(|_| ConfigError::Missing("TAG_META_FILE"))?,
            raw_delimiter,

            // Caching
            cache_dir: env::var("CACHE_DIR")
                .ok()
                .filter(|d| !d.trim().is_empty())
                .map(PathBuf::from),
            cache_max_rows: env::var("CACHE_MAX_ROWS")
                .unwrap_or_else(|_| "50000000".to_string())
                .parse()
                .unwrap_or(50_000_000),

            // Import
            import: ImportOptions {
                merge_gps_points: env::var("MERGE_GPS_POINTS")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
                merge_max_gap_seconds: env::var("MERGE_GPS_MAX_GAP_SECONDS")
                    .unwrap_or_else(|_| "300".to_string())
                    .parse()
                    .unwrap_or(300),
                merge_tie_break: MergeTieBreak::from_str(
                    &env::var("MERGE_GPS_TIE_BREAK").unwrap_or_else(|_| "earlier".to_string()),
                ),
                parse_acc: env::var("PARSE_ACC")
                    .unwrap_or_else(|_| "true".to_string())
                    .parse()
                    .unwrap_or(true),
                convert_to_tz,
            },
            locations: LocationSettings {
                precedence,
                gps_label: env::var("GPS_LOCATION_LABEL").unwrap_or_else(|_| "Outside".to_string()),
                none_label: env::var("NONE_LOCATION_LABEL")
                    .unwrap_or_else(|_| "Unknown".to_string()),
            },

            // Reporting
            bad_rows_export: env::var("BAD_ROWS_EXPORT").ok().map(PathBuf::from),
        })
    }
}

/// Parse a timezone name. Empty or `none` disables conversion.
///
/// # Errors
///
/// Returns `ConfigError::Invalid` for names unknown to the tz database.
pub fn parse_timezone(name: &str) -> Result<Option<Tz>, ConfigError> {
    let name = name.trim();
    if name.is_empty() || name.eq_ignore_ascii_case("none") {
        return Ok(None);
    }
    name.parse::<Tz>()
        .map(Some)
        .map_err(|_| ConfigError::Invalid("CONVERT_TO_TZ", name.to_string()))
}

fn single_byte(var: &'static str, value: &str) -> Result<u8, ConfigError> {
    match value.as_bytes() {
        [b] => Ok(*b),
        _ if value == "\\t" => Ok(b'\t'),
        _ => Err(ConfigError::Invalid(var, value.to_string())),
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for {0}: {1}")]
    Invalid(&'static str, String),
}
