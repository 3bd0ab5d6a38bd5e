//! Database models

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Physical media format of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordFormat {
    Vinyl,
    #[serde(rename = "CD")]
    Cd,
    Cassette,
    Digital,
}

impl RecordFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordFormat::Vinyl => "Vinyl",
            RecordFormat::Cd => "CD",
            RecordFormat::Cassette => "Cassette",
            RecordFormat::Digital => "Digital",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Vinyl" => Some(RecordFormat::Vinyl),
            "CD" => Some(RecordFormat::Cd),
            "Cassette" => Some(RecordFormat::Cassette),
            "Digital" => Some(RecordFormat::Digital),
            _ => None,
        }
    }
}

/// Genre tag of a record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RecordCategory {
    Rock,
    Jazz,
    #[serde(rename = "Hip-Hop")]
    HipHop,
    Classical,
    Pop,
    Alternative,
    Indie,
    Dance,
}

impl RecordCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordCategory::Rock => "Rock",
            RecordCategory::Jazz => "Jazz",
            RecordCategory::HipHop => "Hip-Hop",
            RecordCategory::Classical => "Classical",
            RecordCategory::Pop => "Pop",
            RecordCategory::Alternative => "Alternative",
            RecordCategory::Indie => "Indie",
            RecordCategory::Dance => "Dance",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Rock" => Some(RecordCategory::Rock),
            "Jazz" => Some(RecordCategory::Jazz),
            "Hip-Hop" => Some(RecordCategory::HipHop),
            "Classical" => Some(RecordCategory::Classical),
            "Pop" => Some(RecordCategory::Pop),
            "Alternative" => Some(RecordCategory::Alternative),
            "Indie" => Some(RecordCategory::Indie),
            "Dance" => Some(RecordCategory::Dance),
            _ => None,
        }
    }
}

/// One track of an enriched record.
///
/// `track_mbid` is the MusicBrainz Track ID - the relationship id between the
/// Release and the Recording.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Track {
    pub title: String,
    pub track_mbid: String,
    pub recording_mbid: String,
}

/// A purchasable catalog record with quantity-on-hand
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub guid: String,
    pub artist: String,
    pub album: String,
    pub price: f64,
    /// Quantity on hand; never negative, decremented only by order placement
    pub qty: i64,
    pub format: RecordFormat,
    pub category: RecordCategory,
    /// MusicBrainz release id, present only when enrichment succeeded
    pub mbid: Option<String>,
    /// Track list from enrichment; always replaced wholesale, never merged
    pub track_list: Option<Vec<Track>>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

/// Raw `records` row; `track_list` is stored as a JSON text column
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RecordRow {
    pub guid: String,
    pub artist: String,
    pub album: String,
    pub price: f64,
    pub qty: i64,
    pub format: String,
    pub category: String,
    pub mbid: Option<String>,
    pub track_list: Option<String>,
    pub created_at: NaiveDateTime,
    pub updated_at: NaiveDateTime,
}

impl TryFrom<RecordRow> for Record {
    type Error = crate::Error;

    fn try_from(row: RecordRow) -> crate::Result<Self> {
        let format = RecordFormat::parse(&row.format)
            .ok_or_else(|| crate::Error::Internal(format!("Invalid format in db: {}", row.format)))?;
        let category = RecordCategory::parse(&row.category).ok_or_else(|| {
            crate::Error::Internal(format!("Invalid category in db: {}", row.category))
        })?;
        let track_list = match row.track_list {
            Some(json) => Some(
                serde_json::from_str::<Vec<Track>>(&json)
                    .map_err(|e| crate::Error::Internal(format!("Invalid track list in db: {}", e)))?,
            ),
            None => None,
        };

        Ok(Record {
            guid: row.guid,
            artist: row.artist,
            album: row.album,
            price: row.price,
            qty: row.qty,
            format,
            category,
            mbid: row.mbid,
            track_list,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// A placed order; immutable once committed
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Order {
    pub guid: String,
    /// Foreign reference to the record the order was placed against
    pub record_id: String,
    pub qty: i64,
    pub created_at: NaiveDateTime,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_round_trip() {
        for s in ["Vinyl", "CD", "Cassette", "Digital"] {
            assert_eq!(RecordFormat::parse(s).unwrap().as_str(), s);
        }
        assert!(RecordFormat::parse("Betamax").is_none());
    }

    #[test]
    fn test_category_round_trip() {
        for s in [
            "Rock",
            "Jazz",
            "Hip-Hop",
            "Classical",
            "Pop",
            "Alternative",
            "Indie",
            "Dance",
        ] {
            assert_eq!(RecordCategory::parse(s).unwrap().as_str(), s);
        }
        assert!(RecordCategory::parse("Polka").is_none());
    }

    #[test]
    fn test_format_serde_uses_display_strings() {
        let json = serde_json::to_string(&RecordFormat::Cd).unwrap();
        assert_eq!(json, "\"CD\"");
        let parsed: RecordCategory = serde_json::from_str("\"Hip-Hop\"").unwrap();
        assert_eq!(parsed, RecordCategory::HipHop);
    }

    #[test]
    fn test_record_row_conversion() {
        let row = RecordRow {
            guid: "g".to_string(),
            artist: "Miles Davis".to_string(),
            album: "Kind of Blue".to_string(),
            price: 29.99,
            qty: 5,
            format: "Vinyl".to_string(),
            category: "Jazz".to_string(),
            mbid: None,
            track_list: Some(
                r#"[{"title":"So What","track_mbid":"t1","recording_mbid":"r1"}]"#.to_string(),
            ),
            created_at: chrono::NaiveDateTime::default(),
            updated_at: chrono::NaiveDateTime::default(),
        };

        let record = Record::try_from(row).unwrap();
        assert_eq!(record.format, RecordFormat::Vinyl);
        assert_eq!(record.category, RecordCategory::Jazz);
        let tracks = record.track_list.unwrap();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].title, "So What");
    }

    #[test]
    fn test_record_row_rejects_unknown_format() {
        let row = RecordRow {
            guid: "g".to_string(),
            artist: "a".to_string(),
            album: "b".to_string(),
            price: 1.0,
            qty: 0,
            format: "8-Track".to_string(),
            category: "Rock".to_string(),
            mbid: None,
            track_list: None,
            created_at: chrono::NaiveDateTime::default(),
            updated_at: chrono::NaiveDateTime::default(),
        };

        assert!(Record::try_from(row).is_err());
    }
}
