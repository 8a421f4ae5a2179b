use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DefaultOnError, DefaultOnNull};
use strum::{Display, EnumIter, EnumString};
use time::Date;

use crate::poi::Coordinates;
use crate::timeline::clock::ClockTime;
use crate::trip::parse_calendar_date;

/// Rendering category of a block. Unknown backend types read as `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, EnumIter)]
#[strum(ascii_case_insensitive)]
pub enum BlockCategory {
    Sightseeing,
    Meal,
    Transportation,
    Other,
}

impl BlockCategory {
    pub fn from_type(raw: &str) -> Self {
        raw.trim().parse().unwrap_or(BlockCategory::Other)
    }
}

#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ActivityBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub activity: String,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, rename = "type")]
    pub kind: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Coordinates>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub highlight_tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Transportation leg between two POIs, with its encoded path.
#[serde_as]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RouteBlock {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub day: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde_as(deserialize_as = "DefaultOnNull")]
    #[serde(default)]
    pub activity: String,
    pub from_id: String,
    pub to_id: String,
    pub polyline: String,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_location: Option<Coordinates>,
    #[serde_as(deserialize_as = "DefaultOnError")]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to_location: Option<Coordinates>,
}

/// One scheduled unit of a day: a visit/meal/free slot or a transportation leg.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ScheduleBlock {
    Route(RouteBlock),
    Activity(ActivityBlock),
}

impl ScheduleBlock {
    pub fn id(&self) -> Option<&str> {
        match self {
            ScheduleBlock::Route(route) => route.id.as_deref(),
            ScheduleBlock::Activity(activity) => activity.id.as_deref(),
        }
        .filter(|id| !id.is_empty())
    }

    /// Identifier used by the shared selection. Route legs without an id get a
    /// synthetic `from->to` key so they can be highlighted too.
    pub fn selection_key(&self) -> Option<String> {
        if let Some(id) = self.id() {
            return Some(id.to_string());
        }
        match self {
            ScheduleBlock::Route(route) => Some(format!("{}->{}", route.from_id, route.to_id)),
            ScheduleBlock::Activity(_) => None,
        }
    }

    pub fn start_time(&self) -> Option<&str> {
        match self {
            ScheduleBlock::Route(route) => route.start_time.as_deref(),
            ScheduleBlock::Activity(activity) => activity.start_time.as_deref(),
        }
    }

    pub fn end_time(&self) -> Option<&str> {
        match self {
            ScheduleBlock::Route(route) => route.end_time.as_deref(),
            ScheduleBlock::Activity(activity) => activity.end_time.as_deref(),
        }
    }

    pub fn start_clock(&self) -> Option<ClockTime> {
        self.start_time().and_then(ClockTime::parse)
    }

    pub fn end_clock(&self) -> Option<ClockTime> {
        self.end_time().and_then(ClockTime::parse)
    }

    pub fn activity(&self) -> String {
        match self {
            ScheduleBlock::Route(route) if route.activity.trim().is_empty() => {
                format!("{} → {}", route.from_id, route.to_id)
            }
            ScheduleBlock::Route(route) => route.activity.clone(),
            ScheduleBlock::Activity(activity) => activity.activity.clone(),
        }
    }

    pub fn category(&self) -> BlockCategory {
        match self {
            ScheduleBlock::Route(_) => BlockCategory::Transportation,
            ScheduleBlock::Activity(activity) => BlockCategory::from_type(&activity.kind),
        }
    }

    /// Point shown on the map for this block, if any.
    pub fn location(&self) -> Option<Coordinates> {
        match self {
            ScheduleBlock::Route(_) => None,
            ScheduleBlock::Activity(activity) => activity.location.filter(Coordinates::is_valid),
        }
    }

    pub fn highlight_tags(&self) -> &[String] {
        match self {
            ScheduleBlock::Route(_) => &[],
            ScheduleBlock::Activity(activity) => &activity.highlight_tags,
        }
    }

    pub fn image_url(&self) -> Option<&str> {
        match self {
            ScheduleBlock::Route(_) => None,
            ScheduleBlock::Activity(activity) => activity.image_url.as_deref(),
        }
    }

    pub fn route(&self) -> Option<&RouteBlock> {
        match self {
            ScheduleBlock::Route(route) => Some(route),
            ScheduleBlock::Activity(_) => None,
        }
    }

    /// Calendar day recorded on the block itself (`date` preferred over `day`).
    pub fn calendar_day(&self) -> Option<Date> {
        let (date, day) = match self {
            ScheduleBlock::Route(route) => (route.date.as_deref(), route.day.as_deref()),
            ScheduleBlock::Activity(activity) => (activity.date.as_deref(), activity.day.as_deref()),
        };
        date.and_then(parse_calendar_date)
            .or_else(|| day.and_then(parse_calendar_date))
    }
}

impl From<ActivityBlock> for ScheduleBlock {
    fn from(block: ActivityBlock) -> Self {
        ScheduleBlock::Activity(block)
    }
}

impl From<RouteBlock> for ScheduleBlock {
    fn from(block: RouteBlock) -> Self {
        ScheduleBlock::Route(block)
    }
}

/// Decodes a day's raw JSON blocks one by one, skipping entries that do not fit either shape.
pub fn decode_blocks(day: &str, raw: Vec<serde_json::Value>) -> Vec<ScheduleBlock> {
    raw.into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value::<ScheduleBlock>(value) {
            Ok(block) => Some(block),
            Err(err) => {
                tracing::warn!(day, index, %err, "skipping undecodable schedule block");
                None
            }
        })
        .collect()
}
