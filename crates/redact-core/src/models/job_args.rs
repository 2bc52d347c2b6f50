//! Job arguments and their query-parameter encoding.

use std::fmt;
use std::str::FromStr;

use super::types::Region;
use crate::{RedactError, Result};

/// Rectangle of a frame that scopes where detection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AreaOfInterest {
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
}

impl AreaOfInterest {
    pub fn new(x: i64, y: i64, width: i64, height: i64) -> Self {
        Self { x, y, width, height }
    }

    fn validate(&self) -> Result<()> {
        if self.x < 0 || self.y < 0 {
            return Err(RedactError::validation(format!(
                "area of interest {} has a negative origin",
                self
            )));
        }
        if self.width <= 0 || self.height <= 0 {
            return Err(RedactError::validation(format!(
                "area of interest {} must have positive width and height",
                self
            )));
        }
        Ok(())
    }

    fn area(&self) -> i64 {
        self.width * self.height
    }

    /// Intersection over union with `other`; 0.0 for disjoint or touching rectangles.
    pub fn iou(&self, other: &AreaOfInterest) -> f64 {
        let left = self.x.max(other.x);
        let top = self.y.max(other.y);
        let right = (self.x + self.width).min(other.x + other.width);
        let bottom = (self.y + self.height).min(other.y + other.height);
        if right <= left || bottom <= top {
            return 0.0;
        }
        let intersection = (right - left) * (bottom - top);
        let union = self.area() + other.area() - intersection;
        intersection as f64 / union as f64
    }
}

impl fmt::Display for AreaOfInterest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.width, self.height)
    }
}

/// Parses `"x,y,width,height"`.
impl FromStr for AreaOfInterest {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let values: Vec<i64> = s
            .split(',')
            .map(|v| v.trim().parse::<i64>())
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| format!("invalid area of interest '{}': {}", s, e))?;
        match values.as_slice() {
            [x, y, width, height] => Ok(Self::new(*x, *y, *width, *height)),
            _ => Err(format!(
                "invalid area of interest '{}': expected x,y,width,height",
                s
            )),
        }
    }
}

/// What to redact and how. Immutable once built; unset fields are never sent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobArguments {
    region: Option<Region>,
    face: Option<bool>,
    license_plate: Option<bool>,
    full_body: Option<bool>,
    speed_optimized: Option<bool>,
    vehicle_recorded_data: Option<bool>,
    single_frame_optimized: Option<bool>,
    lp_determination_threshold: Option<f64>,
    face_determination_threshold: Option<f64>,
    full_body_segmentation_threshold: Option<f64>,
    status_webhook_url: Option<String>,
    areas_of_interest: Vec<AreaOfInterest>,
}

const AREAS_KEY: &str = "areas_of_interest";

impl JobArguments {
    pub fn builder() -> JobArgumentsBuilder {
        JobArgumentsBuilder::default()
    }

    pub fn region(&self) -> Option<Region> {
        self.region
    }

    pub fn face(&self) -> Option<bool> {
        self.face
    }

    pub fn license_plate(&self) -> Option<bool> {
        self.license_plate
    }

    pub fn areas_of_interest(&self) -> &[AreaOfInterest] {
        &self.areas_of_interest
    }

    pub fn status_webhook_url(&self) -> Option<&str> {
        self.status_webhook_url.as_deref()
    }

    /// Flat `key=value` pairs for the query string. Each area of interest is
    /// a repeated `areas_of_interest=x,y,width,height` pair.
    pub fn to_query_pairs(&self) -> Vec<(String, String)> {
        let mut pairs = Vec::new();
        let mut push = |key: &str, value: Option<String>| {
            if let Some(v) = value {
                pairs.push((key.to_string(), v));
            }
        };
        push("region", self.region.map(|r| r.to_string()));
        push("face", self.face.map(|b| b.to_string()));
        push("license_plate", self.license_plate.map(|b| b.to_string()));
        push("full_body", self.full_body.map(|b| b.to_string()));
        push("speed_optimized", self.speed_optimized.map(|b| b.to_string()));
        push("vehicle_recorded_data", self.vehicle_recorded_data.map(|b| b.to_string()));
        push("single_frame_optimized", self.single_frame_optimized.map(|b| b.to_string()));
        push("lp_determination_threshold", self.lp_determination_threshold.map(|t| t.to_string()));
        push("face_determination_threshold", self.face_determination_threshold.map(|t| t.to_string()));
        push(
            "full_body_segmentation_threshold",
            self.full_body_segmentation_threshold.map(|t| t.to_string()),
        );
        push("status_webhook_url", self.status_webhook_url.clone());
        for area in &self.areas_of_interest {
            pairs.push((AREAS_KEY.to_string(), area.to_string()));
        }
        pairs
    }

    /// Inverse of [`to_query_pairs`](Self::to_query_pairs). Unknown keys are
    /// rejected; the result is validated like a built value.
    pub fn from_query_pairs<K, V>(pairs: &[(K, V)]) -> Result<Self>
    where
        K: AsRef<str>,
        V: AsRef<str>,
    {
        let mut b = JobArgumentsBuilder::default();
        for (key, value) in pairs {
            let (key, value) = (key.as_ref(), value.as_ref());
            b = match key {
                "region" => b.region(value.parse().map_err(RedactError::Validation)?),
                "face" => b.face(parse_bool(key, value)?),
                "license_plate" => b.license_plate(parse_bool(key, value)?),
                "full_body" => b.full_body(parse_bool(key, value)?),
                "speed_optimized" => b.speed_optimized(parse_bool(key, value)?),
                "vehicle_recorded_data" => b.vehicle_recorded_data(parse_bool(key, value)?),
                "single_frame_optimized" => b.single_frame_optimized(parse_bool(key, value)?),
                "lp_determination_threshold" => b.lp_determination_threshold(parse_f64(key, value)?),
                "face_determination_threshold" => b.face_determination_threshold(parse_f64(key, value)?),
                "full_body_segmentation_threshold" => {
                    b.full_body_segmentation_threshold(parse_f64(key, value)?)
                }
                "status_webhook_url" => b.status_webhook_url(value),
                AREAS_KEY => b.area_of_interest(value.parse().map_err(RedactError::Validation)?),
                other => {
                    return Err(RedactError::validation(format!("unknown job argument '{}'", other)))
                }
            };
        }
        b.build()
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    value
        .parse()
        .map_err(|_| RedactError::validation(format!("{} expects true or false, got '{}'", key, value)))
}

fn parse_f64(key: &str, value: &str) -> Result<f64> {
    value
        .parse()
        .map_err(|_| RedactError::validation(format!("{} expects a number, got '{}'", key, value)))
}

#[derive(Debug, Clone, Default)]
pub struct JobArgumentsBuilder {
    args: JobArguments,
}

impl JobArgumentsBuilder {
    pub fn region(mut self, region: Region) -> Self {
        self.args.region = Some(region);
        self
    }

    pub fn face(mut self, on: bool) -> Self {
        self.args.face = Some(on);
        self
    }

    pub fn license_plate(mut self, on: bool) -> Self {
        self.args.license_plate = Some(on);
        self
    }

    pub fn full_body(mut self, on: bool) -> Self {
        self.args.full_body = Some(on);
        self
    }

    pub fn speed_optimized(mut self, on: bool) -> Self {
        self.args.speed_optimized = Some(on);
        self
    }

    pub fn vehicle_recorded_data(mut self, on: bool) -> Self {
        self.args.vehicle_recorded_data = Some(on);
        self
    }

    pub fn single_frame_optimized(mut self, on: bool) -> Self {
        self.args.single_frame_optimized = Some(on);
        self
    }

    pub fn lp_determination_threshold(mut self, t: f64) -> Self {
        self.args.lp_determination_threshold = Some(t);
        self
    }

    pub fn face_determination_threshold(mut self, t: f64) -> Self {
        self.args.face_determination_threshold = Some(t);
        self
    }

    pub fn full_body_segmentation_threshold(mut self, t: f64) -> Self {
        self.args.full_body_segmentation_threshold = Some(t);
        self
    }

    pub fn status_webhook_url(mut self, url: impl Into<String>) -> Self {
        self.args.status_webhook_url = Some(url.into());
        self
    }

    pub fn area_of_interest(mut self, area: AreaOfInterest) -> Self {
        self.args.areas_of_interest.push(area);
        self
    }

    pub fn areas_of_interest(mut self, areas: impl IntoIterator<Item = AreaOfInterest>) -> Self {
        self.args.areas_of_interest.extend(areas);
        self
    }

    /// Validate thresholds and areas of interest.
    pub fn build(self) -> Result<JobArguments> {
        let a = self.args;
        for (name, value) in [
            ("lp_determination_threshold", a.lp_determination_threshold),
            ("face_determination_threshold", a.face_determination_threshold),
            ("full_body_segmentation_threshold", a.full_body_segmentation_threshold),
        ] {
            if let Some(t) = value {
                if !(0.0..=1.0).contains(&t) {
                    return Err(RedactError::validation(format!(
                        "{} must be within [0, 1], got {}",
                        name, t
                    )));
                }
            }
        }
        for area in &a.areas_of_interest {
            area.validate()?;
        }
        for (i, first) in a.areas_of_interest.iter().enumerate() {
            for second in &a.areas_of_interest[i + 1..] {
                if first.iou(second) > 0.0 {
                    return Err(RedactError::validation(format!(
                        "areas of interest {} and {} overlap",
                        first, second
                    )));
                }
            }
        }
        Ok(a)
    }
}
