//! Landmark input for the command line: JSON files or inline coordinates.

use std::path::Path;

use anyhow::{bail, Context, Result};
use facecrop_vision::Landmarks;
use serde::Deserialize;

/// Accepted JSON layouts: `[[x, y], ...]`, a flat `[x1, y1, ...]`, or either
/// wrapped as `{ "landmarks": ... }`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum LandmarksJson {
    Points(Vec<[f64; 2]>),
    Flat(Vec<f64>),
    Wrapped { landmarks: Box<LandmarksJson> },
}

impl LandmarksJson {
    fn into_landmarks(self) -> Result<Landmarks> {
        let landmarks = match self {
            Self::Points(points) => Landmarks::from_points(&points)?,
            Self::Flat(coords) => Landmarks::from_flat(&coords)?,
            Self::Wrapped { landmarks } => return landmarks.into_landmarks(),
        };
        Ok(landmarks)
    }
}

pub fn parse_landmarks_json(raw: &str) -> Result<Landmarks> {
    let parsed: LandmarksJson = serde_json::from_str(raw).context("parsing landmark JSON")?;
    parsed.into_landmarks()
}

pub fn load_landmarks(path: &Path) -> Result<Landmarks> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading landmarks {}", path.display()))?;
    parse_landmarks_json(&raw).with_context(|| format!("in {}", path.display()))
}

/// Parse `"x1,y1,x2,y2,...,x5,y5"`; whitespace around values is ignored.
pub fn parse_points(arg: &str) -> Result<Landmarks> {
    let coords = arg
        .split(',')
        .map(|v| {
            v.trim()
                .parse::<f64>()
                .with_context(|| format!("invalid coordinate '{}'", v.trim()))
        })
        .collect::<Result<Vec<_>>>()?;
    if coords.len() != 10 {
        bail!("expected 10 comma separated coordinates, got {}", coords.len());
    }
    Ok(Landmarks::from_flat(&coords)?)
}
