//! Core type definitions for DOM handles and geometry
//!
//! Key distinction carried through the whole codebase: a `NodeId` is
//! transient and invalidated by DOM mutations, while a `BackendNodeId`
//! stays valid across repeated queries of the same live node. Handles held
//! between operations should always be backend node ids.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{DomError, Result};

/// Transient node identifier from `DOM.getDocument`/`DOM.querySelector`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

/// Stable node handle, valid across re-queries of the same live node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BackendNodeId(pub i64);

/// Handle to a JavaScript object living in the page, from `Runtime.*`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RemoteObjectId(pub String);

/// A quad from `DOM.getBoxModel`: four corner points as 8 coordinates
/// `[x1, y1, x2, y2, x3, y3, x4, y4]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quad(pub [f64; 8]);

impl Quad {
    pub fn from_json(value: &Value) -> Result<Self> {
        let raw = value.as_array().ok_or(DomError::MissingField("quad"))?;
        if raw.len() != 8 {
            return Err(DomError::MalformedQuad(raw.len()));
        }
        let mut coords = [0.0; 8];
        for (slot, v) in coords.iter_mut().zip(raw) {
            *slot = v.as_f64().ok_or(DomError::MissingField("quad coordinate"))?;
        }
        Ok(Self(coords))
    }

    /// The x coordinates of the four corners.
    pub fn xs(&self) -> [f64; 4] {
        [self.0[0], self.0[2], self.0[4], self.0[6]]
    }

    /// The y coordinates of the four corners.
    pub fn ys(&self) -> [f64; 4] {
        [self.0[1], self.0[3], self.0[5], self.0[7]]
    }
}

/// Axis-aligned rectangle in CSS pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Enclosing box of a (possibly rotated) border quad. Coordinates are
    /// truncated to whole pixels, matching how capture clips are built.
    pub fn from_border_quad(quad: &Quad) -> Self {
        let xs = quad.xs();
        let ys = quad.ys();
        let min_x = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let min_y = ys.iter().cloned().fold(f64::INFINITY, f64::min);
        let max_x = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let max_y = ys.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        Self {
            x: min_x.trunc(),
            y: min_y.trunc(),
            width: (max_x - min_x).trunc(),
            height: (max_y - min_y).trunc(),
        }
    }

    /// Shift into another coordinate space (e.g. viewport-local to page
    /// coordinates by adding the visual viewport's page offset).
    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: (self.x + dx).trunc(),
            y: (self.y + dy).trunc(),
            width: self.width,
            height: self.height,
        }
    }

    /// True when this box does not fit inside `width` x `height`.
    pub fn exceeds(&self, width: f64, height: f64) -> bool {
        self.width > width || self.height > height
    }
}

/// Box model of a node: content/padding/border/margin quads plus layout size.
#[derive(Debug, Clone, PartialEq)]
pub struct BoxModel {
    pub content: Quad,
    pub padding: Quad,
    pub border: Quad,
    pub margin: Quad,
    pub width: f64,
    pub height: f64,
}

impl BoxModel {
    /// Decode the `model` object of a `DOM.getBoxModel` response.
    pub fn from_json(model: &Value) -> Result<Self> {
        Ok(Self {
            content: Quad::from_json(model.get("content").ok_or(DomError::MissingField("content"))?)?,
            padding: Quad::from_json(model.get("padding").ok_or(DomError::MissingField("padding"))?)?,
            border: Quad::from_json(model.get("border").ok_or(DomError::MissingField("border"))?)?,
            margin: Quad::from_json(model.get("margin").ok_or(DomError::MissingField("margin"))?)?,
            width: model
                .get("width")
                .and_then(Value::as_f64)
                .ok_or(DomError::MissingField("width"))?,
            height: model
                .get("height")
                .and_then(Value::as_f64)
                .ok_or(DomError::MissingField("height"))?,
        })
    }

    /// Bounding box of the border quad, the rect used for capture clips.
    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::from_border_quad(&self.border)
    }
}

/// Attribute name/value mapping of an element node.
pub type AttributeMap = ahash::AHashMap<String, String>;

/// Result of probing a node for selectors that match it uniquely.
///
/// Each candidate is `None` when that strategy did not identify the node
/// uniquely in the document. `unique_attribute_selector` is already a full
/// CSS attribute-conjunction selector; the other two are raw values.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UniqueSelectors {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub unique_id: Option<String>,
    #[serde(default)]
    pub unique_class_combination: Option<String>,
    #[serde(default)]
    pub unique_attribute_selector: Option<String>,
}

impl UniqueSelectors {
    /// True when no probing strategy produced a unique selector.
    pub fn is_empty(&self) -> bool {
        self.unique_id.is_none()
            && self.unique_class_combination.is_none()
            && self.unique_attribute_selector.is_none()
    }
}
