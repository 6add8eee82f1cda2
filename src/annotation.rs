use serde::Serialize;

use crate::models::{ClickRequest, Marker, PercentPoint, Surface};

/// Converts a click inside a `width` x `height` wrapper into percentages.
/// Degenerate rectangles and non-finite input yield `None`.
pub fn to_percent(click: &ClickRequest) -> Option<PercentPoint> {
    if !(click.width > 0.0 && click.height > 0.0) {
        return None;
    }
    let x = click.x / click.width * 100.0;
    let y = click.y / click.height * 100.0;
    (x.is_finite() && y.is_finite()).then_some(PercentPoint { x, y })
}

pub fn rounded(point: PercentPoint) -> (i64, i64) {
    (point.x.round() as i64, point.y.round() as i64)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PendingMarker {
    pub surface: Surface,
    pub position: PercentPoint,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarkerGlyph {
    pub number: usize,
    pub left: f64,
    pub top: f64,
    pub annotation: String,
}

#[derive(Debug, Default, Clone)]
pub struct MarkerBoard {
    original: Vec<Marker>,
    staged: Vec<Marker>,
    pending: Option<PendingMarker>,
}

impl MarkerBoard {
    pub fn markers(&self, surface: Surface) -> &[Marker] {
        match surface {
            Surface::Original => &self.original,
            Surface::Staged => &self.staged,
        }
    }

    fn markers_mut(&mut self, surface: Surface) -> &mut Vec<Marker> {
        match surface {
            Surface::Original => &mut self.original,
            Surface::Staged => &mut self.staged,
        }
    }

    pub fn pending(&self) -> Option<PendingMarker> {
        self.pending
    }

    /// Starts a new annotation at the clicked position. Rejected when the
    /// surface shows no image or the click hit an existing glyph.
    pub fn place(&mut self, surface: Surface, click: &ClickRequest, has_image: bool) -> Option<PercentPoint> {
        if !has_image || click.on_marker {
            return None;
        }
        let position = to_percent(click)?;
        self.pending = Some(PendingMarker { surface, position });
        Some(position)
    }

    /// Appends the pending marker with `text`. Blank text keeps the position
    /// pending so the annotation can still be typed or cancelled.
    pub fn commit(&mut self, surface: Surface, text: &str) -> Option<&Marker> {
        let annotation = text.trim();
        if annotation.is_empty() {
            return None;
        }
        let pending = self.pending.filter(|p| p.surface == surface)?;
        self.pending = None;
        let markers = self.markers_mut(surface);
        markers.push(Marker { x: pending.position.x, y: pending.position.y, annotation: annotation.to_string() });
        markers.last()
    }

    pub fn discard_pending(&mut self) {
        self.pending = None;
    }

    pub fn clear(&mut self, surface: Surface) {
        self.markers_mut(surface).clear();
        if self.pending.is_some_and(|p| p.surface == surface) {
            self.pending = None;
        }
    }

    pub fn render(&self, surface: Surface) -> Vec<MarkerGlyph> {
        self.markers(surface)
            .iter()
            .enumerate()
            .map(|(index, marker)| MarkerGlyph {
                number: index + 1,
                left: marker.x,
                top: marker.y,
                annotation: marker.annotation.clone(),
            })
            .collect()
    }
}
