//! Overlay geometry: popover placement against a viewport, dropdown panel
//! rects and the row-virtualization window. The shell reports anchor rects
//! and scroll offsets; everything here is plain arithmetic over them.

use serde::{Deserialize, Serialize};

/// Assumed popover size; placement runs before the shell has measured the
/// real element, so the geometry works from these fixed dimensions.
pub const POPOVER_WIDTH: f64 = 320.0;
pub const POPOVER_HEIGHT: f64 = 360.0;
pub const POPOVER_GAP: f64 = 8.0;
pub const VIEWPORT_MARGIN: f64 = 8.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x && x <= self.x + self.width && y >= self.y && y <= self.y + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum PopoverSide {
    Below,
    Above,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PopoverPlacement {
    pub rect: Rect,
    pub side: PopoverSide,
}

fn clamp(value: f64, min: f64, max: f64) -> f64 {
    if max < min {
        // Viewport smaller than the popover; pin to the near margin.
        return min;
    }
    value.min(max).max(min)
}

/// Preferred placement is below the anchor with a small gap; flips above
/// when the bottom edge would overflow the viewport. Horizontal position
/// (and the flipped top) clamp to the viewport margin.
pub fn place_popover(anchor: &Rect, viewport: &Viewport) -> PopoverPlacement {
    let x = clamp(
        anchor.x,
        VIEWPORT_MARGIN,
        viewport.width - POPOVER_WIDTH - VIEWPORT_MARGIN,
    );

    let below_top = anchor.bottom() + POPOVER_GAP;
    if below_top + POPOVER_HEIGHT + VIEWPORT_MARGIN <= viewport.height {
        PopoverPlacement {
            rect: Rect {
                x,
                y: below_top,
                width: POPOVER_WIDTH,
                height: POPOVER_HEIGHT,
            },
            side: PopoverSide::Below,
        }
    } else {
        let y = clamp(
            anchor.y - POPOVER_GAP - POPOVER_HEIGHT,
            VIEWPORT_MARGIN,
            viewport.height - POPOVER_HEIGHT - VIEWPORT_MARGIN,
        );
        PopoverPlacement {
            rect: Rect {
                x,
                y,
                width: POPOVER_WIDTH,
                height: POPOVER_HEIGHT,
            },
            side: PopoverSide::Above,
        }
    }
}

/// Dropdown panels sit directly under their anchor at the anchor's width,
/// capped at `max_height` and never shorter than one row (the empty-state
/// row still needs a hit-testable rect).
pub fn place_panel(anchor: &Rect, rows: usize, row_height: f64, max_height: f64) -> Rect {
    let height = (rows as f64 * row_height).clamp(row_height, max_height);
    Rect {
        x: anchor.x,
        y: anchor.bottom(),
        width: anchor.width,
        height,
    }
}

/// Index window for a fixed-row-height virtualized list. `end` is
/// exclusive. `offsetY` positions the rendered slice inside a spacer of
/// `totalHeight`, so the scrollbar reflects the full list.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VisibleWindow {
    pub start: usize,
    pub end: usize,
    pub offset_y: f64,
    pub total_height: f64,
}

pub fn visible_window(
    scroll_top: f64,
    viewport_height: f64,
    row_height: f64,
    overscan: usize,
    total: usize,
) -> VisibleWindow {
    if total == 0 || row_height <= 0.0 {
        return VisibleWindow {
            start: 0,
            end: 0,
            offset_y: 0.0,
            total_height: 0.0,
        };
    }

    let scroll = scroll_top.max(0.0);
    let first = ((scroll / row_height).floor() as usize).min(total - 1);
    // One extra row covers the partially scrolled-in row at the bottom.
    let visible = (viewport_height.max(0.0) / row_height).ceil() as usize + 1;

    let start = first.saturating_sub(overscan);
    let end = (first + visible + overscan).min(total);

    VisibleWindow {
        start,
        end,
        offset_y: start as f64 * row_height,
        total_height: total as f64 * row_height,
    }
}
