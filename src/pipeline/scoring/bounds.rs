use super::types::{BoundingBox, CropRegion, InkMask};

/// Minimal rectangle enclosing every ink pixel, in one pass over the mask.
///
/// Returns `None` when there is no ink, or when the ink spans fewer than
/// `min_extent` pixels in either axis (stray specks are not a drawing).
pub fn locate_bounding_box(mask: &InkMask, min_extent: u32) -> Option<BoundingBox> {
    let width = mask.width() as usize;
    if width == 0 {
        return None;
    }

    let mut bbox: Option<BoundingBox> = None;
    for (i, &v) in mask.as_slice().iter().enumerate() {
        if v != 255 {
            continue;
        }
        let x = (i % width) as u32;
        let y = (i / width) as u32;
        bbox = Some(match bbox {
            None => BoundingBox { min_x: x, min_y: y, max_x: x, max_y: y },
            Some(b) => BoundingBox {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }

    bbox.filter(|b| !b.is_degenerate(min_extent))
}

/// Expand `bbox` by `padding` on every side, clamped to the image.
///
/// `None` if the clamped region has no area.
pub fn padded_crop_region(
    bbox: &BoundingBox,
    image_width: u32,
    image_height: u32,
    padding: u32,
) -> Option<CropRegion> {
    let left = bbox.min_x.saturating_sub(padding);
    let top = bbox.min_y.saturating_sub(padding);
    let right = bbox
        .max_x
        .saturating_add(padding)
        .saturating_add(1)
        .min(image_width);
    let bottom = bbox
        .max_y
        .saturating_add(padding)
        .saturating_add(1)
        .min(image_height);

    let width = right.checked_sub(left).filter(|&w| w > 0)?;
    let height = bottom.checked_sub(top).filter(|&h| h > 0)?;

    Some(CropRegion { x: left, y: top, width, height })
}
