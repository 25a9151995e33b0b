// Copyright 2026 the Lamina Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Buffer ↔ surface affine math.
//!
//! A surface's visible content is described by its committed buffer plus
//! four view parameters: the [`BufferTransform`] (one of the eight dihedral
//! symmetries), an integer buffer scale, an optional crop rectangle in
//! surface units and an optional destination size. From these,
//! [`ViewMatrices::build`] derives:
//!
//! - `buffer_to_surface` / `surface_to_buffer`, mapping between buffer
//!   pixels and surface-local coordinates (origin at the surface's top-left);
//! - `forward` / `inverse`, mapping between the canonical unit box
//!   [`UNIT_BOX`] (`[-1, 1]²`) and global compositor space.
//!
//! The forward matrix maps the unit box onto the cropped source region of
//! the buffer, placed at the surface origin, so rectifying the unit box
//! through it yields exactly the surface geometry.

use kurbo::{Affine, Point, Rect, Size, Vec2};

use crate::error::ProtocolViolation;
use crate::region::Region;

/// The canonical `[-1, 1] × [-1, 1]` box.
pub const UNIT_BOX: Rect = Rect {
    x0: -1.0,
    y0: -1.0,
    x1: 1.0,
    y1: 1.0,
};

// Crop bounds are compared with a little slack so that fixed-point crop
// coordinates at the buffer edge are accepted.
const CROP_EPSILON: f64 = 1e-6;

/// How buffer contents are oriented relative to the surface.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BufferTransform {
    /// No transform.
    #[default]
    Normal,
    /// Rotated 90° counter-clockwise.
    Rotate90,
    /// Rotated 180°.
    Rotate180,
    /// Rotated 270° counter-clockwise.
    Rotate270,
    /// Mirrored about the vertical axis.
    Flipped,
    /// Mirrored, then rotated 90°.
    Flipped90,
    /// Mirrored, then rotated 180°.
    Flipped180,
    /// Mirrored, then rotated 270°.
    Flipped270,
}

impl TryFrom<i32> for BufferTransform {
    type Error = ProtocolViolation;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Ok(match value {
            0 => Self::Normal,
            1 => Self::Rotate90,
            2 => Self::Rotate180,
            3 => Self::Rotate270,
            4 => Self::Flipped,
            5 => Self::Flipped90,
            6 => Self::Flipped180,
            7 => Self::Flipped270,
            other => return Err(ProtocolViolation::InvalidTransform(other)),
        })
    }
}

impl BufferTransform {
    /// Returns `true` if the transform exchanges width and height.
    #[must_use]
    pub const fn swaps_axes(self) -> bool {
        matches!(
            self,
            Self::Rotate90 | Self::Rotate270 | Self::Flipped90 | Self::Flipped270
        )
    }

    /// The size of a `size` buffer after applying this transform.
    #[must_use]
    pub fn transformed_size(self, size: Size) -> Size {
        if self.swaps_axes() {
            Size::new(size.height, size.width)
        } else {
            size
        }
    }

    /// The matrix taking buffer pixels of a `size` buffer to transformed
    /// (surface-oriented) pixels. The image of the buffer rectangle is
    /// `Rect::from_origin_size(Point::ORIGIN, self.transformed_size(size))`.
    #[must_use]
    pub fn matrix(self, size: Size) -> Affine {
        let (w, h) = (size.width, size.height);
        let rotate = |quarter: u8| match quarter {
            1 => Affine::new([0.0, 1.0, -1.0, 0.0, h, 0.0]),
            2 => Affine::new([-1.0, 0.0, 0.0, -1.0, w, h]),
            3 => Affine::new([0.0, -1.0, 1.0, 0.0, 0.0, w]),
            _ => Affine::IDENTITY,
        };
        let flip = Affine::new([-1.0, 0.0, 0.0, 1.0, w, 0.0]);
        match self {
            Self::Normal => Affine::IDENTITY,
            Self::Rotate90 => rotate(1),
            Self::Rotate180 => rotate(2),
            Self::Rotate270 => rotate(3),
            Self::Flipped => flip,
            Self::Flipped90 => rotate(1) * flip,
            Self::Flipped180 => rotate(2) * flip,
            Self::Flipped270 => rotate(3) * flip,
        }
    }
}

/// Transforms the four corners of `rect` and returns their axis-aligned
/// bounding box.
#[must_use]
pub fn rectify(affine: Affine, rect: Rect) -> Rect {
    let corners = [
        affine * Point::new(rect.x0, rect.y0),
        affine * Point::new(rect.x1, rect.y0),
        affine * Point::new(rect.x0, rect.y1),
        affine * Point::new(rect.x1, rect.y1),
    ];
    let mut out = Rect::from_points(corners[0], corners[1]);
    out = out.union_pt(corners[2]);
    out.union_pt(corners[3])
}

/// The inputs to the view matrices, resolved from a committed view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewParams {
    /// Buffer size in pixels.
    pub buffer_size: Size,
    /// Buffer orientation.
    pub transform: BufferTransform,
    /// Integer buffer scale, at least 1.
    pub scale: i32,
    /// Source rectangle in surface units, before destination scaling.
    pub crop: Option<Rect>,
    /// Destination size in surface units.
    pub destination: Option<Size>,
}

impl ViewParams {
    /// Parameters for an untransformed, unscaled, uncropped `buffer_size`
    /// buffer.
    #[must_use]
    pub const fn new(buffer_size: Size) -> Self {
        Self {
            buffer_size,
            transform: BufferTransform::Normal,
            scale: 1,
            crop: None,
            destination: None,
        }
    }

    /// The buffer size in surface units after transform and scale, before
    /// cropping.
    #[must_use]
    pub fn logical_size(&self) -> Size {
        let transformed = self.transform.transformed_size(self.buffer_size);
        let scale = f64::from(self.scale.max(1));
        Size::new(transformed.width / scale, transformed.height / scale)
    }

    /// The source rectangle, checked against the buffer.
    pub fn source_rect(&self) -> Result<Rect, ProtocolViolation> {
        if self.scale < 1 {
            return Err(ProtocolViolation::InvalidScale(self.scale));
        }
        let logical = self.logical_size();
        match self.crop {
            None => Ok(Rect::from_origin_size(Point::ORIGIN, logical)),
            Some(crop) => {
                if crop.x0 < -CROP_EPSILON
                    || crop.y0 < -CROP_EPSILON
                    || crop.x1 > logical.width + CROP_EPSILON
                    || crop.y1 > logical.height + CROP_EPSILON
                {
                    Err(ProtocolViolation::OutOfBuffer)
                } else {
                    Ok(crop)
                }
            }
        }
    }

    /// The surface size: the destination size if set, else the source size.
    pub fn surface_size(&self) -> Result<Size, ProtocolViolation> {
        let source = self.source_rect()?;
        Ok(self.destination.unwrap_or_else(|| source.size()))
    }
}

/// The matrices of one committed view.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewMatrices {
    /// Buffer pixels → surface-local coordinates.
    pub buffer_to_surface: Affine,
    /// Surface-local coordinates → buffer pixels.
    pub surface_to_buffer: Affine,
    /// Unit box → global compositor space.
    pub forward: Affine,
    /// Global compositor space → unit box.
    pub inverse: Affine,
    /// Surface size.
    pub size: Size,
    /// Global position of the surface-local origin.
    pub origin: Point,
    // Unit box → surface-local coordinates.
    local: Affine,
}

impl ViewMatrices {
    /// Derives the matrices for `params`, with the surface-local origin at
    /// `origin` in global space.
    pub fn build(params: &ViewParams, origin: Point) -> Result<Self, ProtocolViolation> {
        let source = params.source_rect()?;
        let size = params.surface_size()?;
        if source.width() <= 0.0 || source.height() <= 0.0 {
            return Err(ProtocolViolation::InvalidCrop);
        }
        if size.width <= 0.0 || size.height <= 0.0 {
            return Err(ProtocolViolation::InvalidDestination);
        }

        let buffer_to_surface = Affine::scale_non_uniform(
            size.width / source.width(),
            size.height / source.height(),
        ) * Affine::translate(-source.origin().to_vec2())
            * Affine::scale(1.0 / f64::from(params.scale))
            * params.transform.matrix(params.buffer_size);
        let surface_to_buffer = buffer_to_surface.inverse();

        // The cropped source region in buffer pixels.
        let source_px = rectify(surface_to_buffer, Rect::from_origin_size(Point::ORIGIN, size));
        let unit_to_source = Affine::translate(source_px.origin().to_vec2())
            * Affine::scale_non_uniform(source_px.width() / 2.0, source_px.height() / 2.0)
            * Affine::translate(Vec2::new(1.0, 1.0));
        let local = buffer_to_surface * unit_to_source;

        Ok(Self::place(buffer_to_surface, surface_to_buffer, local, size, origin))
    }

    fn place(
        buffer_to_surface: Affine,
        surface_to_buffer: Affine,
        local: Affine,
        size: Size,
        origin: Point,
    ) -> Self {
        let forward = Affine::translate(origin.to_vec2()) * local;
        Self {
            buffer_to_surface,
            surface_to_buffer,
            forward,
            inverse: forward.inverse(),
            size,
            origin,
            local,
        }
    }

    /// Returns the same view moved so that its origin is at `origin`.
    #[must_use]
    pub fn with_origin(&self, origin: Point) -> Self {
        Self::place(
            self.buffer_to_surface,
            self.surface_to_buffer,
            self.local,
            self.size,
            origin,
        )
    }

    /// The surface's bounding box in global space.
    #[must_use]
    pub fn geometry(&self) -> Rect {
        rectify(self.forward, UNIT_BOX)
    }

    /// Maps a global point into the unit box.
    #[must_use]
    pub fn global_to_unit(&self, point: Point) -> Point {
        self.inverse * point
    }

    /// Maps surface-local damage to buffer pixels, rounded outward.
    #[must_use]
    pub fn surface_to_buffer_region(&self, region: &Region) -> Region {
        region.map_bbox(self.surface_to_buffer).expand_to_pixels()
    }

    /// Maps buffer-pixel damage to surface-local coordinates.
    #[must_use]
    pub fn buffer_to_surface_region(&self, region: &Region) -> Region {
        region.map_bbox(self.buffer_to_surface)
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    use super::*;

    fn assert_point_eq(a: Point, b: Point) {
        assert_relative_eq!(a.x, b.x, epsilon = 1e-9);
        assert_relative_eq!(a.y, b.y, epsilon = 1e-9);
    }

    #[test]
    fn transform_codes() {
        assert_eq!(BufferTransform::try_from(0), Ok(BufferTransform::Normal));
        assert_eq!(BufferTransform::try_from(5), Ok(BufferTransform::Flipped90));
        assert_eq!(
            BufferTransform::try_from(8),
            Err(ProtocolViolation::InvalidTransform(8))
        );
        assert_eq!(
            BufferTransform::try_from(-1),
            Err(ProtocolViolation::InvalidTransform(-1))
        );
    }

    #[test]
    fn every_transform_maps_buffer_onto_transformed_rect() {
        let size = Size::new(100.0, 50.0);
        for code in 0..8 {
            let t = BufferTransform::try_from(code).unwrap();
            let image = rectify(t.matrix(size), Rect::from_origin_size(Point::ORIGIN, size));
            assert_eq!(
                image,
                Rect::from_origin_size(Point::ORIGIN, t.transformed_size(size)),
                "{t:?}"
            );
        }
    }

    #[test]
    fn identity_geometry() {
        let m = ViewMatrices::build(&ViewParams::new(Size::new(100.0, 50.0)), Point::new(10.0, 20.0))
            .unwrap();
        assert_eq!(m.geometry(), Rect::new(10.0, 20.0, 110.0, 70.0));
        assert_point_eq(m.forward * Point::new(-1.0, -1.0), Point::new(10.0, 20.0));
        assert_point_eq(m.forward * Point::new(1.0, 1.0), Point::new(110.0, 70.0));
        assert_point_eq(m.global_to_unit(Point::new(60.0, 45.0)), Point::ORIGIN);
    }

    #[test]
    fn rotated_buffer_swaps_surface_size() {
        let params = ViewParams {
            transform: BufferTransform::Rotate90,
            ..ViewParams::new(Size::new(100.0, 50.0))
        };
        let m = ViewMatrices::build(&params, Point::ORIGIN).unwrap();
        assert_eq!(m.size, Size::new(50.0, 100.0));
        assert_eq!(m.geometry(), Rect::new(0.0, 0.0, 50.0, 100.0));
        // Buffer origin lands on the surface's top-right corner.
        assert_point_eq(m.buffer_to_surface * Point::ORIGIN, Point::new(50.0, 0.0));
    }

    #[test]
    fn scale_divides_surface_size() {
        let params = ViewParams {
            scale: 2,
            ..ViewParams::new(Size::new(200.0, 100.0))
        };
        let m = ViewMatrices::build(&params, Point::ORIGIN).unwrap();
        assert_eq!(m.geometry(), Rect::new(0.0, 0.0, 100.0, 50.0));
        assert_point_eq(m.surface_to_buffer * Point::new(10.0, 10.0), Point::new(20.0, 20.0));
    }

    #[test]
    fn crop_and_destination() {
        let params = ViewParams {
            crop: Some(Rect::new(25.0, 25.0, 75.0, 75.0)),
            destination: Some(Size::new(200.0, 200.0)),
            ..ViewParams::new(Size::new(100.0, 100.0))
        };
        let m = ViewMatrices::build(&params, Point::new(5.0, 5.0)).unwrap();
        assert_eq!(m.geometry(), Rect::new(5.0, 5.0, 205.0, 205.0));
        assert_point_eq(m.surface_to_buffer * Point::ORIGIN, Point::new(25.0, 25.0));
        assert_point_eq(
            m.surface_to_buffer * Point::new(200.0, 200.0),
            Point::new(75.0, 75.0),
        );
        // The unit box corners sit on the crop corners in buffer space.
        let corner = m.surface_to_buffer * (m.forward * Point::new(-1.0, -1.0) - Vec2::new(5.0, 5.0));
        assert_point_eq(corner, Point::new(25.0, 25.0));
    }

    #[test]
    fn crop_outside_buffer_is_rejected() {
        let params = ViewParams {
            crop: Some(Rect::new(50.0, 0.0, 150.0, 10.0)),
            ..ViewParams::new(Size::new(100.0, 100.0))
        };
        assert_eq!(
            ViewMatrices::build(&params, Point::ORIGIN),
            Err(ProtocolViolation::OutOfBuffer)
        );
    }

    #[test]
    fn moving_origin_keeps_size() {
        let m = ViewMatrices::build(&ViewParams::new(Size::new(30.0, 40.0)), Point::ORIGIN).unwrap();
        let moved = m.with_origin(Point::new(-10.0, 7.0));
        assert_eq!(moved.geometry(), Rect::new(-10.0, 7.0, 20.0, 47.0));
        assert_eq!(moved.buffer_to_surface, m.buffer_to_surface);
    }

    #[test]
    fn buffer_damage_follows_rotation() {
        let params = ViewParams {
            transform: BufferTransform::Rotate90,
            ..ViewParams::new(Size::new(100.0, 50.0))
        };
        let m = ViewMatrices::build(&params, Point::ORIGIN).unwrap();
        let damage = Region::from_rect(Rect::new(0.0, 0.0, 10.0, 5.0));
        let surface = m.buffer_to_surface_region(&damage);
        assert_eq!(surface.rects(), &[Rect::new(45.0, 0.0, 50.0, 10.0)]);
        let back = m.surface_to_buffer_region(&surface);
        assert_eq!(back.rects(), &[Rect::new(0.0, 0.0, 10.0, 5.0)]);
    }

    /// Crops are drawn as fractions of the logical size so they always fit.
    fn params_strategy() -> impl Strategy<Value = ViewParams> {
        let crop = prop::option::of((0.0..0.9_f64, 0.0..0.9_f64, 0.05..=1.0_f64, 0.05..=1.0_f64));
        let destination = prop::option::of((1..4096_u32, 1..4096_u32));
        (0..8_i32, 1..4_i32, 1..2048_u32, 1..2048_u32, crop, destination).prop_map(
            |(t, scale, w, h, crop, destination)| {
                let mut params = ViewParams {
                    buffer_size: Size::new(f64::from(w), f64::from(h)),
                    transform: BufferTransform::try_from(t).unwrap(),
                    scale,
                    ..ViewParams::new(Size::ZERO)
                };
                let logical = params.logical_size();
                params.crop = crop.map(|(fx, fy, fw, fh)| {
                    let x = fx * logical.width;
                    let y = fy * logical.height;
                    Rect::new(
                        x,
                        y,
                        x + fw * (logical.width - x),
                        y + fh * (logical.height - y),
                    )
                });
                params.destination =
                    destination.map(|(dw, dh)| Size::new(f64::from(dw), f64::from(dh)));
                params
            },
        )
    }

    proptest! {
        #[test]
        fn forward_inverse_round_trip(
            params in params_strategy(),
            ox in -5000.0..5000.0_f64,
            oy in -5000.0..5000.0_f64,
            ux in -1.0..1.0_f64,
            uy in -1.0..1.0_f64,
        ) {
            let m = ViewMatrices::build(&params, Point::new(ox, oy)).unwrap();
            let unit = Point::new(ux, uy);
            let back = m.inverse * (m.forward * unit);
            prop_assert!((back.x - unit.x).abs() < 1e-6);
            prop_assert!((back.y - unit.y).abs() < 1e-6);
        }

        #[test]
        fn cropped_damage_maps_back_over_itself(
            params in params_strategy(),
            fx in 0.0..1.0_f64,
            fy in 0.0..1.0_f64,
            fw in 0.0..1.0_f64,
            fh in 0.0..1.0_f64,
        ) {
            let m = ViewMatrices::build(&params, Point::ORIGIN).unwrap();
            let x = fx * m.size.width;
            let y = fy * m.size.height;
            let rect = Rect::new(
                x,
                y,
                x + (fw * (m.size.width - x)).max(1e-3),
                y + (fh * (m.size.height - y)).max(1e-3),
            );
            let damage = Region::from_rect(rect);
            let back = m.buffer_to_surface_region(&m.surface_to_buffer_region(&damage));
            prop_assert!(back.covers(rect.inset(-1e-6)), "{back:?} misses {rect:?}");
        }

        #[test]
        fn unit_box_lands_on_geometry(params in params_strategy()) {
            let m = ViewMatrices::build(&params, Point::new(3.0, 4.0)).unwrap();
            let size = params.surface_size().unwrap();
            let g = m.geometry();
            prop_assert!((g.x0 - 3.0).abs() < 1e-6);
            prop_assert!((g.y0 - 4.0).abs() < 1e-6);
            prop_assert!((g.width() - size.width).abs() < 1e-6);
            prop_assert!((g.height() - size.height).abs() < 1e-6);
        }
    }
}
