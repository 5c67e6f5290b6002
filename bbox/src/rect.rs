use super::{CyCxHW, TLBR};
use crate::common::*;

/// The generic rectangle.
///
/// The `t`, `b` parameters run along the y axis and `l`, `r` along the x axis.
pub trait Rect {
    type Type;

    fn t(&self) -> Self::Type;
    fn l(&self) -> Self::Type;
    fn b(&self) -> Self::Type;
    fn r(&self) -> Self::Type;
    fn cy(&self) -> Self::Type;
    fn cx(&self) -> Self::Type;
    fn h(&self) -> Self::Type;
    fn w(&self) -> Self::Type;

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;

    fn try_from_cycxhw(cycxhw: [Self::Type; 4]) -> Result<Self>
    where
        Self: Sized;
}

pub trait RectNum: Rect
where
    Self::Type: Num + PartialOrd,
{
    fn from_tlbr(tlbr: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_tlbr(tlbr).unwrap()
    }

    fn from_cycxhw(cycxhw: [Self::Type; 4]) -> Self
    where
        Self: Sized,
    {
        Self::try_from_cycxhw(cycxhw).unwrap()
    }

    fn cycxhw(&self) -> [Self::Type; 4] {
        [self.cy(), self.cx(), self.h(), self.w()]
    }

    fn tlbr(&self) -> [Self::Type; 4] {
        [self.t(), self.l(), self.b(), self.r()]
    }

    fn hw(&self) -> [Self::Type; 2] {
        [self.h(), self.w()]
    }

    fn to_cycxhw(&self) -> CyCxHW<Self::Type> {
        CyCxHW {
            cy: self.cy(),
            cx: self.cx(),
            h: self.h(),
            w: self.w(),
        }
    }

    fn to_tlbr(&self) -> TLBR<Self::Type> {
        TLBR {
            t: self.t(),
            l: self.l(),
            b: self.b(),
            r: self.r(),
        }
    }

    /// The signed area. It is negative for inverted boxes.
    fn area(&self) -> <Self::Type as Mul<Self::Type>>::Output
    where
        Self::Type: Mul<Self::Type>,
    {
        self.h() * self.w()
    }
}

pub trait RectFloat: RectNum
where
    Self::Type: Float,
{
    /// Compute the intersection rectangle in TLBR format.
    ///
    /// Boxes sharing only an edge or a corner are not disjoint. They
    /// produce a zero-area intersection instead of `None`.
    fn intersect_with<R>(&self, other: &R) -> Option<TLBR<Self::Type>>
    where
        R: Rect<Type = Self::Type>,
    {
        let t = self.t().max(other.t());
        let l = self.l().max(other.l());
        let b = self.b().min(other.b());
        let r = self.r().min(other.r());
        (b >= t && r >= l).then(|| TLBR { t, l, b, r })
    }

    fn intersection_area_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        self.intersect_with(other)
            .map(|rect| rect.area())
            .unwrap_or_else(Self::Type::zero)
    }

    /// Compute the IoU score with the other box.
    ///
    /// Disjoint boxes return zero before any division takes place. No
    /// epsilon is added to the union, so two zero-area boxes that touch
    /// give NaN.
    fn iou_with<R>(&self, other: &R) -> Self::Type
    where
        R: Rect<Type = Self::Type>,
    {
        match self.intersect_with(other) {
            Some(inter) => {
                let inter_area = inter.area();
                inter_area / (self.area() + other.area() - inter_area)
            }
            None => Self::Type::zero(),
        }
    }

    /// Clip the box into the bounds.
    fn clip_to<R>(&self, bounds: &R) -> TLBR<Self::Type>
    where
        R: Rect<Type = Self::Type>,
    {
        TLBR {
            t: self.t().max(bounds.t()),
            l: self.l().max(bounds.l()),
            b: self.b().min(bounds.b()),
            r: self.r().min(bounds.r()),
        }
    }
}

impl<T> RectNum for T
where
    T: Rect,
    T::Type: Num + PartialOrd,
{
}

impl<T> RectFloat for T
where
    T: Rect,
    T::Type: Float,
{
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use rand::prelude::*;

    fn random_box(rng: &mut impl Rng) -> TLBR<f64> {
        let t = rng.gen_range(0.0..100.0);
        let l = rng.gen_range(0.0..100.0);
        let h = rng.gen_range(0.0..50.0);
        let w = rng.gen_range(0.0..50.0);
        TLBR::from_tlbr([t, l, t + h, l + w])
    }

    #[test]
    fn disjoint_boxes_have_zero_iou() {
        let lhs = TLBR::from_tlbr([0.0, 0.0, 10.0, 10.0]);
        let rhs = TLBR::from_tlbr([20.0, 20.0, 30.0, 30.0]);
        assert!(lhs.intersect_with(&rhs).is_none());
        assert_eq!(lhs.intersection_area_with(&rhs), 0.0);
        assert_eq!(lhs.iou_with(&rhs), 0.0);
    }

    #[test]
    fn intersection_area_of_overlapping_boxes() {
        let lhs = TLBR::from_tlbr([0.0, 0.0, 4.0, 4.0]);
        let rhs = TLBR::from_tlbr([2.0, 1.0, 6.0, 3.0]);
        assert_abs_diff_eq!(lhs.intersection_area_with(&rhs), 4.0);
        assert_abs_diff_eq!(rhs.intersection_area_with(&lhs), 4.0);
    }

    #[test]
    fn touching_boxes_intersect_with_zero_area() {
        let lhs = TLBR::from_tlbr([0.0, 0.0, 10.0, 10.0]);
        let rhs = TLBR::from_tlbr([0.0, 10.0, 10.0, 20.0]);
        let inter = lhs.intersect_with(&rhs).unwrap();
        assert_abs_diff_eq!(inter.area(), 0.0);
        assert_abs_diff_eq!(lhs.iou_with(&rhs), 0.0);
    }

    #[test]
    fn identical_boxes_have_unit_iou() {
        let bbox = TLBR::from_tlbr([3.0, 4.0, 17.0, 29.0]);
        assert_abs_diff_eq!(bbox.iou_with(&bbox.clone()), 1.0);
    }

    #[test]
    fn half_overlap() {
        let lhs = TLBR::from_tlbr([0.0, 0.0, 2.0, 2.0]);
        let rhs = TLBR::from_tlbr([0.0, 1.0, 2.0, 3.0]);
        // intersection 2, union 6
        assert_abs_diff_eq!(lhs.iou_with(&rhs), 1.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn iou_is_symmetric() {
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..1000 {
            let lhs = random_box(&mut rng);
            let rhs = random_box(&mut rng);
            if lhs.area() == 0.0 && rhs.area() == 0.0 {
                continue;
            }
            let forward = lhs.iou_with(&rhs);
            let backward = rhs.iou_with(&lhs);
            assert_abs_diff_eq!(forward, backward, epsilon = 1e-12);
            assert!((0.0..=1.0).contains(&forward));
        }
    }

    #[test]
    fn clip_into_bounds() {
        let bounds = TLBR::from_tlbr([0.0, 0.0, 447.0, 447.0]);
        let bbox = TLBR::from_tlbr([-10.0, 400.0, 30.0, 500.0]);
        let clipped = bbox.clip_to(&bounds);
        assert_eq!(clipped.tlbr(), [0.0, 400.0, 30.0, 447.0]);
    }
}
