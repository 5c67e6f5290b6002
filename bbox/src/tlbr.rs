use super::{CyCxHW, Rect};
use crate::common::*;

/// Bounding box in TLBR format.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TLBR<T> {
    pub(crate) t: T,
    pub(crate) l: T,
    pub(crate) b: T,
    pub(crate) r: T,
}

impl<T> TLBR<T> {
    /// Build a box from the `[xmin, ymin, xmax, ymax]` corner order used by
    /// annotation records, without checking the ordering.
    ///
    /// Inverted boxes get a negative area.
    pub fn from_xyxy_unchecked(xyxy: [T; 4]) -> Self {
        let [l, t, r, b] = xyxy;
        Self { t, l, b, r }
    }
}

impl<T> TLBR<T>
where
    T: Copy,
{
    /// The corners in `[xmin, ymin, xmax, ymax]` order.
    pub fn xyxy(&self) -> [T; 4] {
        [self.l, self.t, self.r, self.b]
    }
}

impl<T> Rect for TLBR<T>
where
    T: Copy + Num + PartialOrd,
{
    type Type = T;

    fn t(&self) -> Self::Type {
        self.t
    }

    fn l(&self) -> Self::Type {
        self.l
    }

    fn b(&self) -> Self::Type {
        self.b
    }

    fn r(&self) -> Self::Type {
        self.r
    }

    fn cy(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.t + self.h() / two
    }

    fn cx(&self) -> Self::Type {
        let two = T::one() + T::one();
        self.l + self.w() / two
    }

    fn h(&self) -> Self::Type {
        self.b - self.t
    }

    fn w(&self) -> Self::Type {
        self.r - self.l
    }

    fn try_from_cycxhw(cycxhw: [Self::Type; 4]) -> Result<Self> {
        let [cy, cx, h, w] = cycxhw;
        let zero = T::zero();
        ensure!(h >= zero && w >= zero, "h and w must be non-negative");

        let two = T::one() + T::one();
        let t = cy - h / two;
        let b = cy + h / two;
        let l = cx - w / two;
        let r = cx + w / two;

        Ok(Self { t, l, b, r })
    }

    fn try_from_tlbr(tlbr: [Self::Type; 4]) -> Result<Self> {
        let [t, l, b, r] = tlbr;
        ensure!(b >= t && r >= l, "b >= t and r >= l must hold");

        Ok(Self { t, l, b, r })
    }
}

impl<T> From<CyCxHW<T>> for TLBR<T>
where
    T: Copy + Num,
{
    fn from(from: CyCxHW<T>) -> Self {
        Self::from(&from)
    }
}

impl<T> From<&CyCxHW<T>> for TLBR<T>
where
    T: Copy + Num,
{
    fn from(from: &CyCxHW<T>) -> Self {
        let two = T::one() + T::one();
        let CyCxHW { cy, cx, h, w } = *from;
        let t = cy - h / two;
        let l = cx - w / two;
        let b = cy + h / two;
        let r = cx + w / two;
        Self { t, l, b, r }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RectNum;

    #[test]
    fn reject_inverted_corners() {
        assert!(TLBR::try_from_tlbr([5.0, 0.0, 1.0, 3.0]).is_err());
        assert!(TLBR::try_from_cycxhw([5.0, 0.0, -1.0, 3.0]).is_err());
    }

    #[test]
    fn xyxy_order() {
        let bbox = TLBR::from_xyxy_unchecked([1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bbox.tlbr(), [2.0, 1.0, 4.0, 3.0]);
        assert_eq!(bbox.xyxy(), [1.0, 2.0, 3.0, 4.0]);
        assert_eq!(bbox.area(), 4.0);
    }

    #[test]
    fn inverted_box_has_negative_area() {
        let bbox = TLBR::from_xyxy_unchecked([4.0, 0.0, 2.0, 1.0]);
        assert_eq!(bbox.area(), -2.0);
    }
}
