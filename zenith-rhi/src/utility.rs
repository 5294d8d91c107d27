use std::ops::{Bound, RangeBounds};
use ash::vk;

/// Generates `resolve_range_<ty>`, turning range bounds into `(start, count)`
/// inside `0..len`. Out of bounds or reversed ranges are rejected.
macro_rules! resolve_range_function {
    ($unsigned:ty) => {
        $crate::paste! {
            pub(crate) fn [<resolve_range_ $unsigned>]<R: RangeBounds<$unsigned>>(
                bounds: R,
                len: $unsigned,
            ) -> Result<($unsigned, $unsigned), vk::Result> {
                let start = match bounds.start_bound().cloned() {
                    Bound::Included(v) => Some(v),
                    Bound::Excluded(v) => v.checked_add(1),
                    Bound::Unbounded => Some(0),
                };
                let end = match bounds.end_bound().cloned() {
                    Bound::Included(v) => v.checked_add(1),
                    Bound::Excluded(v) => Some(v),
                    Bound::Unbounded => Some(len),
                };

                match (start, end) {
                    (Some(start), Some(end)) if start <= end && end <= len => Ok((start, end - start)),
                    _ => Err(vk::Result::ERROR_VALIDATION_FAILED_EXT),
                }
            }
        }
    };
}

resolve_range_function!(u64);
resolve_range_function!(u32);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_bounds() {
        assert_eq!(resolve_range_u32(.., 6).unwrap(), (0, 6));
        assert_eq!(resolve_range_u32(2..=3, 6).unwrap(), (2, 2));
        assert_eq!(resolve_range_u64(16.., 64).unwrap(), (16, 48));
        assert_eq!(resolve_range_u32(6.., 6).unwrap(), (6, 0));
        assert!(resolve_range_u32(4..2, 6).is_err());
        assert!(resolve_range_u64(..65, 64).is_err());
        assert!(resolve_range_u32(..=u32::MAX, 6).is_err());
    }
}
