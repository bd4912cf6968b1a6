/// Threads per dispatch group along X and Y. The kernel declares the same
/// `@workgroup_size`, so the two must change together.
pub const DISPATCH_TILE: u32 = 8;

/// Number of dispatch groups needed to cover `extent` texels along one axis.
pub fn dispatch_groups(extent: u32) -> u32 {
    extent.div_ceil(DISPATCH_TILE)
}

/// Group counts for a full 2D dispatch over `width` x `height`.
pub fn dispatch_grid(width: u32, height: u32) -> [u32; 3] {
    [dispatch_groups(width), dispatch_groups(height), 1]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn covers_every_extent_with_the_fewest_groups() {
        for extent in 1..=1024u32 {
            let groups = dispatch_groups(extent);
            assert!(groups * DISPATCH_TILE >= extent, "extent {extent}");
            assert!((groups - 1) * DISPATCH_TILE < extent, "extent {extent}");
            assert!(groups > 0);
        }
    }

    #[test]
    fn boundary_values() {
        assert_eq!(dispatch_groups(0), 0);
        assert_eq!(dispatch_groups(1), 1);
        assert_eq!(dispatch_groups(8), 1);
        assert_eq!(dispatch_groups(9), 2);
        assert_eq!(dispatch_groups(64), 8);
        assert_eq!(dispatch_groups(u32::MAX), u32::MAX / 8 + 1);
    }

    #[test]
    fn grid_is_flat_in_z() {
        assert_eq!(dispatch_grid(1920, 1081), [240, 136, 1]);
    }
}
