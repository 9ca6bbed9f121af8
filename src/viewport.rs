/// Display area shared by camera constraints and overlay sizing.
///
/// Derived once at startup from a single window width and immutable
/// afterwards. The 3/5 and 9/20 factors keep the preview at 60% of the
/// window width with a 4:3 aspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn from_window_width(window_width: u32) -> Self {
        Self {
            width: window_width * 3 / 5,
            height: window_width * 9 / 20,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derives_sixty_percent_width() {
        let vp = Viewport::from_window_width(1000);
        assert_eq!(vp.width, 600);
        assert_eq!(vp.height, 450);
    }

    #[test]
    fn width_and_height_stay_consistent() {
        for w in [0u32, 1, 17, 640, 1280, 1920, 3840] {
            let vp = Viewport::from_window_width(w);
            // 4:3 aspect, modulo integer truncation
            assert!(vp.height <= vp.width);
            assert!(vp.width <= w);
            let expected_h = (w as f64 * 0.45) as u32;
            assert!(vp.height.abs_diff(expected_h) <= 1);
        }
    }
}
