use std::fmt;

/// Framing buckets accepted by the image model's `aspectRatio` hint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AspectRatio {
    Square,
    Landscape16x9,
    Landscape4x3,
    Portrait9x16,
    Portrait3x4,
}

impl AspectRatio {
    #[cfg(test)]
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape16x9,
        AspectRatio::Landscape4x3,
        AspectRatio::Portrait9x16,
        AspectRatio::Portrait3x4,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Landscape4x3 => "4:3",
            AspectRatio::Portrait9x16 => "9:16",
            AspectRatio::Portrait3x4 => "3:4",
        }
    }

    /// Buckets pixel dimensions. Checks run in order and the first match wins;
    /// ratios between the bands (e.g. exactly 1.2) fall back to square.
    pub fn classify(width: u32, height: u32) -> AspectRatio {
        let ratio = f64::from(width) / f64::from(height);
        if (ratio - 1.0).abs() < 0.15 {
            AspectRatio::Square
        } else if ratio > 1.6 {
            AspectRatio::Landscape16x9
        } else if ratio > 1.2 {
            AspectRatio::Landscape4x3
        } else if ratio < 0.65 {
            AspectRatio::Portrait9x16
        } else if ratio < 0.85 {
            AspectRatio::Portrait3x4
        } else {
            AspectRatio::Square
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_boundaries() {
        assert_eq!(AspectRatio::classify(100, 100).as_str(), "1:1");
        assert_eq!(AspectRatio::classify(192, 108).as_str(), "16:9");
        assert_eq!(AspectRatio::classify(400, 300).as_str(), "4:3");
        assert_eq!(AspectRatio::classify(108, 192).as_str(), "9:16");
        assert_eq!(AspectRatio::classify(300, 400).as_str(), "3:4");
        // 1.2 is not strictly greater than 1.2.
        assert_eq!(AspectRatio::classify(120, 100).as_str(), "1:1");
        assert_eq!(AspectRatio::classify(1080, 1920), AspectRatio::Portrait9x16);
    }

    #[test]
    fn total_and_deterministic_over_grid() {
        let sizes = [1u32, 2, 3, 7, 64, 99, 100, 101, 480, 719, 1080, 1920, 4096];
        for &width in &sizes {
            for &height in &sizes {
                let first = AspectRatio::classify(width, height);
                assert!(AspectRatio::ALL.contains(&first));
                assert_eq!(first, AspectRatio::classify(width, height));
            }
        }
    }

    #[test]
    fn degenerate_heights_do_not_panic() {
        assert!(AspectRatio::ALL.contains(&AspectRatio::classify(10, 0)));
        assert!(AspectRatio::ALL.contains(&AspectRatio::classify(0, 0)));
    }
}
