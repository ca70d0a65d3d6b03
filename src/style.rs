use crate::error::VectorizeError;
use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// The closed set of vectorization presets.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VectorStyle {
    #[default]
    Realistic,
    FlatDesign,
    Minimalist,
    LowPoly,
    Abstract,
    PixelArt,
}

// Indexed by `VectorStyle as usize`; order must follow the enum declaration.
const STYLE_PROMPTS: [&str; 6] = [
    "Convert this image into a highly detailed SVG vector illustration. Trace the shapes and colors as accurately as possible using vector paths to recreate the image appearance. Use layers of paths to achieve depth.",
    "Convert this image into a 'Flat Design' style SVG. Use solid, vibrant colors, simplified shapes, and remove gradients or textures. Focus on clarity and icon-like aesthetics.",
    "Convert this image into 'Minimalist Line Art' SVG. Use strokes (lines) primarily, with minimal fills. Focus on the essential contours and outline of the subject. Black and white or single color preferred unless color is essential.",
    "Convert this image into a 'Low Poly' geometric SVG. Compose the image entirely of triangles and polygons with solid fill colors to create a faceted, 3D-like effect.",
    "Create an 'Abstract' artistic interpretation of this image in SVG. Focus on the mood, dominant colors, and flowing shapes rather than strict realism.",
    "Convert this image into a 'Pixel Art' style SVG. Use small squares (<rect>) to simulate a retro 8-bit or 16-bit look.",
];

impl VectorStyle {
    /// All presets in display order.
    pub const ALL: [VectorStyle; 6] = [
        VectorStyle::Realistic,
        VectorStyle::FlatDesign,
        VectorStyle::Minimalist,
        VectorStyle::LowPoly,
        VectorStyle::Abstract,
        VectorStyle::PixelArt,
    ];

    /// Human readable preset name.
    pub fn label(&self) -> &'static str {
        match self {
            VectorStyle::Realistic => "Realistic Tracing",
            VectorStyle::FlatDesign => "Flat Design Icon",
            VectorStyle::Minimalist => "Minimalist Line Art",
            VectorStyle::LowPoly => "Low Poly Geometric",
            VectorStyle::Abstract => "Abstract Artistic",
            VectorStyle::PixelArt => "Pixel Art Style",
        }
    }

    /// Short kebab case name, as used on the command line.
    pub fn slug(&self) -> &'static str {
        match self {
            VectorStyle::Realistic => "realistic",
            VectorStyle::FlatDesign => "flat-design",
            VectorStyle::Minimalist => "minimalist",
            VectorStyle::LowPoly => "low-poly",
            VectorStyle::Abstract => "abstract",
            VectorStyle::PixelArt => "pixel-art",
        }
    }

    /// The style specific instruction sent alongside the image.
    pub fn prompt(&self) -> &'static str {
        STYLE_PROMPTS[*self as usize]
    }
}

impl fmt::Display for VectorStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VectorStyle {
    type Err = VectorizeError;

    /// Accepts the label, the slug or the slug with spaces, ignoring case.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace(['_', ' '], "-");
        VectorStyle::ALL
            .into_iter()
            .find(|style| {
                let label = style.label().to_ascii_lowercase().replace(' ', "-");
                wanted == style.slug() || wanted == label
            })
            .ok_or_else(|| VectorizeError::UnknownStyle(s.to_string()))
    }
}

/// Instruction for a style.
pub fn style_prompt(style: VectorStyle) -> &'static str {
    style.prompt()
}

/// Instruction for a free-form style name; unknown names get the realistic one.
pub fn style_prompt_for_label(label: &str) -> &'static str {
    label
        .parse::<VectorStyle>()
        .unwrap_or_default()
        .prompt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_style_has_a_distinct_prompt() {
        let prompts: HashSet<&str> = VectorStyle::ALL.iter().map(|s| s.prompt()).collect();
        assert_eq!(prompts.len(), VectorStyle::ALL.len());
        assert!(prompts.iter().all(|p| !p.is_empty()));
    }

    #[test]
    fn prompts_follow_the_style() {
        assert!(style_prompt(VectorStyle::LowPoly).contains("'Low Poly'"));
        assert!(style_prompt(VectorStyle::PixelArt).contains("<rect>"));
        assert!(style_prompt(VectorStyle::Minimalist).contains("Minimalist Line Art"));
        assert!(style_prompt(VectorStyle::FlatDesign).contains("Flat Design"));
        assert!(style_prompt(VectorStyle::Abstract).contains("Abstract"));
        assert!(style_prompt(VectorStyle::Realistic).contains("highly detailed"));
    }

    #[test]
    fn default_and_unknown_fall_back_to_realistic() {
        let realistic = VectorStyle::Realistic.prompt();
        assert_eq!(VectorStyle::default().prompt(), realistic);
        assert_eq!(style_prompt_for_label("Watercolor"), realistic);
        assert_eq!(style_prompt_for_label(""), realistic);
        assert_eq!(
            style_prompt_for_label("Low Poly Geometric"),
            VectorStyle::LowPoly.prompt()
        );
    }

    #[test]
    fn parses_labels_and_slugs() {
        assert_eq!("Low Poly Geometric".parse::<VectorStyle>().unwrap(), VectorStyle::LowPoly);
        assert_eq!("pixel-art".parse::<VectorStyle>().unwrap(), VectorStyle::PixelArt);
        assert_eq!("flat design".parse::<VectorStyle>().unwrap(), VectorStyle::FlatDesign);
        assert_eq!("MINIMALIST".parse::<VectorStyle>().unwrap(), VectorStyle::Minimalist);
        assert!(matches!(
            "cubism".parse::<VectorStyle>(),
            Err(VectorizeError::UnknownStyle(_))
        ));
    }

    #[test]
    fn labels_round_trip_through_from_str() {
        for style in VectorStyle::ALL {
            assert_eq!(style.label().parse::<VectorStyle>().unwrap(), style);
            assert_eq!(style.to_string(), style.label());
        }
    }
}
