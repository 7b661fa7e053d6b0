//! Shader variant selection and effect constants for the layer quad.

use bitflags::bitflags;

/// Magnification filter applied when the layer is sampled.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    #[default]
    Linear,
}

bitflags! {
    /// Per-draw shader variant key.
    ///
    /// A cleared bit selects the opposite variant: no `PREMUL` means
    /// non-premultiplied input, no `RGBA` means the alpha channel is ignored,
    /// no `POINT` means linear filtering.
    #[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
    pub struct ShaderFlags: u8 {
        const PREMUL = 1 << 0;
        const RGBA = 1 << 1;
        const POINT = 1 << 2;
    }
}

impl ShaderFlags {
    /// Derive the variant key for one draw.
    ///
    /// Non-premultiplied content always samples as RGBA: the shader has to
    /// read alpha to premultiply it.
    pub fn for_content(premultiplied: bool, has_alpha: bool, filter: Filter) -> Self {
        let mut flags = if premultiplied {
            ShaderFlags::PREMUL
        } else {
            ShaderFlags::RGBA
        };
        if has_alpha {
            flags |= ShaderFlags::RGBA;
        }
        if filter == Filter::Nearest {
            flags |= ShaderFlags::POINT;
        }
        flags
    }
}

/// A compiled shader variant for drawing a canvas layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Technique {
    PremulRgbaLinear,
    PremulRgbaPoint,
    PremulRgbLinear,
    PremulRgbPoint,
    NonPremulRgbaLinear,
    NonPremulRgbaPoint,
}

impl Technique {
    /// Every technique a backend has to provide.
    pub const ALL: [Technique; 6] = [
        Technique::PremulRgbaLinear,
        Technique::PremulRgbaPoint,
        Technique::PremulRgbLinear,
        Technique::PremulRgbPoint,
        Technique::NonPremulRgbaLinear,
        Technique::NonPremulRgbaPoint,
    ];

    /// Look up the technique for a flag set.
    ///
    /// Returns `None` for non-premultiplied RGB, which [`ShaderFlags::for_content`]
    /// never produces and no technique implements.
    pub fn select(flags: ShaderFlags) -> Option<Self> {
        let premul = flags.contains(ShaderFlags::PREMUL);
        let rgba = flags.contains(ShaderFlags::RGBA);
        let point = flags.contains(ShaderFlags::POINT);
        match (premul, rgba, point) {
            (true, true, false) => Some(Technique::PremulRgbaLinear),
            (true, true, true) => Some(Technique::PremulRgbaPoint),
            (true, false, false) => Some(Technique::PremulRgbLinear),
            (true, false, true) => Some(Technique::PremulRgbPoint),
            (false, true, false) => Some(Technique::NonPremulRgbaLinear),
            (false, true, true) => Some(Technique::NonPremulRgbaPoint),
            (false, false, _) => None,
        }
    }

    /// The flag set this technique implements.
    pub fn flags(self) -> ShaderFlags {
        match self {
            Technique::PremulRgbaLinear => ShaderFlags::PREMUL | ShaderFlags::RGBA,
            Technique::PremulRgbaPoint => {
                ShaderFlags::PREMUL | ShaderFlags::RGBA | ShaderFlags::POINT
            }
            Technique::PremulRgbLinear => ShaderFlags::PREMUL,
            Technique::PremulRgbPoint => ShaderFlags::PREMUL | ShaderFlags::POINT,
            Technique::NonPremulRgbaLinear => ShaderFlags::RGBA,
            Technique::NonPremulRgbaPoint => ShaderFlags::RGBA | ShaderFlags::POINT,
        }
    }

    pub fn premultiplied(self) -> bool {
        self.flags().contains(ShaderFlags::PREMUL)
    }

    pub fn samples_alpha(self) -> bool {
        self.flags().contains(ShaderFlags::RGBA)
    }

    pub fn filter(self) -> Filter {
        if self.flags().contains(ShaderFlags::POINT) {
            Filter::Nearest
        } else {
            Filter::Linear
        }
    }

    /// Stable name, used for backend shader entry points and logs.
    pub fn name(self) -> &'static str {
        match self {
            Technique::PremulRgbaLinear => "premul_rgba_linear",
            Technique::PremulRgbaPoint => "premul_rgba_point",
            Technique::PremulRgbLinear => "premul_rgb_linear",
            Technique::PremulRgbPoint => "premul_rgb_point",
            Technique::NonPremulRgbaLinear => "nonpremul_rgba_linear",
            Technique::NonPremulRgbaPoint => "nonpremul_rgba_point",
        }
    }

    /// Position in [`Technique::ALL`].
    pub fn index(self) -> usize {
        self as usize
    }
}

/// A rectangle packed as a float4 shader constant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShaderConstantRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ShaderConstantRect {
    /// Texture coordinates covering the whole texture.
    pub const IDENTITY_UV: ShaderConstantRect = ShaderConstantRect::new(0.0, 0.0, 1.0, 1.0);

    /// Whole-texture coordinates, vertically flipped.
    pub const FLIPPED_UV: ShaderConstantRect = ShaderConstantRect::new(0.0, 1.0, 1.0, -1.0);

    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Quad at the origin covering `width` x `height` pixels.
    pub fn from_size(width: u32, height: u32) -> Self {
        Self::new(0.0, 0.0, width as f32, height as f32)
    }

    pub fn to_array(self) -> [f32; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

/// Transform and opacity the host's compositor applies to a layer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTransform {
    /// Column-major 4x4 matrix from layer space to render target space.
    pub matrix: [[f32; 4]; 4],
    pub opacity: f32,
}

impl LayerTransform {
    pub const IDENTITY: LayerTransform = LayerTransform {
        matrix: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
        opacity: 1.0,
    };
}

impl Default for LayerTransform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn every_content_combination_selects_a_technique() {
        for premultiplied in [false, true] {
            for has_alpha in [false, true] {
                for filter in [Filter::Nearest, Filter::Linear] {
                    let flags = ShaderFlags::for_content(premultiplied, has_alpha, filter);
                    let technique = Technique::select(flags)
                        .unwrap_or_else(|| panic!("no technique for {flags:?}"));
                    assert_eq!(technique.premultiplied(), premultiplied);
                    assert_eq!(technique.filter(), filter);
                    // Non-premultiplied content is always sampled with alpha.
                    assert_eq!(technique.samples_alpha(), has_alpha || !premultiplied);
                    assert_eq!(Technique::select(flags), Some(technique));
                }
            }
        }
    }

    #[test]
    fn reachable_flag_sets_have_distinct_techniques() {
        let mut reachable = HashSet::new();
        for premultiplied in [false, true] {
            for has_alpha in [false, true] {
                for filter in [Filter::Nearest, Filter::Linear] {
                    reachable.insert(ShaderFlags::for_content(premultiplied, has_alpha, filter));
                }
            }
        }
        let techniques: HashSet<_> = reachable
            .iter()
            .filter_map(|flags| Technique::select(*flags))
            .collect();
        assert_eq!(reachable.len(), 6);
        assert_eq!(techniques.len(), reachable.len());
    }

    #[test]
    fn technique_flags_round_trip() {
        for technique in Technique::ALL {
            assert_eq!(Technique::select(technique.flags()), Some(technique));
            assert_eq!(Technique::ALL[technique.index()], technique);
        }
    }

    #[test]
    fn non_premultiplied_rgb_has_no_technique() {
        assert_eq!(Technique::select(ShaderFlags::empty()), None);
        assert_eq!(Technique::select(ShaderFlags::POINT), None);
    }

    #[test]
    fn flipped_uv_mirrors_identity_vertically() {
        let id = ShaderConstantRect::IDENTITY_UV;
        let flip = ShaderConstantRect::FLIPPED_UV;
        assert_eq!(flip.x, id.x);
        assert_eq!(flip.width, id.width);
        assert_eq!(flip.y, id.y + id.height);
        assert_eq!(flip.height, -id.height);
    }
}
