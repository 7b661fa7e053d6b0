//! GLSL version detection and layer program sources.

use canvas_core::Technique;
use glium::CapabilitiesSource;

/// Supported GLSL dialects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GlslVersion {
    Glsl120,
    Glsl140,
}

/// Try to get the best GLSL dialect for the given capabilities.
///
/// Returns `Glsl140` if supported, otherwise `Glsl120`, or `None` if neither
/// is available.
pub fn best_glsl_version(ctx: &impl CapabilitiesSource) -> Option<GlslVersion> {
    let glsl_versions = &ctx.get_capabilities().supported_glsl_versions;

    if glsl_versions
        .iter()
        .any(|v| matches!(v, glium::Version(glium::Api::Gl, 1, 4)))
    {
        Some(GlslVersion::Glsl140)
    } else if glsl_versions
        .iter()
        .any(|v| matches!(v, glium::Version(glium::Api::Gl, 1, 2)))
    {
        Some(GlslVersion::Glsl120)
    } else {
        None
    }
}

/// Keywords that differ between the two dialects.
struct Dialect {
    header: &'static str,
    vertex_in: &'static str,
    vertex_out: &'static str,
    fragment_in: &'static str,
    fragment_out_decl: &'static str,
    fragment_out: &'static str,
    sample: &'static str,
}

impl GlslVersion {
    fn dialect(self) -> Dialect {
        match self {
            GlslVersion::Glsl140 => Dialect {
                header: "#version 140",
                vertex_in: "in",
                vertex_out: "out",
                fragment_in: "in",
                fragment_out_decl: "out vec4 fragColor;",
                fragment_out: "fragColor",
                sample: "texture",
            },
            GlslVersion::Glsl120 => Dialect {
                header: "#version 120",
                vertex_in: "attribute",
                vertex_out: "varying",
                fragment_in: "varying",
                fragment_out_decl: "",
                fragment_out: "gl_FragColor",
                sample: "texture2D",
            },
        }
    }
}

/// Vertex shader shared by every technique: places the unit quad corner into
/// `vLayerQuad` and maps it to `vTextureCoords`.
pub fn vertex_source(version: GlslVersion) -> String {
    let d = version.dialect();
    format!(
        "{header}
uniform mat4 mLayerTransform;
uniform vec4 vLayerQuad;
uniform vec4 vTextureCoords;
{vin} vec2 corner;
{vout} vec2 uv;
void main() {{
    vec2 pos = vLayerQuad.xy + corner * vLayerQuad.zw;
    gl_Position = mLayerTransform * vec4(pos, 0.0, 1.0);
    uv = vTextureCoords.xy + corner * vTextureCoords.zw;
}}
",
        header = d.header,
        vin = d.vertex_in,
        vout = d.vertex_out,
    )
}

/// Fragment shader for `technique`. Filtering is a sampler property, so the
/// point and linear variants share a body.
pub fn fragment_source(version: GlslVersion, technique: Technique) -> String {
    let d = version.dialect();
    let body = match (technique.premultiplied(), technique.samples_alpha()) {
        (true, true) => "",
        (true, false) => "    color.a = 1.0;\n",
        (false, _) => "    color.rgb *= color.a;\n",
    };
    format!(
        "{header}
uniform sampler2D tRGB;
uniform float fLayerOpacity;
{fin} vec2 uv;
{out_decl}
void main() {{
    vec4 color = {sample}(tRGB, uv);
{body}    {out} = color * fLayerOpacity;
}}
",
        header = d.header,
        fin = d.fragment_in,
        out_decl = d.fragment_out_decl,
        sample = d.sample,
        out = d.fragment_out,
    )
}
