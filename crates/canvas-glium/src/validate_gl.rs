//! Hand the OpenGL context back to the compositor in a known state.

/// Describes an OpenGL texture target/binding pair.
pub struct TextureType {
    pub target: u32,
    pub binding: u32,
}

/// Texture targets unbound during the reset.
pub const TEXTURE_TYPES: [TextureType; 2] = [
    TextureType {
        target: gl::TEXTURE_1D,
        binding: gl::TEXTURE_BINDING_1D,
    },
    TextureType {
        target: gl::TEXTURE_2D,
        binding: gl::TEXTURE_BINDING_2D,
    },
];

/// Reset OpenGL state back to what the compositor expects after a layer draw.
///
/// Unbinds programs, textures, buffers and VAOs, disables blending and
/// rebinds `host_fbo`.
///
/// # Safety
///
/// Must be called with a valid OpenGL context current.
pub unsafe fn restore_host_state(host_fbo: u32) {
    gl::UseProgram(0);

    let mut num_samplers = 0;
    gl::GetIntegerv(gl::MAX_TEXTURE_IMAGE_UNITS, &mut num_samplers);

    for texture_type in TEXTURE_TYPES.iter() {
        for sampler in 0..num_samplers {
            gl::ActiveTexture(gl::TEXTURE0 + sampler as u32);
            gl::BindTexture(texture_type.target, 0);
        }
    }

    gl::ActiveTexture(gl::TEXTURE0);

    gl::BindBuffer(gl::ARRAY_BUFFER, 0);
    gl::BindVertexArray(0);
    gl::Disable(gl::BLEND);

    gl::BlendFunc(gl::ONE, gl::ZERO);

    gl::BindFramebuffer(gl::FRAMEBUFFER, host_fbo);
}

/// Query the size of level 0 of a 2D texture name, or `None` if the name is
/// not a texture.
///
/// # Safety
///
/// Must be called with a valid OpenGL context current. Leaves
/// `GL_TEXTURE_2D` unbound on the active unit.
pub unsafe fn texture_size(name: u32) -> Option<(u32, u32)> {
    if gl::IsTexture(name) == gl::FALSE {
        return None;
    }
    let (mut width, mut height) = (0, 0);
    gl::BindTexture(gl::TEXTURE_2D, name);
    gl::GetTexLevelParameteriv(gl::TEXTURE_2D, 0, gl::TEXTURE_WIDTH, &mut width);
    gl::GetTexLevelParameteriv(gl::TEXTURE_2D, 0, gl::TEXTURE_HEIGHT, &mut height);
    gl::BindTexture(gl::TEXTURE_2D, 0);
    if width <= 0 || height <= 0 {
        return None;
    }
    Some((width as u32, height as u32))
}
