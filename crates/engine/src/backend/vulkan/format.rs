use crate::backend::{CullMode, PrimitiveTopology, TextureFormat};
use ash::vk;

pub fn to_vk(format: TextureFormat) -> vk::Format {
    match format {
        TextureFormat::Unknown => vk::Format::UNDEFINED,
        TextureFormat::Rgba8Unorm => vk::Format::R8G8B8A8_UNORM,
        TextureFormat::Rgba8UnormSrgb => vk::Format::R8G8B8A8_SRGB,
        TextureFormat::Bgra8Unorm => vk::Format::B8G8R8A8_UNORM,
        TextureFormat::Bgra8UnormSrgb => vk::Format::B8G8R8A8_SRGB,
        TextureFormat::D16Unorm => vk::Format::D16_UNORM,
        TextureFormat::D32Float => vk::Format::D32_SFLOAT,
        TextureFormat::D16UnormS8Uint => vk::Format::D16_UNORM_S8_UINT,
        TextureFormat::D24UnormS8Uint => vk::Format::D24_UNORM_S8_UINT,
        TextureFormat::D32FloatS8Uint => vk::Format::D32_SFLOAT_S8_UINT,
    }
}

pub fn from_vk(format: vk::Format) -> TextureFormat {
    match format {
        vk::Format::R8G8B8A8_UNORM => TextureFormat::Rgba8Unorm,
        vk::Format::R8G8B8A8_SRGB => TextureFormat::Rgba8UnormSrgb,
        vk::Format::B8G8R8A8_UNORM => TextureFormat::Bgra8Unorm,
        vk::Format::B8G8R8A8_SRGB => TextureFormat::Bgra8UnormSrgb,
        vk::Format::D16_UNORM => TextureFormat::D16Unorm,
        vk::Format::D32_SFLOAT => TextureFormat::D32Float,
        vk::Format::D16_UNORM_S8_UINT => TextureFormat::D16UnormS8Uint,
        vk::Format::D24_UNORM_S8_UINT => TextureFormat::D24UnormS8Uint,
        vk::Format::D32_SFLOAT_S8_UINT => TextureFormat::D32FloatS8Uint,
        _ => TextureFormat::Unknown,
    }
}

/// Aspects a view of `format` covers.
pub fn aspect_mask(format: vk::Format) -> vk::ImageAspectFlags {
    let texture_format = from_vk(format);
    match (texture_format.has_depth(), texture_format.has_stencil()) {
        (true, true) => vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL,
        (true, false) => vk::ImageAspectFlags::DEPTH,
        _ => vk::ImageAspectFlags::COLOR,
    }
}

pub fn topology(topology: PrimitiveTopology) -> vk::PrimitiveTopology {
    match topology {
        PrimitiveTopology::TriangleList => vk::PrimitiveTopology::TRIANGLE_LIST,
        PrimitiveTopology::TriangleStrip => vk::PrimitiveTopology::TRIANGLE_STRIP,
        PrimitiveTopology::LineList => vk::PrimitiveTopology::LINE_LIST,
        PrimitiveTopology::PointList => vk::PrimitiveTopology::POINT_LIST,
    }
}

pub fn cull_mode(mode: CullMode) -> vk::CullModeFlags {
    match mode {
        CullMode::None => vk::CullModeFlags::NONE,
        CullMode::Front => vk::CullModeFlags::FRONT,
        CullMode::Back => vk::CullModeFlags::BACK,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn swapchain_formats_survive_the_trip() {
        for format in [
            vk::Format::B8G8R8A8_UNORM,
            vk::Format::R8G8B8A8_SRGB,
            vk::Format::D24_UNORM_S8_UINT,
        ] {
            assert_eq!(to_vk(from_vk(format)), format);
        }
        assert_eq!(from_vk(vk::Format::A2B10G10R10_UNORM_PACK32), TextureFormat::Unknown);
    }

    #[test]
    fn depth_stencil_views_cover_both_aspects() {
        assert_eq!(
            aspect_mask(vk::Format::D32_SFLOAT_S8_UINT),
            vk::ImageAspectFlags::DEPTH | vk::ImageAspectFlags::STENCIL
        );
        assert_eq!(aspect_mask(vk::Format::D32_SFLOAT), vk::ImageAspectFlags::DEPTH);
        assert_eq!(aspect_mask(vk::Format::B8G8R8A8_UNORM), vk::ImageAspectFlags::COLOR);
    }
}
