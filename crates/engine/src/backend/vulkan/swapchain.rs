use crate::backend::vulkan::context::{Queues, VkContext};
use crate::backend::vulkan::format;
use crate::backend::TextureFormat;
use crate::error::{EngineError, EngineResult, VkResultExt};
use ash::khr::surface;
use ash::{vk, Device};
use itertools::Itertools;

/// Depth formats tried, in order, when the requested one can't be used.
const DEPTH_FALLBACKS: [vk::Format; 3] = [
    vk::Format::D24_UNORM_S8_UINT,
    vk::Format::D32_SFLOAT_S8_UINT,
    vk::Format::D16_UNORM_S8_UINT,
];

pub struct Swapchain {
    pub properties: SwapchainProperties,
    pub swapchain_fn: ash::khr::swapchain::Device,
    pub swapchain: vk::SwapchainKHR,

    pub images: Vec<vk::Image>,
    pub image_views: Vec<vk::ImageView>,
    /// Last layout each image was transitioned to.
    pub image_layouts: Vec<vk::ImageLayout>,

    pub depth: DepthBuffer,
}

impl Swapchain {
    pub fn create(
        vk_context: &VkContext,
        queues: &Queues,
        dimensions: [u32; 2],
        depth_format: TextureFormat,
    ) -> EngineResult<Self> {
        let details = SwapchainSupportDetails::new(
            vk_context.physical_device,
            &vk_context.surface_fn,
            vk_context.surface,
        )?;

        let swapchain_properties = details.get_ideal_swapchain_properties(dimensions).ok_or(
            EngineError::InvalidCallOrder("swapchain creation for a zero-sized surface"),
        )?;

        let image_count = {
            let max = details.capabilities.max_image_count;
            let mut preferred = details.capabilities.min_image_count + 1;
            if max > 0 && preferred > max {
                preferred = max;
            }
            preferred
        };

        log::debug!(
            "Creating swapchain.\n\tFormat: {:?}\n\tColorSpace: {:?}\n\tPresentMode: {:?}\n\tExtent: {:?}\n\tImageCount: {}",
            swapchain_properties.format.format,
            swapchain_properties.format.color_space,
            swapchain_properties.present_mode,
            swapchain_properties.extent,
            image_count,
        );

        let family_indices = [queues.graphics.family_index, queues.present.family_index];
        let create_info = {
            let default = vk::SwapchainCreateInfoKHR::default()
                .surface(vk_context.surface)
                .min_image_count(image_count)
                .image_format(swapchain_properties.format.format)
                .image_color_space(swapchain_properties.format.color_space)
                .image_extent(swapchain_properties.extent)
                .image_array_layers(1)
                .image_usage(vk::ImageUsageFlags::COLOR_ATTACHMENT);

            let default = if family_indices[0] != family_indices[1] {
                default
                    .image_sharing_mode(vk::SharingMode::CONCURRENT)
                    .queue_family_indices(&family_indices)
            } else {
                default.image_sharing_mode(vk::SharingMode::EXCLUSIVE)
            };

            default
                .pre_transform(details.capabilities.current_transform)
                .composite_alpha(vk::CompositeAlphaFlagsKHR::OPAQUE)
                .present_mode(swapchain_properties.present_mode)
                .clipped(true)
        };

        let swapchain_fn =
            ash::khr::swapchain::Device::new(&vk_context.instance, &vk_context.device);
        let swapchain = unsafe { swapchain_fn.create_swapchain(&create_info, None) }
            .vk_op("vkCreateSwapchainKHR")?;
        let swapchain_images = unsafe { swapchain_fn.get_swapchain_images(swapchain) }
            .vk_op("vkGetSwapchainImagesKHR")?;

        let swapchain_image_views = swapchain_images
            .iter()
            .map(|image| {
                let create_info = vk::ImageViewCreateInfo::default()
                    .image(*image)
                    .view_type(vk::ImageViewType::TYPE_2D)
                    .format(swapchain_properties.format.format)
                    .subresource_range(vk::ImageSubresourceRange {
                        aspect_mask: vk::ImageAspectFlags::COLOR,
                        base_mip_level: 0,
                        level_count: 1,
                        base_array_layer: 0,
                        layer_count: 1,
                    });

                unsafe { vk_context.device.create_image_view(&create_info, None) }
                    .vk_op("vkCreateImageView")
            })
            .collect::<EngineResult<Vec<_>>>()?;

        let depth = DepthBuffer::create(vk_context, swapchain_properties.extent, depth_format)?;

        Ok(Self {
            properties: swapchain_properties,
            swapchain_fn,
            swapchain,
            image_layouts: vec![vk::ImageLayout::UNDEFINED; swapchain_images.len()],
            images: swapchain_images,
            image_views: swapchain_image_views,
            depth,
        })
    }

    pub fn extent(&self) -> vk::Extent2D {
        self.properties.extent
    }

    /// Extent a swapchain for `dimensions` would get right now, `None` while the
    /// surface has no area (e.g. a minimized window).
    pub fn surface_extent(
        vk_context: &VkContext,
        dimensions: [u32; 2],
    ) -> EngineResult<Option<vk::Extent2D>> {
        let details = SwapchainSupportDetails::new(
            vk_context.physical_device,
            &vk_context.surface_fn,
            vk_context.surface,
        )?;
        Ok(SwapchainSupportDetails::choose_swapchain_extent(
            details.capabilities,
            dimensions,
        ))
    }

    pub unsafe fn destroy(&mut self, device: &Device) {
        log::debug!("Start: Destroying swapchain");
        unsafe {
            self.depth.destroy(device);
            self.image_views
                .iter()
                .for_each(|image_view| device.destroy_image_view(*image_view, None));
            self.swapchain_fn.destroy_swapchain(self.swapchain, None);
        }
        log::debug!("End: Destroying swapchain");
    }
}

pub struct DepthBuffer {
    pub image: vk::Image,
    pub memory: vk::DeviceMemory,
    pub view: vk::ImageView,
    pub format: vk::Format,
    pub layout: vk::ImageLayout,
}

impl DepthBuffer {
    fn create(
        vk_context: &VkContext,
        extent: vk::Extent2D,
        requested: TextureFormat,
    ) -> EngineResult<Self> {
        let requested_vk = format::to_vk(requested);
        let candidates = std::iter::once(requested_vk)
            .chain(DEPTH_FALLBACKS)
            .unique()
            .collect_vec();
        let format = vk_context
            .find_supported_format(
                &candidates,
                vk::ImageTiling::OPTIMAL,
                vk::FormatFeatureFlags::DEPTH_STENCIL_ATTACHMENT,
            )
            .ok_or_else(|| EngineError::UnsupportedFormat(format!("{requested:?}")))?;
        if format != requested_vk {
            log::warn!("Depth format {requested:?} is not supported, using {format:?} instead");
        }

        let image_info = vk::ImageCreateInfo::default()
            .image_type(vk::ImageType::TYPE_2D)
            .format(format)
            .extent(vk::Extent3D {
                width: extent.width,
                height: extent.height,
                depth: 1,
            })
            .mip_levels(1)
            .array_layers(1)
            .samples(vk::SampleCountFlags::TYPE_1)
            .tiling(vk::ImageTiling::OPTIMAL)
            .usage(vk::ImageUsageFlags::DEPTH_STENCIL_ATTACHMENT)
            .sharing_mode(vk::SharingMode::EXCLUSIVE)
            .initial_layout(vk::ImageLayout::UNDEFINED);

        let device = &vk_context.device;
        let image = unsafe { device.create_image(&image_info, None) }.vk_op("vkCreateImage")?;

        let requirements = unsafe { device.get_image_memory_requirements(image) };
        let memory_type = vk_context
            .find_memory_type(
                requirements.memory_type_bits,
                vk::MemoryPropertyFlags::DEVICE_LOCAL,
            )
            .ok_or(EngineError::Vulkan {
                operation: "find depth buffer memory type",
                result: vk::Result::ERROR_OUT_OF_DEVICE_MEMORY,
            })?;
        let alloc_info = vk::MemoryAllocateInfo::default()
            .allocation_size(requirements.size)
            .memory_type_index(memory_type);
        let memory =
            unsafe { device.allocate_memory(&alloc_info, None) }.vk_op("vkAllocateMemory")?;
        unsafe { device.bind_image_memory(image, memory, 0) }.vk_op("vkBindImageMemory")?;

        let view_info = vk::ImageViewCreateInfo::default()
            .image(image)
            .view_type(vk::ImageViewType::TYPE_2D)
            .format(format)
            .subresource_range(vk::ImageSubresourceRange {
                aspect_mask: format::aspect_mask(format),
                base_mip_level: 0,
                level_count: 1,
                base_array_layer: 0,
                layer_count: 1,
            });
        let view =
            unsafe { device.create_image_view(&view_info, None) }.vk_op("vkCreateImageView")?;

        Ok(Self {
            image,
            memory,
            view,
            format,
            layout: vk::ImageLayout::UNDEFINED,
        })
    }

    unsafe fn destroy(&mut self, device: &Device) {
        unsafe {
            device.destroy_image_view(self.view, None);
            device.destroy_image(self.image, None);
            device.free_memory(self.memory, None);
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct SwapchainProperties {
    pub format: vk::SurfaceFormatKHR,
    pub present_mode: vk::PresentModeKHR,
    pub extent: vk::Extent2D,
}

pub struct SwapchainSupportDetails {
    pub capabilities: vk::SurfaceCapabilitiesKHR,
    pub formats: Vec<vk::SurfaceFormatKHR>,
    pub present_modes: Vec<vk::PresentModeKHR>,
}

impl SwapchainSupportDetails {
    pub fn new(
        device: vk::PhysicalDevice,
        surface_fn: &surface::Instance,
        surface: vk::SurfaceKHR,
    ) -> EngineResult<Self> {
        let capabilities =
            unsafe { surface_fn.get_physical_device_surface_capabilities(device, surface) }
                .vk_op("query surface capabilities")?;

        let formats = unsafe { surface_fn.get_physical_device_surface_formats(device, surface) }
            .vk_op("query surface formats")?;

        let present_modes =
            unsafe { surface_fn.get_physical_device_surface_present_modes(device, surface) }
                .vk_op("query surface present modes")?;

        Ok(Self {
            capabilities,
            formats,
            present_modes,
        })
    }

    fn get_ideal_swapchain_properties(
        &self,
        preferred_dimensions: [u32; 2],
    ) -> Option<SwapchainProperties> {
        let format = Self::choose_swapchain_surface_format(&self.formats);
        let present_mode = Self::choose_swapchain_present_mode(&self.present_modes);
        let extent = Self::choose_swapchain_extent(self.capabilities, preferred_dimensions)?;
        Some(SwapchainProperties {
            format,
            present_mode,
            extent,
        })
    }

    /// Choose the swapchain surface format.
    ///
    /// Will choose B8G8R8A8_UNORM/SRGB_NONLINEAR if possible, then any other
    /// 8-bit RGBA layout the engine knows, and the first available otherwise.
    fn choose_swapchain_surface_format(
        available_formats: &[vk::SurfaceFormatKHR],
    ) -> vk::SurfaceFormatKHR {
        if available_formats.len() == 1 && available_formats[0].format == vk::Format::UNDEFINED {
            return vk::SurfaceFormatKHR {
                format: vk::Format::B8G8R8A8_UNORM,
                color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
            };
        }

        let preferred = [
            vk::Format::B8G8R8A8_UNORM,
            vk::Format::R8G8B8A8_UNORM,
            vk::Format::B8G8R8A8_SRGB,
            vk::Format::R8G8B8A8_SRGB,
        ];

        preferred
            .iter()
            .find_map(|wanted| {
                available_formats.iter().find(|f| {
                    f.format == *wanted && f.color_space == vk::ColorSpaceKHR::SRGB_NONLINEAR
                })
            })
            .copied()
            .unwrap_or(available_formats[0])
    }

    /// Choose the swapchain present mode.
    ///
    /// Will favor MAILBOX (aka. Triple buffering) otherwise FIFO.
    /// If none is present it will fall back to IMMEDIATE.
    fn choose_swapchain_present_mode(
        available_present_modes: &[vk::PresentModeKHR],
    ) -> vk::PresentModeKHR {
        if available_present_modes.contains(&vk::PresentModeKHR::MAILBOX) {
            vk::PresentModeKHR::MAILBOX
        } else if available_present_modes.contains(&vk::PresentModeKHR::FIFO) {
            vk::PresentModeKHR::FIFO
        } else {
            vk::PresentModeKHR::IMMEDIATE
        }
    }

    /// Choose the swapchain extent.
    ///
    /// If a current extent is defined it will be returned.
    /// Otherwise, the surface extent clamped between the min
    /// and max image extent will be returned.
    /// `None` if either side is zero, no swapchain can be created then.
    fn choose_swapchain_extent(
        capabilities: vk::SurfaceCapabilitiesKHR,
        preferred_dimensions: [u32; 2],
    ) -> Option<vk::Extent2D> {
        let extent = if capabilities.current_extent.width != u32::MAX {
            capabilities.current_extent
        } else {
            let min = capabilities.min_image_extent;
            let max = capabilities.max_image_extent;
            let width = preferred_dimensions[0].min(max.width).max(min.width);
            let height = preferred_dimensions[1].min(max.height).max(min.height);
            vk::Extent2D { width, height }
        };

        (extent.width > 0 && extent.height > 0).then_some(extent)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn surface_format(format: vk::Format) -> vk::SurfaceFormatKHR {
        vk::SurfaceFormatKHR {
            format,
            color_space: vk::ColorSpaceKHR::SRGB_NONLINEAR,
        }
    }

    #[test]
    fn present_mode_prefers_mailbox_then_fifo() {
        use vk::PresentModeKHR as Mode;
        assert_eq!(
            SwapchainSupportDetails::choose_swapchain_present_mode(&[Mode::FIFO, Mode::MAILBOX]),
            Mode::MAILBOX
        );
        assert_eq!(
            SwapchainSupportDetails::choose_swapchain_present_mode(&[Mode::IMMEDIATE, Mode::FIFO]),
            Mode::FIFO
        );
        assert_eq!(
            SwapchainSupportDetails::choose_swapchain_present_mode(&[]),
            Mode::IMMEDIATE
        );
    }

    #[test]
    fn surface_format_prefers_known_layouts() {
        let available = [
            surface_format(vk::Format::A2B10G10R10_UNORM_PACK32),
            surface_format(vk::Format::R8G8B8A8_UNORM),
        ];
        let chosen = SwapchainSupportDetails::choose_swapchain_surface_format(&available);
        assert_eq!(chosen.format, vk::Format::R8G8B8A8_UNORM);

        let undefined = [surface_format(vk::Format::UNDEFINED)];
        let chosen = SwapchainSupportDetails::choose_swapchain_surface_format(&undefined);
        assert_eq!(chosen.format, vk::Format::B8G8R8A8_UNORM);
    }

    #[test]
    fn extent_is_clamped_when_surface_leaves_it_open() {
        let capabilities = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            min_image_extent: vk::Extent2D {
                width: 1,
                height: 1,
            },
            max_image_extent: vk::Extent2D {
                width: 1024,
                height: 1024,
            },
            ..Default::default()
        };

        let extent =
            SwapchainSupportDetails::choose_swapchain_extent(capabilities, [1280, 720]).unwrap();
        assert_eq!((extent.width, extent.height), (1024, 720));

        let fixed = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 800,
                height: 600,
            },
            ..capabilities
        };
        let extent = SwapchainSupportDetails::choose_swapchain_extent(fixed, [1280, 720]).unwrap();
        assert_eq!((extent.width, extent.height), (800, 600));
    }

    #[test]
    fn minimized_surface_has_no_usable_extent() {
        let minimized = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: 0,
                height: 0,
            },
            ..Default::default()
        };
        assert_eq!(
            SwapchainSupportDetails::choose_swapchain_extent(minimized, [1280, 720]),
            None
        );

        // surface leaves the size to us, but the window reports no height
        let open = vk::SurfaceCapabilitiesKHR {
            current_extent: vk::Extent2D {
                width: u32::MAX,
                height: u32::MAX,
            },
            max_image_extent: vk::Extent2D {
                width: 4096,
                height: 4096,
            },
            ..Default::default()
        };
        assert_eq!(SwapchainSupportDetails::choose_swapchain_extent(open, [1280, 0]), None);
    }
}
