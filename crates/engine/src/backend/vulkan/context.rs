use crate::backend::features::{DeviceFeatureState, DeviceFeatures, EngineCreateInfo};
use crate::backend::vulkan::debug;
use crate::backend::vulkan::swapchain::SwapchainSupportDetails;
use crate::error::{EngineError, EngineResult, VkResultExt};
use crate::window::NativeWindow;
use ash::ext::debug_utils;
use ash::khr::surface;
use ash::{vk, Device, Entry, Instance};
use itertools::Itertools;
use std::ffi::CStr;

pub struct VkContext {
    _vulkan_fn: Entry,
    pub instance: Instance,
    debug_messenger: Option<(debug_utils::Instance, vk::DebugUtilsMessengerEXT)>,
    pub surface_fn: surface::Instance,
    pub surface: vk::SurfaceKHR,
    pub physical_device: vk::PhysicalDevice,
    pub device: Device,
    pub features: DeviceFeatures,
}

#[derive(Copy, Clone)]
pub struct QueueData {
    pub queue: vk::Queue,
    pub family_index: u32,
}

/// The queues the backend submits and presents on.
#[derive(Copy, Clone)]
pub struct Queues {
    pub graphics: QueueData,
    pub present: QueueData,
}

struct DeviceCandidate {
    physical_device: vk::PhysicalDevice,
    graphics_family: u32,
    present_family: u32,
    features: DeviceFeatures,
}

impl VkContext {
    pub fn get_mem_properties(&self) -> vk::PhysicalDeviceMemoryProperties {
        unsafe {
            self.instance
                .get_physical_device_memory_properties(self.physical_device)
        }
    }

    /// Find the first compatible format from `candidates`.
    pub fn find_supported_format(
        &self,
        candidates: &[vk::Format],
        tiling: vk::ImageTiling,
        features: vk::FormatFeatureFlags,
    ) -> Option<vk::Format> {
        candidates.iter().cloned().find(|candidate| {
            let props = unsafe {
                self.instance
                    .get_physical_device_format_properties(self.physical_device, *candidate)
            };
            (tiling == vk::ImageTiling::LINEAR && props.linear_tiling_features.contains(features))
                || (tiling == vk::ImageTiling::OPTIMAL
                    && props.optimal_tiling_features.contains(features))
        })
    }

    /// Index of a memory type allowed by `type_bits` that has all of `properties`.
    pub fn find_memory_type(
        &self,
        type_bits: u32,
        properties: vk::MemoryPropertyFlags,
    ) -> Option<u32> {
        let mem_properties = self.get_mem_properties();
        (0..mem_properties.memory_type_count).find(|&index| {
            type_bits & (1 << index) != 0
                && mem_properties.memory_types[index as usize]
                    .property_flags
                    .contains(properties)
        })
    }

    pub fn initialize(
        window: &NativeWindow,
        info: &EngineCreateInfo,
    ) -> EngineResult<(Self, Queues)> {
        log::debug!("Creating vulkan context");
        let vulkan_fn = unsafe { Entry::load()? };
        let validation = info.enable_validation && debug::check_validation_layer_support(&vulkan_fn);
        let instance = Self::create_instance(&vulkan_fn, window, validation)?;

        let debug_messenger = match validation
            .then(|| debug::setup_debug_messenger(&vulkan_fn, &instance))
            .transpose()
        {
            Ok(debug_messenger) => debug_messenger,
            Err(err) => {
                unsafe { instance.destroy_instance(None) };
                return Err(err);
            }
        };

        let surface_fn = surface::Instance::new(&vulkan_fn, &instance);
        let created =
            Self::create_surface_and_device(&vulkan_fn, &instance, &surface_fn, window, info);
        let (surface, candidate, device, queues) = match created {
            Ok(created) => created,
            Err(err) => {
                log::debug!("Context setup failed, destroying the instance");
                unsafe {
                    if let Some((report, callback)) = debug_messenger {
                        report.destroy_debug_utils_messenger(callback, None);
                    }
                    instance.destroy_instance(None);
                }
                return Err(err);
            }
        };

        Ok((
            Self {
                _vulkan_fn: vulkan_fn,
                instance,
                debug_messenger,
                surface_fn,
                surface,
                physical_device: candidate.physical_device,
                device,
                features: candidate.features,
            },
            queues,
        ))
    }

    /// Creates the window surface and a device that can present to it.
    /// The surface is destroyed again if no usable device comes out of it.
    fn create_surface_and_device(
        vulkan_fn: &Entry,
        instance: &Instance,
        surface_fn: &surface::Instance,
        window: &NativeWindow,
        info: &EngineCreateInfo,
    ) -> EngineResult<(vk::SurfaceKHR, DeviceCandidate, Device, Queues)> {
        let surface = unsafe {
            ash_window::create_surface(vulkan_fn, instance, window.display, window.window, None)
        }
        .vk_op("vkCreateSurfaceKHR")?;

        Self::select_physical_device(instance, surface_fn, surface, info)
            .and_then(|candidate| {
                let (device, queues) = Self::create_logical_device(instance, &candidate, info)?;
                Ok((surface, candidate, device, queues))
            })
            .inspect_err(|_| unsafe { surface_fn.destroy_surface(surface, None) })
    }

    fn create_instance(
        vulkan_fn: &Entry,
        window: &NativeWindow,
        validation: bool,
    ) -> EngineResult<Instance> {
        let app_name = c"Schengine App";
        let engine_name = c"schengine";
        let app_info = vk::ApplicationInfo::default()
            .application_name(app_name)
            .application_version(vk::make_api_version(0, 1, 0, 0))
            .engine_name(engine_name)
            .engine_version(vk::make_api_version(0, 0, 1, 0))
            .api_version(vk::API_VERSION_1_3);

        let mut extension_names = ash_window::enumerate_required_extensions(window.display)
            .vk_op("enumerate surface extensions")?
            .to_vec();

        if validation {
            extension_names.push(debug_utils::NAME.as_ptr());
        }

        let layer_names_ptrs = debug::layer_name_pointers();

        let mut instance_create_info = vk::InstanceCreateInfo::default()
            .application_info(&app_info)
            .enabled_extension_names(&extension_names);

        if validation {
            instance_create_info = instance_create_info.enabled_layer_names(&layer_names_ptrs);
        }

        unsafe { vulkan_fn.create_instance(&instance_create_info, None) }.vk_op("vkCreateInstance")
    }

    fn select_physical_device(
        instance: &Instance,
        surface_fn: &surface::Instance,
        surface: vk::SurfaceKHR,
        info: &EngineCreateInfo,
    ) -> EngineResult<DeviceCandidate> {
        let available_devices =
            unsafe { instance.enumerate_physical_devices() }.vk_op("enumerate physical devices")?;
        let device_count = available_devices.len();

        let mut last_error = None;
        for physical_device in available_devices {
            match Self::evaluate_device(instance, surface_fn, surface, physical_device, info) {
                Ok(Some(candidate)) => {
                    let props = unsafe { instance.get_physical_device_properties(physical_device) };
                    log::debug!(
                        "Selected physical device: {:?}",
                        props.device_name_as_c_str().unwrap_or(c"<unnamed>")
                    );
                    log::debug!("Enabled features: {:?}", candidate.features.enabled_names());
                    return Ok(candidate);
                }
                Ok(None) => (),
                Err(err) => last_error = Some(err),
            }
        }

        Err(last_error.unwrap_or(EngineError::NoSuitableDevice(device_count)))
    }

    /// `Ok(None)` for devices that can't render to the surface at all, an error for
    /// devices that can but lack a required feature.
    fn evaluate_device(
        instance: &Instance,
        surface_fn: &surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
        info: &EngineCreateInfo,
    ) -> EngineResult<Option<DeviceCandidate>> {
        let props = unsafe { instance.get_physical_device_properties(physical_device) };
        if props.api_version < vk::API_VERSION_1_3 {
            return Ok(None);
        }

        let queue_id = info.immediate_context.queue_id;
        let (graphics, present) =
            Self::find_queue_families(instance, surface_fn, surface, physical_device, queue_id)?;
        let (Some(graphics), Some(present)) = (graphics, present) else {
            return Ok(None);
        };

        let extensions = Self::device_extensions(instance, physical_device)?;
        if !extensions.contains(&ash::khr::swapchain::NAME) {
            return Ok(None);
        }

        let details = SwapchainSupportDetails::new(physical_device, surface_fn, surface)?;
        if details.formats.is_empty() || details.present_modes.is_empty() {
            return Ok(None);
        }

        let mut features13 = vk::PhysicalDeviceVulkan13Features::default();
        let mut features2 = vk::PhysicalDeviceFeatures2::default().push_next(&mut features13);
        unsafe { instance.get_physical_device_features2(physical_device, &mut features2) };
        let base = features2.features;
        if features13.dynamic_rendering != vk::TRUE || features13.synchronization2 != vk::TRUE {
            return Ok(None);
        }

        let families =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };
        let state = |available: bool| {
            if available {
                DeviceFeatureState::Enabled
            } else {
                DeviceFeatureState::Disabled
            }
        };
        let supported = DeviceFeatures {
            tessellation: state(base.tessellation_shader == vk::TRUE),
            compute_shaders: state(
                families[graphics as usize]
                    .queue_flags
                    .contains(vk::QueueFlags::COMPUTE),
            ),
            geometry_shaders: state(base.geometry_shader == vk::TRUE),
            mesh_shaders: state(extensions.contains(&ash::ext::mesh_shader::NAME)),
            ray_tracing: state(
                Self::ray_tracing_extensions()
                    .iter()
                    .all(|ext| extensions.contains(ext)),
            ),
            // object creation is externally synchronized per object only
            multithreaded_resource_creation: DeviceFeatureState::Enabled,
        };

        let features = info.features.resolve(&supported)?;
        Ok(Some(DeviceCandidate {
            physical_device,
            graphics_family: graphics,
            present_family: present,
            features,
        }))
    }

    fn create_logical_device(
        instance: &Instance,
        candidate: &DeviceCandidate,
        info: &EngineCreateInfo,
    ) -> EngineResult<(Device, Queues)> {
        let context_info = &info.immediate_context;
        let features = candidate.features;
        let mesh_shaders = features.mesh_shaders == DeviceFeatureState::Enabled;
        let ray_tracing = features.ray_tracing == DeviceFeatureState::Enabled;
        log::debug!(
            "Creating device with immediate context '{}' (queue {}, priority {:?})",
            context_info.name,
            context_info.queue_id,
            context_info.priority
        );

        let graphics_priorities =
            vec![context_info.priority.as_f32(); context_info.queue_id as usize + 1];
        let present_priorities = [1.0_f32];
        let queue_create_infos = {
            let mut infos = vec![vk::DeviceQueueCreateInfo::default()
                .queue_family_index(candidate.graphics_family)
                .queue_priorities(&graphics_priorities)];
            // Vulkan does not allow duplicated family indices.
            if candidate.present_family != candidate.graphics_family {
                infos.push(
                    vk::DeviceQueueCreateInfo::default()
                        .queue_family_index(candidate.present_family)
                        .queue_priorities(&present_priorities),
                );
            }
            infos
        };

        let mut device_extensions = vec![ash::khr::swapchain::NAME];
        if mesh_shaders {
            device_extensions.push(ash::ext::mesh_shader::NAME);
        }
        if ray_tracing {
            device_extensions.extend(Self::ray_tracing_extensions());
        }
        let device_extensions_ptrs = device_extensions
            .iter()
            .map(|ext| ext.as_ptr())
            .collect_vec();

        let device_features = vk::PhysicalDeviceFeatures::default()
            .tessellation_shader(features.tessellation == DeviceFeatureState::Enabled)
            .geometry_shader(features.geometry_shaders == DeviceFeatureState::Enabled);

        let mut device_features12 =
            vk::PhysicalDeviceVulkan12Features::default().buffer_device_address(ray_tracing);
        let mut device_features13 = vk::PhysicalDeviceVulkan13Features::default()
            .dynamic_rendering(true)
            .synchronization2(true);
        let mut mesh_shader_features =
            vk::PhysicalDeviceMeshShaderFeaturesEXT::default().mesh_shader(true);
        let mut ray_tracing_features =
            vk::PhysicalDeviceRayTracingPipelineFeaturesKHR::default().ray_tracing_pipeline(true);
        let mut acceleration_structure_features =
            vk::PhysicalDeviceAccelerationStructureFeaturesKHR::default()
                .acceleration_structure(true);

        let mut device_create_info = vk::DeviceCreateInfo::default()
            .queue_create_infos(&queue_create_infos)
            .enabled_extension_names(&device_extensions_ptrs)
            .enabled_features(&device_features)
            .push_next(&mut device_features12)
            .push_next(&mut device_features13);
        if mesh_shaders {
            device_create_info = device_create_info.push_next(&mut mesh_shader_features);
        }
        if ray_tracing {
            device_create_info = device_create_info
                .push_next(&mut ray_tracing_features)
                .push_next(&mut acceleration_structure_features);
        }

        let device =
            unsafe { instance.create_device(candidate.physical_device, &device_create_info, None) }
                .vk_op("vkCreateDevice")?;

        let graphics_queue =
            unsafe { device.get_device_queue(candidate.graphics_family, context_info.queue_id) };
        let present_queue = if candidate.present_family == candidate.graphics_family {
            graphics_queue
        } else {
            unsafe { device.get_device_queue(candidate.present_family, 0) }
        };

        let queues = Queues {
            graphics: QueueData {
                queue: graphics_queue,
                family_index: candidate.graphics_family,
            },
            present: QueueData {
                queue: present_queue,
                family_index: candidate.present_family,
            },
        };
        Ok((device, queues))
    }

    fn ray_tracing_extensions() -> [&'static CStr; 3] {
        [
            ash::khr::ray_tracing_pipeline::NAME,
            ash::khr::acceleration_structure::NAME,
            ash::khr::deferred_host_operations::NAME,
        ]
    }

    fn device_extensions(
        instance: &Instance,
        physical_device: vk::PhysicalDevice,
    ) -> EngineResult<Vec<&'static CStr>> {
        let extension_properties =
            unsafe { instance.enumerate_device_extension_properties(physical_device) }
                .vk_op("enumerate device extensions")?;

        let known = [
            ash::khr::swapchain::NAME,
            ash::ext::mesh_shader::NAME,
            ash::khr::ray_tracing_pipeline::NAME,
            ash::khr::acceleration_structure::NAME,
            ash::khr::deferred_host_operations::NAME,
        ];

        Ok(known
            .into_iter()
            .filter(|wanted| {
                extension_properties
                    .iter()
                    .any(|ext| ext.extension_name_as_c_str().is_ok_and(|name| name == *wanted))
            })
            .collect())
    }

    /// Find a queue family with at least `queue_id + 1` graphics queues and one with
    /// presentation support for `surface`.
    ///
    /// #Returns
    ///
    /// Return a tuple (Option<graphics_family_index>, Option<present_family_index>).
    fn find_queue_families(
        instance: &Instance,
        surface_fn: &surface::Instance,
        surface: vk::SurfaceKHR,
        physical_device: vk::PhysicalDevice,
        queue_id: u32,
    ) -> EngineResult<(Option<u32>, Option<u32>)> {
        let mut graphics = None;
        let mut present = None;

        let props =
            unsafe { instance.get_physical_device_queue_family_properties(physical_device) };

        for (index, family) in props.iter().enumerate().filter(|(_, f)| f.queue_count > 0) {
            let index = index as u32;

            if family.queue_flags.contains(vk::QueueFlags::GRAPHICS)
                && family.queue_count > queue_id
                && graphics.is_none()
            {
                graphics = Some(index);
            }

            let present_support = unsafe {
                surface_fn.get_physical_device_surface_support(physical_device, index, surface)
            }
            .vk_op("query surface support")?;

            // prefer presenting from the graphics family
            if present_support && (present.is_none() || graphics == Some(index)) {
                present = Some(index);
            }

            if graphics.is_some() && present == graphics {
                break;
            }
        }

        Ok((graphics, present))
    }
}

impl Drop for VkContext {
    fn drop(&mut self) {
        log::debug!("Start: Dropping context");
        unsafe {
            self.device.destroy_device(None);
            self.surface_fn.destroy_surface(self.surface, None);
            if let Some((report, callback)) = self.debug_messenger.take() {
                report.destroy_debug_utils_messenger(callback, None);
            }
            self.instance.destroy_instance(None);
        }
        log::debug!("End: Dropping context");
    }
}
