use std::sync::Arc;

use anyhow::Result;
use ptex::Vk;
use vulkano::command_buffer::allocator::{
    StandardCommandBufferAllocator, StandardCommandBufferAllocatorCreateInfo,
};
use vulkano_util::context::{VulkanoConfig, VulkanoContext};

/// Create a headless vulkano context. No window or swapchain; the meshes are
/// prepared for an offline render pass.
pub fn create_context() -> Result<Arc<Vk>> {
    let context = VulkanoContext::new(VulkanoConfig::default());

    let command_buffer_allocator = Arc::new(StandardCommandBufferAllocator::new(
        context.device().clone(),
        StandardCommandBufferAllocatorCreateInfo::default(),
    ));

    Ok(Arc::new(Vk {
        device: context.device().clone(),
        queue: context.graphics_queue().clone(),
        memory_allocator: context.memory_allocator().clone(),
        command_buffer_allocator,
    }))
}
