use std::sync::Arc;

use anyhow::Result;
use log::debug;
use vulkano::{
    buffer::{Buffer, BufferContents, BufferCreateInfo, BufferUsage, Subbuffer},
    command_buffer::allocator::CommandBufferAllocator,
    device::{Device, Queue},
    memory::allocator::{AllocationCreateInfo, MemoryAllocator, MemoryTypeFilter},
};

/// Our own vulkano context. Wraps the resources every upload needs.
pub struct Vk {
    pub device: Arc<Device>,
    pub queue: Arc<Queue>,
    pub memory_allocator: Arc<dyn MemoryAllocator>,
    pub command_buffer_allocator: Arc<dyn CommandBufferAllocator>,
}

/// Create a device-preferred buffer filled from `data`.
pub fn create_buffer<T, I>(vk: &Vk, usage: BufferUsage, data: I) -> Result<Subbuffer<[T]>>
where
    T: BufferContents,
    I: IntoIterator<Item = T>,
    I::IntoIter: ExactSizeIterator,
{
    let iter = data.into_iter();
    debug!("Creating {usage:?} buffer with {} elements", iter.len());

    let buffer = Buffer::from_iter(
        vk.memory_allocator.clone(),
        BufferCreateInfo {
            usage,
            ..Default::default()
        },
        AllocationCreateInfo {
            memory_type_filter: MemoryTypeFilter::PREFER_DEVICE
                | MemoryTypeFilter::HOST_SEQUENTIAL_WRITE,
            ..Default::default()
        },
        iter,
    )?;
    Ok(buffer)
}
