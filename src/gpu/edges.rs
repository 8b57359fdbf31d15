// gpu/edges.rs — GPU banded gradient-magnitude edge mask.
//
// Same arithmetic as `edges::band_edges`, one invocation per pixel.
//
// BUFFERS (all sized from the frame, rebuilt only when it changes size):
//   pixels    storage, read     w*h u32  (BGRA packed, written per tick)
//   mask      storage, rw       w*h u32  (255 / 0)
//   params    uniform           16 B     (width, height, band)
//   readback  MAP_READ          w*h u32
//
// The frame is uploaded with `queue.write_buffer` into the existing pixels
// buffer; the only per-tick allocations are the command encoder and the
// host-side mask vector.
//
// The mask is one u32 per pixel rather than packed bytes: each invocation
// owns its word, so no atomics are needed (same reasoning as a dense score
// buffer). 4× the readback size is negligible at minimap resolutions.

use std::sync::mpsc;

use log::debug;
use wgpu::util::DeviceExt;

use crate::edges::{EdgeExtractor, BAND_HIGH, BAND_LOW};
use crate::error::{ResourceError, Result};
use crate::frame::{EdgeMask, Frame, FRAME_CHANNELS};
use crate::gpu::buffers::SizedSlot;
use crate::gpu::device::{AdapterChoice, GpuDevice, GpuError};

// ---------------------------------------------------------------------------
// Uniform params (must match WGSL struct Params exactly)
// ---------------------------------------------------------------------------

#[repr(C)]
#[derive(Copy, Clone, bytemuck::Pod, bytemuck::Zeroable)]
struct EdgeParams {
    width: u32,
    height: u32,
    band_low: f32,
    band_high: f32,
}

/// Per-size device resources.
struct EdgeBuffers {
    pixels: wgpu::Buffer,
    mask: wgpu::Buffer,
    readback: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    /// Kept alive for the bind group.
    _params: wgpu::Buffer,
    /// Byte size of `pixels`, `mask` and `readback`.
    size: u64,
}

// ---------------------------------------------------------------------------
// GpuEdgeExtractor
// ---------------------------------------------------------------------------

/// GPU implementation of [`EdgeExtractor`].
///
/// Owns the device, the compiled pipeline and the size-keyed buffers.
/// Move it into the thread that runs the tick loop; nothing else should
/// touch it.
pub struct GpuEdgeExtractor {
    buffers: SizedSlot<EdgeBuffers>,
    pipeline: wgpu::ComputePipeline,
    bgl: wgpu::BindGroupLayout,
    gpu: GpuDevice,
}

impl GpuEdgeExtractor {
    pub fn new(gpu: GpuDevice) -> Self {
        let shader_src = gpu.workgroup_size.specialize(include_str!("../shaders/band_edges.wgsl"));
        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("band_edges.wgsl"),
            source: wgpu::ShaderSource::Wgsl(shader_src.into()),
        });

        let storage = |binding, read_only| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: wgpu::ShaderStages::COMPUTE,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Storage { read_only },
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };

        let bgl = gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("BandEdges BGL"),
            entries: &[
                // 0 — packed BGRA pixels
                storage(0, true),
                // 1 — mask
                storage(1, false),
                // 2 — params uniform
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::COMPUTE,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("BandEdges pipeline layout"),
            bind_group_layouts: &[&bgl],
            push_constant_ranges: &[],
        });

        let pipeline = gpu.device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("band_edges"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: "band_edges",
            compilation_options: wgpu::PipelineCompilationOptions::default(),
            cache: None,
        });

        debug!("band edge pipeline ready on {}", gpu.adapter_info);
        GpuEdgeExtractor { buffers: SizedSlot::new(), pipeline, bgl, gpu }
    }

    /// Create a device with the given policy and build the pipeline on it.
    pub fn from_choice(choice: AdapterChoice) -> std::result::Result<Self, GpuError> {
        Ok(Self::new(GpuDevice::from_choice(choice)?))
    }

    pub fn device(&self) -> &GpuDevice {
        &self.gpu
    }

    /// Number of times the buffers have been (re)built.
    pub fn allocations(&self) -> usize {
        self.buffers.allocations()
    }

    /// Frame size the current buffers were built for.
    pub fn buffer_dims(&self) -> Option<(usize, usize)> {
        self.buffers.dims()
    }

    fn allocate(
        gpu: &GpuDevice,
        bgl: &wgpu::BindGroupLayout,
        width: usize,
        height: usize,
    ) -> std::result::Result<EdgeBuffers, ResourceError> {
        let size = (width * height * std::mem::size_of::<u32>()) as u64;
        let limits = gpu.device.limits();
        let binding_limit = (limits.max_storage_buffer_binding_size as u64).min(limits.max_buffer_size);
        if size > binding_limit {
            return Err(ResourceError::BufferTooLarge { label: "pixel", requested: size, limit: binding_limit });
        }

        gpu.device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);

        let pixels = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("BandEdges pixels"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mask = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("BandEdges mask"),
            size,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let readback = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("BandEdges readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = EdgeParams {
            width: width as u32,
            height: height as u32,
            band_low: BAND_LOW,
            band_high: BAND_HIGH,
        };
        let params_buf = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("BandEdges params"),
            contents: bytemuck::bytes_of(&params),
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("BandEdges BG"),
            layout: bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: pixels.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: mask.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 2, resource: params_buf.as_entire_binding() },
            ],
        });

        if let Some(err) = pollster::block_on(gpu.device.pop_error_scope()) {
            return Err(ResourceError::Allocation { width, height, reason: err.to_string() });
        }

        debug!("allocated band edge buffers for {width}x{height} ({size} bytes each)");
        Ok(EdgeBuffers { pixels, mask, readback, bind_group, _params: params_buf, size })
    }
}

impl EdgeExtractor for GpuEdgeExtractor {
    fn extract(&mut self, frame: &Frame) -> Result<EdgeMask> {
        let (w, h) = frame.dims();
        if w == 0 || h == 0 {
            return Err(ResourceError::EmptyFrame { width: w, height: h }.into());
        }
        debug_assert_eq!(frame.as_bytes().len(), w * h * FRAME_CHANNELS);

        let gpu = &self.gpu;
        let bgl = &self.bgl;
        let bufs = self.buffers.ensure(w, h, |w, h| Self::allocate(gpu, bgl, w, h))?;

        // BGRA bytes are already the little-endian packing the shader reads.
        gpu.queue.write_buffer(&bufs.pixels, 0, frame.as_bytes());

        let (wg_x, wg_y) = gpu.dispatch_size(w as u32, h as u32);
        let mut encoder = gpu.device.create_command_encoder(
            &wgpu::CommandEncoderDescriptor { label: Some("BandEdges dispatch") },
        );
        {
            let mut pass = encoder.begin_compute_pass(
                &wgpu::ComputePassDescriptor { label: Some("band_edges"), timestamp_writes: None },
            );
            pass.set_pipeline(&self.pipeline);
            pass.set_bind_group(0, &bufs.bind_group, &[]);
            pass.dispatch_workgroups(wg_x, wg_y, 1);
        }
        encoder.copy_buffer_to_buffer(&bufs.mask, 0, &bufs.readback, 0, bufs.size);
        gpu.queue.submit(std::iter::once(encoder.finish()));

        let slice = bufs.readback.slice(..);
        let (tx, rx) = mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |r| {
            let _ = tx.send(r);
        });
        gpu.device.poll(wgpu::Maintain::Wait);
        rx.recv().map_err(|_| ResourceError::ReadbackDisconnected)?.map_err(ResourceError::Readback)?;

        let mask = {
            let mapped = slice.get_mapped_range();
            let words: &[u32] = bytemuck::cast_slice(&mapped);
            words.iter().map(|&v| v as u8).collect::<Vec<u8>>()
        };
        bufs.readback.unmap();

        Ok(EdgeMask::from_vec(w, h, mask))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::band_edges;
    use crate::gpu::device::AllowSoftware;
    use crate::gpu::run_gpu_test_in_subprocess;

    fn noisy_frame(w: usize, h: usize, seed: u32) -> Frame {
        let mut rng = seed;
        let data = (0..w * h * FRAME_CHANNELS)
            .map(|_| {
                rng = rng.wrapping_mul(1664525).wrapping_add(1013904223);
                (rng >> 24) as u8
            })
            .collect();
        Frame::from_bgra(w, h, data)
    }

    fn extractor() -> GpuEdgeExtractor {
        // Software adapters are fine for correctness.
        GpuEdgeExtractor::new(GpuDevice::new_with_policy(&AllowSoftware).expect("need a GPU adapter"))
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_gpu_matches_cpu() {
        let mut ex = extractor();
        // Non-multiple of the workgroup size on both axes.
        for (w, h, seed) in [(128, 96, 7u32), (101, 77, 99991)] {
            let frame = noisy_frame(w, h, seed);
            let cpu = band_edges(&frame);
            let gpu = ex.extract(&frame).expect("extract");
            eprintln!("[test] {w}x{h}: CPU {} edges, GPU {} edges", cpu.count(), gpu.count());
            assert_eq!(gpu.count(), cpu.count());
            assert_eq!(gpu, cpu, "GPU mask differs from CPU reference at {w}x{h}");
        }
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_buffers_reused_for_same_dims() {
        let mut ex = extractor();
        assert_eq!(ex.allocations(), 0);
        ex.extract(&noisy_frame(64, 64, 1)).unwrap();
        ex.extract(&noisy_frame(64, 64, 2)).unwrap();
        ex.extract(&noisy_frame(64, 64, 3)).unwrap();
        assert_eq!(ex.allocations(), 1);
        ex.extract(&noisy_frame(80, 64, 4)).unwrap();
        assert_eq!(ex.allocations(), 2);
        assert_eq!(ex.buffer_dims(), Some((80, 64)));
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "GPU integration: run via outer subprocess wrapper"]
    fn inner_empty_frame_is_rejected() {
        let mut ex = extractor();
        let err = ex.extract(&Frame::from_bgra(0, 0, Vec::new())).unwrap_err();
        assert!(matches!(err, crate::Error::Resource(ResourceError::EmptyFrame { .. })));
        assert_eq!(ex.allocations(), 0);
        println!("GPU_TEST_OK");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_gpu_matches_cpu() {
        let out = run_gpu_test_in_subprocess("gpu::edges::tests::inner_gpu_matches_cpu");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_buffers_reused_for_same_dims() {
        let out = run_gpu_test_in_subprocess("gpu::edges::tests::inner_buffers_reused_for_same_dims");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }

    #[test]
    #[ignore = "requires a real GPU"]
    fn test_empty_frame_is_rejected() {
        let out = run_gpu_test_in_subprocess("gpu::edges::tests::inner_empty_frame_is_rejected");
        assert!(out.contains("GPU_TEST_OK"), "inner test failed:\n{out}");
    }
}
