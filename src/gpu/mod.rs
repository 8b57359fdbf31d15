// gpu/mod.rs — wgpu compute layer.
//
// The CPU band edge kernel in `crate::edges` is the authoritative
// reference; the GPU kernel here is validated against it pixel-for-pixel.
//
// Only edge extraction runs on the GPU. Everything downstream (Hough,
// clustering, pair selection, smoothing) is a few hundred segments at most
// and stays on the CPU, so the boundary is a single mask readback per tick.

pub mod buffers;
pub mod device;
pub mod edges;

pub use device::{AdapterChoice, AdapterPolicy, AllowSoftware, FirstGpu, GpuDevice, GpuError};
pub use edges::GpuEdgeExtractor;

/// Run one `#[ignore]`d GPU test in a child `cargo test` and return its
/// combined output.
///
/// The exit status is deliberately not checked: some Vulkan layers crash
/// during process exit after a device was created. The inner test prints
/// "GPU_TEST_OK" as its last action and callers look for that token.
#[cfg(test)]
pub(crate) fn run_gpu_test_in_subprocess(test_name: &str) -> String {
    let output = std::process::Command::new("cargo")
        .args(["test", "--lib", "--", test_name, "--exact", "--ignored", "--nocapture"])
        .output()
        .unwrap_or_else(|e| panic!("failed to spawn subprocess for {test_name}: {e}"));
    let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
    let stderr = String::from_utf8_lossy(&output.stderr).into_owned();
    print!("{stdout}");
    eprint!("{stderr}");
    stdout + &stderr
}
