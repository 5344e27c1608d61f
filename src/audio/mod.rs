//! Audio subsystem module

pub mod buffer;
pub mod clock;
pub mod decode;
pub mod device;
pub mod element;
pub mod graph;
pub mod loader;
pub mod output;
pub mod param;
pub mod resample;

pub use buffer::{PcmBuffer, SharedPcm};
pub use clock::AudioClock;
pub use device::{get_output_device, list_output_devices, OutputDeviceInfo};
pub use element::{MediaElement, TransportEvent};
pub use graph::{AudioGraph, GraphInput};
pub use loader::{FileLoader, MediaLoader, MemoryLoader, ResamplingLoader};
pub use output::{ContextState, OutputContext};
pub use param::{GainParam, GainStage};
pub use resample::resample;
