pub mod fft_buffer;
pub mod level_meter;
pub mod log_scaler;
pub mod multiband_filter;
pub mod ring_buffer;
