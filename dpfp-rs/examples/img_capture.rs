use dpfp_rs::{CaptureParams, Compressor, Dpfp, WsqTarget};
use std::error::Error;
use std::fs;

fn main() -> Result<(), Box<dyn Error>> {
    let dpfp = Dpfp::load()?;
    let device = dpfp.open_first()?;

    if !device.capabilities()?.can_capture_image {
        eprintln!("This device does not have imaging capabilities.");
        return Ok(());
    }

    println!("Opened device. It's now time to scan your finger.");
    let capture = device.capture(&CaptureParams::default(), 10_000)?;
    let raster = capture.raster()?;
    raster.save_to_file("finger.png")?;
    raster.save_to_file("finger.pgm")?;

    let compressor = Compressor::load()?;
    let wsq = compressor.compress_raw(&raster, WsqTarget::default())?;
    fs::write("finger.wsq", &wsq)?;
    println!(
        "Saved {}x{} image, {} bytes as WSQ.",
        raster.width,
        raster.height,
        wsq.len()
    );

    Ok(())
}
