use dpfp_rs::{
    CaptureParams, Dpfp, DpfpError, FingerPosition, Fmd, FmdFormat, Matcher, Threshold,
};
use std::error::Error;
use std::fs;
use std::io::{stdin, Read};

fn main() -> Result<(), Box<dyn Error>> {
    let dpfp = Dpfp::load()?;
    let matcher = Matcher::load()?;
    let device = dpfp.open_first()?;

    println!("Opened device. Loading previously enrolled right index finger data...");

    let bytes = fs::read("right_index.fmd")?;
    let enrolled = Fmd::from_bytes(FmdFormat::Ansi378_2004, bytes)?;
    println!("Template loaded. Time to verify!");

    let threshold = Threshold::default();
    loop {
        loop {
            println!("Scan your finger now.");
            let capture = match device.capture(&CaptureParams::default(), 10_000) {
                Ok(capture) => capture,
                Err(DpfpError::PoorCapture(quality)) => {
                    println!("Scan didn't quite work ({}). Please try again.", quality);
                    continue;
                }
                Err(err) => return Err(err.into()),
            };
            let probe = matcher.create_from_image(
                &capture.raster()?,
                FingerPosition::RightIndex,
                0,
                FmdFormat::Ansi378_2004,
            )?;

            let score = matcher.compare(&probe, 0, &enrolled, 0)?;
            if score.is_below(threshold) {
                println!("MATCH! ({}, {:?})", score, score.band());
            } else {
                println!("NO MATCH! ({})", score);
            }
            break;
        }

        println!("Press Enter to verify again or Ctrl+C to cancel.");
        let _ = stdin().read(&mut [0; 1]);
    }
}
