use dpfp_rs::{
    CaptureParams, Dpfp, DpfpError, FingerPosition, FmdFormat, Matcher, Step,
};
use std::error::Error;
use std::fs;
use std::io::{stdin, Read};

const SCANS: usize = 4;

fn main() -> Result<(), Box<dyn Error>> {
    println!(
        "This program will enroll your right index finger and write the template to \
         right_index.fmd, overwriting any template saved there before. If you want to \
         continue, press enter, otherwise hit Ctrl+C"
    );

    let _ = stdin().read(&mut [0u8]);

    let dpfp = Dpfp::load()?;
    let matcher = Matcher::load()?;
    let device = dpfp.open_first()?;

    println!("Opened {}. Up to {} scans will be taken.", device.name(), SCANS);

    let mut enrollment = matcher.start_enrollment(FmdFormat::Ansi378_2004)?;
    for counter in 1..=SCANS {
        println!("Scan your finger now (time: {}).", counter);
        let capture = match device.capture(&CaptureParams::default(), 10_000) {
            Ok(capture) => capture,
            Err(DpfpError::PoorCapture(quality)) => {
                println!("Didn't quite catch that ({}). Please try again.", quality);
                continue;
            }
            Err(err) => return Err(err.into()),
        };

        let fmd = matcher.create_from_image(
            &capture.raster()?,
            FingerPosition::RightIndex,
            0,
            FmdFormat::Ansi378_2004,
        )?;
        enrollment = match enrollment.add(&fmd, 0)? {
            Step::NeedMore(enrollment) => {
                println!("Enroll stage passed. Yay!");
                enrollment
            }
            Step::Ready(mut ready) => {
                let template = ready.create_template()?;
                ready.finish()?;
                fs::write("right_index.fmd", template.as_bytes())?;
                println!("Enrollment completed! Template saved.");
                return Ok(());
            }
        };
    }

    println!("Enroll failed, the library wanted more scans.");
    enrollment.finish()?;

    Ok(())
}
